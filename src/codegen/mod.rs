//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

//! APIs for the compiler back-end and code-generation facilities
//!
//! These APIs mostly abstract away any target-specific details. Everything
//! the register allocator knows about a target comes from a
//! [`RegisterInfo`], the descriptions that ship with the crate live in
//! [`isa`].

#[cfg(feature = "dev-tools")]
pub mod generate;
pub mod isa;
mod mir;
mod options;
pub mod regalloc;
mod registers;
mod regset;
mod testing;

pub use mir::*;
pub use options::*;
pub use registers::*;
pub use regset::*;
pub use testing::*;
