//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

#![deny(
    unreachable_pub,
    missing_docs,
    missing_abi,
    rust_2018_idioms,
    rustdoc::broken_intra_doc_links,
    rustdoc::private_intra_doc_links
)]

//! # Garnet
//!
//! The register allocation back-end of a WebAssembly compiler. Instruction
//! selection hands over functions made of machine instructions that only
//! name virtual registers, and gets back where every one of those lives,
//! along with the spill, reload and move code that has to be inserted to
//! make that work.
//!
//! The entry points are [`codegen::regalloc::allocate`] for a single
//! function and [`codegen::regalloc::allocate_module`] for many.

pub mod arena;
pub mod codegen;
pub mod utility;

#[cfg(feature = "dev-tools")]
pub mod cli;
