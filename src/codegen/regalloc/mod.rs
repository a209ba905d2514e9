//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

//! The register allocator.
//!
//! Allocation runs in three passes over a [`Function`](crate::codegen::Function):
//!
//! 1. [`Liveness`] solves the live-in/live-out dataflow equations and builds
//!    one [`LiveInterval`] per value, made of one or more ranges of
//!    [`ProgramPoint`]s.
//! 2. The linear scan walks the intervals by start point and hands out
//!    registers. When a class runs out, the active value whose interval ends
//!    furthest away is spilled (ties go to the lowest value number), and
//!    every later use of it gets a short reload interval of its own.
//! 3. The resolver turns those decisions into an [`Allocation`]: operand
//!    registers, spill/reload/save/restore [`Edit`]s around instructions, and
//!    the moves every control-flow edge needs, sequentialized as parallel
//!    moves and placed at either end of the edge or in a split block.
//!
//! [`check_allocation`] can re-verify any result by running the function
//! symbolically. [`allocate_module`] spreads whole modules over a thread pool.

mod allocation;
mod allocator;
mod checker;
mod error;
mod liveness;
mod lsra;
mod module;
mod moves;
mod resolve;
mod stack;

pub use allocation::*;
pub use allocator::*;
pub use checker::check_allocation;
pub use error::RegAllocError;
pub use liveness::{
    DefSite, FixedIntervals, FixedPoint, LiveInterval, LiveRange, Liveness, ProgramPoint,
};
pub use module::*;
pub use stack::SpillSlot;
