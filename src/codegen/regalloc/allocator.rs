//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use crate::codegen::regalloc::checker::check_allocation;
use crate::codegen::regalloc::lsra::LinearScan;
use crate::codegen::regalloc::resolve::Resolver;
use crate::codegen::regalloc::{Allocation, Liveness, RegAllocError};
use crate::codegen::{Function, RegAllocOptions, RegisterInfo};
use log::debug;

/// Models a generic register allocator that maps the virtual registers of
/// a function onto the physical registers of a target.
pub trait RegisterAllocator {
    /// Allocates registers for `func`.
    ///
    /// Errors describe input the allocator can't work with, see [`RegAllocError`].
    fn allocate<F: Function>(
        &mut self,
        func: &F,
        info: &RegisterInfo,
        options: &RegAllocOptions,
    ) -> Result<Allocation, RegAllocError>;
}

/// A linear scanning based register allocator.
///
/// The allocator keeps every buffer it needs between runs, so allocating
/// many functions with one object doesn't keep hitting the heap. An object
/// is not shared between threads, every worker gets its own.
#[derive(Debug, Default)]
pub struct LinearScanRegAlloc {
    live: Liveness,
    scan: LinearScan,
    resolver: Resolver,
}

impl LinearScanRegAlloc {
    /// Creates an allocator with empty buffers.
    pub fn new() -> Self {
        Self::default()
    }

    /// The liveness information of the last function that was allocated.
    pub fn liveness(&self) -> &Liveness {
        &self.live
    }
}

impl RegisterAllocator for LinearScanRegAlloc {
    fn allocate<F: Function>(
        &mut self,
        func: &F,
        info: &RegisterInfo,
        options: &RegAllocOptions,
    ) -> Result<Allocation, RegAllocError> {
        debug!(
            "allocating `{}` ({} blocks, {} instructions) for {}",
            func.name(),
            func.num_blocks(),
            func.num_insts(),
            info.name()
        );

        self.live.recompute(func)?;
        self.scan.run(&self.live, info, options)?;

        let alloc = self
            .resolver
            .resolve(func, &self.live, &mut self.scan, info, options)?;

        if options.verify {
            check_allocation(func, &self.live, &alloc, info)?;
        }

        Ok(alloc)
    }
}

/// Allocates registers for a single function with a fresh [`LinearScanRegAlloc`].
///
/// ```
/// # use garnet::codegen::*;
/// # use garnet::codegen::regalloc::allocate;
/// let mut builder = FunctionBuilder::new("add");
/// let entry = builder.create_block();
/// let x = builder.append_block_param(entry, RegClass::Int);
/// let y = builder.new_vreg(RegClass::Int);
///
/// builder.switch_to(entry);
/// builder.push(TestInst::op(&[y], &[x]));
/// builder.push(TestInst::ret(&[y]));
///
/// let func = builder.build();
/// let alloc = allocate(&func, isa::amd64(), &RegAllocOptions::default()).unwrap();
///
/// assert!(alloc.edits().is_empty());
/// ```
pub fn allocate<F: Function>(
    func: &F,
    info: &RegisterInfo,
    options: &RegAllocOptions,
) -> Result<Allocation, RegAllocError> {
    LinearScanRegAlloc::new().allocate(func, info, options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::ArenaKey;
    use crate::codegen::{isa, FunctionBuilder, Inst, PReg, RegClass, TestInst};

    #[test]
    fn allocator_objects_can_be_reused() {
        let mut ra = LinearScanRegAlloc::new();
        let options = RegAllocOptions {
            verify: true,
            ..RegAllocOptions::default()
        };

        for n in 1..6 {
            let mut b = FunctionBuilder::new(format!("f{n}"));
            let bb0 = b.create_block();
            let vs: Vec<_> = (0..n).map(|_| b.new_vreg(RegClass::Float)).collect();

            b.switch_to(bb0);

            for &v in vs.iter() {
                b.push(TestInst::def(v));
            }

            b.push(TestInst::ret(&vs[..1]));

            let func = b.build();
            let alloc = ra.allocate(&func, isa::debug3reg(), &options).unwrap();

            assert_eq!(alloc.function_name(), format!("f{n}"));
            assert_eq!(alloc.stats().values, n);
        }
    }

    #[test]
    fn fixed_uses_get_moved_into_place() {
        let mut b = FunctionBuilder::new("f");
        let bb0 = b.create_block();
        let x = b.new_vreg(RegClass::Int);

        b.switch_to(bb0);
        b.push(TestInst::def(x).with_fixed_def(x, PReg::int(0)));
        b.push(TestInst::ret(&[]).with_fixed_use(x, PReg::int(1)));

        let func = b.build();
        let alloc = allocate(&func, isa::debug3reg(), &RegAllocOptions::default()).unwrap();

        assert_eq!(alloc.assignment(Inst::key_new(0), x), Some(PReg::int(0)));
        assert_eq!(alloc.assignment(Inst::key_new(1), x), Some(PReg::int(1)));
        assert_eq!(alloc.stats().fixed_moves, 1);
    }
}
