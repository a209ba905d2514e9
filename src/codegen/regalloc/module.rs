//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2023 Evan Cox <evanacox00@gmail.com>. All rights reserved.      //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use crate::codegen::regalloc::{
    AllocStats, Allocation, LinearScanRegAlloc, RegAllocError, RegisterAllocator,
};
use crate::codegen::{Function, RegAllocOptions, RegisterInfo};
use log::{debug, warn};
use std::cell::RefCell;

/// The result of allocating every function in a module.
///
/// A function that fails doesn't stop the others, its error is kept in
/// place of its allocation so the caller can fall back to something else
/// for just that function.
#[derive(Debug)]
pub struct ModuleAllocation {
    results: Vec<Result<Allocation, RegAllocError>>,
}

impl ModuleAllocation {
    /// The result for every function, in the order the functions were given.
    #[inline]
    pub fn results(&self) -> &[Result<Allocation, RegAllocError>] {
        &self.results
    }

    /// Takes the results out.
    #[inline]
    pub fn into_results(self) -> Vec<Result<Allocation, RegAllocError>> {
        self.results
    }

    /// Every function that failed, by index, with its error.
    pub fn failures(&self) -> impl Iterator<Item = (usize, &RegAllocError)> + '_ {
        self.results
            .iter()
            .enumerate()
            .filter_map(|(i, result)| result.as_ref().err().map(|err| (i, err)))
    }

    /// The counters of every successful allocation added together.
    pub fn stats(&self) -> AllocStats {
        let mut stats = AllocStats::default();

        for alloc in self.results.iter().flatten() {
            stats.merge(alloc.stats());
        }

        stats
    }

    fn from_results(
        results: Vec<Result<Allocation, RegAllocError>>,
    ) -> Result<Self, RegAllocError> {
        // a broken register description breaks every function the same way
        if let Some(Err(err)) = results
            .iter()
            .find(|result| matches!(result, Err(err) if err.is_fatal()))
        {
            return Err(err.clone());
        }

        for (i, result) in results.iter().enumerate() {
            if let Err(err) = result {
                warn!("function #{i} failed register allocation: {err}");
            }
        }

        Ok(Self { results })
    }
}

thread_local! {
    static ALLOCATOR: RefCell<LinearScanRegAlloc> = RefCell::new(LinearScanRegAlloc::new());
}

fn allocate_on_this_thread<F: Function>(
    func: &F,
    info: &RegisterInfo,
    options: &RegAllocOptions,
) -> Result<Allocation, RegAllocError> {
    ALLOCATOR.with(|ra| ra.borrow_mut().allocate(func, info, options))
}

/// Allocates registers for every function of a module.
///
/// With the `parallel` feature the functions are spread over a thread pool
/// of `jobs` workers (or one per core), each worker reusing one allocator
/// for everything it is handed. Results are identical to allocating the
/// functions one after another.
///
/// Errors that are the fault of `info` rather than of a function are
/// returned as `Err`, everything else ends up in [`ModuleAllocation`].
#[cfg(feature = "parallel")]
pub fn allocate_module<F>(
    funcs: Vec<F>,
    info: &RegisterInfo,
    options: &RegAllocOptions,
    jobs: Option<usize>,
) -> Result<ModuleAllocation, RegAllocError>
where
    F: Function + Send + Sync + 'static,
{
    use std::sync::{mpsc, Arc};
    use threadpool::ThreadPool;

    let count = funcs.len();
    let funcs = Arc::new(funcs);
    let info = Arc::new(info.clone());
    let options = *options;
    let pool = match jobs {
        Some(n) => ThreadPool::new(n.max(1)),
        None => ThreadPool::default(),
    };
    let (send, recv) = mpsc::channel();

    debug!(
        "allocating {count} functions on {} threads",
        pool.max_count()
    );

    for i in 0..count {
        let send = send.clone();
        let funcs = Arc::clone(&funcs);
        let info = Arc::clone(&info);

        pool.execute(move || {
            let result = allocate_on_this_thread(&funcs[i], &info, &options);

            send.send((i, result)).expect("module allocation stopped listening");
        });
    }

    drop(send);

    let mut results: Vec<Option<Result<Allocation, RegAllocError>>> =
        (0..count).map(|_| None).collect();

    for (i, result) in recv.iter() {
        results[i] = Some(result);
    }

    // a worker that panicked never sends anything
    let results = results
        .into_iter()
        .enumerate()
        .map(|(i, result)| {
            result.unwrap_or(Err(RegAllocError::WorkerPanicked(i)))
        })
        .collect();

    ModuleAllocation::from_results(results)
}

/// Allocates registers for every function of a module, one after another.
/// `jobs` is ignored without the `parallel` feature.
#[cfg(not(feature = "parallel"))]
pub fn allocate_module<F>(
    funcs: Vec<F>,
    info: &RegisterInfo,
    options: &RegAllocOptions,
    _jobs: Option<usize>,
) -> Result<ModuleAllocation, RegAllocError>
where
    F: Function + Send + Sync + 'static,
{
    debug!("allocating {} functions", funcs.len());

    let results = funcs
        .iter()
        .map(|func| allocate_on_this_thread(func, info, options))
        .collect();

    ModuleAllocation::from_results(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::regalloc::allocate;
    use crate::codegen::{
        isa, FunctionBuilder, Inst, InstRange, MIRBlock, MIRFunction, PReg, RegClass, TestInst,
        VReg,
    };

    fn pressure(name: &str, width: usize) -> MIRFunction<TestInst> {
        let mut b = FunctionBuilder::new(name);
        let bb0 = b.create_block();
        let vs: Vec<_> = (0..width).map(|_| b.new_vreg(RegClass::Int)).collect();

        b.switch_to(bb0);

        for &v in vs.iter() {
            b.push(TestInst::def(v));
        }

        for pair in vs.chunks(2) {
            b.push(TestInst::op(&[], pair));
        }

        b.push(TestInst::ret(&[]));
        b.build()
    }

    #[test]
    fn results_match_sequential_allocation() {
        let funcs: Vec<_> = (1..12).map(|n| pressure(&format!("f{n}"), n)).collect();
        let options = RegAllocOptions::default();
        let module = allocate_module(funcs.clone(), isa::debug3reg(), &options, Some(3)).unwrap();

        assert_eq!(module.results().len(), funcs.len());
        assert_eq!(module.failures().count(), 0);

        for (func, result) in funcs.iter().zip(module.results()) {
            let expected = allocate(func, isa::debug3reg(), &options).unwrap();
            let got = result.as_ref().unwrap();

            assert_eq!(got.function_name(), expected.function_name());
            assert_eq!(got.edits(), expected.edits());
            assert_eq!(got.stats(), expected.stats());
        }
    }

    #[test]
    fn broken_functions_do_not_stop_the_module() {
        let mut b = FunctionBuilder::new("broken");
        let bb0 = b.create_block();
        let v = b.new_vreg(RegClass::Int);

        b.switch_to(bb0);
        b.push(TestInst::ret(&[v]));

        let funcs = vec![pressure("ok", 2), b.build(), pressure("also-ok", 4)];
        let module =
            allocate_module(funcs, isa::debug3reg(), &RegAllocOptions::default(), None).unwrap();
        let failures: Vec<_> = module.failures().map(|(i, _)| i).collect();

        assert_eq!(failures, vec![1]);
        assert!(module.stats().values >= 6);
    }

    #[test]
    fn configuration_errors_abort_the_module() {
        let info = RegisterInfo::builder("no-ints")
            .caller_saved(PReg::float(0), "f0")
            .build();
        let funcs = vec![pressure("a", 2), pressure("b", 2)];

        assert_eq!(
            allocate_module(funcs, &info, &RegAllocOptions::default(), Some(2)).unwrap_err(),
            RegAllocError::NoAllocatableRegisters(RegClass::Int)
        );
    }

    // panics as soon as anything looks at its blocks
    #[cfg(feature = "parallel")]
    struct Exploding(MIRFunction<TestInst>, bool);

    #[cfg(feature = "parallel")]
    impl Function for Exploding {
        type Inst = TestInst;

        fn name(&self) -> &str {
            self.0.name()
        }

        fn num_blocks(&self) -> usize {
            self.0.num_blocks()
        }

        fn num_insts(&self) -> usize {
            self.0.num_insts()
        }

        fn vreg_capacity(&self) -> usize {
            self.0.vreg_capacity()
        }

        fn block_insts(&self, block: MIRBlock) -> InstRange {
            assert!(!self.1, "{} exploded", self.name());

            self.0.block_insts(block)
        }

        fn inst(&self, inst: Inst) -> &TestInst {
            self.0.inst(inst)
        }

        fn block_preds(&self, block: MIRBlock) -> &[MIRBlock] {
            self.0.block_preds(block)
        }

        fn block_succs(&self, block: MIRBlock) -> &[MIRBlock] {
            self.0.block_succs(block)
        }

        fn block_params(&self, block: MIRBlock) -> &[VReg] {
            self.0.block_params(block)
        }

        fn branch_args(&self, block: MIRBlock, succ: usize) -> &[VReg] {
            self.0.branch_args(block, succ)
        }
    }

    #[test]
    #[cfg(feature = "parallel")]
    fn panicking_workers_are_reported_as_such() {
        let funcs = vec![
            Exploding(pressure("fine", 2), false),
            Exploding(pressure("boom", 2), true),
            Exploding(pressure("also-fine", 3), false),
        ];
        let module =
            allocate_module(funcs, isa::debug3reg(), &RegAllocOptions::default(), Some(2)).unwrap();
        let failures: Vec<_> = module.failures().collect();

        assert_eq!(failures, vec![(1, &RegAllocError::WorkerPanicked(1))]);
        assert!(module.results()[0].is_ok());
        assert!(module.results()[2].is_ok());
    }
}
