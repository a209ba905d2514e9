//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2023 Evan Cox <evanacox00@gmail.com>. All rights reserved.      //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

#![cfg(feature = "dev-tools")]

use garnet::codegen::generate::{self, Shape};
use garnet::codegen::isa::Isa;
use garnet::codegen::regalloc::*;
use garnet::codegen::*;
use rand::rngs::StdRng;
use rand::SeedableRng;

const SHAPE: Shape = Shape {
    max_blocks: 6,
    max_values: 10,
    fixed_operands: true,
};

fn check_all(seed: u64, count: usize, shape: Shape) {
    let options = RegAllocOptions {
        verify: true,
        ..RegAllocOptions::default()
    };

    for isa in Isa::ALL {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut ra = LinearScanRegAlloc::new();

        for i in 0..count {
            let func = generate::function(&mut rng, format!("f{i}"), shape);

            if let Err(err) = ra.allocate(&func, isa.registers(), &options) {
                panic!("{isa}: {err}\n{func}");
            }
        }
    }
}

#[test]
fn random_functions_pass_the_checker() {
    check_all(0x9e37_79b9_7f4a_7c15, 200, SHAPE);
}

#[test]
fn random_functions_without_pins_pass_the_checker() {
    let shape = Shape {
        fixed_operands: false,
        ..SHAPE
    };

    check_all(0x2545_f491_4f6c_dd1d, 200, shape);
}

#[test]
fn slot_reuse_never_changes_correctness() {
    let options = RegAllocOptions {
        verify: true,
        reuse_spill_slots: false,
        split_critical_edges: true,
    };

    for func in generate::functions(42, 100, SHAPE) {
        let reusing = RegAllocOptions {
            reuse_spill_slots: true,
            ..options
        };
        let reused = allocate(&func, isa::debug3reg(), &reusing).unwrap();
        let fresh = allocate(&func, isa::debug3reg(), &options).unwrap();

        assert!(reused.spill_area_size() <= fresh.spill_area_size());
        assert_eq!(reused.stats().spilled_values, fresh.stats().spilled_values);
    }
}

#[test]
fn parallel_allocation_matches_sequential() {
    let funcs = generate::functions(7, 64, SHAPE);
    let options = RegAllocOptions::default();
    let module = allocate_module(funcs.clone(), isa::debug3reg(), &options, Some(4)).unwrap();

    assert_eq!(module.failures().count(), 0);

    for (func, result) in funcs.iter().zip(module.results()) {
        let alone = allocate(func, isa::debug3reg(), &options).unwrap();
        let alloc = result.as_ref().unwrap();

        assert_eq!(alloc.edits(), alone.edits());
        assert_eq!(alloc.edges(), alone.edges());
        assert_eq!(alloc.spill_area_size(), alone.spill_area_size());
    }
}
