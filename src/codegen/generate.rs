//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2023 Evan Cox <evanacox00@gmail.com>. All rights reserved.      //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

//! Random, but always valid, functions for stress testing the allocator.
//!
//! Every generated function passes validation: values are defined before
//! they are used on every path, branch arguments match their parameters,
//! and pinned operands never ask for one register twice at the same point.

use crate::codegen::{
    FunctionBuilder, MIRBlock, MIRFunction, MachInst, PReg, RegClass, TestInst, VReg,
};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

/// How large generated functions can get, and what they may contain.
#[derive(Copy, Clone, Debug)]
pub struct Shape {
    /// The most blocks a function can have.
    pub max_blocks: usize,
    /// The most instructions (not counting terminators) a block can have.
    pub max_values: usize,
    /// Whether operands may be pinned to physical registers.
    pub fixed_operands: bool,
}

impl Default for Shape {
    fn default() -> Self {
        Self {
            max_blocks: 8,
            max_values: 12,
            fixed_operands: true,
        }
    }
}

/// Generates `count` functions from `seed`. The same seed always gives
/// the same functions.
pub fn functions(seed: u64, count: usize, shape: Shape) -> Vec<MIRFunction<TestInst>> {
    let mut rng = StdRng::seed_from_u64(seed);

    (0..count)
        .map(|i| function(&mut rng, format!("f{i}"), shape))
        .collect()
}

/// Generates a single function named `name`.
///
/// Every block falls through to the next one, so everything is reachable
/// and values defined in the entry block can be used anywhere. Blocks after
/// the first may also be branched to from anywhere, which makes loops and
/// critical edges.
pub fn function<R: Rng>(rng: &mut R, name: String, shape: Shape) -> MIRFunction<TestInst> {
    let mut b = FunctionBuilder::new(name);
    let n = rng.gen_range(1..=shape.max_blocks.max(1));
    let blocks: Vec<MIRBlock> = (0..n).map(|_| b.create_block()).collect();
    let mut params = vec![Vec::new(); n];

    for (i, &block) in blocks.iter().enumerate() {
        for _ in 0..rng.gen_range(0..3) {
            let class = random_class(rng);

            params[i].push(b.append_block_param(block, class));
        }
    }

    let mut global = params[0].clone();

    for (i, &block) in blocks.iter().enumerate() {
        let mut pool = if i == 0 {
            Vec::new()
        } else {
            global.clone()
        };

        pool.extend(params[i].iter().copied());
        b.switch_to(block);

        for _ in 0..rng.gen_range(1..=shape.max_values.max(1)) {
            let width = rng.gen_range(0..3);
            let uses = pick(rng, &pool, width);
            let roll: u32 = rng.gen_range(0..10);

            let (inst, def) = if roll == 0 {
                let def = b.new_vreg(RegClass::Int);

                (TestInst::call(&[def], &uses), Some(def))
            } else if roll == 1 && !pool.is_empty() {
                let from = pool[rng.gen_range(0..pool.len())];
                let to = b.new_vreg(from.class());

                (TestInst::mov(to, from), Some(to))
            } else if roll == 2 && !uses.is_empty() {
                (TestInst::op(&[], &uses), None)
            } else {
                let def = b.new_vreg(random_class(rng));

                (TestInst::op(&[def], &uses), Some(def))
            };

            let inst = if shape.fixed_operands {
                pin(rng, inst, &uses, def)
            } else {
                inst
            };

            pool.extend(def);
            b.push(inst);
        }

        if i == 0 {
            global = pool.clone();
        }

        if i + 1 == n {
            let uses = pick(rng, &pool, 2);

            b.push(TestInst::ret(&uses));

            continue;
        }

        let mut targets = vec![i + 1];

        if n > 2 && !pool.is_empty() && rng.gen_bool(0.5) {
            let other = rng.gen_range(1..n);

            if other != i + 1 {
                targets.push(other);
            }
        }

        let args: Vec<Vec<VReg>> = targets
            .iter()
            .map(|&t| {
                params[t]
                    .iter()
                    .map(|p| {
                        let same: Vec<_> = pool.iter().filter(|v| v.class() == p.class()).collect();

                        match same.choose(rng) {
                            Some(&&v) => v,
                            None => {
                                let v = b.new_vreg(p.class());

                                b.push(TestInst::def(v));

                                v
                            }
                        }
                    })
                    .collect()
            })
            .collect();

        if targets.len() == 1 {
            b.push(TestInst::jump());
        } else {
            let cond = pick(rng, &pool, 1);

            b.push(TestInst::branch(&cond));
        }

        for (&t, args) in targets.iter().zip(args.iter()) {
            b.branch_to(blocks[t], args);
        }
    }

    b.build()
}

fn random_class<R: Rng>(rng: &mut R) -> RegClass {
    if rng.gen_bool(0.75) {
        RegClass::Int
    } else {
        RegClass::Float
    }
}

fn pick<R: Rng>(rng: &mut R, pool: &[VReg], n: usize) -> Vec<VReg> {
    pool.choose_multiple(rng, n).copied().collect()
}

// only the first two registers of a class are ever pinned, every target
// hands those out and lets calls clobber them
const PINNABLE: usize = 2;

// pins some of the operands of `inst`, never giving one register to two
// different values at the same point
fn pin<R: Rng>(rng: &mut R, mut inst: TestInst, uses: &[VReg], def: Option<VReg>) -> TestInst {
    // a single argument passed twice, like `f(x, x)`
    if let [only] = uses {
        if inst.is_call() && rng.gen_ratio(1, 4) {
            for number in 0..PINNABLE {
                inst = inst.with_fixed_use(*only, PReg::with_class(only.class(), number));
            }

            return pin_def(rng, inst, def);
        }
    }

    let mut taken = [[false; PINNABLE]; 2];

    for &used in uses {
        let taken = &mut taken[used.class().index()];

        if let Some(number) = (0..PINNABLE).find(|&n| !taken[n]) {
            if rng.gen_ratio(1, 3) {
                taken[number] = true;
                inst = inst.with_fixed_use(used, PReg::with_class(used.class(), number));
            }
        }
    }

    pin_def(rng, inst, def)
}

fn pin_def<R: Rng>(rng: &mut R, inst: TestInst, def: Option<VReg>) -> TestInst {
    match def {
        Some(def) if rng.gen_ratio(1, 3) => {
            let number = rng.gen_range(0..PINNABLE);

            inst.with_fixed_def(def, PReg::with_class(def.class(), number))
        }
        _ => inst,
    }
}
