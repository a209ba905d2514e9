//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2023 Evan Cox <evanacox00@gmail.com>. All rights reserved.      //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use garnet::arena::ArenaKey;
use garnet::codegen::regalloc::*;
use garnet::codegen::*;

fn two_regs() -> RegisterInfo {
    RegisterInfo::builder("two")
        .caller_saved(PReg::int(0), "a")
        .caller_saved(PReg::int(1), "b")
        .scratch(PReg::int(2), "t")
        .caller_saved(PReg::float(0), "fa")
        .caller_saved(PReg::float(1), "fb")
        .scratch(PReg::float(2), "ft")
        .build()
}

fn checked() -> RegAllocOptions {
    RegAllocOptions {
        verify: true,
        ..RegAllocOptions::default()
    }
}

fn inst(n: usize) -> Inst {
    Inst::key_new(n)
}

#[test]
fn freed_registers_are_reused() {
    let mut b = FunctionBuilder::new("reuse");
    let bb0 = b.create_block();
    let v1 = b.new_vreg(RegClass::Int);
    let v2 = b.new_vreg(RegClass::Int);
    let v3 = b.new_vreg(RegClass::Int);

    b.switch_to(bb0);
    b.push(TestInst::def(v1));
    b.push(TestInst::def(v2));
    b.push(TestInst::op(&[v3], &[v2]));
    b.push(TestInst::use_of(v3));
    b.push(TestInst::nop());
    b.push(TestInst::ret(&[v1]));

    let func = b.build();
    let alloc = allocate(&func, &two_regs(), &checked()).unwrap();

    let r1 = alloc.assignment(inst(0), v1).unwrap();
    let r2 = alloc.assignment(inst(1), v2).unwrap();
    let r3 = alloc.assignment(inst(2), v3).unwrap();

    assert_ne!(r1, r2);
    assert_eq!(r2, r3);
    assert_eq!(alloc.assignment(inst(5), v1), Some(r1));
    assert_eq!(alloc.stats().spilled_values, 0);
    assert!(alloc.edits().is_empty());
}

#[test]
fn the_value_ending_furthest_away_is_spilled() {
    let mut b = FunctionBuilder::new("furthest");
    let bb0 = b.create_block();
    let x = b.new_vreg(RegClass::Int);
    let y = b.new_vreg(RegClass::Int);
    let z = b.new_vreg(RegClass::Int);

    b.switch_to(bb0);
    b.push(TestInst::def(x));
    b.push(TestInst::def(y));
    b.push(TestInst::def(z));
    b.push(TestInst::op(&[], &[y, z]));
    b.push(TestInst::use_of(z));
    b.push(TestInst::ret(&[x]));

    let func = b.build();
    let alloc = allocate(&func, &two_regs(), &checked()).unwrap();

    assert_eq!(alloc.stats().spilled_values, 1);
    assert!(alloc.home(x).unwrap().is_spilled());
    assert!(!alloc.home(y).unwrap().is_spilled());
    assert!(!alloc.home(z).unwrap().is_spilled());
    assert_eq!(alloc.stats().spill_stores, 1);
    assert_eq!(alloc.stats().reloads, 1);
    assert_eq!(
        alloc.emit_before(inst(5))[0].kind,
        EditKind::Reload,
        "{alloc}"
    );
}

#[test]
fn non_critical_edges_get_a_single_move() {
    let mut b = FunctionBuilder::new("edge");
    let bb0 = b.create_block();
    let bb1 = b.create_block();
    let x = b.new_vreg(RegClass::Int);
    let p = b.append_block_param(bb1, RegClass::Int);

    b.switch_to(bb0);
    b.push(TestInst::def(x).with_fixed_def(x, PReg::int(0)));
    b.push(TestInst::jump());
    b.branch_to(bb1, &[x]);

    b.switch_to(bb1);
    b.push(TestInst::ret(&[]).with_fixed_use(p, PReg::int(1)));

    let func = b.build();
    let alloc = allocate(&func, isa::debug3reg(), &checked()).unwrap();

    assert_eq!(alloc.edges().len(), 1);

    let edge = &alloc.edges()[0];

    assert_eq!((edge.from, edge.to), (bb0, bb1));
    assert_eq!(edge.placement, EdgePlacement::EndOfPred(inst(1)));
    assert_eq!(edge.moves.len(), 1);
    assert_eq!(edge.moves[0].from, Location::Reg(PReg::int(0)));
    assert_eq!(edge.moves[0].to, Location::Reg(PReg::int(1)));
    assert_eq!(alloc.split_edges().count(), 0);
    assert_eq!(alloc.emit_before(inst(1)).len(), 1);
}

fn critical_edge() -> (MIRFunction<TestInst>, MIRBlock, MIRBlock) {
    let mut b = FunctionBuilder::new("critical");
    let bb0 = b.create_block();
    let bb1 = b.create_block();
    let bb2 = b.create_block();
    let x = b.new_vreg(RegClass::Int);
    let c = b.new_vreg(RegClass::Int);
    let y = b.new_vreg(RegClass::Int);
    let p = b.append_block_param(bb2, RegClass::Int);

    b.switch_to(bb0);
    b.push(TestInst::def(x).with_fixed_def(x, PReg::int(0)));
    b.push(TestInst::def(c));
    b.push(TestInst::branch(&[c]));
    b.branch_to(bb2, &[x]);
    b.branch_to(bb1, &[]);

    b.switch_to(bb1);
    b.push(TestInst::def(y));
    b.push(TestInst::jump());
    b.branch_to(bb2, &[y]);

    b.switch_to(bb2);
    b.push(TestInst::ret(&[]).with_fixed_use(p, PReg::int(1)));

    (b.build(), bb0, bb2)
}

#[test]
fn critical_edges_are_split() {
    let (func, bb0, bb2) = critical_edge();
    let alloc = allocate(&func, isa::debug3reg(), &checked()).unwrap();
    let split: Vec<_> = alloc.split_edges().collect();

    assert_eq!(split.len(), 1);
    assert_eq!((split[0].from, split[0].to), (bb0, bb2));
    assert_eq!(split[0].succ_index, 0);
    assert_eq!(split[0].moves.len(), 1);
    assert_eq!(split[0].moves[0].from, Location::Reg(PReg::int(0)));
    assert_eq!(split[0].moves[0].to, Location::Reg(PReg::int(1)));
    assert_eq!(alloc.stats().split_edges, 1);
}

#[test]
fn critical_edges_can_be_errors() {
    let (func, bb0, bb2) = critical_edge();
    let options = RegAllocOptions {
        split_critical_edges: false,
        ..checked()
    };

    assert_eq!(
        allocate(&func, isa::debug3reg(), &options).unwrap_err(),
        RegAllocError::InvalidEdge(bb0, bb2)
    );
}

#[test]
fn edge_cycles_leave_callee_saved_registers_alone() {
    let info = RegisterInfo::builder("no-scratch")
        .caller_saved(PReg::int(0), "a")
        .caller_saved(PReg::int(1), "b")
        .callee_saved(PReg::int(2), "s")
        .caller_saved(PReg::float(0), "fa")
        .caller_saved(PReg::float(1), "fb")
        .build();

    let mut b = FunctionBuilder::new("swap");
    let entry = b.create_block();
    let body = b.create_block();
    let exit = b.create_block();
    let x = b.new_vreg(RegClass::Int);
    let y = b.new_vreg(RegClass::Int);
    let p = b.append_block_param(body, RegClass::Int);
    let q = b.append_block_param(body, RegClass::Int);

    b.switch_to(entry);
    b.push(TestInst::def(x));
    b.push(TestInst::def(y));
    b.push(TestInst::jump());
    b.branch_to(body, &[x, y]);

    b.switch_to(body);
    b.set_loop_depth(body, 1);
    b.push(TestInst::op(&[], &[p, q]));
    b.push(TestInst::branch(&[p]));
    b.branch_to(body, &[q, p]);
    b.branch_to(exit, &[]);

    b.switch_to(exit);
    b.push(TestInst::ret(&[]));

    let alloc = allocate(&b.build(), &info, &checked()).unwrap();

    assert!(alloc.stats().edge_moves > 0, "{alloc}");

    for edge in alloc.edges() {
        for edit in edge.moves.iter() {
            if let Location::Reg(reg) = edit.to {
                assert!(
                    !info.is_callee_saved(reg) || alloc.callee_saved_used().has(reg),
                    "{reg} is written on {} -> {} but never saved\n{alloc}",
                    edge.from,
                    edge.to
                );
            }
        }
    }
}

#[test]
fn values_survive_calls() {
    let mut b = FunctionBuilder::new("calls");
    let bb0 = b.create_block();
    let vs: Vec<_> = (0..4).map(|_| b.new_vreg(RegClass::Int)).collect();
    let r = b.new_vreg(RegClass::Int);

    b.switch_to(bb0);

    for &v in vs.iter() {
        b.push(TestInst::def(v));
    }

    b.push(
        TestInst::call(&[r], &[vs[0]])
            .with_fixed_use(vs[0], PReg::int(0))
            .with_fixed_def(r, PReg::int(0)),
    );
    b.push(TestInst::op(&[], &vs[1..]));
    b.push(TestInst::ret(&[r, vs[0]]));

    let func = b.build();

    for info in [isa::debug3reg(), isa::amd64(), isa::arm64()] {
        let alloc = allocate(&func, info, &checked()).unwrap();

        // the only callee-saved register on debug3reg can't hold everything
        if std::ptr::eq(info, isa::debug3reg()) {
            assert!(alloc.stats().call_saves > 0 || alloc.stats().spilled_values > 0);
        } else {
            assert_eq!(alloc.stats().spilled_values, 0, "{}", info.name());
        }

        assert!(!alloc.callee_saved_used().is_empty());
    }
}

#[test]
fn one_value_can_be_pinned_to_several_registers() {
    let mut b = FunctionBuilder::new("twice");
    let bb0 = b.create_block();
    let x = b.new_vreg(RegClass::Int);
    let (rax, rsi, rdi) = (PReg::int(0), PReg::int(6), PReg::int(7));

    b.switch_to(bb0);
    b.push(TestInst::def(x).with_fixed_def(x, rax));
    b.push(
        TestInst::call(&[], &[x])
            .with_fixed_use(x, rdi)
            .with_fixed_use(x, rsi),
    );
    b.push(TestInst::ret(&[]));

    let alloc = allocate(&b.build(), isa::amd64(), &checked()).unwrap();
    let home = alloc.location_at(x, ProgramPoint::use_of(inst(1)));

    for preg in [rdi, rsi] {
        let reaches = home == Some(Location::Reg(preg))
            || alloc
                .emit_before(inst(1))
                .iter()
                .any(|edit| edit.to == Location::Reg(preg));

        assert!(reaches, "x never reaches {preg}\n{alloc}");
    }
}

#[test]
fn loops_carry_values_around_the_back_edge() {
    let mut b = FunctionBuilder::new("loop");
    let entry = b.create_block();
    let header = b.create_block();
    let exit = b.create_block();
    let n = b.new_vreg(RegClass::Int);
    let zero = b.new_vreg(RegClass::Int);
    let i = b.append_block_param(header, RegClass::Int);
    let next = b.new_vreg(RegClass::Int);
    let f = b.new_vreg(RegClass::Float);

    b.switch_to(entry);
    b.push(TestInst::def(n));
    b.push(TestInst::def(zero));
    b.push(TestInst::def(f));
    b.push(TestInst::jump());
    b.branch_to(header, &[zero]);

    b.switch_to(header);
    b.set_loop_depth(header, 1);
    b.push(TestInst::op(&[next], &[i]));
    b.push(TestInst::call(&[], &[]));
    b.push(TestInst::branch(&[next, n]));
    b.branch_to(header, &[next]);
    b.branch_to(exit, &[]);

    b.switch_to(exit);
    b.push(TestInst::ret(&[n, f]));

    let func = b.build();

    for info in [isa::debug3reg(), isa::amd64()] {
        let alloc = allocate(&func, info, &checked()).unwrap();

        assert!(alloc.home(n).is_some());
        assert!(alloc.home(f).is_some());
    }

    let live = Liveness::compute(&func).unwrap();

    assert!(live.live_in(header).contains(n));
    assert!(live.live_in(header).contains(f));
    assert!(!live.live_in(header).contains(i));
}

#[test]
fn malformed_functions_are_rejected() {
    let mut b = FunctionBuilder::new("undefined");
    let bb0 = b.create_block();
    let v = b.new_vreg(RegClass::Int);

    b.switch_to(bb0);
    b.push(TestInst::ret(&[v]));

    let func = b.build();

    assert_eq!(
        allocate(&func, isa::amd64(), &checked()).unwrap_err(),
        RegAllocError::UndefinedUse(v, inst(0))
    );

    let mut b = FunctionBuilder::new("twice");
    let bb0 = b.create_block();
    let v = b.new_vreg(RegClass::Int);

    b.switch_to(bb0);
    b.push(TestInst::def(v));
    b.push(TestInst::def(v));
    b.push(TestInst::ret(&[v]));

    assert_eq!(
        allocate(&b.build(), isa::amd64(), &checked()).unwrap_err(),
        RegAllocError::MultipleDefinitions(v)
    );
}

#[test]
fn the_dump_names_every_home() {
    let mut b = FunctionBuilder::new("dump");
    let bb0 = b.create_block();
    let x = b.new_vreg(RegClass::Int);

    b.switch_to(bb0);
    b.push(TestInst::def(x));
    b.push(TestInst::ret(&[x]));

    let alloc = allocate(&b.build(), isa::amd64(), &checked()).unwrap();
    let dump = alloc.to_string();

    assert!(dump.starts_with("allocation for `dump`:"));
    assert!(dump.contains(&x.to_string()));
    assert!(dump.ends_with("spill area: 0 bytes, 0 values spilled"));
}
