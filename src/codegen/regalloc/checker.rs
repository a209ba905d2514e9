//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2023 Evan Cox <evanacox00@gmail.com>. All rights reserved.      //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

//! Verifies an [`Allocation`] by running the function symbolically.
//!
//! Every block is executed on a map from locations to the value they hold,
//! starting from the locations its live-in values are supposed to be in.
//! The state at the end of each block is then pushed through the moves of
//! every outgoing edge and compared against what the successor expects.

use crate::codegen::regalloc::{
    Allocation, Edit, EdgePlacement, InsertPoint, Liveness, Location, ProgramPoint,
    RegAllocError,
};
use crate::codegen::{
    FixedCollector, Function, Inst, MIRBlock, MachInst, PReg, RegCollector, RegisterInfo, VReg,
};
use crate::utility::SaHashMap;
use log::trace;

type State = SaHashMap<Location, VReg>;

fn fail(message: String) -> RegAllocError {
    RegAllocError::CheckFailed(message)
}

fn apply(state: &mut State, edit: &Edit) {
    match state.get(&edit.from).copied() {
        Some(value) => {
            state.insert(edit.to, value);
        }
        None => {
            state.remove(&edit.to);
        }
    }
}

fn expect(
    state: &State,
    loc: Location,
    vreg: VReg,
    context: impl FnOnce() -> String,
) -> Result<(), RegAllocError> {
    match state.get(&loc) {
        Some(&held) if held == vreg => Ok(()),
        Some(&held) => Err(fail(format!(
            "{} expects {vreg} in {loc} but it holds {held}",
            context()
        ))),
        None => Err(fail(format!(
            "{} expects {vreg} in {loc} but it holds nothing",
            context()
        ))),
    }
}

/// Checks that `alloc` is a correct allocation of `func`.
///
/// This catches a value being read from a location that holds something
/// else, a value being clobbered by a call while it's still needed, and
/// edges whose moves don't deliver what their successor expects.
pub fn check_allocation<F: Function>(
    func: &F,
    live: &Liveness,
    alloc: &Allocation,
    info: &RegisterInfo,
) -> Result<(), RegAllocError> {
    let mut uses = RegCollector::<8>::new();
    let mut defs = RegCollector::<4>::new();
    let mut fixed = FixedCollector::new();

    for block in func.blocks() {
        let mut state = entry_state(func, live, alloc, block)?;

        for inst in func.block_insts(block).iter() {
            let data = func.inst(inst);

            for edit in alloc.edits_at(InsertPoint::Before(inst)) {
                apply(&mut state, edit);
            }

            for edge in alloc.edges() {
                if edge.placement == EdgePlacement::EndOfPred(inst) {
                    edge.moves.iter().for_each(|edit| apply(&mut state, edit));
                }
            }

            uses.clear();
            defs.clear();
            fixed.clear();
            data.uses(&mut uses);
            data.defs(&mut defs);
            data.fixed_uses(&mut fixed);

            for &vreg in uses.iter() {
                let reg = operand(alloc, inst, vreg)?;
                let is_pinned = fixed.iter().any(|&(v, _)| v == vreg);

                if is_pinned && !fixed.contains(&(vreg, reg)) {
                    return Err(fail(format!(
                        "{inst} reads {vreg} from {reg}, which it is not pinned to"
                    )));
                }

                expect(&state, Location::Reg(reg), vreg, || format!("{inst}"))?;
            }

            // every pinned register has to hold its value, not only the operand's
            for &(vreg, pinned) in fixed.iter() {
                expect(&state, Location::Reg(pinned), vreg, || format!("{inst}"))?;
            }

            if data.is_call() {
                state.retain(|loc, _| !matches!(loc, Location::Reg(r) if info.is_caller_saved(*r)));
            }

            fixed.clear();
            data.fixed_defs(&mut fixed);

            for &vreg in defs.iter() {
                let reg = operand(alloc, inst, vreg)?;

                if let Some(&(_, pinned)) = fixed.iter().find(|(v, _)| *v == vreg) {
                    if pinned != reg {
                        return Err(fail(format!("{inst} writes {vreg} to {pinned}, not {reg}")));
                    }
                }

                state.insert(Location::Reg(reg), vreg);
            }

            for edit in alloc.edits_at(InsertPoint::After(inst)) {
                apply(&mut state, edit);
            }
        }

        for (k, &succ) in func.block_succs(block).iter().enumerate() {
            check_edge(func, live, alloc, block, k, succ, &state)?;
        }
    }

    trace!("allocation of `{}` checked", func.name());

    Ok(())
}

fn operand(alloc: &Allocation, inst: Inst, vreg: VReg) -> Result<PReg, RegAllocError> {
    alloc
        .assignment(inst, vreg)
        .ok_or_else(|| fail(format!("{vreg} has no register at {inst}")))
}

// everything a block may assume about its entry, after any edge moves ran
fn entry_state<F: Function>(
    func: &F,
    live: &Liveness,
    alloc: &Allocation,
    block: MIRBlock,
) -> Result<State, RegAllocError> {
    let entry = ProgramPoint::block_entry(func, block);
    let mut state = State::default();
    let place = |state: &mut State, loc: Location, vreg: VReg| -> Result<(), RegAllocError> {
        match state.insert(loc, vreg) {
            Some(other) if other != vreg => Err(fail(format!(
                "{other} and {vreg} are both in {loc} at the start of {block}"
            ))),
            _ => Ok(()),
        }
    };

    for vreg in live.live_in(block).keys() {
        let home = alloc
            .home(vreg)
            .ok_or_else(|| fail(format!("{vreg} is live into {block} but has no home")))?;

        if let Some(loc) = home.location_at(entry) {
            place(&mut state, loc, vreg)?;
        }

        if let (true, Some(slot)) = (home.is_spilled(), home.slot) {
            place(&mut state, Location::Stack(slot), vreg)?;
        }
    }

    for &param in func.block_params(block) {
        if let Some(loc) = alloc.location_at(param, entry) {
            place(&mut state, loc, param)?;
        }
    }

    Ok(state)
}

fn check_edge<F: Function>(
    func: &F,
    live: &Liveness,
    alloc: &Allocation,
    pred: MIRBlock,
    k: usize,
    succ: MIRBlock,
    exit: &State,
) -> Result<(), RegAllocError> {
    let entry = ProgramPoint::block_entry(func, succ);
    let mut state = exit.clone();
    let context = || format!("the edge {pred} -> {succ}");

    if let Some(edge) = alloc.edges().iter().find(|e| e.from == pred && e.succ_index == k) {
        if !matches!(edge.placement, EdgePlacement::EndOfPred(_)) {
            edge.moves.iter().for_each(|edit| apply(&mut state, edit));
        }
    }

    for vreg in live.live_in(succ).keys() {
        let Some(home) = alloc.home(vreg) else {
            return Err(fail(format!("{vreg} is live into {succ} but has no home")));
        };

        if let Some(loc) = home.location_at(entry) {
            expect(&state, loc, vreg, context)?;
        }

        if let (true, Some(slot)) = (home.is_spilled(), home.slot) {
            expect(&state, Location::Stack(slot), vreg, context)?;
        }
    }

    for (&param, &arg) in func.block_params(succ).iter().zip(func.branch_args(pred, k)) {
        if let Some(loc) = alloc.location_at(param, entry) {
            expect(&state, loc, arg, context)?;
        }
    }

    Ok(())
}
