//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2023 Evan Cox <evanacox00@gmail.com>. All rights reserved.      //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use crate::arena::SecondaryMap;
use crate::codegen::regalloc::lsra::LinearScan;
use crate::codegen::regalloc::moves::{ParallelMoves, Temporaries};
use crate::codegen::regalloc::{
    AllocStats, Allocation, EdgeMoves, EdgePlacement, Edit, EditKind, Home, InsertPoint,
    Liveness, Location, ProgramPoint, RegAllocError,
};
use crate::codegen::{
    FixedCollector, Function, Inst, MIRBlock, MachInst, PReg, RegAllocOptions, RegClass,
    RegCollector, RegSet, RegisterInfo, VReg,
};
use log::{debug, trace};

/// Turns the decisions of the scan into an [`Allocation`]: the register of
/// every operand, the edits around instructions, and the moves on edges.
#[derive(Debug, Default)]
pub(crate) struct Resolver {
    parallel: [ParallelMoves; 2],
    saves: Vec<(Inst, VReg)>,
    uses: RegCollector<8>,
    defs: RegCollector<4>,
    fixed_uses: FixedCollector,
    fixed_defs: FixedCollector,
}

struct Output {
    operands: Vec<(VReg, PReg)>,
    operand_starts: Vec<u32>,
    edits: Vec<(InsertPoint, Edit)>,
    edges: Vec<EdgeMoves>,
    stats: AllocStats,
}

impl Output {
    fn edit(
        &mut self,
        point: InsertPoint,
        kind: EditKind,
        from: Location,
        to: Location,
        class: RegClass,
    ) {
        if from == to {
            return;
        }

        match kind {
            EditKind::Spill => self.stats.spill_stores += 1,
            EditKind::Reload => self.stats.reloads += 1,
            EditKind::Move => self.stats.fixed_moves += 1,
            EditKind::Save | EditKind::Restore => self.stats.call_saves += 1,
            EditKind::EdgeMove => self.stats.edge_moves += 1,
        }

        self.edits.push((point, Edit::new(kind, from, to, class)));
    }
}

fn home_of(scan: &LinearScan, vreg: VReg) -> Home {
    let state = scan.state(vreg);

    Home {
        reg: state.reg,
        slot: state.slot,
        spilled_at: state.spilled_at,
    }
}

fn missing(what: &str, vreg: VReg, point: ProgramPoint) -> RegAllocError {
    RegAllocError::CheckFailed(format!("{vreg} has no {what} at {point}"))
}

impl Resolver {
    pub(crate) fn resolve<F: Function>(
        &mut self,
        func: &F,
        live: &Liveness,
        scan: &mut LinearScan,
        info: &RegisterInfo,
        options: &RegAllocOptions,
    ) -> Result<Allocation, RegAllocError> {
        let mut homes = SecondaryMap::with_capacity(func.vreg_capacity(), None);
        let mut out = Output {
            operands: Vec::new(),
            operand_starts: Vec::with_capacity(func.num_insts() + 1),
            edits: Vec::new(),
            edges: Vec::new(),
            stats: AllocStats::default(),
        };

        self.saves.clear();

        for interval in live.intervals() {
            let vreg = interval.vreg();
            let home = home_of(scan, vreg);

            homes[vreg] = Some(home);

            // a value in a caller-saved register has to be saved around every
            // call it is still in that register after
            for &call in interval.crossed_calls() {
                if let Some(Location::Reg(reg)) = home.location_at(ProgramPoint::def_of(call)) {
                    if info.is_caller_saved(reg) {
                        self.saves.push((call, vreg));
                    }
                }
            }
        }

        self.saves.sort_unstable();
        out.stats.values = live.intervals().len();
        out.stats.spilled_values = scan.spilled().len();

        for block in func.blocks() {
            self.resolve_block(func, block, scan, &homes, &mut out)?;
        }

        out.operand_starts.push(out.operands.len() as u32);

        debug_assert!(out.edits.windows(2).all(|w| w[0].0 <= w[1].0));

        for block in func.blocks() {
            self.resolve_edges(func, block, live, scan, &homes, info, options, &mut out)?;
        }

        let allocation = Allocation {
            function: func.name().to_owned(),
            operands: out.operands,
            operand_starts: out.operand_starts,
            homes,
            edits: out.edits,
            edges: out.edges,
            loop_depths: func.blocks().map(|b| func.loop_depth(b)).collect(),
            spill_area_size: scan.slots().size(),
            callee_saved_used: scan.callee_saved_used(),
            stats: out.stats,
        };

        debug!(
            "resolved `{}`: {} edits, {} edge moves, {} split edges",
            func.name(),
            allocation.edits.len(),
            allocation.stats.edge_moves,
            allocation.stats.split_edges
        );

        Ok(allocation)
    }

    fn resolve_block<F: Function>(
        &mut self,
        func: &F,
        block: MIRBlock,
        scan: &LinearScan,
        homes: &SecondaryMap<VReg, Option<Home>>,
        out: &mut Output,
    ) -> Result<(), RegAllocError> {
        let range = func.block_insts(block);
        let home = |vreg: VReg| homes.get(vreg).unwrap_or_default();

        // parameters that are evicted later on still have to reach their slot
        for &param in func.block_params(block) {
            let h = home(param);
            let entry = ProgramPoint::use_of(range.first());

            if let (Some(Location::Reg(reg)), Some(slot)) = (h.location_at(entry), h.slot) {
                if h.is_spilled() {
                    out.edit(
                        InsertPoint::Before(range.first()),
                        EditKind::Spill,
                        Location::Reg(reg),
                        Location::Stack(slot),
                        param.class(),
                    );
                }
            }
        }

        for inst in range.iter() {
            let data = func.inst(inst);
            let before = InsertPoint::Before(inst);
            let after = InsertPoint::After(inst);
            let use_point = ProgramPoint::use_of(inst);
            let def_point = ProgramPoint::def_of(inst);

            self.uses.clear();
            self.defs.clear();
            self.fixed_uses.clear();
            self.fixed_defs.clear();
            data.uses(&mut self.uses);
            data.defs(&mut self.defs);
            data.fixed_uses(&mut self.fixed_uses);
            data.fixed_defs(&mut self.fixed_defs);
            self.uses.sort_unstable();
            self.uses.dedup();

            out.operand_starts.push(out.operands.len() as u32);

            let saves_begin = self.saves.partition_point(|&(c, _)| c < inst);
            let saves_end = self.saves.partition_point(|&(c, _)| c <= inst);

            for &(_, vreg) in self.saves[saves_begin..saves_end].iter() {
                let h = home(vreg);

                // a spilled value already has an up-to-date copy in its slot
                if h.is_spilled() {
                    continue;
                }

                let (Some(reg), Some(slot)) = (h.reg, h.slot) else {
                    return Err(missing("save slot", vreg, use_point));
                };

                out.edit(
                    before,
                    EditKind::Save,
                    Location::Reg(reg),
                    Location::Stack(slot),
                    vreg.class(),
                );
            }

            for &vreg in self.uses.iter() {
                let mut pinned = self
                    .fixed_uses
                    .iter()
                    .filter(|(v, _)| *v == vreg)
                    .map(|(_, p)| *p)
                    .peekable();

                let reg = match (pinned.peek().copied(), scan.reload_reg(inst, vreg)) {
                    (Some(first), _) => {
                        let from = home(vreg)
                            .location_at(use_point)
                            .ok_or_else(|| missing("location", vreg, use_point))?;
                        let kind = if from.is_stack() {
                            EditKind::Reload
                        } else {
                            EditKind::Move
                        };

                        // `f(x, x)` can pin one value to several registers
                        for preg in pinned {
                            out.edit(before, kind, from, Location::Reg(preg), vreg.class());
                        }

                        first
                    }
                    (None, Some(reg)) => {
                        let slot = home(vreg)
                            .slot
                            .ok_or_else(|| missing("spill slot", vreg, use_point))?;

                        out.edit(
                            before,
                            EditKind::Reload,
                            Location::Stack(slot),
                            Location::Reg(reg),
                            vreg.class(),
                        );

                        reg
                    }
                    (None, None) => match home(vreg).location_at(use_point) {
                        Some(Location::Reg(reg)) => reg,
                        _ => return Err(missing("register", vreg, use_point)),
                    },
                };

                out.operands.push((vreg, reg));
            }

            for &vreg in self.defs.iter() {
                let h = home(vreg);
                let fixed = self
                    .fixed_defs
                    .iter()
                    .find(|(v, _)| *v == vreg)
                    .map(|(_, p)| *p);
                let written = match (fixed, scan.def_reg(inst, vreg)) {
                    (Some(preg), _) => {
                        if let Some(Location::Reg(reg)) = h.location_at(def_point) {
                            out.edit(
                                after,
                                EditKind::Move,
                                Location::Reg(preg),
                                Location::Reg(reg),
                                vreg.class(),
                            );
                        }

                        preg
                    }
                    (None, Some(reg)) => reg,
                    (None, None) => match h.location_at(def_point) {
                        Some(Location::Reg(reg)) => reg,
                        _ => return Err(missing("register", vreg, def_point)),
                    },
                };

                // anything that is ever spilled is stored right after it is defined
                if h.is_spilled() {
                    let slot = h.slot.ok_or_else(|| missing("spill slot", vreg, def_point))?;

                    out.edit(
                        after,
                        EditKind::Spill,
                        Location::Reg(written),
                        Location::Stack(slot),
                        vreg.class(),
                    );
                }

                out.operands.push((vreg, written));
            }

            for &(_, vreg) in self.saves[saves_begin..saves_end].iter() {
                let h = home(vreg);

                if let (Some(reg), Some(slot)) = (h.reg, h.slot) {
                    out.edit(
                        after,
                        EditKind::Restore,
                        Location::Stack(slot),
                        Location::Reg(reg),
                        vreg.class(),
                    );
                }
            }
        }

        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn resolve_edges<F: Function>(
        &mut self,
        func: &F,
        block: MIRBlock,
        live: &Liveness,
        scan: &mut LinearScan,
        homes: &SecondaryMap<VReg, Option<Home>>,
        info: &RegisterInfo,
        options: &RegAllocOptions,
        out: &mut Output,
    ) -> Result<(), RegAllocError> {
        let exit = ProgramPoint::block_exit(func, block);
        let home = |vreg: VReg| homes.get(vreg).unwrap_or_default();

        for (k, &succ) in func.block_succs(block).iter().enumerate() {
            let entry = ProgramPoint::block_entry(func, succ);
            let mut occupied = RegSet::EMPTY;

            for parallel in self.parallel.iter_mut() {
                parallel.clear();
            }

            let mut add = |parallel: &mut [ParallelMoves; 2],
                           vreg: VReg,
                           from: VReg|
             -> Result<(), RegAllocError> {
                let src = home(from)
                    .location_at(exit)
                    .ok_or_else(|| missing("location", from, exit))?;
                let dst = home(vreg)
                    .location_at(entry)
                    .ok_or_else(|| missing("location", vreg, entry))?;

                for loc in [src, dst] {
                    if let Location::Reg(reg) = loc {
                        occupied.add(reg);
                    }
                }

                parallel[vreg.class().index()].add(src, dst);

                Ok(())
            };

            for vreg in live.live_in(succ).keys() {
                let h = home(vreg);

                // the slot of a spilled value is valid everywhere the value is live
                if h.is_spilled() && h.location_at(entry) == h.slot.map(Location::Stack) {
                    continue;
                }

                add(&mut self.parallel, vreg, vreg)?;
            }

            for (&param, &arg) in func
                .block_params(succ)
                .iter()
                .zip(func.branch_args(block, k))
            {
                add(&mut self.parallel, param, arg)?;
            }

            if self.parallel.iter().all(|p| p.is_empty()) {
                continue;
            }

            let placement = self.placement(func, block, succ, options)?;
            let mut moves = Vec::new();

            for class in RegClass::ALL {
                // a callee-saved temporary would have to be saved by the prologue
                let free = RegSet::from_regs(info.allocatable(class))
                    .intersection(info.caller_saved())
                    .difference(occupied);
                let temps = Temporaries {
                    scratch: info.scratch(class),
                    free,
                };

                self.parallel[class.index()].sequentialize(
                    class,
                    temps,
                    scan.slots_mut(),
                    EditKind::EdgeMove,
                    &mut moves,
                );
            }

            trace!("{block} -> {succ}: {} moves at {placement:?}", moves.len());

            out.stats.edge_moves += moves.len();
            out.stats.split_edges += (placement == EdgePlacement::Split) as usize;
            out.edges.push(EdgeMoves {
                from: block,
                to: succ,
                succ_index: k,
                placement,
                moves,
            });
        }

        Ok(())
    }

    // the end of the predecessor works if nothing else leaves through it and the
    // terminator doesn't read registers, the start of the successor works if
    // nothing else comes in through it, everything else needs a new block
    fn placement<F: Function>(
        &mut self,
        func: &F,
        pred: MIRBlock,
        succ: MIRBlock,
        options: &RegAllocOptions,
    ) -> Result<EdgePlacement, RegAllocError> {
        let term = func.block_insts(pred).last();
        let data = func.inst(term);

        self.uses.clear();
        self.defs.clear();
        data.uses(&mut self.uses);
        data.defs(&mut self.defs);

        if func.block_succs(pred).len() == 1
            && self.uses.is_empty()
            && self.defs.is_empty()
            && !data.is_call()
        {
            return Ok(EdgePlacement::EndOfPred(term));
        }

        if func.block_preds(succ).len() == 1 {
            return Ok(EdgePlacement::StartOfSucc(func.block_insts(succ).first()));
        }

        if options.split_critical_edges {
            Ok(EdgePlacement::Split)
        } else {
            Err(RegAllocError::InvalidEdge(pred, succ))
        }
    }
}
