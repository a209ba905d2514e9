//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use crate::arena::SecondaryMap;
use crate::codegen::regalloc::liveness::ranges_overlap;
use crate::codegen::regalloc::stack::SpillSlots;
use crate::codegen::regalloc::{
    DefSite, LiveInterval, LiveRange, Liveness, ProgramPoint, RegAllocError, SpillSlot,
};
use crate::codegen::{
    Inst, PReg, RegAllocOptions, RegClass, RegInUseSet, RegSet, RegisterInfo, VReg,
};
use crate::utility::SaHashMap;
use log::{debug, trace};
use smallvec::SmallVec;
use std::cmp::Reverse;
use std::collections::BinaryHeap;

/// One piece of work for the scan. A value gets one [`Piece::Whole`] for its
/// entire interval, and once it has been spilled, a short piece for each
/// instruction that still needs it in a register.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub(crate) enum Piece {
    Whole,
    Reload(Inst),
    Def(Inst),
}

impl Piece {
    #[inline]
    fn is_spillable(self) -> bool {
        self == Piece::Whole
    }
}

/// What the scan decided for a single value.
#[derive(Copy, Clone, Debug, Default)]
pub(crate) struct VRegState {
    /// The register the value lives in until it is spilled, if it ever got one.
    pub(crate) reg: Option<PReg>,
    /// The stack slot of the value, if it needs one.
    pub(crate) slot: Option<SpillSlot>,
    /// The point from which the value only lives in its slot.
    pub(crate) spilled_at: Option<ProgramPoint>,
}

#[derive(Copy, Clone, Debug)]
struct Live {
    vreg: VReg,
    piece: Piece,
    reg: PReg,
    end: ProgramPoint,
}

// the registers of one class, with the ones that are free right now
#[derive(Clone, Debug, Default)]
struct RegisterPool {
    plain: SmallVec<[PReg; 32]>,
    crossing: SmallVec<[PReg; 32]>,
    free: RegSet,
    holders: RegInUseSet<VReg>,
    total: usize,
}

impl RegisterPool {
    fn reset(&mut self, info: &RegisterInfo, class: RegClass) {
        let regs = info.allocatable(class);

        // values that never see a call want registers nobody has to save,
        // values that do want registers the call will not clobber
        self.plain.clear();
        self.plain
            .extend(regs.iter().copied().filter(|&r| info.is_caller_saved(r)));
        self.plain
            .extend(regs.iter().copied().filter(|&r| !info.is_caller_saved(r)));

        self.crossing.clear();
        self.crossing
            .extend(regs.iter().copied().filter(|&r| info.is_callee_saved(r)));
        self.crossing
            .extend(regs.iter().copied().filter(|&r| !info.is_callee_saved(r)));

        self.free = regs.iter().copied().collect();
        self.holders.reset();
        self.total = regs.len();
    }

    #[inline]
    fn order(&self, crossing: bool) -> &[PReg] {
        if crossing {
            &self.crossing
        } else {
            &self.plain
        }
    }

    #[inline]
    fn is_free(&self, reg: PReg) -> bool {
        self.free.has(reg)
    }

    fn take(&mut self, reg: PReg, vreg: VReg) {
        debug_assert!(self.free.has(reg), "{reg} is not free, {vreg} cannot take it");

        self.free.remove(reg);
        self.holders.add(reg, vreg);
        self.check_conservation();
    }

    fn release(&mut self, reg: PReg, vreg: VReg) {
        debug_assert_eq!(self.holders.get(reg), Some(vreg), "{vreg} does not hold {reg}");

        self.holders.remove(reg);
        self.free.add(reg);
        self.check_conservation();
    }

    #[inline]
    fn check_conservation(&self) {
        debug_assert!(self.free.intersection(self.holders.occupied()).is_empty());
        debug_assert_eq!(
            self.free.len() + self.holders.occupied().len(),
            self.total,
            "registers were lost or duplicated"
        );
    }
}

/// The linear scan itself. Walks every piece of work in order of its start
/// point and gives it a register, evicting and spilling values when the
/// class runs out.
///
/// All the state is kept between runs, so one [`LinearScan`] can be used for
/// any number of functions without reallocating.
#[derive(Clone, Debug, Default)]
pub(crate) struct LinearScan {
    states: SecondaryMap<VReg, VRegState>,
    reload_regs: SaHashMap<(Inst, VReg), PReg>,
    def_regs: SaHashMap<(Inst, VReg), PReg>,
    pools: [RegisterPool; 2],
    active: Vec<Live>,
    inactive: Vec<Live>,
    unhandled: BinaryHeap<Reverse<(ProgramPoint, VReg, Piece)>>,
    slots: SpillSlots,
    callee_saved_used: RegSet,
    spilled: Vec<VReg>,
}

impl LinearScan {
    fn reset(&mut self, info: &RegisterInfo, options: &RegAllocOptions) {
        self.states.clear();
        self.reload_regs.clear();
        self.def_regs.clear();
        self.active.clear();
        self.inactive.clear();
        self.unhandled.clear();
        self.slots.reset(options.reuse_spill_slots);
        self.callee_saved_used = RegSet::EMPTY;
        self.spilled.clear();

        for class in RegClass::ALL {
            self.pools[class.index()].reset(info, class);
        }
    }

    /// Runs the scan over every interval in `live`.
    pub(crate) fn run(
        &mut self,
        live: &Liveness,
        info: &RegisterInfo,
        options: &RegAllocOptions,
    ) -> Result<(), RegAllocError> {
        self.reset(info, options);

        for interval in live.intervals() {
            if info.allocatable(interval.class()).is_empty() {
                return Err(RegAllocError::NoAllocatableRegisters(interval.class()));
            }

            self.unhandled
                .push(Reverse((interval.start(), interval.vreg(), Piece::Whole)));
        }

        while let Some(Reverse((pos, vreg, piece))) = self.unhandled.pop() {
            self.update_state(pos, live);
            self.allocate_piece(pos, vreg, piece, live, info)?;
        }

        debug!(
            "linear scan: {} values, {} spilled, {} bytes of spill slots",
            live.intervals().len(),
            self.spilled.len(),
            self.slots.size()
        );

        Ok(())
    }

    /// What the scan decided for `vreg`.
    #[inline]
    pub(crate) fn state(&self, vreg: VReg) -> &VRegState {
        self.states.get(vreg)
    }

    /// The register `vreg` is reloaded into right before `inst`, if it is.
    #[inline]
    pub(crate) fn reload_reg(&self, inst: Inst, vreg: VReg) -> Option<PReg> {
        self.reload_regs.get(&(inst, vreg)).copied()
    }

    /// The register `inst` writes `vreg` into when `vreg` lives on the stack.
    #[inline]
    pub(crate) fn def_reg(&self, inst: Inst, vreg: VReg) -> Option<PReg> {
        self.def_regs.get(&(inst, vreg)).copied()
    }

    /// Every value that was spilled, in the order it happened.
    #[inline]
    pub(crate) fn spilled(&self) -> &[VReg] {
        &self.spilled
    }

    #[inline]
    pub(crate) fn slots_mut(&mut self) -> &mut SpillSlots {
        &mut self.slots
    }

    #[inline]
    pub(crate) fn slots(&self) -> &SpillSlots {
        &self.slots
    }

    /// Every callee-saved register that was handed out.
    #[inline]
    pub(crate) fn callee_saved_used(&self) -> RegSet {
        self.callee_saved_used
    }

    // retires everything that ended before `pos` and moves values in and out
    // of their lifetime holes
    fn update_state(&mut self, pos: ProgramPoint, live: &Liveness) {
        let mut i = 0;

        while i < self.active.len() {
            let entry = self.active[i];

            if entry.end < pos {
                self.active.swap_remove(i);
                self.pools[entry.vreg.class().index()].release(entry.reg, entry.vreg);

                continue;
            }

            if entry.piece == Piece::Whole && !interval_of(live, entry.vreg).covers(pos) {
                trace!("{} enters a hole at {pos}, freeing {}", entry.vreg, entry.reg);

                self.active.swap_remove(i);
                self.pools[entry.vreg.class().index()].release(entry.reg, entry.vreg);
                self.inactive.push(entry);

                continue;
            }

            i += 1;
        }

        let mut i = 0;

        while i < self.inactive.len() {
            let entry = self.inactive[i];

            if entry.end < pos {
                self.inactive.swap_remove(i);

                continue;
            }

            if interval_of(live, entry.vreg).covers(pos) {
                trace!("{} leaves its hole at {pos}, taking back {}", entry.vreg, entry.reg);

                self.inactive.swap_remove(i);
                self.pools[entry.vreg.class().index()].take(entry.reg, entry.vreg);
                self.active.push(entry);

                continue;
            }

            i += 1;
        }
    }

    fn allocate_piece(
        &mut self,
        pos: ProgramPoint,
        vreg: VReg,
        piece: Piece,
        live: &Liveness,
        info: &RegisterInfo,
    ) -> Result<(), RegAllocError> {
        let interval = interval_of(live, vreg);
        let single = [LiveRange::new(pos, pos)];
        let (ranges, end) = match piece {
            Piece::Whole => (interval.ranges(), interval.end()),
            _ => (&single[..], pos),
        };

        if let Some(reg) = self.find_free(interval, piece, ranges, live) {
            trace!("{vreg} ({piece:?}) gets {reg} at {pos}");

            self.assign(interval, piece, reg, end, info);

            return Ok(());
        }

        self.allocate_blocked(pos, interval, piece, ranges, end, live, info)
    }

    // a register is usable for `ranges` if nothing claims it as a fixed register
    // for a different value inside them, and no value sitting in a lifetime
    // hole will want it back while `ranges` still need it
    fn is_valid(&self, reg: PReg, vreg: VReg, ranges: &[LiveRange], live: &Liveness) -> bool {
        !live.fixed().blocks(reg, vreg, ranges)
            && !self.inactive.iter().any(|entry| {
                entry.reg == reg && ranges_overlap(interval_of(live, entry.vreg).ranges(), ranges)
            })
    }

    fn find_free(
        &self,
        interval: &LiveInterval,
        piece: Piece,
        ranges: &[LiveRange],
        live: &Liveness,
    ) -> Option<PReg> {
        let vreg = interval.vreg();
        let pool = &self.pools[vreg.class().index()];
        let usable = |reg: PReg| pool.is_free(reg) && self.is_valid(reg, vreg, ranges, live);

        // try to get the register the value is pinned to, or the one it is copied
        // from, which lets the move turn into a no-op
        if piece == Piece::Whole {
            let hint = interval.fixed_hint().or_else(|| {
                interval
                    .copy_of()
                    .and_then(|from| self.states.get(from).reg)
            });

            if let Some(reg) = hint.filter(|&reg| reg.class() == vreg.class() && usable(reg)) {
                return Some(reg);
            }
        }

        let crossing = piece == Piece::Whole && interval.crosses_call();

        pool.order(crossing).iter().copied().find(|&reg| usable(reg))
    }

    fn assign(
        &mut self,
        interval: &LiveInterval,
        piece: Piece,
        reg: PReg,
        end: ProgramPoint,
        info: &RegisterInfo,
    ) {
        let vreg = interval.vreg();

        self.pools[vreg.class().index()].take(reg, vreg);

        if info.is_callee_saved(reg) {
            self.callee_saved_used.add(reg);
        }

        match piece {
            Piece::Whole => {
                let state = &mut self.states[vreg];

                state.reg = Some(reg);

                // the value has to be saved around every call it survives
                if interval.crosses_call() && info.is_caller_saved(reg) && state.slot.is_none() {
                    state.slot = Some(self.slots.allocate(vreg.class(), interval.start(), end));
                }
            }
            Piece::Reload(inst) => {
                self.reload_regs.insert((inst, vreg), reg);
            }
            Piece::Def(inst) => {
                self.def_regs.insert((inst, vreg), reg);
            }
        }

        self.active.push(Live {
            vreg,
            piece,
            reg,
            end,
        });
    }

    #[allow(clippy::too_many_arguments)]
    fn allocate_blocked(
        &mut self,
        pos: ProgramPoint,
        interval: &LiveInterval,
        piece: Piece,
        ranges: &[LiveRange],
        end: ProgramPoint,
        live: &Liveness,
        info: &RegisterInfo,
    ) -> Result<(), RegAllocError> {
        let vreg = interval.vreg();

        // furthest end point wins, ties go to the lowest value
        let victim = self
            .active
            .iter()
            .enumerate()
            .filter(|(_, entry)| {
                entry.piece.is_spillable()
                    && entry.vreg.class() == vreg.class()
                    && entry.vreg != vreg
                    && self.is_valid(entry.reg, vreg, ranges, live)
            })
            .max_by(|(_, a), (_, b)| a.end.cmp(&b.end).then_with(|| b.vreg.cmp(&a.vreg)))
            .map(|(idx, entry)| (idx, *entry));

        match (piece, victim) {
            (Piece::Whole, Some((idx, entry))) if entry.end > end => {
                trace!("{vreg} evicts {} from {} at {pos}", entry.vreg, entry.reg);

                self.evict(idx, pos, live);
                self.assign(interval, piece, entry.reg, end, info);
            }
            (Piece::Whole, _) => {
                trace!("{vreg} is spilled for its whole lifetime");

                self.spill(interval, interval.start());
            }
            (_, Some((idx, entry))) => {
                trace!("{vreg} ({piece:?}) evicts {} from {} at {pos}", entry.vreg, entry.reg);

                self.evict(idx, pos, live);
                self.assign(interval, piece, entry.reg, end, info);
            }
            (_, None) => {
                return Err(RegAllocError::TooManyLiveRegisters(vreg.class(), pos.inst()));
            }
        }

        Ok(())
    }

    fn evict(&mut self, idx: usize, pos: ProgramPoint, live: &Liveness) {
        let entry = self.active.swap_remove(idx);

        self.pools[entry.vreg.class().index()].release(entry.reg, entry.vreg);
        self.spill(interval_of(live, entry.vreg), pos);
    }

    // from `at` onwards the value only lives in its slot, every later use
    // becomes a reload
    fn spill(&mut self, interval: &LiveInterval, at: ProgramPoint) {
        let vreg = interval.vreg();
        let state = &mut self.states[vreg];

        debug_assert!(state.spilled_at.is_none(), "{vreg} was spilled twice");

        state.spilled_at = Some(at);

        if state.slot.is_none() {
            state.slot = Some(
                self.slots
                    .allocate(vreg.class(), interval.start(), interval.end()),
            );
        }

        self.spilled.push(vreg);

        for &inst in interval.uses() {
            let point = ProgramPoint::use_of(inst);

            if point >= at {
                self.unhandled
                    .push(Reverse((point, vreg, Piece::Reload(inst))));
            }
        }

        // the instruction still needs a register to write the value into
        if let DefSite::Inst(inst) = interval.def() {
            if interval.fixed_def().is_none() && at <= interval.def_point() {
                self.unhandled
                    .push(Reverse((interval.def_point(), vreg, Piece::Def(inst))));
            }
        }
    }
}

#[inline]
fn interval_of(live: &Liveness, vreg: VReg) -> &LiveInterval {
    live.interval(vreg)
        .expect("scanned a value that liveness never saw")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::ArenaKey;
    use crate::codegen::{FunctionBuilder, MIRFunction, TestInst};

    fn two_regs() -> RegisterInfo {
        RegisterInfo::builder("two")
            .caller_saved(PReg::int(0), "a")
            .callee_saved(PReg::int(1), "b")
            .scratch(PReg::int(2), "t")
            .caller_saved(PReg::float(0), "fa")
            .callee_saved(PReg::float(1), "fb")
            .build()
    }

    fn scan(func: &MIRFunction<TestInst>, info: &RegisterInfo) -> (Liveness, LinearScan) {
        let live = Liveness::compute(func).unwrap();
        let mut scan = LinearScan::default();

        scan.run(&live, info, &RegAllocOptions::default()).unwrap();

        (live, scan)
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
        b.push(TestInst::nop());
        b.push(TestInst::use_of(v3));
        b.push(TestInst::ret(&[v1]));

        let (_, scan) = scan(&b.build(), &two_regs());

        assert!(scan.spilled().is_empty());
        assert_ne!(scan.state(v1).reg, scan.state(v2).reg);
        assert_eq!(scan.state(v2).reg, scan.state(v3).reg);
    }

    #[test]
    fn furthest_end_is_evicted() {
        let mut b = FunctionBuilder::new("spill");
        let bb0 = b.create_block();
        let v1 = b.new_vreg(RegClass::Int);
        let v2 = b.new_vreg(RegClass::Int);
        let v3 = b.new_vreg(RegClass::Int);

        b.switch_to(bb0);
        b.push(TestInst::def(v1));
        b.push(TestInst::def(v2));
        b.push(TestInst::def(v3));
        b.push(TestInst::use_of(v2));
        b.push(TestInst::use_of(v3));
        b.push(TestInst::nop());
        b.push(TestInst::use_of(v1));
        b.push(TestInst::ret(&[]));

        let (_, scan) = scan(&b.build(), &two_regs());

        assert_eq!(scan.spilled(), &[v1]);
        assert_eq!(scan.state(v1).spilled_at, Some(ProgramPoint::def_of(Inst::key_new(2))));
        assert_eq!(scan.state(v3).reg, scan.state(v1).reg);
        assert!(scan.reload_reg(Inst::key_new(6), v1).is_some());
        assert!(scan.state(v1).slot.is_some());
    }

    // `lo` and `hi` both end at the last `op`, `z` needs one of their registers
    fn equal_ends(low_first: bool) -> (MIRFunction<TestInst>, VReg, VReg) {
        let mut b = FunctionBuilder::new("ties");
        let bb0 = b.create_block();
        let lo = b.new_vreg(RegClass::Int);
        let hi = b.new_vreg(RegClass::Int);
        let z = b.new_vreg(RegClass::Int);
        let (first, second) = if low_first { (lo, hi) } else { (hi, lo) };

        b.switch_to(bb0);
        b.push(TestInst::def(first));
        b.push(TestInst::def(second));
        b.push(TestInst::def(z));
        b.push(TestInst::use_of(z));
        b.push(TestInst::op(&[], &[lo, hi]));
        b.push(TestInst::ret(&[]));

        (b.build(), lo, hi)
    }

    #[test]
    fn equal_ends_evict_the_lowest_value() {
        for low_first in [true, false] {
            let (func, lo, hi) = equal_ends(low_first);
            let (_, scan) = scan(&func, &two_regs());

            assert_eq!(scan.spilled(), &[lo], "low defined first: {low_first}");
            assert_eq!(scan.state(lo).spilled_at, Some(ProgramPoint::def_of(Inst::key_new(2))));
            assert!(scan.state(hi).spilled_at.is_none());
        }
    }

    #[test]
    fn values_ending_last_spill_themselves() {
        let mut b = FunctionBuilder::new("self");
        let bb0 = b.create_block();
        let bb1 = b.create_block();
        let x = b.new_vreg(RegClass::Int);
        let y = b.new_vreg(RegClass::Int);
        let p = b.append_block_param(bb1, RegClass::Int);

        b.switch_to(bb0);
        b.push(TestInst::def(x));
        b.push(TestInst::def(y));
        b.push(TestInst::jump());
        b.branch_to(bb1, &[x]);

        b.switch_to(bb1);
        b.push(TestInst::use_of(x));
        b.push(TestInst::use_of(y));
        b.push(TestInst::ret(&[p]));

        let (_, scan) = scan(&b.build(), &two_regs());

        // p outlives both x and y, so it goes to the stack instead of them
        assert_eq!(scan.spilled(), &[p]);
        assert_eq!(scan.state(p).reg, None);
        assert_eq!(scan.state(p).spilled_at, Some(ProgramPoint::use_of(Inst::key_new(3))));
        assert!(scan.reload_reg(Inst::key_new(5), p).is_some());
        assert!(scan.state(x).spilled_at.is_none());
        assert!(scan.state(y).spilled_at.is_none());
    }

    #[test]
    fn values_crossing_calls_prefer_callee_saved() {
        let mut b = FunctionBuilder::new("calls");
        let bb0 = b.create_block();
        let x = b.new_vreg(RegClass::Int);
        let y = b.new_vreg(RegClass::Int);

        b.switch_to(bb0);
        b.push(TestInst::def(x));
        b.push(TestInst::def(y));
        b.push(TestInst::use_of(y));
        b.push(TestInst::call(&[], &[]));
        b.push(TestInst::ret(&[x]));

        let info = two_regs();
        let (_, scan) = scan(&b.build(), &info);

        assert_eq!(scan.state(x).reg, Some(PReg::int(1)));
        assert_eq!(scan.state(y).reg, Some(PReg::int(0)));
        assert!(scan.callee_saved_used().has(PReg::int(1)));
        assert!(scan.state(x).slot.is_none());
    }

    #[test]
    fn missing_register_class_is_fatal() {
        let info = RegisterInfo::builder("ints-only")
            .caller_saved(PReg::int(0), "a")
            .build();

        let mut b = FunctionBuilder::new("floats");
        let bb0 = b.create_block();
        let f = b.new_vreg(RegClass::Float);

        b.switch_to(bb0);
        b.push(TestInst::def(f));
        b.push(TestInst::ret(&[f]));

        let live = Liveness::compute(&b.build()).unwrap();
        let err = LinearScan::default()
            .run(&live, &info, &RegAllocOptions::default())
            .unwrap_err();

        assert_eq!(err, RegAllocError::NoAllocatableRegisters(RegClass::Float));
        assert!(err.is_fatal());
    }

    #[test]
    fn too_many_operands_is_an_error() {
        let info = RegisterInfo::builder("one")
            .caller_saved(PReg::int(0), "a")
            .build();

        let mut b = FunctionBuilder::new("wide");
        let bb0 = b.create_block();
        let x = b.new_vreg(RegClass::Int);
        let y = b.new_vreg(RegClass::Int);

        b.switch_to(bb0);
        b.push(TestInst::def(x));
        b.push(TestInst::def(y));
        b.push(TestInst::op(&[], &[x, y]));
        b.push(TestInst::ret(&[]));

        let live = Liveness::compute(&b.build()).unwrap();
        let err = LinearScan::default()
            .run(&live, &info, &RegAllocOptions::default())
            .unwrap_err();

        assert_eq!(
            err,
            RegAllocError::TooManyLiveRegisters(RegClass::Int, Inst::key_new(2))
        );
    }
}
