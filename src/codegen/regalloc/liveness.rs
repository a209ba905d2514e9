//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use crate::arena::{ArenaKey, SecondaryMap, SecondarySet};
use crate::codegen::regalloc::RegAllocError;
use crate::codegen::{
    FixedCollector, Function, Inst, MIRBlock, MachInst, PReg, RegClass, RegCollector, VReg,
};
use log::{debug, trace};
use smallvec::SmallVec;
use std::fmt;
use std::fmt::{Display, Formatter};

/// A position in the linear order of a function.
///
/// Every instruction `i` has two points: its use point `2i` where it reads
/// its operands, and its def point `2i + 1` where it writes its results.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
#[cfg_attr(feature = "enable-serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ProgramPoint(u32);

impl ProgramPoint {
    /// The point where `inst` reads its operands.
    #[inline]
    pub fn use_of(inst: Inst) -> Self {
        Self(inst.as_u32() * 2)
    }

    /// The point where `inst` writes its results.
    #[inline]
    pub fn def_of(inst: Inst) -> Self {
        Self(inst.as_u32() * 2 + 1)
    }

    /// The first point of `block`.
    #[inline]
    pub fn block_entry<F: Function>(func: &F, block: MIRBlock) -> Self {
        Self::use_of(func.block_insts(block).first())
    }

    /// The last point of `block`, right after its terminator.
    #[inline]
    pub fn block_exit<F: Function>(func: &F, block: MIRBlock) -> Self {
        Self::def_of(func.block_insts(block).last())
    }

    /// The instruction the point belongs to.
    #[inline]
    pub fn inst(self) -> Inst {
        Inst::key_new((self.0 / 2) as usize)
    }

    /// Whether this is a use point.
    #[inline]
    pub fn is_use(self) -> bool {
        self.0 % 2 == 0
    }

    /// The raw position.
    #[inline]
    pub fn raw(self) -> u32 {
        self.0
    }

    /// Creates a point from a raw position.
    #[inline]
    pub fn from_raw(raw: u32) -> Self {
        Self(raw)
    }
}

impl Display for ProgramPoint {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let kind = if self.is_use() { "u" } else { "d" };

        write!(f, "{}{kind}", self.inst().as_u32())
    }
}

/// An inclusive range of program points.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
#[cfg_attr(feature = "enable-serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LiveRange {
    /// The first point of the range.
    pub start: ProgramPoint,
    /// The last point of the range.
    pub end: ProgramPoint,
}

impl LiveRange {
    /// Creates the range `[start, end]`.
    #[inline]
    pub fn new(start: ProgramPoint, end: ProgramPoint) -> Self {
        debug_assert!(start <= end, "backwards live range [{start}, {end}]");

        Self { start, end }
    }

    /// Whether `point` is inside the range.
    #[inline]
    pub fn contains(self, point: ProgramPoint) -> bool {
        self.start <= point && point <= self.end
    }

    /// Whether the two ranges share at least one point.
    #[inline]
    pub fn overlaps(self, other: LiveRange) -> bool {
        self.start <= other.end && other.start <= self.end
    }
}

impl Display for LiveRange {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.start, self.end)
    }
}

/// Where a value gets its definition.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum DefSite {
    /// The value is a parameter of a block.
    Param(MIRBlock),
    /// The value is written by an instruction.
    Inst(Inst),
}

/// Every range of program points where a value has to be kept somewhere,
/// plus what the allocator needs to know about how the value is used.
#[derive(Clone, Debug)]
pub struct LiveInterval {
    vreg: VReg,
    def: DefSite,
    def_point: ProgramPoint,
    ranges: SmallVec<[LiveRange; 2]>,
    uses: SmallVec<[Inst; 4]>,
    calls: SmallVec<[Inst; 2]>,
    fixed_def: Option<PReg>,
    fixed_use: Option<PReg>,
    copy_of: Option<VReg>,
}

impl LiveInterval {
    fn new(vreg: VReg, def: DefSite, def_point: ProgramPoint) -> Self {
        Self {
            vreg,
            def,
            def_point,
            ranges: SmallVec::new(),
            uses: SmallVec::new(),
            calls: SmallVec::new(),
            fixed_def: None,
            fixed_use: None,
            copy_of: None,
        }
    }

    /// The value this interval is for.
    #[inline]
    pub fn vreg(&self) -> VReg {
        self.vreg
    }

    /// The class of the value.
    #[inline]
    pub fn class(&self) -> RegClass {
        self.vreg.class()
    }

    /// Where the value is defined.
    #[inline]
    pub fn def(&self) -> DefSite {
        self.def
    }

    /// The point where the value comes into existence.
    #[inline]
    pub fn def_point(&self) -> ProgramPoint {
        self.def_point
    }

    /// The ranges of the interval, sorted and non-adjacent.
    #[inline]
    pub fn ranges(&self) -> &[LiveRange] {
        &self.ranges
    }

    /// The first point of the interval.
    #[inline]
    pub fn start(&self) -> ProgramPoint {
        self.ranges[0].start
    }

    /// The last point of the interval.
    #[inline]
    pub fn end(&self) -> ProgramPoint {
        self.ranges[self.ranges.len() - 1].end
    }

    /// The instructions that read the value out of a register, in layout
    /// order. Uses pinned to a fixed register and branch arguments are not included.
    #[inline]
    pub fn uses(&self) -> &[Inst] {
        &self.uses
    }

    /// The calls that the value is live across.
    #[inline]
    pub fn crossed_calls(&self) -> &[Inst] {
        &self.calls
    }

    /// Whether the value is live across any call.
    #[inline]
    pub fn crosses_call(&self) -> bool {
        !self.calls.is_empty()
    }

    /// The register the value's definition is pinned to, if any.
    #[inline]
    pub fn fixed_def(&self) -> Option<PReg> {
        self.fixed_def
    }

    /// A register that would save a move if the value lived in it. This
    /// is the register its def is pinned to, or the first register a use is pinned to.
    #[inline]
    pub fn fixed_hint(&self) -> Option<PReg> {
        self.fixed_def.or(self.fixed_use)
    }

    /// If the value is defined by a copy, the value it is copied from.
    #[inline]
    pub fn copy_of(&self) -> Option<VReg> {
        self.copy_of
    }

    /// Whether `point` is inside one of the ranges.
    pub fn covers(&self, point: ProgramPoint) -> bool {
        let idx = self.ranges.partition_point(|r| r.end < point);

        self.ranges.get(idx).map_or(false, |r| r.contains(point))
    }

    /// Whether any range of `self` overlaps `range`.
    pub fn overlaps_range(&self, range: LiveRange) -> bool {
        let idx = self.ranges.partition_point(|r| r.end < range.start);

        self.ranges.get(idx).map_or(false, |r| r.overlaps(range))
    }

    /// Whether the two intervals share a point.
    pub fn overlaps(&self, other: &LiveInterval) -> bool {
        ranges_overlap(&self.ranges, &other.ranges)
    }

    fn add_range(&mut self, range: LiveRange) {
        self.ranges.push(range);
    }

    // sorts the ranges and merges any that touch or overlap
    fn normalize(&mut self) {
        self.ranges.sort_unstable();

        let mut merged: SmallVec<[LiveRange; 2]> = SmallVec::new();

        for range in self.ranges.drain(..) {
            match merged.last_mut() {
                Some(last) if range.start.raw() <= last.end.raw() + 1 => {
                    last.end = last.end.max(range.end);
                }
                _ => merged.push(range),
            }
        }

        self.ranges = merged;
        self.uses.sort_unstable();
        self.uses.dedup();
    }
}

impl Display for LiveInterval {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.vreg)?;

        for range in self.ranges.iter() {
            write!(f, " {range}")?;
        }

        if !self.calls.is_empty() {
            write!(f, " (crosses {} calls)", self.calls.len())?;
        }

        Ok(())
    }
}

/// Whether two sorted lists of ranges share a point.
pub(crate) fn ranges_overlap(a: &[LiveRange], b: &[LiveRange]) -> bool {
    let (mut i, mut j) = (0, 0);

    while i < a.len() && j < b.len() {
        if a[i].overlaps(b[j]) {
            return true;
        }

        if a[i].end < b[j].end {
            i += 1;
        } else {
            j += 1;
        }
    }

    false
}

/// A point where a physical register is claimed by one specific value.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct FixedPoint {
    /// The point the register is claimed at.
    pub point: ProgramPoint,
    /// The value that claims it.
    pub vreg: VReg,
}

/// Every point where an operand is pinned to a physical register, grouped by register.
#[derive(Clone, Debug, Default)]
pub struct FixedIntervals {
    points: SecondaryMap<PReg, Vec<FixedPoint>>,
}

impl FixedIntervals {
    /// The claims on `preg`, sorted by point.
    pub fn intervals_for(&self, preg: PReg) -> &[FixedPoint] {
        self.points.get(preg)
    }

    /// Whether `preg` is claimed by something other than `vreg` somewhere in `ranges`.
    pub fn blocks(&self, preg: PReg, vreg: VReg, ranges: &[LiveRange]) -> bool {
        let points = self.intervals_for(preg);

        ranges.iter().any(|range| {
            let first = points.partition_point(|p| p.point < range.start);

            points[first..]
                .iter()
                .take_while(|p| p.point <= range.end)
                .any(|p| p.vreg != vreg)
        })
    }

    fn add(&mut self, preg: PReg, point: ProgramPoint, vreg: VReg) {
        self.points[preg].push(FixedPoint { point, vreg });
    }

    fn clear(&mut self) {
        for points in self.points.values_mut() {
            points.clear();
        }
    }

    // two different values claiming one register at the same point can never be satisfied
    fn check_conflicts(&mut self) -> Result<(), RegAllocError> {
        for (preg, points) in self.points.iter_mut() {
            points.sort_unstable_by_key(|p| (p.point, p.vreg));
            points.dedup();

            for pair in points.windows(2) {
                if pair[0].point == pair[1].point {
                    return Err(RegAllocError::FixedRegisterConflict(
                        preg,
                        pair[0].point.inst(),
                    ));
                }
            }
        }

        Ok(())
    }
}

/// Liveness information for one function: live-in/live-out sets per block
/// and a [`LiveInterval`] per value.
///
/// A single [`Liveness`] can be recomputed for many functions, the sets
/// and interval storage are reused.
#[derive(Clone, Debug, Default)]
pub struct Liveness {
    live_in: SecondaryMap<MIRBlock, SecondarySet<VReg>>,
    live_out: SecondaryMap<MIRBlock, SecondarySet<VReg>>,
    gen: SecondaryMap<MIRBlock, SecondarySet<VReg>>,
    kill: SecondaryMap<MIRBlock, SecondarySet<VReg>>,
    postorder: Vec<MIRBlock>,
    defs: SecondaryMap<VReg, Option<DefSite>>,
    intervals: Vec<LiveInterval>,
    index: SecondaryMap<VReg, Option<u32>>,
    open: SecondaryMap<VReg, Option<ProgramPoint>>,
    fixed: FixedIntervals,
    calls: Vec<Inst>,
}

impl Liveness {
    /// Creates empty liveness information.
    pub fn new() -> Self {
        Self::default()
    }

    /// Computes liveness for `func` in a fresh [`Liveness`].
    pub fn compute<F: Function>(func: &F) -> Result<Self, RegAllocError> {
        let mut live = Self::new();

        live.recompute(func)?;

        Ok(live)
    }

    /// Computes liveness for `func`, replacing whatever was computed before.
    ///
    /// This also validates the function: every value must be defined exactly
    /// once before any use, blocks must be non-empty and end in their (only)
    /// terminator, and branches must pass one argument per parameter.
    pub fn recompute<F: Function>(&mut self, func: &F) -> Result<(), RegAllocError> {
        self.clear();

        if func.num_blocks() == 0 {
            return Ok(());
        }

        self.collect_defs(func)?;
        self.compute_postorder(func);
        self.compute_local_sets(func)?;
        self.solve(func);

        let entry = func.entry();

        if let Some(v) = self.live_in[entry].keys().next() {
            return Err(RegAllocError::UseBeforeDef(v, entry));
        }

        for block in func.blocks() {
            self.scan_block(func, block);
        }

        self.extend_loops(func);
        self.fixed.check_conflicts()?;

        for interval in self.intervals.iter_mut() {
            interval.normalize();
        }

        self.mark_call_crossings();
        self.intervals
            .sort_by_key(|interval| (interval.start(), interval.vreg()));

        for (i, interval) in self.intervals.iter().enumerate() {
            self.index[interval.vreg()] = Some(i as u32);
        }

        debug!(
            "liveness for `{}`: {} values over {} blocks",
            func.name(),
            self.intervals.len(),
            func.num_blocks()
        );

        Ok(())
    }

    /// The values live on entry to `block`. Parameters of `block` are not included.
    #[inline]
    pub fn live_in(&self, block: MIRBlock) -> &SecondarySet<VReg> {
        self.live_in.get(block)
    }

    /// The values live on exit from `block`. Branch arguments of `block` are
    /// only included if they are live into the successor as themselves.
    #[inline]
    pub fn live_out(&self, block: MIRBlock) -> &SecondarySet<VReg> {
        self.live_out.get(block)
    }

    /// The interval of `vreg`, if it is defined.
    #[inline]
    pub fn interval(&self, vreg: VReg) -> Option<&LiveInterval> {
        self.index
            .get(vreg)
            .map(|idx| &self.intervals[idx as usize])
    }

    /// Every interval, sorted by start point and then by value.
    #[inline]
    pub fn intervals(&self) -> &[LiveInterval] {
        &self.intervals
    }

    /// Every fixed-register claim in the function.
    #[inline]
    pub fn fixed(&self) -> &FixedIntervals {
        &self.fixed
    }

    /// Every call instruction, in layout order.
    #[inline]
    pub fn calls(&self) -> &[Inst] {
        &self.calls
    }

    /// The reachable blocks in postorder.
    #[inline]
    pub fn postorder(&self) -> &[MIRBlock] {
        &self.postorder
    }

    fn clear(&mut self) {
        for set in self
            .live_in
            .values_mut()
            .chain(self.live_out.values_mut())
            .chain(self.gen.values_mut())
            .chain(self.kill.values_mut())
        {
            set.clear();
        }

        self.postorder.clear();
        self.defs.clear();
        self.intervals.clear();
        self.index.clear();
        self.open.clear();
        self.fixed.clear();
        self.calls.clear();
    }

    fn define(
        &mut self,
        vreg: VReg,
        site: DefSite,
        point: ProgramPoint,
    ) -> Result<(), RegAllocError> {
        if self.defs[vreg].is_some() {
            return Err(RegAllocError::MultipleDefinitions(vreg));
        }

        self.defs[vreg] = Some(site);
        self.index[vreg] = Some(self.intervals.len() as u32);
        self.intervals.push(LiveInterval::new(vreg, site, point));

        Ok(())
    }

    #[inline]
    fn interval_mut(&mut self, vreg: VReg) -> &mut LiveInterval {
        let idx = self.index[vreg].expect("interval for undefined value");

        &mut self.intervals[idx as usize]
    }

    // records every definition and checks the shape of every block
    fn collect_defs<F: Function>(&mut self, func: &F) -> Result<(), RegAllocError> {
        let mut defs = RegCollector::<4>::new();
        let mut fixed = FixedCollector::new();

        for block in func.blocks() {
            let range = func.block_insts(block);

            if range.is_empty() {
                return Err(RegAllocError::EmptyBlock(block));
            }

            let entry = ProgramPoint::use_of(range.first());

            for &param in func.block_params(block) {
                self.define(param, DefSite::Param(block), entry)?;
            }

            for inst in range.iter() {
                let data = func.inst(inst);

                if data.is_terminator() && inst != range.last() {
                    return Err(RegAllocError::MisplacedTerminator(inst));
                }

                defs.clear();
                data.defs(&mut defs);

                for &def in defs.iter() {
                    self.define(def, DefSite::Inst(inst), ProgramPoint::def_of(inst))?;
                }

                fixed.clear();
                data.fixed_defs(&mut fixed);
                data.fixed_uses(&mut fixed);

                if let Some(&(vreg, preg)) = fixed.iter().find(|(v, p)| v.class() != p.class()) {
                    return Err(RegAllocError::ClassMismatch(vreg, preg));
                }
            }

            if !func.inst(range.last()).is_terminator() {
                return Err(RegAllocError::MissingTerminator(block));
            }

            for (k, &succ) in func.block_succs(block).iter().enumerate() {
                if func.branch_args(block, k).len() != func.block_params(succ).len() {
                    return Err(RegAllocError::BranchArgMismatch(block, succ));
                }

                if !func.block_preds(succ).contains(&block) {
                    return Err(RegAllocError::InvalidEdge(block, succ));
                }
            }

            for &pred in func.block_preds(block) {
                if !func.block_succs(pred).contains(&block) {
                    return Err(RegAllocError::InvalidEdge(pred, block));
                }
            }
        }

        Ok(())
    }

    fn compute_postorder<F: Function>(&mut self, func: &F) {
        let mut visited = SecondarySet::with_capacity(func.num_blocks());
        let mut stack: Vec<(MIRBlock, usize)> = Vec::new();
        let entry = func.entry();

        visited.insert(entry);
        stack.push((entry, 0));

        while let Some(top) = stack.last_mut() {
            let (block, next) = *top;
            let succs = func.block_succs(block);

            if next < succs.len() {
                top.1 += 1;

                if !visited.insert(succs[next]) {
                    stack.push((succs[next], 0));
                }
            } else {
                self.postorder.push(block);
                stack.pop();
            }
        }

        // unreachable blocks still get liveness so their instructions can be rewritten
        for block in func.blocks() {
            if !visited.contains(block) {
                self.postorder.push(block);
            }
        }
    }

    // upward-exposed uses (gen) and definitions (kill) of every block
    fn compute_local_sets<F: Function>(&mut self, func: &F) -> Result<(), RegAllocError> {
        let mut uses = RegCollector::<4>::new();
        let mut defs = RegCollector::<4>::new();

        for block in func.blocks() {
            let range = func.block_insts(block);
            let gen = &mut self.gen[block];
            let kill = &mut self.kill[block];

            for &param in func.block_params(block) {
                kill.insert(param);
            }

            for inst in range.iter() {
                let data = func.inst(inst);

                uses.clear();
                defs.clear();
                data.uses(&mut uses);
                data.defs(&mut defs);

                if inst == range.last() {
                    for k in 0..func.block_succs(block).len() {
                        uses.extend(func.branch_args(block, k).iter().copied());
                    }
                }

                for &used in uses.iter() {
                    if self.defs[used].is_none() {
                        return Err(RegAllocError::UndefinedUse(used, inst));
                    }

                    if !kill.contains(used) {
                        gen.insert(used);
                    }
                }

                for &def in defs.iter() {
                    kill.insert(def);
                }
            }
        }

        Ok(())
    }

    // classic backward dataflow, iterated in postorder until nothing changes
    fn solve<F: Function>(&mut self, func: &F) {
        let mut scratch = SecondarySet::new();
        let mut iterations = 0;

        loop {
            let mut changed = false;

            iterations += 1;

            for &block in self.postorder.iter() {
                let out = &mut self.live_out[block];

                for &succ in func.block_succs(block) {
                    out.union_with(self.live_in.get(succ));
                }

                scratch.copy_from(out);
                scratch.subtract(self.kill.get(block));
                scratch.union_with(self.gen.get(block));

                changed |= self.live_in[block].union_with(&scratch);
            }

            if !changed {
                break;
            }
        }

        trace!("liveness dataflow converged after {iterations} iterations");
    }

    // walks a block backwards, building one range per value that is live in it
    fn scan_block<F: Function>(&mut self, func: &F, block: MIRBlock) {
        let range = func.block_insts(block);
        let entry = ProgramPoint::use_of(range.first());
        let exit = ProgramPoint::def_of(range.last());
        let mut live: SmallVec<[VReg; 16]> = SmallVec::new();
        let mut uses = RegCollector::<4>::new();
        let mut defs = RegCollector::<4>::new();
        let mut fixed = FixedCollector::new();

        for vreg in self.live_out.get(block).keys() {
            self.open[vreg] = Some(exit);
            live.push(vreg);
        }

        // branch arguments are read by the edge moves, which happen after the terminator
        for k in 0..func.block_succs(block).len() {
            for &arg in func.branch_args(block, k) {
                if self.open[arg].is_none() {
                    self.open[arg] = Some(exit);
                    live.push(arg);
                }
            }
        }

        for inst in range.iter().rev() {
            let data = func.inst(inst);

            defs.clear();
            data.defs(&mut defs);

            for &def in defs.iter() {
                let point = ProgramPoint::def_of(inst);
                let end = self.open[def].take().unwrap_or(point);

                self.interval_mut(def).add_range(LiveRange::new(point, end));
            }

            fixed.clear();
            data.fixed_defs(&mut fixed);

            for &(vreg, preg) in fixed.iter() {
                self.fixed.add(preg, ProgramPoint::def_of(inst), vreg);
                self.interval_mut(vreg).fixed_def = Some(preg);
            }

            if data.is_call() {
                self.calls.push(inst);
            }

            if let Some(mv) = data.as_move() {
                self.interval_mut(mv.to).copy_of = Some(mv.from);
            }

            fixed.clear();
            data.fixed_uses(&mut fixed);

            for &(vreg, preg) in fixed.iter() {
                self.fixed.add(preg, ProgramPoint::use_of(inst), vreg);
                self.interval_mut(vreg).fixed_use = Some(preg);
            }

            uses.clear();
            data.uses(&mut uses);

            for &used in uses.iter() {
                if self.open[used].is_none() {
                    self.open[used] = Some(ProgramPoint::use_of(inst));
                    live.push(used);
                }

                if !fixed.iter().any(|(v, _)| *v == used) {
                    self.interval_mut(used).uses.push(inst);
                }
            }
        }

        for &param in func.block_params(block) {
            let end = self.open[param].take().unwrap_or(entry);

            self.interval_mut(param)
                .add_range(LiveRange::new(entry, end));
        }

        // anything still open is live into the block
        for vreg in live {
            if let Some(end) = self.open[vreg].take() {
                self.interval_mut(vreg)
                    .add_range(LiveRange::new(entry, end));
            }
        }
    }

    // a value live into a loop header and live around the back edge has to
    // stay put over the whole loop body, not just the blocks it is used in
    fn extend_loops<F: Function>(&mut self, func: &F) {
        for block in func.blocks() {
            for &succ in func.block_succs(block) {
                if succ.key_index() > block.key_index() {
                    continue;
                }

                let span = LiveRange::new(
                    ProgramPoint::block_entry(func, succ),
                    ProgramPoint::block_exit(func, block),
                );

                let carried: SmallVec<[VReg; 8]> = self
                    .live_in
                    .get(succ)
                    .keys()
                    .filter(|&v| self.live_out.get(block).contains(v))
                    .collect();

                for vreg in carried {
                    trace!("extending {vreg} over loop {succ}..{block}");

                    self.interval_mut(vreg).add_range(span);
                }
            }
        }
    }

    fn mark_call_crossings(&mut self) {
        self.calls.sort_unstable();

        if self.calls.is_empty() {
            return;
        }

        for interval in self.intervals.iter_mut() {
            let mut crossed = SmallVec::new();

            for range in interval.ranges.iter() {
                // a value crosses a call if it is live both before and after it
                let first = self
                    .calls
                    .partition_point(|&c| ProgramPoint::def_of(c) < range.start);

                for &call in self.calls[first..].iter() {
                    if ProgramPoint::use_of(call) < range.start {
                        continue;
                    }

                    if ProgramPoint::use_of(call) > range.end {
                        break;
                    }

                    if range.end > ProgramPoint::def_of(call) {
                        crossed.push(call);
                    }
                }
            }

            interval.calls = crossed;
        }
    }
}

impl Display for Liveness {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for interval in self.intervals.iter() {
            writeln!(f, "{interval}")?;
        }

        Ok(())
    }
}
