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
use crate::codegen::regalloc::{ProgramPoint, SpillSlot};
use crate::codegen::{Inst, MIRBlock, PReg, RegClass, RegSet, RegisterInfo, VReg};
use std::fmt;
use std::fmt::{Display, Formatter};

/// Somewhere a value can be kept.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
#[cfg_attr(feature = "enable-serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Location {
    /// A physical register.
    Reg(PReg),
    /// A slot in the spill area.
    Stack(SpillSlot),
}

impl Location {
    /// Checks if the location is a register.
    #[inline]
    pub fn is_reg(self) -> bool {
        matches!(self, Location::Reg(_))
    }

    /// Checks if the location is a spill slot.
    #[inline]
    pub fn is_stack(self) -> bool {
        matches!(self, Location::Stack(_))
    }

    /// Gets the register, if this is one.
    #[inline]
    pub fn as_reg(self) -> Option<PReg> {
        match self {
            Location::Reg(reg) => Some(reg),
            Location::Stack(_) => None,
        }
    }

    /// Gets the slot, if this is one.
    #[inline]
    pub fn as_stack(self) -> Option<SpillSlot> {
        match self {
            Location::Reg(_) => None,
            Location::Stack(slot) => Some(slot),
        }
    }

    /// Formats the location with the register names of a target.
    pub fn format(self, info: &RegisterInfo) -> String {
        match self {
            Location::Reg(reg) => info.reg_name(reg).to_owned(),
            Location::Stack(slot) => slot.to_string(),
        }
    }
}

impl Display for Location {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Location::Reg(reg) => write!(f, "{reg}"),
            Location::Stack(slot) => write!(f, "{slot}"),
        }
    }
}

/// Why an [`Edit`] was inserted.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
#[cfg_attr(feature = "enable-serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EditKind {
    /// Stores a value into its spill slot after it is defined.
    Spill,
    /// Loads a spilled value into a register for an instruction.
    Reload,
    /// Copies a value into or out of a register an operand is pinned to.
    Move,
    /// Stores a value in a caller-saved register before a call.
    Save,
    /// Loads that value back after the call.
    Restore,
    /// Reconciles the locations of values across a control-flow edge.
    EdgeMove,
}

/// A copy that the emitter has to insert, from one location to another.
///
/// `from` and `to` can both be stack slots when the target has no scratch
/// register for the class, the emitter is expected to lower that itself.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
#[cfg_attr(feature = "enable-serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Edit {
    /// Why the copy exists.
    pub kind: EditKind,
    /// The location being read.
    pub from: Location,
    /// The location being written.
    pub to: Location,
    /// The class of the value being copied.
    pub class: RegClass,
}

impl Edit {
    /// Creates an edit.
    #[inline]
    pub fn new(kind: EditKind, from: Location, to: Location, class: RegClass) -> Self {
        Self {
            kind,
            from,
            to,
            class,
        }
    }

    /// Formats the edit with the register names of a target.
    pub fn format(&self, info: &RegisterInfo) -> String {
        format!(
            "{} {} <- {}",
            edit_name(self.kind),
            self.to.format(info),
            self.from.format(info)
        )
    }
}

fn edit_name(kind: EditKind) -> &'static str {
    match kind {
        EditKind::Spill => "spill",
        EditKind::Reload => "reload",
        EditKind::Move => "move",
        EditKind::Save => "save",
        EditKind::Restore => "restore",
        EditKind::EdgeMove => "edge-move",
    }
}

impl Display for Edit {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} <- {}", edit_name(self.kind), self.to, self.from)
    }
}

/// Where an edit goes relative to an instruction.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
#[cfg_attr(feature = "enable-serde", derive(serde::Serialize, serde::Deserialize))]
pub enum InsertPoint {
    /// Right before the instruction, after it has been decided to run it.
    Before(Inst),
    /// Right after the instruction.
    After(Inst),
}

impl InsertPoint {
    /// The instruction the edit is attached to.
    #[inline]
    pub fn inst(self) -> Inst {
        match self {
            InsertPoint::Before(inst) | InsertPoint::After(inst) => inst,
        }
    }

    #[inline]
    fn key(self) -> (Inst, bool) {
        match self {
            InsertPoint::Before(inst) => (inst, false),
            InsertPoint::After(inst) => (inst, true),
        }
    }
}

impl PartialOrd for InsertPoint {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for InsertPoint {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.key().cmp(&other.key())
    }
}

impl Display for InsertPoint {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            InsertPoint::Before(inst) => write!(f, "before {inst}"),
            InsertPoint::After(inst) => write!(f, "after {inst}"),
        }
    }
}

/// Where the moves for a control-flow edge ended up.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum EdgePlacement {
    /// Before the terminator of the predecessor, which only has this one successor.
    EndOfPred(Inst),
    /// Before the first instruction of the successor, which only has this one predecessor.
    StartOfSucc(Inst),
    /// In a new block on the edge, which holds nothing but the moves and
    /// a jump to the successor.
    Split,
}

/// The moves needed on one control-flow edge, already in an order that
/// is safe to execute one after another.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EdgeMoves {
    /// The predecessor.
    pub from: MIRBlock,
    /// The successor.
    pub to: MIRBlock,
    /// Which successor of `from` the edge is.
    pub succ_index: usize,
    /// Where the moves go.
    pub placement: EdgePlacement,
    /// The moves.
    pub moves: Vec<Edit>,
}

/// A block the emitter has to create on a critical edge.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct EdgeBlock<'a> {
    /// The predecessor, whose branch has to target the new block instead.
    pub from: MIRBlock,
    /// The successor, which the new block jumps to.
    pub to: MIRBlock,
    /// Which successor of `from` is being redirected.
    pub succ_index: usize,
    /// The loop depth to give the block, the deeper of its two neighbors.
    pub loop_depth: u32,
    /// The moves the block holds.
    pub moves: &'a [Edit],
}

/// Where a value lives over its whole lifetime.
///
/// A value starts out in `reg` (if it got one) and moves to `slot` for good
/// at `spilled_at`. A value with a slot always has a valid copy in that slot
/// from right after its definition on.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
#[cfg_attr(feature = "enable-serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Home {
    /// The register the value lives in before `spilled_at`.
    pub reg: Option<PReg>,
    /// The spill slot of the value.
    pub slot: Option<SpillSlot>,
    /// The point from which the value only lives in `slot`.
    pub spilled_at: Option<ProgramPoint>,
}

impl Home {
    /// Where the value is at a given point.
    pub fn location_at(&self, point: ProgramPoint) -> Option<Location> {
        match (self.reg, self.spilled_at) {
            (Some(reg), None) => Some(Location::Reg(reg)),
            (Some(reg), Some(at)) if point < at => Some(Location::Reg(reg)),
            _ => self.slot.map(Location::Stack),
        }
    }

    /// Whether the value ever lives on the stack.
    #[inline]
    pub fn is_spilled(&self) -> bool {
        self.spilled_at.is_some()
    }
}

/// Counters describing how much work an allocation had to add.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
#[cfg_attr(feature = "enable-serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AllocStats {
    /// Values that were given a location.
    pub values: usize,
    /// Values that were spilled.
    pub spilled_values: usize,
    /// Stores into spill slots.
    pub spill_stores: usize,
    /// Loads from spill slots.
    pub reloads: usize,
    /// Moves into or out of fixed registers.
    pub fixed_moves: usize,
    /// Saves and restores around calls.
    pub call_saves: usize,
    /// Moves on control-flow edges.
    pub edge_moves: usize,
    /// Critical edges that had to be split.
    pub split_edges: usize,
}

impl AllocStats {
    /// Adds the counters of `other` into `self`.
    pub fn merge(&mut self, other: &AllocStats) {
        self.values += other.values;
        self.spilled_values += other.spilled_values;
        self.spill_stores += other.spill_stores;
        self.reloads += other.reloads;
        self.fixed_moves += other.fixed_moves;
        self.call_saves += other.call_saves;
        self.edge_moves += other.edge_moves;
        self.split_edges += other.split_edges;
    }

    /// The number of edits of every kind.
    pub fn total_edits(&self) -> usize {
        self.spill_stores + self.reloads + self.fixed_moves + self.call_saves + self.edge_moves
    }
}

/// The result of allocating registers for a function.
///
/// This tells the emitter which register every operand of every instruction
/// is in, which copies it has to insert around instructions and on
/// edges, and how large the spill area of the frame has to be.
#[derive(Clone, Debug)]
pub struct Allocation {
    pub(crate) function: String,
    pub(crate) operands: Vec<(VReg, PReg)>,
    pub(crate) operand_starts: Vec<u32>,
    pub(crate) homes: SecondaryMap<VReg, Option<Home>>,
    pub(crate) edits: Vec<(InsertPoint, Edit)>,
    pub(crate) edges: Vec<EdgeMoves>,
    pub(crate) loop_depths: Vec<u32>,
    pub(crate) spill_area_size: u32,
    pub(crate) callee_saved_used: RegSet,
    pub(crate) stats: AllocStats,
}

impl Allocation {
    /// The name of the function this is for.
    #[inline]
    pub fn function_name(&self) -> &str {
        &self.function
    }

    /// Every operand of `inst` paired with the register it is in while the
    /// instruction executes.
    pub fn operands(&self, inst: Inst) -> &[(VReg, PReg)] {
        let idx = inst.as_u32() as usize;

        match (self.operand_starts.get(idx), self.operand_starts.get(idx + 1)) {
            (Some(&begin), Some(&end)) => &self.operands[begin as usize..end as usize],
            _ => &[],
        }
    }

    /// The register `vreg` is in while `inst` executes.
    pub fn assignment(&self, inst: Inst, vreg: VReg) -> Option<PReg> {
        self.operands(inst)
            .iter()
            .find(|(v, _)| *v == vreg)
            .map(|(_, reg)| *reg)
    }

    /// Where `vreg` lives over its lifetime.
    #[inline]
    pub fn home(&self, vreg: VReg) -> Option<&Home> {
        self.homes.get(vreg).as_ref()
    }

    /// Where `vreg` is at `point`.
    pub fn location_at(&self, vreg: VReg, point: ProgramPoint) -> Option<Location> {
        self.home(vreg).and_then(|home| home.location_at(point))
    }

    /// Every edit around instructions, in execution order. Edge moves are
    /// not included, see [`Self::edges`].
    #[inline]
    pub fn edits(&self) -> &[(InsertPoint, Edit)] {
        &self.edits
    }

    /// The edits at exactly `point`, in execution order.
    pub fn edits_at(&self, point: InsertPoint) -> impl Iterator<Item = &Edit> + '_ {
        let begin = self.edits.partition_point(|(p, _)| *p < point);

        self.edits[begin..]
            .iter()
            .take_while(move |(p, _)| *p == point)
            .map(|(_, edit)| edit)
    }

    /// Every edge that needed moves.
    #[inline]
    pub fn edges(&self) -> &[EdgeMoves] {
        &self.edges
    }

    /// Every critical edge that had to be split.
    pub fn split_edges(&self) -> impl Iterator<Item = EdgeBlock<'_>> + '_ {
        self.edges
            .iter()
            .filter(|edge| edge.placement == EdgePlacement::Split)
            .map(|edge| EdgeBlock {
                from: edge.from,
                to: edge.to,
                succ_index: edge.succ_index,
                loop_depth: self.edge_loop_depth(edge.from, edge.to),
                moves: &edge.moves,
            })
    }

    /// Everything that has to be emitted right before `inst`, in order. This
    /// includes the moves for edges placed at the start or end of a block.
    pub fn emit_before(&self, inst: Inst) -> Vec<&Edit> {
        let mut out = Vec::new();
        let placed = |placement: EdgePlacement| {
            self.edges
                .iter()
                .filter(move |edge| edge.placement == placement)
                .flat_map(|edge| edge.moves.iter())
        };

        out.extend(placed(EdgePlacement::StartOfSucc(inst)));
        out.extend(self.edits_at(InsertPoint::Before(inst)));
        out.extend(placed(EdgePlacement::EndOfPred(inst)));

        out
    }

    /// Everything that has to be emitted right after `inst`, in order.
    pub fn emit_after(&self, inst: Inst) -> Vec<&Edit> {
        self.edits_at(InsertPoint::After(inst)).collect()
    }

    /// The number of bytes the spill area of the frame needs.
    #[inline]
    pub fn spill_area_size(&self) -> u32 {
        self.spill_area_size
    }

    /// Every callee-saved register the function writes to, which the
    /// prologue and epilogue have to preserve.
    #[inline]
    pub fn callee_saved_used(&self) -> RegSet {
        self.callee_saved_used
    }

    /// Counters for the allocation.
    #[inline]
    pub fn stats(&self) -> &AllocStats {
        &self.stats
    }

    fn edge_loop_depth(&self, from: MIRBlock, to: MIRBlock) -> u32 {
        let depth = |b: MIRBlock| self.loop_depths.get(b.as_u32() as usize).copied().unwrap_or(0);

        depth(from).max(depth(to))
    }
}

impl Display for Allocation {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(f, "allocation for `{}`:", self.function)?;

        for (vreg, home) in self.homes.iter() {
            let Some(home) = home else { continue };

            write!(f, "  {vreg}:")?;

            if let Some(reg) = home.reg {
                write!(f, " {reg}")?;
            }

            if let (Some(slot), Some(at)) = (home.slot, home.spilled_at) {
                write!(f, " then {slot} from {at}")?;
            } else if let Some(slot) = home.slot {
                write!(f, " (saved in {slot})")?;
            }

            writeln!(f)?;
        }

        for (point, edit) in self.edits.iter() {
            writeln!(f, "  {point}: {edit}")?;
        }

        for edge in self.edges.iter() {
            writeln!(f, "  {} -> {} ({:?}):", edge.from, edge.to, edge.placement)?;

            for edit in edge.moves.iter() {
                writeln!(f, "    {edit}")?;
            }
        }

        write!(
            f,
            "  spill area: {} bytes, {} values spilled",
            self.spill_area_size, self.stats.spilled_values
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::ArenaKey;

    #[test]
    fn homes_switch_to_the_stack() {
        let home = Home {
            reg: Some(PReg::int(3)),
            slot: Some(SpillSlot::at_offset(8)),
            spilled_at: Some(ProgramPoint::from_raw(10)),
        };

        assert_eq!(
            home.location_at(ProgramPoint::from_raw(9)),
            Some(Location::Reg(PReg::int(3)))
        );
        assert_eq!(
            home.location_at(ProgramPoint::from_raw(10)),
            Some(Location::Stack(SpillSlot::at_offset(8)))
        );

        // a register-only value never moves, even if it has a save slot
        let saved = Home {
            spilled_at: None,
            ..home
        };

        assert_eq!(
            saved.location_at(ProgramPoint::from_raw(100)),
            Some(Location::Reg(PReg::int(3)))
        );
    }

    #[test]
    fn insert_points_are_ordered() {
        let i1 = Inst::key_new(1);
        let i2 = Inst::key_new(2);

        assert!(InsertPoint::Before(i1) < InsertPoint::After(i1));
        assert!(InsertPoint::After(i1) < InsertPoint::Before(i2));
    }

    #[test]
    fn edits_display() {
        let edit = Edit::new(
            EditKind::Reload,
            Location::Stack(SpillSlot::at_offset(16)),
            Location::Reg(PReg::float(2)),
            RegClass::Float,
        );

        assert_eq!(edit.to_string(), "reload %f2 <- [spill+16]");
    }
}
