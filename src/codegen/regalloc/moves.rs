//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2023 Evan Cox <evanacox00@gmail.com>. All rights reserved.      //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use crate::codegen::regalloc::stack::SpillSlots;
use crate::codegen::regalloc::{Edit, EditKind, Location};
use crate::codegen::{PReg, RegClass, RegSet};
use log::trace;
use smallvec::SmallVec;

/// A set of copies that conceptually all happen at the same time, like
/// the moves needed on one control-flow edge.
///
/// Every destination is written at most once, but any location can be read
/// by several moves and written by another one.
#[derive(Clone, Debug, Default)]
pub(crate) struct ParallelMoves {
    pending: SmallVec<[(Location, Location); 8]>,
    parked: Option<Location>,
}

/// What [`ParallelMoves::sequentialize`] may clobber for one class.
#[derive(Copy, Clone, Debug)]
pub(crate) struct Temporaries {
    /// The scratch register of the class, if the target has one.
    pub(crate) scratch: Option<PReg>,
    /// Caller-saved allocatable registers of the class that hold nothing live.
    pub(crate) free: RegSet,
}

impl ParallelMoves {
    pub(crate) fn clear(&mut self) {
        self.pending.clear();
        self.parked = None;
    }

    /// Adds a copy. Copies of a location to itself are dropped.
    pub(crate) fn add(&mut self, from: Location, to: Location) {
        debug_assert!(
            self.pending.iter().all(|&(_, dst)| dst != to),
            "{to} is written twice by one parallel move"
        );

        if from != to {
            self.pending.push((from, to));
        }
    }

    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Turns the copies into a sequence that gives the same result when run
    /// one after another, appending it to `out`.
    ///
    /// Copies are emitted once nothing else still needs to read their
    /// destination. When every remaining copy is blocked they form cycles,
    /// and one is broken by parking a source in a temporary: the scratch
    /// register, then a free register, then the scratch slot of the class.
    pub(crate) fn sequentialize(
        &mut self,
        class: RegClass,
        temps: Temporaries,
        slots: &mut SpillSlots,
        kind: EditKind,
        out: &mut Vec<Edit>,
    ) {
        while !self.pending.is_empty() {
            let ready = self
                .pending
                .iter()
                .position(|&(_, to)| !self.pending.iter().any(|&(from, _)| from == to));

            if let Some(idx) = ready {
                let (from, to) = self.pending.remove(idx);

                self.emit(from, to, class, temps, kind, out);

                if self.parked == Some(from) && !self.pending.iter().any(|&(src, _)| src == from) {
                    self.parked = None;
                }

                continue;
            }

            let (from, to) = self.pending.remove(0);
            let temp = self.pick_temporary(class, temps, slots);

            trace!("breaking a move cycle through {temp}");

            self.emit(from, temp, class, temps, kind, out);
            self.pending.push((temp, to));
            self.parked = Some(temp);
        }

        self.parked = None;
    }

    fn pick_temporary(
        &self,
        class: RegClass,
        temps: Temporaries,
        slots: &mut SpillSlots,
    ) -> Location {
        self.free_register(temps)
            .map(Location::Reg)
            .unwrap_or_else(|| Location::Stack(slots.scratch(class)))
    }

    // a register nothing pending reads or writes and nothing is parked in
    fn free_register(&self, temps: Temporaries) -> Option<PReg> {
        let touched = |reg: PReg| {
            self.parked == Some(Location::Reg(reg))
                || self
                    .pending
                    .iter()
                    .any(|&(from, to)| from == Location::Reg(reg) || to == Location::Reg(reg))
        };

        temps
            .scratch
            .into_iter()
            .chain(temps.free.iter())
            .find(|&reg| !touched(reg))
    }

    fn emit(
        &self,
        from: Location,
        to: Location,
        class: RegClass,
        temps: Temporaries,
        kind: EditKind,
        out: &mut Vec<Edit>,
    ) {
        match (from, to) {
            (Location::Stack(_), Location::Stack(_)) => match self.free_register(temps) {
                Some(via) => {
                    out.push(Edit::new(kind, from, Location::Reg(via), class));
                    out.push(Edit::new(kind, Location::Reg(via), to, class));
                }
                None => out.push(Edit::new(kind, from, to, class)),
            },
            _ => out.push(Edit::new(kind, from, to, class)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::regalloc::{ProgramPoint, SpillSlot};
    use crate::utility::SaHashMap;

    fn r(n: usize) -> Location {
        Location::Reg(PReg::int(n))
    }

    fn s(offset: u32) -> Location {
        Location::Stack(SpillSlot::at_offset(offset))
    }

    // runs the edits on a machine where every location starts out holding its own name
    fn run(edits: &[Edit], locations: &[Location]) -> SaHashMap<Location, Location> {
        let mut state: SaHashMap<_, _> = locations.iter().map(|&l| (l, l)).collect();

        for edit in edits {
            let value = state.get(&edit.from).copied().unwrap_or(edit.from);

            state.insert(edit.to, value);
        }

        state
    }

    fn sequence(
        moves: &[(Location, Location)],
        temps: Temporaries,
    ) -> (Vec<Edit>, SpillSlots) {
        let mut slots = SpillSlots::default();
        let mut parallel = ParallelMoves::default();
        let mut out = Vec::new();

        slots.reset(true);

        // the slots at offsets 0 and 8 belong to values
        slots.allocate(RegClass::Int, ProgramPoint::from_raw(0), ProgramPoint::from_raw(100));
        slots.allocate(RegClass::Int, ProgramPoint::from_raw(0), ProgramPoint::from_raw(100));

        for &(from, to) in moves {
            parallel.add(from, to);
        }

        parallel.sequentialize(RegClass::Int, temps, &mut slots, EditKind::EdgeMove, &mut out);

        (out, slots)
    }

    fn with_scratch() -> Temporaries {
        Temporaries {
            scratch: Some(PReg::int(9)),
            free: RegSet::EMPTY,
        }
    }

    #[test]
    fn chains_are_ordered_without_temporaries() {
        let moves = [(r(0), r(1)), (r(1), r(2)), (r(2), r(3))];
        let (out, _) = sequence(&moves, with_scratch());
        let state = run(&out, &[r(0), r(1), r(2), r(3)]);

        assert_eq!(out.len(), 3);
        assert_eq!(state[&r(1)], r(0));
        assert_eq!(state[&r(2)], r(1));
        assert_eq!(state[&r(3)], r(2));
    }

    #[test]
    fn swaps_go_through_scratch() {
        let moves = [(r(0), r(1)), (r(1), r(0))];
        let (out, _) = sequence(&moves, with_scratch());
        let state = run(&out, &[r(0), r(1)]);

        assert_eq!(out.len(), 3);
        assert!(out.iter().any(|e| e.to == r(9)));
        assert_eq!(state[&r(0)], r(1));
        assert_eq!(state[&r(1)], r(0));
    }

    #[test]
    fn rotations_with_fan_out() {
        let moves = [(r(0), r(1)), (r(1), r(2)), (r(2), r(0)), (r(0), r(3))];
        let (out, _) = sequence(&moves, with_scratch());
        let state = run(&out, &[r(0), r(1), r(2), r(3)]);

        assert_eq!(state[&r(0)], r(2));
        assert_eq!(state[&r(1)], r(0));
        assert_eq!(state[&r(2)], r(1));
        assert_eq!(state[&r(3)], r(0));
    }

    #[test]
    fn cycles_use_free_registers_without_scratch() {
        let temps = Temporaries {
            scratch: None,
            free: RegSet::from_regs(&[PReg::int(5)]),
        };
        let moves = [(r(0), r(1)), (r(1), r(0))];
        let (out, slots) = sequence(&moves, temps);
        let state = run(&out, &[r(0), r(1)]);

        assert!(out.iter().any(|e| e.to == r(5)));
        assert_eq!(slots.size(), 16);
        assert_eq!(state[&r(0)], r(1));
        assert_eq!(state[&r(1)], r(0));
    }

    #[test]
    fn cycles_fall_back_to_the_scratch_slot() {
        let temps = Temporaries {
            scratch: None,
            free: RegSet::EMPTY,
        };
        let moves = [(r(0), s(0)), (s(0), r(0))];
        let (out, slots) = sequence(&moves, temps);
        let state = run(&out, &[r(0), s(0)]);

        assert_eq!(slots.size(), 24);
        assert!(out.iter().any(|e| e.to == s(16)));
        assert_eq!(state[&r(0)], s(0));
        assert_eq!(state[&s(0)], r(0));
    }

    #[test]
    fn memory_to_memory_goes_through_a_register() {
        let moves = [(s(0), s(8))];
        let (out, _) = sequence(&moves, with_scratch());

        assert_eq!(out.len(), 2);
        assert_eq!(out[0].to, r(9));
        assert_eq!(out[1].from, r(9));

        let temps = Temporaries {
            scratch: None,
            free: RegSet::EMPTY,
        };
        let (out, _) = sequence(&moves, temps);

        assert_eq!(out.len(), 1);
        assert_eq!((out[0].from, out[0].to), (s(0), s(8)));
    }

    #[test]
    fn identity_moves_vanish() {
        let (out, _) = sequence(&[(r(0), r(0)), (s(8), s(8))], with_scratch());

        assert!(out.is_empty());
    }
}
