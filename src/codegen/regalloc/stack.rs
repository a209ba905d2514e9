//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use crate::codegen::regalloc::ProgramPoint;
use crate::codegen::RegClass;
use std::fmt;
use std::fmt::{Display, Formatter};

/// A slot in the spill area of a stack frame, identified by its byte offset
/// from the start of the area.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
#[cfg_attr(feature = "enable-serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SpillSlot(u32);

impl SpillSlot {
    /// Creates a slot at a given offset.
    #[inline]
    pub const fn at_offset(offset: u32) -> Self {
        Self(offset)
    }

    /// The offset of the slot from the start of the spill area.
    #[inline]
    pub const fn offset(self) -> u32 {
        self.0
    }
}

impl Display for SpillSlot {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "[spill+{}]", self.0)
    }
}

#[derive(Copy, Clone, Debug)]
struct SlotData {
    slot: SpillSlot,
    owner_end: ProgramPoint,
}

/// Hands out spill slots for a single function.
///
/// Slots are kept in one free list per class (and therefore per size). A
/// slot can go to a new value once the last point of its previous owner is
/// before the start of the new value.
#[derive(Clone, Debug, Default)]
pub(crate) struct SpillSlots {
    lists: [Vec<SlotData>; 2],
    scratch: [Option<SpillSlot>; 2],
    size: u32,
    reuse: bool,
}

impl SpillSlots {
    pub(crate) fn reset(&mut self, reuse: bool) {
        for list in self.lists.iter_mut() {
            list.clear();
        }

        self.scratch = [None, None];
        self.size = 0;
        self.reuse = reuse;
    }

    /// Gets a slot for a value of `class` that lives over `[start, end]`.
    pub(crate) fn allocate(
        &mut self,
        class: RegClass,
        start: ProgramPoint,
        end: ProgramPoint,
    ) -> SpillSlot {
        if self.reuse {
            let list = &mut self.lists[class.index()];

            if let Some(data) = list.iter_mut().find(|data| data.owner_end < start) {
                data.owner_end = end;

                return data.slot;
            }
        }

        let slot = self.carve(class);

        self.lists[class.index()].push(SlotData {
            slot,
            owner_end: end,
        });

        slot
    }

    /// The slot the move resolver uses to break cycles when it has no
    /// register to spare. It is created the first time it is asked for.
    pub(crate) fn scratch(&mut self, class: RegClass) -> SpillSlot {
        match self.scratch[class.index()] {
            Some(slot) => slot,
            None => {
                let slot = self.carve(class);

                self.scratch[class.index()] = Some(slot);

                slot
            }
        }
    }

    /// The number of bytes the spill area needs.
    #[inline]
    pub(crate) fn size(&self) -> u32 {
        self.size
    }

    // slots are aligned to their own size
    fn carve(&mut self, class: RegClass) -> SpillSlot {
        let size = class.spill_size();
        let offset = (self.size + size - 1) / size * size;

        self.size = offset + size;

        SpillSlot::at_offset(offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pp(raw: u32) -> ProgramPoint {
        ProgramPoint::from_raw(raw)
    }

    #[test]
    fn slots_are_aligned_to_their_size() {
        let mut slots = SpillSlots::default();

        slots.reset(true);

        let a = slots.allocate(RegClass::Int, pp(0), pp(10));
        let b = slots.allocate(RegClass::Float, pp(0), pp(10));
        let c = slots.allocate(RegClass::Int, pp(0), pp(10));

        assert_eq!(a.offset(), 0);
        assert_eq!(b.offset(), 16);
        assert_eq!(c.offset(), 32);
        assert_eq!(slots.size(), 40);
    }

    #[test]
    fn dead_slots_are_reused() {
        let mut slots = SpillSlots::default();

        slots.reset(true);

        let a = slots.allocate(RegClass::Int, pp(0), pp(4));
        let b = slots.allocate(RegClass::Int, pp(2), pp(8));
        let c = slots.allocate(RegClass::Int, pp(5), pp(9));

        assert_ne!(a, b);
        assert_eq!(a, c);
        assert_eq!(slots.size(), 16);

        // the owner of `a` now ends at 9, and float slots never mix with int slots
        let d = slots.allocate(RegClass::Int, pp(9), pp(12));
        let e = slots.allocate(RegClass::Float, pp(20), pp(22));

        assert_ne!(d, a);
        assert_ne!(e, b);
    }

    #[test]
    fn reuse_can_be_disabled() {
        let mut slots = SpillSlots::default();

        slots.reset(false);

        let a = slots.allocate(RegClass::Int, pp(0), pp(1));
        let b = slots.allocate(RegClass::Int, pp(5), pp(6));

        assert_ne!(a, b);
    }

    #[test]
    fn scratch_slot_is_created_once() {
        let mut slots = SpillSlots::default();

        slots.reset(true);

        let s = slots.scratch(RegClass::Int);

        assert_eq!(slots.scratch(RegClass::Int), s);
        assert_eq!(slots.size(), 8);
        assert_eq!(slots.allocate(RegClass::Int, pp(0), pp(1)).offset(), 8);
    }
}
