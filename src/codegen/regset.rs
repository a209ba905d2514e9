//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2023 Evan Cox <evanacox00@gmail.com>. All rights reserved.      //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use crate::arena::ArenaKey;
use crate::codegen::{PReg, RegClass, RegisterInfo};
use std::fmt;
use std::fmt::{Debug, Formatter};

#[cfg(feature = "enable-serde")]
use serde::{Deserialize, Serialize};

/// A set of physical registers, one bit per register identity.
///
/// Registers whose identity is 64 or above can never be members. Adding
/// one is silently ignored, and asking about one always answers `false`.
#[derive(Copy, Clone, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct RegSet(u64);

impl RegSet {
    /// The set with no registers in it.
    pub const EMPTY: RegSet = RegSet(0);

    /// Builds a set out of a list of registers.
    pub const fn from_regs(regs: &[PReg]) -> Self {
        let mut set = 0u64;
        let mut i = 0;

        while i < regs.len() {
            let id = regs[i].identity();

            if id < PReg::MAX_IDENTITY {
                set |= 1 << id;
            }

            i += 1;
        }

        Self(set)
    }

    /// Builds a set from a raw bitmask of register identities.
    #[inline]
    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    /// The raw bitmask of register identities.
    #[inline]
    pub const fn bits(self) -> u64 {
        self.0
    }

    /// Checks whether `reg` is in the set.
    #[inline]
    pub const fn has(self, reg: PReg) -> bool {
        let id = reg.identity();

        id < PReg::MAX_IDENTITY && (self.0 & (1 << id)) != 0
    }

    /// Adds `reg` to the set. Identities outside of `0..64` are ignored.
    #[inline]
    pub fn add(&mut self, reg: PReg) {
        let id = reg.identity();

        if id < PReg::MAX_IDENTITY {
            self.0 |= 1 << id;
        }
    }

    /// Removes `reg` from the set.
    #[inline]
    pub fn remove(&mut self, reg: PReg) {
        let id = reg.identity();

        if id < PReg::MAX_IDENTITY {
            self.0 &= !(1 << id);
        }
    }

    /// Returns a copy of the set with `reg` added.
    #[inline]
    pub fn with(mut self, reg: PReg) -> Self {
        self.add(reg);
        self
    }

    /// The number of registers in the set.
    #[inline]
    pub const fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    /// Checks if the set has no registers.
    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Every register that is in `self` or `other`.
    #[inline]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Every register that is in both `self` and `other`.
    #[inline]
    pub const fn intersection(self, other: Self) -> Self {
        Self(self.0 & other.0)
    }

    /// Every register in `self` that is not in `other`.
    #[inline]
    pub const fn difference(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }

    /// Every register of `class` in the set. Classes live in the low bit
    /// of the identity, so this is a mask over alternating bits.
    #[inline]
    pub const fn of_class(self, class: RegClass) -> Self {
        const INT_MASK: u64 = 0x5555_5555_5555_5555;

        match class {
            RegClass::Int => Self(self.0 & INT_MASK),
            RegClass::Float => Self(self.0 & !INT_MASK),
        }
    }

    /// Calls `f` with every register in the set in ascending identity order.
    pub fn range(self, mut f: impl FnMut(PReg)) {
        for reg in self.iter() {
            f(reg)
        }
    }

    /// Iterates over every register in the set in ascending identity order.
    #[inline]
    pub fn iter(self) -> RegSetIter {
        RegSetIter(self.0)
    }

    /// Formats the set as a comma-separated list of register names,
    /// using the names that `info` gives them.
    pub fn format(self, info: &RegisterInfo) -> String {
        self.iter()
            .map(|reg| info.reg_name(reg))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl Debug for RegSet {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl FromIterator<PReg> for RegSet {
    fn from_iter<T: IntoIterator<Item = PReg>>(iter: T) -> Self {
        let mut set = RegSet::EMPTY;

        for reg in iter {
            set.add(reg);
        }

        set
    }
}

impl IntoIterator for RegSet {
    type Item = PReg;
    type IntoIter = RegSetIter;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over the registers in a [`RegSet`].
#[derive(Clone, Debug)]
pub struct RegSetIter(u64);

impl Iterator for RegSetIter {
    type Item = PReg;

    fn next(&mut self) -> Option<Self::Item> {
        if self.0 == 0 {
            return None;
        }

        let id = self.0.trailing_zeros() as usize;

        // clear the lowest set bit
        self.0 &= self.0 - 1;

        Some(PReg::key_new(id))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.0.count_ones() as usize;

        (n, Some(n))
    }
}

impl ExactSizeIterator for RegSetIter {}

/// Maps every physical register to whatever currently occupies it.
///
/// Like [`RegSet`], registers with an identity of 64 or above can never
/// be occupied.
#[derive(Clone, PartialEq, Eq)]
pub struct RegInUseSet<T: Copy> {
    slots: [Option<T>; PReg::MAX_IDENTITY],
}

impl<T: Copy> RegInUseSet<T> {
    /// Creates a set with every register unoccupied.
    pub fn new() -> Self {
        Self {
            slots: [None; PReg::MAX_IDENTITY],
        }
    }

    /// Marks every register as unoccupied.
    pub fn reset(&mut self) {
        self.slots = [None; PReg::MAX_IDENTITY];
    }

    /// Checks whether `reg` is occupied.
    #[inline]
    pub fn has(&self, reg: PReg) -> bool {
        self.get(reg).is_some()
    }

    /// Gets whatever occupies `reg`.
    #[inline]
    pub fn get(&self, reg: PReg) -> Option<T> {
        self.slots.get(reg.identity()).copied().flatten()
    }

    /// Marks `reg` as occupied by `value`. Identities outside of `0..64` are ignored.
    #[inline]
    pub fn add(&mut self, reg: PReg, value: T) {
        if let Some(slot) = self.slots.get_mut(reg.identity()) {
            *slot = Some(value);
        }
    }

    /// Marks `reg` as unoccupied, returning whatever was there.
    #[inline]
    pub fn remove(&mut self, reg: PReg) -> Option<T> {
        self.slots.get_mut(reg.identity()).and_then(Option::take)
    }

    /// Calls `f` with every occupied register and its occupant, in ascending
    /// identity order.
    pub fn range(&self, mut f: impl FnMut(PReg, T)) {
        for (id, slot) in self.slots.iter().enumerate() {
            if let Some(value) = slot {
                f(PReg::key_new(id), *value);
            }
        }
    }

    /// The set of occupied registers.
    pub fn occupied(&self) -> RegSet {
        let mut set = RegSet::EMPTY;

        self.range(|reg, _| set.add(reg));

        set
    }
}

impl<T: Copy + fmt::Display> RegInUseSet<T> {
    /// Formats the set as `(reg->value)` pairs separated by commas, using
    /// the register names that `info` gives them.
    pub fn format(&self, info: &RegisterInfo) -> String {
        let mut parts = Vec::new();

        self.range(|reg, value| parts.push(format!("({}->{})", info.reg_name(reg), value)));

        parts.join(", ")
    }
}

impl<T: Copy> Default for RegInUseSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Copy + Debug> Debug for RegInUseSet<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();

        self.range(|reg, value| {
            map.entry(&reg, &value);
        });

        map.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::VReg;

    fn info() -> RegisterInfo {
        RegisterInfo::builder("t")
            .caller_saved(PReg::int(0), "r0")
            .caller_saved(PReg::int(1), "r1")
            .caller_saved(PReg::int(2), "r2")
            .caller_saved(PReg::float(0), "f0")
            .build()
    }

    #[test]
    fn add_has_remove() {
        let mut set = RegSet::EMPTY;

        set.add(PReg::int(1));
        set.add(PReg::float(0));

        assert!(set.has(PReg::int(1)));
        assert!(set.has(PReg::float(0)));
        assert!(!set.has(PReg::int(0)));
        assert_eq!(set.len(), 2);

        set.remove(PReg::int(1));

        assert!(!set.has(PReg::int(1)));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn out_of_range_registers_are_ignored() {
        let mut set = RegSet::EMPTY;
        let huge = PReg::int(40);

        assert_eq!(huge.identity(), 80);

        set.add(huge);

        assert!(set.is_empty());
        assert!(!set.has(huge));
        assert_eq!(RegSet::from_regs(&[huge, PReg::int(0)]).len(), 1);
    }

    #[test]
    fn range_visits_in_ascending_order() {
        let set = RegSet::from_regs(&[PReg::int(2), PReg::int(0), PReg::float(0)]);
        let mut seen = Vec::new();

        set.range(|r| seen.push(r));

        assert_eq!(seen, vec![PReg::int(0), PReg::float(0), PReg::int(2)]);
    }

    #[test]
    fn set_operations() {
        let a = RegSet::from_regs(&[PReg::int(0), PReg::int(1)]);
        let b = RegSet::from_regs(&[PReg::int(1), PReg::float(0)]);

        assert_eq!(a.union(b).len(), 3);
        assert_eq!(a.intersection(b), RegSet::EMPTY.with(PReg::int(1)));
        assert_eq!(a.difference(b), RegSet::EMPTY.with(PReg::int(0)));
        assert_eq!(a.union(b).of_class(RegClass::Float).len(), 1);
    }

    #[test]
    fn format_uses_register_names() {
        let set = RegSet::from_regs(&[PReg::int(2), PReg::int(0)]);

        assert_eq!(set.format(&info()), "r0, r2");
        assert_eq!(RegSet::EMPTY.format(&info()), "");
    }

    #[test]
    fn in_use_set() {
        let mut set = RegInUseSet::<VReg>::new();
        let v1 = VReg::int(1);
        let v2 = VReg::int(2);

        set.add(PReg::int(0), v1);
        set.add(PReg::int(2), v2);
        set.add(PReg::int(40), v2);

        assert!(set.has(PReg::int(0)));
        assert_eq!(set.get(PReg::int(2)), Some(v2));
        assert!(!set.has(PReg::int(40)));
        assert_eq!(set.format(&info()), "(r0->v1), (r2->v2)");

        assert_eq!(set.remove(PReg::int(0)), Some(v1));
        assert!(!set.has(PReg::int(0)));
        assert_eq!(set.occupied(), RegSet::EMPTY.with(PReg::int(2)));

        set.reset();

        assert_eq!(set.occupied(), RegSet::EMPTY);
    }
}
