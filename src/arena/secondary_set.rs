//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use crate::arena::ArenaKey;
use smallbitvec::{sbvec, SmallBitVec};
use std::fmt;
use std::fmt::{Debug, Formatter};
use std::marker::PhantomData;

#[cfg(feature = "enable-serde")]
use serde::{ser::SerializeSeq, Deserialize, Deserializer, Serialize, Serializer};

/// A set of keys from some arena, stored as one bit per key.
///
/// This is what liveness sets are made of, so the set operations that the
/// dataflow solver needs report whether they changed anything.
#[derive(Clone)]
pub struct SecondarySet<K: ArenaKey> {
    bits: SmallBitVec,
    cardinality: usize,
    _unused: PhantomData<fn() -> K>,
}

impl<K: ArenaKey> SecondarySet<K> {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self {
            bits: SmallBitVec::new(),
            cardinality: 0,
            _unused: PhantomData,
        }
    }

    /// Creates an empty set with room for keys below `cap`.
    pub fn with_capacity(cap: usize) -> Self {
        Self {
            bits: sbvec![false; cap],
            cardinality: 0,
            _unused: PhantomData,
        }
    }

    /// The number of keys in the set.
    #[inline]
    pub fn cardinality(&self) -> usize {
        self.cardinality
    }

    /// Checks if the set has no keys.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cardinality == 0
    }

    /// Checks if `key` is in the set.
    #[inline]
    pub fn contains(&self, key: K) -> bool {
        self.bits.get(key.key_index()).unwrap_or(false)
    }

    /// Adds `key`, returning whether it was already present.
    pub fn insert(&mut self, key: K) -> bool {
        let idx = key.key_index();

        if idx >= self.bits.len() {
            self.bits.resize(idx + 1, false);
        }

        let old = self.bits[idx];

        self.cardinality += !old as usize;
        self.bits.set(idx, true);

        old
    }

    /// Removes `key`, returning whether it was present.
    pub fn remove(&mut self, key: K) -> bool {
        let idx = key.key_index();

        if idx >= self.bits.len() {
            return false;
        }

        let old = self.bits[idx];

        self.cardinality -= old as usize;
        self.bits.set(idx, false);

        old
    }

    /// Adds every key of `other` into `self`. Returns whether `self` grew.
    pub fn union_with(&mut self, other: &Self) -> bool {
        let before = self.cardinality;

        for key in other.keys() {
            self.insert(key);
        }

        self.cardinality != before
    }

    /// Removes every key of `other` from `self`.
    pub fn subtract(&mut self, other: &Self) {
        for key in other.keys() {
            self.remove(key);
        }
    }

    /// Replaces the contents of `self` with the contents of `other`,
    /// reusing the existing allocation where possible.
    pub fn copy_from(&mut self, other: &Self) {
        self.clear();
        self.union_with(other);
    }

    /// Removes every key, keeping the allocation.
    pub fn clear(&mut self) {
        self.bits.clear();
        self.cardinality = 0;
    }

    /// Every key in the set, in ascending index order.
    pub fn keys(&self) -> impl Iterator<Item = K> + '_ {
        self.bits
            .iter()
            .enumerate()
            .filter(|(_, bit)| *bit)
            .map(|(i, _)| K::key_new(i))
    }
}

impl<K: ArenaKey> Default for SecondarySet<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: ArenaKey> PartialEq for SecondarySet<K> {
    fn eq(&self, other: &Self) -> bool {
        self.cardinality == other.cardinality && self.keys().all(|k| other.contains(k))
    }
}

impl<K: ArenaKey> Eq for SecondarySet<K> {}

impl<K: ArenaKey> Debug for SecondarySet<K> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "SecondarySet ")?;

        f.debug_list().entries(self.keys()).finish()
    }
}

impl<K: ArenaKey> FromIterator<K> for SecondarySet<K> {
    fn from_iter<T: IntoIterator<Item = K>>(iter: T) -> Self {
        let mut set = Self::new();

        for key in iter {
            set.insert(key);
        }

        set
    }
}

// serialized as the sorted list of indices in the set
#[cfg(feature = "enable-serde")]
impl<K: ArenaKey> Serialize for SecondarySet<K> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut seq = serializer.serialize_seq(Some(self.cardinality()))?;

        for key in self.keys() {
            seq.serialize_element(&(key.key_index() as u64))?;
        }

        seq.end()
    }
}

#[cfg(feature = "enable-serde")]
impl<'de, K: ArenaKey> Deserialize<'de> for SecondarySet<K> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let indices = Vec::<u64>::deserialize(deserializer)?;

        Ok(indices
            .into_iter()
            .map(|i| K::key_new(i as usize))
            .collect())
    }
}
