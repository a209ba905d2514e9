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
use std::fmt;
use std::fmt::{Debug, Formatter};
use std::marker::PhantomData;
use std::ops::{Index, IndexMut};

#[cfg(feature = "enable-serde")]
use serde::{Deserialize, Serialize};

/// The primary arena. Values can be inserted but never removed, and every
/// insertion hands back a fresh key that stays valid until [`Self::clear`].
///
/// ```
/// # use garnet::dense_arena_key;
/// # use garnet::arena::ArenaMap;
/// dense_arena_key! { struct Block; }
///
/// let mut blocks = ArenaMap::new();
/// let entry: Block = blocks.insert("entry");
///
/// assert_eq!(blocks[entry], "entry");
/// assert_eq!(blocks.len(), 1);
/// ```
#[derive(Clone, PartialEq, Eq)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct ArenaMap<K: ArenaKey, V> {
    slots: Vec<V>,
    _unused: PhantomData<fn() -> K>,
}

impl<K: ArenaKey, V> ArenaMap<K, V> {
    /// Creates an empty arena.
    #[inline]
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            _unused: PhantomData,
        }
    }

    /// Creates an empty arena that can hold `capacity` values without reallocating.
    #[inline]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            _unused: PhantomData,
        }
    }

    /// Inserts a value and returns the key that refers to it.
    #[inline]
    pub fn insert(&mut self, value: V) -> K {
        let key = K::key_new(self.slots.len());

        self.slots.push(value);

        key
    }

    /// Checks whether `key` was handed out by this arena.
    #[inline]
    pub fn contains(&self, key: K) -> bool {
        key.key_index() < self.slots.len()
    }

    /// Gets the value for `key`, if it exists.
    #[inline]
    pub fn get(&self, key: K) -> Option<&V> {
        self.slots.get(key.key_index())
    }

    /// Gets the value for `key` mutably, if it exists.
    #[inline]
    pub fn get_mut(&mut self, key: K) -> Option<&mut V> {
        self.slots.get_mut(key.key_index())
    }

    /// The number of values in the arena.
    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Checks if the arena has no values.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Removes every value while keeping the underlying allocation around.
    /// Any keys handed out before this are invalidated.
    #[inline]
    pub fn clear(&mut self) {
        self.slots.clear();
    }

    /// Every key in the arena, in insertion order.
    pub fn keys(&self) -> impl DoubleEndedIterator<Item = K> + ExactSizeIterator + '_ {
        (0..self.slots.len()).map(K::key_new)
    }

    /// Every value in the arena, in insertion order.
    pub fn values(&self) -> impl DoubleEndedIterator<Item = &V> + ExactSizeIterator + '_ {
        self.slots.iter()
    }

    /// Every value in the arena mutably, in insertion order.
    pub fn values_mut(&mut self) -> impl DoubleEndedIterator<Item = &mut V> + '_ {
        self.slots.iter_mut()
    }

    /// Every key/value pair in the arena.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (K, &V)> + ExactSizeIterator + '_ {
        self.slots
            .iter()
            .enumerate()
            .map(|(i, v)| (K::key_new(i), v))
    }

    /// Every key/value pair in the arena, values borrowed mutably.
    pub fn iter_mut(&mut self) -> impl DoubleEndedIterator<Item = (K, &mut V)> + '_ {
        self.slots
            .iter_mut()
            .enumerate()
            .map(|(i, v)| (K::key_new(i), v))
    }
}

impl<K: ArenaKey, V> Default for ArenaMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: ArenaKey, V> Index<K> for ArenaMap<K, V> {
    type Output = V;

    #[inline]
    fn index(&self, key: K) -> &Self::Output {
        &self.slots[key.key_index()]
    }
}

impl<K: ArenaKey, V> IndexMut<K> for ArenaMap<K, V> {
    #[inline]
    fn index_mut(&mut self, key: K) -> &mut Self::Output {
        &mut self.slots[key.key_index()]
    }
}

impl<K: ArenaKey, V: Debug> Debug for ArenaMap<K, V> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "ArenaMap ")?;

        f.debug_map().entries(self.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dense_arena_key;

    dense_arena_key! { struct E; }

    #[test]
    fn insert_and_get() {
        let mut map = ArenaMap::<E, &str>::new();
        let k1 = map.insert("a");
        let k2 = map.insert("b");

        assert_eq!(map.get(k1), Some(&"a"));
        assert_eq!(map.get(k2), Some(&"b"));
        assert_eq!(map.get(E::key_new(2)), None);
        assert!(map.contains(k2));
    }

    #[test]
    fn keys_are_in_insertion_order() {
        let mut map = ArenaMap::<E, i32>::new();
        let ks: Vec<E> = (0..5).map(|i| map.insert(i)).collect();

        assert_eq!(map.keys().collect::<Vec<_>>(), ks);
        assert_eq!(map.values().copied().sum::<i32>(), 10);
    }

    #[test]
    fn clear_invalidates_keys() {
        let mut map = ArenaMap::<E, i32>::new();
        let k = map.insert(3);

        map.clear();

        assert!(!map.contains(k));
        assert!(map.is_empty());
    }
}
