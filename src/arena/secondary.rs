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

/// A map that associates extra data with keys from some other arena.
///
/// Every key maps to a value, keys that were never written map to a
/// copy of the default value the map was created with. Reading never allocates,
/// writing through [`IndexMut`] grows the map to fit the key.
///
/// ```
/// # use garnet::dense_arena_key;
/// # use garnet::arena::*;
/// dense_arena_key! { struct Block; }
///
/// let mut blocks = ArenaMap::new();
/// let b0: Block = blocks.insert("entry");
/// let b1: Block = blocks.insert("exit");
///
/// let mut depth = SecondaryMap::with_default(0u32);
/// depth[b1] = 2;
///
/// assert_eq!(depth[b0], 0);
/// assert_eq!(depth[b1], 2);
/// ```
#[derive(Clone)]
pub struct SecondaryMap<K: ArenaKey, V: Clone> {
    slots: Vec<V>,
    default: V,
    _unused: PhantomData<fn() -> K>,
}

impl<K: ArenaKey, V: Clone + Default> SecondaryMap<K, V> {
    /// Creates an empty map that uses `V::default()` for missing keys.
    #[inline]
    pub fn new() -> Self {
        Self::with_default(V::default())
    }
}

impl<K: ArenaKey, V: Clone> SecondaryMap<K, V> {
    /// Creates an empty map that uses `default` for missing keys.
    #[inline]
    pub fn with_default(default: V) -> Self {
        Self {
            slots: Vec::new(),
            default,
            _unused: PhantomData,
        }
    }

    /// Creates a map that already has room for `capacity` keys.
    pub fn with_capacity(capacity: usize, default: V) -> Self {
        let mut map = Self::with_default(default);

        map.resize(capacity);

        map
    }

    /// Gets the value for `key`, or the default value if `key` was never written.
    #[inline]
    pub fn get(&self, key: K) -> &V {
        self.slots.get(key.key_index()).unwrap_or(&self.default)
    }

    /// Sets the value for `key`, returning what was there before.
    pub fn insert(&mut self, key: K, value: V) -> V {
        std::mem::replace(&mut self[key], value)
    }

    /// Grows the map so every key with an index below `len` has a slot.
    pub fn resize(&mut self, len: usize) {
        if len > self.slots.len() {
            self.slots.resize(len, self.default.clone());
        }
    }

    /// Resets every slot back to the default while keeping the allocation,
    /// so the map can be reused for another function.
    pub fn clear(&mut self) {
        self.slots.clear();
    }

    /// The number of slots the map has, which is one past the highest key
    /// that has been written.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Every slot in the map mutably, including slots that only hold the default.
    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut V> + '_ {
        self.slots.iter_mut()
    }

    /// Every slot in the map, including slots that only hold the default.
    pub fn iter(&self) -> impl Iterator<Item = (K, &V)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .map(|(i, v)| (K::key_new(i), v))
    }

    /// Every slot in the map along with its key, mutably.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (K, &mut V)> + '_ {
        self.slots
            .iter_mut()
            .enumerate()
            .map(|(i, v)| (K::key_new(i), v))
    }
}

impl<K: ArenaKey, V: Clone + Default> Default for SecondaryMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: ArenaKey, V: Clone> Index<K> for SecondaryMap<K, V> {
    type Output = V;

    #[inline]
    fn index(&self, key: K) -> &Self::Output {
        self.get(key)
    }
}

impl<K: ArenaKey, V: Clone> IndexMut<K> for SecondaryMap<K, V> {
    #[inline]
    fn index_mut(&mut self, key: K) -> &mut Self::Output {
        let idx = key.key_index();

        if idx >= self.slots.len() {
            self.resize(idx + 1);
        }

        &mut self.slots[idx]
    }
}

impl<K: ArenaKey, V: Clone + Debug> Debug for SecondaryMap<K, V> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "SecondaryMap ")?;

        f.debug_map().entries(self.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::ArenaMap;
    use crate::dense_arena_key;

    dense_arena_key! { struct E; }

    #[test]
    fn missing_keys_read_default() {
        let mut primary = ArenaMap::new();
        let k1: E = primary.insert(());
        let map = SecondaryMap::<E, i32>::with_default(-1);

        assert_eq!(map[k1], -1);
        assert_eq!(map.capacity(), 0);
    }

    #[test]
    fn writes_grow_the_map() {
        let mut primary = ArenaMap::new();

        for _ in 0..100 {
            let _: E = primary.insert(());
        }

        let last: E = primary.insert(());
        let mut map = SecondaryMap::<E, i32>::new();

        map[last] = 7;

        assert_eq!(map.capacity(), 101);
        assert_eq!(map[last], 7);
        assert!(primary.keys().filter(|k| *k != last).all(|k| map[k] == 0));
    }

    #[test]
    fn insert_returns_old_value() {
        let mut map = SecondaryMap::<E, &str>::with_default("none");

        assert_eq!(map.insert(E::key_new(3), "a"), "none");
        assert_eq!(map.insert(E::key_new(3), "b"), "a");
    }

    #[test]
    fn clear_resets_to_default() {
        let mut map = SecondaryMap::<E, i32>::new();

        map[E::key_new(4)] = 12;
        map.clear();

        assert_eq!(map[E::key_new(4)], 0);
    }
}
