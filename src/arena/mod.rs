//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

//! A simple typed arena module.
//!
//! Blocks, instructions and spill slots are all small integer keys into
//! these arenas. The allocator keeps one set of these maps per worker and
//! clears them between functions instead of reallocating.
//!
//! ```
//! # use garnet::dense_arena_key;
//! # use garnet::arena::*;
//! dense_arena_key! {
//!     pub struct Node;
//! }
//!
//! let mut arena = ArenaMap::new();
//! let n0: Node = arena.insert("n0");
//! let n1 = arena.insert("n1");
//!
//! let mut visited = SecondarySet::new();
//! visited.insert(n1);
//!
//! assert!(!visited.contains(n0));
//! ```

mod key;
mod map;
mod secondary;
mod secondary_set;

pub use key::ArenaKey;
pub use map::ArenaMap;
pub use secondary::SecondaryMap;
pub use secondary_set::SecondarySet;
