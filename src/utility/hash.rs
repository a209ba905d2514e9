//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use std::collections::{HashMap, HashSet};

/// A [`HashMap`] that uses `ahash` instead of SipHash. Nothing the allocator
/// hashes comes from untrusted input.
pub type SaHashMap<K, V> = HashMap<K, V, ahash::RandomState>;

/// A [`HashSet`] that uses `ahash`, see [`SaHashMap`].
pub type SaHashSet<V> = HashSet<V, ahash::RandomState>;
