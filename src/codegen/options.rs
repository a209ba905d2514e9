//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2023 Evan Cox <evanacox00@gmail.com>. All rights reserved.      //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

/// Options that change how the register allocator behaves.
///
/// This effectively models the `-fthing` argument pattern in GCC-like
/// compilers, every field has a default that matches a normal release build.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "enable-serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RegAllocOptions {
    /// Whether to run the allocation checker on every result. Failing the
    /// check is reported as an error instead of returning a broken allocation.
    pub verify: bool,

    /// Whether spill slots of values that are no longer live may be handed
    /// to later values. Turning this off gives every spilled value its own slot.
    pub reuse_spill_slots: bool,

    /// Whether edges that need moves but can't hold them (critical edges)
    /// may be split. If this is off, such an edge is an error.
    pub split_critical_edges: bool,
}

impl Default for RegAllocOptions {
    fn default() -> Self {
        Self {
            verify: cfg!(debug_assertions),
            reuse_spill_slots: true,
            split_critical_edges: true,
        }
    }
}
