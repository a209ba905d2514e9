//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2023 Evan Cox <evanacox00@gmail.com>. All rights reserved.      //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use crate::codegen::{PReg, RegisterInfo};
use std::sync::OnceLock;

const X_NAMES: [&str; 31] = [
    "x0", "x1", "x2", "x3", "x4", "x5", "x6", "x7", "x8", "x9", "x10", "x11", "x12", "x13", "x14",
    "x15", "x16", "x17", "x18", "x19", "x20", "x21", "x22", "x23", "x24", "x25", "x26", "x27",
    "x28", "x29", "x30",
];

const V_NAMES: [&str; 32] = [
    "v0", "v1", "v2", "v3", "v4", "v5", "v6", "v7", "v8", "v9", "v10", "v11", "v12", "v13", "v14",
    "v15", "v16", "v17", "v18", "v19", "v20", "v21", "v22", "v23", "v24", "v25", "v26", "v27",
    "v28", "v29", "v30", "v31",
];

/// The AAPCS64 register conventions.
///
/// `x18` (platform register), `x28`, the frame pointer `x29` and the link
/// register `x30` are never allocated. `x27` and `v31` are the scratch
/// registers for the move resolver.
pub fn arm64() -> &'static RegisterInfo {
    static INFO: OnceLock<RegisterInfo> = OnceLock::new();

    INFO.get_or_init(|| {
        let mut builder = RegisterInfo::builder("arm64");

        for (number, name) in X_NAMES.into_iter().enumerate() {
            let reg = PReg::int(number);

            builder = match number {
                0..=17 => builder.caller_saved(reg, name),
                19..=26 => builder.callee_saved(reg, name),
                27 => builder.scratch(reg, name),
                _ => builder.reserved(reg, name),
            };
        }

        for (number, name) in V_NAMES.into_iter().enumerate() {
            let reg = PReg::float(number);

            // only the low 64 bits of v8-v15 are preserved, which is all a
            // scalar float needs
            builder = match number {
                8..=15 => builder.callee_saved(reg, name),
                31 => builder.scratch(reg, name),
                _ => builder.caller_saved(reg, name),
            };
        }

        builder.build()
    })
}
