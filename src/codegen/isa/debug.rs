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

/// A tiny target with three allocatable registers and one scratch
/// register per class. The third register of each class survives calls.
pub fn debug3reg() -> &'static RegisterInfo {
    static INFO: OnceLock<RegisterInfo> = OnceLock::new();

    INFO.get_or_init(|| {
        RegisterInfo::builder("debug3reg")
            .caller_saved(PReg::int(0), "r0")
            .caller_saved(PReg::int(1), "r1")
            .callee_saved(PReg::int(2), "r2")
            .scratch(PReg::int(3), "r3")
            .caller_saved(PReg::float(0), "f0")
            .caller_saved(PReg::float(1), "f1")
            .callee_saved(PReg::float(2), "f2")
            .scratch(PReg::float(3), "f3")
            .build()
    })
}
