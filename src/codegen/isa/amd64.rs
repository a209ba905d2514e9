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

const XMM_NAMES: [&str; 16] = [
    "xmm0", "xmm1", "xmm2", "xmm3", "xmm4", "xmm5", "xmm6", "xmm7", "xmm8", "xmm9", "xmm10",
    "xmm11", "xmm12", "xmm13", "xmm14", "xmm15",
];

/// The System V register conventions for x86-64.
///
/// `rsp` and `rbp` are never allocated, `r11` and `xmm15` are the scratch
/// registers for the move resolver. Every XMM register is clobbered by calls.
pub fn amd64() -> &'static RegisterInfo {
    static INFO: OnceLock<RegisterInfo> = OnceLock::new();

    INFO.get_or_init(|| {
        let mut builder = RegisterInfo::builder("amd64")
            .caller_saved(PReg::int(0), "rax")
            .caller_saved(PReg::int(1), "rcx")
            .caller_saved(PReg::int(2), "rdx")
            .caller_saved(PReg::int(6), "rsi")
            .caller_saved(PReg::int(7), "rdi")
            .caller_saved(PReg::int(8), "r8")
            .caller_saved(PReg::int(9), "r9")
            .caller_saved(PReg::int(10), "r10")
            .callee_saved(PReg::int(3), "rbx")
            .callee_saved(PReg::int(12), "r12")
            .callee_saved(PReg::int(13), "r13")
            .callee_saved(PReg::int(14), "r14")
            .callee_saved(PReg::int(15), "r15")
            .reserved(PReg::int(4), "rsp")
            .reserved(PReg::int(5), "rbp")
            .scratch(PReg::int(11), "r11");

        for (number, name) in XMM_NAMES.into_iter().enumerate().take(15) {
            builder = builder.caller_saved(PReg::float(number), name);
        }

        builder.scratch(PReg::float(15), XMM_NAMES[15]).build()
    })
}
