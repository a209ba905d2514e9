//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2023 Evan Cox <evanacox00@gmail.com>. All rights reserved.      //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

//! Register descriptions for the targets the allocator knows about.

mod amd64;
mod arm64;
mod debug;

use crate::codegen::RegisterInfo;
use std::fmt;
use std::str::FromStr;

pub use amd64::amd64;
pub use arm64::arm64;
pub use debug::debug3reg;

/// The instruction sets the allocator ships register descriptions for.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Ord, PartialOrd, Hash)]
#[cfg_attr(feature = "enable-serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Isa {
    /// 64-bit x86 with the System V register conventions.
    Amd64,
    /// 64-bit ARM with the AAPCS64 register conventions.
    Arm64,
    /// A test target with only three allocatable registers per class, used
    /// to force spilling in tests.
    Debug3Reg,
}

impl Isa {
    /// Every supported ISA.
    pub const ALL: [Isa; 3] = [Isa::Amd64, Isa::Arm64, Isa::Debug3Reg];

    /// The register description for the ISA.
    pub fn registers(self) -> &'static RegisterInfo {
        match self {
            Isa::Amd64 => amd64(),
            Isa::Arm64 => arm64(),
            Isa::Debug3Reg => debug3reg(),
        }
    }
}

impl FromStr for Isa {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "amd64" | "x86_64" => Ok(Isa::Amd64),
            "arm64" | "aarch64" => Ok(Isa::Arm64),
            "debug3reg" => Ok(Isa::Debug3Reg),
            _ => Err("the available ISAs are `amd64`, `arm64`, `debug3reg`"),
        }
    }
}

impl fmt::Display for Isa {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Isa::Amd64 => write!(f, "amd64"),
            Isa::Arm64 => write!(f, "arm64"),
            Isa::Debug3Reg => write!(f, "debug3reg"),
        }
    }
}

impl RegisterInfo {
    /// The register description for `isa`. Descriptions are built once
    /// and shared between every thread.
    pub fn for_isa(isa: Isa) -> &'static RegisterInfo {
        isa.registers()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::{PReg, RegClass};

    #[test]
    fn isa_round_trips_through_strings() {
        for isa in Isa::ALL {
            assert_eq!(isa.to_string().parse::<Isa>(), Ok(isa));
        }

        assert!("mips".parse::<Isa>().is_err());
    }

    #[test]
    fn descriptions_are_shared() {
        assert!(std::ptr::eq(RegisterInfo::for_isa(Isa::Amd64), amd64()));
        assert!(std::ptr::eq(Isa::Arm64.registers(), arm64()));
    }

    #[test]
    fn scratch_registers_are_never_allocatable() {
        for isa in Isa::ALL {
            let info = isa.registers();

            for class in RegClass::ALL {
                let scratch = info.scratch(class).expect("every target has scratch registers");

                assert!(!info.allocatable_set().has(scratch), "{isa}: {scratch}");
                assert!(info.reserved().has(scratch));
            }
        }
    }

    #[test]
    fn saved_sets_are_disjoint() {
        for isa in Isa::ALL {
            let info = isa.registers();

            assert!(info.caller_saved().intersection(info.callee_saved()).is_empty());
            assert_eq!(
                info.caller_saved().union(info.callee_saved()),
                info.allocatable_set()
            );
        }
    }

    #[test]
    fn amd64_reserves_stack_pointer() {
        let info = amd64();

        assert!(info.reserved().has(PReg::int(4)));
        assert_eq!(info.reg_name(PReg::int(4)), "rsp");
        assert_eq!(info.allocatable(RegClass::Int).len(), 13);
        assert_eq!(info.allocatable(RegClass::Float).len(), 15);
    }

    #[test]
    fn arm64_register_counts() {
        let info = arm64();

        assert_eq!(info.allocatable(RegClass::Int).len(), 26);
        assert_eq!(info.allocatable(RegClass::Float).len(), 31);
        assert_eq!(info.callee_saved().of_class(RegClass::Int).len(), 8);
        assert_eq!(info.callee_saved().of_class(RegClass::Float).len(), 8);
    }

    #[test]
    fn debug3reg_has_three_per_class() {
        let info = debug3reg();

        assert_eq!(info.allocatable(RegClass::Int).len(), 3);
        assert_eq!(info.allocatable(RegClass::Float).len(), 3);
    }
}
