//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2023 Evan Cox <evanacox00@gmail.com>. All rights reserved.      //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use crate::codegen::{Inst, MIRBlock, PReg, RegClass, VReg};
use thiserror::Error;

/// Everything that can go wrong while allocating registers for a function.
///
/// Most of these describe malformed input. [`Self::is_fatal`] tells apart
/// the ones caused by the register description itself, which will fail for
/// every function in a module.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegAllocError {
    /// A class has no registers the allocator may hand out.
    #[error("the target has no allocatable {0} registers")]
    NoAllocatableRegisters(RegClass),

    /// A value has more than one definition.
    #[error("{0} is defined more than once")]
    MultipleDefinitions(VReg),

    /// A value is live into a block on some path that never defined it.
    #[error("{0} may be used before it is defined (live into {1})")]
    UseBeforeDef(VReg, MIRBlock),

    /// A value is used but has no definition anywhere.
    #[error("{0} is used by {1} but never defined")]
    UndefinedUse(VReg, Inst),

    /// A block has no instructions at all.
    #[error("{0} has no instructions")]
    EmptyBlock(MIRBlock),

    /// The last instruction of a block is not a terminator.
    #[error("{0} does not end in a terminator")]
    MissingTerminator(MIRBlock),

    /// A terminator shows up in the middle of a block.
    #[error("terminator {0} is not the last instruction of its block")]
    MisplacedTerminator(Inst),

    /// A branch passes a different number of arguments than the target takes.
    #[error("the branch from {0} to {1} passes the wrong number of arguments")]
    BranchArgMismatch(MIRBlock, MIRBlock),

    /// Two values need the same physical register at the same instruction.
    #[error("{0} is required by two different values at {1}")]
    FixedRegisterConflict(PReg, Inst),

    /// A value is pinned to a register of the other class.
    #[error("{0} is in the {class} class but is pinned to {1}", class = .0.class())]
    ClassMismatch(VReg, PReg),

    /// Operands and pinned registers at one instruction outnumber the registers of a class.
    #[error("more {0} values need a register at {1} than the target has")]
    TooManyLiveRegisters(RegClass, Inst),

    /// A critical edge needs moves and splitting is turned off.
    #[error("the edge {0} -> {1} needs moves but cannot hold them")]
    InvalidEdge(MIRBlock, MIRBlock),

    /// The checker found a value that is not where the allocation claims.
    #[error("the allocation failed verification: {0}")]
    CheckFailed(String),

    /// The worker thread allocating the function with this index panicked.
    #[error("the worker allocating function #{0} panicked")]
    WorkerPanicked(usize),
}

impl RegAllocError {
    /// Whether the error comes from the register description rather than
    /// the function, so every other function would hit it too.
    pub fn is_fatal(&self) -> bool {
        matches!(self, RegAllocError::NoAllocatableRegisters(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::ArenaKey;

    #[test]
    fn messages_name_the_culprits() {
        let v = VReg::int(3);
        let err = RegAllocError::UndefinedUse(v, Inst::key_new(7));

        assert_eq!(err.to_string(), "v3 is used by i7 but never defined");
        assert_eq!(
            RegAllocError::ClassMismatch(v, PReg::float(0)).to_string(),
            "v3 is in the int class but is pinned to %f0"
        );
    }

    #[test]
    fn only_configuration_errors_are_fatal() {
        assert!(RegAllocError::NoAllocatableRegisters(RegClass::Float).is_fatal());
        assert!(!RegAllocError::EmptyBlock(MIRBlock::key_new(0)).is_fatal());
        assert!(!RegAllocError::TooManyLiveRegisters(RegClass::Int, Inst::key_new(0)).is_fatal());
        assert!(!RegAllocError::WorkerPanicked(3).is_fatal());
    }
}
