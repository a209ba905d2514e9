//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2023 Evan Cox <evanacox00@gmail.com>. All rights reserved.      //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use crate::codegen::{FixedCollector, MachInst, Move, PReg, RegCollector, VReg};
use smallvec::SmallVec;
use std::fmt;
use std::fmt::{Debug, Formatter};

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
enum TestOp {
    Op,
    Move,
    Call,
    Jump,
    Branch,
    Ret,
}

/// A target-independent instruction that only carries what the allocator
/// looks at. Used by the tests and by `rac` to build functions by hand.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct TestInst {
    op: TestOp,
    defs: SmallVec<[VReg; 2]>,
    uses: SmallVec<[VReg; 4]>,
    fixed_defs: SmallVec<[(VReg, PReg); 2]>,
    fixed_uses: SmallVec<[(VReg, PReg); 2]>,
}

impl TestInst {
    fn new(op: TestOp, defs: &[VReg], uses: &[VReg]) -> Self {
        Self {
            op,
            defs: SmallVec::from_slice(defs),
            uses: SmallVec::from_slice(uses),
            fixed_defs: SmallVec::new(),
            fixed_uses: SmallVec::new(),
        }
    }

    /// An arithmetic-like instruction that reads `uses` and writes `defs`.
    pub fn op(defs: &[VReg], uses: &[VReg]) -> Self {
        Self::new(TestOp::Op, defs, uses)
    }

    /// Defines `reg` out of nothing, like a constant load.
    pub fn def(reg: VReg) -> Self {
        Self::op(&[reg], &[])
    }

    /// Reads `reg` without defining anything, like a store.
    pub fn use_of(reg: VReg) -> Self {
        Self::op(&[], &[reg])
    }

    /// A no-op that only occupies a program point.
    pub fn nop() -> Self {
        Self::op(&[], &[])
    }

    /// Copies `from` into `to`.
    pub fn mov(to: VReg, from: VReg) -> Self {
        Self::new(TestOp::Move, &[to], &[from])
    }

    /// A call that reads `uses` and writes `defs`. Calls clobber every
    /// caller-saved register.
    pub fn call(defs: &[VReg], uses: &[VReg]) -> Self {
        Self::new(TestOp::Call, defs, uses)
    }

    /// An unconditional jump to the block's only successor.
    pub fn jump() -> Self {
        Self::new(TestOp::Jump, &[], &[])
    }

    /// A conditional branch that reads `uses` to pick a successor.
    pub fn branch(uses: &[VReg]) -> Self {
        Self::new(TestOp::Branch, &[], uses)
    }

    /// A return that reads `uses`.
    pub fn ret(uses: &[VReg]) -> Self {
        Self::new(TestOp::Ret, &[], uses)
    }

    /// Pins the use of `reg` to `preg`. `reg` is added as a use if it isn't one already.
    pub fn with_fixed_use(mut self, reg: VReg, preg: PReg) -> Self {
        if !self.uses.contains(&reg) {
            self.uses.push(reg);
        }

        self.fixed_uses.push((reg, preg));
        self
    }

    /// Pins the def of `reg` to `preg`. `reg` is added as a def if it isn't one already.
    pub fn with_fixed_def(mut self, reg: VReg, preg: PReg) -> Self {
        if !self.defs.contains(&reg) {
            self.defs.push(reg);
        }

        self.fixed_defs.push((reg, preg));
        self
    }
}

impl MachInst for TestInst {
    fn uses<const N: usize>(&self, collector: &mut RegCollector<N>) {
        collector.extend(self.uses.iter().copied());
    }

    fn defs<const N: usize>(&self, collector: &mut RegCollector<N>) {
        collector.extend(self.defs.iter().copied());
    }

    fn fixed_uses(&self, collector: &mut FixedCollector) {
        collector.extend(self.fixed_uses.iter().copied());
    }

    fn fixed_defs(&self, collector: &mut FixedCollector) {
        collector.extend(self.fixed_defs.iter().copied());
    }

    fn is_call(&self) -> bool {
        self.op == TestOp::Call
    }

    fn is_terminator(&self) -> bool {
        matches!(self.op, TestOp::Jump | TestOp::Branch | TestOp::Ret)
    }

    fn as_move(&self) -> Option<Move> {
        match self.op {
            TestOp::Move => Some(Move {
                to: self.defs[0],
                from: self.uses[0],
            }),
            _ => None,
        }
    }
}

impl Debug for TestInst {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self.op {
            TestOp::Op => "op",
            TestOp::Move => "mov",
            TestOp::Call => "call",
            TestOp::Jump => "jmp",
            TestOp::Branch => "br",
            TestOp::Ret => "ret",
        };

        if !self.defs.is_empty() {
            let defs: Vec<_> = self.defs.iter().map(|d| d.to_string()).collect();

            write!(f, "{} = ", defs.join(", "))?;
        }

        write!(f, "{name}")?;

        for (i, u) in self.uses.iter().enumerate() {
            let sep = if i == 0 { " " } else { ", " };

            match self.fixed_uses.iter().find(|(v, _)| v == u) {
                Some((_, preg)) => write!(f, "{sep}{u}@{preg}")?,
                None => write!(f, "{sep}{u}")?,
            }
        }

        for (v, preg) in self.fixed_defs.iter() {
            write!(f, " [{v}@{preg}]")?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::RegClass;

    #[test]
    fn operands_are_reported() {
        let a = VReg::with_class(RegClass::Int, 0);
        let b = VReg::with_class(RegClass::Int, 1);
        let inst = TestInst::op(&[b], &[a]).with_fixed_use(a, PReg::int(2));
        let mut uses = RegCollector::<4>::new();
        let mut defs = RegCollector::<4>::new();
        let mut fixed = FixedCollector::new();

        inst.uses(&mut uses);
        inst.defs(&mut defs);
        inst.fixed_uses(&mut fixed);

        assert_eq!(uses.as_slice(), &[a]);
        assert_eq!(defs.as_slice(), &[b]);
        assert_eq!(fixed.as_slice(), &[(a, PReg::int(2))]);
        assert_eq!(format!("{inst:?}"), "v1 = op v0@%r2");
    }

    #[test]
    fn moves_are_recognized() {
        let a = VReg::int(0);
        let b = VReg::int(1);

        assert_eq!(TestInst::mov(b, a).as_move(), Some(Move { to: b, from: a }));
        assert_eq!(TestInst::op(&[b], &[a]).as_move(), None);
        assert!(TestInst::ret(&[]).is_terminator());
        assert!(TestInst::call(&[], &[]).is_call());
    }
}
