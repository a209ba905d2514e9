//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2023 Evan Cox <evanacox00@gmail.com>. All rights reserved.      //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use crate::arena::ArenaKey;
use crate::codegen::RegSet;
use smallvec::SmallVec;
use std::fmt;
use std::fmt::{Display, Formatter};

/// The class of a register. Values only ever live in registers of their
/// own class, and moves never cross classes.
#[repr(u8)]
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
#[cfg_attr(feature = "enable-serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RegClass {
    /// General-purpose integer registers.
    Int = 0,
    /// Floating-point (and vector) registers.
    Float = 1,
}

impl RegClass {
    /// Every register class, in index order.
    pub const ALL: [RegClass; 2] = [RegClass::Int, RegClass::Float];

    /// The index of the class, for per-class arrays.
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// How many bytes a spill slot for a value of this class occupies.
    #[inline]
    pub const fn spill_size(self) -> u32 {
        match self {
            RegClass::Int => 8,
            RegClass::Float => 16,
        }
    }
}

impl Display for RegClass {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            RegClass::Int => write!(f, "int"),
            RegClass::Float => write!(f, "float"),
        }
    }
}

macro_rules! generic_reg {
    ( $(#[$outer:meta])* $vis:vis struct $name:ident($ty:ty); $($rest:tt)* ) => {
        $(#[$outer])*
        #[repr(transparent)]
        #[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
        #[cfg_attr(feature = "enable-serde", derive(serde::Serialize, serde::Deserialize))]
        $vis struct $name {
            data: $ty
        }

        impl $name {
            /// Creates a register with a given number and class
            #[inline]
            pub const fn with_class(class: RegClass, number: usize) -> Self {
                Self {
                    data: ((number as $ty) << 1) | (class as $ty)
                }
            }

            /// Creates an integer register with a given number
            #[inline]
            pub const fn int(number: usize) -> Self {
                Self::with_class(RegClass::Int, number)
            }

            /// Creates a floating-point register with a given number
            #[inline]
            pub const fn float(number: usize) -> Self {
                Self::with_class(RegClass::Float, number)
            }

            /// The identity of the register across every class. No other
            /// register of this kind has the same identity.
            #[inline]
            pub const fn identity(self) -> usize {
                self.data as usize
            }

            /// The number of the register **within its class**. Registers of
            /// different classes can share a number.
            #[inline]
            pub const fn number(self) -> usize {
                (self.data >> 1) as usize
            }

            /// Gets the class of the register.
            #[inline]
            pub const fn class(self) -> RegClass {
                if self.data & 1 == 0 {
                    RegClass::Int
                } else {
                    RegClass::Float
                }
            }
        }

        impl ArenaKey for $name {
            #[inline]
            fn key_new(index: usize) -> Self {
                Self {
                    data: index as $ty,
                }
            }

            #[inline]
            fn key_index(self) -> usize {
                self.identity()
            }
        }

        generic_reg!($($rest)*);
    };

    () => {}
}

generic_reg! {
    /// A single physical register. The class lives in the low bit and the
    /// register number in the bits above it, so the identity of every
    /// physical register fits in `0..64`.
    pub struct PReg(u8);

    /// A single virtual register, laid out the same way as [`PReg`].
    ///
    /// Virtual register numbers are unique across classes, so `v3` names
    /// exactly one value no matter its class.
    pub struct VReg(u32);
}

impl PReg {
    /// One past the highest identity a [`PReg`] can have while still fitting
    /// into a [`RegSet`].
    pub const MAX_IDENTITY: usize = 64;
}

impl Display for PReg {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.class() {
            RegClass::Int => write!(f, "%r{}", self.number()),
            RegClass::Float => write!(f, "%f{}", self.number()),
        }
    }
}

impl Display for VReg {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.number())
    }
}

/// Describes the registers of a target: what each register is called,
/// which registers the allocator may hand out, which survive calls and
/// which are scratch registers owned by the move resolver.
///
/// Registers are handed out in the order they were declared, callee-saved
/// registers are preferred for values that have to survive a call.
#[derive(Clone, Debug)]
pub struct RegisterInfo {
    name: &'static str,
    names: [&'static str; PReg::MAX_IDENTITY],
    allocatable: [SmallVec<[PReg; 32]>; 2],
    allocatable_set: RegSet,
    caller_saved: RegSet,
    callee_saved: RegSet,
    reserved: RegSet,
    scratch: [Option<PReg>; 2],
}

impl RegisterInfo {
    /// Gets a builder for a register description named `name`.
    pub fn builder(name: &'static str) -> RegisterInfoBuilder {
        RegisterInfoBuilder::new(name)
    }

    /// The name of the target this describes.
    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The printable name of `reg`, like `rax` or `x19`.
    #[inline]
    pub fn reg_name(&self, reg: PReg) -> &'static str {
        match self.names.get(reg.identity()) {
            Some(name) if !name.is_empty() => name,
            _ => "<unknown>",
        }
    }

    /// The registers of `class` the allocator may hand out, in preference order.
    #[inline]
    pub fn allocatable(&self, class: RegClass) -> &[PReg] {
        &self.allocatable[class.index()]
    }

    /// Every allocatable register, both classes.
    #[inline]
    pub fn allocatable_set(&self) -> RegSet {
        self.allocatable_set
    }

    /// Registers that a call may overwrite.
    #[inline]
    pub fn caller_saved(&self) -> RegSet {
        self.caller_saved
    }

    /// Registers that a call preserves. A function that uses one of these
    /// has to save and restore it in its prologue/epilogue.
    #[inline]
    pub fn callee_saved(&self) -> RegSet {
        self.callee_saved
    }

    /// Registers that are never allocated. Scratch registers are included.
    #[inline]
    pub fn reserved(&self) -> RegSet {
        self.reserved
    }

    /// The scratch register of `class` that the move resolver may
    /// clobber freely, if the target has one.
    #[inline]
    pub fn scratch(&self, class: RegClass) -> Option<PReg> {
        self.scratch[class.index()]
    }

    /// Checks whether `reg` may be clobbered by a call.
    #[inline]
    pub fn is_caller_saved(&self, reg: PReg) -> bool {
        self.caller_saved.has(reg)
    }

    /// Checks whether `reg` survives calls.
    #[inline]
    pub fn is_callee_saved(&self, reg: PReg) -> bool {
        self.callee_saved.has(reg)
    }
}

/// Builds a [`RegisterInfo`] one register at a time.
///
/// ```
/// # use garnet::codegen::*;
/// let info = RegisterInfo::builder("tiny")
///     .caller_saved(PReg::int(0), "a")
///     .callee_saved(PReg::int(1), "b")
///     .scratch(PReg::int(2), "tmp")
///     .build();
///
/// assert_eq!(info.allocatable(RegClass::Int), &[PReg::int(0), PReg::int(1)]);
/// assert_eq!(info.scratch(RegClass::Int), Some(PReg::int(2)));
/// ```
#[derive(Clone, Debug)]
pub struct RegisterInfoBuilder {
    info: RegisterInfo,
}

impl RegisterInfoBuilder {
    fn new(name: &'static str) -> Self {
        Self {
            info: RegisterInfo {
                name,
                names: [""; PReg::MAX_IDENTITY],
                allocatable: [SmallVec::new(), SmallVec::new()],
                allocatable_set: RegSet::EMPTY,
                caller_saved: RegSet::EMPTY,
                callee_saved: RegSet::EMPTY,
                reserved: RegSet::EMPTY,
                scratch: [None, None],
            },
        }
    }

    fn declare(&mut self, reg: PReg, name: &'static str) {
        assert!(
            reg.identity() < PReg::MAX_IDENTITY,
            "register `{name}` does not fit into a register set"
        );
        assert!(
            self.info.names[reg.identity()].is_empty(),
            "register `{name}` was declared twice"
        );

        self.info.names[reg.identity()] = name;
    }

    fn allocatable(&mut self, reg: PReg) {
        self.info.allocatable[reg.class().index()].push(reg);
        self.info.allocatable_set.add(reg);
    }

    /// Declares an allocatable register that calls may clobber.
    pub fn caller_saved(mut self, reg: PReg, name: &'static str) -> Self {
        self.declare(reg, name);
        self.allocatable(reg);
        self.info.caller_saved.add(reg);
        self
    }

    /// Declares an allocatable register that calls preserve.
    pub fn callee_saved(mut self, reg: PReg, name: &'static str) -> Self {
        self.declare(reg, name);
        self.allocatable(reg);
        self.info.callee_saved.add(reg);
        self
    }

    /// Declares a register that is never allocated, like the stack pointer.
    pub fn reserved(mut self, reg: PReg, name: &'static str) -> Self {
        self.declare(reg, name);
        self.info.reserved.add(reg);
        self
    }

    /// Declares the scratch register for the register's class. It is reserved
    /// from allocation and only ever used by the move resolver.
    pub fn scratch(mut self, reg: PReg, name: &'static str) -> Self {
        assert!(
            self.info.scratch[reg.class().index()].is_none(),
            "class {} already has a scratch register",
            reg.class()
        );

        self.declare(reg, name);
        self.info.reserved.add(reg);
        self.info.scratch[reg.class().index()] = Some(reg);
        self
    }

    /// Finishes the description.
    pub fn build(self) -> RegisterInfo {
        self.info
    }
}
