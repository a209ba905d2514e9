//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use crate::arena::{ArenaKey, ArenaMap};
use crate::codegen::{PReg, RegClass, VReg};
use crate::dense_arena_key;
use smallvec::SmallVec;
use std::fmt;
use std::fmt::{Debug, Display, Formatter};

/// A register-to-register copy. Instructions that are plain copies expose
/// this so the allocator can try to give both sides the same register.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
pub struct Move {
    /// The register being written.
    pub to: VReg,
    /// The register being read.
    pub from: VReg,
}

/// Collects the virtual registers an instruction reads or writes.
pub type RegCollector<const N: usize> = SmallVec<[VReg; N]>;

/// Collects operands that must be in a specific physical register.
pub type FixedCollector = SmallVec<[(VReg, PReg); 2]>;

/// A machine instruction, as far as the register allocator cares.
///
/// Operands are always virtual registers. An operand that the target needs
/// in one specific register (a call argument, a shift count, a return value)
/// is reported by [`Self::fixed_uses`] / [`Self::fixed_defs`] in addition
/// to being a normal use or def.
pub trait MachInst: Clone + Debug {
    /// Adds every virtual register read by the instruction to `collector`.
    fn uses<const N: usize>(&self, collector: &mut RegCollector<N>);

    /// Adds every virtual register written by the instruction to `collector`.
    fn defs<const N: usize>(&self, collector: &mut RegCollector<N>);

    /// Adds every use that is pinned to a physical register.
    fn fixed_uses(&self, _collector: &mut FixedCollector) {}

    /// Adds every def that is pinned to a physical register.
    fn fixed_defs(&self, _collector: &mut FixedCollector) {}

    /// Whether the instruction is a call, which clobbers every caller-saved register.
    fn is_call(&self) -> bool {
        false
    }

    /// Whether the instruction ends its block (a jump, branch or return).
    fn is_terminator(&self) -> bool;

    /// If the instruction is a plain copy, returns it.
    fn as_move(&self) -> Option<Move> {
        None
    }
}

dense_arena_key! {
    /// A basic block. Blocks are laid out in key order.
    pub struct MIRBlock;

    /// An instruction, numbered in layout order across the whole function.
    pub struct Inst;
}

impl Display for MIRBlock {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "bb{}", self.as_u32())
    }
}

impl Display for Inst {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "i{}", self.as_u32())
    }
}

/// The half-open range of instructions that make up a block.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
pub struct InstRange(u32, u32);

impl InstRange {
    /// Creates the range `begin..end`.
    #[inline]
    pub const fn from_indices(begin: u32, end: u32) -> Self {
        Self(begin, end)
    }

    /// The first instruction of the range.
    #[inline]
    pub fn first(self) -> Inst {
        Inst::key_new(self.0 as usize)
    }

    /// The last instruction of the range. Meaningless for an empty range.
    #[inline]
    pub fn last(self) -> Inst {
        Inst::key_new(self.1.saturating_sub(1) as usize)
    }

    /// The number of instructions in the range.
    #[inline]
    pub fn len(self) -> usize {
        (self.1 - self.0) as usize
    }

    /// Whether the range has no instructions.
    #[inline]
    pub fn is_empty(self) -> bool {
        self.0 >= self.1
    }

    /// Iterates over the instructions in layout order.
    #[inline]
    pub fn iter(self) -> impl DoubleEndedIterator<Item = Inst> + ExactSizeIterator {
        (self.0..self.1).map(|i| Inst::key_new(i as usize))
    }
}

/// The view of a function that the register allocator works on.
///
/// The function is a CFG of basic blocks in SSA form: every virtual register
/// is defined exactly once, either by an instruction or as a block
/// parameter. Blocks are laid out in key order and instruction numbers
/// increase along the layout. Values flowing into a block's parameters
/// are passed as arguments on the branch of each predecessor.
pub trait Function {
    /// The instruction type of the function.
    type Inst: MachInst;

    /// The name of the function, for diagnostics.
    fn name(&self) -> &str;

    /// The entry block.
    fn entry(&self) -> MIRBlock {
        MIRBlock::key_new(0)
    }

    /// The number of blocks.
    fn num_blocks(&self) -> usize;

    /// The number of instructions.
    fn num_insts(&self) -> usize;

    /// One past the highest [`VReg::identity`] used by the function.
    fn vreg_capacity(&self) -> usize;

    /// The instructions of a block.
    fn block_insts(&self, block: MIRBlock) -> InstRange;

    /// Gets an instruction.
    fn inst(&self, inst: Inst) -> &Self::Inst;

    /// The predecessors of a block.
    fn block_preds(&self, block: MIRBlock) -> &[MIRBlock];

    /// The successors of a block, in the order the terminator names them.
    fn block_succs(&self, block: MIRBlock) -> &[MIRBlock];

    /// The parameters of a block.
    fn block_params(&self, block: MIRBlock) -> &[VReg];

    /// The values passed to the parameters of the `succ`-th successor of `block`.
    fn branch_args(&self, block: MIRBlock, succ: usize) -> &[VReg];

    /// How deeply nested in loops a block is. Only used for statistics and
    /// as a hint for where split edges are placed.
    fn loop_depth(&self, _block: MIRBlock) -> u32 {
        0
    }

    /// Iterates over every block in layout order.
    fn blocks(&self) -> Box<dyn Iterator<Item = MIRBlock> + '_> {
        Box::new((0..self.num_blocks()).map(MIRBlock::key_new))
    }

    /// Whether the function makes no calls.
    fn is_leaf(&self) -> bool {
        (0..self.num_insts()).all(|i| !self.inst(Inst::key_new(i)).is_call())
    }
}

#[derive(Clone, Debug, Default)]
struct MIRBlockData {
    range: InstRange,
    preds: SmallVec<[MIRBlock; 4]>,
    succs: SmallVec<[MIRBlock; 2]>,
    args: SmallVec<[SmallVec<[VReg; 2]>; 2]>,
    params: SmallVec<[VReg; 2]>,
    loop_depth: u32,
}

impl Default for InstRange {
    fn default() -> Self {
        Self(0, 0)
    }
}

/// A concrete function made of `I` instructions, built with [`FunctionBuilder`].
#[derive(Clone, Debug)]
pub struct MIRFunction<I: MachInst> {
    name: String,
    insts: Vec<I>,
    blocks: ArenaMap<MIRBlock, MIRBlockData>,
    vreg_capacity: usize,
}

impl<I: MachInst> MIRFunction<I> {
    /// Every instruction in layout order.
    #[inline]
    pub fn all_instructions(&self) -> &[I] {
        &self.insts
    }
}

impl<I: MachInst> Function for MIRFunction<I> {
    type Inst = I;

    fn name(&self) -> &str {
        &self.name
    }

    fn num_blocks(&self) -> usize {
        self.blocks.len()
    }

    fn num_insts(&self) -> usize {
        self.insts.len()
    }

    fn vreg_capacity(&self) -> usize {
        self.vreg_capacity
    }

    fn block_insts(&self, block: MIRBlock) -> InstRange {
        self.blocks[block].range
    }

    fn inst(&self, inst: Inst) -> &I {
        &self.insts[inst.key_index()]
    }

    fn block_preds(&self, block: MIRBlock) -> &[MIRBlock] {
        &self.blocks[block].preds
    }

    fn block_succs(&self, block: MIRBlock) -> &[MIRBlock] {
        &self.blocks[block].succs
    }

    fn block_params(&self, block: MIRBlock) -> &[VReg] {
        &self.blocks[block].params
    }

    fn branch_args(&self, block: MIRBlock, succ: usize) -> &[VReg] {
        self.blocks[block]
            .args
            .get(succ)
            .map(|args| args.as_slice())
            .unwrap_or(&[])
    }

    fn loop_depth(&self, block: MIRBlock) -> u32 {
        self.blocks[block].loop_depth
    }
}

impl<I: MachInst> Display for MIRFunction<I> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(f, "fn {} {{", self.name)?;

        for (block, data) in self.blocks.iter() {
            let params: Vec<_> = data.params.iter().map(|p| p.to_string()).collect();

            writeln!(f, "{block}({}):", params.join(", "))?;

            for inst in data.range.iter() {
                writeln!(f, "  {inst}: {:?}", self.insts[inst.key_index()])?;
            }

            for (succ, args) in data.succs.iter().zip(data.args.iter()) {
                let args: Vec<_> = args.iter().map(|a| a.to_string()).collect();

                writeln!(f, "  -> {succ}({})", args.join(", "))?;
            }
        }

        write!(f, "}}")
    }
}

#[derive(Clone, Debug)]
struct BlockBuilder<I> {
    insts: Vec<I>,
    params: SmallVec<[VReg; 2]>,
    succs: SmallVec<[(MIRBlock, SmallVec<[VReg; 2]>); 2]>,
    loop_depth: u32,
}

/// Builds a [`MIRFunction`] block by block.
///
/// ```
/// # use garnet::codegen::*;
/// let mut builder = FunctionBuilder::new("id");
/// let entry = builder.create_block();
/// let x = builder.append_block_param(entry, RegClass::Int);
///
/// builder.switch_to(entry);
/// builder.push(TestInst::ret(&[x]));
///
/// let func = builder.build();
///
/// assert_eq!(func.num_blocks(), 1);
/// assert_eq!(func.block_params(entry), &[x]);
/// ```
#[derive(Clone, Debug)]
pub struct FunctionBuilder<I: MachInst> {
    name: String,
    blocks: ArenaMap<MIRBlock, BlockBuilder<I>>,
    current: Option<MIRBlock>,
    next_vreg: u32,
}

impl<I: MachInst> FunctionBuilder<I> {
    /// Creates a builder for a function named `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            blocks: ArenaMap::new(),
            current: None,
            next_vreg: 0,
        }
    }

    /// Creates an empty block. Blocks are laid out in creation order.
    pub fn create_block(&mut self) -> MIRBlock {
        self.blocks.insert(BlockBuilder {
            insts: Vec::new(),
            params: SmallVec::new(),
            succs: SmallVec::new(),
            loop_depth: 0,
        })
    }

    /// Creates a fresh virtual register.
    pub fn new_vreg(&mut self, class: RegClass) -> VReg {
        let reg = VReg::with_class(class, self.next_vreg as usize);

        self.next_vreg += 1;

        reg
    }

    /// Creates a fresh virtual register and makes it a parameter of `block`.
    pub fn append_block_param(&mut self, block: MIRBlock, class: RegClass) -> VReg {
        let reg = self.new_vreg(class);

        self.blocks[block].params.push(reg);

        reg
    }

    /// Makes `block` the block that [`Self::push`] and [`Self::branch_to`] append to.
    pub fn switch_to(&mut self, block: MIRBlock) {
        self.current = Some(block);
    }

    /// Appends an instruction to the current block.
    ///
    /// Panics if no block has been switched to.
    pub fn push(&mut self, inst: I) {
        let block = self.current.expect("no block to append to");

        self.blocks[block].insts.push(inst);
    }

    /// Adds `target` as the next successor of the current block, passing
    /// `args` to its parameters.
    ///
    /// Panics if no block has been switched to.
    pub fn branch_to(&mut self, target: MIRBlock, args: &[VReg]) {
        let block = self.current.expect("no block to branch from");

        self.blocks[block]
            .succs
            .push((target, SmallVec::from_slice(args)));
    }

    /// Sets the loop depth of `block`.
    pub fn set_loop_depth(&mut self, block: MIRBlock, depth: u32) {
        self.blocks[block].loop_depth = depth;
    }

    /// Lays out the blocks and computes predecessors.
    pub fn build(self) -> MIRFunction<I> {
        let mut insts = Vec::new();
        let mut blocks = ArenaMap::with_capacity(self.blocks.len());

        for builder in self.blocks.values() {
            let begin = insts.len() as u32;

            insts.extend(builder.insts.iter().cloned());

            let _: MIRBlock = blocks.insert(MIRBlockData {
                range: InstRange::from_indices(begin, insts.len() as u32),
                preds: SmallVec::new(),
                succs: builder.succs.iter().map(|(succ, _)| *succ).collect(),
                args: builder.succs.iter().map(|(_, args)| args.clone()).collect(),
                params: builder.params.clone(),
                loop_depth: builder.loop_depth,
            });
        }

        for (block, builder) in self.blocks.iter() {
            for (succ, _) in builder.succs.iter() {
                blocks[*succ].preds.push(block);
            }
        }

        MIRFunction {
            name: self.name,
            insts,
            blocks,
            vreg_capacity: (self.next_vreg as usize) * 2 + 2,
        }
    }
}
