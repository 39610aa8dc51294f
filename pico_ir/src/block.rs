//! Basic blocks

use crate::instruction::InstrId;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;

/// Dense per-function block handle. Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockId(pub u32);

impl BlockId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BB_{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockKind {
    Entry,
    Normal,
    LoopHead,
    Join,
    Exit,
}

/// A basic block: an insertion-ordered list of instruction handles plus
/// CFG links.
///
/// Invariants: the instruction list may begin with a contiguous prefix of
/// phis and holds at most one terminator, at the end. The sealed flag is
/// set exactly once, only after all predecessors are known; a sealed
/// block never gains a new predecessor.
#[derive(Debug, Clone)]
pub struct BasicBlock {
    pub idx: BlockId,
    instructions: Vec<InstrId>,
    pub predecessors: SmallVec<[BlockId; 2]>,
    pub successors: SmallVec<[BlockId; 2]>,
    pub kind: BlockKind,
    pub sealed: bool,
    pub dead: bool,
}

impl BasicBlock {
    pub fn new(idx: BlockId, kind: BlockKind) -> Self {
        Self {
            idx,
            instructions: Vec::new(),
            predecessors: SmallVec::new(),
            successors: SmallVec::new(),
            kind,
            sealed: false,
            dead: false,
        }
    }

    pub fn instructions(&self) -> &[InstrId] {
        &self.instructions
    }

    pub fn push(&mut self, instr: InstrId) {
        self.instructions.push(instr);
    }

    pub fn insert(&mut self, position: usize, instr: InstrId) {
        self.instructions.insert(position, instr);
    }

    pub fn is_loop_head(&self) -> bool {
        self.kind == BlockKind::LoopHead
    }
}
