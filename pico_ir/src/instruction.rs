//! Three-address instructions

use crate::block::BlockId;
use crate::value::ValueId;
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;

/// Dense per-function instruction handle. Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstrId(pub u32);

impl InstrId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Opcode {
    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
    /// Relational comparison; conditional branches test its result
    Cmp,

    // Memory
    Adda,
    Load,
    Store,
    LoadG,
    StoreG,

    // Control
    Bra,
    Bne,
    Beq,
    Ble,
    Blt,
    Bge,
    Bgt,
    Ret,
    End,
    Call,
    Arg,

    // Intrinsics
    Read,
    WriteX,
    WriteNl,

    // SSA
    Phi,

    // Register-allocator synthetic
    Move,
}

impl Opcode {
    pub fn is_phi(self) -> bool {
        self == Opcode::Phi
    }

    /// Conditional branch on a comparison result
    pub fn is_cond_branch(self) -> bool {
        matches!(
            self,
            Opcode::Bne | Opcode::Beq | Opcode::Ble | Opcode::Blt | Opcode::Bge | Opcode::Bgt
        )
    }

    /// Last instruction of a block, if present
    pub fn is_terminator(self) -> bool {
        self == Opcode::Bra || self == Opcode::Ret || self == Opcode::End || self.is_cond_branch()
    }

    /// Opcodes whose effect is observable regardless of whether the
    /// result is used; dead code elimination must keep them.
    pub fn has_side_effect(self) -> bool {
        matches!(
            self,
            Opcode::Store
                | Opcode::StoreG
                | Opcode::Call
                | Opcode::Arg
                | Opcode::Read
                | Opcode::WriteX
                | Opcode::WriteNl
                | Opcode::Move
        ) || self.is_terminator()
    }

    /// Pure computations eligible for common-subexpression reuse
    pub fn is_pure(self) -> bool {
        matches!(
            self,
            Opcode::Add | Opcode::Sub | Opcode::Mul | Opcode::Div | Opcode::Cmp | Opcode::Adda
        )
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            Opcode::Add => "ADD",
            Opcode::Sub => "SUB",
            Opcode::Mul => "MUL",
            Opcode::Div => "DIV",
            Opcode::Cmp => "CMP",
            Opcode::Adda => "ADDA",
            Opcode::Load => "LOAD",
            Opcode::Store => "STORE",
            Opcode::LoadG => "LOADG",
            Opcode::StoreG => "STOREG",
            Opcode::Bra => "BRA",
            Opcode::Bne => "BNE",
            Opcode::Beq => "BEQ",
            Opcode::Ble => "BLE",
            Opcode::Blt => "BLT",
            Opcode::Bge => "BGE",
            Opcode::Bgt => "BGT",
            Opcode::Ret => "RET",
            Opcode::End => "END",
            Opcode::Call => "CALL",
            Opcode::Arg => "ARG",
            Opcode::Read => "READ",
            Opcode::WriteX => "WRITEX",
            Opcode::WriteNl => "WRITENL",
            Opcode::Phi => "PHI",
            Opcode::Move => "MOVE",
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.mnemonic())
    }
}

/// One three-address instruction.
///
/// Append-only after creation except for the `active` bit and operand
/// rewrites performed by trivial-phi removal, sealing, and the passes.
#[derive(Debug, Clone)]
pub struct Instruction {
    pub opcode: Opcode,
    pub operands: SmallVec<[ValueId; 2]>,
    pub result: ValueId,
    pub block: BlockId,
    pub active: bool,
    /// For phis only: which predecessor supplied which operand
    pub op_source: HashMap<BlockId, ValueId>,
}

impl Instruction {
    pub fn new(opcode: Opcode, block: BlockId, result: ValueId) -> Self {
        Self {
            opcode,
            operands: SmallVec::new(),
            result,
            block,
            active: true,
            op_source: HashMap::new(),
        }
    }

    pub fn is_phi(&self) -> bool {
        self.opcode.is_phi()
    }

    /// Rewrite every occurrence of `old` among the operands (and the
    /// operand-source map, which must stay in sync) to `new`.
    pub fn replace_use(&mut self, old: ValueId, new: ValueId) {
        for operand in self.operands.iter_mut() {
            if *operand == old {
                *operand = new;
            }
        }
        for source in self.op_source.values_mut() {
            if *source == old {
                *source = new;
            }
        }
    }

    /// The predecessor that supplied `operand`, per the operand-source map
    pub fn find_source(&self, operand: ValueId) -> Option<BlockId> {
        self.op_source
            .iter()
            .find(|(_, &v)| v == operand)
            .map(|(&b, _)| b)
    }
}
