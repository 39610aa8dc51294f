//! Per-function IR: instruction and block arenas, emission helpers

use crate::block::{BasicBlock, BlockId, BlockKind};
use crate::cfg::CfgCache;
use crate::instruction::{InstrId, Instruction, Opcode};
use crate::value::{ValueId, ValueKind, ValuePool};
use hashbrown::HashMap;
use std::collections::BTreeMap;

/// A declared variable inside a function: optional array dimensions and
/// the word offset of its slot from the frame base.
#[derive(Debug, Clone)]
pub struct VarInfo {
    pub dims: Option<Vec<i64>>,
    pub offset: i64,
}

/// One function's control-flow graph and instruction arena.
///
/// Values live in the program-wide pool; instructions and blocks are
/// function-local. All emission goes through the `emit_*` helpers so use
/// lists stay consistent.
#[derive(Debug, Clone)]
pub struct Function {
    name: String,
    pub entry: BlockId,
    pub exit: Option<BlockId>,
    instructions: Vec<Instruction>,
    blocks: Vec<BasicBlock>,
    /// Current definition of each variable per block (SSA construction)
    pub(crate) local_defs: HashMap<String, HashMap<BlockId, ValueId>>,
    /// Pending phis of unsealed blocks, filled at seal time. The inner
    /// map is ordered so sealing is deterministic.
    pub(crate) incomplete_phis: HashMap<BlockId, BTreeMap<String, InstrId>>,
    variables: HashMap<String, VarInfo>,
    pub local_base: ValueId,
    current_block: BlockId,
    const_memo: HashMap<i64, ValueId>,
    location_memo: HashMap<String, ValueId>,
    cfg: CfgCache,
}

impl Function {
    pub fn new(name: impl Into<String>, pool: &mut ValuePool) -> Self {
        let local_base = pool.create(ValueKind::LocalBase);
        let mut function = Self {
            name: name.into(),
            entry: BlockId(0),
            exit: None,
            instructions: Vec::new(),
            blocks: Vec::new(),
            local_defs: HashMap::new(),
            incomplete_phis: HashMap::new(),
            variables: HashMap::new(),
            local_base,
            current_block: BlockId(0),
            const_memo: HashMap::new(),
            location_memo: HashMap::new(),
            cfg: CfgCache::default(),
        };
        let entry = function.create_block(BlockKind::Entry);
        function.entry = entry;
        function.current_block = entry;
        // The entry block has no predecessors, so its set is final.
        function.blocks[entry.index()].sealed = true;
        function
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    // Blocks

    pub fn create_block(&mut self, kind: BlockKind) -> BlockId {
        let id = BlockId(self.blocks.len() as u32);
        self.blocks.push(BasicBlock::new(id, kind));
        self.cfg.invalidate();
        id
    }

    pub fn add_edge(&mut self, pred: BlockId, succ: BlockId) {
        debug_assert!(
            !self.blocks[succ.index()].sealed,
            "a sealed block must not gain a predecessor"
        );
        self.blocks[pred.index()].successors.push(succ);
        self.blocks[succ.index()].predecessors.push(pred);
        self.cfg.invalidate();
    }

    pub fn block(&self, id: BlockId) -> &BasicBlock {
        &self.blocks[id.index()]
    }

    pub fn block_mut(&mut self, id: BlockId) -> &mut BasicBlock {
        &mut self.blocks[id.index()]
    }

    pub fn blocks(&self) -> impl Iterator<Item = &BasicBlock> {
        self.blocks.iter()
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    pub fn current_block(&self) -> BlockId {
        self.current_block
    }

    pub fn set_current_block(&mut self, block: BlockId) {
        self.current_block = block;
    }

    // Instructions

    pub fn instr(&self, id: InstrId) -> &Instruction {
        &self.instructions[id.index()]
    }

    pub fn instr_mut(&mut self, id: InstrId) -> &mut Instruction {
        &mut self.instructions[id.index()]
    }

    pub fn instr_count(&self) -> usize {
        self.instructions.len()
    }

    pub fn instr_ids(&self) -> impl Iterator<Item = InstrId> {
        (0..self.instructions.len() as u32).map(InstrId)
    }

    pub fn is_active(&self, id: InstrId) -> bool {
        self.instructions[id.index()].active
    }

    /// Emit an instruction at the end of the current block and return its
    /// result value.
    pub fn emit(&mut self, pool: &mut ValuePool, opcode: Opcode, operands: &[ValueId]) -> ValueId {
        let block = self.current_block;
        self.emit_in(pool, block, opcode, operands)
    }

    /// Emit at the end of `block`
    pub fn emit_in(
        &mut self,
        pool: &mut ValuePool,
        block: BlockId,
        opcode: Opcode,
        operands: &[ValueId],
    ) -> ValueId {
        let id = InstrId(self.instructions.len() as u32);
        let result = pool.create(ValueKind::Any);
        let mut instr = Instruction::new(opcode, block, result);
        for &operand in operands {
            instr.operands.push(operand);
            pool.get_mut(operand).add_use(id);
        }
        self.instructions.push(instr);
        self.blocks[block.index()].push(id);
        result
    }

    /// Emit an empty phi at the end of `block`'s phi prefix
    pub fn make_phi(&mut self, pool: &mut ValuePool, block: BlockId) -> InstrId {
        let id = InstrId(self.instructions.len() as u32);
        let result = pool.create(ValueKind::Any);
        let instr = Instruction::new(Opcode::Phi, block, result);
        self.instructions.push(instr);
        let position = self.phi_prefix_len(block);
        self.blocks[block.index()].insert(position, id);
        id
    }

    /// Number of leading phi instructions in `block`
    pub fn phi_prefix_len(&self, block: BlockId) -> usize {
        self.blocks[block.index()]
            .instructions()
            .iter()
            .take_while(|&&id| self.instructions[id.index()].is_phi())
            .count()
    }

    /// Create (or reuse) the constant value for `n`
    pub fn constant(&mut self, pool: &mut ValuePool, n: i64) -> ValueId {
        if let Some(&id) = self.const_memo.get(&n) {
            return id;
        }
        let id = pool.create(ValueKind::Const(n));
        self.const_memo.insert(n, id);
        id
    }

    /// Create (or reuse) the address value for a global or parameter slot
    pub fn location(&mut self, pool: &mut ValuePool, name: &str) -> ValueId {
        if let Some(&id) = self.location_memo.get(name) {
            return id;
        }
        let id = pool.create(ValueKind::Location(name.to_string()));
        self.location_memo.insert(name.to_string(), id);
        id
    }

    pub fn branch_target(&mut self, pool: &mut ValuePool, block: BlockId) -> ValueId {
        pool.create(ValueKind::Branch(block))
    }

    // Variables

    pub fn add_variable(&mut self, name: impl Into<String>, info: VarInfo) {
        self.variables.insert(name.into(), info);
    }

    pub fn variable(&self, name: &str) -> Option<&VarInfo> {
        self.variables.get(name)
    }

    // Rewriting

    /// Redirect every use of `old` to `new`, updating use lists.
    pub fn replace_uses(&mut self, pool: &mut ValuePool, old: ValueId, new: ValueId) {
        let users: Vec<InstrId> = pool.get(old).users().collect();
        for user in users {
            self.instructions[user.index()].replace_use(old, new);
            pool.get_mut(old).remove_use(user);
            pool.get_mut(new).add_use(user);
        }
    }

    /// Redirect every SSA definition-table entry for `old` to `new`.
    /// Reads that reach a block through the table after a phi was removed
    /// must see the replacement, not the dead phi's result.
    pub(crate) fn replace_defs(&mut self, old: ValueId, new: ValueId) {
        for defs in self.local_defs.values_mut() {
            for def in defs.values_mut() {
                if *def == old {
                    *def = new;
                }
            }
        }
    }

    /// Emit `MOVE src, fresh` at the end of `block`, splicing before the
    /// terminator when one is present. Returns the fresh register value.
    pub fn create_move(&mut self, pool: &mut ValuePool, block: BlockId, src: ValueId) -> ValueId {
        let reg = pool.create(ValueKind::Any);
        let id = InstrId(self.instructions.len() as u32);
        let result = pool.create(ValueKind::Any);
        let mut instr = Instruction::new(Opcode::Move, block, result);
        instr.operands.push(src);
        instr.operands.push(reg);
        pool.get_mut(src).add_use(id);
        pool.get_mut(reg).add_use(id);
        self.instructions.push(instr);

        let position = {
            let instrs = self.blocks[block.index()].instructions();
            match instrs.last() {
                Some(&last) if self.instructions[last.index()].opcode.is_terminator() => {
                    instrs.len() - 1
                }
                _ => instrs.len(),
            }
        };
        self.blocks[block.index()].insert(position, id);
        reg
    }

    // CFG traversal (cached, recomputed lazily after any mutation)

    pub fn post_order(&mut self) -> Vec<BlockId> {
        self.ensure_cfg();
        self.cfg.post_order().to_vec()
    }

    pub fn reverse_post_order(&mut self) -> Vec<BlockId> {
        let mut order = self.post_order();
        order.reverse();
        order
    }

    /// True when `(from, to)` is a back edge: `to` is on the DFS stack
    /// when the edge is first examined.
    pub fn is_back_edge(&mut self, from: BlockId, to: BlockId) -> bool {
        self.ensure_cfg();
        self.cfg.is_back_edge(from, to)
    }

    fn ensure_cfg(&mut self) {
        if !self.cfg.is_valid() {
            self.cfg.compute(&self.blocks, self.entry);
        }
    }
}
