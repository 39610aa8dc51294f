//! Values and the program-wide value pool

use crate::block::BlockId;
use crate::instruction::InstrId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Dense handle into the program-wide value pool. Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ValueId(pub u32);

impl ValueId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ValueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({})", self.0)
    }
}

/// Anything that can flow as an instruction operand
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValueKind {
    /// Integer literal. Never spills; rematerializable.
    Const(i64),
    /// Named source variable materialized by a variable read
    Var(String),
    /// Destination label for a control transfer
    Branch(BlockId),
    /// Callee identifier
    Func(String),
    /// Address of a global or formal parameter slot
    Location(String),
    GlobalBase,
    LocalBase,
    /// Generic SSA result of an instruction
    Any,
}

impl ValueKind {
    pub fn is_const(&self) -> bool {
        matches!(self, ValueKind::Const(_))
    }

    /// Kinds that never occupy a register: they are excluded from live
    /// sets and never appear in the interference graph.
    pub fn never_live(&self) -> bool {
        matches!(
            self,
            ValueKind::Branch(_) | ValueKind::GlobalBase | ValueKind::LocalBase | ValueKind::Func(_)
        )
    }
}

/// A pooled value: its kind plus side metadata maintained by the IR
/// constructor and consumed by the register allocator.
#[derive(Debug, Clone)]
pub struct ValueData {
    pub kind: ValueKind,
    /// Instructions using this value. Append-only; removal tombstones the
    /// entry in place so indices held elsewhere stay valid.
    uses: Vec<Option<InstrId>>,
    /// Loop depth of the defining block, set during liveness
    pub loop_depth: u32,
    pub spill_cost: f64,
}

impl ValueData {
    fn new(kind: ValueKind) -> Self {
        Self {
            kind,
            uses: Vec::new(),
            loop_depth: 0,
            spill_cost: 0.0,
        }
    }

    pub fn add_use(&mut self, user: InstrId) {
        self.uses.push(Some(user));
    }

    pub fn remove_use(&mut self, user: InstrId) {
        if let Some(slot) = self.uses.iter_mut().find(|slot| **slot == Some(user)) {
            *slot = None;
        }
    }

    pub fn users(&self) -> impl Iterator<Item = InstrId> + '_ {
        self.uses.iter().flatten().copied()
    }
}

/// Program-wide value pool. `ValueId`s are unique across functions.
#[derive(Debug, Clone, Default)]
pub struct ValuePool {
    values: Vec<ValueData>,
}

impl ValuePool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&mut self, kind: ValueKind) -> ValueId {
        let id = ValueId(self.values.len() as u32);
        self.values.push(ValueData::new(kind));
        id
    }

    pub fn get(&self, id: ValueId) -> &ValueData {
        &self.values[id.index()]
    }

    pub fn get_mut(&mut self, id: ValueId) -> &mut ValueData {
        &mut self.values[id.index()]
    }

    pub fn kind(&self, id: ValueId) -> &ValueKind {
        &self.values[id.index()].kind
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_are_dense_and_monotonic() {
        let mut pool = ValuePool::new();
        let a = pool.create(ValueKind::Const(1));
        let b = pool.create(ValueKind::Any);
        assert_eq!(a, ValueId(0));
        assert_eq!(b, ValueId(1));
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn remove_use_tombstones_in_place() {
        let mut pool = ValuePool::new();
        let v = pool.create(ValueKind::Any);
        pool.get_mut(v).add_use(InstrId(0));
        pool.get_mut(v).add_use(InstrId(1));
        pool.get_mut(v).remove_use(InstrId(0));
        let users: Vec<_> = pool.get(v).users().collect();
        assert_eq!(users, vec![InstrId(1)]);
    }

    #[test]
    fn never_live_kinds() {
        assert!(ValueKind::GlobalBase.never_live());
        assert!(ValueKind::Branch(BlockId(3)).never_live());
        assert!(ValueKind::Func("f".into()).never_live());
        assert!(!ValueKind::Const(7).never_live());
        assert!(!ValueKind::Any.never_live());
    }
}
