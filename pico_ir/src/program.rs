//! Whole-program IR container

use crate::function::Function;
use crate::value::{ValueId, ValueKind, ValuePool};
use hashbrown::HashMap;
use std::collections::BTreeMap;

/// A global symbol: optional array dimensions and its word offset from
/// the global base pointer.
#[derive(Debug, Clone)]
pub struct GlobalInfo {
    pub dims: Option<Vec<i64>>,
    pub offset: i64,
}

/// The compilation unit: functions keyed by name (in declaration order,
/// `main` last), global symbols, and the program-wide value pool.
///
/// This is the handle threaded explicitly from pass to pass; there is no
/// process-wide mutable state.
#[derive(Debug, Clone)]
pub struct Program {
    functions: Vec<Function>,
    by_name: HashMap<String, usize>,
    pub pool: ValuePool,
    pub globals: BTreeMap<String, GlobalInfo>,
    pub global_base: ValueId,
}

impl Default for Program {
    fn default() -> Self {
        Self::new()
    }
}

impl Program {
    pub fn new() -> Self {
        let mut pool = ValuePool::new();
        let global_base = pool.create(ValueKind::GlobalBase);
        Self {
            functions: Vec::new(),
            by_name: HashMap::new(),
            pool,
            globals: BTreeMap::new(),
            global_base,
        }
    }

    pub fn add_function(&mut self, function: Function) {
        self.by_name
            .insert(function.name().to_string(), self.functions.len());
        self.functions.push(function);
    }

    pub fn function(&self, name: &str) -> Option<&Function> {
        self.by_name.get(name).map(|&i| &self.functions[i])
    }

    pub fn function_mut(&mut self, name: &str) -> Option<&mut Function> {
        let i = *self.by_name.get(name)?;
        Some(&mut self.functions[i])
    }

    pub fn functions(&self) -> impl Iterator<Item = &Function> {
        self.functions.iter()
    }

    pub fn functions_mut(&mut self) -> impl Iterator<Item = &mut Function> {
        self.functions.iter_mut()
    }

    /// Split borrow for passes that rewrite functions while creating
    /// values in the pool.
    pub fn functions_and_pool(&mut self) -> (&mut [Function], &mut ValuePool) {
        (self.functions.as_mut_slice(), &mut self.pool)
    }
}
