//! Two-level symbol table: global scope plus per-function scopes

use crate::TypeDecl;
use pico_common::{PicoError, PicoResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A declared name: scalar variable, multi-dimensional array, or formal
/// parameter (always scalar).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Symbol {
    Scalar,
    Array { dims: Vec<i64> },
    Param,
}

impl Symbol {
    pub fn from_type_decl(decl: &TypeDecl) -> Self {
        match decl {
            TypeDecl::Scalar => Symbol::Scalar,
            TypeDecl::Array(dims) => Symbol::Array { dims: dims.clone() },
        }
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Symbol::Array { .. })
    }

    /// Words of storage this symbol occupies
    pub fn size(&self) -> i64 {
        match self {
            Symbol::Scalar | Symbol::Param => 1,
            Symbol::Array { dims } => dims.iter().product(),
        }
    }
}

/// Callable signature: arity and whether a result is produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FuncSig {
    pub arity: usize,
    pub is_procedure: bool,
    pub is_intrinsic: bool,
}

/// Symbol table built by the parser and consumed by the IR constructor.
///
/// Two levels only: globals and one flat scope per function. The three
/// intrinsics are predeclared as functions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolTable {
    globals: HashMap<String, Symbol>,
    locals: HashMap<String, HashMap<String, Symbol>>,
    functions: HashMap<String, FuncSig>,
}

/// Names of the predeclared intrinsic functions
pub const INTRINSIC_INPUT_NUM: &str = "InputNum";
pub const INTRINSIC_OUTPUT_NUM: &str = "OutputNum";
pub const INTRINSIC_OUTPUT_NEW_LINE: &str = "OutputNewLine";

impl Default for SymbolTable {
    fn default() -> Self {
        let mut functions = HashMap::new();
        functions.insert(
            INTRINSIC_INPUT_NUM.to_string(),
            FuncSig { arity: 0, is_procedure: false, is_intrinsic: true },
        );
        functions.insert(
            INTRINSIC_OUTPUT_NUM.to_string(),
            FuncSig { arity: 1, is_procedure: true, is_intrinsic: true },
        );
        functions.insert(
            INTRINSIC_OUTPUT_NEW_LINE.to_string(),
            FuncSig { arity: 0, is_procedure: true, is_intrinsic: true },
        );
        Self {
            globals: HashMap::new(),
            locals: HashMap::new(),
            functions,
        }
    }
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn declare_global(&mut self, line: u32, name: &str, symbol: Symbol) -> PicoResult<()> {
        if self.globals.insert(name.to_string(), symbol).is_some() {
            return Err(PicoError::semantic(line, format!("'{}' declared twice", name)));
        }
        Ok(())
    }

    pub fn declare_local(
        &mut self,
        line: u32,
        func: &str,
        name: &str,
        symbol: Symbol,
    ) -> PicoResult<()> {
        let scope = self.locals.entry(func.to_string()).or_default();
        if scope.insert(name.to_string(), symbol).is_some() {
            return Err(PicoError::semantic(
                line,
                format!("'{}' declared twice in '{}'", name, func),
            ));
        }
        Ok(())
    }

    pub fn declare_function(&mut self, line: u32, name: &str, sig: FuncSig) -> PicoResult<()> {
        if self.functions.insert(name.to_string(), sig).is_some() {
            return Err(PicoError::semantic(line, format!("function '{}' declared twice", name)));
        }
        // Every function gets a scope even when it declares nothing.
        self.locals.entry(name.to_string()).or_default();
        Ok(())
    }

    /// Resolve a name in `func`'s scope, falling back to globals.
    /// `func = None` means the body of `main`, which sees only globals.
    pub fn lookup(&self, func: Option<&str>, name: &str) -> Option<&Symbol> {
        if let Some(func) = func {
            if let Some(symbol) = self.locals.get(func).and_then(|scope| scope.get(name)) {
                return Some(symbol);
            }
        }
        self.globals.get(name)
    }

    /// True when the name resolves in the function's own scope rather
    /// than through the globals.
    pub fn is_local(&self, func: Option<&str>, name: &str) -> bool {
        match func {
            Some(func) => self
                .locals
                .get(func)
                .map(|scope| scope.contains_key(name))
                .unwrap_or(false),
            None => false,
        }
    }

    pub fn function(&self, name: &str) -> Option<&FuncSig> {
        self.functions.get(name)
    }

    pub fn globals(&self) -> impl Iterator<Item = (&String, &Symbol)> {
        self.globals.iter()
    }

    pub fn locals_of(&self, func: &str) -> impl Iterator<Item = (&String, &Symbol)> {
        self.locals.get(func).into_iter().flat_map(|scope| scope.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intrinsics_are_predeclared() {
        let table = SymbolTable::new();
        assert_eq!(table.function(INTRINSIC_INPUT_NUM).unwrap().arity, 0);
        assert_eq!(table.function(INTRINSIC_OUTPUT_NUM).unwrap().arity, 1);
        assert!(table.function(INTRINSIC_OUTPUT_NEW_LINE).unwrap().is_intrinsic);
    }

    #[test]
    fn locals_shadow_globals() {
        let mut table = SymbolTable::new();
        table.declare_global(1, "x", Symbol::Scalar).unwrap();
        table
            .declare_local(2, "f", "x", Symbol::Array { dims: vec![4] })
            .unwrap();
        assert!(table.lookup(Some("f"), "x").unwrap().is_array());
        assert!(!table.lookup(None, "x").unwrap().is_array());
        assert!(table.is_local(Some("f"), "x"));
        assert!(!table.is_local(None, "x"));
    }

    #[test]
    fn double_declaration_is_rejected() {
        let mut table = SymbolTable::new();
        table.declare_global(1, "x", Symbol::Scalar).unwrap();
        assert!(table.declare_global(2, "x", Symbol::Scalar).is_err());
    }

    #[test]
    fn array_size_is_product_of_dims() {
        assert_eq!(Symbol::Array { dims: vec![3, 4] }.size(), 12);
        assert_eq!(Symbol::Scalar.size(), 1);
    }
}
