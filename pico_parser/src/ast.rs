//! Abstract syntax tree definitions for the pico language

use pico_common::{Span, Spanned};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A complete pico program: globals, function declarations, and the body
/// of `main`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Computation {
    pub globals: Vec<VarDecl>,
    pub functions: Vec<FuncDecl>,
    pub body: Vec<Statement>,
    pub span: Span,
}

/// One `var`/`array` declaration line, possibly declaring several names
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VarDecl {
    pub type_decl: TypeDecl,
    pub names: Vec<Spanned<String>>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeDecl {
    Scalar,
    /// Dimensions outermost first, e.g. `array[3][4]` is `vec![3, 4]`
    Array(Vec<i64>),
}

/// Function or procedure declaration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FuncDecl {
    pub is_procedure: bool,
    pub name: Spanned<String>,
    pub params: Vec<Spanned<String>>,
    pub locals: Vec<VarDecl>,
    pub body: Vec<Statement>,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Statement {
    Assignment(Assignment),
    Call(FuncCall),
    If(IfStmt),
    While(WhileStmt),
    Return(ReturnStmt),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assignment {
    pub target: Designator,
    pub value: Expression,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FuncCall {
    pub name: Spanned<String>,
    pub args: Vec<Expression>,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IfStmt {
    pub condition: Relation,
    pub then_body: Vec<Statement>,
    pub else_body: Option<Vec<Statement>>,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhileStmt {
    pub condition: Relation,
    pub body: Vec<Statement>,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReturnStmt {
    pub value: Option<Expression>,
    pub span: Span,
}

/// Either a bare variable or an array element access
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Designator {
    Var(Spanned<String>),
    Array {
        name: Spanned<String>,
        indices: Vec<Expression>,
    },
}

impl Designator {
    pub fn name(&self) -> &str {
        match self {
            Designator::Var(name) => &name.value,
            Designator::Array { name, .. } => &name.value,
        }
    }

    pub fn span(&self) -> Span {
        match self {
            Designator::Var(name) => name.span,
            Designator::Array { name, .. } => name.span,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Expression {
    Number(Spanned<i64>),
    Designator(Designator),
    Call(FuncCall),
    Binary {
        op: BinaryOp,
        lhs: Box<Expression>,
        rhs: Box<Expression>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BinaryOp::Add => write!(f, "+"),
            BinaryOp::Sub => write!(f, "-"),
            BinaryOp::Mul => write!(f, "*"),
            BinaryOp::Div => write!(f, "/"),
        }
    }
}

/// A relational comparison between two expressions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relation {
    pub op: RelOp,
    pub lhs: Expression,
    pub rhs: Expression,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelOp {
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
}

impl RelOp {
    /// The complement, used to branch to the false arm of a conditional.
    pub fn negated(self) -> RelOp {
        match self {
            RelOp::Eq => RelOp::Neq,
            RelOp::Neq => RelOp::Eq,
            RelOp::Lt => RelOp::Gte,
            RelOp::Lte => RelOp::Gt,
            RelOp::Gt => RelOp::Lte,
            RelOp::Gte => RelOp::Lt,
        }
    }
}

impl fmt::Display for RelOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelOp::Eq => write!(f, "=="),
            RelOp::Neq => write!(f, "!="),
            RelOp::Lt => write!(f, "<"),
            RelOp::Lte => write!(f, "<="),
            RelOp::Gt => write!(f, ">"),
            RelOp::Gte => write!(f, ">="),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relop_negation_is_an_involution() {
        for op in [RelOp::Eq, RelOp::Neq, RelOp::Lt, RelOp::Lte, RelOp::Gt, RelOp::Gte] {
            assert_eq!(op.negated().negated(), op);
        }
    }
}
