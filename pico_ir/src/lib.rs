//! Intermediate representation for the pico compiler
//!
//! The IR is a per-function control-flow graph of basic blocks holding
//! three-address instructions in SSA form. SSA is constructed on the fly
//! while walking the AST (Braun et al., "Simple and Efficient Construction
//! of Static Single Assignment Form"): there is no separate dominance or
//! phi-placement pass. Identity is by dense integer handle everywhere;
//! handles are never reused.

pub mod block;
pub mod builder;
pub mod cfg;
pub mod dump;
pub mod function;
pub mod instruction;
pub mod passes;
pub mod program;
pub mod ssa;
pub mod value;
pub mod vcg;

pub use block::*;
pub use builder::*;
pub use dump::*;
pub use function::*;
pub use instruction::*;
pub use program::*;
pub use value::*;
