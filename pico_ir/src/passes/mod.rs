//! Optional analysis passes over the constructed IR
//!
//! Every pass honors the `active` bit: rewrites deactivate instructions
//! rather than deleting them, so handles stay valid. The driver runs the
//! full pipeline unless optimization is disabled.

pub mod clobber;
pub mod const_fold;
pub mod cse;
pub mod dce;
pub mod load_elim;

pub use clobber::{global_clobbering, ClobberMap};

use crate::program::Program;
use log::info;

/// The standard pipeline: fold constants, reuse common subexpressions,
/// drop redundant loads, then sweep dead code.
pub fn run_all(program: &mut Program) {
    info!("[opt] constant folding");
    const_fold::run(program);
    info!("[opt] common subexpression elimination");
    cse::run(program);
    info!("[opt] redundant load elimination");
    load_elim::run(program);
    info!("[opt] dead code elimination");
    dce::run(program);
}
