//! Register allocation for the pico compiler
//!
//! Three stages per function: liveness walks the CFG in reverse
//! post-order (back edges skipped) and builds an undirected interference
//! graph; phi-aware coalescing clusters each phi's operands with its
//! result so coloring can assign them one register; greedy graph coloring
//! with spill-cost ranking picks colors, and phi destruction rewrites the
//! IR with explicit moves once colors are known.

pub mod allocator;
pub mod igraph;
pub mod liveness;

pub use allocator::*;
pub use igraph::*;
pub use liveness::*;
