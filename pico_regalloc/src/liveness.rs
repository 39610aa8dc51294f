//! Liveness analysis and interference graph construction
//!
//! Blocks are visited successors-first from the entry (reverse post-order
//! overall), each block's instructions scanned in reverse. Back edges are
//! skipped: for structured loops the header's live-in converges in one
//! pass because SSA construction already placed the phi operands the back
//! edge will carry. Loop depth increments when the walk enters a loop
//! header through a forward edge; the depth tags every result defined
//! inside, feeding the spill-cost metric later.
//!
//! Values of kind `Branch`, `GlobalBase`, `LocalBase`, and `Func` never
//! enter a live set; they do not compete for registers. Constants do
//! participate: they get colors, and phi destruction re-materializes them
//! when needed.

use crate::igraph::InterferenceGraph;
use hashbrown::{HashMap, HashSet};
use log::debug;
use pico_ir::{BlockId, Function, ValueId, ValuePool};

pub struct IgBuilder {
    graph: InterferenceGraph,
    live_in: HashMap<BlockId, HashSet<ValueId>>,
    visited: HashSet<BlockId>,
    loop_depth: u32,
}

impl IgBuilder {
    /// Build the interference graph for one function and register the
    /// coalescing clusters for its phis.
    pub fn build(function: &mut Function, pool: &mut ValuePool) -> InterferenceGraph {
        Self::build_with_liveness(function, pool).0
    }

    /// Same, but also hand back the per-block live-in sets.
    pub fn build_with_liveness(
        function: &mut Function,
        pool: &mut ValuePool,
    ) -> (InterferenceGraph, HashMap<BlockId, HashSet<ValueId>>) {
        let mut builder = IgBuilder {
            graph: InterferenceGraph::new(),
            live_in: HashMap::new(),
            visited: HashSet::new(),
            loop_depth: 0,
        };
        let entry = function.entry;
        builder.process_block(function, pool, entry);
        builder.coalesce(function);
        builder.graph.merge_cluster_neighbors();
        debug!(
            "[ig] {}: {} nodes",
            function.name(),
            builder.graph.node_count()
        );
        (builder.graph, builder.live_in)
    }

    fn process_block(&mut self, function: &mut Function, pool: &mut ValuePool, block: BlockId) {
        if self.visited.contains(&block) {
            return;
        }

        let successors: Vec<BlockId> = function.block(block).successors.to_vec();
        for &succ in &successors {
            if function.block(succ).is_loop_head() {
                if function.is_back_edge(block, succ) {
                    // Loop end; the header is handled on the forward path.
                    continue;
                }
                self.loop_depth += 1;
                self.process_block(function, pool, succ);
                self.loop_depth -= 1;
            } else {
                self.process_block(function, pool, succ);
            }
        }

        let mut live: HashSet<ValueId> = HashSet::new();

        for &succ in &successors {
            if let Some(succ_live) = self.live_in.get(&succ) {
                live.extend(succ_live.iter().copied());
            }

            // Values flowing into the successor's phis from this block
            // are live out of it.
            for &id in function.block(succ).instructions() {
                let instr = function.instr(id);
                if !instr.is_phi() {
                    // Past the phi prefix.
                    break;
                }
                if !instr.active {
                    continue;
                }
                if let Some(&value) = instr.op_source.get(&block) {
                    if !pool.kind(value).never_live() {
                        live.insert(value);
                        self.graph.ensure_node(value);
                    }
                }
            }
        }

        let instrs: Vec<_> = function.block(block).instructions().to_vec();
        for &id in instrs.iter().rev() {
            if !function.is_active(id) {
                continue;
            }
            let result = function.instr(id).result;
            pool.get_mut(result).loop_depth = self.loop_depth;
            live.remove(&result);

            if !function.instr(id).is_phi() {
                let operands: Vec<ValueId> = function.instr(id).operands.to_vec();
                for operand in operands {
                    if !pool.kind(operand).never_live() {
                        live.insert(operand);
                        self.graph.ensure_node(operand);
                    }
                }
            }

            // Everything live across this point interferes pairwise.
            let snapshot: Vec<ValueId> = live.iter().copied().collect();
            for (i, &a) in snapshot.iter().enumerate() {
                for &b in &snapshot[i + 1..] {
                    self.graph.add_edge(a, b);
                }
            }
        }

        self.live_in.insert(block, live);
        self.visited.insert(block);
    }

    /// Register one cluster per coalesceable phi: operands and result
    /// share a color when none of the three pairs interfere. Phis that
    /// fail the test stay for the phi-destruction pass to lower.
    fn coalesce(&mut self, function: &Function) {
        for block in function.blocks() {
            for &id in block.instructions() {
                let instr = function.instr(id);
                if !instr.is_phi() {
                    break;
                }
                if !instr.active || instr.operands.len() != 2 {
                    continue;
                }
                let result = instr.result;
                let a = instr.operands[0];
                let b = instr.operands[1];

                if !self.graph.interferes(a, result)
                    && !self.graph.interferes(b, result)
                    && !self.graph.interferes(a, b)
                {
                    self.graph.register_cluster(&[a, b, result]);
                } else {
                    debug!(
                        "[ig] phi at {} not coalesceable: {:?} {:?} {:?}",
                        block.idx, a, b, result
                    );
                }
            }
        }
    }
}
