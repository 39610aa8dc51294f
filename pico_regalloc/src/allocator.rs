//! Graph-coloring register allocation and phi destruction
//!
//! Clusters color first so a phi's operands and result land in one
//! register; remaining values follow in handle order. The palette holds
//! `registers` physical colors. By default the allocator keeps going past
//! the palette with virtual colors, ranks those spill candidates by
//! `10^loop_depth / degree`, and retries the expensive ones first; in
//! strict mode palette exhaustion after the retry is fatal. Phi
//! destruction then rewrites every surviving phi into moves placed in the
//! predecessor blocks.

use crate::igraph::InterferenceGraph;
use crate::liveness::IgBuilder;
use hashbrown::{HashMap, HashSet};
use log::{debug, warn};
use pico_common::{PicoError, PicoResult};
use pico_ir::{BlockId, Function, Program, ValueId, ValuePool};
use std::collections::BTreeMap;

/// A register color. `White` means unassigned, `Black` means the value
/// carries no register constraint at all (it never competes). Physical
/// registers are `Reg(1)..=Reg(K)`; anything above `K` is a virtual
/// color standing in for a spill slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Color {
    White,
    Black,
    Reg(u32),
}

impl Color {
    pub fn is_physical(self, registers: u32) -> bool {
        matches!(self, Color::Reg(r) if r <= registers)
    }
}

#[derive(Debug, Clone)]
pub struct AllocConfig {
    /// Palette size K
    pub registers: u32,
    /// Fail instead of spilling virtually when the palette runs out
    pub strict: bool,
}

impl Default for AllocConfig {
    fn default() -> Self {
        Self {
            registers: 6,
            strict: false,
        }
    }
}

pub type Coloring = HashMap<ValueId, Color>;

/// Allocate every function of the program and run phi destruction.
/// Returns the final coloring per function.
pub fn allocate_program(
    program: &mut Program,
    config: &AllocConfig,
) -> PicoResult<BTreeMap<String, Coloring>> {
    let mut colorings = BTreeMap::new();
    let (functions, pool) = program.functions_and_pool();

    for function in functions {
        let graph = IgBuilder::build(function, pool);
        let mut allocator = RegAllocator::new(graph, config.clone());
        allocator.color_graph(pool)?;
        allocator.destroy_phis(function, pool);
        colorings.insert(function.name().to_string(), allocator.coloring);
    }

    Ok(colorings)
}

pub struct RegAllocator {
    graph: InterferenceGraph,
    config: AllocConfig,
    pub coloring: Coloring,
}

impl RegAllocator {
    pub fn new(graph: InterferenceGraph, config: AllocConfig) -> Self {
        Self {
            graph,
            config,
            coloring: Coloring::new(),
        }
    }

    pub fn color_of(&self, value: ValueId) -> Color {
        self.coloring.get(&value).copied().unwrap_or(Color::White)
    }

    fn share_cluster(&self, a: ValueId, b: ValueId) -> bool {
        match (self.graph.clusters_of(a), self.graph.clusters_of(b)) {
            (Some(left), Some(right)) => left.iter().any(|id| right.contains(id)),
            _ => false,
        }
    }

    /// First available color given a neighborhood: the lowest physical
    /// color no neighbor holds, else the lowest free virtual color.
    fn pick_color(&self, neighbors: &HashSet<ValueId>) -> Color {
        let taken: HashSet<Color> = neighbors
            .iter()
            .filter_map(|n| self.coloring.get(n).copied())
            .collect();

        for r in 1..=self.config.registers {
            if !taken.contains(&Color::Reg(r)) {
                return Color::Reg(r);
            }
        }
        let mut r = self.config.registers + 1;
        while taken.contains(&Color::Reg(r)) {
            r += 1;
        }
        Color::Reg(r)
    }

    /// Color clusters first, then every remaining node in handle order,
    /// then rank whatever exceeded the palette by spill cost and retry.
    pub fn color_graph(&mut self, pool: &mut ValuePool) -> PicoResult<()> {
        let clusters: Vec<(Vec<ValueId>, HashSet<ValueId>)> = self
            .graph
            .clusters()
            .map(|(id, members)| {
                let mut members: Vec<ValueId> = members.iter().copied().collect();
                members.sort();
                let neighbors = self
                    .graph
                    .cluster_neighbors(id)
                    .cloned()
                    .unwrap_or_default();
                (members, neighbors)
            })
            .collect();

        for (members, neighbors) in clusters {
            let color = self.pick_color(&neighbors);
            for member in members {
                self.coloring.insert(member, color);
            }
        }

        for value in self.graph.nodes() {
            if self.coloring.contains_key(&value) {
                continue;
            }
            let neighbors = self.graph.neighbors(value).cloned().unwrap_or_default();
            let color = self.pick_color(&neighbors);
            self.coloring.insert(value, color);
        }

        self.retry_spilled(pool)
    }

    /// Spill-cost pass: every value whose color exceeded the palette gets
    /// `cost = 10^loop_depth / degree`; retrying in descending cost order
    /// keeps the expensive values in registers.
    fn retry_spilled(&mut self, pool: &mut ValuePool) -> PicoResult<()> {
        let mut candidates: Vec<(ValueId, f64)> = Vec::new();
        for value in self.graph.nodes() {
            if let Some(&color) = self.coloring.get(&value) {
                if !color.is_physical(self.config.registers) {
                    let depth = pool.get(value).loop_depth;
                    let degree = self.graph.degree(value).max(1);
                    let cost = 10f64.powi(depth as i32) / degree as f64;
                    pool.get_mut(value).spill_cost = cost;
                    candidates.push((value, cost));
                }
            }
        }
        if candidates.is_empty() {
            return Ok(());
        }

        candidates.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        debug!("[alloc] retrying {} spill candidates", candidates.len());

        for (value, _) in &candidates {
            self.coloring.remove(value);
        }
        for (value, _) in candidates {
            let neighbors = self.graph.neighbors(value).cloned().unwrap_or_default();
            let color = self.pick_color(&neighbors);
            if self.config.strict && !color.is_physical(self.config.registers) {
                warn!("[alloc] palette exhausted at {:?}", value);
                return Err(PicoError::alloc(format!(
                    "{} registers are not enough; value {:?} cannot be colored",
                    self.config.registers, value
                )));
            }
            self.coloring.insert(value, color);
        }
        Ok(())
    }

    /// Rewrite every still-active phi into moves. Walking in reverse
    /// post-order, each phi is deactivated and, per operand (keyed by its
    /// source predecessor): an operand colored differently from the
    /// result moves into the result's color, and a constant that merely
    /// shares the color by accident (same color, no shared cluster) is
    /// re-materialized the same way. A cluster-coalesced phi therefore
    /// lowers to nothing. The move splices before the predecessor's
    /// terminator.
    pub fn destroy_phis(&mut self, function: &mut Function, pool: &mut ValuePool) {
        let order = function.reverse_post_order();
        for block in order {
            let instrs: Vec<_> = function.block(block).instructions().to_vec();
            for id in instrs {
                let instr = function.instr(id);
                if !instr.is_phi() || !instr.active {
                    continue;
                }

                let result = instr.result;
                let result_color = self.color_of(result);
                let mut sources: Vec<(BlockId, ValueId)> =
                    instr.op_source.iter().map(|(&b, &v)| (b, v)).collect();
                sources.sort();

                function.instr_mut(id).active = false;
                if result_color == Color::White {
                    // The phi's value is never used; nothing to move.
                    continue;
                }

                for (pred, operand) in sources {
                    let operand_color = self.color_of(operand);
                    let needs_move = if operand_color == result_color {
                        pool.kind(operand).is_const() && !self.share_cluster(operand, result)
                    } else {
                        true
                    };
                    if needs_move {
                        let reg = function.create_move(pool, pred, operand);
                        self.coloring.insert(reg, result_color);
                    }
                }
            }
        }
    }
}

/// Check that the coloring separates every interference edge; used by
/// tests and debug assertions.
pub fn check_coloring(graph: &InterferenceGraph, coloring: &Coloring) -> Result<(), String> {
    for value in graph.nodes() {
        let Some(neighbors) = graph.neighbors(value) else {
            continue;
        };
        for &neighbor in neighbors {
            let a = coloring.get(&value);
            let b = coloring.get(&neighbor);
            if let (Some(a), Some(b)) = (a, b) {
                if a == b {
                    return Err(format!(
                        "{:?} and {:?} interfere but share {:?}",
                        value, neighbor, a
                    ));
                }
            }
        }
    }
    Ok(())
}
