//! Undirected interference graph with phi clusters
//!
//! Nodes are the values that need a register; edges mean two values are
//! live at the same point. Adjacency is sparse. A cluster groups a phi's
//! operands with its result so the allocator can give the whole set one
//! color; a value may belong to several clusters and a cluster's
//! neighborhood is the union of its members' neighborhoods.

use hashbrown::{HashMap, HashSet};
use pico_ir::ValueId;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClusterId(pub u32);

#[derive(Debug, Clone, Default)]
pub struct InterferenceGraph {
    adjacency: HashMap<ValueId, HashSet<ValueId>>,
    val_to_cluster: HashMap<ValueId, HashSet<ClusterId>>,
    /// Ordered so cluster coloring is deterministic
    cluster_members: BTreeMap<ClusterId, HashSet<ValueId>>,
    cluster_neighbors: BTreeMap<ClusterId, HashSet<ValueId>>,
    next_cluster: u32,
}

impl InterferenceGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ensure_node(&mut self, value: ValueId) {
        self.adjacency.entry(value).or_default();
    }

    pub fn add_edge(&mut self, a: ValueId, b: ValueId) {
        if a == b {
            return;
        }
        self.adjacency.entry(a).or_default().insert(b);
        self.adjacency.entry(b).or_default().insert(a);
    }

    pub fn interferes(&mut self, a: ValueId, b: ValueId) -> bool {
        self.ensure_node(a);
        self.ensure_node(b);
        self.adjacency[&a].contains(&b)
    }

    pub fn neighbors(&self, value: ValueId) -> Option<&HashSet<ValueId>> {
        self.adjacency.get(&value)
    }

    pub fn degree(&self, value: ValueId) -> usize {
        self.adjacency.get(&value).map(|n| n.len()).unwrap_or(0)
    }

    /// All nodes, sorted so iteration order is stable
    pub fn nodes(&self) -> Vec<ValueId> {
        let mut nodes: Vec<ValueId> = self.adjacency.keys().copied().collect();
        nodes.sort();
        nodes
    }

    pub fn node_count(&self) -> usize {
        self.adjacency.len()
    }

    /// Group `values` (a phi's operands and result) into a fresh cluster.
    /// Membership is many-to-many: a value shared between phis lands in
    /// each phi's cluster.
    pub fn register_cluster(&mut self, values: &[ValueId]) -> ClusterId {
        self.next_cluster += 1;
        let id = ClusterId(self.next_cluster);
        for &value in values {
            self.ensure_node(value);
            self.val_to_cluster.entry(value).or_default().insert(id);
            self.cluster_members.entry(id).or_default().insert(value);
        }
        id
    }

    /// Compute each cluster's neighborhood as the union of its members'
    /// neighborhoods. Call once after all clusters are registered.
    pub fn merge_cluster_neighbors(&mut self) {
        self.cluster_neighbors.clear();
        for (&id, members) in &self.cluster_members {
            let mut neighbors: HashSet<ValueId> = HashSet::new();
            for member in members {
                if let Some(adjacent) = self.adjacency.get(member) {
                    neighbors.extend(adjacent.iter().copied());
                }
            }
            self.cluster_neighbors.insert(id, neighbors);
        }
    }

    pub fn clusters(&self) -> impl Iterator<Item = (ClusterId, &HashSet<ValueId>)> {
        self.cluster_members.iter().map(|(&id, members)| (id, members))
    }

    pub fn cluster_neighbors(&self, id: ClusterId) -> Option<&HashSet<ValueId>> {
        self.cluster_neighbors.get(&id)
    }

    pub fn clusters_of(&self, value: ValueId) -> Option<&HashSet<ClusterId>> {
        self.val_to_cluster.get(&value)
    }
}
