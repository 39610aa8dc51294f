//! CFG traversal orders and back-edge classification
//!
//! Post-order and reverse post-order are computed lazily per function and
//! cached until any block or edge is added. An edge `(u, v)` is a back
//! edge iff `v` is on the DFS stack when the edge is first examined.

use crate::block::{BasicBlock, BlockId};
use hashbrown::HashSet;

#[derive(Debug, Clone, Default)]
pub struct CfgCache {
    post_order: Option<Vec<BlockId>>,
    back_edges: HashSet<(BlockId, BlockId)>,
}

impl CfgCache {
    pub fn invalidate(&mut self) {
        self.post_order = None;
        self.back_edges.clear();
    }

    pub fn is_valid(&self) -> bool {
        self.post_order.is_some()
    }

    pub fn post_order(&self) -> &[BlockId] {
        self.post_order
            .as_deref()
            .expect("CFG orders queried before computation")
    }

    pub fn is_back_edge(&self, from: BlockId, to: BlockId) -> bool {
        self.back_edges.contains(&(from, to))
    }

    /// Depth-first walk from `entry`: records post-order and the back-edge
    /// set in one pass. Iterative so deeply nested programs cannot blow
    /// the call stack.
    pub fn compute(&mut self, blocks: &[BasicBlock], entry: BlockId) {
        let mut post_order = Vec::with_capacity(blocks.len());
        let mut back_edges = HashSet::new();
        let mut visited = vec![false; blocks.len()];
        let mut on_stack = vec![false; blocks.len()];

        // (block, next successor index to examine)
        let mut stack: Vec<(BlockId, usize)> = Vec::new();
        visited[entry.index()] = true;
        on_stack[entry.index()] = true;
        stack.push((entry, 0));

        while let Some(&mut (block, ref mut next)) = stack.last_mut() {
            let successors = &blocks[block.index()].successors;
            if *next < successors.len() {
                let succ = successors[*next];
                *next += 1;
                if on_stack[succ.index()] {
                    back_edges.insert((block, succ));
                } else if !visited[succ.index()] {
                    visited[succ.index()] = true;
                    on_stack[succ.index()] = true;
                    stack.push((succ, 0));
                }
            } else {
                on_stack[block.index()] = false;
                post_order.push(block);
                stack.pop();
            }
        }

        self.post_order = Some(post_order);
        self.back_edges = back_edges;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::BlockKind;

    fn diamond() -> Vec<BasicBlock> {
        // 0 -> 1, 0 -> 2, 1 -> 3, 2 -> 3
        let mut blocks: Vec<BasicBlock> = (0..4)
            .map(|i| BasicBlock::new(BlockId(i), BlockKind::Normal))
            .collect();
        for (from, to) in [(0u32, 1u32), (0, 2), (1, 3), (2, 3)] {
            blocks[from as usize].successors.push(BlockId(to));
            blocks[to as usize].predecessors.push(BlockId(from));
        }
        blocks
    }

    #[test]
    fn post_order_visits_each_reachable_block_once() {
        let blocks = diamond();
        let mut cache = CfgCache::default();
        cache.compute(&blocks, BlockId(0));

        let order = cache.post_order();
        assert_eq!(order.len(), 4);
        assert_eq!(order.last(), Some(&BlockId(0)));
        let mut sorted = order.to_vec();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), 4);
    }

    #[test]
    fn loop_edge_is_a_back_edge() {
        // 0 -> 1 (header), 1 -> 2 (body), 2 -> 1 (back), 1 -> 3 (exit)
        let mut blocks: Vec<BasicBlock> = vec![
            BasicBlock::new(BlockId(0), BlockKind::Entry),
            BasicBlock::new(BlockId(1), BlockKind::LoopHead),
            BasicBlock::new(BlockId(2), BlockKind::Normal),
            BasicBlock::new(BlockId(3), BlockKind::Normal),
        ];
        for (from, to) in [(0u32, 1u32), (1, 2), (2, 1), (1, 3)] {
            blocks[from as usize].successors.push(BlockId(to));
            blocks[to as usize].predecessors.push(BlockId(from));
        }
        let mut cache = CfgCache::default();
        cache.compute(&blocks, BlockId(0));

        assert!(cache.is_back_edge(BlockId(2), BlockId(1)));
        assert!(!cache.is_back_edge(BlockId(0), BlockId(1)));
        assert!(!cache.is_back_edge(BlockId(1), BlockId(2)));
    }

    #[test]
    fn unreachable_blocks_are_absent_from_the_order() {
        let mut blocks = diamond();
        blocks.push(BasicBlock::new(BlockId(4), BlockKind::Normal));
        let mut cache = CfgCache::default();
        cache.compute(&blocks, BlockId(0));
        assert!(!cache.post_order().contains(&BlockId(4)));
    }
}
