use crate::block::BlockId;
use crate::function::FunctionBody;
use std::collections::{BTreeMap, BTreeSet, VecDeque};

#[derive(Debug, Clone)]
pub struct ControlFlowGraph {
    pub edges: BTreeMap<BlockId, Vec<BlockId>>,
    pub reverse_edges: BTreeMap<BlockId, Vec<BlockId>>,
    pub entry: BlockId,
}

impl ControlFlowGraph {
    pub fn from_function(body: &FunctionBody) -> Self {
        let mut edges = BTreeMap::new();
        let mut reverse_edges = BTreeMap::new();

        for (block_id, block) in &body.blocks {
            let successors = block.terminator.successors();
            edges.insert(*block_id, successors.clone());

            for succ in successors {
                reverse_edges
                    .entry(succ)
                    .or_insert_with(Vec::new)
                    .push(*block_id);
            }
        }

        Self {
            edges,
            reverse_edges,
            entry: body.entry_block,
        }
    }

    pub fn predecessors(&self, block: BlockId) -> &[BlockId] {
        self.reverse_edges
            .get(&block)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn successors(&self, block: BlockId) -> &[BlockId] {
        self.edges.get(&block).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn is_reachable(&self, block: BlockId) -> bool {
        self.reachable_blocks().contains(&block)
    }

    pub fn reachable_blocks(&self) -> BTreeSet<BlockId> {
        self.reachable_from(self.entry)
    }

    pub fn reachable_from(&self, start: BlockId) -> BTreeSet<BlockId> {
        let mut visited = BTreeSet::new();
        let mut queue = VecDeque::new();
        queue.push_back(start);

        while let Some(current) = queue.pop_front() {
            if visited.insert(current) {
                for &succ in self.successors(current) {
                    queue.push_back(succ);
                }
            }
        }

        visited
    }

    /// Whether every path from the entry to `target` passes through `via`.
    pub fn dominates(&self, via: BlockId, target: BlockId) -> bool {
        if via == target || via == self.entry {
            return true;
        }
        let mut visited = BTreeSet::new();
        let mut queue = VecDeque::new();
        queue.push_back(self.entry);

        while let Some(current) = queue.pop_front() {
            if current == via || !visited.insert(current) {
                continue;
            }
            if current == target {
                return false;
            }
            for &succ in self.successors(current) {
                queue.push_back(succ);
            }
        }

        true
    }
}
