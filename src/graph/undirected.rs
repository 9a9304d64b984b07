//! Undirected view over a frozen code graph
//!
//! Algorithms that want symmetric neighborhoods (articulation points,
//! community detection, reducibility postprocessing) work on this view:
//! the neighbor set of a node is the union of its in- and out-neighbors
//! across every edge kind. Self-loops are omitted. The view is an owned
//! snapshot, so the session can cache it as a derived structure.

use std::collections::HashSet;

use super::CodeGraph;

/// Symmetric adjacency over the node slots of a frozen graph.
#[derive(Debug, Clone)]
pub struct UndirectedGraph {
    /// Sorted, deduplicated neighbor slots per node.
    neighbors: Vec<Vec<usize>>,
    /// Number of distinct undirected node pairs with at least one edge.
    edge_count: usize,
}

/// Build the undirected view of a frozen graph.
pub fn wrap_graph(graph: &CodeGraph) -> UndirectedGraph {
    let node_count = graph.node_count();
    let mut pair_set: HashSet<(usize, usize)> = HashSet::new();
    let mut neighbor_sets: Vec<HashSet<usize>> = vec![HashSet::new(); node_count];

    for slot in 0..node_count {
        for edge in graph.out_edges_at(slot) {
            let to = graph
                .slot(&edge.to)
                .expect("frozen edges have resolved endpoints");
            if to == slot {
                continue;
            }
            neighbor_sets[slot].insert(to);
            neighbor_sets[to].insert(slot);
            pair_set.insert((slot.min(to), slot.max(to)));
        }
    }

    let neighbors = neighbor_sets
        .into_iter()
        .map(|set| {
            let mut list: Vec<usize> = set.into_iter().collect();
            list.sort_unstable();
            list
        })
        .collect();

    UndirectedGraph {
        neighbors,
        edge_count: pair_set.len(),
    }
}

impl UndirectedGraph {
    pub fn node_count(&self) -> usize {
        self.neighbors.len()
    }

    /// Distinct undirected adjacent pairs.
    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    /// Neighbor slots of a node, sorted ascending.
    pub fn neighbors(&self, slot: usize) -> &[usize] {
        &self.neighbors[slot]
    }

    pub fn degree(&self, slot: usize) -> usize {
        self.neighbors[slot].len()
    }

    /// Connected components in deterministic order (lowest contained
    /// slot first); each component's members are sorted ascending.
    pub fn components(&self) -> Vec<Vec<usize>> {
        let mut assigned = vec![false; self.node_count()];
        let mut components = Vec::new();

        for start in 0..self.node_count() {
            if assigned[start] {
                continue;
            }
            let mut members = vec![start];
            assigned[start] = true;
            let mut stack = vec![start];
            while let Some(slot) = stack.pop() {
                for &next in self.neighbors(slot) {
                    if !assigned[next] {
                        assigned[next] = true;
                        members.push(next);
                        stack.push(next);
                    }
                }
            }
            members.sort_unstable();
            components.push(members);
        }

        components
    }

    pub fn component_count(&self) -> usize {
        self.components().len()
    }
}
