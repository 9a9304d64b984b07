//! Dominator tree over the forward call graph
//!
//! A node d dominates node n if every path from the entry to n passes
//! through d. The tree is computed with petgraph's dominance algorithm
//! (Cooper et al.) over the calls-only projection, restricted to nodes
//! reachable from the entry. Unreachable nodes are absent from the
//! tree; the entry's immediate dominator is itself.

use std::collections::HashMap;

use petgraph::algo::dominators::simple_fast;
use petgraph::graph::NodeIndex;

use crate::cancel::CancelToken;
use crate::error::EngineError;
use crate::graph::CodeGraph;

/// Immutable dominator tree keyed by symbol ID.
#[derive(Debug, Clone)]
pub struct DominatorTree {
    entry: String,
    entry_slot: usize,
    /// Immediate dominator per reachable slot; the entry maps to itself.
    idom: HashMap<usize, usize>,
    /// Children in the dominator tree, sorted by slot for determinism.
    children: HashMap<usize, Vec<usize>>,
}

impl DominatorTree {
    /// Compute the dominator tree rooted at `entry`.
    ///
    /// Returns `NodeNotFound` when the entry ID is absent from the
    /// graph. An entry with nothing reachable beyond itself yields a
    /// single-node tree, not an error.
    pub fn compute(
        graph: &CodeGraph,
        entry: &str,
        token: &CancelToken,
    ) -> Result<Self, EngineError> {
        token.check()?;
        let entry_slot = graph
            .slot(entry)
            .ok_or_else(|| EngineError::NodeNotFound(entry.to_string()))?;

        let dominators = simple_fast(graph.calls_graph(), NodeIndex::new(entry_slot));

        let mut idom = HashMap::new();
        let mut children: HashMap<usize, Vec<usize>> = HashMap::new();
        idom.insert(entry_slot, entry_slot);

        for node in 0..graph.node_count() {
            token.check_at(node)?;
            if node == entry_slot {
                continue;
            }
            if let Some(parent) = dominators.immediate_dominator(NodeIndex::new(node)) {
                idom.insert(node, parent.index());
                children.entry(parent.index()).or_default().push(node);
            }
        }
        for list in children.values_mut() {
            list.sort_unstable();
        }

        Ok(Self {
            entry: entry.to_string(),
            entry_slot,
            idom,
            children,
        })
    }

    /// Entry symbol ID the tree is rooted at.
    pub fn entry(&self) -> &str {
        &self.entry
    }

    /// Number of nodes in the tree (reachable from entry).
    pub fn node_count(&self) -> usize {
        self.idom.len()
    }

    /// Whether `id` is reachable from the entry.
    pub fn contains(&self, graph: &CodeGraph, id: &str) -> bool {
        graph
            .slot(id)
            .map(|slot| self.idom.contains_key(&slot))
            .unwrap_or(false)
    }

    /// Immediate dominator of `id`; the entry maps to itself.
    /// `None` for unreachable or unknown IDs.
    pub fn immediate_dominator<'a>(&self, graph: &'a CodeGraph, id: &str) -> Option<&'a str> {
        let slot = graph.slot(id)?;
        self.idom
            .get(&slot)
            .map(|&parent| graph.symbol_at(parent).id.as_str())
    }

    /// ID-keyed immediate dominator map (reachable nodes only).
    pub fn immediate_dom_map(&self, graph: &CodeGraph) -> HashMap<String, String> {
        self.idom
            .iter()
            .map(|(&node, &parent)| {
                (
                    graph.symbol_at(node).id.clone(),
                    graph.symbol_at(parent).id.clone(),
                )
            })
            .collect()
    }

    /// Nodes immediately dominated by `id`, in node admission order.
    pub fn children<'a>(&self, graph: &'a CodeGraph, id: &str) -> Vec<&'a str> {
        graph
            .slot(id)
            .and_then(|slot| self.children.get(&slot))
            .map(|kids| {
                kids.iter()
                    .map(|&kid| graph.symbol_at(kid).id.as_str())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Depth of `id` in the tree; the entry is depth 0. `None` for
    /// unreachable or unknown IDs.
    pub fn depth(&self, graph: &CodeGraph, id: &str) -> Option<usize> {
        let slot = graph.slot(id)?;
        if !self.idom.contains_key(&slot) {
            return None;
        }
        let mut depth = 0;
        let mut current = slot;
        while current != self.entry_slot {
            current = *self.idom.get(&current)?;
            depth += 1;
        }
        Some(depth)
    }

    /// Check whether `a` dominates `b` (every node dominates itself).
    pub fn dominates_slots(&self, a: usize, b: usize) -> bool {
        if !self.idom.contains_key(&b) {
            return false;
        }
        let mut current = b;
        loop {
            if current == a {
                return true;
            }
            match self.idom.get(&current) {
                Some(&parent) if parent != current => current = parent,
                _ => return false,
            }
        }
    }

    pub(crate) fn entry_slot(&self) -> usize {
        self.entry_slot
    }

    pub(crate) fn is_reachable_slot(&self, slot: usize) -> bool {
        self.idom.contains_key(&slot)
    }

    /// Reachable slots in ascending order.
    pub(crate) fn reachable_slots(&self) -> Vec<usize> {
        let mut slots: Vec<usize> = self.idom.keys().copied().collect();
        slots.sort_unstable();
        slots
    }

    /// Count of strict descendants per reachable slot.
    ///
    /// Computed in one post-order traversal of the children lists, so
    /// the whole map costs O(V).
    pub(crate) fn dominated_counts(&self) -> HashMap<usize, usize> {
        let mut counts: HashMap<usize, usize> = HashMap::new();
        // Post-order via explicit stack: first visit pushes children,
        // second visit folds their counts.
        let mut stack: Vec<(usize, bool)> = vec![(self.entry_slot, false)];
        while let Some((node, processed)) = stack.pop() {
            if processed {
                let total: usize = self
                    .children
                    .get(&node)
                    .map(|kids| kids.iter().map(|k| counts[k] + 1).sum())
                    .unwrap_or(0);
                counts.insert(node, total);
            } else {
                stack.push((node, true));
                if let Some(kids) = self.children.get(&node) {
                    for &kid in kids {
                        stack.push((kid, false));
                    }
                }
            }
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::testutil::calls_graph;

    #[test]
    fn test_diamond_dominators() {
        // main -> {a, b} -> join
        let g = calls_graph(
            &["main", "a", "b", "join"],
            &[("main", "a"), ("main", "b"), ("a", "join"), ("b", "join")],
        );
        let token = CancelToken::new();
        let tree = DominatorTree::compute(&g, "main", &token).unwrap();

        assert_eq!(tree.node_count(), 4);
        assert_eq!(tree.immediate_dominator(&g, "main"), Some("main"));
        assert_eq!(tree.immediate_dominator(&g, "a"), Some("main"));
        assert_eq!(tree.immediate_dominator(&g, "b"), Some("main"));
        // Join is reached via two routes, so only main dominates it.
        assert_eq!(tree.immediate_dominator(&g, "join"), Some("main"));
    }

    #[test]
    fn test_chain_dominators_and_counts() {
        let g = calls_graph(&["main", "a", "b"], &[("main", "a"), ("a", "b")]);
        let tree = DominatorTree::compute(&g, "main", &CancelToken::new()).unwrap();

        assert_eq!(tree.immediate_dominator(&g, "b"), Some("a"));
        let counts = tree.dominated_counts();
        assert_eq!(counts[&g.slot("main").unwrap()], 2);
        assert_eq!(counts[&g.slot("a").unwrap()], 1);
        assert_eq!(counts[&g.slot("b").unwrap()], 0);
    }

    #[test]
    fn test_unreachable_nodes_absent() {
        let g = calls_graph(&["main", "a", "island"], &[("main", "a")]);
        let tree = DominatorTree::compute(&g, "main", &CancelToken::new()).unwrap();

        assert_eq!(tree.node_count(), 2);
        assert!(!tree.contains(&g, "island"));
        assert_eq!(tree.immediate_dominator(&g, "island"), None);
    }

    #[test]
    fn test_missing_entry_is_an_error() {
        let g = calls_graph(&["a"], &[]);
        let err = DominatorTree::compute(&g, "ghost", &CancelToken::new()).unwrap_err();
        assert_eq!(err, EngineError::NodeNotFound("ghost".to_string()));
    }

    #[test]
    fn test_isolated_entry_is_single_node_tree() {
        let g = calls_graph(&["main", "other"], &[]);
        let tree = DominatorTree::compute(&g, "main", &CancelToken::new()).unwrap();
        assert_eq!(tree.node_count(), 1);
        assert_eq!(tree.immediate_dominator(&g, "main"), Some("main"));
    }

    #[test]
    fn test_dominates_walk() {
        let g = calls_graph(&["main", "a", "b"], &[("main", "a"), ("a", "b")]);
        let tree = DominatorTree::compute(&g, "main", &CancelToken::new()).unwrap();
        let (m, a, b) = (
            g.slot("main").unwrap(),
            g.slot("a").unwrap(),
            g.slot("b").unwrap(),
        );
        assert!(tree.dominates_slots(m, b));
        assert!(tree.dominates_slots(a, b));
        assert!(tree.dominates_slots(b, b));
        assert!(!tree.dominates_slots(b, a));
    }

    #[test]
    fn test_children_and_depth() {
        let g = calls_graph(
            &["main", "a", "b", "c"],
            &[("main", "a"), ("main", "b"), ("a", "c")],
        );
        let tree = DominatorTree::compute(&g, "main", &CancelToken::new()).unwrap();

        assert_eq!(tree.children(&g, "main"), ["a", "b"]);
        assert_eq!(tree.children(&g, "a"), ["c"]);
        assert!(tree.children(&g, "c").is_empty());

        assert_eq!(tree.depth(&g, "main"), Some(0));
        assert_eq!(tree.depth(&g, "a"), Some(1));
        assert_eq!(tree.depth(&g, "c"), Some(2));
        assert_eq!(tree.depth(&g, "ghost"), None);
    }

    #[test]
    fn test_cancellation_short_circuits() {
        let g = calls_graph(&["main"], &[]);
        let token = CancelToken::new();
        token.cancel();
        assert_eq!(
            DominatorTree::compute(&g, "main", &token).unwrap_err(),
            EngineError::Cancelled
        );
    }
}
