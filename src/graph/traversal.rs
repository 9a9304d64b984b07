//! Bounded traversal over the frozen call graph
//!
//! Breadth-first expansion over `calls` edges with a depth bound and an
//! optional node cap, plus shortest-path search with a deterministic
//! lexicographic tie-break. Queries over unknown IDs return an empty
//! result with `found = false`, never an error.

use std::collections::VecDeque;

use serde::Serialize;
use tracing::debug;

use super::{CodeGraph, Edge, EdgeKind};

/// Hard ceiling for BFS depth. Requested depths clamp into `[1, 10]`.
pub const MAX_TRAVERSAL_DEPTH: usize = 10;

/// Options for bounded BFS.
#[derive(Debug, Clone)]
pub struct TraversalOptions {
    /// Maximum frontier depth, clamped to `[1, MAX_TRAVERSAL_DEPTH]`.
    pub max_depth: usize,
    /// Optional cap on the number of visited nodes.
    pub max_nodes: Option<usize>,
}

impl Default for TraversalOptions {
    fn default() -> Self {
        Self {
            max_depth: 5,
            max_nodes: None,
        }
    }
}

/// Result of a bounded BFS.
#[derive(Debug, Clone, Serialize)]
pub struct TraversalResult {
    /// Whether the start node exists in the graph.
    pub found: bool,
    /// Visited node IDs in BFS discovery order (start first).
    pub visited_nodes: Vec<String>,
    /// Calls edges traversed between visited nodes.
    pub edges: Vec<Edge>,
    /// Deepest frontier actually reached.
    pub depth_reached: usize,
    /// True when the depth bound or node cap cut the expansion short.
    pub truncated: bool,
}

impl TraversalResult {
    fn missing() -> Self {
        Self {
            found: false,
            visited_nodes: Vec::new(),
            edges: Vec::new(),
            depth_reached: 0,
            truncated: false,
        }
    }

    pub fn node_count(&self) -> usize {
        self.visited_nodes.len()
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Direction {
    Forward,
    Reverse,
}

/// Forward BFS over `calls` edges from `start`.
pub fn call_graph_from(graph: &CodeGraph, start: &str, options: &TraversalOptions) -> TraversalResult {
    bounded_bfs(graph, start, options, Direction::Forward)
}

/// BFS over reverse `calls` adjacency from `start` (callers, transitively).
pub fn reverse_call_graph_from(
    graph: &CodeGraph,
    start: &str,
    options: &TraversalOptions,
) -> TraversalResult {
    bounded_bfs(graph, start, options, Direction::Reverse)
}

fn bounded_bfs(
    graph: &CodeGraph,
    start: &str,
    options: &TraversalOptions,
    direction: Direction,
) -> TraversalResult {
    let start_slot = match graph.slot(start) {
        Some(slot) => slot,
        None => return TraversalResult::missing(),
    };

    let max_depth = options.max_depth.clamp(1, MAX_TRAVERSAL_DEPTH);
    if max_depth != options.max_depth {
        debug!(requested = options.max_depth, clamped = max_depth, "traversal depth clamped");
    }

    let mut visited = vec![false; graph.node_count()];
    let mut order: Vec<usize> = Vec::new();
    let mut edges: Vec<Edge> = Vec::new();
    let mut depth_reached = 0usize;
    let mut truncated = false;

    let mut queue: VecDeque<(usize, usize)> = VecDeque::new();
    visited[start_slot] = true;
    order.push(start_slot);
    queue.push_back((start_slot, 0));

    while let Some((slot, depth)) = queue.pop_front() {
        depth_reached = depth_reached.max(depth);
        if depth == max_depth {
            // Frontier beyond this node would exceed the bound.
            if !successors(graph, slot, direction).is_empty() {
                truncated = true;
            }
            continue;
        }
        for &next in successors(graph, slot, direction) {
            if visited[next] {
                edges.push(edge_between(graph, slot, next, direction));
                continue;
            }
            if let Some(cap) = options.max_nodes {
                if order.len() >= cap {
                    truncated = true;
                    continue;
                }
            }
            visited[next] = true;
            order.push(next);
            edges.push(edge_between(graph, slot, next, direction));
            queue.push_back((next, depth + 1));
        }
    }

    TraversalResult {
        found: true,
        visited_nodes: order
            .into_iter()
            .map(|slot| graph.symbol_at(slot).id.clone())
            .collect(),
        edges,
        depth_reached,
        truncated,
    }
}

fn successors(graph: &CodeGraph, slot: usize, direction: Direction) -> &[usize] {
    match direction {
        Direction::Forward => graph.calls_successors(slot),
        Direction::Reverse => graph.calls_predecessors(slot),
    }
}

/// Recover the stored `calls` edge for a traversed hop.
fn edge_between(graph: &CodeGraph, slot: usize, next: usize, direction: Direction) -> Edge {
    let (from_slot, to_slot) = match direction {
        Direction::Forward => (slot, next),
        Direction::Reverse => (next, slot),
    };
    let to_id = &graph.symbol_at(to_slot).id;
    graph
        .out_edges_at(from_slot)
        .iter()
        .find(|e| e.kind == EdgeKind::Calls && &e.to == to_id)
        .cloned()
        .expect("calls adjacency entry must have a stored edge")
}

/// Result of a shortest-path query.
#[derive(Debug, Clone, Serialize)]
pub struct PathResult {
    pub found: bool,
    /// Path length in edges (0 when `from == to`).
    pub length: usize,
    /// Node IDs from source to target inclusive; empty when not found.
    pub path: Vec<String>,
}

impl PathResult {
    fn not_found() -> Self {
        Self {
            found: false,
            length: 0,
            path: Vec::new(),
        }
    }
}

/// Shortest path by edge count over `calls` edges.
///
/// Ties between equal-length paths are broken by expanding successors in
/// lexicographic ID order, so the returned path is deterministic.
pub fn find_path(graph: &CodeGraph, from: &str, to: &str) -> PathResult {
    let (from_slot, to_slot) = match (graph.slot(from), graph.slot(to)) {
        (Some(f), Some(t)) => (f, t),
        _ => return PathResult::not_found(),
    };

    if from_slot == to_slot {
        return PathResult {
            found: true,
            length: 0,
            path: vec![from.to_string()],
        };
    }

    let mut parent: Vec<Option<usize>> = vec![None; graph.node_count()];
    let mut visited = vec![false; graph.node_count()];
    visited[from_slot] = true;
    let mut queue = VecDeque::new();
    queue.push_back(from_slot);

    'search: while let Some(slot) = queue.pop_front() {
        let mut nexts: Vec<usize> = graph.calls_successors(slot).to_vec();
        nexts.sort_by(|&a, &b| graph.symbol_at(a).id.cmp(&graph.symbol_at(b).id));
        for next in nexts {
            if visited[next] {
                continue;
            }
            visited[next] = true;
            parent[next] = Some(slot);
            if next == to_slot {
                break 'search;
            }
            queue.push_back(next);
        }
    }

    if !visited[to_slot] {
        return PathResult::not_found();
    }

    let mut path_slots = vec![to_slot];
    let mut cursor = to_slot;
    while let Some(prev) = parent[cursor] {
        path_slots.push(prev);
        cursor = prev;
    }
    path_slots.reverse();

    PathResult {
        found: true,
        length: path_slots.len() - 1,
        path: path_slots
            .into_iter()
            .map(|slot| graph.symbol_at(slot).id.clone())
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::testutil::calls_graph;

    #[test]
    fn test_bfs_visits_in_order_and_once() {
        let g = calls_graph(
            &["main", "init", "a", "b"],
            &[("main", "init"), ("init", "a"), ("init", "b"), ("a", "b")],
        );
        let result = call_graph_from(&g, "main", &TraversalOptions::default());
        assert!(result.found);
        assert_eq!(result.visited_nodes, ["main", "init", "a", "b"]);
        assert_eq!(result.depth_reached, 2);
        assert!(!result.truncated);
        // Four traversed edges: the a->b edge is recorded even though b
        // was already discovered via init.
        assert_eq!(result.edges.len(), 4);
    }

    #[test]
    fn test_bfs_depth_bound_truncates() {
        let g = calls_graph(&["a", "b", "c", "d"], &[("a", "b"), ("b", "c"), ("c", "d")]);
        let options = TraversalOptions {
            max_depth: 2,
            max_nodes: None,
        };
        let result = call_graph_from(&g, "a", &options);
        assert_eq!(result.visited_nodes, ["a", "b", "c"]);
        assert_eq!(result.depth_reached, 2);
        assert!(result.truncated);
    }

    #[test]
    fn test_bfs_node_cap_truncates() {
        let g = calls_graph(&["a", "b", "c"], &[("a", "b"), ("a", "c")]);
        let options = TraversalOptions {
            max_depth: 5,
            max_nodes: Some(2),
        };
        let result = call_graph_from(&g, "a", &options);
        assert_eq!(result.node_count(), 2);
        assert!(result.truncated);
    }

    #[test]
    fn test_bfs_unknown_start() {
        let g = calls_graph(&["a"], &[]);
        let result = call_graph_from(&g, "ghost", &TraversalOptions::default());
        assert!(!result.found);
        assert!(result.visited_nodes.is_empty());
    }

    #[test]
    fn test_reverse_bfs_collects_callers() {
        let g = calls_graph(
            &["main", "initServer", "LoadConfig", "parseConfig"],
            &[
                ("main", "parseConfig"),
                ("initServer", "parseConfig"),
                ("LoadConfig", "parseConfig"),
            ],
        );
        let result = reverse_call_graph_from(&g, "parseConfig", &TraversalOptions::default());
        assert_eq!(result.node_count(), 4);
        assert_eq!(result.visited_nodes[0], "parseConfig");
    }

    #[test]
    fn test_find_path_shortest_with_tie_break() {
        // Two length-2 routes a->b->d and a->c->d; lexicographic pick is b.
        let g = calls_graph(
            &["a", "b", "c", "d"],
            &[("a", "c"), ("a", "b"), ("b", "d"), ("c", "d")],
        );
        let result = find_path(&g, "a", "d");
        assert!(result.found);
        assert_eq!(result.length, 2);
        assert_eq!(result.path, ["a", "b", "d"]);
    }

    #[test]
    fn test_find_path_absent_or_disconnected() {
        let g = calls_graph(&["a", "b"], &[]);
        assert!(!find_path(&g, "a", "b").found);
        assert!(!find_path(&g, "a", "ghost").found);
    }

    #[test]
    fn test_find_path_self() {
        let g = calls_graph(&["a"], &[]);
        let result = find_path(&g, "a", "a");
        assert!(result.found);
        assert_eq!(result.length, 0);
        assert_eq!(result.path, ["a"]);
    }
}
