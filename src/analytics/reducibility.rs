//! Flow-graph reducibility analysis
//!
//! A graph is reducible when every retreating edge's target dominates
//! its source, which means every loop has a single entry point. The
//! analysis runs a DFS over the calls subgraph reachable from the
//! dominator-tree entry, classifies retreating (back) edges against
//! the dominator tree, and groups the offending targets into
//! irreducible regions by strongly connected component.
//!
//! With nothing reachable from the entry the result is vacuously
//! reducible: score 1.0, no regions.

use std::collections::HashMap;

use petgraph::algo::tarjan_scc;
use serde::Serialize;

use crate::cancel::CancelToken;
use crate::error::EngineError;
use crate::graph::CodeGraph;

use super::dominators::DominatorTree;

/// Hard cap on enumerated irreducible regions.
pub const MAX_REGIONS: usize = 100;

/// One irreducible region: a loop with multiple entry dominators.
#[derive(Debug, Clone, Serialize)]
pub struct Region {
    pub id: usize,
    /// Retreating-edge targets that fail the dominance test, sorted.
    pub entry_nodes: Vec<String>,
    /// Nodes in the region (the enclosing strongly connected component).
    pub size: usize,
    /// Offending retreating edges into this region.
    pub cross_edges: usize,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReducibilitySummary {
    pub irreducible_node_count: usize,
}

/// Output of the reducibility analysis.
#[derive(Debug, Clone, Serialize)]
pub struct ReducibilityResult {
    pub is_reducible: bool,
    /// `1 - irreducible_node_count / node_count`, in `[0, 1]`.
    pub score: f64,
    /// Nodes reachable from the entry.
    pub node_count: usize,
    /// Calls edges between reachable nodes.
    pub edge_count: usize,
    /// DFS cross edges (between disjoint subtrees).
    pub cross_edge_count: usize,
    pub irreducible_regions: Vec<Region>,
    pub summary: ReducibilitySummary,
}

#[derive(Clone, Copy, PartialEq)]
enum Color {
    White,
    Gray,
    Black,
}

/// Classify every retreating edge of the reachable calls subgraph
/// against `dom` and report irreducible regions.
pub fn analyze_reducibility(
    graph: &CodeGraph,
    dom: &DominatorTree,
    token: &CancelToken,
) -> Result<ReducibilityResult, EngineError> {
    token.check()?;
    let reachable = dom.reachable_slots();
    let node_count = reachable.len();
    if node_count == 0 {
        return Ok(vacuous());
    }

    let total = graph.node_count();
    let mut color = vec![Color::White; total];
    let mut disc = vec![0usize; total];
    let mut timer = 1usize;

    let mut edge_count = 0usize;
    let mut cross_edge_count = 0usize;
    // Offending retreating edges as (source, target) slots.
    let mut offending: Vec<(usize, usize)> = Vec::new();
    let mut work = 0usize;

    // Iterative DFS from the entry; successors in adjacency order.
    let entry = dom.entry_slot();
    let mut stack: Vec<(usize, usize)> = vec![(entry, 0)];
    color[entry] = Color::Gray;
    disc[entry] = timer;
    timer += 1;

    while let Some(frame) = stack.last_mut() {
        let u = frame.0;
        let successors = graph.calls_successors(u);
        if frame.1 < successors.len() {
            let v = successors[frame.1];
            frame.1 += 1;
            work += 1;
            token.check_at(work)?;
            edge_count += 1;
            match color[v] {
                Color::White => {
                    color[v] = Color::Gray;
                    disc[v] = timer;
                    timer += 1;
                    stack.push((v, 0));
                }
                Color::Gray => {
                    // Retreating edge: reducible iff target dominates source.
                    if !dom.dominates_slots(v, u) {
                        offending.push((u, v));
                    }
                }
                Color::Black => {
                    if disc[v] < disc[u] {
                        cross_edge_count += 1;
                    }
                }
            }
        } else {
            color[u] = Color::Black;
            stack.pop();
        }
    }

    let regions = build_regions(graph, &offending, token)?;
    let irreducible_node_count: usize = regions.iter().map(|r| r.size).sum();
    let enumerated: Vec<Region> = regions.into_iter().take(MAX_REGIONS).collect();

    let score = 1.0 - irreducible_node_count as f64 / node_count as f64;

    Ok(ReducibilityResult {
        is_reducible: enumerated.is_empty(),
        score,
        node_count,
        edge_count,
        cross_edge_count,
        irreducible_regions: enumerated,
        summary: ReducibilitySummary {
            irreducible_node_count,
        },
    })
}

fn vacuous() -> ReducibilityResult {
    ReducibilityResult {
        is_reducible: true,
        score: 1.0,
        node_count: 0,
        edge_count: 0,
        cross_edge_count: 0,
        irreducible_regions: Vec::new(),
        summary: ReducibilitySummary {
            irreducible_node_count: 0,
        },
    }
}

/// Group offending retreating-edge targets into regions by SCC.
///
/// A retreating edge closes a cycle, so its endpoints share a
/// non-trivial SCC; that component is the region. Regions are ordered
/// by their smallest entry node ID.
fn build_regions(
    graph: &CodeGraph,
    offending: &[(usize, usize)],
    token: &CancelToken,
) -> Result<Vec<Region>, EngineError> {
    if offending.is_empty() {
        return Ok(Vec::new());
    }
    token.check()?;

    let components = tarjan_scc(graph.calls_graph());
    let mut scc_of: HashMap<usize, usize> = HashMap::new();
    for (scc_id, component) in components.iter().enumerate() {
        for node in component {
            scc_of.insert(node.index(), scc_id);
        }
    }

    struct Draft {
        entries: Vec<usize>,
        edges: usize,
        size: usize,
    }
    let mut drafts: HashMap<usize, Draft> = HashMap::new();
    for &(_, target) in offending {
        let scc_id = scc_of[&target];
        let draft = drafts.entry(scc_id).or_insert_with(|| Draft {
            entries: Vec::new(),
            edges: 0,
            size: components[scc_id].len(),
        });
        if !draft.entries.contains(&target) {
            draft.entries.push(target);
        }
        draft.edges += 1;
    }

    let mut regions: Vec<Region> = drafts
        .into_values()
        .map(|draft| {
            let mut entry_nodes: Vec<String> = draft
                .entries
                .iter()
                .map(|&slot| graph.symbol_at(slot).id.clone())
                .collect();
            entry_nodes.sort_unstable();
            Region {
                id: 0,
                reason: format!(
                    "loop entered at {} node(s) without a dominating header",
                    entry_nodes.len()
                ),
                entry_nodes,
                size: draft.size,
                cross_edges: draft.edges,
            }
        })
        .collect();

    regions.sort_by(|a, b| a.entry_nodes[0].cmp(&b.entry_nodes[0]));
    for (id, region) in regions.iter_mut().enumerate() {
        region.id = id;
    }
    Ok(regions)
}

/// Quality label for a reducibility score.
pub fn quality_label(score: f64) -> &'static str {
    if score >= 0.99 {
        "Excellent"
    } else if score >= 0.95 {
        "Very Good"
    } else if score >= 0.90 {
        "Good"
    } else if score >= 0.80 {
        "Acceptable"
    } else if score >= 0.70 {
        "Fair"
    } else if score >= 0.50 {
        "Poor"
    } else {
        "Critical"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::testutil::calls_graph;

    fn analyze(nodes: &[&str], edges: &[(&str, &str)], entry: &str) -> ReducibilityResult {
        let g = calls_graph(nodes, edges);
        let token = CancelToken::new();
        let dom = DominatorTree::compute(&g, entry, &token).unwrap();
        analyze_reducibility(&g, &dom, &token).unwrap()
    }

    #[test]
    fn test_natural_loop_is_reducible() {
        let result = analyze(
            &["entry", "header", "body"],
            &[("entry", "header"), ("header", "body"), ("body", "header")],
            "entry",
        );
        assert!(result.is_reducible);
        assert_eq!(result.score, 1.0);
        assert!(result.irreducible_regions.is_empty());
        assert_eq!(result.node_count, 3);
        assert_eq!(result.edge_count, 3);
    }

    #[test]
    fn test_two_entry_loop_is_irreducible() {
        // entry reaches both a and b; the a<->b loop has two entries.
        let result = analyze(
            &["entry", "a", "b"],
            &[("entry", "a"), ("entry", "b"), ("a", "b"), ("b", "a")],
            "entry",
        );
        assert!(!result.is_reducible);
        assert_eq!(result.irreducible_regions.len(), 1);
        let region = &result.irreducible_regions[0];
        assert_eq!(region.size, 2);
        assert_eq!(region.entry_nodes, ["a"]);
        assert_eq!(result.summary.irreducible_node_count, 2);
        assert!((result.score - (1.0 - 2.0 / 3.0)).abs() < 1e-9);
    }

    #[test]
    fn test_acyclic_graph_is_reducible() {
        let result = analyze(
            &["main", "a", "b", "c"],
            &[("main", "a"), ("main", "b"), ("a", "c"), ("b", "c")],
            "main",
        );
        assert!(result.is_reducible);
        assert_eq!(result.score, 1.0);
        // a->c and b->c: one arrives second and is a cross edge.
        assert_eq!(result.cross_edge_count, 1);
    }

    #[test]
    fn test_isolated_entry_is_vacuously_reducible() {
        let result = analyze(&["main", "other"], &[], "main");
        assert!(result.is_reducible);
        assert_eq!(result.score, 1.0);
        assert_eq!(result.node_count, 1);
    }

    #[test]
    fn test_self_loop_is_reducible() {
        let result = analyze(&["main", "rec"], &[("main", "rec"), ("rec", "rec")], "main");
        assert!(result.is_reducible);
    }

    #[test]
    fn test_quality_labels() {
        assert_eq!(quality_label(1.0), "Excellent");
        assert_eq!(quality_label(0.97), "Very Good");
        assert_eq!(quality_label(0.93), "Good");
        assert_eq!(quality_label(0.85), "Acceptable");
        assert_eq!(quality_label(0.75), "Fair");
        assert_eq!(quality_label(0.6), "Poor");
        assert_eq!(quality_label(0.2), "Critical");
    }
}
