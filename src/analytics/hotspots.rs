//! Hotspot ranking by caller count

use serde::Serialize;

use crate::cancel::CancelToken;
use crate::error::EngineError;
use crate::graph::{CodeGraph, EdgeKind};

/// A node ranked by its incoming `calls` degree.
#[derive(Debug, Clone, Serialize)]
pub struct Hotspot {
    pub id: String,
    pub name: String,
    pub package: String,
    pub caller_count: usize,
}

/// Rank nodes by in-degree over `calls` edges, ties broken by name then
/// ID, and return the top `top`.
pub fn find_hotspots(
    graph: &CodeGraph,
    top: usize,
    token: &CancelToken,
) -> Result<Vec<Hotspot>, EngineError> {
    token.check()?;
    let mut hotspots: Vec<Hotspot> = Vec::new();

    for (i, symbol) in graph.symbols().enumerate() {
        token.check_at(i)?;
        let caller_count = graph
            .in_edges(&symbol.id)
            .iter()
            .filter(|e| e.kind == EdgeKind::Calls)
            .count();
        if caller_count > 0 {
            hotspots.push(Hotspot {
                id: symbol.id.clone(),
                name: symbol.name.clone(),
                package: symbol.package.clone(),
                caller_count,
            });
        }
    }

    hotspots.sort_by(|a, b| {
        b.caller_count
            .cmp(&a.caller_count)
            .then_with(|| a.name.cmp(&b.name))
            .then_with(|| a.id.cmp(&b.id))
    });
    hotspots.truncate(top);
    Ok(hotspots)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::testutil::calls_graph;

    #[test]
    fn test_ranking_and_tie_break() {
        let g = calls_graph(
            &["a", "b", "hot", "warm", "tepid"],
            &[
                ("a", "hot"),
                ("b", "hot"),
                ("hot", "warm"),
                ("a", "warm"),
                ("b", "tepid"),
            ],
        );
        let hotspots = find_hotspots(&g, 10, &CancelToken::new()).unwrap();
        let ranked: Vec<(&str, usize)> = hotspots
            .iter()
            .map(|h| (h.name.as_str(), h.caller_count))
            .collect();
        assert_eq!(ranked, [("hot", 2), ("warm", 2), ("tepid", 1)]);
    }

    #[test]
    fn test_top_truncation() {
        let g = calls_graph(&["a", "b", "c"], &[("a", "b"), ("a", "c")]);
        let hotspots = find_hotspots(&g, 1, &CancelToken::new()).unwrap();
        assert_eq!(hotspots.len(), 1);
    }

    #[test]
    fn test_nodes_without_callers_omitted() {
        let g = calls_graph(&["a", "b"], &[("a", "b")]);
        let hotspots = find_hotspots(&g, 10, &CancelToken::new()).unwrap();
        assert_eq!(hotspots.len(), 1);
        assert_eq!(hotspots[0].id, "b");
    }
}
