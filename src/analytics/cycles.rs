//! Cycle detection via strongly connected components
//!
//! Tarjan's algorithm over the calls projection. A component is
//! non-trivial when it has at least two members or a self `calls`
//! edge. Members are reported sorted, with the lexicographically
//! smallest ID as the representative.

use petgraph::algo::tarjan_scc;
use serde::Serialize;

use crate::cancel::CancelToken;
use crate::error::EngineError;
use crate::graph::CodeGraph;

/// One call cycle (non-trivial SCC).
#[derive(Debug, Clone, Serialize)]
pub struct Cycle {
    pub length: usize,
    /// Member IDs, sorted lexicographically.
    pub members: Vec<String>,
    /// First member in sort order.
    pub representative: String,
}

/// Enumerate call cycles with at least `min_size` members.
///
/// Results are ordered largest first, ties by representative.
pub fn find_cycles(
    graph: &CodeGraph,
    min_size: usize,
    token: &CancelToken,
) -> Result<Vec<Cycle>, EngineError> {
    token.check()?;
    let components = tarjan_scc(graph.calls_graph());
    token.check()?;

    let mut cycles = Vec::new();
    for (i, component) in components.into_iter().enumerate() {
        token.check_at(i)?;
        let is_self_loop = component.len() == 1 && {
            let slot = component[0].index();
            graph.calls_successors(slot).contains(&slot)
        };
        if component.len() < 2 && !is_self_loop {
            continue;
        }
        if component.len() < min_size {
            continue;
        }
        let mut members: Vec<String> = component
            .iter()
            .map(|n| graph.symbol_at(n.index()).id.clone())
            .collect();
        members.sort_unstable();
        let representative = members[0].clone();
        cycles.push(Cycle {
            length: members.len(),
            members,
            representative,
        });
    }

    cycles.sort_by(|a, b| {
        b.length
            .cmp(&a.length)
            .then_with(|| a.representative.cmp(&b.representative))
    });
    Ok(cycles)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::testutil::calls_graph;

    #[test]
    fn test_mutual_recursion_detected() {
        let g = calls_graph(
            &["main", "ping", "pong"],
            &[("main", "ping"), ("ping", "pong"), ("pong", "ping")],
        );
        let cycles = find_cycles(&g, 2, &CancelToken::new()).unwrap();
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].length, 2);
        assert_eq!(cycles[0].members, ["ping", "pong"]);
        assert_eq!(cycles[0].representative, "ping");
    }

    #[test]
    fn test_acyclic_graph_has_no_cycles() {
        let g = calls_graph(&["a", "b", "c"], &[("a", "b"), ("b", "c")]);
        assert!(find_cycles(&g, 2, &CancelToken::new()).unwrap().is_empty());
    }

    #[test]
    fn test_min_size_filter() {
        let g = calls_graph(
            &["a", "b", "x", "y", "z"],
            &[
                ("a", "b"),
                ("b", "a"),
                ("x", "y"),
                ("y", "z"),
                ("z", "x"),
            ],
        );
        let cycles = find_cycles(&g, 3, &CancelToken::new()).unwrap();
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].members, ["x", "y", "z"]);
    }

    #[test]
    fn test_larger_cycles_sort_first() {
        let g = calls_graph(
            &["a", "b", "x", "y", "z"],
            &[
                ("a", "b"),
                ("b", "a"),
                ("x", "y"),
                ("y", "z"),
                ("z", "x"),
            ],
        );
        let cycles = find_cycles(&g, 2, &CancelToken::new()).unwrap();
        assert_eq!(cycles[0].length, 3);
        assert_eq!(cycles[1].length, 2);
    }

    #[test]
    fn test_self_loop_is_size_one_cycle() {
        let g = calls_graph(&["rec"], &[("rec", "rec")]);
        // Visible only when the floor is lowered to 1.
        let cycles = find_cycles(&g, 1, &CancelToken::new()).unwrap();
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].length, 1);
        assert!(find_cycles(&g, 2, &CancelToken::new()).unwrap().is_empty());
    }
}
