//! PageRank over the call graph
//!
//! Power iteration with uniform teleport. Dangling nodes (no outgoing
//! call edges) distribute their mass uniformly over every node, so the
//! score vector sums to 1.0 at every iteration. Non-convergence within
//! the iteration budget is not an error: the last iterate is returned
//! with `converged = false` and a warning is logged.

use std::collections::HashMap;

use serde::Serialize;
use tracing::warn;

use crate::cancel::CancelToken;
use crate::error::EngineError;
use crate::graph::CodeGraph;

/// Tunables for the power iteration.
#[derive(Debug, Clone)]
pub struct PageRankParams {
    /// Damping factor `d`; teleport probability is `1 - d`.
    pub damping: f64,
    pub max_iterations: usize,
    /// Convergence tolerance on the max per-node delta.
    pub tolerance: f64,
}

impl Default for PageRankParams {
    fn default() -> Self {
        Self {
            damping: 0.85,
            max_iterations: 100,
            tolerance: 1e-6,
        }
    }
}

/// Direction mass flows along call edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RankDirection {
    /// Caller to callee: heavily-called symbols accumulate mass.
    Forward,
    /// Callee to caller: orchestrating roots accumulate mass.
    Reverse,
}

/// Result of a PageRank computation.
#[derive(Debug, Clone, Serialize)]
pub struct PageRankResult {
    pub scores: HashMap<String, f64>,
    pub iterations: usize,
    /// Final max per-node delta.
    pub max_diff: f64,
    pub converged: bool,
}

/// Compute PageRank over forward call edges.
pub fn compute_pagerank(
    graph: &CodeGraph,
    params: &PageRankParams,
    token: &CancelToken,
) -> Result<PageRankResult, EngineError> {
    let (scores, iterations, max_diff, converged) =
        compute_slots(graph, params, RankDirection::Forward, token)?;
    Ok(PageRankResult {
        scores: scores
            .into_iter()
            .enumerate()
            .map(|(slot, score)| (graph.symbol_at(slot).id.clone(), score))
            .collect(),
        iterations,
        max_diff,
        converged,
    })
}

/// Slot-indexed PageRank used internally by weighted criticality.
pub(crate) fn compute_slots(
    graph: &CodeGraph,
    params: &PageRankParams,
    direction: RankDirection,
    token: &CancelToken,
) -> Result<(Vec<f64>, usize, f64, bool), EngineError> {
    token.check()?;
    let n = graph.node_count();
    if n == 0 {
        return Ok((Vec::new(), 0, 0.0, true));
    }

    fn successors_of(graph: &CodeGraph, direction: RankDirection, slot: usize) -> &[usize] {
        match direction {
            RankDirection::Forward => graph.calls_successors(slot),
            RankDirection::Reverse => graph.calls_predecessors(slot),
        }
    }

    let uniform = 1.0 / n as f64;
    let mut ranks = vec![uniform; n];
    let mut next = vec![0.0; n];
    let mut iterations = 0usize;
    let mut max_diff = 0.0f64;

    for _ in 0..params.max_iterations {
        token.check()?;
        iterations += 1;

        let mut dangling_mass = 0.0;
        for slot in 0..n {
            if successors_of(graph, direction, slot).is_empty() {
                dangling_mass += ranks[slot];
            }
        }

        let base = (1.0 - params.damping) * uniform + params.damping * dangling_mass * uniform;
        next.iter_mut().for_each(|v| *v = base);

        for slot in 0..n {
            token.check_at(slot)?;
            let out = successors_of(graph, direction, slot);
            if out.is_empty() {
                continue;
            }
            let share = params.damping * ranks[slot] / out.len() as f64;
            for &target in out {
                next[target] += share;
            }
        }

        max_diff = ranks
            .iter()
            .zip(next.iter())
            .map(|(old, new)| (old - new).abs())
            .fold(0.0, f64::max);
        std::mem::swap(&mut ranks, &mut next);

        if max_diff < params.tolerance {
            return Ok((ranks, iterations, max_diff, true));
        }
    }

    warn!(
        iterations,
        max_diff, "pagerank did not converge within iteration budget"
    );
    Ok((ranks, iterations, max_diff, false))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::testutil::calls_graph;

    fn sum(scores: &HashMap<String, f64>) -> f64 {
        scores.values().sum()
    }

    #[test]
    fn test_scores_sum_to_one() {
        let g = calls_graph(
            &["main", "a", "b", "c"],
            &[("main", "a"), ("main", "b"), ("a", "c"), ("b", "c")],
        );
        let result = compute_pagerank(&g, &PageRankParams::default(), &CancelToken::new()).unwrap();
        assert!(result.converged);
        assert!((sum(&result.scores) - 1.0).abs() < 4.0 * 1e-6);
    }

    #[test]
    fn test_heavily_called_node_ranks_highest() {
        let g = calls_graph(
            &["main", "initServer", "LoadConfig", "parseConfig"],
            &[
                ("main", "parseConfig"),
                ("initServer", "parseConfig"),
                ("LoadConfig", "parseConfig"),
            ],
        );
        let result = compute_pagerank(&g, &PageRankParams::default(), &CancelToken::new()).unwrap();
        let top = result
            .scores
            .iter()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .unwrap();
        assert_eq!(top.0, "parseConfig");
    }

    #[test]
    fn test_empty_graph() {
        let g = calls_graph(&[], &[]);
        let result = compute_pagerank(&g, &PageRankParams::default(), &CancelToken::new()).unwrap();
        assert!(result.scores.is_empty());
        assert!(result.converged);
        assert_eq!(result.iterations, 0);
    }

    #[test]
    fn test_uniform_scores_on_edgeless_graph() {
        let g = calls_graph(&["a", "b", "c", "d"], &[]);
        let result = compute_pagerank(&g, &PageRankParams::default(), &CancelToken::new()).unwrap();
        for score in result.scores.values() {
            assert!((score - 0.25).abs() < 1e-9);
        }
    }

    #[test]
    fn test_non_convergence_returns_last_iterate() {
        let g = calls_graph(&["a", "b"], &[("a", "b"), ("b", "a")]);
        let params = PageRankParams {
            max_iterations: 1,
            tolerance: 0.0,
            ..PageRankParams::default()
        };
        let result = compute_pagerank(&g, &params, &CancelToken::new()).unwrap();
        assert!(!result.converged);
        assert_eq!(result.iterations, 1);
        assert!((sum(&result.scores) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_reverse_direction_favors_roots() {
        let g = calls_graph(
            &["main", "init", "a", "b"],
            &[("main", "init"), ("init", "a"), ("init", "b")],
        );
        let (scores, _, _, converged) = compute_slots(
            &g,
            &PageRankParams::default(),
            RankDirection::Reverse,
            &CancelToken::new(),
        )
        .unwrap();
        assert!(converged);
        let main_slot = g.slot("main").unwrap();
        let max = scores.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        assert!((scores[main_slot] - max).abs() < 1e-12);
    }

    #[test]
    fn test_cancellation() {
        let g = calls_graph(&["a"], &[]);
        let token = CancelToken::new();
        token.cancel();
        assert_eq!(
            compute_pagerank(&g, &PageRankParams::default(), &token).unwrap_err(),
            EngineError::Cancelled
        );
    }
}
