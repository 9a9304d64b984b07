//! Weighted criticality
//!
//! Composite ranking that crosses dominator subtree size with PageRank.
//! A node scores high when it both gates a large part of the program
//! (many dominated descendants) and sits on heavily travelled call
//! routes. The PageRank factor runs over the reverse call graph so the
//! mass of everything a node transitively drives flows back to it;
//! orchestrating entry points therefore rank first instead of last.
//!
//! Quadrants at the 0.5 normalized threshold:
//! both high CRITICAL, dominator-only HIDDEN_GATEKEEPER, rank-only HUB,
//! both low LEAF.

use serde::Serialize;

use crate::cancel::CancelToken;
use crate::error::EngineError;
use crate::graph::CodeGraph;

use super::dominators::DominatorTree;
use super::pagerank::{compute_slots, PageRankParams, RankDirection};
use super::{detect_entry, min_max_normalize};

/// One ranked node.
#[derive(Debug, Clone, Serialize)]
pub struct CriticalNode {
    pub id: String,
    pub name: String,
    pub package: String,
    /// `norm_dominated * norm_pagerank`, in `[0, 1]`.
    pub criticality: f64,
    /// Strict descendants in the dominator tree.
    pub dominated_count: usize,
    /// Raw reverse-graph PageRank score.
    pub pagerank: f64,
    pub norm_dominated: f64,
    pub norm_pagerank: f64,
    pub quadrant: String,
    pub risk: String,
}

/// Ranked output of the weighted criticality analysis.
#[derive(Debug, Clone, Serialize)]
pub struct CriticalityResult {
    /// Entry the dominator tree was rooted at.
    pub entry: String,
    /// Nodes reachable from the entry (the ranked population).
    pub total_ranked: usize,
    /// Whether the PageRank phase converged.
    pub pagerank_converged: bool,
    /// Top nodes, criticality descending.
    pub nodes: Vec<CriticalNode>,
}

fn quadrant(norm_dom: f64, norm_pr: f64) -> &'static str {
    match (norm_dom >= 0.5, norm_pr >= 0.5) {
        (true, true) => "CRITICAL",
        (true, false) => "HIDDEN_GATEKEEPER",
        (false, true) => "HUB",
        (false, false) => "LEAF",
    }
}

fn risk(criticality: f64) -> &'static str {
    if criticality >= 0.7 {
        "high"
    } else if criticality >= 0.4 {
        "medium"
    } else if criticality >= 0.2 {
        "low"
    } else {
        "minimal"
    }
}

/// Rank the top `top` nodes by weighted criticality.
///
/// `entry` of `None` auto-detects among the standard entry candidates;
/// detection failure is an `UnreachableEntry` error, an explicit entry
/// that is absent is `NodeNotFound`.
pub fn weighted_criticality(
    graph: &CodeGraph,
    entry: Option<&str>,
    top: usize,
    token: &CancelToken,
) -> Result<CriticalityResult, EngineError> {
    token.check()?;

    let entry_id = match entry {
        Some(id) => {
            if graph.slot(id).is_none() {
                return Err(EngineError::NodeNotFound(id.to_string()));
            }
            id.to_string()
        }
        None => detect_entry(graph).ok_or_else(|| {
            EngineError::UnreachableEntry(
                "no entry point among main, Main, init, start, run".to_string(),
            )
        })?,
    };

    let dom = DominatorTree::compute(graph, &entry_id, token)?;
    token.check()?;
    let dominated = dom.dominated_counts();

    let (scores, _, _, pagerank_converged) = compute_slots(
        graph,
        &PageRankParams::default(),
        RankDirection::Reverse,
        token,
    )?;
    token.check()?;

    // Rank only the reachable population, in ascending slot order so the
    // normalization input is deterministic.
    let slots = dom.reachable_slots();
    let dom_vec: Vec<f64> = slots.iter().map(|s| dominated[s] as f64).collect();
    let pr_vec: Vec<f64> = slots.iter().map(|&s| scores[s]).collect();
    let norm_dom = min_max_normalize(&dom_vec);
    let norm_pr = min_max_normalize(&pr_vec);

    let mut nodes: Vec<CriticalNode> = slots
        .iter()
        .enumerate()
        .map(|(i, &slot)| {
            let symbol = graph.symbol_at(slot);
            let criticality = norm_dom[i] * norm_pr[i];
            CriticalNode {
                id: symbol.id.clone(),
                name: symbol.name.clone(),
                package: symbol.package.clone(),
                criticality,
                dominated_count: dominated[&slot],
                pagerank: pr_vec[i],
                norm_dominated: norm_dom[i],
                norm_pagerank: norm_pr[i],
                quadrant: quadrant(norm_dom[i], norm_pr[i]).to_string(),
                risk: risk(criticality).to_string(),
            }
        })
        .collect();

    nodes.sort_by(|a, b| {
        b.criticality
            .partial_cmp(&a.criticality)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.dominated_count.cmp(&a.dominated_count))
            .then_with(|| a.name.cmp(&b.name))
    });
    let total_ranked = nodes.len();
    nodes.truncate(top);

    Ok(CriticalityResult {
        entry: entry_id,
        total_ranked,
        pagerank_converged,
        nodes,
    })
}
