//! Articulation points and bridges
//!
//! Iterative DFS low-link computation over the undirected view. An
//! articulation point is a vertex whose removal disconnects its
//! component; a bridge is an edge with the same property. The explicit
//! frame stack keeps deep graphs from overflowing the call stack.

use serde::Serialize;

use crate::cancel::CancelToken;
use crate::error::EngineError;
use crate::graph::{CodeGraph, UndirectedGraph};

const NO_PARENT: usize = usize::MAX;

/// Fragility classification thresholds over `|points| / |nodes|`.
fn fragility_label(score: f64) -> &'static str {
    if score < 0.05 {
        "MINIMAL"
    } else if score < 0.10 {
        "LOW"
    } else if score < 0.20 {
        "MODERATE"
    } else {
        "HIGH"
    }
}

/// Articulation analysis output.
#[derive(Debug, Clone, Serialize)]
pub struct ArticulationResult {
    /// Articulation point IDs, sorted.
    pub points: Vec<String>,
    /// Bridge endpoints as (smaller, larger) ID pairs, sorted.
    pub bridges: Vec<(String, String)>,
    /// `|points| / |nodes|`; 0.0 for an empty graph.
    pub fragility_score: f64,
    pub fragility_label: String,
}

/// Find all articulation points and bridges of the undirected view.
pub fn find_articulation_points(
    graph: &CodeGraph,
    undirected: &UndirectedGraph,
    token: &CancelToken,
) -> Result<ArticulationResult, EngineError> {
    token.check()?;
    let n = undirected.node_count();
    let mut disc = vec![0usize; n];
    let mut low = vec![0usize; n];
    let mut visited = vec![false; n];
    let mut is_point = vec![false; n];
    let mut bridge_slots: Vec<(usize, usize)> = Vec::new();
    let mut timer = 1usize;
    let mut work = 0usize;

    for root in 0..n {
        if visited[root] {
            continue;
        }
        token.check_at(root)?;

        // Frame: (node, parent, next neighbor offset).
        let mut stack: Vec<(usize, usize, usize)> = vec![(root, NO_PARENT, 0)];
        visited[root] = true;
        disc[root] = timer;
        low[root] = timer;
        timer += 1;
        let mut root_children = 0usize;

        while let Some(frame) = stack.last_mut() {
            let (v, parent) = (frame.0, frame.1);
            if frame.2 < undirected.neighbors(v).len() {
                let w = undirected.neighbors(v)[frame.2];
                frame.2 += 1;
                if w == parent {
                    continue;
                }
                if visited[w] {
                    low[v] = low[v].min(disc[w]);
                    continue;
                }
                work += 1;
                token.check_at(work)?;
                visited[w] = true;
                disc[w] = timer;
                low[w] = timer;
                timer += 1;
                if v == root {
                    root_children += 1;
                }
                stack.push((w, v, 0));
            } else {
                stack.pop();
                if let Some(parent_frame) = stack.last() {
                    let p = parent_frame.0;
                    low[p] = low[p].min(low[v]);
                    if low[v] > disc[p] {
                        bridge_slots.push((p, v));
                    }
                    if p != root && low[v] >= disc[p] {
                        is_point[p] = true;
                    }
                }
            }
        }

        if root_children >= 2 {
            is_point[root] = true;
        }
    }

    let mut points: Vec<String> = (0..n)
        .filter(|&slot| is_point[slot])
        .map(|slot| graph.symbol_at(slot).id.clone())
        .collect();
    points.sort_unstable();

    let mut bridges: Vec<(String, String)> = bridge_slots
        .into_iter()
        .map(|(a, b)| {
            let id_a = graph.symbol_at(a).id.clone();
            let id_b = graph.symbol_at(b).id.clone();
            if id_a <= id_b {
                (id_a, id_b)
            } else {
                (id_b, id_a)
            }
        })
        .collect();
    bridges.sort();

    let fragility_score = if n == 0 {
        0.0
    } else {
        points.len() as f64 / n as f64
    };

    Ok(ArticulationResult {
        points,
        bridges,
        fragility_score,
        fragility_label: fragility_label(fragility_score).to_string(),
    })
}
