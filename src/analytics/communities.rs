//! Community detection (Leiden)
//!
//! Leiden refines Louvain: each level runs a local-moving phase that
//! greedily maximizes modularity, then a refinement phase that splits
//! communities into their connected parts, then aggregates communities
//! into supernodes and repeats. The refinement step is what guarantees
//! a disconnected community can never survive, so disconnected graph
//! components always end up in distinct communities.
//!
//! Determinism: nodes are visited in slot order, ties in the move gain
//! resolve to the lowest community id, and final community ids are
//! renumbered by (size desc, lowest member slot).

use std::collections::HashMap;

use serde::Serialize;

use crate::cancel::CancelToken;
use crate::error::EngineError;
use crate::graph::{CodeGraph, UndirectedGraph};

const MAX_LEVELS: usize = 10;
const MAX_PASSES_PER_LEVEL: usize = 50;
const GAIN_EPSILON: f64 = 1e-12;

/// Output of community detection.
#[derive(Debug, Clone, Serialize)]
pub struct CommunityResult {
    /// Symbol ID to community id.
    pub assignments: HashMap<String, usize>,
    /// Modularity of the final partition (resolution-weighted).
    pub modularity: f64,
    pub converged: bool,
    /// Total local-moving passes across all levels.
    pub iterations: usize,
    pub community_count: usize,
}

/// Weighted multigraph for one aggregation level.
struct LevelGraph {
    /// Per-node `(neighbor, weight)` lists, neighbor-sorted.
    adj: Vec<Vec<(usize, f64)>>,
    /// Internal (self-loop) weight per node from earlier aggregation.
    self_loops: Vec<f64>,
    /// Total edge weight `m` (self-loops included once).
    total_weight: f64,
}

impl LevelGraph {
    fn from_undirected(und: &UndirectedGraph) -> Self {
        let adj = (0..und.node_count())
            .map(|slot| {
                und.neighbors(slot)
                    .iter()
                    .map(|&n| (n, 1.0))
                    .collect::<Vec<_>>()
            })
            .collect();
        Self {
            adj,
            self_loops: vec![0.0; und.node_count()],
            total_weight: und.edge_count() as f64,
        }
    }

    fn node_count(&self) -> usize {
        self.adj.len()
    }

    /// Weighted degree including the self-loop twice.
    fn degree(&self, node: usize) -> f64 {
        let link_weight: f64 = self.adj[node].iter().map(|&(_, w)| w).sum();
        link_weight + 2.0 * self.self_loops[node]
    }
}

/// Detect communities over the undirected view.
///
/// `resolution` biases community granularity: above 1.0 favors many
/// small communities, below 1.0 favors few large ones.
pub fn detect_communities(
    graph: &CodeGraph,
    undirected: &UndirectedGraph,
    resolution: f64,
    token: &CancelToken,
) -> Result<CommunityResult, EngineError> {
    token.check()?;
    let n = undirected.node_count();
    if n == 0 {
        return Ok(CommunityResult {
            assignments: HashMap::new(),
            modularity: 0.0,
            converged: true,
            iterations: 0,
            community_count: 0,
        });
    }

    let mut level = LevelGraph::from_undirected(undirected);
    // membership[slot] = community id at the current level, mapped down
    // to level 0 after each aggregation.
    let mut membership: Vec<usize> = (0..n).collect();
    let mut iterations = 0usize;
    let mut converged = false;

    for _ in 0..MAX_LEVELS {
        token.check()?;
        let (mut communities, passes, improved) = local_moving(&level, resolution, token)?;
        iterations += passes;

        refine_into_connected(&level, &mut communities);
        let community_count = renumber(&mut communities);

        // Map the level assignment down to original nodes.
        for slot_comm in membership.iter_mut() {
            *slot_comm = communities[*slot_comm];
        }

        if !improved || community_count == level.node_count() {
            converged = true;
            break;
        }
        level = aggregate(&level, &communities, community_count);
    }

    let final_count = renumber_by_size(&mut membership);
    let modularity = modularity_of(undirected, &membership, resolution);

    Ok(CommunityResult {
        assignments: membership
            .iter()
            .enumerate()
            .map(|(slot, &comm)| (graph.symbol_at(slot).id.clone(), comm))
            .collect(),
        modularity,
        converged,
        iterations,
        community_count: final_count,
    })
}

/// Greedy local moving: repeatedly offer each node its best community
/// until a full pass makes no move.
///
/// Returns (assignment, passes, whether any move happened at all).
fn local_moving(
    level: &LevelGraph,
    resolution: f64,
    token: &CancelToken,
) -> Result<(Vec<usize>, usize, bool), EngineError> {
    let n = level.node_count();
    let two_m = 2.0 * level.total_weight.max(f64::MIN_POSITIVE);
    let degrees: Vec<f64> = (0..n).map(|v| level.degree(v)).collect();

    let mut comm: Vec<usize> = (0..n).collect();
    let mut comm_total: Vec<f64> = degrees.clone();
    let mut passes = 0usize;
    let mut improved_ever = false;

    for _ in 0..MAX_PASSES_PER_LEVEL {
        passes += 1;
        let mut moved = false;

        for node in 0..n {
            token.check_at(node)?;

            // Edge weight from this node into each adjacent community.
            let mut weight_to: HashMap<usize, f64> = HashMap::new();
            for &(neighbor, weight) in &level.adj[node] {
                if neighbor != node {
                    *weight_to.entry(comm[neighbor]).or_insert(0.0) += weight;
                }
            }

            let current = comm[node];
            comm_total[current] -= degrees[node];

            // Candidates: adjacent communities plus the current one.
            let mut candidates: Vec<usize> = weight_to.keys().copied().collect();
            if !candidates.contains(&current) {
                candidates.push(current);
            }
            candidates.sort_unstable();

            let gain = |c: usize| {
                let w = weight_to.get(&c).copied().unwrap_or(0.0);
                w - resolution * comm_total[c] * degrees[node] / two_m
            };

            let mut best = current;
            let mut best_gain = gain(current);
            for &candidate in &candidates {
                let candidate_gain = gain(candidate);
                if candidate_gain > best_gain + GAIN_EPSILON {
                    best = candidate;
                    best_gain = candidate_gain;
                }
            }

            comm_total[best] += degrees[node];
            if best != current {
                comm[node] = best;
                moved = true;
                improved_ever = true;
            }
        }

        if !moved {
            break;
        }
    }

    Ok((comm, passes, improved_ever))
}

/// Split every community into its connected parts.
///
/// A community whose induced subgraph is disconnected becomes one
/// community per part.
fn refine_into_connected(level: &LevelGraph, comm: &mut [usize]) {
    let n = level.node_count();
    let mut part: Vec<Option<usize>> = vec![None; n];
    let mut next_part = 0usize;

    for start in 0..n {
        if part[start].is_some() {
            continue;
        }
        let community = comm[start];
        part[start] = Some(next_part);
        let mut stack = vec![start];
        while let Some(node) = stack.pop() {
            for &(neighbor, _) in &level.adj[node] {
                if comm[neighbor] == community && part[neighbor].is_none() {
                    part[neighbor] = Some(next_part);
                    stack.push(neighbor);
                }
            }
        }
        next_part += 1;
    }

    for node in 0..n {
        comm[node] = part[node].expect("every node assigned to a part");
    }
}

/// Compact community ids to 0..count by first appearance.
fn renumber(comm: &mut [usize]) -> usize {
    let mut remap: HashMap<usize, usize> = HashMap::new();
    for value in comm.iter_mut() {
        let next = remap.len();
        let id = *remap.entry(*value).or_insert(next);
        *value = id;
    }
    remap.len()
}

/// Renumber by (size desc, lowest member slot asc) for stable output ids.
fn renumber_by_size(comm: &mut [usize]) -> usize {
    let mut size: HashMap<usize, usize> = HashMap::new();
    let mut lowest: HashMap<usize, usize> = HashMap::new();
    for (slot, &c) in comm.iter().enumerate() {
        *size.entry(c).or_insert(0) += 1;
        lowest.entry(c).or_insert(slot);
    }
    let mut order: Vec<usize> = size.keys().copied().collect();
    order.sort_by(|a, b| {
        size[b]
            .cmp(&size[a])
            .then_with(|| lowest[a].cmp(&lowest[b]))
    });
    let remap: HashMap<usize, usize> = order
        .into_iter()
        .enumerate()
        .map(|(new, old)| (old, new))
        .collect();
    for value in comm.iter_mut() {
        *value = remap[value];
    }
    remap.len()
}

/// Collapse communities into supernodes for the next level.
fn aggregate(level: &LevelGraph, comm: &[usize], community_count: usize) -> LevelGraph {
    let mut self_loops = vec![0.0; community_count];
    let mut cross: Vec<HashMap<usize, f64>> = vec![HashMap::new(); community_count];

    for node in 0..level.node_count() {
        let c = comm[node];
        self_loops[c] += level.self_loops[node];
        for &(neighbor, weight) in &level.adj[node] {
            let nc = comm[neighbor];
            if nc == c {
                // Each internal undirected edge is seen from both ends.
                self_loops[c] += weight / 2.0;
            } else {
                *cross[c].entry(nc).or_insert(0.0) += weight;
            }
        }
    }

    let mut total_weight: f64 = self_loops.iter().sum();
    let adj: Vec<Vec<(usize, f64)>> = cross
        .into_iter()
        .map(|map| {
            let mut list: Vec<(usize, f64)> = map.into_iter().collect();
            list.sort_by_key(|&(neighbor, _)| neighbor);
            list
        })
        .collect();
    // Cross edges are stored from both endpoints; count each once.
    total_weight += adj
        .iter()
        .flat_map(|list| list.iter().map(|&(_, w)| w))
        .sum::<f64>()
        / 2.0;

    LevelGraph {
        adj,
        self_loops,
        total_weight,
    }
}

/// Resolution-weighted modularity of a partition over the level-0 view.
fn modularity_of(und: &UndirectedGraph, comm: &[usize], resolution: f64) -> f64 {
    let m = und.edge_count() as f64;
    if m == 0.0 {
        return 0.0;
    }

    let mut internal: HashMap<usize, f64> = HashMap::new();
    let mut degree_sum: HashMap<usize, f64> = HashMap::new();

    for slot in 0..und.node_count() {
        *degree_sum.entry(comm[slot]).or_insert(0.0) += und.degree(slot) as f64;
        for &neighbor in und.neighbors(slot) {
            if comm[neighbor] == comm[slot] && slot < neighbor {
                *internal.entry(comm[slot]).or_insert(0.0) += 1.0;
            }
        }
    }

    degree_sum
        .iter()
        .map(|(c, &d)| {
            let e = internal.get(c).copied().unwrap_or(0.0);
            e / m - resolution * (d / (2.0 * m)).powi(2)
        })
        .sum()
}
