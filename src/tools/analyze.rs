//! Analysis tools: structural metrics over the frozen graph
//!
//! Each tool validates and clamps its parameters, runs one kernel
//! entry point, and shapes both a structured output and a stable
//! line-oriented text rendering. Cancellation escapes as a hard error;
//! kernel failures fold into the envelope with the failure mode
//! recorded in the trace step.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde_json::{json, Map, Value};

use crate::analytics::{
    analyze_reducibility, compute_pagerank, detect_communities, detect_entry, find_articulation_points,
    find_cycles, find_dead_code, find_hotspots, weighted_criticality, DominatorTree, PageRankParams,
};
use crate::analytics::reducibility::quality_label;
use crate::error::EngineError;
use crate::session::{AnalysisSession, Snapshot};

use super::{
    bool_param, float_param, int_param, optional_string, ExecutionContext, Invocation, ParamDef,
    Tool, ToolCategory, ToolDefinition, ToolRegistry, ToolResult,
};

/// Register the analysis tool set.
pub fn register_analyze_tools(registry: &mut ToolRegistry, session: Arc<AnalysisSession>) {
    registry.register(Box::new(FindHotspotsTool {
        session: Arc::clone(&session),
    }));
    registry.register(Box::new(FindDeadCodeTool {
        session: Arc::clone(&session),
    }));
    registry.register(Box::new(FindCyclesTool {
        session: Arc::clone(&session),
    }));
    registry.register(Box::new(FindImportantTool {
        session: Arc::clone(&session),
    }));
    registry.register(Box::new(FindCommunitiesTool {
        session: Arc::clone(&session),
    }));
    registry.register(Box::new(FindArticulationPointsTool {
        session: Arc::clone(&session),
    }));
    registry.register(Box::new(CheckReducibilityTool {
        session: Arc::clone(&session),
    }));
    registry.register(Box::new(FindWeightedCriticalityTool { session }));
}

const NOT_READY_MESSAGE: &str = "graph not ready; retry once indexing has finished";

macro_rules! ready_or_fail {
    ($self:ident, $inv:ident, $ctx:ident) => {
        match $self.session.wait_ready() {
            Ok(snapshot) => snapshot,
            Err(_) => return Ok($inv.fail($ctx, "graph_not_ready", NOT_READY_MESSAGE.to_string())),
        }
    };
}

macro_rules! kernel_or_fail {
    ($expr:expr, $inv:ident, $ctx:ident) => {
        match $expr {
            Ok(value) => value,
            Err(EngineError::Cancelled) => return Err(EngineError::Cancelled),
            Err(err) => return Ok($inv.fail($ctx, "kernel", err.to_string())),
        }
    };
}

// ---------------------------------------------------------------------------
// find_hotspots
// ---------------------------------------------------------------------------

struct FindHotspotsTool {
    session: Arc<AnalysisSession>,
}

impl Tool for FindHotspotsTool {
    fn name(&self) -> &'static str {
        "find_hotspots"
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::Analysis
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: "Functions with the most callers".to_string(),
            parameters: BTreeMap::from([(
                "top".to_string(),
                ParamDef::int("How many hotspots to return", 10),
            )]),
            priority: 3,
            requires: vec!["graph".to_string()],
            side_effects: false,
            timeout_secs: 15,
            when_to_use: "To find high-traffic functions worth extra review".to_string(),
        }
    }

    fn execute(
        &self,
        ctx: &ExecutionContext,
        params: &Map<String, Value>,
    ) -> Result<ToolResult, EngineError> {
        ctx.token.check()?;
        let mut inv = Invocation::new("analytics_hotspots", "FindHotspots").target("whole_graph");
        let top = int_param(params, "top", 10, 1, 100) as usize;
        let snapshot = ready_or_fail!(self, inv, ctx);

        let hotspots = kernel_or_fail!(find_hotspots(&snapshot.graph, top, &ctx.token), inv, ctx);
        inv.meta("top", top);
        inv.meta("returned", hotspots.len());

        let mut text = format!("top {} hotspot(s) by caller count\n", hotspots.len());
        for h in &hotspots {
            text.push_str(&format!("  {} ({}) - {} caller(s)\n", h.name, h.package, h.caller_count));
        }
        let output = json!({
            "hotspots": serde_json::to_value(&hotspots).unwrap_or(Value::Null),
        });
        Ok(inv.succeed(ctx, output, text))
    }
}

// ---------------------------------------------------------------------------
// find_dead_code
// ---------------------------------------------------------------------------

struct FindDeadCodeTool {
    session: Arc<AnalysisSession>,
}

impl Tool for FindDeadCodeTool {
    fn name(&self) -> &'static str {
        "find_dead_code"
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::Analysis
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: "Symbols with no callers or references".to_string(),
            parameters: BTreeMap::from([
                (
                    "include_exported".to_string(),
                    ParamDef::bool("Also report exported symbols", false),
                ),
                (
                    "package".to_string(),
                    ParamDef::optional_string("Restrict findings to one package"),
                ),
                (
                    "limit".to_string(),
                    ParamDef::int("Maximum findings returned", 50),
                ),
            ]),
            priority: 4,
            requires: vec!["graph".to_string()],
            side_effects: false,
            timeout_secs: 30,
            when_to_use: "Before a cleanup pass; verify findings against dynamic dispatch".to_string(),
        }
    }

    fn execute(
        &self,
        ctx: &ExecutionContext,
        params: &Map<String, Value>,
    ) -> Result<ToolResult, EngineError> {
        ctx.token.check()?;
        let mut inv = Invocation::new("analytics_dead_code", "DetectDeadCode").target("whole_graph");
        let include_exported = bool_param(params, "include_exported", false);
        let package = optional_string(params, "package");
        let limit = int_param(params, "limit", 50, 1, 500) as usize;
        let snapshot = ready_or_fail!(self, inv, ctx);

        let all = kernel_or_fail!(find_dead_code(&snapshot.graph, &ctx.token), inv, ctx);
        let total_found = all.len();
        let findings: Vec<_> = all
            .into_iter()
            .filter(|d| include_exported || !d.exported)
            .filter(|d| package.as_deref().map_or(true, |p| d.package == p))
            .take(limit)
            .collect();

        inv.meta("total_found", total_found);
        inv.meta("returned", findings.len());
        if let Some(ref p) = package {
            inv.meta("package", p);
        }

        let mut text = format!("{} dead code finding(s)\n", findings.len());
        for d in &findings {
            text.push_str(&format!(
                "  {} [{}] {} - {}\n",
                d.name, d.kind, d.file_path, d.reason
            ));
        }
        let output = json!({
            "dead_code": serde_json::to_value(&findings).unwrap_or(Value::Null),
            "total_found": total_found,
        });
        Ok(inv.succeed(ctx, output, text))
    }
}

// ---------------------------------------------------------------------------
// find_cycles
// ---------------------------------------------------------------------------

struct FindCyclesTool {
    session: Arc<AnalysisSession>,
}

impl Tool for FindCyclesTool {
    fn name(&self) -> &'static str {
        "find_cycles"
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::Analysis
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: "Call cycles (mutual recursion) via SCC decomposition".to_string(),
            parameters: BTreeMap::from([(
                "min_size".to_string(),
                ParamDef::int("Smallest cycle length to report", 2),
            )]),
            priority: 4,
            requires: vec!["graph".to_string()],
            side_effects: false,
            timeout_secs: 30,
            when_to_use: "To untangle mutual recursion or layering violations".to_string(),
        }
    }

    fn execute(
        &self,
        ctx: &ExecutionContext,
        params: &Map<String, Value>,
    ) -> Result<ToolResult, EngineError> {
        ctx.token.check()?;
        let mut inv = Invocation::new("analytics_cycles", "DetectCycles").target("whole_graph");
        let min_size = int_param(params, "min_size", 2, 2, i64::MAX) as usize;
        let snapshot = ready_or_fail!(self, inv, ctx);

        let cycles = kernel_or_fail!(find_cycles(&snapshot.graph, min_size, &ctx.token), inv, ctx);
        inv.meta("min_size", min_size);
        inv.meta("cycles", cycles.len());

        let mut text = format!("{} cycle(s) of size >= {}\n", cycles.len(), min_size);
        for c in &cycles {
            text.push_str(&format!("  [{}] {}\n", c.length, c.members.join(" -> ")));
        }
        let output = json!({
            "cycles": serde_json::to_value(&cycles).unwrap_or(Value::Null),
        });
        Ok(inv.succeed(ctx, output, text))
    }
}

// ---------------------------------------------------------------------------
// find_important
// ---------------------------------------------------------------------------

struct FindImportantTool {
    session: Arc<AnalysisSession>,
}

impl Tool for FindImportantTool {
    fn name(&self) -> &'static str {
        "find_important"
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::Analysis
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: "Globally important functions by PageRank".to_string(),
            parameters: BTreeMap::from([(
                "top".to_string(),
                ParamDef::int("How many nodes to return", 10),
            )]),
            priority: 3,
            requires: vec!["graph".to_string()],
            side_effects: false,
            timeout_secs: 30,
            when_to_use: "To rank symbols by structural importance, beyond raw caller counts"
                .to_string(),
        }
    }

    fn execute(
        &self,
        ctx: &ExecutionContext,
        params: &Map<String, Value>,
    ) -> Result<ToolResult, EngineError> {
        ctx.token.check()?;
        let mut inv = Invocation::new("analytics_pagerank", "ComputePageRank").target("whole_graph");
        let top = int_param(params, "top", 10, 1, 100) as usize;
        let snapshot = ready_or_fail!(self, inv, ctx);

        let result = kernel_or_fail!(
            compute_pagerank(&snapshot.graph, &PageRankParams::default(), &ctx.token),
            inv,
            ctx
        );

        let mut ranked: Vec<(&String, &f64)> = result.scores.iter().collect();
        ranked.sort_by(|a, b| {
            b.1.partial_cmp(a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(b.0))
        });
        ranked.truncate(top);

        inv.meta("iterations", result.iterations);
        inv.meta("converged", result.converged);
        inv.meta("returned", ranked.len());

        let mut text = format!(
            "top {} node(s) by pagerank ({} iterations{})\n",
            ranked.len(),
            result.iterations,
            if result.converged { "" } else { ", not converged" }
        );
        let nodes: Vec<Value> = ranked
            .iter()
            .map(|(id, score)| {
                let label = snapshot
                    .graph
                    .node(id)
                    .map(|s| s.name.clone())
                    .unwrap_or_else(|| (*id).clone());
                text.push_str(&format!("  {} {:.6}\n", label, score));
                json!({ "id": id, "name": label, "score": score })
            })
            .collect();

        let output = json!({
            "nodes": nodes,
            "iterations": result.iterations,
            "max_diff": result.max_diff,
            "converged": result.converged,
        });
        Ok(inv.succeed(ctx, output, text))
    }
}

// ---------------------------------------------------------------------------
// find_communities
// ---------------------------------------------------------------------------

struct FindCommunitiesTool {
    session: Arc<AnalysisSession>,
}

fn modularity_quality(q: f64) -> &'static str {
    if q < 0.3 {
        "weak"
    } else if q < 0.5 {
        "moderate"
    } else if q < 0.7 {
        "good"
    } else {
        "strong"
    }
}

/// Per-community aggregates derived from an assignment.
struct CommunityDetail {
    members: Vec<usize>,
    internal_edges: usize,
    external_edges: usize,
}

fn community_details(
    snapshot: &Snapshot,
    assignments: &HashMap<String, usize>,
    community_count: usize,
) -> (Vec<CommunityDetail>, HashMap<(usize, usize), usize>) {
    let graph = &snapshot.graph;
    let und = &snapshot.undirected;

    let mut details: Vec<CommunityDetail> = (0..community_count)
        .map(|_| CommunityDetail {
            members: Vec::new(),
            internal_edges: 0,
            external_edges: 0,
        })
        .collect();
    let comm_of: Vec<usize> = (0..graph.node_count())
        .map(|slot| assignments[&graph.symbol_at(slot).id])
        .collect();

    for (slot, &comm) in comm_of.iter().enumerate() {
        details[comm].members.push(slot);
    }

    let mut cross: HashMap<(usize, usize), usize> = HashMap::new();
    for slot in 0..und.node_count() {
        for &neighbor in und.neighbors(slot) {
            if neighbor <= slot {
                continue;
            }
            let (a, b) = (comm_of[slot], comm_of[neighbor]);
            if a == b {
                details[a].internal_edges += 1;
            } else {
                details[a].external_edges += 1;
                details[b].external_edges += 1;
                *cross.entry((a.min(b), a.max(b))).or_insert(0) += 1;
            }
        }
    }

    (details, cross)
}

impl Tool for FindCommunitiesTool {
    fn name(&self) -> &'static str {
        "find_communities"
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::Analysis
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: "Leiden community detection over the symbol graph".to_string(),
            parameters: BTreeMap::from([
                (
                    "min_size".to_string(),
                    ParamDef::int("Smallest community to report", 2),
                ),
                (
                    "resolution".to_string(),
                    ParamDef::float("Granularity; higher yields smaller communities", 1.0),
                ),
                (
                    "top".to_string(),
                    ParamDef::int("How many communities to return", 10),
                ),
                (
                    "show_cross_edges".to_string(),
                    ParamDef::bool("Also report edges between communities", false),
                ),
            ]),
            priority: 5,
            requires: vec!["graph".to_string()],
            side_effects: false,
            timeout_secs: 30,
            when_to_use: "To discover module boundaries the package layout hides".to_string(),
        }
    }

    fn execute(
        &self,
        ctx: &ExecutionContext,
        params: &Map<String, Value>,
    ) -> Result<ToolResult, EngineError> {
        ctx.token.check()?;
        let mut inv = Invocation::new("analytics_communities", "DetectCommunities").target("whole_graph");
        let min_size = int_param(params, "min_size", 2, 1, 100) as usize;
        let resolution = float_param(params, "resolution", 1.0, 0.1, 5.0);
        let top = int_param(params, "top", 10, 1, 50) as usize;
        let show_cross_edges = bool_param(params, "show_cross_edges", false);
        let snapshot = ready_or_fail!(self, inv, ctx);

        let result = kernel_or_fail!(
            detect_communities(
                &snapshot.graph,
                &snapshot.undirected,
                resolution,
                &ctx.token
            ),
            inv,
            ctx
        );

        let (details, cross) = community_details(&snapshot, &result.assignments, result.community_count);

        let mut shown = Vec::new();
        let mut text = format!(
            "{} communities, modularity {:.4} ({})\n",
            result.community_count,
            result.modularity,
            modularity_quality(result.modularity)
        );
        for (id, detail) in details.iter().enumerate() {
            if detail.members.len() < min_size || shown.len() >= top {
                continue;
            }
            let mut packages: Vec<String> = detail
                .members
                .iter()
                .map(|&slot| snapshot.graph.symbol_at(slot).package.clone())
                .collect();
            packages.sort_unstable();
            let dominant_package = dominant(&packages);
            packages.dedup();

            let size = detail.members.len();
            let possible = size * size.saturating_sub(1) / 2;
            let connectivity = if possible == 0 {
                1.0
            } else {
                detail.internal_edges as f64 / possible as f64
            };

            let mut members: Vec<String> = detail
                .members
                .iter()
                .map(|&slot| snapshot.graph.symbol_at(slot).id.clone())
                .collect();
            members.sort_unstable();

            text.push_str(&format!(
                "  community {}: {} member(s), {} internal / {} external edge(s), package {}\n",
                id, size, detail.internal_edges, detail.external_edges, dominant_package
            ));

            shown.push(json!({
                "id": id,
                "size": size,
                "members": members,
                "internal_edges": detail.internal_edges,
                "external_edges": detail.external_edges,
                "dominant_package": dominant_package,
                "packages": packages,
                "is_cross_package": packages.len() > 1,
                "connectivity": connectivity,
            }));
        }

        inv.meta("communities", result.community_count);
        inv.meta("modularity", format!("{:.4}", result.modularity));
        inv.meta("iterations", result.iterations);
        inv.meta("converged", result.converged);

        let mut output = json!({
            "communities": shown,
            "community_count": result.community_count,
            "modularity": result.modularity,
            "modularity_quality": modularity_quality(result.modularity),
            "converged": result.converged,
            "iterations": result.iterations,
        });
        if show_cross_edges {
            let mut pairs: Vec<(&(usize, usize), &usize)> = cross.iter().collect();
            pairs.sort();
            let cross_json: Vec<Value> = pairs
                .into_iter()
                .map(|(&(a, b), &count)| {
                    json!({ "from_community": a, "to_community": b, "count": count })
                })
                .collect();
            output["cross_edges"] = Value::Array(cross_json);
        }
        Ok(inv.succeed(ctx, output, text))
    }
}

/// Most frequent value in a sorted list; ties pick the smallest.
fn dominant(sorted: &[String]) -> String {
    let mut best: Option<(&str, usize)> = None;
    let mut i = 0;
    while i < sorted.len() {
        let mut j = i;
        while j < sorted.len() && sorted[j] == sorted[i] {
            j += 1;
        }
        let run = j - i;
        if best.map_or(true, |(_, count)| run > count) {
            best = Some((sorted[i].as_str(), run));
        }
        i = j;
    }
    best.map(|(value, _)| value.to_string()).unwrap_or_default()
}

// ---------------------------------------------------------------------------
// find_articulation_points
// ---------------------------------------------------------------------------

struct FindArticulationPointsTool {
    session: Arc<AnalysisSession>,
}

impl Tool for FindArticulationPointsTool {
    fn name(&self) -> &'static str {
        "find_articulation_points"
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::Analysis
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: "Single points of failure in the dependency structure".to_string(),
            parameters: BTreeMap::from([
                (
                    "top".to_string(),
                    ParamDef::int("How many articulation points to return", 10),
                ),
                (
                    "include_bridges".to_string(),
                    ParamDef::bool("Also report bridge edges", true),
                ),
            ]),
            priority: 5,
            requires: vec!["graph".to_string()],
            side_effects: false,
            timeout_secs: 30,
            when_to_use: "To assess structural fragility of the codebase".to_string(),
        }
    }

    fn execute(
        &self,
        ctx: &ExecutionContext,
        params: &Map<String, Value>,
    ) -> Result<ToolResult, EngineError> {
        ctx.token.check()?;
        let mut inv =
            Invocation::new("analytics_articulation", "FindArticulationPoints").target("whole_graph");
        let top = int_param(params, "top", 10, 1, 100) as usize;
        let include_bridges = bool_param(params, "include_bridges", true);
        let snapshot = ready_or_fail!(self, inv, ctx);

        let result = kernel_or_fail!(
            find_articulation_points(&snapshot.graph, &snapshot.undirected, &ctx.token),
            inv,
            ctx
        );

        inv.meta("points", result.points.len());
        inv.meta("bridges", result.bridges.len());
        inv.meta("fragility", format!("{:.4}", result.fragility_score));

        let shown: Vec<&String> = result.points.iter().take(top).collect();
        let mut text = format!(
            "{} articulation point(s), fragility {:.4} ({})\n",
            result.points.len(),
            result.fragility_score,
            result.fragility_label
        );
        for point in &shown {
            text.push_str(&format!("  {}\n", point));
        }
        if include_bridges {
            text.push_str(&format!("{} bridge(s)\n", result.bridges.len()));
            for (a, b) in &result.bridges {
                text.push_str(&format!("  {} -- {}\n", a, b));
            }
        }

        let mut output = json!({
            "points": shown,
            "point_count": result.points.len(),
            "fragility_score": result.fragility_score,
            "fragility_label": result.fragility_label,
        });
        if include_bridges {
            output["bridges"] = serde_json::to_value(&result.bridges).unwrap_or(Value::Null);
        }
        Ok(inv.succeed(ctx, output, text))
    }
}

// ---------------------------------------------------------------------------
// check_reducibility
// ---------------------------------------------------------------------------

struct CheckReducibilityTool {
    session: Arc<AnalysisSession>,
}

impl Tool for CheckReducibilityTool {
    fn name(&self) -> &'static str {
        "check_reducibility"
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::Analysis
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: "Whether every loop in the call graph has a single entry".to_string(),
            parameters: BTreeMap::from([(
                "show_irreducible".to_string(),
                ParamDef::bool("Report the irreducible regions in detail", true),
            )]),
            priority: 6,
            requires: vec!["graph".to_string()],
            side_effects: false,
            timeout_secs: 30,
            when_to_use: "To judge how tractable the control structure is for analysis".to_string(),
        }
    }

    fn execute(
        &self,
        ctx: &ExecutionContext,
        params: &Map<String, Value>,
    ) -> Result<ToolResult, EngineError> {
        ctx.token.check()?;
        let mut inv = Invocation::new("analytics_reducibility", "AnalyzeReducibility");
        let show_irreducible = bool_param(params, "show_irreducible", true);
        let snapshot = ready_or_fail!(self, inv, ctx);

        let entry = match detect_entry(&snapshot.graph) {
            Some(entry) => entry,
            None => {
                // No entry means nothing is reachable: vacuously reducible.
                inv = inv.target("whole_graph");
                inv.meta("entry", "none");
                let output = json!({
                    "is_reducible": true,
                    "score": 1.0,
                    "quality": quality_label(1.0),
                    "node_count": 0,
                    "message": "no entry point detected; vacuously reducible",
                });
                return Ok(inv.succeed(
                    ctx,
                    output,
                    "no entry point detected; vacuously reducible\n".to_string(),
                ));
            }
        };
        inv = inv.target(&entry);

        let dom = kernel_or_fail!(
            DominatorTree::compute(&snapshot.graph, &entry, &ctx.token),
            inv,
            ctx
        );
        let result = kernel_or_fail!(analyze_reducibility(&snapshot.graph, &dom, &ctx.token), inv, ctx);

        inv.meta("entry", &entry);
        inv.meta("is_reducible", result.is_reducible);
        inv.meta("score", format!("{:.4}", result.score));
        inv.meta("regions", result.irreducible_regions.len());

        let mut text = format!(
            "reducibility from {}: {} (score {:.4}, {})\n",
            entry,
            if result.is_reducible { "reducible" } else { "irreducible" },
            result.score,
            quality_label(result.score)
        );
        if show_irreducible {
            for region in &result.irreducible_regions {
                text.push_str(&format!(
                    "  region {}: {} node(s), entries {}\n",
                    region.id,
                    region.size,
                    region.entry_nodes.join(", ")
                ));
            }
        }

        let mut output = serde_json::to_value(&result).unwrap_or(Value::Null);
        output["entry"] = Value::String(entry);
        output["quality"] = Value::String(quality_label(result.score).to_string());
        if !show_irreducible {
            output["irreducible_regions"] = Value::Array(Vec::new());
        }
        Ok(inv.succeed(ctx, output, text))
    }
}

// ---------------------------------------------------------------------------
// find_weighted_criticality
// ---------------------------------------------------------------------------

struct FindWeightedCriticalityTool {
    session: Arc<AnalysisSession>,
}

impl Tool for FindWeightedCriticalityTool {
    fn name(&self) -> &'static str {
        "find_weighted_criticality"
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::Analysis
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: "Composite ranking by dominator coverage and PageRank".to_string(),
            parameters: BTreeMap::from([
                (
                    "top".to_string(),
                    ParamDef::int("How many nodes to return", 20),
                ),
                (
                    "entry".to_string(),
                    ParamDef::optional_string("Dominator entry; auto-detected when omitted"),
                ),
                (
                    "show_quadrant".to_string(),
                    ParamDef::bool("Include quadrant classification", true),
                ),
            ]),
            priority: 6,
            requires: vec!["graph".to_string()],
            side_effects: false,
            timeout_secs: 45,
            when_to_use: "To find the nodes whose failure would hurt the most".to_string(),
        }
    }

    fn execute(
        &self,
        ctx: &ExecutionContext,
        params: &Map<String, Value>,
    ) -> Result<ToolResult, EngineError> {
        ctx.token.check()?;
        let mut inv =
            Invocation::new("analytics_weighted_criticality", "ComputeWeightedCriticality");
        let top = int_param(params, "top", 20, 1, 100) as usize;
        let entry = optional_string(params, "entry").filter(|e| e != "auto");
        let show_quadrant = bool_param(params, "show_quadrant", true);
        let snapshot = ready_or_fail!(self, inv, ctx);

        let result = match weighted_criticality(&snapshot.graph, entry.as_deref(), top, &ctx.token) {
            Ok(result) => result,
            Err(EngineError::Cancelled) => return Err(EngineError::Cancelled),
            Err(EngineError::NodeNotFound(id)) => {
                inv = inv.target(&id);
                inv.meta("found", false);
                let message = format!("entry symbol '{}' not found", id);
                let output = json!({ "found": false, "message": message });
                return Ok(inv.succeed(ctx, output, message));
            }
            Err(err) => return Ok(inv.fail(ctx, "unreachable_entry", err.to_string())),
        };
        inv = inv.target(&result.entry);

        inv.meta("entry", &result.entry);
        inv.meta("ranked", result.total_ranked);
        inv.meta("returned", result.nodes.len());
        inv.meta("pagerank_converged", result.pagerank_converged);

        let mut text = format!(
            "top {} critical node(s) from entry {}\n",
            result.nodes.len(),
            result.entry
        );
        let nodes: Vec<Value> = result
            .nodes
            .iter()
            .map(|node| {
                if show_quadrant {
                    text.push_str(&format!(
                        "  {} criticality {:.4} [{}] risk {}\n",
                        node.name, node.criticality, node.quadrant, node.risk
                    ));
                } else {
                    text.push_str(&format!(
                        "  {} criticality {:.4} risk {}\n",
                        node.name, node.criticality, node.risk
                    ));
                }
                let mut value = serde_json::to_value(node).unwrap_or(Value::Null);
                if !show_quadrant {
                    if let Value::Object(ref mut map) = value {
                        map.remove("quadrant");
                    }
                }
                value
            })
            .collect();

        let output = json!({
            "entry": result.entry,
            "total_ranked": result.total_ranked,
            "pagerank_converged": result.pagerank_converged,
            "nodes": nodes,
        });
        Ok(inv.succeed(ctx, output, text))
    }
}
