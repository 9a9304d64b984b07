//! End-to-end tests over the public engine API
//!
//! Builds small known graphs, installs them in a session, and drives
//! the registered tools the way an embedder would. Covers the lookup
//! scenarios, the structural analytics, boundary behavior on empty and
//! single-node graphs, determinism, and cancellation.

use std::sync::Arc;

use anyhow::Result;
use serde_json::{json, Map, Value};

use sextant::{
    register_all_tools, AnalysisSession, CancelToken, EdgeKind, EngineError, ExecutionContext,
    GraphBuilder, Symbol, SymbolIndex, SymbolKind, ToolRegistry, ToolResult,
};

/// Route engine logs through the test harness when RUST_LOG is set.
fn init_tracing() {
    use std::sync::Once;
    static ONCE: Once = Once::new();
    ONCE.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

fn make_symbol(name: &str, kind: SymbolKind) -> Symbol {
    Symbol {
        id: name.to_string(),
        name: name.to_string(),
        kind,
        file_path: "pkg/a.go".to_string(),
        start_line: 1,
        end_line: 2,
        package: "pkg".to_string(),
        signature: None,
        exported: name.chars().next().is_some_and(|c| c.is_uppercase()),
        language: "go".to_string(),
    }
}

/// Build a ready session plus registry from node and edge lists.
fn engine(
    nodes: &[(&str, SymbolKind)],
    edges: &[(&str, &str, EdgeKind)],
) -> (Arc<AnalysisSession>, ToolRegistry) {
    init_tracing();
    let mut builder = GraphBuilder::new("/tmp/proj");
    let mut index = SymbolIndex::new();
    for (name, kind) in nodes {
        let symbol = make_symbol(name, *kind);
        builder.add_node(symbol.clone()).unwrap();
        index.add(symbol).unwrap();
    }
    for (from, to, kind) in edges {
        builder.add_edge(*from, *to, *kind, "pkg/a.go", 1);
    }

    let session = Arc::new(AnalysisSession::new());
    assert!(session.install(builder.freeze(), index));

    let mut registry = ToolRegistry::new();
    register_all_tools(&mut registry, Arc::clone(&session));
    (session, registry)
}

fn functions<'a>(names: &[&'a str]) -> Vec<(&'a str, SymbolKind)> {
    names.iter().map(|&n| (n, SymbolKind::Function)).collect()
}

fn calls<'a>(pairs: &[(&'a str, &'a str)]) -> Vec<(&'a str, &'a str, EdgeKind)> {
    pairs
        .iter()
        .map(|&(f, t)| (f, t, EdgeKind::Calls))
        .collect()
}

fn run(registry: &ToolRegistry, name: &str, params: Value) -> ToolResult {
    let ctx = ExecutionContext::new();
    let params: Map<String, Value> = params.as_object().cloned().unwrap_or_default();
    registry
        .get(name)
        .unwrap_or_else(|| panic!("tool {} not registered", name))
        .execute(&ctx, &params)
        .expect("only cancellation is a hard error")
}

/// The config-loading fixture: three callers of parseConfig plus an
/// interface with one implementation.
fn config_fixture() -> (Arc<AnalysisSession>, ToolRegistry) {
    let mut nodes = functions(&["main", "parseConfig", "initServer", "LoadConfig"]);
    nodes.push(("Handler", SymbolKind::Interface));
    nodes.push(("UserHandler", SymbolKind::Struct));
    let mut edges = calls(&[
        ("main", "parseConfig"),
        ("initServer", "parseConfig"),
        ("LoadConfig", "parseConfig"),
    ]);
    edges.push(("UserHandler", "Handler", EdgeKind::Implements));
    engine(&nodes, &edges)
}

#[test]
fn test_find_callers_groups_and_counts() {
    let (_, registry) = config_fixture();
    let result = run(&registry, "find_callers", json!({"function_name": "parseConfig"}));
    assert!(result.success);
    assert_eq!(result.output["matches"].as_array().unwrap().len(), 1);
    assert_eq!(result.output["total_callers"], 3);
    let callers = result.output["matches"][0]["callers"].as_array().unwrap();
    let names: Vec<&str> = callers.iter().map(|c| c["name"].as_str().unwrap()).collect();
    assert_eq!(names, ["main", "initServer", "LoadConfig"]);
    assert!(result.trace_step.is_some());
    assert!(result.tokens_used > 0);
}

#[test]
fn test_find_callees_of_main() {
    let (_, registry) = config_fixture();
    let result = run(&registry, "find_callees", json!({"function_name": "main"}));
    assert!(result.success);
    assert_eq!(result.output["total_callees"], 1);
    assert_eq!(
        result.output["matches"][0]["callees"][0]["name"],
        "parseConfig"
    );
}

#[test]
fn test_find_implementations() {
    let (_, registry) = config_fixture();
    let result = run(
        &registry,
        "find_implementations",
        json!({"interface_name": "Handler"}),
    );
    assert!(result.success);
    assert_eq!(result.output["total_implementations"], 1);
    assert_eq!(
        result.output["matches"][0]["implementations"][0]["name"],
        "UserHandler"
    );
}

#[test]
fn test_upstream_call_chain_reaches_all_callers() {
    let (_, registry) = config_fixture();
    let result = run(
        &registry,
        "get_call_chain",
        json!({"function_name": "parseConfig", "direction": "upstream"}),
    );
    assert!(result.success);
    assert!(result.output["node_count"].as_u64().unwrap() >= 4);
}

#[test]
fn test_callers_and_callees_are_mutually_consistent() {
    let (_, registry) = config_fixture();
    let callers = run(&registry, "find_callers", json!({"function_name": "parseConfig"}));
    let caller_names: Vec<String> = callers.output["matches"][0]["callers"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["name"].as_str().unwrap().to_string())
        .collect();
    for caller in caller_names {
        let callees = run(&registry, "find_callees", json!({"function_name": caller}));
        let names: Vec<&str> = callees.output["matches"][0]["callees"]
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["name"].as_str().unwrap())
            .collect();
        assert!(names.contains(&"parseConfig"));
    }
}

#[test]
fn test_triangle_has_no_articulation_points() {
    let (_, registry) = engine(
        &functions(&["A", "B", "C"]),
        &calls(&[
            ("A", "B"),
            ("B", "A"),
            ("B", "C"),
            ("C", "B"),
            ("C", "A"),
            ("A", "C"),
        ]),
    );
    let result = run(&registry, "find_articulation_points", json!({}));
    assert!(result.success);
    assert_eq!(result.output["point_count"], 0);
    assert_eq!(result.output["fragility_score"], 0.0);
    assert_eq!(result.output["fragility_label"], "MINIMAL");
}

#[test]
fn test_branched_chain_articulation_points_and_bridges() {
    let (_, registry) = engine(
        &functions(&["A", "B", "C", "D", "E", "F", "G", "H"]),
        &calls(&[
            ("A", "B"),
            ("B", "C"),
            ("C", "D"),
            ("D", "E"),
            ("B", "F"),
            ("D", "G"),
            ("G", "H"),
        ]),
    );
    let result = run(&registry, "find_articulation_points", json!({"top": 100}));
    assert!(result.success);
    let points: Vec<&str> = result.output["points"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p.as_str().unwrap())
        .collect();
    assert_eq!(points, ["B", "C", "D", "G"]);
    // Every edge of a tree is a bridge.
    assert_eq!(result.output["bridges"].as_array().unwrap().len(), 7);
}

#[test]
fn test_two_triangles_yield_two_communities() {
    let (_, registry) = engine(
        &functions(&["a", "b", "c", "x", "y", "z"]),
        &calls(&[
            ("a", "b"),
            ("b", "c"),
            ("c", "a"),
            ("x", "y"),
            ("y", "z"),
            ("z", "x"),
        ]),
    );
    let result = run(&registry, "find_communities", json!({"min_size": 1}));
    assert!(result.success);
    assert!(result.output["community_count"].as_u64().unwrap() >= 2);
    let total_size: u64 = result.output["communities"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["size"].as_u64().unwrap())
        .sum();
    assert_eq!(total_size, 6);
}

#[test]
fn test_weighted_criticality_ranks_entry_first() {
    let (_, registry) = engine(
        &functions(&["main", "init", "A", "B", "C", "D", "E", "F"]),
        &calls(&[
            ("main", "init"),
            ("init", "A"),
            ("init", "B"),
            ("A", "C"),
            ("A", "D"),
            ("B", "E"),
            ("B", "F"),
        ]),
    );
    let result = run(&registry, "find_weighted_criticality", json!({"top": 8}));
    assert!(result.success);
    assert_eq!(result.output["entry"], "main");
    let nodes = result.output["nodes"].as_array().unwrap();
    assert_eq!(nodes[0]["name"], "main");
    for node in nodes {
        let name = node["name"].as_str().unwrap();
        if ["C", "D", "E", "F"].contains(&name) {
            assert_eq!(node["quadrant"], "LEAF");
        }
    }
}

#[test]
fn test_weighted_criticality_is_deterministic() {
    let (_, registry) = engine(
        &functions(&["main", "init", "A", "B", "C", "D", "E", "F"]),
        &calls(&[
            ("main", "init"),
            ("init", "A"),
            ("init", "B"),
            ("A", "C"),
            ("A", "D"),
            ("B", "E"),
            ("B", "F"),
        ]),
    );
    let first = run(&registry, "find_weighted_criticality", json!({"top": 8}));
    let second = run(&registry, "find_weighted_criticality", json!({"top": 8}));
    assert_eq!(
        serde_json::to_string(&first.output).unwrap(),
        serde_json::to_string(&second.output).unwrap()
    );
    assert_eq!(first.output_text, second.output_text);
}

#[test]
fn test_find_path_agrees_with_traversal() {
    let (_, registry) = engine(
        &functions(&["a", "b", "c", "d", "island"]),
        &calls(&[("a", "b"), ("b", "c"), ("c", "d")]),
    );
    let found = run(&registry, "find_path", json!({"from": "a", "to": "d"}));
    assert!(found.success);
    assert_eq!(found.output["found"], true);
    assert_eq!(found.output["length"], 3);

    let chain = run(
        &registry,
        "get_call_chain",
        json!({"function_name": "a", "max_depth": 10}),
    );
    let visited: Vec<&str> = chain.output["traversal"]["visited_nodes"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap())
        .collect();
    assert!(visited.contains(&"d"));
    assert!(!visited.contains(&"island"));

    let missing = run(&registry, "find_path", json!({"from": "a", "to": "island"}));
    assert!(missing.success);
    assert_eq!(missing.output["found"], false);
}

#[test]
fn test_hotspots_and_important_rank_shared_callee() {
    let (_, registry) = config_fixture();
    let hotspots = run(&registry, "find_hotspots", json!({"top": 5}));
    assert!(hotspots.success);
    assert_eq!(hotspots.output["hotspots"][0]["name"], "parseConfig");
    assert_eq!(hotspots.output["hotspots"][0]["caller_count"], 3);

    let important = run(&registry, "find_important", json!({"top": 5}));
    assert!(important.success);
    assert_eq!(important.output["converged"], true);
    assert_eq!(important.output["nodes"][0]["name"], "parseConfig");
}

#[test]
fn test_cycles_detected_with_min_size() {
    let (_, registry) = engine(
        &functions(&["main", "ping", "pong"]),
        &calls(&[("main", "ping"), ("ping", "pong"), ("pong", "ping")]),
    );
    let result = run(&registry, "find_cycles", json!({}));
    assert!(result.success);
    let cycles = result.output["cycles"].as_array().unwrap();
    assert_eq!(cycles.len(), 1);
    assert_eq!(cycles[0]["length"], 2);

    let filtered = run(&registry, "find_cycles", json!({"min_size": 3}));
    assert!(filtered.output["cycles"].as_array().unwrap().is_empty());
}

#[test]
fn test_dead_code_detection_and_filters() {
    let (_, registry) = engine(
        &functions(&["main", "used", "orphan", "Exported"]),
        &calls(&[("main", "used")]),
    );
    let result = run(&registry, "find_dead_code", json!({}));
    assert!(result.success);
    let names: Vec<&str> = result.output["dead_code"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, ["orphan"]);

    let with_exported = run(&registry, "find_dead_code", json!({"include_exported": true}));
    let names: Vec<&str> = with_exported.output["dead_code"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, ["Exported", "orphan"]);
}

#[test]
fn test_reducibility_of_structured_program() {
    let (_, registry) = engine(
        &functions(&["main", "loop_head", "body"]),
        &calls(&[
            ("main", "loop_head"),
            ("loop_head", "body"),
            ("body", "loop_head"),
        ]),
    );
    let result = run(&registry, "check_reducibility", json!({}));
    assert!(result.success);
    assert_eq!(result.output["is_reducible"], true);
    assert_eq!(result.output["score"], 1.0);
    assert_eq!(result.output["quality"], "Excellent");
}

#[test]
fn test_irreducible_loop_reported() {
    let (_, registry) = engine(
        &functions(&["main", "a", "b"]),
        &calls(&[("main", "a"), ("main", "b"), ("a", "b"), ("b", "a")]),
    );
    let result = run(&registry, "check_reducibility", json!({}));
    assert!(result.success);
    assert_eq!(result.output["is_reducible"], false);
    let regions = result.output["irreducible_regions"].as_array().unwrap();
    assert_eq!(regions.len(), 1);
    assert_eq!(regions[0]["size"], 2);
}

#[test]
fn test_empty_graph_tools_succeed_with_empty_results() {
    let (_, registry) = engine(&[], &[]);
    for tool in [
        "find_hotspots",
        "find_dead_code",
        "find_cycles",
        "find_important",
        "find_communities",
        "find_articulation_points",
        "graph_stats",
    ] {
        let result = run(&registry, tool, json!({}));
        assert!(result.success, "{} failed on the empty graph", tool);
    }
    // Required string parameters still fail, independent of graph content.
    let result = run(&registry, "find_callers", json!({}));
    assert!(!result.success);
    assert!(result.error.unwrap().contains("function_name"));
}

#[test]
fn test_single_node_boundaries() {
    let (_, registry) = engine(&functions(&["main"]), &[]);
    let crit = run(&registry, "find_weighted_criticality", json!({}));
    assert_eq!(crit.output["nodes"][0]["criticality"], 1.0);

    let communities = run(&registry, "find_communities", json!({"min_size": 1}));
    assert_eq!(communities.output["community_count"], 1);
    assert_eq!(communities.output["communities"][0]["size"], 1);
}

#[test]
fn test_lookup_of_missing_symbol_is_not_an_error() {
    let (_, registry) = config_fixture();
    let result = run(&registry, "find_callers", json!({"function_name": "ghost"}));
    assert!(result.success);
    assert_eq!(result.output["found"], false);
    assert!(result.output["message"].as_str().unwrap().contains("ghost"));
}

#[test]
fn test_index_invariants() -> Result<()> {
    let mut index = SymbolIndex::new();
    let symbol = make_symbol("parseConfig", SymbolKind::Function);
    index.add(symbol.clone())?;
    assert_eq!(index.get_by_id("parseConfig"), Some(&symbol));

    let first: Vec<String> = index.get_by_name("parseConfig").map(|s| s.id.clone()).collect();
    let second: Vec<String> = index.get_by_name("parseConfig").map(|s| s.id.clone()).collect();
    assert_eq!(first, second);
    Ok(())
}

#[test]
fn test_cancelled_token_escapes_as_error() {
    let (_, registry) = config_fixture();
    let token = CancelToken::new();
    token.cancel();
    let ctx = ExecutionContext::with_token(token);
    let params: Map<String, Value> = json!({"function_name": "parseConfig"})
        .as_object()
        .cloned()
        .unwrap();
    let err = registry
        .get("find_callers")
        .unwrap()
        .execute(&ctx, &params)
        .unwrap_err();
    assert_eq!(err, EngineError::Cancelled);
}

#[test]
fn test_tool_registry_surface() {
    let (_, registry) = config_fixture();
    assert_eq!(registry.count(), 15);
    let names = registry.names();
    assert!(names.contains(&"find_callers"));
    assert!(names.contains(&"find_weighted_criticality"));
    assert!(names.contains(&"graph_stats"));

    let tool = registry.get("find_communities").unwrap();
    let definition = tool.definition();
    assert_eq!(definition.name, "find_communities");
    assert!(definition.parameters.contains_key("resolution"));
    assert!(!definition.side_effects);
}

#[test]
fn test_unready_session_reports_graph_not_ready() {
    let session = Arc::new(AnalysisSession::new());
    let mut registry = ToolRegistry::new();
    register_all_tools(&mut registry, session);
    let result = run(&registry, "find_hotspots", json!({}));
    assert!(!result.success);
    assert!(result.error.unwrap().contains("not ready"));
}

#[test]
fn test_trace_step_records_invocation() {
    let (_, registry) = config_fixture();
    let result = run(&registry, "find_communities", json!({}));
    let step = result.trace_step.unwrap();
    assert_eq!(step.action, "analytics_communities");
    assert_eq!(step.tool, "DetectCommunities");
    assert!(step.metadata_value("modularity").is_some());
}
