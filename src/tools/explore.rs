//! Exploration tools: symbol lookup and call-graph navigation
//!
//! All lookup tools treat a missing symbol as a successful empty
//! result carrying a `message`, never as an error; a user typo should
//! read as "nothing found", not as a failed invocation.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::{json, Map, Value};

use crate::error::EngineError;
use crate::graph::{find_path, TraversalOptions};
use crate::graph::{call_graph_from, reverse_call_graph_from};
use crate::session::{AnalysisSession, Snapshot};
use crate::symbol::{Symbol, SymbolKind};

use super::{
    enum_param, int_param, optional_string, required_string, ExecutionContext, Invocation,
    ParamDef, Tool, ToolCategory, ToolDefinition, ToolRegistry, ToolResult,
};

/// Register the exploration tool set.
pub fn register_explore_tools(registry: &mut ToolRegistry, session: Arc<AnalysisSession>) {
    registry.register(Box::new(FindCallersTool {
        session: Arc::clone(&session),
    }));
    registry.register(Box::new(FindCalleesTool {
        session: Arc::clone(&session),
    }));
    registry.register(Box::new(FindImplementationsTool {
        session: Arc::clone(&session),
    }));
    registry.register(Box::new(FindSymbolTool {
        session: Arc::clone(&session),
    }));
    registry.register(Box::new(GetCallChainTool {
        session: Arc::clone(&session),
    }));
    registry.register(Box::new(FindPathTool {
        session: Arc::clone(&session),
    }));
    registry.register(Box::new(GraphStatsTool { session }));
}

/// JSON shape shared by every tool that returns symbols.
pub(crate) fn symbol_json(symbol: &Symbol) -> Value {
    json!({
        "id": symbol.id,
        "name": symbol.name,
        "kind": symbol.kind.as_str(),
        "file": symbol.file_path,
        "line": symbol.start_line,
        "package": symbol.package,
        "exported": symbol.exported,
    })
}

/// Successful empty result with a message (the NotFound shape).
fn not_found(
    inv: Invocation,
    ctx: &ExecutionContext,
    message: String,
) -> ToolResult {
    let output = json!({ "found": false, "message": message });
    inv.succeed(ctx, output, message)
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

// ---------------------------------------------------------------------------
// find_callers
// ---------------------------------------------------------------------------

struct FindCallersTool {
    session: Arc<AnalysisSession>,
}

impl Tool for FindCallersTool {
    fn name(&self) -> &'static str {
        "find_callers"
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::Exploration
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: "List every function that calls the named function".to_string(),
            parameters: BTreeMap::from([
                (
                    "function_name".to_string(),
                    ParamDef::required_string("Name of the function to find callers for"),
                ),
                (
                    "limit".to_string(),
                    ParamDef::int("Maximum callers returned per match", 50),
                ),
            ]),
            priority: 1,
            requires: vec!["graph".to_string()],
            side_effects: false,
            timeout_secs: 10,
            when_to_use: "Before changing a function's signature or behavior".to_string(),
        }
    }

    fn execute(
        &self,
        ctx: &ExecutionContext,
        params: &Map<String, Value>,
    ) -> Result<ToolResult, EngineError> {
        ctx.token.check()?;
        let mut inv = Invocation::new("explore_find_callers", "FindCallers");
        let function_name = match required_string(params, "function_name") {
            Ok(name) => name,
            Err(msg) => return Ok(inv.fail(ctx, "invalid_params", msg)),
        };
        inv = inv.target(&function_name);
        let limit = int_param(params, "limit", 50, 1, 1000) as usize;
        let snapshot = ready_or_fail!(self, inv, ctx);

        let matches: Vec<&Symbol> = snapshot.index.get_by_name(&function_name).collect();
        if matches.is_empty() {
            inv.meta("matches", 0);
            return Ok(not_found(
                inv,
                ctx,
                format!("no symbol named '{}'", function_name),
            ));
        }

        let mut total_callers = 0usize;
        let mut groups = Vec::new();
        let mut text = String::new();
        for symbol in &matches {
            let callers = snapshot.graph.callers_of(&symbol.id);
            let shown: Vec<Value> = callers.iter().take(limit).map(|s| symbol_json(s)).collect();
            total_callers += callers.len();
            text.push_str(&format!(
                "{} ({}:{}) has {} caller(s)\n",
                symbol.name, symbol.file_path, symbol.start_line, callers.len()
            ));
            for caller in callers.iter().take(limit) {
                text.push_str(&format!("  <- {} ({}:{})\n", caller.name, caller.file_path, caller.start_line));
            }
            groups.push(json!({
                "symbol": symbol_json(symbol),
                "caller_count": callers.len(),
                "callers": shown,
            }));
        }

        inv.meta("matches", matches.len());
        inv.meta("total_callers", total_callers);
        let output = json!({
            "function_name": function_name,
            "matches": groups,
            "total_callers": total_callers,
        });
        Ok(inv.succeed(ctx, output, text))
    }
}

// ---------------------------------------------------------------------------
// find_callees
// ---------------------------------------------------------------------------

struct FindCalleesTool {
    session: Arc<AnalysisSession>,
}

impl Tool for FindCalleesTool {
    fn name(&self) -> &'static str {
        "find_callees"
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::Exploration
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: "List every function the named function calls".to_string(),
            parameters: BTreeMap::from([(
                "function_name".to_string(),
                ParamDef::required_string("Name of the function to find callees for"),
            )]),
            priority: 1,
            requires: vec!["graph".to_string()],
            side_effects: false,
            timeout_secs: 10,
            when_to_use: "To understand what a function depends on".to_string(),
        }
    }

    fn execute(
        &self,
        ctx: &ExecutionContext,
        params: &Map<String, Value>,
    ) -> Result<ToolResult, EngineError> {
        ctx.token.check()?;
        let mut inv = Invocation::new("explore_find_callees", "FindCallees");
        let function_name = match required_string(params, "function_name") {
            Ok(name) => name,
            Err(msg) => return Ok(inv.fail(ctx, "invalid_params", msg)),
        };
        inv = inv.target(&function_name);
        let snapshot = ready_or_fail!(self, inv, ctx);

        let matches: Vec<&Symbol> = snapshot.index.get_by_name(&function_name).collect();
        if matches.is_empty() {
            inv.meta("matches", 0);
            return Ok(not_found(
                inv,
                ctx,
                format!("no symbol named '{}'", function_name),
            ));
        }

        let mut total_callees = 0usize;
        let mut groups = Vec::new();
        let mut text = String::new();
        for symbol in &matches {
            let callees = snapshot.graph.callees_of(&symbol.id);
            total_callees += callees.len();
            text.push_str(&format!(
                "{} ({}:{}) calls {} function(s)\n",
                symbol.name, symbol.file_path, symbol.start_line, callees.len()
            ));
            for callee in &callees {
                text.push_str(&format!("  -> {} ({}:{})\n", callee.name, callee.file_path, callee.start_line));
            }
            groups.push(json!({
                "symbol": symbol_json(symbol),
                "callee_count": callees.len(),
                "callees": callees.iter().map(|s| symbol_json(s)).collect::<Vec<_>>(),
            }));
        }

        inv.meta("matches", matches.len());
        inv.meta("total_callees", total_callees);
        let output = json!({
            "function_name": function_name,
            "matches": groups,
            "total_callees": total_callees,
        });
        Ok(inv.succeed(ctx, output, text))
    }
}

// ---------------------------------------------------------------------------
// find_implementations
// ---------------------------------------------------------------------------

struct FindImplementationsTool {
    session: Arc<AnalysisSession>,
}

impl Tool for FindImplementationsTool {
    fn name(&self) -> &'static str {
        "find_implementations"
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::Exploration
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: "List concrete types implementing the named interface".to_string(),
            parameters: BTreeMap::from([(
                "interface_name".to_string(),
                ParamDef::required_string("Name of the interface"),
            )]),
            priority: 2,
            requires: vec!["graph".to_string()],
            side_effects: false,
            timeout_secs: 10,
            when_to_use: "Before changing an interface's method set".to_string(),
        }
    }

    fn execute(
        &self,
        ctx: &ExecutionContext,
        params: &Map<String, Value>,
    ) -> Result<ToolResult, EngineError> {
        ctx.token.check()?;
        let mut inv = Invocation::new("explore_find_implementations", "FindImplementations");
        let interface_name = match required_string(params, "interface_name") {
            Ok(name) => name,
            Err(msg) => return Ok(inv.fail(ctx, "invalid_params", msg)),
        };
        inv = inv.target(&interface_name);
        let snapshot = ready_or_fail!(self, inv, ctx);

        let matches: Vec<&Symbol> = snapshot
            .index
            .get_by_name(&interface_name)
            .filter(|s| s.kind == SymbolKind::Interface)
            .collect();
        if matches.is_empty() {
            inv.meta("matches", 0);
            return Ok(not_found(
                inv,
                ctx,
                format!("no interface named '{}'", interface_name),
            ));
        }

        let mut total = 0usize;
        let mut groups = Vec::new();
        let mut text = String::new();
        for symbol in &matches {
            let implementations = snapshot.graph.implementations_of(&symbol.id);
            total += implementations.len();
            text.push_str(&format!(
                "{} ({}:{}) has {} implementation(s)\n",
                symbol.name, symbol.file_path, symbol.start_line, implementations.len()
            ));
            for imp in &implementations {
                text.push_str(&format!("  <= {} ({}:{})\n", imp.name, imp.file_path, imp.start_line));
            }
            groups.push(json!({
                "interface": symbol_json(symbol),
                "implementation_count": implementations.len(),
                "implementations": implementations.iter().map(|s| symbol_json(s)).collect::<Vec<_>>(),
            }));
        }

        inv.meta("matches", matches.len());
        inv.meta("total_implementations", total);
        let output = json!({
            "interface_name": interface_name,
            "matches": groups,
            "total_implementations": total,
        });
        Ok(inv.succeed(ctx, output, text))
    }
}

// ---------------------------------------------------------------------------
// find_symbol
// ---------------------------------------------------------------------------

struct FindSymbolTool {
    session: Arc<AnalysisSession>,
}

impl Tool for FindSymbolTool {
    fn name(&self) -> &'static str {
        "find_symbol"
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::Exploration
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: "Look up symbols by name, optionally filtered by kind".to_string(),
            parameters: BTreeMap::from([
                (
                    "name".to_string(),
                    ParamDef::required_string("Symbol name to look up"),
                ),
                (
                    "kind".to_string(),
                    ParamDef::optional_string(
                        "Restrict to one kind (function, method, struct, interface, ...)",
                    ),
                ),
            ]),
            priority: 1,
            requires: vec!["graph".to_string()],
            side_effects: false,
            timeout_secs: 10,
            when_to_use: "To locate a symbol's definition and metadata".to_string(),
        }
    }

    fn execute(
        &self,
        ctx: &ExecutionContext,
        params: &Map<String, Value>,
    ) -> Result<ToolResult, EngineError> {
        ctx.token.check()?;
        let mut inv = Invocation::new("explore_find_symbol", "LookupSymbol");
        let name = match required_string(params, "name") {
            Ok(name) => name,
            Err(msg) => return Ok(inv.fail(ctx, "invalid_params", msg)),
        };
        inv = inv.target(&name);
        let kind_filter = match optional_string(params, "kind") {
            Some(raw) => match SymbolKind::parse(&raw) {
                Some(kind) => Some(kind),
                None => {
                    return Ok(inv.fail(
                        ctx,
                        "invalid_params",
                        format!("parameter 'kind' has unknown value '{}'", raw),
                    ))
                }
            },
            None => None,
        };
        let snapshot = ready_or_fail!(self, inv, ctx);

        let symbols: Vec<&Symbol> = snapshot
            .index
            .get_by_name(&name)
            .filter(|s| kind_filter.map_or(true, |k| s.kind == k))
            .collect();
        if symbols.is_empty() {
            inv.meta("matches", 0);
            return Ok(not_found(inv, ctx, format!("no symbol named '{}'", name)));
        }

        let mut text = String::new();
        for symbol in &symbols {
            text.push_str(&format!(
                "{} [{}] {}:{}-{} package {}\n",
                symbol.name,
                symbol.kind.as_str(),
                symbol.file_path,
                symbol.start_line,
                symbol.end_line,
                symbol.package
            ));
        }

        inv.meta("matches", symbols.len());
        let output = json!({
            "name": name,
            "symbols": symbols.iter().map(|s| symbol_json(s)).collect::<Vec<_>>(),
        });
        Ok(inv.succeed(ctx, output, text))
    }
}

// ---------------------------------------------------------------------------
// get_call_chain
// ---------------------------------------------------------------------------

struct GetCallChainTool {
    session: Arc<AnalysisSession>,
}

impl Tool for GetCallChainTool {
    fn name(&self) -> &'static str {
        "get_call_chain"
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::Exploration
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: "Bounded BFS over the call graph from a function".to_string(),
            parameters: BTreeMap::from([
                (
                    "function_name".to_string(),
                    ParamDef::required_string("Function to start the traversal at"),
                ),
                (
                    "direction".to_string(),
                    ParamDef::one_of(
                        "Traverse callees (downstream) or callers (upstream)",
                        &["downstream", "upstream"],
                        "downstream",
                    ),
                ),
                (
                    "max_depth".to_string(),
                    ParamDef::int("Maximum traversal depth", 5),
                ),
            ]),
            priority: 2,
            requires: vec!["graph".to_string()],
            side_effects: false,
            timeout_secs: 15,
            when_to_use: "To trace how execution flows into or out of a function".to_string(),
        }
    }

    fn execute(
        &self,
        ctx: &ExecutionContext,
        params: &Map<String, Value>,
    ) -> Result<ToolResult, EngineError> {
        ctx.token.check()?;
        let mut inv = Invocation::new("explore_call_chain", "TraverseCallGraph");
        let function_name = match required_string(params, "function_name") {
            Ok(name) => name,
            Err(msg) => return Ok(inv.fail(ctx, "invalid_params", msg)),
        };
        inv = inv.target(&function_name);
        let direction = match enum_param(params, "direction", &["downstream", "upstream"], "downstream") {
            Ok(direction) => direction,
            Err(msg) => return Ok(inv.fail(ctx, "invalid_params", msg)),
        };
        let max_depth = int_param(params, "max_depth", 5, 1, 10) as usize;
        let snapshot = ready_or_fail!(self, inv, ctx);

        // Several symbols can share the name; traverse from the first
        // admitted one, which is stable.
        let root = match snapshot.index.get_by_name(&function_name).next() {
            Some(symbol) => symbol,
            None => {
                inv.meta("matches", 0);
                return Ok(not_found(
                    inv,
                    ctx,
                    format!("no symbol named '{}'", function_name),
                ));
            }
        };

        let options = TraversalOptions {
            max_depth,
            max_nodes: None,
        };
        let result = if direction == "downstream" {
            call_graph_from(&snapshot.graph, &root.id, &options)
        } else {
            reverse_call_graph_from(&snapshot.graph, &root.id, &options)
        };

        inv.meta("direction", &direction);
        inv.meta("node_count", result.node_count());
        inv.meta("depth_reached", result.depth_reached);
        inv.meta("truncated", result.truncated);

        let mut text = format!(
            "{} call chain from {} ({} nodes, depth {}{})\n",
            direction,
            root.name,
            result.node_count(),
            result.depth_reached,
            if result.truncated { ", truncated" } else { "" }
        );
        for id in &result.visited_nodes {
            text.push_str(&format!("  {}\n", id));
        }

        let output = json!({
            "root": symbol_json(root),
            "direction": direction,
            "node_count": result.node_count(),
            "traversal": serde_json::to_value(&result).unwrap_or(Value::Null),
        });
        Ok(inv.succeed(ctx, output, text))
    }
}

// ---------------------------------------------------------------------------
// find_path
// ---------------------------------------------------------------------------

struct FindPathTool {
    session: Arc<AnalysisSession>,
}

impl FindPathTool {
    /// Resolve an endpoint given as an ID or a name (first admitted match).
    fn resolve(snapshot: &Snapshot, value: &str) -> Option<String> {
        if snapshot.graph.contains_node(value) {
            return Some(value.to_string());
        }
        snapshot
            .index
            .get_by_name(value)
            .next()
            .map(|s| s.id.clone())
    }
}

impl Tool for FindPathTool {
    fn name(&self) -> &'static str {
        "find_path"
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::Exploration
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: "Shortest call path between two functions".to_string(),
            parameters: BTreeMap::from([
                (
                    "from".to_string(),
                    ParamDef::required_string("Source function name or ID"),
                ),
                (
                    "to".to_string(),
                    ParamDef::required_string("Target function name or ID"),
                ),
            ]),
            priority: 2,
            requires: vec!["graph".to_string()],
            side_effects: false,
            timeout_secs: 10,
            when_to_use: "To check whether and how one function reaches another".to_string(),
        }
    }

    fn execute(
        &self,
        ctx: &ExecutionContext,
        params: &Map<String, Value>,
    ) -> Result<ToolResult, EngineError> {
        ctx.token.check()?;
        let mut inv = Invocation::new("explore_find_path", "FindPath");
        let from = match required_string(params, "from") {
            Ok(v) => v,
            Err(msg) => return Ok(inv.fail(ctx, "invalid_params", msg)),
        };
        let to = match required_string(params, "to") {
            Ok(v) => v,
            Err(msg) => return Ok(inv.fail(ctx, "invalid_params", msg)),
        };
        inv = inv.target(format!("{} -> {}", from, to));
        let snapshot = ready_or_fail!(self, inv, ctx);

        let (from_id, to_id) = match (
            Self::resolve(&snapshot, &from),
            Self::resolve(&snapshot, &to),
        ) {
            (Some(f), Some(t)) => (f, t),
            _ => {
                inv.meta("found", false);
                return Ok(not_found(
                    inv,
                    ctx,
                    format!("no symbol for '{}' or '{}'", from, to),
                ));
            }
        };

        let result = find_path(&snapshot.graph, &from_id, &to_id);
        inv.meta("found", result.found);
        inv.meta("length", result.length);

        let text = if result.found {
            format!(
                "path from {} to {} ({} edge(s)):\n  {}\n",
                from,
                to,
                result.length,
                result.path.join(" -> ")
            )
        } else {
            format!("no call path from {} to {}\n", from, to)
        };
        let output = serde_json::to_value(&result).unwrap_or(Value::Null);
        Ok(inv.succeed(ctx, output, text))
    }
}

// ---------------------------------------------------------------------------
// graph_stats
// ---------------------------------------------------------------------------

struct GraphStatsTool {
    session: Arc<AnalysisSession>,
}

impl Tool for GraphStatsTool {
    fn name(&self) -> &'static str {
        "graph_stats"
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::Exploration
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: "Node, edge, and per-kind symbol counts".to_string(),
            parameters: BTreeMap::new(),
            priority: 0,
            requires: vec!["graph".to_string()],
            side_effects: false,
            timeout_secs: 10,
            when_to_use: "To size up a codebase before deeper analysis".to_string(),
        }
    }

    fn execute(
        &self,
        ctx: &ExecutionContext,
        _params: &Map<String, Value>,
    ) -> Result<ToolResult, EngineError> {
        ctx.token.check()?;
        let mut inv = Invocation::new("explore_graph_stats", "GraphStats").target("whole_graph");
        let snapshot = ready_or_fail!(self, inv, ctx);

        let stats = snapshot.index.stats();
        inv.meta("nodes", snapshot.graph.node_count());
        inv.meta("edges", snapshot.graph.edge_count());

        let mut text = format!(
            "graph at {}: {} nodes, {} edges, {} packages\n",
            snapshot.graph.root_path(),
            snapshot.graph.node_count(),
            snapshot.graph.edge_count(),
            stats.packages
        );
        for (kind, count) in &stats.by_kind {
            text.push_str(&format!("  {}: {}\n", kind, count));
        }

        let output = json!({
            "root_path": snapshot.graph.root_path(),
            "nodes": snapshot.graph.node_count(),
            "edges": snapshot.graph.edge_count(),
            "index": serde_json::to_value(&stats).unwrap_or(Value::Null),
        });
        Ok(inv.succeed(ctx, output, text))
    }
}
