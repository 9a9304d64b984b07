//! Code graph: a frozen, typed multigraph over program symbols
//!
//! Construction happens in an owned [`GraphBuilder`]; [`GraphBuilder::freeze`]
//! consumes it and produces an immutable [`CodeGraph`]. The split makes the
//! freeze transition structural: there is no mutator to call on a frozen
//! graph, so shared references are safe across threads without locking.
//!
//! Edges are typed ([`EdgeKind`]) and directed; distinct kinds between the
//! same endpoints coexist, duplicates with identical `(from, to, kind)` are
//! coalesced at freeze time. Edges naming an endpoint that was never added
//! as a node are dropped at freeze time with a warning.

pub mod traversal;
pub mod undirected;

use std::collections::{HashMap, HashSet};

use petgraph::graph::DiGraph;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::AdmissionError;
use crate::symbol::{Symbol, SymbolKind};

pub use traversal::{
    call_graph_from, find_path, reverse_call_graph_from, PathResult, TraversalOptions,
    TraversalResult, MAX_TRAVERSAL_DEPTH,
};
pub use undirected::{wrap_graph, UndirectedGraph};

/// Relation type carried by an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    Calls,
    Implements,
    References,
    Contains,
}

impl EdgeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeKind::Calls => "calls",
            EdgeKind::Implements => "implements",
            EdgeKind::References => "references",
            EdgeKind::Contains => "contains",
        }
    }
}

/// One directed, typed edge with the source location it was observed at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub from: String,
    pub to: String,
    pub kind: EdgeKind,
    pub file: String,
    pub line: u32,
}

/// Mutable construction phase of a code graph.
///
/// Nodes must pass the same admission invariants as the symbol index.
/// Edges are buffered unvalidated; endpoint resolution happens at
/// [`freeze`](Self::freeze).
#[derive(Debug)]
pub struct GraphBuilder {
    root_path: String,
    symbols: Vec<Symbol>,
    id_to_slot: HashMap<String, usize>,
    pending: Vec<Edge>,
}

impl GraphBuilder {
    pub fn new(root_path: impl Into<String>) -> Self {
        Self {
            root_path: root_path.into(),
            symbols: Vec::new(),
            id_to_slot: HashMap::new(),
            pending: Vec::new(),
        }
    }

    /// Add a symbol as a graph node.
    pub fn add_node(&mut self, symbol: Symbol) -> Result<(), AdmissionError> {
        if let Err(reason) = symbol.validate() {
            return Err(AdmissionError::InvalidSymbol {
                id: symbol.id.clone(),
                reason,
            });
        }
        if self.id_to_slot.contains_key(&symbol.id) {
            return Err(AdmissionError::DuplicateId(symbol.id.clone()));
        }
        self.id_to_slot.insert(symbol.id.clone(), self.symbols.len());
        self.symbols.push(symbol);
        Ok(())
    }

    /// Buffer a typed edge. Endpoints are resolved at freeze time.
    pub fn add_edge(
        &mut self,
        from: impl Into<String>,
        to: impl Into<String>,
        kind: EdgeKind,
        file: impl Into<String>,
        line: u32,
    ) {
        self.pending.push(Edge {
            from: from.into(),
            to: to.into(),
            kind,
            file: file.into(),
            line,
        });
    }

    pub fn node_count(&self) -> usize {
        self.symbols.len()
    }

    /// Freeze the graph: resolve edges, drop dangling endpoints, coalesce
    /// duplicates, and build the forward/reverse adjacency plus the
    /// calls-only projection used by the analytics kernel.
    pub fn freeze(self) -> CodeGraph {
        let node_count = self.symbols.len();
        let mut out_edges: Vec<Vec<Edge>> = vec![Vec::new(); node_count];
        let mut in_edges: Vec<Vec<Edge>> = vec![Vec::new(); node_count];
        let mut out_calls: Vec<Vec<usize>> = vec![Vec::new(); node_count];
        let mut in_calls: Vec<Vec<usize>> = vec![Vec::new(); node_count];

        let mut calls = DiGraph::<(), ()>::with_capacity(node_count, 0);
        for _ in 0..node_count {
            calls.add_node(());
        }

        let mut seen: HashSet<(usize, usize, EdgeKind)> = HashSet::new();
        let mut dropped = 0usize;
        let mut edge_count = 0usize;

        for edge in self.pending {
            let (from_slot, to_slot) = match (
                self.id_to_slot.get(&edge.from),
                self.id_to_slot.get(&edge.to),
            ) {
                (Some(&f), Some(&t)) => (f, t),
                _ => {
                    warn!(
                        from = %edge.from,
                        to = %edge.to,
                        kind = edge.kind.as_str(),
                        "dropping edge with dangling endpoint"
                    );
                    dropped += 1;
                    continue;
                }
            };
            if !seen.insert((from_slot, to_slot, edge.kind)) {
                continue;
            }
            if edge.kind == EdgeKind::Calls {
                calls.add_edge(
                    petgraph::graph::NodeIndex::new(from_slot),
                    petgraph::graph::NodeIndex::new(to_slot),
                    (),
                );
                out_calls[from_slot].push(to_slot);
                in_calls[to_slot].push(from_slot);
            }
            out_edges[from_slot].push(edge.clone());
            in_edges[to_slot].push(edge);
            edge_count += 1;
        }

        info!(
            nodes = node_count,
            edges = edge_count,
            dropped,
            "graph frozen"
        );

        CodeGraph {
            root_path: self.root_path,
            symbols: self.symbols,
            id_to_slot: self.id_to_slot,
            out_edges,
            in_edges,
            out_calls,
            in_calls,
            edge_count,
            calls,
        }
    }
}

/// Frozen, read-only code graph.
///
/// All accessors take `&self`; the type is `Send + Sync` and shared by
/// every concurrent tool invocation without locking.
#[derive(Debug)]
pub struct CodeGraph {
    root_path: String,
    symbols: Vec<Symbol>,
    id_to_slot: HashMap<String, usize>,
    out_edges: Vec<Vec<Edge>>,
    in_edges: Vec<Vec<Edge>>,
    /// Calls-only successor slots, adjacency in edge insertion order.
    out_calls: Vec<Vec<usize>>,
    in_calls: Vec<Vec<usize>>,
    edge_count: usize,
    /// Calls-only projection with `NodeIndex == slot`, for petgraph
    /// algorithms (dominators, SCCs).
    calls: DiGraph<(), ()>,
}

const NO_EDGES: &[Edge] = &[];

impl CodeGraph {
    pub fn root_path(&self) -> &str {
        &self.root_path
    }

    pub fn node_count(&self) -> usize {
        self.symbols.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    /// Look up a symbol by ID.
    pub fn node(&self, id: &str) -> Option<&Symbol> {
        self.id_to_slot.get(id).map(|&slot| &self.symbols[slot])
    }

    pub fn contains_node(&self, id: &str) -> bool {
        self.id_to_slot.contains_key(id)
    }

    /// All symbols in insertion order.
    pub fn symbols(&self) -> impl Iterator<Item = &Symbol> {
        self.symbols.iter()
    }

    /// Outgoing edges of a node in insertion order; empty for unknown IDs.
    pub fn out_edges(&self, id: &str) -> &[Edge] {
        match self.id_to_slot.get(id) {
            Some(&slot) => &self.out_edges[slot],
            None => NO_EDGES,
        }
    }

    /// Incoming edges of a node in insertion order; empty for unknown IDs.
    pub fn in_edges(&self, id: &str) -> &[Edge] {
        match self.id_to_slot.get(id) {
            Some(&slot) => &self.in_edges[slot],
            None => NO_EDGES,
        }
    }

    /// Symbols with a `calls` edge into `id`.
    pub fn callers_of(&self, id: &str) -> Vec<&Symbol> {
        self.in_edges(id)
            .iter()
            .filter(|e| e.kind == EdgeKind::Calls)
            .filter_map(|e| self.node(&e.from))
            .collect()
    }

    /// Symbols `id` has a `calls` edge to.
    pub fn callees_of(&self, id: &str) -> Vec<&Symbol> {
        self.out_edges(id)
            .iter()
            .filter(|e| e.kind == EdgeKind::Calls)
            .filter_map(|e| self.node(&e.to))
            .collect()
    }

    /// Concrete types with an `implements` edge into the interface `id`.
    pub fn implementations_of(&self, id: &str) -> Vec<&Symbol> {
        self.in_edges(id)
            .iter()
            .filter(|e| e.kind == EdgeKind::Implements)
            .filter_map(|e| self.node(&e.from))
            .collect()
    }

    /// Whether `id` is a method contained in an interface-kind symbol.
    pub fn is_interface_method(&self, id: &str) -> bool {
        self.in_edges(id)
            .iter()
            .filter(|e| e.kind == EdgeKind::Contains)
            .filter_map(|e| self.node(&e.from))
            .any(|parent| parent.kind == SymbolKind::Interface)
    }

    // Slot-level access for the kernel. Slots are assigned in node
    // insertion order and align with `NodeIndex` in the calls projection.

    pub(crate) fn slot(&self, id: &str) -> Option<usize> {
        self.id_to_slot.get(id).copied()
    }

    pub(crate) fn symbol_at(&self, slot: usize) -> &Symbol {
        &self.symbols[slot]
    }

    pub(crate) fn calls_successors(&self, slot: usize) -> &[usize] {
        &self.out_calls[slot]
    }

    pub(crate) fn calls_predecessors(&self, slot: usize) -> &[usize] {
        &self.in_calls[slot]
    }

    pub(crate) fn calls_graph(&self) -> &DiGraph<(), ()> {
        &self.calls
    }

    pub(crate) fn out_edges_at(&self, slot: usize) -> &[Edge] {
        &self.out_edges[slot]
    }
}


#[cfg(test)]
mod tests {
    use super::testutil::{calls_graph, function, symbol};
    use super::*;

    #[test]
    fn test_freeze_resolves_edges() {
        let g = calls_graph(&["a", "b", "c"], &[("a", "b"), ("b", "c")]);
        assert_eq!(g.node_count(), 3);
        assert_eq!(g.edge_count(), 2);
        assert_eq!(g.out_edges("a").len(), 1);
        assert_eq!(g.in_edges("c").len(), 1);
        assert_eq!(g.out_edges("a")[0].to, "b");
    }

    #[test]
    fn test_dangling_edges_dropped() {
        let mut builder = GraphBuilder::new("/tmp/proj");
        builder.add_node(function("a")).unwrap();
        builder.add_edge("a", "ghost", EdgeKind::Calls, "pkg/a.go", 3);
        builder.add_edge("ghost", "a", EdgeKind::Calls, "pkg/a.go", 4);
        let g = builder.freeze();
        assert_eq!(g.edge_count(), 0);
        assert!(g.out_edges("a").is_empty());
    }

    #[test]
    fn test_duplicate_edges_coalesced() {
        let mut builder = GraphBuilder::new("/tmp/proj");
        builder.add_node(function("a")).unwrap();
        builder.add_node(function("b")).unwrap();
        builder.add_edge("a", "b", EdgeKind::Calls, "pkg/a.go", 1);
        builder.add_edge("a", "b", EdgeKind::Calls, "pkg/a.go", 9);
        builder.add_edge("a", "b", EdgeKind::References, "pkg/a.go", 2);
        let g = builder.freeze();
        // Same (from, to, kind) coalesces; a different kind coexists.
        assert_eq!(g.edge_count(), 2);
        assert_eq!(g.out_edges("a").len(), 2);
    }

    #[test]
    fn test_duplicate_node_rejected() {
        let mut builder = GraphBuilder::new("/tmp/proj");
        builder.add_node(function("a")).unwrap();
        assert_eq!(
            builder.add_node(function("a")),
            Err(AdmissionError::DuplicateId("a".to_string()))
        );
    }

    #[test]
    fn test_unknown_id_queries_are_empty() {
        let g = calls_graph(&["a"], &[]);
        assert!(g.node("nope").is_none());
        assert!(g.out_edges("nope").is_empty());
        assert!(g.in_edges("nope").is_empty());
        assert!(g.callers_of("nope").is_empty());
    }

    #[test]
    fn test_callers_and_callees_are_mutually_consistent() {
        let g = calls_graph(
            &["main", "parseConfig", "initServer"],
            &[("main", "parseConfig"), ("initServer", "parseConfig")],
        );
        let callers: Vec<&str> = g.callers_of("parseConfig").iter().map(|s| s.id.as_str()).collect();
        assert_eq!(callers, ["main", "initServer"]);
        for caller in callers {
            assert!(g
                .callees_of(caller)
                .iter()
                .any(|callee| callee.id == "parseConfig"));
        }
    }

    #[test]
    fn test_implementations_and_interface_methods() {
        let mut builder = GraphBuilder::new("/tmp/proj");
        builder.add_node(symbol("Handler", SymbolKind::Interface)).unwrap();
        builder.add_node(symbol("Serve", SymbolKind::Method)).unwrap();
        builder.add_node(symbol("UserHandler", SymbolKind::Struct)).unwrap();
        builder.add_edge("UserHandler", "Handler", EdgeKind::Implements, "pkg/a.go", 8);
        builder.add_edge("Handler", "Serve", EdgeKind::Contains, "pkg/a.go", 2);
        let g = builder.freeze();

        let impls: Vec<&str> = g.implementations_of("Handler").iter().map(|s| s.id.as_str()).collect();
        assert_eq!(impls, ["UserHandler"]);
        assert!(g.is_interface_method("Serve"));
        assert!(!g.is_interface_method("UserHandler"));
    }

    #[test]
    fn test_adjacency_is_insertion_ordered() {
        let g = calls_graph(&["a", "b", "c", "d"], &[("a", "c"), ("a", "b"), ("a", "d")]);
        let order: Vec<&str> = g.out_edges("a").iter().map(|e| e.to.as_str()).collect();
        assert_eq!(order, ["c", "b", "d"]);
    }
}
