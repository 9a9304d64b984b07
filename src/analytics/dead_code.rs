//! Dead code detection over the call graph
//!
//! A symbol is a dead-code candidate when nothing calls or references
//! it. Recognized entry points and interface methods are excluded
//! rather than reported; the only surfaced reason is "no callers".

use serde::Serialize;

use crate::cancel::CancelToken;
use crate::error::EngineError;
use crate::graph::{CodeGraph, EdgeKind};
use crate::symbol::SymbolKind;

/// One dead-code finding.
#[derive(Debug, Clone, Serialize)]
pub struct DeadSymbol {
    pub id: String,
    pub name: String,
    pub kind: String,
    pub package: String,
    pub file_path: String,
    pub exported: bool,
    pub reason: String,
}

/// Find symbols with no incoming `calls` or `references` edges.
///
/// Results are sorted by name then ID for stable output. Package-kind
/// symbols are never candidates.
pub fn find_dead_code(graph: &CodeGraph, token: &CancelToken) -> Result<Vec<DeadSymbol>, EngineError> {
    token.check()?;
    let mut dead = Vec::new();

    for (i, symbol) in graph.symbols().enumerate() {
        token.check_at(i)?;
        if symbol.kind == SymbolKind::Package {
            continue;
        }
        let has_incoming = graph
            .in_edges(&symbol.id)
            .iter()
            .any(|e| matches!(e.kind, EdgeKind::Calls | EdgeKind::References));
        if has_incoming {
            continue;
        }
        if symbol.is_entry_point() {
            continue;
        }
        if graph.is_interface_method(&symbol.id) {
            continue;
        }
        dead.push(DeadSymbol {
            id: symbol.id.clone(),
            name: symbol.name.clone(),
            kind: symbol.kind.as_str().to_string(),
            package: symbol.package.clone(),
            file_path: symbol.file_path.clone(),
            exported: symbol.exported,
            reason: "no callers".to_string(),
        });
    }

    dead.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
    Ok(dead)
}
