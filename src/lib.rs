// Sextant: Static Code-Graph Analytics Engine
//
// Answers architectural questions over a frozen, typed multigraph of
// program symbols: dominators, PageRank, communities, articulation
// points, reducibility, weighted criticality, exposed through a
// uniform tool-invocation layer with tracing and cancellation.

pub mod analytics;
pub mod cancel;
pub mod error;
pub mod graph;
pub mod index;
pub mod observe;
pub mod session;
pub mod symbol;
pub mod tools;
pub mod trace;

pub use cancel::CancelToken;
pub use error::{AdmissionError, EngineError};
pub use graph::{CodeGraph, Edge, EdgeKind, GraphBuilder};
pub use index::SymbolIndex;
pub use observe::{LogObserver, NoopObserver, Observer};
pub use session::{AnalysisSession, Readiness, Snapshot};
pub use symbol::{Symbol, SymbolKind};
pub use tools::{
    register_all_tools, register_analyze_tools, register_explore_tools, ExecutionContext, Tool,
    ToolRegistry, ToolResult,
};
pub use trace::TraceStep;
