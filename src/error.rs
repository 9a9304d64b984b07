//! Error taxonomy shared by the graph substrate, the analytics kernel,
//! and the tool layer.
//!
//! Every failure mode has exactly one variant so tools can surface it
//! identically (spelled out in the result envelope, recorded in the
//! trace step). Cancellation is the only variant that escapes a tool
//! as a hard error; everything else folds into an envelope.

use thiserror::Error;

/// Errors produced by the analytics kernel and tool dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// The cancellation token fired. No partial results are returned.
    #[error("operation cancelled")]
    Cancelled,

    /// A symbol ID was not present in the frozen graph.
    #[error("node not found: {0}")]
    NodeNotFound(String),

    /// A dominator entry exists but cannot anchor a flow analysis.
    #[error("entry node is unreachable: {0}")]
    UnreachableEntry(String),

    /// The session never reached READY within the retry budget.
    #[error("graph not ready; retry once indexing has finished")]
    GraphNotReady,

    /// Analytics was asked to run before a graph was installed.
    #[error("analytics not initialized")]
    NotInitialized,
}

/// Admission errors from the symbol index and graph builder.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdmissionError {
    /// A symbol with this ID was already admitted.
    #[error("duplicate symbol id: {0}")]
    DuplicateId(String),

    /// The symbol failed a structural invariant.
    #[error("invalid symbol {id}: {reason}")]
    InvalidSymbol { id: String, reason: String },
}
