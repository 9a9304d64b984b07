//! Graph readiness state machine
//!
//! A session moves `Building -> Frozen -> Ready`. `Frozen` means the
//! graph and index have been installed; `Ready` additionally means the
//! derived analytics structures (the undirected view) are initialized.
//! Tools that require readiness poll [`AnalysisSession::is_ready`] a
//! bounded number of times before giving up with `GraphNotReady`.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use tracing::info;

use crate::error::EngineError;
use crate::graph::{wrap_graph, CodeGraph, UndirectedGraph};
use crate::index::SymbolIndex;

/// Readiness poll attempts before a tool reports `GraphNotReady`.
pub const READY_RETRIES: usize = 3;
/// Spacing between readiness polls.
pub const READY_RETRY_DELAY: Duration = Duration::from_millis(500);

/// Lifecycle states of an analysis session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Building,
    Frozen,
    Ready,
}

/// Everything a tool needs once the session is ready.
#[derive(Clone)]
pub struct Snapshot {
    pub graph: Arc<CodeGraph>,
    pub index: Arc<SymbolIndex>,
    pub undirected: Arc<UndirectedGraph>,
}

/// Shared session handle: one frozen graph, one index, derived caches.
///
/// `install` is called once by the embedder after construction finishes;
/// every later access is read-only and safe across threads.
pub struct AnalysisSession {
    state: AtomicU8,
    graph: OnceLock<Arc<CodeGraph>>,
    index: OnceLock<Arc<SymbolIndex>>,
    undirected: OnceLock<Arc<UndirectedGraph>>,
}

const STATE_BUILDING: u8 = 0;
const STATE_FROZEN: u8 = 1;
const STATE_READY: u8 = 2;

impl AnalysisSession {
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(STATE_BUILDING),
            graph: OnceLock::new(),
            index: OnceLock::new(),
            undirected: OnceLock::new(),
        }
    }

    /// Install a frozen graph and its index, then initialize derived
    /// structures and enter `Ready`.
    ///
    /// Returns false if a graph was already installed.
    pub fn install(&self, graph: CodeGraph, index: SymbolIndex) -> bool {
        let graph = Arc::new(graph);
        if self.graph.set(Arc::clone(&graph)).is_err() {
            return false;
        }
        self.index
            .set(Arc::new(index))
            .ok()
            .expect("index follows graph installation");
        self.state.store(STATE_FROZEN, Ordering::Release);

        let undirected = Arc::new(wrap_graph(&graph));
        self.undirected
            .set(undirected)
            .ok()
            .expect("undirected view initialized once");
        self.state.store(STATE_READY, Ordering::Release);
        info!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "analysis session ready"
        );
        true
    }

    pub fn readiness(&self) -> Readiness {
        match self.state.load(Ordering::Acquire) {
            STATE_READY => Readiness::Ready,
            STATE_FROZEN => Readiness::Frozen,
            _ => Readiness::Building,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.readiness() == Readiness::Ready
    }

    pub fn graph(&self) -> Option<Arc<CodeGraph>> {
        self.graph.get().cloned()
    }

    pub fn index(&self) -> Option<Arc<SymbolIndex>> {
        self.index.get().cloned()
    }

    pub fn undirected(&self) -> Option<Arc<UndirectedGraph>> {
        self.undirected.get().cloned()
    }

    /// Poll readiness up to [`READY_RETRIES`] times with
    /// [`READY_RETRY_DELAY`] spacing, then give up.
    pub fn wait_ready(&self) -> Result<Snapshot, EngineError> {
        for attempt in 0..READY_RETRIES {
            if self.is_ready() {
                return Ok(Snapshot {
                    graph: self.graph().expect("ready implies graph"),
                    index: self.index().expect("ready implies index"),
                    undirected: self.undirected().expect("ready implies undirected view"),
                });
            }
            if attempt + 1 < READY_RETRIES {
                std::thread::sleep(READY_RETRY_DELAY);
            }
        }
        Err(EngineError::GraphNotReady)
    }
}

impl Default for AnalysisSession {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::testutil::calls_graph;

    #[test]
    fn test_states_progress_on_install() {
        let session = AnalysisSession::new();
        assert_eq!(session.readiness(), Readiness::Building);
        assert!(!session.is_ready());

        let installed = session.install(calls_graph(&["a"], &[]), SymbolIndex::new());
        assert!(installed);
        assert_eq!(session.readiness(), Readiness::Ready);
        assert!(session.graph().is_some());
        assert!(session.undirected().is_some());
    }

    #[test]
    fn test_second_install_rejected() {
        let session = AnalysisSession::new();
        assert!(session.install(calls_graph(&["a"], &[]), SymbolIndex::new()));
        assert!(!session.install(calls_graph(&["b"], &[]), SymbolIndex::new()));
        assert_eq!(session.graph().unwrap().node_count(), 1);
    }

    #[test]
    fn test_wait_ready_on_ready_session_is_immediate() {
        let session = AnalysisSession::new();
        session.install(calls_graph(&["a"], &[]), SymbolIndex::new());
        let snapshot = session.wait_ready().unwrap();
        assert_eq!(snapshot.graph.node_count(), 1);
    }

    #[test]
    fn test_wait_ready_times_out_when_building() {
        let session = AnalysisSession::new();
        assert_eq!(session.wait_ready().err(), Some(EngineError::GraphNotReady));
    }
}
