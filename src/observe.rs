//! Abstract observation of engine events.
//!
//! The engine never talks to a span exporter directly. Tools and the
//! freeze transition report `(event, attrs)` pairs to an [`Observer`];
//! the embedder supplies a real implementation or keeps the no-op.

use std::sync::Arc;

/// Receiver for engine events.
///
/// Attribute order is the emission order and is deterministic for a
/// given event.
pub trait Observer: Send + Sync {
    /// Record one event with its attributes.
    fn record(&self, event: &str, attrs: &[(&str, String)]);
}

/// Observer that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl Observer for NoopObserver {
    fn record(&self, _event: &str, _attrs: &[(&str, String)]) {}
}

/// Observer that forwards events to `tracing` at debug level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl Observer for LogObserver {
    fn record(&self, event: &str, attrs: &[(&str, String)]) {
        let rendered: Vec<String> = attrs
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        tracing::debug!(target: "sextant::observe", "{} {}", event, rendered.join(" "));
    }
}

/// Shared observer handle passed into tool execution contexts.
pub type ObserverHandle = Arc<dyn Observer>;
