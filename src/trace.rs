//! Trace steps
//!
//! One structured record per tool invocation: the action performed, the
//! internal algorithm name, the primary target, the wall-clock
//! duration, and a metadata map of algorithm-specific detail. Metadata
//! is built through a fluent builder and serializes in insertion
//! order, so two identical invocations produce byte-identical traces.

use std::time::Duration;

use serde::ser::{SerializeMap, SerializeStruct};
use serde::{Serialize, Serializer};

/// Record of one tool invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct TraceStep {
    /// Externally visible action, e.g. `"analytics_communities"`.
    pub action: String,
    /// Internal algorithm name, e.g. `"DetectCommunities"`.
    pub tool: String,
    /// Primary input ID or name.
    pub target: String,
    pub duration: Duration,
    metadata: Vec<(String, String)>,
}

impl TraceStep {
    pub fn builder(action: impl Into<String>, tool: impl Into<String>) -> TraceStepBuilder {
        TraceStepBuilder {
            step: TraceStep {
                action: action.into(),
                tool: tool.into(),
                target: String::new(),
                duration: Duration::ZERO,
                metadata: Vec::new(),
            },
        }
    }

    /// Metadata entries in insertion order.
    pub fn metadata(&self) -> &[(String, String)] {
        &self.metadata
    }

    /// First metadata value for a key, if present.
    pub fn metadata_value(&self, key: &str) -> Option<&str> {
        self.metadata
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

impl Serialize for TraceStep {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        struct OrderedMetadata<'a>(&'a [(String, String)]);
        impl Serialize for OrderedMetadata<'_> {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                let mut map = serializer.serialize_map(Some(self.0.len()))?;
                for (key, value) in self.0 {
                    map.serialize_entry(key, value)?;
                }
                map.end()
            }
        }

        let mut state = serializer.serialize_struct("TraceStep", 5)?;
        state.serialize_field("action", &self.action)?;
        state.serialize_field("tool", &self.tool)?;
        state.serialize_field("target", &self.target)?;
        state.serialize_field("duration_ms", &(self.duration.as_millis() as u64))?;
        state.serialize_field("metadata", &OrderedMetadata(&self.metadata))?;
        state.end()
    }
}

/// Fluent builder for [`TraceStep`].
#[derive(Debug, Clone)]
pub struct TraceStepBuilder {
    step: TraceStep,
}

impl TraceStepBuilder {
    pub fn target(mut self, target: impl Into<String>) -> Self {
        self.step.target = target.into();
        self
    }

    pub fn duration(mut self, duration: Duration) -> Self {
        self.step.duration = duration;
        self
    }

    /// Append one metadata entry; entries keep insertion order.
    pub fn meta(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.step.metadata.push((key.into(), value.to_string()));
        self
    }

    pub fn build(self) -> TraceStep {
        self.step
    }
}
