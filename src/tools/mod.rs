//! Tool dispatch layer
//!
//! Every capability of the engine is exposed as a [`Tool`]: a named,
//! categorized entry point with a typed parameter surface and a uniform
//! result envelope. Execution follows one control flow for all tools:
//! parse and clamp parameters, check readiness (with bounded retry),
//! call the kernel, shape structured output and a human-readable text
//! rendering, and attach a trace step. No tool mutates the graph.
//!
//! Parameter handling: unknown parameters are ignored, missing required
//! parameters fail the invocation naming the parameter, out-of-range
//! values are clamped silently (a debug log is emitted). Scalars accept
//! any convertible encoding, so `"5"` works where an int is declared.

pub mod analyze;
pub mod explore;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::cancel::CancelToken;
use crate::error::EngineError;
use crate::observe::{NoopObserver, ObserverHandle};
use crate::session::AnalysisSession;
use crate::trace::TraceStep;

pub use analyze::register_analyze_tools;
pub use explore::register_explore_tools;

/// Tool categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCategory {
    Exploration,
    Analysis,
}

/// Declared type of a tool parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamType {
    Bool,
    Int,
    Float,
    String,
    Enum,
}

/// Declaration of one tool parameter.
#[derive(Debug, Clone, Serialize)]
pub struct ParamDef {
    #[serde(rename = "type")]
    pub param_type: ParamType,
    pub description: String,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    /// Allowed values for `Enum` parameters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub one_of: Option<Vec<String>>,
}

impl ParamDef {
    pub fn required_string(description: &str) -> Self {
        Self {
            param_type: ParamType::String,
            description: description.to_string(),
            required: true,
            default: None,
            one_of: None,
        }
    }

    pub fn optional_string(description: &str) -> Self {
        Self {
            required: false,
            ..Self::required_string(description)
        }
    }

    pub fn int(description: &str, default: i64) -> Self {
        Self {
            param_type: ParamType::Int,
            description: description.to_string(),
            required: false,
            default: Some(Value::from(default)),
            one_of: None,
        }
    }

    pub fn float(description: &str, default: f64) -> Self {
        Self {
            param_type: ParamType::Float,
            description: description.to_string(),
            required: false,
            default: Some(Value::from(default)),
            one_of: None,
        }
    }

    pub fn bool(description: &str, default: bool) -> Self {
        Self {
            param_type: ParamType::Bool,
            description: description.to_string(),
            required: false,
            default: Some(Value::from(default)),
            one_of: None,
        }
    }

    pub fn one_of(description: &str, allowed: &[&str], default: &str) -> Self {
        Self {
            param_type: ParamType::Enum,
            description: description.to_string(),
            required: false,
            default: Some(Value::from(default)),
            one_of: Some(allowed.iter().map(|s| s.to_string()).collect()),
        }
    }
}

/// Full declaration of a tool.
#[derive(Debug, Clone, Serialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// Parameter declarations, name-sorted for stable serialization.
    pub parameters: BTreeMap<String, ParamDef>,
    /// Scheduling hint; lower runs earlier in suggestion lists.
    pub priority: u8,
    /// Readiness requirements, e.g. `["graph"]`.
    pub requires: Vec<String>,
    pub side_effects: bool,
    pub timeout_secs: u64,
    pub when_to_use: String,
}

/// Uniform result envelope returned by every tool.
#[derive(Debug, Clone, Serialize)]
pub struct ToolResult {
    pub success: bool,
    /// Structured output; `Value::Null` on failure.
    pub output: Value,
    /// Stable line-oriented human rendering of `output`.
    pub output_text: String,
    /// Estimated from `output_text` length / 4.
    pub tokens_used: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_step: Option<TraceStep>,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Shared context for one tool invocation.
#[derive(Clone)]
pub struct ExecutionContext {
    pub token: CancelToken,
    pub observer: ObserverHandle,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self {
            token: CancelToken::new(),
            observer: Arc::new(NoopObserver),
        }
    }

    pub fn with_token(token: CancelToken) -> Self {
        Self {
            token,
            observer: Arc::new(NoopObserver),
        }
    }

    pub fn with_observer(mut self, observer: ObserverHandle) -> Self {
        self.observer = observer;
        self
    }
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::new()
    }
}

/// A uniformly invocable engine capability.
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;
    fn category(&self) -> ToolCategory;
    fn definition(&self) -> ToolDefinition;

    /// Run the tool. Only cancellation escapes as a hard error; every
    /// other failure is reported inside the envelope.
    fn execute(
        &self,
        ctx: &ExecutionContext,
        params: &Map<String, Value>,
    ) -> Result<ToolResult, EngineError>;
}

/// Name-keyed tool table.
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool by value; a later registration under the same
    /// name replaces the earlier one.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|boxed| boxed.as_ref())
    }

    pub fn count(&self) -> usize {
        self.tools.len()
    }

    /// Registered tool names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }
}

/// Register the canonical tool set against one session.
pub fn register_all_tools(registry: &mut ToolRegistry, session: Arc<AnalysisSession>) {
    register_explore_tools(registry, Arc::clone(&session));
    register_analyze_tools(registry, session);
}

// ---------------------------------------------------------------------------
// Parameter extraction
// ---------------------------------------------------------------------------

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Required string parameter; `Err` carries the user-facing message.
pub(crate) fn required_string(params: &Map<String, Value>, name: &str) -> Result<String, String> {
    params
        .get(name)
        .and_then(scalar_to_string)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| format!("missing required parameter '{}'", name))
}

/// Optional string parameter.
pub(crate) fn optional_string(params: &Map<String, Value>, name: &str) -> Option<String> {
    params
        .get(name)
        .and_then(scalar_to_string)
        .filter(|s| !s.is_empty())
}

/// Integer parameter with silent clamping into `[min, max]`.
pub(crate) fn int_param(
    params: &Map<String, Value>,
    name: &str,
    default: i64,
    min: i64,
    max: i64,
) -> i64 {
    let raw = params
        .get(name)
        .and_then(|value| match value {
            Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
            Value::String(s) => s.parse::<i64>().ok(),
            _ => None,
        })
        .unwrap_or(default);
    let clamped = raw.clamp(min, max);
    if clamped != raw {
        debug!(param = name, raw, clamped, "parameter clamped");
    }
    clamped
}

/// Float parameter with silent clamping into `[min, max]`.
pub(crate) fn float_param(
    params: &Map<String, Value>,
    name: &str,
    default: f64,
    min: f64,
    max: f64,
) -> f64 {
    let raw = params
        .get(name)
        .and_then(|value| match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.parse::<f64>().ok(),
            _ => None,
        })
        .unwrap_or(default);
    let clamped = raw.clamp(min, max);
    if clamped != raw {
        debug!(param = name, raw, clamped, "parameter clamped");
    }
    clamped
}

/// Bool parameter; accepts booleans and `"true"` / `"false"`.
pub(crate) fn bool_param(params: &Map<String, Value>, name: &str, default: bool) -> bool {
    params
        .get(name)
        .and_then(|value| match value {
            Value::Bool(b) => Some(*b),
            Value::String(s) => match s.as_str() {
                "true" => Some(true),
                "false" => Some(false),
                _ => None,
            },
            _ => None,
        })
        .unwrap_or(default)
}

/// Enum parameter; out-of-domain values fail naming the parameter.
pub(crate) fn enum_param(
    params: &Map<String, Value>,
    name: &str,
    allowed: &[&str],
    default: &str,
) -> Result<String, String> {
    let value = optional_string(params, name).unwrap_or_else(|| default.to_string());
    if allowed.contains(&value.as_str()) {
        Ok(value)
    } else {
        Err(format!(
            "parameter '{}' must be one of {:?}, got '{}'",
            name, allowed, value
        ))
    }
}

// ---------------------------------------------------------------------------
// Invocation helper
// ---------------------------------------------------------------------------

/// Builder for one invocation's envelope and trace step.
///
/// Tools create it on entry, accumulate metadata during the run, and
/// finish with [`succeed`](Self::succeed) or [`fail`](Self::fail);
/// both record an observer event and a trace step, so every failure
/// path carries its failure mode in the trace.
pub(crate) struct Invocation {
    action: &'static str,
    tool: &'static str,
    target: String,
    started: Instant,
    meta: Vec<(String, String)>,
}

impl Invocation {
    pub fn new(action: &'static str, tool: &'static str) -> Self {
        Self {
            action,
            tool,
            target: String::new(),
            started: Instant::now(),
            meta: Vec::new(),
        }
    }

    pub fn target(mut self, target: impl Into<String>) -> Self {
        self.target = target.into();
        self
    }

    pub fn meta(&mut self, key: impl Into<String>, value: impl ToString) {
        self.meta.push((key.into(), value.to_string()));
    }

    fn trace_step(&self) -> TraceStep {
        let mut builder = TraceStep::builder(self.action, self.tool)
            .target(self.target.clone())
            .duration(self.started.elapsed());
        for (key, value) in &self.meta {
            builder = builder.meta(key, value);
        }
        builder.build()
    }

    pub fn succeed(self, ctx: &ExecutionContext, output: Value, output_text: String) -> ToolResult {
        let duration = self.started.elapsed();
        ctx.observer.record(
            "tool_completed",
            &[
                ("action", self.action.to_string()),
                ("target", self.target.clone()),
                ("duration_ms", duration.as_millis().to_string()),
            ],
        );
        ToolResult {
            success: true,
            tokens_used: output_text.len() / 4,
            output,
            output_text,
            trace_step: Some(self.trace_step()),
            duration_ms: duration.as_millis() as u64,
            error: None,
        }
    }

    pub fn fail(
        mut self,
        ctx: &ExecutionContext,
        failure_mode: &'static str,
        message: String,
    ) -> ToolResult {
        self.meta("failure", failure_mode);
        let duration = self.started.elapsed();
        ctx.observer.record(
            "tool_failed",
            &[
                ("action", self.action.to_string()),
                ("failure", failure_mode.to_string()),
            ],
        );
        ToolResult {
            success: false,
            output: Value::Null,
            output_text: message.clone(),
            tokens_used: message.len() / 4,
            trace_step: Some(self.trace_step()),
            duration_ms: duration.as_millis() as u64,
            error: Some(message),
        }
    }
}
