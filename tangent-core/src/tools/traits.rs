//! The capability contract every tool implements.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::types::{ConfirmationDetails, ToolKind, ToolResult};

/// Sink for incremental output from a running tool.
///
/// At most one consumer listens on the other side; tools that do not stream
/// never receive a sink.
#[derive(Clone)]
pub struct ProgressSink {
    emit: Arc<dyn Fn(&str) + Send + Sync>,
}

impl ProgressSink {
    pub fn new(emit: impl Fn(&str) + Send + Sync + 'static) -> Self {
        Self {
            emit: Arc::new(emit),
        }
    }

    pub fn emit(&self, chunk: &str) {
        (self.emit)(chunk);
    }
}

impl std::fmt::Debug for ProgressSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ProgressSink")
    }
}

/// An action the model may invoke.
///
/// Implementations are constructed once at registry build time and shared
/// immutably afterwards. `validate` must stay pure; `should_confirm` may do
/// cheap I/O to build its details; `execute` is the only operation allowed to
/// block or cause side effects, and it must observe the cancellation token.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Stable unique identifier, the name the model calls.
    fn name(&self) -> &str;

    fn display_name(&self) -> &str {
        self.name()
    }

    /// Free-text description handed to the model.
    fn description(&self) -> &str;

    /// JSON Schema object describing the accepted arguments.
    fn parameters_schema(&self) -> Value;

    fn kind(&self) -> ToolKind {
        ToolKind::ReadOnly
    }

    /// Whether `execute` emits incremental output through a [`ProgressSink`].
    fn can_stream_output(&self) -> bool {
        false
    }

    /// Pure argument check. Returns a human-readable failure, or `None` when
    /// the arguments are acceptable.
    fn validate(&self, _args: &Value) -> Option<String> {
        None
    }

    /// Decide whether interactive consent is needed for these arguments.
    ///
    /// The default follows the tool kind: read-only tools run unprompted,
    /// modifying tools ask with a generic description.
    async fn should_confirm(
        &self,
        _args: &Value,
        _cancel: &CancellationToken,
    ) -> Result<Option<ConfirmationDetails>> {
        match self.kind() {
            ToolKind::ReadOnly => Ok(None),
            ToolKind::Modifying => Ok(Some(ConfirmationDetails::Generic {
                kind: "modify".to_string(),
                description: Some(format!("Run {}", self.display_name())),
                urls: None,
                file_path: None,
            })),
        }
    }

    /// Perform the action. Must return promptly once `cancel` fires.
    async fn execute(
        &self,
        args: Value,
        cancel: CancellationToken,
        progress: Option<ProgressSink>,
    ) -> Result<ToolResult>;
}
