//! Shared stubs for integration tests: a scripted content generator and a
//! small set of in-memory tools.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;
use futures::stream;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

use tangent_core::core::agent::confirmation::ConfirmationHandler;
use tangent_core::llm::{
    ContentGenerator, FinishReason, GenerateRequest, ProviderError, ProviderEvent,
    ProviderEventStream, ProviderKind,
};
use tangent_core::tools::builtins::register_builtin_tools;
use tangent_core::{
    ConfirmationDetails, ConfirmationOutcome, ProgressSink, Tool, ToolKind, ToolRegistry,
    ToolResult, ToolSource,
};

pub use tangent_core::ToolCallRequest;

/// Yields one scripted event sequence per `generate` call. When the script
/// runs out, further turns finish immediately with no calls.
pub struct ScriptedGenerator {
    kind: ProviderKind,
    turns: Mutex<Vec<Vec<ProviderEvent>>>,
    pub requests_seen: Mutex<Vec<GenerateRequest>>,
}

impl ScriptedGenerator {
    pub fn new(kind: ProviderKind, mut turns: Vec<Vec<ProviderEvent>>) -> Self {
        turns.reverse();
        Self {
            kind,
            turns: Mutex::new(turns),
            requests_seen: Mutex::new(Vec::new()),
        }
    }

    /// A turn that emits text and finishes without calls.
    pub fn text_turn(text: &str) -> Vec<ProviderEvent> {
        vec![
            ProviderEvent::TextChunk(text.to_string()),
            ProviderEvent::Finish(FinishReason::Stop),
        ]
    }

    /// A turn requesting the given calls, with optional leading text.
    pub fn call_turn(text: Option<&str>, calls: Vec<ToolCallRequest>) -> Vec<ProviderEvent> {
        let mut events = Vec::new();
        if let Some(text) = text {
            events.push(ProviderEvent::TextChunk(text.to_string()));
        }
        events.extend(calls.into_iter().map(ProviderEvent::FunctionCall));
        events.push(ProviderEvent::Finish(FinishReason::ToolCalls));
        events
    }
}

#[async_trait]
impl ContentGenerator for ScriptedGenerator {
    fn name(&self) -> &str {
        "scripted"
    }

    fn provider_kind(&self) -> ProviderKind {
        self.kind
    }

    async fn generate(
        &self,
        request: GenerateRequest,
    ) -> Result<ProviderEventStream, ProviderError> {
        self.requests_seen
            .lock()
            .expect("requests lock")
            .push(request);
        let events = self
            .turns
            .lock()
            .expect("turns lock")
            .pop()
            .unwrap_or_else(|| vec![ProviderEvent::Finish(FinishReason::Stop)]);
        Ok(Box::pin(stream::iter(events.into_iter().map(Ok))))
    }
}

/// Read-only tool answering with a fixed payload.
pub struct FixedTool {
    pub tool_name: &'static str,
    pub payload: &'static str,
}

#[async_trait]
impl Tool for FixedTool {
    fn name(&self) -> &str {
        self.tool_name
    }

    fn description(&self) -> &str {
        "Returns a canned payload"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "Target path"}
            },
            "required": []
        })
    }

    async fn execute(
        &self,
        _args: Value,
        _cancel: CancellationToken,
        _progress: Option<ProgressSink>,
    ) -> anyhow::Result<ToolResult> {
        Ok(ToolResult::text(self.payload))
    }
}

/// Modifying tool that surfaces shell-style confirmation details.
pub struct DeleteTool;

#[async_trait]
impl Tool for DeleteTool {
    fn name(&self) -> &str {
        "delete_file"
    }

    fn description(&self) -> &str {
        "Deletes a file (stub)"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "File to delete"}
            },
            "required": ["path"]
        })
    }

    fn kind(&self) -> ToolKind {
        ToolKind::Modifying
    }

    async fn should_confirm(
        &self,
        args: &Value,
        _cancel: &CancellationToken,
    ) -> anyhow::Result<Option<ConfirmationDetails>> {
        let path = args.get("path").and_then(Value::as_str).unwrap_or_default();
        Ok(Some(ConfirmationDetails::ExecuteShell {
            command: format!("rm {path}"),
            root_command: "rm".to_string(),
            description: Some("delete a file".to_string()),
        }))
    }

    async fn execute(
        &self,
        args: Value,
        _cancel: CancellationToken,
        _progress: Option<ProgressSink>,
    ) -> anyhow::Result<ToolResult> {
        let path = args.get("path").and_then(Value::as_str).unwrap_or_default();
        Ok(ToolResult::text(format!("deleted {path}")))
    }
}

/// Streams its chunks through the progress sink before finishing.
pub struct StreamingTool {
    pub chunks: Vec<&'static str>,
}

#[async_trait]
impl Tool for StreamingTool {
    fn name(&self) -> &str {
        "streaming"
    }

    fn description(&self) -> &str {
        "Emits incremental output"
    }

    fn parameters_schema(&self) -> Value {
        json!({"type": "object", "properties": {}, "required": []})
    }

    fn can_stream_output(&self) -> bool {
        true
    }

    async fn execute(
        &self,
        _args: Value,
        _cancel: CancellationToken,
        progress: Option<ProgressSink>,
    ) -> anyhow::Result<ToolResult> {
        for chunk in &self.chunks {
            if let Some(sink) = &progress {
                sink.emit(chunk);
            }
        }
        Ok(ToolResult::text(self.chunks.join("")))
    }
}

/// Answers confirmations from a per-tool script; everything else proceeds.
pub struct ScriptedConfirmer {
    pub outcomes: Mutex<Vec<(&'static str, ConfirmationOutcome)>>,
    pub prompted: Mutex<Vec<String>>,
}

impl ScriptedConfirmer {
    pub fn new(outcomes: Vec<(&'static str, ConfirmationOutcome)>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes),
            prompted: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ConfirmationHandler for ScriptedConfirmer {
    async fn confirm(
        &self,
        tool_name: &str,
        _details: &ConfirmationDetails,
    ) -> ConfirmationOutcome {
        self.prompted
            .lock()
            .expect("prompted lock")
            .push(tool_name.to_string());
        let outcomes = self.outcomes.lock().expect("outcomes lock");
        outcomes
            .iter()
            .find(|(name, _)| *name == tool_name)
            .map(|(_, outcome)| *outcome)
            .unwrap_or(ConfirmationOutcome::ProceedOnce)
    }
}

/// Registry with the stub tools plus the real built-ins rooted at `root`.
pub fn stub_registry(root: &std::path::Path) -> Arc<ToolRegistry> {
    let mut registry = ToolRegistry::new();
    register_builtin_tools(&mut registry, root.to_path_buf(), 64 * 1024)
        .expect("register builtins");
    registry
        .register(
            Arc::new(FixedTool {
                tool_name: "fetch_fact",
                payload: "HELLO",
            }),
            ToolSource::Extension,
            false,
        )
        .expect("register fetch_fact");
    registry
        .register(Arc::new(DeleteTool), ToolSource::Extension, false)
        .expect("register delete_file");
    registry
        .register(
            Arc::new(StreamingTool {
                chunks: vec!["chunk-1 ", "chunk-2"],
            }),
            ToolSource::Extension,
            false,
        )
        .expect("register streaming");
    Arc::new(registry)
}
