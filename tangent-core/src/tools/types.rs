//! Shared types for the tool-calling lifecycle.

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::traits::Tool;

/// Whether a tool only inspects state or may change it.
///
/// The kind drives the default confirmation policy: read-only tools run
/// without asking, modifying tools surface a generic confirmation unless they
/// provide richer details themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    ReadOnly,
    Modifying,
}

/// A single tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    /// Correlates the call with its response; unique within one turn.
    pub call_id: String,
    pub name: String,
    /// Argument map. `Value::Null` marks arguments the parser could not
    /// decode, which the scheduler rejects before execution.
    pub args: Value,
}

impl ToolCallRequest {
    pub fn new(
        call_id: impl Into<String>,
        name: impl Into<String>,
        args: Value,
    ) -> Self {
        Self {
            call_id: call_id.into(),
            name: name.into(),
            args,
        }
    }
}

/// Result of a tool execution, as reported by the tool itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// Content fed back to the model. May be a plain string or structured
    /// JSON; the response converter stringifies structured values.
    pub llm_content: Value,
    /// Optional human-readable rendering for the terminal.
    pub display_content: Option<String>,
    pub success: bool,
    pub error_kind: Option<ToolErrorKind>,
}

impl ToolResult {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            llm_content: Value::String(content.into()),
            display_content: None,
            success: true,
            error_kind: None,
        }
    }

    pub fn structured(content: Value) -> Self {
        Self {
            llm_content: content,
            display_content: None,
            success: true,
            error_kind: None,
        }
    }

    pub fn failure(message: impl Into<String>, kind: ToolErrorKind) -> Self {
        Self {
            llm_content: Value::String(message.into()),
            display_content: None,
            success: false,
            error_kind: Some(kind),
        }
    }

    pub fn with_display(mut self, display: impl Into<String>) -> Self {
        self.display_content = Some(display.into());
        self
    }

    /// The model-facing content as a string.
    pub fn llm_content_string(&self) -> String {
        match &self.llm_content {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        }
    }
}

/// Classification of per-call failures, mirrored into the error responses
/// the model sees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolErrorKind {
    UnknownTool,
    InvalidArgs,
    ConfirmationCancelled,
    ToolFailed,
    Cancelled,
}

/// Details a tool surfaces when it wants user consent before running.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConfirmationDetails {
    ExecuteShell {
        command: String,
        root_command: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
    EditFile {
        file_path: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        file_name: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        file_diff: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
    Generic {
        kind: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        urls: Option<Vec<String>>,
        #[serde(skip_serializing_if = "Option::is_none")]
        file_path: Option<String>,
    },
}

/// User's answer to a confirmation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmationOutcome {
    ProceedOnce,
    /// Proceed and remember consent for this tool for the rest of the
    /// session. The memory lives in the confirmation layer, not here.
    ProceedAlwaysTool,
    Cancel,
}

/// Lifecycle states of a scheduled call.
///
/// `Success`, `Error` and `Cancelled` are terminal and absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCallStatus {
    Validating,
    AwaitingApproval,
    Scheduled,
    Executing,
    Success,
    Error,
    Cancelled,
}

impl ToolCallStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Error | Self::Cancelled)
    }
}

/// The provider-agnostic payload of a completed call, converted to wire
/// format by the protocol layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponsePayload {
    Output(String),
    Error(String),
}

impl ResponsePayload {
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    pub fn content(&self) -> &str {
        match self {
            Self::Output(text) | Self::Error(text) => text,
        }
    }
}

/// Terminal outcome of one call, correlated by id and ordered like the
/// originating batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallResponse {
    pub call_id: String,
    pub name: String,
    pub payload: ResponsePayload,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ToolErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_content: Option<String>,
}

impl ToolCallResponse {
    pub fn output(
        call_id: impl Into<String>,
        name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            call_id: call_id.into(),
            name: name.into(),
            payload: ResponsePayload::Output(content.into()),
            error_kind: None,
            display_content: None,
        }
    }

    pub fn error(
        call_id: impl Into<String>,
        name: impl Into<String>,
        message: impl Into<String>,
        kind: ToolErrorKind,
    ) -> Self {
        Self {
            call_id: call_id.into(),
            name: name.into(),
            payload: ResponsePayload::Error(message.into()),
            error_kind: Some(kind),
            display_content: None,
        }
    }

    pub fn is_success(&self) -> bool {
        !self.payload.is_error()
    }
}

/// A tool call tracked by the scheduler, from request to terminal state.
#[derive(Clone)]
pub struct ToolCall {
    pub request: ToolCallRequest,
    /// `None` only for calls that failed resolution (unknown tool).
    pub tool: Option<Arc<dyn Tool>>,
    pub status: ToolCallStatus,
    pub response: Option<ToolCallResponse>,
    pub confirmation_details: Option<ConfirmationDetails>,
    pub start_time: Option<Instant>,
    pub duration_ms: Option<u64>,
    pub outcome: Option<ConfirmationOutcome>,
    pub live_output: Option<String>,
}

impl ToolCall {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

impl std::fmt::Debug for ToolCall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolCall")
            .field("request", &self.request)
            .field("status", &self.status)
            .field("response", &self.response)
            .field("confirmation_details", &self.confirmation_details)
            .field("duration_ms", &self.duration_ms)
            .field("outcome", &self.outcome)
            .field("live_output", &self.live_output)
            .finish()
    }
}
