//! Events surfaced by the agent loop.

use crate::tools::types::{ToolCallRequest, ToolCallResponse};

/// One event in the finite, non-restartable stream a turn produces.
///
/// Consumers render `Content` as it arrives and observe tool activity
/// through the request/response pairs. Exactly one of `Finished` or `Error`
/// ends the stream.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentEvent {
    /// A chunk of model text, in arrival order.
    Content(String),
    /// A tool call is about to be scheduled.
    ToolCallRequest(ToolCallRequest),
    /// A tool call reached a terminal state.
    ToolCallResponse(ToolCallResponse),
    /// The model produced a turn with no function calls.
    Finished { text: String },
    Error(String),
}

impl AgentEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, AgentEvent::Finished { .. } | AgentEvent::Error(_))
    }
}
