//! Conversion of tool results into protocol-correct continuation messages.
//!
//! The id on every emitted response must equal the id the provider assigned
//! to the originating call, and the batch order must be preserved, or the
//! next provider turn is rejected.

use serde_json::{Value, json};

use crate::llm::types::{Message, Part, ProviderKind};
use crate::tools::types::{ResponsePayload, ToolCallResponse};

/// Builds the messages that answer a batch of function calls, in the shape
/// the provider expects.
#[derive(Debug, Clone, Copy)]
pub struct ResponseConverter {
    kind: ProviderKind,
}

impl ResponseConverter {
    pub fn new(kind: ProviderKind) -> Self {
        Self { kind }
    }

    pub fn kind(&self) -> ProviderKind {
        self.kind
    }

    /// The `{"output": ...}` / `{"error": ...}` body for one response.
    fn response_body(payload: &ResponsePayload) -> Value {
        match payload {
            ResponsePayload::Output(text) => json!({ "output": text }),
            ResponsePayload::Error(text) => json!({ "error": text }),
        }
    }

    /// One `function_response` part, used by native-structured providers.
    pub fn response_part(response: &ToolCallResponse) -> Part {
        Part::function_response(
            response.call_id.clone(),
            response.name.clone(),
            Self::response_body(&response.payload),
        )
    }

    /// Convert a completed batch into history messages.
    ///
    /// Native-structured providers get a single user message whose parts
    /// match the batch in cardinality and order. OpenAI-style providers
    /// (including text-marker models served over OpenAI-compatible APIs) get
    /// one `role: tool` message per call, in batch order.
    pub fn convert_batch(&self, responses: &[ToolCallResponse]) -> Vec<Message> {
        match self.kind {
            ProviderKind::Native => {
                let parts = responses.iter().map(Self::response_part).collect();
                vec![Message::user_parts(parts)]
            }
            ProviderKind::OpenAi | ProviderKind::TextMarkers => responses
                .iter()
                .map(|response| Message::tool_parts(vec![Self::response_part(response)]))
                .collect(),
        }
    }

    /// A synthesized response for a call that never completed, used when
    /// repairing history after an interrupted batch.
    pub fn synthesize_cancelled(&self, call_id: &str, name: &str) -> ToolCallResponse {
        ToolCallResponse {
            call_id: call_id.to_string(),
            name: name.to_string(),
            payload: ResponsePayload::Error("cancelled".to_string()),
            error_kind: Some(crate::tools::types::ToolErrorKind::Cancelled),
            display_content: None,
        }
    }
}
