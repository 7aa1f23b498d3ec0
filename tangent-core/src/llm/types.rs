//! Conversation data model and the streaming event contract.
//!
//! Providers differ in how they shape tool calling on the wire. The
//! conversation here is stored in one internal form; the protocol layer
//! converts to and from provider shapes:
//!
//! - Native-structured providers exchange `function_call` /
//!   `function_response` parts inside role-tagged messages.
//! - OpenAI-style providers exchange `tool_calls` on assistant messages and
//!   one `role: "tool"` message per result.
//! - Text-marker providers embed calls in assistant text between literal
//!   marker tokens.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::tools::types::ToolCallRequest;

/// Which response-shape family a content generator speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// `candidates[].content.parts[].function_call`, responses as
    /// `function_response` parts.
    Native,
    /// `choices[].message.tool_calls[]`, responses as `role: "tool"`
    /// messages.
    OpenAi,
    /// Calls embedded in assistant text between marker tokens.
    TextMarkers,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Model,
    Tool,
}

impl MessageRole {
    /// Role string for OpenAI-style wire messages.
    pub fn as_openai_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Model => "assistant",
            MessageRole::Tool => "tool",
        }
    }

    /// Role string for native-structured wire messages. Tool results ride in
    /// user messages there.
    pub fn as_native_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Model => "model",
            MessageRole::Tool => "user",
        }
    }
}

/// A function call the model placed inside a message part.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCallPart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub args: Value,
}

/// The answer to one function call, correlated by id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionResponsePart {
    pub id: String,
    pub name: String,
    /// `{"output": ...}` or `{"error": ...}`.
    pub response: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Part {
    Text {
        text: String,
    },
    FunctionCall {
        function_call: FunctionCallPart,
    },
    FunctionResponse {
        function_response: FunctionResponsePart,
    },
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Part::Text { text: text.into() }
    }

    pub fn function_call(id: Option<String>, name: impl Into<String>, args: Value) -> Self {
        Part::FunctionCall {
            function_call: FunctionCallPart {
                id,
                name: name.into(),
                args,
            },
        }
    }

    pub fn function_response(
        id: impl Into<String>,
        name: impl Into<String>,
        response: Value,
    ) -> Self {
        Part::FunctionResponse {
            function_response: FunctionResponsePart {
                id: id.into(),
                name: name.into(),
                response,
            },
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Part::Text { text } => Some(text),
            _ => None,
        }
    }

    pub fn as_function_call(&self) -> Option<&FunctionCallPart> {
        match self {
            Part::FunctionCall { function_call } => Some(function_call),
            _ => None,
        }
    }

    pub fn as_function_response(&self) -> Option<&FunctionResponsePart> {
        match self {
            Part::FunctionResponse { function_response } => Some(function_response),
            _ => None,
        }
    }
}

/// One conversation entry: an ordered list of parts under a role.
///
/// Within a sequence sent to a provider, every `function_response` part must
/// be preceded by a `function_call` part with the same id, and the call and
/// response counts between user text messages must agree. The agent runner
/// repairs histories that violate this before each request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub parts: Vec<Part>,
}

impl Message {
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            parts: vec![Part::text(text)],
        }
    }

    pub fn model_text(text: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Model,
            parts: vec![Part::text(text)],
        }
    }

    pub fn user_parts(parts: Vec<Part>) -> Self {
        Self {
            role: MessageRole::User,
            parts,
        }
    }

    pub fn model_parts(parts: Vec<Part>) -> Self {
        Self {
            role: MessageRole::Model,
            parts,
        }
    }

    pub fn tool_parts(parts: Vec<Part>) -> Self {
        Self {
            role: MessageRole::Tool,
            parts,
        }
    }

    /// Concatenated text of all text parts.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(Part::as_text)
            .collect::<Vec<_>>()
            .join("")
    }

    pub fn function_calls(&self) -> Vec<&FunctionCallPart> {
        self.parts.iter().filter_map(Part::as_function_call).collect()
    }

    pub fn function_responses(&self) -> Vec<&FunctionResponsePart> {
        self.parts
            .iter()
            .filter_map(Part::as_function_response)
            .collect()
    }

    pub fn has_function_calls(&self) -> bool {
        self.parts
            .iter()
            .any(|part| part.as_function_call().is_some())
    }
}

/// Why a provider turn ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ToolCalls,
    ContentFilter,
    Other(String),
}

impl FinishReason {
    pub fn from_wire(reason: &str) -> Self {
        match reason {
            "stop" | "STOP" | "end_turn" => Self::Stop,
            "length" | "MAX_TOKENS" | "max_tokens" => Self::Length,
            "tool_calls" | "tool_use" => Self::ToolCalls,
            "content_filter" | "SAFETY" => Self::ContentFilter,
            other => Self::Other(other.to_string()),
        }
    }
}

/// One event in a streamed provider turn.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderEvent {
    TextChunk(String),
    FunctionCall(ToolCallRequest),
    Finish(FinishReason),
}

/// What the orchestrator hands a generator for one turn.
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub messages: Vec<Message>,
    pub system_prompt: Option<String>,
    pub tools: Vec<crate::protocol::schema::FunctionDeclaration>,
    pub model: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parts_serialize_to_wire_shapes() {
        let call = Part::function_call(Some("c1".to_string()), "read_file", json!({"path": "/a"}));
        let value = serde_json::to_value(&call).expect("serialize");
        assert_eq!(value["function_call"]["name"], "read_file");
        assert_eq!(value["function_call"]["args"]["path"], "/a");

        let response = Part::function_response("c1", "read_file", json!({"output": "HELLO"}));
        let value = serde_json::to_value(&response).expect("serialize");
        assert_eq!(value["function_response"]["id"], "c1");
        assert_eq!(value["function_response"]["response"]["output"], "HELLO");
    }

    #[test]
    fn untagged_parts_round_trip() {
        let message = Message::model_parts(vec![
            Part::text("Listing now."),
            Part::function_call(None, "list_directory", json!({"path": "/tmp"})),
        ]);
        let value = serde_json::to_value(&message).expect("serialize");
        let back: Message = serde_json::from_value(value).expect("deserialize");
        assert_eq!(back, message);
        assert!(back.has_function_calls());
        assert_eq!(back.text(), "Listing now.");
    }

    #[test]
    fn role_mapping_follows_provider_conventions() {
        assert_eq!(MessageRole::Model.as_openai_str(), "assistant");
        assert_eq!(MessageRole::Model.as_native_str(), "model");
        assert_eq!(MessageRole::Tool.as_openai_str(), "tool");
        assert_eq!(MessageRole::Tool.as_native_str(), "user");
    }
}
