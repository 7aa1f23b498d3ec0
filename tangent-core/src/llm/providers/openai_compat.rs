//! Streaming client for OpenAI-compatible chat-completions APIs.
//!
//! Covers OpenAI itself and the Kimi/Moonshot family, which serve the same
//! wire shape. Tool-call deltas arrive fragmented across stream chunks and
//! are accumulated per index until the stream finishes.

use async_stream::try_stream;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client as HttpClient;
use serde_json::{Value, json};
use tracing::debug;

use crate::llm::error::ProviderError;
use crate::llm::generator::{ContentGenerator, ProviderEventStream};
use crate::llm::types::{
    FinishReason, GenerateRequest, MessageRole, ProviderEvent, ProviderKind,
};
use crate::protocol::parser::decode_arguments;
use crate::protocol::schema::openai_tool_config;
use crate::tools::types::ToolCallRequest;

/// Accumulates one tool call from streamed deltas.
#[derive(Default, Clone)]
struct ToolCallBuilder {
    id: Option<String>,
    name: String,
    arguments: String,
}

impl ToolCallBuilder {
    fn apply(&mut self, delta: &Value) {
        if let Some(id) = delta.get("id").and_then(Value::as_str) {
            if !id.is_empty() {
                self.id = Some(id.to_string());
            }
        }
        if let Some(function) = delta.get("function") {
            if let Some(name) = function.get("name").and_then(Value::as_str) {
                self.name.push_str(name);
            }
            if let Some(arguments) = function.get("arguments").and_then(Value::as_str) {
                self.arguments.push_str(arguments);
            }
        }
    }

    fn finalize(self, index: usize) -> Option<ToolCallRequest> {
        if self.name.is_empty() {
            return None;
        }
        let call_id = self
            .id
            .unwrap_or_else(|| format!("call_{index}"));
        Some(ToolCallRequest::new(
            call_id,
            self.name,
            decode_arguments(&self.arguments),
        ))
    }
}

fn find_sse_boundary(buffer: &str) -> Option<(usize, usize)> {
    let lf = buffer.find("\n\n").map(|idx| (idx, 2));
    let crlf = buffer.find("\r\n\r\n").map(|idx| (idx, 4));
    match (lf, crlf) {
        (Some(a), Some(b)) => Some(if a.0 <= b.0 { a } else { b }),
        (Some(a), None) => Some(a),
        (None, Some(b)) => Some(b),
        (None, None) => None,
    }
}

fn extract_data_payload(event: &str) -> Option<String> {
    let mut data_lines: Vec<String> = Vec::new();
    for raw_line in event.lines() {
        let line = raw_line.trim_end_matches('\r');
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        if let Some(value) = line.strip_prefix("data:") {
            data_lines.push(value.trim_start().to_string());
        }
    }
    if data_lines.is_empty() {
        None
    } else {
        Some(data_lines.join("\n"))
    }
}

/// Fold one decoded chunk into the accumulation state, returning any text
/// delta to surface.
fn apply_chunk(
    payload: &Value,
    builders: &mut Vec<ToolCallBuilder>,
    finish: &mut Option<FinishReason>,
) -> Option<String> {
    let choice = payload.get("choices")?.get(0)?;

    if let Some(reason) = choice.get("finish_reason").and_then(Value::as_str) {
        *finish = Some(FinishReason::from_wire(reason));
    }

    let delta = choice.get("delta")?;

    if let Some(tool_calls) = delta.get("tool_calls").and_then(Value::as_array) {
        for tool_call in tool_calls {
            let index = tool_call
                .get("index")
                .and_then(Value::as_u64)
                .unwrap_or(0) as usize;
            if builders.len() <= index {
                builders.resize_with(index + 1, ToolCallBuilder::default);
            }
            builders[index].apply(tool_call);
        }
    }

    delta
        .get("content")
        .and_then(Value::as_str)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}

pub struct OpenAiCompatProvider {
    name: String,
    api_key: String,
    http_client: HttpClient,
    base_url: String,
}

impl OpenAiCompatProvider {
    pub fn new(
        name: impl Into<String>,
        api_key: String,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            api_key,
            http_client: HttpClient::new(),
            base_url: base_url.into(),
        }
    }

    fn convert_request(&self, request: &GenerateRequest) -> Result<Value, ProviderError> {
        if request.messages.is_empty() {
            return Err(ProviderError::InvalidRequest(
                "messages cannot be empty".to_string(),
            ));
        }

        let mut messages = Vec::new();
        if let Some(system_prompt) = &request.system_prompt {
            messages.push(json!({"role": "system", "content": system_prompt}));
        }

        for message in &request.messages {
            match message.role {
                MessageRole::User => {
                    messages.push(json!({
                        "role": message.role.as_openai_str(),
                        "content": message.text(),
                    }));
                }
                MessageRole::Model => {
                    let mut wire = json!({
                        "role": message.role.as_openai_str(),
                        "content": message.text(),
                    });
                    let calls = message.function_calls();
                    if !calls.is_empty() {
                        let tool_calls: Vec<Value> = calls
                            .iter()
                            .enumerate()
                            .map(|(index, call)| {
                                json!({
                                    "id": call
                                        .id
                                        .clone()
                                        .unwrap_or_else(|| format!("call_{index}")),
                                    "type": "function",
                                    "function": {
                                        "name": call.name,
                                        "arguments": call.args.to_string(),
                                    }
                                })
                            })
                            .collect();
                        wire["tool_calls"] = Value::Array(tool_calls);
                    }
                    messages.push(wire);
                }
                MessageRole::Tool => {
                    // One wire message per response part, id preserved.
                    for response in message.function_responses() {
                        messages.push(json!({
                            "role": "tool",
                            "tool_call_id": response.id,
                            "name": response.name,
                            "content": response
                                .response
                                .get("output")
                                .or_else(|| response.response.get("error"))
                                .and_then(Value::as_str)
                                .map(str::to_string)
                                .unwrap_or_else(|| response.response.to_string()),
                        }));
                    }
                }
            }
        }

        let mut wire_request = json!({
            "model": request.model,
            "messages": messages,
            "stream": true,
        });
        if !request.tools.is_empty() {
            wire_request["tools"] = openai_tool_config(&request.tools);
        }
        if let Some(temperature) = request.temperature {
            wire_request["temperature"] = json!(temperature);
        }
        if let Some(max_tokens) = request.max_tokens {
            wire_request["max_tokens"] = json!(max_tokens);
        }
        Ok(wire_request)
    }
}

#[async_trait]
impl ContentGenerator for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn provider_kind(&self) -> ProviderKind {
        ProviderKind::OpenAi
    }

    async fn generate(
        &self,
        request: GenerateRequest,
    ) -> Result<ProviderEventStream, ProviderError> {
        let payload = self.convert_request(&request)?;
        let url = format!("{}/chat/completions", self.base_url);
        debug!(provider = %self.name, model = %request.model, "starting provider turn");

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|err| ProviderError::Network(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(match status.as_u16() {
                401 | 403 => ProviderError::Authentication(body),
                429 => ProviderError::RateLimit,
                _ => ProviderError::Provider(format!("HTTP {status}: {body}")),
            });
        }

        let stream = try_stream! {
            let mut body = response.bytes_stream();
            let mut buffer = String::new();
            let mut builders: Vec<ToolCallBuilder> = Vec::new();
            let mut finish: Option<FinishReason> = None;
            let mut done = false;

            while let Some(chunk) = body.next().await {
                let bytes =
                    chunk.map_err(|err| ProviderError::Network(err.to_string()))?;
                buffer.push_str(&String::from_utf8_lossy(&bytes));

                while let Some((split, delimiter)) = find_sse_boundary(&buffer) {
                    let event: String = buffer.drain(..split + delimiter).collect();
                    let Some(payload) = extract_data_payload(&event) else {
                        continue;
                    };
                    if payload.trim() == "[DONE]" {
                        done = true;
                        break;
                    }
                    let value: Value = serde_json::from_str(&payload).map_err(|err| {
                        ProviderError::Protocol(format!(
                            "undecodable stream payload: {err}"
                        ))
                    })?;
                    if let Some(text) = apply_chunk(&value, &mut builders, &mut finish) {
                        yield ProviderEvent::TextChunk(text);
                    }
                }
                if done {
                    break;
                }
            }

            for (index, builder) in builders.drain(..).enumerate() {
                if let Some(request) = builder.finalize(index) {
                    yield ProviderEvent::FunctionCall(request);
                }
            }
            yield ProviderEvent::Finish(finish.unwrap_or(FinishReason::Stop));
        };

        Ok(Box::pin(stream))
    }
}
