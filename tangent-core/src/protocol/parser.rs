//! Parsing of tool invocation requests from heterogeneous provider shapes.
//!
//! Shapes are tried in a fixed order: OpenAI-style `choices` first, the
//! native `candidates` form second, bare part lists third, and text-embedded
//! markers last. The first shape that matches contributes all requests.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

use crate::tools::types::ToolCallRequest;

static SECTION_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)<\|tool_calls_section_begin\|>(.*?)<\|tool_calls_section_end\|>")
        .expect("valid section pattern")
});

static CALL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)<\|tool_call_begin\|>(.*?)<\|tool_call_end\|>")
        .expect("valid call pattern")
});

static XML_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)<function_call\s+name="([^"]+)"\s*>([^<]*)</function_call>"#)
        .expect("valid xml pattern")
});

static FENCED_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)```function_call\s*\nname:\s*([^\n]+)\narguments:\s*([^`]*?)```")
        .expect("valid fenced pattern")
});

fn name_hash(name: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    name.hash(&mut hasher);
    hasher.finish() % 10_000
}

fn timestamp() -> String {
    Utc::now().format("%Y%m%d_%H%M%S").to_string()
}

/// Id for a native-shape call, which carries none on the wire.
fn synthesize_call_id(name: &str) -> String {
    format!("call_{}_{:04}", timestamp(), name_hash(name))
}

fn sequential_call_id(index: usize) -> String {
    format!("call_{}_{:04}", timestamp(), index)
}

/// Decode an OpenAI-style `arguments` string.
///
/// An empty string means "no arguments"; anything that fails to decode is
/// preserved as `Value::Null` so validation rejects the call instead of
/// silently executing it with empty arguments.
pub(crate) fn decode_arguments(raw: &str) -> Value {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Value::Object(Map::new());
    }
    serde_json::from_str(trimmed).unwrap_or(Value::Null)
}

/// Extract every tool invocation from an accumulated provider response.
pub fn parse_function_calls(response: &Value) -> Vec<ToolCallRequest> {
    if let Some(choices) = response.get("choices").and_then(Value::as_array) {
        return parse_openai_choices(choices);
    }

    if let Some(candidates) = response.get("candidates").and_then(Value::as_array) {
        let mut requests = Vec::new();
        for candidate in candidates {
            if let Some(parts) = candidate
                .get("content")
                .and_then(|content| content.get("parts"))
                .and_then(Value::as_array)
            {
                requests.extend(parse_native_parts(parts));
            }
        }
        return requests;
    }

    if let Some(parts) = response.get("parts").and_then(Value::as_array) {
        return parse_native_parts(parts);
    }

    if let Some(text) = response.as_str() {
        return parse_text_function_calls(text);
    }

    Vec::new()
}

fn parse_openai_choices(choices: &[Value]) -> Vec<ToolCallRequest> {
    let mut requests = Vec::new();
    for choice in choices {
        let Some(tool_calls) = choice
            .get("message")
            .and_then(|message| message.get("tool_calls"))
            .and_then(Value::as_array)
        else {
            continue;
        };
        for tool_call in tool_calls {
            if let Some(request) = parse_openai_tool_call(tool_call) {
                requests.push(request);
            }
        }
    }
    requests
}

/// Parse one `{id, type: "function", function: {name, arguments}}` entry.
pub fn parse_openai_tool_call(tool_call: &Value) -> Option<ToolCallRequest> {
    let function = tool_call.get("function")?;
    let name = function.get("name").and_then(Value::as_str)?;
    if name.is_empty() {
        return None;
    }

    let call_id = tool_call
        .get("id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| synthesize_call_id(name));

    let args = match function.get("arguments") {
        Some(Value::String(raw)) => decode_arguments(raw),
        Some(value) if value.is_object() => value.clone(),
        Some(Value::Null) | None => Value::Object(Map::new()),
        Some(_) => Value::Null,
    };

    Some(ToolCallRequest::new(call_id, name, args))
}

fn parse_native_parts(parts: &[Value]) -> Vec<ToolCallRequest> {
    parts
        .iter()
        .filter_map(|part| part.get("function_call"))
        .filter_map(parse_native_function_call)
        .collect()
}

/// Parse one native `{name, args}` function call, synthesizing a call id.
pub fn parse_native_function_call(function_call: &Value) -> Option<ToolCallRequest> {
    let name = function_call.get("name").and_then(Value::as_str)?;
    if name.is_empty() {
        return None;
    }

    let call_id = function_call
        .get("id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| synthesize_call_id(name));

    let args = match function_call.get("args") {
        Some(value) if value.is_object() => value.clone(),
        Some(Value::Null) | None => Value::Object(Map::new()),
        Some(_) => Value::Null,
    };

    Some(ToolCallRequest::new(call_id, name, args))
}

/// Extract tool invocations embedded in assistant text.
///
/// Three forms are recognized: marker-token sections, XML-style
/// `<function_call>` elements, and fenced ```function_call blocks.
pub fn parse_text_function_calls(text: &str) -> Vec<ToolCallRequest> {
    let mut requests = Vec::new();

    for section in SECTION_PATTERN.captures_iter(text) {
        let body = section.get(1).map(|m| m.as_str()).unwrap_or_default();
        for call in CALL_PATTERN.captures_iter(body) {
            let payload = call.get(1).map(|m| m.as_str().trim()).unwrap_or_default();
            let Ok(value) = serde_json::from_str::<Value>(payload) else {
                continue;
            };
            let Some(name) = value.get("name").and_then(Value::as_str) else {
                continue;
            };
            let args = match value.get("arguments") {
                Some(args) if args.is_object() => args.clone(),
                Some(Value::String(raw)) => decode_arguments(raw),
                _ => Value::Object(Map::new()),
            };
            requests.push(ToolCallRequest::new(
                sequential_call_id(requests.len()),
                name,
                args,
            ));
        }
    }

    for capture in XML_PATTERN.captures_iter(text) {
        let name = capture.get(1).map(|m| m.as_str()).unwrap_or_default();
        let raw_args = capture.get(2).map(|m| m.as_str()).unwrap_or_default();
        requests.push(ToolCallRequest::new(
            sequential_call_id(requests.len()),
            name,
            decode_arguments(raw_args),
        ));
    }

    for capture in FENCED_PATTERN.captures_iter(text) {
        let name = capture
            .get(1)
            .map(|m| m.as_str().trim())
            .unwrap_or_default();
        let raw_args = capture.get(2).map(|m| m.as_str()).unwrap_or_default();
        requests.push(ToolCallRequest::new(
            sequential_call_id(requests.len()),
            name,
            decode_arguments(raw_args),
        ));
    }

    requests
}
