//! Function-declaration export and provider-specific wrappers.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;

/// Provider-agnostic description of one callable function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDeclaration {
    pub name: String,
    pub description: String,
    /// JSON Schema object with `type: "object"`, `properties`, `required`.
    pub parameters: Value,
}

#[derive(Debug, Error, PartialEq)]
pub enum SchemaError {
    #[error("declaration is missing required field '{0}'")]
    MissingField(&'static str),
    #[error("parameters must be an object schema, got type '{0}'")]
    ParametersNotObject(String),
    #[error("required property '{0}' is not declared in properties")]
    UnknownRequiredProperty(String),
}

/// Wrap declarations the way native-structured providers expect:
/// one tool object carrying the whole declaration array.
pub fn native_tool_config(declarations: &[FunctionDeclaration]) -> Value {
    json!([{ "function_declarations": declarations }])
}

/// Wrap declarations the way OpenAI-style providers expect:
/// one `{type: "function", function: {...}}` entry per declaration.
pub fn openai_tool_config(declarations: &[FunctionDeclaration]) -> Value {
    let entries: Vec<Value> = declarations
        .iter()
        .map(|declaration| {
            json!({
                "type": "function",
                "function": declaration,
            })
        })
        .collect();
    Value::Array(entries)
}

/// Check that an emitted declaration satisfies the schema contract.
pub fn validate_declaration(declaration: &Value) -> Result<(), SchemaError> {
    for field in ["name", "description", "parameters"] {
        if declaration.get(field).is_none() {
            return Err(SchemaError::MissingField(match field {
                "name" => "name",
                "description" => "description",
                _ => "parameters",
            }));
        }
    }

    let parameters = &declaration["parameters"];
    let schema_type = parameters
        .get("type")
        .and_then(Value::as_str)
        .unwrap_or("missing");
    if schema_type != "object" {
        return Err(SchemaError::ParametersNotObject(schema_type.to_string()));
    }

    if let Some(required) = parameters.get("required").and_then(Value::as_array) {
        let properties = parameters.get("properties").and_then(Value::as_object);
        for entry in required {
            let Some(property) = entry.as_str() else {
                continue;
            };
            let declared = properties
                .map(|map| map.contains_key(property))
                .unwrap_or(false);
            if !declared {
                return Err(SchemaError::UnknownRequiredProperty(property.to_string()));
            }
        }
    }

    Ok(())
}
