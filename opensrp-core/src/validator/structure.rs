//! Structural checks run before anything else looks at an upload

use serde_json::Value;

use super::properties::parse_properties;
use super::rules::parse_rules;
use super::ContentKind;

/// Parse the content as its declared kind; the error text is shown to the uploader
pub(crate) fn check_structure(content: &str, kind: ContentKind) -> Result<Option<Value>, String> {
    match kind {
        ContentKind::Json => match serde_json::from_str::<Value>(content) {
            Ok(value @ Value::Object(_)) => Ok(Some(value)),
            Ok(other) => Err(format!("Expected a JSON object but found {}", json_type(&other))),
            Err(e) => Err(e.to_string()),
        },
        ContentKind::Yaml => parse_rules(content).map(|_| None).map_err(|e| e.to_string()),
        ContentKind::Properties => parse_properties(content)
            .map(|_| None)
            .map_err(|e| e.to_string()),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
