//! Required-field retention against validator artifacts
//!
//! A validator artifact lists form fields an administrator has locked:
//!
//! ```json
//! {"cannot_remove": {"title": "Fields you cannot remove", "fields": ["first_name", "dob"]}}
//! ```
//!
//! A field counts as present when some object anywhere in the uploaded form
//! carries it as its `"key"`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeSet, HashSet};

/// Parsed validator artifact
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WidgetValidatorDefinition {
    #[serde(default)]
    pub cannot_remove: CannotRemove,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CannotRemove {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub fields: Vec<String>,
}

impl WidgetValidatorDefinition {
    pub fn from_json(content: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(content)
    }

    /// Locked fields the form no longer declares
    pub fn missing_fields(&self, form: &Value) -> BTreeSet<String> {
        let present = widget_keys(form);
        self.cannot_remove
            .fields
            .iter()
            .filter(|field| !present.contains(field.as_str()))
            .cloned()
            .collect()
    }
}

/// Every `"key"` string value in the tree
pub fn widget_keys(form: &Value) -> HashSet<&str> {
    let mut keys = HashSet::new();
    let mut pending = vec![form];
    while let Some(value) = pending.pop() {
        match value {
            Value::Object(map) => {
                if let Some(Value::String(key)) = map.get("key") {
                    keys.insert(key.as_str());
                }
                pending.extend(map.values());
            }
            Value::Array(items) => pending.extend(items.iter()),
            _ => {}
        }
    }
    keys
}
