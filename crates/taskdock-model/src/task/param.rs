use serde::{Deserialize, Serialize};

#[cfg(feature = "schema")]
use schemars::JsonSchema;

use crate::Flag;

/// One declared parameter of a task.
///
/// Stored inside the descriptor hash as part of a JSON array:
/// `{"name": "...", "type": "...", "required": true, "description": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(JsonSchema))]
pub struct ParamSpec {
    pub name: String,
    #[serde(rename = "type", default = "default_type")]
    pub type_label: String,
    #[serde(default)]
    pub required: Flag,
    #[serde(default)]
    pub description: String,
}

fn default_type() -> String {
    "Any".to_string()
}

impl ParamSpec {
    /// Required parameter with the given type label.
    pub fn new(name: impl Into<String>, type_label: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_label: type_label.into(),
            required: Flag::enabled(),
            description: String::new(),
        }
    }

    pub fn optional(mut self) -> Self {
        self.required = Flag::disabled();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    #[inline]
    pub fn is_required(&self) -> bool {
        self.required.is_enabled()
    }
}

/// Encode a parameter list into the blob stored in the `parameters` hash field.
pub fn encode_params(params: &[ParamSpec]) -> String {
    serde_json::to_string(params).unwrap_or_else(|_| "[]".to_string())
}

/// Decode the `parameters` hash field.
///
/// Unreadable blobs decode to an empty list so one bad record does not hide the rest.
pub fn decode_params(raw: &str) -> Vec<ParamSpec> {
    if raw.trim().is_empty() {
        return Vec::new();
    }
    serde_json::from_str(raw).unwrap_or_default()
}
