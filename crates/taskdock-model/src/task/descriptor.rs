use serde::{Deserialize, Serialize};

#[cfg(feature = "schema")]
use schemars::JsonSchema;

use crate::{
    DEFAULT_CATEGORY, DEFAULT_QUEUE, DEFAULT_RETURN_TYPE, ParamSpec, Timestamp,
    error::{ModelError, ModelResult},
};

/// Registry record of one invocable task.
///
/// `name` is the primary key and is unique across categories. Timestamps are
/// owned by the registry: whatever a caller puts there is replaced on write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(JsonSchema))]
pub struct TaskDescriptor {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub parameters: Vec<ParamSpec>,
    #[serde(default = "default_return_type")]
    pub return_type: String,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default = "default_queue")]
    pub queue: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<Timestamp>,
}

fn default_return_type() -> String {
    DEFAULT_RETURN_TYPE.to_string()
}

fn default_category() -> String {
    DEFAULT_CATEGORY.to_string()
}

fn default_queue() -> String {
    DEFAULT_QUEUE.to_string()
}

impl TaskDescriptor {
    /// Descriptor with default return type, category and queue.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            parameters: Vec::new(),
            return_type: default_return_type(),
            category: default_category(),
            queue: default_queue(),
            created_at: None,
            last_updated: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_parameter(mut self, param: ParamSpec) -> Self {
        self.parameters.push(param);
        self
    }

    pub fn with_parameters(mut self, params: Vec<ParamSpec>) -> Self {
        self.parameters = params;
        self
    }

    pub fn with_return_type(mut self, return_type: impl Into<String>) -> Self {
        self.return_type = return_type.into();
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn with_queue(mut self, queue: impl Into<String>) -> Self {
        self.queue = queue.into();
        self
    }

    /// Check the fields that end up in store keys.
    ///
    /// Rules:
    /// - `name`, `category` and `queue` are non-empty and contain no whitespace;
    /// - parameter names are non-empty and unique.
    pub fn validate(&self) -> ModelResult<()> {
        check_key_part("name", &self.name)?;
        check_key_part("category", &self.category)?;
        check_key_part("queue", &self.queue)?;

        let mut seen: Vec<&str> = Vec::with_capacity(self.parameters.len());
        for p in &self.parameters {
            if p.name.trim().is_empty() {
                return Err(ModelError::Invalid(format!(
                    "task '{}' has a parameter with an empty name",
                    self.name
                )));
            }
            if seen.contains(&p.name.as_str()) {
                return Err(ModelError::Invalid(format!(
                    "task '{}' declares parameter '{}' twice",
                    self.name, p.name
                )));
            }
            seen.push(&p.name);
        }
        Ok(())
    }
}

pub(crate) fn check_key_part(field: &str, value: &str) -> ModelResult<()> {
    if value.is_empty() {
        return Err(ModelError::Invalid(format!("{field} cannot be empty")));
    }
    if value.chars().any(char::is_whitespace) {
        return Err(ModelError::Invalid(format!(
            "{field} '{value}' cannot contain whitespace"
        )));
    }
    Ok(())
}

/// Task and queue names that end up in paths, image tags and container names.
///
/// Allowed: `[A-Za-z0-9_.-]`, starting with an ASCII letter or digit, which also
/// rules out `.` and `..`.
pub(crate) fn check_resource_name(field: &str, value: &str) -> ModelResult<()> {
    check_key_part(field, value)?;
    let first_ok = value.starts_with(|c: char| c.is_ascii_alphanumeric());
    let rest_ok = value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'));
    if !(first_ok && rest_ok) {
        return Err(ModelError::Invalid(format!(
            "{field} '{value}' may only contain letters, digits, '_', '.' and '-', starting with a letter or digit"
        )));
    }
    Ok(())
}
