use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[cfg(feature = "schema")]
use schemars::JsonSchema;

/// Opaque broker-assigned id of one submitted invocation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(JsonSchema))]
#[serde(transparent)]
pub struct TaskHandle(String);

impl TaskHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Fresh random id.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for TaskHandle {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for TaskHandle {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Status of a submitted invocation, as reported by the result backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(JsonSchema))]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResultState {
    Pending,
    Success { value: Value },
    Failure { error: String },
}

impl ResultState {
    #[inline]
    pub fn is_ready(&self) -> bool {
        !matches!(self, ResultState::Pending)
    }

    /// Metric / log label.
    #[inline]
    pub fn as_label(&self) -> &'static str {
        match self {
            ResultState::Pending => "pending",
            ResultState::Success { .. } => "success",
            ResultState::Failure { .. } => "failure",
        }
    }
}

/// Receipt of an asynchronous dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(JsonSchema))]
pub struct Dispatched {
    pub task_id: TaskHandle,
    pub task_name: String,
    pub queue: String,
}

/// Value returned by a synchronous dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(JsonSchema))]
pub struct Completed {
    pub task_id: TaskHandle,
    pub task_name: String,
    pub queue: String,
    pub result: Value,
}
