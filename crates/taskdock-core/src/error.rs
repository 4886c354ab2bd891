use thiserror::Error;

use taskdock_model::TaskHandle;

use crate::registry::RegistryError;

/// Error taxonomy shared by the registry, the dispatch router and the deployment pipeline.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("build failed: {0}")]
    Build(String),

    #[error("launch failed: {0}")]
    Launch(String),

    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("failed to submit '{task}': {message}")]
    Submission { task: String, message: String },

    #[error("task '{task}' ({handle}) failed remotely: {message}")]
    RemoteFailure {
        task: String,
        handle: TaskHandle,
        message: String,
    },

    #[error("timed out after {after_ms}ms waiting for '{task}' ({handle})")]
    Timeout {
        task: String,
        handle: TaskHandle,
        after_ms: u64,
    },

    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),
}

impl CoreError {
    /// Short machine-readable kind, used in API payloads and metric labels.
    pub fn kind(&self) -> &'static str {
        match self {
            CoreError::NotFound(_) => "not_found",
            CoreError::Validation(_) => "validation",
            CoreError::Build(_) => "build",
            CoreError::Launch(_) => "launch",
            CoreError::BackendUnavailable(_) => "backend_unavailable",
            CoreError::Submission { .. } => "submission",
            CoreError::RemoteFailure { .. } => "remote_failure",
            CoreError::Timeout { .. } => "timeout",
            CoreError::Registry(e) => e.kind(),
        }
    }
}
