use thiserror::Error;

use taskdock_core::CoreError;
use taskdock_model::Stage;

/// Errors of a single container runtime invocation.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("failed to spawn '{program}': {reason}")]
    Spawn { program: String, reason: String },

    #[error("'{command}' timed out after {after_ms}ms")]
    Timeout {
        command: String,
        after_ms: u64,
        /// Whatever the command printed before it was killed.
        output: String,
    },

    #[error("'{command}' exited with {}: {output}", code.map(|c| c.to_string()).unwrap_or_else(|| "signal".into()))]
    Failed {
        command: String,
        code: Option<i32>,
        output: String,
    },

    #[error("unexpected runtime output: {0}")]
    Parse(String),
}

impl RuntimeError {
    /// Captured process output, when there is any.
    pub fn output(&self) -> Option<&str> {
        match self {
            RuntimeError::Failed { output, .. } | RuntimeError::Timeout { output, .. }
                if !output.is_empty() =>
            {
                Some(output)
            }
            _ => None,
        }
    }
}

/// Failure of one deployment stage.
#[derive(Debug, Error)]
#[error("{stage} failed: {message}")]
pub struct StageError {
    pub stage: Stage,
    pub message: String,
    /// Output captured from the runtime, if the stage ran one.
    pub output: Option<String>,
    pub timed_out: bool,
}

impl StageError {
    pub fn new(stage: Stage, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
            output: None,
            timed_out: false,
        }
    }

    pub fn runtime(stage: Stage, err: RuntimeError) -> Self {
        Self {
            stage,
            output: err.output().map(str::to_string),
            timed_out: matches!(err, RuntimeError::Timeout { .. }),
            message: err.to_string(),
        }
    }
}

impl From<StageError> for CoreError {
    fn from(e: StageError) -> Self {
        match e.stage {
            Stage::Materialize | Stage::Validate => CoreError::Validation(e.message),
            Stage::Build => CoreError::Build(e.message),
            Stage::Launch | Stage::HealthCheck => CoreError::Launch(e.message),
        }
    }
}
