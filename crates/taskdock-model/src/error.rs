use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("unknown restart policy: {0}")]
    UnknownRestart(String),

    #[error("unknown path layout: {0}")]
    UnknownLayout(String),

    #[error("unknown file kind: {0}")]
    UnknownFileKind(String),

    #[error("unknown deployment stage: {0}")]
    UnknownStage(String),

    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("invalid file content for '{path}': {reason}")]
    InvalidContent { path: String, reason: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid model: {0}")]
    Invalid(String),
}

pub type ModelResult<T> = Result<T, ModelError>;
