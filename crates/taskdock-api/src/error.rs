use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use taskdock_core::{CoreError, RegistryError};
use taskdock_model::{ModelError, TaskHandle};

/// Errors surfaced at the tool boundary.
///
/// Every variant renders as a structured `{"success": false, ...}` body.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("service unavailable: {0}")]
    Unavailable(String),

    #[error("task {task_id} did not finish: {message}")]
    Timeout { task_id: TaskHandle, message: String },

    #[error("task {task_id} failed: {message}")]
    RemoteFailure { task_id: TaskHandle, message: String },

    #[error("{kind} failed: {message}")]
    Failed { kind: &'static str, message: String },

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Machine-readable kind, echoed in the `error` field.
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::InvalidRequest(_) => "invalid_request",
            ApiError::NotFound(_) => "not_found",
            ApiError::Unavailable(_) => "backend_unavailable",
            ApiError::Timeout { .. } => "timeout",
            ApiError::RemoteFailure { .. } => "remote_failure",
            ApiError::Failed { kind, .. } => *kind,
            ApiError::Internal(_) => "internal",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            ApiError::RemoteFailure { .. } => StatusCode::BAD_GATEWAY,
            ApiError::Failed { .. } | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Handle of the invocation the error refers to, if one was already submitted.
    pub fn task_id(&self) -> Option<&TaskHandle> {
        match self {
            ApiError::Timeout { task_id, .. } | ApiError::RemoteFailure { task_id, .. } => {
                Some(task_id)
            }
            _ => None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut body = json!({
            "success": false,
            "error": self.kind(),
            "message": self.to_string(),
        });
        if let Some(id) = self.task_id() {
            body["task_id"] = json!(id);
        }
        (self.status(), Json(body)).into_response()
    }
}

impl From<RegistryError> for ApiError {
    fn from(e: RegistryError) -> Self {
        match e {
            RegistryError::NotFound(name) => ApiError::NotFound(format!("task '{name}'")),
            RegistryError::Invalid(msg) => ApiError::InvalidRequest(msg),
            RegistryError::Unavailable(msg) => ApiError::Unavailable(msg),
            RegistryError::Corrupt(msg) => ApiError::Internal(msg),
        }
    }
}

impl From<CoreError> for ApiError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::NotFound(msg) => ApiError::NotFound(msg),
            CoreError::Validation(msg) => ApiError::InvalidRequest(msg),
            CoreError::BackendUnavailable(msg) => ApiError::Unavailable(msg),
            CoreError::Submission { .. } => ApiError::Unavailable(e.to_string()),
            CoreError::RemoteFailure {
                handle, message, ..
            } => ApiError::RemoteFailure {
                task_id: handle,
                message,
            },
            CoreError::Timeout {
                ref handle,
                after_ms,
                ..
            } => ApiError::Timeout {
                task_id: handle.clone(),
                message: format!("no result after {after_ms}ms, query it later"),
            },
            CoreError::Build(_) | CoreError::Launch(_) => ApiError::Failed {
                kind: e.kind(),
                message: e.to_string(),
            },
            CoreError::Registry(inner) => inner.into(),
        }
    }
}

impl From<ModelError> for ApiError {
    fn from(e: ModelError) -> Self {
        ApiError::InvalidRequest(e.to_string())
    }
}
