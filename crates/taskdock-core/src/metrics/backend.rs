use std::sync::Arc;

use taskdock_model::Stage;

/// Outcome classification shared by deployments and dispatches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure,
    Timeout,
}

impl Outcome {
    /// Return label value for metrics.
    #[inline]
    pub fn as_label(&self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::Failure => "failure",
            Outcome::Timeout => "timeout",
        }
    }
}

/// How a task invocation was dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchMode {
    Sync,
    Async,
}

impl DispatchMode {
    #[inline]
    pub fn as_label(&self) -> &'static str {
        match self {
            DispatchMode::Sync => "sync",
            DispatchMode::Async => "async",
        }
    }
}

/// Metrics collection interface.
///
/// Implementations are injected into the registry, the router and the deployment pipeline.
pub trait MetricsBackend: Send + Sync + 'static {
    /// Record a finished deployment attempt.
    ///
    /// # Arguments
    /// - `outcome`: success, or how it failed
    /// - `failed_stage`: stage that aborted the pipeline, `None` on success
    /// - `duration_ms`: wall time of the whole pipeline
    fn record_deployment(&self, outcome: Outcome, failed_stage: Option<Stage>, duration_ms: u64);

    /// Record a dispatch.
    ///
    /// For async dispatches the outcome only covers submission.
    fn record_dispatch(&self, mode: DispatchMode, queue: &str, outcome: Outcome);

    /// Record a failed registry operation (not-found lookups are not failures).
    fn record_registry_error(&self, operation: &str, error_kind: &str);
}

/// Shared handle to metrics backend.
pub type MetricsHandle = Arc<dyn MetricsBackend>;
