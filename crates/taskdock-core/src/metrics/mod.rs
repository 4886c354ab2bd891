//! Metrics collection abstraction.
//!
//! Backends (prometheus, ...) implement [`MetricsBackend`] and are handed to the
//! components as a [`MetricsHandle`].
mod backend;
pub use backend::{DispatchMode, MetricsBackend, MetricsHandle, Outcome};

mod noop;
pub use noop::NoOpMetrics;

use std::sync::Arc;

/// Create a no-op metrics handle.
#[inline]
pub fn noop_metrics() -> MetricsHandle {
    Arc::new(NoOpMetrics)
}
