//! Prometheus implementation of [`taskdock_core::MetricsBackend`].
//!
//! ```rust
//! use std::sync::Arc;
//! use taskdock_core::{MetricsHandle, Outcome, MetricsBackend};
//! use taskdock_prometheus::PrometheusMetrics;
//!
//! # fn main() -> Result<(), prometheus::Error> {
//! let metrics = PrometheusMetrics::new()?;
//! metrics.record_deployment(Outcome::Success, None, 1_250);
//! let handle: MetricsHandle = Arc::new(metrics.clone());
//! let body = metrics.encode_text()?;
//! assert!(body.contains("taskdock_deployments_total"));
//! # let _ = handle;
//! # Ok(())
//! # }
//! ```
//!
//! Exported series:
//! - `taskdock_deployments_total{outcome, stage}`
//! - `taskdock_deployment_duration_seconds{outcome}`
//! - `taskdock_dispatches_total{mode, queue, outcome}`
//! - `taskdock_registry_errors_total{operation, error_kind}`
mod backend;
pub use backend::PrometheusMetrics;

pub use prometheus::{Encoder, Registry, TextEncoder};
