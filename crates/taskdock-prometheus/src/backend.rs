use std::sync::Arc;

use prometheus::{
    CounterVec, Encoder, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
    proto::MetricFamily,
};

use taskdock_core::{DispatchMode, MetricsBackend, Outcome};
use taskdock_model::Stage;

const NAMESPACE: &str = "taskdock";

/// Stage label of a successful deployment.
const STAGE_NONE: &str = "none";

/// Metrics backend exporting through a prometheus [`Registry`].
///
/// Label values are bounded: outcomes and stages are fixed sets, queues and
/// registry operations come from configuration and code.
#[derive(Clone)]
pub struct PrometheusMetrics {
    deployments: CounterVec,
    deployment_duration: HistogramVec,
    dispatches: CounterVec,
    registry_errors: CounterVec,
    registry: Arc<Registry>,
}

impl PrometheusMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        Self::new_with_registry(Arc::new(Registry::new()))
    }

    pub fn new_with_registry(registry: Arc<Registry>) -> Result<Self, prometheus::Error> {
        let deployments = CounterVec::new(
            Opts::new("deployments_total", "Deployment attempts by outcome and failed stage")
                .namespace(NAMESPACE),
            &["outcome", "stage"],
        )?;
        registry.register(Box::new(deployments.clone()))?;

        let deployment_duration = HistogramVec::new(
            HistogramOpts::new(
                "deployment_duration_seconds",
                "Wall time of a deployment attempt",
            )
            .namespace(NAMESPACE)
            .buckets(vec![0.5, 1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0]),
            &["outcome"],
        )?;
        registry.register(Box::new(deployment_duration.clone()))?;

        let dispatches = CounterVec::new(
            Opts::new("dispatches_total", "Task dispatches by mode, queue and outcome")
                .namespace(NAMESPACE),
            &["mode", "queue", "outcome"],
        )?;
        registry.register(Box::new(dispatches.clone()))?;

        let registry_errors = CounterVec::new(
            Opts::new("registry_errors_total", "Failed task registry operations")
                .namespace(NAMESPACE),
            &["operation", "error_kind"],
        )?;
        registry.register(Box::new(registry_errors.clone()))?;

        Ok(Self {
            deployments,
            deployment_duration,
            dispatches,
            registry_errors,
            registry,
        })
    }

    pub fn gather(&self) -> Vec<MetricFamily> {
        self.registry.gather()
    }

    /// Text exposition format, as served on `/metrics`.
    pub fn encode_text(&self) -> Result<String, prometheus::Error> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.gather(), &mut buf)?;
        String::from_utf8(buf).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }
}

impl MetricsBackend for PrometheusMetrics {
    fn record_deployment(&self, outcome: Outcome, failed_stage: Option<Stage>, duration_ms: u64) {
        let stage = failed_stage.map(|s| s.as_label()).unwrap_or(STAGE_NONE);
        self.deployments
            .with_label_values(&[outcome.as_label(), stage])
            .inc();
        self.deployment_duration
            .with_label_values(&[outcome.as_label()])
            .observe(duration_ms as f64 / 1000.0);
    }

    fn record_dispatch(&self, mode: DispatchMode, queue: &str, outcome: Outcome) {
        self.dispatches
            .with_label_values(&[mode.as_label(), queue, outcome.as_label()])
            .inc();
    }

    fn record_registry_error(&self, operation: &str, error_kind: &str) {
        self.registry_errors
            .with_label_values(&[operation, error_kind])
            .inc();
    }
}
