use taskdock_model::Stage;

use crate::metrics::backend::{DispatchMode, MetricsBackend, Outcome};

/// Metrics backend that records nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpMetrics;

impl MetricsBackend for NoOpMetrics {
    #[inline(always)]
    fn record_deployment(&self, _: Outcome, _: Option<Stage>, _: u64) {}

    #[inline(always)]
    fn record_dispatch(&self, _: DispatchMode, _: &str, _: Outcome) {}

    #[inline(always)]
    fn record_registry_error(&self, _: &str, _: &str) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_metrics_is_zero_size() {
        assert_eq!(std::mem::size_of::<NoOpMetrics>(), 0);
    }
}
