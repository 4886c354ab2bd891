use std::time::Duration;

use serde::{Deserialize, Serialize};

use taskdock_model::{DEFAULT_APP_NAMESPACE, DEFAULT_QUEUE};

/// Dispatch router settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Namespace prepended to task names on the broker.
    pub namespace: String,
    /// Queue used when neither caller nor registry names one.
    pub default_queue: String,
    /// First delay between result polls of a synchronous dispatch.
    pub poll_initial_ms: u64,
    /// Upper bound of the poll delay; the delay doubles until it gets here.
    pub poll_max_ms: u64,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_APP_NAMESPACE.to_string(),
            default_queue: DEFAULT_QUEUE.to_string(),
            poll_initial_ms: 50,
            poll_max_ms: 1_000,
        }
    }
}

impl RouterConfig {
    /// Broker name of a task: `<namespace>.<task>`.
    pub fn broker_task_name(&self, task: &str) -> String {
        if self.namespace.is_empty() {
            task.to_string()
        } else {
            format!("{}.{}", self.namespace, task)
        }
    }

    /// Poll delay after `attempt` unsuccessful polls.
    pub fn poll_delay(&self, attempt: u32) -> Duration {
        let first = self.poll_initial_ms.max(1);
        let factor = 1u64.checked_shl(attempt.min(20)).unwrap_or(u64::MAX);
        Duration::from_millis(first.saturating_mul(factor).min(self.poll_max_ms.max(first)))
    }
}
