use std::time::Duration;

use serde::{Deserialize, Serialize};

#[cfg(feature = "schema")]
use schemars::JsonSchema;

/// How the health-check stage probes a freshly launched container.
///
/// The default is one probe with no waiting. A bounded poll keeps probing until the
/// container reports running or `attempts` probes were made, `interval_ms` apart.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(JsonSchema))]
#[serde(default)]
pub struct ProbePolicy {
    pub attempts: u32,
    pub interval_ms: u64,
}

impl Default for ProbePolicy {
    fn default() -> Self {
        Self::single()
    }
}

impl ProbePolicy {
    pub const fn single() -> Self {
        Self {
            attempts: 1,
            interval_ms: 0,
        }
    }

    pub const fn bounded(attempts: u32, interval_ms: u64) -> Self {
        Self {
            attempts,
            interval_ms,
        }
    }

    /// Attempts, never less than one.
    #[inline]
    pub fn attempts(&self) -> u32 {
        self.attempts.max(1)
    }

    #[inline]
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}
