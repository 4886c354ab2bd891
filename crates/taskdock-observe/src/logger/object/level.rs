use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

use crate::logger::error::LoggerError;

/// Validated `EnvFilter` expression (`info`, `taskdock_core=debug,warn`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LoggerLevel(String);

impl LoggerLevel {
    pub fn new(expr: impl Into<String>) -> Result<Self, LoggerError> {
        Self::try_from(expr.into())
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Build the filter. Construction already validated the expression, so the
    /// `info` fallback is never reached in practice.
    pub fn to_env_filter(&self) -> EnvFilter {
        EnvFilter::try_new(&self.0).unwrap_or_else(|_| EnvFilter::new("info"))
    }
}

impl Default for LoggerLevel {
    fn default() -> Self {
        Self("info".to_string())
    }
}

impl TryFrom<String> for LoggerLevel {
    type Error = LoggerError;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        let expr = s.trim();
        if expr.is_empty() {
            return Err(LoggerError::InvalidLevel("empty filter".into()));
        }
        EnvFilter::try_new(expr)
            .map(|_| LoggerLevel(expr.to_string()))
            .map_err(|e| LoggerError::InvalidLevel(format!("{expr}: {e}")))
    }
}

impl FromStr for LoggerLevel {
    type Err = LoggerError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::try_from(s.to_string())
    }
}

impl From<LoggerLevel> for String {
    fn from(l: LoggerLevel) -> Self {
        l.0
    }
}

impl fmt::Display for LoggerLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
