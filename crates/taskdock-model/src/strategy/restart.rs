use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize, Serializer};

#[cfg(feature = "schema")]
use schemars::JsonSchema;

use crate::error::{ModelError, ModelResult};

/// Restart policy handed to the container runtime for a launched worker.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "schema", derive(JsonSchema))]
pub enum RestartPolicy {
    No,
    Always,
    OnFailure { max_retries: Option<u32> },
    UnlessStopped,
}

impl Default for RestartPolicy {
    fn default() -> Self {
        RestartPolicy::OnFailure { max_retries: None }
    }
}

impl RestartPolicy {
    /// Value of the runtime's `--restart` flag.
    pub fn to_runtime_arg(&self) -> String {
        match self {
            RestartPolicy::No => "no".to_string(),
            RestartPolicy::Always => "always".to_string(),
            RestartPolicy::OnFailure { max_retries: None } => "on-failure".to_string(),
            RestartPolicy::OnFailure {
                max_retries: Some(n),
            } => format!("on-failure:{n}"),
            RestartPolicy::UnlessStopped => "unless-stopped".to_string(),
        }
    }
}

impl FromStr for RestartPolicy {
    type Err = ModelError;
    fn from_str(s: &str) -> ModelResult<Self> {
        let norm = s.trim().to_ascii_lowercase();
        if let Some(n) = norm.strip_prefix("on-failure:") {
            let max = n
                .parse::<u32>()
                .map_err(|_| ModelError::UnknownRestart(norm.clone()))?;
            return Ok(RestartPolicy::OnFailure {
                max_retries: Some(max),
            });
        }
        match norm.as_str() {
            "no" | "never" | "" => Ok(RestartPolicy::No),
            "always" => Ok(RestartPolicy::Always),
            "on-failure" | "failure" => Ok(RestartPolicy::OnFailure { max_retries: None }),
            "unless-stopped" => Ok(RestartPolicy::UnlessStopped),
            other => Err(ModelError::UnknownRestart(other.to_string())),
        }
    }
}

impl fmt::Display for RestartPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_runtime_arg())
    }
}

impl Serialize for RestartPolicy {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_runtime_arg())
    }
}

impl<'de> Deserialize<'de> for RestartPolicy {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_str(&s).map_err(serde::de::Error::custom)
    }
}
