use std::{fmt, path::PathBuf, str::FromStr};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[cfg(feature = "schema")]
use schemars::JsonSchema;

use crate::error::{ModelError, ModelResult};

/// Pipeline stage of a deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(JsonSchema))]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Materialize,
    Validate,
    Build,
    Launch,
    HealthCheck,
}

impl Stage {
    /// Metric label value.
    #[inline]
    pub fn as_label(&self) -> &'static str {
        match self {
            Stage::Materialize => "materialize",
            Stage::Validate => "validate",
            Stage::Build => "build",
            Stage::Launch => "launch",
            Stage::HealthCheck => "health_check",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}

impl FromStr for Stage {
    type Err = ModelError;
    fn from_str(s: &str) -> ModelResult<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "materialize" => Ok(Stage::Materialize),
            "validate" => Ok(Stage::Validate),
            "build" => Ok(Stage::Build),
            "launch" => Ok(Stage::Launch),
            "health_check" | "healthcheck" => Ok(Stage::HealthCheck),
            other => Err(ModelError::UnknownStage(other.to_string())),
        }
    }
}

/// Liveness of a launched container as seen by one probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(JsonSchema))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Liveness {
    Running,
    Stopped,
    #[default]
    Unknown,
}

impl Liveness {
    /// Map a container state string (`running`, `exited`, ...) to liveness.
    pub fn from_state(state: &str) -> Self {
        match state.trim().to_ascii_lowercase().as_str() {
            "running" => Liveness::Running,
            "" => Liveness::Unknown,
            _ => Liveness::Stopped,
        }
    }
}

impl fmt::Display for Liveness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Liveness::Running => "RUNNING",
            Liveness::Stopped => "STOPPED",
            Liveness::Unknown => "UNKNOWN",
        })
    }
}

/// Outcome of one deployment attempt.
///
/// Always returned, successful or not; `failed_stage` and `error` explain a failure
/// and the remaining fields show how far the attempt got.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(JsonSchema))]
pub struct DeploymentResult {
    pub deployment_id: Uuid,
    pub task_name: String,
    pub queue: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_stage: Option<Stage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workdir: Option<PathBuf>,
    /// Materialized paths, relative to `workdir`.
    #[serde(default)]
    pub files: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_id: Option<String>,
    #[serde(default)]
    pub liveness: Liveness,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_log: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub launch_log: Option<String>,
}

impl DeploymentResult {
    /// Empty, not yet successful result for a fresh attempt.
    pub fn begin(deployment_id: Uuid, task_name: &str, queue: &str) -> Self {
        Self {
            deployment_id,
            task_name: task_name.to_string(),
            queue: queue.to_string(),
            success: false,
            failed_stage: None,
            error: None,
            workdir: None,
            files: Vec::new(),
            image: None,
            container_name: None,
            container_id: None,
            liveness: Liveness::Unknown,
            build_log: None,
            launch_log: None,
        }
    }

    /// Mark the attempt as failed at `stage`.
    pub fn fail(mut self, stage: Stage, error: impl Into<String>) -> Self {
        self.success = false;
        self.failed_stage = Some(stage);
        self.error = Some(error.into());
        self
    }

    /// Human readable one-line summary.
    pub fn summary(&self) -> String {
        if self.success {
            format!(
                "task '{}' deployed on queue '{}' as {} ({})",
                self.task_name,
                self.queue,
                self.container_name.as_deref().unwrap_or("?"),
                self.liveness
            )
        } else {
            format!(
                "deployment of '{}' failed at {}: {}",
                self.task_name,
                self.failed_stage.map(|s| s.as_label()).unwrap_or("unknown"),
                self.error.as_deref().unwrap_or("no detail")
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_parses_labels() {
        assert_eq!("health-check".parse::<Stage>().unwrap(), Stage::HealthCheck);
        assert_eq!("BUILD".parse::<Stage>().unwrap(), Stage::Build);
        assert!("deploy".parse::<Stage>().is_err());
    }

    #[test]
    fn liveness_serializes_upper_case() {
        assert_eq!(serde_json::to_string(&Liveness::Running).unwrap(), r#""RUNNING""#);
        assert_eq!(Liveness::from_state("exited"), Liveness::Stopped);
        assert_eq!(Liveness::from_state("Running"), Liveness::Running);
        assert_eq!(Liveness::from_state(""), Liveness::Unknown);
    }

    #[test]
    fn fail_records_stage_and_error() {
        let r = DeploymentResult::begin(Uuid::new_v4(), "resize_image", "images")
            .fail(Stage::Validate, "missing required file(s): Dockerfile");

        assert!(!r.success);
        assert_eq!(r.failed_stage, Some(Stage::Validate));
        assert!(r.summary().contains("failed at validate"), "got: {}", r.summary());
    }

    #[test]
    fn failed_result_json_names_stage() {
        let r = DeploymentResult::begin(Uuid::nil(), "t", "q").fail(Stage::Build, "exit 1");
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["failed_stage"], "build");
        assert_eq!(json["liveness"], "UNKNOWN");
        assert!(json.get("container_id").is_none());
    }
}
