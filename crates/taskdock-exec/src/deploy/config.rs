use std::{path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};

use taskdock_model::{DEFAULT_IMAGE_PREFIX, ProbePolicy, RestartPolicy};

/// Deployment pipeline settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Parent of every deployment working directory.
    pub work_root: PathBuf,
    /// Image names are `<image_prefix>-<task>`.
    pub image_prefix: String,
    pub build_timeout_ms: u64,
    pub launch_timeout_ms: u64,
    pub restart: RestartPolicy,
    pub probe: ProbePolicy,
    /// Container CLI binary (`docker`, `podman`).
    pub runtime_binary: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            work_root: PathBuf::from("./code"),
            image_prefix: DEFAULT_IMAGE_PREFIX.to_string(),
            build_timeout_ms: 600_000,
            launch_timeout_ms: 60_000,
            restart: RestartPolicy::default(),
            probe: ProbePolicy::default(),
            runtime_binary: "docker".to_string(),
        }
    }
}

impl PipelineConfig {
    #[inline]
    pub fn with_work_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.work_root = root.into();
        self
    }

    #[inline]
    pub fn with_probe(mut self, probe: ProbePolicy) -> Self {
        self.probe = probe;
        self
    }

    #[inline]
    pub fn with_restart(mut self, restart: RestartPolicy) -> Self {
        self.restart = restart;
        self
    }

    #[inline]
    pub fn build_timeout(&self) -> Duration {
        Duration::from_millis(self.build_timeout_ms)
    }

    #[inline]
    pub fn launch_timeout(&self) -> Duration {
        Duration::from_millis(self.launch_timeout_ms)
    }
}
