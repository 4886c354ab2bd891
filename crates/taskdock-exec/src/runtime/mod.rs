//! Container runtime seam used by the deployment pipeline.
mod cli;
pub use cli::CliRuntime;

mod process;
pub use process::{CommandOutput, run_checked, run_command};

use std::{path::Path, time::Duration};

use async_trait::async_trait;
use serde::Serialize;

use taskdock_model::{Env, Labels, Liveness, RestartPolicy};

use crate::error::RuntimeError;

/// Everything needed to start one detached worker container.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSpec {
    pub name: String,
    pub image: String,
    pub env: Env,
    pub labels: Labels,
    pub restart: RestartPolicy,
    pub command: Vec<String>,
}

/// Point-in-time state of a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerState {
    /// Raw runtime status (`running`, `exited`, ...).
    pub status: String,
    pub liveness: Liveness,
}

/// One row of a container listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContainerInfo {
    pub name: String,
    pub image: String,
    pub status: String,
    pub created: String,
    pub labels: Labels,
}

#[async_trait]
pub trait ContainerRuntime: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    /// Build `context` into `tag` using `container_file` (relative to `context`).
    async fn build_image(
        &self,
        context: &Path,
        tag: &str,
        container_file: &str,
        timeout: Duration,
    ) -> Result<CommandOutput, RuntimeError>;

    async fn stop_container(&self, name: &str) -> Result<(), RuntimeError>;

    async fn remove_container(&self, name: &str) -> Result<(), RuntimeError>;

    /// Start a detached container; returns the runtime's container id.
    async fn run_container(&self, spec: &RunSpec, timeout: Duration)
    -> Result<String, RuntimeError>;

    async fn inspect_container(&self, name: &str) -> Result<ContainerState, RuntimeError>;

    /// Containers (running or not) carrying label `label_key`.
    async fn list_containers(&self, label_key: &str) -> Result<Vec<ContainerInfo>, RuntimeError>;
}
