use std::{path::PathBuf, time::Duration};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use taskdock_exec::ContainerInfo;
use taskdock_model::{
    Completed, DeploymentRequest, DeploymentResult, DescriptorPatch, Dispatched, ResultState,
    TaskDescriptor, TaskHandle,
};

use crate::error::ApiError;

/// One task invocation as received from a caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invocation {
    pub task_name: String,
    #[serde(default)]
    pub args: Vec<Value>,
    #[serde(default)]
    pub kwargs: Map<String, Value>,
    /// Explicit target queue; resolved from the registry when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queue: Option<String>,
}

/// Result of a deploy-and-register call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeployOutcome {
    pub deployment: DeploymentResult,
    /// Whether the descriptor was written after a successful deployment.
    pub registered: bool,
}

/// Tool operations exposed to callers.
///
/// The HTTP layer only depends on this trait, so a deployment can put auth,
/// quotas or auditing in front of the provided `ServiceAdapter`.
#[async_trait]
pub trait ToolHandler: Send + Sync + 'static {
    /// Insert or overwrite a task descriptor.
    async fn register_task(&self, descriptor: TaskDescriptor) -> Result<(), ApiError>;

    async fn task_details(&self, name: &str) -> Result<TaskDescriptor, ApiError>;

    async fn list_tasks(&self) -> Result<Vec<TaskDescriptor>, ApiError>;

    async fn list_tasks_by_category(&self, category: &str)
    -> Result<Vec<TaskDescriptor>, ApiError>;

    async fn list_categories(&self) -> Result<Vec<String>, ApiError>;

    /// Returns `false` when nothing was registered under `name`.
    async fn remove_task(&self, name: &str) -> Result<bool, ApiError>;

    async fn update_task(&self, name: &str, patch: DescriptorPatch) -> Result<(), ApiError>;

    /// Dispatch and wait. `None` uses the handler's default timeout.
    async fn trigger_task(
        &self,
        call: Invocation,
        timeout: Option<Duration>,
    ) -> Result<Completed, ApiError>;

    /// Dispatch without waiting.
    async fn send_task(&self, call: Invocation) -> Result<Dispatched, ApiError>;

    async fn task_result(&self, task_id: &TaskHandle) -> Result<ResultState, ApiError>;

    /// Deploy a manifest, then register `descriptor` if the deployment succeeded.
    async fn deploy_task(
        &self,
        request: DeploymentRequest,
        descriptor: TaskDescriptor,
    ) -> Result<DeployOutcome, ApiError>;

    /// Like [`ToolHandler::deploy_task`], with the manifest read from a local folder.
    ///
    /// `folder` defaults to `<source root>/<task>_<queue>`.
    async fn deploy_folder(
        &self,
        folder: Option<PathBuf>,
        request: DeploymentRequest,
        descriptor: TaskDescriptor,
    ) -> Result<DeployOutcome, ApiError>;

    /// Stop and remove a task's worker; returns the container name.
    async fn stop_deployment(&self, task: &str, queue: Option<&str>) -> Result<String, ApiError>;

    async fn list_deployments(&self) -> Result<Vec<ContainerInfo>, ApiError>;

    /// Backend reachability.
    async fn health(&self) -> Result<(), ApiError>;
}
