use std::{path::PathBuf, sync::Arc, time::Duration};

use async_trait::async_trait;
use tracing::{debug, instrument, warn};

use taskdock_core::{DispatchRouter, TaskRegistry};
use taskdock_exec::{ContainerInfo, DeploymentPipeline, deploy::naming, read_manifest};
use taskdock_model::{
    Completed, DeploymentRequest, DescriptorPatch, Dispatched, ResultState, TaskDescriptor,
    TaskHandle,
};

use crate::{
    error::ApiError,
    handler::{DeployOutcome, Invocation, ToolHandler},
};

/// Wait bound for synchronous dispatches that do not name one.
pub const DEFAULT_DISPATCH_TIMEOUT: Duration = Duration::from_secs(60);

/// Folder searched by `deploy_folder` when the caller gives no path.
pub const DEFAULT_SOURCE_ROOT: &str = "./generated_tasks";

/// Ready-to-use [`ToolHandler`] delegating to the registry, the router and the pipeline.
pub struct ServiceAdapter {
    registry: Arc<TaskRegistry>,
    router: Arc<DispatchRouter>,
    pipeline: Arc<DeploymentPipeline>,
    dispatch_timeout: Duration,
    source_root: PathBuf,
}

impl ServiceAdapter {
    pub fn new(
        registry: Arc<TaskRegistry>,
        router: Arc<DispatchRouter>,
        pipeline: Arc<DeploymentPipeline>,
    ) -> Self {
        Self {
            registry,
            router,
            pipeline,
            dispatch_timeout: DEFAULT_DISPATCH_TIMEOUT,
            source_root: PathBuf::from(DEFAULT_SOURCE_ROOT),
        }
    }

    #[inline]
    pub fn with_dispatch_timeout(mut self, timeout: Duration) -> Self {
        self.dispatch_timeout = timeout;
        self
    }

    #[inline]
    pub fn with_source_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.source_root = root.into();
        self
    }

    #[inline]
    pub fn dispatch_timeout(&self) -> Duration {
        self.dispatch_timeout
    }
}

/// The descriptor always follows the deployment's name and queue.
fn align(
    request: &DeploymentRequest,
    mut descriptor: TaskDescriptor,
) -> Result<TaskDescriptor, ApiError> {
    if descriptor.name != request.task_name {
        return Err(ApiError::InvalidRequest(format!(
            "descriptor '{}' does not match deployment '{}'",
            descriptor.name, request.task_name
        )));
    }
    descriptor.queue = request.queue.clone();
    descriptor.validate()?;
    Ok(descriptor)
}

#[async_trait]
impl ToolHandler for ServiceAdapter {
    async fn register_task(&self, descriptor: TaskDescriptor) -> Result<(), ApiError> {
        self.registry.register(&descriptor).await.map_err(ApiError::from)
    }

    async fn task_details(&self, name: &str) -> Result<TaskDescriptor, ApiError> {
        self.registry.get(name).await.map_err(ApiError::from)
    }

    async fn list_tasks(&self) -> Result<Vec<TaskDescriptor>, ApiError> {
        self.registry.list_all().await.map_err(ApiError::from)
    }

    async fn list_tasks_by_category(
        &self,
        category: &str,
    ) -> Result<Vec<TaskDescriptor>, ApiError> {
        self.registry
            .list_by_category(category)
            .await
            .map_err(ApiError::from)
    }

    async fn list_categories(&self) -> Result<Vec<String>, ApiError> {
        self.registry.list_categories().await.map_err(ApiError::from)
    }

    async fn remove_task(&self, name: &str) -> Result<bool, ApiError> {
        self.registry.remove(name).await.map_err(ApiError::from)
    }

    async fn update_task(&self, name: &str, patch: DescriptorPatch) -> Result<(), ApiError> {
        if patch.is_empty() {
            return Err(ApiError::InvalidRequest("patch has no fields".into()));
        }
        match self.registry.update(name, &patch).await? {
            true => Ok(()),
            false => Err(ApiError::NotFound(format!("task '{name}'"))),
        }
    }

    async fn trigger_task(
        &self,
        call: Invocation,
        timeout: Option<Duration>,
    ) -> Result<Completed, ApiError> {
        let timeout = timeout.unwrap_or(self.dispatch_timeout);
        if timeout.is_zero() {
            return Err(ApiError::InvalidRequest("timeout must be positive".into()));
        }
        self.router
            .dispatch_sync(
                &call.task_name,
                call.args,
                call.kwargs,
                call.queue.as_deref(),
                timeout,
            )
            .await
            .map_err(ApiError::from)
    }

    async fn send_task(&self, call: Invocation) -> Result<Dispatched, ApiError> {
        self.router
            .dispatch_async(&call.task_name, call.args, call.kwargs, call.queue.as_deref())
            .await
            .map_err(ApiError::from)
    }

    async fn task_result(&self, task_id: &TaskHandle) -> Result<ResultState, ApiError> {
        if task_id.as_str().trim().is_empty() {
            return Err(ApiError::InvalidRequest("task_id cannot be empty".into()));
        }
        self.router.query_result(task_id).await.map_err(ApiError::from)
    }

    #[instrument(level = "debug", skip_all, fields(task = %request.task_name, queue = %request.queue))]
    async fn deploy_task(
        &self,
        request: DeploymentRequest,
        descriptor: TaskDescriptor,
    ) -> Result<DeployOutcome, ApiError> {
        let descriptor = align(&request, descriptor)?;

        let deployment = self.pipeline.deploy(&request).await;
        if !deployment.success {
            debug!(summary = %deployment.summary(), "deployment failed, task not registered");
            return Ok(DeployOutcome {
                deployment,
                registered: false,
            });
        }

        // A worker that is up but unregistered can still be registered by hand.
        let registered = match self.registry.register(&descriptor).await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "deployed task could not be registered");
                false
            }
        };
        Ok(DeployOutcome {
            deployment,
            registered,
        })
    }

    async fn deploy_folder(
        &self,
        folder: Option<PathBuf>,
        request: DeploymentRequest,
        descriptor: TaskDescriptor,
    ) -> Result<DeployOutcome, ApiError> {
        let folder = folder.unwrap_or_else(|| {
            self.source_root
                .join(format!("{}_{}", request.task_name, request.queue))
        });
        let files = read_manifest(&folder).await?;
        if files.is_empty() {
            return Err(ApiError::InvalidRequest(format!(
                "no source files found in {}",
                folder.display()
            )));
        }
        debug!(folder = %folder.display(), files = files.len(), "source folder read");

        let count = files.len();
        let request = request.with_files(files).with_file_count(count);
        self.deploy_task(request, descriptor).await
    }

    async fn stop_deployment(&self, task: &str, queue: Option<&str>) -> Result<String, ApiError> {
        if task.trim().is_empty() {
            return Err(ApiError::InvalidRequest("task_name cannot be empty".into()));
        }
        let queue = self.router.resolve_queue(task, queue).await;
        let container = naming::container_name(task, &queue);
        self.pipeline.stop_deployment(&container).await?;
        Ok(container)
    }

    async fn list_deployments(&self) -> Result<Vec<ContainerInfo>, ApiError> {
        self.pipeline.list_deployments().await.map_err(ApiError::from)
    }

    async fn health(&self) -> Result<(), ApiError> {
        self.registry.ping().await.map_err(ApiError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Fixture;
    use serde_json::json;
    use taskdock_model::{FileBlob, Liveness, ParamSpec, Stage};

    fn worker_files(request: DeploymentRequest) -> DeploymentRequest {
        request
            .with_file("app_images.py", FileBlob::text("from celery import Celery\n"))
            .with_file("Dockerfile", FileBlob::text("FROM python:3.11-slim\n"))
    }

    fn resize() -> TaskDescriptor {
        TaskDescriptor::new("resize_image")
            .with_description("Resize an image")
            .with_parameter(ParamSpec::new("width", "int"))
            .with_category("media")
            .with_queue("images")
    }

    #[tokio::test]
    async fn deploy_registers_after_success() {
        let fx = Fixture::new();
        let request = worker_files(DeploymentRequest::new("resize_image", "images"));

        let out = fx.adapter.deploy_task(request, resize()).await.unwrap();
        assert!(out.deployment.success, "{}", out.deployment.summary());
        assert!(out.registered);
        assert_eq!(out.deployment.liveness, Liveness::Running);

        let stored = fx.adapter.task_details("resize_image").await.unwrap();
        assert_eq!(stored.queue, "images");
        assert_eq!(fx.adapter.list_categories().await.unwrap(), vec!["media"]);
    }

    #[tokio::test]
    async fn failed_deploy_leaves_registry_untouched() {
        let fx = Fixture::new();
        let request = DeploymentRequest::new("resize_image", "images")
            .with_file("app_images.py", FileBlob::text("print('hi')\n"));

        let out = fx.adapter.deploy_task(request, resize()).await.unwrap();
        assert!(!out.deployment.success);
        assert_eq!(out.deployment.failed_stage, Some(Stage::Validate));
        assert!(!out.registered);
        assert!(fx.adapter.list_tasks().await.unwrap().is_empty());
        assert_eq!(fx.runtime.builds(), 0);
    }

    #[tokio::test]
    async fn descriptor_follows_deployment_queue() {
        let fx = Fixture::new();
        let request = worker_files(DeploymentRequest::new("resize_image", "images"));
        let descriptor = resize().with_queue("celery");

        fx.adapter.deploy_task(request, descriptor).await.unwrap();
        let stored = fx.adapter.task_details("resize_image").await.unwrap();
        assert_eq!(stored.queue, "images");
    }

    #[tokio::test]
    async fn mismatched_descriptor_is_rejected() {
        let fx = Fixture::new();
        let request = worker_files(DeploymentRequest::new("resize_image", "images"));
        let err = fx
            .adapter
            .deploy_task(request, TaskDescriptor::new("other"))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidRequest(_)));
        assert_eq!(fx.runtime.builds(), 0);
    }

    #[tokio::test]
    async fn deploy_folder_reads_default_location() {
        let fx = Fixture::new();
        let folder = fx.sources.path().join("resize_image_images");
        std::fs::create_dir_all(folder.join("lib")).unwrap();
        std::fs::write(folder.join("app_images.py"), "import lib.ops\n").unwrap();
        std::fs::write(folder.join("Dockerfile"), "FROM python:3.11-slim\n").unwrap();
        std::fs::write(folder.join("lib/ops.py"), "def run(): pass\n").unwrap();

        let out = fx
            .adapter
            .deploy_folder(None, DeploymentRequest::new("resize_image", "images"), resize())
            .await
            .unwrap();
        assert!(out.deployment.success, "{}", out.deployment.summary());
        assert!(out.deployment.files.contains(&"lib/ops.py".to_string()));
    }

    #[tokio::test]
    async fn deploy_folder_missing_is_not_found() {
        let fx = Fixture::new();
        let err = fx
            .adapter
            .deploy_folder(
                Some(fx.sources.path().join("nope")),
                DeploymentRequest::new("resize_image", "images"),
                resize(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[tokio::test]
    async fn update_of_unknown_task_is_not_found() {
        let fx = Fixture::new();
        let patch = DescriptorPatch {
            description: Some("new".into()),
            ..Default::default()
        };
        let err = fx.adapter.update_task("ghost", patch).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));

        let err = fx
            .adapter
            .update_task("ghost", DescriptorPatch::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn trigger_uses_registered_queue() {
        let fx = Fixture::new();
        fx.adapter.register_task(resize()).await.unwrap();

        let call = Invocation {
            task_name: "resize_image".into(),
            args: vec![json!("a.png")],
            kwargs: Default::default(),
            queue: None,
        };
        let done = fx
            .adapter
            .trigger_task(call, Some(Duration::from_secs(1)))
            .await
            .unwrap();
        assert_eq!(done.queue, "images");
        assert_eq!(done.result, json!({"echo": "mcp_app.resize_image"}));
    }

    #[tokio::test]
    async fn zero_timeout_is_rejected() {
        let fx = Fixture::new();
        let call = Invocation {
            task_name: "resize_image".into(),
            args: vec![],
            kwargs: Default::default(),
            queue: None,
        };
        let err = fx
            .adapter
            .trigger_task(call, Some(Duration::ZERO))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn stop_resolves_container_from_registry() {
        let fx = Fixture::new();
        let request = worker_files(DeploymentRequest::new("resize_image", "images"));
        fx.adapter.deploy_task(request, resize()).await.unwrap();
        assert_eq!(fx.adapter.list_deployments().await.unwrap().len(), 1);

        let name = fx.adapter.stop_deployment("resize_image", None).await.unwrap();
        assert_eq!(name, "resize_image_images_worker");
        assert!(fx.adapter.list_deployments().await.unwrap().is_empty());

        let err = fx
            .adapter
            .stop_deployment("resize_image", None)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[tokio::test]
    async fn health_reflects_store() {
        let fx = Fixture::new();
        assert!(fx.adapter.health().await.is_ok());
        fx.store.set_available(false);
        assert!(matches!(
            fx.adapter.health().await,
            Err(ApiError::Unavailable(_))
        ));
    }
}
