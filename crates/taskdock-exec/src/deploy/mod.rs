//! Deployment pipeline: manifest to running worker container.
//!
//! Stages run in order (materialize, validate, build, launch, health check); the first
//! failure stops the pipeline. The result always describes how far the attempt got.
mod config;
pub use config::PipelineConfig;

mod locks;
pub use locks::{LaunchGuard, LaunchLocks};

mod manifest;
pub use manifest::read_manifest;

mod materialize;
pub use materialize::{Materialized, Resolved, normalize_path};

pub mod naming;

use std::{sync::Arc, time::Instant};

use tracing::{debug, info, instrument, trace, warn};
use uuid::Uuid;

use taskdock_core::{CoreError, MetricsHandle, Outcome, noop_metrics};
use taskdock_model::{
    DeploymentRequest, DeploymentResult, Env, LABEL_DEPLOYMENT, LABEL_QUEUE, LABEL_TASK, Labels,
    Liveness, Stage,
};

use crate::{
    error::StageError,
    runtime::{ContainerInfo, ContainerRuntime, RunSpec},
};

/// Longest runtime output kept in a result.
const LOG_TAIL: usize = 8 * 1024;

pub struct DeploymentPipeline {
    runtime: Arc<dyn ContainerRuntime>,
    config: PipelineConfig,
    worker_env: Env,
    locks: LaunchLocks,
    metrics: MetricsHandle,
}

impl DeploymentPipeline {
    pub fn new(runtime: Arc<dyn ContainerRuntime>, config: PipelineConfig) -> Self {
        Self {
            runtime,
            config,
            worker_env: Env::new(),
            locks: LaunchLocks::new(),
            metrics: noop_metrics(),
        }
    }

    /// Environment passed to every launched worker (broker connectivity).
    #[inline]
    pub fn with_worker_env(mut self, env: Env) -> Self {
        self.worker_env = env;
        self
    }

    #[inline]
    pub fn with_metrics(mut self, metrics: MetricsHandle) -> Self {
        self.metrics = metrics;
        self
    }

    #[inline]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run the whole pipeline for `request`.
    #[instrument(level = "debug", skip(self, request), fields(task = %request.task_name, queue = %request.queue))]
    pub async fn deploy(&self, request: &DeploymentRequest) -> DeploymentResult {
        let id = Uuid::new_v4();
        let started = Instant::now();
        let mut result = DeploymentResult::begin(id, &request.task_name, &request.queue);

        let outcome = match self.run_stages(id, request, &mut result).await {
            Ok(()) => {
                result.success = true;
                info!(
                    deployment = %id,
                    container = result.container_name.as_deref().unwrap_or_default(),
                    liveness = %result.liveness,
                    "deployment finished",
                );
                Outcome::Success
            }
            Err(e) => {
                warn!(deployment = %id, stage = e.stage.as_label(), error = %e.message, "deployment failed");
                let outcome = if e.timed_out {
                    Outcome::Timeout
                } else {
                    Outcome::Failure
                };
                if let Some(out) = e.output {
                    match e.stage {
                        Stage::Build => result.build_log = Some(tail(&out)),
                        Stage::Launch => result.launch_log = Some(tail(&out)),
                        _ => {}
                    }
                }
                result = result.fail(e.stage, e.message);
                outcome
            }
        };

        self.metrics.record_deployment(
            outcome,
            result.failed_stage,
            started.elapsed().as_millis() as u64,
        );
        result
    }

    async fn run_stages(
        &self,
        id: Uuid,
        request: &DeploymentRequest,
        result: &mut DeploymentResult,
    ) -> Result<(), StageError> {
        let task = request.task_name.as_str();
        let queue = request.queue.as_str();

        // materialize
        let dir_name = naming::deployment_dir_name(task, queue, &id);
        let written = materialize::materialize(&self.config.work_root, &dir_name, request).await?;
        debug!(deployment = %id, workdir = %written.workdir.display(), files = written.files.len(), "files materialized");
        result.workdir = Some(written.workdir.clone());
        result.files = written.files.clone();

        // validate
        let resolved = materialize::validate(&written.files, request)?;
        trace!(deployment = %id, entrypoint = %resolved.entrypoint, container_file = %resolved.container_file, "manifest validated");

        // build
        let tag = naming::image_tag(&self.config.image_prefix, task, &id);
        let built = self
            .runtime
            .build_image(
                &written.workdir,
                &tag,
                &resolved.container_file,
                self.config.build_timeout(),
            )
            .await
            .map_err(|e| StageError::runtime(Stage::Build, e))?;
        debug!(deployment = %id, image = %tag, "image built");
        result.image = Some(tag.clone());
        result.build_log = Some(tail(&built.combined()));

        // launch
        let name = naming::container_name(task, queue);
        result.container_name = Some(name.clone());
        let container_id = {
            let _guard = self.locks.acquire(&name).await;
            self.replace_prior(&name).await;

            let mut labels = Labels::new();
            labels
                .insert(LABEL_TASK, task)
                .insert(LABEL_QUEUE, queue)
                .insert(LABEL_DEPLOYMENT, id.to_string());
            let spec = RunSpec {
                name: name.clone(),
                image: tag,
                env: self.worker_env.clone(),
                labels,
                restart: self.config.restart,
                command: naming::worker_command(&resolved.entrypoint, queue),
            };
            self.runtime
                .run_container(&spec, self.config.launch_timeout())
                .await
                .map_err(|e| StageError::runtime(Stage::Launch, e))?
        };
        debug!(deployment = %id, container = %name, id = %container_id, "container launched");
        result.container_id = Some(container_id);

        // health check
        result.liveness = self.probe(&name).await;
        Ok(())
    }

    /// Best-effort stop and removal of whatever runs under `name`.
    async fn replace_prior(&self, name: &str) {
        if let Err(e) = self.runtime.stop_container(name).await {
            trace!(container = name, error = %e, "no prior container to stop");
        }
        if let Err(e) = self.runtime.remove_container(name).await {
            trace!(container = name, error = %e, "no prior container to remove");
        }
    }

    async fn probe(&self, name: &str) -> Liveness {
        let policy = self.config.probe;
        let attempts = policy.attempts();
        let mut liveness = Liveness::Unknown;
        for attempt in 1..=attempts {
            liveness = match self.runtime.inspect_container(name).await {
                Ok(state) => state.liveness,
                Err(e) => {
                    debug!(container = name, error = %e, "health probe failed");
                    Liveness::Unknown
                }
            };
            if liveness == Liveness::Running || attempt == attempts {
                break;
            }
            tokio::time::sleep(policy.interval()).await;
        }
        liveness
    }

    /// Current liveness of a deployed worker; `UNKNOWN` when it cannot be inspected.
    pub async fn status(&self, container: &str) -> Liveness {
        match self.runtime.inspect_container(container).await {
            Ok(state) => state.liveness,
            Err(_) => Liveness::Unknown,
        }
    }

    /// Stop and remove a deployed worker.
    #[instrument(level = "debug", skip(self))]
    pub async fn stop_deployment(&self, container: &str) -> Result<(), CoreError> {
        let _guard = self.locks.acquire(container).await;
        if self.runtime.inspect_container(container).await.is_err() {
            return Err(CoreError::NotFound(format!("container '{container}'")));
        }
        self.runtime
            .stop_container(container)
            .await
            .map_err(|e| CoreError::Launch(e.to_string()))?;
        self.runtime
            .remove_container(container)
            .await
            .map_err(|e| CoreError::Launch(e.to_string()))?;
        info!(container, "deployment stopped");
        Ok(())
    }

    /// Worker containers started by this pipeline.
    pub async fn list_deployments(&self) -> Result<Vec<ContainerInfo>, CoreError> {
        self.runtime
            .list_containers(LABEL_TASK)
            .await
            .map_err(|e| CoreError::BackendUnavailable(e.to_string()))
    }
}

fn tail(s: &str) -> String {
    if s.len() <= LOG_TAIL {
        return s.to_string();
    }
    let mut start = s.len() - LOG_TAIL;
    while !s.is_char_boundary(start) {
        start += 1;
    }
    s[start..].to_string()
}
