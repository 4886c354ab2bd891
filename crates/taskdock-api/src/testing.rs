//! Wiring over in-memory backends shared by the adapter and HTTP tests.
use std::{
    path::Path,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;
use tempfile::TempDir;

use taskdock_core::{DispatchRouter, MemoryBroker, MemoryStore, TaskRegistry};
use taskdock_exec::{
    ContainerInfo, ContainerRuntime, ContainerState, DeploymentPipeline, PipelineConfig,
    RunSpec, RuntimeError, runtime::CommandOutput,
};
use taskdock_model::{Liveness, ResultState};

use crate::adapter::ServiceAdapter;

/// Runtime that builds instantly and keeps started containers in memory.
#[derive(Default)]
pub(crate) struct StubRuntime {
    builds: AtomicUsize,
    running: Mutex<Vec<RunSpec>>,
}

impl StubRuntime {
    pub(crate) fn builds(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }
}

fn absent(command: &str, name: &str) -> RuntimeError {
    RuntimeError::Failed {
        command: format!("{command} {name}"),
        code: Some(1),
        output: format!("Error: No such container: {name}"),
    }
}

#[async_trait]
impl ContainerRuntime for StubRuntime {
    fn name(&self) -> &'static str {
        "stub"
    }

    async fn build_image(
        &self,
        _context: &Path,
        _tag: &str,
        _container_file: &str,
        _timeout: Duration,
    ) -> Result<CommandOutput, RuntimeError> {
        self.builds.fetch_add(1, Ordering::SeqCst);
        Ok(CommandOutput {
            code: Some(0),
            stdout: "built".into(),
            stderr: String::new(),
        })
    }

    async fn stop_container(&self, name: &str) -> Result<(), RuntimeError> {
        match self.running.lock().iter().any(|s| s.name == name) {
            true => Ok(()),
            false => Err(absent("stop", name)),
        }
    }

    async fn remove_container(&self, name: &str) -> Result<(), RuntimeError> {
        let mut running = self.running.lock();
        let before = running.len();
        running.retain(|s| s.name != name);
        match running.len() < before {
            true => Ok(()),
            false => Err(absent("rm", name)),
        }
    }

    async fn run_container(
        &self,
        spec: &RunSpec,
        _timeout: Duration,
    ) -> Result<String, RuntimeError> {
        self.running.lock().push(spec.clone());
        Ok(format!("cid-{}", spec.name))
    }

    async fn inspect_container(&self, name: &str) -> Result<ContainerState, RuntimeError> {
        match self.running.lock().iter().any(|s| s.name == name) {
            true => Ok(ContainerState {
                status: "running".into(),
                liveness: Liveness::Running,
            }),
            false => Err(absent("inspect", name)),
        }
    }

    async fn list_containers(&self, label_key: &str) -> Result<Vec<ContainerInfo>, RuntimeError> {
        Ok(self
            .running
            .lock()
            .iter()
            .filter(|s| s.labels.get(label_key).is_some())
            .map(|s| ContainerInfo {
                name: s.name.clone(),
                image: s.image.clone(),
                status: "Up 1 second".into(),
                created: "2026-01-01 00:00:00 +0000 UTC".into(),
                labels: s.labels.clone(),
            })
            .collect())
    }
}

pub(crate) struct Fixture {
    pub(crate) adapter: Arc<ServiceAdapter>,
    pub(crate) store: Arc<MemoryStore>,
    pub(crate) broker: Arc<MemoryBroker>,
    pub(crate) runtime: Arc<StubRuntime>,
    pub(crate) sources: TempDir,
    _work: TempDir,
}

impl Fixture {
    /// Broker answers every invocation with `{"echo": <broker task name>}`.
    pub(crate) fn new() -> Self {
        let broker = MemoryBroker::new().with_responder(|s| ResultState::Success {
            value: json!({ "echo": s.task }),
        });
        Self::with_broker(broker)
    }

    pub(crate) fn with_broker(broker: MemoryBroker) -> Self {
        let store = Arc::new(MemoryStore::new());
        let broker = Arc::new(broker);
        let runtime = Arc::new(StubRuntime::default());
        let work = TempDir::new().unwrap();
        let sources = TempDir::new().unwrap();

        let registry = Arc::new(TaskRegistry::new(store.clone()));
        let router = Arc::new(DispatchRouter::new(registry.clone(), broker.clone()));
        let pipeline = Arc::new(DeploymentPipeline::new(
            runtime.clone(),
            PipelineConfig::default().with_work_root(work.path()),
        ));
        let adapter = Arc::new(
            ServiceAdapter::new(registry, router, pipeline).with_source_root(sources.path()),
        );

        Self {
            adapter,
            store,
            broker,
            runtime,
            sources,
            _work: work,
        }
    }
}
