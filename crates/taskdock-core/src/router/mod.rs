//! Dispatch router: resolves a task's queue and talks to the broker.
//!
//! Queue resolution order: explicit queue, registered queue, configured default.
mod config;
pub use config::RouterConfig;

use std::{sync::Arc, time::Duration};

use serde_json::{Map, Value};
use tracing::{debug, instrument, trace, warn};

use taskdock_model::{Completed, Dispatched, ResultState, TaskHandle};

use crate::{
    broker::{Broker, Submission},
    error::CoreError,
    metrics::{DispatchMode, MetricsHandle, Outcome, noop_metrics},
    registry::{RegistryError, TaskRegistry},
};

pub struct DispatchRouter {
    registry: Arc<TaskRegistry>,
    broker: Arc<dyn Broker>,
    config: RouterConfig,
    metrics: MetricsHandle,
}

impl DispatchRouter {
    pub fn new(registry: Arc<TaskRegistry>, broker: Arc<dyn Broker>) -> Self {
        Self {
            registry,
            broker,
            config: RouterConfig::default(),
            metrics: noop_metrics(),
        }
    }

    #[inline]
    pub fn with_config(mut self, config: RouterConfig) -> Self {
        self.config = config;
        self
    }

    #[inline]
    pub fn with_metrics(mut self, metrics: MetricsHandle) -> Self {
        self.metrics = metrics;
        self
    }

    #[inline]
    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Queue an invocation of `task` should go to.
    ///
    /// Registry lookups that fail for any reason fall back to the default queue.
    pub async fn resolve_queue(&self, task: &str, explicit: Option<&str>) -> String {
        if let Some(q) = explicit.map(str::trim).filter(|q| !q.is_empty()) {
            return q.to_string();
        }
        match self.registry.get(task).await {
            Ok(d) => d.queue,
            Err(RegistryError::NotFound(_)) => {
                trace!(task, "task not registered, using default queue");
                self.config.default_queue.clone()
            }
            Err(e) => {
                warn!(task, error = %e, "registry lookup failed, using default queue");
                self.config.default_queue.clone()
            }
        }
    }

    /// Submit and wait for the result, at most `timeout`.
    ///
    /// A remote exception surfaces as [`CoreError::RemoteFailure`]; expiry as
    /// [`CoreError::Timeout`], which carries the handle so the result can still be
    /// queried later.
    #[instrument(level = "debug", skip(self, args, kwargs), fields(timeout_ms = timeout.as_millis() as u64))]
    pub async fn dispatch_sync(
        &self,
        task: &str,
        args: Vec<Value>,
        kwargs: Map<String, Value>,
        queue: Option<&str>,
        timeout: Duration,
    ) -> Result<Completed, CoreError> {
        let sent = self.submit(task, args, kwargs, queue, DispatchMode::Sync).await?;

        let waited = tokio::time::timeout(timeout, self.wait_ready(&sent.task_id)).await;
        let res = match waited {
            Err(_) => Err(CoreError::Timeout {
                task: task.to_string(),
                handle: sent.task_id.clone(),
                after_ms: timeout.as_millis() as u64,
            }),
            Ok(Err(e)) => Err(e),
            Ok(Ok(ResultState::Success { value })) => Ok(Completed {
                task_id: sent.task_id.clone(),
                task_name: sent.task_name.clone(),
                queue: sent.queue.clone(),
                result: value,
            }),
            Ok(Ok(ResultState::Failure { error })) => Err(CoreError::RemoteFailure {
                task: task.to_string(),
                handle: sent.task_id.clone(),
                message: error,
            }),
            Ok(Ok(ResultState::Pending)) => Err(CoreError::BackendUnavailable(
                "result backend reported completion without a result".into(),
            )),
        };

        let outcome = match &res {
            Ok(_) => Outcome::Success,
            Err(CoreError::Timeout { .. }) => Outcome::Timeout,
            Err(_) => Outcome::Failure,
        };
        self.metrics
            .record_dispatch(DispatchMode::Sync, &sent.queue, outcome);
        debug!(task_id = %sent.task_id, outcome = outcome.as_label(), "sync dispatch finished");
        res
    }

    /// Submit without waiting.
    #[instrument(level = "debug", skip(self, args, kwargs))]
    pub async fn dispatch_async(
        &self,
        task: &str,
        args: Vec<Value>,
        kwargs: Map<String, Value>,
        queue: Option<&str>,
    ) -> Result<Dispatched, CoreError> {
        let res = self
            .submit(task, args, kwargs, queue, DispatchMode::Async)
            .await;
        if let Ok(sent) = &res {
            self.metrics
                .record_dispatch(DispatchMode::Async, &sent.queue, Outcome::Success);
        }
        res
    }

    /// Current state of a submitted invocation.
    pub async fn query_result(&self, handle: &TaskHandle) -> Result<ResultState, CoreError> {
        self.broker
            .poll(handle)
            .await
            .map_err(|e| CoreError::BackendUnavailable(e.to_string()))
    }

    async fn submit(
        &self,
        task: &str,
        args: Vec<Value>,
        kwargs: Map<String, Value>,
        queue: Option<&str>,
        mode: DispatchMode,
    ) -> Result<Dispatched, CoreError> {
        if task.trim().is_empty() {
            return Err(CoreError::Validation("task name cannot be empty".into()));
        }
        let queue = self.resolve_queue(task, queue).await;
        let submission = Submission {
            task: self.config.broker_task_name(task),
            queue: queue.clone(),
            args,
            kwargs,
        };

        match self.broker.submit(&submission).await {
            Ok(handle) => {
                debug!(task, queue = %queue, task_id = %handle, broker = self.broker.name(), "task submitted");
                Ok(Dispatched {
                    task_id: handle,
                    task_name: task.to_string(),
                    queue,
                })
            }
            Err(e) => {
                warn!(task, queue = %queue, error = %e, "task submission failed");
                self.metrics.record_dispatch(mode, &queue, Outcome::Failure);
                Err(CoreError::Submission {
                    task: task.to_string(),
                    message: e.to_string(),
                })
            }
        }
    }

    async fn wait_ready(&self, handle: &TaskHandle) -> Result<ResultState, CoreError> {
        let mut attempt = 0u32;
        loop {
            let state = self.query_result(handle).await?;
            if state.is_ready() {
                return Ok(state);
            }
            tokio::time::sleep(self.config.poll_delay(attempt)).await;
            attempt = attempt.saturating_add(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{broker::MemoryBroker, registry::MemoryStore};
    use serde_json::json;
    use taskdock_model::TaskDescriptor;

    async fn setup(broker: MemoryBroker) -> (Arc<MemoryStore>, Arc<MemoryBroker>, DispatchRouter) {
        let store = Arc::new(MemoryStore::new());
        let registry = Arc::new(TaskRegistry::new(store.clone()));
        registry
            .register(
                &TaskDescriptor::new("resize_image")
                    .with_category("media")
                    .with_queue("images"),
            )
            .await
            .unwrap();
        let broker = Arc::new(broker);
        let router = DispatchRouter::new(registry, broker.clone());
        (store, broker, router)
    }

    #[tokio::test]
    async fn resolve_queue_prefers_explicit_then_registry_then_default() {
        let (_, _, router) = setup(MemoryBroker::new()).await;

        assert_eq!(router.resolve_queue("resize_image", Some("fast")).await, "fast");
        assert_eq!(router.resolve_queue("resize_image", None).await, "images");
        assert_eq!(router.resolve_queue("resize_image", Some("  ")).await, "images");
        assert_eq!(router.resolve_queue("unknown", None).await, "celery");
    }

    #[tokio::test]
    async fn resolve_queue_survives_registry_outage() {
        let (store, _, router) = setup(MemoryBroker::new()).await;
        store.set_available(false);
        assert_eq!(router.resolve_queue("resize_image", None).await, "celery");
    }

    #[tokio::test]
    async fn async_dispatch_uses_namespaced_name_and_registered_queue() {
        let (_, broker, router) = setup(MemoryBroker::new()).await;

        let sent = router
            .dispatch_async("resize_image", vec![json!("a.png")], Map::new(), None)
            .await
            .unwrap();
        assert_eq!(sent.queue, "images");

        let subs = broker.submissions();
        assert_eq!(subs.len(), 1);
        assert_eq!(subs[0].task, "mcp_app.resize_image");
        assert_eq!(subs[0].queue, "images");
        assert_eq!(subs[0].args, vec![json!("a.png")]);

        assert_eq!(
            router.query_result(&sent.task_id).await.unwrap(),
            ResultState::Pending
        );
        broker.complete(&sent.task_id, json!("ok"));
        assert_eq!(
            router.query_result(&sent.task_id).await.unwrap(),
            ResultState::Success { value: json!("ok") }
        );
    }

    #[tokio::test]
    async fn sync_dispatch_returns_value() {
        let broker = MemoryBroker::new().with_responder(|s| ResultState::Success {
            value: json!({ "task": s.task, "n": s.args.len() }),
        });
        let (_, _, router) = setup(broker).await;

        let done = router
            .dispatch_sync(
                "resize_image",
                vec![json!(1), json!(2)],
                Map::new(),
                None,
                Duration::from_secs(5),
            )
            .await
            .unwrap();
        assert_eq!(done.result["task"], "mcp_app.resize_image");
        assert_eq!(done.result["n"], 2);
    }

    #[tokio::test]
    async fn sync_dispatch_surfaces_remote_error_message() {
        let broker = MemoryBroker::new().with_responder(|_| ResultState::Failure {
            error: "ValueError: width must be positive".into(),
        });
        let (_, _, router) = setup(broker).await;

        let err = router
            .dispatch_sync("resize_image", vec![], Map::new(), None, Duration::from_secs(5))
            .await
            .unwrap_err();
        match err {
            CoreError::RemoteFailure { message, .. } => {
                assert_eq!(message, "ValueError: width must be positive")
            }
            other => panic!("expected RemoteFailure, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn sync_dispatch_times_out_with_handle() {
        let (_, broker, router) = setup(MemoryBroker::new()).await;

        let err = router
            .dispatch_sync("resize_image", vec![], Map::new(), None, Duration::from_secs(3))
            .await
            .unwrap_err();
        match err {
            CoreError::Timeout { handle, after_ms, .. } => {
                assert_eq!(after_ms, 3_000);
                assert_eq!(broker.submissions().len(), 1);
                assert_eq!(
                    router.query_result(&handle).await.unwrap(),
                    ResultState::Pending
                );
            }
            other => panic!("expected Timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unreachable_broker_is_a_submission_error() {
        let broker = MemoryBroker::new();
        broker.set_available(false);
        let (_, _, router) = setup(broker).await;

        let err = router
            .dispatch_async("resize_image", vec![], Map::new(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Submission { .. }), "got {err:?}");
    }
}
