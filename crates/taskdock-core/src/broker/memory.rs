use std::{
    collections::HashMap,
    sync::atomic::{AtomicBool, Ordering},
};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use taskdock_model::{ResultState, TaskHandle};

use crate::broker::{Broker, BrokerError, Submission};

type Responder = Box<dyn Fn(&Submission) -> ResultState + Send + Sync>;

/// In-process broker.
///
/// Invocations stay `PENDING` until completed with [`MemoryBroker::complete`] or
/// [`MemoryBroker::fail`], or until a configured responder decides their state.
pub struct MemoryBroker {
    entries: Mutex<HashMap<TaskHandle, (Submission, ResultState)>>,
    order: Mutex<Vec<TaskHandle>>,
    responder: Option<Responder>,
    available: AtomicBool,
}

impl Default for MemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            order: Mutex::new(Vec::new()),
            responder: None,
            available: AtomicBool::new(true),
        }
    }

    /// Decide each invocation's state at submission time.
    pub fn with_responder<F>(mut self, f: F) -> Self
    where
        F: Fn(&Submission) -> ResultState + Send + Sync + 'static,
    {
        self.responder = Some(Box::new(f));
        self
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Submissions in arrival order.
    pub fn submissions(&self) -> Vec<Submission> {
        let entries = self.entries.lock();
        self.order
            .lock()
            .iter()
            .filter_map(|h| entries.get(h).map(|(s, _)| s.clone()))
            .collect()
    }

    pub fn complete(&self, handle: &TaskHandle, value: Value) -> bool {
        self.set_state(handle, ResultState::Success { value })
    }

    pub fn fail(&self, handle: &TaskHandle, error: impl Into<String>) -> bool {
        self.set_state(handle, ResultState::Failure {
            error: error.into(),
        })
    }

    fn set_state(&self, handle: &TaskHandle, state: ResultState) -> bool {
        match self.entries.lock().get_mut(handle) {
            Some(entry) => {
                entry.1 = state;
                true
            }
            None => false,
        }
    }

    fn check(&self) -> Result<(), BrokerError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(BrokerError::Unavailable("memory broker switched off".into()))
        }
    }
}

#[async_trait]
impl Broker for MemoryBroker {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn submit(&self, submission: &Submission) -> Result<TaskHandle, BrokerError> {
        self.check()?;
        let handle = TaskHandle::generate();
        let state = self
            .responder
            .as_ref()
            .map_or(ResultState::Pending, |f| f(submission));

        self.entries
            .lock()
            .insert(handle.clone(), (submission.clone(), state));
        self.order.lock().push(handle.clone());
        Ok(handle)
    }

    async fn poll(&self, handle: &TaskHandle) -> Result<ResultState, BrokerError> {
        self.check()?;
        Ok(self
            .entries
            .lock()
            .get(handle)
            .map_or(ResultState::Pending, |(_, state)| state.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Map, json};

    fn submission(task: &str) -> Submission {
        Submission {
            task: task.into(),
            queue: "celery".into(),
            args: vec![json!(1)],
            kwargs: Map::new(),
        }
    }

    #[tokio::test]
    async fn pending_until_completed() {
        let broker = MemoryBroker::new();
        let h = broker.submit(&submission("mcp_app.add")).await.unwrap();
        assert_eq!(broker.poll(&h).await.unwrap(), ResultState::Pending);

        assert!(broker.complete(&h, json!(3)));
        assert_eq!(
            broker.poll(&h).await.unwrap(),
            ResultState::Success { value: json!(3) }
        );
    }

    #[tokio::test]
    async fn unknown_handle_is_pending() {
        let broker = MemoryBroker::new();
        let state = broker.poll(&TaskHandle::new("nope")).await.unwrap();
        assert_eq!(state, ResultState::Pending);
        assert!(!broker.fail(&TaskHandle::new("nope"), "x"));
    }

    #[tokio::test]
    async fn submissions_keep_order() {
        let broker = MemoryBroker::new();
        broker.submit(&submission("a")).await.unwrap();
        broker.submit(&submission("b")).await.unwrap();
        let names: Vec<_> = broker.submissions().into_iter().map(|s| s.task).collect();
        assert_eq!(names, vec!["a", "b"]);
    }
}
