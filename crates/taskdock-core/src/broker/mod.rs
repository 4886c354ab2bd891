//! Message broker abstraction used by the dispatch router.
mod memory;
pub use memory::MemoryBroker;

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

use taskdock_model::{ResultState, TaskHandle};

#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("broker unavailable: {0}")]
    Unavailable(String),

    #[error("broker protocol error: {0}")]
    Protocol(String),
}

/// One invocation handed to the broker.
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    /// Namespaced broker task name (`<namespace>.<task>`).
    pub task: String,
    pub queue: String,
    pub args: Vec<Value>,
    pub kwargs: Map<String, Value>,
}

/// Queue submission and result lookup.
#[async_trait]
pub trait Broker: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    /// Enqueue an invocation and return its handle.
    async fn submit(&self, submission: &Submission) -> Result<TaskHandle, BrokerError>;

    /// Current state of a submitted invocation; never blocks waiting for completion.
    async fn poll(&self, handle: &TaskHandle) -> Result<ResultState, BrokerError>;
}
