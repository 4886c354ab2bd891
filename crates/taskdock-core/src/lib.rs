pub mod broker;
pub mod error;
pub mod metrics;
pub mod registry;
pub mod router;

pub use broker::{Broker, BrokerError, MemoryBroker, Submission};
pub use error::CoreError;
pub use metrics::{
    DispatchMode, MetricsBackend, MetricsHandle, NoOpMetrics, Outcome, noop_metrics,
};
pub use registry::{
    IndexedRemoval, IndexedWrite, KeySchema, MemoryStore, RegistryError, RegistryResult,
    RegistryStore, StoreError, TaskRegistry, WriteOutcome,
};
pub use router::{DispatchRouter, RouterConfig};

pub mod prelude {
    pub use crate::broker::Broker;
    pub use crate::error::CoreError;
    pub use crate::registry::{RegistryError, RegistryStore, TaskRegistry};
    pub use crate::router::DispatchRouter;
}
