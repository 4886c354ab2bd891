//! Tool-invocation boundary: a handler trait, an adapter over the registry,
//! router and pipeline, and the JSON HTTP surface mounting it.
mod error;
pub use error::ApiError;

mod handler;
pub use handler::{DeployOutcome, Invocation, ToolHandler};

mod adapter;
pub use adapter::{DEFAULT_DISPATCH_TIMEOUT, DEFAULT_SOURCE_ROOT, ServiceAdapter};

mod http;
pub use http::HttpApi;

#[cfg(test)]
mod testing;
