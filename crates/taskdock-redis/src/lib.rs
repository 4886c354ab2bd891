//! Redis backends: the registry store and a Celery-protocol broker.
mod store;
pub use store::RedisStore;

mod celery;
pub use celery::{CeleryBroker, decode_meta, encode_message};

use taskdock_core::{BrokerError, StoreError};

/// Connect and return a multiplexed connection.
pub(crate) async fn connect(
    url: &str,
) -> Result<redis::aio::MultiplexedConnection, redis::RedisError> {
    let client = redis::Client::open(url)?;
    client.get_multiplexed_async_connection().await
}

pub(crate) fn store_error(err: redis::RedisError, key: &str) -> StoreError {
    if err.code() == Some("WRONGTYPE") {
        StoreError::Corrupt(format!("{key}: {err}"))
    } else {
        StoreError::Unavailable(format!("redis error for {key}: {err}"))
    }
}

pub(crate) fn broker_error(err: redis::RedisError, key: &str) -> BrokerError {
    BrokerError::Unavailable(format!("redis error for {key}: {err}"))
}
