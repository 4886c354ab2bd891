use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0}")]
    Unavailable(String),

    #[error("{0}")]
    Corrupt(String),
}

/// Compound write of one descriptor hash together with its index memberships.
///
/// Executed by the store as one atomic unit:
/// 1. if `require_existing` and the hash is absent, nothing is written;
/// 2. `fields` are written into the hash, `created_at` only if the hash has none;
/// 3. when the stored category changed, `member` leaves the old category set;
/// 4. `member` joins the current category set and the global set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedWrite {
    pub hash_key: String,
    pub all_key: String,
    pub category_prefix: String,
    pub member: String,
    pub require_existing: bool,
    pub created_at: String,
    /// Category used when neither `fields` nor the stored hash carry one.
    pub default_category: String,
    pub fields: Vec<(String, String)>,
}

/// Result of an [`IndexedWrite`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Created,
    Updated,
    /// `require_existing` was set and the hash was absent.
    Missing,
}

/// Compound removal of one descriptor: leave the category set, then the global set,
/// then delete the hash, atomically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedRemoval {
    pub hash_key: String,
    pub all_key: String,
    pub category_prefix: String,
    pub member: String,
}

/// Key-value primitives the task registry needs from its backing store.
///
/// Reads are plain; the two writes are compound and must be atomic so the
/// descriptor hash and both index sets never diverge.
#[async_trait]
pub trait RegistryStore: Send + Sync + 'static {
    /// Backend name for logs.
    fn name(&self) -> &'static str;

    async fn ping(&self) -> Result<(), StoreError>;

    /// All fields of a hash; empty when the key does not exist.
    async fn read_hash(&self, key: &str) -> Result<HashMap<String, String>, StoreError>;

    /// Members of a set; empty when the key does not exist.
    async fn read_set(&self, key: &str) -> Result<Vec<String>, StoreError>;

    async fn set_len(&self, key: &str) -> Result<u64, StoreError>;

    /// Keys starting with `prefix`.
    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError>;

    async fn write_indexed(&self, write: IndexedWrite) -> Result<WriteOutcome, StoreError>;

    /// Returns whether the hash existed.
    async fn remove_indexed(&self, removal: IndexedRemoval) -> Result<bool, StoreError>;
}
