//! Task registry: descriptors in a shared key-value store, indexed by category.
//!
//! Layout (see [`KeySchema`]): one hash per task, one set of names per category and
//! one global set of names. Writes that touch more than one key go through the
//! store's atomic compound operations.
mod codec;
pub use codec::{decode_descriptor, encode_descriptor, encode_patch};

mod error;
pub use error::{RegistryError, RegistryResult};

mod keys;
pub use keys::KeySchema;

mod memory;
pub use memory::MemoryStore;

mod store;
pub use store::{IndexedRemoval, IndexedWrite, RegistryStore, StoreError, WriteOutcome};

use std::sync::Arc;

use taskdock_model::{DEFAULT_CATEGORY, DescriptorPatch, TaskDescriptor, Timestamp};
use tracing::{debug, instrument, trace, warn};

use crate::metrics::{MetricsHandle, noop_metrics};

/// Catalog of invocable tasks.
pub struct TaskRegistry {
    store: Arc<dyn RegistryStore>,
    keys: KeySchema,
    metrics: MetricsHandle,
}

impl TaskRegistry {
    pub fn new(store: Arc<dyn RegistryStore>) -> Self {
        Self {
            store,
            keys: KeySchema::default(),
            metrics: noop_metrics(),
        }
    }

    pub fn with_keys(mut self, keys: KeySchema) -> Self {
        self.keys = keys;
        self
    }

    pub fn with_metrics(mut self, metrics: MetricsHandle) -> Self {
        self.metrics = metrics;
        self
    }

    #[inline]
    pub fn keys(&self) -> &KeySchema {
        &self.keys
    }

    /// Check that the backing store answers.
    pub async fn ping(&self) -> RegistryResult<()> {
        let res = self.store.ping().await.map_err(RegistryError::from);
        self.observe("ping", res)
    }

    /// Insert or overwrite a descriptor and its index memberships.
    ///
    /// `created_at` is set on first insert only; `last_updated` on every call.
    /// Re-registering under a different category moves the name between category sets.
    #[instrument(level = "debug", skip(self, descriptor), fields(task = %descriptor.name, category = %descriptor.category))]
    pub async fn register(&self, descriptor: &TaskDescriptor) -> RegistryResult<()> {
        let res = self.register_inner(descriptor).await;
        self.observe("register", res)
    }

    async fn register_inner(&self, descriptor: &TaskDescriptor) -> RegistryResult<()> {
        descriptor
            .validate()
            .map_err(|e| RegistryError::Invalid(e.to_string()))?;

        let now = Timestamp::now();
        let write = self.indexed_write(
            &descriptor.name,
            false,
            now,
            encode_descriptor(descriptor, now),
        );
        let outcome = self.store.write_indexed(write).await?;
        debug!(outcome = ?outcome, "task registered");
        Ok(())
    }

    /// Fetch one descriptor.
    pub async fn get(&self, name: &str) -> RegistryResult<TaskDescriptor> {
        let res = self.load(name).await.and_then(|found| {
            found.ok_or_else(|| RegistryError::NotFound(name.to_string()))
        });
        self.observe("get", res)
    }

    /// Every registered descriptor, ordered by category, then name.
    pub async fn list_all(&self) -> RegistryResult<Vec<TaskDescriptor>> {
        let res = self.list_all_inner().await;
        self.observe("list_all", res)
    }

    async fn list_all_inner(&self) -> RegistryResult<Vec<TaskDescriptor>> {
        let names = self.store.read_set(&self.keys.all_tasks_key()).await?;
        let mut out = self.load_many(&names).await?;
        out.sort_by(|a, b| a.category.cmp(&b.category).then_with(|| a.name.cmp(&b.name)));
        Ok(out)
    }

    /// Descriptors of one category, ordered by name. Unknown categories yield an empty list.
    pub async fn list_by_category(&self, category: &str) -> RegistryResult<Vec<TaskDescriptor>> {
        let res = self.list_by_category_inner(category).await;
        self.observe("list_by_category", res)
    }

    async fn list_by_category_inner(&self, category: &str) -> RegistryResult<Vec<TaskDescriptor>> {
        let names = self.store.read_set(&self.keys.category_key(category)).await?;
        let mut out: Vec<TaskDescriptor> = self
            .load_many(&names)
            .await?
            .into_iter()
            .filter(|d| {
                let keep = d.category == category;
                if !keep {
                    warn!(task = %d.name, indexed = category, stored = %d.category, "skipping stale category entry");
                }
                keep
            })
            .collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(out)
    }

    /// Sorted names of categories that currently have at least one task.
    pub async fn list_categories(&self) -> RegistryResult<Vec<String>> {
        let res = self.list_categories_inner().await;
        self.observe("list_categories", res)
    }

    async fn list_categories_inner(&self) -> RegistryResult<Vec<String>> {
        let prefix = self.keys.category_prefix();
        let keys = self.store.keys_with_prefix(&prefix).await?;

        let mut out = Vec::with_capacity(keys.len());
        for key in &keys {
            let Some(category) = self.keys.category_from_key(key) else {
                continue;
            };
            if self.store.set_len(key).await? > 0 {
                out.push(category.to_string());
            }
        }
        out.sort();
        out.dedup();
        Ok(out)
    }

    /// Delete a descriptor and its index memberships.
    ///
    /// Returns `false` when no descriptor was stored under `name`.
    #[instrument(level = "debug", skip(self))]
    pub async fn remove(&self, name: &str) -> RegistryResult<bool> {
        let removal = IndexedRemoval {
            hash_key: self.keys.task_key(name),
            all_key: self.keys.all_tasks_key(),
            category_prefix: self.keys.category_prefix(),
            member: name.to_string(),
        };
        let res = self
            .store
            .remove_indexed(removal)
            .await
            .map_err(RegistryError::from);
        if let Ok(existed) = res {
            debug!(existed, "task removal finished");
        }
        self.observe("remove", res)
    }

    /// Merge a patch into a stored descriptor.
    ///
    /// Returns `false` when the descriptor does not exist; nothing is written then.
    #[instrument(level = "debug", skip(self, patch))]
    pub async fn update(&self, name: &str, patch: &DescriptorPatch) -> RegistryResult<bool> {
        let res = self.update_inner(name, patch).await;
        self.observe("update", res)
    }

    async fn update_inner(&self, name: &str, patch: &DescriptorPatch) -> RegistryResult<bool> {
        patch
            .validate()
            .map_err(|e| RegistryError::Invalid(e.to_string()))?;

        let now = Timestamp::now();
        let write = self.indexed_write(name, true, now, encode_patch(patch, now));
        match self.store.write_indexed(write).await? {
            WriteOutcome::Missing => {
                debug!("update skipped, task not registered");
                Ok(false)
            }
            outcome => {
                debug!(outcome = ?outcome, "task updated");
                Ok(true)
            }
        }
    }

    fn indexed_write(
        &self,
        name: &str,
        require_existing: bool,
        now: Timestamp,
        fields: Vec<(String, String)>,
    ) -> IndexedWrite {
        IndexedWrite {
            hash_key: self.keys.task_key(name),
            all_key: self.keys.all_tasks_key(),
            category_prefix: self.keys.category_prefix(),
            member: name.to_string(),
            require_existing,
            created_at: now.to_rfc3339(),
            default_category: DEFAULT_CATEGORY.to_string(),
            fields,
        }
    }

    async fn load(&self, name: &str) -> RegistryResult<Option<TaskDescriptor>> {
        let fields = self.store.read_hash(&self.keys.task_key(name)).await?;
        Ok(decode_descriptor(name, fields))
    }

    async fn load_many(&self, names: &[String]) -> RegistryResult<Vec<TaskDescriptor>> {
        let mut out = Vec::with_capacity(names.len());
        for name in names {
            match self.load(name).await? {
                Some(d) => out.push(d),
                None => warn!(task = %name, "index entry without descriptor, skipping"),
            }
        }
        Ok(out)
    }

    fn observe<T>(&self, operation: &'static str, res: RegistryResult<T>) -> RegistryResult<T> {
        match &res {
            Ok(_) => trace!(operation, store = self.store.name(), "registry operation ok"),
            Err(RegistryError::NotFound(_)) => {}
            Err(e) => {
                warn!(operation, store = self.store.name(), error = %e, "registry operation failed");
                self.metrics.record_registry_error(operation, e.kind());
            }
        }
        res
    }
}
