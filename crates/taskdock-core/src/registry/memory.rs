use std::{
    collections::{BTreeSet, HashMap},
    sync::atomic::{AtomicBool, Ordering},
};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::registry::{
    codec::{FIELD_CATEGORY, FIELD_CREATED_AT},
    store::{IndexedRemoval, IndexedWrite, RegistryStore, StoreError, WriteOutcome},
};

#[derive(Default)]
struct State {
    hashes: HashMap<String, HashMap<String, String>>,
    sets: HashMap<String, BTreeSet<String>>,
}

/// In-process [`RegistryStore`].
///
/// Compound writes run under one mutex, so they are atomic with respect to each
/// other. Availability can be switched off to simulate an unreachable store.
pub struct MemoryStore {
    state: Mutex<State>,
    available: AtomicBool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            available: AtomicBool::new(true),
        }
    }

    /// Toggle simulated reachability.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable("memory store switched off".into()))
        }
    }
}

#[async_trait]
impl RegistryStore for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.check()
    }

    async fn read_hash(&self, key: &str) -> Result<HashMap<String, String>, StoreError> {
        self.check()?;
        Ok(self.state.lock().hashes.get(key).cloned().unwrap_or_default())
    }

    async fn read_set(&self, key: &str) -> Result<Vec<String>, StoreError> {
        self.check()?;
        Ok(self
            .state
            .lock()
            .sets
            .get(key)
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn set_len(&self, key: &str) -> Result<u64, StoreError> {
        self.check()?;
        Ok(self.state.lock().sets.get(key).map_or(0, |s| s.len() as u64))
    }

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        self.check()?;
        let state = self.state.lock();
        let mut keys: Vec<String> = state
            .hashes
            .keys()
            .chain(state.sets.keys())
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();
        keys.sort();
        keys.dedup();
        Ok(keys)
    }

    async fn write_indexed(&self, write: IndexedWrite) -> Result<WriteOutcome, StoreError> {
        self.check()?;
        let mut state = self.state.lock();

        let existed = state.hashes.contains_key(&write.hash_key);
        if write.require_existing && !existed {
            return Ok(WriteOutcome::Missing);
        }

        let hash = state.hashes.entry(write.hash_key.clone()).or_default();
        let old_category = hash.get(FIELD_CATEGORY).cloned();
        for (k, v) in write.fields {
            hash.insert(k, v);
        }
        hash.entry(FIELD_CREATED_AT.to_string())
            .or_insert(write.created_at);
        let new_category = hash
            .entry(FIELD_CATEGORY.to_string())
            .or_insert(write.default_category)
            .clone();

        if let Some(old) = old_category.filter(|old| *old != new_category) {
            let old_key = format!("{}{}", write.category_prefix, old);
            leave_set(&mut state.sets, &old_key, &write.member);
        }
        state
            .sets
            .entry(format!("{}{}", write.category_prefix, new_category))
            .or_default()
            .insert(write.member.clone());
        state
            .sets
            .entry(write.all_key)
            .or_default()
            .insert(write.member);

        Ok(if existed {
            WriteOutcome::Updated
        } else {
            WriteOutcome::Created
        })
    }

    async fn remove_indexed(&self, removal: IndexedRemoval) -> Result<bool, StoreError> {
        self.check()?;
        let mut state = self.state.lock();

        let category = state
            .hashes
            .get(&removal.hash_key)
            .and_then(|h| h.get(FIELD_CATEGORY).cloned());
        if let Some(category) = category {
            let key = format!("{}{}", removal.category_prefix, category);
            leave_set(&mut state.sets, &key, &removal.member);
        }
        leave_set(&mut state.sets, &removal.all_key, &removal.member);
        Ok(state.hashes.remove(&removal.hash_key).is_some())
    }
}

/// Drop `member` from a set; empty sets disappear, as they do in Redis.
fn leave_set(sets: &mut HashMap<String, BTreeSet<String>>, key: &str, member: &str) {
    let emptied = match sets.get_mut(key) {
        Some(set) => {
            set.remove(member);
            set.is_empty()
        }
        None => false,
    };
    if emptied {
        sets.remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(name: &str, category: &str, require_existing: bool) -> IndexedWrite {
        IndexedWrite {
            hash_key: format!("task:{name}"),
            all_key: "all_tasks".into(),
            category_prefix: "category:".into(),
            member: name.into(),
            require_existing,
            created_at: "2024-01-01T00:00:00Z".into(),
            default_category: "general".into(),
            fields: vec![
                ("name".into(), name.into()),
                ("category".into(), category.into()),
            ],
        }
    }

    #[tokio::test]
    async fn write_moves_category_membership() {
        let store = MemoryStore::new();
        assert_eq!(
            store.write_indexed(write("t", "a", false)).await.unwrap(),
            WriteOutcome::Created
        );
        assert_eq!(
            store.write_indexed(write("t", "b", false)).await.unwrap(),
            WriteOutcome::Updated
        );

        assert!(store.read_set("category:a").await.unwrap().is_empty());
        assert_eq!(store.read_set("category:b").await.unwrap(), vec!["t"]);
        assert_eq!(store.set_len("all_tasks").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn require_existing_writes_nothing_when_absent() {
        let store = MemoryStore::new();
        let outcome = store.write_indexed(write("t", "a", true)).await.unwrap();

        assert_eq!(outcome, WriteOutcome::Missing);
        assert!(store.read_hash("task:t").await.unwrap().is_empty());
        assert!(store.keys_with_prefix("").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn created_at_is_kept_on_rewrite() {
        let store = MemoryStore::new();
        store.write_indexed(write("t", "a", false)).await.unwrap();

        let mut second = write("t", "a", false);
        second.created_at = "2030-01-01T00:00:00Z".into();
        store.write_indexed(second).await.unwrap();

        let hash = store.read_hash("task:t").await.unwrap();
        assert_eq!(hash["created_at"], "2024-01-01T00:00:00Z");
    }

    #[tokio::test]
    async fn unavailable_store_errors_everywhere() {
        let store = MemoryStore::new();
        store.set_available(false);

        assert!(matches!(store.ping().await, Err(StoreError::Unavailable(_))));
        assert!(store.read_hash("task:t").await.is_err());
        assert!(store.write_indexed(write("t", "a", false)).await.is_err());

        store.set_available(true);
        assert!(store.ping().await.is_ok());
    }
}
