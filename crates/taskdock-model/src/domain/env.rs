use std::fmt;

use serde::{Deserialize, Serialize};

use crate::KeyValue;

/// Environment injected into a launched worker container.
///
/// Later entries override earlier ones on lookup, so merging is concatenation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Env(pub Vec<KeyValue>);

impl Env {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &KeyValue> {
        self.0.iter()
    }

    /// Builder-style append.
    pub fn with<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.push(key, value);
        self
    }

    pub fn push<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.0.push(KeyValue::new(key, value));
    }

    /// Value of the last entry named `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .rev()
            .find(|kv| kv.key() == key)
            .map(|kv| kv.value())
    }

    /// Concatenate, letting `other` override.
    pub fn merged(&self, other: &Env) -> Env {
        let mut out = self.0.clone();
        out.extend(other.0.iter().cloned());
        Env(out)
    }

    /// Effective variables with overrides resolved, in first-seen key order.
    pub fn resolved(&self) -> Vec<KeyValue> {
        let mut out: Vec<KeyValue> = Vec::with_capacity(self.0.len());
        for kv in &self.0 {
            match out.iter_mut().find(|e| e.key() == kv.key()) {
                Some(slot) => *slot = kv.clone(),
                None => out.push(kv.clone()),
            }
        }
        out
    }
}

/// Key list only; values may carry credentials.
impl fmt::Display for Env {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<&str> = Vec::new();
        for kv in &self.0 {
            if !keys.contains(&kv.key()) {
                keys.push(kv.key());
            }
        }
        write!(f, "[{}]", keys.join(", "))
    }
}
