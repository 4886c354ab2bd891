use serde::{Deserialize, Serialize};

/// Key–value pair used for container environment variables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValue {
    key: String,
    value: String,
}

impl KeyValue {
    /// Create a new key–value pair.
    pub fn new<K, V>(key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    /// Render as a `KEY=VALUE` assignment, the form container runtimes accept for `-e`.
    pub fn to_assignment(&self) -> String {
        format!("{}={}", self.key, self.value)
    }
}

impl From<(&str, &str)> for KeyValue {
    fn from((key, value): (&str, &str)) -> Self {
        Self::new(key, value)
    }
}

impl From<(String, String)> for KeyValue {
    fn from((key, value): (String, String)) -> Self {
        Self { key, value }
    }
}
