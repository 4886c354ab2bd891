use taskdock_model::{ALL_TASKS_KEY, CATEGORY_KEY_PREFIX, TASK_KEY_PREFIX};

/// Registry key layout.
///
/// With the default empty prefix the keys are `task:<name>`, `category:<category>`
/// and `all_tasks`. A prefix (e.g. `celery:`) is prepended to every key, which lets
/// several registries share one database.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeySchema {
    prefix: String,
}

impl KeySchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    #[inline]
    pub fn task_key(&self, name: &str) -> String {
        format!("{}{}{}", self.prefix, TASK_KEY_PREFIX, name)
    }

    #[inline]
    pub fn category_key(&self, category: &str) -> String {
        format!("{}{}", self.category_prefix(), category)
    }

    /// Common prefix of every category set key.
    #[inline]
    pub fn category_prefix(&self) -> String {
        format!("{}{}", self.prefix, CATEGORY_KEY_PREFIX)
    }

    #[inline]
    pub fn all_tasks_key(&self) -> String {
        format!("{}{}", self.prefix, ALL_TASKS_KEY)
    }

    /// Category name from a full category key, if the key belongs to this schema.
    pub fn category_from_key<'a>(&self, key: &'a str) -> Option<&'a str> {
        key.strip_prefix(&self.category_prefix())
            .filter(|c| !c.is_empty())
    }
}
