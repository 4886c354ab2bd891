//! Common model-level constants.
//!
//! Well-known keys, names and defaults shared by the registry, the deployment
//! pipeline and the dispatch router.

/// Prefix of a descriptor hash key: `task:<name>`.
pub const TASK_KEY_PREFIX: &str = "task:";

/// Prefix of a category index set key: `category:<category>`.
pub const CATEGORY_KEY_PREFIX: &str = "category:";

/// Key of the global set of registered task names.
pub const ALL_TASKS_KEY: &str = "all_tasks";

/// Queue used when neither the caller nor the registry names one.
pub const DEFAULT_QUEUE: &str = "celery";

/// Category assigned to descriptors stored without one.
pub const DEFAULT_CATEGORY: &str = "general";

/// Return type label assigned to descriptors stored without one.
pub const DEFAULT_RETURN_TYPE: &str = "Any";

/// Application namespace prepended to task names on the broker.
///
/// A task `resize_image` is submitted as `mcp_app.resize_image`.
pub const DEFAULT_APP_NAMESPACE: &str = "mcp_app";

/// Default container descriptor file name.
pub const DEFAULT_CONTAINER_FILE: &str = "Dockerfile";

/// Default image name prefix; images are tagged `<prefix>-<task>:<deployment-id>`.
pub const DEFAULT_IMAGE_PREFIX: &str = "celery";

/// Container label carrying the task name of a deployed worker.
pub const LABEL_TASK: &str = "taskdock.task";

/// Container label carrying the queue a deployed worker consumes.
pub const LABEL_QUEUE: &str = "taskdock.queue";

/// Container label carrying the deployment id that produced the container.
pub const LABEL_DEPLOYMENT: &str = "taskdock.deployment";
