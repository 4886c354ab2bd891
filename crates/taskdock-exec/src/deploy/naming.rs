//! Deterministic names derived from task, queue and deployment id.
use std::path::Path;

use uuid::Uuid;

/// `<task>_<queue>_<deployment-id>`
pub fn deployment_dir_name(task: &str, queue: &str, id: &Uuid) -> String {
    format!("{task}_{queue}_{id}")
}

/// `<prefix>-<task lowercased, '_' replaced by '-'>`
pub fn image_name(prefix: &str, task: &str) -> String {
    let task = task.to_lowercase().replace('_', "-");
    if prefix.is_empty() {
        task
    } else {
        format!("{prefix}-{task}")
    }
}

pub fn image_tag(prefix: &str, task: &str, id: &Uuid) -> String {
    format!("{}:{id}", image_name(prefix, task))
}

/// One worker container per (task, queue).
///
/// Names are joined with `_`, which both parts may contain, so the mapping is not
/// injective: (`a_b`, `c`) and (`a`, `b_c`) share `a_b_c_worker` and redeploying
/// one replaces the other.
pub fn container_name(task: &str, queue: &str) -> String {
    format!("{task}_{queue}_worker")
}

/// `celery -A <entrypoint stem> worker -l info -Q <queue>`
pub fn worker_command(entrypoint: &str, queue: &str) -> Vec<String> {
    let module = Path::new(entrypoint)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(entrypoint);
    ["celery", "-A", module, "worker", "-l", "info", "-Q", queue]
        .iter()
        .map(|s| s.to_string())
        .collect()
}
