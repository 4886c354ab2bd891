//! Materialize and validate stages: manifest to files on disk.
use std::{
    collections::BTreeMap,
    path::{Component, Path, PathBuf},
};

use tracing::trace;

use taskdock_model::{DeploymentRequest, PathLayout, Stage};

use crate::error::StageError;

/// Files written for one deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Materialized {
    pub workdir: PathBuf,
    /// Written paths relative to `workdir`, `/`-separated, sorted.
    pub files: Vec<String>,
}

/// Required files resolved inside the working directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub entrypoint: String,
    pub container_file: String,
}

/// Normalize a manifest path to a relative path inside the working directory.
///
/// Absolute paths, `..` components and empty paths are rejected; `.` is dropped.
pub fn normalize_path(raw: &str) -> Result<PathBuf, String> {
    let unified = raw.trim().replace('\\', "/");
    if unified.is_empty() {
        return Err("empty path".into());
    }
    let path = Path::new(&unified);
    let mut out = PathBuf::new();
    for comp in path.components() {
        match comp {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            Component::ParentDir => return Err(format!("path '{raw}' escapes the working directory")),
            Component::RootDir | Component::Prefix(_) => {
                return Err(format!("path '{raw}' must be relative"));
            }
        }
    }
    if out.as_os_str().is_empty() {
        return Err(format!("path '{raw}' names no file"));
    }
    Ok(out)
}

/// Map every manifest entry to its target path under `layout`.
pub fn plan(request: &DeploymentRequest) -> Result<BTreeMap<PathBuf, String>, StageError> {
    let mut targets: BTreeMap<PathBuf, String> = BTreeMap::new();
    for raw in request.files.keys() {
        let rel = normalize_path(raw).map_err(|e| StageError::new(Stage::Materialize, e))?;
        let target = match request.layout {
            PathLayout::Preserve => rel,
            PathLayout::Flatten => match rel.file_name() {
                Some(name) => PathBuf::from(name),
                None => {
                    return Err(StageError::new(
                        Stage::Materialize,
                        format!("path '{raw}' names no file"),
                    ));
                }
            },
        };
        if let Some(prev) = targets.insert(target.clone(), raw.clone()) {
            return Err(StageError::new(
                Stage::Materialize,
                format!(
                    "'{prev}' and '{raw}' both map to '{}'",
                    to_slash(&target)
                ),
            ));
        }
    }
    Ok(targets)
}

/// Write the manifest into a fresh `work_root/dir_name`.
pub async fn materialize(
    work_root: &Path,
    dir_name: &str,
    request: &DeploymentRequest,
) -> Result<Materialized, StageError> {
    request
        .check_manifest()
        .map_err(|e| StageError::new(Stage::Materialize, e.to_string()))?;
    let targets = plan(request)?;

    tokio::fs::create_dir_all(work_root).await.map_err(|e| {
        StageError::new(
            Stage::Materialize,
            format!("cannot create work root {}: {e}", work_root.display()),
        )
    })?;
    let workdir = work_root.join(dir_name);
    tokio::fs::create_dir(&workdir).await.map_err(|e| {
        StageError::new(
            Stage::Materialize,
            format!("cannot create {}: {e}", workdir.display()),
        )
    })?;

    let mut files = Vec::with_capacity(targets.len());
    for (rel, raw) in &targets {
        let Some(blob) = request.files.get(raw) else {
            continue;
        };
        let bytes = blob
            .decode(raw)
            .map_err(|e| StageError::new(Stage::Materialize, e.to_string()))?;
        let dest = workdir.join(rel);
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                StageError::new(Stage::Materialize, format!("cannot write '{raw}': {e}"))
            })?;
        }
        tokio::fs::write(&dest, &bytes)
            .await
            .map_err(|e| StageError::new(Stage::Materialize, format!("cannot write '{raw}': {e}")))?;
        trace!(file = %raw, bytes = bytes.len(), "file materialized");
        files.push(to_slash(rel));
    }
    files.sort();

    Ok(Materialized { workdir, files })
}

/// Find `name` among materialized files: at the root first, else a unique basename match.
fn locate<'a>(files: &'a [String], name: &str) -> Result<&'a str, String> {
    if let Some(root) = files.iter().find(|f| f.as_str() == name) {
        return Ok(root);
    }
    let nested: Vec<&String> = files
        .iter()
        .filter(|f| f.rsplit('/').next() == Some(name))
        .collect();
    match nested.as_slice() {
        [one] => Ok(one.as_str()),
        [] => Err(name.to_string()),
        many => Err(format!(
            "{name} (ambiguous: {})",
            many.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(", ")
        )),
    }
}

/// Check the entrypoint and container descriptor exist; all problems reported at once.
pub fn validate(files: &[String], request: &DeploymentRequest) -> Result<Resolved, StageError> {
    let entrypoint = request.entrypoint();
    let container_file = request.container_file();

    let entry = locate(files, &entrypoint);
    let descriptor = locate(files, container_file);
    match (entry, descriptor) {
        (Ok(e), Ok(d)) => Ok(Resolved {
            entrypoint: e.to_string(),
            container_file: d.to_string(),
        }),
        (e, d) => {
            let missing: Vec<String> = [d.err(), e.err()].into_iter().flatten().collect();
            Err(StageError::new(
                Stage::Validate,
                format!("missing required files: {}", missing.join(", ")),
            ))
        }
    }
}

fn to_slash(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(p) => p.to_str(),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}
