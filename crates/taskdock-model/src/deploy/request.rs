use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize, Serializer};

#[cfg(feature = "schema")]
use schemars::JsonSchema;

use crate::{
    DEFAULT_CONTAINER_FILE, DEFAULT_QUEUE, FileBlob, Manifest,
    error::{ModelError, ModelResult},
    task::check_resource_name,
};

/// How manifest paths are laid out in the working directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "schema", derive(JsonSchema))]
pub enum PathLayout {
    /// Keep relative paths, creating parent directories.
    #[default]
    Preserve,
    /// Write every file under its basename; basename collisions are rejected.
    Flatten,
}

impl FromStr for PathLayout {
    type Err = ModelError;
    fn from_str(s: &str) -> ModelResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "preserve" | "" => Ok(PathLayout::Preserve),
            "flatten" | "flat" => Ok(PathLayout::Flatten),
            other => Err(ModelError::UnknownLayout(other.to_string())),
        }
    }
}

impl fmt::Display for PathLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PathLayout::Preserve => "preserve",
            PathLayout::Flatten => "flatten",
        })
    }
}

impl Serialize for PathLayout {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for PathLayout {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_str(&s).map_err(serde::de::Error::custom)
    }
}

/// One request to turn a manifest into a running worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(JsonSchema))]
pub struct DeploymentRequest {
    pub task_name: String,
    #[serde(default = "default_queue")]
    pub queue: String,
    #[serde(default)]
    pub files: Manifest,
    /// Worker module file. Defaults to `app_<queue>.py`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entrypoint: Option<String>,
    /// Container descriptor file. Defaults to `Dockerfile`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_file: Option<String>,
    /// Number of files the producer meant to send; `0` when not declared.
    #[serde(default)]
    pub file_count: usize,
    #[serde(default)]
    pub layout: PathLayout,
}

fn default_queue() -> String {
    DEFAULT_QUEUE.to_string()
}

impl DeploymentRequest {
    pub fn new(task_name: impl Into<String>, queue: impl Into<String>) -> Self {
        Self {
            task_name: task_name.into(),
            queue: queue.into(),
            files: Manifest::new(),
            entrypoint: None,
            container_file: None,
            file_count: 0,
            layout: PathLayout::default(),
        }
    }

    pub fn with_file(mut self, path: impl Into<String>, blob: FileBlob) -> Self {
        self.files.insert(path.into(), blob);
        self
    }

    pub fn with_files(mut self, files: Manifest) -> Self {
        self.files = files;
        self
    }

    pub fn with_entrypoint(mut self, name: impl Into<String>) -> Self {
        self.entrypoint = Some(name.into());
        self
    }

    pub fn with_container_file(mut self, name: impl Into<String>) -> Self {
        self.container_file = Some(name.into());
        self
    }

    pub fn with_file_count(mut self, count: usize) -> Self {
        self.file_count = count;
        self
    }

    pub fn with_layout(mut self, layout: PathLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Effective entrypoint file name.
    pub fn entrypoint(&self) -> String {
        match self.entrypoint.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => format!("app_{}.py", self.queue),
        }
    }

    /// Effective container descriptor file name.
    pub fn container_file(&self) -> &str {
        match self.container_file.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name,
            _ => DEFAULT_CONTAINER_FILE,
        }
    }

    /// Check the request shape before anything touches the filesystem.
    ///
    /// Rules:
    /// - task name and queue are usable in paths and container names;
    /// - the manifest is non-empty;
    /// - a declared file count matches the manifest size.
    pub fn check_manifest(&self) -> ModelResult<()> {
        check_resource_name("task_name", &self.task_name)?;
        check_resource_name("queue", &self.queue)?;

        if self.files.is_empty() {
            return Err(ModelError::Invalid("manifest contains no files".into()));
        }
        if self.file_count != 0 && self.file_count != self.files.len() {
            return Err(ModelError::Invalid(format!(
                "manifest declares {} files but carries {}",
                self.file_count,
                self.files.len()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entrypoint_defaults_from_queue() {
        let req = DeploymentRequest::new("resize_image", "images");
        assert_eq!(req.entrypoint(), "app_images.py");
        assert_eq!(req.container_file(), "Dockerfile");

        let custom = req.with_entrypoint("worker.py").with_container_file("Containerfile");
        assert_eq!(custom.entrypoint(), "worker.py");
        assert_eq!(custom.container_file(), "Containerfile");
    }

    #[test]
    fn blank_overrides_fall_back_to_defaults() {
        let req = DeploymentRequest::new("t", "q")
            .with_entrypoint("  ")
            .with_container_file("");
        assert_eq!(req.entrypoint(), "app_q.py");
        assert_eq!(req.container_file(), "Dockerfile");
    }

    #[test]
    fn check_manifest_rejects_empty_and_miscounted() {
        let empty = DeploymentRequest::new("t", "q");
        assert!(empty.check_manifest().is_err());

        let miscounted = DeploymentRequest::new("t", "q")
            .with_file("app_q.py", FileBlob::text("x"))
            .with_file_count(2);
        let err = miscounted.check_manifest().unwrap_err();
        assert!(err.to_string().contains("declares 2 files but carries 1"), "got: {err}");

        let ok = DeploymentRequest::new("t", "q")
            .with_file("app_q.py", FileBlob::text("x"))
            .with_file_count(1);
        assert!(ok.check_manifest().is_ok());
    }

    #[test]
    fn check_manifest_rejects_unsafe_names() {
        let escaping = DeploymentRequest::new("../x", "q").with_file("app_q.py", FileBlob::text("x"));
        let err = escaping.check_manifest().unwrap_err();
        assert!(err.to_string().contains("task_name '../x'"), "got: {err}");

        let tagged = DeploymentRequest::new("t", "a/b:c").with_file("app.py", FileBlob::text("x"));
        let err = tagged.check_manifest().unwrap_err();
        assert!(err.to_string().contains("queue 'a/b:c'"), "got: {err}");
    }

    #[test]
    fn layout_parses_and_defaults_to_preserve() {
        assert_eq!(PathLayout::default(), PathLayout::Preserve);
        assert_eq!("FLATTEN".parse::<PathLayout>().unwrap(), PathLayout::Flatten);
        assert!("tree".parse::<PathLayout>().is_err());

        let req: DeploymentRequest =
            serde_json::from_str(r#"{"task_name":"t","files":{}}"#).unwrap();
        assert_eq!(req.layout, PathLayout::Preserve);
        assert_eq!(req.queue, "celery");
    }
}
