use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use taskdock_core::CoreError;
use taskdock_model::{FileBlob, Manifest};

/// Extensions picked up when reading a source folder.
const SOURCE_EXTENSIONS: &[&str] = &[
    "py", "js", "ts", "jsx", "tsx", "html", "css", "java", "cpp", "c", "h", "cs", "php", "rb",
    "go", "rs", "swift", "kt", "scala", "sh", "sql", "json", "xml", "yaml", "yml", "md", "txt",
    "ini", "conf", "cfg", "properties",
];

/// Extensionless file names picked up when reading a source folder.
const SOURCE_NAMES: &[&str] = &[
    "Dockerfile",
    "Containerfile",
    "Makefile",
    "Jenkinsfile",
    "Procfile",
    "Rakefile",
    "Gemfile",
    "Vagrantfile",
    "Brewfile",
];

fn is_source_file(path: &Path) -> bool {
    let by_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| SOURCE_NAMES.contains(&n));
    let by_ext = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| SOURCE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()));
    by_name || by_ext
}

/// Build a manifest from the source files under `dir`, keyed by `/`-separated relative path.
///
/// Valid UTF-8 files become text blobs, everything else base64 binary blobs. Unreadable
/// files are skipped with a warning.
pub async fn read_manifest(dir: &Path) -> Result<Manifest, CoreError> {
    let meta = tokio::fs::metadata(dir)
        .await
        .map_err(|_| CoreError::NotFound(format!("folder {}", dir.display())))?;
    if !meta.is_dir() {
        return Err(CoreError::Validation(format!(
            "{} is not a directory",
            dir.display()
        )));
    }

    let mut manifest = Manifest::new();
    let mut pending: Vec<PathBuf> = vec![dir.to_path_buf()];
    while let Some(current) = pending.pop() {
        let mut entries = tokio::fs::read_dir(&current).await.map_err(|e| {
            CoreError::Validation(format!("cannot read {}: {e}", current.display()))
        })?;
        while let Some(entry) = entries.next_entry().await.map_err(|e| {
            CoreError::Validation(format!("cannot read {}: {e}", current.display()))
        })? {
            let path = entry.path();
            let Ok(kind) = entry.file_type().await else {
                continue;
            };
            if kind.is_dir() {
                pending.push(path);
                continue;
            }
            if !kind.is_file() || !is_source_file(&path) {
                continue;
            }
            let Some(rel) = relative_key(dir, &path) else {
                continue;
            };
            match tokio::fs::read(&path).await {
                Ok(bytes) => {
                    manifest.insert(rel, FileBlob::from_bytes(bytes));
                }
                Err(e) => warn!(file = %path.display(), error = %e, "skipping unreadable file"),
            }
        }
    }

    debug!(folder = %dir.display(), files = manifest.len(), "folder read");
    Ok(manifest)
}

fn relative_key(base: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(base).ok()?;
    let parts: Vec<&str> = rel.iter().map(|p| p.to_str()).collect::<Option<_>>()?;
    Some(parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskdock_model::FileKind;

    #[tokio::test]
    async fn reads_source_files_recursively() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::write(root.join("Dockerfile"), "FROM python:3.11\n").unwrap();
        std::fs::write(root.join("app_images.py"), "from celery import Celery\n").unwrap();
        std::fs::create_dir_all(root.join("pkg/data")).unwrap();
        std::fs::write(root.join("pkg/data/weights.json"), [0xffu8, 0xfe, 0x00]).unwrap();
        std::fs::write(root.join("pkg/ignored.bin"), [1u8, 2, 3]).unwrap();

        let manifest = read_manifest(root).await.unwrap();
        let keys: Vec<&str> = manifest.keys().map(|k| k.as_str()).collect();
        assert_eq!(keys, vec!["Dockerfile", "app_images.py", "pkg/data/weights.json"]);

        assert_eq!(manifest["Dockerfile"].kind, FileKind::Text);
        assert_eq!(manifest["pkg/data/weights.json"].kind, FileKind::Binary);
        assert_eq!(
            manifest["pkg/data/weights.json"].decode("w").unwrap(),
            vec![0xff, 0xfe, 0x00]
        );
    }

    #[tokio::test]
    async fn missing_folder_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_manifest(&dir.path().join("nope")).await.unwrap_err();
        assert!(matches!(err, CoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn file_is_not_a_folder() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("Dockerfile");
        std::fs::write(&file, "FROM scratch").unwrap();
        assert!(matches!(
            read_manifest(&file).await.unwrap_err(),
            CoreError::Validation(_)
        ));
    }
}
