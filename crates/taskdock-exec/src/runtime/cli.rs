use std::{path::Path, time::Duration};

use async_trait::async_trait;
use tracing::{debug, instrument};

use taskdock_model::{Labels, Liveness};

use crate::{
    error::RuntimeError,
    runtime::{
        CommandOutput, ContainerInfo, ContainerRuntime, ContainerState, RunSpec, run_checked,
    },
};

/// Field separator of the listing template.
const LIST_SEP: char = '\t';
const LIST_FORMAT: &str = "{{.Names}}\t{{.Image}}\t{{.Status}}\t{{.CreatedAt}}\t{{.Labels}}";

/// Runtime driven through the `docker` (or a compatible, e.g. `podman`) CLI.
#[derive(Debug, Clone)]
pub struct CliRuntime {
    binary: String,
    control_timeout: Duration,
}

impl Default for CliRuntime {
    fn default() -> Self {
        Self::new("docker")
    }
}

impl CliRuntime {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            control_timeout: Duration::from_secs(30),
        }
    }

    /// Timeout for stop/remove/inspect/list calls.
    #[inline]
    pub fn with_control_timeout(mut self, timeout: Duration) -> Self {
        self.control_timeout = timeout;
        self
    }

    #[inline]
    pub fn binary(&self) -> &str {
        &self.binary
    }

    async fn control(&self, args: Vec<String>) -> Result<CommandOutput, RuntimeError> {
        run_checked(&self.binary, &args, None, self.control_timeout).await
    }
}

/// Arguments of `run -d` for `spec`.
pub(crate) fn run_args(spec: &RunSpec) -> Vec<String> {
    let mut args = vec![
        "run".to_string(),
        "-d".to_string(),
        "--name".to_string(),
        spec.name.clone(),
        "--restart".to_string(),
        spec.restart.to_runtime_arg(),
    ];
    for kv in spec.env.iter() {
        args.push("-e".into());
        args.push(kv.to_assignment());
    }
    for (k, v) in spec.labels.iter() {
        args.push("--label".into());
        args.push(format!("{k}={v}"));
    }
    args.push(spec.image.clone());
    args.extend(spec.command.iter().cloned());
    args
}

/// Parse the tab separated listing produced by [`LIST_FORMAT`].
pub(crate) fn parse_listing(raw: &str) -> Vec<ContainerInfo> {
    raw.lines()
        .filter(|l| !l.trim().is_empty())
        .filter_map(|line| {
            let mut cols = line.splitn(5, LIST_SEP);
            let name = cols.next()?.trim().to_string();
            if name.is_empty() {
                return None;
            }
            Some(ContainerInfo {
                name,
                image: cols.next().unwrap_or_default().trim().to_string(),
                status: cols.next().unwrap_or_default().trim().to_string(),
                created: cols.next().unwrap_or_default().trim().to_string(),
                labels: Labels::parse_listing(cols.next().unwrap_or_default()),
            })
        })
        .collect()
}

#[async_trait]
impl ContainerRuntime for CliRuntime {
    fn name(&self) -> &'static str {
        "cli"
    }

    #[instrument(level = "debug", skip(self, context), fields(binary = %self.binary))]
    async fn build_image(
        &self,
        context: &Path,
        tag: &str,
        container_file: &str,
        timeout: Duration,
    ) -> Result<CommandOutput, RuntimeError> {
        let args = vec![
            "build".to_string(),
            "-t".to_string(),
            tag.to_string(),
            "-f".to_string(),
            container_file.to_string(),
            ".".to_string(),
        ];
        run_checked(&self.binary, &args, Some(context), timeout).await
    }

    async fn stop_container(&self, name: &str) -> Result<(), RuntimeError> {
        self.control(vec!["stop".into(), name.into()]).await?;
        Ok(())
    }

    async fn remove_container(&self, name: &str) -> Result<(), RuntimeError> {
        self.control(vec!["rm".into(), name.into()]).await?;
        Ok(())
    }

    #[instrument(level = "debug", skip(self, spec), fields(container = %spec.name, image = %spec.image))]
    async fn run_container(
        &self,
        spec: &RunSpec,
        timeout: Duration,
    ) -> Result<String, RuntimeError> {
        let out = run_checked(&self.binary, &run_args(spec), None, timeout).await?;
        let id = out.stdout.trim().to_string();
        debug!(container = %spec.name, id = %id, "container started");
        Ok(id)
    }

    async fn inspect_container(&self, name: &str) -> Result<ContainerState, RuntimeError> {
        let out = self
            .control(vec![
                "inspect".into(),
                "--format".into(),
                "{{.State.Status}}".into(),
                name.into(),
            ])
            .await?;
        let status = out.stdout.trim().to_string();
        Ok(ContainerState {
            liveness: Liveness::from_state(&status),
            status,
        })
    }

    async fn list_containers(&self, label_key: &str) -> Result<Vec<ContainerInfo>, RuntimeError> {
        let out = self
            .control(vec![
                "ps".into(),
                "-a".into(),
                "--filter".into(),
                format!("label={label_key}"),
                "--format".into(),
                LIST_FORMAT.into(),
            ])
            .await?;
        Ok(parse_listing(&out.stdout))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskdock_model::{Env, RestartPolicy};

    #[test]
    fn run_args_carry_env_labels_and_command() {
        let mut labels = Labels::new();
        labels.insert("taskdock.task", "resize_image");
        let spec = RunSpec {
            name: "resize_image_images_worker".into(),
            image: "celery-resize-image:abc".into(),
            env: Env::new().with("REDIS_HOST", "redis").with("C_FORCE_ROOT", "1"),
            labels,
            restart: RestartPolicy::default(),
            command: vec!["celery".into(), "-A".into(), "app_images".into()],
        };

        let args = run_args(&spec);
        assert_eq!(&args[..4], &["run", "-d", "--name", "resize_image_images_worker"]);
        assert_eq!(args[4], "--restart");
        assert!(args.windows(2).any(|w| w[0] == "-e" && w[1] == "REDIS_HOST=redis"));
        assert!(args.windows(2).any(|w| w[0] == "--label" && w[1] == "taskdock.task=resize_image"));

        let image_at = args.iter().position(|a| a == "celery-resize-image:abc").unwrap();
        assert_eq!(&args[image_at + 1..], &["celery", "-A", "app_images"]);
    }

    #[test]
    fn listing_rows_are_parsed() {
        let raw = "a_q_worker\tcelery-a:1\tUp 2 minutes\t2024-05-01 10:00:00 +0000 UTC\ttaskdock.task=a,taskdock.queue=q\n\
                   \n\
                   b_q_worker\tcelery-b:2\tExited (1) 1 hour ago\t2024-05-01 09:00:00 +0000 UTC\t\n";
        let rows = parse_listing(raw);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].name, "a_q_worker");
        assert_eq!(rows[0].labels.get("taskdock.queue"), Some("q"));
        assert_eq!(rows[1].status, "Exited (1) 1 hour ago");
        assert!(rows[1].labels.is_empty());
    }
}
