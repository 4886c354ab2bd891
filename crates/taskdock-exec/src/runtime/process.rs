use std::{path::Path, process::Stdio, time::Duration};

use tokio::{io::AsyncReadExt, process::Command, task::JoinHandle};
use tracing::{trace, warn};

use crate::error::RuntimeError;

/// How long output readers may lag behind process exit.
const OUTPUT_GRACE: Duration = Duration::from_millis(250);

/// Exit status and captured output of one command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    #[inline]
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Stdout and stderr joined, trimmed.
    pub fn combined(&self) -> String {
        let out = self.stdout.trim();
        let err = self.stderr.trim();
        match (out.is_empty(), err.is_empty()) {
            (true, _) => err.to_string(),
            (false, true) => out.to_string(),
            (false, false) => format!("{out}\n{err}"),
        }
    }
}

/// Run `program args..` to completion or until `timeout` expires.
///
/// The child gets its own process group; on timeout the whole group is killed so
/// helpers spawned by the runtime CLI do not outlive the call.
pub async fn run_command(
    program: &str,
    args: &[String],
    cwd: Option<&Path>,
    timeout: Duration,
) -> Result<CommandOutput, RuntimeError> {
    let rendered = render(program, args);
    trace!(command = %rendered, ?cwd, "spawning runtime command");

    let mut cmd = Command::new(program);
    cmd.args(args);
    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());
    cmd.process_group(0);

    let mut child = cmd.spawn().map_err(|e| RuntimeError::Spawn {
        program: program.to_string(),
        reason: e.to_string(),
    })?;
    let pid = child.id();

    let mut stdout = child.stdout.take();
    let stdout_reader = tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Some(h) = stdout.as_mut() {
            let _ = h.read_to_end(&mut buf).await;
        }
        buf
    });
    let mut stderr = child.stderr.take();
    let stderr_reader = tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Some(h) = stderr.as_mut() {
            let _ = h.read_to_end(&mut buf).await;
        }
        buf
    });

    let status = match tokio::time::timeout(timeout, child.wait()).await {
        Ok(res) => res.map_err(|e| RuntimeError::Spawn {
            program: program.to_string(),
            reason: format!("wait failed: {e}"),
        })?,
        Err(_) => {
            if let Some(pid) = pid {
                kill_group(pid);
            }
            let _ = tokio::time::timeout(Duration::from_secs(1), child.wait()).await;
            let partial = CommandOutput {
                code: None,
                stdout: drain(stdout_reader).await,
                stderr: drain(stderr_reader).await,
            };
            warn!(command = %rendered, timeout_ms = timeout.as_millis() as u64, "runtime command timed out");
            return Err(RuntimeError::Timeout {
                command: rendered,
                after_ms: timeout.as_millis() as u64,
                output: partial.combined(),
            });
        }
    };

    let out = CommandOutput {
        code: status.code(),
        stdout: drain(stdout_reader).await,
        stderr: drain(stderr_reader).await,
    };
    trace!(command = %rendered, code = ?out.code, "runtime command finished");
    Ok(out)
}

/// Like [`run_command`], but a non-zero exit is an error carrying the output.
pub async fn run_checked(
    program: &str,
    args: &[String],
    cwd: Option<&Path>,
    timeout: Duration,
) -> Result<CommandOutput, RuntimeError> {
    let out = run_command(program, args, cwd, timeout).await?;
    if out.success() {
        Ok(out)
    } else {
        Err(RuntimeError::Failed {
            command: render(program, args),
            code: out.code,
            output: out.combined(),
        })
    }
}

/// Collect what a reader gathered, giving it [`OUTPUT_GRACE`] to reach EOF.
///
/// A reader still blocked after the grace period (a grandchild holding the pipe)
/// is aborted and contributes nothing.
async fn drain(reader: JoinHandle<Vec<u8>>) -> String {
    let abort = reader.abort_handle();
    match tokio::time::timeout(OUTPUT_GRACE, reader).await {
        Ok(Ok(buf)) => String::from_utf8_lossy(&buf).into_owned(),
        Ok(Err(_)) => String::new(),
        Err(_) => {
            abort.abort();
            String::new()
        }
    }
}

fn kill_group(pid: u32) {
    let pgid = -(pid as libc::pid_t);
    // SAFETY: plain signal delivery to a process group we created.
    unsafe {
        libc::kill(pgid, libc::SIGKILL);
    }
}

fn render(program: &str, args: &[String]) -> String {
    let mut s = program.to_string();
    for a in args.iter().take(3) {
        s.push(' ');
        s.push_str(a);
    }
    if args.len() > 3 {
        s.push_str(" ...");
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn captures_stdout_and_exit_code() {
        let out = run_command("sh", &args(&["-c", "echo hello; echo oops >&2; exit 3"]), None, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(out.code, Some(3));
        assert_eq!(out.stdout.trim(), "hello");
        assert_eq!(out.combined(), "hello\noops");
    }

    #[tokio::test]
    async fn checked_run_reports_failure_output() {
        let err = run_checked("sh", &args(&["-c", "echo broken >&2; exit 1"]), None, Duration::from_secs(5))
            .await
            .unwrap_err();
        match err {
            RuntimeError::Failed { code, output, .. } => {
                assert_eq!(code, Some(1));
                assert_eq!(output, "broken");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn slow_command_is_killed() {
        let err = run_command("sh", &args(&["-c", "sleep 30"]), None, Duration::from_millis(200))
            .await
            .unwrap_err();
        assert!(matches!(err, RuntimeError::Timeout { after_ms: 200, .. }));
    }

    #[tokio::test]
    async fn timeout_keeps_partial_output() {
        let err = run_command(
            "sh",
            &args(&["-c", "echo 'Step 1/4 partial'; sleep 30"]),
            None,
            Duration::from_millis(300),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, RuntimeError::Timeout { after_ms: 300, .. }));
        assert_eq!(err.output(), Some("Step 1/4 partial"));
    }

    #[tokio::test]
    async fn missing_binary_is_spawn_error() {
        let err = run_command("taskdock-no-such-binary", &[], None, Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, RuntimeError::Spawn { .. }));
    }

    #[tokio::test]
    async fn runs_in_working_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("marker.txt"), "x").unwrap();
        let out = run_checked("ls", &[], Some(dir.path()), Duration::from_secs(5))
            .await
            .unwrap();
        assert!(out.stdout.contains("marker.txt"));
    }
}
