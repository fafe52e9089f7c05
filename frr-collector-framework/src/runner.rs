//! Command execution against the routing daemon's management shell.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tracing::{debug, trace, warn};

use crate::error::CommandError;

/// Executes a single command against the management shell.
///
/// Implementations are pure transports: they return the raw text the shell
/// produced and leave interpretation to the collector. Every call must be
/// bounded by [`timeout`](CommandRunner::timeout).
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `command` and return its standard output.
    async fn run(&self, command: &str) -> Result<String, CommandError>;

    /// Upper bound on a single [`run`](CommandRunner::run) call.
    fn timeout(&self) -> Duration;
}

/// [`CommandRunner`] backed by FRR's `vtysh`, invoked as `vtysh -c <command>`.
///
/// Every call spawns its own process and tears it down before returning, so
/// concurrent calls never share a shell session. On Unix the shell runs in a
/// process group of its own. A call that outlives the timeout kills the whole
/// group, so wrappers such as `sudo vtysh` or shell scripts leave nothing
/// behind, and then reaps the shell. Dropping the future of an in-flight call
/// (for example when the HTTP client disconnects) kills the group as well.
#[derive(Debug, Clone)]
pub struct VtyshRunner {
    path: PathBuf,
    timeout: Duration,
}

impl VtyshRunner {
    /// Create a runner for the shell binary at `path`.
    pub fn new(path: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            path: path.into(),
            timeout,
        }
    }

    /// Path of the shell binary.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl CommandRunner for VtyshRunner {
    async fn run(&self, command: &str) -> Result<String, CommandError> {
        trace!(path = %self.path.display(), command, "Running shell command");

        let mut shell = Command::new(&self.path);
        shell
            .arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        shell.process_group(0);

        let mut child = shell.spawn().map_err(|source| CommandError::Spawn {
            path: self.path.clone(),
            source,
        })?;
        // Declared after `child` so the group is signalled before the child is dropped.
        let mut group = ProcessGroup::new(child.id());

        let outcome = tokio::time::timeout(self.timeout, wait_with_output(&mut child)).await;

        let (status, stdout, stderr) = match outcome {
            Ok(result) => result.map_err(|source| CommandError::Io {
                command: command.to_string(),
                source,
            })?,
            Err(_) => {
                group.kill();
                if let Err(e) = child.kill().await {
                    warn!(command, error = %e, "Failed to kill timed out shell");
                }
                return Err(CommandError::Timeout {
                    command: command.to_string(),
                    timeout: self.timeout,
                });
            }
        };

        let stdout = String::from_utf8_lossy(&stdout).into_owned();
        let stderr = String::from_utf8_lossy(&stderr).into_owned();

        if !status.success() {
            return Err(CommandError::Exit {
                command: command.to_string(),
                status: status.code(),
                stderr,
                stdout,
            });
        }

        debug!(command, bytes = stdout.len(), "Shell command completed");
        Ok(stdout)
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// Process group led by a spawned shell. Killed on drop unless already killed.
struct ProcessGroup {
    id: Option<u32>,
}

impl ProcessGroup {
    fn new(id: Option<u32>) -> Self {
        Self { id }
    }

    /// SIGKILL every process in the group. Must run before the leader is reaped.
    fn kill(&mut self) {
        if let Some(id) = self.id.take() {
            kill_process_group(id);
        }
    }
}

impl Drop for ProcessGroup {
    fn drop(&mut self) {
        self.kill();
    }
}

#[cfg(unix)]
fn kill_process_group(id: u32) {
    let Ok(pgid) = libc::pid_t::try_from(id) else {
        return;
    };
    // SAFETY: killpg only sends a signal and touches no memory.
    let result = unsafe { libc::killpg(pgid, libc::SIGKILL) };
    if result != 0 {
        let err = std::io::Error::last_os_error();
        // ESRCH: every process of the group has already exited.
        if err.raw_os_error() != Some(libc::ESRCH) {
            warn!(pgid, error = %err, "Failed to kill shell process group");
        }
    }
}

#[cfg(not(unix))]
fn kill_process_group(_id: u32) {}

/// Drain stdout and stderr concurrently while waiting for the child to exit.
async fn wait_with_output(child: &mut Child) -> std::io::Result<(ExitStatus, Vec<u8>, Vec<u8>)> {
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let (status, stdout, stderr) =
        tokio::try_join!(child.wait(), read_all(stdout), read_all(stderr))?;

    Ok((status, stdout, stderr))
}

async fn read_all<R: AsyncRead + Unpin>(reader: Option<R>) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    if let Some(mut reader) = reader {
        reader.read_to_end(&mut buf).await?;
    }
    Ok(buf)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Instant;

    // `/bin/sh -c <command>` has the same calling convention as `vtysh -c`.
    fn shell(timeout: Duration) -> VtyshRunner {
        VtyshRunner::new("/bin/sh", timeout)
    }

    #[tokio::test]
    async fn test_run_captures_stdout() {
        let runner = shell(Duration::from_secs(5));

        let output = runner.run("echo '{\"peers\": {}}'").await.unwrap();

        assert_eq!(output, "{\"peers\": {}}\n");
    }

    #[tokio::test]
    async fn test_run_non_zero_exit() {
        let runner = shell(Duration::from_secs(5));

        let err = runner
            .run("echo partial; echo '% Unknown command' >&2; exit 3")
            .await
            .unwrap_err();

        match err {
            CommandError::Exit {
                status,
                stderr,
                stdout,
                ..
            } => {
                assert_eq!(status, Some(3));
                assert_eq!(stderr, "% Unknown command\n");
                assert_eq!(stdout, "partial\n");
            }
            other => panic!("expected exit error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_run_missing_binary() {
        let runner = VtyshRunner::new("/nonexistent/vtysh", Duration::from_secs(1));

        let err = runner.run("show bfd peers json").await.unwrap_err();

        assert!(matches!(err, CommandError::Spawn { .. }));
        assert!(err.to_string().contains("/nonexistent/vtysh"));
    }

    #[tokio::test]
    async fn test_run_times_out_and_returns_promptly() {
        let timeout = Duration::from_millis(200);
        let runner = shell(timeout);

        let start = Instant::now();
        let err = runner.run("sleep 10").await.unwrap_err();
        let elapsed = start.elapsed();

        assert!(matches!(err, CommandError::Timeout { .. }));
        assert!(elapsed >= timeout);
        assert!(elapsed < Duration::from_secs(5), "took {elapsed:?}");
    }

    /// Whether `pid` is alive. Zombies waiting for a reaper count as dead.
    #[cfg(target_os = "linux")]
    fn is_running(pid: &str) -> bool {
        match std::fs::read_to_string(format!("/proc/{pid}/stat")) {
            Ok(stat) => stat
                .rsplit(')')
                .next()
                .and_then(|rest| rest.trim_start().chars().next())
                .is_some_and(|state| state != 'Z' && state != 'X'),
            Err(_) => false,
        }
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_timeout_kills_descendants() {
        let dir = tempfile::tempdir().unwrap();
        let pid_file = dir.path().join("sleeper.pid");
        let runner = shell(Duration::from_millis(300));

        // The shell forks a grandchild and waits on it, like `sudo vtysh` would.
        let command = format!(
            "sleep 7777 & echo $! > {}; wait",
            pid_file.display()
        );
        let err = runner.run(&command).await.unwrap_err();
        assert!(matches!(err, CommandError::Timeout { .. }));

        let pid = std::fs::read_to_string(&pid_file).unwrap();
        let pid = pid.trim();
        assert!(!pid.is_empty());

        let deadline = Instant::now() + Duration::from_secs(2);
        while is_running(pid) && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(!is_running(pid), "descendant {pid} survived the timeout");
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_cancelled_call_kills_descendants() {
        let dir = tempfile::tempdir().unwrap();
        let pid_file = dir.path().join("sleeper.pid");
        let runner = shell(Duration::from_secs(30));

        let command = format!(
            "sleep 7777 & echo $! > {}; wait",
            pid_file.display()
        );
        let cancelled =
            tokio::time::timeout(Duration::from_millis(300), runner.run(&command)).await;
        assert!(cancelled.is_err());

        let pid = std::fs::read_to_string(&pid_file).unwrap();
        let pid = pid.trim();

        let deadline = Instant::now() + Duration::from_secs(2);
        while is_running(pid) && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(!is_running(pid), "descendant {pid} survived cancellation");
    }

    #[tokio::test]
    async fn test_runner_is_reusable() {
        let runner = shell(Duration::from_secs(5));

        for i in 0..3 {
            let output = runner.run(&format!("echo {i}")).await.unwrap();
            assert_eq!(output.trim(), i.to_string());
        }
        assert_eq!(runner.timeout(), Duration::from_secs(5));
        assert_eq!(runner.path(), Path::new("/bin/sh"));
    }
}
