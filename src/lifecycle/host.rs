//! Host capability for spawning and signalling server processes

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};

#[cfg(unix)]
use nix::errno::Errno;
#[cfg(unix)]
use nix::sys::signal::{self, Signal};
#[cfg(unix)]
use nix::unistd::Pid;

/// Everything needed to launch one server instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    pub executable: PathBuf,
    pub args: Vec<String>,
    /// Instance directory; the server reads its `cfg/` files relative to it
    pub working_dir: PathBuf,
}

/// Spawns and kills external processes.
///
/// Both calls return as soon as the OS accepted the request. `spawn` does
/// not wait for the child to become ready and a successful `kill` does not
/// prove the process has exited.
#[async_trait]
pub trait ProcessHost: Send + Sync {
    /// Start a process, returning its pid
    async fn spawn(&self, spec: &LaunchSpec) -> Result<u32>;

    /// Ask a process to terminate
    async fn kill(&self, pid: u32) -> Result<()>;

    /// Whether a process with this pid still exists
    async fn is_alive(&self, pid: u32) -> Result<bool>;
}

/// [`ProcessHost`] backed by the operating system
#[derive(Debug, Default, Clone)]
pub struct OsProcessHost;

impl OsProcessHost {
    pub fn new() -> Self {
        Self
    }

    fn spawn_log_readers(child: &mut tokio::process::Child, pid: u32) {
        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stdout).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(pid, "{}", line);
                }
            });
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    warn!(pid, "{}", line);
                }
            });
        }
    }
}

#[async_trait]
impl ProcessHost for OsProcessHost {
    async fn spawn(&self, spec: &LaunchSpec) -> Result<u32> {
        let mut child = Command::new(&spec.executable)
            .args(&spec.args)
            .current_dir(&spec.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| anyhow!("Failed to spawn {}: {}", spec.executable.display(), e))?;

        let pid = child
            .id()
            .ok_or_else(|| anyhow!("Process exited before its pid could be read"))?;

        Self::spawn_log_readers(&mut child, pid);

        // Reap the child so it never lingers as a zombie
        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) => info!(pid, %status, "server process exited"),
                Err(e) => warn!(pid, error = %e, "failed to wait on server process"),
            }
        });

        Ok(pid)
    }

    async fn kill(&self, pid: u32) -> Result<()> {
        #[cfg(unix)]
        {
            let raw = i32::try_from(pid).map_err(|_| anyhow!("Invalid pid {}", pid))?;
            match signal::kill(Pid::from_raw(raw), Signal::SIGTERM) {
                Ok(()) => Ok(()),
                // Already gone
                Err(Errno::ESRCH) => Ok(()),
                Err(e) => Err(anyhow!("Failed to signal pid {}: {}", pid, e)),
            }
        }

        #[cfg(not(unix))]
        {
            let status = Command::new("taskkill")
                .args(["/F", "/PID", &pid.to_string()])
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .await
                .map_err(|e| anyhow!("Failed to run taskkill: {}", e))?;
            if status.success() || !self.is_alive(pid).await? {
                Ok(())
            } else {
                Err(anyhow!("taskkill exited with {}", status))
            }
        }
    }

    async fn is_alive(&self, pid: u32) -> Result<bool> {
        #[cfg(unix)]
        {
            let raw = i32::try_from(pid).map_err(|_| anyhow!("Invalid pid {}", pid))?;
            match signal::kill(Pid::from_raw(raw), None) {
                Ok(()) => Ok(true),
                Err(Errno::ESRCH) => Ok(false),
                // Exists but belongs to someone else
                Err(Errno::EPERM) => Ok(true),
                Err(e) => Err(anyhow!("Failed to probe pid {}: {}", pid, e)),
            }
        }

        #[cfg(not(unix))]
        {
            let output = Command::new("tasklist")
                .args(["/FI", &format!("PID eq {}", pid), "/NH"])
                .output()
                .await
                .map_err(|e| anyhow!("Failed to run tasklist: {}", e))?;
            let listing = String::from_utf8_lossy(&output.stdout);
            Ok(listing
                .split_whitespace()
                .any(|token| token == pid.to_string()))
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Duration;

    fn sleeper(dir: &std::path::Path) -> LaunchSpec {
        LaunchSpec {
            executable: PathBuf::from("sleep"),
            args: vec!["30".to_string()],
            working_dir: dir.to_path_buf(),
        }
    }

    #[tokio::test]
    async fn test_spawn_kill_and_probe() {
        let dir = tempfile::tempdir().unwrap();
        let host = OsProcessHost::new();

        let pid = host.spawn(&sleeper(dir.path())).await.unwrap();
        assert!(host.is_alive(pid).await.unwrap());

        host.kill(pid).await.unwrap();
        let mut alive = true;
        for _ in 0..50 {
            tokio::time::sleep(Duration::from_millis(20)).await;
            if !host.is_alive(pid).await.unwrap() {
                alive = false;
                break;
            }
        }
        assert!(!alive, "pid {} survived SIGTERM", pid);

        // A second kill on a reaped pid is accepted
        host.kill(pid).await.unwrap();
    }

    #[tokio::test]
    async fn test_spawn_missing_executable_fails() {
        let dir = tempfile::tempdir().unwrap();
        let host = OsProcessHost::new();
        let spec = LaunchSpec {
            executable: PathBuf::from("/nonexistent/accServer"),
            args: vec![],
            working_dir: dir.path().to_path_buf(),
        };
        assert!(host.spawn(&spec).await.is_err());
    }
}
