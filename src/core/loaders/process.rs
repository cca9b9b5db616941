// ─── Installer Process ───
// Spawns external installer processes and waits for them to exit.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::core::error::{UpdaterError, UpdaterResult};

/// A fully resolved command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub current_dir: PathBuf,
}

/// How a finished process ended. Output is never captured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessExit {
    pub success: bool,
    pub code: Option<i32>,
}

#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `spec` to completion. Spawn failures are errors; a non-zero exit is not.
    async fn run(&self, spec: &CommandSpec, cancel: &CancellationToken)
        -> UpdaterResult<ProcessExit>;
}

/// Runs commands as real child processes via `tokio::process`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCommandRunner;

#[async_trait]
impl CommandRunner for SystemCommandRunner {
    async fn run(
        &self,
        spec: &CommandSpec,
        cancel: &CancellationToken,
    ) -> UpdaterResult<ProcessExit> {
        let mut cmd = tokio::process::Command::new(&spec.program);
        cmd.args(&spec.args)
            .current_dir(&spec.current_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        configure_platform_spawn(&mut cmd);

        info!("Running {:?} {:?}", spec.program, spec.args);
        let mut child = cmd
            .spawn()
            .map_err(|e| UpdaterError::JavaExecution(format!("{:?}: {}", spec.program, e)))?;

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                warn!("Cancellation requested, killing {:?}", spec.program);
                if let Err(e) = child.kill().await {
                    warn!("Failed to kill {:?}: {}", spec.program, e);
                }
                Err(UpdaterError::Cancelled)
            }
            status = child.wait() => {
                let status = status
                    .map_err(|e| UpdaterError::JavaExecution(e.to_string()))?;
                debug!("{:?} exited with {:?}", spec.program, status.code());
                Ok(ProcessExit {
                    success: status.success(),
                    code: status.code(),
                })
            }
        }
    }
}

fn configure_platform_spawn(cmd: &mut tokio::process::Command) {
    #[cfg(target_os = "windows")]
    {
        const CREATE_NO_WINDOW: u32 = 0x0800_0000;
        cmd.creation_flags(CREATE_NO_WINDOW);
    }
    #[cfg(not(target_os = "windows"))]
    let _ = cmd;
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> CommandSpec {
        CommandSpec {
            program: PathBuf::from("sh"),
            args: vec!["-c".into(), script.into()],
            current_dir: std::env::temp_dir(),
        }
    }

    #[tokio::test]
    async fn reports_exit_status() {
        let cancel = CancellationToken::new();
        let ok = SystemCommandRunner.run(&sh("exit 0"), &cancel).await.unwrap();
        assert!(ok.success);

        let failed = SystemCommandRunner.run(&sh("exit 3"), &cancel).await.unwrap();
        assert!(!failed.success);
        assert_eq!(failed.code, Some(3));
    }

    #[tokio::test]
    async fn spawn_failure_is_an_error() {
        let spec = CommandSpec {
            program: PathBuf::from("/nonexistent/java-binary"),
            args: vec![],
            current_dir: std::env::temp_dir(),
        };
        let err = SystemCommandRunner
            .run(&spec, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, UpdaterError::JavaExecution(_)));
    }

    #[tokio::test]
    async fn cancellation_kills_the_child() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let started = std::time::Instant::now();
        let err = SystemCommandRunner
            .run(&sh("sleep 30"), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, UpdaterError::Cancelled));
        assert!(started.elapsed() < std::time::Duration::from_secs(10));
    }
}
