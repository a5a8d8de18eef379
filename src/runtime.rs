//! Container runtime client.
//!
//! The orchestration core never talks to the container engine directly;
//! it goes through the narrow [`RuntimeClient`] trait so lifecycle logic
//! stays runtime-agnostic and unit-testable with a fake. The production
//! [`SandboxRuntime`] shells out to the engine CLI and captures
//! stdout/stderr/exit code as UTF-8 text.

use std::fs::OpenOptions;
use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;

use crate::command::CommandBuilder;
use crate::error::{Error, Result};

/// How a start command's standard streams are wired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartMode {
    /// Inherit the caller's terminal; blocks until the session exits.
    /// Interrupt signals reach the child through the shared terminal.
    Interactive,
    /// Capture output; used for detached starts that return quickly.
    Captured,
}

/// Narrow interface to the container runtime.
#[async_trait]
pub trait RuntimeClient: Send + Sync {
    /// Runs a start command produced by the command builder.
    async fn start(&self, command: &str, mode: StartMode) -> Result<()>;

    /// Executes a script inside a running session, returning combined
    /// stdout/stderr.
    async fn exec(&self, name: &str, script: &str) -> Result<String>;

    /// Executes a script inside a running session in a child process
    /// that outlives this one, with combined output redirected to
    /// `output_file`.
    fn exec_background(&self, name: &str, script: &str, output_file: &Path) -> Result<()>;

    /// Returns the runtime's raw tabular session listing.
    async fn list(&self) -> Result<String>;

    /// Force-removes the named session.
    async fn remove(&self, name: &str) -> Result<()>;
}

/// Production client shelling out to the engine CLI.
#[derive(Debug, Clone, Default)]
pub struct SandboxRuntime;

impl SandboxRuntime {
    /// Creates a new runtime client.
    pub fn new() -> Self {
        Self
    }

    /// Runs a command line through the shell, capturing combined output.
    async fn run_captured(&self, command: &str) -> Result<String> {
        let output = tokio::process::Command::new("sh")
            .arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .output()
            .await?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        if output.status.success() {
            Ok(format!("{stdout}{stderr}"))
        } else {
            Err(Error::RuntimeCommandFailed {
                command: command.to_string(),
                detail: if stderr.trim().is_empty() {
                    format!("exit code {:?}", output.status.code())
                } else {
                    stderr.trim().to_string()
                },
            })
        }
    }
}

#[async_trait]
impl RuntimeClient for SandboxRuntime {
    async fn start(&self, command: &str, mode: StartMode) -> Result<()> {
        tracing::debug!(command = %command, ?mode, "starting session");

        match mode {
            StartMode::Interactive => {
                let status = tokio::process::Command::new("sh")
                    .arg("-c")
                    .arg(command)
                    .status()
                    .await?;

                if status.success() {
                    Ok(())
                } else {
                    Err(Error::RuntimeCommandFailed {
                        command: command.to_string(),
                        detail: format!("exit code {:?}", status.code()),
                    })
                }
            }
            StartMode::Captured => self.run_captured(command).await.map(|_| ()),
        }
    }

    async fn exec(&self, name: &str, script: &str) -> Result<String> {
        let command = CommandBuilder::exec_command(name, script);
        tracing::debug!(session = %name, command = %command, "exec in session");
        self.run_captured(&command).await
    }

    fn exec_background(&self, name: &str, script: &str, output_file: &Path) -> Result<()> {
        let command = CommandBuilder::exec_command(name, script);
        tracing::debug!(session = %name, output = %output_file.display(), "background exec");

        let out = OpenOptions::new()
            .create(true)
            .append(true)
            .open(output_file)?;
        let err = out.try_clone()?;

        // std::process rather than tokio: the child must keep running
        // after this CLI process exits.
        std::process::Command::new("sh")
            .arg("-c")
            .arg(&command)
            .stdin(Stdio::null())
            .stdout(Stdio::from(out))
            .stderr(Stdio::from(err))
            .spawn()
            .map_err(|e| Error::RuntimeCommandFailed {
                command,
                detail: e.to_string(),
            })?;

        Ok(())
    }

    async fn list(&self) -> Result<String> {
        self.run_captured(&CommandBuilder::list_command()).await
    }

    async fn remove(&self, name: &str) -> Result<()> {
        self.run_captured(&CommandBuilder::remove_command(name))
            .await
            .map(|_| ())
    }
}
