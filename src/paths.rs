//! Session artifact layout on disk.
//!
//! All artifacts live under one base directory, overridable via the
//! `AGENT_DOCK_DIR` environment variable:
//!
//! ```text
//! <base>/logs/<name>.log        append-only session log
//! <base>/output/<name>.json     captured agent output, overwritten per run
//! <base>/worktrees/             scratch checkouts, purged by cleanup
//! <base>/Dockerfile.agent-dock  template marker written by setup
//! ```

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Environment variable overriding the base directory.
pub const BASE_DIR_ENV: &str = "AGENT_DOCK_DIR";

/// File that must exist before sessions can be started.
pub const TEMPLATE_FILE: &str = "Dockerfile.agent-dock";

/// Planned artifact paths for one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionPaths {
    /// Append-only log file.
    pub log_file: PathBuf,
    /// Captured-output file, overwritten per run.
    pub output_file: PathBuf,
}

/// Directory layout for session artifacts.
#[derive(Debug, Clone)]
pub struct SessionDirs {
    base: PathBuf,
}

impl SessionDirs {
    /// Creates a layout rooted at the given base directory.
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    /// Resolves the layout from `AGENT_DOCK_DIR`, falling back to
    /// `~/.agent-dock`.
    pub fn from_env() -> Self {
        let base = std::env::var_os(BASE_DIR_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                dirs::home_dir()
                    .unwrap_or_else(std::env::temp_dir)
                    .join(".agent-dock")
            });
        Self::new(base)
    }

    /// The base directory.
    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Directory holding session logs.
    pub fn log_dir(&self) -> PathBuf {
        self.base.join("logs")
    }

    /// Directory holding captured output files.
    pub fn output_dir(&self) -> PathBuf {
        self.base.join("output")
    }

    /// Directory holding scratch worktrees.
    pub fn worktree_dir(&self) -> PathBuf {
        self.base.join("worktrees")
    }

    /// Path of the template marker file.
    pub fn template_file(&self) -> PathBuf {
        self.base.join(TEMPLATE_FILE)
    }

    /// Plans artifact paths for a session name. An explicit override
    /// always wins for the output file.
    pub fn plan(&self, name: &str, output_override: Option<&Path>) -> SessionPaths {
        SessionPaths {
            log_file: self.log_dir().join(format!("{name}.log")),
            output_file: output_override
                .map(Path::to_path_buf)
                .unwrap_or_else(|| self.output_dir().join(format!("{name}.json"))),
        }
    }

    /// Plans task-scoped artifact paths, keyed by session and task id.
    pub fn plan_task(
        &self,
        session: &str,
        task_id: &str,
        output_override: Option<&Path>,
    ) -> SessionPaths {
        SessionPaths {
            log_file: self.log_dir().join(format!("{session}-{task_id}.log")),
            output_file: output_override
                .map(Path::to_path_buf)
                .unwrap_or_else(|| self.output_dir().join(format!("{session}-{task_id}.json"))),
        }
    }

    /// Creates the log and output directories, idempotently.
    pub fn ensure(&self) -> Result<()> {
        std::fs::create_dir_all(self.log_dir())?;
        std::fs::create_dir_all(self.output_dir())?;
        Ok(())
    }

    /// Verifies the session template has been built.
    pub fn check_template(&self) -> Result<()> {
        let template = self.template_file();
        if template.exists() {
            Ok(())
        } else {
            Err(Error::TemplateMissing(template))
        }
    }
}
