//! Session and artifact cleanup.
//!
//! Removing everything is an explicit opt-in: with no target the manager
//! does nothing. Batch removal is best-effort, recording per-session
//! failures without aborting, and the filesystem purges are idempotent.

use crate::error::Result;
use crate::paths::SessionDirs;
use crate::registry::Registry;
use crate::runtime::RuntimeClient;

/// Target selector for `--all`.
pub const ALL_TARGET: &str = "--all";

/// Options for one cleanup invocation.
#[derive(Debug, Clone, Default)]
pub struct CleanupOptions {
    /// Session name, or [`ALL_TARGET`] for every session. None is a no-op.
    pub target: Option<String>,
    /// Also purge the worktree directory tree.
    pub remove_worktrees: bool,
    /// Also purge log files.
    pub remove_logs: bool,
}

/// Outcome of a cleanup invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupResult {
    /// Sessions successfully removed.
    pub sessions_removed: Vec<String>,
    /// Sessions whose removal failed, with the error detail.
    pub failures: Vec<(String, String)>,
    /// Whether worktrees were purged.
    pub worktrees_removed: bool,
    /// Whether log files were purged.
    pub logs_removed: bool,
}

/// Removes sessions and associated artifacts.
pub struct CleanupManager<R: RuntimeClient> {
    runtime: R,
    dirs: SessionDirs,
}

impl<R: RuntimeClient> CleanupManager<R> {
    /// Creates a manager over the given runtime and directory layout.
    pub fn new(runtime: R, dirs: SessionDirs) -> Self {
        Self { runtime, dirs }
    }

    /// The runtime this manager drives.
    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    /// Runs one cleanup pass.
    pub async fn cleanup(&self, options: &CleanupOptions) -> Result<CleanupResult> {
        let mut result = CleanupResult::default();

        match options.target.as_deref() {
            None => {
                tracing::info!("no cleanup target given; nothing removed");
            }
            Some(ALL_TARGET) => {
                let registry = Registry::new(&self.runtime);
                for entry in registry.list().await {
                    self.remove_one(&entry.name, &mut result).await;
                }
            }
            Some(name) => {
                self.remove_one(name, &mut result).await;
            }
        }

        if options.remove_worktrees {
            result.worktrees_removed = self.purge_worktrees()?;
        }
        if options.remove_logs {
            result.logs_removed = self.purge_logs()?;
        }

        Ok(result)
    }

    async fn remove_one(&self, name: &str, result: &mut CleanupResult) {
        match self.runtime.remove(name).await {
            Ok(()) => {
                tracing::info!(session = %name, "removed session");
                result.sessions_removed.push(name.to_string());
            }
            Err(e) => {
                tracing::warn!(session = %name, error = %e, "failed to remove session");
                result.failures.push((name.to_string(), e.to_string()));
            }
        }
    }

    /// Deletes worktree subdirectories. Absent directories are fine.
    fn purge_worktrees(&self) -> Result<bool> {
        let worktree_dir = self.dirs.worktree_dir();
        if !worktree_dir.is_dir() {
            return Ok(false);
        }

        for entry in std::fs::read_dir(&worktree_dir)?.flatten() {
            if entry.path().is_dir() {
                std::fs::remove_dir_all(entry.path())?;
            }
        }
        Ok(true)
    }

    /// Deletes `.log` files from the log directory. Absent is fine.
    fn purge_logs(&self) -> Result<bool> {
        let log_dir = self.dirs.log_dir();
        if !log_dir.is_dir() {
            return Ok(false);
        }

        for entry in std::fs::read_dir(&log_dir)?.flatten() {
            let is_log = entry
                .file_name()
                .to_string_lossy()
                .ends_with(".log");
            if is_log && entry.path().is_file() {
                std::fs::remove_file(entry.path())?;
            }
        }
        Ok(true)
    }
}
