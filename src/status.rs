//! Status reporting across sessions, logs and worktrees.

use std::path::PathBuf;
use std::time::SystemTime;

use crate::paths::SessionDirs;
use crate::registry::{Registry, RegistryEntry};
use crate::runtime::RuntimeClient;

/// Number of recent log files surfaced in the report.
const RECENT_LOG_LIMIT: usize = 5;

/// A log file with its modification time.
#[derive(Debug, Clone)]
pub struct LogInfo {
    /// File name.
    pub name: String,
    /// Full path.
    pub path: PathBuf,
    /// Last modification time.
    pub modified: SystemTime,
}

/// A worktree directory entry.
#[derive(Debug, Clone)]
pub struct WorktreeInfo {
    /// Directory name.
    pub name: String,
    /// Full path.
    pub path: PathBuf,
}

/// Snapshot of sessions, recent logs and worktrees.
#[derive(Debug, Clone, Default)]
pub struct StatusReport {
    /// Sessions as reported by the runtime.
    pub sessions: Vec<RegistryEntry>,
    /// Most recent log files, newest first.
    pub recent_logs: Vec<LogInfo>,
    /// Worktree directories.
    pub worktrees: Vec<WorktreeInfo>,
}

/// Collects a status report. Best-effort throughout: any failing probe
/// contributes an empty section rather than an error.
pub async fn collect<R: RuntimeClient>(runtime: &R, dirs: &SessionDirs) -> StatusReport {
    StatusReport {
        sessions: Registry::new(runtime).list().await,
        recent_logs: recent_logs(dirs),
        worktrees: worktrees(dirs),
    }
}

fn recent_logs(dirs: &SessionDirs) -> Vec<LogInfo> {
    let log_dir = dirs.log_dir();
    let entries = match std::fs::read_dir(&log_dir) {
        Ok(entries) => entries,
        Err(_) => return Vec::new(),
    };

    let mut logs: Vec<LogInfo> = entries
        .flatten()
        .filter_map(|entry| {
            let name = entry.file_name().to_string_lossy().to_string();
            if !name.ends_with(".log") {
                return None;
            }
            let modified = entry.metadata().ok()?.modified().ok()?;
            Some(LogInfo {
                name,
                path: entry.path(),
                modified,
            })
        })
        .collect();

    logs.sort_by(|a, b| b.modified.cmp(&a.modified));
    logs.truncate(RECENT_LOG_LIMIT);
    logs
}

fn worktrees(dirs: &SessionDirs) -> Vec<WorktreeInfo> {
    let worktree_dir = dirs.worktree_dir();
    let entries = match std::fs::read_dir(&worktree_dir) {
        Ok(entries) => entries,
        Err(_) => return Vec::new(),
    };

    entries
        .flatten()
        .filter(|entry| entry.path().is_dir())
        .map(|entry| WorktreeInfo {
            name: entry.file_name().to_string_lossy().to_string(),
            path: entry.path(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, Result};
    use crate::runtime::StartMode;
    use async_trait::async_trait;
    use std::path::Path;
    use tempfile::TempDir;

    struct ListingRuntime(Result<String>);

    #[async_trait]
    impl RuntimeClient for ListingRuntime {
        async fn start(&self, _: &str, _: StartMode) -> Result<()> {
            unreachable!()
        }
        async fn exec(&self, _: &str, _: &str) -> Result<String> {
            unreachable!()
        }
        fn exec_background(&self, _: &str, _: &str, _: &Path) -> Result<()> {
            unreachable!()
        }
        async fn list(&self) -> Result<String> {
            match &self.0 {
                Ok(text) => Ok(text.clone()),
                Err(_) => Err(Error::RuntimeCommandFailed {
                    command: "docker sandbox ls".to_string(),
                    detail: "daemon unreachable".to_string(),
                }),
            }
        }
        async fn remove(&self, _: &str) -> Result<()> {
            unreachable!()
        }
    }

    #[tokio::test]
    async fn report_combines_sessions_logs_and_worktrees() {
        let base = TempDir::new().unwrap();
        let dirs = SessionDirs::new(base.path());
        dirs.ensure().unwrap();

        std::fs::write(dirs.log_dir().join("agent-1.log"), "x").unwrap();
        std::fs::write(dirs.log_dir().join("notes.txt"), "x").unwrap();
        std::fs::create_dir_all(dirs.worktree_dir().join("agent-1")).unwrap();

        let runtime =
            ListingRuntime(Ok("NAME IMAGE STATUS\nagent-1 img running\n".to_string()));
        let report = collect(&runtime, &dirs).await;

        assert_eq!(report.sessions.len(), 1);
        assert_eq!(report.sessions[0].name, "agent-1");
        assert_eq!(report.recent_logs.len(), 1);
        assert_eq!(report.recent_logs[0].name, "agent-1.log");
        assert_eq!(report.worktrees.len(), 1);
    }

    #[tokio::test]
    async fn failing_probes_yield_empty_sections() {
        let base = TempDir::new().unwrap();
        // Directories never created: both filesystem probes fail.
        let dirs = SessionDirs::new(base.path().join("missing"));

        let runtime = ListingRuntime(Err(Error::Config(String::new())));
        let report = collect(&runtime, &dirs).await;

        assert!(report.sessions.is_empty());
        assert!(report.recent_logs.is_empty());
        assert!(report.worktrees.is_empty());
    }

    #[tokio::test]
    async fn recent_logs_are_capped_and_newest_first() {
        let base = TempDir::new().unwrap();
        let dirs = SessionDirs::new(base.path());
        dirs.ensure().unwrap();

        for i in 0..7 {
            let path = dirs.log_dir().join(format!("agent-{i}.log"));
            std::fs::write(&path, "x").unwrap();
            // Distinct mtimes, oldest first.
            let time = std::time::SystemTime::UNIX_EPOCH
                + std::time::Duration::from_secs(1_700_000_000 + i);
            let file = std::fs::File::options().append(true).open(&path).unwrap();
            file.set_modified(time).unwrap();
        }

        let runtime = ListingRuntime(Ok(String::new()));
        let report = collect(&runtime, &dirs).await;

        assert_eq!(report.recent_logs.len(), RECENT_LOG_LIMIT);
        assert_eq!(report.recent_logs[0].name, "agent-6.log");
    }
}
