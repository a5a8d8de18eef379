//! Log and output file browsing.
//!
//! Artifacts are discovered newest-first from the log or output
//! directory, optionally filtered by a substring pattern, and read back
//! as tail excerpts for display.

use std::path::PathBuf;
use std::time::SystemTime;

use crate::error::Result;
use crate::paths::SessionDirs;

/// Maximum files returned for a pattern or `--all` selection.
const SELECTION_LIMIT: usize = 10;

/// Which artifact family to browse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogKind {
    /// Session/task logs (`*.log`).
    Log,
    /// Captured agent output (`*.json`).
    Output,
}

impl LogKind {
    fn extension(self) -> &'static str {
        match self {
            LogKind::Log => ".log",
            LogKind::Output => ".json",
        }
    }

    fn dir(self, dirs: &SessionDirs) -> PathBuf {
        match self {
            LogKind::Log => dirs.log_dir(),
            LogKind::Output => dirs.output_dir(),
        }
    }
}

/// A discovered artifact file.
#[derive(Debug, Clone)]
pub struct LogFile {
    /// File name.
    pub name: String,
    /// Full path.
    pub path: PathBuf,
    /// Last modification time.
    pub modified: SystemTime,
}

/// Lists artifact files of one kind, newest first.
pub fn list_files(dirs: &SessionDirs, kind: LogKind) -> Vec<LogFile> {
    let dir = kind.dir(dirs);
    let entries = match std::fs::read_dir(&dir) {
        Ok(entries) => entries,
        Err(_) => return Vec::new(),
    };

    let mut files: Vec<LogFile> = entries
        .flatten()
        .filter_map(|entry| {
            let name = entry.file_name().to_string_lossy().to_string();
            if !name.ends_with(kind.extension()) {
                return None;
            }
            let modified = entry.metadata().ok()?.modified().ok()?;
            Some(LogFile {
                name,
                path: entry.path(),
                modified,
            })
        })
        .collect();

    files.sort_by(|a, b| b.modified.cmp(&a.modified));
    files
}

/// Selects the files to display: pattern matches when given, otherwise
/// everything (capped) or just the most recent.
pub fn select_files(files: Vec<LogFile>, show_all: bool, pattern: Option<&str>) -> Vec<LogFile> {
    let mut selected: Vec<LogFile> = match pattern {
        Some(pattern) => files
            .into_iter()
            .filter(|file| file.name.contains(pattern))
            .collect(),
        None if show_all => files,
        None => files.into_iter().take(1).collect(),
    };
    selected.truncate(SELECTION_LIMIT);
    selected
}

/// Reads the last `lines` lines of a file.
pub fn tail(file: &LogFile, lines: usize) -> Result<String> {
    let content = std::fs::read_to_string(&file.path)?;
    let all: Vec<&str> = content.lines().collect();
    let start = all.len().saturating_sub(lines);
    Ok(all[start..].join("\n"))
}
