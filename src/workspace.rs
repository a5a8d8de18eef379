//! Workspace path resolution.
//!
//! A workspace is a host directory mounted into a session. The string
//! form accepts an optional `:ro` suffix marking the mount read-only;
//! the suffix is stripped before filesystem validation and re-appended
//! for command construction.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// A validated, canonicalized workspace mount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    path: PathBuf,
    read_only: bool,
}

impl Workspace {
    /// Resolves a workspace spec to an absolute, symlink-resolved path.
    ///
    /// Fails with [`Error::InvalidWorkspace`] when the path does not
    /// exist or is not a directory.
    pub fn resolve(spec: &str) -> Result<Self> {
        let (raw, read_only) = match spec.strip_suffix(":ro") {
            Some(stripped) => (stripped, true),
            None => (spec, false),
        };

        let candidate = Path::new(raw);
        let path = candidate
            .canonicalize()
            .map_err(|_| Error::InvalidWorkspace(candidate.to_path_buf()))?;

        if !path.is_dir() {
            return Err(Error::InvalidWorkspace(path));
        }

        Ok(Self { path, read_only })
    }

    /// The resolved directory path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the mount is read-only.
    pub fn read_only(&self) -> bool {
        self.read_only
    }

    /// The mount argument for command construction, with `:ro` re-appended.
    pub fn mount_arg(&self) -> String {
        if self.read_only {
            format!("{}:ro", self.path.display())
        } else {
            self.path.display().to_string()
        }
    }
}

/// Splits comma-separated workspace specs, dropping empty entries.
pub fn split_specs(input: &str) -> Vec<&str> {
    input
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

/// Resolves every spec in the given list, expanding comma-separated entries.
pub fn resolve_all(specs: &[String]) -> Result<Vec<Workspace>> {
    let mut resolved = Vec::new();
    for entry in specs {
        for spec in split_specs(entry) {
            resolved.push(Workspace::resolve(spec)?);
        }
    }
    Ok(resolved)
}
