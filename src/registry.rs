//! Live session registry.
//!
//! Nothing is persisted: the registry is always recomputed by asking the
//! runtime for its session listing. The tabular format is an external
//! contract that may drift, so parsing stays in one pure function with
//! literal-sample tests.

use crate::runtime::RuntimeClient;

/// One row of the runtime's session listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryEntry {
    /// Session name.
    pub name: String,
    /// Free-text status as reported by the runtime ("running", "exited", ...).
    pub status: String,
}

impl RegistryEntry {
    /// True when the runtime reports the session as running.
    pub fn is_running(&self) -> bool {
        self.status.eq_ignore_ascii_case("running")
    }
}

/// Parses the runtime's tabular listing.
///
/// Format: a header row, then one row per session with the name in the
/// first column and the status in the third:
///
/// ```text
/// NAME       IMAGE              STATUS    CREATED
/// agent-1    agent-dock:latest  running   2 minutes ago
/// ```
pub fn parse_listing(text: &str) -> Vec<RegistryEntry> {
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .skip(1)
        .filter_map(|line| {
            let mut columns = line.split_whitespace();
            let name = columns.next()?.to_string();
            let status = columns.nth(1).unwrap_or("unknown").to_string();
            Some(RegistryEntry { name, status })
        })
        .collect()
}

/// Read-only view over the runtime's sessions.
pub struct Registry<'a, R: RuntimeClient> {
    runtime: &'a R,
}

impl<'a, R: RuntimeClient> Registry<'a, R> {
    /// Creates a registry over the given runtime.
    pub fn new(runtime: &'a R) -> Self {
        Self { runtime }
    }

    /// Lists all known sessions. Best-effort: any query failure yields
    /// an empty list rather than an error.
    pub async fn list(&self) -> Vec<RegistryEntry> {
        match self.runtime.list().await {
            Ok(text) => parse_listing(&text),
            Err(e) => {
                tracing::warn!(error = %e, "failed to list sessions");
                Vec::new()
            }
        }
    }

    /// Names of sessions currently reported as running.
    pub async fn running_names(&self) -> Vec<String> {
        self.list()
            .await
            .into_iter()
            .filter(RegistryEntry::is_running)
            .map(|entry| entry.name)
            .collect()
    }

    /// True when a session with the given name exists, in any state.
    pub async fn exists(&self, name: &str) -> bool {
        self.list().await.iter().any(|entry| entry.name == name)
    }

    /// True when the named session is reported as running.
    pub async fn is_running(&self, name: &str) -> bool {
        self.list()
            .await
            .iter()
            .any(|entry| entry.name == name && entry.is_running())
    }
}
