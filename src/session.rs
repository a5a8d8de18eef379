//! Session configuration and result types.
//!
//! A [`SessionConfig`] describes one requested sandbox session; the
//! execution strategy is derived from it as a [`SessionMode`], and every
//! lifecycle invocation produces exactly one [`SessionResult`].

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Configuration for a sandbox session, immutable per invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Unique session name. Generated when the caller does not supply one.
    pub name: String,

    /// Host directories to mount, each optionally suffixed with `:ro`.
    /// A single entry may itself be a comma-separated list.
    pub workspaces: Vec<String>,

    /// Inline prompt text.
    #[serde(default)]
    pub prompt: Option<String>,

    /// Path to a file holding the prompt; takes precedence over `prompt`.
    #[serde(default)]
    pub prompt_file: Option<PathBuf>,

    /// Run in the background and leave the session alive.
    #[serde(default)]
    pub detached: bool,

    /// Continue the previous conversation instead of starting fresh.
    #[serde(default)]
    pub continue_conversation: bool,

    /// Explicit output file, overriding the planned default.
    #[serde(default)]
    pub output_file: Option<PathBuf>,
}

impl SessionConfig {
    /// Creates a configuration for the given name and a single workspace.
    pub fn new(name: impl Into<String>, workspace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            workspaces: vec![workspace.into()],
            prompt: None,
            prompt_file: None,
            detached: false,
            continue_conversation: false,
            output_file: None,
        }
    }

    /// Generates a unique session name.
    pub fn generate_name() -> String {
        let id = uuid::Uuid::new_v4().simple().to_string();
        format!("agent-{}", &id[..8])
    }

    /// Sets the inline prompt.
    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }

    /// Sets the prompt file.
    pub fn with_prompt_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.prompt_file = Some(path.into());
        self
    }

    /// Requests background execution.
    pub fn detached(mut self) -> Self {
        self.detached = true;
        self
    }

    /// Returns true if either prompt source is present.
    pub fn has_prompt(&self) -> bool {
        self.prompt.is_some() || self.prompt_file.is_some()
    }
}

/// Execution strategy for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionMode {
    /// Foreground terminal session; blocks until the user exits.
    Interactive,
    /// Prompt is executed inside the session, then the session is torn down.
    Headless,
    /// Session is left running in the background.
    Detached,
}

impl SessionMode {
    /// Derives the mode from a configuration.
    ///
    /// Pure and total: explicit detach wins, otherwise a prompt means
    /// headless, otherwise interactive.
    pub fn derive(config: &SessionConfig) -> Self {
        if config.detached {
            SessionMode::Detached
        } else if config.has_prompt() {
            SessionMode::Headless
        } else {
            SessionMode::Interactive
        }
    }
}

impl std::fmt::Display for SessionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SessionMode::Interactive => "interactive",
            SessionMode::Headless => "headless",
            SessionMode::Detached => "detached",
        };
        f.write_str(s)
    }
}

/// Final status of a lifecycle invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// Session is still alive (detached mode).
    Running,
    /// Session ran to completion.
    Completed,
    /// Session failed.
    Failed,
}

/// Result of one lifecycle invocation. Never mutated after return;
/// callers poll the filesystem or runtime for updates on running sessions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionResult {
    /// Session name.
    pub name: String,
    /// Derived execution mode.
    pub mode: SessionMode,
    /// Primary (first) resolved workspace path.
    pub workspace: String,
    /// Path to the session log file.
    pub log_file: PathBuf,
    /// Path to the captured-output file, when the mode produces one.
    pub output_file: Option<PathBuf>,
    /// Final status.
    pub status: SessionStatus,
    /// Error detail for failed sessions.
    pub error: Option<String>,
}
