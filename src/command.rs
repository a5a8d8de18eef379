//! Command construction for the container runtime.
//!
//! Pure string building: every user-controlled value (prompts, names,
//! paths) is single-quote shell-escaped before interpolation. Nothing
//! here touches the filesystem or the runtime; malformed input surfaces
//! later as an exec failure.

use std::path::Path;

use crate::config::ModelConfig;
use crate::workspace::Workspace;

/// Template image used for new sessions.
pub const TEMPLATE_IMAGE: &str = "agent-dock:latest";

/// Agent binary invoked inside sessions.
pub const AGENT_BIN: &str = "claude";

/// Wraps a value in single quotes, escaping embedded single quotes as
/// `'\''` so the shell reads back the literal original text.
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "'\\''"))
}

/// Options for a session start command.
#[derive(Debug, Clone, Default)]
pub struct StartOptions {
    /// Append the runtime detach flag.
    pub detached: bool,
    /// Prompt forwarded to the agent via `-- --print`.
    pub prompt: Option<String>,
    /// Reconnect to an existing session instead of creating one.
    pub reconnect: bool,
}

/// Builds runtime command lines for one resolved configuration.
#[derive(Debug, Clone)]
pub struct CommandBuilder {
    config: ModelConfig,
}

impl CommandBuilder {
    /// Creates a builder carrying the injected model configuration.
    pub fn new(config: ModelConfig) -> Self {
        Self { config }
    }

    /// Builds the command that starts (or reconnects to) a session.
    ///
    /// New session:
    /// `docker sandbox run --name '<n>' -t <image> [--detach] [-e K='V' ...] claude '<ws>'...`
    ///
    /// Existing session:
    /// `docker sandbox run <n>`
    ///
    /// Either form takes `-- --print '<prompt>'` when a prompt is given.
    pub fn start_command(
        &self,
        name: &str,
        workspaces: &[Workspace],
        options: &StartOptions,
    ) -> String {
        let mut parts: Vec<String> = vec!["docker".into(), "sandbox".into(), "run".into()];

        if options.reconnect {
            parts.push(shell_quote(name));
        } else {
            parts.push("--name".into());
            parts.push(shell_quote(name));
            parts.push("-t".into());
            parts.push(TEMPLATE_IMAGE.into());

            if options.detached {
                parts.push("--detach".into());
            }

            for (key, value) in self.config.env_vars() {
                parts.push("-e".into());
                parts.push(format!("{key}={}", shell_quote(&value)));
            }

            parts.push(AGENT_BIN.into());
            for workspace in workspaces {
                parts.push(shell_quote(&workspace.mount_arg()));
            }
        }

        if let Some(prompt) = &options.prompt {
            parts.push("--".into());
            parts.push("--print".into());
            parts.push(shell_quote(prompt));
        }

        parts.join(" ")
    }

    /// Builds the script run inside a session to invoke the agent:
    /// change into the workspace and pipe the prompt into headless mode,
    /// or resume the previous conversation when no new prompt applies.
    pub fn agent_script(
        &self,
        workspace: &Path,
        prompt: Option<&str>,
        continue_conversation: bool,
    ) -> String {
        let invocation = match (prompt, continue_conversation) {
            (Some(p), true) => format!(
                "echo {} | {AGENT_BIN} --continue -p --output-format stream-json --verbose",
                shell_quote(p)
            ),
            (Some(p), false) => format!(
                "echo {} | {AGENT_BIN} -p --output-format stream-json --verbose",
                shell_quote(p)
            ),
            (None, _) => {
                format!("{AGENT_BIN} --continue -p --output-format stream-json --verbose")
            }
        };

        format!(
            "cd {} && {}",
            shell_quote(&workspace.display().to_string()),
            invocation
        )
    }

    /// Builds the command that executes a script inside a running session.
    pub fn exec_command(name: &str, script: &str) -> String {
        format!(
            "docker exec {} bash -c {}",
            shell_quote(name),
            shell_quote(script)
        )
    }

    /// Builds the session listing command.
    pub fn list_command() -> String {
        "docker sandbox ls".to_string()
    }

    /// Builds the session removal command.
    pub fn remove_command(name: &str) -> String {
        format!("docker sandbox rm {}", shell_quote(name))
    }
}
