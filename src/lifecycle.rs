//! Session lifecycle management.
//!
//! One `launch` call drives a session through its states: the config is
//! validated, any stale session holding the name is removed, artifact
//! paths are planned and the command built, then dispatch branches on
//! the derived mode. Exactly one [`SessionResult`] comes back per
//! invocation.

use std::io::Write;
use std::path::Path;
use std::time::Duration;

use chrono::Utc;

use crate::command::{CommandBuilder, StartOptions};
use crate::config::ModelConfig;
use crate::error::{Error, Result};
use crate::paths::{SessionDirs, SessionPaths};
use crate::registry::Registry;
use crate::runtime::{RuntimeClient, StartMode};
use crate::session::{SessionConfig, SessionMode, SessionResult, SessionStatus};
use crate::workspace::{self, Workspace};

/// Prompt preview length in log headers.
const PROMPT_PREVIEW_CHARS: usize = 100;

fn default_poll_interval() -> Duration {
    Duration::from_millis(250)
}

const DEFAULT_POLL_ATTEMPTS: u32 = 40;

/// Creates sessions and runs them to completion (or to background-detach).
pub struct SessionLauncher<R: RuntimeClient> {
    runtime: R,
    dirs: SessionDirs,
    builder: CommandBuilder,
    poll_interval: Duration,
    poll_attempts: u32,
}

impl<R: RuntimeClient> SessionLauncher<R> {
    /// Creates a launcher over the given runtime, directory layout and
    /// model configuration.
    pub fn new(runtime: R, dirs: SessionDirs, config: ModelConfig) -> Self {
        Self {
            runtime,
            dirs,
            builder: CommandBuilder::new(config),
            poll_interval: default_poll_interval(),
            poll_attempts: DEFAULT_POLL_ATTEMPTS,
        }
    }

    /// Overrides the readiness poll cadence.
    pub fn with_ready_poll(mut self, interval: Duration, attempts: u32) -> Self {
        self.poll_interval = interval;
        self.poll_attempts = attempts;
        self
    }

    /// The runtime this launcher drives.
    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    /// Runs one session through its full lifecycle.
    pub async fn launch(&self, config: SessionConfig) -> Result<SessionResult> {
        // Fail fast before any container is touched.
        self.dirs.check_template()?;

        let workspaces = workspace::resolve_all(&config.workspaces)?;
        if workspaces.is_empty() {
            return Err(Error::Config(
                "at least one workspace is required".to_string(),
            ));
        }

        let prompt = resolve_prompt(&config)?;
        let mode = SessionMode::derive(&config);
        let paths = self.dirs.plan(&config.name, config.output_file.as_deref());
        self.dirs.ensure()?;

        // Continuing a conversation reconnects to a live session; every
        // other start force-removes any stale holder of the name so two
        // instances never share it.
        let registry = Registry::new(&self.runtime);
        let reconnect = config.continue_conversation && registry.exists(&config.name).await;
        if !reconnect {
            if let Err(e) = self.runtime.remove(&config.name).await {
                tracing::debug!(session = %config.name, error = %e, "no stale session to remove");
            }
        }

        write_log_header(&paths.log_file, &config.name, &workspaces, mode, prompt.as_deref())?;

        tracing::info!(
            session = %config.name,
            mode = %mode,
            workspace = %workspaces[0].path().display(),
            "starting session"
        );

        match mode {
            SessionMode::Interactive => {
                self.run_interactive(&config, &workspaces, reconnect, &paths)
                    .await
            }
            SessionMode::Headless => {
                self.run_headless(&config, &workspaces, prompt.as_deref(), reconnect, &paths)
                    .await
            }
            SessionMode::Detached => {
                self.run_detached(&config, &workspaces, prompt.as_deref(), reconnect, &paths)
                    .await
            }
        }
    }

    /// Foreground session inheriting the caller's terminal.
    async fn run_interactive(
        &self,
        config: &SessionConfig,
        workspaces: &[Workspace],
        reconnect: bool,
        paths: &SessionPaths,
    ) -> Result<SessionResult> {
        let options = StartOptions {
            detached: false,
            prompt: None,
            reconnect,
        };
        let command = self.builder.start_command(&config.name, workspaces, &options);

        self.runtime.start(&command, StartMode::Interactive).await?;

        append_log_footer(&paths.log_file)?;

        Ok(result(config, SessionMode::Interactive, workspaces, paths, None, SessionStatus::Completed))
    }

    /// Start detached, run the agent inside, capture output, tear down.
    async fn run_headless(
        &self,
        config: &SessionConfig,
        workspaces: &[Workspace],
        prompt: Option<&str>,
        reconnect: bool,
        paths: &SessionPaths,
    ) -> Result<SessionResult> {
        // A reconnected session is already live; only fresh sessions
        // need the detached start.
        if !reconnect {
            let options = StartOptions {
                detached: true,
                prompt: None,
                reconnect: false,
            };
            let command = self.builder.start_command(&config.name, workspaces, &options);
            self.runtime.start(&command, StartMode::Captured).await?;
        }
        self.wait_until_running(&config.name).await?;

        let script = self.builder.agent_script(
            workspaces[0].path(),
            prompt,
            config.continue_conversation,
        );
        let output = self.runtime.exec(&config.name, &script).await?;

        // Raw agent output goes to the output file so the result
        // extractor can parse it; the log gets a teed copy.
        std::fs::write(&paths.output_file, &output)?;
        append_to_log(&paths.log_file, &output)?;
        append_log_footer(&paths.log_file)?;

        if let Err(e) = self.runtime.remove(&config.name).await {
            tracing::warn!(session = %config.name, error = %e, "failed to tear down session");
        }

        Ok(result(
            config,
            SessionMode::Headless,
            workspaces,
            paths,
            Some(paths.output_file.clone()),
            SessionStatus::Completed,
        ))
    }

    /// Start detached and return immediately, optionally dispatching the
    /// prompt into the running session as a background process.
    async fn run_detached(
        &self,
        config: &SessionConfig,
        workspaces: &[Workspace],
        prompt: Option<&str>,
        reconnect: bool,
        paths: &SessionPaths,
    ) -> Result<SessionResult> {
        if !reconnect {
            let options = StartOptions {
                detached: true,
                prompt: None,
                reconnect: false,
            };
            let command = self.builder.start_command(&config.name, workspaces, &options);
            self.runtime.start(&command, StartMode::Captured).await?;
        }

        let output_file = if let Some(prompt) = prompt {
            self.wait_until_running(&config.name).await?;
            let script = self.builder.agent_script(
                workspaces[0].path(),
                Some(prompt),
                config.continue_conversation,
            );
            self.runtime
                .exec_background(&config.name, &script, &paths.output_file)?;
            Some(paths.output_file.clone())
        } else {
            None
        };

        // No completion marker: the session is still live.
        Ok(result(
            config,
            SessionMode::Detached,
            workspaces,
            paths,
            output_file,
            SessionStatus::Running,
        ))
    }

    /// Polls the registry until the session reports running.
    async fn wait_until_running(&self, name: &str) -> Result<()> {
        let registry = Registry::new(&self.runtime);
        for _ in 0..self.poll_attempts {
            if registry.is_running(name).await {
                return Ok(());
            }
            tokio::time::sleep(self.poll_interval).await;
        }
        Err(Error::SessionNotReady(name.to_string()))
    }
}

/// Reads the prompt from its file when one is given.
fn resolve_prompt(config: &SessionConfig) -> Result<Option<String>> {
    match &config.prompt_file {
        Some(path) => {
            if !path.is_file() {
                return Err(Error::PromptFileMissing(path.clone()));
            }
            Ok(Some(std::fs::read_to_string(path)?))
        }
        None => Ok(config.prompt.clone()),
    }
}

fn truncate_prompt(prompt: &str) -> String {
    if prompt.chars().count() <= PROMPT_PREVIEW_CHARS {
        prompt.to_string()
    } else {
        let preview: String = prompt.chars().take(PROMPT_PREVIEW_CHARS).collect();
        format!("{preview}...")
    }
}

fn write_log_header(
    log_file: &Path,
    name: &str,
    workspaces: &[Workspace],
    mode: SessionMode,
    prompt: Option<&str>,
) -> Result<()> {
    let mounts: Vec<String> = workspaces.iter().map(Workspace::mount_arg).collect();
    let mut header = format!(
        "Started: {}\nSession: {}\nWorkspace: {}\nMode: {}\n",
        Utc::now().to_rfc3339(),
        name,
        mounts.join(", "),
        mode,
    );
    if let Some(prompt) = prompt {
        header.push_str(&format!("Prompt: {}\n", truncate_prompt(prompt)));
    }
    header.push_str("---\n");
    append_to_log(log_file, &header)
}

fn append_to_log(log_file: &Path, content: &str) -> Result<()> {
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file)?;
    file.write_all(content.as_bytes())?;
    if !content.ends_with('\n') {
        file.write_all(b"\n")?;
    }
    Ok(())
}

fn append_log_footer(log_file: &Path) -> Result<()> {
    append_to_log(log_file, &format!("\nCompleted: {}\n", Utc::now().to_rfc3339()))
}

fn result(
    config: &SessionConfig,
    mode: SessionMode,
    workspaces: &[Workspace],
    paths: &SessionPaths,
    output_file: Option<std::path::PathBuf>,
    status: SessionStatus,
) -> SessionResult {
    SessionResult {
        name: config.name.clone(),
        mode,
        workspace: workspaces[0].path().display().to_string(),
        log_file: paths.log_file.clone(),
        output_file,
        status,
        error: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Recording fake: remembers every call and serves a canned listing.
    #[derive(Default)]
    struct FakeRuntime {
        calls: Mutex<Vec<String>>,
        listing: Mutex<String>,
        fail_remove: bool,
    }

    impl FakeRuntime {
        fn with_listing(listing: &str) -> Self {
            Self {
                listing: Mutex::new(listing.to_string()),
                ..Default::default()
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl RuntimeClient for FakeRuntime {
        async fn start(&self, command: &str, _mode: StartMode) -> Result<()> {
            self.calls.lock().unwrap().push(format!("start {command}"));
            // Once started, the session shows up as running.
            *self.listing.lock().unwrap() =
                "NAME IMAGE STATUS\ndemo agent-dock:latest running\n".to_string();
            Ok(())
        }

        async fn exec(&self, name: &str, script: &str) -> Result<String> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("exec {name} {script}"));
            Ok("{\"type\":\"result\",\"result\":\"ok\"}\n".to_string())
        }

        fn exec_background(&self, name: &str, script: &str, output: &Path) -> Result<()> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("exec-bg {name} {script} > {}", output.display()));
            Ok(())
        }

        async fn list(&self) -> Result<String> {
            self.calls.lock().unwrap().push("list".to_string());
            Ok(self.listing.lock().unwrap().clone())
        }

        async fn remove(&self, name: &str) -> Result<()> {
            self.calls.lock().unwrap().push(format!("remove {name}"));
            if self.fail_remove {
                Err(Error::RuntimeCommandFailed {
                    command: format!("docker sandbox rm '{name}'"),
                    detail: "no such sandbox".to_string(),
                })
            } else {
                Ok(())
            }
        }
    }

    fn launcher_with(runtime: FakeRuntime, base: &TempDir) -> SessionLauncher<FakeRuntime> {
        let dirs = SessionDirs::new(base.path());
        std::fs::write(dirs.template_file(), "FROM scratch\n").unwrap();
        SessionLauncher::new(runtime, dirs, ModelConfig::default())
            .with_ready_poll(Duration::from_millis(1), 3)
    }

    fn headless_config(workspace: &TempDir) -> SessionConfig {
        SessionConfig::new("demo", workspace.path().display().to_string())
            .with_prompt("list files")
    }

    #[tokio::test]
    async fn headless_run_completes_and_captures_output() {
        let base = TempDir::new().unwrap();
        let workspace = TempDir::new().unwrap();
        let launcher = launcher_with(FakeRuntime::default(), &base);

        let result = launcher.launch(headless_config(&workspace)).await.unwrap();

        assert_eq!(result.name, "demo");
        assert_eq!(result.mode, SessionMode::Headless);
        assert_eq!(result.status, SessionStatus::Completed);

        let output_file = result.output_file.unwrap();
        assert!(output_file.ends_with("output/demo.json"));
        let output = std::fs::read_to_string(output_file).unwrap();
        assert!(output.contains("\"result\":\"ok\""));

        let log = std::fs::read_to_string(result.log_file).unwrap();
        assert!(log.contains("Mode: headless"));
        assert!(log.contains("Prompt: list files"));
        assert!(log.contains("Completed:"));
    }

    #[tokio::test]
    async fn stale_removal_precedes_creation() {
        let base = TempDir::new().unwrap();
        let workspace = TempDir::new().unwrap();
        let runtime =
            FakeRuntime::with_listing("NAME IMAGE STATUS\ndemo agent-dock:latest running\n");
        let launcher = launcher_with(runtime, &base);

        launcher.launch(headless_config(&workspace)).await.unwrap();

        let calls = launcher.runtime().calls();
        let remove_idx = calls.iter().position(|c| c == "remove demo").unwrap();
        let start_idx = calls.iter().position(|c| c.starts_with("start ")).unwrap();
        assert!(remove_idx < start_idx, "removal must precede creation: {calls:?}");
    }

    #[tokio::test]
    async fn stale_removal_failure_is_swallowed() {
        let base = TempDir::new().unwrap();
        let workspace = TempDir::new().unwrap();
        let runtime = FakeRuntime {
            fail_remove: true,
            ..Default::default()
        };
        let launcher = launcher_with(runtime, &base);

        // Teardown also fails, but headless still completes.
        let result = launcher.launch(headless_config(&workspace)).await.unwrap();
        assert_eq!(result.status, SessionStatus::Completed);
    }

    #[tokio::test]
    async fn invalid_workspace_issues_no_runtime_commands() {
        let base = TempDir::new().unwrap();
        let launcher = launcher_with(FakeRuntime::default(), &base);

        let config = SessionConfig::new("demo", "/no/such/dir").with_prompt("x");
        let err = launcher.launch(config).await.unwrap_err();

        assert!(matches!(err, Error::InvalidWorkspace(_)));
        assert!(launcher.runtime().calls().is_empty());
    }

    #[tokio::test]
    async fn missing_prompt_file_fails_fast() {
        let base = TempDir::new().unwrap();
        let workspace = TempDir::new().unwrap();
        let launcher = launcher_with(FakeRuntime::default(), &base);

        let config = SessionConfig::new("demo", workspace.path().display().to_string())
            .with_prompt_file("/no/such/prompt.md");
        let err = launcher.launch(config).await.unwrap_err();

        assert!(matches!(err, Error::PromptFileMissing(_)));
        assert!(launcher.runtime().calls().is_empty());
    }

    #[tokio::test]
    async fn missing_template_fails_before_validation_side_effects() {
        let base = TempDir::new().unwrap();
        let workspace = TempDir::new().unwrap();
        let dirs = SessionDirs::new(base.path());
        let launcher = SessionLauncher::new(FakeRuntime::default(), dirs, ModelConfig::default());

        let err = launcher.launch(headless_config(&workspace)).await.unwrap_err();
        assert!(matches!(err, Error::TemplateMissing(_)));
    }

    #[tokio::test]
    async fn interactive_run_blocks_and_appends_footer() {
        let base = TempDir::new().unwrap();
        let workspace = TempDir::new().unwrap();
        let launcher = launcher_with(FakeRuntime::default(), &base);

        let config = SessionConfig::new("demo", workspace.path().display().to_string());
        let result = launcher.launch(config).await.unwrap();

        assert_eq!(result.mode, SessionMode::Interactive);
        assert_eq!(result.status, SessionStatus::Completed);
        assert!(result.output_file.is_none());

        let calls = launcher.runtime().calls();
        assert!(calls.iter().any(|c| c.starts_with("start ") && !c.contains("--detach")));
        assert!(!calls.iter().any(|c| c.starts_with("exec ")));
    }

    #[tokio::test]
    async fn detached_run_returns_running_and_dispatches_in_background() {
        let base = TempDir::new().unwrap();
        let workspace = TempDir::new().unwrap();
        let launcher = launcher_with(FakeRuntime::default(), &base);

        let config = SessionConfig::new("demo", workspace.path().display().to_string())
            .with_prompt("do the thing")
            .detached();
        let result = launcher.launch(config).await.unwrap();

        assert_eq!(result.mode, SessionMode::Detached);
        assert_eq!(result.status, SessionStatus::Running);
        assert!(result.output_file.is_some());

        let calls = launcher.runtime().calls();
        assert!(calls.iter().any(|c| c.contains("--detach")));
        // Session stays alive: the background dispatch is the last call,
        // no teardown and no completion marker follow it.
        assert!(calls.last().unwrap().starts_with("exec-bg demo"));
        let log = std::fs::read_to_string(result.log_file).unwrap();
        assert!(!log.contains("Completed:"));
    }

    #[tokio::test]
    async fn detached_without_prompt_skips_dispatch() {
        let base = TempDir::new().unwrap();
        let workspace = TempDir::new().unwrap();
        let launcher = launcher_with(FakeRuntime::default(), &base);

        let config = SessionConfig::new("demo", workspace.path().display().to_string()).detached();
        let result = launcher.launch(config).await.unwrap();

        assert_eq!(result.status, SessionStatus::Running);
        assert!(result.output_file.is_none());
        assert!(!launcher
            .runtime()
            .calls()
            .iter()
            .any(|c| c.starts_with("exec-bg")));
    }

    /// Fake whose listing never shows the session running.
    struct NeverReady(FakeRuntime);

    #[async_trait]
    impl RuntimeClient for NeverReady {
        async fn start(&self, command: &str, mode: StartMode) -> Result<()> {
            self.0.calls.lock().unwrap().push(format!("start {command}"));
            let _ = mode;
            Ok(())
        }
        async fn exec(&self, name: &str, script: &str) -> Result<String> {
            self.0.exec(name, script).await
        }
        fn exec_background(&self, name: &str, script: &str, output: &Path) -> Result<()> {
            self.0.exec_background(name, script, output)
        }
        async fn list(&self) -> Result<String> {
            Ok("NAME IMAGE STATUS\n".to_string())
        }
        async fn remove(&self, name: &str) -> Result<()> {
            self.0.remove(name).await
        }
    }

    #[tokio::test]
    async fn ready_poll_exhaustion_is_an_error() {
        let base = TempDir::new().unwrap();
        let workspace = TempDir::new().unwrap();
        let dirs = SessionDirs::new(base.path());
        std::fs::write(dirs.template_file(), "FROM scratch\n").unwrap();

        let launcher = SessionLauncher::new(NeverReady(FakeRuntime::default()), dirs, ModelConfig::default())
            .with_ready_poll(Duration::from_millis(1), 2);

        let err = launcher.launch(headless_config(&workspace)).await.unwrap_err();
        assert!(matches!(err, Error::SessionNotReady(_)));
    }

    #[tokio::test]
    async fn continue_against_live_session_reconnects_without_removal() {
        let base = TempDir::new().unwrap();
        let workspace = TempDir::new().unwrap();
        let runtime =
            FakeRuntime::with_listing("NAME IMAGE STATUS\ndemo agent-dock:latest running\n");
        let launcher = launcher_with(runtime, &base);

        let mut config = headless_config(&workspace);
        config.continue_conversation = true;
        launcher.launch(config).await.unwrap();

        let calls = launcher.runtime().calls();
        // The live session is reused: no start, and the only removal is
        // the post-run teardown after the exec.
        assert!(!calls.iter().any(|c| c.starts_with("start ")), "{calls:?}");
        let exec_idx = calls.iter().position(|c| c.starts_with("exec ")).unwrap();
        assert!(!calls[..exec_idx].iter().any(|c| c == "remove demo"));
        assert!(calls.iter().any(|c| c.contains("claude --continue")));
    }
}
