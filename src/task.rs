//! Task dispatch into running sessions.
//!
//! A task is an additional instruction sent to a session that is already
//! alive, independent of the invocation that created it. Each task gets
//! a time-based id and its own log/output files.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::command::CommandBuilder;
use crate::config::ModelConfig;
use crate::error::{Error, Result};
use crate::paths::SessionDirs;
use crate::registry::Registry;
use crate::runtime::RuntimeClient;

/// Prompt preview length in task log headers.
const PROMPT_PREVIEW_CHARS: usize = 200;

/// Options for one task dispatch.
#[derive(Debug, Clone)]
pub struct TaskOptions {
    /// Target session name.
    pub session: String,
    /// Inline prompt text.
    pub prompt: Option<String>,
    /// Path to a file holding the prompt; takes precedence over `prompt`.
    pub prompt_file: Option<PathBuf>,
    /// Explicit output file override.
    pub output_file: Option<PathBuf>,
    /// Block until the task finishes, streaming its output.
    pub wait: bool,
}

/// Final status of a dispatched task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Task is running in the background.
    Running,
    /// Task ran to completion.
    Completed,
}

/// Result of a task dispatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResult {
    /// Generated task id.
    pub task_id: String,
    /// Target session name.
    pub session: String,
    /// Captured-output file.
    pub output_file: PathBuf,
    /// Task log file.
    pub log_file: PathBuf,
    /// `Completed` for waited tasks, `Running` for background ones.
    pub status: TaskStatus,
}

/// Dispatches tasks into running sessions.
pub struct TaskDispatcher<R: RuntimeClient> {
    runtime: R,
    dirs: SessionDirs,
    builder: CommandBuilder,
}

impl<R: RuntimeClient> TaskDispatcher<R> {
    /// Creates a dispatcher over the given runtime and directory layout.
    pub fn new(runtime: R, dirs: SessionDirs, config: ModelConfig) -> Self {
        Self {
            runtime,
            dirs,
            builder: CommandBuilder::new(config),
        }
    }

    /// The runtime this dispatcher drives.
    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    /// Sends a task to a running session.
    ///
    /// Fails with [`Error::SessionNotFound`] when the session is not
    /// running, carrying the names of sessions that are.
    pub async fn send_task(&self, options: TaskOptions) -> Result<TaskResult> {
        self.dirs.ensure()?;

        let registry = Registry::new(&self.runtime);
        if !registry.exists(&options.session).await {
            return Err(Error::SessionNotFound {
                name: options.session.clone(),
                running: registry.running_names().await,
            });
        }

        let prompt = resolve_prompt(&options)?;
        let task_id = generate_task_id();
        let paths = self.dirs.plan_task(
            &options.session,
            &task_id,
            options.output_file.as_deref(),
        );

        write_task_log(&paths.log_file, &task_id, &options.session, &prompt)?;

        tracing::info!(
            session = %options.session,
            task = %task_id,
            wait = options.wait,
            "dispatching task"
        );

        // Tasks run from the session's own working directory, so the
        // script is the bare agent invocation.
        let script = self.builder.agent_script(Path::new("."), Some(&prompt), false);

        if options.wait {
            let output = self.runtime.exec(&options.session, &script).await?;
            std::fs::write(&paths.output_file, &output)?;
            append_completion(&paths.log_file)?;

            Ok(TaskResult {
                task_id,
                session: options.session,
                output_file: paths.output_file,
                log_file: paths.log_file,
                status: TaskStatus::Completed,
            })
        } else {
            self.runtime
                .exec_background(&options.session, &script, &paths.output_file)?;

            Ok(TaskResult {
                task_id,
                session: options.session,
                output_file: paths.output_file,
                log_file: paths.log_file,
                status: TaskStatus::Running,
            })
        }
    }
}

/// Generates a time-based task id.
fn generate_task_id() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    format!("task-{millis}")
}

fn resolve_prompt(options: &TaskOptions) -> Result<String> {
    let prompt = match &options.prompt_file {
        Some(path) => {
            if !path.is_file() {
                return Err(Error::PromptFileMissing(path.clone()));
            }
            std::fs::read_to_string(path)?.trim().to_string()
        }
        None => options.prompt.clone().unwrap_or_default(),
    };

    if prompt.trim().is_empty() {
        return Err(Error::Config("prompt is required".to_string()));
    }
    Ok(prompt)
}

fn write_task_log(log_file: &Path, task_id: &str, session: &str, prompt: &str) -> Result<()> {
    let preview: String = prompt.chars().take(PROMPT_PREVIEW_CHARS).collect();
    let ellipsis = if prompt.chars().count() > PROMPT_PREVIEW_CHARS {
        "..."
    } else {
        ""
    };

    let header = format!(
        "Task: {task_id}\nSandbox: {session}\nStarted: {}\nPrompt: {preview}{ellipsis}\n---\n",
        Utc::now().to_rfc3339(),
    );
    std::fs::write(log_file, header)?;
    Ok(())
}

fn append_completion(log_file: &Path) -> Result<()> {
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file)?;
    writeln!(file, "\nCompleted: {}", Utc::now().to_rfc3339())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::StartMode;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tempfile::TempDir;

    #[derive(Default)]
    struct FakeRuntime {
        calls: Mutex<Vec<String>>,
        listing: String,
    }

    impl FakeRuntime {
        fn with_listing(listing: &str) -> Self {
            Self {
                listing: listing.to_string(),
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl RuntimeClient for FakeRuntime {
        async fn start(&self, _: &str, _: StartMode) -> Result<()> {
            unreachable!("tasks never start sessions")
        }

        async fn exec(&self, name: &str, script: &str) -> Result<String> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("exec {name} {script}"));
            Ok("{\"type\":\"result\",\"result\":\"done\"}\n".to_string())
        }

        fn exec_background(&self, name: &str, _script: &str, output: &Path) -> Result<()> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("exec-bg {name} > {}", output.display()));
            Ok(())
        }

        async fn list(&self) -> Result<String> {
            Ok(self.listing.clone())
        }

        async fn remove(&self, _: &str) -> Result<()> {
            unreachable!("tasks never remove sessions")
        }
    }

    const RUNNING: &str = "NAME IMAGE STATUS\nagent-1 img running\nagent-2 img exited\n";

    fn dispatcher(listing: &str, base: &TempDir) -> TaskDispatcher<FakeRuntime> {
        TaskDispatcher::new(
            FakeRuntime::with_listing(listing),
            SessionDirs::new(base.path()),
            ModelConfig::default(),
        )
    }

    fn options(session: &str, wait: bool) -> TaskOptions {
        TaskOptions {
            session: session.to_string(),
            prompt: Some("run the tests".to_string()),
            prompt_file: None,
            output_file: None,
            wait,
        }
    }

    #[tokio::test]
    async fn waited_task_captures_output_and_completes() {
        let base = TempDir::new().unwrap();
        let dispatcher = dispatcher(RUNNING, &base);

        let result = dispatcher.send_task(options("agent-1", true)).await.unwrap();

        assert_eq!(result.status, TaskStatus::Completed);
        assert!(result.task_id.starts_with("task-"));

        let output = std::fs::read_to_string(&result.output_file).unwrap();
        assert!(output.contains("done"));

        let log = std::fs::read_to_string(&result.log_file).unwrap();
        assert!(log.contains("Sandbox: agent-1"));
        assert!(log.contains("Prompt: run the tests"));
        assert!(log.contains("Completed:"));
    }

    #[tokio::test]
    async fn background_task_reports_running() {
        let base = TempDir::new().unwrap();
        let dispatcher = dispatcher(RUNNING, &base);

        let result = dispatcher.send_task(options("agent-1", false)).await.unwrap();

        assert_eq!(result.status, TaskStatus::Running);
        let calls = dispatcher.runtime().calls.lock().unwrap().clone();
        assert!(calls[0].starts_with("exec-bg agent-1"));
        // The background task appends its own completion marker later.
        let log = std::fs::read_to_string(&result.log_file).unwrap();
        assert!(!log.contains("Completed:"));
    }

    #[tokio::test]
    async fn unknown_session_lists_running_sessions() {
        let base = TempDir::new().unwrap();
        let dispatcher = dispatcher(RUNNING, &base);

        let err = dispatcher.send_task(options("ghost", true)).await.unwrap_err();

        match err {
            Error::SessionNotFound { name, running } => {
                assert_eq!(name, "ghost");
                assert_eq!(running, vec!["agent-1".to_string()]);
            }
            other => panic!("expected SessionNotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_prompt_is_rejected() {
        let base = TempDir::new().unwrap();
        let dispatcher = dispatcher(RUNNING, &base);

        let mut opts = options("agent-1", true);
        opts.prompt = Some("   ".to_string());
        let err = dispatcher.send_task(opts).await.unwrap_err();

        assert!(matches!(err, Error::Config(_)));
    }

    #[tokio::test]
    async fn prompt_file_is_read_and_trimmed() {
        let base = TempDir::new().unwrap();
        let prompt_file = base.path().join("prompt.md");
        std::fs::write(&prompt_file, "  fix the build  \n").unwrap();

        let dispatcher = dispatcher(RUNNING, &base);
        let mut opts = options("agent-1", true);
        opts.prompt = None;
        opts.prompt_file = Some(prompt_file);

        dispatcher.send_task(opts).await.unwrap();

        let calls = dispatcher.runtime().calls.lock().unwrap().clone();
        assert!(calls[0].contains("'fix the build'"));
    }

    #[tokio::test]
    async fn task_ids_are_time_based() {
        let id = generate_task_id();
        let millis: u128 = id.strip_prefix("task-").unwrap().parse().unwrap();
        assert!(millis > 0);
    }
}
