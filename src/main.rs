//! Agent Dock CLI
//!
//! CLI for running coding agents in ephemeral container sandbox sessions.

use std::io::Read;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

use agent_dock::cleanup::{CleanupManager, CleanupOptions, ALL_TARGET};
use agent_dock::lifecycle::SessionLauncher;
use agent_dock::logs::{self, LogKind};
use agent_dock::runtime::SandboxRuntime;
use agent_dock::task::{TaskDispatcher, TaskOptions};
use agent_dock::{output, status, ModelConfig, SessionConfig, SessionDirs, SessionMode};

#[derive(Debug, Parser)]
#[command(
    name = "agent-dock",
    about = "Run coding agents in ephemeral container sandbox sessions",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Start a sandbox session (interactive, headless or detached).
    Run {
        /// Session name; generated when omitted.
        #[arg(short, long)]
        name: Option<String>,

        /// Inline prompt; its presence selects headless mode.
        #[arg(short, long, conflicts_with = "prompt_file")]
        prompt: Option<String>,

        /// File holding the prompt.
        #[arg(short = 'f', long)]
        prompt_file: Option<PathBuf>,

        /// Run in the background and leave the session alive.
        #[arg(short, long)]
        detach: bool,

        /// Output file override for captured agent output.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Continue the previous conversation in an existing session.
        #[arg(short = 'c', long = "continue")]
        continue_conversation: bool,

        /// Host directories to mount, each optionally suffixed with `:ro`.
        #[arg(required = true)]
        workspaces: Vec<String>,
    },

    /// Send an additional instruction to a running session.
    Task {
        /// Target session name.
        session: String,

        /// Prompt text; `-` or omitted reads standard input.
        prompt: Option<String>,

        /// File holding the prompt.
        #[arg(short = 'f', long)]
        prompt_file: Option<PathBuf>,

        /// Output file override.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Block until the task finishes.
        #[arg(short, long)]
        wait: bool,
    },

    /// Show sessions, recent logs and worktrees.
    Status,

    /// Remove sessions and associated artifacts.
    Cleanup {
        /// Session name to remove.
        #[arg(conflicts_with = "all")]
        target: Option<String>,

        /// Remove every session the runtime knows about.
        #[arg(long)]
        all: bool,

        /// Also purge the worktree directory tree.
        #[arg(long)]
        worktrees: bool,

        /// Also purge log files.
        #[arg(long)]
        logs: bool,
    },

    /// Browse session and task logs.
    Logs {
        /// Show files whose name contains this pattern.
        pattern: Option<String>,

        /// Browse captured output files instead of logs.
        #[arg(long)]
        output: bool,

        /// Show all recent files, not just the newest.
        #[arg(long)]
        all: bool,

        /// Lines shown per file.
        #[arg(short = 'n', long, default_value_t = 50)]
        lines: usize,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> agent_dock::error::Result<()> {
    let dirs = SessionDirs::from_env();
    let runtime = SandboxRuntime::new();

    match cli.command {
        Command::Run {
            name,
            prompt,
            prompt_file,
            detach,
            output,
            continue_conversation,
            workspaces,
        } => {
            let config = SessionConfig {
                name: name.unwrap_or_else(SessionConfig::generate_name),
                workspaces,
                prompt,
                prompt_file,
                detached: detach,
                continue_conversation,
                output_file: output,
            };

            println!("Starting sandbox session");
            println!("  Name:      {}", config.name);
            println!("  Workspace: {}", config.workspaces.join(", "));
            println!();

            let launcher = SessionLauncher::new(runtime, dirs, ModelConfig::load());
            let result = launcher.launch(config).await?;

            match result.mode {
                SessionMode::Interactive => {
                    println!();
                    println!("Session exited");
                }
                SessionMode::Headless => {
                    if let Some(output_file) = &result.output_file {
                        display_result_file(output_file);
                    }
                }
                SessionMode::Detached => {
                    println!("Session '{}' is running in the background", result.name);
                    if let Some(output_file) = &result.output_file {
                        println!("  Output: {}", output_file.display());
                    }
                    println!("  Log:    {}", result.log_file.display());
                }
            }
            Ok(())
        }

        Command::Task {
            session,
            prompt,
            prompt_file,
            output,
            wait,
        } => {
            // `-` or no prompt source at all means the prompt is piped in.
            let wants_stdin =
                prompt_file.is_none() && matches!(prompt.as_deref(), None | Some("-"));
            let prompt = if wants_stdin {
                Some(read_stdin()?)
            } else {
                prompt
            };

            let dispatcher = TaskDispatcher::new(runtime, dirs, ModelConfig::load());
            let result = dispatcher
                .send_task(TaskOptions {
                    session,
                    prompt,
                    prompt_file,
                    output_file: output,
                    wait,
                })
                .await?;

            println!("Task {} sent to {}", result.task_id, result.session);
            println!("  Output: {}", result.output_file.display());
            if wait {
                display_result_file(&result.output_file);
                println!("Task completed");
            } else {
                println!("Task started in background");
                println!("  tail -f {}  # watch output", result.output_file.display());
            }
            Ok(())
        }

        Command::Status => {
            let report = status::collect(&runtime, &dirs).await;

            println!("=== Sessions ===");
            if report.sessions.is_empty() {
                println!("  None");
            }
            for session in &report.sessions {
                println!("  {} ({})", session.name, session.status);
            }

            println!();
            println!("=== Recent Logs ===");
            if report.recent_logs.is_empty() {
                println!("  None");
            }
            for log in &report.recent_logs {
                println!("  {}", log.name);
            }

            println!();
            println!("=== Worktrees ===");
            if report.worktrees.is_empty() {
                println!("  None");
            }
            for worktree in &report.worktrees {
                println!("  {}", worktree.name);
            }
            Ok(())
        }

        Command::Cleanup {
            target,
            all,
            worktrees,
            logs,
        } => {
            let target = if all {
                Some(ALL_TARGET.to_string())
            } else {
                target
            };
            if target.is_none() && !worktrees && !logs {
                println!("Nothing removed. Pass a session name or --all,");
                println!("or --worktrees/--logs to choose what to clean up.");
                return Ok(());
            }

            let manager = CleanupManager::new(runtime, dirs);
            let result = manager
                .cleanup(&CleanupOptions {
                    target,
                    remove_worktrees: worktrees,
                    remove_logs: logs,
                })
                .await?;

            for name in &result.sessions_removed {
                println!("  Removed {name}");
            }
            for (name, detail) in &result.failures {
                println!("  Could not remove {name}: {detail}");
            }
            if result.worktrees_removed {
                println!("  Worktrees purged");
            }
            if result.logs_removed {
                println!("  Logs purged");
            }
            println!("Cleanup complete");
            Ok(())
        }

        Command::Logs {
            pattern,
            output,
            all,
            lines,
        } => {
            let kind = if output { LogKind::Output } else { LogKind::Log };
            let files = logs::list_files(&dirs, kind);

            if files.is_empty() {
                println!("No files found");
                return Ok(());
            }

            let selected = logs::select_files(files, all, pattern.as_deref());
            if selected.is_empty() {
                println!("No files match pattern: {}", pattern.unwrap_or_default());
                return Ok(());
            }

            for file in &selected {
                println!("=== {} ===", file.name);
                println!("{}", logs::tail(file, lines)?);
                println!();
            }
            Ok(())
        }
    }
}

/// Reads a prompt from standard input (piped usage).
fn read_stdin() -> std::io::Result<String> {
    let mut buffer = String::new();
    std::io::stdin().read_to_string(&mut buffer)?;
    Ok(buffer)
}

/// Prints the final result extracted from a captured-output file.
fn display_result_file(path: &std::path::Path) {
    match output::read_result_file(path) {
        Ok(Some(result)) => {
            let border = "-".repeat(60);
            println!("{border}");
            println!("Result:");
            println!("{result}");
            println!("{border}");
        }
        Ok(None) => println!("No output captured at {}", path.display()),
        Err(e) => eprintln!("Could not read output file: {e}"),
    }
}
