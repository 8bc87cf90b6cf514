//! Process supervision for crawl tasks.
//!
//! One isolated child process per task: it receives only the task's own
//! payload and identifiers, its combined output lands in a log file keyed
//! by `(portal_id, run_id, task_id)`, and a hard wall-clock timeout bounds
//! its lifetime.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use dashboard_client::Task;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tracing::{error, info, warn};

/// How many trailing log lines are attached to a failure report.
const ERROR_CONTEXT_LINES: usize = 100;
/// Upper bound on the attached error context.
const ERROR_CONTEXT_CHARS: usize = 500;

/// Result of running one task to completion. Failures are data, not
/// `Err`: the worker must report them to the dashboard either way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Success,
    Failed {
        error_code: String,
        error_message: String,
    },
}

impl TaskOutcome {
    pub fn failed(error_code: impl Into<String>, error_message: impl Into<String>) -> Self {
        Self::Failed {
            error_code: error_code.into(),
            error_message: error_message.into(),
        }
    }
}

/// Runs one leased task to completion. A trait so the worker loop can be
/// tested without spawning processes.
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    async fn execute(&self, task: &Task, spider_name: &str) -> TaskOutcome;
}

/// Spawns the `crawl` binary once per task.
pub struct ProcessExecutor {
    program: PathBuf,
    log_dir: PathBuf,
    timeout: Duration,
}

impl ProcessExecutor {
    pub fn new(program: impl Into<PathBuf>, log_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            log_dir: log_dir.into(),
            // Spiders get two hours of wall clock, then they are killed.
            timeout: Duration::from_secs(7200),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn log_path(&self, task: &Task) -> PathBuf {
        self.log_dir
            .join(&task.payload.portal_id)
            .join(&task.payload.run_id)
            .join(format!("{}.log", task.task_id))
    }
}

#[async_trait]
impl TaskExecutor for ProcessExecutor {
    async fn execute(&self, task: &Task, spider_name: &str) -> TaskOutcome {
        let log_path = self.log_path(task);
        if let Some(parent) = log_path.parent() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                return TaskOutcome::failed(
                    "execution_error",
                    truncate(&format!("could not create log directory: {e}")),
                );
            }
        }

        let payload_json = match serde_json::to_string(&task.payload) {
            Ok(json) => json,
            Err(e) => {
                return TaskOutcome::failed(
                    "execution_error",
                    truncate(&format!("could not serialize task payload: {e}")),
                );
            }
        };

        info!(
            task_id = %task.task_id,
            spider = %spider_name,
            log = %log_path.display(),
            "launching crawl process"
        );

        let mut command = Command::new(&self.program);
        command
            .arg("crawl")
            .arg(spider_name)
            .arg("--payload")
            .arg(&payload_json)
            .arg("--portal-id")
            .arg(&task.payload.portal_id)
            .arg("--run-id")
            .arg(&task.payload.run_id)
            .arg("--task-id")
            .arg(&task.task_id)
            .arg("--task-type")
            .arg(&task.task_type)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                error!(task_id = %task.task_id, error = %e, "failed to launch crawl process");
                return TaskOutcome::failed(
                    "execution_error",
                    truncate(&format!("could not launch `{}`: {e}", self.program.display())),
                );
            }
        };

        // Drain both pipes while the child runs so it can never block on a
        // full pipe buffer.
        let stdout_task = tokio::spawn(read_pipe(child.stdout.take()));
        let stderr_task = tokio::spawn(read_pipe(child.stderr.take()));

        let status = match tokio::time::timeout(self.timeout, child.wait()).await {
            Err(_) => {
                // kill() waits for the child to actually exit.
                if let Err(e) = child.kill().await {
                    warn!(task_id = %task.task_id, error = %e, "failed to kill timed-out crawl process");
                }
                let output = collect_output(stdout_task, stderr_task).await;
                write_log(&log_path, &output).await;
                error!(task_id = %task.task_id, "crawl process timed out");
                return TaskOutcome::failed(
                    "timeout",
                    format!(
                        "crawl execution timed out after {} seconds",
                        self.timeout.as_secs()
                    ),
                );
            }
            Ok(Err(e)) => {
                return TaskOutcome::failed(
                    "execution_error",
                    truncate(&format!("could not await crawl process: {e}")),
                );
            }
            Ok(Ok(status)) => status,
        };

        let output = collect_output(stdout_task, stderr_task).await;
        write_log(&log_path, &output).await;

        if status.success() {
            info!(task_id = %task.task_id, log = %log_path.display(), "crawl process succeeded");
            TaskOutcome::Success
        } else {
            let code = status.code();
            error!(task_id = %task.task_id, exit_code = ?code, "crawl process failed");
            let context = log_tail(&output);
            TaskOutcome::failed(
                "spider_error",
                match code {
                    Some(code) => format!("exit code {code}\n{context}"),
                    None => format!("terminated by signal\n{context}"),
                },
            )
        }
    }
}

async fn read_pipe<R: tokio::io::AsyncRead + Unpin>(pipe: Option<R>) -> String {
    let Some(mut pipe) = pipe else {
        return String::new();
    };
    let mut bytes = Vec::new();
    if let Err(e) = pipe.read_to_end(&mut bytes).await {
        warn!(error = %e, "failed to read crawl process output");
    }
    String::from_utf8_lossy(&bytes).into_owned()
}

async fn collect_output(
    stdout: tokio::task::JoinHandle<String>,
    stderr: tokio::task::JoinHandle<String>,
) -> String {
    let stdout = stdout.await.unwrap_or_default();
    let stderr = stderr.await.unwrap_or_default();
    if stderr.is_empty() {
        stdout
    } else if stdout.is_empty() {
        stderr
    } else {
        format!("{stdout}\n{stderr}")
    }
}

async fn write_log(path: &Path, output: &str) {
    if let Err(e) = tokio::fs::write(path, output).await {
        warn!(log = %path.display(), error = %e, "failed to write crawl log");
    }
}

/// The last `ERROR_CONTEXT_LINES` lines of the log, capped at
/// `ERROR_CONTEXT_CHARS`.
fn log_tail(output: &str) -> String {
    let lines: Vec<&str> = output.lines().collect();
    let start = lines.len().saturating_sub(ERROR_CONTEXT_LINES);
    truncate(&lines[start..].join("\n"))
}

fn truncate(text: &str) -> String {
    text.chars().take(ERROR_CONTEXT_CHARS).collect()
}
