//! Worker configuration, loaded once at startup from the environment.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use dotenvy::dotenv;
use uuid::Uuid;

/// Immutable process-lifetime configuration. Constructed once in `main` and
/// passed by reference; nothing deeper reads ambient process state.
#[derive(Debug, Clone)]
pub struct Config {
    pub dashboard_url: String,
    pub worker_id: String,
    /// How long to sleep when no task is available.
    pub poll_interval: Duration,
    /// If set, this worker only processes tasks for one run and exits when
    /// the run has no tasks left.
    pub run_id_filter: Option<String>,
    /// Path of the crawl binary spawned per task.
    pub crawl_program: PathBuf,
    /// Root of the per-task log tree.
    pub log_dir: PathBuf,
    /// Hard wall-clock limit for one crawl process.
    pub task_timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables (and `.env` if present).
    pub fn from_env() -> Result<Self> {
        let _ = dotenv();

        let poll_interval: u64 = env::var("POLL_INTERVAL")
            .unwrap_or_else(|_| "15".to_string())
            .parse()
            .context("POLL_INTERVAL must be a number of seconds")?;
        let task_timeout: u64 = env::var("TASK_TIMEOUT")
            .unwrap_or_else(|_| "7200".to_string())
            .parse()
            .context("TASK_TIMEOUT must be a number of seconds")?;

        Ok(Self {
            dashboard_url: env::var("DASHBOARD_URL")
                .unwrap_or_else(|_| "http://dashboard_service:8000".to_string()),
            worker_id: env::var("WORKER_ID")
                .unwrap_or_else(|_| format!("worker-{}", Uuid::new_v4())),
            poll_interval: Duration::from_secs(poll_interval),
            run_id_filter: env::var("RUN_ID_FILTER").ok(),
            crawl_program: env::var("CRAWL_PROGRAM")
                .unwrap_or_else(|_| "crawl".to_string())
                .into(),
            log_dir: env::var("LOG_DIR")
                .unwrap_or_else(|_| "logs".to_string())
                .into(),
            task_timeout: Duration::from_secs(task_timeout),
        })
    }
}
