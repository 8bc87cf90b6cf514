//! The lease/execute/report loop.
//!
//! A worker polls the dashboard for a task lease, runs the task under a
//! heartbeat that keeps the lease alive, and reports the outcome. In
//! drain mode (a run filter is set and the queue answers empty) the loop
//! exits instead of idling.

use std::sync::Arc;
use std::time::Duration;

use dashboard_client::{DashboardApi, FailRequest, LeaseRequest, Task};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::executor::{TaskExecutor, TaskOutcome};
use crate::retry::is_retryable;

/// Cadence used when a task arrives with a zero heartbeat interval.
/// `tokio::time::interval` panics on a zero period, so the wire value is
/// never trusted blindly.
const MIN_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(1);

enum LoopStep {
    /// A task was leased and reported; poll again immediately.
    Worked,
    /// Nothing to do right now; sleep one poll interval.
    Idle,
    /// The filtered run has no tasks left; the loop should exit.
    Drained,
}

pub struct Worker {
    config: Config,
    dashboard: Arc<dyn DashboardApi>,
    executor: Arc<dyn TaskExecutor>,
}

impl Worker {
    pub fn new(
        config: Config,
        dashboard: Arc<dyn DashboardApi>,
        executor: Arc<dyn TaskExecutor>,
    ) -> Self {
        Self {
            config,
            dashboard,
            executor,
        }
    }

    /// Poll until cancelled, or until a filtered run drains.
    pub async fn run(&self, shutdown: CancellationToken) {
        info!(
            worker_id = %self.config.worker_id,
            run_id_filter = ?self.config.run_id_filter,
            "worker started"
        );

        loop {
            if shutdown.is_cancelled() {
                break;
            }

            match self.poll_once().await {
                LoopStep::Worked => {}
                LoopStep::Idle => {
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(self.config.poll_interval) => {}
                    }
                }
                LoopStep::Drained => {
                    info!(
                        run_id = ?self.config.run_id_filter,
                        "run drained, worker exiting"
                    );
                    break;
                }
            }
        }

        info!(worker_id = %self.config.worker_id, "worker stopped");
    }

    async fn poll_once(&self) -> LoopStep {
        let request = LeaseRequest {
            worker_id: self.config.worker_id.clone(),
            run_id: self.config.run_id_filter.clone(),
        };

        let task = match self.dashboard.lease_task(&request).await {
            Ok(Some(task)) => task,
            Ok(None) => {
                // An empty queue only terminates the worker when it was
                // pinned to a specific run.
                return if self.config.run_id_filter.is_some() {
                    LoopStep::Drained
                } else {
                    debug!("no task available");
                    LoopStep::Idle
                };
            }
            Err(e) => {
                // A lease failure is indistinguishable from a dashboard
                // hiccup; never treat it as a drained queue.
                warn!(error = %e, "task lease failed");
                return LoopStep::Idle;
            }
        };

        info!(
            task_id = %task.task_id,
            task_type = %task.task_type,
            portal_id = %task.payload.portal_id,
            run_id = %task.payload.run_id,
            "leased task"
        );

        let heartbeat_interval = Duration::from_secs(task.heartbeat_interval);
        let outcome = self.execute_with_heartbeat(&task, heartbeat_interval).await;
        self.report(&task, outcome).await;
        LoopStep::Worked
    }

    /// Run the task while a background loop extends the lease. The
    /// heartbeat is cancelled and joined before the outcome is returned,
    /// so no heartbeat can land after completion is reported.
    pub async fn execute_with_heartbeat(&self, task: &Task, interval: Duration) -> TaskOutcome {
        let interval = if interval.is_zero() {
            MIN_HEARTBEAT_INTERVAL
        } else {
            interval
        };
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(heartbeat_loop(
            Arc::clone(&self.dashboard),
            task.task_id.clone(),
            interval,
            cancel.clone(),
        ));

        let spider_name = self.resolve_spider_name(task).await;
        let outcome = self.executor.execute(task, &spider_name).await;

        cancel.cancel();
        let _ = handle.await;

        outcome
    }

    /// The portal record names the crawl routine; fall back to the
    /// portal id when the lookup fails or the record carries no name.
    async fn resolve_spider_name(&self, task: &Task) -> String {
        match self.dashboard.get_portal(&task.payload.portal_id).await {
            Ok(portal) => portal
                .spider_name
                .unwrap_or_else(|| task.payload.portal_id.clone()),
            Err(e) => {
                warn!(
                    portal_id = %task.payload.portal_id,
                    error = %e,
                    "portal lookup failed, using portal id as spider name"
                );
                task.payload.portal_id.clone()
            }
        }
    }

    async fn report(&self, task: &Task, outcome: TaskOutcome) {
        match outcome {
            TaskOutcome::Success => {
                info!(task_id = %task.task_id, "task completed");
                if let Err(e) = self.dashboard.complete_task(&task.task_id).await {
                    error!(task_id = %task.task_id, error = %e, "failed to report completion");
                }
            }
            TaskOutcome::Failed {
                error_code,
                error_message,
            } => {
                let request = FailRequest {
                    retryable: is_retryable(&error_code),
                    error_code,
                    error_message,
                };
                error!(
                    task_id = %task.task_id,
                    error_code = %request.error_code,
                    retryable = request.retryable,
                    "task failed"
                );
                if let Err(e) = self.dashboard.fail_task(&task.task_id, &request).await {
                    error!(task_id = %task.task_id, error = %e, "failed to report failure");
                }
            }
        }
    }
}

async fn heartbeat_loop(
    dashboard: Arc<dyn DashboardApi>,
    task_id: String,
    interval: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    // The first tick fires immediately; the lease is fresh, skip it.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                match dashboard.heartbeat(&task_id).await {
                    Ok(extension) => {
                        debug!(
                            task_id = %task_id,
                            lease_expires_at = ?extension.lease_expires_at,
                            "lease extended"
                        );
                    }
                    Err(e) => {
                        // A missed heartbeat is the dashboard's signal to
                        // re-lease; the execution itself keeps going.
                        warn!(task_id = %task_id, error = %e, "heartbeat failed");
                    }
                }
            }
        }
    }
}
