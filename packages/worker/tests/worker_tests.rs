//! Worker loop tests against a scripted dashboard.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use crawl_worker::{Config, TaskExecutor, TaskOutcome, Worker};
use crawler_core::LinkBatch;
use dashboard_client::{
    DashboardApi, DashboardError, FailRequest, LeaseExtension, LeaseRequest, PortalInfo, Task,
    TaskPayload,
};
use tokio_util::sync::CancellationToken;

type LeaseScript = VecDeque<dashboard_client::Result<Option<Task>>>;

/// Dashboard double: hands out scripted lease responses and records
/// everything the worker reports back.
struct ScriptedDashboard {
    leases: Mutex<LeaseScript>,
    lease_calls: AtomicUsize,
    heartbeats: AtomicUsize,
    completions: Mutex<Vec<String>>,
    failures: Mutex<Vec<(String, FailRequest)>>,
    portal: Option<PortalInfo>,
}

impl ScriptedDashboard {
    fn new(leases: impl IntoIterator<Item = dashboard_client::Result<Option<Task>>>) -> Self {
        Self {
            leases: Mutex::new(leases.into_iter().collect()),
            lease_calls: AtomicUsize::new(0),
            heartbeats: AtomicUsize::new(0),
            completions: Mutex::new(Vec::new()),
            failures: Mutex::new(Vec::new()),
            portal: Some(PortalInfo {
                spider_name: Some("dummy_json".into()),
            }),
        }
    }

    fn without_portal(mut self) -> Self {
        self.portal = None;
        self
    }
}

#[async_trait]
impl DashboardApi for ScriptedDashboard {
    async fn lease_task(&self, _request: &LeaseRequest) -> dashboard_client::Result<Option<Task>> {
        self.lease_calls.fetch_add(1, Ordering::SeqCst);
        self.leases.lock().unwrap().pop_front().unwrap_or(Ok(None))
    }

    async fn heartbeat(&self, _task_id: &str) -> dashboard_client::Result<LeaseExtension> {
        self.heartbeats.fetch_add(1, Ordering::SeqCst);
        Ok(LeaseExtension {
            lease_expires_at: Some(chrono::Utc::now() + chrono::Duration::minutes(5)),
        })
    }

    async fn complete_task(&self, task_id: &str) -> dashboard_client::Result<()> {
        self.completions.lock().unwrap().push(task_id.to_string());
        Ok(())
    }

    async fn fail_task(
        &self,
        task_id: &str,
        request: &FailRequest,
    ) -> dashboard_client::Result<()> {
        self.failures
            .lock()
            .unwrap()
            .push((task_id.to_string(), request.clone()));
        Ok(())
    }

    async fn get_portal(&self, _portal_id: &str) -> dashboard_client::Result<PortalInfo> {
        match &self.portal {
            Some(portal) => Ok(portal.clone()),
            None => Err(DashboardError::Api {
                status: 404,
                message: "portal not found".into(),
            }),
        }
    }

    async fn store_links(&self, _batch: &LinkBatch) -> dashboard_client::Result<u64> {
        Ok(0)
    }
}

/// Executor double: returns a fixed outcome after an optional delay and
/// records the spider names it was asked to run.
struct FixedExecutor {
    outcome: TaskOutcome,
    delay: Duration,
    spiders: Mutex<Vec<String>>,
}

impl FixedExecutor {
    fn succeeding() -> Self {
        Self::returning(TaskOutcome::Success)
    }

    fn returning(outcome: TaskOutcome) -> Self {
        Self {
            outcome,
            delay: Duration::ZERO,
            spiders: Mutex::new(Vec::new()),
        }
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl TaskExecutor for FixedExecutor {
    async fn execute(&self, _task: &Task, spider_name: &str) -> TaskOutcome {
        self.spiders.lock().unwrap().push(spider_name.to_string());
        if self.delay > Duration::ZERO {
            tokio::time::sleep(self.delay).await;
        }
        self.outcome.clone()
    }
}

fn task(task_id: &str) -> Task {
    Task {
        task_id: task_id.into(),
        task_type: "URL_BATCH".into(),
        payload: TaskPayload {
            portal_id: "portal_x".into(),
            run_id: "run_1".into(),
            partition: serde_json::Map::new(),
        },
        lease_expires_at: None,
        heartbeat_interval: 120,
    }
}

fn config(run_id_filter: Option<&str>) -> Config {
    Config {
        dashboard_url: "http://dashboard.test".into(),
        worker_id: "worker-test".into(),
        poll_interval: Duration::from_millis(10),
        run_id_filter: run_id_filter.map(String::from),
        crawl_program: PathBuf::from("crawl"),
        log_dir: PathBuf::from("logs"),
        task_timeout: Duration::from_secs(5),
    }
}

fn worker(
    run_id_filter: Option<&str>,
    dashboard: Arc<ScriptedDashboard>,
    executor: Arc<FixedExecutor>,
) -> Worker {
    Worker::new(config(run_id_filter), dashboard, executor)
}

#[tokio::test]
async fn successful_task_is_completed_exactly_once() {
    let dashboard = Arc::new(ScriptedDashboard::new([Ok(Some(task("task_1"))), Ok(None)]));
    let executor = Arc::new(FixedExecutor::succeeding());
    let worker = worker(Some("run_1"), Arc::clone(&dashboard), Arc::clone(&executor));

    worker.run(CancellationToken::new()).await;

    assert_eq!(*dashboard.completions.lock().unwrap(), vec!["task_1"]);
    assert!(dashboard.failures.lock().unwrap().is_empty());
    // Execution finished well inside the heartbeat interval.
    assert_eq!(dashboard.heartbeats.load(Ordering::SeqCst), 0);
    assert_eq!(*executor.spiders.lock().unwrap(), vec!["dummy_json"]);
}

#[tokio::test]
async fn failure_is_reported_with_retry_classification() {
    let dashboard = Arc::new(ScriptedDashboard::new([Ok(Some(task("task_1"))), Ok(None)]));
    let executor = Arc::new(FixedExecutor::returning(TaskOutcome::failed(
        "timeout",
        "crawl execution timed out after 5 seconds",
    )));
    let worker = worker(Some("run_1"), Arc::clone(&dashboard), executor);

    worker.run(CancellationToken::new()).await;

    let failures = dashboard.failures.lock().unwrap();
    assert_eq!(failures.len(), 1);
    let (task_id, request) = &failures[0];
    assert_eq!(task_id, "task_1");
    assert_eq!(request.error_code, "timeout");
    assert!(request.retryable);
    assert!(dashboard.completions.lock().unwrap().is_empty());
}

#[tokio::test]
async fn spider_errors_are_not_retryable() {
    let dashboard = Arc::new(ScriptedDashboard::new([Ok(Some(task("task_1"))), Ok(None)]));
    let executor = Arc::new(FixedExecutor::returning(TaskOutcome::failed(
        "spider_error",
        "exit code 3",
    )));
    let worker = worker(Some("run_1"), Arc::clone(&dashboard), executor);

    worker.run(CancellationToken::new()).await;

    let failures = dashboard.failures.lock().unwrap();
    assert!(!failures[0].1.retryable);
}

#[tokio::test]
async fn empty_queue_drains_only_a_filtered_worker() {
    // Filtered: the first empty response ends the loop.
    let dashboard = Arc::new(ScriptedDashboard::new([Ok(None)]));
    let filtered_worker = worker(
        Some("run_1"),
        Arc::clone(&dashboard),
        Arc::new(FixedExecutor::succeeding()),
    );
    filtered_worker.run(CancellationToken::new()).await;
    assert_eq!(dashboard.lease_calls.load(Ordering::SeqCst), 1);

    // Unfiltered: empty responses mean idle, keep polling until cancelled.
    let dashboard = Arc::new(ScriptedDashboard::new([Ok(None), Ok(None), Ok(None)]));
    let worker = worker(
        None,
        Arc::clone(&dashboard),
        Arc::new(FixedExecutor::succeeding()),
    );
    let shutdown = CancellationToken::new();
    let stopper = shutdown.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        stopper.cancel();
    });
    worker.run(shutdown).await;
    assert!(dashboard.lease_calls.load(Ordering::SeqCst) >= 2);
}

#[tokio::test]
async fn lease_failure_is_not_mistaken_for_a_drained_queue() {
    let dashboard = Arc::new(ScriptedDashboard::new([
        Err(DashboardError::Api {
            status: 500,
            message: "boom".into(),
        }),
        Ok(None),
    ]));
    let worker = worker(
        Some("run_1"),
        Arc::clone(&dashboard),
        Arc::new(FixedExecutor::succeeding()),
    );

    worker.run(CancellationToken::new()).await;

    // The error cost one idle cycle; only the real empty response drained.
    assert_eq!(dashboard.lease_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn heartbeats_fire_during_long_executions_and_stop_after() {
    let dashboard = Arc::new(ScriptedDashboard::new([]));
    let executor = Arc::new(FixedExecutor::succeeding().with_delay(Duration::from_millis(120)));
    let worker = worker(None, Arc::clone(&dashboard), executor);

    let outcome = worker
        .execute_with_heartbeat(&task("task_1"), Duration::from_millis(25))
        .await;
    assert_eq!(outcome, TaskOutcome::Success);

    let during = dashboard.heartbeats.load(Ordering::SeqCst);
    assert!(during >= 2, "expected at least 2 heartbeats, saw {during}");

    // The heartbeat task is joined before the outcome is returned, so the
    // count must no longer move.
    tokio::time::sleep(Duration::from_millis(80)).await;
    assert_eq!(dashboard.heartbeats.load(Ordering::SeqCst), during);
}

#[tokio::test]
async fn zero_heartbeat_interval_still_extends_the_lease() {
    let dashboard = Arc::new(ScriptedDashboard::new([]));
    let executor = Arc::new(FixedExecutor::succeeding().with_delay(Duration::from_millis(1300)));
    let worker = worker(None, Arc::clone(&dashboard), executor);

    // A zero wire interval must fall back to a sane cadence instead of
    // killing the heartbeat task.
    let outcome = worker
        .execute_with_heartbeat(&task("task_1"), Duration::ZERO)
        .await;
    assert_eq!(outcome, TaskOutcome::Success);
    assert!(dashboard.heartbeats.load(Ordering::SeqCst) >= 1);
}

#[tokio::test]
async fn short_executions_send_no_heartbeat() {
    let dashboard = Arc::new(ScriptedDashboard::new([]));
    let executor = Arc::new(FixedExecutor::succeeding());
    let worker = worker(None, Arc::clone(&dashboard), executor);

    worker
        .execute_with_heartbeat(&task("task_1"), Duration::from_millis(50))
        .await;

    assert_eq!(dashboard.heartbeats.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn missing_portal_record_falls_back_to_the_portal_id() {
    let dashboard = Arc::new(ScriptedDashboard::new([Ok(Some(task("task_1"))), Ok(None)]).without_portal());
    let executor = Arc::new(FixedExecutor::succeeding());
    let worker = worker(Some("run_1"), dashboard, Arc::clone(&executor));

    worker.run(CancellationToken::new()).await;

    assert_eq!(*executor.spiders.lock().unwrap(), vec!["portal_x"]);
}
