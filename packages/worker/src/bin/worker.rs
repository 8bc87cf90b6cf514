//! Crawl Worker
//!
//! Long-running process that leases crawl tasks from the dashboard,
//! supervises one crawl process per task, and reports outcomes.

use std::sync::Arc;

use anyhow::Result;
use crawl_worker::{Config, ProcessExecutor, Worker};
use dashboard_client::DashboardClient;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,crawl_worker=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_line_number(true),
        )
        .init();

    let config = Config::from_env()?;
    tracing::info!(
        worker_id = %config.worker_id,
        dashboard_url = %config.dashboard_url,
        "starting crawl worker"
    );

    let dashboard = Arc::new(DashboardClient::new(&config.dashboard_url));
    let executor = Arc::new(
        ProcessExecutor::new(&config.crawl_program, &config.log_dir)
            .with_timeout(config.task_timeout),
    );
    let worker = Worker::new(config, dashboard, executor);

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutdown signal received");
            signal_token.cancel();
        }
    });

    worker.run(shutdown).await;
    Ok(())
}
