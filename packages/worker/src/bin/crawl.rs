//! Crawl Process
//!
//! Runs one task's crawl in an isolated process. The worker launches this
//! binary with the task payload on the command line; a non-zero exit is
//! what the worker reports as a spider failure.

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use crawl_worker::portals::resolve_portal;
use crawler_core::{run_crawl, CrawlContext, HttpFetcher, Partition};
use dashboard_client::DashboardClient;
use serde_json::{Map, Value};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "crawl", about = "Run one crawl task in isolation")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Crawl one partition against a portal.
    Crawl(CrawlArgs),
}

#[derive(clap::Args)]
struct CrawlArgs {
    /// Crawl routine name, as recorded on the portal.
    spider: String,

    /// Task payload as a JSON object.
    #[arg(long)]
    payload: String,

    #[arg(long)]
    portal_id: String,

    #[arg(long)]
    run_id: String,

    #[arg(long)]
    task_id: String,

    #[arg(long)]
    task_type: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,crawler_core=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();

    let Cli {
        command: Command::Crawl(args),
    } = Cli::parse();

    let portal = resolve_portal(&args.spider)
        .ok_or_else(|| anyhow!("no portal implementation for spider `{}`", args.spider))?;

    let payload: Map<String, Value> =
        serde_json::from_str(&args.payload).context("payload is not a JSON object")?;
    let partition = Partition::from_payload(&payload)?;

    let ctx = CrawlContext {
        portal_id: args.portal_id,
        run_id: args.run_id,
        task_id: args.task_id,
        task_type: args.task_type,
    };

    let dashboard_url = std::env::var("DASHBOARD_URL")
        .unwrap_or_else(|_| "http://dashboard_service:8000".to_string());
    let sink = DashboardClient::new(dashboard_url);
    let fetcher = HttpFetcher::new()?;

    let stats = run_crawl(&ctx, &partition, portal.as_ref(), &fetcher, &sink).await?;
    tracing::info!(
        task_id = %ctx.task_id,
        pages = stats.pages_fetched,
        documents = stats.documents,
        links_stored = stats.links_stored,
        failures = stats.failures,
        "crawl process finished"
    );
    Ok(())
}
