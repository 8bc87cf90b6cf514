//! Drives one resolved partition to completion against a portal.

use anyhow::{Context, Result};
use tracing::{debug, error, info, warn};

use crate::collector::{DiscoveryCollector, LinkSink};
use crate::fetcher::PageFetcher;
use crate::partition::{FetchDescriptor, Partition};
use crate::portal::{FetchKind, Portal};

/// Identity of the crawl being executed, as handed to the crawl process.
#[derive(Debug, Clone)]
pub struct CrawlContext {
    pub portal_id: String,
    pub run_id: String,
    pub task_id: String,
    pub task_type: String,
}

impl CrawlContext {
    /// Discovery tasks harvest candidate URLs instead of page content.
    pub fn is_discovery(&self) -> bool {
        self.task_type == "DISCOVER"
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CrawlStats {
    pub pages_fetched: usize,
    pub documents: usize,
    pub links_discovered: usize,
    pub links_stored: u64,
    pub failures: usize,
    pub resolution_errors: usize,
}

/// Execute one task's partition: resolve it, fetch every descriptor, follow
/// listing pagination to exhaustion, and (for discovery tasks) flush
/// harvested links per completed unit.
///
/// Per-unit fetch and parse problems are counted and logged, not
/// propagated: one bad URL must not abort the batch. Only portal-level
/// failures (e.g. a seed the portal cannot expand) fail the crawl.
pub async fn run_crawl(
    ctx: &CrawlContext,
    partition: &Partition,
    portal: &dyn Portal,
    fetcher: &dyn PageFetcher,
    sink: &dyn LinkSink,
) -> Result<CrawlStats> {
    let mut stats = CrawlStats::default();
    let mut collector = DiscoveryCollector::new(&ctx.portal_id, &ctx.run_id, &ctx.task_id);

    let resolution = partition.resolve();
    for resolution_error in &resolution.errors {
        error!(task_id = %ctx.task_id, error = %resolution_error, "partition resolution error");
    }
    stats.resolution_errors = resolution.errors.len();

    info!(
        task_id = %ctx.task_id,
        portal_id = %ctx.portal_id,
        task_type = %ctx.task_type,
        descriptors = resolution.descriptors.len(),
        "starting crawl"
    );

    for descriptor in &resolution.descriptors {
        match descriptor {
            FetchDescriptor::Detail { .. } => {
                fetch_detail(descriptor, portal, fetcher, &mut stats).await;
            }
            FetchDescriptor::DiscoverySeed { seed } => {
                let expanded = portal
                    .discovery_seeds(seed)
                    .context("portal failed to expand discovery seed")?;
                debug!(task_id = %ctx.task_id, units = expanded.len(), "expanded discovery seed");
                for unit in &expanded {
                    crawl_unit(ctx, unit, portal, fetcher, sink, &mut collector, &mut stats)
                        .await?;
                }
            }
            other => {
                crawl_unit(ctx, other, portal, fetcher, sink, &mut collector, &mut stats)
                    .await?;
            }
        }
    }

    info!(
        task_id = %ctx.task_id,
        pages = stats.pages_fetched,
        documents = stats.documents,
        links = stats.links_discovered,
        failures = stats.failures,
        "crawl finished"
    );
    Ok(stats)
}

/// Fetch and parse one detail page under its own error handler.
async fn fetch_detail(
    descriptor: &FetchDescriptor,
    portal: &dyn Portal,
    fetcher: &dyn PageFetcher,
    stats: &mut CrawlStats,
) {
    let target = match portal.build_fetch_target(descriptor) {
        Ok(target) => target,
        Err(e) => {
            warn!(descriptor = ?descriptor, error = %e, "could not build detail fetch target");
            stats.failures += 1;
            return;
        }
    };
    debug_assert_eq!(target.kind, FetchKind::Detail);

    let page = match fetcher.fetch(&target).await {
        Ok(page) => page,
        Err(e) => {
            warn!(url = %target.url, error = %e, "detail fetch failed");
            stats.failures += 1;
            return;
        }
    };
    stats.pages_fetched += 1;

    match portal.parse_detail(&page) {
        Ok(document) => {
            debug!(url = %document.url, title = ?document.title, "extracted document");
            stats.documents += 1;
        }
        Err(e) => {
            warn!(url = %page.url, error = %e, "detail parse failed");
            stats.failures += 1;
        }
    }
}

/// Crawl one listing unit (a page, a year, a section, ...) following
/// pagination until the portal stops returning a next page, then flush any
/// links the unit discovered.
async fn crawl_unit(
    ctx: &CrawlContext,
    descriptor: &FetchDescriptor,
    portal: &dyn Portal,
    fetcher: &dyn PageFetcher,
    sink: &dyn LinkSink,
    collector: &mut DiscoveryCollector,
    stats: &mut CrawlStats,
) -> Result<()> {
    let mut next = Some(portal.build_fetch_target(descriptor)?);

    while let Some(target) = next.take() {
        let page = match fetcher.fetch(&target).await {
            Ok(page) => page,
            Err(e) => {
                warn!(url = %target.url, error = %e, "listing fetch failed; abandoning unit");
                stats.failures += 1;
                break;
            }
        };
        stats.pages_fetched += 1;

        let outcome = match portal.parse_listing(&page) {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(url = %page.url, error = %e, "listing parse failed; abandoning unit");
                stats.failures += 1;
                break;
            }
        };

        stats.documents += outcome.documents.len();
        for document in &outcome.documents {
            debug!(url = %document.url, title = ?document.title, "extracted document");
        }

        if ctx.is_discovery() {
            stats.links_discovered += outcome.links.len();
            for (url, metadata) in outcome.links {
                collector.push(&url, metadata);
            }
        }

        // Pagination never leaves the unit's session scope.
        next = outcome.next_page.map(|mut page| {
            if page.session_key.is_none() {
                page.session_key = target.session_key.clone();
            }
            page
        });
    }

    // One discovery unit is complete; ship whatever it found.
    if ctx.is_discovery() {
        stats.links_stored += collector.flush(sink).await;
    }
    Ok(())
}
