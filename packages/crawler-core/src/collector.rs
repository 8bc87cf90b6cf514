//! Buffering and batched upload of links found during discovery crawls.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::normalize::canonical_url;

/// One link harvested during discovery. The canonical URL is the dedup key;
/// uniqueness is enforced by the link-store, not here.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DiscoveredLink {
    #[serde(rename = "url")]
    pub canonical_url: String,
    pub metadata: Map<String, Value>,
}

/// One batched upload, tagged with its provenance.
#[derive(Debug, Clone, Serialize)]
pub struct LinkBatch {
    pub portal_id: String,
    pub run_id: String,
    pub source_task_id: String,
    pub links: Vec<DiscoveredLink>,
}

/// Where flushed batches go. Implemented by the dashboard client; mocked in
/// tests.
#[async_trait]
pub trait LinkSink: Send + Sync {
    /// Store a batch, returning how many links the store kept.
    async fn store_links(&self, batch: &LinkBatch) -> anyhow::Result<u64>;
}

/// Accumulates `(canonical_url, metadata)` pairs during one discovery crawl
/// and flushes them per completed discovery unit.
pub struct DiscoveryCollector {
    portal_id: String,
    run_id: String,
    source_task_id: String,
    buffer: Vec<DiscoveredLink>,
}

impl DiscoveryCollector {
    pub fn new(
        portal_id: impl Into<String>,
        run_id: impl Into<String>,
        source_task_id: impl Into<String>,
    ) -> Self {
        Self {
            portal_id: portal_id.into(),
            run_id: run_id.into(),
            source_task_id: source_task_id.into(),
            buffer: Vec::new(),
        }
    }

    /// Canonicalize and buffer one discovered link.
    pub fn push(&mut self, raw_url: &str, metadata: Map<String, Value>) {
        self.buffer.push(DiscoveredLink {
            canonical_url: canonical_url(raw_url),
            metadata,
        });
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Flush the buffer as a single batch. An empty buffer is never sent.
    ///
    /// Upload failure is logged and absorbed: a temporarily unreachable
    /// link-store degrades discovery coverage instead of failing an
    /// otherwise-successful crawl. Returns how many links the store kept.
    pub async fn flush(&mut self, sink: &dyn LinkSink) -> u64 {
        if self.buffer.is_empty() {
            return 0;
        }
        let batch = LinkBatch {
            portal_id: self.portal_id.clone(),
            run_id: self.run_id.clone(),
            source_task_id: self.source_task_id.clone(),
            links: std::mem::take(&mut self.buffer),
        };
        match sink.store_links(&batch).await {
            Ok(stored) => {
                debug!(
                    portal_id = %batch.portal_id,
                    task_id = %batch.source_task_id,
                    sent = batch.links.len(),
                    stored,
                    "stored discovered links"
                );
                stored
            }
            Err(e) => {
                warn!(
                    portal_id = %batch.portal_id,
                    task_id = %batch.source_task_id,
                    count = batch.links.len(),
                    error = %e,
                    "failed to store discovered links; dropping batch"
                );
                0
            }
        }
    }
}
