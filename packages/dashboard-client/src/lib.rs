//! HTTP client for the crawl dashboard.
//!
//! The dashboard owns the task queue, lease bookkeeping, and retry policy;
//! this crate speaks its REST contract: lease a task, keep the lease alive
//! with heartbeats, report completion or failure, upload discovered links,
//! and look up portal metadata.

pub mod error;
pub mod types;

pub use error::{DashboardError, Result};
pub use types::{
    FailRequest, LeaseExtension, LeaseRequest, PortalInfo, StoreLinksResponse, Task, TaskPayload,
};

use std::time::Duration;

use async_trait::async_trait;
use crawler_core::{LinkBatch, LinkSink};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// The dashboard API surface the worker depends on. A trait so tests can
/// run the worker loop against a scripted dashboard.
#[async_trait]
pub trait DashboardApi: Send + Sync {
    /// Request a lease. `Ok(None)` means no task is available.
    async fn lease_task(&self, request: &LeaseRequest) -> Result<Option<Task>>;

    /// Extend the lease on a running task.
    async fn heartbeat(&self, task_id: &str) -> Result<LeaseExtension>;

    /// Report successful completion.
    async fn complete_task(&self, task_id: &str) -> Result<()>;

    /// Report failure with retry guidance.
    async fn fail_task(&self, task_id: &str, request: &FailRequest) -> Result<()>;

    /// Look up portal metadata (the crawl routine name).
    async fn get_portal(&self, portal_id: &str) -> Result<PortalInfo>;

    /// Upload one batch of discovered links; returns how many were kept.
    async fn store_links(&self, batch: &LinkBatch) -> Result<u64>;
}

pub struct DashboardClient {
    client: reqwest::Client,
    base_url: String,
}

impl DashboardClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    async fn api_error(response: reqwest::Response) -> DashboardError {
        let status = response.status().as_u16();
        let message = response.text().await.unwrap_or_default();
        DashboardError::Api { status, message }
    }
}

#[async_trait]
impl DashboardApi for DashboardClient {
    async fn lease_task(&self, request: &LeaseRequest) -> Result<Option<Task>> {
        let url = format!("{}/tasks/lease", self.base_url);
        let response = self
            .client
            .post(&url)
            .timeout(REQUEST_TIMEOUT)
            .json(request)
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NO_CONTENT {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(Self::api_error(response).await);
        }
        Ok(Some(response.json().await?))
    }

    async fn heartbeat(&self, task_id: &str) -> Result<LeaseExtension> {
        let url = format!("{}/tasks/{}/heartbeat", self.base_url, task_id);
        let response = self
            .client
            .post(&url)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::api_error(response).await);
        }
        Ok(response.json().await?)
    }

    async fn complete_task(&self, task_id: &str) -> Result<()> {
        let url = format!("{}/tasks/{}/complete", self.base_url, task_id);
        let response = self
            .client
            .post(&url)
            .timeout(REQUEST_TIMEOUT)
            .json(&serde_json::json!({}))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::api_error(response).await);
        }
        Ok(())
    }

    async fn fail_task(&self, task_id: &str, request: &FailRequest) -> Result<()> {
        let url = format!("{}/tasks/{}/fail", self.base_url, task_id);
        let response = self
            .client
            .post(&url)
            .timeout(REQUEST_TIMEOUT)
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::api_error(response).await);
        }
        Ok(())
    }

    async fn get_portal(&self, portal_id: &str) -> Result<PortalInfo> {
        let url = format!("{}/portals/{}", self.base_url, portal_id);
        let response = self
            .client
            .get(&url)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::api_error(response).await);
        }
        Ok(response.json().await?)
    }

    async fn store_links(&self, batch: &LinkBatch) -> Result<u64> {
        let url = format!("{}/discovery/links-with-metadata", self.base_url);
        let response = self
            .client
            .post(&url)
            .timeout(REQUEST_TIMEOUT)
            .json(batch)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::api_error(response).await);
        }
        let stored: StoreLinksResponse = response.json().await?;
        tracing::debug!(
            task_id = %batch.source_task_id,
            links_stored = stored.links_stored,
            "dashboard stored discovered links"
        );
        Ok(stored.links_stored)
    }
}

/// The crawl runner's link sink is just the dashboard's discovery endpoint.
#[async_trait]
impl LinkSink for DashboardClient {
    async fn store_links(&self, batch: &LinkBatch) -> anyhow::Result<u64> {
        Ok(DashboardApi::store_links(self, batch).await?)
    }
}
