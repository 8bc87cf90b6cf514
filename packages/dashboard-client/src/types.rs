//! Wire types for the dashboard's task-leasing API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A leased task. Ownership is transient: once `lease_expires_at` passes
/// without a heartbeat the dashboard is free to hand the task to someone
/// else.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub task_id: String,
    /// `DISCOVER`, `URL_BATCH`, or a `DIRECT_PARTITION` variant. Kept as a
    /// string: the worker only forwards it, the crawl process interprets it.
    pub task_type: String,
    pub payload: TaskPayload,
    pub lease_expires_at: Option<DateTime<Utc>>,
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval: u64,
}

fn default_heartbeat_interval() -> u64 {
    120
}

/// Task payload: the identifying pair plus partition-specific fields the
/// worker treats as opaque.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskPayload {
    pub portal_id: String,
    pub run_id: String,
    #[serde(flatten)]
    pub partition: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LeaseRequest {
    pub worker_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
}

/// Lease extension granted by a heartbeat.
#[derive(Debug, Clone, Deserialize)]
pub struct LeaseExtension {
    pub lease_expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FailRequest {
    pub error_code: String,
    pub error_message: String,
    /// Advisory; the dashboard owns the actual retry/backoff decision.
    pub retryable: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreLinksResponse {
    pub links_stored: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PortalInfo {
    pub spider_name: Option<String>,
}
