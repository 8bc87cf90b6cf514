//! Error types for the dashboard client.

use thiserror::Error;

/// Result type for dashboard operations.
pub type Result<T> = std::result::Result<T, DashboardError>;

#[derive(Debug, Error)]
pub enum DashboardError {
    /// Transport-level failure (connect, timeout, body read).
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The dashboard answered with an unexpected status.
    #[error("dashboard returned status {status}: {message}")]
    Api { status: u16, message: String },
}
