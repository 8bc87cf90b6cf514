//! Worker process internals: configuration, the lease/execute/report loop,
//! the heartbeat discipline, and process supervision for crawl tasks.

pub mod config;
pub mod executor;
pub mod portals;
pub mod retry;
pub mod worker;

pub use config::Config;
pub use executor::{ProcessExecutor, TaskExecutor, TaskOutcome};
pub use retry::is_retryable;
pub use worker::Worker;
