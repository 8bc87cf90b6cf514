//! Page fetching behind a trait so the runner can be tested without a
//! network.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;

use crate::portal::{FetchTarget, FetchedPage};

#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, target: &FetchTarget) -> Result<FetchedPage>;
}

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// HTTP fetcher with one cookie-enabled client per session key.
///
/// Partition kinds that declare a session scope (e.g. one per year) get
/// isolated cookie state: pagination launched from one year can never leak
/// session state into another.
pub struct HttpFetcher {
    default_client: reqwest::Client,
    scoped_clients: Mutex<HashMap<String, reqwest::Client>>,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        Ok(Self {
            default_client: build_client()?,
            scoped_clients: Mutex::new(HashMap::new()),
        })
    }

    fn client_for(&self, session_key: Option<&str>) -> Result<reqwest::Client> {
        let Some(key) = session_key else {
            return Ok(self.default_client.clone());
        };
        let mut scoped = self
            .scoped_clients
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(client) = scoped.get(key) {
            return Ok(client.clone());
        }
        let client = build_client()?;
        scoped.insert(key.to_string(), client.clone());
        Ok(client)
    }
}

fn build_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .cookie_store(true)
        .timeout(REQUEST_TIMEOUT)
        .build()
        .context("failed to build HTTP client")
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, target: &FetchTarget) -> Result<FetchedPage> {
        let client = self.client_for(target.session_key.as_deref())?;
        let response = client
            .get(&target.url)
            .send()
            .await
            .with_context(|| format!("request to {} failed", target.url))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .with_context(|| format!("failed to read body from {}", target.url))?;

        if !status.is_success() {
            bail!("fetch of {} returned status {}", target.url, status);
        }

        Ok(FetchedPage {
            url: target.url.clone(),
            status: status.as_u16(),
            body,
        })
    }
}
