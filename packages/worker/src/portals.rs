//! Portal registry for the `crawl` binary.
//!
//! The dashboard names a crawl routine per portal; this module maps that
//! name to a [`Portal`] implementation. The built-in portal speaks the
//! JSON contract of the dummy portal service used for end-to-end runs.

use anyhow::{anyhow, bail, Context, Result};
use crawler_core::{
    Document, FetchDescriptor, FetchTarget, FetchedPage, ListingOutcome, Portal,
};
use serde_json::{Map, Value};

const DUMMY_PORTAL_BASE: &str = "http://dummy-portal:8080";

/// Look up the portal implementation for a crawl routine name.
pub fn resolve_portal(spider_name: &str) -> Option<Box<dyn Portal>> {
    match spider_name {
        "dummy_json" | "dummy_direct" | "dummy_discover" => {
            Some(Box::new(JsonApiPortal::new(DUMMY_PORTAL_BASE)))
        }
        _ => None,
    }
}

/// Portal for sites that serve listings and documents as JSON.
///
/// Listing pages look like
/// `{"items": [{"url": ..., "title": ...}, ...], "next_page": ...?}`;
/// detail pages are a single document object.
pub struct JsonApiPortal {
    base_url: String,
}

impl JsonApiPortal {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn parse_document(&self, url: &str, value: &Value) -> Document {
        let obj = value.as_object().cloned().unwrap_or_default();
        let field = |key: &str| obj.get(key).and_then(Value::as_str).map(str::to_string);
        Document {
            url: field("url").unwrap_or_else(|| url.to_string()),
            title: field("title"),
            content: field("content"),
            published_at: field("published_at").and_then(|d| d.parse().ok()),
            metadata: obj
                .get("metadata")
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default(),
        }
    }
}

impl Portal for JsonApiPortal {
    fn build_fetch_target(&self, descriptor: &FetchDescriptor) -> Result<FetchTarget> {
        let base = &self.base_url;
        Ok(match descriptor {
            FetchDescriptor::Page { page } => {
                FetchTarget::listing(format!("{base}/documents?page={page}"))
            }
            FetchDescriptor::DateWindow { from, to } => {
                FetchTarget::listing(format!("{base}/documents?from_date={from}&to_date={to}"))
            }
            FetchDescriptor::Year { year, session_key } => {
                FetchTarget::listing(format!("{base}/archive/{year}"))
                    .with_session_key(session_key.clone())
            }
            FetchDescriptor::Section { section_url, .. } => FetchTarget::listing(section_url),
            FetchDescriptor::Id { id } => FetchTarget::detail(format!("{base}/documents/{id}")),
            FetchDescriptor::AlphaWindow { from, to } => {
                FetchTarget::listing(format!("{base}/documents?from_char={from}&to_char={to}"))
            }
            FetchDescriptor::Detail { url } => FetchTarget::detail(url),
            FetchDescriptor::DiscoverySeed { .. } => {
                bail!("discovery seeds must be expanded before fetching")
            }
        })
    }

    fn parse_listing(&self, page: &FetchedPage) -> Result<ListingOutcome> {
        let body: Value = serde_json::from_str(&page.body)
            .with_context(|| format!("listing at {} is not valid JSON", page.url))?;

        let mut outcome = ListingOutcome::default();
        let items = body
            .get("items")
            .and_then(Value::as_array)
            .ok_or_else(|| anyhow!("listing at {} has no `items` array", page.url))?;

        for item in items {
            let Some(url) = item.get("url").and_then(Value::as_str) else {
                continue;
            };
            let mut metadata = Map::new();
            if let Some(title) = item.get("title").and_then(Value::as_str) {
                metadata.insert("title".into(), Value::String(title.to_string()));
            }
            if item.get("content").is_some() {
                // The listing already carries the full document.
                outcome.documents.push(self.parse_document(url, item));
            }
            outcome.links.push((url.to_string(), metadata));
        }

        if let Some(next) = body.get("next_page").and_then(Value::as_str) {
            outcome.next_page = Some(FetchTarget::listing(next));
        }

        Ok(outcome)
    }

    fn parse_detail(&self, page: &FetchedPage) -> Result<Document> {
        let body: Value = serde_json::from_str(&page.body)
            .with_context(|| format!("document at {} is not valid JSON", page.url))?;
        Ok(self.parse_document(&page.url, &body))
    }

    fn discovery_seeds(&self, seed: &Map<String, Value>) -> Result<Vec<FetchDescriptor>> {
        // The dummy portal's discovery seed names an archive span.
        let year = |key: &str| -> Result<i32> {
            seed.get(key)
                .and_then(Value::as_i64)
                .map(|y| y as i32)
                .ok_or_else(|| anyhow!("discovery seed is missing `{key}`"))
        };
        let start = year("start_year")?;
        let end = year("end_year")?;
        Ok((start..=end)
            .map(|year| FetchDescriptor::Year {
                year,
                session_key: format!("year-{year}"),
            })
            .collect())
    }
}
