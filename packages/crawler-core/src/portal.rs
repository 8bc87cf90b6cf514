//! The portal capability seam.
//!
//! The crawl runner depends only on [`Portal`]; a new site is supported by
//! providing a new implementation, never by touching the runner or the
//! worker.

use anyhow::Result;
use chrono::NaiveDate;
use serde_json::{Map, Value};

use crate::partition::FetchDescriptor;

/// How a fetched page will be parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchKind {
    /// A listing page: yields documents and/or links, may paginate.
    Listing,
    /// A detail page: yields exactly one document.
    Detail,
}

/// One concrete fetch the runner will perform.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchTarget {
    pub url: String,
    pub kind: FetchKind,
    /// Session scope for the fetch; targets with the same key share cookie
    /// state, targets with different keys never do.
    pub session_key: Option<String>,
}

impl FetchTarget {
    pub fn listing(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            kind: FetchKind::Listing,
            session_key: None,
        }
    }

    pub fn detail(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            kind: FetchKind::Detail,
            session_key: None,
        }
    }

    pub fn with_session_key(mut self, key: impl Into<String>) -> Self {
        self.session_key = Some(key.into());
        self
    }
}

/// A fetched response body, as handed to the portal's parsers.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub url: String,
    pub status: u16,
    pub body: String,
}

/// An extracted document. Persistence is someone else's job; the runner
/// only counts and logs these.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    pub url: String,
    pub title: Option<String>,
    pub content: Option<String>,
    pub published_at: Option<NaiveDate>,
    pub metadata: Map<String, Value>,
}

/// What one listing page produced.
#[derive(Debug, Default)]
pub struct ListingOutcome {
    /// Documents extracted directly from the listing.
    pub documents: Vec<Document>,
    /// Candidate detail links (raw URL + free-form metadata); canonicalized
    /// by the collector.
    pub links: Vec<(String, Map<String, Value>)>,
    /// The next page of this listing, if pagination continues. The runner
    /// keeps it in the originating target's session scope.
    pub next_page: Option<FetchTarget>,
}

/// Everything the crawl runner needs from a site.
pub trait Portal: Send + Sync {
    /// Turn one resolved descriptor into a concrete fetch.
    fn build_fetch_target(&self, descriptor: &FetchDescriptor) -> Result<FetchTarget>;

    /// Parse a listing page into documents, links, and optional pagination.
    fn parse_listing(&self, page: &FetchedPage) -> Result<ListingOutcome>;

    /// Parse a detail page into a single document.
    fn parse_detail(&self, page: &FetchedPage) -> Result<Document>;

    /// Expand an opaque discovery seed into fetch descriptors. The generic
    /// resolver never interprets seed contents; this hook does.
    fn discovery_seeds(&self, seed: &Map<String, Value>) -> Result<Vec<FetchDescriptor>>;
}
