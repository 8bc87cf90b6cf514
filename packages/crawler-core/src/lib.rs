//! Crawl semantics shared by the worker and the crawl process.
//!
//! A task's declarative partition description is resolved into a sequence of
//! [`FetchDescriptor`]s, each of which a portal turns into a concrete fetch
//! plus a parse step. Discovery crawls push canonicalized links into a
//! [`DiscoveryCollector`] that uploads them in batches.

pub mod collector;
pub mod fetcher;
pub mod normalize;
pub mod partition;
pub mod portal;
pub mod runner;

pub use collector::{DiscoveryCollector, DiscoveredLink, LinkBatch, LinkSink};
pub use fetcher::{HttpFetcher, PageFetcher};
pub use normalize::canonical_url;
pub use partition::{FetchDescriptor, Partition, PartitionError, Resolution, ResolutionError};
pub use portal::{Document, FetchKind, FetchTarget, FetchedPage, ListingOutcome, Portal};
pub use runner::{run_crawl, CrawlContext, CrawlStats};
