//! Partition resolution: a task's declarative partition description becomes
//! a concrete, ordered sequence of fetch descriptors.
//!
//! Partition kinds form a closed enum; adding one is a compile-checked
//! addition, not a new string branch. An unrecognized `partition_type` is a
//! hard decode failure so the task fails visibly instead of completing with
//! zero work.

use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

/// Declarative unit-of-work description carried in a task payload.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "partition_type", rename_all = "snake_case")]
pub enum Partition {
    PageRange {
        start_page: u32,
        end_page: u32,
    },
    DateRange {
        from_date: NaiveDate,
        to_date: NaiveDate,
    },
    YearRange {
        #[serde(default)]
        start_year: Option<i32>,
        #[serde(default)]
        end_year: Option<i32>,
    },
    Section {
        #[serde(default)]
        section_url: Option<String>,
        #[serde(default)]
        section_id: Option<String>,
    },
    IdRange {
        start_id: u64,
        end_id: u64,
    },
    AlphaRange {
        from_char: char,
        to_char: char,
    },
    UrlBatch {
        urls: Vec<String>,
    },
    Discover {
        #[serde(default)]
        seed: Map<String, Value>,
    },
}

const KNOWN_TYPES: &[&str] = &[
    "page_range",
    "date_range",
    "year_range",
    "section",
    "id_range",
    "alpha_range",
    "url_batch",
    "discover",
];

#[derive(Debug, Error)]
pub enum PartitionError {
    #[error("payload has no `partition_type` field")]
    MissingType,
    #[error("unknown partition_type `{0}`")]
    UnknownType(String),
    #[error("malformed {partition_type} partition: {source}")]
    Decode {
        partition_type: String,
        source: serde_json::Error,
    },
}

/// One resolved unit of work. Immutable once produced; carries whatever
/// session scope its partition kind requires.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchDescriptor {
    /// One listing page by number.
    Page { page: u32 },
    /// One window covering a whole date interval.
    DateWindow { from: NaiveDate, to: NaiveDate },
    /// One listing year; pagination launched from it stays inside its own
    /// session scope so cookie state never mixes across years.
    Year { year: i32, session_key: String },
    /// One site section.
    Section {
        section_url: String,
        section_id: Option<String>,
    },
    /// One record by numeric id.
    Id { id: u64 },
    /// One window covering an alphabetical range.
    AlphaWindow { from: char, to: char },
    /// One URL to fetch as a detail page.
    Detail { url: String },
    /// Opaque discovery seed, expanded by the portal's seed builder.
    DiscoverySeed { seed: Map<String, Value> },
}

/// A parameter problem found while resolving a partition. Recorded, not
/// thrown: the affected partition contributes zero descriptors and the
/// crawl carries on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionError {
    #[error("{partition} partition is missing required parameter `{param}`")]
    MissingParam {
        partition: &'static str,
        param: &'static str,
    },
}

/// Output of resolving one partition.
#[derive(Debug, Default)]
pub struct Resolution {
    pub descriptors: Vec<FetchDescriptor>,
    pub errors: Vec<ResolutionError>,
}

impl Partition {
    /// Decode a partition from a task payload's flattened fields.
    ///
    /// Extra fields (`portal_id`, `run_id`, portal-specific knobs) are
    /// ignored; an absent or unrecognized `partition_type` is an error.
    pub fn from_payload(fields: &Map<String, Value>) -> Result<Self, PartitionError> {
        let kind = fields
            .get("partition_type")
            .and_then(Value::as_str)
            .ok_or(PartitionError::MissingType)?;
        if !KNOWN_TYPES.contains(&kind) {
            return Err(PartitionError::UnknownType(kind.to_string()));
        }
        let kind = kind.to_string();
        serde_json::from_value(Value::Object(fields.clone())).map_err(|source| {
            PartitionError::Decode {
                partition_type: kind,
                source,
            }
        })
    }

    /// Resolve into fetch descriptors, ascending and duplicate-free.
    pub fn resolve(&self) -> Resolution {
        let mut resolution = Resolution::default();
        match self {
            Partition::PageRange {
                start_page,
                end_page,
            } => {
                resolution
                    .descriptors
                    .extend((*start_page..=*end_page).map(|page| FetchDescriptor::Page { page }));
            }
            Partition::DateRange { from_date, to_date } => {
                resolution.descriptors.push(FetchDescriptor::DateWindow {
                    from: *from_date,
                    to: *to_date,
                });
            }
            Partition::YearRange {
                start_year,
                end_year,
            } => match (start_year, end_year) {
                (Some(start), Some(end)) => {
                    resolution
                        .descriptors
                        .extend((*start..=*end).map(|year| FetchDescriptor::Year {
                            year,
                            session_key: format!("year-{year}"),
                        }));
                }
                (start, end) => {
                    if start.is_none() {
                        resolution.errors.push(ResolutionError::MissingParam {
                            partition: "year_range",
                            param: "start_year",
                        });
                    }
                    if end.is_none() {
                        resolution.errors.push(ResolutionError::MissingParam {
                            partition: "year_range",
                            param: "end_year",
                        });
                    }
                }
            },
            Partition::Section {
                section_url,
                section_id,
            } => match section_url {
                Some(url) => resolution.descriptors.push(FetchDescriptor::Section {
                    section_url: url.clone(),
                    section_id: section_id.clone(),
                }),
                None => resolution.errors.push(ResolutionError::MissingParam {
                    partition: "section",
                    param: "section_url",
                }),
            },
            Partition::IdRange { start_id, end_id } => {
                resolution
                    .descriptors
                    .extend((*start_id..=*end_id).map(|id| FetchDescriptor::Id { id }));
            }
            Partition::AlphaRange { from_char, to_char } => {
                resolution.descriptors.push(FetchDescriptor::AlphaWindow {
                    from: *from_char,
                    to: *to_char,
                });
            }
            Partition::UrlBatch { urls } => {
                resolution
                    .descriptors
                    .extend(urls.iter().map(|url| FetchDescriptor::Detail {
                        url: url.clone(),
                    }));
            }
            Partition::Discover { seed } => {
                resolution
                    .descriptors
                    .push(FetchDescriptor::DiscoverySeed { seed: seed.clone() });
            }
        }
        resolution
    }
}
