//! URL canonicalization for deduplication.
//!
//! The canonical form is the dedup key for discovered links, so it must be
//! deterministic: normalizing an already-canonical URL is a no-op.

use url::form_urlencoded;
use url::Url;

/// Query parameters that change between visits without changing the page:
/// session identifiers, timestamps, short-lived tokens, click/tracking ids.
const VOLATILE_PARAMS: &[&str] = &[
    "session",
    "sessionid",
    "sid",
    "phpsessid",
    "jsessionid",
    "_t",
    "ts",
    "timestamp",
    "token",
    "fbclid",
    "gclid",
];

fn is_volatile(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    key.starts_with("utm_") || VOLATILE_PARAMS.contains(&key.as_str())
}

/// Canonicalize a URL: drop the fragment and volatile query parameters,
/// sort the surviving parameters by key, re-encode, lowercase everything.
///
/// Input that does not parse as a URL falls back to a trimmed lowercase
/// copy, which keeps the function total and idempotent.
pub fn canonical_url(raw: &str) -> String {
    let trimmed = raw.trim();
    let Ok(mut parsed) = Url::parse(trimmed) else {
        return trimmed.to_lowercase();
    };

    parsed.set_fragment(None);

    // Lowercase before sorting so the sort sees the final representation;
    // otherwise a mixed-case key sorts differently before and after
    // normalization and idempotence breaks.
    let mut kept: Vec<(String, String)> = parsed
        .query_pairs()
        .filter(|(key, _)| !is_volatile(key))
        .map(|(key, value)| (key.to_lowercase(), value.to_lowercase()))
        .collect();
    kept.sort_by(|a, b| a.0.cmp(&b.0));

    if kept.is_empty() {
        parsed.set_query(None);
    } else {
        let query = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(kept.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .finish();
        parsed.set_query(Some(&query));
    }

    parsed.to_string().to_lowercase()
}
