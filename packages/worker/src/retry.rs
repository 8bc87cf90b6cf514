//! Local retry classification for task failures.

/// Error-code fragments that mark a failure as transient.
const TRANSIENT_MARKERS: &[&str] = &[
    "timeout",
    "connection_reset",
    "dns_error",
    "429",
    "500",
    "502",
    "503",
    "504",
    "network_error",
];

/// Whether an error code looks transient. Substring match on the lowercased
/// code, so `HTTP_503` classifies like `503`. Advisory only: the dashboard
/// owns the actual retry/backoff decision.
pub fn is_retryable(error_code: &str) -> bool {
    let code = error_code.to_lowercase();
    TRANSIENT_MARKERS.iter().any(|marker| code.contains(marker))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_codes_are_retryable() {
        assert!(is_retryable("timeout"));
        assert!(is_retryable("503"));
        assert!(is_retryable("HTTP_503"));
        assert!(is_retryable("Connection_Reset"));
        assert!(is_retryable("network_error"));
    }

    #[test]
    fn terminal_codes_are_not() {
        assert!(!is_retryable("spider_error"));
        assert!(!is_retryable("execution_error"));
        assert!(!is_retryable(""));
        assert!(!is_retryable("unknown_error"));
    }
}
