//! `retry-after` header parsing
//!
//! Inference servers answer 503 while a model is still loading and may say
//! when to come back, either as seconds or as an HTTP date.

use reqwest::header::{HeaderMap, RETRY_AFTER};
use tracing::debug;

/// Parse a `retry-after` value into seconds from now
///
/// Dates in the past count as zero.
pub fn parse_retry_after(header_value: &str) -> Option<u64> {
    let value = header_value.trim();

    if let Ok(seconds) = value.parse::<u64>() {
        return Some(seconds);
    }

    match chrono::DateTime::parse_from_rfc2822(value) {
        Ok(target) => {
            let seconds = target
                .signed_duration_since(chrono::Utc::now())
                .num_seconds()
                .max(0) as u64;
            Some(seconds)
        }
        Err(_) => {
            debug!(header_value = value, "Ignoring unparseable retry-after header");
            None
        }
    }
}

/// Read `retry-after` from response headers
pub fn retry_after_from_headers(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_retry_after)
}
