//! HTTP response classification shared by the API backends.
//!
//! # Responsibilities
//! - Map status codes and transport errors onto the call taxonomy
//! - Extract server-suggested retry delays (header or error body)
//!
//! # Design Decisions
//! - 429 and 503 are throttling: the quota or the model is busy
//! - 404 means the configured model does not exist: unavailable
//! - Timeouts count as throttling since the remote side is overloaded

use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::StatusCode;

use crate::resilience::CallError;

/// Longest body excerpt carried into error messages.
const BODY_EXCERPT: usize = 200;

/// Shared client for every API backend. Timeouts are set per request.
pub fn build_client() -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .user_agent(concat!("storybook/", env!("CARGO_PKG_VERSION")))
        .build()
}

/// Classify a non-success response.
pub fn classify_status(status: StatusCode, headers: &HeaderMap, body: &str) -> CallError {
    let excerpt = excerpt(body);
    match status {
        StatusCode::TOO_MANY_REQUESTS | StatusCode::SERVICE_UNAVAILABLE => CallError::Throttled {
            message: format!("HTTP {}: {}", status.as_u16(), excerpt),
            retry_after: retry_after_header(headers).or_else(|| retry_delay_from_body(body)),
        },
        StatusCode::NOT_FOUND => CallError::Unavailable(format!("HTTP 404: {}", excerpt)),
        _ => CallError::Backend(format!("HTTP {}: {}", status.as_u16(), excerpt)),
    }
}

/// Classify a failure to get any response at all.
pub fn classify_transport(err: &reqwest::Error) -> CallError {
    if err.is_timeout() {
        CallError::throttled("request timed out")
    } else {
        CallError::backend(format!("request failed: {err}"))
    }
}

/// `Retry-After` in delta-seconds form.
pub fn retry_after_header(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// Delay embedded in an API error body, e.g. `"retryDelay": "37s"` or
/// `seconds: 37`.
pub fn retry_delay_from_body(body: &str) -> Option<Duration> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    let pattern = PATTERN
        .get_or_init(|| {
            Regex::new(r#"(?:"retryDelay"\s*:\s*"(\d+(?:\.\d+)?)s")|(?:seconds:\s*(\d+))"#).ok()
        })
        .as_ref()?;

    let caps = pattern.captures(body)?;
    let secs: f64 = caps.get(1).or_else(|| caps.get(2))?.as_str().parse().ok()?;
    Duration::try_from_secs_f64(secs).ok()
}

fn excerpt(body: &str) -> String {
    let trimmed = body.trim();
    match trimmed.char_indices().nth(BODY_EXCERPT) {
        Some((idx, _)) => format!("{}...", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}
