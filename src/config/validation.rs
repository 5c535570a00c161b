//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, windows > 0, chapter counts)
//! - Check that chains are usable (models listed, no duplicate converters)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: StorybookConfig → Result<(), Vec<ValidationError>>

use std::collections::HashSet;

use thiserror::Error;
use url::Url;

use crate::config::schema::{RateBudgetConfig, RetryConfig, StorybookConfig};

/// A semantic problem in a loaded configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("{field}: must be greater than zero")]
    NotPositive { field: String },

    #[error("{field}: invalid URL '{value}'")]
    InvalidUrl { field: String, value: String },

    #[error("{field}: {reason}")]
    Invalid { field: String, reason: String },

    #[error("convert.methods: '{0}' listed more than once")]
    DuplicateConverter(String),
}

/// Longest accepted rate window and run deadline: one day.
const MAX_SECS: u64 = 86_400;

fn not_positive(field: &str) -> ValidationError {
    ValidationError::NotPositive {
        field: field.to_string(),
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> ValidationError {
    ValidationError::Invalid {
        field: field.to_string(),
        reason: reason.into(),
    }
}

/// Check a loaded configuration, collecting every problem found.
pub fn validate_config(config: &StorybookConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    // Text
    check_url("text.api_base", &config.text.api_base, &mut errors);
    if config.text.models.is_empty() {
        errors.push(invalid("text.models", "at least one model is required"));
    }
    if config.text.models.iter().any(|m| m.trim().is_empty()) {
        errors.push(invalid("text.models", "model ids must not be blank"));
    }
    if config.text.api_key_env.is_empty() {
        errors.push(invalid("text.api_key_env", "must name an environment variable"));
    }
    if config.text.request_timeout_secs == 0 {
        errors.push(not_positive("text.request_timeout_secs"));
    }
    if config.text.max_output_tokens == 0 {
        errors.push(not_positive("text.max_output_tokens"));
    }
    if !(0.0..=2.0).contains(&config.text.temperature) {
        errors.push(invalid("text.temperature", "must be between 0.0 and 2.0"));
    }

    // Image
    check_url("image.api_url", &config.image.api_url, &mut errors);
    if config.image.api_key_env.is_empty() {
        errors.push(invalid("image.api_key_env", "must name an environment variable"));
    }
    if config.image.request_timeout_secs == 0 {
        errors.push(not_positive("image.request_timeout_secs"));
    }
    if config.image.width == 0 {
        errors.push(not_positive("image.width"));
    }
    if config.image.height == 0 {
        errors.push(not_positive("image.height"));
    }
    if config.image.concurrency == 0 {
        errors.push(not_positive("image.concurrency"));
    }

    // Conversion chain
    let mut seen = HashSet::new();
    for method in &config.convert.methods {
        if !seen.insert(*method) {
            errors.push(ValidationError::DuplicateConverter(method.to_string()));
        }
    }

    // Budgets and retries
    check_budget("rate_limits.text", &config.rate_limits.text, &mut errors);
    check_budget("rate_limits.image", &config.rate_limits.image, &mut errors);
    check_retry("retries.text", &config.retries.text, &mut errors);
    check_retry("retries.image", &config.retries.image, &mut errors);
    check_retry("retries.convert", &config.retries.convert, &mut errors);

    // Story
    if config.story.chapters == 0 {
        errors.push(not_positive("story.chapters"));
    }
    if config.story.words_per_chapter == 0 {
        errors.push(not_positive("story.words_per_chapter"));
    }
    if config.story.markdown_file.is_empty() || !config.story.markdown_file.ends_with(".md") {
        errors.push(invalid("story.markdown_file", "must be a file name ending in .md"));
    }
    match config.story.max_duration_secs {
        Some(0) => errors.push(not_positive("story.max_duration_secs")),
        Some(secs) if secs > MAX_SECS => errors.push(invalid(
            "story.max_duration_secs",
            format!("must be at most {MAX_SECS}"),
        )),
        _ => {}
    }

    // Observability
    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<std::net::SocketAddr>()
            .is_err()
    {
        errors.push(invalid(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_url(field: &str, value: &str, errors: &mut Vec<ValidationError>) {
    match Url::parse(value) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
        _ => errors.push(ValidationError::InvalidUrl {
            field: field.to_string(),
            value: value.to_string(),
        }),
    }
}

fn check_budget(prefix: &str, budget: &RateBudgetConfig, errors: &mut Vec<ValidationError>) {
    if budget.max_operations > 0 && budget.window_secs == 0 {
        errors.push(not_positive(&format!("{prefix}.window_secs")));
    }
    if budget.window_secs > MAX_SECS {
        errors.push(invalid(
            &format!("{prefix}.window_secs"),
            format!("must be at most {MAX_SECS}"),
        ));
    }
}

fn check_retry(prefix: &str, retry: &RetryConfig, errors: &mut Vec<ValidationError>) {
    if retry.max_attempts == 0 {
        errors.push(not_positive(&format!("{prefix}.max_attempts")));
    }
    if !retry.multiplier.is_finite() || retry.multiplier < 1.0 {
        errors.push(invalid(&format!("{prefix}.multiplier"), "must be at least 1.0"));
    }
    if retry.max_delay_ms < retry.base_delay_ms {
        errors.push(invalid(
            &format!("{prefix}.max_delay_ms"),
            "must not be smaller than base_delay_ms",
        ));
    }
}
