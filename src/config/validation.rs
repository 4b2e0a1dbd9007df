//! Field-level validation helpers.

use regex::Regex;
use reqwest::Url;
use std::sync::LazyLock;
use std::time::Duration;

/// Validates a subreddit name: 2-21 characters of `[A-Za-z0-9_]`.
pub(crate) fn validate_subreddit_name(name: &str) -> Result<(), String> {
    static SUBREDDIT_REGEX: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_]{2,21}$").expect("valid regex"));

    if SUBREDDIT_REGEX.is_match(name) {
        Ok(())
    } else {
        Err("must be 2-21 characters of letters, digits or '_'".to_string())
    }
}

/// Validates a term list: no blank entries.
pub(crate) fn validate_terms(terms: &[String]) -> Result<(), String> {
    match terms.iter().position(|t| t.trim().is_empty()) {
        Some(index) => Err(format!("term #{} is blank", index)),
        None => Ok(()),
    }
}

/// Validates an absolute http(s) URL with a host.
pub(crate) fn validate_http_url(value: &str) -> Result<(), String> {
    let url = Url::parse(value).map_err(|e| format!("invalid URL '{}': {}", value, e))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(format!("URL '{}' must use http or https", value));
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(format!("URL '{}' has no host", value));
    }
    Ok(())
}

/// Validates a duration is strictly positive.
pub(crate) fn validate_duration(value: Duration) -> Result<(), String> {
    if value.is_zero() {
        Err("must be greater than 0".to_string())
    } else {
        Ok(())
    }
}
