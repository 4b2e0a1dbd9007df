//! Redacted holder for destination URIs and API keys.

use serde::Deserialize;

const REDACTED: &str = "[REDACTED]";

/// A config value that formats as `[REDACTED]`.
///
/// ntfy topics, webhook tokens and the classifier's bearer key all live in
/// plain config strings. Wrapping them keeps `{:?}` dumps of the whole
/// [`Config`](super::Config) and `tracing` fields free of credentials; the
/// raw text is only reachable through [`expose`](Self::expose).
///
/// ```
/// use postwatch::config::SecretString;
///
/// let topic = SecretString::new("ntfys://ntfy.sh/private-topic".to_string());
/// assert_eq!(topic.to_string(), "[REDACTED]");
/// assert_eq!(topic.expose(), "ntfys://ntfy.sh/private-topic");
/// ```
#[derive(Clone, Deserialize)]
#[serde(transparent)]
pub struct SecretString(String);

impl SecretString {
    pub fn new(value: String) -> Self {
        Self(value)
    }

    /// Raw value, for building requests only.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for SecretString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(REDACTED)
    }
}

impl std::fmt::Display for SecretString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(REDACTED)
    }
}
