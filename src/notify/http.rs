//! HTTP notification sink.
//!
//! Resolves a destination URI on every call, builds the protocol-specific
//! request and sends it with exponential backoff retry.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;

use super::destination::DestinationKind;
use super::{NotificationSink, backoff_delay, mattermost, ntfy, webhook};
use crate::error::NotifyError;

/// Default base delay for exponential backoff.
const DEFAULT_BACKOFF_BASE: Duration = Duration::from_millis(500);

/// Default maximum backoff delay.
const DEFAULT_BACKOFF_MAX: Duration = Duration::from_secs(5);

/// Default maximum number of attempts per delivery.
const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default per-request timeout.
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Retry settings applied to every delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base: Duration,
    pub max: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base: DEFAULT_BACKOFF_BASE,
            max: DEFAULT_BACKOFF_MAX,
        }
    }
}

/// A request ready to send, one variant per protocol.
enum Prepared {
    Ntfy(ntfy::NtfyTarget),
    Json(webhook::WebhookTarget),
    Mattermost(mattermost::MattermostTarget),
}

impl Prepared {
    fn request(&self, client: &reqwest::Client) -> reqwest::RequestBuilder {
        match self {
            Prepared::Ntfy(target) => ntfy::build_request(client, target),
            Prepared::Json(target) => webhook::build_request(client, target),
            Prepared::Mattermost(target) => mattermost::build_request(client, target),
        }
    }
}

/// Sends notifications over HTTP for every supported destination kind.
pub struct HttpSink {
    client: reqwest::Client,
    retry: RetryPolicy,
}

impl HttpSink {
    /// Create a sink with the default retry policy.
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            retry: RetryPolicy::default(),
        }
    }

    /// Create a sink with its own HTTP client and default timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn with_default_client() -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_REQUEST_TIMEOUT)
            .build()
            .map_err(|e| NotifyError::SendFailed(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self::new(client))
    }

    /// Override the retry policy. Mainly useful to keep tests fast.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn prepare(&self, destination: &str, title: &str, body: &str) -> Result<Prepared, NotifyError> {
        let url = Url::parse(destination)
            .map_err(|e| NotifyError::InvalidDestination(format!("malformed URI: {}", e)))?;
        let (kind, secure) = DestinationKind::from_scheme(url.scheme()).ok_or_else(|| {
            NotifyError::InvalidDestination(format!("unsupported scheme '{}'", url.scheme()))
        })?;

        Ok(match kind {
            DestinationKind::Ntfy => Prepared::Ntfy(ntfy::resolve(&url, secure, title, body)?),
            DestinationKind::Json => Prepared::Json(webhook::resolve(&url, secure, title, body)?),
            DestinationKind::Mattermost => {
                Prepared::Mattermost(mattermost::resolve(&url, secure, title, body)?)
            }
        })
    }
}

#[async_trait]
impl NotificationSink for HttpSink {
    async fn deliver(
        &self,
        destination: &str,
        title: &str,
        body: &str,
    ) -> Result<(), NotifyError> {
        let prepared = self.prepare(destination, title, body)?;
        let attempts = self.retry.max_attempts.max(1);
        let mut last_error = String::new();

        for attempt in 0..attempts {
            match prepared.request(&self.client).send().await {
                Ok(response) if response.status().is_success() => {
                    tracing::debug!(attempt = attempt, "Notification accepted");
                    return Ok(());
                }
                Ok(response) if response.status().is_client_error() => {
                    // 4xx errors: don't retry (bad token, bad payload)
                    let status = response.status();
                    tracing::error!(status = %status, "Destination returned client error, not retrying");
                    return Err(NotifyError::SendFailed(format!("client error: {}", status)));
                }
                Ok(response) => {
                    // 5xx errors: retry
                    let status = response.status();
                    tracing::warn!(
                        attempt = attempt,
                        status = %status,
                        "Destination returned server error, retrying"
                    );
                    last_error = format!("server error: {}", status);
                }
                Err(e) => {
                    // Network errors: retry. The URL may carry a token.
                    let e = e.without_url();
                    tracing::warn!(
                        attempt = attempt,
                        error = %e,
                        "Failed to reach destination, retrying"
                    );
                    last_error = format!("request failed: {}", e);
                }
            }

            if attempt < attempts - 1 {
                let delay = backoff_delay(attempt, self.retry.base, self.retry.max);
                tracing::debug!(delay_ms = delay.as_millis(), "Waiting before retry");
                tokio::time::sleep(delay).await;
            }
        }

        Err(NotifyError::SendFailed(format!(
            "gave up after {} attempts: {}",
            attempts, last_error
        )))
    }
}

impl std::fmt::Debug for HttpSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpSink")
            .field("retry", &self.retry)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_retry_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.base, Duration::from_millis(500));
        assert_eq!(policy.max, Duration::from_secs(5));
    }

    #[test]
    fn prepare_rejects_unknown_scheme() {
        let sink = HttpSink::new(reqwest::Client::new());
        let err = sink.prepare("smtp://mail.example.com", "t", "b").err().unwrap();
        assert!(matches!(err, NotifyError::InvalidDestination(_)));
    }

    #[test]
    fn prepare_dispatches_by_scheme() {
        let sink = HttpSink::new(reqwest::Client::new());
        assert!(matches!(
            sink.prepare("ntfys://ntfy.sh/deals", "t", "b").ok(),
            Some(Prepared::Ntfy(_))
        ));
        assert!(matches!(
            sink.prepare("json://localhost/hook", "t", "b").ok(),
            Some(Prepared::Json(_))
        ));
        assert!(matches!(
            sink.prepare("mmost://localhost/token", "t", "b").ok(),
            Some(Prepared::Mattermost(_))
        ));
    }

    #[tokio::test]
    async fn invalid_destination_fails_without_network() {
        let sink = HttpSink::new(reqwest::Client::new());
        let result = sink.deliver("not a uri", "t", "b").await;
        assert!(matches!(result, Err(NotifyError::InvalidDestination(_))));
    }

    #[test]
    fn debug_does_not_expose_client() {
        let sink = HttpSink::new(reqwest::Client::new());
        let debug = format!("{:?}", sink);
        assert!(debug.contains("HttpSink"));
        assert!(debug.contains("retry"));
    }
}
