//! Prometheus metrics exposition server.
//!
//! Serves postwatch metrics in Prometheus format on a configurable port.

use anyhow::Result;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::sync::OnceLock;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::notify::AlertLevel;

static RECORDER_INSTALLED: OnceLock<()> = OnceLock::new();

/// Register HELP text for every metric postwatch emits.
///
/// Call once, after the recorder is installed.
pub fn register_metric_descriptions() {
    use metrics::{describe_counter, describe_gauge};

    describe_counter!(
        "postwatch_submissions_total",
        "Total number of submissions read from the feed"
    );
    describe_counter!(
        "postwatch_submissions_matched_total",
        "Total number of submissions that passed term matching, by outcome"
    );
    describe_counter!(
        "postwatch_alerts_sent_total",
        "Total number of alerts delivered to a destination"
    );
    describe_counter!(
        "postwatch_alerts_failed_total",
        "Total number of alert deliveries that failed after all retries"
    );
    describe_counter!(
        "postwatch_classifier_errors_total",
        "Total number of failed relevance checks and title generations"
    );
    describe_counter!(
        "postwatch_reconnections_total",
        "Total number of feed reconnections"
    );

    describe_gauge!(
        "postwatch_feed_up",
        "Feed status (1=last poll succeeded, 0=last poll failed)"
    );
    describe_gauge!(
        "postwatch_build_info",
        "Build information with version label (always 1)"
    );
}

/// Metrics server for Prometheus exposition on `/metrics`.
pub struct MetricsServer {
    port: u16,
    ready_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl MetricsServer {
    /// Create a server bound to `port`. Port 0 lets the OS choose.
    pub fn new(port: u16) -> Self {
        Self {
            port,
            ready_tx: None,
        }
    }

    /// Create a server that signals `ready_tx` once the recorder is
    /// installed. Metrics emitted before that point are lost.
    pub fn with_ready_signal(port: u16, ready_tx: tokio::sync::oneshot::Sender<()>) -> Self {
        Self {
            port,
            ready_tx: Some(ready_tx),
        }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Install the global recorder and serve until cancelled.
    ///
    /// # Errors
    ///
    /// Returns an error if the exporter cannot be installed (port in use, or
    /// a recorder already installed in this process).
    pub async fn run(self, cancel: CancellationToken) -> Result<()> {
        let addr: SocketAddr = ([0, 0, 0, 0], self.port).into();

        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .map_err(|e| anyhow::anyhow!("Failed to install Prometheus exporter: {}", e))?;

        let _ = RECORDER_INSTALLED.set(());

        register_metric_descriptions();

        if let Some(tx) = self.ready_tx {
            let _ = tx.send(());
        }

        info!(port = self.port, "Metrics server started on /metrics");

        cancel.cancelled().await;

        info!("Metrics server shutting down");

        Ok(())
    }
}

/// Whether a metrics recorder has been installed in this process.
pub fn is_recorder_installed() -> bool {
    RECORDER_INSTALLED.get().is_some()
}

/// Set every known series to its starting value so `/metrics` lists them
/// before the first event.
pub fn initialize_metrics(channels: &[String], destination_types: &[&'static str]) {
    use metrics::{counter, gauge};

    gauge!("postwatch_build_info", "version" => env!("CARGO_PKG_VERSION")).set(1.0);
    gauge!("postwatch_feed_up").set(0.0);
    counter!("postwatch_reconnections_total").absolute(0);

    for channel in channels {
        counter!("postwatch_submissions_total", "channel" => channel.to_lowercase()).absolute(0);
    }

    for level in AlertLevel::ALL {
        for destination_type in destination_types {
            counter!(
                "postwatch_alerts_sent_total",
                "level" => level.as_str(),
                "destination_type" => *destination_type
            )
            .absolute(0);
            counter!(
                "postwatch_alerts_failed_total",
                "level" => level.as_str(),
                "destination_type" => *destination_type
            )
            .absolute(0);
        }
    }

    for operation in ["relevance", "summary"] {
        counter!("postwatch_classifier_errors_total", "operation" => operation).absolute(0);
    }

    tracing::info!(
        channel_count = channels.len(),
        destination_type_count = destination_types.len(),
        "Metrics initialized to zero"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::OnceLock;
    use std::time::Duration;

    static TEST_PORT: OnceLock<u16> = OnceLock::new();

    fn get_test_port() -> u16 {
        *TEST_PORT.get_or_init(|| {
            let port = portpicker::pick_unused_port().expect("No free port");

            let cancel = CancellationToken::new();
            let server = MetricsServer::new(port);

            std::thread::spawn(move || {
                let rt = tokio::runtime::Runtime::new().unwrap();
                rt.block_on(async {
                    let _ = server.run(cancel).await;
                });
            });

            std::thread::sleep(Duration::from_millis(500));

            port
        })
    }

    async fn scrape(port: u16) -> String {
        reqwest::Client::new()
            .get(format!("http://127.0.0.1:{}/metrics", port))
            .send()
            .await
            .expect("Request should succeed")
            .text()
            .await
            .expect("Should have body")
    }

    #[tokio::test]
    async fn metrics_server_starts_and_responds() {
        let port = get_test_port();

        let resp = reqwest::Client::new()
            .get(format!("http://127.0.0.1:{}/metrics", port))
            .send()
            .await
            .expect("Request should succeed");

        assert!(resp.status().is_success(), "Should return 200 OK");
        assert!(is_recorder_installed());
    }

    #[tokio::test]
    async fn metrics_format_is_valid_prometheus() {
        let port = get_test_port();

        metrics::counter!("postwatch_submissions_total", "channel" => "hardwareswap").increment(1);

        let body = scrape(port).await;

        for line in body.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let first_char = line.chars().next().unwrap_or(' ');
            assert!(
                first_char == '#' || first_char.is_alphabetic() || first_char == '_',
                "Invalid Prometheus line: {}",
                line
            );
        }
    }

    #[tokio::test]
    async fn metrics_incremented_appear_in_output() {
        let port = get_test_port();

        metrics::counter!(
            "postwatch_alerts_sent_total",
            "level" => "notify",
            "destination_type" => "ntfy"
        )
        .increment(42);
        metrics::gauge!("postwatch_feed_up").set(1.0);

        let body = scrape(port).await;

        assert!(
            body.contains("postwatch_alerts_sent_total"),
            "Should contain alerts_sent metric. Body: {}",
            body
        );
        assert!(
            body.contains("destination_type=\"ntfy\""),
            "Should contain destination_type label. Body: {}",
            body
        );
    }

    #[tokio::test]
    async fn initialized_metrics_are_listed() {
        let port = get_test_port();

        initialize_metrics(&["BuildAPCSales".to_string()], &["json"]);

        let body = scrape(port).await;

        assert!(body.contains("postwatch_build_info"), "Body: {}", body);
        assert!(body.contains("channel=\"buildapcsales\""), "Body: {}", body);
        assert!(body.contains("operation=\"summary\""), "Body: {}", body);
    }

    #[test]
    fn new_creates_server_with_port() {
        let server = MetricsServer::new(9090);
        assert_eq!(server.port(), 9090);
    }

    #[test]
    fn new_with_port_zero_allowed() {
        let server = MetricsServer::new(0);
        assert_eq!(server.port(), 0);
    }
}
