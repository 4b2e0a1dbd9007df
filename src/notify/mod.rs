//! Alert routing for postwatch.
//!
//! Every alert carries an [`AlertLevel`]; the router looks up the
//! destinations configured for that level and fans the alert out to all of
//! them concurrently through a [`NotificationSink`].
//!
//! # Architecture
//!
//! ```text
//! pipeline / controller -> AlertRouter -> NotificationSink (HttpSink) -> ntfy | json | mattermost
//! ```
//!
//! Delivery failures never propagate: they are logged, counted and returned
//! in the [`DispatchReport`] so one broken destination cannot stop the others.

pub mod destination;
pub mod http;
pub mod mattermost;
pub mod ntfy;
pub mod traits;
pub mod webhook;

#[cfg(test)]
pub(crate) mod test_support;
#[cfg(test)]
mod tests;

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tracing::Instrument;

pub use destination::{Destination, DestinationKind};
pub use http::{HttpSink, RetryPolicy};
pub use traits::NotificationSink;

/// Title used for every error alert.
pub const ERROR_TITLE: &str = "[ERROR]";

/// Title of the startup self-test message.
pub const SELF_TEST_TITLE: &str = "Test";

/// Severity class selecting which destinations receive an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlertLevel {
    /// Relevant post.
    Notify,
    /// Term match that the classifier rejected.
    Filtered,
    /// Operational problem.
    Error,
}

impl AlertLevel {
    pub const ALL: [AlertLevel; 3] = [AlertLevel::Notify, AlertLevel::Filtered, AlertLevel::Error];

    /// Configuration key and metrics label.
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertLevel::Notify => "notify",
            AlertLevel::Filtered => "filter",
            AlertLevel::Error => "error",
        }
    }
}

impl std::fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A message routed by level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub level: AlertLevel,
    pub title: String,
    pub body: String,
    /// Post URL, used for per-destination decoration.
    pub link: Option<String>,
}

impl Alert {
    pub fn new(level: AlertLevel, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            level,
            title: title.into(),
            body: body.into(),
            link: None,
        }
    }

    /// Error alert with the fixed `[ERROR]` title.
    pub fn error(body: impl Into<String>) -> Self {
        Self::new(AlertLevel::Error, ERROR_TITLE, body)
    }

    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }
}

/// Destinations grouped by level. Every level is present, possibly empty.
#[derive(Debug, Clone, Default)]
pub struct DestinationSet {
    notify: Vec<Destination>,
    filtered: Vec<Destination>,
    error: Vec<Destination>,
}

impl DestinationSet {
    pub fn new(notify: Vec<Destination>, filtered: Vec<Destination>, error: Vec<Destination>) -> Self {
        Self {
            notify,
            filtered,
            error,
        }
    }

    pub fn for_level(&self, level: AlertLevel) -> &[Destination] {
        match level {
            AlertLevel::Notify => &self.notify,
            AlertLevel::Filtered => &self.filtered,
            AlertLevel::Error => &self.error,
        }
    }

    /// Total number of destinations across all levels.
    pub fn len(&self) -> usize {
        self.notify.len() + self.filtered.len() + self.error.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One failed delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchFailure {
    pub level: AlertLevel,
    /// Redacted destination label.
    pub destination: String,
    pub error: String,
}

impl std::fmt::Display for DispatchFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -> {}: {}", self.level, self.destination, self.error)
    }
}

/// Outcome of routing one alert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchReport {
    pub level: AlertLevel,
    pub attempted: usize,
    pub delivered: usize,
    pub failures: Vec<DispatchFailure>,
}

impl DispatchReport {
    fn empty(level: AlertLevel) -> Self {
        Self {
            level,
            attempted: 0,
            delivered: 0,
            failures: Vec::new(),
        }
    }

    pub fn all_delivered(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Fans alerts out to the destinations of their level.
#[derive(Clone)]
pub struct AlertRouter {
    destinations: Arc<DestinationSet>,
    sink: Arc<dyn NotificationSink>,
}

impl AlertRouter {
    pub fn new(destinations: Arc<DestinationSet>, sink: Arc<dyn NotificationSink>) -> Self {
        Self { destinations, sink }
    }

    pub fn destinations(&self) -> &DestinationSet {
        &self.destinations
    }

    /// Deliver `alert` to every destination of its level.
    ///
    /// Never fails: each destination gets its own call, failures are logged
    /// and reported, and the remaining deliveries still run.
    pub async fn route(&self, alert: &Alert) -> DispatchReport {
        let destinations = self.destinations.for_level(alert.level);
        if destinations.is_empty() {
            tracing::debug!(level = %alert.level, "No destinations for level, skipping");
            return DispatchReport::empty(alert.level);
        }

        let deliveries = destinations.iter().map(|destination| {
            let uri = destination.decorated_uri(alert.link.as_deref());
            let span = tracing::info_span!(
                "deliver",
                level = %alert.level,
                destination = %destination.label()
            );
            async move {
                let result = self.sink.deliver(&uri, &alert.title, &alert.body).await;
                (destination, result)
            }
            .instrument(span)
        });

        let mut report = DispatchReport::empty(alert.level);
        for (destination, result) in join_all(deliveries).await {
            report.attempted += 1;
            let destination_type = destination.kind().as_str();
            match result {
                Ok(()) => {
                    report.delivered += 1;
                    tracing::info!(
                        level = %alert.level,
                        destination = %destination.label(),
                        "Alert delivered"
                    );
                    metrics::counter!(
                        "postwatch_alerts_sent_total",
                        "level" => alert.level.as_str(),
                        "destination_type" => destination_type
                    )
                    .increment(1);
                }
                Err(e) => {
                    tracing::error!(
                        level = %alert.level,
                        destination = %destination.label(),
                        error = %e,
                        "Alert delivery failed"
                    );
                    metrics::counter!(
                        "postwatch_alerts_failed_total",
                        "level" => alert.level.as_str(),
                        "destination_type" => destination_type
                    )
                    .increment(1);
                    report.failures.push(DispatchFailure {
                        level: alert.level,
                        destination: destination.label().to_string(),
                        error: e.to_string(),
                    });
                }
            }
        }

        report
    }

    /// Send one startup message to every level and return the failures.
    pub async fn self_test(&self) -> Vec<DispatchFailure> {
        let mut failures = Vec::new();
        for level in AlertLevel::ALL {
            let alert = Alert::new(
                level,
                SELF_TEST_TITLE,
                format!("This is a startup message at {} level", level),
            );
            let report = self.route(&alert).await;
            tracing::info!(
                level = %level,
                attempted = report.attempted,
                delivered = report.delivered,
                "Self-test dispatched"
            );
            failures.extend(report.failures);
        }
        failures
    }
}

impl std::fmt::Debug for AlertRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlertRouter")
            .field("destinations", &self.destinations)
            .finish()
    }
}

/// Calculate exponential backoff delay.
///
/// Formula: `min(base * 2^attempt, max)`
pub fn backoff_delay(attempt: u32, base: Duration, max: Duration) -> Duration {
    let delay = base.saturating_mul(2_u32.saturating_pow(attempt));
    std::cmp::min(delay, max)
}
