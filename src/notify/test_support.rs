//! In-memory sink shared by router, pipeline and controller tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::{AlertLevel, AlertRouter, Destination, DestinationSet, NotificationSink};
use crate::error::NotifyError;

/// One recorded delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Delivered {
    pub destination: String,
    pub title: String,
    pub body: String,
}

/// Records every delivery; URIs containing any `fail_on` marker fail.
#[derive(Default)]
pub(crate) struct RecordingSink {
    delivered: Mutex<Vec<Delivered>>,
    fail_on: Vec<String>,
}

impl RecordingSink {
    pub fn failing_on(markers: &[&str]) -> Self {
        Self {
            delivered: Mutex::new(Vec::new()),
            fail_on: markers.iter().map(|m| m.to_string()).collect(),
        }
    }

    pub fn delivered(&self) -> Vec<Delivered> {
        self.delivered.lock().unwrap().clone()
    }

    /// Deliveries whose destination contains `marker`.
    pub fn delivered_to(&self, marker: &str) -> Vec<Delivered> {
        self.delivered()
            .into_iter()
            .filter(|d| d.destination.contains(marker))
            .collect()
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn deliver(&self, destination: &str, title: &str, body: &str) -> Result<(), NotifyError> {
        self.delivered.lock().unwrap().push(Delivered {
            destination: destination.to_string(),
            title: title.to_string(),
            body: body.to_string(),
        });
        if self.fail_on.iter().any(|m| destination.contains(m.as_str())) {
            return Err(NotifyError::SendFailed("simulated failure".to_string()));
        }
        Ok(())
    }
}

fn parse_all(uris: &[&str]) -> Vec<Destination> {
    uris.iter().map(|u| Destination::parse(u).unwrap()).collect()
}

/// Destinations with one recognizable host per level.
pub(crate) fn destinations(notify: &[&str], filtered: &[&str], error: &[&str]) -> DestinationSet {
    DestinationSet::new(parse_all(notify), parse_all(filtered), parse_all(error))
}

/// The usual layout: `notify.test`, `filtered.test` and `error.test` hosts.
pub(crate) fn standard_destinations() -> DestinationSet {
    destinations(
        &["ntfys://notify.test/deals"],
        &["json://filtered.test/hook"],
        &["json://error.test/hook"],
    )
}

pub(crate) fn router_with(set: DestinationSet, sink: Arc<RecordingSink>) -> AlertRouter {
    AlertRouter::new(Arc::new(set), sink)
}

/// Host marker used by [`standard_destinations`] for `level`.
pub(crate) fn marker(level: AlertLevel) -> &'static str {
    match level {
        AlertLevel::Notify => "notify.test",
        AlertLevel::Filtered => "filtered.test",
        AlertLevel::Error => "error.test",
    }
}
