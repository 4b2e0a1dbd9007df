//! Stream controller: keeps a feed subscription alive and drives the
//! pipeline.
//!
//! The controller alternates between two states. While `Connected` it reads
//! submissions one by one and processes each fully before reading the next.
//! A transport fault moves it to `Reconnecting`: one error alert is sent,
//! the fixed backoff elapses, and it subscribes again. There is no retry
//! limit. Fatal feed errors end [`StreamController::run`]; cancellation ends
//! it cleanly at any await point outside submission processing, including
//! while the error alert is still being delivered.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::error::{ControllerError, FeedError};
use crate::feed::{FeedSource, Subscription};
use crate::notify::Alert;
use crate::pipeline::Pipeline;

/// Connection state of the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Connected,
    Reconnecting,
}

/// Drives one feed subscription through the pipeline until cancelled.
pub struct StreamController {
    source: Arc<dyn FeedSource>,
    pipeline: Pipeline,
    channels: Vec<String>,
    backoff: Duration,
}

impl StreamController {
    /// Subscribe to every channel known to the pipeline's rules.
    pub fn new(source: Arc<dyn FeedSource>, pipeline: Pipeline, backoff: Duration) -> Self {
        let channels = pipeline.rules().channel_names().to_vec();
        Self {
            source,
            pipeline,
            channels,
            backoff,
        }
    }

    pub fn channels(&self) -> &[String] {
        &self.channels
    }

    /// Run until cancelled or a fatal feed error occurs.
    ///
    /// # Errors
    /// Returns [`ControllerError::Feed`] for non-recoverable feed errors.
    pub async fn run(&self, cancel: CancellationToken) -> Result<(), ControllerError> {
        loop {
            if cancel.is_cancelled() {
                info!("Stream controller stopping");
                return Ok(());
            }

            let subscribed = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("Stream controller stopping");
                    return Ok(());
                }
                result = self.source.subscribe(&self.channels) => result,
            };

            let fault = match subscribed {
                Ok(mut subscription) => {
                    info!(
                        channels = %self.channels.join("+"),
                        state = ?StreamState::Connected,
                        "Streaming submissions"
                    );
                    match self.read_loop(subscription.as_mut(), &cancel).await {
                        Some(fault) => fault,
                        None => {
                            info!("Stream controller stopping");
                            return Ok(());
                        }
                    }
                }
                Err(fault) => fault,
            };

            if !fault.is_recoverable() {
                error!(error = %fault, "Feed failed permanently");
                return Err(fault.into());
            }

            warn!(
                error = %fault,
                state = ?StreamState::Reconnecting,
                backoff_secs = self.backoff.as_secs_f64(),
                "Feed error, reconnecting after backoff"
            );
            metrics::counter!("postwatch_reconnections_total").increment(1);

            let alert = Alert::error(format!(
                "Feed error: {}. Reconnecting in {:?}.",
                fault, self.backoff
            ));
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("Stream controller stopping while reporting feed error");
                    return Ok(());
                }
                _ = self.pipeline.router().route(&alert) => {}
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("Stream controller stopping during backoff");
                    return Ok(());
                }
                _ = tokio::time::sleep(self.backoff) => {}
            }
        }
    }

    /// Process submissions until the subscription fails (returns the fault)
    /// or the token is cancelled (returns `None`).
    async fn read_loop(
        &self,
        subscription: &mut dyn Subscription,
        cancel: &CancellationToken,
    ) -> Option<FeedError> {
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return None,
                next = subscription.next_submission() => next,
            };

            match next {
                Ok(submission) => {
                    let outcome = self.pipeline.process(&submission).await;
                    tracing::debug!(
                        submission_id = %submission.id,
                        outcome = outcome.as_str(),
                        "Submission processed"
                    );
                }
                Err(fault) => return Some(fault),
            }
        }
    }
}

impl std::fmt::Debug for StreamController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamController")
            .field("channels", &self.channels)
            .field("backoff", &self.backoff)
            .finish()
    }
}
