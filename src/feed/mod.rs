//! Sources of new submissions.
//!
//! A [`FeedSource`] opens a [`Subscription`] over a set of channels; the
//! subscription yields each new submission once. Transport faults are
//! reported as [`FeedError::Transport`] and are recovered from by
//! re-subscribing; [`FeedError::Fatal`] ends the stream.

pub mod reddit;

use async_trait::async_trait;

use crate::error::FeedError;
use crate::submission::Submission;

pub use reddit::{RedditFeed, RedditSubscription};

/// Opens subscriptions over a set of channels.
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Subscribe to the union of `channels`.
    ///
    /// # Errors
    /// `Transport` when the source is unreachable, `Fatal` when the request
    /// can never succeed (unknown channel, no channels).
    async fn subscribe(&self, channels: &[String]) -> Result<Box<dyn Subscription>, FeedError>;
}

/// A live, ordered stream of new submissions.
#[async_trait]
pub trait Subscription: Send {
    /// Wait for the next submission.
    async fn next_submission(&mut self) -> Result<Submission, FeedError>;
}
