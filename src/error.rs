//! Centralized error types for postwatch using thiserror.

use thiserror::Error;

/// Errors related to configuration loading and validation.
///
/// All of these are startup-fatal: the stream loop never sees them.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to load config file: {0}")]
    LoadError(String),
    #[error("invalid configuration: {0}")]
    ValidationError(String),
    #[error("invalid subreddit '{channel}': {message}")]
    InvalidChannel { channel: String, message: String },
    #[error("invalid {level} destination #{index}: {message}")]
    InvalidDestination {
        level: String,
        index: usize,
        message: String,
    },
}

/// Errors raised by a feed subscription.
///
/// Only `Transport` is recovered from by the stream controller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FeedError {
    #[error("feed transport error: {0}")]
    Transport(String),
    #[error("feed error: {0}")]
    Fatal(String),
}

impl FeedError {
    /// Whether the controller should back off and resubscribe.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, FeedError::Transport(_))
    }
}

/// Errors from the generative-text backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClassifierError {
    #[error("completion request failed: {0}")]
    Request(String),
    #[error("completion backend returned HTTP {0}")]
    Status(u16),
    #[error("invalid completion response: {0}")]
    Parse(String),
    #[error("completion backend returned no content")]
    EmptyResponse,
}

/// Errors related to notification delivery.
#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("failed to send notification: {0}")]
    SendFailed(String),
    #[error("invalid destination: {0}")]
    InvalidDestination(String),
}

/// Errors that end the stream controller.
#[derive(Error, Debug)]
pub enum ControllerError {
    #[error("stream stopped: {0}")]
    Feed(#[from] FeedError),
}
