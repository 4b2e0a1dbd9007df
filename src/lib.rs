//! postwatch - Keyword and AI-assisted alerting on new Reddit submissions.

pub mod classifier;
pub mod cli;
pub mod config;
pub mod controller;
pub mod error;
pub mod feed;
pub mod matcher;
pub mod metrics;
pub mod notify;
pub mod pipeline;
pub mod submission;

// Re-export commonly used types
pub use classifier::{ChatCompletionClient, CompletionBackend, RelevanceClassifier, RelevanceVerdict};
pub use cli::LogFormat;
pub use controller::{StreamController, StreamState};
pub use feed::{FeedSource, RedditFeed, Subscription};
pub use matcher::{ChannelRule, ChannelRules, MatchOutcome, evaluate};
pub use metrics::{MetricsServer, initialize_metrics, register_metric_descriptions};
pub use notify::{
    Alert, AlertLevel, AlertRouter, Destination, DestinationKind, DestinationSet, DispatchReport,
    HttpSink, NotificationSink, backoff_delay,
};
pub use pipeline::{Pipeline, ProcessOutcome};
pub use submission::{Submission, sample_submission};
