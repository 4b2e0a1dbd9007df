//! Configuration loading and validation for postwatch.
//!
//! This module handles loading the YAML configuration file, validation,
//! environment variable substitution for secrets, and compilation into the
//! immutable [`RuntimeConfig`].

mod env;
mod runtime;
mod secret;
mod types;
mod validation;

// Re-exports publics
pub use env::resolve_env_vars;
pub use runtime::{ClassifierSettings, FeedSettings, RuntimeConfig};
pub use secret::SecretString;
pub use types::{
    AlertsConfig, Config, DEFAULT_COMPLETIONS_PATH, DEFAULT_CONFIG_PATH,
    DEFAULT_REASONING_DELIMITER, DEFAULT_REDDIT_BASE_URL, ENV_CONFIG_PATH, MetricsConfig,
    OpenAiConfig, RedditConfig, StreamConfig, SubredditTerms, SubredditsConfig,
};
