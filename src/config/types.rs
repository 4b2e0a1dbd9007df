//! Core configuration types and loading.

use super::secret::SecretString;
use super::validation::{
    validate_duration, validate_http_url, validate_subreddit_name, validate_terms,
};
use crate::error::ConfigError;
use crate::notify::AlertLevel;
use serde::Deserialize;
use serde::de::{MapAccess, Visitor};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;
use tracing::warn;

/// Default configuration file path.
pub const DEFAULT_CONFIG_PATH: &str = "config.yaml";

/// Environment variable overriding the configuration path.
pub const ENV_CONFIG_PATH: &str = "POSTWATCH_CONFIG";

/// Default Reddit base URL.
pub const DEFAULT_REDDIT_BASE_URL: &str = "https://www.reddit.com";

/// Default path of the chat-completions endpoint, relative to `openai.url`.
pub const DEFAULT_COMPLETIONS_PATH: &str = "/api/chat/completions";

/// Default delimiter closing a model's reasoning segment.
pub const DEFAULT_REASONING_DELIMITER: &str = "</think>";

/// Main configuration structure for postwatch.
#[derive(Debug, Deserialize)]
pub struct Config {
    /// Feed connection settings and watched subreddits.
    pub reddit: RedditConfig,
    /// Optional generative-text backend. Absent means term matching only.
    #[serde(default)]
    pub openai: Option<OpenAiConfig>,
    /// Destination URIs per alert level.
    #[serde(alias = "apprise")]
    pub alerts: AlertsConfig,
    /// Stream loop behaviour.
    #[serde(default)]
    pub stream: StreamConfig,
    /// Metrics exposition configuration.
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Reddit feed configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RedditConfig {
    /// User agent sent with every request.
    #[serde(alias = "agent")]
    pub user_agent: String,
    #[serde(default = "default_reddit_base_url")]
    pub base_url: String,
    /// Delay between two listing polls.
    #[serde(default = "default_poll_interval", with = "humantime_serde")]
    pub poll_interval: Duration,
    /// Ignore posts that already exist when a subscription starts.
    #[serde(default = "default_true")]
    pub skip_existing: bool,
    pub subreddits: SubredditsConfig,
    /// OAuth app id from older config files. The listing feed is anonymous.
    #[serde(default, rename = "client")]
    pub client_id: Option<String>,
    /// OAuth app secret from older config files. Never used.
    #[serde(default, rename = "secret")]
    pub client_secret: Option<SecretString>,
}

impl RedditConfig {
    /// Keys accepted for older config files that have no effect.
    pub fn ignored_keys(&self) -> Vec<&'static str> {
        let mut keys = Vec::new();
        if self.client_id.is_some() {
            keys.push("reddit.client");
        }
        if self.client_secret.is_some() {
            keys.push("reddit.secret");
        }
        keys
    }
}

fn default_reddit_base_url() -> String {
    DEFAULT_REDDIT_BASE_URL.to_string()
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(5)
}

pub(crate) fn default_true() -> bool {
    true
}

/// Interest terms of one subreddit. A `null` entry means "everything".
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct SubredditTerms {
    #[serde(default)]
    pub include: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
}

/// Subreddits in the order they appear in the file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubredditsConfig(pub Vec<(String, SubredditTerms)>);

impl SubredditsConfig {
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SubredditTerms)> {
        self.0.iter().map(|(name, terms)| (name.as_str(), terms))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'de> Deserialize<'de> for SubredditsConfig {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct SubredditsVisitor;

        impl<'de> Visitor<'de> for SubredditsVisitor {
            type Value = SubredditsConfig;

            fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str("a map of subreddit names to include/exclude terms")
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut entries = Vec::new();
                while let Some((name, terms)) = map.next_entry::<String, Option<SubredditTerms>>()? {
                    entries.push((name, terms.unwrap_or_default()));
                }
                Ok(SubredditsConfig(entries))
            }
        }

        deserializer.deserialize_map(SubredditsVisitor)
    }
}

/// Generative-text backend configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct OpenAiConfig {
    /// Base URL of the OpenAI-compatible server.
    pub url: String,
    /// Bearer token; `${VAR}` placeholders are resolved at compile time.
    pub api_key: SecretString,
    pub model: String,
    #[serde(default = "default_openai_timeout", with = "humantime_serde")]
    pub timeout: Duration,
    #[serde(default = "default_completions_path")]
    pub completions_path: String,
    /// Text closing the model's reasoning segment, stripped from answers.
    #[serde(default = "default_reasoning_delimiter")]
    pub reasoning_delimiter: String,
}

fn default_openai_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_completions_path() -> String {
    DEFAULT_COMPLETIONS_PATH.to_string()
}

fn default_reasoning_delimiter() -> String {
    DEFAULT_REASONING_DELIMITER.to_string()
}

/// Destination URIs per alert level. Missing levels are empty.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AlertsConfig {
    #[serde(default)]
    pub notify: Vec<SecretString>,
    #[serde(default, alias = "filtered")]
    pub filter: Vec<SecretString>,
    #[serde(default)]
    pub error: Vec<SecretString>,
}

impl AlertsConfig {
    pub fn for_level(&self, level: AlertLevel) -> &[SecretString] {
        match level {
            AlertLevel::Notify => &self.notify,
            AlertLevel::Filtered => &self.filter,
            AlertLevel::Error => &self.error,
        }
    }
}

/// Stream loop configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StreamConfig {
    /// Fixed delay before re-subscribing after a transport fault.
    #[serde(default = "default_backoff", with = "humantime_serde")]
    pub backoff: Duration,
    /// Send a test message to every level before streaming.
    #[serde(default = "default_true")]
    pub self_test: bool,
}

fn default_backoff() -> Duration {
    Duration::from_secs(30)
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            backoff: default_backoff(),
            self_test: true,
        }
    }
}

/// Metrics exposition configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    /// Whether metrics exposition is enabled.
    #[serde(default)]
    pub enabled: bool,
    /// Port to expose metrics on (default: 9090).
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

fn default_metrics_port() -> u16 {
    9090
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: 9090,
        }
    }
}

impl Config {
    /// Load configuration from a file path.
    ///
    /// # Errors
    /// Returns [`ConfigError::LoadError`] if the file cannot be read.
    /// Returns [`ConfigError::ValidationError`] if the YAML is invalid.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::LoadError(format!("{}: {}", path.display(), e)))?;

        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML text.
    ///
    /// # Errors
    /// Returns [`ConfigError::ValidationError`] if the YAML is empty or invalid.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            return Err(ConfigError::ValidationError("empty file".to_string()));
        }
        let config: Self = serde_yaml::from_str(content)
            .map_err(|e| ConfigError::ValidationError(e.to_string()))?;
        for key in config.reddit.ignored_keys() {
            warn!(key, "Ignoring config key, the Reddit feed needs no credentials");
        }
        Ok(config)
    }

    /// Validate the whole file, collecting every problem found.
    ///
    /// Destination URIs are checked later by `compile()`, once `${VAR}`
    /// placeholders are resolved.
    ///
    /// # Errors
    /// Returns a `Vec<ConfigError>` containing all validation errors found.
    pub fn validate(&self) -> Result<(), Vec<ConfigError>> {
        let mut errors = Vec::new();

        if self.reddit.user_agent.trim().is_empty() {
            errors.push(ConfigError::ValidationError(
                "reddit.user_agent cannot be empty".to_string(),
            ));
        }

        if let Err(e) = validate_http_url(&self.reddit.base_url) {
            errors.push(ConfigError::ValidationError(format!("reddit.base_url: {}", e)));
        }

        if let Err(e) = validate_duration(self.reddit.poll_interval) {
            errors.push(ConfigError::ValidationError(format!(
                "reddit.poll_interval: {}",
                e
            )));
        }

        if self.reddit.subreddits.is_empty() {
            errors.push(ConfigError::ValidationError(
                "reddit.subreddits must list at least one subreddit".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for (name, terms) in self.reddit.subreddits.iter() {
            if let Err(message) = validate_subreddit_name(name) {
                errors.push(ConfigError::InvalidChannel {
                    channel: name.to_string(),
                    message,
                });
            }
            if !seen.insert(name.to_lowercase()) {
                errors.push(ConfigError::InvalidChannel {
                    channel: name.to_string(),
                    message: "listed more than once".to_string(),
                });
            }
            for (field, list) in [("include", &terms.include), ("exclude", &terms.exclude)] {
                if let Err(message) = validate_terms(list) {
                    errors.push(ConfigError::InvalidChannel {
                        channel: name.to_string(),
                        message: format!("{}: {}", field, message),
                    });
                }
            }
        }

        if let Some(ref openai) = self.openai {
            if let Err(e) = validate_http_url(&openai.url) {
                errors.push(ConfigError::ValidationError(format!("openai.url: {}", e)));
            }
            if openai.model.trim().is_empty() {
                errors.push(ConfigError::ValidationError(
                    "openai.model cannot be empty".to_string(),
                ));
            }
            if let Err(e) = validate_duration(openai.timeout) {
                errors.push(ConfigError::ValidationError(format!("openai.timeout: {}", e)));
            }
            if !openai.completions_path.starts_with('/') {
                errors.push(ConfigError::ValidationError(format!(
                    "openai.completions_path '{}' must start with '/'",
                    openai.completions_path
                )));
            }
            if openai.reasoning_delimiter.is_empty() {
                errors.push(ConfigError::ValidationError(
                    "openai.reasoning_delimiter cannot be empty".to_string(),
                ));
            }
        }

        if let Err(e) = validate_duration(self.stream.backoff) {
            errors.push(ConfigError::ValidationError(format!("stream.backoff: {}", e)));
        }

        if self.metrics.enabled && self.metrics.port == 0 {
            errors.push(ConfigError::ValidationError(
                "metrics.port cannot be 0".to_string(),
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
