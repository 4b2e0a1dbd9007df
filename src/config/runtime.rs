//! Runtime configuration: resolved secrets, parsed destinations and
//! case-insensitive channel rules.

use super::env::resolve_env_vars;
use super::secret::SecretString;
use super::types::{Config, MetricsConfig, OpenAiConfig, StreamConfig};
use crate::error::{ConfigError, NotifyError};
use crate::matcher::{ChannelRule, ChannelRules};
use crate::notify::{AlertLevel, Destination, DestinationSet};
use std::sync::Arc;
use std::time::Duration;

/// Immutable configuration shared by every component after startup.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub feed: FeedSettings,
    pub rules: Arc<ChannelRules>,
    pub classifier: Option<ClassifierSettings>,
    pub destinations: Arc<DestinationSet>,
    pub stream: StreamConfig,
    pub metrics: MetricsConfig,
}

/// Feed connection settings.
#[derive(Debug, Clone)]
pub struct FeedSettings {
    pub user_agent: String,
    pub base_url: String,
    pub poll_interval: Duration,
    pub skip_existing: bool,
}

/// Generative-text backend settings with the API key resolved.
#[derive(Debug, Clone)]
pub struct ClassifierSettings {
    pub url: String,
    pub api_key: SecretString,
    pub model: String,
    pub timeout: Duration,
    pub completions_path: String,
    pub reasoning_delimiter: String,
}

impl ClassifierSettings {
    /// Full URL of the chat-completions endpoint.
    pub fn endpoint(&self) -> String {
        format!("{}{}", self.url.trim_end_matches('/'), self.completions_path)
    }
}

fn compile_classifier(openai: OpenAiConfig) -> Result<ClassifierSettings, ConfigError> {
    let api_key = resolve_env_vars(openai.api_key.expose()).map_err(|e| match e {
        ConfigError::ValidationError(message) => {
            ConfigError::ValidationError(format!("openai.api_key: {}", message))
        }
        other => other,
    })?;

    Ok(ClassifierSettings {
        url: openai.url,
        api_key: SecretString::new(api_key),
        model: openai.model,
        timeout: openai.timeout,
        completions_path: openai.completions_path,
        reasoning_delimiter: openai.reasoning_delimiter,
    })
}

impl Config {
    /// Compile configuration into runtime-ready format.
    ///
    /// Resolves `${VAR}` placeholders and parses every destination URI.
    ///
    /// # Errors
    /// Returns every destination or secret that failed to resolve.
    pub fn compile(self) -> Result<RuntimeConfig, Vec<ConfigError>> {
        let mut errors = Vec::new();

        let mut per_level: [Vec<Destination>; 3] = Default::default();
        for (slot, level) in per_level.iter_mut().zip(AlertLevel::ALL) {
            for (index, raw) in self.alerts.for_level(level).iter().enumerate() {
                let parsed = resolve_env_vars(raw.expose())
                    .map_err(|e| match e {
                        ConfigError::ValidationError(message) => message,
                        other => other.to_string(),
                    })
                    .and_then(|uri| {
                        Destination::parse(&uri).map_err(|e| match e {
                            NotifyError::InvalidDestination(message) => message,
                            other => other.to_string(),
                        })
                    });
                match parsed {
                    Ok(destination) => slot.push(destination),
                    Err(message) => errors.push(ConfigError::InvalidDestination {
                        level: level.as_str().to_string(),
                        index,
                        message,
                    }),
                }
            }
        }

        let classifier = match self.openai.map(compile_classifier).transpose() {
            Ok(classifier) => classifier,
            Err(e) => {
                errors.push(e);
                None
            }
        };

        if !errors.is_empty() {
            return Err(errors);
        }

        let mut rules = ChannelRules::new();
        for (name, terms) in self.reddit.subreddits.0 {
            rules.insert(&name, ChannelRule::new(terms.include, terms.exclude));
        }

        let [notify, filtered, error] = per_level;

        Ok(RuntimeConfig {
            feed: FeedSettings {
                user_agent: self.reddit.user_agent,
                base_url: self.reddit.base_url.trim_end_matches('/').to_string(),
                poll_interval: self.reddit.poll_interval,
                skip_existing: self.reddit.skip_existing,
            },
            rules: Arc::new(rules),
            classifier,
            destinations: Arc::new(DestinationSet::new(notify, filtered, error)),
            stream: self.stream,
            metrics: self.metrics,
        })
    }
}
