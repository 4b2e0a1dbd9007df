//! Deterministic include/exclude term matching.
//!
//! Each include term is looked up independently in the title and in the
//! body; a hit in either counts. Exclusion always wins over inclusion.

use std::collections::HashMap;

use crate::submission::Submission;

/// Interest terms for one channel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelRule {
    /// Terms of which at least one must appear. Empty means "match all".
    pub include: Vec<String>,
    /// Terms of which none may appear.
    pub exclude: Vec<String>,
}

impl ChannelRule {
    pub fn new(include: Vec<String>, exclude: Vec<String>) -> Self {
        Self { include, exclude }
    }

    /// Rule applied to channels without configuration: everything matches,
    /// nothing is excluded.
    pub fn permissive() -> Self {
        Self::default()
    }
}

/// Result of matching a submission against a [`ChannelRule`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchOutcome {
    Excluded,
    NoMatch,
    Candidate,
}

impl MatchOutcome {
    /// Label used for metrics and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchOutcome::Excluded => "excluded",
            MatchOutcome::NoMatch => "no_match",
            MatchOutcome::Candidate => "candidate",
        }
    }
}

/// Evaluate a submission against a rule.
pub fn evaluate(submission: &Submission, rule: &ChannelRule) -> MatchOutcome {
    let title = submission.title.to_lowercase();
    let body = submission.body.to_lowercase();
    let found = |term: &String| {
        let term = term.to_lowercase();
        title.contains(&term) || body.contains(&term)
    };

    if rule.exclude.iter().any(|t| found(t)) {
        return MatchOutcome::Excluded;
    }

    if rule.include.is_empty() || rule.include.iter().any(|t| found(t)) {
        MatchOutcome::Candidate
    } else {
        MatchOutcome::NoMatch
    }
}

/// Channel rules keyed by lower-cased channel name.
#[derive(Debug, Clone, Default)]
pub struct ChannelRules {
    rules: HashMap<String, ChannelRule>,
    /// Channel names in configuration order, as written.
    names: Vec<String>,
}

impl ChannelRules {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a channel. A later insert for the same channel replaces the rule.
    pub fn insert(&mut self, channel: &str, rule: ChannelRule) {
        let key = channel.to_lowercase();
        if self.rules.insert(key, rule).is_none() {
            self.names.push(channel.to_string());
        }
    }

    /// Case-insensitive lookup.
    pub fn get(&self, channel: &str) -> Option<&ChannelRule> {
        self.rules.get(&channel.to_lowercase())
    }

    /// Channels to subscribe to.
    pub fn channel_names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
