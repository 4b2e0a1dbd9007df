//! Per-submission processing: term matching, optional AI adjudication and
//! alert-level selection.
//!
//! The pipeline keeps no state between submissions.

use std::sync::Arc;

use tracing::Instrument;

use crate::classifier::{RelevanceClassifier, RelevanceVerdict};
use crate::matcher::{ChannelRule, ChannelRules, MatchOutcome, evaluate};
use crate::notify::{Alert, AlertLevel, AlertRouter};
use crate::submission::Submission;

/// What happened to one submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// An exclude term matched; dropped.
    Excluded,
    /// No include term matched; dropped.
    NoMatch,
    /// Sent at notify level.
    Notified,
    /// The classifier rejected it; sent at filter level.
    Filtered,
    /// Sent at notify level with the original title; an error alert reported
    /// the failed title generation.
    NotifiedDegraded,
    /// The relevance check failed; sent at notify level anyway and reported
    /// through an error alert.
    NotifiedUnconfirmed,
}

impl ProcessOutcome {
    /// Label used for metrics and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessOutcome::Excluded => "excluded",
            ProcessOutcome::NoMatch => "no_match",
            ProcessOutcome::Notified => "notified",
            ProcessOutcome::Filtered => "filtered",
            ProcessOutcome::NotifiedDegraded => "notified_degraded",
            ProcessOutcome::NotifiedUnconfirmed => "notified_unconfirmed",
        }
    }

    /// Whether the submission passed term matching.
    pub fn is_match(&self) -> bool {
        !matches!(self, ProcessOutcome::Excluded | ProcessOutcome::NoMatch)
    }
}

/// Term matcher, optional classifier and router wired together.
#[derive(Debug, Clone)]
pub struct Pipeline {
    rules: Arc<ChannelRules>,
    classifier: Option<RelevanceClassifier>,
    router: AlertRouter,
}

impl Pipeline {
    pub fn new(
        rules: Arc<ChannelRules>,
        classifier: Option<RelevanceClassifier>,
        router: AlertRouter,
    ) -> Self {
        Self {
            rules,
            classifier,
            router,
        }
    }

    pub fn router(&self) -> &AlertRouter {
        &self.router
    }

    pub fn rules(&self) -> &ChannelRules {
        &self.rules
    }

    /// Process a submission with the rule of its channel. Channels without a
    /// rule match everything.
    pub async fn process(&self, submission: &Submission) -> ProcessOutcome {
        let permissive = ChannelRule::permissive();
        let rule = match self.rules.get(&submission.channel) {
            Some(rule) => rule,
            None => {
                tracing::debug!(
                    channel = %submission.channel,
                    "No rule for channel, matching everything"
                );
                &permissive
            }
        };
        self.process_with_rule(submission, rule).await
    }

    /// Process a submission with an explicit rule.
    pub async fn process_with_rule(
        &self,
        submission: &Submission,
        rule: &ChannelRule,
    ) -> ProcessOutcome {
        let span = tracing::info_span!(
            "process_submission",
            channel = %submission.channel,
            submission_id = %submission.id
        );
        let outcome = self.run(submission, rule).instrument(span).await;

        let channel = submission.channel.to_lowercase();
        metrics::counter!("postwatch_submissions_total", "channel" => channel.clone()).increment(1);
        if outcome.is_match() {
            metrics::counter!(
                "postwatch_submissions_matched_total",
                "channel" => channel,
                "outcome" => outcome.as_str()
            )
            .increment(1);
        }

        outcome
    }

    async fn run(&self, submission: &Submission, rule: &ChannelRule) -> ProcessOutcome {
        match evaluate(submission, rule) {
            MatchOutcome::Excluded => {
                tracing::debug!(title = %submission.title, "Excluded term found");
                return ProcessOutcome::Excluded;
            }
            MatchOutcome::NoMatch => {
                tracing::debug!(title = %submission.title, "No include term found");
                return ProcessOutcome::NoMatch;
            }
            MatchOutcome::Candidate => {
                tracing::info!(title = %submission.title, "Submission matched");
            }
        }

        let link = submission.link();
        let original = |level: AlertLevel, body: String| {
            Alert::new(level, submission.title.as_str(), body).with_link(link.as_str())
        };

        let Some(classifier) = &self.classifier else {
            self.router.route(&original(AlertLevel::Notify, link.clone())).await;
            return ProcessOutcome::Notified;
        };

        match classifier.adjudicate(submission, &rule.include).await {
            RelevanceVerdict::Accepted { generated_title } => {
                let body = format!("{}\n{}", generated_title, link);
                let alert = Alert::new(AlertLevel::Notify, generated_title, body).with_link(link.as_str());
                self.router.route(&alert).await;
                ProcessOutcome::Notified
            }
            RelevanceVerdict::Rejected => {
                tracing::info!(title = %submission.title, "Classifier rejected submission");
                self.router.route(&original(AlertLevel::Filtered, link.clone())).await;
                ProcessOutcome::Filtered
            }
            RelevanceVerdict::GenerationFailed => {
                tracing::warn!(title = %submission.title, "Title generation failed, using original title");
                self.router.route(&original(AlertLevel::Notify, link.clone())).await;
                self.router
                    .route(&Alert::error(format!(
                        "Title generation failed for {}; notified with the original title",
                        link
                    )))
                    .await;
                ProcessOutcome::NotifiedDegraded
            }
            RelevanceVerdict::Unconfirmed { reason } => {
                tracing::error!(error = %reason, "Relevance check failed, notifying anyway");
                self.router
                    .route(&Alert::error(format!(
                        "Relevance check failed for {}: {}",
                        link, reason
                    )))
                    .await;
                self.router.route(&original(AlertLevel::Notify, link.clone())).await;
                ProcessOutcome::NotifiedUnconfirmed
            }
        }
    }
}
