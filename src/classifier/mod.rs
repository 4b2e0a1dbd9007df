//! AI adjudication of term-matched submissions.
//!
//! A [`RelevanceClassifier`] asks a [`CompletionBackend`] two questions about
//! a candidate post: is it really about the include terms, and what would a
//! short title holding only the facts worth knowing (price, condition,
//! location) look like. The relevance answer is read permissively: any
//! `true` in the reply counts. Generated titles go through
//! [`strip_reasoning`] so models that think out loud can be used as-is.

pub mod openai;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::DEFAULT_REASONING_DELIMITER;
use crate::error::ClassifierError;
use crate::submission::Submission;

pub use openai::ChatCompletionClient;

/// Generative-text capability: one prompt in, one completion out.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, ClassifierError>;
}

/// Combined outcome of the relevance check and title generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelevanceVerdict {
    /// The model says the post is not about the terms.
    Rejected,
    /// Relevant, with a generated short title.
    Accepted { generated_title: String },
    /// Relevant, but no usable title came back.
    GenerationFailed,
    /// The relevance check itself failed.
    Unconfirmed { reason: String },
}

/// Return the text after the last `delimiter`, or all of `text` if absent.
pub fn strip_reasoning<'a>(text: &'a str, delimiter: &str) -> &'a str {
    if delimiter.is_empty() {
        return text;
    }
    match text.rfind(delimiter) {
        Some(index) => &text[index + delimiter.len()..],
        None => text,
    }
}

fn format_terms(terms: &[String]) -> String {
    if terms.is_empty() {
        "[any]".to_string()
    } else {
        format!("[{}]", terms.join(", "))
    }
}

/// Prompt asking for a bare `true` / `false` relevance answer.
pub fn relevance_prompt(submission: &Submission, terms: &[String]) -> String {
    format!(
        "Decide whether the following reddit post is offering or discussing an item \
that matches one of the Include Terms. A term that only appears in what the \
poster wants in exchange does not count.\n\
\n\
Include Terms: {terms}\n\
Title: {title}\n\
Body: {body}\n\
\n\
Answer with only true or false, and nothing else.",
        terms = format_terms(terms),
        title = submission.title,
        body = submission.body,
    )
}

/// Prompt asking for a compressed title, with one worked example.
pub fn summary_prompt(submission: &Submission, terms: &[String]) -> String {
    format!(
        "Create a summary title for a reddit post. Only keep the relevant info \
(price, condition, location and other item details) for the Include Terms.\n\
\n\
Example:\n\
Include Terms: [5080, ssd]\n\
Title: [USA-CA] [H] Z690I Strix, 16GB DDR4, 1 TB 990 Evo+, RTX 5080 FE, Samsung Tablet [W] Paypal, Cash\n\
Body: |Item|Condition|Price|\n\
|:-|:-|:-|\n\
|Asus Z690I Strix|Used|$140 shipped|\n\
|Samsung 990 Evo Plus 1TB Gen 4 M.2 NVME SSD|Brand new sealed|$60 shipped|\n\
|RTX 5080 FE - will not ship, local sales only|Brand new sealed|$1200 cash only|\n\
Desired response: RTX 5080 FE (Local Only) - $1200, Samsung 1TB NVME SSD - $60\n\
\n\
---\n\
\n\
Following the example above, generate a title for this post:\n\
Include Terms: {terms}\n\
Title: {title}\n\
Body: {body}\n\
\n\
Your response should contain only the generated title, and nothing else.",
        terms = format_terms(terms),
        title = submission.title,
        body = submission.body,
    )
}

/// Relevance check and title generation over one completion backend.
#[derive(Clone)]
pub struct RelevanceClassifier {
    backend: Arc<dyn CompletionBackend>,
    reasoning_delimiter: String,
}

impl RelevanceClassifier {
    pub fn new(backend: Arc<dyn CompletionBackend>, reasoning_delimiter: impl Into<String>) -> Self {
        Self {
            backend,
            reasoning_delimiter: reasoning_delimiter.into(),
        }
    }

    /// Classifier using the default `</think>` delimiter.
    pub fn with_default_delimiter(backend: Arc<dyn CompletionBackend>) -> Self {
        Self::new(backend, DEFAULT_REASONING_DELIMITER)
    }

    /// Ask whether `submission` is really about `terms`.
    ///
    /// # Errors
    /// Propagates any backend failure; no retry is attempted.
    pub async fn check_relevance(
        &self,
        submission: &Submission,
        terms: &[String],
    ) -> Result<bool, ClassifierError> {
        let answer = self
            .backend
            .complete(&relevance_prompt(submission, terms))
            .await
            .inspect_err(|_| record_error("relevance"))?;

        // Any "true" counts, reasoning segment included.
        let relevant = answer.to_lowercase().contains("true");
        tracing::debug!(
            submission_id = %submission.id,
            relevant = relevant,
            "Relevance check answered"
        );
        Ok(relevant)
    }

    /// Generate a compressed title. Falls back to the original title when
    /// the backend fails or returns nothing.
    pub async fn summarize(&self, submission: &Submission, terms: &[String]) -> String {
        match self.backend.complete(&summary_prompt(submission, terms)).await {
            Ok(raw) => {
                let title = strip_reasoning(&raw, &self.reasoning_delimiter).trim();
                if title.is_empty() {
                    tracing::warn!(submission_id = %submission.id, "Empty generated title");
                    record_error("summary");
                    submission.title.clone()
                } else {
                    title.to_string()
                }
            }
            Err(e) => {
                tracing::warn!(
                    submission_id = %submission.id,
                    error = %e,
                    "Title generation failed"
                );
                record_error("summary");
                submission.title.clone()
            }
        }
    }

    /// Relevance check followed, when relevant, by title generation.
    pub async fn adjudicate(&self, submission: &Submission, terms: &[String]) -> RelevanceVerdict {
        match self.check_relevance(submission, terms).await {
            Err(e) => RelevanceVerdict::Unconfirmed {
                reason: e.to_string(),
            },
            Ok(false) => RelevanceVerdict::Rejected,
            Ok(true) => {
                let generated_title = self.summarize(submission, terms).await;
                if generated_title == submission.title {
                    RelevanceVerdict::GenerationFailed
                } else {
                    RelevanceVerdict::Accepted { generated_title }
                }
            }
        }
    }
}

impl std::fmt::Debug for RelevanceClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelevanceClassifier")
            .field("reasoning_delimiter", &self.reasoning_delimiter)
            .finish()
    }
}

fn record_error(operation: &'static str) {
    metrics::counter!("postwatch_classifier_errors_total", "operation" => operation).increment(1);
}
