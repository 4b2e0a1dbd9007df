//! Chat-completions backend for OpenAI-compatible servers.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::CompletionBackend;
use crate::config::{ClassifierSettings, SecretString};
use crate::error::ClassifierError;

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Sends one user message per prompt and returns the first choice's content.
pub struct ChatCompletionClient {
    http_client: reqwest::Client,
    endpoint: String,
    api_key: SecretString,
    model: String,
}

impl ChatCompletionClient {
    /// Build a client whose requests time out after `settings.timeout`.
    ///
    /// # Errors
    /// Returns [`ClassifierError::Request`] if the HTTP client cannot be built.
    pub fn new(settings: &ClassifierSettings) -> Result<Self, ClassifierError> {
        let http_client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| ClassifierError::Request(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            endpoint: settings.endpoint(),
            api_key: settings.api_key.clone(),
            model: settings.model.clone(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl CompletionBackend for ChatCompletionClient {
    async fn complete(&self, prompt: &str) -> Result<String, ClassifierError> {
        let start = std::time::Instant::now();
        let request = ChatRequest {
            model: &self.model,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .http_client
            .post(&self.endpoint)
            .bearer_auth(self.api_key.expose())
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                let e = e.without_url();
                tracing::warn!(error = %e, "Completion request failed");
                ClassifierError::Request(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(status = %status, "Completion backend returned an error");
            return Err(ClassifierError::Status(status.as_u16()));
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| ClassifierError::Parse(e.without_url().to_string()))?;

        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(ClassifierError::EmptyResponse)?;

        tracing::debug!(
            model = %self.model,
            duration_ms = start.elapsed().as_millis(),
            "Chat completion"
        );

        Ok(content)
    }
}

impl std::fmt::Debug for ChatCompletionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatCompletionClient")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .finish()
    }
}
