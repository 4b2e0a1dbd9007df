//! Generic JSON webhook publisher (`json://` / `jsons://`).

use reqwest::Url;
use serde::Serialize;

use crate::error::NotifyError;

/// Body posted to a JSON webhook.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct WebhookPayload {
    pub title: String,
    pub message: String,
}

/// Resolved JSON webhook target.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct WebhookTarget {
    pub url: String,
    pub credentials: Option<(String, String)>,
    pub payload: WebhookPayload,
}

/// Resolve a `json://` / `jsons://` URI into an HTTP target.
pub(crate) fn resolve(
    url: &Url,
    secure: bool,
    title: &str,
    body: &str,
) -> Result<WebhookTarget, NotifyError> {
    let host = url
        .host_str()
        .ok_or_else(|| NotifyError::InvalidDestination("json: missing host".to_string()))?;
    let scheme = if secure { "https" } else { "http" };

    let mut target = match url.port() {
        Some(port) => format!("{}://{}:{}{}", scheme, host, port, url.path()),
        None => format!("{}://{}{}", scheme, host, url.path()),
    };
    if let Some(query) = url.query() {
        target.push('?');
        target.push_str(query);
    }

    let credentials = if url.username().is_empty() {
        None
    } else {
        Some((
            url.username().to_string(),
            url.password().unwrap_or_default().to_string(),
        ))
    };

    Ok(WebhookTarget {
        url: target,
        credentials,
        payload: WebhookPayload {
            title: title.to_string(),
            message: body.to_string(),
        },
    })
}

/// Build the POST request for one attempt.
pub(crate) fn build_request(
    client: &reqwest::Client,
    target: &WebhookTarget,
) -> reqwest::RequestBuilder {
    let mut request = client.post(&target.url).json(&target.payload);
    if let Some((user, password)) = &target.credentials {
        request = request.basic_auth(user, Some(password));
    }
    request
}
