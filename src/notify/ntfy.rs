//! ntfy publisher.
//!
//! Uses ntfy's JSON publishing endpoint (POST to the server root) so titles
//! are not limited to header-safe ASCII.

use reqwest::Url;
use serde::Serialize;

use super::destination::path_segments;
use crate::error::NotifyError;

/// Server used for `ntfy://topic` URIs without a host part.
pub const NTFY_DEFAULT_SERVER: &str = "https://ntfy.sh";

/// ntfy JSON publish body.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub(crate) struct NtfyMessage {
    pub topic: String,
    pub title: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub click: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<u8>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

/// Resolved ntfy target: server base URL plus message.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct NtfyTarget {
    pub server: String,
    pub credentials: Option<(String, String)>,
    pub message: NtfyMessage,
}

/// Map ntfy priority names to their numeric value.
fn parse_priority(value: &str) -> Option<u8> {
    match value.to_ascii_lowercase().as_str() {
        "min" | "1" => Some(1),
        "low" | "2" => Some(2),
        "default" | "3" => Some(3),
        "high" | "4" => Some(4),
        "max" | "urgent" | "5" => Some(5),
        _ => None,
    }
}

/// Resolve an `ntfy://` / `ntfys://` URI into a publish target.
pub(crate) fn resolve(
    url: &Url,
    secure: bool,
    title: &str,
    body: &str,
) -> Result<NtfyTarget, NotifyError> {
    let host = url
        .host_str()
        .ok_or_else(|| NotifyError::InvalidDestination("ntfy: missing host".to_string()))?;
    let segments = path_segments(url);

    let (server, topic) = if segments.is_empty() {
        (NTFY_DEFAULT_SERVER.to_string(), host.to_string())
    } else {
        let scheme = if secure { "https" } else { "http" };
        let server = match url.port() {
            Some(port) => format!("{}://{}:{}", scheme, host, port),
            None => format!("{}://{}", scheme, host),
        };
        (server, segments.join("/"))
    };

    let mut message = NtfyMessage {
        topic,
        title: title.to_string(),
        message: body.to_string(),
        click: None,
        priority: None,
        tags: Vec::new(),
    };

    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "click" => message.click = Some(value.into_owned()),
            "priority" => message.priority = parse_priority(&value),
            "tags" => {
                message.tags = value
                    .split(',')
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(str::to_string)
                    .collect()
            }
            _ => {}
        }
    }

    let credentials = if url.username().is_empty() {
        None
    } else {
        Some((
            url.username().to_string(),
            url.password().unwrap_or_default().to_string(),
        ))
    };

    Ok(NtfyTarget {
        server,
        credentials,
        message,
    })
}

/// Build the publish request for one attempt.
pub(crate) fn build_request(client: &reqwest::Client, target: &NtfyTarget) -> reqwest::RequestBuilder {
    let mut request = client.post(&target.server).json(&target.message);
    if let Some((user, password)) = &target.credentials {
        request = request.basic_auth(user, Some(password));
    }
    request
}
