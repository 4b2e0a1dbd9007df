//! Mattermost incoming-webhook publisher (`mmost://` / `mmosts://`).

use reqwest::Url;
use serde::Serialize;

use super::destination::path_segments;
use crate::error::NotifyError;

/// Mattermost attachment structure for incoming webhooks.
#[derive(Debug, Clone, Serialize, PartialEq)]
struct MattermostAttachment {
    fallback: String,
    title: String,
    text: String,
    footer: String,
}

/// Mattermost webhook payload structure.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub(crate) struct MattermostPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    channel: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    username: Option<String>,
    attachments: Vec<MattermostAttachment>,
}

/// Resolved Mattermost target.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct MattermostTarget {
    pub url: String,
    pub payload: MattermostPayload,
}

/// Build Mattermost webhook payload.
fn build_payload(
    title: &str,
    body: &str,
    channel: Option<String>,
    username: Option<String>,
) -> MattermostPayload {
    MattermostPayload {
        channel,
        username,
        attachments: vec![MattermostAttachment {
            fallback: title.to_string(),
            title: title.to_string(),
            text: body.to_string(),
            footer: "postwatch".to_string(),
        }],
    }
}

/// Resolve `mmost://host[:port]/token[?channel=..&username=..]`.
pub(crate) fn resolve(
    url: &Url,
    secure: bool,
    title: &str,
    body: &str,
) -> Result<MattermostTarget, NotifyError> {
    let host = url
        .host_str()
        .ok_or_else(|| NotifyError::InvalidDestination("mattermost: missing host".to_string()))?;
    let token = path_segments(url)
        .last()
        .map(|s| s.to_string())
        .ok_or_else(|| {
            NotifyError::InvalidDestination("mattermost: missing hook token".to_string())
        })?;

    let scheme = if secure { "https" } else { "http" };
    let target = match url.port() {
        Some(port) => format!("{}://{}:{}/hooks/{}", scheme, host, port, token),
        None => format!("{}://{}/hooks/{}", scheme, host, token),
    };

    let mut channel = None;
    let mut username = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "channel" => channel = Some(value.into_owned()),
            "username" | "user" => username = Some(value.into_owned()),
            _ => {}
        }
    }

    Ok(MattermostTarget {
        url: target,
        payload: build_payload(title, body, channel, username),
    })
}

/// Build the POST request for one attempt.
pub(crate) fn build_request(
    client: &reqwest::Client,
    target: &MattermostTarget,
) -> reqwest::RequestBuilder {
    client.post(&target.url).json(&target.payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_payload_structure() {
        let payload = build_payload("Test Alert", "Something happened", None, None);

        assert_eq!(payload.attachments.len(), 1);
        let attachment = &payload.attachments[0];
        assert_eq!(attachment.fallback, "Test Alert");
        assert_eq!(attachment.title, "Test Alert");
        assert_eq!(attachment.text, "Something happened");
        assert_eq!(attachment.footer, "postwatch");
    }

    #[test]
    fn payload_serializes_without_optional_fields() {
        let payload = build_payload("Test", "Body", None, None);
        let json = serde_json::to_string(&payload).unwrap();

        assert!(json.contains("\"attachments\""));
        assert!(json.contains("\"fallback\":\"Test\""));
        assert!(json.contains("\"text\":\"Body\""));
        assert!(!json.contains("channel"));
        assert!(!json.contains("username"));
    }

    #[test]
    fn resolve_builds_hook_url() {
        let url = Url::parse("mmosts://chat.example.com/abc123?channel=deals&username=bot").unwrap();
        let target = resolve(&url, true, "t", "b").unwrap();
        assert_eq!(target.url, "https://chat.example.com/hooks/abc123");
        assert_eq!(target.payload.channel.as_deref(), Some("deals"));
        assert_eq!(target.payload.username.as_deref(), Some("bot"));
    }

    #[test]
    fn resolve_keeps_port() {
        let url = Url::parse("mmost://localhost:8065/xyz").unwrap();
        let target = resolve(&url, false, "t", "b").unwrap();
        assert_eq!(target.url, "http://localhost:8065/hooks/xyz");
    }

    #[test]
    fn resolve_without_token_fails() {
        let url = Url::parse("mmost://localhost:8065").unwrap();
        assert!(resolve(&url, false, "t", "b").is_err());
    }
}
