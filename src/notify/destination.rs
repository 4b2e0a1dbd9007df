//! Destination descriptors and per-call URI decoration.
//!
//! A destination is an opaque URI whose scheme selects the delivery
//! protocol. URIs usually embed tokens, so they are kept in a
//! [`SecretString`] and only a `scheme://host` label is ever logged.

use reqwest::Url;

use crate::config::SecretString;
use crate::error::NotifyError;

/// Delivery protocol selected by the URI scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DestinationKind {
    /// `ntfy://` (http) or `ntfys://` (https).
    Ntfy,
    /// `json://` (http) or `jsons://` (https) generic JSON webhook.
    Json,
    /// `mmost://` (http) or `mmosts://` (https) Mattermost incoming webhook.
    Mattermost,
}

impl DestinationKind {
    /// Map a URI scheme to its kind and whether it uses TLS.
    pub fn from_scheme(scheme: &str) -> Option<(Self, bool)> {
        match scheme {
            "ntfy" => Some((DestinationKind::Ntfy, false)),
            "ntfys" => Some((DestinationKind::Ntfy, true)),
            "json" => Some((DestinationKind::Json, false)),
            "jsons" => Some((DestinationKind::Json, true)),
            "mmost" => Some((DestinationKind::Mattermost, false)),
            "mmosts" => Some((DestinationKind::Mattermost, true)),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DestinationKind::Ntfy => "ntfy",
            DestinationKind::Json => "json",
            DestinationKind::Mattermost => "mattermost",
        }
    }
}

/// A validated notification destination.
#[derive(Clone)]
pub struct Destination {
    kind: DestinationKind,
    uri: SecretString,
    label: String,
}

impl Destination {
    /// Parse and validate a destination URI.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError::InvalidDestination`] for malformed URIs,
    /// unsupported schemes, or a Mattermost URI without a hook token.
    pub fn parse(raw: &str) -> Result<Self, NotifyError> {
        let url = Url::parse(raw.trim())
            .map_err(|e| NotifyError::InvalidDestination(format!("malformed URI: {}", e)))?;

        let (kind, _) = DestinationKind::from_scheme(url.scheme()).ok_or_else(|| {
            NotifyError::InvalidDestination(format!("unsupported scheme '{}'", url.scheme()))
        })?;

        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| NotifyError::InvalidDestination("missing host".to_string()))?;

        if kind == DestinationKind::Mattermost && path_segments(&url).is_empty() {
            return Err(NotifyError::InvalidDestination(
                "mattermost destination needs a hook token path".to_string(),
            ));
        }

        let label = match url.port() {
            Some(port) => format!("{}://{}:{}", url.scheme(), host, port),
            None => format!("{}://{}", url.scheme(), host),
        };

        Ok(Self {
            kind,
            uri: SecretString::new(raw.trim().to_string()),
            label,
        })
    }

    pub fn kind(&self) -> DestinationKind {
        self.kind
    }

    /// Redacted `scheme://host[:port]` label, safe to log.
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn uri(&self) -> &SecretString {
        &self.uri
    }

    /// URI to use for one delivery.
    ///
    /// ntfy destinations get the post link as their click-through target;
    /// every other kind is returned unchanged. The stored URI is never
    /// modified, so a decoration never leaks into the next call.
    pub fn decorated_uri(&self, link: Option<&str>) -> String {
        let uri = self.uri.expose();
        match (self.kind, link) {
            (DestinationKind::Ntfy, Some(link)) => {
                let separator = if uri.contains('?') { '&' } else { '?' };
                format!("{}{}click={}", uri, separator, urlencoding::encode(link))
            }
            _ => uri.to_string(),
        }
    }
}

impl std::fmt::Debug for Destination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Destination")
            .field("kind", &self.kind)
            .field("label", &self.label)
            .finish()
    }
}

/// Non-empty path segments of a URL.
pub(crate) fn path_segments(url: &Url) -> Vec<&str> {
    url.path()
        .split('/')
        .filter(|segment| !segment.is_empty())
        .collect()
}
