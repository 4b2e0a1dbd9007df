//! The submission value flowing through the pipeline.

use chrono::{DateTime, Utc};

/// Base used to turn relative permalinks into clickable links.
pub const REDDIT_WEB_BASE: &str = "https://www.reddit.com";

/// A post received from the feed.
///
/// Produced by the feed source and consumed exactly once by the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub id: String,
    pub title: String,
    pub body: String,
    /// Channel (subreddit) name as reported by the feed.
    pub channel: String,
    /// Permalink, usually relative (`/r/<channel>/comments/<id>/...`).
    pub permalink: String,
    pub created: DateTime<Utc>,
}

impl Submission {
    /// Absolute URL of the post.
    pub fn link(&self) -> String {
        if self.permalink.starts_with("http://") || self.permalink.starts_with("https://") {
            self.permalink.clone()
        } else if self.permalink.starts_with('/') {
            format!("{}{}", REDDIT_WEB_BASE, self.permalink)
        } else {
            format!("{}/{}", REDDIT_WEB_BASE, self.permalink)
        }
    }
}

/// A representative marketplace post, used by `--sample` to exercise the
/// pipeline end to end without a live feed.
pub fn sample_submission() -> Submission {
    Submission {
        id: "sample".to_string(),
        title: "[USA-DC] [H] NVIDIA RTX 3090 Ti Founders Edition (FE) [W] Local Cash or 5090"
            .to_string(),
        body: "I am selling one NVIDIA GeForce 3090 Ti Founders Edition (FE) GPU. Original owner. \
Used for AI/ML side projects here and there.\n\nAsking for $1,200 shipped to CONUS, $1150 local, \
or a 5090.\n\n[Timestamp Video](https://imgur.com/a/o3OXWUi)"
            .to_string(),
        channel: "testsub".to_string(),
        permalink: "/r/testsub/permalink".to_string(),
        created: DateTime::<Utc>::UNIX_EPOCH,
    }
}
