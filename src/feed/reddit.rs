//! Reddit listing poller.
//!
//! Polls `/r/<a+b+c>/new.json` and emits every post not seen before, oldest
//! first. Reddit answers requests for unknown subreddits with a redirect to
//! its search page, so redirects are never followed and are treated as fatal.

use std::collections::{HashSet, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use chrono::DateTime;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::{FeedSource, Subscription};
use crate::config::FeedSettings;
use crate::error::{ConfigError, FeedError};
use crate::submission::Submission;

/// Number of post ids remembered per subscription.
pub const SEEN_WINDOW: usize = 300;

/// Posts requested per poll (Reddit's maximum).
const LISTING_LIMIT: u32 = 100;

/// Per-request timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    #[serde(default)]
    children: Vec<ListingChild>,
}

#[derive(Debug, Deserialize)]
struct ListingChild {
    data: RawPost,
}

#[derive(Debug, Deserialize)]
struct RawPost {
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    selftext: String,
    #[serde(default)]
    subreddit: String,
    #[serde(default)]
    permalink: String,
    #[serde(default)]
    created_utc: f64,
}

impl From<RawPost> for Submission {
    fn from(post: RawPost) -> Self {
        Submission {
            created: DateTime::from_timestamp(post.created_utc as i64, 0).unwrap_or_default(),
            id: post.id,
            title: post.title,
            body: post.selftext,
            channel: post.subreddit,
            permalink: post.permalink,
        }
    }
}

/// Bounded set of recently seen ids; the oldest id is forgotten first.
#[derive(Debug, Clone)]
pub struct SeenIds {
    order: VecDeque<String>,
    ids: HashSet<String>,
    capacity: usize,
}

impl SeenIds {
    pub fn new(capacity: usize) -> Self {
        Self {
            order: VecDeque::with_capacity(capacity),
            ids: HashSet::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    /// Record `id`. Returns `true` if it was not already present.
    pub fn insert(&mut self, id: &str) -> bool {
        if self.ids.contains(id) {
            return false;
        }
        if self.order.len() == self.capacity
            && let Some(oldest) = self.order.pop_front()
        {
            self.ids.remove(&oldest);
        }
        self.order.push_back(id.to_string());
        self.ids.insert(id.to_string());
        true
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Feed source backed by Reddit's public JSON listings.
#[derive(Debug, Clone)]
pub struct RedditFeed {
    client: Client,
    base_url: String,
    poll_interval: Duration,
    skip_existing: bool,
}

impl RedditFeed {
    /// Create a feed from the compiled settings.
    ///
    /// # Errors
    /// Returns `FeedError::Fatal` if the HTTP client cannot be built.
    pub fn new(settings: &FeedSettings) -> Result<Self, FeedError> {
        let client = Client::builder()
            .user_agent(settings.user_agent.as_str())
            .redirect(reqwest::redirect::Policy::none())
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| FeedError::Fatal(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            poll_interval: settings.poll_interval,
            skip_existing: settings.skip_existing,
        })
    }

    /// Check that every channel exists.
    ///
    /// Missing or redirected channels are fatal; any other failure is logged
    /// and ignored so a flaky network does not block startup.
    ///
    /// # Errors
    /// Returns one [`ConfigError::InvalidChannel`] per missing channel.
    pub async fn validate_channels(&self, channels: &[String]) -> Result<(), Vec<ConfigError>> {
        let mut errors = Vec::new();

        for channel in channels {
            let url = format!("{}/r/{}/about.json", self.base_url, channel);
            match self.client.get(&url).send().await {
                Ok(response) if response.status().is_success() => {
                    debug!(channel = %channel, "Subreddit exists");
                }
                Ok(response)
                    if response.status().is_redirection()
                        || response.status() == reqwest::StatusCode::NOT_FOUND =>
                {
                    errors.push(ConfigError::InvalidChannel {
                        channel: channel.clone(),
                        message: format!("subreddit does not exist (HTTP {})", response.status()),
                    });
                }
                Ok(response) => {
                    warn!(
                        channel = %channel,
                        status = %response.status(),
                        "Could not verify subreddit, continuing"
                    );
                }
                Err(e) => {
                    warn!(channel = %channel, error = %e, "Could not verify subreddit, continuing");
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[async_trait]
impl FeedSource for RedditFeed {
    async fn subscribe(&self, channels: &[String]) -> Result<Box<dyn Subscription>, FeedError> {
        if channels.is_empty() {
            return Err(FeedError::Fatal("no subreddits to subscribe to".to_string()));
        }

        let url = format!(
            "{}/r/{}/new.json?limit={}&raw_json=1",
            self.base_url,
            channels.join("+"),
            LISTING_LIMIT
        );

        let mut subscription = RedditSubscription {
            client: self.client.clone(),
            url,
            poll_interval: self.poll_interval,
            seen: SeenIds::new(SEEN_WINDOW),
            pending: VecDeque::new(),
        };

        let initial = subscription.poll(self.skip_existing).await?;
        info!(
            channels = %channels.join("+"),
            existing = initial,
            skip_existing = self.skip_existing,
            "Subscribed to subreddits"
        );

        Ok(Box::new(subscription))
    }
}

/// Polling subscription over one multi-subreddit listing.
#[derive(Debug)]
pub struct RedditSubscription {
    client: Client,
    url: String,
    poll_interval: Duration,
    seen: SeenIds,
    pending: VecDeque<Submission>,
}

impl RedditSubscription {
    async fn fetch(&self) -> Result<Vec<RawPost>, FeedError> {
        let response = self.client.get(&self.url).send().await.map_err(|e| {
            metrics::gauge!("postwatch_feed_up").set(0.0);
            FeedError::Transport(format!("listing request failed: {}", e))
        })?;

        let status = response.status();
        if status.is_redirection() {
            metrics::gauge!("postwatch_feed_up").set(0.0);
            return Err(FeedError::Fatal(format!(
                "listing redirected (HTTP {}): a subreddit does not exist",
                status
            )));
        }
        if !status.is_success() {
            metrics::gauge!("postwatch_feed_up").set(0.0);
            return Err(FeedError::Transport(format!("listing returned HTTP {}", status)));
        }

        let listing: Listing = response.json().await.map_err(|e| {
            metrics::gauge!("postwatch_feed_up").set(0.0);
            FeedError::Transport(format!("invalid listing: {}", e))
        })?;

        metrics::gauge!("postwatch_feed_up").set(1.0);
        Ok(listing.data.children.into_iter().map(|c| c.data).collect())
    }

    /// Fetch the listing once and queue unseen posts, oldest first.
    ///
    /// With `seed_only`, unseen posts are only remembered. Returns the number
    /// of posts that were new.
    async fn poll(&mut self, seed_only: bool) -> Result<usize, FeedError> {
        let posts = self.fetch().await?;
        let mut fresh = 0;

        // Listings are newest first.
        for post in posts.into_iter().rev() {
            if !self.seen.insert(&post.id) {
                continue;
            }
            fresh += 1;
            if !seed_only {
                self.pending.push_back(post.into());
            }
        }

        debug!(fresh = fresh, queued = self.pending.len(), "Listing polled");
        Ok(fresh)
    }
}

#[async_trait]
impl Subscription for RedditSubscription {
    async fn next_submission(&mut self) -> Result<Submission, FeedError> {
        loop {
            if let Some(submission) = self.pending.pop_front() {
                return Ok(submission);
            }
            tokio::time::sleep(self.poll_interval).await;
            self.poll(false).await?;
        }
    }
}
