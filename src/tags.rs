//! Published Nexus image tags.
//!
//! `TagCache` keeps the tags of `sonatype/nexus3` in memory and refreshes
//! them on demand: every 6 hours normally, and no more than once a minute
//! after a failed fetch. Nothing runs in the background; a refresh happens
//! inside the call that needs the data.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::version::VersionTag;

/// Normal refresh interval.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(6 * 60 * 60);
/// Minimum delay before trying again after a failed fetch.
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(60);

const DOCKER_HUB_TAGS_URL: &str =
    "https://registry.hub.docker.com/v2/repositories/sonatype/nexus3/tags?page_size=100";
const MAX_PAGES: usize = 50;

/// Errors from the tag source.
#[derive(Error, Debug)]
pub enum TagError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("registry answered {status} for {url}")]
    Status { status: u16, url: String },

    #[error("tags unavailable: {0}")]
    Unavailable(String),

    #[error("no parseable tags published")]
    NoTags,
}

/// Answers questions about published releases.
///
/// A failed fetch is an error, never an empty answer: callers must be able
/// to tell an outage from a minor that has no release.
#[async_trait]
pub trait TagSource: Send + Sync {
    /// Greatest MINOR across all published tags.
    async fn latest_minor(&self) -> Result<u32, TagError>;

    /// Tag of the greatest MICRO published for `minor`, if any.
    async fn latest_micro(&self, minor: u32) -> Result<Option<String>, TagError>;
}

/// Fetches the raw list of published tags.
#[async_trait]
pub trait TagFetcher: Send + Sync {
    async fn fetch_tags(&self) -> Result<Vec<String>, TagError>;
}

#[derive(Default)]
struct CacheState {
    tags: Vec<(VersionTag, String)>,
    last_fetch: Option<Instant>,
    last_error: Option<Instant>,
}

impl CacheState {
    fn cached(&self) -> Result<Vec<(VersionTag, String)>, TagError> {
        if self.tags.is_empty() && self.last_error.is_some() {
            return Err(TagError::Unavailable(
                "last fetch failed, waiting before retrying".to_string(),
            ));
        }
        Ok(self.tags.clone())
    }
}

/// Caching `TagSource` over a `TagFetcher`.
///
/// The state lock is never held across a fetch. At most one fetch runs at a
/// time; callers arriving meanwhile get the cached tags, and only wait when
/// nothing has been cached yet.
pub struct TagCache<F> {
    fetcher: F,
    refresh_interval: Duration,
    retry_interval: Duration,
    state: RwLock<CacheState>,
    refresh: Mutex<()>,
}

impl<F: TagFetcher> TagCache<F> {
    pub fn new(fetcher: F) -> Self {
        Self::with_intervals(fetcher, DEFAULT_REFRESH_INTERVAL, DEFAULT_RETRY_INTERVAL)
    }

    pub fn with_intervals(fetcher: F, refresh_interval: Duration, retry_interval: Duration) -> Self {
        Self {
            fetcher,
            refresh_interval,
            retry_interval,
            state: RwLock::new(CacheState::default()),
            refresh: Mutex::new(()),
        }
    }

    fn refresh_due(&self, state: &CacheState) -> bool {
        let now = Instant::now();
        let retry_blocked = state
            .last_error
            .is_some_and(|at| now.duration_since(at) < self.retry_interval);
        let stale = state
            .last_fetch
            .is_none_or(|at| now.duration_since(at) >= self.refresh_interval);
        stale && !retry_blocked
    }

    /// Cached tags, refreshed first when due. Stale tags are served when a
    /// refresh fails.
    async fn tags(&self) -> Result<Vec<(VersionTag, String)>, TagError> {
        {
            let state = self.state.read().await;
            if !self.refresh_due(&state) {
                return state.cached();
            }
        }

        let _refresh = match self.refresh.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                {
                    let state = self.state.read().await;
                    if !state.tags.is_empty() {
                        return Ok(state.tags.clone());
                    }
                }
                self.refresh.lock().await
            }
        };

        // Another caller may have refreshed while we waited
        {
            let state = self.state.read().await;
            if !self.refresh_due(&state) {
                return state.cached();
            }
        }

        let fetched = self.fetcher.fetch_tags().await;
        let now = Instant::now();
        let mut state = self.state.write().await;
        match fetched {
            Ok(raw) => {
                state.tags = raw
                    .into_iter()
                    .filter_map(|tag| VersionTag::parse(&tag).ok().map(|v| (v, tag)))
                    .collect();
                state.last_fetch = Some(now);
                state.last_error = None;
                debug!(count = state.tags.len(), "Refreshed Nexus image tags");
                Ok(state.tags.clone())
            }
            Err(e) => {
                warn!(error = %e, "Failed to fetch Nexus image tags");
                state.last_error = Some(now);
                if state.tags.is_empty() {
                    return Err(e);
                }
                Ok(state.tags.clone())
            }
        }
    }
}

#[async_trait]
impl<F: TagFetcher> TagSource for TagCache<F> {
    async fn latest_minor(&self) -> Result<u32, TagError> {
        self.tags()
            .await?
            .iter()
            .map(|(version, _)| version.minor)
            .max()
            .ok_or(TagError::NoTags)
    }

    async fn latest_micro(&self, minor: u32) -> Result<Option<String>, TagError> {
        Ok(self
            .tags()
            .await?
            .into_iter()
            .filter(|(version, _)| version.minor == minor)
            .max_by_key(|(version, _)| version.micro)
            .map(|(_, tag)| tag))
    }
}

#[derive(Deserialize)]
struct TagPage {
    next: Option<String>,
    #[serde(default)]
    results: Vec<TagEntry>,
}

#[derive(Deserialize)]
struct TagEntry {
    name: String,
}

/// Fetches `sonatype/nexus3` tags from Docker Hub.
pub struct DockerHubFetcher {
    client: reqwest::Client,
    url: String,
}

impl DockerHubFetcher {
    pub fn new() -> Result<Self, TagError> {
        Self::with_url(DOCKER_HUB_TAGS_URL)
    }

    pub fn with_url(url: impl Into<String>) -> Result<Self, TagError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl TagFetcher for DockerHubFetcher {
    async fn fetch_tags(&self) -> Result<Vec<String>, TagError> {
        let mut tags = Vec::new();
        let mut next = Some(self.url.clone());

        for _ in 0..MAX_PAGES {
            let Some(url) = next.take() else { break };
            let response = self.client.get(&url).send().await?;
            if !response.status().is_success() {
                return Err(TagError::Status {
                    status: response.status().as_u16(),
                    url,
                });
            }
            let page: TagPage = response.json().await?;
            tags.extend(page.results.into_iter().map(|entry| entry.name));
            next = page.next;
        }

        Ok(tags)
    }
}

/// A fixed tag list, or a fixed failure. Used for tests and offline runs.
#[derive(Clone, Debug, Default)]
pub struct StaticTags {
    pub tags: Vec<String>,
    pub failure: Option<String>,
}

impl StaticTags {
    pub fn new<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tags: tags.into_iter().map(Into::into).collect(),
            failure: None,
        }
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            tags: Vec::new(),
            failure: Some(message.into()),
        }
    }
}

#[async_trait]
impl TagFetcher for StaticTags {
    async fn fetch_tags(&self) -> Result<Vec<String>, TagError> {
        match &self.failure {
            Some(message) => Err(TagError::Unavailable(message.clone())),
            None => Ok(self.tags.clone()),
        }
    }
}
