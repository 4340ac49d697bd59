//! Data models for sources, extracted headlines and run requests.
//!
//! - [`SourceConfig`]: one crawl target and its extraction rules
//! - [`HeadlineRecord`]: a single extracted headline
//! - [`RecordTime`]: a normalized timestamp, or the raw text when normalization failed
//! - [`ScrapeRequest`]: the read-only input of one orchestrator run

use chrono::{DateTime, FixedOffset, NaiveDateTime, SecondsFormat};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::time::Duration;
use url::Url;

use crate::error::ScrapeError;
use crate::fetch::RetryPolicy;

/// Default user agent sent with every request and matched against robots.txt.
pub const DEFAULT_USER_AGENT: &str = "headline-scraper/1.0";

/// CSS rules describing where headlines live in a source's markup.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ExtractionRules {
    /// Selector matching one item container per headline.
    #[serde(rename = "article_selector")]
    pub item_selector: String,
    /// Optional selector, relative to the container, for the title element.
    #[serde(default)]
    pub title_selector: Option<String>,
    /// Attribute holding the link, read from the container or a descendant anchor.
    #[serde(rename = "url_attr", default = "default_link_attr")]
    pub link_attr: String,
    /// Optional selector, relative to the container, for a time element.
    #[serde(default)]
    pub time_selector: Option<String>,
}

fn default_link_attr() -> String {
    "href".to_string()
}

/// One crawl target.
///
/// Relative links found on `start_url` are resolved against `base_url`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SourceConfig {
    #[serde(rename = "url")]
    pub start_url: Url,
    #[serde(rename = "base")]
    pub base_url: Url,
    #[serde(flatten)]
    pub rules: ExtractionRules,
}

impl SourceConfig {
    /// Build a config from string URLs, as used for the built-in sources.
    pub fn new(start_url: &str, base_url: &str, rules: ExtractionRules) -> Result<Self, ScrapeError> {
        Ok(Self {
            start_url: Url::parse(start_url)?,
            base_url: Url::parse(base_url)?,
            rules,
        })
    }
}

/// Timestamp attached to a headline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordTime {
    /// Parsed with an explicit UTC offset.
    Timestamp(DateTime<FixedOffset>),
    /// Parsed, but the source gave no zone information.
    Naive(NaiveDateTime),
    /// Normalization failed; the text as it appeared on the page.
    Raw(String),
}

impl RecordTime {
    /// `false` only for [`RecordTime::Raw`].
    pub fn is_normalized(&self) -> bool {
        !matches!(self, RecordTime::Raw(_))
    }
}

impl fmt::Display for RecordTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordTime::Timestamp(dt) => f.write_str(&dt.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            RecordTime::Naive(dt) => write!(f, "{}", dt.format("%Y-%m-%dT%H:%M:%S%.f")),
            RecordTime::Raw(raw) => f.write_str(raw),
        }
    }
}

impl Serialize for RecordTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A single extracted headline.
///
/// `source` stays `None` until the orchestrator stamps the owning source key;
/// every record that leaves a run carries one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeadlineRecord {
    pub title: String,
    /// Absolute URL; the deduplication key.
    pub url: String,
    pub time: Option<RecordTime>,
    pub source: Option<String>,
}

impl HeadlineRecord {
    /// Unstamped record; `source` is `None`.
    pub fn new(title: impl Into<String>, url: impl Into<String>, time: Option<RecordTime>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            time,
            source: None,
        }
    }

    /// Case-insensitive substring match against the title only.
    pub fn title_matches(&self, keyword: &str) -> bool {
        self.title.to_lowercase().contains(&keyword.to_lowercase())
    }
}

/// Result of fetching one URL: the document body, or the terminal failure.
pub type FetchOutcome = Result<String, ScrapeError>;

/// Input of one orchestrator run.
#[derive(Debug, Clone)]
pub struct ScrapeRequest {
    /// Source keys in processing order.
    pub sources: Vec<String>,
    /// Keep only records whose title contains this (case-insensitive).
    pub keyword: Option<String>,
    /// Fixed politeness delay before each source fetch.
    pub delay: Duration,
    /// Upper bound of the random addition to `delay`.
    pub jitter: Duration,
    pub user_agent: String,
    pub retry: RetryPolicy,
}

impl Default for ScrapeRequest {
    fn default() -> Self {
        Self {
            sources: Vec::new(),
            keyword: None,
            delay: Duration::from_secs(2),
            jitter: Duration::from_secs(1),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            retry: RetryPolicy::default(),
        }
    }
}

impl ScrapeRequest {
    /// Request for `sources` with default politeness, user agent and retries.
    ///
    /// # Arguments
    ///
    /// * `sources` - source keys, processed in the given order
    ///
    /// # Example
    ///
    /// ```
    /// use headline_scraper::ScrapeRequest;
    /// use std::time::Duration;
    ///
    /// let request = ScrapeRequest::new(["bbc", "guardian"])
    ///     .with_keyword("election")
    ///     .with_politeness(Duration::from_secs(1), Duration::ZERO);
    /// assert_eq!(request.sources, vec!["bbc", "guardian"]);
    /// assert_eq!(request.keyword.as_deref(), Some("election"));
    /// ```
    pub fn new<I, S>(sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            sources: sources.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Title filter. An empty keyword clears the filter.
    pub fn with_keyword(mut self, keyword: impl Into<String>) -> Self {
        let keyword = keyword.into();
        self.keyword = if keyword.is_empty() { None } else { Some(keyword) };
        self
    }

    /// Each source waits `delay` plus a uniform draw from `[0, jitter]`
    /// before its page is fetched.
    pub fn with_politeness(mut self, delay: Duration, jitter: Duration) -> Self {
        self.delay = delay;
        self.jitter = jitter;
        self
    }

    /// Sent as `User-Agent` and matched against robots.txt groups.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Retry policy for page fetches; its timeout also bounds the robots.txt fetch.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}
