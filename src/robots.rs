//! robots.txt enforcement.
//!
//! The gate fetches `<origin>/robots.txt` once per check, without retries.
//! When that document cannot be fetched or parsed the gate fails open and
//! reports the URL as allowed. [`CrawlPolicyGate::evaluate`] exposes the
//! underlying outcome for callers that want to fail closed instead.

use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use std::time::Duration;
use texting_robots::Robot;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::error::{Result, ScrapeError};
use crate::fetch::Transport;

#[derive(Debug, Clone)]
pub struct CrawlPolicyGate<T> {
    transport: T,
    timeout: Duration,
}

impl<T: Transport> CrawlPolicyGate<T> {
    pub fn new(transport: T, timeout: Duration) -> Self {
        Self { transport, timeout }
    }

    /// May `user_agent` fetch `url`? Fails open.
    #[instrument(level = "info", skip(self))]
    pub async fn is_allowed(&self, url: &str, user_agent: &str) -> bool {
        match self.evaluate(url, user_agent).await {
            Ok(allowed) => {
                debug!(allowed, "robots.txt evaluated");
                allowed
            }
            Err(e) => {
                warn!(error = %e, "robots.txt unavailable; treating as allowed");
                true
            }
        }
    }

    /// Like [`is_allowed`](Self::is_allowed), but reports a missing or
    /// unreadable robots.txt as [`ScrapeError::PolicyUnavailable`].
    pub async fn evaluate(&self, url: &str, user_agent: &str) -> Result<bool> {
        let target = Url::parse(url).map_err(|e| unavailable(url, e))?;
        let robots_url = robots_url(&target).map_err(|e| unavailable(url, e))?;

        let mut headers = HeaderMap::new();
        if let Ok(value) = HeaderValue::from_str(user_agent) {
            headers.insert(USER_AGENT, value);
        }
        let body = self
            .transport
            .get(robots_url.as_str(), &headers, self.timeout)
            .await
            .map_err(|e| unavailable(robots_url.as_str(), e))?;

        let robot = Robot::new(product_token(user_agent), body.as_bytes())
            .map_err(|e| unavailable(robots_url.as_str(), e))?;
        Ok(robot.allowed(&path_and_query(&target)))
    }
}

fn unavailable(url: &str, reason: impl ToString) -> ScrapeError {
    ScrapeError::PolicyUnavailable {
        url: url.to_string(),
        reason: reason.to_string(),
    }
}

/// `scheme://host[:port]/robots.txt` for the URL's origin.
pub fn robots_url(url: &Url) -> Result<Url> {
    if url.cannot_be_a_base() || url.host_str().is_none() {
        return Err(ScrapeError::Url(url::ParseError::EmptyHost));
    }
    let mut robots = url.clone();
    robots.set_path("/robots.txt");
    robots.set_query(None);
    robots.set_fragment(None);
    Ok(robots)
}

/// The name robots.txt groups are matched against: `"bot/1.0"` → `"bot"`.
pub fn product_token(user_agent: &str) -> &str {
    let token = user_agent.split('/').next().unwrap_or("").trim();
    if token.is_empty() { "*" } else { token }
}

fn path_and_query(url: &Url) -> String {
    match url.query() {
        Some(q) => format!("{}?{}", url.path(), q),
        None => url.path().to_string(),
    }
}
