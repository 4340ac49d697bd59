//! HTTP retrieval with bounded retries, exponential backoff and jitter.
//!
//! # Architecture
//!
//! - [`Transport`]: a single GET attempt; [`ReqwestTransport`] in production,
//!   scripted fakes in tests
//! - [`RetryPolicy`]: timeout, attempt budget and backoff parameters
//! - [`ResilientFetcher`]: wraps a transport with the retry loop
//!
//! # Retry Strategy
//!
//! Any non-success status or transport error is retryable. After the n-th
//! failed attempt the fetcher sleeps
//!
//! ```text
//! delay(n) = backoff_factor * 2^(n-1) + uniform(0, jitter)
//! ```
//!
//! before trying again, up to `max_retries` attempts in total. The jitter is
//! drawn from a caller-supplied RNG so runs can be made reproducible.

use rand::Rng;
use reqwest::header::HeaderMap;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, error, instrument, warn};

use crate::error::{Result, ScrapeError};
use crate::models::FetchOutcome;
use crate::utils::saturating_secs;

/// One HTTP GET attempt, no retries.
pub trait Transport {
    /// Fetch `url` and return the body. Non-2xx statuses are errors.
    async fn get(&self, url: &str, headers: &HeaderMap, timeout: Duration) -> Result<String>;
}

/// [`Transport`] backed by a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Build a client that sends `user_agent` by default.
    ///
    /// # Arguments
    ///
    /// * `user_agent` - default `User-Agent`; per-request headers still override it
    ///
    /// # Returns
    ///
    /// The transport, or [`ScrapeError::Http`] if the TLS backend cannot be
    /// initialized.
    pub fn new(user_agent: &str) -> Result<Self> {
        let client = reqwest::Client::builder().user_agent(user_agent).build()?;
        Ok(Self { client })
    }
}

impl Transport for ReqwestTransport {
    async fn get(&self, url: &str, headers: &HeaderMap, timeout: Duration) -> Result<String> {
        let response = self
            .client
            .get(url)
            .headers(headers.clone())
            .timeout(timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScrapeError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response.text().await?)
    }
}

/// Timeout and backoff parameters for [`ResilientFetcher`].
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Per-attempt request timeout.
    pub timeout: Duration,
    /// Total attempts, including the first.
    pub max_retries: u32,
    /// Seconds; base of the exponential backoff.
    pub backoff_factor: f64,
    /// Upper bound of the uniform random addition to each backoff.
    pub jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            max_retries: 3,
            backoff_factor: 1.0,
            jitter: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// 10 s timeout, 3 attempts, 1 s backoff factor, 500 ms jitter.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Total attempts. Zero means the fetcher gives up without trying.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Base of the exponential backoff, in seconds. Negative and NaN become 0.
    pub fn with_backoff_factor(mut self, backoff_factor: f64) -> Self {
        self.backoff_factor = if backoff_factor > 0.0 { backoff_factor } else { 0.0 };
        self
    }

    pub fn with_jitter(mut self, jitter: Duration) -> Self {
        self.jitter = jitter;
        self
    }

    /// Deterministic part of the sleep after a failure.
    ///
    /// # Arguments
    ///
    /// * `attempt` - 1-based number of the attempt that just failed
    ///
    /// # Returns
    ///
    /// `backoff_factor * 2^(attempt-1)`, saturating at [`Duration::MAX`].
    ///
    /// # Example
    ///
    /// ```
    /// use headline_scraper::RetryPolicy;
    /// use std::time::Duration;
    ///
    /// let policy = RetryPolicy::new().with_backoff_factor(0.5);
    /// assert_eq!(policy.base_delay(3), Duration::from_secs(2));
    /// ```
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(30) as i32;
        saturating_secs(self.backoff_factor * 2f64.powi(exponent))
    }

    /// Full sleep after the `attempt`-th failure: base delay plus jitter.
    pub fn backoff_delay<R: Rng>(&self, attempt: u32, rng: &mut R) -> Duration {
        self.base_delay(attempt)
            .saturating_add(random_up_to(self.jitter, rng))
    }
}

/// Uniform duration in `[0, max]`.
pub(crate) fn random_up_to<R: Rng>(max: Duration, rng: &mut R) -> Duration {
    if max.is_zero() {
        return Duration::ZERO;
    }
    saturating_secs(rng.random_range(0.0..=max.as_secs_f64())).min(max)
}

/// Retry wrapper around a [`Transport`].
#[derive(Debug, Clone)]
pub struct ResilientFetcher<T> {
    transport: T,
    policy: RetryPolicy,
}

impl<T: Transport> ResilientFetcher<T> {
    pub fn new(transport: T, policy: RetryPolicy) -> Self {
        Self { transport, policy }
    }

    /// Fetch `url`, retrying failures per the policy.
    ///
    /// # Arguments
    ///
    /// * `url` - absolute URL to GET
    /// * `headers` - sent with every attempt
    /// * `rng` - source of the backoff jitter
    ///
    /// # Returns
    ///
    /// The body of the first successful attempt, or
    /// [`ScrapeError::FetchExhausted`] once every attempt has failed. No sleep
    /// follows the last failed attempt.
    #[instrument(level = "info", skip(self, headers, rng), fields(max_retries = self.policy.max_retries))]
    pub async fn fetch<R: Rng>(&self, url: &str, headers: &HeaderMap, rng: &mut R) -> FetchOutcome {
        let total_t0 = Instant::now();
        let max = self.policy.max_retries;

        for attempt in 1..=max {
            let attempt_t0 = Instant::now();
            match self.transport.get(url, headers, self.policy.timeout).await {
                Ok(body) => {
                    debug!(attempt, bytes = body.len(), "Fetched");
                    return Ok(body);
                }
                Err(e) if attempt < max => {
                    let delay = self.policy.backoff_delay(attempt, rng);
                    warn!(
                        attempt,
                        max,
                        elapsed_ms_attempt = attempt_t0.elapsed().as_millis() as u64,
                        ?delay,
                        error = %e,
                        "fetch attempt failed; backing off"
                    );
                    sleep(delay).await;
                }
                Err(e) => {
                    error!(
                        attempt,
                        max,
                        elapsed_ms_total = total_t0.elapsed().as_millis() as u64,
                        error = %e,
                        "fetch exhausted retries"
                    );
                }
            }
        }

        Err(ScrapeError::FetchExhausted {
            url: url.to_string(),
            attempts: max,
        })
    }
}
