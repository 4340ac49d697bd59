//! Command-line interface for the headline scraper.
//!
//! Every option can also be supplied through an environment variable.

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use crate::fetch::RetryPolicy;
use crate::models::{DEFAULT_USER_AGENT, ScrapeRequest};
use crate::outputs::OutputFormat;
use crate::registry::SourceRegistry;
use crate::utils::saturating_secs;

/// Command-line arguments.
///
/// # Examples
///
/// ```sh
/// # All built-in sources to headlines.json
/// headline_scraper
///
/// # Guardian only, CSV, headlines mentioning "election"
/// headline_scraper -s guardian -f csv -o out/election.csv -k election
///
/// # Custom sources
/// headline_scraper --registry sources.yaml -s local
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Comma-separated source keys (default: every registered source)
    #[arg(short, long, env = "HEADLINES_SOURCES", value_delimiter = ',')]
    pub sources: Vec<String>,

    /// Output format
    #[arg(short, long, value_enum, env = "HEADLINES_FORMAT", default_value_t = OutputFormat::Json)]
    pub format: OutputFormat,

    /// Output file
    #[arg(short, long, env = "HEADLINES_OUTPUT", default_value = "headlines.json")]
    pub output: PathBuf,

    /// Keep only headlines whose title contains this keyword (case-insensitive)
    #[arg(short, long, env = "HEADLINES_KEYWORD")]
    pub keyword: Option<String>,

    /// Politeness delay before each source fetch, in seconds
    #[arg(long, env = "HEADLINES_DELAY", default_value_t = 2.0, value_parser = non_negative_secs)]
    pub delay: f64,

    /// Upper bound of the random delay added to --delay, in seconds
    #[arg(long, env = "HEADLINES_JITTER", default_value_t = 1.0, value_parser = non_negative_secs)]
    pub jitter: f64,

    /// User agent sent with requests and matched against robots.txt
    #[arg(long, env = "HEADLINES_USER_AGENT", default_value = DEFAULT_USER_AGENT)]
    pub user_agent: String,

    /// Per-request timeout, in seconds
    #[arg(long, env = "HEADLINES_TIMEOUT", default_value_t = 10.0, value_parser = non_negative_secs)]
    pub timeout: f64,

    /// Attempts per page before giving up on a source
    #[arg(long, env = "HEADLINES_MAX_RETRIES", default_value_t = 3)]
    pub max_retries: u32,

    /// Base of the exponential retry backoff, in seconds
    #[arg(long, env = "HEADLINES_BACKOFF_FACTOR", default_value_t = 1.0, value_parser = non_negative_secs)]
    pub backoff_factor: f64,

    /// YAML file replacing the built-in source registry
    #[arg(long, env = "HEADLINES_REGISTRY")]
    pub registry: Option<PathBuf>,

    /// Seed for the delay/backoff jitter, for reproducible runs
    #[arg(long, env = "HEADLINES_SEED")]
    pub seed: Option<u64>,
}

fn non_negative_secs(s: &str) -> Result<f64, String> {
    let v: f64 = s.parse().map_err(|e| format!("{e}"))?;
    if v.is_finite() && v >= 0.0 {
        Ok(v)
    } else {
        Err(format!("expected a non-negative number of seconds, got {s}"))
    }
}

impl Cli {
    /// Build the run request. With no `--sources`, every registry key is used.
    ///
    /// Second counts too large for a [`Duration`] saturate instead of failing.
    pub fn to_request(&self, registry: &SourceRegistry) -> ScrapeRequest {
        let sources: Vec<String> = self
            .sources
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        let sources = if sources.is_empty() {
            registry.keys().map(str::to_string).collect()
        } else {
            sources
        };

        let retry = RetryPolicy::new()
            .with_timeout(saturating_secs(self.timeout))
            .with_max_retries(self.max_retries)
            .with_backoff_factor(self.backoff_factor);

        let mut request = ScrapeRequest::new(sources)
            .with_politeness(
                saturating_secs(self.delay),
                saturating_secs(self.jitter),
            )
            .with_user_agent(self.user_agent.clone())
            .with_retry(retry);
        if let Some(keyword) = &self.keyword {
            request = request.with_keyword(keyword.clone());
        }
        request
    }
}
