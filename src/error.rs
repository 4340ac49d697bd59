//! Error taxonomy for the scraping pipeline.
//!
//! None of the core variants abort a run. Each call site decides how to
//! degrade: the policy gate fails open on [`ScrapeError::PolicyUnavailable`],
//! the orchestrator skips a source on [`ScrapeError::FetchExhausted`],
//! [`ScrapeError::Disallowed`] or [`ScrapeError::UnknownSourceKey`], and the
//! extractor drops a single node on [`ScrapeError::ExtractionNode`].

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScrapeError {
    #[error("robots.txt unavailable for {url}: {reason}")]
    PolicyUnavailable { url: String, reason: String },

    #[error("crawling disallowed by robots.txt: {0}")]
    Disallowed(String),

    #[error("failed to fetch {url} after {attempts} attempts")]
    FetchExhausted { url: String, attempts: u32 },

    #[error("skipped node: {0}")]
    ExtractionNode(String),

    #[error("unknown source key: {0}")]
    UnknownSourceKey(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected status {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("invalid selector `{selector}`: {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("invalid source registry: {0}")]
    Registry(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, ScrapeError>;
