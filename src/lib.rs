//! # Headline Scraper
//!
//! Collects headline records from a small set of configured news sources.
//!
//! ## Pipeline
//!
//! For each requested source the [`orchestrator`] runs:
//! 1. **Policy**: the [`robots`] gate checks the start URL against robots.txt
//!    (unreachable robots.txt counts as allowed)
//! 2. **Politeness**: a fixed delay plus random jitter
//! 3. **Fetching**: [`fetch`] retries failures with exponential backoff
//! 4. **Extraction**: [`extract`] applies the source's rules, or generic
//!    heuristics when those match nothing
//! 5. **Filtering**: keyword match on titles, URL deduplication, source stamping
//!
//! Results are deduplicated by URL across sources and handed to [`outputs`]
//! for JSON or CSV serialization.
//!
//! No single source, page or node failure aborts a run.

pub mod cli;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod models;
pub mod orchestrator;
pub mod outputs;
pub mod registry;
pub mod robots;
pub mod utils;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{Result, ScrapeError};
pub use fetch::{ReqwestTransport, ResilientFetcher, RetryPolicy, Transport};
pub use models::{HeadlineRecord, RecordTime, ScrapeRequest, SourceConfig};
pub use orchestrator::{ScrapeOrchestrator, ScrapeReport, SourceOutcome};
pub use registry::SourceRegistry;
pub use robots::CrawlPolicyGate;
