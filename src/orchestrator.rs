//! Per-source scraping pipeline and cross-source aggregation.
//!
//! For every requested source key, in order:
//!
//! 1. look the key up in the [`SourceRegistry`] (unknown keys are skipped)
//! 2. ask the [`CrawlPolicyGate`] whether the start URL may be fetched
//! 3. sleep `delay + uniform(0, jitter)`
//! 4. fetch the start URL through the [`ResilientFetcher`]
//! 5. extract records, keep keyword matches, drop repeated URLs, stamp the source key
//!
//! A failure in any step only skips that source. After the last source the
//! accumulated records are deduplicated by URL across sources, first
//! occurrence wins.
//!
//! Sources are processed strictly one after another; the politeness delay is
//! what paces requests.

use itertools::Itertools;
use rand::SeedableRng;
use rand::rngs::StdRng;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use std::time::Instant;
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};

use crate::error::{Result, ScrapeError};
use crate::extract;
use crate::fetch::{ResilientFetcher, Transport, random_up_to};
use crate::models::{HeadlineRecord, ScrapeRequest};
use crate::registry::SourceRegistry;
use crate::robots::CrawlPolicyGate;

/// What happened to one requested source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceOutcome {
    /// Fetched and extracted; `kept` survived keyword filter and per-source dedup.
    Scraped { extracted: usize, kept: usize },
    UnknownKey,
    Disallowed,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceReport {
    pub key: String,
    pub outcome: SourceOutcome,
}

/// Records of a run plus the per-source outcomes that produced them.
#[derive(Debug, Clone, Default)]
pub struct ScrapeReport {
    pub records: Vec<HeadlineRecord>,
    pub sources: Vec<SourceReport>,
}

impl ScrapeReport {
    pub fn outcome(&self, key: &str) -> Option<&SourceOutcome> {
        self.sources.iter().find(|s| s.key == key).map(|s| &s.outcome)
    }
}

pub struct ScrapeOrchestrator<T> {
    registry: SourceRegistry,
    transport: T,
    rng: StdRng,
}

impl<T: Transport + Clone> ScrapeOrchestrator<T> {
    pub fn new(registry: SourceRegistry, transport: T) -> Self {
        Self::with_rng(registry, transport, StdRng::from_os_rng())
    }

    /// Use a fixed seed so politeness and backoff jitter are reproducible.
    pub fn with_seed(registry: SourceRegistry, transport: T, seed: u64) -> Self {
        Self::with_rng(registry, transport, StdRng::seed_from_u64(seed))
    }

    pub fn with_rng(registry: SourceRegistry, transport: T, rng: StdRng) -> Self {
        Self {
            registry,
            transport,
            rng,
        }
    }

    /// Sources this orchestrator can scrape.
    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    /// Scrape every requested source and return the globally deduplicated records.
    pub async fn run(&mut self, request: &ScrapeRequest) -> Vec<HeadlineRecord> {
        self.run_with_report(request).await.records
    }

    /// Like [`run`](Self::run), also reporting what happened to each source.
    #[instrument(level = "info", skip_all, fields(sources = request.sources.len()))]
    pub async fn run_with_report(&mut self, request: &ScrapeRequest) -> ScrapeReport {
        let started = Instant::now();
        let mut report = ScrapeReport::default();
        let mut accumulated = Vec::new();

        for key in &request.sources {
            let outcome = match self.scrape_source(key, request).await {
                Ok((extracted, records)) => {
                    info!(source = %key, extracted, kept = records.len(), "Source scraped");
                    let outcome = SourceOutcome::Scraped {
                        extracted,
                        kept: records.len(),
                    };
                    accumulated.extend(records);
                    outcome
                }
                Err(ScrapeError::UnknownSourceKey(_)) => {
                    debug!(source = %key, "Unknown source key; skipped");
                    SourceOutcome::UnknownKey
                }
                Err(ScrapeError::Disallowed(url)) => {
                    info!(source = %key, %url, "Disallowed by robots.txt; skipped");
                    SourceOutcome::Disallowed
                }
                Err(e) => {
                    warn!(source = %key, error = %e, "Source failed; skipped");
                    SourceOutcome::Failed(e.to_string())
                }
            };
            report.sources.push(SourceReport {
                key: key.clone(),
                outcome,
            });
        }

        let before = accumulated.len();
        report.records = dedup_by_url(accumulated);
        info!(
            total = report.records.len(),
            cross_source_duplicates = before - report.records.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Scrape run complete"
        );
        report
    }

    /// Run the pipeline for a single source key.
    ///
    /// Returns the number of records extracted and the filtered, stamped
    /// records that survive.
    #[instrument(level = "info", skip(self, request))]
    pub async fn scrape_source(
        &mut self,
        key: &str,
        request: &ScrapeRequest,
    ) -> Result<(usize, Vec<HeadlineRecord>)> {
        let source = self
            .registry
            .get(key)
            .ok_or_else(|| ScrapeError::UnknownSourceKey(key.to_string()))?;
        let start_url = source.start_url.as_str();

        let gate = CrawlPolicyGate::new(self.transport.clone(), request.retry.timeout);
        if !gate.is_allowed(start_url, &request.user_agent).await {
            return Err(ScrapeError::Disallowed(start_url.to_string()));
        }

        let pause = request
            .delay
            .saturating_add(random_up_to(request.jitter, &mut self.rng));
        debug!(?pause, "Politeness delay");
        sleep(pause).await;

        let fetcher = ResilientFetcher::new(self.transport.clone(), request.retry.clone());
        let body = fetcher
            .fetch(start_url, &request_headers(&request.user_agent), &mut self.rng)
            .await?;

        let extracted = extract::extract_html(&body, source);
        let count = extracted.len();
        Ok((count, finalize_source(extracted, key, request.keyword.as_deref())))
    }
}

fn request_headers(user_agent: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    match HeaderValue::from_str(user_agent) {
        Ok(value) => {
            headers.insert(USER_AGENT, value);
        }
        Err(e) => warn!(error = %e, "User agent is not a valid header value; using client default"),
    }
    headers
}

/// Keyword filter, then per-source dedup, then source stamping.
pub fn finalize_source(
    records: Vec<HeadlineRecord>,
    key: &str,
    keyword: Option<&str>,
) -> Vec<HeadlineRecord> {
    let filtered = filter_by_keyword(records, keyword);
    dedup_by_url(filtered)
        .into_iter()
        .map(|mut record| {
            record.source = Some(key.to_string());
            record
        })
        .collect()
}

/// Keep records whose title contains `keyword`, ignoring case. `None` keeps all.
pub fn filter_by_keyword(records: Vec<HeadlineRecord>, keyword: Option<&str>) -> Vec<HeadlineRecord> {
    match keyword {
        Some(k) if !k.is_empty() => records.into_iter().filter(|r| r.title_matches(k)).collect(),
        _ => records,
    }
}

/// Drop records whose URL was already seen, preserving encounter order.
pub fn dedup_by_url(records: Vec<HeadlineRecord>) -> Vec<HeadlineRecord> {
    records
        .into_iter()
        .filter(|r| !r.url.is_empty())
        .unique_by(|r| r.url.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::RetryPolicy;
    use crate::models::{ExtractionRules, SourceConfig};
    use crate::testing::ScriptedTransport;
    use std::collections::HashSet;
    use std::time::Duration;

    const ALPHA_FRONT: &str = "https://alpha.example.com/news";
    const ALPHA_ROBOTS: &str = "https://alpha.example.com/robots.txt";
    const BETA_FRONT: &str = "https://beta.example.org/front";
    const BETA_ROBOTS: &str = "https://beta.example.org/robots.txt";

    fn rules() -> ExtractionRules {
        ExtractionRules {
            item_selector: "a.promo".to_string(),
            title_selector: None,
            link_attr: "href".to_string(),
            time_selector: Some("time".to_string()),
        }
    }

    fn registry() -> SourceRegistry {
        let mut registry = SourceRegistry::new();
        registry.insert(
            "alpha",
            SourceConfig::new(ALPHA_FRONT, "https://alpha.example.com", rules()).unwrap(),
        );
        registry.insert(
            "beta",
            SourceConfig::new(BETA_FRONT, "https://beta.example.org", rules()).unwrap(),
        );
        registry
    }

    fn request(sources: &[&str]) -> ScrapeRequest {
        ScrapeRequest::new(sources.iter().copied())
            .with_politeness(Duration::ZERO, Duration::ZERO)
            .with_retry(
                RetryPolicy::new()
                    .with_backoff_factor(0.0)
                    .with_jitter(Duration::ZERO),
            )
    }

    fn orchestrator(transport: &ScriptedTransport) -> ScrapeOrchestrator<ScriptedTransport> {
        ScrapeOrchestrator::with_seed(registry(), transport.clone(), 7)
    }

    const ALPHA_PAGE: &str = r#"
        <a class="promo" href="/world/1">World news one<time datetime="2024-03-01T10:00:00Z"></time></a>
        <a class="promo" href="/world/1">World news one (again)</a>
        <a class="promo" href="https://shared.example.net/story">Shared Story</a>
        <a class="promo" href="/sport/2">Sport <time>not-a-date</time></a>
    "#;

    const BETA_PAGE: &str = r#"
        <a class="promo" href="https://shared.example.net/story">Shared story from beta</a>
        <a class="promo" href="/tech/3">Tech news</a>
    "#;

    fn serve_both(transport: &ScriptedTransport) {
        transport.serve(ALPHA_FRONT, ALPHA_PAGE);
        transport.serve(BETA_FRONT, BETA_PAGE);
    }

    #[tokio::test]
    async fn test_run_dedups_and_stamps() {
        let transport = ScriptedTransport::new();
        serve_both(&transport);
        let records = orchestrator(&transport).run(&request(&["alpha", "beta"])).await;

        let urls: Vec<_> = records.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://alpha.example.com/world/1",
                "https://shared.example.net/story",
                "https://alpha.example.com/sport/2",
                "https://beta.example.org/tech/3",
            ]
        );
        let unique: HashSet<_> = urls.iter().collect();
        assert_eq!(unique.len(), urls.len());

        let shared = records.iter().find(|r| r.url.contains("shared")).unwrap();
        assert_eq!(shared.source.as_deref(), Some("alpha"));
        assert_eq!(shared.title, "Shared Story");

        assert!(records.iter().all(|r| r.url.starts_with("https://")));
        assert!(records.iter().all(|r| registry().contains(r.source.as_deref().unwrap())));
    }

    #[tokio::test]
    async fn test_time_degrades_without_dropping_record() {
        let transport = ScriptedTransport::new();
        serve_both(&transport);
        let records = orchestrator(&transport).run(&request(&["alpha"])).await;

        let first = &records[0];
        assert_eq!(first.time.as_ref().unwrap().to_string(), "2024-03-01T10:00:00Z");
        let sport = records.iter().find(|r| r.url.ends_with("/sport/2")).unwrap();
        assert_eq!(sport.time.as_ref().unwrap().to_string(), "not-a-date");
    }

    #[tokio::test]
    async fn test_disallowed_source_contributes_nothing() {
        let transport = ScriptedTransport::new();
        serve_both(&transport);
        transport.serve(ALPHA_ROBOTS, "User-agent: *\nDisallow: /\n");
        let mut orch = orchestrator(&transport);

        let report = orch.run_with_report(&request(&["alpha", "beta"])).await;

        assert_eq!(report.outcome("alpha"), Some(&SourceOutcome::Disallowed));
        assert!(report.records.iter().all(|r| r.source.as_deref() == Some("beta")));
        assert_eq!(report.records.len(), 2);
        assert_eq!(transport.calls(ALPHA_FRONT), 0);
        assert_eq!(transport.calls(BETA_ROBOTS), 1);
    }

    #[tokio::test]
    async fn test_unknown_keys_skipped() {
        let transport = ScriptedTransport::new();
        serve_both(&transport);
        let report = orchestrator(&transport)
            .run_with_report(&request(&["nope", "beta"]))
            .await;

        assert_eq!(report.outcome("nope"), Some(&SourceOutcome::UnknownKey));
        assert_eq!(report.records.len(), 2);
    }

    #[tokio::test]
    async fn test_fetch_failure_skips_only_that_source() {
        let transport = ScriptedTransport::new();
        transport.fail_always(ALPHA_FRONT);
        transport.serve(BETA_FRONT, BETA_PAGE);
        let report = orchestrator(&transport)
            .run_with_report(&request(&["alpha", "beta"]))
            .await;

        assert!(matches!(report.outcome("alpha"), Some(SourceOutcome::Failed(_))));
        assert_eq!(transport.calls(ALPHA_FRONT), 3);
        assert_eq!(report.records.len(), 2);
        assert_eq!(report.records[0].source.as_deref(), Some("beta"));
    }

    #[tokio::test]
    async fn test_transient_failures_match_immediate_success() {
        let flaky = ScriptedTransport::new();
        flaky.fail_then_serve(ALPHA_FRONT, 2, ALPHA_PAGE);
        let steady = ScriptedTransport::new();
        steady.serve(ALPHA_FRONT, ALPHA_PAGE);

        let from_flaky = orchestrator(&flaky).run(&request(&["alpha"])).await;
        let from_steady = orchestrator(&steady).run(&request(&["alpha"])).await;

        assert_eq!(flaky.calls(ALPHA_FRONT), 3);
        assert_eq!(from_flaky, from_steady);
        assert!(!from_flaky.is_empty());
    }

    #[tokio::test]
    async fn test_keyword_filters_on_title_only() {
        let transport = ScriptedTransport::new();
        serve_both(&transport);
        // "world" appears in alpha URLs too; only titles count
        let records = orchestrator(&transport)
            .run(&request(&["alpha", "beta"]).with_keyword("SHARED"))
            .await;

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].title, "Shared Story");

        let none = orchestrator(&transport)
            .run(&request(&["alpha"]).with_keyword("example"))
            .await;
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_sends_user_agent() {
        let transport = ScriptedTransport::new();
        serve_both(&transport);
        orchestrator(&transport)
            .run(&request(&["beta"]).with_user_agent("test-agent/2.0"))
            .await;

        let agents = transport.user_agents();
        assert!(!agents.is_empty());
        assert!(agents.iter().all(|a| a == "test-agent/2.0"));
    }

    fn polite_request(sources: &[&str], delay: Duration, jitter: Duration) -> ScrapeRequest {
        request(sources).with_politeness(delay, jitter)
    }

    async fn timed_run(seed: u64, request: &ScrapeRequest) -> Duration {
        let transport = ScriptedTransport::new();
        serve_both(&transport);
        let mut orch = ScrapeOrchestrator::with_seed(registry(), transport, seed);
        let started = tokio::time::Instant::now();
        let records = orch.run(request).await;
        assert!(!records.is_empty());
        started.elapsed()
    }

    #[tokio::test(start_paused = true)]
    async fn test_politeness_delay_within_bounds() {
        let delay = Duration::from_secs(2);
        let jitter = Duration::from_secs(1);
        let slack = Duration::from_millis(10);

        let one = timed_run(7, &polite_request(&["alpha"], delay, jitter)).await;
        assert!(one >= delay, "{one:?}");
        assert!(one <= delay + jitter + slack, "{one:?}");

        let two = timed_run(7, &polite_request(&["alpha", "beta"], delay, jitter)).await;
        assert!(two >= delay * 2, "{two:?}");
        assert!(two <= (delay + jitter) * 2 + slack, "{two:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_seeded_politeness_is_reproducible() {
        let req = polite_request(&["alpha", "beta"], Duration::from_secs(1), Duration::from_secs(5));
        let a = timed_run(42, &req).await;
        let b = timed_run(42, &req).await;
        assert_eq!(a, b);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_and_disallowed_sources_do_not_sleep() {
        let transport = ScriptedTransport::new();
        serve_both(&transport);
        transport.serve(ALPHA_ROBOTS, "User-agent: *\nDisallow: /\n");
        let mut orch = orchestrator(&transport);

        let started = tokio::time::Instant::now();
        orch.run(&polite_request(&["nope", "alpha"], Duration::from_secs(30), Duration::ZERO))
            .await;
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_huge_politeness_delay_does_not_panic() {
        let transport = ScriptedTransport::new();
        serve_both(&transport);
        let report = orchestrator(&transport)
            .run_with_report(&polite_request(&["beta"], Duration::MAX, Duration::from_secs(1)))
            .await;

        assert!(matches!(report.outcome("beta"), Some(SourceOutcome::Scraped { .. })));
    }

    #[test]
    fn test_finalize_source_order_of_operations() {
        let records = vec![
            HeadlineRecord::new("Rates rise", "https://x.example/1", None),
            HeadlineRecord::new("RATES rise again", "https://x.example/1", None),
            HeadlineRecord::new("Weather", "https://x.example/2", None),
            HeadlineRecord::new("Rates fall", "https://x.example/3", None),
        ];
        let kept = finalize_source(records, "x", Some("rates"));
        let titles: Vec<_> = kept.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["Rates rise", "Rates fall"]);
        assert!(kept.iter().all(|r| r.source.as_deref() == Some("x")));
    }

    #[test]
    fn test_dedup_first_wins() {
        let mut a = HeadlineRecord::new("A", "https://x.example/same", None);
        a.source = Some("first".into());
        let mut b = HeadlineRecord::new("B", "https://x.example/same", None);
        b.source = Some("second".into());
        let out = dedup_by_url(vec![a, b]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].source.as_deref(), Some("first"));
    }
}
