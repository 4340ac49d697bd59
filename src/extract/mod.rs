//! Headline extraction from parsed HTML.
//!
//! Extraction runs an ordered list of [`ExtractionStrategy`]s against a
//! document; the first strategy that yields at least one record wins.
//!
//! | Strategy | Module | Records carry |
//! |----------|--------|---------------|
//! | `Targeted` | [`targeted`] | title, URL, optional time |
//! | `Generic` | [`generic`] | title, URL |
//!
//! The targeted strategy follows a source's own [`ExtractionRules`]. The
//! generic strategy is a set of broad structural heuristics used when a site
//! changed its markup and the targeted rules stop matching. It is noisier, but
//! some headlines beat none.

pub mod generic;
pub mod targeted;

use scraper::{ElementRef, Html};
use tracing::{debug, instrument};
use url::Url;

use crate::error::{Result, ScrapeError};
use crate::models::{ExtractionRules, HeadlineRecord, SourceConfig};
use crate::utils::collapse_whitespace;

/// One way of turning a document into headline records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionStrategy {
    Targeted(ExtractionRules),
    Generic,
}

impl ExtractionStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            ExtractionStrategy::Targeted(_) => "targeted",
            ExtractionStrategy::Generic => "generic",
        }
    }

    pub fn apply(&self, document: &Html, base: &Url) -> Vec<HeadlineRecord> {
        match self {
            ExtractionStrategy::Targeted(rules) => targeted::extract(document, rules, base),
            ExtractionStrategy::Generic => generic::extract(document, base),
        }
    }
}

/// Strategies for `source`, in the order they are tried.
pub fn strategies_for(source: &SourceConfig) -> Vec<ExtractionStrategy> {
    vec![
        ExtractionStrategy::Targeted(source.rules.clone()),
        ExtractionStrategy::Generic,
    ]
}

/// Extract headline records from `document` using `source`'s rules, falling
/// back to the generic heuristics when the rules match nothing.
///
/// Returned records have no `source` set yet.
#[instrument(level = "debug", skip_all, fields(base = %source.base_url))]
pub fn extract(document: &Html, source: &SourceConfig) -> Vec<HeadlineRecord> {
    run_strategies(document, &source.base_url, &strategies_for(source))
}

/// Parse `html` and [`extract`] from it.
pub fn extract_html(html: &str, source: &SourceConfig) -> Vec<HeadlineRecord> {
    let document = Html::parse_document(html);
    extract(&document, source)
}

/// First non-empty result wins; when every strategy comes up empty the
/// (empty) result of the last one is returned.
pub fn run_strategies(
    document: &Html,
    base: &Url,
    strategies: &[ExtractionStrategy],
) -> Vec<HeadlineRecord> {
    let mut records = Vec::new();
    for strategy in strategies {
        records = strategy.apply(document, base);
        debug!(strategy = strategy.name(), count = records.len(), "Applied extraction strategy");
        if !records.is_empty() {
            break;
        }
    }
    records
}

/// Resolve `href` against `base`, accepting only http(s) results.
pub(crate) fn resolve_link(base: &Url, href: &str) -> Result<String> {
    let resolved = base.join(href.trim())?;
    match resolved.scheme() {
        "http" | "https" => Ok(resolved.to_string()),
        other => Err(ScrapeError::ExtractionNode(format!(
            "unsupported link scheme `{other}` in {href}"
        ))),
    }
}

/// All text below `element`, whitespace collapsed.
pub(crate) fn element_text(element: &ElementRef<'_>) -> String {
    collapse_whitespace(&element.text().collect::<Vec<_>>().join(" "))
}

/// Attribute value, ignoring empty or whitespace-only values.
pub(crate) fn non_empty_attr<'a>(element: &ElementRef<'a>, attr: &str) -> Option<&'a str> {
    element.value().attr(attr).filter(|v| !v.trim().is_empty())
}
