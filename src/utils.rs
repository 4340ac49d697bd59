//! Text, timestamp and filesystem helpers shared by the extractor and the
//! output writers.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;
use std::time::Duration;
use tokio::fs;
use tracing::{debug, instrument};

use crate::error::Result;
use crate::models::RecordTime;

/// Zoned layouts tried after RFC 3339 and RFC 2822.
const ZONED_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%z",
    "%Y-%m-%d %H:%M:%S %z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M%z",
    "%d %B %Y %H:%M %z",
    "%a, %d %b %Y %H:%M:%S %z",
];

const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%d %B %Y %H:%M",
    "%d %b %Y %H:%M",
    "%B %d, %Y %H:%M",
    "%b %d, %Y %H:%M",
    "%m/%d/%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%d %B %Y",
    "%d %b %Y",
    "%B %d, %Y",
    "%b %d, %Y",
    "%B %d %Y",
    "%b %d %Y",
    "%m/%d/%Y",
];

static ISO_LIKE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\d{4}-\d{2}-\d{2}(?:[T ]\d{2}:\d{2}(?::\d{2}(?:\.\d+)?)?(?:Z|[+-]\d{2}:?\d{2})?)?",
    )
    .unwrap()
});

static DAY_MONTH_YEAR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b\d{1,2}\s+(?:jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)[a-z]*\.?\s+\d{4}(?:,?\s+\d{1,2}:\d{2})?",
    )
    .unwrap()
});

static MONTH_DAY_YEAR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?:jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)[a-z]*\.?\s+\d{1,2},?\s+\d{4}(?:,?\s+\d{1,2}:\d{2})?",
    )
    .unwrap()
});

static TRAILING_TIME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r",\s*(?P<time>\d{1,2}:\d{2})$").unwrap());

/// Normalize a timestamp found on a page.
///
/// Tries strict layouts on the whole string first, then looks for a date-like
/// fragment inside it ("Published 1 March 2024, 10:00"). Anything that still
/// fails is returned verbatim as [`RecordTime::Raw`].
pub fn normalize_timestamp(raw: &str) -> RecordTime {
    let text = collapse_whitespace(raw);
    if let Some(parsed) = parse_exact(&text) {
        return parsed;
    }

    if let Some(parsed) = ISO_LIKE.find(&text).and_then(|m| parse_exact(m.as_str())) {
        debug!(raw = %truncate_for_log(raw, 80), "Normalized timestamp from fragment");
        return parsed;
    }
    for pattern in [&*DAY_MONTH_YEAR, &*MONTH_DAY_YEAR] {
        let Some(m) = pattern.find(&text) else { continue };
        let fragment = m.as_str().replace('.', "");
        let fragment = TRAILING_TIME.replace(&fragment, " $time");
        if let Some(parsed) = parse_exact(&collapse_whitespace(&fragment)) {
            debug!(raw = %truncate_for_log(raw, 80), "Normalized timestamp from fragment");
            return parsed;
        }
    }

    RecordTime::Raw(raw.trim().to_string())
}

fn parse_exact(text: &str) -> Option<RecordTime> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(RecordTime::Timestamp(dt));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(text) {
        return Some(RecordTime::Timestamp(dt));
    }
    // `%z` rejects a bare `Z`, as in `2024-03-01T10:00Z`
    let zoned = match text.strip_suffix(['Z', 'z']) {
        Some(local) => format!("{local}+00:00"),
        None => text.to_string(),
    };
    if let Some(dt) = ZONED_FORMATS
        .iter()
        .find_map(|f| DateTime::parse_from_str(&zoned, f).ok())
    {
        return Some(RecordTime::Timestamp(dt));
    }
    if let Some(dt) = NAIVE_DATETIME_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(text, f).ok())
    {
        return Some(RecordTime::Naive(dt));
    }
    DATE_FORMATS
        .iter()
        .find_map(|f| NaiveDate::parse_from_str(text, f).ok())
        .map(|d| RecordTime::Naive(d.and_time(NaiveTime::MIN)))
}

/// Trim and collapse internal runs of whitespace to a single space.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Convert operator-supplied seconds to a [`Duration`] without panicking.
///
/// Negative and NaN values become zero; values too large for a `Duration`
/// saturate at [`Duration::MAX`].
///
/// # Example
///
/// ```
/// use headline_scraper::utils::saturating_secs;
/// use std::time::Duration;
///
/// assert_eq!(saturating_secs(1.5), Duration::from_millis(1500));
/// assert_eq!(saturating_secs(1e30), Duration::MAX);
/// assert_eq!(saturating_secs(-2.0), Duration::ZERO);
/// ```
pub fn saturating_secs(secs: f64) -> Duration {
    if secs.is_nan() || secs <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
}

/// Truncate a string for logging purposes.
///
/// Long strings are cut to at most `max` bytes on a character boundary with
/// an ellipsis and byte count appended.
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…(+{} bytes)", &s[..end], s.len() - end)
}

/// Create the parent directory of `path` if it has one.
#[instrument(level = "debug", skip_all, fields(path = %path.display()))]
pub async fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await?;
        }
    }
    Ok(())
}
