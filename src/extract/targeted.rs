//! Extraction driven by a source's own [`ExtractionRules`].
//!
//! Each item container is processed in isolation: a container without a link
//! is skipped, and a container whose link or fields cannot be derived is
//! logged and dropped without affecting its siblings. An unparseable
//! timestamp only degrades the `time` field to its raw text.

use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};
use url::Url;

use super::{element_text, non_empty_attr, resolve_link};
use crate::error::Result;
use crate::models::{ExtractionRules, HeadlineRecord, RecordTime};
use crate::registry::compile_selector;
use crate::utils::{normalize_timestamp, truncate_for_log};

struct CompiledRules<'r> {
    item: Selector,
    title: Option<Selector>,
    time: Option<Selector>,
    anchor: Selector,
    link_attr: &'r str,
}

impl<'r> CompiledRules<'r> {
    fn compile(rules: &'r ExtractionRules) -> Result<Self> {
        Ok(Self {
            item: compile_selector(&rules.item_selector)?,
            title: rules.title_selector.as_deref().map(compile_selector).transpose()?,
            time: rules.time_selector.as_deref().map(compile_selector).transpose()?,
            anchor: compile_selector("a")?,
            link_attr: &rules.link_attr,
        })
    }
}

pub fn extract(document: &Html, rules: &ExtractionRules, base: &Url) -> Vec<HeadlineRecord> {
    let compiled = match CompiledRules::compile(rules) {
        Ok(c) => c,
        Err(e) => {
            warn!(error = %e, "Extraction rules do not compile; targeted extraction yields nothing");
            return Vec::new();
        }
    };

    let mut records = Vec::new();
    for (index, node) in document.select(&compiled.item).enumerate() {
        match extract_node(&node, &compiled, base) {
            Ok(Some(record)) => records.push(record),
            Ok(None) => debug!(index, "Item has no link; skipped"),
            Err(e) => warn!(
                index,
                error = %e,
                node = %truncate_for_log(&node.html(), 200),
                "Item could not be extracted; skipped"
            ),
        }
    }
    records
}

fn extract_node(
    node: &ElementRef<'_>,
    rules: &CompiledRules<'_>,
    base: &Url,
) -> Result<Option<HeadlineRecord>> {
    let Some(href) = link_for(node, rules) else {
        return Ok(None);
    };
    let url = resolve_link(base, href)?;

    let title = rules
        .title
        .as_ref()
        .and_then(|sel| node.select(sel).next())
        .map(|el| element_text(&el))
        .unwrap_or_else(|| element_text(node));

    let time = rules.time.as_ref().and_then(|sel| time_for(node, sel));

    Ok(Some(HeadlineRecord::new(title, url, time)))
}

/// The container's own link attribute, else the first descendant anchor's.
fn link_for<'a>(node: &ElementRef<'a>, rules: &CompiledRules<'_>) -> Option<&'a str> {
    non_empty_attr(node, rules.link_attr).or_else(|| {
        let anchor = node.select(&rules.anchor).next()?;
        non_empty_attr(&anchor, rules.link_attr).or_else(|| non_empty_attr(&anchor, "href"))
    })
}

/// Machine-readable `datetime` first, visible text second.
fn time_for(node: &ElementRef<'_>, selector: &Selector) -> Option<RecordTime> {
    let el = node.select(selector).next()?;
    let raw = non_empty_attr(&el, "datetime")
        .map(str::to_string)
        .unwrap_or_else(|| element_text(&el));
    if raw.is_empty() {
        return None;
    }
    Some(normalize_timestamp(&raw))
}
