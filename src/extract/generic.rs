//! Structural heuristics used when a source's own rules match nothing.

use scraper::{ElementRef, Html, Selector};
use tracing::debug;
use url::Url;

use super::{element_text, non_empty_attr, resolve_link};
use crate::models::HeadlineRecord;

/// Tried in order; results are concatenated.
const HEURISTICS: &[&str] = &[
    "article h1 a",
    "article h2 a",
    "h3 a",
    "a[href] > h3",
    "a[href].headline",
];

fn heuristics() -> impl Iterator<Item = (&'static str, Selector)> {
    HEURISTICS
        .iter()
        .filter_map(|s| Selector::parse(s).ok().map(|sel| (*s, sel)))
}

/// Union of all heuristic matches, in heuristic order. Records carry no time.
pub fn extract(document: &Html, base: &Url) -> Vec<HeadlineRecord> {
    let mut found = Vec::new();
    for (heuristic, selector) in heuristics() {
        for el in document.select(&selector) {
            let Some(href) = link_for(&el) else { continue };
            match resolve_link(base, href) {
                Ok(url) => found.push(HeadlineRecord::new(element_text(&el), url, None)),
                Err(e) => debug!(heuristic, error = %e, "Unusable link; skipped"),
            }
        }
    }
    found
}

/// `href` of the element itself, else of its parent (`a > h3`).
fn link_for<'a>(el: &ElementRef<'a>) -> Option<&'a str> {
    non_empty_attr(el, "href").or_else(|| {
        let parent = el.parent().and_then(ElementRef::wrap)?;
        non_empty_attr(&parent, "href")
    })
}
