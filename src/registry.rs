//! Source registry: the read-only mapping from short source keys to
//! [`SourceConfig`]s.
//!
//! The registry is passed into the orchestrator explicitly so tests can run
//! against their own sources. A YAML file with the shape below can replace
//! the built-in sources:
//!
//! ```yaml
//! bbc:
//!   url: https://www.bbc.com/news
//!   base: https://www.bbc.com
//!   article_selector: a.gs-c-promo-heading
//!   url_attr: href
//!   time_selector: time
//! ```

use scraper::Selector;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{info, instrument};

use crate::error::{Result, ScrapeError};
use crate::models::{ExtractionRules, SourceConfig};

#[derive(Debug, Clone, Default)]
pub struct SourceRegistry {
    sources: BTreeMap<String, SourceConfig>,
}

impl SourceRegistry {
    /// Empty registry; populate it with [`insert`](Self::insert).
    pub fn new() -> Self {
        Self::default()
    }

    /// Built-in sources: BBC News and The Guardian.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        let builtin = [
            (
                "bbc",
                "https://www.bbc.com/news",
                "https://www.bbc.com",
                "a.gs-c-promo-heading",
            ),
            (
                "guardian",
                "https://www.theguardian.com/international",
                "https://www.theguardian.com",
                "a.js-headline-text",
            ),
        ];
        for (key, url, base, item_selector) in builtin {
            let rules = ExtractionRules {
                item_selector: item_selector.to_string(),
                title_selector: None,
                link_attr: "href".to_string(),
                time_selector: Some("time".to_string()),
            };
            // Static URLs; parsing cannot fail.
            if let Ok(cfg) = SourceConfig::new(url, base, rules) {
                registry.sources.insert(key.to_string(), cfg);
            }
        }
        registry
    }

    /// Parse and validate a registry from YAML text.
    ///
    /// # Arguments
    ///
    /// * `yaml` - a mapping of source key to source config, see the module docs
    ///
    /// # Returns
    ///
    /// The registry, or [`ScrapeError::Yaml`] for malformed documents and bad
    /// URLs, [`ScrapeError::InvalidSelector`] for selectors that do not
    /// compile, and [`ScrapeError::Registry`] for an empty mapping or blank
    /// keys.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let sources: BTreeMap<String, SourceConfig> = serde_yaml::from_str(yaml)?;
        let registry = Self { sources };
        if registry.is_empty() {
            return Err(ScrapeError::Registry("no sources defined".to_string()));
        }
        registry.validate()?;
        Ok(registry)
    }

    /// Read a YAML registry from disk. See [`from_yaml_str`](Self::from_yaml_str).
    #[instrument(level = "info", skip_all, fields(path = %path.as_ref().display()))]
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let registry = Self::from_yaml_str(&text)?;
        info!(count = registry.len(), "Loaded source registry");
        Ok(registry)
    }

    /// Add or replace the source under `key`. Selectors are not checked here.
    pub fn insert(&mut self, key: impl Into<String>, config: SourceConfig) {
        self.sources.insert(key.into(), config);
    }

    pub fn get(&self, key: &str) -> Option<&SourceConfig> {
        self.sources.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.sources.contains_key(key)
    }

    /// Source keys in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.sources.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Every selector must compile and every key must be non-empty.
    pub fn validate(&self) -> Result<()> {
        for (key, cfg) in &self.sources {
            if key.trim().is_empty() {
                return Err(ScrapeError::Registry("empty source key".to_string()));
            }
            if cfg.rules.link_attr.trim().is_empty() {
                return Err(ScrapeError::Registry(format!("{key}: empty url_attr")));
            }
            let rules = &cfg.rules;
            std::iter::once(&rules.item_selector)
                .chain(rules.title_selector.iter())
                .chain(rules.time_selector.iter())
                .try_for_each(|s| compile_selector(s).map(|_| ()))?;
        }
        Ok(())
    }
}

pub(crate) fn compile_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector).map_err(|e| ScrapeError::InvalidSelector {
        selector: selector.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_sources() {
        let registry = SourceRegistry::builtin();
        assert_eq!(registry.keys().collect::<Vec<_>>(), vec!["bbc", "guardian"]);

        let bbc = registry.get("bbc").unwrap();
        assert_eq!(bbc.start_url.as_str(), "https://www.bbc.com/news");
        assert_eq!(bbc.base_url.as_str(), "https://www.bbc.com/");
        assert_eq!(bbc.rules.time_selector.as_deref(), Some("time"));
        assert!(registry.validate().is_ok());
    }

    #[test]
    fn test_from_yaml_str() {
        let yaml = r#"
local:
  url: https://news.example.org/front
  base: https://news.example.org
  article_selector: li.item
  title_selector: span.title
  url_attr: data-href
"#;
        let registry = SourceRegistry::from_yaml_str(yaml).unwrap();
        let cfg = registry.get("local").unwrap();
        assert_eq!(cfg.rules.link_attr, "data-href");
        assert_eq!(cfg.rules.title_selector.as_deref(), Some("span.title"));
        assert!(!registry.contains("bbc"));
    }

    #[test]
    fn test_from_yaml_rejects_empty_mapping() {
        let err = SourceRegistry::from_yaml_str("{}").unwrap_err();
        assert!(matches!(err, ScrapeError::Registry(_)));
        assert!(SourceRegistry::new().is_empty());
        assert!(!SourceRegistry::builtin().is_empty());
    }

    #[test]
    fn test_from_yaml_rejects_bad_selector() {
        let yaml = r#"
broken:
  url: https://example.org
  base: https://example.org
  article_selector: "div[["
"#;
        let err = SourceRegistry::from_yaml_str(yaml).unwrap_err();
        assert!(matches!(err, ScrapeError::InvalidSelector { .. }));
    }

    #[test]
    fn test_from_yaml_rejects_bad_url() {
        let yaml = r#"
broken:
  url: not a url
  base: https://example.org
  article_selector: a
"#;
        assert!(matches!(
            SourceRegistry::from_yaml_str(yaml),
            Err(ScrapeError::Yaml(_))
        ));
    }
}
