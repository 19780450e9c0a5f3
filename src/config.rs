//! Per-source configuration consumed by the harvest pipeline.
//!
//! Source variation (selectors, feeds, thresholds, fetch variants) is
//! modeled as immutable configuration values consumed by one generic
//! pipeline, not as per-source code. Configuration is supplied by the
//! caller; loading it from disk or elsewhere is an external concern.
//!
//! [`SourceConfig::validate`] is the pipeline's single fail-fast check,
//! run before any worker starts.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

/// Upper bound on the worker pool size.
pub const MAX_WORKERS: usize = 8;

/// Request variant cycled through by the fetch chain to mitigate
/// source-side blocking: different egress-region/device header hints.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FetchVariant {
    /// Label used in logs ("desktop-us", "mobile-eu", ...).
    pub name: String,
    /// User-Agent header value.
    pub user_agent: String,
    /// Accept-Language header value.
    pub accept_language: String,
    /// Optional Referer header value.
    #[serde(default)]
    pub referer: Option<String>,
}

/// Default variant cycle: a desktop browser profile, then a mobile one
/// with a different language hint.
pub fn default_variants() -> Vec<FetchVariant> {
    vec![
        FetchVariant {
            name: "desktop-us".to_string(),
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/120.0 Safari/537.36"
                .to_string(),
            accept_language: "en-US,en;q=0.9".to_string(),
            referer: None,
        },
        FetchVariant {
            name: "mobile-eu".to_string(),
            user_agent: "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) \
                         AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Mobile/15E148 \
                         Safari/604.1"
                .to_string(),
            accept_language: "en-GB,en;q=0.8".to_string(),
            referer: Some("https://www.google.com/".to_string()),
        },
    ]
}

/// Ordered CSS selector lists for one extraction concern.
///
/// Primary selectors are source-specific; the extractor falls back to its
/// generic groups when these yield nothing.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Selectors {
    /// Selectors for the article headline.
    #[serde(default)]
    pub title: Vec<String>,
    /// Selectors for the article body container.
    #[serde(default)]
    pub body: Vec<String>,
    /// Selectors for the cover image element.
    #[serde(default)]
    pub image: Vec<String>,
}

/// Immutable per-source configuration for one harvest run.
///
/// Templated URL fields (`structured_endpoint`, `lite_url_template`,
/// `text_proxy`) carry a `{url}` placeholder; the chain substitutes the
/// article URL (percent-encoded for `structured_endpoint` and
/// `text_proxy`, verbatim for `lite_url_template`).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Source name, carried into every emitted record.
    pub name: String,
    /// Base URL of the source; homepage discovery starts here and hrefs
    /// are resolved against it.
    pub base_url: String,
    /// RSS/Atom feed URLs, tried first during discovery.
    pub feed_urls: Vec<String>,
    /// XML sitemap index URL, tried when the feeds yield nothing.
    pub sitemap_index_url: Option<String>,
    /// How many of the most recent period sitemaps to expand.
    pub recent_sitemaps: usize,
    /// Source-specific selectors, tried before the generic fallbacks.
    pub primary_selectors: Selectors,
    /// Second source-specific group, tried after the primary one.
    pub secondary_selectors: Selectors,
    /// Keywords matched against candidate URLs for topic/geo relevance.
    /// Empty means every URL is relevant.
    pub topic_keywords: Vec<String>,
    /// Path fragments matched against candidate URLs ("/news/", "/politics/").
    pub path_patterns: Vec<String>,
    /// Freshness window: candidates dated older than this are dropped.
    pub max_age_days: i64,
    /// Cap on the candidate set, bounding downstream cost.
    pub max_candidates: usize,
    /// Phrases marking sponsored content, matched against title+body.
    pub sponsored_markers: Vec<String>,
    /// Minimum body length (chars) below which no record is created.
    pub min_body_len: usize,
    /// Boilerplate phrases stripped from cleaned text (byline prefixes,
    /// advertisement markers).
    pub boilerplate_phrases: Vec<String>,
    /// Provider-side structured-parse endpoint returning JSON (tier 1).
    pub structured_endpoint: Option<String>,
    /// Lightweight-markup URL template, e.g. `{url}?outputType=amp` (tier 2).
    pub lite_url_template: Option<String>,
    /// Last-resort text-extraction proxy endpoint (tier 4).
    pub text_proxy: Option<String>,
    /// Image used when no cover image can be resolved.
    pub placeholder_image: String,
    /// Keywords/domains that qualify a content image as a cover candidate.
    pub image_keywords: Vec<String>,
    /// Request variants cycled per fetch tier.
    pub variants: Vec<FetchVariant>,
    /// Worker pool size.
    pub workers: usize,
    /// Per-attempt fetch timeout, seconds.
    pub fetch_timeout_secs: u64,
    /// Fixed backoff between variant retries, milliseconds.
    pub variant_backoff_ms: u64,
    /// Politeness delay after each completed URL, milliseconds.
    pub url_delay_ms: u64,
    /// Politeness delay between processing batches, milliseconds.
    pub batch_delay_ms: u64,
    /// Derive record ids from the content hash instead of the canonical
    /// URL, for sources whose URLs churn.
    pub unstable_urls: bool,
    /// Canonical URLs and content hashes the external store already
    /// knows; matching articles are dropped as duplicates.
    pub known_identities: Vec<String>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            base_url: String::new(),
            feed_urls: Vec::new(),
            sitemap_index_url: None,
            recent_sitemaps: 3,
            primary_selectors: Selectors::default(),
            secondary_selectors: Selectors::default(),
            topic_keywords: Vec::new(),
            path_patterns: Vec::new(),
            max_age_days: 7,
            max_candidates: 50,
            sponsored_markers: vec![
                "sponsored content".to_string(),
                "paid post".to_string(),
                "advertisement feature".to_string(),
                "in partnership with".to_string(),
            ],
            min_body_len: 200,
            boilerplate_phrases: vec![
                "advertisement".to_string(),
                "subscribe to our newsletter".to_string(),
                "read more:".to_string(),
            ],
            structured_endpoint: None,
            lite_url_template: None,
            text_proxy: None,
            placeholder_image: String::new(),
            image_keywords: Vec::new(),
            variants: default_variants(),
            workers: 4,
            fetch_timeout_secs: 45,
            variant_backoff_ms: 800,
            url_delay_ms: 150,
            batch_delay_ms: 2000,
            unstable_urls: false,
            known_identities: Vec::new(),
        }
    }
}

impl SourceConfig {
    /// Check required configuration before any worker starts.
    ///
    /// This is the pipeline's only fail-fast path; every later failure is
    /// recovered locally.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::MissingName);
        }
        if let Err(e) = Url::parse(&self.base_url) {
            return Err(ConfigError::InvalidBaseUrl {
                url: self.base_url.clone(),
                source: e,
            });
        }
        if self.min_body_len == 0 {
            return Err(ConfigError::ZeroMinBodyLen);
        }
        if self.workers == 0 || self.workers > MAX_WORKERS {
            return Err(ConfigError::WorkerCount {
                got: self.workers,
                max: MAX_WORKERS,
            });
        }
        if self.max_candidates == 0 {
            return Err(ConfigError::ZeroCandidateCap);
        }
        if self.variants.is_empty() {
            return Err(ConfigError::NoVariants);
        }
        for template in [
            self.structured_endpoint.as_deref(),
            self.lite_url_template.as_deref(),
            self.text_proxy.as_deref(),
        ]
        .into_iter()
        .flatten()
        {
            if !template.contains("{url}") {
                return Err(ConfigError::BadTemplate {
                    template: template.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Per-attempt fetch timeout.
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    /// Fixed backoff between variant retries.
    pub fn variant_backoff(&self) -> Duration {
        Duration::from_millis(self.variant_backoff_ms)
    }
}
