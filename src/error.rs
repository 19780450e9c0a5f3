//! Typed errors for the harvest pipeline.
//!
//! Only [`ConfigError`] ever crosses the crate boundary: invalid source
//! configuration is the single fail-fast condition, detected before any
//! worker starts. Discovery and fetch errors are recovered locally by
//! advancing to the next tier or variant and never abort a run.

use thiserror::Error;

/// Invalid or missing required source configuration.
///
/// Returned by [`crate::config::SourceConfig::validate`] and by
/// [`crate::harvest_source`] before any network activity takes place.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The source name is empty.
    #[error("source name must not be empty")]
    MissingName,

    /// The base URL does not parse.
    #[error("invalid base URL `{url}`: {source}")]
    InvalidBaseUrl {
        url: String,
        source: url::ParseError,
    },

    /// A minimum body length of zero would admit empty articles.
    #[error("minimum body length must be greater than zero")]
    ZeroMinBodyLen,

    /// Worker count outside the supported range.
    #[error("worker count must be between 1 and {max}, got {got}")]
    WorkerCount { got: usize, max: usize },

    /// The candidate cap must admit at least one URL.
    #[error("max candidates must be greater than zero")]
    ZeroCandidateCap,

    /// No fetch variants means no request could ever be issued.
    #[error("at least one fetch variant is required")]
    NoVariants,

    /// A URL template is missing its `{{url}}` placeholder.
    #[error("template `{template}` is missing the {{url}} placeholder")]
    BadTemplate { template: String },
}

/// A discovery tier (feed, sitemap, or homepage) failed.
///
/// Recovered by the collector: the failing tier is logged and skipped.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// The underlying fetch failed.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// The response was not parseable as XML.
    #[error("malformed XML: {0}")]
    Xml(#[from] quick_xml::Error),

    /// A discovered href could not be resolved to an absolute URL.
    #[error("unresolvable URL `{url}`")]
    Url { url: String },
}

/// A single fetch attempt failed.
///
/// Recovered by the strategy chain: the attempt is logged and the chain
/// advances to the next variant or tier.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    /// Transport-level failure (connect, TLS, body read).
    #[error("request to {url} failed: {reason}")]
    Request { url: String, reason: String },

    /// The attempt exceeded its per-attempt timeout.
    #[error("request to {url} timed out after {secs}s")]
    Timeout { url: String, secs: u64 },

    /// Non-success HTTP status, including anti-scraping blocks.
    #[error("{url} returned status {status}")]
    Status { url: String, status: u16 },
}
