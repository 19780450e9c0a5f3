//! Data models for candidate URLs and harvested article records.
//!
//! This module defines the core data structures that flow through the
//! pipeline:
//! - [`Candidate`]: a discovered URL that may contain a publishable article
//! - [`ExtractedFields`]: structured fields produced by extraction, pre-cleaning
//! - [`ArticleRecord`]: the pipeline's terminal, immutable output
//! - [`QualityClass`]: discrete quality bucket derived from the numeric score
//! - [`RunStats`]: per-run counters returned alongside the records
//!
//! A `Candidate` exists only within a run and is never persisted. An
//! `ArticleRecord` is immutable once emitted; a later re-scrape produces a
//! new record that the external storage collaborator reconciles.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A discovered URL that may contain a publishable article.
///
/// Produced by the collector, consumed by the worker pool. Transient:
/// created per run, never persisted.
#[derive(Debug, Clone)]
pub struct Candidate {
    /// Absolute article URL.
    pub url: String,
    /// When this run discovered the URL.
    pub discovered_at: DateTime<Utc>,
    /// Which discovery tier produced the URL ("feed", "sitemap", "homepage").
    pub source_hint: &'static str,
    /// Publication or last-modified date supplied by the feed/sitemap or
    /// embedded in the URL, when one was found.
    pub freshness_date: Option<DateTime<Utc>>,
}

/// Output of content extraction, before cleaning.
#[derive(Debug, Clone)]
pub struct ExtractedFields {
    /// Article headline.
    pub title: String,
    /// Publication date, when one could be resolved.
    pub publish_date: Option<DateTime<Utc>>,
    /// Raw body text as extracted from the payload.
    pub body_text: String,
    /// Cover image URL, when one could be resolved.
    pub cover_image_url: Option<String>,
    /// Promotional-content marker detected via keyword heuristics.
    pub sponsored: bool,
}

/// Discrete quality bucket derived from the numeric quality score.
///
/// "Poor" articles are retained but flagged; whether they are ultimately
/// excluded is the enrichment collaborator's decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityClass {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl fmt::Display for QualityClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            QualityClass::Excellent => "excellent",
            QualityClass::Good => "good",
            QualityClass::Fair => "fair",
            QualityClass::Poor => "poor",
        };
        write!(f, "{s}")
    }
}

/// A normalized, quality-scored article ready for downstream enrichment.
///
/// The pipeline's terminal output. Invariants:
/// - `id` is a deterministic function of the source, canonical URL, and
///   content hash
/// - `body` length exceeds the source-configured minimum
/// - `quality_score` is in `0..=100`
/// - at most one record per canonical URL per run
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ArticleRecord {
    /// Stable record identifier.
    pub id: String,
    /// URL with query string and fragment stripped.
    pub canonical_url: String,
    /// SHA-256 digest over normalized title+body.
    pub content_hash: String,
    /// Name of the source this article was harvested from.
    pub source: String,
    /// Article headline.
    pub title: String,
    /// Cleaned body text.
    pub body: String,
    /// Cover image URL; the configured placeholder when none was found.
    pub cover_image_url: String,
    /// Publication date, when one could be resolved.
    pub published_at: Option<DateTime<Utc>>,
    /// Numeric quality score in `0..=100`.
    pub quality_score: u8,
    /// Discrete bucket derived from `quality_score`.
    pub quality_class: QualityClass,
    /// Promotional-content flag.
    pub sponsored: bool,
}

/// Per-run counters, the library analogue of per-stage count logging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    /// Candidate URLs produced by discovery after filtering and capping.
    pub discovered: usize,
    /// Candidates that yielded an accepted fetch result.
    pub fetched: usize,
    /// Candidates rejected by the fetch chain, extraction, or cleaning.
    pub rejected: usize,
    /// Records dropped as intra-run or store-reported duplicates.
    pub duplicates: usize,
}
