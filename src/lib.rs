//! # News Harvest
//!
//! A harvesting pipeline that turns heterogeneous news sites into
//! normalized, quality-scored, deduplicated article records ready for
//! downstream enrichment. Sources expose no uniform API: discovery and
//! extraction tolerate unreliable HTML, anti-scraping defenses, and
//! partial responses by falling through ordered strategy tiers instead
//! of failing.
//!
//! ## Architecture
//!
//! One run is a stateless transformation from a source's configuration
//! to a list of [`ArticleRecord`] values:
//!
//! 1. **Discovery**: collect candidate URLs from feeds, sitemaps, or the
//!    homepage ([`discover`])
//! 2. **Fetching**: retrieve each URL through an ordered chain of fetch
//!    tiers with request-variant cycling ([`fetch`])
//! 3. **Processing**: extract, clean, and score each article on a
//!    bounded worker pool ([`extract`], [`clean`], [`score`], [`pool`])
//! 4. **Identity**: canonicalize, hash, and drop duplicates
//!    ([`identity`])
//!
//! No single URL's failure aborts a run; the only fail-fast condition is
//! invalid source configuration. Persistence, cross-run deduplication,
//! enrichment, and scheduling belong to external collaborators.
//!
//! ## Usage
//!
//! ```no_run
//! use news_harvest::{HttpFetcher, SourceConfig, harvest_source};
//!
//! # async fn run() -> Result<(), news_harvest::ConfigError> {
//! let config = SourceConfig {
//!     name: "example".to_string(),
//!     base_url: "https://example.com".to_string(),
//!     feed_urls: vec!["https://example.com/feed.xml".to_string()],
//!     ..SourceConfig::default()
//! };
//! let fetcher = HttpFetcher::new();
//! let (records, stats) = harvest_source(&fetcher, &config).await?;
//! println!("{} records ({} duplicates dropped)", records.len(), stats.duplicates);
//! # Ok(())
//! # }
//! ```

use tracing::{debug, info, instrument};

pub mod clean;
pub mod config;
pub mod discover;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod identity;
pub mod models;
pub mod pool;
pub mod score;
#[cfg(test)]
pub(crate) mod testing;

pub use config::{FetchVariant, Selectors, SourceConfig};
pub use error::ConfigError;
pub use fetch::{Fetch, FetchResponse, HttpFetcher};
pub use models::{ArticleRecord, Candidate, QualityClass, RunStats};

/// Run the full harvest pipeline for one source.
///
/// Validates the configuration (the sole fail-fast path), discovers
/// candidate URLs, processes them on the bounded worker pool, and emits
/// deduplicated records with per-run counters. Workers complete in
/// non-deterministic order; record content is deterministic regardless.
#[instrument(level = "info", skip_all, fields(source = %config.name))]
pub async fn harvest_source(
    fetcher: &dyn Fetch,
    config: &SourceConfig,
) -> Result<(Vec<ArticleRecord>, RunStats), ConfigError> {
    config.validate()?;

    let candidates = discover::collect_candidates(fetcher, config).await;
    let discovered = candidates.len();

    let pool_config = pool::PoolConfig::from_source(config);
    let processed = pool::run(candidates, &pool_config, |candidate| {
        process_candidate(fetcher, config, candidate)
    })
    .await;
    let fetched = processed.len();

    let mut dedup = identity::RunDedup::with_known(&config.known_identities);
    let mut records = Vec::new();
    let mut duplicates = 0usize;
    for record in processed {
        if dedup.insert(&record) {
            records.push(record);
        } else {
            duplicates += 1;
            debug!(canonical_url = %record.canonical_url, "dropping duplicate record");
        }
    }

    let stats = RunStats {
        discovered,
        fetched,
        rejected: discovered - fetched,
        duplicates,
    };
    info!(
        emitted = records.len(),
        discovered,
        fetched,
        rejected = stats.rejected,
        duplicates,
        "harvest run complete"
    );
    Ok((records, stats))
}

/// One worker's end-to-end pipeline for a single candidate URL.
///
/// Any rejection along the way returns `None`; the pool counts the URL
/// as skipped and the run continues.
async fn process_candidate(
    fetcher: &dyn Fetch,
    config: &SourceConfig,
    candidate: Candidate,
) -> Option<ArticleRecord> {
    let fields = fetch::fetch_article(fetcher, config, &candidate.url).await?;

    let (body, text_stats) = clean::clean_text(config, &fields.body_text);
    if body.chars().count() < config.min_body_len {
        debug!(url = %candidate.url, "cleaned body fell below minimum; rejecting");
        return None;
    }

    let canonical_url = identity::canonicalize(&candidate.url);
    let content_hash = identity::content_hash(&fields.title, &body);
    let id = identity::record_id(
        &config.name,
        &canonical_url,
        &content_hash,
        config.unstable_urls,
    );

    let published_at = fields.publish_date.or(candidate.freshness_date);
    let has_image = fields.cover_image_url.is_some();
    let cover_image_url = fields
        .cover_image_url
        .unwrap_or_else(|| config.placeholder_image.clone());

    let presence = score::MetadataPresence {
        title: true,
        image: has_image,
        date: published_at.is_some(),
        id: true,
    };
    let quality_score = score::score(&body, &text_stats, &presence);
    let quality_class = score::classify(quality_score);

    Some(ArticleRecord {
        id,
        canonical_url,
        content_hash,
        source: config.name.clone(),
        title: fields.title,
        body,
        cover_image_url,
        published_at,
        quality_score,
        quality_class,
        sponsored: fields.sponsored,
    })
}
