//! Canonical URLs, content hashes, and duplicate rejection.
//!
//! Identity is computed two ways so duplicates are caught whether they
//! share a URL or only share content:
//! - the canonical URL (query string and fragment stripped)
//! - a SHA-256 digest over normalized title+body
//!
//! [`RunDedup`] tracks both for one run, pre-seeded with identities the
//! external store already knows. A match is a silent drop, never an error.

use crate::models::ArticleRecord;
use sha2::{Digest, Sha256};
use std::collections::HashSet;

/// Number of hex characters kept for record ids.
const ID_LEN: usize = 16;

/// Strip the query string and fragment from a URL.
///
/// Tracking parameters (`?utm_source=...`) and fragments are volatile and
/// never part of an article's identity. URLs that fail to parse are
/// truncated at the first `?` or `#` instead.
pub fn canonicalize(url: &str) -> String {
    match url::Url::parse(url) {
        Ok(mut parsed) => {
            parsed.set_query(None);
            parsed.set_fragment(None);
            parsed.to_string()
        }
        Err(_) => {
            let end = url.find(['?', '#']).unwrap_or(url.len());
            url[..end].to_string()
        }
    }
}

/// SHA-256 digest over normalized title+body.
///
/// Normalization lowercases and collapses whitespace so that markup-level
/// differences between two fetches of the same article do not produce
/// distinct hashes.
pub fn content_hash(title: &str, body: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalize(title).as_bytes());
    hasher.update(b"\n");
    hasher.update(normalize(body).as_bytes());
    hex_string(&hasher.finalize())
}

/// Derive the stable record id.
///
/// Normally a digest of `source|canonical_url`; for sources whose URLs
/// churn (`unstable_urls`), the content hash is used instead so the same
/// article keeps the same id across URL changes.
pub fn record_id(source: &str, canonical_url: &str, content_hash: &str, unstable_urls: bool) -> String {
    if unstable_urls {
        return content_hash[..ID_LEN.min(content_hash.len())].to_string();
    }
    let mut hasher = Sha256::new();
    hasher.update(source.as_bytes());
    hasher.update(b"|");
    hasher.update(canonical_url.as_bytes());
    let digest = hex_string(&hasher.finalize());
    digest[..ID_LEN].to_string()
}

fn normalize(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn hex_string(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Identities seen so far in one run.
///
/// Holds canonical URLs and content hashes of everything emitted this run
/// plus whatever the external store reported as already known.
#[derive(Debug, Default)]
pub struct RunDedup {
    seen: HashSet<String>,
}

impl RunDedup {
    /// Create a dedup set pre-seeded with store-reported identities
    /// (canonical URLs or content hashes, interchangeably).
    pub fn with_known<'a, I>(known: I) -> Self
    where
        I: IntoIterator<Item = &'a String>,
    {
        Self {
            seen: known.into_iter().cloned().collect(),
        }
    }

    /// Record an article's identity. Returns `false` when its canonical
    /// URL or content hash was already seen, in which case the caller
    /// drops the record.
    pub fn insert(&mut self, record: &ArticleRecord) -> bool {
        if self.seen.contains(&record.canonical_url) || self.seen.contains(&record.content_hash) {
            return false;
        }
        self.seen.insert(record.canonical_url.clone());
        self.seen.insert(record.content_hash.clone());
        true
    }
}
