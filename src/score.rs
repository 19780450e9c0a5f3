//! Quality scoring and classification.
//!
//! A pure function of the cleaned text, its structural metrics, and
//! metadata presence. No I/O, fully deterministic: the same article
//! always scores the same.
//!
//! Four weighted sub-scores sum to 0..=100:
//! - length (0-30), saturating with character count
//! - structure (0-25), from paragraph count and organization
//! - cleanliness (0-25), full marks unless contamination survived cleaning
//! - metadata (0-20), five points each for title, image, date, and id

use crate::clean::{self, TextStats};
use crate::models::QualityClass;

/// Which metadata fields the pipeline managed to resolve.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetadataPresence {
    pub title: bool,
    pub image: bool,
    pub date: bool,
    pub id: bool,
}

/// Character count at which the length sub-score saturates.
const LENGTH_SATURATION: usize = 3000;

/// Compute the quality score for a cleaned article body.
pub fn score(body: &str, stats: &TextStats, meta: &MetadataPresence) -> u8 {
    let total =
        length_score(body) + structure_score(stats) + cleanliness_score(body) + metadata_score(meta);
    total.min(100)
}

/// Map a numeric score to its discrete bucket.
pub fn classify(score: u8) -> QualityClass {
    match score {
        80..=u8::MAX => QualityClass::Excellent,
        60..=79 => QualityClass::Good,
        40..=59 => QualityClass::Fair,
        _ => QualityClass::Poor,
    }
}

/// 0-30, one point per 100 characters, saturating at 3000.
fn length_score(body: &str) -> u8 {
    let chars = body.chars().count().min(LENGTH_SATURATION);
    (chars / 100) as u8
}

/// 0-25 from paragraph count, with a deduction for wall-of-text bodies.
fn structure_score(stats: &TextStats) -> u8 {
    let base: u8 = match stats.paragraphs {
        0 => 0,
        1 => 5,
        2 => 10,
        3..=4 => 15,
        5..=7 => 20,
        _ => 25,
    };
    // A single huge paragraph reads as unorganized even when long.
    let avg_words = if stats.paragraphs > 0 {
        stats.words / stats.paragraphs
    } else {
        0
    };
    if avg_words > 150 { base.saturating_sub(5) } else { base }
}

/// 0-25, deducting per contamination kind still present after cleaning.
fn cleanliness_score(body: &str) -> u8 {
    let kinds = clean::contamination_kinds(body) as u8;
    25u8.saturating_sub(kinds.saturating_mul(8))
}

/// 0-20, five points per resolved metadata field.
fn metadata_score(meta: &MetadataPresence) -> u8 {
    [meta.title, meta.image, meta.date, meta.id]
        .into_iter()
        .filter(|present| *present)
        .count() as u8
        * 5
}
