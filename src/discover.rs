//! Candidate URL discovery for one source.
//!
//! Discovery tiers are tried in priority order, advancing only when the
//! previous tier yields nothing:
//!
//! 1. configured RSS/Atom feeds
//! 2. XML sitemap index, expanding the most recent period sitemaps
//! 3. homepage anchor scraping as last resort
//!
//! Every discovered URL passes a relevance predicate (configured
//! keyword/path match) and a freshness predicate (feed-supplied,
//! sitemap-supplied, or URL-embedded date within the configured window;
//! dateless URLs pass). The result is deduplicated and capped. A failing
//! tier is logged and skipped, never fatal: an empty candidate set is a
//! valid outcome and the run continues.

use crate::config::SourceConfig;
use crate::error::DiscoveryError;
use crate::fetch::Fetch;
use crate::models::Candidate;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use itertools::Itertools;
use once_cell::sync::Lazy;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use regex::Regex;
use scraper::{Html, Selector};
use tracing::{debug, info, instrument, warn};
use url::Url;

/// `/YYYY/MM/DD/` path segments.
static SLASH_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/(\d{4})/(\d{1,2})/(\d{1,2})(?:/|$)").unwrap());

/// Compact `YYYYMMDD` runs, bounded by non-digits.
static COMPACT_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|[^\d])(\d{4})(\d{2})(\d{2})(?:[^\d]|$)").unwrap());

/// One feed entry: a link plus whatever date the feed supplied.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct FeedEntry {
    pub url: String,
    pub date: Option<DateTime<Utc>>,
}

/// Produce the deduplicated, freshness-filtered, capped candidate set
/// for one source.
#[instrument(level = "info", skip_all, fields(source = %config.name))]
pub async fn collect_candidates(fetcher: &dyn Fetch, config: &SourceConfig) -> Vec<Candidate> {
    let mut candidates = from_feeds(fetcher, config).await;
    if candidates.is_empty() {
        candidates = from_sitemaps(fetcher, config).await;
    }
    if candidates.is_empty() {
        candidates = from_homepage(fetcher, config).await;
    }

    let now = Utc::now();
    let kept: Vec<Candidate> = candidates
        .into_iter()
        .filter(|c| is_relevant(config, &c.url))
        .filter(|c| is_fresh(config, now, c.freshness_date))
        .unique_by(|c| c.url.clone())
        .take(config.max_candidates)
        .collect();

    info!(count = kept.len(), "collected candidate URLs");
    kept
}

async fn from_feeds(fetcher: &dyn Fetch, config: &SourceConfig) -> Vec<Candidate> {
    let mut out = Vec::new();
    for feed_url in &config.feed_urls {
        let entries = match fetch_feed(fetcher, config, feed_url).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(feed = %feed_url, error = %e, "feed discovery failed; skipping tier entry");
                continue;
            }
        };
        debug!(feed = %feed_url, count = entries.len(), "parsed feed");
        out.extend(entries.into_iter().map(|entry| candidate(entry.url, "feed", entry.date)));
    }
    out
}

async fn fetch_feed(
    fetcher: &dyn Fetch,
    config: &SourceConfig,
    feed_url: &str,
) -> Result<Vec<FeedEntry>, DiscoveryError> {
    let response = fetcher
        .get(feed_url, &config.variants[0], config.fetch_timeout())
        .await?;
    parse_feed(&response.body)
}

/// Parse an RSS or Atom document into feed entries.
///
/// RSS supplies `<item><link>text</link><pubDate>`; Atom supplies
/// `<entry><link href="..."/>` with `<published>`/`<updated>`. Both
/// appear in the wild, sometimes within the same source's feeds.
pub(crate) fn parse_feed(xml: &str) -> Result<Vec<FeedEntry>, DiscoveryError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();

    let mut entries = Vec::new();
    let mut in_entry = false;
    let mut current_tag = String::new();
    let mut link = String::new();
    let mut date_text = String::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                match name.as_str() {
                    "item" | "entry" => {
                        in_entry = true;
                        link.clear();
                        date_text.clear();
                    }
                    "link" if in_entry && link.is_empty() => {
                        if let Some(href) = atom_link_href(&e) {
                            link = href;
                        }
                        current_tag = name;
                    }
                    _ => current_tag = name,
                }
            }
            Ok(Event::Empty(e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                if in_entry && name == "link" && link.is_empty() {
                    if let Some(href) = atom_link_href(&e) {
                        link = href;
                    }
                }
            }
            Ok(Event::End(e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                if (name == "item" || name == "entry") && in_entry {
                    if !link.is_empty() {
                        entries.push(FeedEntry {
                            url: link.clone(),
                            date: parse_feed_date(&date_text),
                        });
                    }
                    in_entry = false;
                }
            }
            Ok(Event::Text(e)) => {
                let text = e.xml_content().unwrap_or_default().to_string();
                if in_entry {
                    match current_tag.as_str() {
                        "link" if link.is_empty() => link = text.trim().to_string(),
                        "pubDate" | "published" | "updated" if date_text.is_empty() => {
                            date_text = text.trim().to_string();
                        }
                        _ => {}
                    }
                }
            }
            Ok(Event::CData(e)) => {
                if in_entry && current_tag == "link" && link.is_empty() {
                    link = String::from_utf8_lossy(e.as_ref()).trim().to_string();
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(DiscoveryError::Xml(e)),
            _ => {}
        }
        buf.clear();
    }
    Ok(entries)
}

/// Atom `<link>` href, skipping rel="self"/"enclosure" alternates.
fn atom_link_href(e: &BytesStart<'_>) -> Option<String> {
    let rel = xml_attr(e, "rel");
    if let Some(rel) = rel {
        if rel != "alternate" {
            return None;
        }
    }
    xml_attr(e, "href")
}

fn xml_attr(e: &BytesStart<'_>, name: &str) -> Option<String> {
    e.try_get_attribute(name)
        .ok()
        .flatten()
        .and_then(|a| a.unescape_value().ok())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_feed_date(s: &str) -> Option<DateTime<Utc>> {
    if s.is_empty() {
        return None;
    }
    if let Ok(date) = DateTime::parse_from_rfc2822(s) {
        return Some(date.with_timezone(&Utc));
    }
    if let Ok(date) = DateTime::parse_from_rfc3339(s) {
        return Some(date.with_timezone(&Utc));
    }
    None
}

async fn from_sitemaps(fetcher: &dyn Fetch, config: &SourceConfig) -> Vec<Candidate> {
    let Some(index_url) = config.sitemap_index_url.as_deref() else {
        return Vec::new();
    };
    match sitemap_candidates(fetcher, config, index_url).await {
        Ok(candidates) => candidates,
        Err(e) => {
            warn!(sitemap_index = %index_url, error = %e, "sitemap discovery failed; skipping tier");
            Vec::new()
        }
    }
}

async fn sitemap_candidates(
    fetcher: &dyn Fetch,
    config: &SourceConfig,
    index_url: &str,
) -> Result<Vec<Candidate>, DiscoveryError> {
    let response = fetcher
        .get(index_url, &config.variants[0], config.fetch_timeout())
        .await?;

    let mut index = parse_sitemap_entries(&response.body, "sitemap")?;
    // Most recent period sitemaps first; undated ones sort last.
    index.sort_by(|a, b| b.1.cmp(&a.1));

    let mut urls: Vec<(String, Option<DateTime<Utc>>)> = Vec::new();
    if index.is_empty() {
        // The configured URL may itself be a plain urlset.
        urls = parse_sitemap_entries(&response.body, "url")?;
    } else {
        for (sitemap_url, _) in index.into_iter().take(config.recent_sitemaps) {
            match fetcher
                .get(&sitemap_url, &config.variants[0], config.fetch_timeout())
                .await
            {
                Ok(resp) => match parse_sitemap_entries(&resp.body, "url") {
                    Ok(entries) => {
                        debug!(sitemap = %sitemap_url, count = entries.len(), "parsed period sitemap");
                        urls.extend(entries);
                    }
                    Err(e) => warn!(sitemap = %sitemap_url, error = %e, "skipping unparseable sitemap"),
                },
                Err(e) => warn!(sitemap = %sitemap_url, error = %e, "skipping unreachable sitemap"),
            }
        }
    }

    Ok(urls
        .into_iter()
        .map(|(url, lastmod)| candidate(url, "sitemap", lastmod))
        .collect())
}

/// Parse `<sitemap>` or `<url>` entries (chosen via `parent`) with their
/// `<loc>` and optional `<lastmod>` children.
pub(crate) fn parse_sitemap_entries(
    xml: &str,
    parent: &str,
) -> Result<Vec<(String, Option<DateTime<Utc>>)>, DiscoveryError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();

    let mut entries = Vec::new();
    let mut in_parent = false;
    let mut current_tag = String::new();
    let mut loc = String::new();
    let mut lastmod = String::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                if name == parent {
                    in_parent = true;
                    loc.clear();
                    lastmod.clear();
                } else {
                    current_tag = name;
                }
            }
            Ok(Event::End(e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                if name == parent && in_parent {
                    if !loc.is_empty() {
                        entries.push((loc.clone(), parse_lastmod(&lastmod)));
                    }
                    in_parent = false;
                }
            }
            Ok(Event::Text(e)) => {
                let text = e.xml_content().unwrap_or_default().to_string();
                if in_parent && current_tag == "loc" {
                    loc = text.trim().to_string();
                } else if in_parent && current_tag == "lastmod" {
                    lastmod = text.trim().to_string();
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(DiscoveryError::Xml(e)),
            _ => {}
        }
        buf.clear();
    }
    Ok(entries)
}

fn parse_lastmod(s: &str) -> Option<DateTime<Utc>> {
    if s.is_empty() {
        return None;
    }
    if let Ok(date) = DateTime::parse_from_rfc3339(s) {
        return Some(date.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

async fn from_homepage(fetcher: &dyn Fetch, config: &SourceConfig) -> Vec<Candidate> {
    let response = match fetcher
        .get(&config.base_url, &config.variants[0], config.fetch_timeout())
        .await
    {
        Ok(r) => r,
        Err(e) => {
            warn!(homepage = %config.base_url, error = %e, "homepage discovery failed");
            return Vec::new();
        }
    };
    let Ok(base) = Url::parse(&config.base_url) else {
        return Vec::new();
    };

    let doc = Html::parse_document(&response.body);
    let anchors = Selector::parse("a[href]").unwrap();
    let mut out = Vec::new();
    for element in doc.select(&anchors) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        let Ok(resolved) = base.join(href) else {
            continue;
        };
        if !same_site(&base, &resolved) {
            continue;
        }
        out.push(candidate(resolved.to_string(), "homepage", None));
    }
    debug!(count = out.len(), "homepage anchors resolved");
    out
}

/// Same registrable host, tolerating a `www.` prefix on either side.
fn same_site(base: &Url, candidate: &Url) -> bool {
    let trim = |u: &Url| {
        u.host_str()
            .map(|h| h.trim_start_matches("www.").to_string())
            .unwrap_or_default()
    };
    let base_host = trim(base);
    !base_host.is_empty() && trim(candidate) == base_host
}

fn candidate(url: String, source_hint: &'static str, date: Option<DateTime<Utc>>) -> Candidate {
    let freshness_date = date.or_else(|| date_from_url(&url));
    Candidate {
        url,
        discovered_at: Utc::now(),
        source_hint,
        freshness_date,
    }
}

fn is_relevant(config: &SourceConfig, url: &str) -> bool {
    if config.topic_keywords.is_empty() && config.path_patterns.is_empty() {
        return true;
    }
    let lower = url.to_lowercase();
    config
        .topic_keywords
        .iter()
        .any(|k| !k.is_empty() && lower.contains(&k.to_lowercase()))
        || config
            .path_patterns
            .iter()
            .any(|p| !p.is_empty() && lower.contains(&p.to_lowercase()))
}

/// Dated candidates must fall inside the freshness window; dateless ones
/// pass through.
fn is_fresh(config: &SourceConfig, now: DateTime<Utc>, date: Option<DateTime<Utc>>) -> bool {
    match date {
        Some(d) => now.signed_duration_since(d) <= Duration::days(config.max_age_days),
        None => true,
    }
}

/// Pull an embedded publication date out of a URL path.
pub(crate) fn date_from_url(url: &str) -> Option<DateTime<Utc>> {
    let caps = SLASH_DATE
        .captures(url)
        .or_else(|| COMPACT_DATE.captures(url))?;
    let year: i32 = caps[1].parse().ok()?;
    let month: u32 = caps[2].parse().ok()?;
    let day: u32 = caps[3].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)?
        .and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc())
}
