//! Content extraction: fetched payloads to structured article fields.
//!
//! Three payload shapes arrive from the fetch chain:
//! - structured JSON from a provider-side parse, read by known field paths
//! - HTML, worked through ordered selector tiers
//! - plain text from the extraction proxy
//!
//! HTML body extraction is an ordered list of pure tier functions
//! evaluated until one yields enough text: source-specific selector
//! groups first, then generic fallbacks (`article`, `articleBody`
//! annotations, JSON-LD article detection), then raw paragraph
//! aggregation as last resort. Each tier is independently testable.
//!
//! Validation happens here: extraction returns `None` when the title is
//! missing or the body is below the source-configured minimum, and the
//! chain treats that as a failed tier.

use crate::clean::collect_text;
use crate::config::SourceConfig;
use crate::discover::date_from_url;
use crate::models::ExtractedFields;
use chrono::{DateTime, NaiveDate, Utc};
use scraper::{Html, Selector};
use serde_json::Value;
use tracing::{debug, warn};

/// A fetched payload in one of the shapes the chain produces.
#[derive(Debug, Clone)]
pub enum Payload {
    /// JSON from a provider-side structured parse.
    Structured(Value),
    /// An HTML document.
    Html(String),
    /// Plain text from the extraction proxy.
    Text(String),
}

/// Minimum body text a selector tier must yield before it wins.
const MIN_FRAGMENT_LEN: usize = 80;

/// `src` substrings disqualifying an image from cover duty.
const NON_COVER_TOKENS: &[&str] = &["icon", "logo", "sprite", "avatar", "badge", ".svg"];

/// Ordered HTML body tiers, tried until one yields enough text.
const BODY_TIERS: &[(&str, fn(&SourceConfig, &Html) -> Option<String>)] = &[
    ("primary", primary_body),
    ("secondary", secondary_body),
    ("article", article_tag_body),
    ("annotated", annotated_body),
    ("json-ld", json_ld_body),
    ("paragraphs", paragraph_body),
];

/// Turn a fetched payload into validated article fields.
///
/// Returns `None` when no tier yields a title plus a body meeting the
/// source-configured minimum length.
pub fn extract(config: &SourceConfig, url: &str, payload: &Payload) -> Option<ExtractedFields> {
    let mut fields = match payload {
        Payload::Structured(value) => from_structured(value)?,
        Payload::Html(html) => from_html(config, url, html)?,
        Payload::Text(text) => from_text(text)?,
    };

    if fields.title.trim().is_empty() {
        debug!(%url, "rejecting extraction: no title");
        return None;
    }
    if fields.body_text.chars().count() < config.min_body_len {
        debug!(
            %url,
            body_chars = fields.body_text.chars().count(),
            min = config.min_body_len,
            "rejecting extraction: body below minimum"
        );
        return None;
    }

    fields.sponsored = detect_sponsored(config, &fields.title, &fields.body_text);
    Some(fields)
}

/// Read known field paths out of a structured provider payload.
fn from_structured(value: &Value) -> Option<ExtractedFields> {
    let title = value
        .get("headline")
        .or_else(|| value.get("title"))
        .and_then(Value::as_str)?
        .trim()
        .to_string();
    let body = value
        .get("content")
        .or_else(|| value.get("articleBody"))
        .or_else(|| value.get("body"))
        .and_then(Value::as_str)?
        .trim()
        .to_string();
    let publish_date = value
        .get("datePublished")
        .or_else(|| value.get("date"))
        .and_then(Value::as_str)
        .and_then(parse_date);
    let cover_image_url = value.get("image").and_then(image_from_value);

    Some(ExtractedFields {
        title,
        publish_date,
        body_text: body,
        cover_image_url,
        sponsored: false,
    })
}

/// Work an HTML document through the selector tiers.
fn from_html(config: &SourceConfig, url: &str, html: &str) -> Option<ExtractedFields> {
    let doc = Html::parse_document(html);

    let mut body = None;
    for &(name, tier) in BODY_TIERS {
        if let Some(text) = tier(config, &doc) {
            if text.trim().chars().count() >= MIN_FRAGMENT_LEN {
                debug!(%url, tier = name, chars = text.len(), "body tier matched");
                body = Some(text);
                break;
            }
        }
    }
    let body_text = body?;

    let title = resolve_title(config, &doc)?;
    let publish_date = resolve_date(&doc, url);
    let cover_image_url = resolve_image(config, &doc);

    Some(ExtractedFields {
        title,
        publish_date,
        body_text,
        cover_image_url,
        sponsored: false,
    })
}

/// Split proxy-extracted plain text: first non-blank line is the title,
/// the remainder is the body.
fn from_text(text: &str) -> Option<ExtractedFields> {
    let mut lines = text.lines().skip_while(|l| l.trim().is_empty());
    let title = lines.next()?.trim().trim_start_matches('#').trim().to_string();
    let body = lines.collect::<Vec<_>>().join("\n").trim().to_string();

    Some(ExtractedFields {
        title,
        publish_date: None,
        body_text: body,
        cover_image_url: None,
        sponsored: false,
    })
}

fn primary_body(config: &SourceConfig, doc: &Html) -> Option<String> {
    selector_group_text(doc, &config.primary_selectors.body)
}

fn secondary_body(config: &SourceConfig, doc: &Html) -> Option<String> {
    selector_group_text(doc, &config.secondary_selectors.body)
}

fn article_tag_body(_config: &SourceConfig, doc: &Html) -> Option<String> {
    let selector = Selector::parse("article").unwrap();
    doc.select(&selector).next().map(collect_text)
}

fn annotated_body(_config: &SourceConfig, doc: &Html) -> Option<String> {
    let selector = Selector::parse(r#"[itemprop="articleBody"]"#).unwrap();
    let parts: Vec<String> = doc.select(&selector).map(collect_text).collect();
    if parts.is_empty() { None } else { Some(parts.join("\n")) }
}

/// Pull `articleBody` out of a JSON-LD article node.
fn json_ld_body(_config: &SourceConfig, doc: &Html) -> Option<String> {
    for value in json_ld_values(doc) {
        if let Some(node) = find_article_node(&value) {
            if let Some(body) = node.get("articleBody").and_then(Value::as_str) {
                return Some(body.to_string());
            }
        }
    }
    None
}

/// Last resort: aggregate every paragraph on the page.
fn paragraph_body(_config: &SourceConfig, doc: &Html) -> Option<String> {
    let selector = Selector::parse("p").unwrap();
    let parts: Vec<String> = doc
        .select(&selector)
        .map(collect_text)
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect();
    if parts.is_empty() { None } else { Some(parts.join("\n")) }
}

/// First selector in the group yielding non-empty text wins. Invalid
/// selectors are skipped, not fatal.
fn selector_group_text(doc: &Html, selectors: &[String]) -> Option<String> {
    for raw in selectors {
        let selector = match Selector::parse(raw) {
            Ok(s) => s,
            Err(e) => {
                warn!(selector = %raw, error = %e, "skipping unparseable selector");
                continue;
            }
        };
        let parts: Vec<String> = doc
            .select(&selector)
            .map(collect_text)
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        if !parts.is_empty() {
            return Some(parts.join("\n"));
        }
    }
    None
}

/// Every parseable JSON-LD script on the page.
fn json_ld_values(doc: &Html) -> Vec<Value> {
    let selector = Selector::parse(r#"script[type="application/ld+json"]"#).unwrap();
    doc.select(&selector)
        .filter_map(|el| {
            let text: String = el.text().collect();
            serde_json::from_str::<Value>(&text).ok()
        })
        .collect()
}

/// Locate an article-typed node: the root itself, a member of a root
/// array, or a member of `@graph`.
fn find_article_node(value: &Value) -> Option<&Value> {
    if is_article_type(value) {
        return Some(value);
    }
    if let Some(arr) = value.as_array() {
        return arr.iter().find(|v| is_article_type(v));
    }
    if let Some(graph) = value.get("@graph").and_then(Value::as_array) {
        return graph.iter().find(|v| is_article_type(v));
    }
    None
}

/// Article-type detection tolerating the declarations seen in the wild:
/// a single string, a comma-joined string, or an array.
fn is_article_type(value: &Value) -> bool {
    match value.get("@type") {
        Some(Value::String(s)) => s
            .split(',')
            .any(|part| part.trim().to_lowercase().contains("article")),
        Some(Value::Array(arr)) => arr
            .iter()
            .filter_map(Value::as_str)
            .any(|s| s.to_lowercase().contains("article")),
        _ => false,
    }
}

/// Configured selectors, then `og:title`, then `h1`, then `<title>`.
fn resolve_title(config: &SourceConfig, doc: &Html) -> Option<String> {
    for group in [&config.primary_selectors.title, &config.secondary_selectors.title] {
        if let Some(title) = selector_group_text(doc, group) {
            let title = title.trim().to_string();
            if !title.is_empty() {
                return Some(strip_site_suffix(&title));
            }
        }
    }
    if let Some(title) = meta_content(doc, r#"meta[property="og:title"]"#) {
        return Some(strip_site_suffix(&title));
    }
    let h1 = Selector::parse("h1").unwrap();
    if let Some(el) = doc.select(&h1).next() {
        let title = collect_text(el).trim().to_string();
        if !title.is_empty() {
            return Some(strip_site_suffix(&title));
        }
    }
    let title_tag = Selector::parse("title").unwrap();
    doc.select(&title_tag)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty())
        .map(|t| strip_site_suffix(&t))
}

/// Trim a trailing " - Site Name" / " | Site Name" segment.
fn strip_site_suffix(title: &str) -> String {
    for sep in [" | ", " - ", " – "] {
        if let Some((head, tail)) = title.rsplit_once(sep) {
            if head.chars().count() >= 20 && tail.split_whitespace().count() <= 5 {
                return head.trim().to_string();
            }
        }
    }
    title.to_string()
}

/// Published-time meta, then JSON-LD, then `<time datetime>`, then a
/// URL-embedded date.
fn resolve_date(doc: &Html, url: &str) -> Option<DateTime<Utc>> {
    if let Some(date) = meta_content(doc, r#"meta[property="article:published_time"]"#)
        .as_deref()
        .and_then(parse_date)
    {
        return Some(date);
    }
    for value in json_ld_values(doc) {
        if let Some(date) = find_article_node(&value)
            .and_then(|n| n.get("datePublished"))
            .and_then(Value::as_str)
            .and_then(parse_date)
        {
            return Some(date);
        }
    }
    let time = Selector::parse("time[datetime]").unwrap();
    if let Some(date) = doc
        .select(&time)
        .next()
        .and_then(|el| el.value().attr("datetime"))
        .and_then(parse_date)
    {
        return Some(date);
    }
    date_from_url(url)
}

/// Social-preview metadata, then configured selectors, then content
/// images by keyword, then the first plausible non-icon image.
fn resolve_image(config: &SourceConfig, doc: &Html) -> Option<String> {
    for selector in [r#"meta[property="og:image"]"#, r#"meta[name="twitter:image"]"#] {
        if let Some(src) = meta_content(doc, selector) {
            if !src.trim().is_empty() {
                return Some(src);
            }
        }
    }

    for group in [&config.primary_selectors.image, &config.secondary_selectors.image] {
        for raw in group {
            if let Ok(selector) = Selector::parse(raw) {
                if let Some(src) = doc
                    .select(&selector)
                    .next()
                    .and_then(|el| el.value().attr("src").or_else(|| el.value().attr("content")))
                {
                    return Some(src.to_string());
                }
            }
        }
    }

    let img = Selector::parse("img[src]").unwrap();
    let images: Vec<_> = doc.select(&img).collect();

    if !config.image_keywords.is_empty() {
        for el in &images {
            if let Some(src) = el.value().attr("src") {
                let lower = src.to_lowercase();
                if config.image_keywords.iter().any(|k| lower.contains(&k.to_lowercase())) {
                    return Some(src.to_string());
                }
            }
        }
    }

    for el in &images {
        let Some(src) = el.value().attr("src") else { continue };
        let lower = src.to_lowercase();
        if NON_COVER_TOKENS.iter().any(|t| lower.contains(t)) {
            continue;
        }
        if !plausible_dimensions(el.value().attr("width"), el.value().attr("height")) {
            continue;
        }
        return Some(src.to_string());
    }
    None
}

/// Declared dimensions under 200px mark icons and trackers; undeclared
/// dimensions pass.
fn plausible_dimensions(width: Option<&str>, height: Option<&str>) -> bool {
    for dim in [width, height].into_iter().flatten() {
        if let Ok(px) = dim.trim_end_matches("px").parse::<u32>() {
            if px < 200 {
                return false;
            }
        }
    }
    true
}

fn meta_content(doc: &Html, selector: &str) -> Option<String> {
    let selector = Selector::parse(selector).unwrap();
    doc.select(&selector)
        .next()
        .and_then(|el| el.value().attr("content"))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Image declarations appear as a bare string, an object with a `url`,
/// or an array of either.
fn image_from_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Object(obj) => obj.get("url").and_then(Value::as_str).map(str::to_string),
        Value::Array(arr) => arr.first().and_then(image_from_value),
        _ => None,
    }
}

/// Parse the date formats sources actually emit.
fn parse_date(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(date) = DateTime::parse_from_rfc3339(s) {
        return Some(date.with_timezone(&Utc));
    }
    if let Ok(date) = DateTime::parse_from_rfc2822(s) {
        return Some(date.with_timezone(&Utc));
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
    }
    None
}

fn detect_sponsored(config: &SourceConfig, title: &str, body: &str) -> bool {
    let haystack = format!("{} {}", title.to_lowercase(), body.to_lowercase());
    config
        .sponsored_markers
        .iter()
        .any(|marker| !marker.is_empty() && haystack.contains(&marker.to_lowercase()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Selectors;
    use serde_json::json;

    fn cfg() -> SourceConfig {
        SourceConfig {
            name: "example".to_string(),
            base_url: "https://example.com".to_string(),
            min_body_len: 100,
            ..SourceConfig::default()
        }
    }

    fn long_paragraph(label: &str) -> String {
        format!(
            "{label} reporting continued throughout the day as officials confirmed the details \
             of the agreement and residents weighed what the changes would mean for them."
        )
    }

    #[test]
    fn test_structured_payload_extraction() {
        let payload = Payload::Structured(json!({
            "headline": "Council Approves Budget",
            "datePublished": "2025-08-01T09:30:00Z",
            "image": {"url": "https://cdn.example.com/budget.jpg"},
            "content": long_paragraph("Budget"),
        }));
        let fields = extract(&cfg(), "https://example.com/a", &payload).unwrap();
        assert_eq!(fields.title, "Council Approves Budget");
        assert_eq!(
            fields.cover_image_url.as_deref(),
            Some("https://cdn.example.com/budget.jpg")
        );
        assert!(fields.publish_date.is_some());
    }

    #[test]
    fn test_structured_image_variants() {
        assert_eq!(
            image_from_value(&json!("https://cdn.example.com/a.jpg")).as_deref(),
            Some("https://cdn.example.com/a.jpg")
        );
        assert_eq!(
            image_from_value(&json!([{"url": "https://cdn.example.com/b.jpg"}])).as_deref(),
            Some("https://cdn.example.com/b.jpg")
        );
        assert_eq!(image_from_value(&json!(42)), None);
    }

    #[test]
    fn test_primary_selectors_win_over_generic() {
        let config = SourceConfig {
            primary_selectors: Selectors {
                body: vec![".story-body".to_string()],
                ..Selectors::default()
            },
            ..cfg()
        };
        let html = format!(
            r#"<html><body>
                <div class="story-body"><p>{}</p></div>
                <article><p>{}</p></article>
            </body></html>"#,
            long_paragraph("Primary"),
            long_paragraph("Generic")
        );
        let fields = extract(&config, "https://example.com/a", &Payload::Html(html)).unwrap();
        assert!(fields.body_text.contains("Primary reporting"));
        assert!(!fields.body_text.contains("Generic reporting"));
    }

    #[test]
    fn test_json_ld_body_with_comma_joined_type() {
        let html = format!(
            r#"<html><head>
                <title>Flood Warning Issued</title>
                <script type="application/ld+json">
                {{"@type": "NewsArticle, Article", "articleBody": "{}"}}
                </script>
            </head><body><p>short</p></body></html>"#,
            long_paragraph("Flood")
        );
        let fields = extract(&cfg(), "https://example.com/a", &Payload::Html(html)).unwrap();
        assert!(fields.body_text.contains("Flood reporting"));
    }

    #[test]
    fn test_json_ld_array_and_graph_types() {
        assert!(is_article_type(&json!({"@type": ["WebPage", "NewsArticle"]})));
        assert!(is_article_type(&json!({"@type": "ReportageNewsArticle"})));
        assert!(!is_article_type(&json!({"@type": "WebSite"})));

        let graph = json!({"@graph": [{"@type": "WebSite"}, {"@type": "Article", "articleBody": "x"}]});
        assert!(find_article_node(&graph).is_some());
    }

    #[test]
    fn test_paragraph_aggregation_last_resort() {
        let html = format!(
            "<html><body><h1>Transit Update</h1><p>{}</p><p>{}</p></body></html>",
            long_paragraph("First"),
            long_paragraph("Second")
        );
        let fields = extract(&cfg(), "https://example.com/a", &Payload::Html(html)).unwrap();
        assert!(fields.body_text.contains("First reporting"));
        assert!(fields.body_text.contains("Second reporting"));
        assert_eq!(fields.title, "Transit Update");
    }

    #[test]
    fn test_title_falls_back_to_og_then_h1() {
        let html = format!(
            r#"<html><head><meta property="og:title" content="OG Headline"></head>
            <body><h1>H1 Headline</h1><article><p>{}</p></article></body></html>"#,
            long_paragraph("Body")
        );
        let fields = extract(&cfg(), "https://example.com/a", &Payload::Html(html)).unwrap();
        assert_eq!(fields.title, "OG Headline");
    }

    #[test]
    fn test_site_suffix_stripped() {
        assert_eq!(
            strip_site_suffix("Council Approves New Transit Budget | Example Times"),
            "Council Approves New Transit Budget"
        );
        // Short heads and long tails are left alone.
        assert_eq!(strip_site_suffix("Live - Updates"), "Live - Updates");
    }

    #[test]
    fn test_image_resolution_order() {
        let html = format!(
            r#"<html><head><meta property="og:image" content="https://cdn.example.com/og.jpg"></head>
            <body><article><img src="https://cdn.example.com/content.jpg"><p>{}</p></article></body></html>"#,
            long_paragraph("Body")
        );
        let fields = extract(&cfg(), "https://example.com/a", &Payload::Html(html)).unwrap();
        assert_eq!(
            fields.cover_image_url.as_deref(),
            Some("https://cdn.example.com/og.jpg")
        );
    }

    #[test]
    fn test_icon_images_skipped() {
        let html = format!(
            r#"<html><body><article>
                <img src="https://cdn.example.com/logo.png">
                <img src="https://cdn.example.com/pixel.gif" width="1" height="1">
                <img src="https://cdn.example.com/photo.jpg" width="1200" height="800">
                <p>{}</p>
            </article></body></html>"#,
            long_paragraph("Body")
        );
        let fields = extract(&cfg(), "https://example.com/a", &Payload::Html(html)).unwrap();
        assert_eq!(
            fields.cover_image_url.as_deref(),
            Some("https://cdn.example.com/photo.jpg")
        );
    }

    #[test]
    fn test_sponsored_flag_set_without_rejecting() {
        let payload = Payload::Structured(json!({
            "title": "Five Gadgets Worth Buying",
            "content": format!("{} This story was produced in partnership with a retailer.",
                long_paragraph("Gadget")),
        }));
        let fields = extract(&cfg(), "https://example.com/a", &payload).unwrap();
        assert!(fields.sponsored);
    }

    #[test]
    fn test_short_body_rejected() {
        let payload = Payload::Structured(json!({
            "title": "Too Short",
            "content": "Forty characters of body is not enough.",
        }));
        assert!(extract(&cfg(), "https://example.com/a", &payload).is_none());
    }

    #[test]
    fn test_missing_title_rejected() {
        let html = format!("<html><body><p>{}</p></body></html>", long_paragraph("Anon"));
        // No title tag, no h1, no og:title.
        assert!(extract(&cfg(), "https://example.com/a", &Payload::Html(html)).is_none());
    }

    #[test]
    fn test_text_payload_split() {
        let text = format!("\n# Harbor Reopens\n{}\n{}", long_paragraph("One"), long_paragraph("Two"));
        let fields = extract(&cfg(), "https://example.com/a", &Payload::Text(text)).unwrap();
        assert_eq!(fields.title, "Harbor Reopens");
        assert!(fields.body_text.contains("One reporting"));
    }

    #[test]
    fn test_date_from_meta_and_url() {
        let html = format!(
            r#"<html><head><meta property="article:published_time" content="2025-07-30T12:00:00Z">
            <title>Dated Story</title></head><body><article><p>{}</p></article></body></html>"#,
            long_paragraph("Dated")
        );
        let fields = extract(&cfg(), "https://example.com/a", &Payload::Html(html)).unwrap();
        assert_eq!(
            fields.publish_date.map(|d| d.date_naive().to_string()),
            Some("2025-07-30".to_string())
        );

        let undated_html = format!(
            "<html><head><title>URL Dated</title></head><body><article><p>{}</p></article></body></html>",
            long_paragraph("UrlDate")
        );
        let fields = extract(
            &cfg(),
            "https://example.com/2025/07/29/url-dated",
            &Payload::Html(undated_html),
        )
        .unwrap();
        assert_eq!(
            fields.publish_date.map(|d| d.date_naive().to_string()),
            Some("2025-07-29".to_string())
        );
    }
}
