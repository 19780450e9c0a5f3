//! Text cleaning: noise stripping, leakage removal, normalization.
//!
//! Cleaning happens in two places:
//! - [`collect_text`] walks an HTML subtree and skips noise elements
//!   (script/style/nav/footer/share/ad) while gathering text, so markup
//!   junk never enters the extracted body in the first place
//! - [`clean_text`] normalizes extracted text: style-declaration leakage,
//!   structured-data remnants, navigation-only lines, whitespace runs,
//!   configured boilerplate phrases, and HTML entities
//!
//! The scorer reuses this module's contamination patterns to deduct
//! cleanliness points when leftovers survive cleaning.

use crate::config::SourceConfig;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::ElementRef;

/// Elements whose entire subtree is ignored during text collection.
const NOISE_TAGS: &[&str] = &[
    "script", "style", "nav", "footer", "aside", "form", "noscript", "iframe", "button", "svg",
    "figure",
];

/// Class/id tokens marking share widgets, ad slots, and other chrome.
const NOISE_TOKENS: &[&str] = &[
    "share", "social", "advert", "promo", "related", "newsletter", "sidebar", "comment",
];

/// Inline CSS declarations that bled into extracted text.
static STYLE_LEAKAGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?:cursor|box-shadow|background(?:-color|-image)?|font(?:-family|-size|-weight)?|margin(?:-[a-z]+)?|padding(?:-[a-z]+)?|border(?:-[a-z]+)?|color|display|width|height|text-align|line-height|letter-spacing|position|float|z-index|overflow|opacity)\s*:\s*[^;\n]{1,80};?",
    )
    .unwrap()
});

/// Structured-data fragments left behind by sloppy markup.
static JSONLD_REMNANT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\{\s*"@(?:context|type|graph)"[^{}]*\}"#).unwrap());

/// Bracketed type-declaration leftovers like `[NewsArticle, Article]`.
static TYPE_BRACKETS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[\s*[A-Za-z]*(?:News)?Article[A-Za-z]*(?:\s*,\s*[A-Za-z]+)*\s*\]").unwrap()
});

/// Photo-caption parentheticals: `(Photo: ...)`, `(AP Photo/...)`.
static CAPTION_PARENS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\(\s*(?:photo|image|illustration|ap photo|getty|reuters|credit)[^)]*\)")
        .unwrap()
});

/// A line consisting only of a parenthetical is navigation, not prose.
static PAREN_ONLY: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\([^)]*\)$").unwrap());

/// Raw markup tags surviving into text.
static MARKUP_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"</?[a-zA-Z][^>\n]{0,120}>").unwrap());

static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

static SENTENCE_END: Lazy<Regex> = Lazy::new(|| Regex::new(r"[.!?](?:\s|$)").unwrap());

/// Paragraph/sentence/word counts for the cleaned body, consumed by the
/// quality scorer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TextStats {
    pub paragraphs: usize,
    pub sentences: usize,
    pub words: usize,
}

impl TextStats {
    /// Measure a cleaned body where paragraphs are separated by blank lines.
    pub fn measure(body: &str) -> Self {
        Self {
            paragraphs: body.split("\n\n").filter(|p| !p.trim().is_empty()).count(),
            sentences: SENTENCE_END.find_iter(body).count(),
            words: body.split_whitespace().count(),
        }
    }
}

/// Gather the text of an HTML subtree, skipping noise elements.
///
/// One line per block-level element, so downstream cleaning sees
/// paragraph boundaries.
pub fn collect_text(root: ElementRef<'_>) -> String {
    let mut out = String::new();
    if !is_noise(root) {
        push_text(root, &mut out);
    }
    out
}

fn push_text(el: ElementRef<'_>, out: &mut String) {
    for child in el.children() {
        if let Some(text) = child.value().as_text() {
            out.push_str(&text.text);
        } else if let Some(child_el) = ElementRef::wrap(child) {
            if is_noise(child_el) {
                continue;
            }
            push_text(child_el, out);
            if is_block(child_el) {
                out.push('\n');
            }
        }
    }
}

fn is_noise(el: ElementRef<'_>) -> bool {
    let name = el.value().name();
    if NOISE_TAGS.contains(&name) {
        return true;
    }
    let marker = |attr: &str| {
        el.value()
            .attr(attr)
            .map(|v| {
                let v = v.to_lowercase();
                NOISE_TOKENS.iter().any(|t| v.contains(t))
            })
            .unwrap_or(false)
    };
    marker("class") || marker("id")
}

fn is_block(el: ElementRef<'_>) -> bool {
    matches!(
        el.value().name(),
        "p" | "div"
            | "section"
            | "article"
            | "blockquote"
            | "li"
            | "br"
            | "tr"
            | "h1"
            | "h2"
            | "h3"
            | "h4"
            | "h5"
            | "h6"
    )
}

/// Normalize extracted body text and measure it for scoring.
///
/// Applies, in order: style-leakage removal, structured-data remnant
/// removal, caption-parenthetical removal, per-line filtering
/// (navigation-only and boilerplate lines), whitespace collapsing, and
/// entity decoding. Returns the cleaned body and its [`TextStats`].
pub fn clean_text(config: &SourceConfig, raw: &str) -> (String, TextStats) {
    let text = STYLE_LEAKAGE.replace_all(raw, " ");
    let text = JSONLD_REMNANT.replace_all(&text, " ");
    let text = TYPE_BRACKETS.replace_all(&text, " ");
    let text = CAPTION_PARENS.replace_all(&text, " ");

    let mut kept: Vec<String> = Vec::new();
    for line in text.lines() {
        let line = WHITESPACE_RUN.replace_all(line.trim(), " ").into_owned();
        if line.is_empty() || PAREN_ONLY.is_match(&line) {
            continue;
        }
        let lower = line.to_lowercase();
        if config
            .boilerplate_phrases
            .iter()
            .any(|p| !p.is_empty() && lower.starts_with(&p.to_lowercase()))
        {
            continue;
        }
        kept.push(line);
    }

    let body = html_escape::decode_html_entities(&kept.join("\n\n")).into_owned();
    let stats = TextStats::measure(&body);
    (body, stats)
}

/// Count how many distinct contamination kinds appear in a body.
///
/// Used by the scorer: a fully clean body counts zero.
pub fn contamination_kinds(body: &str) -> usize {
    [
        STYLE_LEAKAGE.is_match(body),
        JSONLD_REMNANT.is_match(body),
        TYPE_BRACKETS.is_match(body),
        MARKUP_TAG.is_match(body),
    ]
    .into_iter()
    .filter(|hit| *hit)
    .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::{Html, Selector};

    fn cfg() -> SourceConfig {
        SourceConfig {
            name: "example".to_string(),
            base_url: "https://example.com".to_string(),
            ..SourceConfig::default()
        }
    }

    #[test]
    fn test_style_leakage_removed() {
        let raw = "Officials confirmed the plan. background-color:#fff; cursor:pointer; More \
                   details followed in the afternoon briefing.";
        let (body, _) = clean_text(&cfg(), raw);
        assert!(!body.contains("cursor"));
        assert!(!body.contains("background-color"));
        assert!(body.contains("Officials confirmed the plan."));
        assert!(body.contains("More details followed"));
    }

    #[test]
    fn test_structured_data_remnants_removed() {
        let raw = "The council voted on Tuesday. {\"@context\": \"https://schema.org\"} \
                   [NewsArticle, Article] The measure passed narrowly.";
        let (body, _) = clean_text(&cfg(), raw);
        assert!(!body.contains("@context"));
        assert!(!body.contains("[NewsArticle"));
        assert!(body.contains("The measure passed narrowly."));
    }

    #[test]
    fn test_paren_only_lines_dropped() {
        let raw = "A real paragraph about the storm.\n(continue reading)\nAnother paragraph.";
        let (body, stats) = clean_text(&cfg(), raw);
        assert!(!body.contains("continue reading"));
        assert_eq!(stats.paragraphs, 2);
    }

    #[test]
    fn test_caption_parentheticals_removed() {
        let raw = "The mayor spoke at the ceremony. (Photo: City Hall press office) The crowd \
                   stayed for an hour.";
        let (body, _) = clean_text(&cfg(), raw);
        assert!(!body.contains("press office"));
        assert!(body.contains("The crowd stayed"));
    }

    #[test]
    fn test_boilerplate_lines_dropped() {
        let raw = "Advertisement\nThe new policy takes effect in March.\nSubscribe to our \
                   newsletter for updates";
        let (body, stats) = clean_text(&cfg(), raw);
        assert!(!body.to_lowercase().contains("advertisement"));
        assert!(!body.to_lowercase().contains("newsletter"));
        assert_eq!(stats.paragraphs, 1);
    }

    #[test]
    fn test_entities_decoded_and_whitespace_collapsed() {
        let raw = "Ben &amp; Jerry announced   a new\tflavor.";
        let (body, _) = clean_text(&cfg(), raw);
        assert_eq!(body, "Ben & Jerry announced a new flavor.");
    }

    #[test]
    fn test_stats_counts() {
        let body = "One sentence here. Two now!\n\nSecond paragraph? Yes.";
        let stats = TextStats::measure(body);
        assert_eq!(stats.paragraphs, 2);
        assert_eq!(stats.sentences, 4);
        assert_eq!(stats.words, 9);
    }

    #[test]
    fn test_contamination_detection() {
        assert_eq!(contamination_kinds("perfectly clean prose."), 0);
        assert!(contamination_kinds("text cursor:pointer; more") >= 1);
        assert!(contamination_kinds("text <div class=\"x\"> more") >= 1);
    }

    #[test]
    fn test_collect_text_skips_noise_subtrees() {
        let html = Html::parse_document(
            r##"<article>
                <p>First paragraph of the story.</p>
                <script>var tracker = 1;</script>
                <div class="share-tools"><a href="#">Share on X</a></div>
                <p>Second paragraph of the story.</p>
                <footer>Contact us</footer>
            </article>"##,
        );
        let selector = Selector::parse("article").unwrap();
        let article = html.select(&selector).next().unwrap();
        let text = collect_text(article);
        assert!(text.contains("First paragraph"));
        assert!(text.contains("Second paragraph"));
        assert!(!text.contains("tracker"));
        assert!(!text.contains("Share on X"));
        assert!(!text.contains("Contact us"));
    }

    #[test]
    fn test_collect_text_separates_blocks() {
        let html = Html::parse_document("<div><p>One.</p><p>Two.</p></div>");
        let selector = Selector::parse("div").unwrap();
        let div = html.select(&selector).next().unwrap();
        let text = collect_text(div);
        assert!(text.contains("One.\n"));
        assert!(text.contains("Two."));
    }
}
