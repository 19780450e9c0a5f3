//! HTTP fetch seam and the per-URL fetch strategy chain.
//!
//! The HTTP capability is the [`Fetch`] trait: production code uses
//! [`HttpFetcher`] (a `reqwest` client with per-variant header hints),
//! tests substitute instrumented stubs. The client value is passed per
//! run; there is no shared global instance.
//!
//! [`fetch_article`] tries an ordered list of fetch tiers for one URL,
//! stopping at the first result that extraction accepts:
//!
//! 1. provider-side structured parse (JSON endpoint)
//! 2. lightweight markup variant of the URL
//! 3. the canonical URL parsed as HTML
//! 4. a text-extraction proxy as last resort
//!
//! Each tier cycles through the configured request variants with a fixed
//! backoff between retries. An exhausted chain yields `None`: the URL is
//! logged as a skip, never propagated as an error.

use crate::config::{FetchVariant, SourceConfig};
use crate::error::FetchError;
use crate::extract::{self, Payload};
use crate::identity;
use crate::models::ExtractedFields;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::header::{ACCEPT_LANGUAGE, REFERER, USER_AGENT};
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, instrument, warn};

/// Titles marking error/placeholder pages that slip past extraction.
static ERROR_TITLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:404|page not found|not found|access denied|forbidden|an error occurred)\b")
        .unwrap()
});

/// A fetched response body with its status.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub status: u16,
    pub body: String,
}

/// The HTTP capability consumed by the pipeline.
///
/// One method: fetch a URL with a request variant's header hints and a
/// per-attempt timeout. Implementations must be shareable across the
/// worker pool.
#[async_trait]
pub trait Fetch: Send + Sync {
    async fn get(
        &self,
        url: &str,
        variant: &FetchVariant,
        timeout: Duration,
    ) -> Result<FetchResponse, FetchError>;
}

/// Production [`Fetch`] implementation over a `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { client }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    async fn get(
        &self,
        url: &str,
        variant: &FetchVariant,
        timeout: Duration,
    ) -> Result<FetchResponse, FetchError> {
        let mut request = self
            .client
            .get(url)
            .header(USER_AGENT, &variant.user_agent)
            .header(ACCEPT_LANGUAGE, &variant.accept_language)
            .timeout(timeout);
        if let Some(referer) = &variant.referer {
            request = request.header(REFERER, referer);
        }

        let response = request
            .send()
            .await
            .map_err(|e| classify_error(url, timeout, e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        let body = response
            .text()
            .await
            .map_err(|e| classify_error(url, timeout, e))?;
        Ok(FetchResponse {
            status: status.as_u16(),
            body,
        })
    }
}

fn classify_error(url: &str, timeout: Duration, e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
            secs: timeout.as_secs(),
        }
    } else {
        FetchError::Request {
            url: url.to_string(),
            reason: e.to_string(),
        }
    }
}

/// One strategy in the ordered fallback chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Structured,
    Lite,
    Canonical,
    TextProxy,
}

impl Tier {
    const ORDER: [Tier; 4] = [Tier::Structured, Tier::Lite, Tier::Canonical, Tier::TextProxy];
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Tier::Structured => "structured",
            Tier::Lite => "lite",
            Tier::Canonical => "canonical",
            Tier::TextProxy => "text-proxy",
        };
        write!(f, "{s}")
    }
}

/// Bookkeeping for one strategy try, surfaced through logging.
#[derive(Debug)]
struct FetchAttempt<'a> {
    tier: Tier,
    variant: &'a str,
    outcome: &'static str,
}

/// Retrieve usable article fields for one URL via the tier chain.
///
/// Returns `None` when every tier and variant is exhausted; the caller
/// counts the URL as skipped.
#[instrument(level = "debug", skip_all, fields(%url))]
pub async fn fetch_article(
    fetcher: &dyn Fetch,
    config: &SourceConfig,
    url: &str,
) -> Option<ExtractedFields> {
    for tier in Tier::ORDER {
        let Some(request_url) = tier_url(tier, config, url) else {
            continue;
        };
        if let Some(fields) = try_tier(fetcher, config, url, tier, &request_url).await {
            return Some(fields);
        }
    }
    info!(%url, "all fetch tiers exhausted; skipping URL");
    None
}

/// Build the request URL for a tier, or `None` when the tier is not
/// configured for this source.
fn tier_url(tier: Tier, config: &SourceConfig, url: &str) -> Option<String> {
    match tier {
        Tier::Structured => config.structured_endpoint.as_ref().map(|template| {
            template.replace(
                "{url}",
                &urlencoding::encode(&identity::canonicalize(url)),
            )
        }),
        Tier::Lite => config
            .lite_url_template
            .as_ref()
            .map(|template| template.replace("{url}", url)),
        Tier::Canonical => Some(identity::canonicalize(url)),
        Tier::TextProxy => config
            .text_proxy
            .as_ref()
            .map(|template| template.replace("{url}", &urlencoding::encode(url))),
    }
}

/// Cycle the variant list for one tier. Fetch failures advance to the
/// next variant after the fixed backoff; a fetched-but-unusable payload
/// advances straight to the next tier.
async fn try_tier(
    fetcher: &dyn Fetch,
    config: &SourceConfig,
    article_url: &str,
    tier: Tier,
    request_url: &str,
) -> Option<ExtractedFields> {
    for (retry, variant) in config.variants.iter().enumerate() {
        if retry > 0 {
            sleep(config.variant_backoff()).await;
        }

        let response = match timeout(
            config.fetch_timeout(),
            fetcher.get(request_url, variant, config.fetch_timeout()),
        )
        .await
        {
            Err(_) => Err(FetchError::Timeout {
                url: request_url.to_string(),
                secs: config.fetch_timeout_secs,
            }),
            Ok(result) => result,
        };

        let response = match response {
            Ok(r) => r,
            Err(e) => {
                let attempt = FetchAttempt {
                    tier,
                    variant: &variant.name,
                    outcome: "failed",
                };
                warn!(tier = %attempt.tier, variant = attempt.variant, error = %e, "fetch attempt failed");
                continue;
            }
        };

        let payload = match tier {
            Tier::Structured => match serde_json::from_str::<Value>(&response.body) {
                Ok(value) => Payload::Structured(value),
                Err(e) => {
                    debug!(tier = %tier, error = %e, "structured endpoint returned non-JSON; advancing tier");
                    return None;
                }
            },
            Tier::Lite | Tier::Canonical => Payload::Html(response.body),
            Tier::TextProxy => Payload::Text(response.body),
        };

        let fields = extract::extract(config, article_url, &payload).filter(accepts);
        let attempt = FetchAttempt {
            tier,
            variant: &variant.name,
            outcome: if fields.is_some() { "accepted" } else { "rejected" },
        };
        debug!(tier = %attempt.tier, variant = attempt.variant, outcome = attempt.outcome, "fetch attempt finished");

        // The fetch itself worked; an unusable payload will not improve
        // with a different variant.
        return fields;
    }
    None
}

/// Acceptance on top of extraction's own validation: error and
/// placeholder pages are long enough to pass the length check but carry
/// a telltale title.
fn accepts(fields: &ExtractedFields) -> bool {
    !ERROR_TITLE.is_match(&fields.title)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StubFetcher;
    use serde_json::json;

    fn cfg() -> SourceConfig {
        SourceConfig {
            name: "example".to_string(),
            base_url: "https://example.com".to_string(),
            min_body_len: 100,
            variant_backoff_ms: 0,
            fetch_timeout_secs: 5,
            ..SourceConfig::default()
        }
    }

    fn long_body(label: &str) -> String {
        format!(
            "{label} coverage continued as officials confirmed the details of the plan and \
             residents weighed what the changes would mean for their neighborhoods this year."
        )
    }

    fn article_html(title: &str, body: &str) -> String {
        format!("<html><head><title>{title}</title></head><body><article><p>{body}</p></article></body></html>")
    }

    #[tokio::test]
    async fn test_short_tier_result_falls_through() {
        // Tier 1 returns a titled payload with a 40-char body; tier 3
        // serves 150+ chars. The accepted result must be tier 3's.
        let url = "https://example.com/2025/08/01/story";
        let structured_url = format!(
            "https://api.example.com/parse?url={}",
            urlencoding::encode(url)
        );
        let short = json!({"headline": "Story", "content": "Forty characters of body text, roughly."});

        let fetcher = StubFetcher::new()
            .ok(&structured_url, &short.to_string())
            .ok(url, &article_html("Story", &long_body("Canonical")));

        let config = SourceConfig {
            structured_endpoint: Some("https://api.example.com/parse?url={url}".to_string()),
            ..cfg()
        };

        let fields = fetch_article(&fetcher, &config, url).await.unwrap();
        assert!(fields.body_text.contains("Canonical coverage"));
    }

    #[tokio::test]
    async fn test_accepted_result_never_below_minimum() {
        let url = "https://example.com/story";
        let fetcher = StubFetcher::new().ok(url, &article_html("Story", "way too short"));
        let config = cfg();

        assert!(fetch_article(&fetcher, &config, url).await.is_none());
    }

    #[tokio::test]
    async fn test_variant_cycling_on_blocked_request() {
        let url = "https://example.com/story";
        let fetcher = StubFetcher::new()
            .fail(url, 403)
            .ok(url, &article_html("Story", &long_body("Second variant")));
        let config = cfg();

        let fields = fetch_article(&fetcher, &config, url).await.unwrap();
        assert!(fields.body_text.contains("Second variant"));
        // Both variants were spent on the same request URL.
        assert_eq!(
            fetcher.calls().iter().filter(|u| u.as_str() == url).count(),
            2
        );
    }

    #[tokio::test]
    async fn test_error_page_rejected_by_acceptance() {
        let url = "https://example.com/story";
        let fetcher = StubFetcher::new().ok(
            url,
            &article_html("Page Not Found", &long_body("Placeholder")),
        );
        let config = cfg();

        assert!(fetch_article(&fetcher, &config, url).await.is_none());
    }

    #[tokio::test]
    async fn test_text_proxy_last_resort() {
        let url = "https://example.com/story";
        let proxy_url = format!(
            "https://textproxy.example.com/{}",
            urlencoding::encode(url)
        );
        let fetcher = StubFetcher::new()
            .fail(url, 403)
            .fail(url, 403)
            .ok(&proxy_url, &format!("Harbor Reopens\n{}", long_body("Proxy")));

        let config = SourceConfig {
            text_proxy: Some("https://textproxy.example.com/{url}".to_string()),
            ..cfg()
        };

        let fields = fetch_article(&fetcher, &config, url).await.unwrap();
        assert_eq!(fields.title, "Harbor Reopens");
        assert!(fields.body_text.contains("Proxy coverage"));
    }

    #[tokio::test]
    async fn test_lite_template_substitution() {
        let url = "https://example.com/story";
        let lite_url = "https://example.com/story?outputType=amp";
        let fetcher = StubFetcher::new()
            .ok(lite_url, &article_html("Story", &long_body("Lite")));

        let config = SourceConfig {
            lite_url_template: Some("{url}?outputType=amp".to_string()),
            ..cfg()
        };

        let fields = fetch_article(&fetcher, &config, url).await.unwrap();
        assert!(fields.body_text.contains("Lite coverage"));
        assert_eq!(fetcher.calls()[0], lite_url);
    }

    #[tokio::test]
    async fn test_exhausted_chain_is_a_skip() {
        let fetcher = StubFetcher::new();
        let config = cfg();
        assert!(
            fetch_article(&fetcher, &config, "https://example.com/gone")
                .await
                .is_none()
        );
    }

    #[test]
    fn test_tier_urls() {
        let config = SourceConfig {
            structured_endpoint: Some("https://api.example.com/p?u={url}".to_string()),
            lite_url_template: Some("{url}/amp".to_string()),
            text_proxy: Some("https://proxy.example.com/{url}".to_string()),
            ..cfg()
        };
        let url = "https://example.com/story?utm_source=x";

        assert_eq!(
            tier_url(Tier::Canonical, &config, url).unwrap(),
            "https://example.com/story"
        );
        assert_eq!(
            tier_url(Tier::Lite, &config, url).unwrap(),
            "https://example.com/story?utm_source=x/amp"
        );
        assert!(
            tier_url(Tier::Structured, &config, url)
                .unwrap()
                .starts_with("https://api.example.com/p?u=https%3A%2F%2F")
        );
        assert_eq!(tier_url(Tier::Structured, &cfg(), url), None);
    }
}
