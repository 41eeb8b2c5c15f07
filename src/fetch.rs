//! # Fetch Module
//!
//! HTTP fetching and page extraction behind the `Fetcher` collaborator
//! trait.
//!
//! ## Overview
//!
//! A `Fetcher` turns one URL into crawl items plus the links discovered on
//! the page. The default `HttpFetcher` performs the request with a shared
//! `reqwest` client, sanitizes the body, and extracts title, text, and
//! outbound links. Fetch failures surface as `CrawlError::Network` and are
//! contained by the crawl loop; they never abort the run.
//!
//! HTML parsing happens in a synchronous helper so the parsed document
//! never lives across an await point.

use std::collections::HashSet;
use std::time::Instant;

use async_trait::async_trait;
use reqwest::Client;
use scraper::{Html, Selector};
use tracing::{debug, trace};
use url::Url;

use crate::config::CrawlConfig;
use crate::error::CrawlError;
use crate::item::CrawlItem;
use crate::text;

/// Result of fetching one URL: the items scraped from the page and the
/// outbound links found on it, plus transfer metadata for accounting.
#[derive(Debug, Default)]
pub struct FetchOutput {
    pub items: Vec<CrawlItem>,
    pub discovered_urls: Vec<String>,
    /// HTTP status of the response, when the fetch went over HTTP.
    pub status: Option<u16>,
    pub bytes_downloaded: usize,
}

/// Collaborator that fetches one URL and produces crawl items.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchOutput, CrawlError>;
}

/// Default HTTP fetcher backed by a shared `reqwest` client.
pub struct HttpFetcher {
    client: Client,
    title_selector: Selector,
    body_selector: Selector,
    link_selector: Selector,
}

impl HttpFetcher {
    pub fn new(config: &CrawlConfig) -> Result<Self, CrawlError> {
        let client = Client::builder()
            .timeout(config.fetch_timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| CrawlError::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(HttpFetcher {
            client,
            title_selector: Selector::parse("title").expect("title selector"),
            body_selector: Selector::parse("body").expect("body selector"),
            link_selector: Selector::parse("a[href]").expect("link selector"),
        })
    }

    /// Parses the sanitized page and builds the item plus discovered links.
    fn extract(&self, url: &str, html: &str) -> (CrawlItem, Vec<String>) {
        let document = Html::parse_document(html);

        let title = document
            .select(&self.title_selector)
            .next()
            .map(|t| text::collapse_whitespace(&t.text().collect::<Vec<_>>().join(" ")))
            .unwrap_or_default();

        let body_text = document
            .select(&self.body_selector)
            .next()
            .map(|b| b.text().collect::<Vec<_>>().join(" "))
            .unwrap_or_default();
        let cleaned = text::collapse_whitespace(&body_text);

        let base = Url::parse(url).ok();
        let mut seen = HashSet::new();
        let mut discovered = Vec::new();
        for element in document.select(&self.link_selector) {
            let Some(href) = element.value().attr("href") else {
                continue;
            };
            let Some(resolved) = resolve_link(base.as_ref(), href) else {
                continue;
            };
            if seen.insert(resolved.clone()) {
                discovered.push(resolved);
            }
        }
        trace!("Extracted {} unique links from {}", discovered.len(), url);

        let item = CrawlItem::new(url, title, html, cleaned, 0);
        (item, discovered)
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchOutput, CrawlError> {
        debug!("Fetching URL: {}", url);
        let started = Instant::now();
        let response = self.client.get(url).send().await.map_err(|e| {
            CrawlError::Network {
                url: url.to_string(),
                reason: e.to_string(),
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(CrawlError::Network {
                url: url.to_string(),
                reason: format!("HTTP status {}", status),
            });
        }

        let raw = response.text().await.map_err(|e| CrawlError::Network {
            url: url.to_string(),
            reason: format!("failed to read body: {}", e),
        })?;
        let latency = started.elapsed();
        let bytes_downloaded = raw.len();

        let clamped = text::clamp_bytes(&raw, text::MAX_RAW_BYTES);
        let sanitized = text::strip_noise_tags(clamped);

        let (mut item, discovered_urls) = self.extract(url, &sanitized);
        item.fetch_latency = latency;

        Ok(FetchOutput {
            items: vec![item],
            discovered_urls,
            status: Some(status.as_u16()),
            bytes_downloaded,
        })
    }
}

/// Resolves a raw href against its page URL, keeping only http(s) targets.
fn resolve_link(base: Option<&Url>, href: &str) -> Option<String> {
    let trimmed = href.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return None;
    }
    let resolved = match Url::parse(trimmed) {
        Ok(absolute) => absolute,
        Err(_) => base?.join(trimmed).ok()?,
    };
    match resolved.scheme() {
        "http" | "https" => Some(resolved.to_string()),
        _ => None,
    }
}
