pub mod extract;

use crate::config::DomSourceConfig;
use crate::domain::model::{
    CandidateListing, FailureKind, FetchContext, FetchOutcome, SearchQuery,
};
use crate::domain::ports::{BrowserSession, PageHandle, SourceAdapter};
use crate::utils::error::{Result, SourceError};
use async_trait::async_trait;
use extract::{extract_listings, HeuristicExtractor, StructuredExtractor};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(15);
pub const DEFAULT_NAVIGATION_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_MAX_LISTINGS: usize = 20;

/// Texts a host serves instead of results when it refuses the client.
pub const DEFAULT_BLOCK_MARKERS: [&str; 5] = [
    "アクセスが拒否されました",
    "Forbidden",
    "Access Denied",
    "Request blocked",
    "captcha",
];

struct PageSnapshot {
    title: String,
    html: String,
    container_found: bool,
}

/// Scrapes a search results page through the shared headless browser.
pub struct DomAdapter {
    name: String,
    host: String,
    search_url: String,
    wait_selector: String,
    structured: StructuredExtractor,
    heuristic: HeuristicExtractor,
    browser: Arc<dyn BrowserSession>,
    wait_timeout: Duration,
    navigation_timeout: Duration,
    min_interval: Duration,
    max_listings: usize,
    free_text: bool,
    block_markers: Vec<String>,
}

impl DomAdapter {
    pub fn from_config(config: &DomSourceConfig, browser: Arc<dyn BrowserSession>) -> Result<Self> {
        let structured = StructuredExtractor::new(
            &config.item_selector,
            &config.name_selector,
            &config.price_selector,
            config.link_selector.as_deref(),
        )?;

        let host = crate::adapters::http::host_of(&config.search_url.replace("{query}", ""));
        let block_markers = config.block_markers.clone().unwrap_or_else(|| {
            DEFAULT_BLOCK_MARKERS.iter().map(|m| m.to_string()).collect()
        });

        Ok(Self {
            name: config.name.clone(),
            host,
            search_url: config.search_url.clone(),
            wait_selector: config
                .result_selector
                .clone()
                .unwrap_or_else(|| config.item_selector.clone()),
            structured,
            heuristic: HeuristicExtractor::new()?,
            browser,
            wait_timeout: config
                .wait_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_WAIT_TIMEOUT),
            navigation_timeout: config
                .navigation_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_NAVIGATION_TIMEOUT),
            min_interval: config
                .min_interval_ms
                .map(Duration::from_millis)
                .unwrap_or(Duration::ZERO),
            max_listings: config.max_listings.unwrap_or(DEFAULT_MAX_LISTINGS),
            free_text: config.free_text.unwrap_or(false),
            block_markers,
        })
    }

    pub fn with_timeouts(mut self, navigation: Duration, wait: Duration) -> Self {
        self.navigation_timeout = navigation;
        self.wait_timeout = wait;
        self
    }

    pub fn search_url_for(&self, term: &str) -> String {
        let encoded: String = url::form_urlencoded::byte_serialize(term.as_bytes()).collect();
        self.search_url.replace("{query}", &encoded)
    }

    fn blocked_marker<'a>(&'a self, text: &str) -> Option<&'a str> {
        let lower = text.to_lowercase();
        self.block_markers
            .iter()
            .find(|m| lower.contains(&m.to_lowercase()))
            .map(String::as_str)
    }

    async fn read_page(
        &self,
        page: &mut dyn PageHandle,
        url: &str,
    ) -> std::result::Result<PageSnapshot, SourceError> {
        match tokio::time::timeout(self.navigation_timeout, page.navigate(url)).await {
            Err(_) => {
                return Err(SourceError::new(
                    FailureKind::NavigationTimeout,
                    format!("navigation exceeded {:?}", self.navigation_timeout),
                ))
            }
            Ok(Err(e)) => return Err(SourceError::unavailable(e.to_string())),
            Ok(Ok(())) => {}
        }

        let container_found = page
            .wait_for_selector(&self.wait_selector, self.wait_timeout)
            .await?;

        Ok(PageSnapshot {
            title: page.title().await?,
            html: page.content().await?,
            container_found,
        })
    }

    async fn scrape(
        &self,
        query: &SearchQuery,
        ctx: &FetchContext,
    ) -> std::result::Result<Vec<CandidateListing>, SourceError> {
        let url = self.search_url_for(&query.term);
        let base = Url::parse(&url).map_err(|e| {
            SourceError::new(FailureKind::Parse, format!("bad search URL {}: {}", url, e))
        })?;

        tracing::debug!(source = %self.name, "Navigating to {}", url);
        let mut page = self.browser.open_page(&ctx.user_agent).await?;
        let snapshot = self.read_page(page.as_mut(), &url).await;
        if let Err(e) = page.close().await {
            tracing::debug!(source = %self.name, "Failed to close tab: {}", e);
        }
        let snapshot = snapshot?;

        if let Some(marker) = self.blocked_marker(&snapshot.title) {
            return Err(SourceError::new(
                FailureKind::BlockedByHost,
                format!("block page detected in title ({})", marker),
            ));
        }

        let extraction = extract_listings(&snapshot.html, &base, &self.structured, &self.heuristic);

        if extraction.used_fallback {
            tracing::warn!(
                source = %self.name,
                kind = %FailureKind::SelectorNotFound,
                container_found = snapshot.container_found,
                "Primary selector matched nothing; using link heuristics ({} found)",
                extraction.listings.len()
            );
            if extraction.listings.is_empty() {
                if let Some(marker) = self.blocked_marker(&snapshot.html) {
                    return Err(SourceError::new(
                        FailureKind::BlockedByHost,
                        format!("block page detected in body ({})", marker),
                    ));
                }
            }
        }

        Ok(extraction
            .listings
            .into_iter()
            .filter_map(|l| {
                CandidateListing::new(&query.identifier, &self.name, &l.name, l.price, &l.url)
            })
            .take(self.max_listings)
            .collect())
    }
}

#[async_trait]
impl SourceAdapter for DomAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn host(&self) -> &str {
        &self.host
    }

    fn min_interval(&self) -> Duration {
        self.min_interval
    }

    fn wants_free_text(&self) -> bool {
        self.free_text
    }

    async fn fetch(&self, query: &SearchQuery, ctx: &FetchContext) -> FetchOutcome {
        let result = self.scrape(query, ctx).await;
        match &result {
            Ok(listings) => {
                tracing::info!(source = %self.name, "Scraped {} listing(s)", listings.len())
            }
            Err(e) => {
                tracing::warn!(source = %self.name, kind = %e.kind, "Scrape failed: {}", e.message)
            }
        }
        FetchOutcome::from_result(result)
    }
}
