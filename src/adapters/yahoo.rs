use crate::adapters::http::{self, get_json, price_value, string_or_number};
use crate::config::{resolve_secret, YahooConfig, YAHOO_ENDPOINT};
use crate::domain::model::{
    CandidateListing, FailureKind, FetchContext, FetchOutcome, Identifier, SearchQuery,
};
use crate::domain::ports::{NameResolver, SourceAdapter};
use crate::utils::error::{Result, SourceError};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

pub const SOURCE_NAME: &str = "yahoo";
const DEFAULT_RESULTS: u32 = 30;
const DEFAULT_MIN_INTERVAL: Duration = Duration::from_millis(1000);

/// Yahoo! Shopping item search. Barcodes go through the `jan_code`
/// parameter, anything else through the free-text `query`.
pub struct YahooShoppingAdapter {
    client: Client,
    endpoint: String,
    host: String,
    app_id: Option<String>,
    results: u32,
    min_interval: Duration,
}

impl YahooShoppingAdapter {
    pub fn new(client: Client, endpoint: &str, app_id: Option<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.to_string(),
            host: http::host_of(endpoint),
            app_id,
            results: DEFAULT_RESULTS,
            min_interval: DEFAULT_MIN_INTERVAL,
        }
    }

    pub fn from_config(config: &YahooConfig, client: Client) -> Self {
        let endpoint = config.endpoint.as_deref().unwrap_or(YAHOO_ENDPOINT);
        let mut adapter = Self::new(client, endpoint, resolve_secret(config.app_id.as_ref()));
        if let Some(results) = config.results {
            adapter.results = results.clamp(1, 100);
        }
        if let Some(ms) = config.min_interval_ms {
            adapter.min_interval = Duration::from_millis(ms);
        }
        adapter
    }

    fn app_id(&self) -> std::result::Result<&str, SourceError> {
        self.app_id
            .as_deref()
            .ok_or_else(|| SourceError::config_missing("Yahoo app id is not set"))
    }

    async fn search(
        &self,
        term: &str,
        ctx: &FetchContext,
        in_stock_only: bool,
    ) -> std::result::Result<Value, SourceError> {
        let app_id = self.app_id()?;
        let results = self.results.to_string();
        let term_param = if is_barcode_term(term) { "jan_code" } else { "query" };

        let mut params = vec![
            ("appid", app_id),
            (term_param, term),
            ("sort", "+price"),
            ("results", results.as_str()),
        ];
        if in_stock_only {
            params.push(("in_stock", "true"));
        }

        let request = self
            .client
            .get(&self.endpoint)
            .header(reqwest::header::USER_AGENT, &ctx.user_agent)
            .query(&params);

        get_json(request, SOURCE_NAME).await
    }
}

fn is_barcode_term(term: &str) -> bool {
    Identifier::parse(term).is_some_and(|i| i.is_barcode())
}

#[async_trait]
impl SourceAdapter for YahooShoppingAdapter {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    fn host(&self) -> &str {
        &self.host
    }

    fn min_interval(&self) -> Duration {
        self.min_interval
    }

    async fn fetch(&self, query: &SearchQuery, ctx: &FetchContext) -> FetchOutcome {
        let result = match self.search(&query.term, ctx, true).await {
            Ok(body) => parse_hits(&body, &query.identifier),
            Err(e) => Err(e),
        };
        if let Err(e) = &result {
            tracing::warn!(source = SOURCE_NAME, kind = %e.kind, "Search failed: {}", e.message);
        }
        FetchOutcome::from_result(result)
    }
}

#[async_trait]
impl NameResolver for YahooShoppingAdapter {
    fn host(&self) -> &str {
        &self.host
    }

    fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Name of the first catalogue hit for the barcode, sold out or not.
    async fn resolve(
        &self,
        barcode: &Identifier,
        ctx: &FetchContext,
    ) -> std::result::Result<String, SourceError> {
        let body = self.search(barcode.as_str(), ctx, false).await?;
        hits(&body)?
            .iter()
            .find_map(|hit| hit.get("name").and_then(Value::as_str))
            .filter(|name| !name.trim().is_empty())
            .map(|name| name.trim().to_string())
            .ok_or_else(|| SourceError::new(FailureKind::Parse, "no catalogue entry for barcode"))
    }
}

fn hits(body: &Value) -> std::result::Result<&Vec<Value>, SourceError> {
    body.get("hits")
        .and_then(Value::as_array)
        .ok_or_else(|| SourceError::schema("Yahoo response has no hits array"))
}

pub fn parse_hits(
    body: &Value,
    identifier: &Identifier,
) -> std::result::Result<Vec<CandidateListing>, SourceError> {
    let mut candidates: Vec<CandidateListing> = hits(body)?
        .iter()
        .filter_map(|hit| parse_hit(hit, identifier))
        .collect();
    candidates.sort_by_key(|c| c.price());
    Ok(candidates)
}

fn parse_hit(hit: &Value, identifier: &Identifier) -> Option<CandidateListing> {
    let name = hit.get("name").and_then(Value::as_str)?;
    let price = price_value(hit.get("price"))?;
    let url = hit.get("url").and_then(Value::as_str).unwrap_or_default();

    let image = hit
        .get("image")
        .and_then(|i| i.get("medium"))
        .and_then(Value::as_str)
        .map(str::to_string);
    let category = string_or_number(hit.get("genreCategory").and_then(|g| g.get("id")));

    let mut candidate = CandidateListing::new(identifier, SOURCE_NAME, name, price, url)?
        .with_image_url(image)
        .with_category_id(category);

    if hit.get("inStock").and_then(Value::as_bool) == Some(false) {
        candidate = candidate.with_flag("sold out");
    }
    if let Some(condition) = hit.get("condition").and_then(Value::as_str) {
        if condition != "new" {
            candidate = candidate.with_flag(condition);
        }
    }
    Some(candidate)
}

pub fn build(config: &YahooConfig) -> Result<YahooShoppingAdapter> {
    let client = http::build_client(http::DEFAULT_REQUEST_TIMEOUT)?;
    Ok(YahooShoppingAdapter::from_config(config, client))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::EmptyReason;
    use httpmock::prelude::*;
    use serde_json::json;

    fn ctx() -> FetchContext {
        FetchContext {
            user_agent: "test-agent".to_string(),
        }
    }

    fn adapter(server: &MockServer) -> YahooShoppingAdapter {
        let app_id = Some("yid".to_string());
        YahooShoppingAdapter::new(Client::new(), &server.url("/itemSearch"), app_id)
    }

    #[test]
    fn test_parse_hits_flags_and_order() {
        let ident = Identifier::parse("4549995423319").unwrap();
        let body = json!({
            "totalResultsAvailable": 3,
            "hits": [
                {"name": "X 128GB", "price": 42000, "url": "https://store.shopping.yahoo.co.jp/a",
                 "inStock": true, "condition": "new", "image": {"medium": "https://img/a.jpg"},
                 "genreCategory": {"id": 38338}},
                {"name": "X 128GB 中古", "price": 36000, "url": "https://store.shopping.yahoo.co.jp/b",
                 "inStock": false, "condition": "used"},
                {"price": 100}
            ]
        });

        let candidates = parse_hits(&body, &ident).unwrap();

        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].price(), 36000);
        assert!(candidates[0].condition_flags().contains("sold out"));
        assert!(candidates[0].condition_flags().contains("used"));
        assert_eq!(candidates[1].category_id(), Some("38338"));
        assert_eq!(candidates[1].image_url(), Some("https://img/a.jpg"));
        assert!(candidates[1].condition_flags().is_empty());
    }

    #[tokio::test]
    async fn test_barcode_uses_jan_code_param() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/itemSearch")
                    .query_param("appid", "yid")
                    .query_param("jan_code", "4549995423319")
                    .query_param("in_stock", "true");
                then.status(200).json_body(json!({"hits": [
                    {"name": "X 128GB", "price": 42000, "url": "https://store.shopping.yahoo.co.jp/a"}
                ]}));
            })
            .await;

        let query = SearchQuery::raw(&Identifier::parse("4549995423319").unwrap());
        let outcome = adapter(&server).fetch(&query, &ctx()).await;

        mock.assert_async().await;
        assert_eq!(outcome.candidates()[0].price(), 42000);
    }

    #[tokio::test]
    async fn test_keyword_uses_query_param() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/itemSearch")
                    .query_param("query", "iPhone 13");
                then.status(200).json_body(json!({"hits": []}));
            })
            .await;

        let query = SearchQuery::raw(&Identifier::parse("iPhone 13").unwrap());
        let outcome = adapter(&server).fetch(&query, &ctx()).await;

        mock.assert_async().await;
        assert_eq!(outcome, FetchOutcome::Empty(EmptyReason::NoListings));
    }

    #[tokio::test]
    async fn test_resolve_returns_first_name() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/itemSearch").query_param("jan_code", "4549995423319");
                then.status(200).json_body(json!({"hits": [
                    {"name": " 【新品】 X 128GB ブルー ", "price": 42000},
                    {"name": "other", "price": 1}
                ]}));
            })
            .await;

        let barcode = Identifier::parse("4549995423319").unwrap();
        let name = adapter(&server).resolve(&barcode, &ctx()).await.unwrap();
        assert_eq!(name, "【新品】 X 128GB ブルー");
    }

    #[tokio::test]
    async fn test_resolve_without_hits_fails() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/itemSearch");
                then.status(200).json_body(json!({"hits": []}));
            })
            .await;

        let barcode = Identifier::parse("4549995423319").unwrap();
        let err = adapter(&server).resolve(&barcode, &ctx()).await.unwrap_err();
        assert_eq!(err.kind, FailureKind::Parse);
    }

    #[tokio::test]
    async fn test_missing_app_id_is_not_configured() {
        let adapter = YahooShoppingAdapter::new(Client::new(), YAHOO_ENDPOINT, None);
        let query = SearchQuery::raw(&Identifier::parse("4549995423319").unwrap());
        let outcome = adapter.fetch(&query, &ctx()).await;
        assert_eq!(outcome, FetchOutcome::Empty(EmptyReason::NotConfigured));
    }
}
