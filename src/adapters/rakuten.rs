use crate::adapters::http::{self, get_json, price_value, string_or_number};
use crate::config::{resolve_secret, RakutenConfig, RAKUTEN_ENDPOINT};
use crate::domain::model::{CandidateListing, FetchContext, FetchOutcome, Identifier, SearchQuery};
use crate::domain::ports::SourceAdapter;
use crate::utils::error::{Result, SourceError};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

pub const SOURCE_NAME: &str = "rakuten";
const DEFAULT_HITS: u32 = 30;
/// The public API allows roughly one request per second per application id.
const DEFAULT_MIN_INTERVAL: Duration = Duration::from_millis(1000);

/// Rakuten Ichiba item search, sorted by ascending price.
pub struct RakutenAdapter {
    client: Client,
    endpoint: String,
    host: String,
    application_id: Option<String>,
    hits: u32,
    min_interval: Duration,
}

impl RakutenAdapter {
    pub fn new(client: Client, endpoint: &str, application_id: Option<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.to_string(),
            host: http::host_of(endpoint),
            application_id,
            hits: DEFAULT_HITS,
            min_interval: DEFAULT_MIN_INTERVAL,
        }
    }

    pub fn from_config(config: &RakutenConfig, client: Client) -> Self {
        let endpoint = config.endpoint.as_deref().unwrap_or(RAKUTEN_ENDPOINT);
        let application_id = resolve_secret(config.application_id.as_ref());
        let mut adapter = Self::new(client, endpoint, application_id);
        if let Some(hits) = config.hits {
            adapter.hits = hits.clamp(1, 30);
        }
        if let Some(ms) = config.min_interval_ms {
            adapter.min_interval = Duration::from_millis(ms);
        }
        adapter
    }

    pub fn with_min_interval(mut self, interval: Duration) -> Self {
        self.min_interval = interval;
        self
    }

    async fn search(
        &self,
        query: &SearchQuery,
        ctx: &FetchContext,
    ) -> std::result::Result<Vec<CandidateListing>, SourceError> {
        let app_id = self
            .application_id
            .as_deref()
            .ok_or_else(|| SourceError::config_missing("Rakuten application id is not set"))?;

        let hits = self.hits.to_string();
        let request = self
            .client
            .get(&self.endpoint)
            .header(reqwest::header::USER_AGENT, &ctx.user_agent)
            .query(&[
                ("applicationId", app_id),
                ("keyword", query.term.as_str()),
                ("sort", "+itemPrice"),
                ("hits", hits.as_str()),
                ("availability", "1"),
                ("format", "json"),
                ("formatVersion", "2"),
            ]);

        let body = get_json(request, SOURCE_NAME).await?;
        parse_items(&body, &query.identifier)
    }
}

#[async_trait]
impl SourceAdapter for RakutenAdapter {
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
        let result = self.search(query, ctx).await;
        if let Err(e) = &result {
            tracing::warn!(source = SOURCE_NAME, kind = %e.kind, "Search failed: {}", e.message);
        }
        FetchOutcome::from_result(result)
    }
}

/// Accepts both response layouts: `formatVersion=2` puts item fields
/// directly in `Items`, the legacy layout wraps each in `{"Item": {...}}`.
pub fn parse_items(
    body: &Value,
    identifier: &Identifier,
) -> std::result::Result<Vec<CandidateListing>, SourceError> {
    let items = body
        .get("Items")
        .and_then(Value::as_array)
        .ok_or_else(|| SourceError::schema("Rakuten response has no Items array"))?;

    let mut candidates: Vec<CandidateListing> = items
        .iter()
        .filter_map(|entry| {
            let item = entry.get("Item").unwrap_or(entry);
            let parsed = parse_item(item, identifier);
            if parsed.is_none() {
                tracing::debug!(source = SOURCE_NAME, "Skipping item without name or price");
            }
            parsed
        })
        .collect();

    // The API sort is best-effort once availability filtering kicks in.
    candidates.sort_by_key(|c| c.price());
    Ok(candidates)
}

fn parse_item(item: &Value, identifier: &Identifier) -> Option<CandidateListing> {
    let name = item.get("itemName").and_then(Value::as_str)?;
    let price = price_value(item.get("itemPrice"))?;
    let url = item.get("itemUrl").and_then(Value::as_str).unwrap_or_default();

    let mut candidate = CandidateListing::new(identifier, SOURCE_NAME, name, price, url)?
        .with_image_url(first_image(item.get("mediumImageUrls")))
        .with_category_id(string_or_number(item.get("genreId")));

    if item.get("availability").and_then(Value::as_i64) == Some(0) {
        candidate = candidate.with_flag("sold out");
    }
    Some(candidate)
}

fn first_image(value: Option<&Value>) -> Option<String> {
    match value?.as_array()?.first()? {
        Value::String(url) => Some(url.clone()),
        other => other.get("imageUrl").and_then(Value::as_str).map(str::to_string),
    }
}

pub fn build(config: &RakutenConfig) -> Result<RakutenAdapter> {
    let client = http::build_client(http::DEFAULT_REQUEST_TIMEOUT)?;
    Ok(RakutenAdapter::from_config(config, client))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{EmptyReason, FailureKind};
    use httpmock::prelude::*;
    use serde_json::json;

    fn ctx() -> FetchContext {
        FetchContext {
            user_agent: "test-agent".to_string(),
        }
    }

    fn adapter(server: &MockServer) -> RakutenAdapter {
        RakutenAdapter::new(Client::new(), &server.url("/search"), Some("app-1".to_string()))
    }

    fn query(raw: &str) -> SearchQuery {
        SearchQuery::raw(&Identifier::parse(raw).unwrap())
    }

    #[test]
    fn test_parse_both_layouts() {
        let ident = Identifier::parse("4549995423319").unwrap();
        let body = json!({
            "Items": [
                {"Item": {"itemName": "X 128GB", "itemPrice": 41000, "itemUrl": "https://item.rakuten.co.jp/a",
                          "mediumImageUrls": [{"imageUrl": "https://img/a.jpg"}], "genreId": 560202}},
                {"itemName": "X 128GB 美品", "itemPrice": 39800, "itemUrl": "https://item.rakuten.co.jp/b",
                 "mediumImageUrls": ["https://img/b.jpg"], "genreId": "560202", "availability": 0},
                {"itemName": "", "itemPrice": 100},
                {"itemName": "no price"}
            ]
        });

        let candidates = parse_items(&body, &ident).unwrap();

        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].price(), 39800);
        assert!(candidates[0].condition_flags().contains("sold out"));
        assert_eq!(candidates[0].image_url(), Some("https://img/b.jpg"));
        assert_eq!(candidates[1].price(), 41000);
        assert_eq!(candidates[1].image_url(), Some("https://img/a.jpg"));
        assert_eq!(candidates[1].category_id(), Some("560202"));
    }

    #[test]
    fn test_missing_items_is_schema_mismatch() {
        let ident = Identifier::parse("kw").unwrap();
        let err = parse_items(&json!({"error": "wrong_parameter"}), &ident).unwrap_err();
        assert_eq!(err.kind, FailureKind::SchemaMismatch);
    }

    #[tokio::test]
    async fn test_fetch_sends_search_parameters() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/search")
                    .query_param("applicationId", "app-1")
                    .query_param("keyword", "4549995423319")
                    .query_param("formatVersion", "2")
                    .header("user-agent", "test-agent");
                then.status(200).json_body(json!({
                    "Items": [{"itemName": "X 128GB", "itemPrice": 41000, "itemUrl": "https://item.rakuten.co.jp/a"}]
                }));
            })
            .await;

        let adapter = adapter(&server);
        let outcome = adapter.fetch(&query("4549995423319"), &ctx()).await;

        mock.assert_async().await;
        assert_eq!(outcome.candidates().len(), 1);
        assert_eq!(outcome.candidates()[0].source_name(), "rakuten");
    }

    #[tokio::test]
    async fn test_missing_app_id_is_not_configured() {
        let adapter = RakutenAdapter::new(Client::new(), RAKUTEN_ENDPOINT, None);
        let outcome = adapter.fetch(&query("4549995423319"), &ctx()).await;
        assert_eq!(outcome, FetchOutcome::Empty(EmptyReason::NotConfigured));
    }

    #[tokio::test]
    async fn test_http_error_is_unavailable() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/search");
                then.status(429).json_body(json!({"error": "too_many_requests"}));
            })
            .await;

        let adapter = adapter(&server);
        let outcome = adapter.fetch(&query("kw"), &ctx()).await;
        assert_eq!(outcome, FetchOutcome::Failure(FailureKind::SourceUnavailable));
    }

    #[tokio::test]
    async fn test_empty_items_is_no_listings() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/search");
                then.status(200).json_body(json!({"Items": [], "count": 0}));
            })
            .await;

        let adapter = adapter(&server);
        let outcome = adapter.fetch(&query("kw"), &ctx()).await;
        assert_eq!(outcome, FetchOutcome::Empty(EmptyReason::NoListings));
    }
}
