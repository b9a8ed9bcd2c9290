use async_trait::async_trait;
use httpmock::prelude::*;
use price_scout::core::engine::{items_from_sheet, IdentifierOutcome, NoResultReason};
use price_scout::core::noise_filter::ExclusionRules;
use price_scout::domain::model::{
    CandidateListing, EmptyReason, FailureKind, FetchContext, FetchOutcome, SearchQuery,
};
use price_scout::domain::ports::{BrowserSession, SourceAdapter};
use price_scout::{
    build_orchestrator, AppConfig, BatchItem, ChromiumBrowser, CsvSheet, Identifier,
    PersistenceGateway, PriceEngine, SourceOrchestrator, WriteMode,
};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Answers per identifier from a fixed table.
struct ScriptedAdapter {
    name: &'static str,
    host: &'static str,
    delay: Duration,
    script: fn(&Identifier) -> FetchOutcome,
}

#[async_trait]
impl SourceAdapter for ScriptedAdapter {
    fn name(&self) -> &str {
        self.name
    }

    fn host(&self) -> &str {
        self.host
    }

    async fn fetch(&self, query: &SearchQuery, _ctx: &FetchContext) -> FetchOutcome {
        tokio::time::sleep(self.delay).await;
        (self.script)(&query.identifier)
    }
}

fn listing(identifier: &Identifier, source: &str, name: &str, price: u64) -> CandidateListing {
    let url = format!("https://{}/item", source);
    CandidateListing::new(identifier, source, name, price, &url).unwrap()
}

fn scripted(
    name: &'static str,
    delay: Duration,
    script: fn(&Identifier) -> FetchOutcome,
) -> Arc<dyn SourceAdapter> {
    Arc::new(ScriptedAdapter {
        name,
        host: name,
        delay,
        script,
    })
}

fn engine(adapters: Vec<Arc<dyn SourceAdapter>>, sheet: CsvSheet) -> PriceEngine<CsvSheet> {
    let orchestrator = SourceOrchestrator::new(adapters, Arc::new(ExclusionRules::default()))
        .with_adapter_timeout(Duration::from_millis(200));
    PriceEngine::new(orchestrator, PersistenceGateway::new(sheet))
        .with_identifier_delay(Duration::ZERO)
}

#[tokio::test]
async fn test_junk_listing_loses_to_clean_listing_in_update_mode() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("prices.csv");
    std::fs::write(&path, "jan,price,source\n4549995423319,40000,old\n").unwrap();

    let adapters = vec![
        scripted("a", Duration::ZERO, |id| {
            FetchOutcome::Success(vec![listing(id, "a", "X 128GB", 38000)])
        }),
        scripted("b", Duration::ZERO, |id| {
            FetchOutcome::Success(vec![listing(id, "b", "X 128GB Junk", 35000)])
        }),
    ];

    let sheet = CsvSheet::new(&path);
    let items = items_from_sheet(&sheet, 0, true).await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].row, Some(2));

    let summary = engine(adapters, sheet)
        .with_mode(WriteMode::Update)
        .run_batch(&items)
        .await;

    assert_eq!(
        summary.reports[0].outcome,
        IdentifierOutcome::Written {
            price: 38000,
            source: "a".to_string()
        }
    );
    assert_eq!(
        std::fs::read_to_string(&path).unwrap(),
        "jan,price,source\n4549995423319,38000,a\n"
    );
}

#[tokio::test]
async fn test_unusable_sources_yield_no_result_and_batch_continues() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("prices.csv");

    // The first identifier finds every source unusable; the second one works.
    let adapters = vec![
        scripted("api", Duration::ZERO, |_| {
            FetchOutcome::Empty(EmptyReason::NotConfigured)
        }),
        scripted("shop", Duration::ZERO, |_| {
            FetchOutcome::Failure(FailureKind::BlockedByHost)
        }),
        scripted("backup", Duration::ZERO, |id| {
            if id.as_str() == "4549995423319" {
                FetchOutcome::Failure(FailureKind::SourceUnavailable)
            } else {
                FetchOutcome::Success(vec![listing(id, "backup", "Y 64GB", 12000)])
            }
        }),
    ];

    let items = vec![
        BatchItem::keyword(Identifier::parse("4549995423319").unwrap()),
        BatchItem::keyword(Identifier::parse("4901234567894").unwrap()),
    ];
    let summary = engine(adapters, CsvSheet::new(&path)).run_batch(&items).await;

    assert_eq!(
        summary.reports[0].outcome,
        IdentifierOutcome::NoResult(NoResultReason::SourcesUnavailable)
    );
    assert!(summary.reports[0].record.is_none());
    assert_eq!(
        summary.reports[1].outcome,
        IdentifierOutcome::Written {
            price: 12000,
            source: "backup".to_string()
        }
    );
    // The blocked host is not retried for the second identifier.
    assert!(summary.reports[1]
        .sources
        .contains(&("shop".to_string(), "failed: blocked_by_host".to_string())));

    // Only the real result reached the sheet; no placeholder row.
    let content = std::fs::read_to_string(&path).unwrap();
    assert_eq!(content.lines().count(), 1);
    assert!(content.starts_with("4901234567894,12000,backup,"));
}

#[tokio::test]
async fn test_slow_source_times_out_without_hurting_others() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("prices.csv");

    let adapters = vec![
        scripted("slow", Duration::from_secs(5), |id| {
            FetchOutcome::Success(vec![listing(id, "slow", "X 128GB", 100)])
        }),
        scripted("fast", Duration::ZERO, |id| {
            FetchOutcome::Success(vec![listing(id, "fast", "X 128GB", 39000)])
        }),
    ];

    let items = vec![BatchItem::keyword(Identifier::parse("iPhone 13").unwrap())];
    let summary = engine(adapters, CsvSheet::new(&path)).run_batch(&items).await;

    let report = &summary.reports[0];
    assert_eq!(
        report.outcome,
        IdentifierOutcome::Written {
            price: 39000,
            source: "fast".to_string()
        }
    );
    assert!(report
        .sources
        .contains(&("slow".to_string(), "failed: timeout".to_string())));
    assert_eq!(
        std::fs::read_to_string(&path).unwrap(),
        "iPhone 13,39000,fast,https://fast/item,,,,,,X 128GB\n"
    );
}

#[tokio::test]
async fn test_end_to_end_with_mocked_apis() {
    let temp_dir = TempDir::new().unwrap();
    let input_path = temp_dir.path().join("input.csv");
    let output_path = temp_dir.path().join("prices.csv");
    std::fs::write(&input_path, "jan\n4549995423319\n").unwrap();

    let server = MockServer::start_async().await;
    let rakuten_mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/rakuten")
                .query_param("keyword", "4549995423319");
            then.status(200).json_body(serde_json::json!({
                "Items": [
                    {"itemName": "X 128GB ジャンク", "itemPrice": 30000, "itemUrl": "https://item.rakuten.co.jp/j"},
                    {"itemName": "X 128GB", "itemPrice": 41000, "itemUrl": "https://item.rakuten.co.jp/a"}
                ]
            }));
        })
        .await;
    let yahoo_mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/yahoo")
                .query_param("jan_code", "4549995423319");
            then.status(200).json_body(serde_json::json!({
                "hits": [
                    {"name": "X 128GB", "price": 36000, "url": "https://store.shopping.yahoo.co.jp/s", "inStock": false},
                    {"name": "X 128GB ブルー", "price": 38000, "url": "https://store.shopping.yahoo.co.jp/b",
                     "inStock": true, "image": {"medium": "https://img/b.jpg"}, "genreCategory": {"id": 38338}}
                ]
            }));
        })
        .await;

    let config = AppConfig::from_toml_str(&format!(
        r#"
[run]
identifier_delay_ms = 0

[sources.rakuten]
application_id = "r-id"
endpoint = "{rakuten}"
min_interval_ms = 0

[sources.yahoo]
app_id = "y-id"
endpoint = "{yahoo}"
min_interval_ms = 0

[store]
output_path = "{output}"
input_path = "{input}"
"#,
        rakuten = server.url("/rakuten"),
        yahoo = server.url("/yahoo"),
        output = output_path.display(),
        input = input_path.display(),
    ))
    .unwrap();

    let browser: Arc<dyn BrowserSession> =
        Arc::new(ChromiumBrowser::new(config.browser.clone().unwrap_or_default()));
    let orchestrator = build_orchestrator(&config, browser).unwrap();

    let input = CsvSheet::new(&input_path);
    let items = items_from_sheet(&input, 0, true).await.unwrap();
    let gateway = PersistenceGateway::new(CsvSheet::new(&output_path));
    let engine = PriceEngine::new(orchestrator, gateway)
        .with_mode(config.write_mode())
        .with_identifier_delay(config.identifier_delay());

    let summary = engine.run_batch(&items).await;

    rakuten_mock.assert_async().await;
    yahoo_mock.assert_async().await;
    assert_eq!(summary.written(), 1);
    assert_eq!(
        std::fs::read_to_string(&output_path).unwrap(),
        "4549995423319,38000,yahoo,https://store.shopping.yahoo.co.jp/b,https://img/b.jpg,38338,,,,X 128GB ブルー\n"
    );
}
