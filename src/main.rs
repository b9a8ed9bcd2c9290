use clap::Parser;
use price_scout::adapters::{browser::ChromiumBrowser, build_orchestrator, sheet::CsvSheet};
use price_scout::core::engine::{items_from_sheet, BatchItem, BatchSummary, IdentifierOutcome};
use price_scout::core::gateway::IDENTIFIER_COLUMN;
use price_scout::domain::ports::BrowserSession;
use price_scout::utils::error::ErrorSeverity;
use price_scout::utils::{logger, validation::Validate};
use price_scout::{
    AppConfig, CliArgs, Identifier, PersistenceGateway, PriceEngine, Result, ScoutError, WriteMode,
};
use std::sync::Arc;

#[tokio::main]
async fn main() {
    let args = CliArgs::parse();

    if args.log_json {
        logger::init_json_logger(args.verbose);
    } else {
        logger::init_cli_logger(args.verbose);
    }

    tracing::info!("🚀 Starting price-scout");
    tracing::info!("📁 Loading configuration from: {}", args.config);

    let mut config = match AppConfig::from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Failed to load config file '{}': {}", args.config, e);
            eprintln!("💡 Make sure the file exists and is valid TOML format");
            std::process::exit(1);
        }
    };
    args.apply_overrides(&mut config);

    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    match run(&args, &config).await {
        Ok(summary) => {
            print_summary(&summary);
            if summary.failed() > 0 {
                std::process::exit(1);
            }
        }
        Err(e) => {
            tracing::error!(
                "❌ Run failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());
            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 {}", e.recovery_suggestion());

            let exit_code = match e.severity() {
                ErrorSeverity::Low => 0,
                ErrorSeverity::Medium => 2,
                ErrorSeverity::High => 1,
                ErrorSeverity::Critical => 3,
            };
            if exit_code > 0 {
                std::process::exit(exit_code);
            }
        }
    }
}

async fn run(args: &CliArgs, config: &AppConfig) -> Result<BatchSummary> {
    let browser = Arc::new(ChromiumBrowser::new(config.browser.clone().unwrap_or_default()));
    let session: Arc<dyn BrowserSession> = browser.clone();
    let orchestrator = build_orchestrator(config, session)?;

    let output = CsvSheet::new(&config.store.output_path);
    let items = load_items(args, config, &output).await?;
    if items.is_empty() {
        tracing::warn!("No identifiers to process");
    }

    let engine = PriceEngine::new(orchestrator, PersistenceGateway::new(output))
        .with_mode(config.write_mode())
        .with_identifier_delay(config.identifier_delay())
        .with_dry_run(args.dry_run);

    if args.dry_run {
        tracing::info!("🔍 DRY RUN MODE - nothing will be written");
    }

    let summary = engine.run_batch(&items).await;

    if let Err(e) = browser.shutdown().await {
        tracing::warn!("Failed to stop browser cleanly: {}", e);
    }
    Ok(summary)
}

async fn load_items(
    args: &CliArgs,
    config: &AppConfig,
    output: &CsvSheet,
) -> Result<Vec<BatchItem>> {
    let has_header = config.store.has_header.unwrap_or(true);

    if let Some(keyword) = &args.keyword {
        let identifier =
            Identifier::parse(keyword).ok_or_else(|| ScoutError::InvalidConfigValueError {
                field: "keyword".to_string(),
                value: keyword.clone(),
                reason: "Keyword cannot be empty".to_string(),
            })?;
        if config.write_mode() == WriteMode::Update {
            // Locate the keyword's existing row so it can be refreshed.
            let rows = items_from_sheet(output, IDENTIFIER_COLUMN, has_header).await?;
            return Ok(vec![rows
                .into_iter()
                .find(|item| item.identifier == identifier)
                .unwrap_or_else(|| BatchItem::keyword(identifier))]);
        }
        return Ok(vec![BatchItem::keyword(identifier)]);
    }

    match config.write_mode() {
        WriteMode::Update => items_from_sheet(output, IDENTIFIER_COLUMN, has_header).await,
        WriteMode::Append => {
            let input_path = config
                .store
                .input_path
                .as_ref()
                .ok_or_else(|| ScoutError::MissingConfigError {
                    field: "store.input_path".to_string(),
                })?;
            let input = CsvSheet::new(input_path);
            items_from_sheet(&input, config.store.input_column.unwrap_or(0), has_header).await
        }
    }
}

fn print_summary(summary: &BatchSummary) {
    for report in &summary.reports {
        let line = match &report.outcome {
            IdentifierOutcome::Written { price, source } => {
                format!("✅ {}: ¥{} from {}", report.identifier, price, source)
            }
            IdentifierOutcome::Reconciled { price, source } => {
                format!("🔍 {}: ¥{} from {} (not written)", report.identifier, price, source)
            }
            IdentifierOutcome::NoResult(reason) => {
                format!("➖ {}: no result ({:?})", report.identifier, reason)
            }
            IdentifierOutcome::WriteFailed { message } => {
                format!("❌ {}: write failed: {}", report.identifier, message)
            }
        };
        println!("{}", line);
        for (source, label) in &report.sources {
            println!("    {}: {}", source, label);
        }
    }

    let elapsed = summary.finished_at - summary.started_at;
    println!(
        "📊 {} written, {} no result, {} failed in {}s",
        summary.written(),
        summary.no_result(),
        summary.failed(),
        elapsed.num_seconds()
    );
}
