use crate::core::gateway::{PersistenceGateway, RowTarget};
use crate::core::orchestrator::SourceOrchestrator;
use crate::core::reconciler::reconcile;
use crate::domain::model::{Identifier, ReconciledRecord};
use crate::domain::ports::SheetClient;
use crate::utils::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_IDENTIFIER_DELAY: Duration = Duration::from_millis(2500);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteMode {
    /// Append one row per identifier to the output sheet.
    #[default]
    Append,
    /// Overwrite price and source cells of the identifier's existing row.
    Update,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchItem {
    pub identifier: Identifier,
    /// Sheet row holding this identifier, needed in update mode.
    pub row: Option<usize>,
}

impl BatchItem {
    pub fn keyword(identifier: Identifier) -> Self {
        Self {
            identifier,
            row: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NoResultReason {
    /// At least one source answered cleanly and nothing usable was listed.
    NothingListed,
    /// No source could be queried at all (unconfigured, blocked, timed out).
    SourcesUnavailable,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum IdentifierOutcome {
    Written { price: u64, source: String },
    /// Reconciled but not persisted (dry run).
    Reconciled { price: u64, source: String },
    NoResult(NoResultReason),
    WriteFailed { message: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct IdentifierReport {
    pub identifier: Identifier,
    pub outcome: IdentifierOutcome,
    pub record: Option<ReconciledRecord>,
    /// Source name to a short outcome label.
    pub sources: Vec<(String, String)>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub reports: Vec<IdentifierReport>,
}

impl BatchSummary {
    pub fn written(&self) -> usize {
        self.count(|o| matches!(o, IdentifierOutcome::Written { .. }))
    }

    pub fn no_result(&self) -> usize {
        self.count(|o| matches!(o, IdentifierOutcome::NoResult(_)))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, IdentifierOutcome::WriteFailed { .. }))
    }

    fn count(&self, pred: impl Fn(&IdentifierOutcome) -> bool) -> usize {
        self.reports.iter().filter(|r| pred(&r.outcome)).count()
    }
}

/// Runs identifiers one after another: fetch from all sources, reconcile,
/// persist. Each identifier's write finishes before the next one starts.
pub struct PriceEngine<C: SheetClient> {
    orchestrator: SourceOrchestrator,
    gateway: PersistenceGateway<C>,
    mode: WriteMode,
    identifier_delay: Duration,
    dry_run: bool,
}

impl<C: SheetClient> PriceEngine<C> {
    pub fn new(orchestrator: SourceOrchestrator, gateway: PersistenceGateway<C>) -> Self {
        Self {
            orchestrator,
            gateway,
            mode: WriteMode::Append,
            identifier_delay: DEFAULT_IDENTIFIER_DELAY,
            dry_run: false,
        }
    }

    pub fn with_mode(mut self, mode: WriteMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_identifier_delay(mut self, delay: Duration) -> Self {
        self.identifier_delay = delay;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn gateway(&self) -> &PersistenceGateway<C> {
        &self.gateway
    }

    pub async fn run_batch(&self, items: &[BatchItem]) -> BatchSummary {
        let started_at = Utc::now();
        tracing::info!(
            "🚀 Starting price run for {} identifier(s) across {} source(s)",
            items.len(),
            self.orchestrator.adapter_names().len()
        );

        let mut reports = Vec::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
            if index > 0 && !self.identifier_delay.is_zero() {
                tokio::time::sleep(self.identifier_delay).await;
            }
            reports.push(self.run_one(item).await);
        }

        let summary = BatchSummary {
            started_at,
            finished_at: Utc::now(),
            reports,
        };
        tracing::info!(
            "✅ Run finished: {} written, {} no result, {} write failure(s)",
            summary.written(),
            summary.no_result(),
            summary.failed()
        );
        summary
    }

    pub async fn run_one(&self, item: &BatchItem) -> IdentifierReport {
        // Extract
        let run = self.orchestrator.run(&item.identifier).await;
        let sources = run
            .per_source
            .iter()
            .map(|(name, outcome)| (name.clone(), outcome.label()))
            .collect();

        // Transform
        let Some(record) = reconcile(&run.all_candidates) else {
            let reason = if run.any_source_answered() {
                NoResultReason::NothingListed
            } else {
                NoResultReason::SourcesUnavailable
            };
            tracing::warn!(identifier = %item.identifier, "No result: {:?}", reason);
            return IdentifierReport {
                identifier: item.identifier.clone(),
                outcome: IdentifierOutcome::NoResult(reason),
                record: None,
                sources,
            };
        };
        tracing::info!(
            identifier = %item.identifier,
            "Best price ¥{} from {} ({})",
            record.price,
            record.source_name,
            record.canonical_name
        );

        // Load
        let outcome = if self.dry_run {
            IdentifierOutcome::Reconciled {
                price: record.price,
                source: record.source_name.clone(),
            }
        } else {
            match self.persist(item, &record).await {
                Ok(()) => IdentifierOutcome::Written {
                    price: record.price,
                    source: record.source_name.clone(),
                },
                Err(e) => {
                    tracing::error!(identifier = %item.identifier, "❌ Write failed: {}", e);
                    IdentifierOutcome::WriteFailed {
                        message: e.to_string(),
                    }
                }
            }
        };

        IdentifierReport {
            identifier: item.identifier.clone(),
            outcome,
            record: Some(record),
            sources,
        }
    }

    async fn persist(&self, item: &BatchItem, record: &ReconciledRecord) -> Result<()> {
        match self.mode {
            WriteMode::Append => {
                self.gateway.append(std::slice::from_ref(record)).await?;
            }
            WriteMode::Update => {
                let row = item.row.ok_or_else(|| crate::utils::error::ScoutError::StoreError {
                    message: format!("no target row known for {}", item.identifier),
                })?;
                self.gateway
                    .update(&[RowTarget {
                        row,
                        record: record.clone(),
                    }])
                    .await?;
            }
        }
        Ok(())
    }
}

/// Reads the identifier column of a sheet into batch items, keeping each
/// identifier's row for update mode. Blank cells are skipped.
pub async fn items_from_sheet<C: SheetClient>(
    client: &C,
    column: usize,
    skip_header: bool,
) -> Result<Vec<BatchItem>> {
    let cells = client.read_column(column, skip_header).await?;
    Ok(cells
        .into_iter()
        .filter_map(|cell| {
            Identifier::parse(&cell.value).map(|identifier| BatchItem {
                identifier,
                row: Some(cell.row),
            })
        })
        .collect())
}
