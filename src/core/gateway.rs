use crate::domain::model::{CellUpdate, ReconciledRecord};
use crate::domain::ports::SheetClient;
use crate::utils::error::Result;

/// Width of an appended row: identifier, price, source, url, image,
/// category, three reserved columns, name.
pub const ROW_WIDTH: usize = 10;
pub const IDENTIFIER_COLUMN: usize = 0;
pub const PRICE_COLUMN: usize = 1;
pub const SOURCE_COLUMN: usize = 2;
const URL_COLUMN: usize = 3;
const IMAGE_COLUMN: usize = 4;
const CATEGORY_COLUMN: usize = 5;
const NAME_COLUMN: usize = 9;

/// A record bound to the sheet row it refreshes.
#[derive(Debug, Clone)]
pub struct RowTarget {
    pub row: usize,
    pub record: ReconciledRecord,
}

pub fn to_row(record: &ReconciledRecord) -> Vec<String> {
    let mut row = vec![String::new(); ROW_WIDTH];
    row[IDENTIFIER_COLUMN] = record.identifier.to_string();
    row[PRICE_COLUMN] = record.price.to_string();
    row[SOURCE_COLUMN] = record.source_name.clone();
    row[URL_COLUMN] = record.listing_url.clone();
    row[IMAGE_COLUMN] = record.image_url.clone().unwrap_or_default();
    row[CATEGORY_COLUMN] = record.category_id.clone().unwrap_or_default();
    row[NAME_COLUMN] = record.canonical_name.clone();
    row
}

/// Maps reconciled records onto the sheet. Empty input never reaches the
/// client.
pub struct PersistenceGateway<C: SheetClient> {
    client: C,
}

impl<C: SheetClient> PersistenceGateway<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Batch discovery mode: one new row per record. Returns rows written.
    pub async fn append(&self, records: &[ReconciledRecord]) -> Result<usize> {
        if records.is_empty() {
            tracing::info!("No records to append; skipping sheet write");
            return Ok(0);
        }

        let rows: Vec<Vec<String>> = records.iter().map(to_row).collect();
        self.client.append_rows(rows).await?;
        tracing::info!("💾 Appended {} row(s)", records.len());
        Ok(records.len())
    }

    /// Refresh mode: overwrite price and source label in place. Both cells of
    /// a row go out in one call so a row is never half-updated.
    pub async fn update(&self, targets: &[RowTarget]) -> Result<usize> {
        if targets.is_empty() {
            tracing::info!("No records to update; skipping sheet write");
            return Ok(0);
        }

        let updates: Vec<CellUpdate> = targets
            .iter()
            .flat_map(|t| {
                [
                    CellUpdate {
                        row: t.row,
                        column: PRICE_COLUMN,
                        value: t.record.price.to_string(),
                    },
                    CellUpdate {
                        row: t.row,
                        column: SOURCE_COLUMN,
                        value: t.record.source_name.clone(),
                    },
                ]
            })
            .collect();

        self.client.update_cells(updates).await?;
        tracing::info!("💾 Updated {} row(s) in place", targets.len());
        Ok(targets.len())
    }
}
