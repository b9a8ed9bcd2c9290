use crate::domain::model::{CellUpdate, SheetCell};
use crate::domain::ports::SheetClient;
use crate::utils::error::{Result, ScoutError};
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

/// A sheet kept as a local CSV file. Rows are 1-based like a spreadsheet.
///
/// Writes go through one lock so an append and an in-place update never
/// interleave on the same file.
#[derive(Debug)]
pub struct CsvSheet {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl CsvSheet {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_rows(&self) -> Result<Vec<Vec<String>>> {
        let data = fs::read(&self.path)?;
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(data.as_slice());

        let mut rows = Vec::new();
        for record in reader.records() {
            rows.push(record?.iter().map(str::to_string).collect());
        }
        Ok(rows)
    }

    fn ensure_parent(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        Ok(())
    }
}

impl SheetClient for CsvSheet {
    async fn read_column(&self, column: usize, skip_header: bool) -> Result<Vec<SheetCell>> {
        let rows = self.read_rows()?;
        let start = usize::from(skip_header);

        Ok(rows
            .iter()
            .enumerate()
            .skip(start)
            .filter_map(|(index, row)| {
                row.get(column).map(|value| SheetCell {
                    row: index + 1,
                    value: value.trim().to_string(),
                })
            })
            .collect())
    }

    async fn append_rows(&self, rows: Vec<Vec<String>>) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.ensure_parent()?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let mut writer = csv::WriterBuilder::new().flexible(true).from_writer(file);
        for row in &rows {
            writer.write_record(row)?;
        }
        writer.flush()?;
        Ok(())
    }

    async fn update_cells(&self, updates: Vec<CellUpdate>) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut rows = self.read_rows()?;

        if let Some(bad) = updates.iter().find(|u| u.row == 0 || u.row > rows.len()) {
            return Err(ScoutError::StoreError {
                message: format!(
                    "row {} is outside the sheet ({} rows); nothing written",
                    bad.row,
                    rows.len()
                ),
            });
        }

        for update in &updates {
            let row = &mut rows[update.row - 1];
            if row.len() <= update.column {
                row.resize(update.column + 1, String::new());
            }
            row[update.column] = update.value.clone();
        }

        // Write the whole sheet next to the original, then swap it in.
        let tmp_path = self.path.with_extension("csv.tmp");
        {
            let mut writer = csv::WriterBuilder::new()
                .flexible(true)
                .from_path(&tmp_path)?;
            for row in &rows {
                writer.write_record(row)?;
            }
            writer.flush()?;
        }
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}
