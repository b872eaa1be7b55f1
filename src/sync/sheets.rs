use std::path::Path;

use rusqlite::types::Value as SqlValue;
use rusqlite::Connection;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::storage::repository;
use crate::storage::Database;
use crate::sync::mapping::{coerce_cell, TableMapping};
use crate::sync::{SyncReport, SyncStatus};

/// A spreadsheet range in the Sheets API v4 `ValueRange` shape.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueRange {
    #[serde(default)]
    pub range: Option<String>,
    #[serde(default)]
    pub major_dimension: Option<String>,
    #[serde(default)]
    pub values: Vec<Vec<Value>>,
}

impl ValueRange {
    pub fn from_json(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Cells as strings, one inner vec per sheet row regardless of the
    /// range's major dimension.
    pub fn rows(&self) -> Vec<Vec<String>> {
        let cells: Vec<Vec<String>> = self
            .values
            .iter()
            .map(|line| line.iter().map(cell_text).collect())
            .collect();
        if self
            .major_dimension
            .as_deref()
            .is_some_and(|d| d.eq_ignore_ascii_case("COLUMNS"))
        {
            transpose(cells)
        } else {
            cells
        }
    }
}

fn cell_text(v: &Value) -> String {
    match v {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Columns may be ragged: the API trims trailing empty cells.
fn transpose(columns: Vec<Vec<String>>) -> Vec<Vec<String>> {
    let height = columns.iter().map(Vec::len).max().unwrap_or(0);
    (0..height)
        .map(|r| {
            columns
                .iter()
                .map(|c| c.get(r).cloned().unwrap_or_default())
                .collect()
        })
        .collect()
}

/// Map sheet rows onto table rows. Fully blank sheet rows are skipped;
/// short rows are padded with blanks.
fn map_rows(mapping: &TableMapping, sheet: &[Vec<String>]) -> Result<Vec<Vec<SqlValue>>> {
    let (headers, body) = sheet.split_first().ok_or_else(|| Error::Import {
        target: mapping.target.to_string(),
        message: "sheet has no header row".into(),
    })?;

    let indexes = mapping.resolve_headers(headers);
    for (column, index) in mapping.columns.iter().zip(&indexes) {
        if index.is_none() {
            log::warn!(
                "{}: header '{}' not found, '{}' will be empty",
                mapping.target,
                column.header,
                column.column
            );
        }
    }

    Ok(body
        .iter()
        .filter(|row| row.iter().any(|cell| !cell.trim().is_empty()))
        .map(|row| {
            mapping
                .columns
                .iter()
                .zip(&indexes)
                .map(|(column, index)| {
                    let cell = index.and_then(|i| row.get(i)).map(String::as_str).unwrap_or("");
                    coerce_cell(cell, column.kind)
                })
                .collect()
        })
        .collect())
}

/// Replace a warehouse table with the contents of a sheet.
///
/// This is a full refresh: existing rows are deleted and every sheet row is
/// inserted inside one transaction. A row that fails to insert is logged and
/// counted; it does not abort the import.
pub async fn import_value_range(
    db: &Database,
    mapping: &TableMapping,
    range: &ValueRange,
    source_path: Option<&str>,
) -> Result<SyncReport> {
    let rows = map_rows(mapping, &range.rows())?;
    let target = mapping.target;
    let table = mapping.table;
    let columns = mapping.column_names();
    let source_path = source_path.map(str::to_string);
    log::info!("Importing {} rows into {table}", rows.len());

    let report = db
        .writer()
        .call(move |conn| {
            let job_id = repository::insert_sync_job(conn, target, source_path.as_deref())?;

            let (synced, failed, removed) = match replace_rows(conn, target, table, &columns, rows) {
                Ok(counts) => counts,
                Err(e) => {
                    repository::update_sync_job(
                        conn,
                        job_id,
                        SyncStatus::Failed.as_str(),
                        0,
                        0,
                        Some(e.to_string().as_str()),
                    )?;
                    return Err(e);
                }
            };

            let report = SyncReport::from_counts(target.to_string(), synced, failed, removed);
            repository::update_sync_job(
                conn,
                job_id,
                report.status.as_str(),
                synced,
                failed,
                report.error.as_deref(),
            )?;
            Ok::<SyncReport, rusqlite::Error>(report)
        })
        .await?;

    if report.status != SyncStatus::Success {
        log::warn!(
            "{}: {} rows imported, {} failed",
            report.target,
            report.items_synced,
            report.items_failed
        );
    }
    Ok(report)
}

/// Delete and re-insert a table's rows in one transaction.
/// Returns `(synced, failed, removed)`.
fn replace_rows(
    conn: &mut Connection,
    target: &str,
    table: &str,
    columns: &[&str],
    rows: Vec<Vec<SqlValue>>,
) -> std::result::Result<(u64, u64, u64), rusqlite::Error> {
    let tx = conn.transaction()?;
    let removed = repository::clear_table(&tx, table)? as u64;
    let mut synced = 0u64;
    let mut failed = 0u64;
    for (i, values) in rows.into_iter().enumerate() {
        match repository::insert_row(&tx, table, columns, values) {
            Ok(()) => synced += 1,
            Err(e) => {
                log::warn!("{target}: data row {} skipped: {e}", i + 1);
                failed += 1;
            }
        }
    }
    tx.commit()?;
    Ok((synced, failed, removed))
}

/// Load a `ValueRange` JSON file and import it into the target's table.
pub async fn import_sheet_file(
    db: &Database,
    target: &str,
    path: impl AsRef<Path>,
) -> Result<SyncReport> {
    let mapping = TableMapping::builtin(target)?;
    let path = path.as_ref();
    let range = ValueRange::from_path(path)?;
    let path_str = path.to_string_lossy().into_owned();
    import_value_range(db, &mapping, &range, Some(path_str.as_str())).await
}
