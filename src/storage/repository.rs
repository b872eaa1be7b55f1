use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use serde::Serialize;
use serde_json::Value;

use crate::metrics::types::RawRow;

// ── Ad-hoc queries ─────────────────────────────────────────────────

/// Run arbitrary SQL and return each row as a JSON object keyed by column
/// name. This is the single entry point every metric fetch goes through.
pub fn execute_sql_query(
    conn: &Connection,
    sql: &str,
    params: &[String],
) -> Result<Vec<RawRow>, rusqlite::Error> {
    let mut stmt = conn.prepare(sql)?;
    let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

    let mut out = Vec::new();
    let mut rows = stmt.query(params_from_iter(params.iter()))?;
    while let Some(row) = rows.next()? {
        let mut obj = RawRow::new();
        for (i, name) in names.iter().enumerate() {
            obj.insert(name.clone(), json_value(row.get_ref(i)?));
        }
        out.push(obj);
    }
    Ok(out)
}

fn json_value(v: ValueRef<'_>) -> Value {
    match v {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(n) => Value::from(n),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::String(format!("<{} bytes>", b.len())),
    }
}

// ── Imported tables ────────────────────────────────────────────────

/// Remove every row from an import table. Returns the number removed.
pub fn clear_table(conn: &Connection, table: &str) -> Result<usize, rusqlite::Error> {
    conn.execute(&format!("DELETE FROM {table}"), [])
}

/// Insert one row into an import table, stamping `imported_at`.
pub fn insert_row(
    conn: &Connection,
    table: &str,
    columns: &[&str],
    values: Vec<SqlValue>,
) -> Result<(), rusqlite::Error> {
    let placeholders = (1..=columns.len())
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "INSERT INTO {table} ({}, imported_at) VALUES ({placeholders}, datetime('now'))",
        columns.join(", ")
    );
    let mut stmt = conn.prepare_cached(&sql)?;
    stmt.execute(params_from_iter(values))?;
    Ok(())
}

// ── Config ─────────────────────────────────────────────────────────

pub fn get_config(conn: &Connection, key: &str) -> Result<Option<String>, rusqlite::Error> {
    conn.query_row(
        "SELECT value FROM app_config WHERE key = ?1",
        params![key],
        |row| row.get(0),
    )
    .optional()
}

pub fn set_config(conn: &Connection, key: &str, value: &str) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT OR REPLACE INTO app_config (key, value, updated_at)
         VALUES (?1, ?2, datetime('now'))",
        params![key, value],
    )?;
    Ok(())
}

pub fn list_config(conn: &Connection) -> Result<Vec<(String, String)>, rusqlite::Error> {
    let mut stmt = conn.prepare("SELECT key, value FROM app_config ORDER BY key")?;
    let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
    rows.collect()
}

// ── Sync Jobs ──────────────────────────────────────────────────────

/// One recorded import run.
#[derive(Debug, Clone, Serialize)]
pub struct SyncJob {
    pub id: i64,
    pub target: String,
    pub source_path: Option<String>,
    pub status: String,
    pub started_at: String,
    pub completed_at: Option<String>,
    pub items_synced: i64,
    pub items_failed: i64,
    pub error_message: Option<String>,
}

pub fn insert_sync_job(
    conn: &Connection,
    target: &str,
    source_path: Option<&str>,
) -> Result<i64, rusqlite::Error> {
    conn.execute(
        "INSERT INTO sync_jobs (target, source_path, status, started_at)
         VALUES (?1, ?2, 'running', datetime('now'))",
        params![target, source_path],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn update_sync_job(
    conn: &Connection,
    job_id: i64,
    status: &str,
    items_synced: u64,
    items_failed: u64,
    error_message: Option<&str>,
) -> Result<(), rusqlite::Error> {
    conn.execute(
        "UPDATE sync_jobs SET
            status = ?2,
            completed_at = datetime('now'),
            items_synced = ?3,
            items_failed = ?4,
            error_message = ?5
         WHERE id = ?1",
        params![job_id, status, items_synced as i64, items_failed as i64, error_message],
    )?;
    Ok(())
}

pub fn list_sync_jobs(conn: &Connection, limit: u32) -> Result<Vec<SyncJob>, rusqlite::Error> {
    let mut stmt = conn.prepare(
        "SELECT id, target, source_path, status, started_at, completed_at,
                items_synced, items_failed, error_message
         FROM sync_jobs ORDER BY id DESC LIMIT ?1",
    )?;
    let rows = stmt.query_map(params![limit], |row| {
        Ok(SyncJob {
            id: row.get(0)?,
            target: row.get(1)?,
            source_path: row.get(2)?,
            status: row.get(3)?,
            started_at: row.get(4)?,
            completed_at: row.get(5)?,
            items_synced: row.get(6)?,
            items_failed: row.get(7)?,
            error_message: row.get(8)?,
        })
    })?;
    rows.collect()
}
