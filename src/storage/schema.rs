use rusqlite::{params, Connection};

/// Tables populated by sheet imports, in display order.
pub const WAREHOUSE_TABLES: &[&str] = &[
    "dim_campuses",
    "fact_leads",
    "fact_opportunities",
    "dim_fellows",
    "fact_property_pipeline",
];

pub const CONFIG_DEFAULT_PERIOD: &str = "default_period";
pub const CONFIG_DEFAULT_LOOKBACK: &str = "default_lookback";

const DEFAULT_CONFIG: &[(&str, &str)] = &[
    (CONFIG_DEFAULT_PERIOD, "week"),
    (CONFIG_DEFAULT_LOOKBACK, "12"),
];

/// Insert default config values; existing values are left alone.
pub fn ensure_default_config(conn: &Connection) -> Result<(), rusqlite::Error> {
    let mut stmt = conn.prepare(
        "INSERT OR IGNORE INTO app_config (key, value, updated_at)
         VALUES (?1, ?2, datetime('now'))",
    )?;
    for (key, value) in DEFAULT_CONFIG {
        stmt.execute(params![key, value])?;
    }
    Ok(())
}

/// Row counts for every warehouse table.
pub fn table_counts(conn: &Connection) -> Result<Vec<(String, i64)>, rusqlite::Error> {
    WAREHOUSE_TABLES
        .iter()
        .map(|table| {
            // Table names come from the constant list above, never from input.
            let count: i64 =
                conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?;
            Ok((table.to_string(), count))
        })
        .collect()
}
