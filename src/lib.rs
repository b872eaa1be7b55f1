pub mod date_util;
pub mod error;
pub mod metrics;
pub mod query;
pub mod storage;
pub mod sync;

pub use error::{Error, Result};
pub use metrics::{
    MetricKind, MetricsHandle, MetricsRequest, MetricsSummary, PeriodChange, Resource,
    TimeSeriesPoint,
};
pub use query::builder::MetricQuery;
pub use query::period::{LookbackWindow, PeriodUnit};
pub use storage::Database;
pub use sync::{SyncReport, SyncStatus};

// Re-export repository types needed by the binary crate, but not the module itself
pub use storage::repository::SyncJob;

use metrics::RawRow;
use storage::{repository, schema};

/// Snapshot of what the warehouse currently holds.
#[derive(Debug, Clone, serde::Serialize)]
pub struct WarehouseStatus {
    pub tables: Vec<(String, i64)>,
    pub recent_jobs: Vec<SyncJob>,
}

/// Main entry point for the campus metrics warehouse.
pub struct CampusDW {
    db: Database,
}

impl CampusDW {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Access the database (for direct queries in the CLI).
    pub fn db(&self) -> &Database {
        &self.db
    }

    // ── Metrics ────────────────────────────────────────────────────

    /// A request built from the stored `default_period` and
    /// `default_lookback` settings.
    pub async fn default_request(&self) -> Result<MetricsRequest> {
        let (period, lookback) = self
            .db
            .reader()
            .call(|conn| {
                Ok::<_, rusqlite::Error>((
                    repository::get_config(conn, schema::CONFIG_DEFAULT_PERIOD)?,
                    repository::get_config(conn, schema::CONFIG_DEFAULT_LOOKBACK)?,
                ))
            })
            .await?;

        let mut request = MetricsRequest::default();
        if let Some(p) = period {
            request.period = PeriodUnit::parse(&p)
                .map_err(|e| Error::Config(format!("{}: {e}", schema::CONFIG_DEFAULT_PERIOD)))?;
        }
        if let Some(n) = lookback {
            request.lookback_units = n.trim().parse().map_err(|_| {
                Error::Config(format!(
                    "{} must be a positive integer, got '{n}'",
                    schema::CONFIG_DEFAULT_LOOKBACK
                ))
            })?;
        }
        Ok(request)
    }

    pub async fn metrics(&self, kind: MetricKind, request: &MetricsRequest) -> Result<MetricsSummary> {
        metrics::fetch_metrics(&self.db, kind, request).await
    }

    pub async fn load_metrics(
        &self,
        kind: MetricKind,
        request: &MetricsRequest,
    ) -> Resource<MetricsSummary> {
        metrics::load_metrics(&self.db, kind, request).await
    }

    /// Run ad-hoc SQL and return rows as JSON objects.
    pub async fn execute_sql(&self, sql: &str) -> Result<Vec<RawRow>> {
        let sql = sql.to_string();
        self.db
            .reader()
            .call(move |conn| repository::execute_sql_query(conn, &sql, &[]))
            .await
            .map_err(|e| Error::Database(e.to_string()))
    }

    // ── Imports ────────────────────────────────────────────────────

    pub async fn import_sheet(
        &self,
        target: &str,
        path: impl AsRef<std::path::Path>,
    ) -> Result<SyncReport> {
        sync::sheets::import_sheet_file(&self.db, target, path).await
    }

    // ── Config commands ────────────────────────────────────────────

    pub async fn config_get(&self, key: &str) -> Result<Option<String>> {
        self.db
            .reader()
            .call({
                let key = key.to_string();
                move |conn| repository::get_config(conn, &key)
            })
            .await
            .map_err(|e| Error::Database(e.to_string()))
    }

    pub async fn config_set(&self, key: &str, value: &str) -> Result<()> {
        match key {
            schema::CONFIG_DEFAULT_PERIOD => {
                PeriodUnit::parse(value)?;
            }
            schema::CONFIG_DEFAULT_LOOKBACK => match value.trim().parse::<u32>() {
                Ok(n) if n > 0 => {}
                _ => {
                    return Err(Error::InvalidArgument(format!(
                        "{key} must be a positive integer, got '{value}'"
                    )))
                }
            },
            _ => {}
        }
        self.db
            .writer()
            .call({
                let key = key.to_string();
                let value = value.to_string();
                move |conn| repository::set_config(conn, &key, &value)
            })
            .await
            .map_err(|e| Error::Database(e.to_string()))
    }

    pub async fn config_list(&self) -> Result<Vec<(String, String)>> {
        self.db
            .reader()
            .call(|conn| repository::list_config(conn))
            .await
            .map_err(|e| Error::Database(e.to_string()))
    }

    // ── Status ─────────────────────────────────────────────────────

    pub async fn status(&self) -> Result<WarehouseStatus> {
        let (tables, recent_jobs) = self
            .db
            .reader()
            .call(|conn| {
                let tables = schema::table_counts(conn)?;
                let jobs = repository::list_sync_jobs(conn, 5)?;
                Ok::<_, rusqlite::Error>((tables, jobs))
            })
            .await?;
        Ok(WarehouseStatus {
            tables,
            recent_jobs,
        })
    }
}
