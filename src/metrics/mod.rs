pub mod aggregate;
pub mod delta;
pub mod normalize;
pub mod series;
pub mod types;

pub use types::*;

use crate::error::Result;
use crate::query::builder::MetricQuery;
use crate::query::period::PeriodUnit;
use crate::storage::repository;
use crate::storage::Database;

/// Run the full aggregation chain over raw query rows:
/// normalize, group by period and campus, diff adjacent periods, shape.
pub fn summarize(kind: MetricKind, unit: PeriodUnit, raw: &[RawRow]) -> MetricsSummary {
    let rows = normalize::normalize_rows(raw, unit, kind.value_field());
    if rows.is_empty() {
        return MetricsSummary::empty(kind, unit);
    }

    let agg = aggregate::aggregate(&rows, kind.mode());
    let changes = delta::period_changes(&agg.periods, &agg.totals);
    let time_series = series::shape_time_series(&agg, &rows);
    let latest_period = agg.periods.first().copied();
    let latest_total = latest_period
        .and_then(|p| agg.totals.get(&p).copied())
        .unwrap_or(0.0);

    MetricsSummary {
        metric: kind,
        period_type: unit,
        periods: agg.periods,
        campuses: agg.campuses,
        totals: agg.totals,
        campus_totals: agg.campus_totals,
        latest_period,
        latest_total,
        changes,
        time_series,
    }
}

/// Query the warehouse for one metric and summarize the result.
/// A disabled request returns the empty summary without querying.
pub async fn fetch_metrics(
    db: &Database,
    kind: MetricKind,
    request: &MetricsRequest,
) -> Result<MetricsSummary> {
    if !request.enabled {
        return Ok(MetricsSummary::empty(kind, request.period));
    }

    let mut query = MetricQuery::new(kind)
        .unit(request.period)
        .lookback(request.lookback_units);
    if let Some(as_of) = request.as_of {
        query = query.as_of(as_of);
    }
    if let Some(campus_id) = &request.campus_id {
        query = query.campus(campus_id);
    }
    let (sql, params) = query.build()?;
    log::debug!("{kind} query params: {params:?}");

    let raw = db
        .reader()
        .call(move |conn| repository::execute_sql_query(conn, &sql, &params))
        .await?;
    log::info!("Fetched {} {kind} rows", raw.len());

    Ok(summarize(kind, request.period, &raw))
}

/// Like [`fetch_metrics`], but never fails: errors are logged and reported
/// in the resource's `error` field next to an empty summary.
pub async fn load_metrics(
    db: &Database,
    kind: MetricKind,
    request: &MetricsRequest,
) -> Resource<MetricsSummary> {
    match fetch_metrics(db, kind, request).await {
        Ok(data) => Resource {
            data,
            loading: false,
            error: None,
        },
        Err(e) => {
            log::error!("Failed to fetch {kind} metrics: {e}");
            Resource {
                data: MetricsSummary::empty(kind, request.period),
                loading: false,
                error: Some(e.to_string()),
            }
        }
    }
}

/// The request fields whose change triggers a re-fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
struct RequestKey {
    period: PeriodUnit,
    lookback_units: u32,
    campus_id: Option<String>,
    enabled: bool,
    refetch_key: u64,
    as_of: Option<chrono::NaiveDate>,
}

impl From<&MetricsRequest> for RequestKey {
    fn from(r: &MetricsRequest) -> Self {
        Self {
            period: r.period,
            lookback_units: r.lookback_units,
            campus_id: r.campus_id.clone(),
            enabled: r.enabled,
            refetch_key: r.refetch_key,
            as_of: r.as_of,
        }
    }
}

/// Holds the last result for one metric and only goes back to the database
/// when the request changes. Failures stick until the request changes too,
/// so retrying means bumping `refetch_key`.
pub struct MetricsHandle {
    kind: MetricKind,
    last: Option<RequestKey>,
    state: Resource<MetricsSummary>,
}

impl MetricsHandle {
    pub fn new(kind: MetricKind) -> Self {
        Self {
            kind,
            last: None,
            state: Resource {
                data: MetricsSummary::empty(kind, PeriodUnit::Week),
                loading: true,
                error: None,
            },
        }
    }

    pub fn kind(&self) -> MetricKind {
        self.kind
    }

    pub fn state(&self) -> &Resource<MetricsSummary> {
        &self.state
    }

    pub async fn load(&mut self, db: &Database, request: &MetricsRequest) -> &Resource<MetricsSummary> {
        let key = RequestKey::from(request);
        if self.last.as_ref() == Some(&key) {
            return &self.state;
        }
        self.state = load_metrics(db, self.kind, request).await;
        self.last = Some(key);
        &self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn raw(v: serde_json::Value) -> RawRow {
        v.as_object().unwrap().clone()
    }

    #[test]
    fn test_summarize_empty() {
        let s = summarize(MetricKind::Leads, PeriodUnit::Week, &[]);
        assert_eq!(s, MetricsSummary::empty(MetricKind::Leads, PeriodUnit::Week));
        assert!(s.latest_period.is_none());
        assert_eq!(s.latest_total, 0.0);
    }

    #[test]
    fn test_summarize_leads() {
        let rows = vec![
            raw(json!({"period_date": "2025-01-01", "campus_name": "Austin", "lead_count": 50})),
            raw(json!({"period_date": "2025-03-01", "campus_name": "Austin", "lead_count": 60})),
            raw(json!({"period_date": "2025-03-01", "campus_name": "Denver", "lead_count": 40})),
            raw(json!({"period_date": "2025-02-01", "campus_name": "Denver", "lead_count": 80})),
        ];
        let s = summarize(MetricKind::Leads, PeriodUnit::Month, &rows);

        let (p0, p1, p2) = (date(2025, 3, 1), date(2025, 2, 1), date(2025, 1, 1));
        assert_eq!(s.periods, vec![p0, p1, p2]);
        assert_eq!(s.latest_period, Some(p0));
        assert_eq!(s.latest_total, 100.0);
        assert_eq!(s.changes[&p0], PeriodChange { raw: 20.0, percentage: 25.0 });
        assert_eq!(s.changes[&p1], PeriodChange { raw: 30.0, percentage: 60.0 });
        assert_eq!(s.changes[&p2], PeriodChange::default());
        assert_eq!(s.campus_totals["Austin"], 110.0);
        assert_eq!(s.time_series.len(), 3);
        assert_eq!(s.time_series[0].campuses["Denver"], 40.0);
    }

    #[test]
    fn test_summarize_cumulative_arr_uses_latest() {
        let rows = vec![
            raw(json!({"period_date": "2025-02-01", "campus_name": "X", "cumulative_arr": 500})),
            raw(json!({"period_date": "2025-01-01", "campus_name": "X", "cumulative_arr": 300})),
        ];
        let s = summarize(MetricKind::CumulativeArr, PeriodUnit::Month, &rows);
        assert_eq!(s.campus_totals["X"], 500.0);
        assert_eq!(s.latest_total, 500.0);
    }

    async fn seeded_db() -> Database {
        let db = Database::open_memory().await.unwrap();
        db.writer()
            .call(|conn| {
                conn.execute_batch(
                    "INSERT INTO dim_campuses (campus_id, campus_name, is_active, imported_at) VALUES
                        ('aus', 'Austin', 1, datetime('now')),
                        ('den', 'Denver', 1, datetime('now'));
                     INSERT INTO fact_leads (lead_id, created_date, campus_name, imported_at) VALUES
                        ('L1', '2025-03-03', 'Austin', datetime('now')),
                        ('L2', '2025-03-05', 'austin ', datetime('now')),
                        ('L3', '2025-03-12', 'Denver', datetime('now')),
                        ('L4', '2025-03-13', 'Boulder', datetime('now')),
                        ('L5', '2025-03-14', NULL, datetime('now')),
                        ('L6', '2025-01-02', 'Austin', datetime('now'));
                     INSERT INTO fact_opportunities (opportunity_id, close_date, campus_name, is_won, arr, imported_at) VALUES
                        ('O1', '2024-12-15', 'Austin', 1, 1000, datetime('now')),
                        ('O2', '2025-03-04', 'Austin', 1, 500, datetime('now')),
                        ('O3', '2025-03-11', 'Austin', 1, 250, datetime('now')),
                        ('O4', '2025-03-11', 'Denver', 0, 900, datetime('now')),
                        ('O5', '2025-03-12', 'Denver', 1, 400, datetime('now'));",
                )?;
                Ok::<(), rusqlite::Error>(())
            })
            .await
            .unwrap();
        db
    }

    fn weekly(units: u32) -> MetricsRequest {
        MetricsRequest {
            period: PeriodUnit::Week,
            lookback_units: units,
            as_of: Some(date(2025, 3, 14)),
            ..MetricsRequest::default()
        }
    }

    #[tokio::test]
    async fn test_fetch_weekly_leads() {
        let db = seeded_db().await;
        let s = fetch_metrics(&db, MetricKind::Leads, &weekly(2)).await.unwrap();

        let (w11, w10) = (date(2025, 3, 10), date(2025, 3, 3));
        assert_eq!(s.periods, vec![w11, w10]);
        // Boulder is unknown, so it lands in the hidden bucket; NULL is "All Campuses"
        assert_eq!(s.campuses, vec!["All Campuses", "Austin", "Denver"]);
        assert_eq!(s.totals[&w10], 2.0);
        assert_eq!(s.totals[&w11], 3.0);
        assert_eq!(s.campus_totals[NO_CAMPUS_MATCH], 1.0);
        assert_eq!(s.changes[&w11], PeriodChange { raw: 1.0, percentage: 50.0 });
        assert_eq!(s.time_series[1].formatted_date, "Week of 03/03");
    }

    #[tokio::test]
    async fn test_fetch_with_campus_filter() {
        let db = seeded_db().await;
        let request = MetricsRequest {
            campus_id: Some("aus".into()),
            ..weekly(2)
        };
        let s = fetch_metrics(&db, MetricKind::Leads, &request).await.unwrap();
        assert_eq!(s.campuses, vec!["Austin"]);
        assert_eq!(s.periods, vec![date(2025, 3, 3)]);
        assert_eq!(s.latest_total, 2.0);
    }

    #[tokio::test]
    async fn test_fetch_closed_won_skips_open_opportunities() {
        let db = seeded_db().await;
        let s = fetch_metrics(&db, MetricKind::ClosedWon, &weekly(2)).await.unwrap();
        assert_eq!(s.totals[&date(2025, 3, 10)], 2.0);
        assert_eq!(s.totals[&date(2025, 3, 3)], 1.0);
    }

    #[tokio::test]
    async fn test_fetch_cumulative_arr_includes_prior_history() {
        let db = seeded_db().await;
        let s = fetch_metrics(&db, MetricKind::CumulativeArr, &weekly(2)).await.unwrap();
        // Austin: 1000 before the window, +500 in week of 3/3, +250 in week of 3/10
        assert_eq!(s.campus_totals["Austin"], 1750.0);
        assert_eq!(s.campus_totals["Denver"], 400.0);
        assert_eq!(s.totals[&date(2025, 3, 3)], 1500.0);
        assert_eq!(s.totals[&date(2025, 3, 10)], 2150.0);
    }

    async fn db_with_wins(wins: &'static str) -> Database {
        let db = Database::open_memory().await.unwrap();
        db.writer()
            .call(move |conn| {
                conn.execute_batch(
                    "INSERT INTO dim_campuses (campus_id, campus_name, is_active, imported_at) VALUES
                        ('aus', 'Austin', 1, datetime('now')),
                        ('den', 'Denver', 1, datetime('now'));",
                )?;
                conn.execute_batch(wins)?;
                Ok::<(), rusqlite::Error>(())
            })
            .await
            .unwrap();
        db
    }

    #[tokio::test]
    async fn test_cumulative_arr_carries_balance_through_quiet_periods() {
        let db = db_with_wins(
            "INSERT INTO fact_opportunities (opportunity_id, close_date, campus_name, is_won, arr, imported_at) VALUES
                ('O1', '2024-12-15', 'Denver', 1, 5000, datetime('now')),
                ('O2', '2025-03-04', 'Austin', 1, 1000, datetime('now')),
                ('O3', '2025-03-11', 'Denver', 1, 400, datetime('now'));",
        )
        .await;
        let s = fetch_metrics(&db, MetricKind::CumulativeArr, &weekly(2)).await.unwrap();

        let (w11, w10) = (date(2025, 3, 10), date(2025, 3, 3));
        assert_eq!(s.periods, vec![w11, w10]);
        // Denver's pre-window 5000 counts in the week of 3/3; Austin's 1000 carries into 3/10
        assert_eq!(s.totals[&w10], 6000.0);
        assert_eq!(s.totals[&w11], 6400.0);
        assert_eq!(s.changes[&w11].raw, 400.0);
        assert_eq!(s.campus_totals["Austin"], 1000.0);
        assert_eq!(s.campus_totals["Denver"], 5400.0);
        assert_eq!(s.time_series[0].campuses["Austin"], 1000.0);
    }

    #[tokio::test]
    async fn test_cumulative_arr_keeps_campus_with_only_prior_wins() {
        let db = db_with_wins(
            "INSERT INTO fact_opportunities (opportunity_id, close_date, campus_name, is_won, arr, imported_at) VALUES
                ('O1', '2024-12-15', 'Denver', 1, 5000, datetime('now')),
                ('O2', '2025-03-04', 'Austin', 1, 1000, datetime('now'));",
        )
        .await;
        let s = fetch_metrics(&db, MetricKind::CumulativeArr, &weekly(2)).await.unwrap();

        let (w11, w10) = (date(2025, 3, 10), date(2025, 3, 3));
        assert_eq!(s.campuses, vec!["Austin", "Denver"]);
        assert_eq!(s.campus_totals["Denver"], 5000.0);
        assert_eq!(s.totals[&w10], 6000.0);
        assert_eq!(s.totals[&w11], 6000.0);
        assert_eq!(s.latest_total, 6000.0);
        assert_eq!(s.changes[&w11], PeriodChange::default());
    }

    #[tokio::test]
    async fn test_cumulative_arr_starts_at_first_win() {
        let db = db_with_wins(
            "INSERT INTO fact_opportunities (opportunity_id, close_date, campus_name, is_won, arr, imported_at) VALUES
                ('O1', '2025-03-12', 'Austin', 1, 700, datetime('now'));",
        )
        .await;
        let s = fetch_metrics(&db, MetricKind::CumulativeArr, &weekly(520)).await.unwrap();
        assert_eq!(s.periods, vec![date(2025, 3, 10)]);
        assert_eq!(s.latest_total, 700.0);

        let empty = db_with_wins("").await;
        let s = fetch_metrics(&empty, MetricKind::CumulativeArr, &weekly(2)).await.unwrap();
        assert!(s.periods.is_empty());
    }

    #[tokio::test]
    async fn test_load_metrics_huge_lookback_is_an_error() {
        let db = seeded_db().await;
        for period in [PeriodUnit::Day, PeriodUnit::Week, PeriodUnit::Month] {
            let request = MetricsRequest {
                period,
                lookback_units: u32::MAX,
                ..weekly(1)
            };
            let resource = load_metrics(&db, MetricKind::Leads, &request).await;
            assert!(resource.error.is_some());
            assert!(resource.data.periods.is_empty());
        }
    }

    #[tokio::test]
    async fn test_disabled_request_returns_empty() {
        let db = seeded_db().await;
        let request = MetricsRequest {
            enabled: false,
            ..weekly(2)
        };
        let s = fetch_metrics(&db, MetricKind::Leads, &request).await.unwrap();
        assert!(s.periods.is_empty());
    }

    #[tokio::test]
    async fn test_load_metrics_reports_error_with_empty_data() {
        let db = seeded_db().await;
        let request = MetricsRequest {
            lookback_units: 0,
            ..weekly(1)
        };
        let resource = load_metrics(&db, MetricKind::Leads, &request).await;
        assert!(resource.error.is_some());
        assert!(!resource.loading);
        assert!(resource.data.periods.is_empty());
        assert_eq!(resource.data.latest_total, 0.0);
    }

    #[tokio::test]
    async fn test_handle_refetches_only_on_change() {
        let db = seeded_db().await;
        let mut handle = MetricsHandle::new(MetricKind::Leads);
        assert!(handle.state().loading);

        let request = weekly(2);
        assert_eq!(handle.load(&db, &request).await.data.latest_total, 3.0);

        // New lead in the current week; an unchanged request keeps the old result
        db.writer()
            .call(|conn| {
                conn.execute(
                    "INSERT INTO fact_leads (lead_id, created_date, campus_name, imported_at)
                     VALUES ('L7', '2025-03-14', 'Denver', datetime('now'))",
                    [],
                )
            })
            .await
            .unwrap();
        assert_eq!(handle.load(&db, &request).await.data.latest_total, 3.0);

        let bumped = MetricsRequest {
            refetch_key: 1,
            ..request
        };
        assert_eq!(handle.load(&db, &bumped).await.data.latest_total, 4.0);
    }
}
