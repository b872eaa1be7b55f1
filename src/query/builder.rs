use chrono::NaiveDate;

use crate::error::{Error, Result};
use crate::metrics::types::{MetricKind, NO_CAMPUS_MATCH};
use crate::query::period::PeriodUnit;

/// Builder for the per-period metric queries run against the warehouse.
///
/// Every query returns `period_type, period_date, formatted_date,
/// campus_name` plus the metric's value column, newest period first.
#[derive(Debug, Clone)]
pub struct MetricQuery {
    kind: MetricKind,
    unit: PeriodUnit,
    lookback_units: u32,
    as_of: Option<NaiveDate>,
    campus_id: Option<String>,
}

impl MetricQuery {
    pub fn new(kind: MetricKind) -> Self {
        Self {
            kind,
            unit: PeriodUnit::Week,
            lookback_units: 12,
            as_of: None,
            campus_id: None,
        }
    }

    pub fn unit(mut self, unit: PeriodUnit) -> Self {
        self.unit = unit;
        self
    }

    pub fn lookback(mut self, units: u32) -> Self {
        self.lookback_units = units;
        self
    }

    pub fn as_of(mut self, date: NaiveDate) -> Self {
        self.as_of = Some(date);
        self
    }

    pub fn campus(mut self, campus_id: &str) -> Self {
        self.campus_id = Some(campus_id.to_string());
        self
    }

    /// Build the SQL and its positional parameters.
    ///
    /// `?1` is the unit, `?2`/`?3` the inclusive window bounds, `?4` the
    /// campus id when one is set.
    pub fn build(&self) -> Result<(String, Vec<String>)> {
        let as_of = self
            .as_of
            .unwrap_or_else(|| chrono::Local::now().date_naive());
        let start = self.unit.lookback_start(as_of, self.lookback_units)?;

        let mut params = vec![
            self.unit.as_str().to_string(),
            start.format("%Y-%m-%d").to_string(),
            as_of.format("%Y-%m-%d").to_string(),
        ];
        let campus_filter = match &self.campus_id {
            Some(id) if id.trim().is_empty() => {
                return Err(Error::InvalidArgument("campus id must not be blank".into()));
            }
            Some(id) => {
                params.push(id.clone());
                " AND c.campus_id = ?4"
            }
            None => "",
        };

        let sql = match self.kind {
            MetricKind::Leads => flow_sql(
                self.unit,
                "fact_leads",
                "f.created_date",
                "",
                self.kind.value_field(),
                campus_filter,
            ),
            MetricKind::ClosedWon => flow_sql(
                self.unit,
                "fact_opportunities",
                "f.close_date",
                " AND f.is_won = 1",
                self.kind.value_field(),
                campus_filter,
            ),
            MetricKind::CumulativeArr => cumulative_arr_sql(self.unit, campus_filter),
        };
        Ok((sql, params))
    }
}

/// SQL expression truncating a date column to the start of its period.
/// SQLite's `weekday 0` jumps forward to Sunday, so `-6 days` lands on Monday.
fn bucket_expr(unit: PeriodUnit, column: &str) -> String {
    match unit {
        PeriodUnit::Day => format!("date({column})"),
        PeriodUnit::Week => format!("date({column}, 'weekday 0', '-6 days')"),
        PeriodUnit::Month => format!("date({column}, 'start of month')"),
    }
}

fn label_expr(unit: PeriodUnit, bucket: &str) -> String {
    match unit {
        PeriodUnit::Day => format!("strftime('%m/%d', {bucket})"),
        PeriodUnit::Week => format!("'Week of ' || strftime('%m/%d', {bucket})"),
        PeriodUnit::Month => format!("strftime('%Y-%m', {bucket})"),
    }
}

fn campus_expr() -> String {
    format!(
        "CASE WHEN f.campus_name IS NULL OR trim(f.campus_name) = '' THEN NULL
              WHEN c.campus_id IS NULL THEN '{NO_CAMPUS_MATCH}'
              ELSE c.campus_name END"
    )
}

const CAMPUS_JOIN: &str =
    "LEFT JOIN dim_campuses c ON lower(trim(f.campus_name)) = lower(trim(c.campus_name))";

fn flow_sql(
    unit: PeriodUnit,
    table: &str,
    date_column: &str,
    extra_where: &str,
    value_field: &str,
    campus_filter: &str,
) -> String {
    let bucket = bucket_expr(unit, date_column);
    let label = label_expr(unit, &bucket);
    let campus = campus_expr();
    format!(
        "SELECT ?1 AS period_type,
                {bucket} AS period_date,
                {label} AS formatted_date,
                {campus} AS campus_name,
                COUNT(*) AS {value_field}
         FROM {table} f
         {CAMPUS_JOIN}
         WHERE date({date_column}) >= ?2 AND date({date_column}) <= ?3{extra_where}{campus_filter}
         GROUP BY 2, 4
         ORDER BY 2 DESC, 4"
    )
}

/// SQLite date modifier advancing one period start to the next.
fn step_modifier(unit: PeriodUnit) -> &'static str {
    match unit {
        PeriodUnit::Day => "+1 day",
        PeriodUnit::Week => "+7 days",
        PeriodUnit::Month => "+1 month",
    }
}

/// Running ARR balance per campus for every period of the window.
///
/// The running sum covers all history up to the window end. Each period in
/// the window then takes, per campus, the balance of the latest period at or
/// before it, so quiet periods carry the previous balance forward. A campus
/// has no row before its first win. The calendar starts at the later of the
/// window start and the first win overall.
fn cumulative_arr_sql(unit: PeriodUnit, campus_filter: &str) -> String {
    let bucket = bucket_expr(unit, "f.close_date");
    let label = label_expr(unit, "b.period_date");
    let campus = campus_expr();
    let step = step_modifier(unit);
    format!(
        "WITH RECURSIVE per_period AS (
            SELECT {bucket} AS period_date,
                   {campus} AS campus_name,
                   SUM(COALESCE(f.arr, 0)) AS arr
            FROM fact_opportunities f
            {CAMPUS_JOIN}
            WHERE f.is_won = 1 AND f.close_date IS NOT NULL
              AND date(f.close_date) <= ?3{campus_filter}
            GROUP BY 1, 2
         ),
         running AS (
            SELECT period_date, campus_name,
                   SUM(arr) OVER (
                       PARTITION BY campus_name ORDER BY period_date
                       ROWS BETWEEN UNBOUNDED PRECEDING AND CURRENT ROW
                   ) AS cumulative_arr
            FROM per_period
         ),
         periods(period_date) AS (
            SELECT max(?2, (SELECT min(period_date) FROM per_period))
            WHERE EXISTS (SELECT 1 FROM per_period)
            UNION ALL
            SELECT date(period_date, '{step}') FROM periods
            WHERE date(period_date, '{step}') <= ?3
         ),
         campuses AS (
            SELECT DISTINCT campus_name FROM per_period
         ),
         balances AS (
            SELECT p.period_date,
                   k.campus_name,
                   (SELECT r.cumulative_arr FROM running r
                    WHERE r.campus_name IS k.campus_name
                      AND r.period_date <= p.period_date
                    ORDER BY r.period_date DESC
                    LIMIT 1) AS cumulative_arr
            FROM periods p
            CROSS JOIN campuses k
         )
         SELECT ?1 AS period_type,
                b.period_date,
                {label} AS formatted_date,
                b.campus_name,
                b.cumulative_arr
         FROM balances b
         WHERE b.cumulative_arr IS NOT NULL
         ORDER BY 2 DESC, 4"
    )
}
