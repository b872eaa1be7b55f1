use serde_json::Value;

use crate::date_util::parse_date_loose;
use crate::metrics::types::{MetricRow, RawRow, ALL_CAMPUSES};
use crate::query::period::PeriodUnit;

/// Turn raw query rows into fully populated [`MetricRow`]s.
///
/// Missing `period_type` falls back to `requested`, missing or blank
/// `campus_name` to [`ALL_CAMPUSES`], and unparseable values to `0`. Rows
/// without a usable `period_date` are dropped.
pub fn normalize_rows(raw: &[RawRow], requested: PeriodUnit, value_field: &str) -> Vec<MetricRow> {
    raw.iter()
        .filter_map(|row| normalize_row(row, requested, value_field))
        .collect()
}

fn normalize_row(row: &RawRow, requested: PeriodUnit, value_field: &str) -> Option<MetricRow> {
    let period_type = row
        .get("period_type")
        .and_then(Value::as_str)
        .and_then(|s| PeriodUnit::parse(s).ok())
        .unwrap_or(requested);

    let period_date = match row.get("period_date").and_then(Value::as_str).and_then(parse_date_loose) {
        Some(d) => period_type.truncate(d),
        None => {
            log::debug!("Dropping metric row without a usable period_date: {row:?}");
            return None;
        }
    };

    let formatted_date = row
        .get("formatted_date")
        .and_then(Value::as_str)
        .map(|s| s.trim().to_string())
        .unwrap_or_default();

    let campus_name = row
        .get("campus_name")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(ALL_CAMPUSES)
        .to_string();

    let value = row
        .get(value_field)
        .or_else(|| row.get("value"))
        .map(coerce_number)
        .unwrap_or(0.0);

    Some(MetricRow {
        period_type,
        period_date,
        formatted_date,
        campus_name,
        value,
    })
}

/// Best-effort numeric coercion. Anything that is not a finite number,
/// or a string holding one, becomes `0`.
pub fn coerce_number(v: &Value) -> f64 {
    let n = match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    n.filter(|x| x.is_finite()).unwrap_or(0.0)
}
