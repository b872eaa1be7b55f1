use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;

use crate::metrics::aggregate::Aggregation;
use crate::metrics::types::{MetricRow, TimeSeriesPoint};

/// Reshape an aggregation into one chart point per period, newest first.
///
/// Each point's label comes from any source row for that period that carried
/// a `formatted_date`, else the ISO date. Every campus in the campus list
/// appears in every point, with `0` where it had no rows.
pub fn shape_time_series(agg: &Aggregation, rows: &[MetricRow]) -> Vec<TimeSeriesPoint> {
    let mut labels: HashMap<NaiveDate, &str> = HashMap::new();
    for row in rows.iter().filter(|r| !r.formatted_date.is_empty()) {
        labels.entry(row.period_date).or_insert(row.formatted_date.as_str());
    }

    agg.periods
        .iter()
        .map(|period| {
            let campuses: BTreeMap<String, f64> = agg
                .campuses
                .iter()
                .map(|campus| (campus.clone(), agg.cell(*period, campus)))
                .collect();
            TimeSeriesPoint {
                period: *period,
                formatted_date: labels
                    .get(period)
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| period.format("%Y-%m-%d").to_string()),
                total: agg.totals.get(period).copied().unwrap_or(0.0),
                campuses,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::aggregate::aggregate;
    use crate::metrics::types::{AggregationMode, NO_CAMPUS_MATCH};
    use crate::query::period::PeriodUnit;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn row(period: NaiveDate, label: &str, campus: &str, value: f64) -> MetricRow {
        MetricRow {
            period_type: PeriodUnit::Week,
            period_date: period,
            formatted_date: label.to_string(),
            campus_name: campus.to_string(),
            value,
        }
    }

    #[test]
    fn test_shape_fills_missing_campuses_with_zero() {
        let w1 = date(2025, 1, 6);
        let w2 = date(2025, 1, 13);
        let rows = vec![
            row(w1, "Jan 06", "Austin", 2.0),
            row(w2, "Jan 13", "Denver", 5.0),
        ];
        let agg = aggregate(&rows, AggregationMode::Sum);
        let series = shape_time_series(&agg, &rows);

        assert_eq!(series.len(), 2);
        assert_eq!(series[0].period, w2);
        assert_eq!(series[0].formatted_date, "Jan 13");
        assert_eq!(series[0].total, 5.0);
        assert_eq!(series[0].campuses["Austin"], 0.0);
        assert_eq!(series[0].campuses["Denver"], 5.0);
        assert_eq!(series[1].campuses["Austin"], 2.0);
        assert_eq!(series[1].campuses["Denver"], 0.0);
    }

    #[test]
    fn test_label_falls_back_to_iso_date() {
        let w1 = date(2025, 1, 6);
        let rows = vec![row(w1, "", "Austin", 1.0)];
        let agg = aggregate(&rows, AggregationMode::Sum);
        let series = shape_time_series(&agg, &rows);
        assert_eq!(series[0].formatted_date, "2025-01-06");
    }

    #[test]
    fn test_label_taken_from_any_row_in_period() {
        let w1 = date(2025, 1, 6);
        let rows = vec![row(w1, "", "Austin", 1.0), row(w1, "Week of Jan 6", "Denver", 1.0)];
        let agg = aggregate(&rows, AggregationMode::Sum);
        let series = shape_time_series(&agg, &rows);
        assert_eq!(series[0].formatted_date, "Week of Jan 6");
    }

    #[test]
    fn test_hidden_campus_counts_in_total_only() {
        let w1 = date(2025, 1, 6);
        let rows = vec![row(w1, "", "Austin", 1.0), row(w1, "", NO_CAMPUS_MATCH, 4.0)];
        let agg = aggregate(&rows, AggregationMode::Sum);
        let series = shape_time_series(&agg, &rows);
        assert_eq!(series[0].total, 5.0);
        assert!(!series[0].campuses.contains_key(NO_CAMPUS_MATCH));
    }
}
