use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::NaiveDate;

use crate::metrics::types::{AggregationMode, MetricRow, NO_CAMPUS_MATCH};

/// Rows grouped by period and campus.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Aggregation {
    /// Distinct periods, newest first.
    pub periods: Vec<NaiveDate>,
    /// Distinct campuses in name order, without [`NO_CAMPUS_MATCH`].
    pub campuses: Vec<String>,
    pub totals: BTreeMap<NaiveDate, f64>,
    pub campus_totals: BTreeMap<String, f64>,
    /// Per period, per campus value.
    pub cells: BTreeMap<NaiveDate, BTreeMap<String, f64>>,
}

impl Aggregation {
    pub fn cell(&self, period: NaiveDate, campus: &str) -> f64 {
        self.cells
            .get(&period)
            .and_then(|by_campus| by_campus.get(campus))
            .copied()
            .unwrap_or(0.0)
    }
}

/// Group normalized rows by period and campus.
///
/// In [`AggregationMode::Sum`] every total is a plain sum. In
/// [`AggregationMode::Latest`] a campus total is the campus's value in its
/// newest period, a period total sums each campus's value for that period,
/// and a repeated (period, campus) pair keeps the last row seen.
///
/// Rows tagged [`NO_CAMPUS_MATCH`] still count toward `totals` and
/// `campus_totals`; only the campus list hides them.
pub fn aggregate(rows: &[MetricRow], mode: AggregationMode) -> Aggregation {
    let mut cells: BTreeMap<NaiveDate, BTreeMap<String, f64>> = BTreeMap::new();
    for row in rows {
        let slot = cells
            .entry(row.period_date)
            .or_default()
            .entry(row.campus_name.clone())
            .or_insert(0.0);
        match mode {
            AggregationMode::Sum => *slot += row.value,
            AggregationMode::Latest => *slot = row.value,
        }
    }

    let periods: Vec<NaiveDate> = cells.keys().rev().copied().collect();

    let campuses: Vec<String> = rows
        .iter()
        .map(|r| r.campus_name.as_str())
        .filter(|name| *name != NO_CAMPUS_MATCH)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_string)
        .collect();

    let totals: BTreeMap<NaiveDate, f64> = cells
        .iter()
        .map(|(period, by_campus)| (*period, by_campus.values().sum()))
        .collect();

    let campus_totals = match mode {
        AggregationMode::Sum => {
            let mut sums: BTreeMap<String, f64> = BTreeMap::new();
            for by_campus in cells.values() {
                for (campus, value) in by_campus {
                    *sums.entry(campus.clone()).or_insert(0.0) += value;
                }
            }
            sums
        }
        AggregationMode::Latest => {
            // `cells` iterates oldest to newest, so later periods overwrite.
            let mut latest: HashMap<&str, f64> = HashMap::new();
            for by_campus in cells.values() {
                for (campus, value) in by_campus {
                    latest.insert(campus.as_str(), *value);
                }
            }
            latest
                .into_iter()
                .map(|(campus, value)| (campus.to_string(), value))
                .collect()
        }
    };

    Aggregation {
        periods,
        campuses,
        totals,
        campus_totals,
        cells,
    }
}
