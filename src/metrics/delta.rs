use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::metrics::types::PeriodChange;

/// Percentage change from `previous` to `current`. Zero when `previous` is
/// zero so callers never see `inf` or `NaN`.
pub fn percent_change(current: f64, previous: f64) -> f64 {
    if previous == 0.0 {
        0.0
    } else {
        (current - previous) / previous * 100.0
    }
}

/// Compute each period's change against its chronological predecessor.
///
/// `periods` is newest first, so the predecessor of `periods[i]` is
/// `periods[i + 1]`, not `periods[i - 1]`. The oldest period has nothing to
/// compare against and gets a zero change.
pub fn period_changes(
    periods: &[NaiveDate],
    totals: &BTreeMap<NaiveDate, f64>,
) -> BTreeMap<NaiveDate, PeriodChange> {
    let total_of = |p: &NaiveDate| totals.get(p).copied().unwrap_or(0.0);

    periods
        .iter()
        .enumerate()
        .map(|(i, period)| {
            let change = match periods.get(i + 1) {
                Some(previous) => {
                    let current = total_of(period);
                    let prev = total_of(previous);
                    PeriodChange {
                        raw: current - prev,
                        percentage: percent_change(current, prev),
                    }
                }
                None => PeriodChange::default(),
            };
            (*period, change)
        })
        .collect()
}
