use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::query::period::PeriodUnit;

/// Campus label for rows that carry no campus at all.
pub const ALL_CAMPUSES: &str = "All Campuses";

/// Campus label the warehouse uses for rows whose campus text does not
/// resolve to a known campus. Hidden from campus lists.
pub const NO_CAMPUS_MATCH: &str = "No Campus Match";

/// A row exactly as the SQL executor returned it.
pub type RawRow = serde_json::Map<String, serde_json::Value>;

/// How values for one campus are combined across rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregationMode {
    /// Flow metrics: values add up.
    Sum,
    /// Stock metrics: a running balance, so the newest value wins.
    Latest,
}

/// The metrics the warehouse knows how to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    Leads,
    ClosedWon,
    CumulativeArr,
}

impl MetricKind {
    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "leads" | "lead" => Ok(MetricKind::Leads),
            "closed_won" | "opportunities" => Ok(MetricKind::ClosedWon),
            "cumulative_arr" | "arr" => Ok(MetricKind::CumulativeArr),
            other => Err(Error::UnknownMetric(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Leads => "leads",
            MetricKind::ClosedWon => "closed_won",
            MetricKind::CumulativeArr => "cumulative_arr",
        }
    }

    /// Column carrying the metric value in query results.
    pub fn value_field(&self) -> &'static str {
        match self {
            MetricKind::Leads => "lead_count",
            MetricKind::ClosedWon => "opportunity_count",
            MetricKind::CumulativeArr => "cumulative_arr",
        }
    }

    pub fn mode(&self) -> AggregationMode {
        match self {
            MetricKind::Leads | MetricKind::ClosedWon => AggregationMode::Sum,
            MetricKind::CumulativeArr => AggregationMode::Latest,
        }
    }
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One observed data point after normalization.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricRow {
    pub period_type: PeriodUnit,
    /// Always the first day of its period.
    pub period_date: NaiveDate,
    /// Display label; empty when the source had none.
    pub formatted_date: String,
    pub campus_name: String,
    pub value: f64,
}

/// Change of a period's total against its chronological predecessor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PeriodChange {
    pub raw: f64,
    pub percentage: f64,
}

/// One chart point per period.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeSeriesPoint {
    pub period: NaiveDate,
    pub formatted_date: String,
    pub total: f64,
    pub campuses: BTreeMap<String, f64>,
}

/// The full aggregated response for one metric fetch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSummary {
    pub metric: MetricKind,
    pub period_type: PeriodUnit,
    /// Newest first.
    pub periods: Vec<NaiveDate>,
    pub campuses: Vec<String>,
    pub totals: BTreeMap<NaiveDate, f64>,
    pub campus_totals: BTreeMap<String, f64>,
    pub latest_period: Option<NaiveDate>,
    pub latest_total: f64,
    pub changes: BTreeMap<NaiveDate, PeriodChange>,
    pub time_series: Vec<TimeSeriesPoint>,
}

impl MetricsSummary {
    /// The all-empty shape returned when there is nothing to aggregate or
    /// the fetch failed.
    pub fn empty(metric: MetricKind, period_type: PeriodUnit) -> Self {
        Self {
            metric,
            period_type,
            periods: Vec::new(),
            campuses: Vec::new(),
            totals: BTreeMap::new(),
            campus_totals: BTreeMap::new(),
            latest_period: None,
            latest_total: 0.0,
            changes: BTreeMap::new(),
            time_series: Vec::new(),
        }
    }
}

/// Parameters for a single metric fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsRequest {
    pub period: PeriodUnit,
    pub lookback_units: u32,
    pub campus_id: Option<String>,
    /// A disabled request never touches the database.
    pub enabled: bool,
    /// Opaque; bumping it forces a re-fetch in [`super::MetricsHandle`].
    pub refetch_key: u64,
    /// End of the window. Defaults to today.
    pub as_of: Option<NaiveDate>,
}

impl Default for MetricsRequest {
    fn default() -> Self {
        Self {
            period: PeriodUnit::Week,
            lookback_units: 12,
            campus_id: None,
            enabled: true,
            refetch_key: 0,
            as_of: None,
        }
    }
}

/// Async-resource shape handed to presentation code.
#[derive(Debug, Clone, Serialize)]
pub struct Resource<T> {
    pub data: T,
    pub loading: bool,
    pub error: Option<String>,
}
