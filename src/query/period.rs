use std::sync::LazyLock;

use chrono::{Days, Months, NaiveDate};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::date_util::{start_of_month, start_of_week};
use crate::error::{Error, Result};

static RE_LOOKBACK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{1,4})\s*([dDwWmM])$").unwrap());

/// Aggregation granularity for metric rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeriodUnit {
    Day,
    Week,
    Month,
}

impl PeriodUnit {
    /// Parse a unit name.
    ///
    /// Accepts `day`, `week`, `month` in any case, their plurals, and the
    /// adjectives `daily`, `weekly`, `monthly`.
    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "day" | "days" | "daily" => Ok(PeriodUnit::Day),
            "week" | "weeks" | "weekly" => Ok(PeriodUnit::Week),
            "month" | "months" | "monthly" => Ok(PeriodUnit::Month),
            _ => Err(Error::PeriodParse(format!("unrecognized period unit: {s}"))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PeriodUnit::Day => "day",
            PeriodUnit::Week => "week",
            PeriodUnit::Month => "month",
        }
    }

    /// Truncate a date to the start of the unit that contains it.
    pub fn truncate(&self, d: NaiveDate) -> NaiveDate {
        match self {
            PeriodUnit::Day => d,
            PeriodUnit::Week => start_of_week(d),
            PeriodUnit::Month => start_of_month(d),
        }
    }

    /// Move `n` whole units back from `d`, or `None` past the start of the
    /// calendar. Month steps clamp to the end of shorter months.
    pub fn step_back(&self, d: NaiveDate, n: u32) -> Option<NaiveDate> {
        match self {
            PeriodUnit::Day => d.checked_sub_days(Days::new(u64::from(n))),
            PeriodUnit::Week => d.checked_sub_days(Days::new(u64::from(n) * 7)),
            PeriodUnit::Month => d.checked_sub_months(Months::new(n)),
        }
    }

    /// First period start of a lookback window of `units` periods ending with
    /// the period that contains `as_of`.
    pub fn lookback_start(&self, as_of: NaiveDate, units: u32) -> Result<NaiveDate> {
        if units == 0 {
            return Err(Error::InvalidArgument(
                "lookback must cover at least one period".into(),
            ));
        }
        self.step_back(self.truncate(as_of), units - 1)
            .ok_or_else(|| {
                Error::InvalidArgument(format!("lookback of {units} {self}s is out of range"))
            })
    }
}

impl std::fmt::Display for PeriodUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PeriodUnit {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        PeriodUnit::parse(s)
    }
}

/// A lookback window written as `<count><unit>`, e.g. `12w` or `30d`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LookbackWindow {
    pub unit: PeriodUnit,
    pub units: u32,
}

impl LookbackWindow {
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        let caps = RE_LOOKBACK
            .captures(s)
            .ok_or_else(|| Error::PeriodParse(format!("unrecognized lookback: {s}")))?;
        let units: u32 = caps[1]
            .parse()
            .map_err(|_| Error::PeriodParse(format!("invalid count: {s}")))?;
        if units == 0 {
            return Err(Error::PeriodParse(format!("lookback must be positive: {s}")));
        }
        let unit = match caps[2].to_ascii_lowercase().as_str() {
            "d" => PeriodUnit::Day,
            "w" => PeriodUnit::Week,
            _ => PeriodUnit::Month,
        };
        Ok(LookbackWindow { unit, units })
    }
}

impl std::fmt::Display for LookbackWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let suffix = match self.unit {
            PeriodUnit::Day => 'd',
            PeriodUnit::Week => 'w',
            PeriodUnit::Month => 'm',
        };
        write!(f, "{}{suffix}", self.units)
    }
}
