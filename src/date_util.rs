use chrono::{Datelike, Duration, NaiveDate};

/// Monday of the ISO week containing `d`.
pub fn start_of_week(d: NaiveDate) -> NaiveDate {
    d - Duration::days(d.weekday().num_days_from_monday() as i64)
}

/// First day of the month containing `d`.
pub fn start_of_month(d: NaiveDate) -> NaiveDate {
    d.with_day(1).unwrap_or(d)
}

/// Parse a date from the shapes warehouse rows and spreadsheets hand us:
/// `2025-01-06`, `2025-01-06T00:00:00Z`, `2025-01-06 00:00:00+00`, `1/6/2025`.
pub fn parse_date_loose(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if let Some(prefix) = s.get(..10) {
        if let Ok(d) = NaiveDate::parse_from_str(prefix, "%Y-%m-%d") {
            return Some(d);
        }
    }
    NaiveDate::parse_from_str(s, "%m/%d/%Y").ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_start_of_week() {
        // 2025-01-08 is a Wednesday
        assert_eq!(start_of_week(date(2025, 1, 8)), date(2025, 1, 6));
        assert_eq!(start_of_week(date(2025, 1, 6)), date(2025, 1, 6));
        // Sunday belongs to the week that started the previous Monday
        assert_eq!(start_of_week(date(2025, 1, 12)), date(2025, 1, 6));
    }

    #[test]
    fn test_start_of_month() {
        assert_eq!(start_of_month(date(2025, 3, 17)), date(2025, 3, 1));
    }

    #[test]
    fn test_parse_date_loose() {
        assert_eq!(parse_date_loose("2025-01-06"), Some(date(2025, 1, 6)));
        assert_eq!(parse_date_loose("2025-01-06T00:00:00Z"), Some(date(2025, 1, 6)));
        assert_eq!(parse_date_loose(" 2025-01-06 12:30:00+00 "), Some(date(2025, 1, 6)));
        assert_eq!(parse_date_loose("1/6/2025"), Some(date(2025, 1, 6)));
        assert_eq!(parse_date_loose("not a date"), None);
        assert_eq!(parse_date_loose(""), None);
    }
}
