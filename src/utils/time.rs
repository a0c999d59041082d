use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use crate::error::{Error, Result};

/// Parses a calendar day from `YYYY-MM-DD` or a full timestamp.
/// Timestamps are reduced to their UTC date.
pub fn parse_day(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc).date_naive());
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|dt| dt.date())
}

pub fn require_day(raw: &str) -> Result<NaiveDate> {
    parse_day(raw).ok_or_else(|| Error::BadRequest("Invalid date format".to_string()))
}

/// `2024-07-01` -> `Monday`
pub fn weekday_name(date: NaiveDate) -> String {
    date.format("%A").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_and_timestamp_dates() {
        let expected = NaiveDate::from_ymd_opt(2024, 7, 1).unwrap();
        assert_eq!(parse_day("2024-07-01"), Some(expected));
        assert_eq!(parse_day("2024-07-01T09:30:00Z"), Some(expected));
        assert_eq!(parse_day("2024-07-01T03:00:00+05:30"), Some(NaiveDate::from_ymd_opt(2024, 6, 30).unwrap()));
        assert_eq!(parse_day("2024-07-01T09:30:00"), Some(expected));
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_day("yesterday").is_none());
        assert!(parse_day("2024-13-01").is_none());
        assert!(matches!(require_day(""), Err(Error::BadRequest(_))));
    }

    #[test]
    fn weekday() {
        assert_eq!(weekday_name(NaiveDate::from_ymd_opt(2024, 7, 1).unwrap()), "Monday");
    }
}
