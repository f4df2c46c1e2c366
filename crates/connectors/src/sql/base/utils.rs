//! Text-to-temporal parsing shared by the parameter binders.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use model::core::value::Value;

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
];

pub fn parse_naive_datetime(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .or_else(|| parse_datetime_utc(text).map(|dt| dt.naive_utc()))
        .or_else(|| parse_date(text).and_then(|d| d.and_hms_opt(0, 0, 0)))
}

/// RFC 3339 text, or naive text read as UTC.
pub fn parse_datetime_utc(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
                .map(|naive| naive.and_utc())
        })
}

pub fn parse_date(text: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d").ok()
}

pub fn parse_time(text: &str) -> Option<NaiveTime> {
    let text = text.trim();
    NaiveTime::parse_from_str(text, "%H:%M:%S%.f")
        .or_else(|_| NaiveTime::parse_from_str(text, "%H:%M:%S"))
        .ok()
}

/// Reads text persisted by [`Value::to_json`] back as the temporal value it
/// was written from. `None` when the text is not a date or time.
pub fn temporal_from_text(text: &str) -> Option<Value> {
    let text = text.trim();
    if let Some(ts) = DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
    {
        return Some(Value::Timestamp(ts));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(Value::TimestampTz(dt.with_timezone(&Utc)));
    }
    parse_date(text)
        .map(Value::Date)
        .or_else(|| parse_time(text).map(Value::Time))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_checkpointed_timestamps() {
        let ts = parse_naive_datetime("2024-03-01T10:15:00.000250").unwrap();
        assert_eq!(ts.to_string(), "2024-03-01 10:15:00.000250");
        assert!(parse_naive_datetime("2024-03-01").is_some());
        assert!(parse_naive_datetime("yesterday").is_none());
    }

    #[test]
    fn naive_text_is_utc() {
        let dt = parse_datetime_utc("2024-03-01 10:15:00").unwrap();
        assert_eq!(dt.to_rfc3339(), "2024-03-01T10:15:00+00:00");
        let dt = parse_datetime_utc("2024-03-01T12:15:00+02:00").unwrap();
        assert_eq!(dt.to_rfc3339(), "2024-03-01T10:15:00+00:00");
    }

    #[test]
    fn temporal_text_keeps_its_kind() {
        let ts = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_nano_opt(10, 0, 0, 3_333_333)
            .unwrap();
        assert_eq!(
            temporal_from_text("2024-01-01T10:00:00.003333333"),
            Some(Value::Timestamp(ts))
        );
        assert!(matches!(
            temporal_from_text("2024-01-01T10:00:00.000000Z"),
            Some(Value::TimestampTz(_))
        ));
        assert!(matches!(temporal_from_text("2024-01-01"), Some(Value::Date(_))));
        assert!(matches!(temporal_from_text("10:00:00.5"), Some(Value::Time(_))));
        assert_eq!(temporal_from_text("Acme Ltd"), None);
        assert_eq!(temporal_from_text("42"), None);
    }
}
