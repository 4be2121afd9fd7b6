//! Parsing of stringified values for structured fields

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime};

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Accepts true/false, yes/no, t/f, 1/0 in any case
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "t" | "1" => Some(true),
        "false" | "no" | "f" | "0" => Some(false),
        _ => None,
    }
}

/// Integers and decimals; non-finite values are rejected
pub fn parse_number(value: &str) -> Option<f64> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
}

/// Parse a date or date-time into UTC epoch milliseconds.
///
/// Values without an offset are taken as UTC; a bare date is midnight.
pub fn parse_datetime_millis(value: &str) -> Option<i64> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.timestamp_millis());
    }
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
            return Some(dt.and_utc().timestamp_millis());
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .map(date_millis)
}

fn date_millis(date: NaiveDate) -> i64 {
    date.and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc().timestamp_millis())
        .unwrap_or_default()
}

/// Millisecond interval `[start, end)` named by a query term.
///
/// `YYYY`, `YYYY-MM` and `YYYY-MM-DD` cover the whole year, month or day;
/// a full date-time covers its second.
pub fn date_period(value: &str) -> Option<(i64, i64)> {
    let value = value.trim();
    let parts: Vec<&str> = value.split('-').collect();
    let all_digits = parts
        .iter()
        .all(|p| !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit()));

    if all_digits {
        match parts.as_slice() {
            [year] if year.len() == 4 => {
                let year: i32 = year.parse().ok()?;
                let start = NaiveDate::from_ymd_opt(year, 1, 1)?;
                let end = NaiveDate::from_ymd_opt(year + 1, 1, 1)?;
                return Some((date_millis(start), date_millis(end)));
            }
            [year, month] if year.len() == 4 => {
                let start = NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, 1)?;
                let end = if start.month() == 12 {
                    NaiveDate::from_ymd_opt(start.year() + 1, 1, 1)?
                } else {
                    NaiveDate::from_ymd_opt(start.year(), start.month() + 1, 1)?
                };
                return Some((date_millis(start), date_millis(end)));
            }
            [_, _, _] => {
                let start = NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()?;
                let end = start + Duration::days(1);
                return Some((date_millis(start), date_millis(end)));
            }
            _ => return None,
        }
    }

    let millis = parse_datetime_millis(value)?;
    let start = millis - millis.rem_euclid(1000);
    Some((start, start + 1000))
}
