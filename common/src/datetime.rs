use chrono::{DateTime, NaiveDate, Utc};

/// Ticks (100-nanosecond units) between the proleptic Gregorian epoch
/// `0001-01-01T00:00:00Z` and the Unix epoch. The wire format's DateTime
/// marker is a tick count relative to the former, matching `System.DateTime`
/// so that a faithful re-encoding keeps the same magnitude of values the
/// original engine produced.
const TICKS_PER_SECOND: i64 = 10_000_000;
const UNIX_EPOCH_TICKS: i64 = 621_355_968_000_000_000;

/// Converts a tick count (100ns units since `0001-01-01`) to a UTC timestamp.
/// Returns `None` if the tick count is outside the range `chrono` can represent.
pub fn ticks_to_datetime(ticks: i64) -> Option<DateTime<Utc>> {
    let unix_ticks = ticks.checked_sub(UNIX_EPOCH_TICKS)?;
    let secs = unix_ticks.div_euclid(TICKS_PER_SECOND);
    let rem_ticks = unix_ticks.rem_euclid(TICKS_PER_SECOND);
    let nanos = (rem_ticks * 100) as u32;
    DateTime::from_timestamp(secs, nanos)
}

/// Converts a UTC timestamp into a tick count since `0001-01-01`.
pub fn datetime_to_ticks(dt: DateTime<Utc>) -> i64 {
    let secs = dt.timestamp();
    let nanos = dt.timestamp_subsec_nanos() as i64;
    secs * TICKS_PER_SECOND + nanos / 100 + UNIX_EPOCH_TICKS
}

/// Canonical display form used when a DateTime value is coerced into a
/// Text column: `YYYY-MM-DDTHH:MM:SS.fffffff` (7 fractional digits, matching
/// the 100ns tick resolution).
pub fn canonical_datetime_string(ticks: i64) -> String {
    match ticks_to_datetime(ticks) {
        Some(dt) => dt.format("%Y-%m-%dT%H:%M:%S%.7f").to_string(),
        None => ticks.to_string(),
    }
}

/// Recognizes the date-time literal shape used by the parser to decide
/// whether a quoted string literal should be interpreted as a DateTime
/// value rather than plain text: `YYYY-MM-DD` optionally followed by
/// `[T ]HH:MM:SS[.fffffff]`.
pub fn parse_datetime_literal(s: &str) -> Option<i64> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(datetime_to_ticks(dt.with_timezone(&Utc)));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(s, fmt) {
            return Some(datetime_to_ticks(naive.and_utc()));
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        let naive = date.and_hms_opt(0, 0, 0)?;
        return Some(datetime_to_ticks(naive.and_utc()));
    }
    None
}
