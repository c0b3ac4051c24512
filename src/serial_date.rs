//! Spreadsheet-style serial dates: fractional days since 1899-12-30, stored as
//! a little-endian `f64` in front of every raw record.

#[cfg(test)]
use chrono::DateTime;
use chrono::NaiveDateTime;

const MILLIS_PER_DAY: f64 = 86_400_000.0;
/// Days between the serial epoch and 1970-01-01.
const UNIX_EPOCH_SERIAL_DAYS: i64 = 25_569;

/// Encode a local wall-clock time as serial days.
pub fn to_serial(ts: NaiveDateTime) -> f64 {
    let millis = ts.and_utc().timestamp_millis();
    (millis + UNIX_EPOCH_SERIAL_DAYS * 86_400_000) as f64 / MILLIS_PER_DAY
}

/// Decode serial days back to wall-clock time, rounded to the millisecond.
#[cfg(test)]
pub fn from_serial(days: f64) -> Option<NaiveDateTime> {
    if !days.is_finite() {
        return None;
    }
    let millis = (days * MILLIS_PER_DAY).round() as i64 - UNIX_EPOCH_SERIAL_DAYS * 86_400_000;
    DateTime::from_timestamp_millis(millis).map(|dt| dt.naive_utc())
}

pub fn to_bytes(ts: NaiveDateTime) -> [u8; 8] {
    to_serial(ts).to_le_bytes()
}

#[cfg(test)]
pub fn from_bytes(bytes: [u8; 8]) -> Option<NaiveDateTime> {
    from_serial(f64::from_le_bytes(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32, ms: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_milli_opt(h, mi, s, ms)
            .unwrap()
    }

    #[test]
    fn known_serial_values() {
        assert_eq!(to_serial(at(1899, 12, 30, 0, 0, 0, 0)), 0.0);
        assert_eq!(to_serial(at(1900, 1, 1, 0, 0, 0, 0)), 2.0);
        assert_eq!(to_serial(at(1970, 1, 1, 12, 0, 0, 0)), 25_569.5);
    }

    #[test]
    fn round_trip_keeps_milliseconds() {
        for ts in [
            at(2024, 2, 29, 23, 59, 59, 999),
            at(2026, 10, 18, 7, 3, 1, 1),
            at(2031, 1, 1, 0, 0, 0, 500),
        ] {
            assert_eq!(from_bytes(to_bytes(ts)), Some(ts));
        }
    }

    #[test]
    fn non_finite_serial_is_rejected() {
        assert_eq!(from_serial(f64::NAN), None);
        assert_eq!(from_serial(f64::INFINITY), None);
    }
}
