//! Windows FILETIME handling.
//!
//! FILETIME is a 64-bit little-endian count of 100-ns intervals since
//! 1601-01-01 UTC. Grounded on the teacher's `ntfs::timestamps` module but
//! rebuilt around `chrono::DateTime<Utc>` instead of `SystemTime`, since the
//! pipeline needs ISO-8601 and epoch-second rendering, not just round-tripping.

use chrono::{DateTime, TimeZone, Utc};

const FILETIME_TICKS_PER_SECOND: i64 = 10_000_000;

/// Seconds between the FILETIME epoch (1601-01-01) and the Unix epoch (1970-01-01).
const WINDOWS_EPOCH_DIFF_SECONDS: i64 = 11_644_473_600;

/// Convert a raw FILETIME value to a UTC datetime.
///
/// Returns `None` if the value does not correspond to a representable
/// `chrono` timestamp (e.g. absurdly large carved garbage).
pub fn filetime_to_datetime(filetime: u64) -> Option<DateTime<Utc>> {
    let filetime = filetime as i64;
    let unix_seconds = filetime / FILETIME_TICKS_PER_SECOND - WINDOWS_EPOCH_DIFF_SECONDS;
    let subsec_ticks = filetime % FILETIME_TICKS_PER_SECOND;
    let nanos = (subsec_ticks * 100) as u32;
    match Utc.timestamp_opt(unix_seconds, nanos) {
        chrono::LocalResult::Single(dt) => Some(dt),
        _ => None,
    }
}

pub fn datetime_to_filetime(dt: DateTime<Utc>) -> u64 {
    let unix_seconds = dt.timestamp();
    let nanos = dt.timestamp_subsec_nanos();
    let ticks = (unix_seconds + WINDOWS_EPOCH_DIFF_SECONDS) * FILETIME_TICKS_PER_SECOND
        + (nanos / 100) as i64;
    ticks.max(0) as u64
}

/// ISO-8601 rendering used by the CSV and JSON-Lines output formats.
pub fn to_iso(filetime: u64) -> String {
    match filetime_to_datetime(filetime) {
        Some(dt) => dt.to_rfc3339(),
        None => String::from("invalid"),
    }
}

/// Unix epoch seconds, used by the bodyfile (mactime) output format.
pub fn to_epoch(filetime: u64) -> i64 {
    filetime_to_datetime(filetime)
        .map(|dt| dt.timestamp())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unix_epoch_round_trips() {
        let unix_epoch_filetime = (WINDOWS_EPOCH_DIFF_SECONDS as u64) * 10_000_000;
        let dt = filetime_to_datetime(unix_epoch_filetime).unwrap();
        assert_eq!(dt.timestamp(), 0);
        assert_eq!(datetime_to_filetime(dt), unix_epoch_filetime);
    }

    #[test]
    fn known_y2k_timestamp() {
        let year_2000_unix = 946_684_800i64;
        let filetime = ((year_2000_unix + WINDOWS_EPOCH_DIFF_SECONDS) as u64) * 10_000_000;
        let dt = filetime_to_datetime(filetime).unwrap();
        assert_eq!(dt.timestamp(), year_2000_unix);
    }

    #[test]
    fn windows_epoch_is_before_unix_epoch() {
        assert_eq!(to_epoch(0), -WINDOWS_EPOCH_DIFF_SECONDS);
    }
}
