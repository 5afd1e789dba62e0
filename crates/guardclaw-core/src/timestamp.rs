//! The GEF wire timestamp.
//!
//! Wire format: `YYYY-MM-DDTHH:MM:SS.mmmZ`, with exactly three fractional-second
//! digits and a trailing `Z`. No offset form, no microseconds.
//!
//! Every envelope timestamp in GuardClaw comes from [`gef_timestamp_millis`].
//! Sub-millisecond digits are truncated, not rounded, so a recorded
//! timestamp never post-dates the reading it was taken from.

use chrono::{NaiveDate, Utc};

/// Current UTC time in GEF wire format.
pub fn gef_timestamp_millis() -> String {
    let now = Utc::now();
    // timestamp_subsec_millis truncates the nanosecond field.
    format!(
        "{}.{:03}Z",
        now.format("%Y-%m-%dT%H:%M:%S"),
        now.timestamp_subsec_millis().min(999)
    )
}

/// Check a string against the GEF wire timestamp format.
///
/// Enforces the exact 24-character shape, digit positions, and calendar
/// validity. `"2026-02-26T00:00:00Z"` (no fraction) and
/// `"2026-02-26T00:00:00.000000Z"` (microseconds) both fail.
pub fn validate_gef_timestamp(ts: &str) -> bool {
    let b = ts.as_bytes();
    if b.len() != 24 {
        return false;
    }
    let digits_at = |range: std::ops::Range<usize>| b[range].iter().all(u8::is_ascii_digit);
    let shape_ok = digits_at(0..4)
        && b[4] == b'-'
        && digits_at(5..7)
        && b[7] == b'-'
        && digits_at(8..10)
        && b[10] == b'T'
        && digits_at(11..13)
        && b[13] == b':'
        && digits_at(14..16)
        && b[16] == b':'
        && digits_at(17..19)
        && b[19] == b'.'
        && digits_at(20..23)
        && b[23] == b'Z';
    if !shape_ok {
        return false;
    }

    // Shape is right; now the fields must name a real instant.
    let num = |range: std::ops::Range<usize>| -> u32 {
        ts[range].parse().unwrap_or(u32::MAX)
    };
    let (year, month, day) = (num(0..4), num(5..7), num(8..10));
    let (hour, minute, second) = (num(11..13), num(14..16), num(17..19));

    NaiveDate::from_ymd_opt(year as i32, month, day).is_some()
        && hour < 24
        && minute < 60
        && second < 60
}
