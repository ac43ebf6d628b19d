//! Observed period handling
//!
//! Metric rows are bucketed by calendar month. The canonical text form is
//! `YYYY-MM` (e.g. `2025-07`); anything else is rejected rather than guessed.

use chrono::NaiveDate;

/// Returns true if `value` is a canonical `YYYY-MM` period with a valid month.
pub fn is_canonical_period(value: &str) -> bool {
    parse_period(value).is_some()
}

/// Parse a canonical `YYYY-MM` period into the first day of that month.
///
/// Leading/trailing whitespace, single-digit months and full dates are all
/// rejected; the dashboard and the sheet only ever exchange the canonical form.
pub fn parse_period(value: &str) -> Option<NaiveDate> {
    let bytes = value.as_bytes();
    if bytes.len() != 7 || bytes[4] != b'-' {
        return None;
    }
    if !bytes
        .iter()
        .enumerate()
        .all(|(i, b)| i == 4 || b.is_ascii_digit())
    {
        return None;
    }

    let year: i32 = value[..4].parse().ok()?;
    let month: u32 = value[5..].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, 1)
}
