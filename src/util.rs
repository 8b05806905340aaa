// Utility helpers for lenient parsing and basic statistics.
//
// This module centralizes all the "dirty" CSV/number/date handling so the
// rest of the pipeline can assume clean, typed values. Cells that cannot be
// coerced become `None`; they never abort a row.
use crate::error::Result;
use chrono::{NaiveDate, NaiveDateTime};
use num_format::{Locale, ToFormattedString};
use std::fs;
use std::io::Cursor;
use std::path::Path;

/// Open a CSV reader over the file contents with any UTF-8 BOM removed.
///
/// The upstream exports are `utf-8-sig`; the BOM would otherwise end up glued
/// to the first header name and break column matching.
pub fn csv_reader(path: &Path, delimiter: u8) -> Result<csv::Reader<Cursor<Vec<u8>>>> {
    let mut bytes = fs::read(path)?;
    if bytes.starts_with(&[0xEF, 0xBB, 0xBF]) {
        bytes.drain(..3);
    }
    Ok(csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(Cursor::new(bytes)))
}

/// Parse a string-like value into `i64` while being forgiving about
/// formatting issues that are common in CSV exports (commas, spaces, text).
///
/// - Accepts `Option<&str>` so callers can pass through optional fields.
/// - Trims whitespace.
/// - Rejects values that contain alphabetic characters.
/// - Strips thousands separators like `","` before parsing.
/// - Returns `None` for anything that cannot be safely parsed.
pub fn parse_i64_safe(s: Option<&str>) -> Option<i64> {
    let s = s?.trim();
    if s.is_empty() {
        return None;
    }
    if s.chars().any(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    let s = s.replace(',', "");
    // Exports sometimes render integer ids as "12345.0".
    match s.split_once('.') {
        Some((int, frac)) if !frac.is_empty() && frac.chars().all(|c| c == '0') => {
            int.parse::<i64>().ok()
        }
        Some(_) => None,
        None => s.parse::<i64>().ok(),
    }
}

pub fn parse_i32_safe(s: Option<&str>) -> Option<i32> {
    parse_i64_safe(s).and_then(|v| i32::try_from(v).ok())
}

/// Lenient boolean coercion for flag columns.
///
/// Accepts numeric values (non-zero is `true`) and the textual variants the
/// source systems emit (`si`/`sí`/`s`/`true`, `no`/`n`/`false`).
pub fn parse_bool_safe(s: Option<&str>) -> Option<bool> {
    let s = s?.trim();
    if s.is_empty() {
        return None;
    }
    if let Some(n) = parse_i64_safe(Some(s)) {
        return Some(n != 0);
    }
    match s.to_lowercase().as_str() {
        "true" | "si" | "sí" | "s" => Some(true),
        "false" | "no" | "n" => Some(false),
        _ => None,
    }
}

// Candidate layouts in priority order. The datetime layout is tried last and
// separately because `NaiveDate` rejects trailing time-of-day input.
const DATE_LAYOUTS: [&str; 3] = ["%Y-%m-%d", "%d/%m/%Y", "%Y%m%d"];

/// Parse a date trying each known layout in priority order.
pub fn parse_date_safe(s: Option<&str>) -> Option<NaiveDate> {
    let s = s?.trim();
    if s.is_empty() {
        return None;
    }
    for layout in DATE_LAYOUTS {
        if let Ok(d) = NaiveDate::parse_from_str(s, layout) {
            return Some(d);
        }
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|dt| dt.date())
}

pub fn average(v: &[f64]) -> f64 {
    // Standard arithmetic mean; returns 0 for an empty slice to avoid NaNs.
    if v.is_empty() {
        return 0.0;
    }
    let sum: f64 = v.iter().copied().sum();
    sum / v.len() as f64
}

/// Ratio with a defined result for an empty denominator.
pub fn ratio(num: i64, den: i64) -> f64 {
    if den > 0 {
        num as f64 / den as f64
    } else {
        0.0
    }
}

pub fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

pub fn round3(v: f64) -> f64 {
    (v * 1000.0).round() / 1000.0
}

pub fn format_int<T>(n: T) -> String
where
    T: ToFormattedString,
{
    // Thin wrapper around `num-format` for integer-like values. This is used
    // for counts in console messages (e.g., `9.855 filas cargadas`).
    n.to_formatted_string(&Locale::es)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn parses_integers_with_separators() {
        assert_eq!(parse_i64_safe(Some("1,234,567")), Some(1_234_567));
        assert_eq!(parse_i64_safe(Some("  42 ")), Some(42));
        assert_eq!(parse_i64_safe(Some("12345.0")), Some(12345));
        assert_eq!(parse_i64_safe(Some("12.5")), None);
        assert_eq!(parse_i64_safe(Some("N/A")), None);
        assert_eq!(parse_i64_safe(Some("")), None);
        assert_eq!(parse_i64_safe(None), None);
    }

    #[test]
    fn parses_flags() {
        assert_eq!(parse_bool_safe(Some("1")), Some(true));
        assert_eq!(parse_bool_safe(Some("0")), Some(false));
        assert_eq!(parse_bool_safe(Some("Sí")), Some(true));
        assert_eq!(parse_bool_safe(Some("no")), Some(false));
        assert_eq!(parse_bool_safe(Some("quizás")), None);
        assert_eq!(parse_bool_safe(None), None);
    }

    #[test]
    fn tries_date_layouts_in_order() {
        let expected = NaiveDate::from_ymd_opt(2025, 3, 4).unwrap();
        assert_eq!(parse_date_safe(Some("2025-03-04")), Some(expected));
        assert_eq!(parse_date_safe(Some("04/03/2025")), Some(expected));
        assert_eq!(parse_date_safe(Some("20250304")), Some(expected));
        assert_eq!(parse_date_safe(Some("2025-03-04 13:45:00")), Some(expected));
        assert_eq!(parse_date_safe(Some("marzo 4")), None);
        assert_eq!(parse_date_safe(Some("")), None);
    }

    #[test]
    fn ratio_handles_zero_denominator() {
        assert_eq!(ratio(20, 25), 0.8);
        assert_eq!(ratio(5, 0), 0.0);
        assert_eq!(ratio(0, 0), 0.0);
    }

    #[test]
    fn rounding() {
        assert_eq!(round1(87.6543), 87.7);
        assert_eq!(round3(0.66666), 0.667);
    }
}
