// Utility helpers for coercion, month parsing and number formatting.
//
// This module centralizes all the "dirty" value handling so the rest of the
// code can assume clean, typed values.
use chrono::{Datelike, NaiveDate};
use num_format::{Locale, ToFormattedString};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

/// Four digits, a dash, two digits at the start of a label: a date that
/// landed in a department or status column.
static DATE_SHAPED: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{4}-\d{2}").expect("valid regex"));

pub fn is_date_shaped(s: &str) -> bool {
    DATE_SHAPED.is_match(s)
}

/// Read a trimmed string out of a JSON value.
///
/// Numbers are rendered with their JSON text so a month sent as a number
/// still survives; `null`, booleans, arrays and objects yield `None`.
pub fn value_as_trimmed(v: Option<&Value>) -> Option<String> {
    let s = match v? {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

/// Coerce a count-like value to a non-negative integer.
///
/// - Integers pass through; negative ones become `0`.
/// - Non-negative floats are truncated.
/// - Strings are trimmed and stripped of thousands separators (`","`).
/// - Anything that cannot be safely parsed becomes `0`.
pub fn parse_count_safe(v: Option<&Value>) -> u64 {
    match v {
        Some(Value::Number(n)) => {
            if let Some(u) = n.as_u64() {
                u
            } else {
                n.as_f64().map(float_to_count).unwrap_or(0)
            }
        }
        Some(Value::String(s)) => parse_count_str(s),
        _ => 0,
    }
}

fn parse_count_str(s: &str) -> u64 {
    let s = s.trim();
    if s.is_empty() || s.chars().any(|c| c.is_ascii_alphabetic()) {
        return 0;
    }
    let s = s.replace(',', "");
    if let Ok(u) = s.parse::<u64>() {
        return u;
    }
    s.parse::<f64>().map(float_to_count).unwrap_or(0)
}

fn float_to_count(f: f64) -> u64 {
    if f.is_finite() && f > 0.0 {
        f.trunc() as u64
    } else {
        0
    }
}

/// Parse the year-month part of a date-like string.
///
/// Accepts `YYYY-MM`, `YYYY-MM-DD`, `YYYY/MM(/DD)` and `YYYY.MM(.DD)`, with
/// anything after the first whitespace (a time part) ignored.
pub fn parse_month_safe(s: &str) -> Option<NaiveDate> {
    let head = s.split_whitespace().next()?;
    let head = head.split('T').next()?;
    let normalized = head.replace(['/', '.'], "-");
    let mut parts = normalized.split('-');
    let year: i32 = parts.next()?.parse().ok()?;
    let month: u32 = parts.next()?.parse().ok()?;
    if !(1000..=9999).contains(&year) {
        return None;
    }
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    // A trailing day part must itself be a valid date when present.
    if let Some(day) = parts.next() {
        let day: u32 = day.parse().ok()?;
        NaiveDate::from_ymd_opt(year, month, day)?;
    }
    Some(first)
}

/// Canonical `YYYY-MM` for parseable months, the trimmed input otherwise.
pub fn canonical_month(s: &str) -> String {
    match parse_month_safe(s) {
        Some(d) => format!("{:04}-{:02}", d.year(), d.month()),
        None => s.trim().to_string(),
    }
}

/// Chronological ordering key: unparseable labels sort before every real
/// month, and among themselves lexically.
pub fn month_sort_key(s: &str) -> (Option<NaiveDate>, &str) {
    (parse_month_safe(s), s)
}

/// Closure percentage, `0` when nothing was requested, clamped to `[0, 100]`.
pub fn closure_rate(requests: u64, closed: u64) -> f64 {
    if requests == 0 {
        return 0.0;
    }
    let rate = closed as f64 / requests as f64 * 100.0;
    if rate.is_finite() {
        rate.clamp(0.0, 100.0)
    } else {
        0.0
    }
}

pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

pub fn format_number(n: f64, decimals: usize) -> String {
    // Fixed decimals plus thousands separators (e.g. `1,234,567.89`).
    let neg = n.is_sign_negative() && n != 0.0;
    let s = format!("{:.*}", decimals, n.abs());
    let mut parts = s.split('.');
    let int_part = parts.next().unwrap_or("0");
    let frac_part = parts.next();
    let int_val: i64 = int_part.parse().unwrap_or(0);
    let mut res = int_val.to_formatted_string(&Locale::en);
    if let Some(frac) = frac_part {
        res.push('.');
        res.push_str(frac);
    }
    if neg {
        format!("-{}", res)
    } else {
        res
    }
}

pub fn format_int<T>(n: T) -> String
where
    T: ToFormattedString,
{
    n.to_formatted_string(&Locale::en)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn counts_coerce_leniently() {
        assert_eq!(parse_count_safe(Some(&json!(7))), 7);
        assert_eq!(parse_count_safe(Some(&json!(" 1,204 "))), 1204);
        assert_eq!(parse_count_safe(Some(&json!("3.9"))), 3);
        assert_eq!(parse_count_safe(Some(&json!(-4))), 0);
        assert_eq!(parse_count_safe(Some(&json!("n/a"))), 0);
        assert_eq!(parse_count_safe(Some(&json!(null))), 0);
        assert_eq!(parse_count_safe(None), 0);
    }

    #[test]
    fn months_parse_across_separators() {
        assert_eq!(canonical_month("2024-01"), "2024-01");
        assert_eq!(canonical_month(" 2024/3/15 "), "2024-03");
        assert_eq!(canonical_month("2024.11"), "2024-11");
        assert_eq!(canonical_month("2024-02-10 09:30:00"), "2024-02");
        assert_eq!(canonical_month("last month"), "last month");
        assert_eq!(parse_month_safe("2024-13"), None);
        assert_eq!(parse_month_safe("2024-02-30"), None);
    }

    #[test]
    fn unparseable_months_sort_first() {
        assert!(month_sort_key("junk") < month_sort_key("1999-01"));
        assert!(month_sort_key("2023-12") < month_sort_key("2024-01"));
        assert!(month_sort_key("2024/2") < month_sort_key("2024-10"));
    }

    #[test]
    fn date_shape_only_checks_prefix() {
        assert!(is_date_shaped("2024-01"));
        assert!(is_date_shaped("2024-01-05 Finance"));
        assert!(!is_date_shaped("Finance 2024-01"));
        assert!(!is_date_shaped("202-01"));
    }

    #[test]
    fn closure_rate_is_bounded() {
        assert_eq!(closure_rate(0, 5), 0.0);
        assert_eq!(closure_rate(4, 9), 100.0);
        assert_eq!(round2(closure_rate(15, 5)), 33.33);
    }

    #[test]
    fn formats_with_separators() {
        assert_eq!(format_number(1234567.891, 2), "1,234,567.89");
        assert_eq!(format_number(-12.5, 1), "-12.5");
        assert_eq!(format_int(9855u64), "9,855");
    }
}
