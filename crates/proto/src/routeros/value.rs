//! Attribute value conversions.
//!
//! RouterOS replies carry everything as strings; domain layers map reply
//! attributes into typed records with explicit per-field conversion
//! functions from this module (no runtime reflection). The parsers are
//! lenient in the way device output demands: garbage yields the zero value
//! rather than an error, since a malformed optional attribute must not sink
//! an otherwise usable row.

use chrono::{NaiveDate, NaiveDateTime};
use std::time::Duration;

/// Returns whether `s` looks like a device object id: `*` followed by one
/// to eight hex digits.
pub fn is_object_id(s: &str) -> bool {
    let Some(digits) = s.strip_prefix('*') else {
        return false;
    };
    (1..=8).contains(&digits.len()) && digits.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Parses a device boolean: `yes`/`true`/`1` (and their uppercase forms)
/// are true, everything else is false.
pub fn parse_bool(s: &str) -> bool {
    matches!(
        s.as_bytes().first(),
        Some(b'y' | b'Y' | b't' | b'T' | b'1')
    )
}

/// Parses a decimal integer, returning 0 when unparsable.
pub fn parse_int(s: &str) -> i64 {
    let s = s.strip_prefix('+').unwrap_or(s);
    s.parse().unwrap_or(0)
}

/// Parses a hexadecimal integer with or without a `0x` prefix, returning 0
/// when unparsable.
pub fn parse_hex(s: &str) -> i64 {
    let s = s.strip_prefix("0x").unwrap_or(s);
    i64::from_str_radix(s, 16).unwrap_or(0)
}

/// Parses a float, returning 0.0 when unparsable.
pub fn parse_float(s: &str) -> f64 {
    let s = s.strip_prefix('+').unwrap_or(s);
    s.parse().unwrap_or(0.0)
}

fn unit_duration(unit: &str) -> Option<Duration> {
    Some(match unit {
        "w" => Duration::from_secs(7 * 86400),
        "d" => Duration::from_secs(86400),
        "h" => Duration::from_secs(3600),
        "m" => Duration::from_secs(60),
        "s" => Duration::from_secs(1),
        "ms" => Duration::from_millis(1),
        "us" => Duration::from_micros(1),
        "ns" => Duration::from_nanos(1),
        _ => return None,
    })
}

/// Parses a RouterOS duration such as `22d14h36m0s` or `250ms`.
///
/// A leading `+` or `-` sign is accepted; durations are magnitudes, so the
/// sign is discarded. The single `"<float> <unit>"` form used by some time
/// offsets (`"2.5 h"`) is also understood. Unparsable segments are skipped.
pub fn parse_duration(s: &str) -> Duration {
    let s = s.strip_prefix(['+', '-']).unwrap_or(s);

    // "<float> <unit>" offset form.
    if let Some((number, unit)) = s.split_once(' ') {
        if let (Ok(n), Some(per)) = (number.parse::<f64>(), unit_duration(unit.trim())) {
            return Duration::from_nanos((n * per.as_nanos() as f64) as u64);
        }
    }

    // Concatenated "<int><unit>" segments.
    let mut total = Duration::ZERO;
    let bytes = s.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        let digits_start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        let unit_start = i;
        while i < bytes.len() && bytes[i].is_ascii_alphabetic() {
            i += 1;
        }
        if digits_start == unit_start {
            // No digits here; the alpha run (or one stray byte) is skipped.
            if unit_start == i {
                i += 1;
            }
            continue;
        }
        if unit_start == i {
            // Digits without a unit; skip the byte that broke the pattern.
            i += 1;
            continue;
        }
        let Ok(n) = s[digits_start..unit_start].parse::<u64>() else {
            continue;
        };
        if let Some(per) = unit_duration(&s[unit_start..i]) {
            total += per * u32::try_from(n).unwrap_or(u32::MAX);
        }
    }
    total
}

/// Formats a duration in RouterOS syntax (`1w2d3h4m5s`), omitting zero
/// units. Sub-second precision is dropped; a zero duration formats as
/// `0s`.
pub fn format_duration(d: Duration) -> String {
    let mut secs = d.as_secs();
    let mut out = String::new();
    for (per, unit) in [
        (7 * 86400, "w"),
        (86400, "d"),
        (3600, "h"),
        (60, "m"),
        (1, "s"),
    ] {
        let n = secs / per;
        if n > 0 {
            out.push_str(&format!("{}{}", n, unit));
            secs -= n * per;
        }
    }
    if out.is_empty() {
        out.push_str("0s");
    }
    out
}

const MONTHS: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];

/// Parses a device timestamp of the form `mon/dd/yyyy hh:mm:ss`
/// (for example `oct/18/2006 16:24:41`). Field widths are fixed; a
/// timestamp with missing leading zeros does not parse.
pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let (date, time) = s.split_once(' ')?;

    let mut date_parts = date.split('/');
    let mon = date_parts.next()?;
    let day = date_parts.next()?;
    let year = date_parts.next()?;
    if date_parts.next().is_some() || day.len() != 2 || year.len() != 4 {
        return None;
    }
    let month = MONTHS
        .iter()
        .position(|m| m.eq_ignore_ascii_case(mon))
        .map(|i| i as u32 + 1)?;

    let mut time_parts = time.split(':');
    let hour = time_parts.next()?;
    let minute = time_parts.next()?;
    let second = time_parts.next()?;
    if time_parts.next().is_some() || hour.len() != 2 || minute.len() != 2 || second.len() != 2 {
        return None;
    }

    NaiveDate::from_ymd_opt(year.parse().ok()?, month, day.parse().ok()?)?.and_hms_opt(
        hour.parse().ok()?,
        minute.parse().ok()?,
        second.parse().ok()?,
    )
}

/// Splits an `a/b` pair value (rates, limits) into its two halves, parsing
/// each with `parse`. Values without a `/` yield two zero-value halves.
pub fn split_pair<T, F: Fn(&str) -> T>(s: &str, parse: F) -> [T; 2] {
    match s.split_once('/') {
        Some((a, b)) => {
            // A third segment, if any, is discarded like the device does.
            let b = b.split('/').next().unwrap_or(b);
            [parse(a), parse(b)]
        }
        None => [parse(""), parse("")],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_object_id() {
        assert!(!is_object_id(""));
        assert!(!is_object_id("7"));
        assert!(!is_object_id("* 34"));
        assert!(!is_object_id("*AG"));
        assert!(!is_object_id("*123456789"));
        assert!(is_object_id("*Ff783"));
        assert!(is_object_id("*1"));
        assert!(is_object_id("*004d7"));
    }

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool("true"));
        assert!(parse_bool("yes"));
        assert!(parse_bool("1"));
        assert!(!parse_bool("false"));
        assert!(!parse_bool("no"));
        assert!(!parse_bool(""));
    }

    #[test]
    fn test_parse_int() {
        assert_eq!(parse_int("0"), 0);
        assert_eq!(parse_int("-46"), -46);
        assert_eq!(parse_int("983467"), 983467);
        assert_eq!(parse_int("+4773"), 4773);
        assert_eq!(parse_int(""), 0);
        assert_eq!(parse_int("abc"), 0);
    }

    #[test]
    fn test_parse_hex() {
        assert_eq!(parse_hex("0x1f"), 31);
        assert_eq!(parse_hex("1f"), 31);
        assert_eq!(parse_hex("zz"), 0);
    }

    #[test]
    fn test_parse_float() {
        assert_eq!(parse_float("-46.478"), -46.478);
        assert_eq!(parse_float("+4773"), 4773.0);
        assert_eq!(parse_float("abc"), 0.0);
    }

    #[test]
    fn test_parse_duration_segments() {
        assert_eq!(
            parse_duration("22d14h36m0s"),
            Duration::from_secs(22 * 86400 + 14 * 3600 + 36 * 60)
        );
        assert_eq!(parse_duration("1w"), Duration::from_secs(7 * 86400));
        assert_eq!(parse_duration("250ms"), Duration::from_millis(250));
        assert_eq!(parse_duration("-5s"), Duration::from_secs(5));
        assert_eq!(parse_duration(""), Duration::ZERO);
        assert_eq!(parse_duration("garbage"), Duration::ZERO);
    }

    #[test]
    fn test_parse_duration_offset_form() {
        assert_eq!(parse_duration("2.5 h"), Duration::from_secs(9000));
        assert_eq!(parse_duration("10 ms"), Duration::from_millis(10));
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(
            format_duration(Duration::from_secs(22 * 86400 + 14 * 3600 + 36 * 60)),
            "3w1d14h36m"
        );
        assert_eq!(format_duration(Duration::from_secs(61)), "1m1s");
        assert_eq!(format_duration(Duration::ZERO), "0s");
    }

    #[test]
    fn test_parse_timestamp() {
        let ts = parse_timestamp("oct/18/2006 16:24:41").unwrap();
        assert_eq!(ts.to_string(), "2006-10-18 16:24:41");

        let ts = parse_timestamp("dec/25/2029 09:00:01").unwrap();
        assert_eq!(ts.to_string(), "2029-12-25 09:00:01");

        // Beyond 2038 must still work.
        let ts = parse_timestamp("jan/10/2042 00:00:00").unwrap();
        assert_eq!(ts.to_string(), "2042-01-10 00:00:00");

        // Missing leading zeros do not parse.
        assert!(parse_timestamp("feb/14/2019 8:0:0").is_none());
        assert!(parse_timestamp("nonsense").is_none());
    }

    #[test]
    fn test_split_pair() {
        assert_eq!(split_pair("10/20", parse_int), [10, 20]);
        assert_eq!(split_pair("1.5/2.5", parse_float), [1.5, 2.5]);
        assert_eq!(split_pair("a/b/c", |s| s.to_string()), ["a", "b"]);
        assert_eq!(split_pair("solo", parse_int), [0, 0]);
    }
}
