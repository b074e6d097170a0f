//! Date/time/datetime parsing and formatting in the compact ISO variant
//! FRID uses: colons in the time part are optional, and a bare `0T`/`0t`
//! prefix marks a time-only value with no date component.
//!
//! Ported from `frid/chrono.py`'s `parse_datetime`/`strfr_datetime`. The
//! difference/duration arithmetic in that module (`DateTimeDiff`, quantity
//! parsing) has no counterpart here — this module only ever round-trips a
//! point in time, never computes with one.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, Timelike};

use crate::error::{FridError, Result};
use crate::value::Value;

/// The three date/time shapes a parse can resolve to.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedChrono {
    Date(NaiveDate),
    Time(NaiveTime, Option<FixedOffset>),
    DateTime(DateTime<FixedOffset>),
}

impl ParsedChrono {
    pub fn into_value(self) -> Value {
        match self {
            ParsedChrono::Date(d) => Value::Date(d),
            ParsedChrono::Time(t, off) => Value::Time(t, off),
            ParsedChrono::DateTime(dt) => Value::DateTime(dt),
        }
    }
}

/// Parses a date, time, or datetime string in FRID's compact ISO variant.
///
/// Accepts a leading `0T`/`0t` to force time-only parsing (useful when a
/// bare `HH:MM` would otherwise be ambiguous with other FRID grammar).
/// Returns `None` (not an error) when `s` simply isn't one of these shapes
/// — callers fall back to treating it as plain text.
pub fn parse_datetime(s: &str) -> Option<ParsedChrono> {
    if let Some(rest) = s.strip_prefix("0T").or_else(|| s.strip_prefix("0t")) {
        return parse_time_only(rest).map(|(t, off)| ParsedChrono::Time(t, off));
    }
    if let Some((date_part, time_part)) = split_datetime(s) {
        let date = NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()?;
        let (time, off) = parse_time_only(time_part)?;
        return match off {
            Some(off) => {
                let naive = date.and_time(time);
                Some(ParsedChrono::DateTime(DateTime::from_naive_utc_and_offset(naive - off, off)))
            }
            None => {
                let naive = date.and_time(time);
                let off = FixedOffset::east_opt(0).unwrap();
                Some(ParsedChrono::DateTime(DateTime::from_naive_utc_and_offset(naive, off)))
            }
        };
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(ParsedChrono::Date(date));
    }
    parse_time_only(s).map(|(t, off)| ParsedChrono::Time(t, off))
}

/// Splits `"date[Tt_ ]time"` at the first separator among `T`, `t`, `_`, or
/// a plain space, only when the left side looks like a date.
fn split_datetime(s: &str) -> Option<(&str, &str)> {
    let bytes = s.as_bytes();
    if bytes.len() < 11 || !bytes[0].is_ascii_digit() {
        return None;
    }
    for (i, c) in s.char_indices() {
        if i < 10 {
            continue;
        }
        if matches!(c, 'T' | 't' | '_' | ' ') {
            return Some((&s[..i], &s[i + c.len_utf8()..]));
        }
    }
    None
}

/// Parses `HH:MM[:SS[.ffffff]][zone]` with colons optional throughout.
fn parse_time_only(s: &str) -> Option<(NaiveTime, Option<FixedOffset>)> {
    let (body, zone) = split_zone(s);
    let digits_only: String = body.chars().filter(|c| *c != ':').collect();
    let (hm_s, frac) = match digits_only.split_once('.') {
        Some((a, b)) => (a, Some(b)),
        None => (digits_only.as_str(), None),
    };
    if hm_s.len() < 4 || !hm_s.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let hour: u32 = hm_s[0..2].parse().ok()?;
    let minute: u32 = hm_s[2..4].parse().ok()?;
    let second: u32 = if hm_s.len() >= 6 { hm_s[4..6].parse().ok()? } else { 0 };
    let nanos: u32 = match frac {
        Some(f) => {
            let mut digits: String = f.chars().take(9).collect();
            while digits.len() < 9 {
                digits.push('0');
            }
            digits.parse().ok()?
        }
        None => 0,
    };
    let time = NaiveTime::from_hms_nano_opt(hour, minute, second, nanos)?;
    Some((time, zone))
}

fn split_zone(s: &str) -> (&str, Option<FixedOffset>) {
    if let Some(body) = s.strip_suffix('Z').or_else(|| s.strip_suffix('z')) {
        return (body, Some(FixedOffset::east_opt(0).unwrap()));
    }
    // Scan from the right for a `+HH:MM`/`-HH:MM`/`+HHMM`/`-HHMM` tail, being
    // careful not to mistake the leading hour digits for a sign.
    if s.len() >= 5 {
        for (i, c) in s.char_indices().rev() {
            if i == 0 {
                break;
            }
            if c == '+' || c == '-' {
                let tail = &s[i + 1..];
                let digits: String = tail.chars().filter(|c| *c != ':').collect();
                if digits.len() == 4 && digits.chars().all(|d| d.is_ascii_digit()) {
                    let hh: i32 = digits[0..2].parse().unwrap_or(0);
                    let mm: i32 = digits[2..4].parse().unwrap_or(0);
                    let secs = (hh * 3600 + mm * 60) * if c == '-' { -1 } else { 1 };
                    if let Some(off) = FixedOffset::east_opt(secs) {
                        return (&s[..i], Some(off));
                    }
                }
                break;
            }
        }
    }
    (s, None)
}

/// Formats a value previously produced by [`parse_datetime`] back to FRID's
/// compact ISO text, with `precision` fractional-second digits (`0` omits
/// the fractional part entirely; negative values are rejected).
pub fn format_chrono(value: &ParsedChrono, precision: usize) -> Result<String> {
    match value {
        ParsedChrono::Date(d) => Ok(d.format("%Y-%m-%d").to_string()),
        ParsedChrono::Time(t, off) => Ok(format!("0T{}", format_time(*t, *off, precision)?)),
        ParsedChrono::DateTime(dt) => {
            let date = dt.format("%Y-%m-%d").to_string();
            let time = format_time(dt.time(), Some(*dt.offset()), precision)?;
            Ok(format!("{date}T{time}"))
        }
    }
}

fn format_time(t: NaiveTime, off: Option<FixedOffset>, precision: usize) -> Result<String> {
    if precision > 9 {
        return Err(FridError::encode("time", format!("precision {precision} exceeds 9 fractional digits")));
    }
    let mut out = format!("{:02}{:02}{:02}", t.hour(), t.minute(), t.second());
    if precision > 0 {
        let nanos = t.nanosecond();
        let digits = format!("{nanos:09}");
        out.push('.');
        out.push_str(&digits[..precision]);
    }
    match off {
        None => {}
        Some(off) if off.local_minus_utc() == 0 => out.push('Z'),
        Some(off) => {
            let secs = off.local_minus_utc();
            let sign = if secs < 0 { '-' } else { '+' };
            let secs = secs.abs();
            out.push(sign);
            out.push_str(&format!("{:02}{:02}", secs / 3600, (secs % 3600) / 60));
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_date_only() {
        assert_eq!(parse_datetime("2024-03-05"), Some(ParsedChrono::Date(NaiveDate::from_ymd_opt(2024, 3, 5).unwrap())));
    }

    #[test]
    fn parses_time_only_with_prefix() {
        match parse_datetime("0T1230") {
            Some(ParsedChrono::Time(t, None)) => {
                assert_eq!(t.hour(), 12);
                assert_eq!(t.minute(), 30);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn parses_datetime_with_zone() {
        match parse_datetime("2024-03-05T123045Z") {
            Some(ParsedChrono::DateTime(dt)) => {
                assert_eq!(dt.hour(), 12);
                assert_eq!(dt.offset().local_minus_utc(), 0);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn round_trips_datetime() {
        let parsed = parse_datetime("2024-03-05T09:15:00+05:30").unwrap();
        let text = format_chrono(&parsed, 0).unwrap();
        let reparsed = parse_datetime(&text).unwrap();
        assert_eq!(parsed, reparsed);
    }
}
