//! Parsers for the analyzer's display strings.
//!
//! Every parser returns the typed value or a short reason describing why the
//! input was rejected.

use std::sync::LazyLock;

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};
use regex::Regex;

use crate::media::Value;

type ParseResult = std::result::Result<Value, String>;

// Bitrate multipliers follow the analyzer's textual convention, 1 Kbps = 10e3 bps.
const BITRATE_UNITS: &[(&str, f64)] = &[
    ("bps", 1.0),
    ("Kbps", 10e3),
    ("Mbps", 10e6),
    ("Gbps", 10e9),
    ("Tbps", 10e12),
    ("b/s", 1.0),
    ("kb/s", 10e3),
    ("Mb/s", 10e6),
    ("Gb/s", 10e9),
    ("Tb/s", 10e12),
];

const SAMPLING_RATE_UNITS: &[(&str, f64)] = &[
    ("Hz", 1.0),
    ("KHz", 10e3),
    ("kHz", 10e3),
    ("MHz", 10e6),
    ("GHz", 10e9),
];

const BYTE_UNITS: &[(&str, u32)] = &[
    ("Bytes", 0),
    ("KiB", 10),
    ("MiB", 20),
    ("GiB", 30),
    ("TiB", 40),
    ("PiB", 50),
];

/// Milliseconds per duration unit.
const DURATION_UNITS: &[(&str, u64)] = &[
    ("h", 3_600_000),
    ("mn", 60_000),
    ("min", 60_000),
    ("s", 1_000),
    ("ms", 1),
];

static GROUPED_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+(\s\d{3})*(\.\d+)?$").expect("valid regex"));
static DECIMAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+(\.\d+)?$").expect("valid regex"));
static LEADING_INT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*([-+]?\d+)").expect("valid regex"));
static LEADING_FLOAT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*([-+]?\d+(?:\.\d+)?)").expect("valid regex"));
static DURATION_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)([a-z]+)$").expect("valid regex"));
static INT_UNIT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+) (\S+)$").expect("valid regex"));
static SPACED_INT_UNIT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{1,3}(?:\s\d{3})+|\d+) (\S+)$").expect("valid regex"));
static FLOAT_UNIT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+\.\d+) (\S+)$").expect("valid regex"));
static PERCENTAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\(\d+(\.\d+)?%\)$").expect("valid regex"));
static OFFSET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([+-])(\d{2}):?(\d{2})$").expect("valid regex"));

fn factor<T: Copy>(table: &[(&str, T)], unit: &str) -> Option<T> {
    table.iter().find(|(u, _)| *u == unit).map(|(_, f)| *f)
}

fn strip_spaces(s: &str) -> String {
    s.chars().filter(|c| !c.is_whitespace()).collect()
}

pub fn parse_bool(s: &str) -> ParseResult {
    match s {
        "Yes" => Ok(Value::Bool(true)),
        "No" => Ok(Value::Bool(false)),
        _ => Err("expected \"Yes\" or \"No\"".to_string()),
    }
}

pub fn parse_int(s: &str) -> ParseResult {
    LEADING_INT
        .captures(s)
        .and_then(|c| c[1].parse().ok())
        .map(Value::Int)
        .ok_or_else(|| "not an integer".to_string())
}

pub fn parse_float(s: &str) -> ParseResult {
    LEADING_FLOAT
        .captures(s)
        .and_then(|c| c[1].parse().ok())
        .map(Value::Float)
        .ok_or_else(|| "not a number".to_string())
}

/// Sums `<int><unit>` tokens, e.g. `"1h 30mn"`. A number separated from its
/// unit by a space (`"1 h 30 min"`) is accepted as well.
pub fn parse_duration(s: &str) -> ParseResult {
    let mut tokens = s.split_whitespace().peekable();
    let mut total_ms: u64 = 0;
    let mut seen = false;

    while let Some(token) = tokens.next() {
        let (value, unit) = match DURATION_TOKEN.captures(token) {
            Some(c) => (c[1].to_string(), c[2].to_string()),
            None if token.bytes().all(|b| b.is_ascii_digit()) => match tokens.next() {
                Some(unit) => (token.to_string(), unit.to_string()),
                None => return Err(format!("missing time unit after \"{}\"", token)),
            },
            None => return Err(format!("unparsable time token \"{}\"", token)),
        };

        let per_unit = factor(DURATION_UNITS, &unit)
            .ok_or_else(|| format!("unparsable time unit \"{}\"", unit))?;
        let value: u64 = value
            .parse()
            .map_err(|_| format!("unparsable time value \"{}\"", value))?;

        total_ms = value
            .checked_mul(per_unit)
            .and_then(|ms| total_ms.checked_add(ms))
            .ok_or_else(|| "duration out of range".to_string())?;
        seen = true;
    }

    if !seen {
        return Err("empty duration".to_string());
    }

    Ok(Value::Duration(total_ms as f64 / 1000.0))
}

/// `"<number> <unit>"` with binary units, e.g. `"1.5 KiB"` is 1536 bytes.
pub fn parse_bytes(s: &str) -> ParseResult {
    let mut parts: Vec<&str> = s.split(' ').collect();
    if parts.len() > 2 && parts.last().is_some_and(|p| PERCENTAGE.is_match(p)) {
        parts.pop();
    }
    if parts.len() < 2 {
        return Err("expected \"<number> <unit>\"".to_string());
    }

    let unit = parts[parts.len() - 1];
    let number = parts[..parts.len() - 1].join("");

    if !DECIMAL.is_match(&number) {
        return Err(format!("unparsable file size number \"{}\"", number));
    }
    let exponent = factor(BYTE_UNITS, unit)
        .ok_or_else(|| format!("unparsable file size unit \"{}\"", unit))?;

    let number: f64 = number
        .parse()
        .map_err(|_| format!("unparsable file size number \"{}\"", number))?;
    Ok(Value::Bytes((number * 2f64.powi(exponent as i32)).round() as u64))
}

/// The last token is the unit, everything before it the (space grouped) number.
pub fn parse_bitrate(s: &str) -> ParseResult {
    let parts: Vec<&str> = s.split(' ').collect();
    if parts.len() < 2 {
        return Err("expected \"<number> <unit>\"".to_string());
    }

    let unit = parts[parts.len() - 1];
    let number = parts[..parts.len() - 1].join(" ");

    let multiplier = factor(BITRATE_UNITS, unit)
        .ok_or_else(|| format!("unparsable bitrate unit \"{}\"", unit))?;
    if !GROUPED_NUMBER.is_match(&number) {
        return Err(format!("unparsable bitrate value \"{}\"", number));
    }

    let number: f64 = strip_spaces(&number)
        .parse()
        .map_err(|_| format!("unparsable bitrate value \"{}\"", number))?;
    Ok(Value::Bitrate(multiplier * number))
}

pub fn parse_sampling_rate(s: &str) -> ParseResult {
    let parts: Vec<&str> = s.split(' ').collect();
    if parts.len() != 2 {
        return Err("expected \"<number> <unit>\"".to_string());
    }

    let multiplier = factor(SAMPLING_RATE_UNITS, parts[1])
        .ok_or_else(|| format!("unparsable sampling rate unit \"{}\"", parts[1]))?;
    if !DECIMAL.is_match(parts[0]) {
        return Err(format!("unparsable sampling rate value \"{}\"", parts[0]));
    }

    let number: f64 = parts[0]
        .parse()
        .map_err(|_| format!("unparsable sampling rate value \"{}\"", parts[0]))?;
    Ok(Value::Hertz(multiplier * number))
}

pub fn parse_int_unit(s: &str, units: &[&str], spaced: bool) -> ParseResult {
    let regex = if spaced { &SPACED_INT_UNIT } else { &INT_UNIT };
    let captures = regex
        .captures(s)
        .ok_or_else(|| format!("expected an integer followed by {}", units.join("/")))?;

    if !units.contains(&&captures[2]) {
        return Err(format!("unexpected unit \"{}\"", &captures[2]));
    }

    strip_spaces(&captures[1])
        .parse()
        .map(Value::Int)
        .map_err(|e| e.to_string())
}

pub fn parse_float_unit(s: &str, unit: &str) -> ParseResult {
    let captures = FLOAT_UNIT
        .captures(s)
        .ok_or_else(|| format!("expected a decimal number followed by {}", unit))?;

    if &captures[2] != unit {
        return Err(format!("unexpected unit \"{}\"", &captures[2]));
    }

    captures[1]
        .parse()
        .map(Value::Float)
        .map_err(|_| "not a number".to_string())
}

/// `"UTC 2010-02-22 16:17:32"`; the zone may also trail the timestamp.
pub fn parse_date(s: &str) -> ParseResult {
    let s = s.trim();
    let (zone, stamp) = match s.split_once(' ') {
        Some((head, rest)) if zone_offset(head).is_some() => (head, rest),
        _ => match s.rsplit_once(' ') {
            Some((rest, tail)) if zone_offset(tail).is_some() => (tail, rest),
            _ => return Err("missing time zone".to_string()),
        },
    };

    let offset = zone_offset(zone).ok_or_else(|| format!("unknown time zone \"{}\"", zone))?;
    let naive = NaiveDateTime::parse_from_str(stamp, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(stamp, "%Y-%m-%d %H:%M:%S%.f"))
        .map_err(|e| format!("unparsable date \"{}\": {}", stamp, e))?;

    let date: DateTime<FixedOffset> = offset
        .from_local_datetime(&naive)
        .single()
        .ok_or_else(|| format!("ambiguous date \"{}\"", stamp))?;
    Ok(Value::Date(date.with_timezone(&Utc)))
}

fn zone_offset(zone: &str) -> Option<FixedOffset> {
    match zone {
        "UTC" | "GMT" | "Z" => FixedOffset::east_opt(0),
        _ => {
            let c = OFFSET.captures(zone)?;
            let hours: i32 = c[2].parse().ok()?;
            let minutes: i32 = c[3].parse().ok()?;
            let seconds = hours * 3600 + minutes * 60;
            FixedOffset::east_opt(if &c[1] == "-" { -seconds } else { seconds })
        }
    }
}
