//! Positional line grammar for ingested payloads.
//!
//! Every line looks like
//! `YYYY-MM-DD HH:MM:SS,mmm - client_ip - application_id - LEVEL - method - component - message`.
//! Splitting on `-` yields `year`, `month`, `day time,ms`, then the six
//! remaining fields; the message keeps any further dashes.

use crate::domain::{LogEntry, NewLogEntry};
use crate::error::ParseError;
use chrono::NaiveDate;
use regex::Regex;
use std::sync::OnceLock;

/// Number of `-` separated components a line must have.
pub const MIN_FIELDS: usize = 9;

static DATE_PATTERN: OnceLock<Regex> = OnceLock::new();
static TIME_PATTERN: OnceLock<Regex> = OnceLock::new();

fn date_pattern() -> &'static Regex {
    DATE_PATTERN.get_or_init(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("static date pattern"))
}

fn time_pattern() -> &'static Regex {
    TIME_PATTERN.get_or_init(|| Regex::new(r"^\d{2}:\d{2}:\d{2}$").expect("static time pattern"))
}

/// Parse a raw payload into entries, all or nothing.
///
/// `origin_ip` is the address of the peer that sent the payload and is stamped
/// on every entry. Blank lines are skipped; the first bad line aborts the parse.
pub fn parse(origin_ip: &str, raw_payload: &[u8]) -> Result<Vec<LogEntry>, ParseError> {
    let text =
        std::str::from_utf8(raw_payload).map_err(|e| ParseError::InvalidUtf8(e.to_string()))?;

    let mut entries = Vec::new();
    for (index, line) in text.split('\n').enumerate() {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.trim().is_empty() {
            continue;
        }
        entries.push(parse_line(origin_ip, line, index + 1)?);
    }
    Ok(entries)
}

/// Parse one non-empty line. `line_no` is 1-based and only used for errors.
pub fn parse_line(origin_ip: &str, line: &str, line_no: usize) -> Result<LogEntry, ParseError> {
    let parts: Vec<&str> = line.splitn(MIN_FIELDS, '-').map(str::trim).collect();
    if parts.len() < MIN_FIELDS {
        return Err(ParseError::MissingField {
            line: line_no,
            expected: MIN_FIELDS,
            found: parts.len(),
        });
    }

    let (day, time) = split_day_and_time(parts[2]).ok_or_else(|| ParseError::Malformed {
        line: line_no,
        field: "day and time",
        value: parts[2].to_string(),
    })?;

    let date = format!("{}-{}-{}", parts[0], parts[1], day);
    if !date_pattern().is_match(&date) || NaiveDate::parse_from_str(&date, "%Y-%m-%d").is_err() {
        return Err(ParseError::Malformed {
            line: line_no,
            field: "date",
            value: date,
        });
    }
    if !time_pattern().is_match(time) {
        return Err(ParseError::Malformed {
            line: line_no,
            field: "time",
            value: time.to_string(),
        });
    }

    LogEntry::try_from(NewLogEntry {
        origin_ip: origin_ip.to_string(),
        client_ip: parts[3].to_string(),
        application_id: parts[4].to_string(),
        level: parts[5].to_string(),
        method: parts[6].to_string(),
        component: parts[7].to_string(),
        message: parts[8].to_string(),
        date,
        time: time.to_string(),
    })
    .map_err(|source| ParseError::Invalid {
        line: line_no,
        source,
    })
}

/// `"15 01:56:59,303"` -> `("15", "01:56:59")`; fractional seconds are dropped.
fn split_day_and_time(component: &str) -> Option<(&str, &str)> {
    let mut pieces = component.split_whitespace();
    let day = pieces.next()?;
    let time = pieces.next()?;
    if pieces.next().is_some() {
        return None;
    }
    let time = time.split(',').next().unwrap_or(time).trim();
    Some((day, time))
}
