//! Turns a raw query string into [`SearchParams`]: free-text terms plus
//! `-p/--project`, `-l/--last`, `-s/--since`, `-u/--until`, `--sort` flags.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use regex_lite::Regex;

use crate::types::{SearchFilters, SearchParams, SortMode};

/// Shell-style tokenizer: quoted phrases (`"fix the bug"`) become a single
/// token with quotes stripped. If the quoting in `raw` is unbalanced, we
/// give up on quote-awareness entirely and fall back to a plain whitespace
/// split, rather than guessing where a phrase was meant to end.
fn tokenize(raw: &str) -> Vec<String> {
    if raw.matches('"').count() % 2 != 0 {
        return raw.split_whitespace().map(str::to_string).collect();
    }

    let mut tokens = Vec::new();
    let mut chars = raw.chars().peekable();
    let mut current = String::new();
    let mut in_quotes = false;

    while let Some(ch) = chars.next() {
        match ch {
            '"' => in_quotes = !in_quotes,
            ' ' | '\t' if !in_quotes => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            _ => current.push(ch),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

/// `<n>d`, `<n>w`, or `<n>m` (month treated as a flat 30 days).
pub fn parse_time_range(value: &str) -> Option<chrono::Duration> {
    let re = Regex::new(r"^(\d+)([dwm])$").unwrap();
    let caps = re.captures(value)?;
    let n: i64 = caps.get(1)?.as_str().parse().ok()?;
    let days = match caps.get(2)?.as_str() {
        "d" => n,
        "w" => n * 7,
        "m" => n * 30,
        _ => return None,
    };
    Some(chrono::Duration::days(days))
}

/// Parse `--since`/`--until`'s value: an ISO date (`2024-01-01`) or an ISO
/// datetime, with or without an explicit timezone. A bare date is
/// interpreted as that day's midnight UTC; a datetime with no timezone is
/// assumed UTC as well, per spec.
pub fn parse_iso_date(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S") {
        return Some(Utc.from_utc_datetime(&naive));
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Some(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?));
    }
    None
}

/// Parse a raw query string (as typed into the HTTP API or a chat command)
/// into terms and filters. Limit/offset are supplied separately by the
/// caller, not part of the query string grammar.
pub fn parse(query: &str) -> SearchParams {
    let tokens = tokenize(query);
    let mut terms = Vec::new();
    let mut filters = SearchFilters::default();

    let mut iter = tokens.into_iter().peekable();
    while let Some(token) = iter.next() {
        match token.as_str() {
            "-p" | "--project" => {
                if let Some(value) = iter.next() {
                    filters.project = Some(value);
                }
            }
            "-l" | "--last" => {
                if let Some(value) = iter.next() {
                    filters.last = Some(value);
                }
            }
            "-s" | "--since" => {
                if let Some(value) = iter.next() {
                    filters.since = parse_iso_date(&value);
                }
            }
            "-u" | "--until" => {
                if let Some(value) = iter.next() {
                    filters.until = parse_iso_date(&value);
                }
            }
            "--sort" => {
                if let Some(value) = iter.next() {
                    filters.sort = value.parse().ok();
                }
            }
            other if other.starts_with('-') && other.len() > 1 => {
                // Unrecognised flag: consume just this one token, not an
                // argument after it — we don't know its arity, and treating
                // the next token as a term is safer than swallowing it.
            }
            other => terms.push(other.to_string()),
        }
    }

    SearchParams {
        terms,
        filters,
        limit: 0,
        offset: 0,
    }
}
