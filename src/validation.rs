//! Input validation for rentdb
//!
//! Dates arrive as strings from the outer layers and must be strict
//! `YYYY-MM-DD` calendar dates. Usernames are cleaned before they are
//! compared or stored.

use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use std::sync::OnceLock;
use thiserror::Error;

/// Validation errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid date '{0}': expected YYYY-MM-DD")]
    InvalidDate(String),

    #[error("Check-in {check_in} is after check-out {check_out}")]
    InvertedRange {
        check_in: NaiveDate,
        check_out: NaiveDate,
    },

    #[error("Missing required field '{0}'")]
    MissingField(&'static str),

    #[error("Field '{field}' is invalid: {reason}")]
    InvalidField {
        field: &'static str,
        reason: &'static str,
    },
}

fn date_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("static date pattern"))
}

/// Parse a strict `YYYY-MM-DD` date
///
/// Rejects anything chrono would accept loosely (single-digit months,
/// trailing time components) as well as impossible dates like 2024-02-30.
pub fn parse_date(input: &str) -> Result<NaiveDate, ValidationError> {
    let trimmed = input.trim();
    if !date_pattern().is_match(trimmed) {
        return Err(ValidationError::InvalidDate(input.to_string()));
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .map_err(|_| ValidationError::InvalidDate(input.to_string()))
}

fn datetime_prefix() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(\d{4}-\d{2}-\d{2})[T ]\d{2}:\d{2}").expect("static datetime pattern")
    })
}

/// Parse a date read back from a collection file
///
/// Older files hold full ISO timestamps (`2024-06-10T00:00:00.000Z`).
/// RFC 3339 values are taken as the UTC calendar day; other timestamps
/// keep their leading date. New input still goes through [`parse_date`].
pub fn parse_stored_date(input: &str) -> Result<NaiveDate, ValidationError> {
    if let Ok(date) = parse_date(input) {
        return Ok(date);
    }
    let trimmed = input.trim();
    if let Ok(instant) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(instant.with_timezone(&Utc).date_naive());
    }
    match datetime_prefix().captures(trimmed).and_then(|c| c.get(1)) {
        Some(date) => parse_date(date.as_str()),
        None => Err(ValidationError::InvalidDate(input.to_string())),
    }
}

/// Render a date the way it is persisted
pub fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Clean a username: strip all whitespace and lowercase
pub fn clean_username(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}
