//! Field checks shared by the domain validators.

use crate::core::{Fields, Value};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref EMAIL: Regex =
        Regex::new(r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9-]+\.[a-zA-Z0-9-]+$").unwrap();
    static ref ALPHANUMERIC: Regex = Regex::new(r"(?i)^[a-z0-9\s]+$").unwrap();
    static ref SPECIAL_CHARACTER: Regex = Regex::new(r"[^a-zA-Z\d\s]").unwrap();
}

/// Rendered text of a field, `None` when absent or empty.
pub fn text(fields: &Fields, field: &str) -> Option<String> {
    fields
        .get(field)
        .filter(|value| !value.is_empty())
        .map(Value::to_string)
}

pub fn present(fields: &Fields, field: &str) -> bool {
    text(fields, field).is_some()
}

pub fn alphanumeric(fields: &Fields, field: &str) -> bool {
    text(fields, field).is_some_and(|text| ALPHANUMERIC.is_match(&text))
}

/// Character count within `min..=max`.
pub fn length_between(fields: &Fields, field: &str, min: usize, max: usize) -> bool {
    text(fields, field).is_some_and(|text| (min..=max).contains(&text.chars().count()))
}

pub fn contains_digit(fields: &Fields, field: &str) -> bool {
    text(fields, field).is_some_and(|text| text.chars().any(|c| c.is_ascii_digit()))
}

pub fn contains_special(fields: &Fields, field: &str) -> bool {
    text(fields, field).is_some_and(|text| SPECIAL_CHARACTER.is_match(&text))
}

pub fn email(fields: &Fields, field: &str) -> bool {
    text(fields, field).is_some_and(|text| EMAIL.is_match(&text))
}

/// The email has to mention the username, case-insensitively.
pub fn email_contains_username(fields: &Fields) -> bool {
    match (text(fields, "email"), text(fields, "username")) {
        (Some(email), Some(username)) => email
            .to_lowercase()
            .contains(&username.to_lowercase()),
        _ => false,
    }
}
