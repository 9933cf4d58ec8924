//! Key-format validation shared across the agent-ops and agent-status
//! stores, and small clamp/escape helpers re-exported from `config`.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::BusError;

/// `*_key` fields in the agent-ops store (spec §4.E): 2–128 chars.
static KEY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.:-]{1,127}$").unwrap());

/// `agent_id` (spec §4.C): 1–128 chars, single char accepted.
static AGENT_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.:-]{0,127}$").unwrap());

pub fn validate_key(field: &str, value: &str) -> Result<(), BusError> {
    if KEY_RE.is_match(value) {
        Ok(())
    } else {
        Err(BusError::Validation(format!("invalid {field}: {value}")))
    }
}

pub fn validate_agent_id(value: &str) -> Result<(), BusError> {
    if AGENT_ID_RE.is_match(value) {
        Ok(())
    } else {
        Err(BusError::Validation(format!("invalid agent_id: {value}")))
    }
}

pub fn clamp_limit(limit: Option<i64>) -> i64 {
    config::normalize_limit(limit, 100, 1000)
}

pub fn escape_like(value: &str) -> String {
    config::escape_like(value)
}

pub fn escape_like_chars(value: &str) -> String {
    config::escape_like_chars(value)
}

/// Normalizes a POSIX-style shared path: backslashes folded to `/`, leading
/// and trailing slashes stripped (spec §4.D / §3).
pub fn normalize_path(path: &str) -> Result<String, BusError> {
    let replaced = path.trim().replace('\\', "/");
    let trimmed = replaced.trim_matches('/');
    if trimmed.is_empty() {
        return Err(BusError::Validation("path must not be empty".to_string()));
    }
    Ok(trimmed.to_string())
}

pub fn now_utc() -> chrono::DateTime<chrono::Utc> {
    chrono::Utc::now()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_regex_accepts_single_char_minimum_length_two() {
        assert!(validate_key("card_key", "ab").is_ok());
        assert!(validate_key("card_key", "a").is_err());
    }

    #[test]
    fn agent_id_accepts_single_char() {
        assert!(validate_agent_id("a").is_ok());
        assert!(validate_agent_id("").is_err());
        let too_long = "a".repeat(129);
        assert!(validate_agent_id(&too_long).is_err());
    }
}
