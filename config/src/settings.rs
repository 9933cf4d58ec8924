//! Typed, clamped accessors for process environment variables.
//!
//! Mirrors the defensive env-reading helpers the bus relies on everywhere a
//! numeric setting is clamped to a valid range: timeouts, pool sizes,
//! monitor intervals, log limits. Invalid or missing values fall back to the
//! given default rather than failing configuration load outright.

/// Reads an integer env var, clamped to `[min, max]`. Missing or unparsable
/// values fall back to `default` (itself assumed to already be in range).
pub fn as_int_env(key: &str, default: i64, min: i64, max: i64) -> i64 {
    let raw = std::env::var(key).ok();
    let value = raw
        .as_deref()
        .and_then(|v| v.trim().parse::<i64>().ok())
        .unwrap_or(default);
    value.clamp(min, max)
}

/// Reads a float env var, clamped to `[min, max]`. Missing or unparsable
/// values fall back to `default`.
pub fn as_float_env(key: &str, default: f64, min: f64, max: f64) -> f64 {
    let raw = std::env::var(key).ok();
    let value = raw
        .as_deref()
        .and_then(|v| v.trim().parse::<f64>().ok())
        .unwrap_or(default);
    value.clamp(min, max)
}

/// Reads a boolean env var: `1`, `true`, `yes` (case-insensitive) are truthy;
/// anything else, or missing, is `default`.
pub fn as_bool_env(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(v) => matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"),
        Err(_) => default,
    }
}

/// Clamps a limit parameter the way every paginated store query does:
/// non-positive or missing values fall back to `default`; values above
/// `max_value` are capped.
pub fn normalize_limit(limit: Option<i64>, default: i64, max_value: i64) -> i64 {
    let value = match limit {
        Some(v) if v > 0 => v,
        _ => default,
    };
    value.min(max_value).max(1)
}

/// Escapes `%`, `_`, and `\` in a string destined for a SQL `LIKE` pattern,
/// pairing with `ESCAPE '\\'` at the call site. Leaves wildcard placement to
/// the caller — use [`escape_like`] for the common substring-search case.
pub fn escape_like_chars(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '\\' | '%' | '_' => {
                escaped.push('\\');
                escaped.push(ch);
            }
            other => escaped.push(other),
        }
    }
    escaped
}

/// Escapes and wraps with wildcards for substring ("contains") search.
pub fn escape_like(value: &str) -> String {
    format!("%{}%", escape_like_chars(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_limit_clamps_non_positive_to_default() {
        assert_eq!(normalize_limit(Some(0), 100, 1000), 100);
        assert_eq!(normalize_limit(Some(-1), 100, 1000), 100);
        assert_eq!(normalize_limit(None, 100, 1000), 100);
    }

    #[test]
    fn normalize_limit_clamps_huge_value_to_max() {
        assert_eq!(normalize_limit(Some(1_000_000_000), 100, 1000), 1000);
    }

    #[test]
    fn normalize_limit_passes_through_in_range_value() {
        assert_eq!(normalize_limit(Some(42), 100, 1000), 42);
    }

    #[test]
    fn escape_like_escapes_wildcards() {
        assert_eq!(escape_like("50%_off"), "%50\\%\\_off%");
        assert_eq!(escape_like(r"a\b"), r"%a\\b%");
    }

    #[test]
    fn as_int_env_clamps_and_defaults() {
        std::env::remove_var("CONFIG_SETTINGS_TEST_INT");
        assert_eq!(as_int_env("CONFIG_SETTINGS_TEST_INT", 5, 1, 10), 5);
        std::env::set_var("CONFIG_SETTINGS_TEST_INT", "999");
        assert_eq!(as_int_env("CONFIG_SETTINGS_TEST_INT", 5, 1, 10), 10);
        std::env::set_var("CONFIG_SETTINGS_TEST_INT", "not-a-number");
        assert_eq!(as_int_env("CONFIG_SETTINGS_TEST_INT", 5, 1, 10), 5);
        std::env::remove_var("CONFIG_SETTINGS_TEST_INT");
    }

    #[test]
    fn as_bool_env_recognizes_truthy_values() {
        std::env::set_var("CONFIG_SETTINGS_TEST_BOOL", "yes");
        assert!(as_bool_env("CONFIG_SETTINGS_TEST_BOOL", false));
        std::env::set_var("CONFIG_SETTINGS_TEST_BOOL", "0");
        assert!(!as_bool_env("CONFIG_SETTINGS_TEST_BOOL", true));
        std::env::remove_var("CONFIG_SETTINGS_TEST_BOOL");
    }
}
