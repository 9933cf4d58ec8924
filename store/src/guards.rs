//! SQL guards exposed to agents (spec §4.A): `db_query` (read-only) and
//! `db_execute` (gated DML). A direct port of the validation logic in
//! `original_source/agent_ops_store.py` — literal-stripped keyword checks
//! so a write keyword hidden inside a quoted string literal still matches.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::StoreError;

pub const MAX_SQL_LENGTH: usize = 4096;

pub const DB_EXECUTE_ALLOWED_TABLES: &[&str] = &[
    "agent_interactions",
    "prompt_templates",
    "command_cards",
    "command_card_runs",
];

static SQL_WRITE_KEYWORD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(insert|update|delete|merge|create|alter|drop|truncate|grant|revoke|comment|copy|vacuum|analyze|refresh|reindex|cluster|call|do)\b").unwrap()
});
static SQL_DANGEROUS_EXEC_KEYWORD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(create|alter|drop|truncate|grant|revoke|comment|copy|vacuum|analyze|refresh|reindex|cluster|call|do)\b").unwrap()
});
static SQL_DML_KEYWORD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(insert|update|delete|merge)\b").unwrap());
static SQL_TOKEN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)('(?:''|[^'])*')|("(?:""|[^"])*")|(--[^\n]*)|(/\*.*?\*/)"#).unwrap()
});
static FIRST_KEYWORD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*([a-zA-Z_]+)").unwrap());
static DML_TARGET_TABLE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:insert\s+into|update|delete\s+from|merge\s+into)\s+([A-Za-z_][A-Za-z0-9_$]*(?:\.[A-Za-z_][A-Za-z0-9_$]*)?)\b").unwrap()
});

const ALLOWED_EXEC_KEYWORDS: &[&str] = &["insert", "update", "delete", "merge", "with"];

fn strip_sql_literals(query: &str) -> String {
    SQL_TOKEN_RE.replace_all(query, " ").into_owned()
}

fn first_sql_keyword(query: &str) -> String {
    FIRST_KEYWORD_RE
        .captures(query)
        .map(|c| c[1].to_lowercase())
        .unwrap_or_default()
}

fn validate_single_statement(query: &str) -> Result<String, StoreError> {
    let text = query.trim();
    if text.is_empty() {
        return Err(StoreError::Validation("sql must not be empty".to_string()));
    }
    if text.len() > MAX_SQL_LENGTH {
        return Err(StoreError::Validation(format!(
            "sql exceeds max length ({MAX_SQL_LENGTH} chars)"
        )));
    }
    let body = text.trim_end_matches(';').trim();
    if body.is_empty() {
        return Err(StoreError::Validation("sql must not be empty".to_string()));
    }
    if strip_sql_literals(body).contains(';') {
        return Err(StoreError::Validation(
            "only a single SQL statement is allowed".to_string(),
        ));
    }
    Ok(body.to_string())
}

/// Validates `sql` for `db_query`: must be `SELECT`/`WITH`, no write
/// keyword even inside string-stripped text.
pub fn validate_read_only_query(query: &str) -> Result<String, StoreError> {
    let body = validate_single_statement(query)?;
    let sanitized = strip_sql_literals(&body);
    let first = first_sql_keyword(&sanitized);
    if first != "select" && first != "with" {
        return Err(StoreError::GuardedDenied(
            "db_query only allows SELECT/CTE queries".to_string(),
        ));
    }
    if SQL_WRITE_KEYWORD_RE.is_match(&sanitized) {
        return Err(StoreError::GuardedDenied(
            "db_query detected a write keyword; rejected".to_string(),
        ));
    }
    Ok(body)
}

/// Validates `sql` for `db_execute`: must be INSERT/UPDATE/DELETE/MERGE (or
/// a WITH containing one of those), target tables limited to the fixed
/// whitelist, no DDL/management statements.
pub fn validate_execute_query(query: &str) -> Result<String, StoreError> {
    let body = validate_single_statement(query)?;
    let sanitized = strip_sql_literals(&body);
    let first = first_sql_keyword(&sanitized);
    if first.is_empty() {
        return Err(StoreError::Validation("invalid SQL syntax".to_string()));
    }
    if first == "select" || first == "show" || first == "explain" {
        return Err(StoreError::GuardedDenied(
            "db_execute does not allow read-only SQL; use db_query".to_string(),
        ));
    }
    if !ALLOWED_EXEC_KEYWORDS.contains(&first.as_str()) {
        return Err(StoreError::GuardedDenied(format!(
            "db_execute does not support this SQL type: {first}"
        )));
    }
    if SQL_DANGEROUS_EXEC_KEYWORD_RE.is_match(&sanitized) {
        return Err(StoreError::GuardedDenied(
            "db_execute forbids DDL/management statements".to_string(),
        ));
    }
    if first == "with" && !SQL_DML_KEYWORD_RE.is_match(&sanitized) {
        return Err(StoreError::GuardedDenied(
            "db_execute's WITH clause must contain INSERT/UPDATE/DELETE/MERGE".to_string(),
        ));
    }

    let mut dml_tables: Vec<String> = DML_TARGET_TABLE_RE
        .captures_iter(&sanitized)
        .filter_map(|c| c.get(1))
        .map(|m| {
            m.as_str()
                .to_lowercase()
                .rsplit('.')
                .next()
                .unwrap_or_default()
                .to_string()
        })
        .collect();
    dml_tables.sort();
    dml_tables.dedup();

    if dml_tables.is_empty() {
        return Err(StoreError::GuardedDenied(
            "db_execute did not detect a DML target table".to_string(),
        ));
    }

    let mut blocked: Vec<&String> = dml_tables
        .iter()
        .filter(|t| !DB_EXECUTE_ALLOWED_TABLES.contains(&t.as_str()))
        .collect();
    blocked.sort();
    if !blocked.is_empty() {
        let names: Vec<&str> = blocked.iter().map(|s| s.as_str()).collect();
        return Err(StoreError::GuardedDenied(format!(
            "db_execute forbids non-whitelisted tables: {}",
            names.join(", ")
        )));
    }

    Ok(body)
}

/// Reads `AGENT_DB_EXECUTE_ENABLED` (default disabled).
pub fn is_db_execute_enabled() -> bool {
    matches!(
        std::env::var("AGENT_DB_EXECUTE_ENABLED")
            .unwrap_or_default()
            .trim()
            .to_lowercase()
            .as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn db_query_rejects_write_keyword_even_when_stripped() {
        let err = validate_read_only_query("SELECT 1; DROP TABLE foo").unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
    }

    #[test]
    fn db_query_rejects_write_keyword_inside_cte() {
        let err = validate_read_only_query("WITH x AS (DELETE FROM foo RETURNING 1) SELECT * FROM x")
            .unwrap_err();
        assert!(matches!(err, StoreError::GuardedDenied(_)));
    }

    #[test]
    fn db_query_allows_plain_select() {
        assert!(validate_read_only_query("SELECT 1").is_ok());
    }

    #[test]
    fn db_query_write_keyword_inside_string_literal_is_ignored_by_stripper_but_still_single_statement()
    {
        // 'update' appears only inside a quoted literal: it is stripped before the
        // write-keyword scan, so this is a false negative by design of the guard —
        // the guard only defends against unquoted keywords and statement-splicing.
        assert!(validate_read_only_query("SELECT 'please update me'").is_ok());
    }

    #[test]
    fn db_execute_rejects_ddl() {
        let err = validate_execute_query("DROP TABLE command_cards").unwrap_err();
        assert!(matches!(err, StoreError::GuardedDenied(_)));
    }

    #[test]
    fn db_execute_rejects_non_whitelisted_table() {
        let err =
            validate_execute_query("INSERT INTO secrets (k) VALUES ('x')").unwrap_err();
        assert!(matches!(err, StoreError::GuardedDenied(_)));
    }

    #[test]
    fn db_execute_accepts_whitelisted_insert() {
        assert!(validate_execute_query(
            "INSERT INTO command_cards (card_key, title, command_template) VALUES ('a','b','c')"
        )
        .is_ok());
    }

    #[test]
    fn db_execute_with_clause_without_dml_is_rejected() {
        let err = validate_execute_query(
            "WITH x AS (SELECT 1) SELECT * FROM x",
        )
        .unwrap_err();
        // first keyword is "with" but neither the CTE nor the body contains
        // insert/update/delete/merge, so it's rejected before table extraction.
        assert!(matches!(err, StoreError::GuardedDenied(_)));
    }

    #[test]
    fn db_execute_with_clause_containing_dml_is_accepted() {
        assert!(validate_execute_query(
            "WITH src AS (SELECT 'a' AS card_key) INSERT INTO command_cards (card_key) SELECT card_key FROM src"
        )
        .is_ok());
    }

    #[test]
    fn db_execute_flag_defaults_off() {
        std::env::remove_var("AGENT_DB_EXECUTE_ENABLED");
        assert!(!is_db_execute_enabled());
        std::env::set_var("AGENT_DB_EXECUTE_ENABLED", "1");
        assert!(is_db_execute_enabled());
        std::env::remove_var("AGENT_DB_EXECUTE_ENABLED");
    }
}
