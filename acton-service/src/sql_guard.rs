//! Statement-shape guard for the restricted `/v1/db` passthrough (§6, §9).
//!
//! This is deliberately not a SQL parser: the endpoint accepts exactly one
//! scalar statement per request, never a query builder, so a table
//! allow-list plus a leading-keyword check is the right amount of
//! machinery. An internal administrative channel may still run anything;
//! that channel is out of scope for the edge gateway.

use crate::error::{Error, Result};

/// Tables the passthrough may ever touch, mirroring the persisted state
/// layout (§6).
pub const ALLOWED_TABLES: &[&str] = &[
    "users",
    "sessions",
    "api_keys",
    "signals",
    "audit_log",
    "routing_rules",
    "webhooks",
    "node_health",
    "metrics_hourly",
];

/// Leading keywords that make a statement destructive and are always
/// rejected, regardless of which table they target.
const BLOCKED_KEYWORDS: &[&str] = &["DROP", "ALTER", "CREATE", "TRUNCATE"];

fn first_word(statement: &str) -> Option<&str> {
    statement.split_whitespace().next()
}

/// Find the table name following a `FROM`/`INTO`/`UPDATE` clause. This is a
/// shape check, not a parser: it looks at the word immediately after the
/// first occurrence of one of those keywords.
fn table_after(statement_upper: &str, statement: &str, keyword: &str) -> Option<String> {
    let idx = statement_upper.find(keyword)?;
    let rest = &statement[idx + keyword.len()..];
    rest.split_whitespace()
        .next()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric() && c != '_').to_lowercase())
}

/// Check a single scalar SQL statement against the allow-list and the
/// destructive-keyword block. Returns `Ok(())` if the statement may be
/// forwarded to storage.
pub fn check(statement: &str) -> Result<()> {
    let trimmed = statement.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidRequest("empty statement".to_string()));
    }

    let upper = trimmed.to_uppercase();
    let leading = first_word(&upper).unwrap_or("");

    for keyword in BLOCKED_KEYWORDS {
        if leading == *keyword {
            return Err(Error::Forbidden(format!("{keyword} is not permitted through this endpoint")));
        }
    }

    // Bare `DELETE FROM` and `UPDATE ... SET` are blocked outright; only
    // SELECT/INSERT and qualified reads are allowed through, and even then
    // only against an allow-listed table.
    if leading == "DELETE" {
        return Err(Error::Forbidden("DELETE is not permitted through this endpoint".to_string()));
    }
    if leading == "UPDATE" && upper.contains(" SET ") {
        return Err(Error::Forbidden("UPDATE ... SET is not permitted through this endpoint".to_string()));
    }
    if leading == "INSERT" && upper.contains("INTO") {
        return Err(Error::Forbidden("INSERT INTO is not permitted through this endpoint".to_string()));
    }

    let table = match leading {
        "SELECT" => table_after(&upper, trimmed, "FROM"),
        "UPDATE" => table_after(&upper, trimmed, "UPDATE"),
        _ => None,
    };

    if let Some(table) = table {
        if !ALLOWED_TABLES.contains(&table.as_str()) {
            return Err(Error::Forbidden(format!("table '{table}' is not allow-listed")));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_select_against_allow_listed_table() {
        assert!(check("SELECT * FROM signals WHERE id = 1").is_ok());
    }

    #[test]
    fn rejects_select_against_unknown_table() {
        assert!(check("SELECT * FROM secrets").is_err());
    }

    #[test]
    fn rejects_drop_alter_create_truncate() {
        for stmt in ["DROP TABLE signals", "ALTER TABLE signals ADD x int", "CREATE TABLE x (id int)", "TRUNCATE signals"] {
            assert!(check(stmt).is_err(), "expected rejection for {stmt}");
        }
    }

    #[test]
    fn rejects_bare_delete_from() {
        assert!(check("DELETE FROM signals WHERE id = 1").is_err());
    }

    #[test]
    fn rejects_update_set() {
        assert!(check("UPDATE signals SET type = 'x' WHERE id = 1").is_err());
    }

    #[test]
    fn rejects_insert_into() {
        assert!(check("INSERT INTO signals (id) VALUES (1)").is_err());
    }

    #[test]
    fn rejects_empty_statement() {
        assert!(check("   ").is_err());
    }

    #[test]
    fn is_case_insensitive_on_keywords() {
        assert!(check("select * from signals").is_ok());
        assert!(check("drop table signals").is_err());
    }
}
