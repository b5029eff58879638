//! Read-only statement guard.
//!
//! This is the only safeguard between generated SQL and the database: a
//! statement is accepted exactly when its first non-whitespace characters
//! are `SELECT`, compared case-insensitively. Nothing else is inspected.

use super::error::{IntrospectionError, IntrospectionResult};

const SELECT_KEYWORD: &str = "SELECT";

/// Longest statement prefix echoed back in a violation message.
const PREVIEW_CHARS: usize = 60;

/// Whether `sql` lexically starts with `SELECT`.
pub fn is_select(sql: &str) -> bool {
    sql.trim_start()
        .get(..SELECT_KEYWORD.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(SELECT_KEYWORD))
}

/// Reject anything that is not a `SELECT` statement.
pub fn ensure_select(sql: &str) -> IntrospectionResult<()> {
    if is_select(sql) {
        Ok(())
    } else {
        Err(IntrospectionError::SecurityViolation(preview(sql)))
    }
}

fn preview(sql: &str) -> String {
    let trimmed = sql.trim();
    if trimmed.chars().count() <= PREVIEW_CHARS {
        trimmed.to_string()
    } else {
        let head: String = trimmed.chars().take(PREVIEW_CHARS).collect();
        format!("{}...", head)
    }
}
