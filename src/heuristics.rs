//! Name-based heuristics.
//!
//! Every fuzzy decision about table and column names lives here as a pure
//! predicate so it can be tested without a database: key candidacy,
//! user/usage detection, join column inference.

use inflector::Inflector;

/// Terms that carry business weight in relevance scoring.
pub const HIGH_VALUE_TERMS: &[&str] = &[
    "user",
    "usage",
    "activity",
    "transaction",
    "customer",
    "employee",
    "role",
    "permission",
];

/// Column-name fragments that indicate usage or activity data.
pub const USAGE_TERMS: &[&str] = &[
    "usage", "activity", "login", "session", "access", "visit", "event", "hits", "duration",
    "lastused", "last_used",
];

/// Column-name fragments that indicate a person or account.
pub const USER_TERMS: &[&str] = &[
    "user", "employee", "customer", "member", "account", "person", "email",
];

/// Data type fragments treated as numeric.
const NUMERIC_TYPES: &[&str] = &[
    "int", "decimal", "numeric", "float", "real", "double", "money", "number",
];

/// Columns that label a row for display.
const DISPLAY_TERMS: &[&str] = &["name", "email", "title", "login", "description"];

/// How a name relates to a search term.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TermMatch {
    Exact,
    Partial,
    None,
}

/// Compare a name to a search term, case-insensitively.
pub fn match_term(name: &str, term: &str) -> TermMatch {
    let name = name.trim().to_lowercase();
    let term = term.trim().to_lowercase();
    if name.is_empty() || term.is_empty() {
        TermMatch::None
    } else if name == term {
        TermMatch::Exact
    } else if name.contains(&term) {
        TermMatch::Partial
    } else {
        TermMatch::None
    }
}

pub fn is_high_value_term(term: &str) -> bool {
    let term = term.trim().to_lowercase();
    HIGH_VALUE_TERMS.contains(&term.as_str())
        || HIGH_VALUE_TERMS.contains(&term.to_singular().as_str())
}

/// Whether a search term is about usage or activity.
pub fn is_usage_term(term: &str) -> bool {
    let term = term.trim().to_lowercase();
    !term.is_empty() && USAGE_TERMS.iter().any(|u| term.contains(u))
}

/// Whether a search term is about users.
pub fn is_user_term(term: &str) -> bool {
    let term = term.trim().to_lowercase();
    !term.is_empty() && USER_TERMS.iter().any(|u| term.contains(u))
}

/// A column literally named `Id`.
pub fn is_primary_key_candidate(column: &str) -> bool {
    column.trim().eq_ignore_ascii_case("id")
}

/// A column following the `<Entity>Id` / `<entity>_id` convention.
pub fn is_foreign_key_candidate(column: &str) -> bool {
    let column = column.trim();
    if is_primary_key_candidate(column) || column.len() <= 2 {
        return false;
    }
    column.ends_with("Id") || column.ends_with("ID") || column.to_lowercase().ends_with("_id")
}

pub fn is_usage_column(column: &str) -> bool {
    is_usage_term(column)
}

pub fn is_user_column(column: &str) -> bool {
    is_user_term(column)
}

/// Columns matching `*user*id*`.
pub fn is_unique_user_column(column: &str) -> bool {
    let lower = column.to_lowercase();
    lower
        .find("user")
        .is_some_and(|idx| lower[idx + "user".len()..].contains("id"))
}

/// Columns matching `*department*`.
pub fn is_department_column(column: &str) -> bool {
    column.to_lowercase().contains("department")
}

pub fn is_numeric_type(data_type: &str) -> bool {
    let lower = data_type.to_lowercase();
    NUMERIC_TYPES.iter().any(|t| lower.contains(t)) && !lower.contains("interval")
}

/// A human-readable label column such as `UserName` or `Email`.
pub fn is_display_column(column: &str) -> bool {
    let lower = column.to_lowercase();
    !is_primary_key_candidate(column)
        && !is_foreign_key_candidate(column)
        && DISPLAY_TERMS.iter().any(|t| lower.contains(t))
}

/// Tables holding users: the name contains `user` but not `role`.
pub fn is_user_table(table: &str) -> bool {
    let lower = table.to_lowercase();
    lower.contains("user") && !lower.contains("role")
}

/// Tables holding usage: the name contains `usage` or `role`.
pub fn is_usage_table(table: &str) -> bool {
    let lower = table.to_lowercase();
    lower.contains("usage") || lower.contains("role")
}

/// The conventional foreign key column that points at `table`,
/// e.g. `Users` → `UserId`.
pub fn key_column_for(table: &str) -> String {
    let singular = table.trim().to_singular();
    let mut chars = singular.chars();
    match chars.next() {
        Some(first) => format!("{}{}Id", first.to_uppercase(), chars.as_str()),
        None => "Id".to_string(),
    }
}

/// Pick a join column present in both column lists.
///
/// Prefers the first `<Entity>Id` column of `left` that `right` also has;
/// returns `None` when no such column is shared. Callers fall back to `Id`.
pub fn shared_join_column(left: &[String], right: &[String]) -> Option<String> {
    left.iter()
        .filter(|c| is_foreign_key_candidate(c))
        .find(|c| right.iter().any(|r| r.eq_ignore_ascii_case(c)))
        .cloned()
}

/// Extract business entities from free text using the fixed dictionary.
///
/// Each dictionary word is reported at most once, in dictionary order.
pub fn dictionary_entities(text: &str) -> Vec<String> {
    let words: Vec<String> = text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase().to_singular())
        .collect();

    HIGH_VALUE_TERMS
        .iter()
        .filter(|term| words.iter().any(|w| w == *term))
        .map(|term| term.to_string())
        .collect()
}
