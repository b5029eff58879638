//! T-SQL text for compiled plan steps.
//!
//! The compiler only ever emits a handful of statement shapes, so they are
//! rendered directly rather than through a general query builder:
//! - `SELECT TOP (n) *` samples
//! - two-table `INNER JOIN` probes
//! - `COUNT(*)` summaries, optionally grouped
//! - the ranked user/usage answer query
//!
//! Identifiers are bracket quoted and limits use `TOP (n)`.

use crate::model::TableName;

/// Leading marker for steps that run no SQL.
pub const COMMENT_MARKER: &str = "--";

/// Quote an identifier with square brackets, doubling any `]`.
pub fn quote_ident(ident: &str) -> String {
    format!("[{}]", ident.replace(']', "]]"))
}

/// Whether a template is blank or starts with a comment marker.
pub fn is_comment_only(sql: &str) -> bool {
    let trimmed = sql.trim_start();
    trimmed.is_empty() || trimmed.starts_with(COMMENT_MARKER)
}

/// A comment-only template carrying a note for the execution log.
pub fn introspection_marker(note: &str) -> String {
    format!("{} introspection: {}", COMMENT_MARKER, note.replace('\n', " "))
}

/// `SELECT TOP (n) * FROM t [ORDER BY c]`.
pub fn select_top(table: &TableName, limit: i64, order_by: Option<&str>) -> String {
    let mut sql = format!("SELECT TOP ({}) * FROM {}", limit.max(1), table.quoted());
    if let Some(column) = order_by {
        sql.push_str(&format!(" ORDER BY {}", quote_ident(column)));
    }
    sql
}

/// A small test join between two tables on a shared column.
pub fn join_probe(
    left: &TableName,
    right: &TableName,
    left_column: &str,
    right_column: &str,
    limit: i64,
) -> String {
    format!(
        "SELECT TOP ({}) t1.*, t2.* FROM {} t1 INNER JOIN {} t2 ON t1.{} = t2.{}",
        limit.max(1),
        left.quoted(),
        right.quoted(),
        quote_ident(left_column),
        quote_ident(right_column)
    )
}

/// `SELECT COUNT(*) AS [RecordCount] FROM t`.
pub fn count_summary(table: &TableName) -> String {
    format!("SELECT COUNT(*) AS [RecordCount] FROM {}", table.quoted())
}

/// Row counts per distinct value of `group_column`, largest first.
pub fn grouped_count(table: &TableName, group_column: &str, limit: i64) -> String {
    let column = quote_ident(group_column);
    format!(
        "SELECT TOP ({}) {col}, COUNT(*) AS [RecordCount] FROM {} GROUP BY {col} ORDER BY COUNT(*) DESC",
        limit.max(1),
        table.quoted(),
        col = column
    )
}

/// Shape of the ranked answer query.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedJoin<'a> {
    pub user_table: &'a TableName,
    pub usage_table: &'a TableName,
    /// Join column on the user side.
    pub user_key: &'a str,
    /// Join column on the usage side.
    pub usage_key: &'a str,
    /// Extra user columns to group and display.
    pub label_columns: Vec<&'a str>,
    /// Numeric usage column to total, if any.
    pub metric_column: Option<&'a str>,
    pub limit: i64,
}

impl RankedJoin<'_> {
    /// Render the grouped, aggregated join.
    ///
    /// The primary metric is the summed usage column when one exists,
    /// otherwise the per-user row count.
    pub fn to_sql(&self) -> String {
        let mut group_cols = vec![format!("u.{}", quote_ident(self.user_key))];
        group_cols.extend(self.label_columns.iter().map(|c| format!("u.{}", quote_ident(c))));

        let mut select = group_cols.clone();
        select.push("COUNT(*) AS [UsageCount]".to_string());
        let order_metric = match self.metric_column {
            Some(metric) => {
                select.push(format!("SUM(x.{}) AS [TotalUsage]", quote_ident(metric)));
                "[TotalUsage]"
            }
            None => "[UsageCount]",
        };

        format!(
            "SELECT TOP ({}) {} FROM {} u INNER JOIN {} x ON u.{} = x.{} GROUP BY {} ORDER BY {} DESC",
            self.limit.max(1),
            select.join(", "),
            self.user_table.quoted(),
            self.usage_table.quoted(),
            quote_ident(self.user_key),
            quote_ident(self.usage_key),
            group_cols.join(", "),
            order_metric
        )
    }
}
