//! Discovery-phase schema facts: candidates, columns, relationships.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::heuristics;

/// One result row, keyed by column name.
pub type Record = serde_json::Map<String, serde_json::Value>;

/// A schema-qualified table name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TableName {
    pub schema: String,
    pub table: String,
}

impl TableName {
    pub fn new(schema: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            table: table.into(),
        }
    }

    /// Parse `"schema.table"`, or a bare table name in `default_schema`.
    ///
    /// Square brackets around either part are removed, so `[dbo].[Users]`
    /// parses the same as `dbo.Users`.
    pub fn parse(name: &str, default_schema: &str) -> Self {
        let name = name.trim();
        match name.split_once('.') {
            Some((schema, table)) if !schema.trim().is_empty() => {
                Self::new(unbracket(schema), unbracket(table))
            }
            Some((_, table)) => Self::new(default_schema, unbracket(table)),
            None => Self::new(default_schema, unbracket(name)),
        }
    }

    /// The lowercase `schema.table` key used to merge candidates.
    pub fn key(&self) -> String {
        format!("{}.{}", self.schema, self.table).to_lowercase()
    }

    /// The T-SQL bracket-quoted form, e.g. `[dbo].[Users]`.
    pub fn quoted(&self) -> String {
        format!(
            "{}.{}",
            crate::planner::sql::quote_ident(&self.schema),
            crate::planner::sql::quote_ident(&self.table)
        )
    }
}

fn unbracket(part: &str) -> String {
    part.trim()
        .trim_start_matches('[')
        .trim_end_matches(']')
        .to_string()
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.table)
    }
}

/// A described column.
///
/// Key candidacy is inferred from naming convention, not catalog
/// constraints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnFact {
    pub name: String,
    pub data_type: String,
    pub nullable: bool,
    #[serde(default)]
    pub max_length: Option<i32>,
    pub is_primary_key_candidate: bool,
    pub is_foreign_key_candidate: bool,
}

impl ColumnFact {
    /// Build a column fact, deriving the key flags from the column name.
    pub fn new(
        name: impl Into<String>,
        data_type: impl Into<String>,
        nullable: bool,
        max_length: Option<i32>,
    ) -> Self {
        let name = name.into();
        Self {
            is_primary_key_candidate: heuristics::is_primary_key_candidate(&name),
            is_foreign_key_candidate: heuristics::is_foreign_key_candidate(&name),
            name,
            data_type: data_type.into(),
            nullable,
            max_length,
        }
    }

    pub fn is_numeric(&self) -> bool {
        heuristics::is_numeric_type(&self.data_type)
    }
}

/// A foreign key as reported by the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForeignKeyFact {
    pub name: String,
    pub columns: Vec<String>,
    pub referenced_table: TableName,
    pub referenced_columns: Vec<String>,
}

/// Size statistics for one table.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableStats {
    pub row_count: i64,
    #[serde(rename = "totalKB")]
    pub total_kb: i64,
    #[serde(rename = "usedKB")]
    pub used_kb: i64,
}

/// A table considered relevant to the current question.
///
/// Candidates are created in table discovery and only ever grow: later
/// phases add columns, keys, statistics, samples and score adjustments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableCandidate {
    #[serde(flatten)]
    pub name: TableName,
    #[serde(default)]
    pub columns: Vec<ColumnFact>,
    #[serde(default)]
    pub foreign_keys: Vec<ForeignKeyFact>,
    #[serde(default)]
    pub stats: TableStats,
    pub relevance_score: f64,
    #[serde(default)]
    pub sample_rows: Vec<Record>,
    #[serde(default)]
    pub relationship_bonus_applied: bool,
    /// Set once structural analysis succeeded for this table.
    #[serde(default)]
    pub analyzed: bool,
}

impl TableCandidate {
    pub fn new(name: TableName, relevance_score: f64) -> Self {
        Self {
            name,
            columns: Vec::new(),
            foreign_keys: Vec::new(),
            stats: TableStats::default(),
            relevance_score,
            sample_rows: Vec::new(),
            relationship_bonus_applied: false,
            analyzed: false,
        }
    }

    pub fn column(&self, name: &str) -> Option<&ColumnFact> {
        self.columns.iter().find(|c| c.name.eq_ignore_ascii_case(name))
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// The first primary-key candidate, else the first column.
    pub fn primary_key(&self) -> Option<&ColumnFact> {
        self.columns
            .iter()
            .find(|c| c.is_primary_key_candidate)
            .or_else(|| self.columns.first())
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }
}

/// Everything discovery learned, ordered by relevance.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaContext {
    pub relevant_tables: Vec<TableCandidate>,
    pub schemas_explored: Vec<String>,
    pub search_terms: Vec<String>,
    pub confidence_score: f64,
}

impl SchemaContext {
    /// The highest-ranked candidate.
    pub fn top_table(&self) -> Option<&TableCandidate> {
        self.relevant_tables.first()
    }

    /// Look up a candidate by its exact `schema.table`.
    pub fn find_exact(&self, name: &TableName) -> Option<&TableCandidate> {
        let key = name.key();
        self.relevant_tables.iter().find(|t| t.name.key() == key)
    }

    /// Look up a candidate by a name as written in a plan.
    ///
    /// A qualified `schema.table` only matches that schema. A bare name
    /// tries the default schema first, then any schema.
    pub fn resolve(&self, name: &str, default_schema: &str) -> Option<&TableCandidate> {
        let parsed = TableName::parse(name, default_schema);
        if name.contains('.') {
            return self.find_exact(&parsed);
        }
        self.find_exact(&parsed).or_else(|| {
            self.relevant_tables
                .iter()
                .find(|t| t.name.table.eq_ignore_ascii_case(&parsed.table))
        })
    }

    /// Sum of row counts over all relevant tables.
    pub fn total_rows(&self) -> i64 {
        self.relevant_tables.iter().map(|t| t.stats.row_count).sum()
    }
}
