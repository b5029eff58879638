//! Read-only database access.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    DatabaseIntrospection                        │
//! │  - list_schemas()          - get_foreign_keys(table)            │
//! │  - list_tables()           - get_stats(table)                   │
//! │  - search_schema(term)     - sample_rows(table, n)              │
//! │  - describe_table(table)   - execute_select(sql)  ◀── guard     │
//! └─────────────────────────────────────────────────────────────────┘
//!                           │
//!                           ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │          WorkerIntrospection (NDJSON database worker)           │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every statement passes through [`guard::ensure_select`] before it
//! reaches a backend. Implementors provide [`DatabaseIntrospection::run_select`]
//! and inherit the guarded [`DatabaseIntrospection::execute_select`].

mod error;
pub mod guard;
mod worker_provider;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::model::{ColumnFact, ForeignKeyFact, Record, TableName, TableStats};

pub use error::{IntrospectionError, IntrospectionResult};
pub use worker_provider::WorkerIntrospection;

/// A hit returned by a schema search.
///
/// `column` is set when the term matched a column of the table rather
/// than the table name itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaMatch {
    pub table: TableName,
    #[serde(default)]
    pub column: Option<String>,
}

impl SchemaMatch {
    pub fn table(table: TableName) -> Self {
        Self { table, column: None }
    }

    pub fn column(table: TableName, column: impl Into<String>) -> Self {
        Self {
            table,
            column: Some(column.into()),
        }
    }
}

/// Read-only access to a relational database's catalog and data.
#[async_trait]
pub trait DatabaseIntrospection: Send + Sync {
    /// List schema names.
    async fn list_schemas(&self) -> IntrospectionResult<Vec<String>>;

    /// List every table across all schemas.
    async fn list_tables(&self) -> IntrospectionResult<Vec<TableName>>;

    /// Find tables and columns whose names contain `term`.
    async fn search_schema(&self, term: &str) -> IntrospectionResult<Vec<SchemaMatch>>;

    /// Describe a table's columns in ordinal order.
    async fn describe_table(&self, table: &TableName) -> IntrospectionResult<Vec<ColumnFact>>;

    /// Foreign keys declared on a table.
    async fn get_foreign_keys(&self, table: &TableName)
        -> IntrospectionResult<Vec<ForeignKeyFact>>;

    /// Row count and storage size of a table.
    async fn get_stats(&self, table: &TableName) -> IntrospectionResult<TableStats>;

    /// Up to `limit` rows from a table.
    async fn sample_rows(&self, table: &TableName, limit: usize)
        -> IntrospectionResult<Vec<Record>>;

    /// Run a statement that has already passed the guard.
    ///
    /// Call [`execute_select`](Self::execute_select) instead.
    async fn run_select(&self, sql: &str) -> IntrospectionResult<Vec<Record>>;

    /// Run a read-only query.
    ///
    /// Fails with [`IntrospectionError::SecurityViolation`] unless the
    /// statement starts with `SELECT`.
    async fn execute_select(&self, sql: &str) -> IntrospectionResult<Vec<Record>> {
        guard::ensure_select(sql)?;
        self.run_select(sql).await
    }
}
