//! NDJSON wire types for the database worker.
//!
//! Every request is one JSON line `{id, method, params}`; every response is
//! one JSON line `{id, success, result | error}`. Params always carry the
//! connection (driver + connection string) so the worker stays stateless.

use serde::{Deserialize, Serialize};

use crate::model::{Record, TableName};

// ============================================================================
// Envelope
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct RequestEnvelope {
    pub id: String,
    pub method: String,
    pub params: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResponseEnvelope {
    pub id: String,
    pub success: bool,
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<ErrorInfo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ErrorInfo {
    pub code: String,
    pub message: String,
}

// ============================================================================
// Request parameters
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionParams {
    pub driver: String,
    pub connection_string: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConnectionOnly {
    #[serde(flatten)]
    pub connection: ConnectionParams,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchParams {
    #[serde(flatten)]
    pub connection: ConnectionParams,
    pub term: String,
}

/// Parameters for every per-table method.
#[derive(Debug, Clone, Serialize)]
pub struct TableParams {
    #[serde(flatten)]
    pub connection: ConnectionParams,
    pub schema: String,
    pub table: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SampleRowsParams {
    #[serde(flatten)]
    pub connection: ConnectionParams,
    pub schema: String,
    pub table: String,
    pub limit: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExecuteQueryParams {
    #[serde(flatten)]
    pub connection: ConnectionParams,
    pub sql: String,
}

// ============================================================================
// Responses
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct SchemaInfo {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListSchemasResponse {
    pub schemas: Vec<SchemaInfo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TableInfo {
    pub schema: String,
    pub name: String,
}

impl From<TableInfo> for TableName {
    fn from(info: TableInfo) -> Self {
        TableName::new(info.schema, info.name)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListTablesResponse {
    pub tables: Vec<TableInfo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchHit {
    pub schema: String,
    pub table: String,
    #[serde(default)]
    pub column: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchSchemaResponse {
    pub matches: Vec<SearchHit>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
    pub is_nullable: bool,
    #[serde(default)]
    pub max_length: Option<i32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GetColumnsResponse {
    pub columns: Vec<ColumnInfo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ForeignKeyInfo {
    pub name: String,
    pub columns: Vec<String>,
    pub referenced_schema: String,
    pub referenced_table: String,
    pub referenced_columns: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GetForeignKeysResponse {
    pub foreign_keys: Vec<ForeignKeyInfo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TableStatsResponse {
    pub row_count: i64,
    #[serde(default)]
    pub total_kb: i64,
    #[serde(default)]
    pub used_kb: i64,
}

/// Tabular result shared by `metadata.sample_rows` and `query.execute`.
#[derive(Debug, Clone, Deserialize)]
pub struct RowsResponse {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<serde_json::Value>>,
}

impl RowsResponse {
    /// Zip each row with the column names.
    ///
    /// Short rows leave trailing columns out; extra values are dropped.
    pub fn into_records(self) -> Vec<Record> {
        let columns = self.columns;
        self.rows
            .into_iter()
            .map(|row| columns.iter().cloned().zip(row).collect::<Record>())
            .collect()
    }
}

/// Worker method names.
pub mod methods {
    pub const LIST_SCHEMAS: &str = "metadata.list_schemas";
    pub const LIST_TABLES: &str = "metadata.list_tables";
    pub const SEARCH_SCHEMA: &str = "metadata.search_schema";
    pub const GET_COLUMNS: &str = "metadata.get_columns";
    pub const GET_FOREIGN_KEYS: &str = "metadata.get_foreign_keys";
    pub const GET_TABLE_STATS: &str = "metadata.get_table_stats";
    pub const SAMPLE_ROWS: &str = "metadata.sample_rows";
    pub const EXECUTE_QUERY: &str = "query.execute";
}
