//! `DatabaseIntrospection` over the NDJSON database worker.

use std::sync::Arc;

use async_trait::async_trait;

use super::{DatabaseIntrospection, IntrospectionResult, SchemaMatch};
use crate::model::{ColumnFact, ForeignKeyFact, Record, TableName, TableStats};
use crate::worker::protocol::{self, methods, ConnectionParams};
use crate::worker::WorkerClient;

/// Introspection backed by a [`WorkerClient`].
///
/// Each call is one worker request; the worker opens and releases its
/// own connection per request.
pub struct WorkerIntrospection {
    client: Arc<WorkerClient>,
    connection: ConnectionParams,
}

impl WorkerIntrospection {
    pub fn new(
        client: Arc<WorkerClient>,
        driver: impl Into<String>,
        connection_string: impl Into<String>,
    ) -> Self {
        Self {
            client,
            connection: ConnectionParams {
                driver: driver.into(),
                connection_string: connection_string.into(),
            },
        }
    }

    fn table_params(&self, table: &TableName) -> protocol::TableParams {
        protocol::TableParams {
            connection: self.connection.clone(),
            schema: table.schema.clone(),
            table: table.table.clone(),
        }
    }

    fn connection_only(&self) -> protocol::ConnectionOnly {
        protocol::ConnectionOnly {
            connection: self.connection.clone(),
        }
    }
}

#[async_trait]
impl DatabaseIntrospection for WorkerIntrospection {
    async fn list_schemas(&self) -> IntrospectionResult<Vec<String>> {
        let response: protocol::ListSchemasResponse = self
            .client
            .request(methods::LIST_SCHEMAS, self.connection_only())
            .await?;
        Ok(response.schemas.into_iter().map(|s| s.name).collect())
    }

    async fn list_tables(&self) -> IntrospectionResult<Vec<TableName>> {
        let response: protocol::ListTablesResponse = self
            .client
            .request(methods::LIST_TABLES, self.connection_only())
            .await?;
        Ok(response.tables.into_iter().map(Into::into).collect())
    }

    async fn search_schema(&self, term: &str) -> IntrospectionResult<Vec<SchemaMatch>> {
        let response: protocol::SearchSchemaResponse = self
            .client
            .request(
                methods::SEARCH_SCHEMA,
                protocol::SearchParams {
                    connection: self.connection.clone(),
                    term: term.to_string(),
                },
            )
            .await?;

        Ok(response
            .matches
            .into_iter()
            .map(|hit| SchemaMatch {
                table: TableName::new(hit.schema, hit.table),
                column: hit.column,
            })
            .collect())
    }

    async fn describe_table(&self, table: &TableName) -> IntrospectionResult<Vec<ColumnFact>> {
        let response: protocol::GetColumnsResponse = self
            .client
            .request(methods::GET_COLUMNS, self.table_params(table))
            .await?;

        Ok(response
            .columns
            .into_iter()
            .map(|c| ColumnFact::new(c.name, c.data_type, c.is_nullable, c.max_length))
            .collect())
    }

    async fn get_foreign_keys(
        &self,
        table: &TableName,
    ) -> IntrospectionResult<Vec<ForeignKeyFact>> {
        let response: protocol::GetForeignKeysResponse = self
            .client
            .request(methods::GET_FOREIGN_KEYS, self.table_params(table))
            .await?;

        Ok(response
            .foreign_keys
            .into_iter()
            .map(|fk| ForeignKeyFact {
                name: fk.name,
                columns: fk.columns,
                referenced_table: TableName::new(fk.referenced_schema, fk.referenced_table),
                referenced_columns: fk.referenced_columns,
            })
            .collect())
    }

    async fn get_stats(&self, table: &TableName) -> IntrospectionResult<TableStats> {
        let response: protocol::TableStatsResponse = self
            .client
            .request(methods::GET_TABLE_STATS, self.table_params(table))
            .await?;

        Ok(TableStats {
            row_count: response.row_count,
            total_kb: response.total_kb,
            used_kb: response.used_kb,
        })
    }

    async fn sample_rows(
        &self,
        table: &TableName,
        limit: usize,
    ) -> IntrospectionResult<Vec<Record>> {
        let response: protocol::RowsResponse = self
            .client
            .request(
                methods::SAMPLE_ROWS,
                protocol::SampleRowsParams {
                    connection: self.connection.clone(),
                    schema: table.schema.clone(),
                    table: table.table.clone(),
                    limit: i32::try_from(limit).unwrap_or(i32::MAX),
                },
            )
            .await?;
        Ok(response.into_records())
    }

    async fn run_select(&self, sql: &str) -> IntrospectionResult<Vec<Record>> {
        let response: protocol::RowsResponse = self
            .client
            .request(
                methods::EXECUTE_QUERY,
                protocol::ExecuteQueryParams {
                    connection: self.connection.clone(),
                    sql: sql.to_string(),
                },
            )
            .await?;
        Ok(response.into_records())
    }
}
