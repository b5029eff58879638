//! Shared fixtures: an in-memory database and a scripted language model.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use delve::introspection::{
    DatabaseIntrospection, IntrospectionError, IntrospectionResult, SchemaMatch,
};
use delve::model::{
    AbstractStep, ColumnFact, ForeignKeyFact, Insights, Intent, Params, QueryType, Record, Report,
    SchemaContext, TableName, TableStats,
};
use delve::understanding::{LanguageModelError, LanguageModelResult, Narrative, TextUnderstanding};
use serde_json::{json, Value};

// ============================================================================
// Records
// ============================================================================

pub fn record(pairs: &[(&str, Value)]) -> Record {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

/// One single-column record per value.
pub fn column_rows(column: &str, values: &[i64]) -> Vec<Record> {
    values
        .iter()
        .map(|v| record(&[(column, json!(v))]))
        .collect()
}

// ============================================================================
// FakeDatabase
// ============================================================================

#[derive(Debug, Clone)]
pub struct FakeTable {
    pub name: TableName,
    pub columns: Vec<ColumnFact>,
    pub foreign_keys: Vec<ForeignKeyFact>,
    pub row_count: i64,
    pub rows: Vec<Record>,
}

impl FakeTable {
    pub fn new(schema: &str, table: &str) -> Self {
        Self {
            name: TableName::new(schema, table),
            columns: Vec::new(),
            foreign_keys: Vec::new(),
            row_count: 0,
            rows: Vec::new(),
        }
    }

    pub fn column(mut self, name: &str, data_type: &str) -> Self {
        self.columns
            .push(ColumnFact::new(name, data_type, false, None));
        self
    }

    pub fn references(mut self, column: &str, schema: &str, table: &str) -> Self {
        self.foreign_keys.push(ForeignKeyFact {
            name: format!("FK_{}_{}", self.name.table, table),
            columns: vec![column.to_string()],
            referenced_table: TableName::new(schema, table),
            referenced_columns: vec!["Id".to_string()],
        });
        self
    }

    pub fn row_count(mut self, rows: i64) -> Self {
        self.row_count = rows;
        self
    }

    pub fn rows(mut self, rows: Vec<Record>) -> Self {
        self.rows = rows;
        self
    }
}

/// An in-memory [`DatabaseIntrospection`].
///
/// Searches match table and column names by case-insensitive substring.
/// SELECT results are canned: the first registered pattern contained in
/// the statement decides the rows; unmatched statements return no rows.
#[derive(Default)]
pub struct FakeDatabase {
    tables: Vec<FakeTable>,
    selects: Vec<(String, Vec<Record>)>,
    failing_selects: Vec<String>,
    failing_describe: HashSet<String>,
    fail_reconnaissance: bool,
    select_delay: Option<Duration>,
    describe_delay: Option<Duration>,
    executed: Mutex<Vec<String>>,
    calls: AtomicUsize,
}

impl FakeDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(mut self, table: FakeTable) -> Self {
        self.tables.push(table);
        self
    }

    pub fn with_select(mut self, pattern: &str, rows: Vec<Record>) -> Self {
        self.selects.push((pattern.to_string(), rows));
        self
    }

    pub fn failing_select(mut self, pattern: &str) -> Self {
        self.failing_selects.push(pattern.to_string());
        self
    }

    pub fn failing_describe(mut self, table: &str) -> Self {
        self.failing_describe.insert(table.to_lowercase());
        self
    }

    pub fn failing_reconnaissance(mut self) -> Self {
        self.fail_reconnaissance = true;
        self
    }

    pub fn with_select_delay(mut self, delay: Duration) -> Self {
        self.select_delay = Some(delay);
        self
    }

    pub fn with_describe_delay(mut self, delay: Duration) -> Self {
        self.describe_delay = Some(delay);
        self
    }

    /// Statements that reached the backend, in order.
    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn find(&self, name: &TableName) -> IntrospectionResult<&FakeTable> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.tables
            .iter()
            .find(|t| t.name.key() == name.key())
            .ok_or_else(|| IntrospectionError::TableNotFound(name.to_string()))
    }
}

#[async_trait]
impl DatabaseIntrospection for FakeDatabase {
    async fn list_schemas(&self) -> IntrospectionResult<Vec<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_reconnaissance {
            return Err(IntrospectionError::backend("login failed"));
        }
        let mut schemas: Vec<String> = self.tables.iter().map(|t| t.name.schema.clone()).collect();
        schemas.sort();
        schemas.dedup();
        Ok(schemas)
    }

    async fn list_tables(&self) -> IntrospectionResult<Vec<TableName>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_reconnaissance {
            return Err(IntrospectionError::backend("login failed"));
        }
        Ok(self.tables.iter().map(|t| t.name.clone()).collect())
    }

    async fn search_schema(&self, term: &str) -> IntrospectionResult<Vec<SchemaMatch>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let term = term.to_lowercase();
        let mut matches = Vec::new();
        for table in &self.tables {
            if table.name.table.to_lowercase().contains(&term) {
                matches.push(SchemaMatch::table(table.name.clone()));
            }
            for column in &table.columns {
                if column.name.to_lowercase().contains(&term) {
                    matches.push(SchemaMatch::column(table.name.clone(), column.name.clone()));
                }
            }
        }
        Ok(matches)
    }

    async fn describe_table(&self, table: &TableName) -> IntrospectionResult<Vec<ColumnFact>> {
        if let Some(delay) = self.describe_delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing_describe.contains(&table.table.to_lowercase()) {
            return Err(IntrospectionError::backend("permission denied"));
        }
        Ok(self.find(table)?.columns.clone())
    }

    async fn get_foreign_keys(
        &self,
        table: &TableName,
    ) -> IntrospectionResult<Vec<ForeignKeyFact>> {
        Ok(self.find(table)?.foreign_keys.clone())
    }

    async fn get_stats(&self, table: &TableName) -> IntrospectionResult<TableStats> {
        let table = self.find(table)?;
        Ok(TableStats {
            row_count: table.row_count,
            total_kb: table.row_count / 10,
            used_kb: table.row_count / 20,
        })
    }

    async fn sample_rows(
        &self,
        table: &TableName,
        limit: usize,
    ) -> IntrospectionResult<Vec<Record>> {
        Ok(self.find(table)?.rows.iter().take(limit).cloned().collect())
    }

    async fn run_select(&self, sql: &str) -> IntrospectionResult<Vec<Record>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.executed.lock().unwrap().push(sql.to_string());

        if let Some(delay) = self.select_delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing_selects.iter().any(|p| sql.contains(p.as_str())) {
            return Err(IntrospectionError::backend("deadlock victim"));
        }
        Ok(self
            .selects
            .iter()
            .find(|(pattern, _)| sql.contains(pattern.as_str()))
            .map(|(_, rows)| rows.clone())
            .unwrap_or_default())
    }
}

/// Users, usage, roles and departments in `dbo`, invoices in `sales`.
pub fn sample_database() -> FakeDatabase {
    let users = FakeTable::new("dbo", "Users")
        .column("Id", "int")
        .column("UserName", "nvarchar")
        .column("Email", "nvarchar")
        .column("DepartmentName", "nvarchar")
        .row_count(50)
        .rows(vec![
            record(&[("Id", json!(1)), ("UserName", json!("ada"))]),
            record(&[("Id", json!(2)), ("UserName", json!("grace"))]),
        ]);

    let usage = FakeTable::new("dbo", "AppUsage")
        .column("Id", "int")
        .column("UserId", "int")
        .column("AppName", "nvarchar")
        .column("UsageMinutes", "int")
        .column("LoginCount", "int")
        .references("UserId", "dbo", "Users")
        .row_count(500)
        .rows(vec![record(&[("Id", json!(1)), ("UserId", json!(1))])]);

    let roles = FakeTable::new("dbo", "Roles")
        .column("Id", "int")
        .column("RoleName", "nvarchar")
        .row_count(4);

    let user_roles = FakeTable::new("dbo", "UserRoles")
        .column("UserId", "int")
        .column("RoleId", "int")
        .references("UserId", "dbo", "Users")
        .references("RoleId", "dbo", "Roles")
        .row_count(60);

    let departments = FakeTable::new("dbo", "Departments")
        .column("Id", "int")
        .column("DepartmentName", "nvarchar")
        .row_count(8)
        .rows(vec![record(&[("Id", json!(1)), ("DepartmentName", json!("Ops"))])]);

    let invoices = FakeTable::new("sales", "Invoices")
        .column("Id", "int")
        .column("Amount", "decimal(10,2)")
        .row_count(1000);

    FakeDatabase::new()
        .with_table(users)
        .with_table(usage)
        .with_table(roles)
        .with_table(user_roles)
        .with_table(departments)
        .with_table(invoices)
}

// ============================================================================
// ScriptedUnderstanding
// ============================================================================

/// A [`TextUnderstanding`] with fixed answers and switchable failures.
#[derive(Default)]
pub struct ScriptedUnderstanding {
    pub intent: Option<Intent>,
    pub steps: Vec<AbstractStep>,
    pub fail_plan: bool,
    pub fail_justify: bool,
    pub fail_narrate: bool,
    pub fail_summary: bool,
    pub justify_calls: AtomicUsize,
}

impl ScriptedUnderstanding {
    pub fn new(intent: Intent) -> Self {
        Self {
            intent: Some(intent),
            ..Default::default()
        }
    }

    /// Every call fails.
    pub fn broken() -> Self {
        Self {
            intent: None,
            fail_plan: true,
            fail_justify: true,
            fail_narrate: true,
            fail_summary: true,
            ..Default::default()
        }
    }

    pub fn with_steps(mut self, steps: Vec<AbstractStep>) -> Self {
        self.steps = steps;
        self
    }
}

fn malformed() -> LanguageModelError {
    LanguageModelError::Malformed("scripted failure".to_string())
}

#[async_trait]
impl TextUnderstanding for ScriptedUnderstanding {
    async fn analyze_intent(&self, _query: &str) -> LanguageModelResult<Intent> {
        self.intent.clone().ok_or_else(malformed)
    }

    async fn plan_steps(
        &self,
        _query: &str,
        _intent: &Intent,
        _schema: &SchemaContext,
    ) -> LanguageModelResult<Vec<AbstractStep>> {
        if self.fail_plan {
            return Err(malformed());
        }
        Ok(self.steps.clone())
    }

    async fn justify(
        &self,
        step_description: &str,
        _context: &Value,
    ) -> LanguageModelResult<String> {
        self.justify_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_justify {
            return Err(malformed());
        }
        Ok(format!("Because: {}", step_description))
    }

    async fn narrate(&self, _query: &str, insights: &Insights) -> LanguageModelResult<Narrative> {
        if self.fail_narrate {
            return Err(malformed());
        }
        Ok(Narrative {
            summary: format!("{} metrics computed", insights.metrics.len()),
            recommendations: vec!["Keep going".to_string()],
        })
    }

    async fn summarize(&self, query: &str, report: &Report) -> LanguageModelResult<String> {
        if self.fail_summary {
            return Err(malformed());
        }
        Ok(format!("{}: {} rows", query, report.final_data.len()))
    }
}

// ============================================================================
// Intents
// ============================================================================

pub fn intent(query_type: QueryType, terms: &[&str]) -> Intent {
    Intent {
        intent: "test_intent".to_string(),
        entities: terms.iter().map(|t| t.to_string()).collect(),
        query_type,
        parameters: Params::new(),
        confidence: 0.9,
        search_terms: terms.iter().map(|t| t.to_string()).collect(),
    }
}

pub fn top_n_intent(limit: i64, terms: &[&str]) -> Intent {
    let mut intent = intent(QueryType::TopN, terms);
    intent.parameters.insert("limit", limit);
    intent
}
