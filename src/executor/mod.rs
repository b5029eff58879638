//! Progressive plan execution.
//!
//! Steps run strictly in order, one at a time, because each may read what
//! earlier steps wrote into the [`ExecutionContext`]. A failing step is
//! recorded with its error as reasoning and empty results; the loop moves
//! on. Once the run deadline passes, every remaining step fails the same
//! way and is still recorded. Only cancellation stops the loop early.

mod context;

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::deadline::{CallError, CallGuard};
use crate::introspection::{DatabaseIntrospection, IntrospectionError};
use crate::model::{ExecutionStep, Plan, PlanStep, Record, StepType, TableName};
use crate::understanding::{fallback, TextUnderstanding};

pub use context::ExecutionContext;

pub type StepResult<T> = Result<T, StepError>;

/// Why a single step failed.
#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error(transparent)]
    Introspection(#[from] IntrospectionError),

    #[error("step timed out after {}s", .0.as_secs_f64())]
    Timeout(Duration),

    #[error("run deadline exceeded")]
    DeadlineExceeded,

    #[error("run cancelled")]
    Cancelled,

    #[error("no tables named for schema analysis")]
    NoTables,
}

impl From<CallError<IntrospectionError>> for StepError {
    fn from(err: CallError<IntrospectionError>) -> Self {
        match err {
            CallError::Timeout(d) => StepError::Timeout(d),
            CallError::DeadlineExceeded => StepError::DeadlineExceeded,
            CallError::Cancelled => StepError::Cancelled,
            CallError::Inner(e) => StepError::Introspection(e),
        }
    }
}

/// Settings for plan execution.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutorConfig {
    pub default_schema: String,
    /// Rows of each step kept in the context.
    pub context_sample_rows: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            default_schema: "dbo".to_string(),
            context_sample_rows: 3,
        }
    }
}

/// Everything a plan run produced.
#[derive(Debug, Clone, Default)]
pub struct ExecutionResult {
    pub steps: Vec<ExecutionStep>,
    /// Results of the last step that returned any rows.
    pub final_data: Vec<Record>,
    pub context: ExecutionContext,
    /// Set when cancellation stopped the loop before the last step.
    pub cancelled: bool,
}

impl ExecutionResult {
    pub fn total_duration_ms(&self) -> u64 {
        self.steps.iter().map(|s| s.duration_ms).sum()
    }
}

/// Runs compiled plans against a database.
pub struct ProgressiveExecutor {
    db: Arc<dyn DatabaseIntrospection>,
    understanding: Arc<dyn TextUnderstanding>,
    config: ExecutorConfig,
}

impl ProgressiveExecutor {
    pub fn new(
        db: Arc<dyn DatabaseIntrospection>,
        understanding: Arc<dyn TextUnderstanding>,
        config: ExecutorConfig,
    ) -> Self {
        Self {
            db,
            understanding,
            config,
        }
    }

    /// Execute `plan` step by step.
    pub async fn execute(&self, plan: &Plan, guard: &CallGuard) -> ExecutionResult {
        let mut context = ExecutionContext::new(self.config.context_sample_rows);
        let mut steps = Vec::with_capacity(plan.len());
        let mut cancelled = false;

        for step in &plan.steps {
            if guard.is_cancelled() {
                cancelled = true;
                break;
            }

            let Some(justification) = self.justify(step, &context, guard).await else {
                cancelled = true;
                break;
            };

            let executed_at = Utc::now();
            let started = Instant::now();
            let outcome = self.run_step(step, guard).await;
            let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

            let (results, reasoning, failed) = match outcome {
                Ok(rows) => (rows, justification, false),
                Err(err) => {
                    warn!(step = step.order, kind = %step.step_type, error = %err, "step failed");
                    cancelled = matches!(err, StepError::Cancelled);
                    (Vec::new(), format!("Step failed: {}", err), true)
                }
            };

            context.record_step(step.order, &results);
            if step.step_type.is_terminal() && !results.is_empty() {
                context.mark_final_answer_ready();
            }
            debug!(step = step.order, rows = results.len(), duration_ms, "step complete");

            steps.push(ExecutionStep {
                step_number: step.order,
                step_type: step.step_type,
                sql_query: step.sql_template.clone().unwrap_or_default(),
                results,
                reasoning,
                executed_at,
                duration_ms,
                failed,
            });

            if cancelled {
                break;
            }
        }

        let final_data = last_non_empty(&steps);
        info!(
            steps = steps.len(),
            rows = final_data.len(),
            explored = context.total_records_explored(),
            "plan execution complete"
        );

        ExecutionResult {
            steps,
            final_data,
            context,
            cancelled,
        }
    }

    /// A justification for `step`; a generic one when the model fails.
    /// `None` once the run is cancelled.
    async fn justify(
        &self,
        step: &PlanStep,
        context: &ExecutionContext,
        guard: &CallGuard,
    ) -> Option<String> {
        let snapshot = context.snapshot();
        match guard
            .call(self.understanding.justify(&step.description, &snapshot))
            .await
        {
            Ok(text) => Some(text),
            Err(CallError::Cancelled) => None,
            Err(e) => {
                debug!(
                    step = step.order,
                    error = %e,
                    "justification unavailable; using generic text"
                );
                Some(fallback::justification(&step.description))
            }
        }
    }

    async fn run_step(&self, step: &PlanStep, guard: &CallGuard) -> StepResult<Vec<Record>> {
        match step.step_type {
            StepType::DataExploration => self.explore(step, guard).await,
            StepType::SchemaAnalysis => self.analyze_schema(step, guard).await,
            StepType::DataAnalysis => self.analyze_data(step, guard).await,
            StepType::QueryConstruction => self.construct_query(step, guard).await,
            StepType::FinalQuery => self.final_query(step, guard).await,
        }
    }

    async fn explore(&self, step: &PlanStep, guard: &CallGuard) -> StepResult<Vec<Record>> {
        self.run_template(step, guard).await
    }

    async fn analyze_data(&self, step: &PlanStep, guard: &CallGuard) -> StepResult<Vec<Record>> {
        self.run_template(step, guard).await
    }

    async fn construct_query(&self, step: &PlanStep, guard: &CallGuard) -> StepResult<Vec<Record>> {
        self.run_template(step, guard).await
    }

    async fn final_query(&self, step: &PlanStep, guard: &CallGuard) -> StepResult<Vec<Record>> {
        let rows = self.run_template(step, guard).await?;
        if rows.is_empty() {
            debug!(step = step.order, "final query returned no rows");
        }
        Ok(rows)
    }

    /// Run the step's SQL; comment-only templates are no-ops.
    async fn run_template(&self, step: &PlanStep, guard: &CallGuard) -> StepResult<Vec<Record>> {
        let Some(sql) = step.sql_template.as_deref().filter(|_| !step.is_introspection_only())
        else {
            return Ok(Vec::new());
        };
        Ok(guard.call(self.db.execute_select(sql)).await?)
    }

    /// Describe the named tables and fold the facts into one summary row.
    async fn analyze_schema(&self, step: &PlanStep, guard: &CallGuard) -> StepResult<Vec<Record>> {
        let tables: Vec<TableName> = step
            .parameters
            .tables()
            .iter()
            .map(|name| TableName::parse(name, &self.config.default_schema))
            .collect();
        if tables.is_empty() {
            return Err(StepError::NoTables);
        }

        let mut summaries = Vec::with_capacity(tables.len());
        let (mut total_columns, mut total_keys, mut total_rows) = (0usize, 0usize, 0i64);

        for table in &tables {
            let columns = guard.call(self.db.describe_table(table)).await?;
            let foreign_keys = guard.call(self.db.get_foreign_keys(table)).await?;
            let stats = guard.call(self.db.get_stats(table)).await?;

            total_columns += columns.len();
            total_keys += foreign_keys.len();
            total_rows += stats.row_count;

            let key_candidates: Vec<&str> = columns
                .iter()
                .filter(|c| c.is_primary_key_candidate || c.is_foreign_key_candidate)
                .map(|c| c.name.as_str())
                .collect();
            let referenced: Vec<String> = foreign_keys
                .iter()
                .map(|fk| fk.referenced_table.to_string())
                .collect();

            summaries.push(json!({
                "table": table.to_string(),
                "columnCount": columns.len(),
                "columns": columns.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
                "keyCandidates": key_candidates,
                "referencedTables": referenced,
                "rowCount": stats.row_count,
            }));
        }

        let mut record = Record::new();
        record.insert("tablesAnalyzed".to_string(), json!(tables.len()));
        record.insert("totalColumns".to_string(), json!(total_columns));
        record.insert("totalForeignKeys".to_string(), json!(total_keys));
        record.insert("totalRows".to_string(), json!(total_rows));
        record.insert("tables".to_string(), Value::Array(summaries));
        Ok(vec![record])
    }
}

/// Results of the last step, in execution order, that returned any rows.
///
/// Not necessarily the last `FinalQuery`: an exploration step that runs
/// after the final query and returns rows wins.
pub fn last_non_empty(steps: &[ExecutionStep]) -> Vec<Record> {
    steps
        .iter()
        .rev()
        .find(|s| !s.results.is_empty())
        .map(|s| s.results.clone())
        .unwrap_or_default()
}
