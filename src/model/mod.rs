//! Core data model shared by every stage of a run.
//!
//! ```text
//! Intent ──▶ SchemaContext ──▶ Plan ──▶ ExecutionStep* ──▶ Report
//! ```

pub mod intent;
pub mod plan;
pub mod report;
pub mod schema;
pub mod value;

pub use intent::{Intent, QueryType};
pub use plan::{AbstractStep, Plan, PlanStep, StepType};
pub use report::{ExecutionStep, Insights, Metric, Report, ReportMetadata};
pub use schema::{
    ColumnFact, ForeignKeyFact, Record, SchemaContext, TableCandidate, TableName, TableStats,
};
pub use value::{ParamValue, Params};
