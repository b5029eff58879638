//! # Delve
//!
//! Progressive, multi-table analysis of a relational database from a
//! free-text question.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                question (free text)                      │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [understanding]
//! ┌─────────────────────────────────────────────────────────┐
//! │   Intent (entities, query type, limit, search terms)     │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [discovery]
//! ┌─────────────────────────────────────────────────────────┐
//! │   SchemaContext (ranked candidate tables, ≤ cap)         │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [planner]
//! ┌─────────────────────────────────────────────────────────┐
//! │   Plan (typed steps with T-SQL templates)                │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [executor + ExecutionContext]
//! ┌─────────────────────────────────────────────────────────┐
//! │   ExecutionStep* + final data                            │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [insights]
//! ┌─────────────────────────────────────────────────────────┐
//! │   Report (metrics, patterns, narrative, answer)          │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! Database access goes through [`introspection::DatabaseIntrospection`]
//! (SELECT-only), language work through
//! [`understanding::TextUnderstanding`]. Both are traits so the core can be
//! driven by a database worker and a chat model, or by in-memory fakes.

pub mod config;
pub mod deadline;
pub mod discovery;
pub mod executor;
pub mod heuristics;
pub mod insights;
pub mod introspection;
pub mod model;
pub mod orchestrator;
pub mod planner;
pub mod understanding;
pub mod worker;

/// Re-exports for convenient usage.
pub mod prelude {
    pub use crate::config::Settings;
    pub use crate::deadline::{CallError, CallGuard};
    pub use crate::discovery::{DiscoveryConfig, RelevanceScorer, SchemaDiscoveryEngine};
    pub use crate::executor::{
        ExecutionContext, ExecutionResult, ExecutorConfig, ProgressiveExecutor,
    };
    pub use crate::insights::InsightSynthesizer;
    pub use crate::introspection::{
        DatabaseIntrospection, IntrospectionError, SchemaMatch, WorkerIntrospection,
    };
    pub use crate::model::{
        AbstractStep, ColumnFact, ExecutionStep, ForeignKeyFact, Insights, Intent, Metric,
        ParamValue, Params, Plan, PlanStep, QueryType, Record, Report, SchemaContext, StepType,
        TableCandidate, TableName, TableStats,
    };
    pub use crate::orchestrator::{Orchestrator, OrchestratorConfig};
    pub use crate::planner::{CompilerConfig, PlanCompiler};
    pub use crate::understanding::{
        ChatUnderstanding, LanguageModelError, OfflineUnderstanding, TextUnderstanding,
    };
    pub use crate::worker::WorkerClient;
}
