//! Per-step results and the final report.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::plan::StepType;
use super::schema::Record;

/// What happened when one plan step ran.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionStep {
    pub step_number: usize,
    #[serde(rename = "type")]
    pub step_type: StepType,
    pub sql_query: String,
    pub results: Vec<Record>,
    pub reasoning: String,
    pub executed_at: DateTime<Utc>,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: u64,
    /// Whether the step handler failed.
    #[serde(default)]
    pub failed: bool,
}

impl ExecutionStep {
    pub fn record_count(&self) -> usize {
        self.results.len()
    }

    pub fn uses_join(&self) -> bool {
        self.sql_query.to_ascii_uppercase().contains(" JOIN ")
    }
}

/// A single named metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    pub name: String,
    pub value: serde_json::Value,
    #[serde(default)]
    pub description: String,
}

impl Metric {
    pub fn new(
        name: impl Into<String>,
        value: impl Into<serde_json::Value>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            description: description.into(),
        }
    }
}

/// Derived statistics and narrative.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Insights {
    pub metrics: Vec<Metric>,
    pub patterns: Vec<String>,
    pub observations: Vec<String>,
    pub summary: String,
    pub recommendations: Vec<String>,
}

/// Run-level bookkeeping.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportMetadata {
    pub tables_analyzed: usize,
    pub schemas_explored: Vec<String>,
    pub total_steps: usize,
    pub total_duration_ms: u64,
    #[serde(default)]
    pub discovery_confidence: f64,
}

/// The single externally consumed artifact of a run.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub original_query: String,
    pub steps: Vec<ExecutionStep>,
    pub final_data: Vec<Record>,
    pub insights: Insights,
    pub metadata: ReportMetadata,
    pub success: bool,
    pub error_message: Option<String>,
    pub final_answer: String,
}

impl Report {
    /// An empty, unsuccessful report for `query`.
    pub fn failed(query: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            original_query: query.into(),
            success: false,
            error_message: Some(error.into()),
            ..Default::default()
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
