//! Abstract and compiled plan steps.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::value::Params;

/// The kind of work a compiled step performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StepType {
    DataExploration,
    SchemaAnalysis,
    DataAnalysis,
    QueryConstruction,
    FinalQuery,
}

impl StepType {
    /// Whether this step answers the question (as opposed to gathering
    /// supporting facts).
    pub fn is_terminal(&self) -> bool {
        matches!(self, StepType::FinalQuery)
    }
}

impl fmt::Display for StepType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StepType::DataExploration => "DataExploration",
            StepType::SchemaAnalysis => "SchemaAnalysis",
            StepType::DataAnalysis => "DataAnalysis",
            StepType::QueryConstruction => "QueryConstruction",
            StepType::FinalQuery => "FinalQuery",
        };
        write!(f, "{}", name)
    }
}

/// A planning step as proposed by the language model.
///
/// Nothing about it is trusted: order may have gaps or duplicates, the
/// action may be unknown and parameters may be missing.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AbstractStep {
    pub order: i64,
    pub action: String,
    pub description: String,
    pub parameters: Params,
    pub reasoning: String,
    pub expected_outcome: String,
}

impl AbstractStep {
    pub fn new(order: i64, action: impl Into<String>, parameters: Params) -> Self {
        Self {
            order,
            action: action.into(),
            parameters,
            ..Default::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// A concrete, typed step of a compiled plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanStep {
    /// 1-based position, contiguous after compilation.
    pub order: usize,
    #[serde(rename = "type")]
    pub step_type: StepType,
    pub description: String,
    pub sql_template: Option<String>,
    pub parameters: Params,
    pub purpose: String,
    pub reasoning: String,
    pub optional: bool,
}

impl PlanStep {
    /// Whether the step carries no executable SQL (absent, blank, or a
    /// comment marker used for introspection-only steps).
    pub fn is_introspection_only(&self) -> bool {
        self.sql_template
            .as_deref()
            .map_or(true, crate::planner::sql::is_comment_only)
    }
}

/// An ordered, compiled plan.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Plan {
    pub steps: Vec<PlanStep>,
}

impl Plan {
    pub fn new(steps: Vec<PlanStep>) -> Self {
        Self { steps }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn count(&self, step_type: StepType) -> usize {
        self.steps.iter().filter(|s| s.step_type == step_type).count()
    }

    pub fn contains(&self, step_type: StepType) -> bool {
        self.count(step_type) > 0
    }
}
