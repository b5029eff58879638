//! Structured interpretation of a free-text question.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::value::Params;

/// The kind of answer the question asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum QueryType {
    TopN,
    Count,
    Sum,
    Average,
    List,
    Comparison,
    #[default]
    Analysis,
}

impl QueryType {
    /// Parse a query type leniently (`"top_n"`, `"TopN"`, `"top-n"` all work).
    ///
    /// Unknown values map to [`QueryType::Analysis`].
    pub fn parse(s: &str) -> Self {
        let normalized: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "topn" | "top" | "ranking" => QueryType::TopN,
            "count" => QueryType::Count,
            "sum" | "total" => QueryType::Sum,
            "average" | "avg" | "mean" => QueryType::Average,
            "list" => QueryType::List,
            "comparison" | "compare" => QueryType::Comparison,
            _ => QueryType::Analysis,
        }
    }
}

impl fmt::Display for QueryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            QueryType::TopN => "TopN",
            QueryType::Count => "Count",
            QueryType::Sum => "Sum",
            QueryType::Average => "Average",
            QueryType::List => "List",
            QueryType::Comparison => "Comparison",
            QueryType::Analysis => "Analysis",
        };
        write!(f, "{}", name)
    }
}

/// Structured intent produced once per run by the language understanding
/// capability (or by the fallback dictionary). Never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Intent {
    pub intent: String,
    #[serde(default)]
    pub entities: Vec<String>,
    #[serde(default)]
    pub query_type: QueryType,
    #[serde(default)]
    pub parameters: Params,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub search_terms: Vec<String>,
}

impl Intent {
    /// Requested row limit, `default` when absent or unusable.
    pub fn limit_or(&self, default: i64) -> i64 {
        match self.parameters.int_or("limit", default) {
            0 => default,
            n => n,
        }
    }

    /// Clamp confidence into `[0, 1]`.
    pub fn normalized(mut self) -> Self {
        self.confidence = if self.confidence.is_finite() {
            self.confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };
        self
    }
}
