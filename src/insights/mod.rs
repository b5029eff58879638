//! Insight synthesis.
//!
//! [`InsightSynthesizer::synthesize`] is pure: metrics, patterns and
//! observations are computed from the final data, the executed steps and
//! the schema context alone. Prose comes separately from
//! [`InsightSynthesizer::narrate`], which never fails.

pub mod patterns;
pub mod stats;

use serde_json::json;
use tracing::debug;

use crate::deadline::CallGuard;
use crate::heuristics;
use crate::model::{ExecutionStep, Insights, Metric, Record, SchemaContext};
use crate::understanding::{fallback, TextUnderstanding};

use stats::ColumnSummary;

/// Maximum number of metrics kept, in insertion order.
pub const MAX_METRICS: usize = 10;

/// Derives metrics and patterns from a run's results.
#[derive(Debug, Clone, Copy, Default)]
pub struct InsightSynthesizer;

impl InsightSynthesizer {
    pub fn new() -> Self {
        Self
    }

    /// Compute insights without narrative.
    pub fn synthesize(
        &self,
        final_data: &[Record],
        steps: &[ExecutionStep],
        schema: &SchemaContext,
        query: &str,
    ) -> Insights {
        let metrics = self.metrics(final_data);
        let patterns = self.patterns(final_data, steps);
        let observations = self.observations(steps, schema);
        debug!(
            query,
            metrics = metrics.len(),
            patterns = patterns.len(),
            "insights synthesized"
        );

        Insights {
            metrics,
            patterns,
            observations,
            summary: String::new(),
            recommendations: Vec::new(),
        }
    }

    /// Fill in summary and recommendations, falling back to fixed text.
    pub async fn narrate(
        &self,
        understanding: &dyn TextUnderstanding,
        guard: &CallGuard,
        query: &str,
        insights: &mut Insights,
    ) {
        let narrative = match guard.call(understanding.narrate(query, insights)).await {
            Ok(narrative) => narrative,
            Err(e) => {
                debug!(error = %e, "narrative unavailable; using generic text");
                fallback::narrative()
            }
        };
        insights.summary = narrative.summary;
        insights.recommendations = narrative.recommendations;
    }

    fn metrics(&self, records: &[Record]) -> Vec<Metric> {
        let mut metrics = vec![Metric::new(
            "Total Records",
            records.len(),
            "Rows in the final result",
        )];

        let columns: Vec<&String> = records.first().map(|r| r.keys().collect()).unwrap_or_default();

        if let Some(column) = columns.iter().find(|c| heuristics::is_unique_user_column(c)) {
            metrics.push(Metric::new(
                "Unique Users",
                stats::distinct_count(records, column),
                format!("Distinct values of {}", column),
            ));
        }
        if let Some(column) = columns.iter().find(|c| heuristics::is_department_column(c)) {
            metrics.push(Metric::new(
                "Departments Represented",
                stats::distinct_count(records, column),
                format!("Distinct values of {}", column),
            ));
        }

        for column in stats::numeric_columns(records) {
            let values = stats::column_values(records, &column);
            let Some(summary) = ColumnSummary::of(&values) else {
                continue;
            };
            metrics.push(Metric::new(
                format!("{} Total", column),
                summary.sum,
                format!("Sum of {}", column),
            ));
            metrics.push(Metric::new(
                format!("{} Average", column),
                summary.mean,
                format!("Mean of {} (2 decimals)", column),
            ));
            metrics.push(Metric::new(
                format!("{} Median", column),
                summary.median,
                format!("Median of {}", column),
            ));
            metrics.push(Metric::new(
                format!("{} Range", column),
                json!({ "min": summary.min, "max": summary.max }),
                format!("Smallest and largest {}", column),
            ));
        }

        metrics.truncate(MAX_METRICS);
        metrics
    }

    fn patterns(&self, records: &[Record], steps: &[ExecutionStep]) -> Vec<String> {
        let mut found = Vec::new();
        for column in stats::numeric_columns(records) {
            let values = stats::column_values(records, &column);
            found.extend(patterns::concentration(&column, &values));
            found.extend(patterns::sparsity(&column, &values));
        }
        found.extend(patterns::structural(steps));
        found
    }

    fn observations(&self, steps: &[ExecutionStep], schema: &SchemaContext) -> Vec<String> {
        let mut observations = Vec::new();

        let total_ms: u64 = steps.iter().map(|s| s.duration_ms).sum();
        observations.push(format!(
            "Executed {} step(s) in {} ms",
            steps.len(),
            total_ms
        ));

        let counts = steps.iter().map(|s| s.record_count());
        if let (Some(min), Some(max)) = (counts.clone().min(), counts.max()) {
            observations.push(format!(
                "Records per step ranged from {} to {}",
                min, max
            ));
        }

        observations.push(format!(
            "Analyzed {} table(s) containing {} row(s)",
            schema.relevant_tables.len(),
            schema.total_rows()
        ));
        observations.push(format!(
            "Schema discovery confidence: {:.0}%",
            schema.confidence_score * 100.0
        ));

        observations
    }
}
