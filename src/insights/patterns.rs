//! Distribution and structural patterns.

use crate::model::{ExecutionStep, StepType};

/// Share of the total above which the top values count as concentrated.
pub const CONCENTRATION_THRESHOLD: f64 = 0.8;
/// Fraction of rows that make up the "top" group.
pub const TOP_FRACTION: f64 = 0.2;
/// Fraction of zeros above which a column is sparse.
pub const SPARSITY_THRESHOLD: f64 = 0.5;
/// Exploration steps beyond this count are worth noting.
pub const EXPLORATION_STEPS_NOTED: usize = 2;

/// Whether the top 20% of values hold more than 80% of the total.
pub fn concentration(column: &str, values: &[f64]) -> Option<String> {
    let total: f64 = values.iter().sum();
    if values.is_empty() || total <= 0.0 {
        return None;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| b.total_cmp(a));
    let top = ((values.len() as f64 * TOP_FRACTION).floor() as usize).max(1);
    let top_sum: f64 = sorted.iter().take(top).sum();
    let share = top_sum / total;

    (share > CONCENTRATION_THRESHOLD).then(|| {
        format!(
            "High concentration in {}: the top {} of {} records account for {:.1}% of the total",
            column,
            top,
            values.len(),
            share * 100.0
        )
    })
}

/// Whether more than half of the values are exactly zero.
pub fn sparsity(column: &str, values: &[f64]) -> Option<String> {
    if values.is_empty() {
        return None;
    }
    let zeros = values.iter().filter(|v| **v == 0.0).count();
    let ratio = zeros as f64 / values.len() as f64;

    (ratio > SPARSITY_THRESHOLD).then(|| {
        format!(
            "Sparse data in {}: {}/{} values are zero ({:.1}%)",
            column,
            zeros,
            values.len(),
            ratio * 100.0
        )
    })
}

/// Notes about how the plan ran: heavy exploration and joins.
pub fn structural(steps: &[ExecutionStep]) -> Vec<String> {
    let mut patterns = Vec::new();

    let explorations = steps
        .iter()
        .filter(|s| s.step_type == StepType::DataExploration)
        .count();
    if explorations > EXPLORATION_STEPS_NOTED {
        patterns.push(format!(
            "Extensive exploration: {} exploration steps were needed to understand the data",
            explorations
        ));
    }

    let joins = steps.iter().filter(|s| s.uses_join()).count();
    if joins > 0 {
        patterns.push(format!(
            "Multi-table analysis: {} step(s) combined tables with joins",
            joins
        ));
    }

    patterns
}
