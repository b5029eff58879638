//! Deterministic stand-ins for language model output.
//!
//! Used whenever a language model call fails, and throughout by
//! [`super::OfflineUnderstanding`].

use std::sync::LazyLock;

use regex::Regex;

use crate::heuristics;
use crate::model::{Intent, Params, QueryType, Report};

use super::Narrative;

/// Confidence reported for dictionary-derived intents.
pub const FALLBACK_CONFIDENCE: f64 = 0.3;

static TOP_N: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:top|first|best)\s+(\d{1,6})\b").unwrap());

/// Extract an explicit `top N` style row limit from the question.
pub fn requested_limit(query: &str) -> Option<i64> {
    TOP_N
        .captures(query)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<i64>().ok())
        .filter(|n| *n > 0)
}

/// A low-confidence intent built from the business-term dictionary.
pub fn fallback_intent(query: &str) -> Intent {
    let entities = heuristics::dictionary_entities(query);

    let mut parameters = Params::new();
    if let Some(limit) = requested_limit(query) {
        parameters.insert("limit", limit);
    }

    Intent {
        intent: "general_analysis".to_string(),
        search_terms: entities.clone(),
        entities,
        query_type: QueryType::Analysis,
        parameters,
        confidence: FALLBACK_CONFIDENCE,
    }
}

/// A generic justification for a step.
pub fn justification(step_description: &str) -> String {
    let description = step_description.trim().trim_end_matches('.');
    if description.is_empty() {
        "This step gathers information needed for the next stage of the analysis.".to_string()
    } else {
        format!(
            "This step will {} to gather information needed for the analysis.",
            lowercase_first(description)
        )
    }
}

/// The fixed summary and recommendations used when narration fails.
pub fn narrative() -> Narrative {
    Narrative {
        summary: "The analysis completed and produced the metrics and patterns listed below."
            .to_string(),
        recommendations: vec![
            "Review the highest-ranked records for outliers.".to_string(),
            "Validate the discovered table relationships with the data owners.".to_string(),
            "Refine the question with specific filters or time ranges for deeper insight."
                .to_string(),
        ],
    }
}

/// A templated answer listing table and record counts.
pub fn summary(query: &str, report: &Report) -> String {
    let records: usize = report.steps.iter().map(|s| s.record_count()).sum();
    format!(
        "Analyzed {} table(s) across {} step(s) for \"{}\", examining {} record(s) and returning {} row(s) in the final result.",
        report.metadata.tables_analyzed,
        report.metadata.total_steps,
        query.trim(),
        records,
        report.final_data.len()
    )
}

fn lowercase_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}
