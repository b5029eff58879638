//! Relevance scoring for candidate tables.
//!
//! The scorer rates a single search hit against the question's intent. The
//! bonus pass at the end of discovery uses [`bonus_adjustments`]; both
//! return itemised adjustments so a score can be explained.

use crate::heuristics::{self, TermMatch};
use crate::model::{Intent, QueryType, TableCandidate};

use super::weights;

/// The table/column pair a search term matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchTarget<'a> {
    pub table_name: &'a str,
    pub column_name: Option<&'a str>,
}

impl<'a> MatchTarget<'a> {
    pub fn table(table_name: &'a str) -> Self {
        Self {
            table_name,
            column_name: None,
        }
    }

    pub fn column(table_name: &'a str, column_name: &'a str) -> Self {
        Self {
            table_name,
            column_name: Some(column_name),
        }
    }
}

/// A single adjustment to a relevance score.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreAdjustment {
    pub reason: &'static str,
    pub delta: f64,
}

/// A score with its breakdown.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RelevanceScore {
    pub total: f64,
    pub adjustments: Vec<ScoreAdjustment>,
}

impl RelevanceScore {
    fn add(&mut self, reason: &'static str, delta: f64) {
        self.total += delta;
        self.adjustments.push(ScoreAdjustment { reason, delta });
    }
}

/// Scores search hits against an intent.
///
/// Stateless; the same inputs always give the same score, and a score is
/// never negative (penalties belong to the bonus pass).
#[derive(Debug, Clone, Copy, Default)]
pub struct RelevanceScorer;

impl RelevanceScorer {
    pub fn new() -> Self {
        Self
    }

    /// Score one hit.
    #[must_use]
    pub fn score(&self, term: &str, target: MatchTarget<'_>, intent: &Intent) -> f64 {
        self.explain(term, target, intent).total
    }

    /// Score one hit, keeping the breakdown.
    #[must_use]
    pub fn explain(&self, term: &str, target: MatchTarget<'_>, intent: &Intent) -> RelevanceScore {
        let mut score = RelevanceScore::default();

        match heuristics::match_term(target.table_name, term) {
            TermMatch::Exact => score.add("Table name equals term", weights::TABLE_EXACT),
            TermMatch::Partial => score.add("Table name contains term", weights::TABLE_PARTIAL),
            TermMatch::None => {}
        }

        if let Some(column) = target.column_name {
            match heuristics::match_term(column, term) {
                TermMatch::Exact => score.add("Column name equals term", weights::COLUMN_EXACT),
                TermMatch::Partial => {
                    score.add("Column name contains term", weights::COLUMN_PARTIAL)
                }
                TermMatch::None => {}
            }
        }

        if heuristics::is_high_value_term(term) {
            score.add("High-value business term", weights::HIGH_VALUE_TERM);
        }

        if intent.query_type == QueryType::TopN && heuristics::is_usage_term(term) {
            score.add("Usage term in a ranking question", weights::TOP_N_USAGE);
        }

        score
    }
}

/// The end-of-discovery adjustments for one candidate.
///
/// Relationship bonuses and empty-sample penalties are applied by their
/// own phases and are not repeated here.
pub fn bonus_adjustments(candidate: &TableCandidate) -> RelevanceScore {
    let mut score = RelevanceScore::default();
    let rows = candidate.stats.row_count;

    if rows >= 1 {
        score.add("Table has rows", weights::HAS_ROWS);
    }
    if candidate
        .columns
        .iter()
        .any(|c| heuristics::is_usage_column(&c.name))
    {
        score.add("Usage columns present", weights::USAGE_COLUMNS);
    }
    if candidate
        .columns
        .iter()
        .any(|c| heuristics::is_user_column(&c.name))
    {
        score.add("User columns present", weights::USER_COLUMNS);
    }
    if rows > 0 && rows < weights::LOOKUP_ROW_LIMIT {
        score.add("Probable lookup table", weights::LOOKUP_PENALTY);
    }

    score
}

/// Discovery confidence from the best candidate score.
pub fn confidence(best_score: Option<f64>) -> f64 {
    match best_score {
        Some(best) if best > 0.0 => (best / weights::CONFIDENCE_SCALE).min(1.0),
        _ => 0.0,
    }
}
