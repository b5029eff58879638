// tests/discovery/scorer_test.rs
#[path = "../common/mod.rs"]
mod common;

use common::{intent, top_n_intent};
use delve::discovery::{bonus_adjustments, confidence, MatchTarget, RelevanceScorer};
use delve::model::{ColumnFact, QueryType, TableCandidate, TableName, TableStats};

#[test]
fn test_exact_table_match_outscores_partial() {
    let scorer = RelevanceScorer::new();
    let intent = intent(QueryType::Analysis, &["invoice"]);

    let exact = scorer.score("invoice", MatchTarget::table("Invoice"), &intent);
    let partial = scorer.score("invoice", MatchTarget::table("InvoiceLines"), &intent);

    assert_eq!(exact, 10.0);
    assert_eq!(partial, 7.0);
}

#[test]
fn test_column_hit_adds_to_table_match() {
    let scorer = RelevanceScorer::new();
    let intent = intent(QueryType::Analysis, &["invoice"]);

    // Table partial (7) + column exact (5)
    let score = scorer.score("invoice", MatchTarget::column("InvoiceLines", "Invoice"), &intent);
    assert_eq!(score, 12.0);

    // Column partial only
    let score = scorer.score("invoice", MatchTarget::column("Lines", "InvoiceNo"), &intent);
    assert_eq!(score, 3.0);
}

#[test]
fn test_high_value_and_ranking_bonuses_stack() {
    let scorer = RelevanceScorer::new();

    let analysis = intent(QueryType::Analysis, &["usage"]);
    let ranking = top_n_intent(10, &["usage"]);
    let target = MatchTarget::table("AppUsage");

    // partial 7 + high-value 2
    assert_eq!(scorer.score("usage", target, &analysis), 9.0);
    // ... + usage term in a ranking question 3
    assert_eq!(scorer.score("usage", target, &ranking), 12.0);

    let explained = scorer.explain("usage", target, &ranking);
    assert_eq!(explained.adjustments.len(), 3);
    let sum: f64 = explained.adjustments.iter().map(|a| a.delta).sum();
    assert_eq!(sum, explained.total);
}

#[test]
fn test_ranking_bonus_needs_usage_term() {
    let scorer = RelevanceScorer::new();
    let ranking = top_n_intent(5, &["customer"]);

    // partial 7 + high-value 2, no ranking bonus
    let score = scorer.score("customer", MatchTarget::table("Customers"), &ranking);
    assert_eq!(score, 9.0);
}

#[test]
fn test_scores_are_never_negative() {
    let scorer = RelevanceScorer::new();
    let terms = ["", "user", "usage", "zzz", "Role", "  login  "];
    let targets = [
        MatchTarget::table(""),
        MatchTarget::table("Users"),
        MatchTarget::column("AppUsage", "LoginCount"),
        MatchTarget::column("Roles", ""),
        MatchTarget::column("Invoices", "Amount"),
    ];

    for query_type in [QueryType::TopN, QueryType::Count, QueryType::Analysis] {
        let intent = intent(query_type, &[]);
        for term in terms {
            for target in targets {
                let score = scorer.score(term, target, &intent);
                assert!(score >= 0.0, "{} on {:?} scored {}", term, target, score);
            }
        }
    }
}

#[test]
fn test_unrelated_hit_scores_zero() {
    let scorer = RelevanceScorer::new();
    let intent = intent(QueryType::Analysis, &["invoice"]);
    assert_eq!(scorer.score("invoice", MatchTarget::column("Orders", "Total"), &intent), 0.0);
}

fn candidate(rows: i64, columns: &[&str]) -> TableCandidate {
    let mut candidate = TableCandidate::new(TableName::new("dbo", "T"), 0.0);
    candidate.columns = columns
        .iter()
        .map(|c| ColumnFact::new(*c, "int", false, None))
        .collect();
    candidate.stats = TableStats {
        row_count: rows,
        ..Default::default()
    };
    candidate
}

#[test]
fn test_bonus_for_populated_usage_table() {
    let bonus = bonus_adjustments(&candidate(500, &["Id", "UserId", "LoginCount"]));
    // rows 2 + usage columns 3 + user columns 2
    assert_eq!(bonus.total, 7.0);
}

#[test]
fn test_lookup_table_penalty() {
    let bonus = bonus_adjustments(&candidate(4, &["Id", "Name"]));
    // rows 2 + lookup -1
    assert_eq!(bonus.total, 1.0);

    let empty = bonus_adjustments(&candidate(0, &["Id", "Name"]));
    assert_eq!(empty.total, 0.0);
    assert!(empty.adjustments.is_empty());
}

#[test]
fn test_confidence_scale() {
    assert_eq!(confidence(None), 0.0);
    assert_eq!(confidence(Some(5.0)), 0.5);
    assert_eq!(confidence(Some(10.0)), 1.0);
    assert_eq!(confidence(Some(41.0)), 1.0);
}
