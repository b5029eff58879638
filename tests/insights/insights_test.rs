// tests/insights/insights_test.rs
#[path = "../common/mod.rs"]
mod common;

use chrono::Utc;
use common::{column_rows, intent, record, ScriptedUnderstanding};
use delve::deadline::CallGuard;
use delve::insights::{InsightSynthesizer, MAX_METRICS};
use delve::model::{
    ExecutionStep, Insights, QueryType, Record, SchemaContext, StepType, TableCandidate,
    TableName, TableStats,
};
use serde_json::json;

fn executed(number: usize, step_type: StepType, sql: &str, rows: usize) -> ExecutionStep {
    ExecutionStep {
        step_number: number,
        step_type,
        sql_query: sql.to_string(),
        results: column_rows("Id", &vec![1; rows]),
        reasoning: String::new(),
        executed_at: Utc::now(),
        duration_ms: 10,
        failed: false,
    }
}

fn synthesize(records: &[Record], steps: &[ExecutionStep]) -> Insights {
    InsightSynthesizer::new().synthesize(records, steps, &SchemaContext::default(), "q")
}

fn metric(insights: &Insights, name: &str) -> serde_json::Value {
    insights
        .metrics
        .iter()
        .find(|m| m.name == name)
        .map(|m| m.value.clone())
        .unwrap_or_else(|| panic!("no metric named {}", name))
}

#[test]
fn test_concentration_pattern() {
    let insights = synthesize(&column_rows("Usage", &[100, 1, 1, 1, 1]), &[]);

    let pattern = insights
        .patterns
        .iter()
        .find(|p| p.starts_with("High concentration in Usage"))
        .unwrap();
    assert!(pattern.contains("96.2%"), "{}", pattern);
    assert!(pattern.contains("top 1 of 5"), "{}", pattern);
}

#[test]
fn test_no_concentration_when_even() {
    let insights = synthesize(&column_rows("Usage", &[10, 10, 10, 10, 10]), &[]);
    assert!(insights.patterns.is_empty());
}

#[test]
fn test_sparsity_pattern() {
    let insights = synthesize(&column_rows("Logins", &[0, 0, 0, 5, 0]), &[]);

    let pattern = insights
        .patterns
        .iter()
        .find(|p| p.starts_with("Sparse data in Logins"))
        .unwrap();
    assert!(pattern.contains("4/5"), "{}", pattern);
    assert!(pattern.contains("80.0%"), "{}", pattern);
}

#[test]
fn test_numeric_column_metrics() {
    let insights = synthesize(&column_rows("Usage", &[100, 1, 1, 1, 1]), &[]);

    assert_eq!(metric(&insights, "Total Records"), json!(5));
    assert_eq!(metric(&insights, "Usage Total"), json!(104.0));
    assert_eq!(metric(&insights, "Usage Average"), json!(20.8));
    assert_eq!(metric(&insights, "Usage Median"), json!(1.0));
    assert_eq!(metric(&insights, "Usage Range"), json!({ "min": 1.0, "max": 100.0 }));
}

#[test]
fn test_user_and_department_metrics_come_first() {
    let records = vec![
        record(&[("UserId", json!(1)), ("DepartmentName", json!("Ops"))]),
        record(&[("UserId", json!(1)), ("DepartmentName", json!("Ops"))]),
        record(&[("UserId", json!(2)), ("DepartmentName", json!("Sales"))]),
        record(&[("UserId", json!(3)), ("DepartmentName", json!(null))]),
    ];
    let insights = synthesize(&records, &[]);

    let names: Vec<&str> = insights.metrics.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(
        &names[..3],
        &["Total Records", "Unique Users", "Departments Represented"]
    );
    assert_eq!(metric(&insights, "Unique Users"), json!(3));
    assert_eq!(metric(&insights, "Departments Represented"), json!(2));
}

#[test]
fn test_metrics_capped_in_insertion_order() {
    let records = vec![record(&[
        ("Alpha", json!(1)),
        ("Beta", json!(2)),
        ("Gamma", json!(3)),
        ("UserId", json!(4)),
    ])];
    let insights = synthesize(&records, &[]);

    assert_eq!(insights.metrics.len(), MAX_METRICS);
    assert_eq!(insights.metrics[0].name, "Total Records");
    assert_eq!(insights.metrics[1].name, "Unique Users");
    assert_eq!(insights.metrics[2].name, "Alpha Total");
}

#[test]
fn test_structural_patterns() {
    let steps = vec![
        executed(1, StepType::DataExploration, "SELECT TOP (10) * FROM a", 2),
        executed(2, StepType::DataExploration, "SELECT TOP (10) * FROM b", 0),
        executed(3, StepType::DataExploration, "SELECT TOP (10) * FROM c", 1),
        executed(
            4,
            StepType::DataAnalysis,
            "SELECT TOP (5) t1.*, t2.* FROM a t1 INNER JOIN b t2 ON t1.[Id] = t2.[AId]",
            5,
        ),
    ];
    let insights = synthesize(&[], &steps);

    assert!(insights
        .patterns
        .iter()
        .any(|p| p.starts_with("Extensive exploration: 3 exploration steps")));
    assert!(insights
        .patterns
        .contains(&"Multi-table analysis: 1 step(s) combined tables with joins".to_string()));
}

#[test]
fn test_observations_describe_the_run() {
    let mut users = TableCandidate::new(TableName::new("dbo", "Users"), 7.5);
    users.stats = TableStats {
        row_count: 50,
        ..Default::default()
    };
    let schema = SchemaContext {
        relevant_tables: vec![users],
        confidence_score: 0.75,
        ..Default::default()
    };
    let steps = vec![
        executed(1, StepType::DataExploration, "SELECT 1", 0),
        executed(2, StepType::FinalQuery, "SELECT 2", 5),
    ];

    let insights = InsightSynthesizer::new().synthesize(&[], &steps, &schema, "q");

    assert_eq!(
        insights.observations,
        vec![
            "Executed 2 step(s) in 20 ms",
            "Records per step ranged from 0 to 5",
            "Analyzed 1 table(s) containing 50 row(s)",
            "Schema discovery confidence: 75%",
        ]
    );
}

#[tokio::test]
async fn test_narration_from_model() {
    let understanding = ScriptedUnderstanding::new(intent(QueryType::Analysis, &[]));
    let mut insights = synthesize(&column_rows("Usage", &[3, 4]), &[]);

    InsightSynthesizer::new()
        .narrate(&understanding, &CallGuard::unbounded(), "q", &mut insights)
        .await;

    assert_eq!(insights.summary, format!("{} metrics computed", insights.metrics.len()));
    assert_eq!(insights.recommendations, vec!["Keep going"]);
}

#[tokio::test]
async fn test_narration_falls_back_to_fixed_text() {
    let understanding = ScriptedUnderstanding::broken();
    let mut insights = synthesize(&[], &[]);

    InsightSynthesizer::new()
        .narrate(&understanding, &CallGuard::unbounded(), "q", &mut insights)
        .await;

    assert!(!insights.summary.is_empty());
    assert_eq!(insights.recommendations.len(), 3);
}
