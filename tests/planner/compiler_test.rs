// tests/planner/compiler_test.rs
#[path = "../common/mod.rs"]
mod common;

use common::{intent, top_n_intent};
use delve::model::{
    AbstractStep, ColumnFact, Params, QueryType, SchemaContext, StepType, TableCandidate,
    TableName,
};
use delve::planner::{CompilerConfig, PlanCompiler};

fn candidate(schema: &str, table: &str, score: f64, columns: &[(&str, &str)]) -> TableCandidate {
    let mut candidate = TableCandidate::new(TableName::new(schema, table), score);
    candidate.columns = columns
        .iter()
        .map(|(name, ty)| ColumnFact::new(*name, *ty, false, None))
        .collect();
    candidate.analyzed = true;
    candidate
}

fn user_usage_schema() -> SchemaContext {
    SchemaContext {
        relevant_tables: vec![
            candidate(
                "dbo",
                "AppUsage",
                41.0,
                &[
                    ("Id", "int"),
                    ("UserId", "int"),
                    ("AppName", "nvarchar"),
                    ("UsageMinutes", "int"),
                    ("LoginCount", "int"),
                ],
            ),
            candidate(
                "dbo",
                "Users",
                25.0,
                &[
                    ("Id", "int"),
                    ("UserName", "nvarchar"),
                    ("Email", "nvarchar"),
                    ("DepartmentName", "nvarchar"),
                ],
            ),
        ],
        schemas_explored: vec!["dbo".to_string()],
        search_terms: vec!["user".to_string(), "usage".to_string()],
        confidence_score: 1.0,
    }
}

fn tables(names: &[&str]) -> Params {
    Params::new().with(
        "tables",
        names.iter().map(|n| n.to_string()).collect::<Vec<_>>(),
    )
}

fn compiler() -> PlanCompiler {
    PlanCompiler::new(CompilerConfig::default())
}

#[test]
fn test_empty_abstract_plan_uses_fallback() {
    let plan = compiler().compile(&top_n_intent(5, &["user"]), &[], &user_usage_schema());

    assert_eq!(plan.len(), 2);
    assert_eq!(plan.steps[0].step_type, StepType::DataExploration);
    assert_eq!(plan.steps[1].step_type, StepType::FinalQuery);

    insta::assert_snapshot!(
        plan.steps[0].sql_template.as_deref().unwrap(),
        @"SELECT TOP (10) * FROM [dbo].[AppUsage]"
    );
}

#[test]
fn test_final_query_ranks_users_by_usage() {
    let plan = compiler().compile(&top_n_intent(5, &["user"]), &[], &user_usage_schema());
    let last = plan.steps.last().unwrap();

    insta::assert_snapshot!(
        last.sql_template.as_deref().unwrap(),
        @"SELECT TOP (5) u.[Id], u.[UserName], u.[Email], COUNT(*) AS [UsageCount], SUM(x.[UsageMinutes]) AS [TotalUsage] FROM [dbo].[Users] u INNER JOIN [dbo].[AppUsage] x ON u.[Id] = x.[UserId] GROUP BY u.[Id], u.[UserName], u.[Email] ORDER BY [TotalUsage] DESC"
    );
    assert_eq!(last.parameters.int_or("limit", 0), 5);
    assert_eq!(last.parameters.tables(), vec!["dbo.Users", "dbo.AppUsage"]);
}

#[test]
fn test_orders_are_contiguous_after_sorting() {
    let steps = vec![
        AbstractStep::new(10, "final_execution", Params::new()),
        AbstractStep::new(3, "exploration", tables(&["Users"])),
        AbstractStep::new(7, "analysis", tables(&["AppUsage"])),
    ];
    let plan = compiler().compile(&intent(QueryType::Analysis, &[]), &steps, &user_usage_schema());

    let orders: Vec<usize> = plan.steps.iter().map(|s| s.order).collect();
    let kinds: Vec<StepType> = plan.steps.iter().map(|s| s.step_type).collect();
    assert_eq!(orders, vec![1, 2, 3]);
    assert_eq!(
        kinds,
        vec![
            StepType::DataExploration,
            StepType::DataAnalysis,
            StepType::FinalQuery
        ]
    );
    insta::assert_snapshot!(
        plan.steps[1].sql_template.as_deref().unwrap(),
        @"SELECT COUNT(*) AS [RecordCount] FROM [dbo].[AppUsage]"
    );
}

#[test]
fn test_unknown_actions_are_dropped() {
    let steps = vec![
        AbstractStep::new(1, "exploration", Params::new()),
        AbstractStep::new(2, "interpretive_dance", Params::new()),
        AbstractStep::new(3, "final_execution", Params::new()),
    ];
    let plan = compiler().compile(&intent(QueryType::Analysis, &[]), &steps, &user_usage_schema());

    assert_eq!(plan.len(), 2);
    assert_eq!(plan.steps[1].order, 2);
}

#[test]
fn test_action_aliases() {
    let steps = vec![
        AbstractStep::new(1, "Data-Exploration", Params::new()),
        AbstractStep::new(2, "analyze", Params::new()),
        AbstractStep::new(3, "build query", Params::new()),
        AbstractStep::new(4, "FINAL", Params::new()),
    ];
    let plan = compiler().compile(&intent(QueryType::Analysis, &[]), &steps, &user_usage_schema());

    assert_eq!(plan.len(), 4);
    assert_eq!(plan.count(StepType::QueryConstruction), 1);
}

#[test]
fn test_missing_exploration_is_inserted_first() {
    let steps = vec![
        AbstractStep::new(1, "analysis", Params::new()),
        AbstractStep::new(2, "final_execution", Params::new()),
    ];
    let plan = compiler().compile(&intent(QueryType::Analysis, &[]), &steps, &user_usage_schema());

    assert_eq!(plan.len(), 3);
    assert_eq!(plan.steps[0].step_type, StepType::DataExploration);
    assert_eq!(
        plan.steps[0].description,
        "Synthesized exploration of the top-ranked table"
    );
    assert_eq!(plan.steps[0].order, 1);
}

#[test]
fn test_missing_final_step_is_appended() {
    let steps = vec![AbstractStep::new(1, "exploration", tables(&["Users"]))];
    let plan = compiler().compile(&intent(QueryType::Analysis, &[]), &steps, &user_usage_schema());

    assert_eq!(plan.len(), 2);
    assert_eq!(plan.steps[1].step_type, StepType::FinalQuery);
    assert_eq!(plan.count(StepType::FinalQuery), 1);
}

#[test]
fn test_describe_becomes_schema_analysis() {
    let steps = vec![AbstractStep::new(
        1,
        "exploration",
        tables(&["Users"]).with("operation", "describe"),
    )];
    let plan = compiler().compile(&intent(QueryType::Analysis, &[]), &steps, &user_usage_schema());

    let describe = plan
        .steps
        .iter()
        .find(|s| s.step_type == StepType::SchemaAnalysis)
        .unwrap();
    assert!(describe.is_introspection_only());
    assert_eq!(describe.parameters.tables(), vec!["dbo.Users"]);
    assert_eq!(describe.parameters.str_or("operation", ""), "describe");

    // A describe step is not sampling, so an exploration is still synthesized.
    assert_eq!(plan.steps[0].step_type, StepType::DataExploration);
    assert_eq!(plan.len(), 3);
}

#[test]
fn test_join_probe_infers_key_columns() {
    let steps = vec![
        AbstractStep::new(1, "exploration", Params::new()),
        AbstractStep::new(2, "analysis", tables(&["Users", "AppUsage"]).with("operation", "join")),
    ];
    let plan = compiler().compile(&intent(QueryType::Analysis, &[]), &steps, &user_usage_schema());
    let probe = &plan.steps[1];

    assert_eq!(probe.step_type, StepType::DataAnalysis);
    insta::assert_snapshot!(
        probe.sql_template.as_deref().unwrap(),
        @"SELECT TOP (5) t1.*, t2.* FROM [dbo].[Users] t1 INNER JOIN [dbo].[AppUsage] t2 ON t1.[Id] = t2.[UserId]"
    );
    assert_eq!(probe.parameters.str_or("leftColumn", ""), "Id");
    assert_eq!(probe.parameters.str_or("rightColumn", ""), "UserId");
}

#[test]
fn test_query_building_groups_by_foreign_key() {
    let steps = vec![AbstractStep::new(1, "query_building", tables(&["AppUsage"]))];
    let plan = compiler().compile(&intent(QueryType::Analysis, &[]), &steps, &user_usage_schema());
    let step = plan
        .steps
        .iter()
        .find(|s| s.step_type == StepType::QueryConstruction)
        .unwrap();

    insta::assert_snapshot!(
        step.sql_template.as_deref().unwrap(),
        @"SELECT TOP (20) [UserId], COUNT(*) AS [RecordCount] FROM [dbo].[AppUsage] GROUP BY [UserId] ORDER BY COUNT(*) DESC"
    );
}

#[test]
fn test_model_fields_carry_over() {
    let mut step = AbstractStep::new(1, "exploration", tables(&["Users"]).with("optional", true))
        .with_description("Look at users");
    step.reasoning = "Users anchor the answer".to_string();
    step.expected_outcome = "A handful of user rows".to_string();

    let plan = compiler().compile(&intent(QueryType::Analysis, &[]), &[step], &user_usage_schema());
    let first = &plan.steps[0];

    assert_eq!(first.description, "Look at users");
    assert_eq!(first.reasoning, "Users anchor the answer");
    assert_eq!(first.purpose, "A handful of user rows");
    assert!(first.optional);
    insta::assert_snapshot!(
        first.sql_template.as_deref().unwrap(),
        @"SELECT TOP (10) * FROM [dbo].[Users]"
    );
}

#[test]
fn test_final_step_limit_parameter_wins() {
    let steps = vec![
        AbstractStep::new(1, "exploration", Params::new()),
        AbstractStep::new(2, "final_execution", Params::new().with("limit", 3i64)),
    ];
    let plan = compiler().compile(&top_n_intent(50, &["user"]), &steps, &user_usage_schema());

    let sql = plan.steps[1].sql_template.as_deref().unwrap();
    assert!(sql.starts_with("SELECT TOP (3) "), "{}", sql);
}

#[test]
fn test_final_step_without_user_usage_pair() {
    let schema = SchemaContext {
        relevant_tables: vec![candidate(
            "sales",
            "Invoices",
            9.0,
            &[("Id", "int"), ("Amount", "decimal(10,2)")],
        )],
        ..Default::default()
    };
    let plan = compiler().compile(&intent(QueryType::Sum, &["invoice"]), &[], &schema);

    insta::assert_snapshot!(
        plan.steps[1].sql_template.as_deref().unwrap(),
        @"SELECT TOP (20) * FROM [sales].[Invoices] ORDER BY [Id]"
    );
}

#[test]
fn test_empty_schema_compiles_to_no_ops() {
    let plan = compiler().compile(
        &intent(QueryType::Analysis, &[]),
        &[],
        &SchemaContext::default(),
    );

    assert_eq!(plan.len(), 2);
    assert!(plan.steps.iter().all(|s| s.is_introspection_only()));
    assert_eq!(plan.steps[1].step_type, StepType::FinalQuery);
}

#[test]
fn test_compilation_is_deterministic() {
    let steps = vec![
        AbstractStep::new(2, "analysis", tables(&["Users", "AppUsage"]).with("operation", "join")),
        AbstractStep::new(1, "explore", tables(&["AppUsage"]).with("limit", 25i64)),
        AbstractStep::new(2, "query_building", Params::new()),
        AbstractStep::new(9, "bogus", Params::new()),
    ];
    let intent = top_n_intent(7, &["user", "usage"]);
    let schema = user_usage_schema();

    let first = compiler().compile(&intent, &steps, &schema);
    let second = compiler().compile(&intent, &steps, &schema);
    assert_eq!(first, second);
    assert_eq!(first.steps[0].parameters.int_or("limit", 0), 25);
}

#[test]
fn test_qualified_table_keeps_its_schema() {
    let schema = SchemaContext {
        relevant_tables: vec![candidate("app", "Users", 12.0, &[("Id", "int")])],
        ..Default::default()
    };
    let qualified = vec![AbstractStep::new(
        1,
        "exploration",
        tables(&["sales.Users"]).with("operation", "sample"),
    )];
    let bare = vec![AbstractStep::new(
        1,
        "exploration",
        tables(&["Users"]).with("operation", "sample"),
    )];

    let plan = compiler().compile(&intent(QueryType::Analysis, &[]), &qualified, &schema);
    insta::assert_snapshot!(
        plan.steps[0].sql_template.as_deref().unwrap(),
        @"SELECT TOP (10) * FROM [sales].[Users]"
    );

    let plan = compiler().compile(&intent(QueryType::Analysis, &[]), &bare, &schema);
    insta::assert_snapshot!(
        plan.steps[0].sql_template.as_deref().unwrap(),
        @"SELECT TOP (10) * FROM [app].[Users]"
    );
}

#[test]
fn test_no_op_step_stays_optional() {
    let steps = vec![AbstractStep::new(
        1,
        "query_building",
        Params::new().with("optional", false),
    )];
    let plan = compiler().compile(
        &intent(QueryType::Analysis, &[]),
        &steps,
        &SchemaContext::default(),
    );

    let step = plan
        .steps
        .iter()
        .find(|s| s.step_type == StepType::QueryConstruction)
        .unwrap();
    assert!(step.is_introspection_only());
    assert!(step.optional);
}
