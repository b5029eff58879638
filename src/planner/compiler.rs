//! Abstract steps → compiled plan.

use tracing::{debug, warn};

use super::sql::{self, RankedJoin};
use crate::heuristics;
use crate::model::{
    AbstractStep, Intent, ParamValue, Params, Plan, PlanStep, SchemaContext, StepType,
    TableCandidate, TableName,
};

/// Defaults applied while compiling.
#[derive(Debug, Clone, PartialEq)]
pub struct CompilerConfig {
    pub default_schema: String,
    /// Answer row limit when the intent names none.
    pub default_limit: i64,
    /// Row limit for exploration samples.
    pub exploration_limit: i64,
    /// Row limit for join probes.
    pub join_probe_limit: i64,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            default_schema: "dbo".to_string(),
            default_limit: 20,
            exploration_limit: 10,
            join_probe_limit: 5,
        }
    }
}

/// Abstract actions the compiler understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Exploration,
    Analysis,
    QueryBuilding,
    FinalExecution,
}

impl Action {
    fn parse(action: &str) -> Option<Self> {
        let normalized = action.trim().to_lowercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "exploration" | "explore" | "data_exploration" => Some(Action::Exploration),
            "analysis" | "analyze" | "data_analysis" => Some(Action::Analysis),
            "query_building" | "query_construction" | "build_query" => {
                Some(Action::QueryBuilding)
            }
            "final_execution" | "final_query" | "final" => Some(Action::FinalExecution),
            _ => None,
        }
    }
}

/// Compiles abstract plans into executable ones.
///
/// Compilation never fails. Unknown actions are dropped, a missing
/// exploration or final step is synthesized, and an empty result falls
/// back to a fixed sample-then-answer plan. Output depends only on the
/// inputs.
#[derive(Debug, Clone, Default)]
pub struct PlanCompiler {
    config: CompilerConfig,
}

impl PlanCompiler {
    pub fn new(config: CompilerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    /// Compile `abstract_steps` for `intent` over `schema`.
    pub fn compile(
        &self,
        intent: &Intent,
        abstract_steps: &[AbstractStep],
        schema: &SchemaContext,
    ) -> Plan {
        let mut ordered: Vec<&AbstractStep> = abstract_steps.iter().collect();
        ordered.sort_by_key(|s| s.order);

        let mut steps: Vec<PlanStep> = ordered
            .into_iter()
            .filter_map(|step| self.translate(step, intent, schema))
            .collect();

        if steps.is_empty() {
            debug!("abstract plan empty or untranslatable; using fallback plan");
            steps = self.fallback_steps(intent, schema);
        }

        if !steps.iter().any(|s| s.step_type == StepType::DataExploration) {
            let exploration =
                self.exploration_of_top(schema, "Synthesized exploration of the top-ranked table");
            steps.insert(0, exploration);
        }

        if !steps.iter().any(|s| s.step_type.is_terminal()) {
            steps.push(self.final_step(intent, schema, "Answer the question", Params::new()));
        }

        for (i, step) in steps.iter_mut().enumerate() {
            step.order = i + 1;
        }

        Plan::new(steps)
    }

    fn translate(
        &self,
        step: &AbstractStep,
        intent: &Intent,
        schema: &SchemaContext,
    ) -> Option<PlanStep> {
        let Some(action) = Action::parse(&step.action) else {
            warn!(action = %step.action, order = step.order, "dropping step with unknown action");
            return None;
        };

        let tables = self.resolve_tables(&step.parameters, schema);
        let operation = step.parameters.str_or("operation", "").to_lowercase();

        let mut compiled = match action {
            Action::Exploration => self.exploration(&tables, &operation, &step.parameters, schema),
            Action::Analysis => self.analysis(&tables, &operation, schema),
            Action::QueryBuilding => self.query_building(&tables, schema),
            Action::FinalExecution => {
                self.final_step(intent, schema, &step.description, step.parameters.clone())
            }
        };

        if !step.description.trim().is_empty() {
            compiled.description = step.description.clone();
        }
        if !step.expected_outcome.trim().is_empty() {
            compiled.purpose = step.expected_outcome.clone();
        }
        compiled.reasoning = step.reasoning.clone();
        compiled.optional = compiled.optional || step.parameters.bool_or("optional", false);

        // Keep the model's parameters, with table names resolved.
        let mut parameters = step.parameters.clone();
        for (key, value) in compiled.parameters.iter() {
            parameters.insert(key.clone(), value.clone());
        }
        compiled.parameters = parameters;

        Some(compiled)
    }

    /// Named tables, resolved against discovered candidates where possible.
    fn resolve_tables(&self, parameters: &Params, schema: &SchemaContext) -> Vec<TableName> {
        parameters
            .tables()
            .iter()
            .map(|name| {
                schema
                    .resolve(name, &self.config.default_schema)
                    .map(|candidate| candidate.name.clone())
                    .unwrap_or_else(|| TableName::parse(name, &self.config.default_schema))
            })
            .collect()
    }

    fn exploration(
        &self,
        tables: &[TableName],
        operation: &str,
        parameters: &Params,
        schema: &SchemaContext,
    ) -> PlanStep {
        if operation == "describe" && !tables.is_empty() {
            let names: Vec<String> = tables.iter().map(|t| t.to_string()).collect();
            return PlanStep {
                order: 0,
                step_type: StepType::SchemaAnalysis,
                description: format!("Describe the structure of {}", names.join(", ")),
                sql_template: Some(sql::introspection_marker(&format!(
                    "describe {}",
                    names.join(", ")
                ))),
                parameters: table_params(tables),
                purpose: "Learn columns, keys and size before querying".to_string(),
                reasoning: String::new(),
                optional: false,
            };
        }

        let target = tables
            .first()
            .cloned()
            .or_else(|| schema.top_table().map(|t| t.name.clone()));
        let limit = parameters.int_or("limit", self.config.exploration_limit);

        match target {
            Some(table) => self.sample_step(&table, limit),
            None => no_op(
                StepType::DataExploration,
                "Explore sample data",
                "no table available to sample",
            ),
        }
    }

    fn analysis(&self, tables: &[TableName], operation: &str, schema: &SchemaContext) -> PlanStep {
        if operation == "join" && tables.len() >= 2 {
            let (left, right) = (&tables[0], &tables[1]);
            let (left_col, right_col) = self.join_columns(left, right, schema);
            return PlanStep {
                order: 0,
                step_type: StepType::DataAnalysis,
                description: format!("Test the join between {} and {}", left, right),
                sql_template: Some(sql::join_probe(
                    left,
                    right,
                    &left_col,
                    &right_col,
                    self.config.join_probe_limit,
                )),
                parameters: table_params(&tables[..2])
                    .with("leftColumn", left_col)
                    .with("rightColumn", right_col),
                purpose: "Verify that the tables relate as expected".to_string(),
                reasoning: String::new(),
                optional: false,
            };
        }

        match first_or_top(tables, schema) {
            Some(table) => PlanStep {
                order: 0,
                step_type: StepType::DataAnalysis,
                description: format!("Summarize {}", table),
                sql_template: Some(sql::count_summary(&table)),
                parameters: table_params(std::slice::from_ref(&table)),
                purpose: "Measure the size of the data involved".to_string(),
                reasoning: String::new(),
                optional: false,
            },
            None => no_op(StepType::DataAnalysis, "Analyze data", "no table available to analyze"),
        }
    }

    fn query_building(&self, tables: &[TableName], schema: &SchemaContext) -> PlanStep {
        let Some(table) = first_or_top(tables, schema) else {
            return no_op(
                StepType::QueryConstruction,
                "Build intermediate query",
                "no table available to aggregate",
            );
        };

        let group_column = schema.find_exact(&table).and_then(|candidate| {
            candidate
                .columns
                .iter()
                .find(|c| c.is_foreign_key_candidate)
                .map(|c| c.name.clone())
        });

        let sql_template = match &group_column {
            Some(column) => sql::grouped_count(&table, column, self.config.default_limit),
            None => sql::count_summary(&table),
        };

        PlanStep {
            order: 0,
            step_type: StepType::QueryConstruction,
            description: format!("Aggregate {}", table),
            sql_template: Some(sql_template),
            parameters: table_params(std::slice::from_ref(&table)),
            purpose: "Build intermediate aggregates for the final answer".to_string(),
            reasoning: String::new(),
            optional: false,
        }
    }

    /// The comprehensive answer query.
    fn final_step(
        &self,
        intent: &Intent,
        schema: &SchemaContext,
        description: &str,
        parameters: Params,
    ) -> PlanStep {
        let limit = parameters.int_or("limit", intent.limit_or(self.config.default_limit));
        let limit = if limit > 0 { limit } else { self.config.default_limit };
        let description = if description.trim().is_empty() {
            "Answer the question"
        } else {
            description
        };

        let user = schema
            .relevant_tables
            .iter()
            .find(|t| heuristics::is_user_table(&t.name.table));
        let usage = schema.relevant_tables.iter().find(|t| {
            heuristics::is_usage_table(&t.name.table)
                && user.map_or(true, |u| u.name.key() != t.name.key())
        });

        let (sql_template, tables) = match (user, usage) {
            (Some(user), Some(usage)) => (
                ranked_join(user, usage, limit).to_sql(),
                vec![user.name.clone(), usage.name.clone()],
            ),
            _ => match schema.top_table() {
                Some(best) => (
                    sql::select_top(
                        &best.name,
                        limit,
                        best.primary_key().map(|c| c.name.as_str()),
                    ),
                    vec![best.name.clone()],
                ),
                None => (
                    sql::introspection_marker("no table available to answer from"),
                    Vec::new(),
                ),
            },
        };

        let mut params = table_params(&tables);
        params.insert("limit", limit);

        PlanStep {
            order: 0,
            step_type: StepType::FinalQuery,
            description: description.to_string(),
            sql_template: Some(sql_template),
            parameters: params,
            purpose: "Produce the final answer".to_string(),
            reasoning: String::new(),
            optional: false,
        }
    }

    /// Sample the top table, then answer.
    fn fallback_steps(&self, intent: &Intent, schema: &SchemaContext) -> Vec<PlanStep> {
        vec![
            self.exploration_of_top(schema, "Sample the most relevant table"),
            self.final_step(intent, schema, "Answer the question", Params::new()),
        ]
    }

    fn exploration_of_top(&self, schema: &SchemaContext, description: &str) -> PlanStep {
        let mut step = match schema.top_table() {
            Some(top) => self.sample_step(&top.name, self.config.exploration_limit),
            None => no_op(
                StepType::DataExploration,
                "Explore sample data",
                "no table available to sample",
            ),
        };
        step.description = description.to_string();
        step
    }

    fn sample_step(&self, table: &TableName, limit: i64) -> PlanStep {
        let limit = if limit > 0 { limit } else { self.config.exploration_limit };
        PlanStep {
            order: 0,
            step_type: StepType::DataExploration,
            description: format!("Sample rows from {}", table),
            sql_template: Some(sql::select_top(table, limit, None)),
            parameters: table_params(std::slice::from_ref(table)).with("limit", limit),
            purpose: "See what the data looks like".to_string(),
            reasoning: String::new(),
            optional: false,
        }
    }

    /// Pick join columns for two tables.
    ///
    /// A shared `<Entity>Id` column wins; then `left.Id = right.<Left>Id`
    /// and the mirror image; otherwise `Id` on both sides.
    fn join_columns(
        &self,
        left: &TableName,
        right: &TableName,
        schema: &SchemaContext,
    ) -> (String, String) {
        let left_cols = schema
            .find_exact(left)
            .map(|c| c.column_names())
            .unwrap_or_default();
        let right_cols = schema
            .find_exact(right)
            .map(|c| c.column_names())
            .unwrap_or_default();

        if let Some(shared) = heuristics::shared_join_column(&left_cols, &right_cols) {
            return (shared.clone(), shared);
        }

        let has = |cols: &[String], name: &str| cols.iter().any(|c| c.eq_ignore_ascii_case(name));

        let left_key = heuristics::key_column_for(&left.table);
        if has(&right_cols, &left_key) {
            return ("Id".to_string(), left_key);
        }
        let right_key = heuristics::key_column_for(&right.table);
        if has(&left_cols, &right_key) {
            return (right_key, "Id".to_string());
        }

        ("Id".to_string(), "Id".to_string())
    }
}

fn ranked_join<'a>(
    user: &'a TableCandidate,
    usage: &'a TableCandidate,
    limit: i64,
) -> RankedJoin<'a> {
    let (user_key, usage_key) = user_usage_keys(user, usage);

    let label_columns: Vec<&str> = user
        .columns
        .iter()
        .filter(|c| heuristics::is_display_column(&c.name))
        .map(|c| c.name.as_str())
        .filter(|name| !name.eq_ignore_ascii_case(user_key))
        .take(2)
        .collect();

    let metric_column = usage
        .columns
        .iter()
        .filter(|c| c.is_numeric() && !c.is_primary_key_candidate && !c.is_foreign_key_candidate)
        .find(|c| heuristics::is_usage_column(&c.name))
        .map(|c| c.name.as_str());

    RankedJoin {
        user_table: &user.name,
        usage_table: &usage.name,
        user_key,
        usage_key,
        label_columns,
        metric_column,
        limit,
    }
}

/// Join keys between a user table and a usage table.
///
/// The usage side carries the conventional `UserId` column; the user side
/// joins on that same column when it has it, otherwise on `Id`.
fn user_usage_keys<'a>(user: &'a TableCandidate, usage: &'a TableCandidate) -> (&'a str, &'a str) {
    const ID: &str = "Id";
    const USER_ID: &str = "UserId";

    let conventional = heuristics::key_column_for(&user.name.table);
    let usage_key = usage
        .column(&conventional)
        .or_else(|| usage.column(USER_ID))
        .map(|c| c.name.as_str());

    match usage_key {
        Some(key) => match user.column(key) {
            Some(shared) if !user.has_column(ID) => (shared.name.as_str(), key),
            _ => (user.column(ID).map_or(ID, |c| c.name.as_str()), key),
        },
        None => {
            let user_cols = user.column_names();
            let usage_cols = usage.column_names();
            match heuristics::shared_join_column(&user_cols, &usage_cols) {
                Some(shared) => (
                    user.column(&shared).map_or(ID, |c| c.name.as_str()),
                    usage.column(&shared).map_or(ID, |c| c.name.as_str()),
                ),
                None => (ID, USER_ID),
            }
        }
    }
}

fn first_or_top(tables: &[TableName], schema: &SchemaContext) -> Option<TableName> {
    tables
        .first()
        .cloned()
        .or_else(|| schema.top_table().map(|t| t.name.clone()))
}

fn table_params(tables: &[TableName]) -> Params {
    let names: Vec<String> = tables.iter().map(|t| t.to_string()).collect();
    Params::new().with("tables", ParamValue::from(names))
}

/// A step that runs nothing and returns no rows.
fn no_op(step_type: StepType, description: &str, note: &str) -> PlanStep {
    PlanStep {
        order: 0,
        step_type,
        description: description.to_string(),
        sql_template: Some(sql::introspection_marker(note)),
        parameters: Params::new(),
        purpose: "Nothing to query".to_string(),
        reasoning: String::new(),
        optional: true,
    }
}
