//! Composition root for one question.
//!
//! ```text
//! question ─▶ intent ─▶ discovery ─▶ plan ─▶ execution ─▶ insights ─▶ Report
//! ```
//!
//! [`Orchestrator::run`] always returns a [`Report`]. Failed reconnaissance
//! or cancellation yields `success = false` with the error message and
//! whatever steps and data were gathered before the stop. A passed run
//! deadline is contained like any other call failure: remaining steps are
//! recorded as failed and the model calls fall back to fixed text.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::Settings;
use crate::deadline::{CallError, CallGuard};
use crate::discovery::{DiscoveryConfig, DiscoveryError, SchemaDiscoveryEngine};
use crate::executor::{ExecutionResult, ExecutorConfig, ProgressiveExecutor};
use crate::insights::InsightSynthesizer;
use crate::introspection::DatabaseIntrospection;
use crate::model::{Intent, Report, ReportMetadata, SchemaContext};
use crate::planner::{CompilerConfig, PlanCompiler};
use crate::understanding::{fallback, TextUnderstanding};

pub type OrchestratorResult<T> = Result<T, OrchestratorError>;

/// Errors that end a run early.
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error("run cancelled")]
    Cancelled,
}

/// Per-stage configuration plus run limits.
#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratorConfig {
    pub discovery: DiscoveryConfig,
    pub compiler: CompilerConfig,
    pub executor: ExecutorConfig,
    /// Deadline for any single external call.
    pub step_timeout: Duration,
    /// Deadline for the whole run.
    pub run_timeout: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            discovery: DiscoveryConfig::default(),
            compiler: CompilerConfig::default(),
            executor: ExecutorConfig::default(),
            step_timeout: Duration::from_secs(30),
            run_timeout: Duration::from_secs(300),
        }
    }
}

impl From<&Settings> for OrchestratorConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            discovery: settings.discovery_config(),
            compiler: settings.compiler_config(),
            executor: settings.executor_config(),
            step_timeout: settings.execution.step_timeout(),
            run_timeout: settings.execution.run_timeout(),
        }
    }
}

/// What a run had gathered when it stopped.
#[derive(Default)]
struct PartialRun {
    schema: Option<SchemaContext>,
    execution: Option<ExecutionResult>,
}

/// Sequences discovery, compilation, execution and synthesis.
///
/// Holds no per-run state, so one orchestrator can serve concurrent runs.
pub struct Orchestrator {
    understanding: Arc<dyn TextUnderstanding>,
    discovery: SchemaDiscoveryEngine,
    compiler: PlanCompiler,
    executor: ProgressiveExecutor,
    synthesizer: InsightSynthesizer,
    step_timeout: Duration,
    run_timeout: Duration,
}

impl Orchestrator {
    pub fn new(
        db: Arc<dyn DatabaseIntrospection>,
        understanding: Arc<dyn TextUnderstanding>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            discovery: SchemaDiscoveryEngine::new(db.clone(), config.discovery),
            compiler: PlanCompiler::new(config.compiler),
            executor: ProgressiveExecutor::new(db, understanding.clone(), config.executor),
            synthesizer: InsightSynthesizer::new(),
            understanding,
            step_timeout: config.step_timeout,
            run_timeout: config.run_timeout,
        }
    }

    /// Answer `query`.
    pub async fn run(&self, query: &str) -> Report {
        self.run_with_cancel(query, CancellationToken::new()).await
    }

    /// Answer `query`, stopping early if `cancel` fires.
    pub async fn run_with_cancel(&self, query: &str, cancel: CancellationToken) -> Report {
        let guard = CallGuard::new(self.step_timeout)
            .with_run_timeout(self.run_timeout)
            .with_cancellation(cancel);
        let started = Instant::now();
        let mut partial = PartialRun::default();

        info!(query, "analysis started");
        match self.try_run(query, &guard, &mut partial, started).await {
            Ok(report) => {
                info!(
                    steps = report.steps.len(),
                    rows = report.final_data.len(),
                    duration_ms = report.metadata.total_duration_ms,
                    "analysis complete"
                );
                report
            }
            Err(err) => {
                error!(error = %err, "analysis failed");
                self.failed_report(query, &err, partial, started)
            }
        }
    }

    async fn try_run(
        &self,
        query: &str,
        guard: &CallGuard,
        partial: &mut PartialRun,
        started: Instant,
    ) -> OrchestratorResult<Report> {
        let intent = self.intent(query, guard).await?;
        info!(
            intent = %intent.intent,
            query_type = %intent.query_type,
            terms = intent.search_terms.len(),
            "intent analyzed"
        );

        let schema = self.discovery.discover(&intent, guard).await?;
        partial.schema = Some(schema.clone());

        let abstract_steps = match guard
            .call(self.understanding.plan_steps(query, &intent, &schema))
            .await
        {
            Ok(steps) => steps,
            Err(CallError::Cancelled) => return Err(OrchestratorError::Cancelled),
            Err(e) => {
                warn!(error = %e, "plan proposal failed; compiling the fallback plan");
                Vec::new()
            }
        };

        let plan = self.compiler.compile(&intent, &abstract_steps, &schema);
        info!(steps = plan.len(), "plan compiled");

        let execution = self.executor.execute(&plan, guard).await;
        if execution.cancelled {
            partial.execution = Some(execution);
            return Err(OrchestratorError::Cancelled);
        }
        if guard.deadline_passed() {
            warn!(
                failed = execution.steps.iter().filter(|s| s.failed).count(),
                "run deadline passed during execution"
            );
        }

        let mut insights =
            self.synthesizer
                .synthesize(&execution.final_data, &execution.steps, &schema, query);
        self.synthesizer
            .narrate(self.understanding.as_ref(), guard, query, &mut insights)
            .await;

        let mut report = Report {
            original_query: query.to_string(),
            metadata: metadata(&schema, &execution, started),
            steps: execution.steps,
            final_data: execution.final_data,
            insights,
            success: true,
            error_message: None,
            final_answer: String::new(),
        };

        report.final_answer = match guard
            .call(self.understanding.summarize(query, &report))
            .await
        {
            Ok(answer) => answer,
            Err(e) => {
                warn!(error = %e, "answer summary failed; using generic text");
                fallback::summary(query, &report)
            }
        };
        report.metadata.total_duration_ms = elapsed_ms(started);

        Ok(report)
    }

    /// The model's intent, or the dictionary fallback.
    async fn intent(&self, query: &str, guard: &CallGuard) -> OrchestratorResult<Intent> {
        match guard.call(self.understanding.analyze_intent(query)).await {
            Ok(intent) => Ok(intent.normalized()),
            Err(CallError::Cancelled) => Err(OrchestratorError::Cancelled),
            Err(e) => {
                warn!(error = %e, "intent analysis failed; using dictionary fallback");
                Ok(fallback::fallback_intent(query))
            }
        }
    }

    fn failed_report(
        &self,
        query: &str,
        err: &OrchestratorError,
        partial: PartialRun,
        started: Instant,
    ) -> Report {
        let mut report = Report::failed(query, err.to_string());
        let schema = partial.schema.unwrap_or_default();

        if let Some(execution) = partial.execution {
            report.insights = self.synthesizer.synthesize(
                &execution.final_data,
                &execution.steps,
                &schema,
                query,
            );
            report.metadata = metadata(&schema, &execution, started);
            report.steps = execution.steps;
            report.final_data = execution.final_data;
        } else {
            report.metadata = ReportMetadata {
                tables_analyzed: schema.relevant_tables.len(),
                schemas_explored: schema.schemas_explored.clone(),
                total_steps: 0,
                total_duration_ms: elapsed_ms(started),
                discovery_confidence: schema.confidence_score,
            };
        }
        report
    }
}

fn metadata(
    schema: &SchemaContext,
    execution: &ExecutionResult,
    started: Instant,
) -> ReportMetadata {
    ReportMetadata {
        tables_analyzed: schema.relevant_tables.len(),
        schemas_explored: schema.schemas_explored.clone(),
        total_steps: execution.steps.len(),
        total_duration_ms: elapsed_ms(started),
        discovery_confidence: schema.confidence_score,
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
