//! Understanding without a language model.

use async_trait::async_trait;

use super::{fallback, LanguageModelResult, Narrative, TextUnderstanding};
use crate::model::{AbstractStep, Insights, Intent, Report, SchemaContext};

/// [`TextUnderstanding`] built purely from the fallback rules.
///
/// It proposes no abstract steps, so the compiler always produces its
/// default sample-then-answer plan.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineUnderstanding;

impl OfflineUnderstanding {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TextUnderstanding for OfflineUnderstanding {
    async fn analyze_intent(&self, query: &str) -> LanguageModelResult<Intent> {
        Ok(fallback::fallback_intent(query))
    }

    async fn plan_steps(
        &self,
        _query: &str,
        _intent: &Intent,
        _schema: &SchemaContext,
    ) -> LanguageModelResult<Vec<AbstractStep>> {
        Ok(Vec::new())
    }

    async fn justify(
        &self,
        step_description: &str,
        _context: &serde_json::Value,
    ) -> LanguageModelResult<String> {
        Ok(fallback::justification(step_description))
    }

    async fn narrate(&self, _query: &str, _insights: &Insights) -> LanguageModelResult<Narrative> {
        Ok(fallback::narrative())
    }

    async fn summarize(&self, query: &str, report: &Report) -> LanguageModelResult<String> {
        Ok(fallback::summary(query, report))
    }
}
