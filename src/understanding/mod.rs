//! Language understanding.
//!
//! Turning a question into an [`Intent`], proposing abstract plan steps,
//! and writing prose about results are all delegated to a
//! [`TextUnderstanding`] implementation. The core never depends on any of
//! these calls succeeding: each has a deterministic fallback in
//! [`fallback`].
//!
//! Two implementations ship with the crate:
//! - [`ChatUnderstanding`] prompts a chat model for strict JSON.
//! - [`OfflineUnderstanding`] uses only the fallback rules.

mod chat;
pub mod fallback;
mod offline;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::model::{AbstractStep, Insights, Intent, Report, SchemaContext};

pub use chat::{AnthropicChatClient, ChatClient, ChatUnderstanding};
pub use offline::OfflineUnderstanding;

pub type LanguageModelResult<T> = Result<T, LanguageModelError>;

/// Errors from a language understanding call.
#[derive(Debug, thiserror::Error)]
pub enum LanguageModelError {
    #[error("language model request failed: {0}")]
    Request(String),

    #[error("language model HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("malformed language model output: {0}")]
    Malformed(String),

    #[error("language model is disabled")]
    Disabled,
}

impl LanguageModelError {
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed(message.into())
    }
}

/// Prose written about a run's insights.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Narrative {
    pub summary: String,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

/// Language capabilities the pipeline consumes.
#[async_trait]
pub trait TextUnderstanding: Send + Sync {
    /// Interpret a free-text question.
    async fn analyze_intent(&self, query: &str) -> LanguageModelResult<Intent>;

    /// Propose abstract steps for answering `query` over the discovered
    /// schema. The result may be empty, out of order or partly invalid.
    async fn plan_steps(
        &self,
        query: &str,
        intent: &Intent,
        schema: &SchemaContext,
    ) -> LanguageModelResult<Vec<AbstractStep>>;

    /// One sentence explaining why a step runs, given what is known so far.
    async fn justify(
        &self,
        step_description: &str,
        context: &serde_json::Value,
    ) -> LanguageModelResult<String>;

    /// Summary and recommendations for computed insights.
    async fn narrate(&self, query: &str, insights: &Insights) -> LanguageModelResult<Narrative>;

    /// The final natural-language answer.
    async fn summarize(&self, query: &str, report: &Report) -> LanguageModelResult<String>;
}
