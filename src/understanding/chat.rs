//! Chat-model backed understanding.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::{LanguageModelError, LanguageModelResult, Narrative, TextUnderstanding};
use crate::model::{AbstractStep, Insights, Intent, Params, QueryType, Report, SchemaContext};

const ANTHROPIC_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
const DEFAULT_MAX_TOKENS: u32 = 2048;

/// Rows of the final result shown to the model when summarizing.
const SUMMARY_ROWS: usize = 10;

const JSON_ONLY: &str =
    "Respond with valid JSON only. No markdown code blocks, no explanations.";

/// A chat completion endpoint.
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Send a system and user prompt, return the raw text reply.
    async fn chat(&self, system_prompt: &str, user_prompt: &str) -> LanguageModelResult<String>;

    /// Model name, for logging.
    fn model_name(&self) -> &str;
}

/// Anthropic Messages API client.
#[derive(Clone)]
pub struct AnthropicChatClient {
    api_key: String,
    client: reqwest::Client,
    model: String,
    max_tokens: u32,
}

impl AnthropicChatClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            client: reqwest::Client::new(),
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens.max(1);
        self
    }
}

#[async_trait]
impl ChatClient for AnthropicChatClient {
    async fn chat(&self, system_prompt: &str, user_prompt: &str) -> LanguageModelResult<String> {
        let response = self
            .client
            .post(ANTHROPIC_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&serde_json::json!({
                "model": &self.model,
                "max_tokens": self.max_tokens,
                "system": system_prompt,
                "messages": [{"role": "user", "content": user_prompt}]
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(LanguageModelError::Request(format!(
                "Anthropic API error {}: {}",
                status, body
            )));
        }

        #[derive(Deserialize)]
        struct ContentBlock {
            text: Option<String>,
        }
        #[derive(Deserialize)]
        struct ApiResponse {
            content: Vec<ContentBlock>,
        }

        let api_response: ApiResponse = response.json().await?;
        api_response
            .content
            .into_iter()
            .find_map(|c| c.text)
            .ok_or_else(|| LanguageModelError::malformed("empty response from Anthropic"))
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// [`TextUnderstanding`] that prompts a [`ChatClient`].
pub struct ChatUnderstanding<C> {
    client: C,
}

impl<C: ChatClient> ChatUnderstanding<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }

    async fn chat_json<T: serde::de::DeserializeOwned>(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> LanguageModelResult<T> {
        let system = format!("{}\n\n{}", system_prompt, JSON_ONLY);
        let reply = self.client.chat(&system, user_prompt).await?;
        debug!(model = self.client.model_name(), bytes = reply.len(), "language model reply");
        serde_json::from_str(strip_code_fences(&reply))
            .map_err(|e| LanguageModelError::malformed(e.to_string()))
    }
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct IntentPayload {
    intent: String,
    entities: Vec<String>,
    query_type: String,
    parameters: Params,
    confidence: f64,
    search_terms: Vec<String>,
}

impl From<IntentPayload> for Intent {
    fn from(payload: IntentPayload) -> Self {
        let search_terms = if payload.search_terms.is_empty() {
            payload.entities.clone()
        } else {
            payload.search_terms
        };
        Intent {
            intent: payload.intent,
            entities: payload.entities,
            query_type: QueryType::parse(&payload.query_type),
            parameters: payload.parameters,
            confidence: payload.confidence,
            search_terms,
        }
        .normalized()
    }
}

/// Plans arrive either as a bare array or wrapped in `{"steps": [...]}`.
#[derive(Deserialize)]
#[serde(untagged)]
enum PlanPayload {
    Steps(Vec<AbstractStep>),
    Wrapped { steps: Vec<AbstractStep> },
}

#[async_trait]
impl<C: ChatClient> TextUnderstanding for ChatUnderstanding<C> {
    async fn analyze_intent(&self, query: &str) -> LanguageModelResult<Intent> {
        let payload: IntentPayload = self.chat_json(INTENT_PROMPT, query).await?;
        if payload.intent.trim().is_empty() {
            return Err(LanguageModelError::malformed("intent is missing"));
        }
        Ok(payload.into())
    }

    async fn plan_steps(
        &self,
        query: &str,
        intent: &Intent,
        schema: &SchemaContext,
    ) -> LanguageModelResult<Vec<AbstractStep>> {
        let intent_json = serde_json::to_string(intent)
            .map_err(|e| LanguageModelError::malformed(e.to_string()))?;
        let user = format!(
            "Question: {}\n\nIntent: {}\n\nRelevant tables:\n{}",
            query,
            intent_json,
            describe_schema(schema)
        );
        let payload: PlanPayload = self.chat_json(PLAN_PROMPT, &user).await?;
        Ok(match payload {
            PlanPayload::Steps(steps) | PlanPayload::Wrapped { steps } => steps,
        })
    }

    async fn justify(
        &self,
        step_description: &str,
        context: &serde_json::Value,
    ) -> LanguageModelResult<String> {
        let user = format!("Step: {}\n\nKnown so far: {}", step_description, context);
        let reply = self.client.chat(JUSTIFY_PROMPT, &user).await?;
        let sentence = reply.lines().map(str::trim).find(|l| !l.is_empty());
        sentence
            .map(str::to_string)
            .ok_or_else(|| LanguageModelError::malformed("empty justification"))
    }

    async fn narrate(&self, query: &str, insights: &Insights) -> LanguageModelResult<Narrative> {
        let insights_json = serde_json::to_string(insights)
            .map_err(|e| LanguageModelError::malformed(e.to_string()))?;
        let user = format!("Question: {}\n\nInsights: {}", query, insights_json);
        let narrative: Narrative = self.chat_json(NARRATE_PROMPT, &user).await?;
        if narrative.summary.trim().is_empty() {
            return Err(LanguageModelError::malformed("empty summary"));
        }
        Ok(narrative)
    }

    async fn summarize(&self, query: &str, report: &Report) -> LanguageModelResult<String> {
        let rows: Vec<_> = report.final_data.iter().take(SUMMARY_ROWS).collect();
        let rows_json = serde_json::to_string(&rows)
            .map_err(|e| LanguageModelError::malformed(e.to_string()))?;
        let metrics_json = serde_json::to_string(&report.insights.metrics)
            .map_err(|e| LanguageModelError::malformed(e.to_string()))?;
        let user = format!(
            "Question: {}\n\nResult rows ({} total, first {} shown): {}\n\nMetrics: {}",
            query,
            report.final_data.len(),
            rows.len(),
            rows_json,
            metrics_json
        );
        let reply = self.client.chat(SUMMARIZE_PROMPT, &user).await?;
        let answer = reply.trim();
        if answer.is_empty() {
            return Err(LanguageModelError::malformed("empty answer"));
        }
        Ok(answer.to_string())
    }
}

/// Remove a surrounding markdown code fence, if any.
pub(crate) fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (e.g. `json`) on the opening line.
    let body = rest.split_once('\n').map_or("", |(_, body)| body);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

fn describe_schema(schema: &SchemaContext) -> String {
    if schema.relevant_tables.is_empty() {
        return "(none found)".to_string();
    }
    schema
        .relevant_tables
        .iter()
        .map(|t| {
            format!(
                "- {} (score {:.1}, {} rows): {}",
                t.name,
                t.relevance_score,
                t.stats.row_count,
                t.column_names().join(", ")
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

const INTENT_PROMPT: &str = r#"You analyze questions about a relational database.
Return a JSON object with these fields:
- "intent": short snake_case description of what is asked
- "entities": business entities mentioned (e.g. "user", "usage", "department")
- "queryType": one of TopN, Count, Sum, Average, List, Comparison, Analysis
- "parameters": object; include "limit" when a number of results is requested
- "confidence": number between 0 and 1
- "searchTerms": words likely to appear in table or column names"#;

const PLAN_PROMPT: &str = r#"You plan a step-by-step, read-only analysis of a SQL Server database.
Return a JSON array of steps. Each step has:
- "order": integer
- "action": one of "exploration", "analysis", "query_building", "final_execution"
- "description": what the step does
- "parameters": object with "tables" (list of "schema.table"), and for
  exploration "operation": "sample" | "describe", for analysis
  "operation": "join" | "aggregate", optionally "limit"
- "reasoning": why the step is needed
- "expectedOutcome": what it should produce
End with exactly one "final_execution" step."#;

const JUSTIFY_PROMPT: &str = "You explain database analysis steps. In one sentence, explain why the given step is useful given what is already known. Reply with the sentence only.";

const NARRATE_PROMPT: &str = r#"You write short analytical summaries.
Return a JSON object with:
- "summary": two or three sentences describing the key findings
- "recommendations": three short, actionable recommendations"#;

const SUMMARIZE_PROMPT: &str = "You answer questions about database contents. Using the result rows and metrics, answer the question directly in a short paragraph. Mention concrete names and numbers.";
