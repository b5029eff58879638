//! Facts accumulated while a plan runs.

use std::collections::BTreeMap;

use serde_json::{json, Value};
use tracing::warn;

use crate::model::Record;

/// Run-scoped, append-only knowledge gathered by earlier steps.
///
/// Each step writes `stepN_recordCount`, `stepN_columns` and
/// `stepN_sampleData` once; later steps read them through
/// [`ExecutionContext::snapshot`]. A context belongs to exactly one run
/// and is dropped with it.
#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
    facts: BTreeMap<String, Value>,
    total_records_explored: usize,
    final_answer_ready: bool,
    sample_rows: usize,
}

impl ExecutionContext {
    /// A context keeping up to `sample_rows` rows per step.
    pub fn new(sample_rows: usize) -> Self {
        Self {
            sample_rows,
            ..Default::default()
        }
    }

    /// Insert a fact unless the key is already set.
    ///
    /// Returns false (and leaves the first value in place) on a repeated key.
    pub fn insert_once(&mut self, key: impl Into<String>, value: Value) -> bool {
        let key = key.into();
        if self.facts.contains_key(&key) {
            warn!(key = %key, "execution context key already written; keeping first value");
            return false;
        }
        self.facts.insert(key, value);
        true
    }

    /// Record what step `step_number` returned.
    pub fn record_step(&mut self, step_number: usize, results: &[Record]) {
        let columns: Vec<&String> = results.first().map(|r| r.keys().collect()).unwrap_or_default();
        let sample: Vec<&Record> = results.iter().take(self.sample_rows).collect();

        self.insert_once(format!("step{}_recordCount", step_number), json!(results.len()));
        self.insert_once(format!("step{}_columns", step_number), json!(columns));
        self.insert_once(format!("step{}_sampleData", step_number), json!(sample));
        self.total_records_explored += results.len();
    }

    pub fn mark_final_answer_ready(&mut self) {
        self.final_answer_ready = true;
    }

    pub fn final_answer_ready(&self) -> bool {
        self.final_answer_ready
    }

    pub fn total_records_explored(&self) -> usize {
        self.total_records_explored
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.facts.get(key)
    }

    pub fn len(&self) -> usize {
        self.facts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }

    /// Everything known so far, as one JSON object.
    pub fn snapshot(&self) -> Value {
        let mut object: serde_json::Map<String, Value> = self
            .facts
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        object.insert(
            "totalRecordsExplored".to_string(),
            json!(self.total_records_explored),
        );
        object.insert("finalAnswerReady".to_string(), json!(self.final_answer_ready));
        Value::Object(object)
    }
}
