//! Column statistics over result records.

use serde_json::Value;

use crate::model::Record;

/// Interpret a JSON value as a number.
///
/// Numbers count, and so do strings that parse as a finite number (drivers
/// often return decimals as text). Booleans and nulls do not.
pub fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    }
}

/// Columns of the first record whose values are numeric.
pub fn numeric_columns(records: &[Record]) -> Vec<String> {
    records
        .first()
        .map(|first| {
            first
                .iter()
                .filter(|(_, v)| as_number(v).is_some())
                .map(|(k, _)| k.clone())
                .collect()
        })
        .unwrap_or_default()
}

/// Numeric values of `column` across all records, skipping the rest.
pub fn column_values(records: &[Record], column: &str) -> Vec<f64> {
    records
        .iter()
        .filter_map(|r| r.get(column).and_then(as_number))
        .collect()
}

/// Count of distinct non-null values of `column`.
pub fn distinct_count(records: &[Record], column: &str) -> usize {
    let mut seen: Vec<String> = records
        .iter()
        .filter_map(|r| r.get(column))
        .filter(|v| !v.is_null())
        .map(|v| v.to_string())
        .collect();
    seen.sort();
    seen.dedup();
    seen.len()
}

/// Summary statistics for one numeric column.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColumnSummary {
    pub sum: f64,
    pub mean: f64,
    pub median: f64,
    pub min: f64,
    pub max: f64,
}

impl ColumnSummary {
    /// Summarize `values`; `None` when empty.
    pub fn of(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);

        let sum: f64 = sorted.iter().sum();
        let n = sorted.len();
        let median = if n % 2 == 0 {
            (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
        } else {
            sorted[n / 2]
        };

        Some(Self {
            sum,
            mean: round2(sum / n as f64),
            median,
            min: sorted[0],
            max: sorted[n - 1],
        })
    }
}

/// Round to two decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
