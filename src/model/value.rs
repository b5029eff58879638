//! Semi-structured parameter values.
//!
//! Abstract plan steps arrive from the language model with a loose bag of
//! parameters. Rather than casting at runtime, every value is parsed into a
//! [`ParamValue`] tree and read back through total conversion helpers that
//! always have a default.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A JSON-like parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum ParamValue {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    List(Vec<ParamValue>),
    Map(BTreeMap<String, ParamValue>),
}

impl ParamValue {
    /// Borrow the value as a string slice, if it is text.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Render the value as a string, falling back to `default` for
    /// null, lists and maps.
    pub fn as_string_or(&self, default: &str) -> String {
        match self {
            ParamValue::Text(s) if !s.trim().is_empty() => s.trim().to_string(),
            ParamValue::Number(n) => format_number(*n),
            ParamValue::Bool(b) => b.to_string(),
            _ => default.to_string(),
        }
    }

    /// Read the value as an integer.
    ///
    /// Numbers are truncated, numeric text is parsed, anything else (or a
    /// negative number) yields `default`.
    pub fn as_int_or(&self, default: i64) -> i64 {
        let parsed = match self {
            ParamValue::Number(n) if n.is_finite() => Some(n.trunc() as i64),
            ParamValue::Text(s) => s
                .trim()
                .parse::<i64>()
                .ok()
                .or_else(|| s.trim().parse::<f64>().ok().map(|f| f.trunc() as i64)),
            _ => None,
        };
        match parsed {
            Some(n) if n >= 0 => n,
            _ => default,
        }
    }

    /// Read the value as a boolean.
    pub fn as_bool_or(&self, default: bool) -> bool {
        match self {
            ParamValue::Bool(b) => *b,
            ParamValue::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "1" => true,
                "false" | "no" | "0" => false,
                _ => default,
            },
            ParamValue::Number(n) => *n != 0.0,
            _ => default,
        }
    }

    /// Read the value as a list of table names.
    ///
    /// A single string is one table (or several, comma separated); a list
    /// keeps its non-empty textual members. Everything else is empty.
    pub fn as_table_list(&self) -> Vec<String> {
        match self {
            ParamValue::Text(s) => s
                .split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect(),
            ParamValue::List(items) => items
                .iter()
                .filter_map(|item| item.as_str())
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ParamValue::Null)
    }
}

impl From<&str> for ParamValue {
    fn from(s: &str) -> Self {
        ParamValue::Text(s.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(s: String) -> Self {
        ParamValue::Text(s)
    }
}

impl From<i64> for ParamValue {
    fn from(n: i64) -> Self {
        ParamValue::Number(n as f64)
    }
}

impl From<bool> for ParamValue {
    fn from(b: bool) -> Self {
        ParamValue::Bool(b)
    }
}

impl From<Vec<String>> for ParamValue {
    fn from(items: Vec<String>) -> Self {
        ParamValue::List(items.into_iter().map(ParamValue::Text).collect())
    }
}

impl From<serde_json::Value> for ParamValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => ParamValue::Null,
            serde_json::Value::Bool(b) => ParamValue::Bool(b),
            serde_json::Value::Number(n) => n.as_f64().map_or(ParamValue::Null, ParamValue::Number),
            serde_json::Value::String(s) => ParamValue::Text(s),
            serde_json::Value::Array(items) => {
                ParamValue::List(items.into_iter().map(Into::into).collect())
            }
            serde_json::Value::Object(map) => {
                ParamValue::Map(map.into_iter().map(|(k, v)| (k, v.into())).collect())
            }
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Null => write!(f, "null"),
            ParamValue::Bool(b) => write!(f, "{}", b),
            ParamValue::Number(n) => write!(f, "{}", format_number(*n)),
            ParamValue::Text(s) => write!(f, "{}", s),
            ParamValue::List(items) => {
                let parts: Vec<String> = items.iter().map(|i| i.to_string()).collect();
                write!(f, "[{}]", parts.join(", "))
            }
            ParamValue::Map(map) => {
                let parts: Vec<String> = map.iter().map(|(k, v)| format!("{}: {}", k, v)).collect();
                write!(f, "{{{}}}", parts.join(", "))
            }
        }
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

/// Ordered parameter map.
///
/// Keys are case-sensitive and kept sorted so that anything derived from a
/// parameter map is deterministic.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Params(BTreeMap<String, ParamValue>);

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ParamValue>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn str_or(&self, key: &str, default: &str) -> String {
        self.0
            .get(key)
            .map_or_else(|| default.to_string(), |v| v.as_string_or(default))
    }

    pub fn int_or(&self, key: &str, default: i64) -> i64 {
        self.0.get(key).map_or(default, |v| v.as_int_or(default))
    }

    pub fn bool_or(&self, key: &str, default: bool) -> bool {
        self.0.get(key).map_or(default, |v| v.as_bool_or(default))
    }

    /// Table names referenced by this map.
    ///
    /// Looks at `tables` first and then `table`.
    pub fn tables(&self) -> Vec<String> {
        let mut tables = self
            .0
            .get("tables")
            .map(ParamValue::as_table_list)
            .unwrap_or_default();
        if tables.is_empty() {
            if let Some(single) = self.0.get("table") {
                tables = single.as_table_list();
            }
        }
        tables
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParamValue)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, ParamValue)> for Params {
    fn from_iter<I: IntoIterator<Item = (String, ParamValue)>>(iter: I) -> Self {
        Params(iter.into_iter().collect())
    }
}
