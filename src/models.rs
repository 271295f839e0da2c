//! Core data models used throughout datasage.
//!
//! These types represent the questions, evidence, and answers that flow
//! through the answer pipeline, plus the output record contract written
//! by the batch runner.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// An incoming analytics question.
#[derive(Debug, Clone, Deserialize)]
pub struct Question {
    pub id: String,
    pub question: String,
    #[serde(default)]
    pub format_hint: Option<String>,
}

impl Question {
    pub fn new(id: &str, text: &str, format_hint: Option<&str>) -> Self {
        Self {
            id: id.to_string(),
            question: text.to_string(),
            format_hint: format_hint.map(|h| h.to_string()),
        }
    }
}

/// Evidence path chosen by the router. Decided exactly once per run;
/// repair never changes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Route {
    Rag,
    Sql,
    Hybrid,
}

impl Route {
    pub fn uses_docs(self) -> bool {
        matches!(self, Route::Rag | Route::Hybrid)
    }

    pub fn uses_sql(self) -> bool {
        matches!(self, Route::Sql | Route::Hybrid)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Route::Rag => "rag",
            Route::Sql => "sql",
            Route::Hybrid => "hybrid",
        }
    }
}

/// A scored fragment of a corpus document.
///
/// Identity is `(doc_id, index)`; the citation token is derived from it.
#[derive(Debug, Clone, Serialize)]
pub struct DocChunk {
    pub doc_id: String,
    pub index: i64,
    pub text: String,
    pub score: f64,
}

impl DocChunk {
    /// Citation token for this chunk, e.g. `product_policy::chunk3`.
    pub fn token(&self) -> String {
        format!("{}::chunk{}", self.doc_id, self.index)
    }
}

/// Structured facts derived by the planner from retrieved documents:
/// date windows, KPI names and formulas, category filters.
///
/// Backed by a `BTreeMap` so iteration order (and thus any rendering into
/// a generation prompt) is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Constraints(BTreeMap<String, String>);

impl Constraints {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: &str, value: &str) {
        self.0.insert(key.to_string(), value.to_string());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(|v| v.as_str())
    }

    /// Insert or override entries from `other`. Keys absent from `other`
    /// are left untouched; merging never removes a constraint.
    pub fn merge(&mut self, other: &Constraints) {
        for (k, v) in &other.0 {
            self.0.insert(k.clone(), v.clone());
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.0.iter()
    }

    /// Render as `key: value` lines for inclusion in a generation prompt.
    pub fn render(&self) -> String {
        self.0
            .iter()
            .map(|(k, v)| format!("{}: {}", k, v))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Classified SQL execution error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SqlErrorKind {
    Syntax,
    MissingTable,
    MissingColumn,
    Other,
}

/// Structured error captured from the database driver. Never raised past
/// the executor; it feeds the validator and the repair controller.
#[derive(Debug, Clone, Serialize)]
pub struct SqlError {
    pub kind: SqlErrorKind,
    pub message: String,
}

/// One SQL execution attempt. Every attempt is retained in the evidence
/// store even when a later repair supersedes it; only the last attempt's
/// SQL text is surfaced in the final output record.
#[derive(Debug, Clone, Serialize)]
pub struct SqlAttempt {
    pub sql: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
    /// Tables referenced by the statement, extracted from its FROM/JOIN
    /// clauses. The SQL side of the citation universe.
    pub tables: Vec<String>,
    pub error: Option<SqlError>,
}

impl SqlAttempt {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// The synthesized result: a typed value matching the question's format
/// hint, a free-text explanation, and citation tokens (DB table names or
/// `doc::chunkN` tokens).
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub value: Value,
    pub explanation: String,
    pub citations: Vec<String>,
}

/// Fixed taxonomy of validation failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    FormatMismatch,
    SqlExecutionFailed,
    CitationIncomplete,
}

impl FailureReason {
    pub fn as_str(self) -> &'static str {
        match self {
            FailureReason::FormatMismatch => "format_mismatch",
            FailureReason::SqlExecutionFailed => "sql_execution_failed",
            FailureReason::CitationIncomplete => "citation_incomplete",
        }
    }
}

/// Result of one validation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validation {
    Pass,
    Fail(FailureReason),
}

impl Validation {
    pub fn passed(self) -> bool {
        matches!(self, Validation::Pass)
    }
}

/// One line of the batch output file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputRecord {
    pub id: String,
    pub final_answer: Value,
    pub sql: String,
    pub confidence: f64,
    pub explanation: String,
    pub citations: Vec<String>,
}

// ============ Format hints ============

/// Parsed answer-shape hint, e.g. `int`, `list[str]`,
/// `{category:str, quantity:int}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatHint {
    Int,
    Float,
    Text,
    Bool,
    /// `list[<element>]`; element shape is checked per item.
    List(Box<FormatHint>),
    /// `{key:type, ...}`; required keys in declaration order.
    Object(Vec<(String, FormatHint)>),
    /// No hint, or an unrecognized one: any non-null value is acceptable.
    Any,
}

impl FormatHint {
    pub fn parse(hint: Option<&str>) -> FormatHint {
        let hint = match hint {
            Some(h) if !h.trim().is_empty() => h.trim(),
            _ => return FormatHint::Any,
        };

        match hint {
            "int" | "integer" => FormatHint::Int,
            "float" | "number" | "currency" => FormatHint::Float,
            "str" | "string" | "text" => FormatHint::Text,
            "bool" | "boolean" => FormatHint::Bool,
            _ if hint.starts_with("list[") && hint.ends_with(']') => {
                let inner = &hint["list[".len()..hint.len() - 1];
                FormatHint::List(Box::new(FormatHint::parse(Some(inner))))
            }
            _ if hint.starts_with('{') && hint.ends_with('}') => {
                let inner = &hint[1..hint.len() - 1];
                let fields = inner
                    .split(',')
                    .filter_map(|field| {
                        let (key, ty) = field.split_once(':')?;
                        Some((key.trim().to_string(), FormatHint::parse(Some(ty.trim()))))
                    })
                    .collect::<Vec<_>>();
                if fields.is_empty() {
                    FormatHint::Any
                } else {
                    FormatHint::Object(fields)
                }
            }
            _ => FormatHint::Any,
        }
    }

    /// Whether `value` is coercible to this shape. Lists must be non-empty
    /// ordered sequences; objects must carry every declared key.
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            FormatHint::Int => match value {
                Value::Number(n) => n.is_i64() || n.is_u64(),
                _ => false,
            },
            FormatHint::Float => value.is_number(),
            FormatHint::Text => value.is_string(),
            FormatHint::Bool => value.is_boolean(),
            FormatHint::List(elem) => match value {
                Value::Array(items) => {
                    !items.is_empty() && items.iter().all(|v| elem.matches(v))
                }
                _ => false,
            },
            FormatHint::Object(fields) => match value {
                Value::Object(map) => fields
                    .iter()
                    .all(|(key, ty)| map.get(key).map(|v| ty.matches(v)).unwrap_or(false)),
                _ => false,
            },
            FormatHint::Any => !value.is_null(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_chunk_token() {
        let chunk = DocChunk {
            doc_id: "marketing_calendar".to_string(),
            index: 2,
            text: "Summer Beverages 1997".to_string(),
            score: 0.8,
        };
        assert_eq!(chunk.token(), "marketing_calendar::chunk2");
    }

    #[test]
    fn test_constraints_merge_overrides_without_dropping() {
        let mut base = Constraints::new();
        base.set("date_start", "1997-06-01");
        base.set("category", "Beverages");

        let mut update = Constraints::new();
        update.set("date_start", "1997-12-01");
        update.set("kpi", "AOV");

        base.merge(&update);
        assert_eq!(base.get("date_start"), Some("1997-12-01"));
        assert_eq!(base.get("category"), Some("Beverages"));
        assert_eq!(base.get("kpi"), Some("AOV"));
        assert_eq!(base.len(), 3);
    }

    #[test]
    fn test_constraints_render_deterministic() {
        let mut c = Constraints::new();
        c.set("kpi", "AOV");
        c.set("date_start", "1997-12-01");
        assert_eq!(c.render(), "date_start: 1997-12-01\nkpi: AOV");
    }

    #[test]
    fn test_format_hint_scalars() {
        assert_eq!(FormatHint::parse(Some("int")), FormatHint::Int);
        assert_eq!(FormatHint::parse(Some("currency")), FormatHint::Float);
        assert_eq!(FormatHint::parse(Some("str")), FormatHint::Text);
        assert_eq!(FormatHint::parse(None), FormatHint::Any);

        assert!(FormatHint::Int.matches(&json!(42)));
        assert!(!FormatHint::Int.matches(&json!(42.5)));
        assert!(FormatHint::Float.matches(&json!(42)));
        assert!(FormatHint::Float.matches(&json!(42.5)));
        assert!(!FormatHint::Text.matches(&json!(42)));
    }

    #[test]
    fn test_format_hint_list() {
        let hint = FormatHint::parse(Some("list[str]"));
        assert!(hint.matches(&json!(["Chai", "Chang"])));
        assert!(!hint.matches(&json!([])), "empty lists are rejected");
        assert!(!hint.matches(&json!([1, 2])));
    }

    #[test]
    fn test_format_hint_object() {
        let hint = FormatHint::parse(Some("{category:str, quantity:int}"));
        assert!(hint.matches(&json!({"category": "Beverages", "quantity": 421})));
        assert!(!hint.matches(&json!({"category": "Beverages"})));
        assert!(!hint.matches(&json!({"category": 3, "quantity": 421})));
    }

    #[test]
    fn test_format_hint_nested_list_of_objects() {
        let hint = FormatHint::parse(Some("list[{product:str, revenue:float}]"));
        assert!(hint.matches(&json!([{"product": "Chai", "revenue": 12.5}])));
        assert!(!hint.matches(&json!([{"product": "Chai"}])));
    }

    #[test]
    fn test_route_capabilities() {
        assert!(Route::Hybrid.uses_docs() && Route::Hybrid.uses_sql());
        assert!(Route::Rag.uses_docs() && !Route::Rag.uses_sql());
        assert!(!Route::Sql.uses_docs() && Route::Sql.uses_sql());
    }
}
