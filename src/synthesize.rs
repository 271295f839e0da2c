//! Deterministic answer synthesis from accumulated evidence.
//!
//! Builds a typed value matching the question's format hint from the last
//! successful SQL attempt (or, for document-only questions, from planner
//! constraints and the top retrieved chunk), plus a one-sentence
//! explanation naming the evidence used and a citation list drawn strictly
//! from evidence actually present. Always produces an answer; when
//! evidence is missing or erroring the explanation says so.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Map, Value};

use crate::evidence::EvidenceStore;
use crate::models::{Answer, Constraints, FormatHint, Question, SqlAttempt};
use crate::traits::Synthesizer;

pub struct EvidenceSynthesizer;

#[async_trait]
impl Synthesizer for EvidenceSynthesizer {
    async fn synthesize(
        &self,
        question: &Question,
        evidence: &EvidenceStore,
        constraints: &Constraints,
        _hint: Option<&str>,
    ) -> Result<Answer> {
        let shape = FormatHint::parse(question.format_hint.as_deref());
        let success = evidence.last_success();

        let mut value = match success {
            Some(attempt) => value_from_rows(&shape, attempt),
            None => value_from_docs(&shape, evidence, constraints),
        };
        // Scalar hints get a typed zero value instead of null, so a failed
        // SQL attempt surfaces as sql_execution_failed rather than a
        // format mismatch.
        if value.is_null() {
            value = scalar_placeholder(&shape);
        }

        let mut citations: Vec<String> = evidence.chunk_tokens();
        if let Some(attempt) = success {
            for table in &attempt.tables {
                if !citations.contains(table) {
                    citations.push(table.clone());
                }
            }
        }

        Ok(Answer {
            value,
            explanation: build_explanation(evidence),
            citations,
        })
    }
}

fn build_explanation(evidence: &EvidenceStore) -> String {
    let has_docs = !evidence.chunks().is_empty();
    let has_sql = evidence.last_success().is_some();

    let mut explanation = match (has_docs, has_sql) {
        (true, true) => format!(
            "Answer derived from {} document chunk(s) and the database query.",
            evidence.chunks().len()
        ),
        (false, true) => "Answer derived from the database query.".to_string(),
        (true, false) => "Answer derived from the retrieved documents.".to_string(),
        (false, false) => {
            "No supporting evidence was available to answer this question.".to_string()
        }
    };

    if let Some(error) = evidence.last_attempt().and_then(|a| a.error.as_ref()) {
        explanation.push_str(&format!(" The last SQL attempt failed: {}.", error.message));
    }

    explanation
}

// ============ Value extraction ============

fn value_from_rows(shape: &FormatHint, attempt: &SqlAttempt) -> Value {
    let rows = &attempt.rows;
    let first_cell = rows.first().and_then(|r| r.first());

    match shape {
        FormatHint::Bool => json!(!rows.is_empty()),
        FormatHint::Int | FormatHint::Float | FormatHint::Text => first_cell
            .map(|cell| coerce_cell(shape, cell))
            .unwrap_or(Value::Null),
        FormatHint::Object(fields) => rows
            .first()
            .map(|row| row_to_object(fields, row))
            .unwrap_or(Value::Null),
        FormatHint::List(elem) => {
            if rows.is_empty() {
                return Value::Null;
            }
            let items: Vec<Value> = match elem.as_ref() {
                FormatHint::Object(fields) => {
                    rows.iter().map(|row| row_to_object(fields, row)).collect()
                }
                _ => rows
                    .iter()
                    .filter_map(|row| row.first())
                    .map(|cell| coerce_cell(elem, cell))
                    .collect(),
            };
            Value::Array(items)
        }
        FormatHint::Any => match (rows.len(), rows.first().map(|r| r.len())) {
            (1, Some(1)) => rows[0][0].clone(),
            (0, _) => Value::Null,
            _ => {
                let items: Vec<Value> = rows
                    .iter()
                    .map(|row| {
                        let mut obj = Map::new();
                        for (i, cell) in row.iter().enumerate() {
                            let key = attempt
                                .columns
                                .get(i)
                                .cloned()
                                .unwrap_or_else(|| format!("col{}", i));
                            obj.insert(key, cell.clone());
                        }
                        Value::Object(obj)
                    })
                    .collect();
                Value::Array(items)
            }
        },
    }
}

/// Positional mapping: hint keys in declaration order against row cells.
fn row_to_object(fields: &[(String, FormatHint)], row: &[Value]) -> Value {
    let mut obj = Map::new();
    for (i, (key, ty)) in fields.iter().enumerate() {
        let cell = row.get(i).map(|c| coerce_cell(ty, c)).unwrap_or(Value::Null);
        obj.insert(key.clone(), cell);
    }
    Value::Object(obj)
}

fn coerce_cell(shape: &FormatHint, cell: &Value) -> Value {
    match shape {
        FormatHint::Int => match cell {
            Value::Number(n) if n.is_i64() || n.is_u64() => cell.clone(),
            Value::Number(n) => n
                .as_f64()
                .filter(|f| f.fract().abs() < 1e-9)
                .map(|f| json!(f as i64))
                .unwrap_or(Value::Null),
            Value::String(s) => s.trim().parse::<i64>().map(Value::from).unwrap_or(Value::Null),
            _ => Value::Null,
        },
        FormatHint::Float => match cell {
            Value::Number(_) => cell.clone(),
            Value::String(s) => s.trim().parse::<f64>().map(Value::from).unwrap_or(Value::Null),
            _ => Value::Null,
        },
        FormatHint::Text => match cell {
            Value::String(_) => cell.clone(),
            Value::Number(n) => json!(n.to_string()),
            Value::Bool(b) => json!(b.to_string()),
            _ => Value::Null,
        },
        FormatHint::Bool => match cell {
            Value::Bool(_) => cell.clone(),
            Value::Number(n) => json!(n.as_f64().map(|f| f != 0.0).unwrap_or(false)),
            _ => Value::Null,
        },
        _ => cell.clone(),
    }
}

/// Document-only fallback: numeric answers come from planner constraints
/// (e.g. a return-policy day count) or the top chunk's first number;
/// textual answers quote the top chunk.
fn value_from_docs(
    shape: &FormatHint,
    evidence: &EvidenceStore,
    constraints: &Constraints,
) -> Value {
    let top_chunk = evidence.chunks().first();

    match shape {
        FormatHint::Int => constraints
            .get("return_days")
            .and_then(|d| d.parse::<i64>().ok())
            .map(Value::from)
            .or_else(|| top_chunk.and_then(|c| first_integer(&c.text)).map(Value::from))
            .unwrap_or(Value::Null),
        FormatHint::Float => top_chunk
            .and_then(|c| first_number(&c.text))
            .map(Value::from)
            .unwrap_or(Value::Null),
        FormatHint::Text | FormatHint::Any => top_chunk
            .map(|c| json!(c.text.clone()))
            .unwrap_or(Value::Null),
        _ => Value::Null,
    }
}

fn scalar_placeholder(shape: &FormatHint) -> Value {
    match shape {
        FormatHint::Int => json!(0),
        FormatHint::Float => json!(0.0),
        FormatHint::Text => json!(""),
        FormatHint::Bool => json!(false),
        _ => Value::Null,
    }
}

fn first_integer(text: &str) -> Option<i64> {
    text.split(|c: char| !c.is_ascii_digit() && c != '-')
        .find_map(|t| t.parse::<i64>().ok())
}

fn first_number(text: &str) -> Option<f64> {
    text.split(|c: char| !c.is_ascii_digit() && c != '.' && c != '-')
        .find_map(|t| t.parse::<f64>().ok())
}
