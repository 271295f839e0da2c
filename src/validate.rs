//! Answer validation against format, evidence, and consistency rules.
//!
//! Three independent checks run in a fixed order; the first failure wins:
//!
//! 1. **Format** — the answer value must be coercible to the shape implied
//!    by the question's format hint (`format_mismatch`).
//! 2. **SQL success** — on sql/hybrid routes the last attempt must have
//!    succeeded and returned rows, unless the question is an existence
//!    check answerable from zero rows (`sql_execution_failed`).
//! 3. **Citations** — the citation list must be non-empty and every token
//!    must resolve to evidence actually present (`citation_incomplete`).

use crate::evidence::EvidenceStore;
use crate::models::{Answer, FailureReason, FormatHint, Question, Route, Validation};

pub fn validate(
    question: &Question,
    route: Route,
    answer: &Answer,
    evidence: &EvidenceStore,
) -> Validation {
    let shape = FormatHint::parse(question.format_hint.as_deref());

    if !shape.matches(&answer.value) {
        return Validation::Fail(FailureReason::FormatMismatch);
    }

    if route.uses_sql() {
        let last = evidence.last_attempt();
        let ok = match last {
            Some(attempt) if attempt.succeeded() => {
                !attempt.rows.is_empty() || zero_rows_acceptable(&shape)
            }
            _ => false,
        };
        if !ok {
            return Validation::Fail(FailureReason::SqlExecutionFailed);
        }
    }

    if answer.citations.is_empty() {
        return Validation::Fail(FailureReason::CitationIncomplete);
    }
    for token in &answer.citations {
        if !evidence.resolves(token) {
            return Validation::Fail(FailureReason::CitationIncomplete);
        }
    }

    Validation::Pass
}

/// Existence-style questions are answerable from an empty result set.
fn zero_rows_acceptable(shape: &FormatHint) -> bool {
    matches!(shape, FormatHint::Bool)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DocChunk, SqlAttempt, SqlError, SqlErrorKind};
    use serde_json::json;

    fn question(hint: Option<&str>) -> Question {
        Question::new("q1", "Total quantity for Beverages?", hint)
    }

    fn answer(value: serde_json::Value, citations: &[&str]) -> Answer {
        Answer {
            value,
            explanation: "derived from evidence".to_string(),
            citations: citations.iter().map(|c| c.to_string()).collect(),
        }
    }

    fn success_attempt(tables: &[&str], rows: usize) -> SqlAttempt {
        SqlAttempt {
            sql: "SELECT ...".to_string(),
            columns: vec!["n".to_string()],
            rows: (0..rows).map(|i| vec![json!(i)]).collect(),
            tables: tables.iter().map(|t| t.to_string()).collect(),
            error: None,
        }
    }

    fn failed_attempt() -> SqlAttempt {
        SqlAttempt {
            sql: "SELECT bad".to_string(),
            columns: vec![],
            rows: vec![],
            tables: vec![],
            error: Some(SqlError {
                kind: SqlErrorKind::Syntax,
                message: "syntax error".to_string(),
            }),
        }
    }

    fn chunk(doc: &str) -> DocChunk {
        DocChunk {
            doc_id: doc.to_string(),
            index: 0,
            text: "text".to_string(),
            score: 1.0,
        }
    }

    #[test]
    fn test_pass_sql_route() {
        let mut evidence = EvidenceStore::new();
        evidence.record_attempt(success_attempt(&["Orders"], 1));
        let v = validate(
            &question(Some("int")),
            Route::Sql,
            &answer(json!(42), &["Orders"]),
            &evidence,
        );
        assert!(v.passed());
    }

    #[test]
    fn test_format_mismatch() {
        let mut evidence = EvidenceStore::new();
        evidence.record_attempt(success_attempt(&["Orders"], 1));
        let v = validate(
            &question(Some("int")),
            Route::Sql,
            &answer(json!("not a number"), &["Orders"]),
            &evidence,
        );
        assert_eq!(v, Validation::Fail(FailureReason::FormatMismatch));
    }

    #[test]
    fn test_sql_failure_detected() {
        let mut evidence = EvidenceStore::new();
        evidence.record_attempt(failed_attempt());
        let v = validate(
            &question(Some("int")),
            Route::Sql,
            &answer(json!(42), &["Orders"]),
            &evidence,
        );
        assert_eq!(v, Validation::Fail(FailureReason::SqlExecutionFailed));
    }

    #[test]
    fn test_zero_rows_fail_for_int_hint() {
        let mut evidence = EvidenceStore::new();
        evidence.record_attempt(success_attempt(&["Orders"], 0));
        let v = validate(
            &question(Some("int")),
            Route::Sql,
            &answer(json!(0), &["Orders"]),
            &evidence,
        );
        assert_eq!(v, Validation::Fail(FailureReason::SqlExecutionFailed));
    }

    #[test]
    fn test_zero_rows_acceptable_for_existence_check() {
        let mut evidence = EvidenceStore::new();
        evidence.record_attempt(success_attempt(&["Orders"], 0));
        let v = validate(
            &question(Some("bool")),
            Route::Sql,
            &answer(json!(false), &["Orders"]),
            &evidence,
        );
        assert!(v.passed());
    }

    #[test]
    fn test_missing_attempt_fails_on_sql_route_but_not_rag() {
        let evidence = EvidenceStore::new();
        let v = validate(
            &question(Some("int")),
            Route::Hybrid,
            &answer(json!(1), &["Orders"]),
            &evidence,
        );
        assert_eq!(v, Validation::Fail(FailureReason::SqlExecutionFailed));

        let mut rag_evidence = EvidenceStore::new();
        rag_evidence.add_chunks(vec![chunk("policy")]);
        let v = validate(
            &question(Some("int")),
            Route::Rag,
            &answer(json!(14), &["policy::chunk0"]),
            &rag_evidence,
        );
        assert!(v.passed());
    }

    #[test]
    fn test_unresolvable_citation_fails() {
        let mut evidence = EvidenceStore::new();
        evidence.add_chunks(vec![chunk("policy")]);
        let v = validate(
            &question(Some("int")),
            Route::Rag,
            &answer(json!(14), &["policy::chunk9"]),
            &evidence,
        );
        assert_eq!(v, Validation::Fail(FailureReason::CitationIncomplete));
    }

    #[test]
    fn test_empty_citations_fail() {
        let mut evidence = EvidenceStore::new();
        evidence.add_chunks(vec![chunk("policy")]);
        let v = validate(
            &question(Some("int")),
            Route::Rag,
            &answer(json!(14), &[]),
            &evidence,
        );
        assert_eq!(v, Validation::Fail(FailureReason::CitationIncomplete));
    }

    #[test]
    fn test_hybrid_without_doc_evidence_can_cite_tables_only() {
        // Zero chunks retrieved; SQL succeeded; answer cites only the table.
        let mut evidence = EvidenceStore::new();
        evidence.record_attempt(success_attempt(&["Orders"], 2));
        let v = validate(
            &question(Some("int")),
            Route::Hybrid,
            &answer(json!(7), &["Orders"]),
            &evidence,
        );
        assert!(v.passed());
    }

    #[test]
    fn test_check_order_format_before_sql() {
        let mut evidence = EvidenceStore::new();
        evidence.record_attempt(failed_attempt());
        // Both format and sql are wrong; format is reported first.
        let v = validate(
            &question(Some("int")),
            Route::Sql,
            &answer(json!("wrong"), &[]),
            &evidence,
        );
        assert_eq!(v, Validation::Fail(FailureReason::FormatMismatch));
    }
}
