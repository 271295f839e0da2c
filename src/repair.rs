//! Repair planning after a failed validation.
//!
//! Maps each failure reason onto a hint for the next generation/synthesis
//! round and, where useful, additional constraints. A repair never changes
//! the route and never clears accumulated evidence; it only refines the
//! inputs to the next attempt.

use crate::evidence::EvidenceStore;
use crate::models::{Constraints, FailureReason, Question};

/// Mutations to apply before the next attempt.
#[derive(Debug)]
pub struct RepairPlan {
    /// Passed to the next query-generation and synthesis calls.
    pub hint: String,
    /// Merged into the run's constraints (insert/override only).
    pub constraints: Constraints,
}

pub fn plan_repair(
    reason: FailureReason,
    question: &Question,
    evidence: &EvidenceStore,
) -> RepairPlan {
    let mut constraints = Constraints::new();

    let hint = match reason {
        FailureReason::SqlExecutionFailed => {
            let detail = evidence
                .last_attempt()
                .and_then(|a| a.error.as_ref())
                .map(|e| e.message.clone())
                .unwrap_or_else(|| "the query returned no rows".to_string());
            constraints.set("last_sql_error", &detail);
            format!(
                "The previous SQL attempt failed: {}. Generate a corrected query that avoids this error; quote multi-word table names.",
                detail
            )
        }
        FailureReason::CitationIncomplete => {
            let universe = evidence.citation_universe();
            format!(
                "Cite only evidence actually present. Available citations: [{}].",
                universe.join(", ")
            )
        }
        FailureReason::FormatMismatch => {
            let expected = question.format_hint.as_deref().unwrap_or("any non-null value");
            format!("The answer must match the expected shape `{}` exactly.", expected)
        }
    };

    RepairPlan { hint, constraints }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SqlAttempt, SqlError, SqlErrorKind};

    fn failed_evidence(message: &str) -> EvidenceStore {
        let mut evidence = EvidenceStore::new();
        evidence.record_attempt(SqlAttempt {
            sql: "SELECT * FROM Order Details".to_string(),
            columns: vec![],
            rows: vec![],
            tables: vec![],
            error: Some(SqlError {
                kind: SqlErrorKind::Syntax,
                message: message.to_string(),
            }),
        });
        evidence
    }

    #[test]
    fn test_sql_failure_hint_carries_error_message() {
        let question = Question::new("q1", "Total quantity?", Some("int"));
        let evidence = failed_evidence("near \"Details\": syntax error");
        let plan = plan_repair(FailureReason::SqlExecutionFailed, &question, &evidence);
        assert!(plan.hint.contains("near \"Details\": syntax error"));
        assert_eq!(
            plan.constraints.get("last_sql_error"),
            Some("near \"Details\": syntax error")
        );
    }

    #[test]
    fn test_citation_hint_lists_universe() {
        let question = Question::new("q1", "Return policy?", Some("int"));
        let mut evidence = EvidenceStore::new();
        evidence.add_chunks(vec![crate::models::DocChunk {
            doc_id: "product_policy".to_string(),
            index: 0,
            text: "14 days".to_string(),
            score: 1.0,
        }]);
        let plan = plan_repair(FailureReason::CitationIncomplete, &question, &evidence);
        assert!(plan.hint.contains("product_policy::chunk0"));
        assert!(plan.constraints.is_empty());
    }

    #[test]
    fn test_format_hint_names_expected_shape() {
        let question = Question::new("q1", "Top category?", Some("{category:str, quantity:int}"));
        let plan = plan_repair(
            FailureReason::FormatMismatch,
            &question,
            &EvidenceStore::new(),
        );
        assert!(plan.hint.contains("{category:str, quantity:int}"));
    }
}
