//! The answer engine: a bounded-iteration state machine.
//!
//! One run per question. States:
//!
//! ```text
//! Route ──▶ RetrievePlan (rag/hybrid) ──▶ GenerateExecute (sql/hybrid)
//!                                              │
//!                  ┌───────────────────────────▼
//!                  │                      Synthesize ──▶ Validate
//!                  │                                        │
//!                  │            pass ──▶ Done               │
//!                  └── repair ◀── fail, attempts remain ◀───┤
//!                                 fail, exhausted ──▶ Exhausted
//! ```
//!
//! The route is decided once and never changes; repair re-enters at
//! GenerateExecute (or directly at Synthesize on the rag path, which has
//! no SQL stage) without re-fetching documents. Evidence accumulates
//! append-only across attempts. Termination is guaranteed: every iteration
//! of the repair loop increments `repair_count`, which is bounded by
//! `max_repairs`.
//!
//! A collaborator returning `Err` aborts only that question's run; the
//! engine still emits a minimally valid record so a batch never crashes.

use anyhow::Result;
use serde_json::Value;
use uuid::Uuid;

use crate::evidence::{score_confidence, EvidenceStore};
use crate::models::{
    Answer, Constraints, FailureReason, OutputRecord, Question, Route, Validation,
};
use crate::planner::derive_constraints;
use crate::repair::plan_repair;
use crate::traits::{QueryGenerator, Retriever, Router, SqlExecutor, Synthesizer};
use crate::validate::validate;

/// One trace entry per node visit, for debugging and tests.
#[derive(Debug, Clone)]
pub struct TraceEvent {
    pub node: &'static str,
    pub detail: String,
}

/// Terminal result of one run.
#[derive(Debug)]
pub struct RunOutcome {
    pub run_id: String,
    pub record: OutputRecord,
    pub route: Option<Route>,
    pub repair_count: u32,
    pub exhausted: bool,
    pub trace: Vec<TraceEvent>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Route,
    RetrievePlan,
    GenerateExecute,
    Synthesize,
    Validate,
    Done,
    Exhausted,
}

/// Per-run mutable state threaded through the machine. Private to one
/// question's run; the engine holds no cross-run state.
struct AttemptState {
    route: Option<Route>,
    constraints: Constraints,
    evidence: EvidenceStore,
    answer: Option<Answer>,
    hint: Option<String>,
    repair_count: u32,
    failure: Option<FailureReason>,
}

impl AttemptState {
    fn new() -> Self {
        Self {
            route: None,
            constraints: Constraints::new(),
            evidence: EvidenceStore::new(),
            answer: None,
            hint: None,
            repair_count: 0,
            failure: None,
        }
    }
}

pub struct GraphEngine {
    router: Box<dyn Router>,
    retriever: Box<dyn Retriever>,
    generator: Box<dyn QueryGenerator>,
    executor: Box<dyn SqlExecutor>,
    synthesizer: Box<dyn Synthesizer>,
    max_repairs: u32,
    top_k: usize,
}

impl GraphEngine {
    pub fn new(
        router: Box<dyn Router>,
        retriever: Box<dyn Retriever>,
        generator: Box<dyn QueryGenerator>,
        executor: Box<dyn SqlExecutor>,
        synthesizer: Box<dyn Synthesizer>,
        max_repairs: u32,
        top_k: usize,
    ) -> Self {
        Self {
            router,
            retriever,
            generator,
            executor,
            synthesizer,
            max_repairs,
            top_k,
        }
    }

    /// Run one question to a terminal state. Never returns an error and
    /// never panics: collaborator outages yield a minimal record.
    pub async fn run(&self, question: &Question) -> RunOutcome {
        let run_id = Uuid::new_v4().to_string();
        let mut trace = Vec::new();
        let mut state = AttemptState::new();

        match self.drive(question, &mut state, &mut trace).await {
            Ok(exhausted) => {
                let record = self.emit(question, &state, exhausted);
                RunOutcome {
                    run_id,
                    record,
                    route: state.route,
                    repair_count: state.repair_count,
                    exhausted,
                    trace,
                }
            }
            Err(err) => {
                trace.push(TraceEvent {
                    node: "abort",
                    detail: format!("{:#}", err),
                });
                RunOutcome {
                    run_id,
                    record: OutputRecord {
                        id: question.id.clone(),
                        final_answer: Value::Null,
                        sql: state
                            .evidence
                            .last_attempt()
                            .map(|a| a.sql.clone())
                            .unwrap_or_default(),
                        confidence: 0.0,
                        explanation: format!("run aborted: {:#}", err),
                        citations: Vec::new(),
                    },
                    route: state.route,
                    repair_count: state.repair_count,
                    exhausted: true,
                    trace,
                }
            }
        }
    }

    /// Step the machine until a terminal state. Returns whether the run
    /// ended exhausted. Collaborator errors propagate to `run`.
    async fn drive(
        &self,
        question: &Question,
        st: &mut AttemptState,
        trace: &mut Vec<TraceEvent>,
    ) -> Result<bool> {
        let mut state = State::Route;

        loop {
            state = match state {
                State::Route => {
                    let route = self.router.classify(&question.question).await?;
                    st.route = Some(route);
                    trace.push(TraceEvent {
                        node: "router",
                        detail: route.as_str().to_string(),
                    });
                    if route.uses_docs() {
                        State::RetrievePlan
                    } else {
                        State::GenerateExecute
                    }
                }

                State::RetrievePlan => {
                    let chunks = self
                        .retriever
                        .retrieve(&question.question, self.top_k)
                        .await?;
                    trace.push(TraceEvent {
                        node: "retriever",
                        detail: format!("{} chunks", chunks.len()),
                    });
                    // Zero chunks is a valid state; the run proceeds.
                    st.evidence.add_chunks(chunks);

                    let derived = derive_constraints(&question.question, st.evidence.chunks());
                    st.constraints.merge(&derived);
                    trace.push(TraceEvent {
                        node: "planner",
                        detail: format!("{} constraints", st.constraints.len()),
                    });

                    if self.route(st).uses_sql() {
                        State::GenerateExecute
                    } else {
                        State::Synthesize
                    }
                }

                State::GenerateExecute => {
                    let schema = self.executor.schema().await?;
                    let sql = self
                        .generator
                        .generate_sql(
                            &question.question,
                            &schema,
                            &st.constraints,
                            st.hint.as_deref(),
                        )
                        .await?;
                    trace.push(TraceEvent {
                        node: "generator",
                        detail: format!("{} chars", sql.len()),
                    });

                    let attempt = self.executor.execute(&sql).await?;
                    trace.push(TraceEvent {
                        node: "executor",
                        detail: match &attempt.error {
                            Some(e) => format!("error: {}", e.message),
                            None => format!("{} rows", attempt.rows.len()),
                        },
                    });
                    // Recorded regardless of outcome; a failure surfaces
                    // through validation, not here.
                    st.evidence.record_attempt(attempt);
                    State::Synthesize
                }

                State::Synthesize => {
                    let answer = self
                        .synthesizer
                        .synthesize(question, &st.evidence, &st.constraints, st.hint.as_deref())
                        .await?;
                    trace.push(TraceEvent {
                        node: "synthesizer",
                        detail: answer.value.to_string(),
                    });
                    st.answer = Some(answer);
                    State::Validate
                }

                State::Validate => {
                    let answer = st.answer.as_ref().ok_or_else(|| {
                        anyhow::anyhow!("synthesizer produced no answer")
                    })?;
                    let verdict = validate(question, self.route(st), answer, &st.evidence);
                    match verdict {
                        Validation::Pass => {
                            trace.push(TraceEvent {
                                node: "validator",
                                detail: "pass".to_string(),
                            });
                            State::Done
                        }
                        Validation::Fail(reason) if st.repair_count < self.max_repairs => {
                            st.repair_count += 1;
                            let plan = plan_repair(reason, question, &st.evidence);
                            st.constraints.merge(&plan.constraints);
                            st.hint = Some(plan.hint);
                            trace.push(TraceEvent {
                                node: "repair",
                                detail: format!(
                                    "attempt {} after {}",
                                    st.repair_count,
                                    reason.as_str()
                                ),
                            });
                            if self.route(st).uses_sql() {
                                State::GenerateExecute
                            } else {
                                State::Synthesize
                            }
                        }
                        Validation::Fail(reason) => {
                            st.failure = Some(reason);
                            trace.push(TraceEvent {
                                node: "validator",
                                detail: format!("exhausted after {}", reason.as_str()),
                            });
                            State::Exhausted
                        }
                    }
                }

                State::Done => return Ok(false),
                State::Exhausted => return Ok(true),
            };
        }
    }

    fn route(&self, st: &AttemptState) -> Route {
        // Set in the first transition; only reachable afterwards.
        st.route.unwrap_or(Route::Hybrid)
    }

    /// Build the output record from the terminal state. The best available
    /// answer is emitted unmodified; exhausted runs get a penalized
    /// confidence and an explanation noting the unresolved failure.
    fn emit(&self, question: &Question, st: &AttemptState, exhausted: bool) -> OutputRecord {
        let answer = st.answer.clone().unwrap_or(Answer {
            value: Value::Null,
            explanation: String::new(),
            citations: Vec::new(),
        });

        let confidence = score_confidence(
            self.route(st),
            &st.evidence,
            &answer.explanation,
            st.repair_count,
        );

        let mut explanation = answer.explanation;
        if exhausted {
            if let Some(reason) = st.failure {
                explanation.push_str(&format!(
                    " Unresolved validation failure after {} repair attempt(s): {}.",
                    st.repair_count,
                    reason.as_str()
                ));
            }
        }

        OutputRecord {
            id: question.id.clone(),
            final_answer: answer.value,
            sql: st
                .evidence
                .last_attempt()
                .map(|a| a.sql.clone())
                .unwrap_or_default(),
            confidence,
            explanation: explanation.trim().to_string(),
            citations: answer.citations,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DocChunk, SqlAttempt};
    use async_trait::async_trait;
    use serde_json::json;

    struct FixedRouter(Route);
    #[async_trait]
    impl Router for FixedRouter {
        async fn classify(&self, _q: &str) -> Result<Route> {
            Ok(self.0)
        }
    }

    struct NoDocs;
    #[async_trait]
    impl Retriever for NoDocs {
        async fn retrieve(&self, _q: &str, _k: usize) -> Result<Vec<DocChunk>> {
            Ok(Vec::new())
        }
    }

    struct EchoGenerator;
    #[async_trait]
    impl QueryGenerator for EchoGenerator {
        async fn generate_sql(
            &self,
            _q: &str,
            _schema: &str,
            _c: &Constraints,
            _hint: Option<&str>,
        ) -> Result<String> {
            Ok("SELECT 1 FROM Orders".to_string())
        }
    }

    /// Always fails execution, so validation can never pass.
    struct AlwaysFailExecutor;
    #[async_trait]
    impl SqlExecutor for AlwaysFailExecutor {
        async fn execute(&self, sql: &str) -> Result<SqlAttempt> {
            Ok(SqlAttempt {
                sql: sql.to_string(),
                columns: vec![],
                rows: vec![],
                tables: vec![],
                error: Some(crate::models::SqlError {
                    kind: crate::models::SqlErrorKind::Syntax,
                    message: "syntax error".to_string(),
                }),
            })
        }
        async fn schema(&self) -> Result<String> {
            Ok("Table: Orders".to_string())
        }
    }

    struct NullSynthesizer;
    #[async_trait]
    impl Synthesizer for NullSynthesizer {
        async fn synthesize(
            &self,
            _q: &Question,
            _e: &EvidenceStore,
            _c: &Constraints,
            _h: Option<&str>,
        ) -> Result<Answer> {
            Ok(Answer {
                value: json!(0),
                explanation: "best effort".to_string(),
                citations: vec!["Orders".to_string()],
            })
        }
    }

    struct BrokenRouter;
    #[async_trait]
    impl Router for BrokenRouter {
        async fn classify(&self, _q: &str) -> Result<Route> {
            anyhow::bail!("model endpoint unreachable")
        }
    }

    fn engine_with(router: Box<dyn Router>) -> GraphEngine {
        GraphEngine::new(
            router,
            Box::new(NoDocs),
            Box::new(EchoGenerator),
            Box::new(AlwaysFailExecutor),
            Box::new(NullSynthesizer),
            2,
            3,
        )
    }

    #[tokio::test]
    async fn test_repair_loop_terminates_at_bound() {
        let engine = engine_with(Box::new(FixedRouter(Route::Sql)));
        let question = Question::new("q1", "Total revenue?", Some("int"));
        let outcome = engine.run(&question).await;

        assert!(outcome.exhausted);
        assert_eq!(outcome.repair_count, 2);
        // One attempt per generation round: initial + two repairs.
        let executor_visits = outcome
            .trace
            .iter()
            .filter(|e| e.node == "executor")
            .count();
        assert_eq!(executor_visits, 3);
        assert!(outcome.record.explanation.contains("sql_execution_failed"));
    }

    #[tokio::test]
    async fn test_collaborator_outage_yields_minimal_record() {
        let engine = engine_with(Box::new(BrokenRouter));
        let question = Question::new("q1", "Total revenue?", Some("int"));
        let outcome = engine.run(&question).await;

        assert_eq!(outcome.record.id, "q1");
        assert_eq!(outcome.record.final_answer, Value::Null);
        assert_eq!(outcome.record.confidence, 0.0);
        assert!(outcome.record.explanation.contains("model endpoint unreachable"));
        assert!(outcome.record.citations.is_empty());
    }

    #[tokio::test]
    async fn test_confidence_bounds_on_exhausted_run() {
        let engine = engine_with(Box::new(FixedRouter(Route::Sql)));
        let question = Question::new("q1", "Total revenue?", Some("int"));
        let outcome = engine.run(&question).await;
        assert!((0.0..=1.0).contains(&outcome.record.confidence));
        // base 0.5, no sql bonus, no chunks, +0.1 explanation, -0.3 repairs
        assert!((outcome.record.confidence - 0.3).abs() < 1e-9);
    }
}
