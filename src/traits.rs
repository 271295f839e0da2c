//! Collaborator contracts consumed by the answer engine.
//!
//! The engine drives five delegates: a router that classifies questions,
//! a retriever over the document corpus, a SQL generator, an executor over
//! the analytics database, and an answer synthesizer. Each is a trait so
//! the state machine and repair loop can be exercised with deterministic
//! stub implementations, fully decoupled from any model runtime.
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │                  GraphEngine                  │
//! │  route → retrieve/plan → generate/execute →   │
//! │  synthesize → validate → (repair loop)        │
//! └──┬────────┬──────────┬──────────┬────────┬────┘
//!    ▼        ▼          ▼          ▼        ▼
//!  Router  Retriever  QueryGen  SqlExecutor  Synthesizer
//! ```
//!
//! Default implementations ship with the crate: keyword or model-backed
//! routing ([`crate::route`]), TF-scored corpus retrieval
//! ([`crate::corpus`]), template or model-backed SQL generation
//! ([`crate::generate`]), read-only SQLite execution ([`crate::executor`]),
//! and deterministic evidence synthesis ([`crate::synthesize`]).
//!
//! Any `Err` returned from these methods is treated by the engine as a
//! collaborator outage: the run is aborted and a minimal output record is
//! emitted, but the batch continues.

use anyhow::Result;
use async_trait::async_trait;

use crate::evidence::EvidenceStore;
use crate::models::{Answer, Constraints, DocChunk, Question, Route, SqlAttempt};

/// Classifies a question into an evidence path.
#[async_trait]
pub trait Router: Send + Sync {
    async fn classify(&self, question: &str) -> Result<Route>;
}

/// Returns ranked document chunks for a question. An empty result is a
/// valid zero-evidence state, not an error.
#[async_trait]
pub trait Retriever: Send + Sync {
    async fn retrieve(&self, question: &str, k: usize) -> Result<Vec<DocChunk>>;
}

/// Produces one SQL statement from the question, the database schema, the
/// planner's constraints, and an optional repair hint carrying the prior
/// failure.
#[async_trait]
pub trait QueryGenerator: Send + Sync {
    async fn generate_sql(
        &self,
        question: &str,
        schema: &str,
        constraints: &Constraints,
        hint: Option<&str>,
    ) -> Result<String>;
}

/// Executes a statement against the read-only analytics database.
///
/// Execution failure is not an `Err`: it is returned as a [`SqlAttempt`]
/// carrying a structured error, so the validator and repair controller can
/// react to it. `Err` is reserved for the connection itself being unusable.
#[async_trait]
pub trait SqlExecutor: Send + Sync {
    async fn execute(&self, sql: &str) -> Result<SqlAttempt>;

    /// Renders the database schema for the query generator.
    async fn schema(&self) -> Result<String>;
}

/// Builds a typed answer from the accumulated evidence.
///
/// Must always produce some [`Answer`], even from empty or erroring
/// evidence; the explanation should acknowledge the gap rather than the
/// pipeline aborting.
#[async_trait]
pub trait Synthesizer: Send + Sync {
    async fn synthesize(
        &self,
        question: &Question,
        evidence: &EvidenceStore,
        constraints: &Constraints,
        hint: Option<&str>,
    ) -> Result<Answer>;
}
