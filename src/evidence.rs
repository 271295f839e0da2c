//! Append-only evidence accumulated across one run.
//!
//! The store holds every retrieved document chunk and every SQL execution
//! attempt, in arrival order. Nothing is discarded on repair: superseded
//! attempts stay recorded so the repair controller can inspect prior
//! failures and the citation universe stays reproducible.

use crate::models::{DocChunk, Route, SqlAttempt};

#[derive(Debug, Default)]
pub struct EvidenceStore {
    chunks: Vec<DocChunk>,
    attempts: Vec<SqlAttempt>,
}

impl EvidenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append retrieved chunks, preserving retrieval order. A chunk whose
    /// token is already present is skipped so repeated retrieval cannot
    /// double-count evidence.
    pub fn add_chunks(&mut self, chunks: Vec<DocChunk>) {
        for chunk in chunks {
            if !self.chunks.iter().any(|c| c.token() == chunk.token()) {
                self.chunks.push(chunk);
            }
        }
    }

    /// Append one SQL attempt, successful or not.
    pub fn record_attempt(&mut self, attempt: SqlAttempt) {
        self.attempts.push(attempt);
    }

    pub fn chunks(&self) -> &[DocChunk] {
        &self.chunks
    }

    pub fn attempts(&self) -> &[SqlAttempt] {
        &self.attempts
    }

    pub fn last_attempt(&self) -> Option<&SqlAttempt> {
        self.attempts.last()
    }

    pub fn last_success(&self) -> Option<&SqlAttempt> {
        self.attempts.iter().rev().find(|a| a.succeeded())
    }

    /// Citation tokens of every chunk ever retrieved, in retrieval order.
    pub fn chunk_tokens(&self) -> Vec<String> {
        self.chunks.iter().map(|c| c.token()).collect()
    }

    /// All tokens an answer may legitimately cite: document tokens of every
    /// retrieved chunk plus tables referenced by the last successful attempt.
    pub fn citation_universe(&self) -> Vec<String> {
        let mut universe = self.chunk_tokens();
        if let Some(attempt) = self.last_success() {
            for table in &attempt.tables {
                if !universe.contains(table) {
                    universe.push(table.clone());
                }
            }
        }
        universe
    }

    /// Whether a citation token resolves to evidence actually present.
    pub fn resolves(&self, token: &str) -> bool {
        if self.chunks.iter().any(|c| c.token() == token) {
            return true;
        }
        self.last_success()
            .map(|a| a.tables.iter().any(|t| t == token))
            .unwrap_or(false)
    }
}

// ============ Confidence scoring ============

/// Deterministic additive confidence heuristic, clamped to [0, 1]:
/// base 0.5, +0.3 when the last SQL attempt succeeded (vacuous on the rag
/// route), +0.1 when any chunk was retrieved, +0.1 for a non-empty
/// explanation, and -0.15 per consumed repair.
pub fn score_confidence(
    route: Route,
    store: &EvidenceStore,
    explanation: &str,
    repairs: u32,
) -> f64 {
    let mut confidence = 0.5;

    let sql_ok = match route {
        Route::Rag => true,
        _ => store.last_attempt().map(|a| a.succeeded()).unwrap_or(false),
    };
    if sql_ok {
        confidence += 0.3;
    }
    if !store.chunks().is_empty() {
        confidence += 0.1;
    }
    if !explanation.trim().is_empty() {
        confidence += 0.1;
    }
    confidence -= 0.15 * repairs as f64;

    confidence.clamp(0.0, 1.0)
}
