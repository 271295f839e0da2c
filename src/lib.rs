//! # datasage
//!
//! A hybrid RAG + SQL agent for natural-language analytics questions.
//!
//! datasage answers questions over a read-only SQLite database and a small
//! markdown document corpus. A bounded-iteration state machine routes each
//! question to a retrieval path, a SQL path, or both, merges the gathered
//! evidence into a typed answer with citations, validates it, and repairs
//! failed attempts a fixed number of times before emitting a best-effort
//! record.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌───────────┐   ┌───────────────┐
//! │  Router   │──▶│ Retriever │──▶│    Planner    │
//! └────┬─────┘   └───────────┘   └──────┬────────┘
//!      │ (sql)                          ▼
//!      │         ┌───────────┐   ┌───────────────┐
//!      └────────▶│ Generator │──▶│   Executor    │
//!                └───────────┘   └──────┬────────┘
//!                                       ▼
//!                ┌───────────┐   ┌───────────────┐
//!                │ Validator │◀──│  Synthesizer  │
//!                └────┬──────┘   └───────────────┘
//!                     │ fail (≤ max_repairs)
//!                     ▼
//!                ┌───────────┐
//!                │  Repair   │──▶ back to Generator
//!                └───────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types and format hints |
//! | [`evidence`] | Append-only evidence store and confidence scoring |
//! | [`traits`] | Collaborator contracts (router, retriever, generator, executor, synthesizer) |
//! | [`chunk`] | Paragraph-boundary text chunking |
//! | [`corpus`] | Corpus loading and term-frequency retrieval |
//! | [`db`] | Read-only SQLite connection |
//! | [`executor`] | SQL execution, error classification, schema introspection |
//! | [`planner`] | Constraint extraction from retrieved chunks |
//! | [`llm`] | Ollama-compatible text-generation client |
//! | [`route`] | Keyword and model-backed question classification |
//! | [`generate`] | Template and model-backed SQL generation |
//! | [`synthesize`] | Deterministic answer synthesis |
//! | [`validate`] | Format, SQL-success, and citation checks |
//! | [`repair`] | Repair planning for failed validations |
//! | [`engine`] | The state machine driving a run |
//! | [`batch`] | JSONL batch entrypoint |

pub mod batch;
pub mod chunk;
pub mod config;
pub mod corpus;
pub mod db;
pub mod engine;
pub mod evidence;
pub mod executor;
pub mod generate;
pub mod llm;
pub mod models;
pub mod planner;
pub mod repair;
pub mod route;
pub mod synthesize;
pub mod traits;
pub mod validate;
