//! # datasage CLI (`sage`)
//!
//! The `sage` binary answers natural-language analytics questions over a
//! read-only SQLite database and a markdown document corpus.
//!
//! ## Usage
//!
//! ```bash
//! sage --config ./config/sage.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `sage ask "<question>"` | Answer a single question and print the record |
//! | `sage batch --input q.jsonl --out r.jsonl` | Answer a file of questions |
//! | `sage schema` | Print the introspected database schema |
//! | `sage corpus` | List loaded corpus documents and chunk counts |
//!
//! ## Examples
//!
//! ```bash
//! # One-off question with an expected answer shape
//! sage ask "Total revenue from Beverages during Summer 1997?" --format-hint float
//!
//! # Batch mode: one JSON object per line {id, question, format_hint}
//! sage batch --input questions.jsonl --out results.jsonl
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use datasage::batch::run_batch;
use datasage::config::{load_config, Config};
use datasage::corpus::{Corpus, CorpusRetriever};
use datasage::db;
use datasage::engine::GraphEngine;
use datasage::executor::SqliteExecutor;
use datasage::generate::{ModelGenerator, TemplateGenerator};
use datasage::llm::LlmClient;
use datasage::models::Question;
use datasage::route::{KeywordRouter, ModelRouter};
use datasage::synthesize::EvidenceSynthesizer;
use datasage::traits::{QueryGenerator, Router, SqlExecutor};

/// datasage — a hybrid RAG + SQL agent for natural-language analytics
/// questions.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/sage.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "sage",
    about = "datasage — a hybrid RAG + SQL agent for natural-language analytics questions",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/sage.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Answer a single question and print the output record as JSON.
    Ask {
        /// The question text.
        question: String,

        /// Expected answer shape, e.g. `int`, `float`, `list[str]`,
        /// `{category:str, quantity:int}`.
        #[arg(long)]
        format_hint: Option<String>,
    },

    /// Answer a JSONL file of questions, writing one record per line.
    ///
    /// Input lines are `{id, question, format_hint}`. Output order matches
    /// input order; per-question failures produce a record with zero
    /// confidence instead of aborting the batch.
    Batch {
        /// Path to the input questions file (JSONL).
        #[arg(long)]
        input: PathBuf,

        /// Path to the output records file (JSONL).
        #[arg(long)]
        out: PathBuf,
    },

    /// Print the introspected database schema.
    Schema,

    /// List corpus documents and their chunk counts.
    Corpus,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::Ask {
            question,
            format_hint,
        } => {
            let engine = build_engine(&config).await?;
            let question = Question::new("adhoc", &question, format_hint.as_deref());
            let outcome = engine.run(&question).await;
            println!("{}", serde_json::to_string_pretty(&outcome.record)?);
        }
        Commands::Batch { input, out } => {
            let engine = build_engine(&config).await?;
            run_batch(&engine, &input, &out).await?;
        }
        Commands::Schema => {
            let pool = db::connect_read_only(&config.db.path).await?;
            let executor = SqliteExecutor::new(pool);
            println!("{}", executor.schema().await?);
        }
        Commands::Corpus => {
            let corpus = Corpus::load(
                &config.corpus.root,
                &config.corpus.include_globs,
                config.chunking.max_tokens,
            )?;
            for (doc, count) in corpus.documents() {
                println!("{}  {} chunks", doc, count);
            }
            println!("total: {} chunks", corpus.chunk_count());
        }
    }

    Ok(())
}

/// Wire the default collaborators from configuration. With the model
/// provider disabled the agent is fully deterministic.
async fn build_engine(config: &Config) -> Result<GraphEngine> {
    let pool = db::connect_read_only(&config.db.path).await?;
    let executor = SqliteExecutor::new(pool);

    let corpus = Corpus::load(
        &config.corpus.root,
        &config.corpus.include_globs,
        config.chunking.max_tokens,
    )?;
    let retriever = CorpusRetriever::new(corpus);

    let (router, generator): (Box<dyn Router>, Box<dyn QueryGenerator>) =
        if config.model.is_enabled() {
            let llm = LlmClient::new(&config.model)?;
            (
                Box::new(ModelRouter::new(llm.clone())),
                Box::new(ModelGenerator::new(llm)),
            )
        } else {
            (Box::new(KeywordRouter), Box::new(TemplateGenerator))
        };

    Ok(GraphEngine::new(
        router,
        Box::new(retriever),
        generator,
        Box::new(executor),
        Box::new(EvidenceSynthesizer),
        config.engine.max_repairs,
        config.retrieval.top_k,
    ))
}
