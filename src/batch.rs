//! JSONL batch runner.
//!
//! Reads one question per line (`{id, question, format_hint}`), runs the
//! engine once per question, and writes one output record per line in the
//! same order. Per-question failures (including unparseable lines) produce
//! a record instead of aborting the batch; runs share no mutable state.

use anyhow::{Context, Result};
use serde_json::Value;
use std::io::Write;
use std::path::Path;

use crate::engine::GraphEngine;
use crate::models::{OutputRecord, Question};

pub async fn run_batch(engine: &GraphEngine, input: &Path, out: &Path) -> Result<()> {
    let raw = std::fs::read_to_string(input)
        .with_context(|| format!("failed to read questions file: {}", input.display()))?;

    let mut records = Vec::new();
    for (lineno, line) in raw.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let record = match serde_json::from_str::<Question>(line) {
            Ok(question) => {
                println!("question {} ({})", records.len() + 1, question.id);
                let outcome = engine.run(&question).await;
                println!(
                    "  route: {}  repairs: {}  confidence: {:.2}",
                    outcome.route.map(|r| r.as_str()).unwrap_or("-"),
                    outcome.repair_count,
                    outcome.record.confidence
                );
                outcome.record
            }
            Err(err) => {
                println!("question {} (unparseable line)", records.len() + 1);
                OutputRecord {
                    id: format!("line-{}", lineno + 1),
                    final_answer: Value::Null,
                    sql: String::new(),
                    confidence: 0.0,
                    explanation: format!("invalid input record: {}", err),
                    citations: Vec::new(),
                }
            }
        };
        records.push(record);
    }

    let mut file = std::fs::File::create(out)
        .with_context(|| format!("failed to create output file: {}", out.display()))?;
    for record in &records {
        serde_json::to_writer(&mut file, record)?;
        file.write_all(b"\n")?;
    }

    println!("ok: {} records written to {}", records.len(), out.display());
    Ok(())
}
