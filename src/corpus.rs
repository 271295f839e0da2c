//! Document corpus loading and term-frequency retrieval.
//!
//! Scans a docs directory for markdown files (walkdir + glob filters),
//! splits each file into paragraph chunks, and builds an in-memory
//! term-frequency index. Retrieval scores chunks by cosine similarity
//! between L2-normalized term vectors and returns the top-k positive
//! matches. The exact weighting is collaborator policy; the engine only
//! depends on ranked, scored chunks.

use anyhow::{Context, Result};
use async_trait::async_trait;
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use walkdir::WalkDir;

use crate::chunk::split_text;
use crate::models::DocChunk;
use crate::traits::Retriever;

/// Common English words excluded from term vectors.
const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "has", "in", "is", "it",
    "its", "of", "on", "or", "that", "the", "this", "to", "was", "were", "what", "which", "who",
    "will", "with",
];

#[derive(Debug, Clone)]
struct IndexedChunk {
    doc_id: String,
    index: i64,
    text: String,
    /// L2-normalized term frequencies.
    terms: HashMap<String, f64>,
}

/// In-memory chunk index over a docs directory.
#[derive(Debug, Default)]
pub struct Corpus {
    chunks: Vec<IndexedChunk>,
}

impl Corpus {
    /// Load and index every matching file under `root`. Document ids are
    /// the file stems, matching the `stem::chunkN` citation format.
    pub fn load(root: &Path, include_globs: &[String], max_tokens: usize) -> Result<Corpus> {
        let globs = build_globset(include_globs)?;
        let mut chunks = Vec::new();

        let mut entries: Vec<_> = WalkDir::new(root)
            .follow_links(false)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .collect();
        // Stable document order regardless of filesystem iteration order.
        entries.sort_by(|a, b| a.path().cmp(b.path()));

        for entry in entries {
            let rel = entry.path().strip_prefix(root).unwrap_or(entry.path());
            if !globs.is_match(rel) {
                continue;
            }
            let doc_id = entry
                .path()
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_else(|| rel.to_string_lossy().to_string());
            let body = std::fs::read_to_string(entry.path())
                .with_context(|| format!("failed to read {}", entry.path().display()))?;

            for (index, text) in split_text(&body, max_tokens).into_iter().enumerate() {
                if text.is_empty() {
                    continue;
                }
                let terms = term_vector(&text);
                chunks.push(IndexedChunk {
                    doc_id: doc_id.clone(),
                    index: index as i64,
                    text,
                    terms,
                });
            }
        }

        Ok(Corpus { chunks })
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Chunk counts per document, in document-id order.
    pub fn documents(&self) -> BTreeMap<String, usize> {
        let mut docs = BTreeMap::new();
        for chunk in &self.chunks {
            *docs.entry(chunk.doc_id.clone()).or_insert(0) += 1;
        }
        docs
    }

    /// Rank all chunks against the query and return the top-k with a
    /// positive score, best first.
    pub fn search(&self, query: &str, k: usize) -> Vec<DocChunk> {
        let query_terms = term_vector(query);
        if query_terms.is_empty() {
            return Vec::new();
        }

        let mut scored: Vec<DocChunk> = self
            .chunks
            .iter()
            .filter_map(|chunk| {
                let score = cosine(&query_terms, &chunk.terms);
                if score > 0.0 {
                    Some(DocChunk {
                        doc_id: chunk.doc_id.clone(),
                        index: chunk.index,
                        text: chunk.text.clone(),
                        score,
                    })
                } else {
                    None
                }
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.doc_id.cmp(&b.doc_id))
                .then_with(|| a.index.cmp(&b.index))
        });
        scored.truncate(k);
        scored
    }
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob =
            Glob::new(pattern).with_context(|| format!("invalid include glob: {}", pattern))?;
        builder.add(glob);
    }
    Ok(builder.build()?)
}

/// Lowercased alphanumeric tokens, minus stopwords and single characters.
fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() > 1 && !STOPWORDS.contains(t))
        .map(|t| t.to_string())
        .collect()
}

/// L2-normalized term-frequency vector.
fn term_vector(text: &str) -> HashMap<String, f64> {
    let mut counts: HashMap<String, f64> = HashMap::new();
    for token in tokenize(text) {
        *counts.entry(token).or_insert(0.0) += 1.0;
    }
    let norm: f64 = counts.values().map(|v| v * v).sum::<f64>().sqrt();
    if norm > 0.0 {
        for value in counts.values_mut() {
            *value /= norm;
        }
    }
    counts
}

fn cosine(a: &HashMap<String, f64>, b: &HashMap<String, f64>) -> f64 {
    let (small, large) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    small
        .iter()
        .filter_map(|(term, weight)| large.get(term).map(|other| weight * other))
        .sum()
}

/// Default [`Retriever`] backed by the in-memory corpus index.
pub struct CorpusRetriever {
    corpus: Corpus,
}

impl CorpusRetriever {
    pub fn new(corpus: Corpus) -> Self {
        Self { corpus }
    }
}

#[async_trait]
impl Retriever for CorpusRetriever {
    async fn retrieve(&self, question: &str, k: usize) -> Result<Vec<DocChunk>> {
        Ok(self.corpus.search(question, k))
    }
}
