//! Question classification into an evidence path.
//!
//! [`KeywordRouter`] is the deterministic default: questions mentioning
//! policy or documentation terms take the rag path, questions mentioning
//! aggregate metrics take the sql path, and questions mentioning both take
//! the hybrid path. [`ModelRouter`] asks the configured model and falls
//! back to keywords on any failure or unparseable reply.

use anyhow::Result;
use async_trait::async_trait;

use crate::llm::LlmClient;
use crate::models::Route;
use crate::traits::Router;

const DOC_KEYWORDS: &[&str] = &[
    "policy", "return", "marketing", "calendar", "kpi", "according", "document", "defined",
];
const SQL_KEYWORDS: &[&str] = &[
    "revenue", "top", "total", "quantity", "customer", "margin", "average", "count", "how many",
    "sum",
];

/// Deterministic keyword classifier.
pub struct KeywordRouter;

impl KeywordRouter {
    pub fn classify_keywords(question: &str) -> Route {
        let q = question.to_lowercase();
        let has_docs = DOC_KEYWORDS.iter().any(|kw| q.contains(kw));
        let has_sql = SQL_KEYWORDS.iter().any(|kw| q.contains(kw));

        match (has_docs, has_sql) {
            (true, true) => Route::Hybrid,
            (true, false) => Route::Rag,
            _ => Route::Sql,
        }
    }
}

#[async_trait]
impl Router for KeywordRouter {
    async fn classify(&self, question: &str) -> Result<Route> {
        Ok(Self::classify_keywords(question))
    }
}

/// Model-backed classifier with keyword fallback.
pub struct ModelRouter {
    llm: LlmClient,
}

impl ModelRouter {
    pub fn new(llm: LlmClient) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl Router for ModelRouter {
    async fn classify(&self, question: &str) -> Result<Route> {
        let prompt = format!(
            "Classify this retail analytics question by the evidence needed to answer it.\n\
             Answer with exactly one word: rag (documents only), sql (database only), \
             or hybrid (both).\n\nQuestion: {}\nAnswer:",
            question
        );

        let route = match self.llm.generate(&prompt).await {
            Ok(reply) => parse_route(&reply)
                .unwrap_or_else(|| KeywordRouter::classify_keywords(question)),
            Err(_) => KeywordRouter::classify_keywords(question),
        };
        Ok(route)
    }
}

/// Lenient reply parsing: a reply naming both paths means hybrid.
fn parse_route(reply: &str) -> Option<Route> {
    let reply = reply.to_lowercase();
    let has_rag = reply.contains("rag");
    let has_sql = reply.contains("sql");
    match (has_rag, has_sql) {
        (true, true) => Some(Route::Hybrid),
        _ if reply.contains("hybrid") => Some(Route::Hybrid),
        (true, false) => Some(Route::Rag),
        (false, true) => Some(Route::Sql),
        _ => None,
    }
}
