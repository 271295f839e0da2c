//! SQL execution against the read-only analytics database.
//!
//! Wraps a sqlx SQLite pool behind the [`SqlExecutor`] contract. Driver
//! failures are captured as structured [`SqlError`]s on the returned
//! attempt rather than raised, so the validator and repair controller can
//! react to them. Also provides schema introspection for the query
//! generator and FROM/JOIN table extraction for citations.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Row, SqlitePool};

use crate::models::{SqlAttempt, SqlError, SqlErrorKind};
use crate::traits::SqlExecutor;

/// Default [`SqlExecutor`] over a shared read-only pool.
pub struct SqliteExecutor {
    pool: SqlitePool,
}

impl SqliteExecutor {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SqlExecutor for SqliteExecutor {
    async fn execute(&self, sql: &str) -> Result<SqlAttempt> {
        let tables = referenced_tables(sql);

        if sql.trim().is_empty() {
            return Ok(SqlAttempt {
                sql: sql.to_string(),
                columns: Vec::new(),
                rows: Vec::new(),
                tables,
                error: Some(SqlError {
                    kind: SqlErrorKind::Other,
                    message: "empty sql statement".to_string(),
                }),
            });
        }

        match sqlx::query(sql).fetch_all(&self.pool).await {
            Ok(rows) => {
                let columns = rows
                    .first()
                    .map(|row| {
                        row.columns()
                            .iter()
                            .map(|c| c.name().to_string())
                            .collect()
                    })
                    .unwrap_or_default();
                let rows = rows.iter().map(decode_row).collect();
                Ok(SqlAttempt {
                    sql: sql.to_string(),
                    columns,
                    rows,
                    tables,
                    error: None,
                })
            }
            Err(err) => {
                let message = err.to_string();
                Ok(SqlAttempt {
                    sql: sql.to_string(),
                    columns: Vec::new(),
                    rows: Vec::new(),
                    tables,
                    error: Some(SqlError {
                        kind: classify_error(&message),
                        message,
                    }),
                })
            }
        }
    }

    async fn schema(&self) -> Result<String> {
        let tables: Vec<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut parts = Vec::new();
        for table in &tables {
            parts.push(format!("Table: {}", table));
            let pragma = format!("PRAGMA table_info(\"{}\")", table.replace('"', "\"\""));
            let columns = sqlx::query(&pragma).fetch_all(&self.pool).await?;
            for col in &columns {
                let name: String = col.get("name");
                let ty: String = col.get("type");
                parts.push(format!("  {} ({})", name, ty));
            }
        }
        Ok(parts.join("\n"))
    }
}

/// Decode a row into JSON values: integers, reals, and text map directly;
/// anything else becomes null.
fn decode_row(row: &SqliteRow) -> Vec<Value> {
    (0..row.columns().len())
        .map(|i| {
            if let Ok(v) = row.try_get::<Option<i64>, _>(i) {
                return v.map(Value::from).unwrap_or(Value::Null);
            }
            if let Ok(v) = row.try_get::<Option<f64>, _>(i) {
                return v.map(Value::from).unwrap_or(Value::Null);
            }
            if let Ok(v) = row.try_get::<Option<String>, _>(i) {
                return v.map(Value::from).unwrap_or(Value::Null);
            }
            Value::Null
        })
        .collect()
}

/// Map a driver error message onto the structured error taxonomy.
fn classify_error(message: &str) -> SqlErrorKind {
    let lower = message.to_lowercase();
    if lower.contains("syntax error") {
        SqlErrorKind::Syntax
    } else if lower.contains("no such table") {
        SqlErrorKind::MissingTable
    } else if lower.contains("no such column") {
        SqlErrorKind::MissingColumn
    } else {
        SqlErrorKind::Other
    }
}

// ============ Table extraction ============

/// Extract table names referenced by FROM/JOIN clauses, in appearance
/// order. Handles quoted multi-word names like `"Order Details"` and
/// comma-separated FROM lists; subqueries contribute their own FROM
/// clauses rather than a table name.
pub fn referenced_tables(sql: &str) -> Vec<String> {
    let tokens = tokenize_sql(sql);
    let mut tables = Vec::new();
    let mut i = 0;

    while i < tokens.len() {
        let is_source_keyword = match &tokens[i] {
            SqlToken::Word(w) => w.eq_ignore_ascii_case("from") || w.eq_ignore_ascii_case("join"),
            _ => false,
        };
        if is_source_keyword {
            let mut j = i + 1;
            loop {
                match tokens.get(j) {
                    Some(SqlToken::Quoted(name)) => {
                        push_unique(&mut tables, name);
                    }
                    Some(SqlToken::Word(name)) if !is_keyword(name) => {
                        push_unique(&mut tables, name);
                    }
                    _ => break,
                }
                // `FROM a, b` keeps consuming identifiers; skip an alias first.
                j += 1;
                if let Some(SqlToken::Word(w)) = tokens.get(j) {
                    if !is_keyword(w) && !w.eq_ignore_ascii_case("on") {
                        j += 1; // alias
                    }
                }
                match tokens.get(j) {
                    Some(SqlToken::Symbol(',')) => j += 1,
                    _ => break,
                }
            }
            i = j;
        } else {
            i += 1;
        }
    }

    tables
}

fn push_unique(tables: &mut Vec<String>, name: &str) {
    if !tables.iter().any(|t| t == name) {
        tables.push(name.to_string());
    }
}

fn is_keyword(word: &str) -> bool {
    const KEYWORDS: &[&str] = &[
        "select", "from", "join", "inner", "left", "right", "outer", "cross", "on", "where",
        "group", "order", "by", "having", "limit", "as", "and", "or", "union", "all", "distinct",
    ];
    KEYWORDS.iter().any(|k| word.eq_ignore_ascii_case(k))
}

#[derive(Debug, Clone, PartialEq)]
enum SqlToken {
    Word(String),
    Quoted(String),
    Symbol(char),
}

fn tokenize_sql(sql: &str) -> Vec<SqlToken> {
    let mut tokens = Vec::new();
    let mut chars = sql.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
        } else if c == '"' || c == '`' || c == '[' {
            let close = if c == '[' { ']' } else { c };
            chars.next();
            let mut name = String::new();
            for inner in chars.by_ref() {
                if inner == close {
                    break;
                }
                name.push(inner);
            }
            tokens.push(SqlToken::Quoted(name));
        } else if c == '\'' {
            // String literal: consume without emitting a token.
            chars.next();
            for inner in chars.by_ref() {
                if inner == '\'' {
                    break;
                }
            }
        } else if c.is_alphanumeric() || c == '_' {
            let mut word = String::new();
            while let Some(&w) = chars.peek() {
                if w.is_alphanumeric() || w == '_' || w == '.' {
                    word.push(w);
                    chars.next();
                } else {
                    break;
                }
            }
            tokens.push(SqlToken::Word(word));
        } else {
            tokens.push(SqlToken::Symbol(c));
            chars.next();
        }
    }

    tokens
}
