//! SQL generation from natural language.
//!
//! [`TemplateGenerator`] matches the question against a fixed set of
//! analytics patterns (top category by quantity, AOV, revenue by category,
//! top products, top customer by margin) and fills in planner constraints
//! such as date windows. It is fully deterministic. [`ModelGenerator`]
//! prompts the configured model with the question, schema, constraints,
//! and any repair hint, and falls back to the templates when the model is
//! unreachable or returns nothing usable.

use anyhow::Result;
use async_trait::async_trait;

use crate::llm::LlmClient;
use crate::models::Constraints;
use crate::traits::QueryGenerator;

/// Deterministic pattern-matched SQL over a Northwind-style schema.
pub struct TemplateGenerator;

impl TemplateGenerator {
    pub fn render(question: &str, constraints: &Constraints) -> String {
        let q = question.to_lowercase();
        let date_start = constraints.get("date_start").unwrap_or("1997-01-01");
        let date_end = constraints.get("date_end").unwrap_or("1997-12-31");

        // Top category by units sold within a window.
        if q.contains("category") && q.contains("quantity") {
            return format!(
                "SELECT c.CategoryName, SUM(od.Quantity) AS total_qty\n\
                 FROM Orders o\n\
                 JOIN \"Order Details\" od ON o.OrderID = od.OrderID\n\
                 JOIN Products p ON od.ProductID = p.ProductID\n\
                 JOIN Categories c ON p.CategoryID = c.CategoryID\n\
                 WHERE o.OrderDate BETWEEN '{date_start}' AND '{date_end}'\n\
                 GROUP BY c.CategoryName\n\
                 ORDER BY total_qty DESC\n\
                 LIMIT 1"
            );
        }

        // Average order value within a window.
        if q.contains("aov") || q.contains("average order value") {
            return format!(
                "SELECT SUM(od.UnitPrice * od.Quantity * (1 - od.Discount)) / COUNT(DISTINCT o.OrderID) AS aov\n\
                 FROM Orders o\n\
                 JOIN \"Order Details\" od ON o.OrderID = od.OrderID\n\
                 WHERE o.OrderDate BETWEEN '{date_start}' AND '{date_end}'"
            );
        }

        // Top products by revenue, all time.
        if q.contains("top") && q.contains("product") && q.contains("revenue") {
            return "SELECT p.ProductName, SUM(od.UnitPrice * od.Quantity * (1 - od.Discount)) AS revenue\n\
                    FROM \"Order Details\" od\n\
                    JOIN Products p ON od.ProductID = p.ProductID\n\
                    GROUP BY p.ProductName\n\
                    ORDER BY revenue DESC\n\
                    LIMIT 3"
                .to_string();
        }

        // Revenue for a category within a window.
        if q.contains("revenue") {
            if let Some(category) = constraints.get("category") {
                return format!(
                    "SELECT SUM(od.UnitPrice * od.Quantity * (1 - od.Discount)) AS revenue\n\
                     FROM Orders o\n\
                     JOIN \"Order Details\" od ON o.OrderID = od.OrderID\n\
                     JOIN Products p ON od.ProductID = p.ProductID\n\
                     JOIN Categories c ON p.CategoryID = c.CategoryID\n\
                     WHERE c.CategoryName = '{category}'\n\
                     AND o.OrderDate BETWEEN '{date_start}' AND '{date_end}'"
                );
            }
        }

        // Top customer by approximated gross margin.
        if q.contains("margin") && q.contains("customer") {
            return "SELECT cu.CompanyName,\n\
                    \x20      SUM((od.UnitPrice - od.UnitPrice * 0.7) * od.Quantity * (1 - od.Discount)) AS margin\n\
                    FROM Orders o\n\
                    JOIN \"Order Details\" od ON o.OrderID = od.OrderID\n\
                    JOIN Customers cu ON o.CustomerID = cu.CustomerID\n\
                    WHERE strftime('%Y', o.OrderDate) = '1997'\n\
                    GROUP BY cu.CompanyName\n\
                    ORDER BY margin DESC\n\
                    LIMIT 1"
                .to_string();
        }

        // No pattern applies. The executor records an empty statement as a
        // structured failure, which routes the run into the repair loop.
        String::new()
    }
}

#[async_trait]
impl QueryGenerator for TemplateGenerator {
    async fn generate_sql(
        &self,
        question: &str,
        _schema: &str,
        constraints: &Constraints,
        _hint: Option<&str>,
    ) -> Result<String> {
        Ok(Self::render(question, constraints))
    }
}

/// Model-backed generation with template fallback.
pub struct ModelGenerator {
    llm: LlmClient,
}

impl ModelGenerator {
    pub fn new(llm: LlmClient) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl QueryGenerator for ModelGenerator {
    async fn generate_sql(
        &self,
        question: &str,
        schema: &str,
        constraints: &Constraints,
        hint: Option<&str>,
    ) -> Result<String> {
        let mut prompt = format!(
            "Write one SQLite query answering the question below. Reply with SQL only.\n\
             Quote multi-word table names with double quotes.\n\n\
             Schema:\n{}\n\nQuestion: {}\n",
            schema, question
        );
        if !constraints.is_empty() {
            prompt.push_str(&format!("\nKnown constraints:\n{}\n", constraints.render()));
        }
        if let Some(hint) = hint {
            prompt.push_str(&format!("\nHint: {}\n", hint));
        }
        prompt.push_str("\nSQL:");

        match self.llm.generate(&prompt).await {
            Ok(reply) => {
                let sql = extract_sql(&reply);
                if sql.is_empty() {
                    Ok(TemplateGenerator::render(question, constraints))
                } else {
                    Ok(sql)
                }
            }
            Err(_) => Ok(TemplateGenerator::render(question, constraints)),
        }
    }
}

/// Strip code fences and trailing prose, keep a single statement.
fn extract_sql(reply: &str) -> String {
    let mut text = reply.trim();
    if let Some(start) = text.find("```") {
        let after = &text[start + 3..];
        let after = after.strip_prefix("sql").unwrap_or(after);
        text = match after.find("```") {
            Some(end) => &after[..end],
            None => after,
        };
    }
    let text = text.trim();
    match text.find(';') {
        Some(pos) => text[..pos].trim().to_string(),
        None => text.to_string(),
    }
}
