//! Constraint extraction from retrieved document chunks.
//!
//! Scans accumulated chunk text for structured facts the query generator
//! can use: named campaign date windows, explicit ISO dates, KPI names and
//! formulas, category filters, and return-policy day counts. Derived
//! constraints are merged into the run's existing set; extraction never
//! removes an entry, so repair attempts only refine what is known.

use chrono::NaiveDate;

use crate::models::{Constraints, DocChunk};

/// Derive constraints from the question and every chunk retrieved so far.
pub fn derive_constraints(question: &str, chunks: &[DocChunk]) -> Constraints {
    let mut constraints = Constraints::new();
    let q_lower = question.to_lowercase();

    for chunk in chunks {
        let text = chunk.text.to_lowercase();

        // Named campaign windows from the marketing calendar.
        if text.contains("summer beverages 1997") {
            constraints.set("campaign", "Summer Beverages 1997");
            constraints.set("date_start", "1997-06-01");
            constraints.set("date_end", "1997-06-30");
        } else if text.contains("winter classics 1997") {
            constraints.set("campaign", "Winter Classics 1997");
            constraints.set("date_start", "1997-12-01");
            constraints.set("date_end", "1997-12-31");
        }

        // Explicit ISO dates in the chunk body, when no named window won.
        if constraints.get("date_start").is_none() {
            let dates = iso_dates(&chunk.text);
            if dates.len() >= 2 {
                let start = dates.iter().min().cloned();
                let end = dates.iter().max().cloned();
                if let (Some(start), Some(end)) = (start, end) {
                    constraints.set("date_start", &start.to_string());
                    constraints.set("date_end", &end.to_string());
                }
            }
        }

        // KPI definitions.
        if text.contains("aov") || text.contains("average order value") {
            constraints.set("kpi", "AOV");
            constraints.set(
                "formula",
                "SUM(UnitPrice * Quantity * (1 - Discount)) / COUNT(DISTINCT OrderID)",
            );
        }
        if text.contains("gross margin") {
            constraints.set("kpi", "Gross Margin");
            constraints.set("cost_approximation", "0.7 * UnitPrice");
        }

        // Return-policy windows, e.g. "Beverages unopened: 14 days".
        if text.contains("return") {
            if let Some(days) = days_mentioned(&text) {
                constraints.set("return_days", &days.to_string());
            }
        }
    }

    if q_lower.contains("beverages") {
        constraints.set("category", "Beverages");
    }

    constraints
}

/// Valid `YYYY-MM-DD` dates appearing as tokens in the text.
fn iso_dates(text: &str) -> Vec<NaiveDate> {
    text.split(|c: char| c.is_whitespace() || c == ',' || c == ';' || c == '(' || c == ')')
        .filter_map(|token| {
            let token = token.trim_matches(|c: char| !c.is_ascii_digit());
            NaiveDate::parse_from_str(token, "%Y-%m-%d").ok()
        })
        .collect()
}

/// First integer immediately preceding the word "days".
fn days_mentioned(text: &str) -> Option<u32> {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    for pair in tokens.windows(2) {
        if pair[1].trim_matches(|c: char| !c.is_alphanumeric()) == "days" {
            let n = pair[0].trim_matches(|c: char| !c.is_ascii_digit());
            if let Ok(days) = n.parse::<u32>() {
                return Some(days);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(doc: &str, text: &str) -> DocChunk {
        DocChunk {
            doc_id: doc.to_string(),
            index: 0,
            text: text.to_string(),
            score: 1.0,
        }
    }

    #[test]
    fn test_campaign_window_extracted() {
        let chunks = vec![chunk(
            "marketing_calendar",
            "The Summer Beverages 1997 campaign promotes iced drinks in June.",
        )];
        let c = derive_constraints("Revenue during the summer campaign?", &chunks);
        assert_eq!(c.get("campaign"), Some("Summer Beverages 1997"));
        assert_eq!(c.get("date_start"), Some("1997-06-01"));
        assert_eq!(c.get("date_end"), Some("1997-06-30"));
    }

    #[test]
    fn test_iso_dates_fall_back_when_no_campaign() {
        let chunks = vec![chunk(
            "fiscal_notes",
            "Reporting period runs 1997-03-01 through 1997-03-31.",
        )];
        let c = derive_constraints("Total freight in March?", &chunks);
        assert_eq!(c.get("date_start"), Some("1997-03-01"));
        assert_eq!(c.get("date_end"), Some("1997-03-31"));
    }

    #[test]
    fn test_kpi_and_formula() {
        let chunks = vec![chunk(
            "kpi_definitions",
            "AOV (average order value) is net revenue divided by distinct orders.",
        )];
        let c = derive_constraints("What was the AOV?", &chunks);
        assert_eq!(c.get("kpi"), Some("AOV"));
        assert!(c.get("formula").unwrap().contains("COUNT(DISTINCT OrderID)"));
    }

    #[test]
    fn test_gross_margin_cost_approximation() {
        let chunks = vec![chunk(
            "kpi_definitions",
            "Gross margin assumes cost of goods at 70% of unit price.",
        )];
        let c = derive_constraints("Top customer by margin?", &chunks);
        assert_eq!(c.get("kpi"), Some("Gross Margin"));
        assert_eq!(c.get("cost_approximation"), Some("0.7 * UnitPrice"));
    }

    #[test]
    fn test_return_policy_days() {
        let chunks = vec![chunk(
            "product_policy",
            "Returns: Beverages unopened: 14 days with receipt.",
        )];
        let c = derive_constraints("Return window for beverages?", &chunks);
        assert_eq!(c.get("return_days"), Some("14"));
        assert_eq!(c.get("category"), Some("Beverages"));
    }

    #[test]
    fn test_empty_chunks_yield_category_only() {
        let c = derive_constraints("Revenue from Beverages?", &[]);
        assert_eq!(c.len(), 1);
        assert_eq!(c.get("category"), Some("Beverages"));

        let c = derive_constraints("Total revenue overall?", &[]);
        assert!(c.is_empty());
    }
}
