//! Output of the Intent Classifier: a coarse guess at what the caller is
//! asking for, used to pick a generation strategy and to reject requests
//! early when confidence is too low to bother calling an LLM.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum IntentCategory {
    Aggregation,
    Lookup,
    Trend,
    Comparison,
    Unknown,
}

/// Granularity a `Timeframe` is expressed at, used by the SQL Generator
/// to pick a `DATE_TRUNC`/`GROUP BY` bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    Day,
    Week,
    Month,
    Quarter,
    Year,
}

/// A resolved `{from, to, granularity}` window, extracted from phrases
/// like "last 30 days" or "this month". `from`/`to` are inclusive
/// calendar-date strings (`YYYY-MM-DD`); the classifier resolves
/// relative phrases against the moment of classification.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Timeframe {
    pub from: String,
    pub to: String,
    pub granularity: Granularity,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Default)]
pub struct Intent {
    pub category: IntentCategory,
    /// 0.0-1.0. Below the configured floor, the pipeline stops at
    /// classification and returns `IntentLowConfidence` with `suggestions`.
    pub confidence: f32,
    /// Named entities recognised in the text (e.g. a quoted product name,
    /// a capitalised proper noun) mapped to the literal span matched.
    #[serde(default)]
    pub entities: std::collections::HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub timeframe: Option<Timeframe>,
    /// Metric-shaped words the query asks for (revenue, count, total, ...).
    #[serde(default)]
    pub metrics: Vec<String>,
    /// Dimension-shaped words the query wants to group or filter by
    /// (region, category, customer, ...).
    #[serde(default)]
    pub dimensions: Vec<String>,
    /// Rephrase hints, populated whenever confidence is low.
    #[serde(default)]
    pub suggestions: Vec<String>,
    /// All content tokens longer than 3 characters; used as a FindSimilar
    /// prefilter and as generic generator context.
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl Default for IntentCategory {
    fn default() -> Self {
        Self::Unknown
    }
}

impl Intent {
    pub fn below(&self, floor: f32) -> bool {
        self.confidence < floor
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_intent_is_unknown_and_empty() {
        let intent = Intent::default();
        assert_eq!(intent.category, IntentCategory::Unknown);
        assert!(intent.entities.is_empty());
        assert!(intent.timeframe.is_none());
    }
}
