//! Intent Classifier. Local, deterministic, keyword-and-rule based — no
//! network dependency, so there is no `ClassifierUnavailable` transport
//! failure mode in this implementation; it only ever returns low
//! confidence for uninterpretable input.
//!
//! Classifications are memoised per normalised input so repeated calls
//! within a process are both deterministic and cheap.

use chrono::{Datelike, Duration, NaiveDate, Utc};
use dashmap::DashMap;

use crate::models::{Granularity, Intent, IntentCategory, Timeframe};
use crate::utils::fingerprint::normalise;

const AGGREGATION_WORDS: &[&str] = &["total", "sum", "count", "average", "avg", "how many"];
const TREND_WORDS: &[&str] = &["trend", "over time", "growth", "change", "monthly", "weekly", "daily"];
const COMPARISON_WORDS: &[&str] = &["compare", "versus", "vs", "difference between", "relative to"];
const LOOKUP_WORDS: &[&str] = &["show", "list", "find", "get", "top", "which"];

const METRIC_WORDS: &[&str] =
    &["revenue", "total", "count", "average", "sum", "amount", "profit", "sales", "cost", "margin"];
const DIMENSION_WORDS: &[&str] =
    &["region", "category", "customer", "product", "country", "channel", "segment", "status"];

/// Recognised stop words stripped from `FindSimilar`'s first-keyword
/// prefilter and from generic keyword extraction alike.
const STOP_WORDS: &[&str] = &["show", "give", "tell", "what", "when", "where", "how"];

pub struct IntentClassifier {
    cache: DashMap<String, Intent>,
    min_confidence: f32,
}

impl IntentClassifier {
    pub fn new(min_confidence: f32) -> Self {
        Self { cache: DashMap::new(), min_confidence }
    }

    pub fn classify(&self, text: &str) -> Intent {
        let normalised = normalise(text);
        if let Some(cached) = self.cache.get(&normalised) {
            return cached.clone();
        }

        let intent = self.classify_uncached(&normalised);
        self.cache.insert(normalised, intent.clone());
        intent
    }

    pub fn min_confidence(&self) -> f32 {
        self.min_confidence
    }

    fn classify_uncached(&self, normalised: &str) -> Intent {
        let tokens: Vec<&str> = normalised.split_whitespace().collect();
        if tokens.len() < 2 {
            return Intent {
                category: IntentCategory::Unknown,
                confidence: 0.1,
                suggestions: self.suggestions_for(normalised),
                keywords: tokens.iter().map(|t| t.to_string()).collect(),
                ..Intent::default()
            };
        }

        let scores = [
            (IntentCategory::Aggregation, score_against(normalised, AGGREGATION_WORDS)),
            (IntentCategory::Trend, score_against(normalised, TREND_WORDS)),
            (IntentCategory::Comparison, score_against(normalised, COMPARISON_WORDS)),
            (IntentCategory::Lookup, score_against(normalised, LOOKUP_WORDS)),
        ];

        let (category, hits) =
            scores.into_iter().max_by(|a, b| a.1.partial_cmp(&b.1).unwrap()).unwrap();

        let keywords: Vec<String> =
            tokens.iter().filter(|t| t.len() > 3 && !STOP_WORDS.contains(t)).map(|t| t.to_string()).collect();
        let metrics = matched_words(normalised, METRIC_WORDS);
        let dimensions = matched_words(normalised, DIMENSION_WORDS);
        let entities = extract_entities(normalised);
        let timeframe = extract_timeframe(normalised);

        if hits == 0.0 {
            return Intent {
                category: IntentCategory::Unknown,
                confidence: 0.2,
                entities,
                timeframe,
                metrics,
                dimensions,
                suggestions: self.suggestions_for(normalised),
                keywords,
            };
        }

        // Confidence grows with keyword overlap and tapers as the query
        // gets longer and noisier; clamped into [0,1].
        let confidence = (0.4 + hits * 0.25).min(0.98);
        let suggestions =
            if confidence < self.min_confidence { self.suggestions_for(normalised) } else { Vec::new() };

        Intent { category, confidence, entities, timeframe, metrics, dimensions, suggestions, keywords }
    }

    /// Rephrase hints attached to `IntentLowConfidence`.
    pub fn suggestions_for(&self, _text: &str) -> Vec<String> {
        vec![
            "Try naming a specific metric, e.g. \"total revenue\"".to_string(),
            "Mention a timeframe, e.g. \"last 30 days\"".to_string(),
            "Name the entity you're asking about, e.g. \"customers\" or \"orders\"".to_string(),
        ]
    }
}

fn score_against(normalised: &str, words: &[&str]) -> f32 {
    words.iter().filter(|w| normalised.contains(*w)).count() as f32
}

fn matched_words(normalised: &str, words: &[&str]) -> Vec<String> {
    words.iter().filter(|w| normalised.contains(*w)).map(|w| w.to_string()).collect()
}

/// Entity extraction is deliberately shallow: quoted spans and bare
/// numbers are the only signal this local classifier can pull out
/// without a schema or NER model. The SQL Generator gets the full
/// schema separately and does the real entity resolution.
fn extract_entities(normalised: &str) -> std::collections::HashMap<String, serde_json::Value> {
    let mut entities = std::collections::HashMap::new();
    for token in normalised.split_whitespace() {
        if let Ok(n) = token.parse::<i64>() {
            entities.entry("number".to_string()).or_insert_with(|| serde_json::json!(n));
        }
    }
    entities
}

/// Resolves a handful of common relative-date phrases into a concrete
/// `{from, to, granularity}` window anchored on today. Anything not
/// recognised leaves `timeframe` unset; the SQL Generator is free to
/// infer a window from the raw text itself.
fn extract_timeframe(normalised: &str) -> Option<Timeframe> {
    let today = Utc::now().date_naive();

    if normalised.contains("today") {
        return Some(window(today, today, Granularity::Day));
    }
    if normalised.contains("yesterday") {
        let d = today - Duration::days(1);
        return Some(window(d, d, Granularity::Day));
    }
    if let Some(days) = extract_last_n(normalised, "day") {
        return Some(window(today - Duration::days(days), today, Granularity::Day));
    }
    if let Some(weeks) = extract_last_n(normalised, "week") {
        return Some(window(today - Duration::weeks(weeks), today, Granularity::Week));
    }
    if let Some(months) = extract_last_n(normalised, "month") {
        return Some(window(today - Duration::days(months * 30), today, Granularity::Month));
    }
    if normalised.contains("this month") {
        let start = today.with_day(1).unwrap_or(today);
        return Some(window(start, today, Granularity::Month));
    }
    if normalised.contains("last month") {
        let start_of_this_month = today.with_day(1).unwrap_or(today);
        let end = start_of_this_month - Duration::days(1);
        let start = end.with_day(1).unwrap_or(end);
        return Some(window(start, end, Granularity::Month));
    }
    if normalised.contains("this year") {
        let start = NaiveDate::from_ymd_opt(today.year(), 1, 1).unwrap_or(today);
        return Some(window(start, today, Granularity::Year));
    }
    if normalised.contains("last year") {
        let start = NaiveDate::from_ymd_opt(today.year() - 1, 1, 1).unwrap_or(today);
        let end = NaiveDate::from_ymd_opt(today.year() - 1, 12, 31).unwrap_or(today);
        return Some(window(start, end, Granularity::Year));
    }

    None
}

fn extract_last_n(normalised: &str, unit: &str) -> Option<i64> {
    let plural = format!("{}s", unit);
    let tokens: Vec<&str> = normalised.split_whitespace().collect();
    for (i, token) in tokens.iter().enumerate() {
        if *token != unit && *token != plural {
            continue;
        }
        if let Some(prev) = tokens.get(i.wrapping_sub(1)) {
            if let Ok(n) = prev.parse::<i64>() {
                return Some(n);
            }
        }
    }
    None
}

fn window(from: NaiveDate, to: NaiveDate, granularity: Granularity) -> Timeframe {
    Timeframe { from: from.to_string(), to: to.to_string(), granularity }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uninterpretable_input_has_low_confidence() {
        let classifier = IntentClassifier::new(0.3);
        let intent = classifier.classify("asdf qwerty");
        assert!(intent.confidence < 0.3);
        assert!(!intent.suggestions.is_empty());
    }

    #[test]
    fn aggregation_phrase_is_classified_as_aggregation() {
        let classifier = IntentClassifier::new(0.3);
        let intent = classifier.classify("total revenue by month");
        assert_eq!(intent.category, IntentCategory::Aggregation);
        assert!(intent.confidence >= 0.3);
        assert!(intent.metrics.contains(&"revenue".to_string()));
    }

    #[test]
    fn classification_is_deterministic_for_identical_input() {
        let classifier = IntentClassifier::new(0.3);
        let a = classifier.classify("Top 10 customers by revenue");
        let b = classifier.classify("top   10 CUSTOMERS by revenue");
        assert_eq!(a.category, b.category);
        assert_eq!(a.confidence, b.confidence);
    }

    #[test]
    fn last_n_days_resolves_to_a_day_granularity_window() {
        let classifier = IntentClassifier::new(0.3);
        let intent = classifier.classify("show revenue for the last 30 days");
        let timeframe = intent.timeframe.expect("timeframe should resolve");
        assert_eq!(timeframe.granularity, Granularity::Day);
    }

    #[test]
    fn this_month_resolves_to_a_month_granularity_window() {
        let classifier = IntentClassifier::new(0.3);
        let intent = classifier.classify("total sales this month by region");
        let timeframe = intent.timeframe.expect("timeframe should resolve");
        assert_eq!(timeframe.granularity, Granularity::Month);
        assert!(intent.dimensions.contains(&"region".to_string()));
    }

    #[test]
    fn no_recognisable_phrase_leaves_timeframe_unset() {
        let classifier = IntentClassifier::new(0.3);
        let intent = classifier.classify("list all customers");
        assert!(intent.timeframe.is_none());
    }
}
