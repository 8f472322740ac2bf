//! Query fingerprinting.
//!
//! A 256-bit content hash over `(tenant, data_source_id, normalised text)`,
//! used both as the result-cache key and as the similarity-search
//! prefilter. Lowercasing and whitespace-collapsing happen before hashing
//! so that cosmetic differences in phrasing still hit the same cache entry.

use sha2::{Digest, Sha256};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryFingerprint([u8; 32]);

impl QueryFingerprint {
    pub fn new(tenant: &str, data_source_id: &str, natural_language: &str) -> Self {
        let normalised = normalise(natural_language);
        let mut hasher = Sha256::new();
        hasher.update(tenant.as_bytes());
        hasher.update(b"\0");
        hasher.update(data_source_id.as_bytes());
        hasher.update(b"\0");
        hasher.update(normalised.as_bytes());
        Self(hasher.finalize().into())
    }

    pub fn as_hex(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for QueryFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl serde::Serialize for QueryFingerprint {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

/// Lowercase + collapse runs of whitespace to a single space, trimmed.
pub fn normalise(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last_was_space = true; // trims leading whitespace
    for ch in text.trim().chars().flat_map(char::to_lowercase) {
        if ch.is_whitespace() {
            if !last_was_space {
                out.push(' ');
            }
            last_was_space = true;
        } else {
            out.push(ch);
            last_was_space = false;
        }
    }
    if out.ends_with(' ') {
        out.pop();
    }
    out
}

const STOP_WORDS: &[&str] =
    &["show", "give", "tell", "what", "when", "where", "how", "me", "the", "a", "an", "of", "for"];

/// First keyword (lowercased alphanumeric token, length > 3) extracted from
/// `text`, minus a stop-word set. Used by `FindSimilar` prefiltering.
pub fn first_keyword(text: &str) -> Option<String> {
    normalise(text)
        .split_whitespace()
        .map(|tok| tok.chars().filter(|c| c.is_alphanumeric()).collect::<String>())
        .find(|tok| tok.len() > 3 && !STOP_WORDS.contains(&tok.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalise_collapses_whitespace_and_case() {
        assert_eq!(normalise("  Top   10   Customers\n"), "top 10 customers");
    }

    #[test]
    fn identical_normalised_text_yields_identical_fingerprint() {
        let a = QueryFingerprint::new("t1", "d1", "Top 10 customers by revenue");
        let b = QueryFingerprint::new("t1", "d1", "  top    10 CUSTOMERS by revenue ");
        assert_eq!(a, b);
    }

    #[test]
    fn different_tenant_changes_fingerprint() {
        let a = QueryFingerprint::new("t1", "d1", "top customers");
        let b = QueryFingerprint::new("t2", "d1", "top customers");
        assert_ne!(a, b);
    }

    #[test]
    fn first_keyword_skips_stop_words() {
        assert_eq!(first_keyword("Show me the top customers"), Some("customers".to_string()));
        assert_eq!(first_keyword("what how when"), None);
    }
}
