//! Query fingerprints
//!
//! A token is the SHA-256 of the canonical JSON form of everything that
//! shapes a query's result. Cache-control settings are left out of that
//! form, so queries that differ only in cache policy share a token.

use std::fmt;

use serde_json::Value;
use sha2::{Digest, Sha256};

/// Hex-encoded query fingerprint
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheToken(String);

impl CacheToken {
    /// Fingerprints a canonical JSON description of a query
    pub fn from_json(shape: &Value) -> Self {
        // serde_json maps are sorted, so equal shapes serialize identically
        let mut hasher = Sha256::new();
        hasher.update(shape.to_string().as_bytes());
        CacheToken(format!("{:x}", hasher.finalize()))
    }

    /// Wraps an existing token, e.g. one read from a file name.
    /// Only lowercase hex is accepted.
    pub fn parse(s: &str) -> Option<Self> {
        if !s.is_empty() && s.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)) {
            Some(CacheToken(s.to_string()))
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_token_is_stable_across_key_order() {
        let a = CacheToken::from_json(&json!({"limit": 5, "where": [["a", "=", 1]]}));
        let b = CacheToken::from_json(&json!({"where": [["a", "=", 1]], "limit": 5}));
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 64);
    }

    #[test]
    fn test_token_changes_with_shape() {
        let a = CacheToken::from_json(&json!({"limit": 5}));
        let b = CacheToken::from_json(&json!({"limit": 6}));
        assert_ne!(a, b);
    }

    #[test]
    fn test_parse() {
        assert!(CacheToken::parse("00ff").is_some());
        assert!(CacheToken::parse("../x").is_none());
        assert!(CacheToken::parse("").is_none());
    }
}
