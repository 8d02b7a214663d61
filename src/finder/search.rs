//! Full-text search scoring
//!
//! The query string is split on whitespace; terms shorter than the minimum
//! length are dropped. Matching is case-insensitive and counts characters,
//! not bytes. A document with a score of zero does not match.
//!
//! Each occurrence of a term in a field is one hit. A term equal to the
//! whole field counts 4x, a term the field starts with counts 2x. How hits
//! combine across fields depends on the [`SearchAlgorithm`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::condition::compare::as_text;
use crate::config::SearchOptions;
use crate::document::{Document, NestedPath};
use crate::errors::{StoreError, StoreResult};

/// Base of the field weight in the prioritizing algorithms
pub const PRIORITY_MULTIPLIER: f64 = 64.0;

/// Per-field hits saturate here so later fields can never add up to one
/// step of the multiplier
const MAX_PRIORITIZED_HITS: f64 = PRIORITY_MULTIPLIER - 1.0;
const EXACT_MATCH_BONUS: f64 = 4.0;
const PREFIX_MATCH_BONUS: f64 = 2.0;

/// Which terms must occur for a field to count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    /// Every term must occur in the field
    And,
    /// Any term may occur
    #[default]
    Or,
}

impl SearchMode {
    pub fn parse(s: &str) -> StoreResult<Self> {
        match s.trim().to_lowercase().as_str() {
            "and" => Ok(SearchMode::And),
            "or" => Ok(SearchMode::Or),
            other => Err(StoreError::configuration(format!(
                "Unsupported search mode \"{}\"",
                other
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SearchMode::And => "and",
            SearchMode::Or => "or",
        }
    }
}

/// How hits in different fields are weighted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchAlgorithm {
    /// All fields weigh the same
    #[default]
    Hits,
    /// Raw hits plus a bonus for earlier fields
    HitsPrioritize,
    /// A hit in field `i` outranks any hits in later fields
    Prioritize,
    /// `Prioritize` plus a bonus for matches early in the field
    PrioritizePosition,
}

impl SearchAlgorithm {
    pub fn parse(s: &str) -> StoreResult<Self> {
        match s.trim().to_lowercase().as_str() {
            "hits" => Ok(SearchAlgorithm::Hits),
            "hits_prioritize" => Ok(SearchAlgorithm::HitsPrioritize),
            "prioritize" => Ok(SearchAlgorithm::Prioritize),
            "prioritize_position" => Ok(SearchAlgorithm::PrioritizePosition),
            other => Err(StoreError::configuration(format!(
                "Unsupported search algorithm \"{}\"",
                other
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SearchAlgorithm::Hits => "hits",
            SearchAlgorithm::HitsPrioritize => "hits_prioritize",
            SearchAlgorithm::Prioritize => "prioritize",
            SearchAlgorithm::PrioritizePosition => "prioritize_position",
        }
    }
}

/// Hits of all terms within one field
struct FieldMatch {
    hits: f64,
    position_bonus: f64,
}

/// Scores documents against a search query
#[derive(Debug, Clone)]
pub struct SearchScorer {
    terms: Vec<String>,
    fields: Vec<NestedPath>,
    mode: SearchMode,
    algorithm: SearchAlgorithm,
}

impl SearchScorer {
    /// Builds a scorer. At least one field is required.
    pub fn new(fields: &[String], query: &str, options: &SearchOptions) -> StoreResult<Self> {
        if fields.is_empty() {
            return Err(StoreError::invalid_argument(
                "Search needs at least one field to search in",
            ));
        }
        let fields = fields
            .iter()
            .map(|f| NestedPath::parse(f))
            .collect::<StoreResult<Vec<_>>>()?;

        let mut terms: Vec<String> = Vec::new();
        for term in query.split_whitespace() {
            let term = term.to_lowercase();
            if term.chars().count() >= options.min_length && !terms.contains(&term) {
                terms.push(term);
            }
        }

        Ok(Self {
            terms,
            fields,
            mode: options.mode,
            algorithm: options.algorithm,
        })
    }

    /// Terms that survived the length filter
    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    /// Score of a document; 0 means no match
    pub fn score(&self, doc: &Document) -> f64 {
        if self.terms.is_empty() {
            return 0.0;
        }

        let field_count = self.fields.len();
        let mut score = 0.0;

        for (i, path) in self.fields.iter().enumerate() {
            let text = match path.get(doc).and_then(as_text) {
                Some(text) => text.to_lowercase(),
                None => continue,
            };
            let matched = match self.match_field(&text) {
                Some(m) => m,
                None => continue,
            };

            let rank = (field_count - i) as f64;
            score += match self.algorithm {
                SearchAlgorithm::Hits => matched.hits,
                SearchAlgorithm::HitsPrioritize => matched.hits + rank,
                SearchAlgorithm::Prioritize => {
                    matched.hits.min(MAX_PRIORITIZED_HITS) * PRIORITY_MULTIPLIER.powf(rank)
                }
                SearchAlgorithm::PrioritizePosition => {
                    matched.hits.min(MAX_PRIORITIZED_HITS) * PRIORITY_MULTIPLIER.powf(rank)
                        + matched.position_bonus
                }
            };
        }

        score
    }

    /// Drops documents without hits and writes the score into survivors
    pub fn apply(&self, documents: Vec<Document>, score_key: Option<&str>) -> Vec<Document> {
        documents
            .into_iter()
            .filter_map(|mut doc| {
                let score = self.score(&doc);
                if score <= 0.0 {
                    return None;
                }
                if let Some(key) = score_key {
                    doc.insert(key.to_string(), score_value(score));
                }
                Some(doc)
            })
            .collect()
    }

    fn match_field(&self, text: &str) -> Option<FieldMatch> {
        let length = text.chars().count().max(1) as f64;
        let mut hits = 0.0;
        let mut position_bonus = 0.0;
        let mut matched_terms = 0;

        for term in &self.terms {
            let offsets = char_offsets(text, term);
            if offsets.is_empty() {
                continue;
            }
            matched_terms += 1;

            let weight = if text == term {
                EXACT_MATCH_BONUS
            } else if text.starts_with(term.as_str()) {
                PREFIX_MATCH_BONUS
            } else {
                1.0
            };
            hits += offsets.len() as f64 * weight;

            for offset in offsets {
                position_bonus += (length - offset as f64) / length;
                if offset == 0 {
                    position_bonus += 1.0;
                }
            }
        }

        let counts = match self.mode {
            SearchMode::And => matched_terms == self.terms.len(),
            SearchMode::Or => matched_terms > 0,
        };
        counts.then_some(FieldMatch {
            hits,
            position_bonus,
        })
    }
}

/// Character offsets of the non-overlapping occurrences of `term`
fn char_offsets(text: &str, term: &str) -> Vec<usize> {
    text.match_indices(term)
        .map(|(byte_offset, _)| text[..byte_offset].chars().count())
        .collect()
}

fn score_value(score: f64) -> Value {
    if score.fract() == 0.0 && score < u64::MAX as f64 {
        Value::from(score as u64)
    } else {
        serde_json::Number::from_f64(score)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}
