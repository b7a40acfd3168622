//! Fuzzy queries.
//!
//! A fuzzy query matches every term within a bounded Levenshtein distance of
//! its own term. The first `prefix_length` bytes must match exactly; the
//! distance is computed over what follows. Each matching term is scored
//!
//! ```text
//! 1 - distance / (prefix_length + min(query_suffix_len, term_suffix_len))
//! ```
//!
//! and kept when that score exceeds `min_similarity`.

use log::trace;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::index::IndexReader;
use crate::query::multi_term::MultiTermQuery;
use crate::query::term::TermQuery;
use crate::query::{DEFAULT_MAX_TERMS, Query, boost_suffix, field_prefix};
use crate::util::{float_hash, float_to_s, str_hash};

/// Default minimum similarity.
pub const DEFAULT_MIN_SIMILARITY: f32 = 0.5;
/// Default length of the exactly matching prefix.
pub const DEFAULT_PREFIX_LENGTH: usize = 0;

/// Term lengths whose maximum distance is precomputed.
const TYPICAL_LONGEST_WORD: usize = 20;

/// Fuzzy query settings. A zero in any field selects its default.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FuzzyConfig {
    /// Minimum score a term needs to match, `0.5` by default.
    #[serde(default)]
    pub min_similarity: f32,
    /// Number of leading bytes that must match exactly.
    #[serde(default)]
    pub prefix_length: usize,
    /// Maximum number of terms the query expands to, `256` by default.
    #[serde(default)]
    pub max_terms: usize,
}

impl Default for FuzzyConfig {
    fn default() -> Self {
        FuzzyConfig {
            min_similarity: DEFAULT_MIN_SIMILARITY,
            prefix_length: DEFAULT_PREFIX_LENGTH,
            max_terms: DEFAULT_MAX_TERMS,
        }
    }
}

impl FuzzyConfig {
    /// Replace zero settings with their defaults.
    pub fn normalized(self) -> Self {
        FuzzyConfig {
            min_similarity: if self.min_similarity == 0.0 {
                DEFAULT_MIN_SIMILARITY
            } else {
                self.min_similarity
            },
            prefix_length: self.prefix_length,
            max_terms: if self.max_terms == 0 {
                DEFAULT_MAX_TERMS
            } else {
                self.max_terms
            },
        }
    }
}

/// Bounded edit distance scorer for one query term.
///
/// Holds the query suffix, the precomputed maximum distances and the two DP
/// rows so that scoring many candidates allocates nothing.
#[derive(Debug, Clone)]
pub struct FuzzyMatcher {
    text: Vec<u8>,
    pre_len: usize,
    min_sim: f32,
    max_distances: [i32; TYPICAL_LONGEST_WORD],
    d_prev: Vec<i32>,
    d_curr: Vec<i32>,
}

impl FuzzyMatcher {
    /// Create a matcher for `text`, the query term with its first `pre_len`
    /// bytes removed.
    pub fn new(text: &[u8], pre_len: usize, min_sim: f32) -> Self {
        let mut matcher = FuzzyMatcher {
            text: text.to_vec(),
            pre_len,
            min_sim,
            max_distances: [0; TYPICAL_LONGEST_WORD],
            d_prev: vec![0; text.len() + 1],
            d_curr: vec![0; text.len() + 1],
        };
        for m in 0..TYPICAL_LONGEST_WORD {
            matcher.max_distances[m] = matcher.calculate_max_distance(m);
        }
        matcher
    }

    fn calculate_max_distance(&self, m: usize) -> i32 {
        ((1.0 - f64::from(self.min_sim)) * (self.text.len().min(m) + self.pre_len) as f64) as i32
    }

    fn max_distance(&self, m: usize) -> i32 {
        if m < TYPICAL_LONGEST_WORD {
            self.max_distances[m]
        } else {
            self.calculate_max_distance(m)
        }
    }

    /// Score `target`, a candidate term with its first `pre_len` bytes
    /// removed. Returns 0 when the candidate is provably too far away; the
    /// score may be negative for dissimilar terms of similar length.
    pub fn score(&mut self, target: &[u8]) -> f32 {
        let m = target.len();
        let n = self.text.len();

        if m == 0 || n == 0 {
            if self.pre_len == 0 {
                return 0.0;
            }
            return 1.0 - (m + n) as f32 / self.pre_len as f32;
        }

        let max_distance = self.max_distance(m);
        if max_distance < m.abs_diff(n) as i32 {
            return 0.0;
        }

        for (j, cell) in self.d_curr.iter_mut().enumerate() {
            *cell = j as i32;
        }

        for (i, &s_i) in target.iter().enumerate() {
            std::mem::swap(&mut self.d_prev, &mut self.d_curr);
            let row_start = i as i32 + 1;
            self.d_curr[0] = row_start;
            let mut prune = row_start > max_distance;

            for j in 0..n {
                let d = if s_i == self.text[j] {
                    (self.d_prev[j + 1] + 1)
                        .min(self.d_curr[j] + 1)
                        .min(self.d_prev[j])
                } else {
                    self.d_prev[j + 1].min(self.d_curr[j]).min(self.d_prev[j]) + 1
                };
                self.d_curr[j + 1] = d;
                if prune && d <= max_distance {
                    prune = false;
                }
            }
            if prune {
                return 0.0;
            }
        }

        1.0 - self.d_curr[n] as f32 / (self.pre_len + n.min(m)) as f32
    }
}

/// Score `candidate` against `term`, both given whole. The first `pre_len`
/// bytes of each are treated as an already matched prefix.
///
/// ```
/// use xiphos::query::fuzzy::fuzzy_score;
///
/// assert_eq!(fuzzy_score("fuzzy", "fuzzy", 0.5, 0), 1.0);
/// assert_eq!(fuzzy_score("fuzzy", "fuzz", 0.5, 0), 0.75);
/// assert_eq!(fuzzy_score("abcdefgh", "zz", 0.5, 0), 0.0);
/// ```
pub fn fuzzy_score(term: &str, candidate: &str, min_sim: f32, pre_len: usize) -> f32 {
    let text = term.as_bytes().get(pre_len..).unwrap_or_default();
    let target = candidate.as_bytes().get(pre_len..).unwrap_or_default();
    FuzzyMatcher::new(text, pre_len, min_sim).score(target)
}

/// Query matching every term similar to a given term.
#[derive(Debug, Clone, PartialEq)]
pub struct FuzzyQuery {
    /// Field to search.
    pub field: String,
    /// The term to compare against.
    pub term: String,
    /// Minimum similarity of a matching term.
    pub min_sim: f32,
    /// Number of leading bytes that must match exactly.
    pub pre_len: usize,
    /// Maximum number of terms the query expands to.
    pub max_terms: usize,
    /// Query boost.
    pub boost: f32,
}

impl FuzzyQuery {
    /// Create a fuzzy query with the default settings.
    pub fn new<F: Into<String>, T: Into<String>>(field: F, term: T) -> Self {
        Self::with_config(field, term, FuzzyConfig::default())
    }

    /// Create a fuzzy query from `config`, zeros selecting defaults.
    pub fn with_config<F: Into<String>, T: Into<String>>(
        field: F,
        term: T,
        config: FuzzyConfig,
    ) -> Self {
        let config = config.normalized();
        FuzzyQuery {
            field: field.into(),
            term: term.into(),
            min_sim: config.min_similarity,
            pre_len: config.prefix_length,
            max_terms: config.max_terms,
            boost: 1.0,
        }
    }

    pub(crate) fn rewrite(&self, reader: &dyn IndexReader) -> Result<Query> {
        let mut mtq = MultiTermQuery::new(self.field.as_str(), self.max_terms, self.min_sim)?;
        mtq.boost = self.boost;
        if !reader.has_field(&self.field) {
            return Ok(Query::MultiTerm(mtq));
        }
        if self.pre_len >= self.term.len() {
            let mut term = TermQuery::new(self.field.as_str(), self.term.as_str());
            term.boost = self.boost;
            return Ok(Query::Term(term));
        }

        let bytes = self.term.as_bytes();
        let prefix = &bytes[..self.pre_len];
        let mut matcher = FuzzyMatcher::new(&bytes[self.pre_len..], self.pre_len, self.min_sim);

        let mut start = self.pre_len;
        while !self.term.is_char_boundary(start) {
            start -= 1;
        }
        let mut terms = reader.terms_from(&self.field, &self.term[..start]);
        while let Some(term) = terms.term() {
            let candidate = term.as_bytes();
            if candidate.starts_with(prefix) {
                let score = matcher.score(&candidate[self.pre_len..]);
                trace!("Fuzzy {} scored {} at {}", self.term, term, score);
                mtq.add_term_boost(term, score);
            } else if candidate > prefix {
                break;
            }
            if !terms.next() {
                break;
            }
        }
        Ok(Query::MultiTerm(mtq))
    }

    pub(crate) fn to_s(&self, default_field: Option<&str>) -> String {
        let mut buf = field_prefix(&self.field, default_field);
        buf.push_str(&self.term);
        buf.push('~');
        if self.min_sim != DEFAULT_MIN_SIMILARITY {
            buf.push_str(&float_to_s(f64::from(self.min_sim)));
        }
        buf.push_str(&boost_suffix(self.boost));
        buf
    }

    pub(crate) fn hash_code(&self) -> u64 {
        str_hash(&self.term)
            ^ str_hash(&self.field)
            ^ float_hash(self.min_sim)
            ^ self.pre_len as u64
    }

    pub(crate) fn eq_fuzzy(&self, other: &FuzzyQuery) -> bool {
        self.term == other.term
            && self.field == other.field
            && self.pre_len == other.pre_len
            && self.min_sim == other.min_sim
    }
}
