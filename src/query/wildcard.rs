//! Wildcard queries.
//!
//! Patterns use two metacharacters: `?` matches exactly one byte and `*`
//! matches any run of bytes, including none.

use log::trace;

use crate::error::Result;
use crate::index::IndexReader;
use crate::query::multi_term::MultiTermQuery;
use crate::query::term::TermQuery;
use crate::query::{DEFAULT_MAX_TERMS, Query, boost_suffix, field_prefix};
use crate::util::str_hash;

/// Metacharacter matching any run of bytes.
pub const WILD_STRING: u8 = b'*';
/// Metacharacter matching a single byte.
pub const WILD_CHAR: u8 = b'?';

/// Test `text` against a wildcard `pattern`.
///
/// ```
/// use xiphos::query::wildcard::wildcard_match;
///
/// assert!(wildcard_match("a*c", "abc"));
/// assert!(wildcard_match("a?c", "abc"));
/// assert!(!wildcard_match("a?c", "abbc"));
/// ```
pub fn wildcard_match(pattern: &str, text: &str) -> bool {
    wc_match(pattern.as_bytes(), text.as_bytes())
}

fn wc_match(pattern: &[u8], text: &[u8]) -> bool {
    let mut p = 0;
    let mut t = 0;
    loop {
        if t == text.len() {
            return pattern[p..].iter().all(|&c| c == WILD_STRING);
        }
        if p == pattern.len() {
            return false;
        }
        match pattern[p] {
            WILD_CHAR => {}
            WILD_STRING => {
                let rest = &pattern[p + 1..];
                return (t..=text.len()).rev().any(|x| wc_match(rest, &text[x..]));
            }
            c if c != text[t] => return false,
            _ => {}
        }
        p += 1;
        t += 1;
    }
}

/// Query matching every term that fits a wildcard pattern.
#[derive(Debug, Clone, PartialEq)]
pub struct WildcardQuery {
    /// Field to search.
    pub field: String,
    /// Wildcard pattern.
    pub pattern: String,
    /// Maximum number of terms the query expands to.
    pub max_terms: usize,
    /// Query boost.
    pub boost: f32,
}

impl WildcardQuery {
    /// Create a new wildcard query.
    pub fn new<F: Into<String>, P: Into<String>>(field: F, pattern: P) -> Self {
        WildcardQuery {
            field: field.into(),
            pattern: pattern.into(),
            max_terms: DEFAULT_MAX_TERMS,
            boost: 1.0,
        }
    }

    /// Set the maximum number of expanded terms.
    pub fn with_max_terms(mut self, max_terms: usize) -> Self {
        self.max_terms = max_terms;
        self
    }

    pub(crate) fn rewrite(&self, reader: &dyn IndexReader) -> Result<Query> {
        let Some(meta_pos) = self
            .pattern
            .bytes()
            .position(|b| b == WILD_STRING || b == WILD_CHAR)
        else {
            let mut term = TermQuery::new(self.field.as_str(), self.pattern.as_str());
            term.boost = self.boost;
            return Ok(Query::Term(term));
        };

        let mut mtq = MultiTermQuery::new(self.field.as_str(), self.max_terms, 0.0)?;
        mtq.boost = self.boost;
        if !reader.has_field(&self.field) {
            return Ok(Query::MultiTerm(mtq));
        }

        let prefix = &self.pattern[..meta_pos];
        let pattern = &self.pattern.as_bytes()[meta_pos..];
        let mut terms = reader.terms_from(&self.field, prefix);
        while let Some(term) = terms.term() {
            if !term.starts_with(prefix) {
                break;
            }
            if wc_match(pattern, &term.as_bytes()[meta_pos..]) {
                trace!("Wildcard {} matched {}", self.pattern, term);
                mtq.add_term(term);
            }
            if !terms.next() {
                break;
            }
        }
        Ok(Query::MultiTerm(mtq))
    }

    pub(crate) fn to_s(&self, default_field: Option<&str>) -> String {
        format!(
            "{}{}{}",
            field_prefix(&self.field, default_field),
            self.pattern,
            boost_suffix(self.boost)
        )
    }

    pub(crate) fn hash_code(&self) -> u64 {
        str_hash(&self.field) ^ str_hash(&self.pattern)
    }
}
