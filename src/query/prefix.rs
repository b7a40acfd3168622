//! Prefix queries.

use log::trace;

use crate::error::Result;
use crate::index::IndexReader;
use crate::query::multi_term::MultiTermQuery;
use crate::query::{DEFAULT_MAX_TERMS, Query, boost_suffix, field_prefix};
use crate::util::str_hash;

/// Query matching every term that starts with a prefix.
#[derive(Debug, Clone, PartialEq)]
pub struct PrefixQuery {
    /// Field to search.
    pub field: String,
    /// Required term prefix.
    pub prefix: String,
    /// Maximum number of terms the query expands to.
    pub max_terms: usize,
    /// Query boost.
    pub boost: f32,
}

impl PrefixQuery {
    /// Create a new prefix query.
    pub fn new<F: Into<String>, P: Into<String>>(field: F, prefix: P) -> Self {
        PrefixQuery {
            field: field.into(),
            prefix: prefix.into(),
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
        let mut mtq = MultiTermQuery::new(self.field.as_str(), self.max_terms, 0.0)?;
        mtq.boost = self.boost;

        if reader.has_field(&self.field) {
            let mut terms = reader.terms_from(&self.field, &self.prefix);
            while let Some(term) = terms.term() {
                if !term.starts_with(self.prefix.as_str()) {
                    break;
                }
                trace!("Prefix {} matched {}", self.prefix, term);
                mtq.add_term(term);
                if !terms.next() {
                    break;
                }
            }
        }
        Ok(Query::MultiTerm(mtq))
    }

    pub(crate) fn to_s(&self, default_field: Option<&str>) -> String {
        format!(
            "{}{}*{}",
            field_prefix(&self.field, default_field),
            self.prefix,
            boost_suffix(self.boost)
        )
    }

    pub(crate) fn hash_code(&self) -> u64 {
        str_hash(&self.field) ^ str_hash(&self.prefix)
    }
}
