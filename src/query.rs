//! Query types and their execution.
//!
//! A [`Query`] is a closed set of query kinds. Searching a query goes
//! through three stages:
//!
//! 1. [`Query::rewrite`] expands pattern queries (prefix, wildcard, fuzzy)
//!    against a reader's term dictionary into a [`MultiTermQuery`].
//! 2. [`Query::create_weight`] binds the rewritten query to a searcher,
//!    computing idf and taking part in query normalisation.
//! 3. [`Weight::scorer`] produces a [`Scorer`] that walks the matching
//!    documents of a reader in increasing order.

pub mod constant_score;
pub mod filtered;
pub mod fuzzy;
pub mod match_all;
pub mod multi_term;
pub mod prefix;
pub mod scorer;
pub mod term;
pub mod weight;
pub mod wildcard;

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use log::trace;

use crate::error::{Result, XiphosError};
use crate::index::{IndexReader, Term};
use crate::search::searcher::IndexSearcher;
use crate::util::{HashSet, float_to_s};

pub use constant_score::ConstantScoreQuery;
pub use filtered::FilteredQuery;
pub use fuzzy::{FuzzyConfig, FuzzyQuery};
pub use match_all::MatchAllQuery;
pub use multi_term::MultiTermQuery;
pub use prefix::PrefixQuery;
pub use scorer::Scorer;
pub use term::TermQuery;
pub use weight::Weight;
pub use wildcard::WildcardQuery;

/// Default number of terms a pattern query expands to.
pub const DEFAULT_MAX_TERMS: usize = 256;

/// A search query.
#[derive(Debug, Clone)]
pub enum Query {
    /// A single term.
    Term(TermQuery),
    /// A set of boosted terms in one field.
    MultiTerm(MultiTermQuery),
    /// Every term starting with a prefix.
    Prefix(PrefixQuery),
    /// Every term matching a `*` / `?` pattern.
    Wildcard(WildcardQuery),
    /// Every term within an edit distance.
    Fuzzy(FuzzyQuery),
    /// Every live document.
    MatchAll(MatchAllQuery),
    /// Every document of a filter, scored by the boost alone.
    ConstantScore(ConstantScoreQuery),
    /// A query restricted to the documents of a filter.
    Filtered(FilteredQuery),
}

impl Query {
    /// Name of the query kind.
    pub fn type_name(&self) -> &'static str {
        match self {
            Query::Term(_) => "TermQuery",
            Query::MultiTerm(_) => "MultiTermQuery",
            Query::Prefix(_) => "PrefixQuery",
            Query::Wildcard(_) => "WildCardQuery",
            Query::Fuzzy(_) => "FuzzyQuery",
            Query::MatchAll(_) => "MatchAllQuery",
            Query::ConstantScore(_) => "ConstantScoreQuery",
            Query::Filtered(_) => "FilteredQuery",
        }
    }

    fn type_index(&self) -> u64 {
        match self {
            Query::Term(_) => 0,
            Query::MultiTerm(_) => 1,
            Query::ConstantScore(_) => 4,
            Query::Filtered(_) => 5,
            Query::MatchAll(_) => 6,
            Query::Wildcard(_) => 8,
            Query::Fuzzy(_) => 9,
            Query::Prefix(_) => 10,
        }
    }

    /// The query boost.
    pub fn boost(&self) -> f32 {
        match self {
            Query::Term(q) => q.boost,
            Query::MultiTerm(q) => q.boost,
            Query::Prefix(q) => q.boost,
            Query::Wildcard(q) => q.boost,
            Query::Fuzzy(q) => q.boost,
            Query::MatchAll(q) => q.boost,
            Query::ConstantScore(q) => q.boost,
            Query::Filtered(q) => q.boost,
        }
    }

    /// Set the query boost.
    pub fn set_boost(&mut self, boost: f32) {
        match self {
            Query::Term(q) => q.boost = boost,
            Query::MultiTerm(q) => q.boost = boost,
            Query::Prefix(q) => q.boost = boost,
            Query::Wildcard(q) => q.boost = boost,
            Query::Fuzzy(q) => q.boost = boost,
            Query::MatchAll(q) => q.boost = boost,
            Query::ConstantScore(q) => q.boost = boost,
            Query::Filtered(q) => q.boost = boost,
        }
    }

    /// Builder form of [`Query::set_boost`].
    pub fn with_boost(mut self, boost: f32) -> Self {
        self.set_boost(boost);
        self
    }

    /// Rewrite into a query that can create a weight. Pattern queries
    /// expand into the terms of `reader` they match; every other kind
    /// returns itself.
    pub fn rewrite(&self, reader: &dyn IndexReader) -> Result<Query> {
        let rewritten = match self {
            Query::Prefix(q) => q.rewrite(reader)?,
            Query::Wildcard(q) => q.rewrite(reader)?,
            Query::Fuzzy(q) => q.rewrite(reader)?,
            Query::Filtered(q) => return q.rewrite(reader),
            _ => return Ok(self.clone()),
        };
        trace!("Rewrote {self} to {rewritten}");
        Ok(rewritten)
    }

    /// Create the weight of an already rewritten query.
    pub fn create_weight(&self, searcher: &IndexSearcher) -> Result<Box<dyn Weight>> {
        match self {
            Query::Term(q) => q.create_weight(self, searcher),
            Query::MultiTerm(q) => q.create_weight(self, searcher),
            Query::MatchAll(q) => q.create_weight(self, searcher),
            Query::ConstantScore(q) => q.create_weight(self, searcher),
            Query::Filtered(q) => q.create_weight(self, searcher),
            Query::Prefix(_) | Query::Wildcard(_) | Query::Fuzzy(_) => Err(
                XiphosError::unsupported("Create weight is unsupported for this type of query"),
            ),
        }
    }

    /// Render the query. The field name is left out for terms in
    /// `default_field`.
    pub fn to_s(&self, default_field: Option<&str>) -> String {
        match self {
            Query::Term(q) => q.to_s(default_field),
            Query::MultiTerm(q) => q.to_s(default_field),
            Query::Prefix(q) => q.to_s(default_field),
            Query::Wildcard(q) => q.to_s(default_field),
            Query::Fuzzy(q) => q.to_s(default_field),
            Query::MatchAll(q) => q.to_s(),
            Query::ConstantScore(q) => q.to_s(),
            Query::Filtered(q) => q.to_s(default_field),
        }
    }

    /// Structural hash combining the kind-specific hash with the kind.
    pub fn hash_code(&self) -> u64 {
        let hash = match self {
            Query::Term(q) => q.hash_code(),
            Query::MultiTerm(q) => q.hash_code(),
            Query::Prefix(q) => q.hash_code(),
            Query::Wildcard(q) => q.hash_code(),
            Query::Fuzzy(q) => q.hash_code(),
            Query::MatchAll(_) => 0,
            Query::ConstantScore(q) => q.filter.hash_code(),
            Query::Filtered(q) => q.hash_code(),
        };
        (hash << 5) | self.type_index()
    }

    /// Add every term this query searches for to `terms`.
    pub fn extract_terms(&self, terms: &mut HashSet<Term>) {
        match self {
            Query::Term(q) => {
                terms.add(Arc::new(Term::new(q.field.as_str(), q.term.as_str())));
            }
            Query::MultiTerm(q) => q.extract_terms(terms),
            Query::Filtered(q) => q.query.extract_terms(terms),
            _ => {}
        }
    }
}

impl PartialEq for Query {
    fn eq(&self, other: &Self) -> bool {
        if self.boost() != other.boost() {
            return false;
        }
        match (self, other) {
            (Query::Term(a), Query::Term(b)) => a.field == b.field && a.term == b.term,
            (Query::MultiTerm(a), Query::MultiTerm(b)) => a.eq_terms(b),
            (Query::Prefix(a), Query::Prefix(b)) => a.field == b.field && a.prefix == b.prefix,
            (Query::Wildcard(a), Query::Wildcard(b)) => {
                a.field == b.field && a.pattern == b.pattern
            }
            (Query::Fuzzy(a), Query::Fuzzy(b)) => a.eq_fuzzy(b),
            (Query::MatchAll(_), Query::MatchAll(_)) => true,
            (Query::ConstantScore(a), Query::ConstantScore(b)) => a.filter == b.filter,
            (Query::Filtered(a), Query::Filtered(b)) => {
                a.query == b.query && a.filter == b.filter
            }
            _ => false,
        }
    }
}

impl Eq for Query {}

impl Hash for Query {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash_code());
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_s(None))
    }
}

macro_rules! impl_from_query {
    ($($ty:ident => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Query {
                fn from(query: $ty) -> Self {
                    Query::$variant(query)
                }
            }
        )*
    };
}

impl_from_query! {
    TermQuery => Term,
    MultiTermQuery => MultiTerm,
    PrefixQuery => Prefix,
    WildcardQuery => Wildcard,
    FuzzyQuery => Fuzzy,
    MatchAllQuery => MatchAll,
    ConstantScoreQuery => ConstantScore,
    FilteredQuery => Filtered,
}

/// `"field:"` unless `field` is the default field.
pub(crate) fn field_prefix(field: &str, default_field: Option<&str>) -> String {
    if default_field == Some(field) {
        String::new()
    } else {
        format!("{field}:")
    }
}

/// `"^boost"` unless the boost is 1.
pub(crate) fn boost_suffix(boost: f32) -> String {
    if boost == 1.0 {
        String::new()
    } else {
        format!("^{}", float_to_s(f64::from(boost)))
    }
}
