//! Weights: the searcher-dependent state of a query.
//!
//! A weight is created once per search from a rewritten query. It computes
//! the idf from the searcher, takes part in query normalisation and then
//! hands out a [`Scorer`] per reader.

use std::fmt::{Debug, Display};
use std::sync::Arc;

use crate::error::Result;
use crate::index::{DocId, IndexReader};
use crate::query::Query;
use crate::query::scorer::Scorer;
use crate::search::explanation::Explanation;
use crate::search::similarity::Similarity;

/// Trait for query weights.
pub trait Weight: Send + Sync + Debug + Display {
    /// The query this weight was created for.
    fn query(&self) -> &Query;

    /// The normalised weight handed to scorers.
    fn value(&self) -> f32;

    /// Sum of squared weights of the query terms, used for normalisation.
    fn sum_of_squared_weights(&mut self) -> f32;

    /// Apply the query normalisation factor.
    fn normalize(&mut self, norm: f32);

    /// Create a scorer over `reader`, or `None` when nothing can match.
    fn scorer(&self, reader: &Arc<dyn IndexReader>) -> Result<Option<Box<dyn Scorer>>>;

    /// Explain the score of `doc`.
    fn explain(&self, reader: &Arc<dyn IndexReader>, doc: DocId) -> Result<Explanation>;
}

/// Normalisation state shared by the weight implementations.
#[derive(Debug, Clone)]
pub struct WeightState {
    /// Similarity used by the scorers.
    pub similarity: Arc<dyn Similarity>,
    /// Boost of the query.
    pub boost: f32,
    /// Inverse document frequency.
    pub idf: f32,
    /// `idf * boost`, then scaled by the query norm.
    pub qweight: f32,
    /// The query norm passed to `normalize`.
    pub qnorm: f32,
    /// Final weight value.
    pub value: f32,
}

impl WeightState {
    /// Create the state for a query with `boost` and `idf`.
    pub fn new(similarity: Arc<dyn Similarity>, boost: f32, idf: f32) -> Self {
        WeightState {
            similarity,
            boost,
            idf,
            qweight: 0.0,
            qnorm: 0.0,
            value: 0.0,
        }
    }

    /// `(idf * boost)^2`.
    pub fn sum_of_squared_weights(&mut self) -> f32 {
        self.qweight = self.idf * self.boost;
        self.qweight * self.qweight
    }

    /// Scale the query weight by `norm` and derive the final value.
    pub fn normalize(&mut self, norm: f32) {
        self.qnorm = norm;
        self.qweight *= norm;
        self.value = self.qweight * self.idf;
    }

    /// The `query_weight(..)` explanation: boost (when not 1), idf and
    /// query norm.
    pub fn explain_query(&self, query_str: &str, idf_expl: Explanation) -> Explanation {
        let mut expl = Explanation::new(
            self.boost * idf_expl.value * self.qnorm,
            format!("query_weight({query_str}), product of:"),
        );
        if self.boost != 1.0 {
            expl.add_detail(Explanation::new(self.boost, "boost"));
        }
        expl.add_detail(idf_expl);
        expl.add_detail(Explanation::new(self.qnorm, "query_norm"));
        expl
    }

    /// Decoded field norm of `doc`, 0 when the field has no norms.
    pub fn field_norm(&self, reader: &dyn IndexReader, field: &str, doc: DocId) -> f32 {
        reader
            .norms(field)
            .and_then(|norms| norms.get(doc as usize).copied())
            .map_or(0.0, |b| self.similarity.decode_norm(b))
    }
}

/// Combine a query weight explanation with a field weight explanation.
/// When the query weight is exactly 1 the field explanation stands alone.
pub(crate) fn combine_explanations(
    mut expl: Explanation,
    query_expl: Explanation,
    field_expl: Explanation,
) -> Explanation {
    if query_expl.value == 1.0 {
        return field_expl;
    }
    expl.value = query_expl.value * field_expl.value;
    expl.add_detail(query_expl);
    expl.add_detail(field_expl);
    expl
}
