//! Queries restricted by a filter.

use std::fmt;
use std::sync::Arc;

use crate::error::Result;
use crate::index::{DocId, IndexReader};
use crate::query::scorer::Scorer;
use crate::query::weight::Weight;
use crate::query::{Query, boost_suffix};
use crate::search::explanation::Explanation;
use crate::search::filter::Filter;
use crate::search::searcher::IndexSearcher;
use crate::util::{BitVector, float_to_s};

/// Query whose matches are limited to the documents of a filter. Scores
/// come from the wrapped query unchanged.
#[derive(Debug, Clone)]
pub struct FilteredQuery {
    /// The wrapped query.
    pub query: Box<Query>,
    /// The filter restricting matches.
    pub filter: Arc<Filter>,
    /// Query boost.
    pub boost: f32,
}

impl FilteredQuery {
    /// Create a new filtered query.
    pub fn new(query: Query, filter: Arc<Filter>) -> Self {
        FilteredQuery {
            query: Box::new(query),
            filter,
            boost: 1.0,
        }
    }

    pub(crate) fn rewrite(&self, reader: &dyn IndexReader) -> Result<Query> {
        Ok(Query::Filtered(FilteredQuery {
            query: Box::new(self.query.rewrite(reader)?),
            filter: Arc::clone(&self.filter),
            boost: self.boost,
        }))
    }

    pub(crate) fn to_s(&self, default_field: Option<&str>) -> String {
        format!(
            "FilteredQuery(query:{}, filter:{}){}",
            self.query.to_s(default_field),
            self.filter.to_s(),
            boost_suffix(self.boost)
        )
    }

    pub(crate) fn hash_code(&self) -> u64 {
        self.query.hash_code() ^ self.filter.hash_code()
    }

    pub(crate) fn create_weight(
        &self,
        query: &Query,
        searcher: &IndexSearcher,
    ) -> Result<Box<dyn Weight>> {
        Ok(Box::new(FilteredWeight {
            query: query.clone(),
            filter: Arc::clone(&self.filter),
            sub_weight: searcher.create_weight(&self.query)?,
        }))
    }
}

/// Weight of a [`FilteredQuery`], delegating to the wrapped query's weight.
#[derive(Debug)]
pub struct FilteredWeight {
    query: Query,
    filter: Arc<Filter>,
    sub_weight: Box<dyn Weight>,
}

impl Weight for FilteredWeight {
    fn query(&self) -> &Query {
        &self.query
    }

    fn value(&self) -> f32 {
        self.sub_weight.value()
    }

    fn sum_of_squared_weights(&mut self) -> f32 {
        self.sub_weight.sum_of_squared_weights()
    }

    fn normalize(&mut self, norm: f32) {
        self.sub_weight.normalize(norm);
    }

    fn scorer(&self, reader: &Arc<dyn IndexReader>) -> Result<Option<Box<dyn Scorer>>> {
        let Some(sub_scorer) = self.sub_weight.scorer(reader)? else {
            return Ok(None);
        };
        Ok(Some(Box::new(FilteredScorer {
            sub_scorer,
            bits: self.filter.get_bv(reader)?,
        })))
    }

    fn explain(&self, reader: &Arc<dyn IndexReader>, doc: DocId) -> Result<Explanation> {
        self.sub_weight.explain(reader, doc)
    }
}

impl fmt::Display for FilteredWeight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "FilteredQueryWeight({})",
            float_to_s(f64::from(self.value()))
        )
    }
}

/// Scorer skipping the sub-scorer's documents that the filter rejects.
#[derive(Debug)]
pub struct FilteredScorer {
    sub_scorer: Box<dyn Scorer>,
    bits: Arc<BitVector>,
}

impl FilteredScorer {
    fn accepted(&self) -> bool {
        self.bits.get(self.sub_scorer.doc() as usize)
    }
}

impl Scorer for FilteredScorer {
    fn next(&mut self) -> bool {
        while self.sub_scorer.next() {
            if self.accepted() {
                return true;
            }
        }
        false
    }

    fn skip_to(&mut self, target: DocId) -> bool {
        if !self.sub_scorer.skip_to(target) {
            return false;
        }
        if self.accepted() {
            return true;
        }
        self.next()
    }

    fn score(&mut self) -> f32 {
        self.sub_scorer.score()
    }

    fn doc(&self) -> DocId {
        self.sub_scorer.doc()
    }

    fn explain(&mut self, doc: DocId) -> Explanation {
        self.sub_scorer.explain(doc)
    }
}
