//! Constant score queries.

use std::fmt;
use std::sync::Arc;

use crate::error::Result;
use crate::index::{DocId, IndexReader};
use crate::query::scorer::Scorer;
use crate::query::weight::{Weight, WeightState};
use crate::query::{Query, boost_suffix};
use crate::search::explanation::Explanation;
use crate::search::filter::Filter;
use crate::search::searcher::IndexSearcher;
use crate::util::{BitVector, float_to_s};

/// Query matching the documents of a filter, all with the same score.
#[derive(Debug, Clone)]
pub struct ConstantScoreQuery {
    /// The filter selecting documents.
    pub filter: Arc<Filter>,
    /// Query boost.
    pub boost: f32,
}

impl ConstantScoreQuery {
    /// Create a new constant score query.
    pub fn new(filter: Arc<Filter>) -> Self {
        ConstantScoreQuery { filter, boost: 1.0 }
    }

    pub(crate) fn to_s(&self) -> String {
        format!(
            "ConstantScore({}){}",
            self.filter.to_s(),
            boost_suffix(self.boost)
        )
    }

    pub(crate) fn create_weight(
        &self,
        query: &Query,
        searcher: &IndexSearcher,
    ) -> Result<Box<dyn Weight>> {
        Ok(Box::new(ConstantScoreWeight {
            query: query.clone(),
            filter: Arc::clone(&self.filter),
            state: WeightState::new(Arc::clone(searcher.similarity()), self.boost, 1.0),
        }))
    }
}

/// Weight of a [`ConstantScoreQuery`].
#[derive(Debug)]
pub struct ConstantScoreWeight {
    query: Query,
    filter: Arc<Filter>,
    state: WeightState,
}

impl Weight for ConstantScoreWeight {
    fn query(&self) -> &Query {
        &self.query
    }

    fn value(&self) -> f32 {
        self.state.value
    }

    fn sum_of_squared_weights(&mut self) -> f32 {
        self.state.sum_of_squared_weights()
    }

    fn normalize(&mut self, norm: f32) {
        self.state.normalize(norm);
    }

    fn scorer(&self, reader: &Arc<dyn IndexReader>) -> Result<Option<Box<dyn Scorer>>> {
        Ok(Some(Box::new(ConstantScoreScorer {
            bits: self.filter.get_bv(reader)?,
            score: self.state.value,
            doc: None,
        })))
    }

    fn explain(&self, reader: &Arc<dyn IndexReader>, doc: DocId) -> Result<Explanation> {
        let filter_str = self.filter.to_s();
        let bits = self.filter.get_bv(reader)?;
        if bits.get(doc as usize) {
            Ok(Explanation::new(
                self.state.value,
                format!("ConstantScoreQuery({filter_str}), product of:"),
            )
            .with_detail(Explanation::new(self.state.boost, "boost"))
            .with_detail(Explanation::new(self.state.qnorm, "query_norm")))
        } else {
            Ok(Explanation::new(
                self.state.value,
                format!("ConstantScoreQuery({filter_str}), does not match id {doc}"),
            ))
        }
    }
}

impl fmt::Display for ConstantScoreWeight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ConstantScoreWeight({})",
            float_to_s(f64::from(self.state.value))
        )
    }
}

/// Scorer walking the set bits of a filter.
#[derive(Debug)]
pub struct ConstantScoreScorer {
    bits: Arc<BitVector>,
    score: f32,
    doc: Option<DocId>,
}

impl ConstantScoreScorer {
    fn advance_from(&mut self, from: usize) -> bool {
        self.doc = self.bits.next_set_bit(from).map(|bit| bit as DocId);
        self.doc.is_some()
    }
}

impl Scorer for ConstantScoreScorer {
    fn next(&mut self) -> bool {
        let from = self.doc.map_or(0, |doc| doc as usize + 1);
        self.advance_from(from)
    }

    fn skip_to(&mut self, target: DocId) -> bool {
        self.advance_from(target as usize)
    }

    fn score(&mut self) -> f32 {
        debug_assert!(self.doc.is_some(), "score called on an unpositioned scorer");
        self.score
    }

    fn doc(&self) -> DocId {
        self.doc.unwrap_or(DocId::MAX)
    }

    fn explain(&mut self, _doc: DocId) -> Explanation {
        Explanation::new(1.0, "ConstantScoreScorer")
    }
}
