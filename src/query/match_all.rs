//! Query matching every live document.

use std::fmt;
use std::sync::Arc;

use crate::error::Result;
use crate::index::{DocId, IndexReader};
use crate::query::scorer::Scorer;
use crate::query::weight::{Weight, WeightState};
use crate::query::{Query, boost_suffix};
use crate::search::explanation::Explanation;
use crate::search::searcher::IndexSearcher;
use crate::util::float_to_s;

/// Query matching every document that is not deleted. Every document
/// scores the same.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchAllQuery {
    /// Query boost.
    pub boost: f32,
}

impl MatchAllQuery {
    /// Create a new match-all query.
    pub fn new() -> Self {
        MatchAllQuery { boost: 1.0 }
    }

    pub(crate) fn to_s(&self) -> String {
        format!("*{}", boost_suffix(self.boost))
    }

    pub(crate) fn create_weight(
        &self,
        query: &Query,
        searcher: &IndexSearcher,
    ) -> Result<Box<dyn Weight>> {
        Ok(Box::new(MatchAllWeight {
            query: query.clone(),
            state: WeightState::new(Arc::clone(searcher.similarity()), self.boost, 1.0),
        }))
    }
}

impl Default for MatchAllQuery {
    fn default() -> Self {
        Self::new()
    }
}

/// Weight of a [`MatchAllQuery`].
#[derive(Debug)]
pub struct MatchAllWeight {
    query: Query,
    state: WeightState,
}

impl Weight for MatchAllWeight {
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
        Ok(Some(Box::new(MatchAllScorer {
            reader: Arc::clone(reader),
            max_doc: reader.max_doc(),
            score: self.state.value,
            doc: None,
        })))
    }

    fn explain(&self, reader: &Arc<dyn IndexReader>, doc: DocId) -> Result<Explanation> {
        if reader.is_deleted(doc) {
            return Ok(Explanation::new(
                self.state.value,
                format!("MatchAllQuery: doc {doc} was deleted"),
            ));
        }
        Ok(
            Explanation::new(self.state.value, "MatchAllQuery: product of:")
                .with_detail(Explanation::new(self.state.boost, "boost"))
                .with_detail(Explanation::new(self.state.qnorm, "query_norm")),
        )
    }
}

impl fmt::Display for MatchAllWeight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MatchAllWeight({})", float_to_s(f64::from(self.state.value)))
    }
}

/// Scorer stepping through every live document.
#[derive(Debug)]
pub struct MatchAllScorer {
    reader: Arc<dyn IndexReader>,
    max_doc: DocId,
    score: f32,
    doc: Option<DocId>,
}

impl MatchAllScorer {
    fn advance_from(&mut self, mut doc: DocId) -> bool {
        while doc < self.max_doc {
            if !self.reader.is_deleted(doc) {
                self.doc = Some(doc);
                return true;
            }
            doc += 1;
        }
        self.doc = None;
        false
    }
}

impl Scorer for MatchAllScorer {
    fn next(&mut self) -> bool {
        let from = self.doc.map_or(0, |doc| doc + 1);
        self.advance_from(from)
    }

    fn skip_to(&mut self, target: DocId) -> bool {
        self.advance_from(target)
    }

    fn score(&mut self) -> f32 {
        debug_assert!(self.doc.is_some(), "score called on an unpositioned scorer");
        self.score
    }

    fn doc(&self) -> DocId {
        self.doc.unwrap_or(DocId::MAX)
    }

    fn explain(&mut self, _doc: DocId) -> Explanation {
        Explanation::new(1.0, "MatchAllScorer")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{Document, MemoryIndexReader, MemoryIndexWriter};

    fn reader(num_docs: usize) -> MemoryIndexReader {
        let mut writer = MemoryIndexWriter::new();
        for i in 0..num_docs {
            writer.add_document(Document::builder().add_text("field", format!("doc{i}")).build());
        }
        writer.into_reader()
    }

    #[test]
    fn test_matches_live_documents() {
        let reader = Arc::new(reader(6));
        reader.delete_document(0).unwrap();
        reader.delete_document(3).unwrap();
        reader.delete_document(5).unwrap();
        let searcher = IndexSearcher::new(reader);
        let weight = searcher.create_weight(&MatchAllQuery::new().into()).unwrap();
        let mut scorer = weight.scorer(searcher.reader()).unwrap().unwrap();

        let mut docs = Vec::new();
        while scorer.next() {
            docs.push(scorer.doc());
            assert_eq!(scorer.score(), weight.value());
        }
        assert_eq!(docs, vec![1, 2, 4]);
        assert!(!scorer.next());
    }

    #[test]
    fn test_skip_to() {
        let searcher = IndexSearcher::new(Arc::new(reader(10)));
        let weight = searcher.create_weight(&MatchAllQuery::new().into()).unwrap();
        let mut scorer = weight.scorer(searcher.reader()).unwrap().unwrap();
        assert!(scorer.skip_to(4));
        assert_eq!(scorer.doc(), 4);
        assert!(scorer.next());
        assert_eq!(scorer.doc(), 5);
        assert!(scorer.skip_to(9));
        assert!(!scorer.skip_to(10));
    }

    #[test]
    fn test_explain() {
        let reader = Arc::new(reader(3));
        reader.delete_document(1).unwrap();
        let searcher = IndexSearcher::new(reader);
        let query = Query::from(MatchAllQuery::new()).with_boost(2.0);
        let weight = searcher.create_weight(&query).unwrap();

        let expl = weight.explain(searcher.reader(), 0).unwrap();
        assert_eq!(expl.description, "MatchAllQuery: product of:");
        assert_eq!(expl.details[0].value, 2.0);
        assert_eq!(expl.value, weight.value());

        let expl = weight.explain(searcher.reader(), 1).unwrap();
        assert_eq!(expl.description, "MatchAllQuery: doc 1 was deleted");
    }

    #[test]
    fn test_to_s_hash_and_eq() {
        let query = Query::from(MatchAllQuery::new());
        assert_eq!(query.to_s(None), "*");
        assert_eq!(query.clone().with_boost(0.5).to_s(None), "*^0.5");
        assert_eq!(query, Query::from(MatchAllQuery::new()));
        assert_eq!(query.hash_code(), 6);
    }
}
