//! Single term queries.

use std::fmt;
use std::sync::Arc;

use crate::error::Result;
use crate::index::{DocId, IndexReader, TermDocs};
use crate::query::scorer::{SCORE_CACHE_SIZE, Scorer};
use crate::query::weight::{Weight, WeightState, combine_explanations};
use crate::query::{Query, boost_suffix, field_prefix};
use crate::search::explanation::Explanation;
use crate::search::searcher::IndexSearcher;
use crate::search::similarity::Similarity;
use crate::util::{float_to_s, str_hash};

/// Number of postings a term scorer reads at once.
pub const TDE_READ_SIZE: usize = 32;

/// Query matching every document containing a term.
#[derive(Debug, Clone, PartialEq)]
pub struct TermQuery {
    /// Field to search.
    pub field: String,
    /// Term text.
    pub term: String,
    /// Query boost.
    pub boost: f32,
}

impl TermQuery {
    /// Create a new term query.
    pub fn new<F: Into<String>, T: Into<String>>(field: F, term: T) -> Self {
        TermQuery {
            field: field.into(),
            term: term.into(),
            boost: 1.0,
        }
    }

    pub(crate) fn to_s(&self, default_field: Option<&str>) -> String {
        format!(
            "{}{}{}",
            field_prefix(&self.field, default_field),
            self.term,
            boost_suffix(self.boost)
        )
    }

    pub(crate) fn hash_code(&self) -> u64 {
        str_hash(&self.term) ^ str_hash(&self.field)
    }

    pub(crate) fn create_weight(
        &self,
        query: &Query,
        searcher: &IndexSearcher,
    ) -> Result<Box<dyn Weight>> {
        let similarity = Arc::clone(searcher.similarity());
        let idf = similarity.idf(
            searcher.doc_freq(&self.field, &self.term),
            searcher.max_doc(),
        );
        Ok(Box::new(TermWeight {
            query: query.clone(),
            field: self.field.clone(),
            term: self.term.clone(),
            state: WeightState::new(similarity, self.boost, idf),
        }))
    }
}

/// Weight of a [`TermQuery`].
#[derive(Debug)]
pub struct TermWeight {
    query: Query,
    field: String,
    term: String,
    state: WeightState,
}

impl Weight for TermWeight {
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
        Ok(Some(Box::new(TermScorer::new(
            &self.field,
            &self.term,
            reader.term_docs(&self.field, &self.term),
            reader.norms(&self.field),
            Arc::clone(&self.state.similarity),
            self.state.value,
        ))))
    }

    fn explain(&self, reader: &Arc<dyn IndexReader>, doc: DocId) -> Result<Explanation> {
        let query_str = self.query.to_s(None);
        let doc_freq = reader.doc_freq(&self.field, &self.term);
        let idf_expl = Explanation::new(self.state.idf, format!("idf(doc_freq={doc_freq})"));

        let expl = Explanation::new(0.0, format!("weight({query_str} in {doc}), product of:"));
        let query_expl = self.state.explain_query(&query_str, idf_expl.clone());

        let mut field_expl = Explanation::new(
            0.0,
            format!(
                "field_weight({}:{} in {doc}), product of:",
                self.field, self.term
            ),
        );
        let tf_expl = match self.scorer(reader)? {
            Some(mut scorer) => scorer.explain(doc),
            None => Explanation::new(0.0, "no matching term"),
        };
        let field_norm = self.state.field_norm(reader.as_ref(), &self.field, doc);
        field_expl.value = tf_expl.value * self.state.idf * field_norm;
        field_expl.add_detail(tf_expl);
        field_expl.add_detail(idf_expl);
        field_expl.add_detail(Explanation::new(
            field_norm,
            format!("field_norm(field={}, doc={doc})", self.field),
        ));

        Ok(combine_explanations(expl, query_expl, field_expl))
    }
}

impl fmt::Display for TermWeight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TermWeight({})", float_to_s(f64::from(self.state.value)))
    }
}

/// Scorer walking the postings of a single term.
#[derive(Debug)]
pub struct TermScorer {
    field: String,
    term: String,
    term_docs: Box<dyn TermDocs>,
    norms: Option<Arc<[u8]>>,
    similarity: Arc<dyn Similarity>,
    weight_value: f32,
    docs: [DocId; TDE_READ_SIZE],
    freqs: [u32; TDE_READ_SIZE],
    pointer: usize,
    pointer_max: usize,
    score_cache: [f32; SCORE_CACHE_SIZE],
    doc: Option<DocId>,
}

impl TermScorer {
    fn new(
        field: &str,
        term: &str,
        term_docs: Box<dyn TermDocs>,
        norms: Option<Arc<[u8]>>,
        similarity: Arc<dyn Similarity>,
        weight_value: f32,
    ) -> Self {
        let mut score_cache = [0.0; SCORE_CACHE_SIZE];
        for (i, slot) in score_cache.iter_mut().enumerate() {
            *slot = similarity.tf(i as f32) * weight_value;
        }
        TermScorer {
            field: field.to_string(),
            term: term.to_string(),
            term_docs,
            norms,
            similarity,
            weight_value,
            docs: [0; TDE_READ_SIZE],
            freqs: [0; TDE_READ_SIZE],
            pointer: 0,
            pointer_max: 0,
            score_cache,
            doc: None,
        }
    }

    fn norm(&self, doc: DocId) -> f32 {
        self.norms
            .as_ref()
            .and_then(|norms| norms.get(doc as usize).copied())
            .map_or(1.0, |b| self.similarity.decode_norm(b))
    }
}

impl Scorer for TermScorer {
    fn next(&mut self) -> bool {
        self.pointer += 1;
        if self.pointer >= self.pointer_max {
            self.pointer_max = self.term_docs.read(&mut self.docs, &mut self.freqs);
            if self.pointer_max == 0 {
                self.doc = None;
                return false;
            }
            self.pointer = 0;
        }
        self.doc = Some(self.docs[self.pointer]);
        true
    }

    fn skip_to(&mut self, target: DocId) -> bool {
        loop {
            self.pointer += 1;
            if self.pointer >= self.pointer_max {
                break;
            }
            if self.docs[self.pointer] >= target {
                self.doc = Some(self.docs[self.pointer]);
                return true;
            }
        }

        if self.term_docs.skip_to(target) {
            self.pointer_max = 1;
            self.pointer = 0;
            self.docs[0] = self.term_docs.doc();
            self.freqs[0] = self.term_docs.freq();
            self.doc = Some(self.docs[0]);
            true
        } else {
            self.doc = None;
            false
        }
    }

    fn score(&mut self) -> f32 {
        debug_assert!(self.doc.is_some(), "score called on an unpositioned scorer");
        let freq = self.freqs[self.pointer] as usize;
        let score = if freq < SCORE_CACHE_SIZE {
            self.score_cache[freq]
        } else {
            self.similarity.tf(freq as f32) * self.weight_value
        };
        score * self.norm(self.docs[self.pointer])
    }

    fn doc(&self) -> DocId {
        self.doc.unwrap_or(DocId::MAX)
    }

    fn explain(&mut self, doc: DocId) -> Explanation {
        self.skip_to(doc);
        let tf = if self.doc == Some(doc) {
            self.freqs[self.pointer]
        } else {
            0
        };
        Explanation::new(
            self.similarity.tf(tf as f32),
            format!("tf(term_freq({}:{})={tf})", self.field, self.term),
        )
    }
}
