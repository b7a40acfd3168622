//! Queries over a bounded set of boosted terms in one field.
//!
//! Prefix, wildcard and fuzzy queries all rewrite into a [`MultiTermQuery`].
//! The terms are held in a bounded [`PriorityQueue`] so that only the
//! `max_terms` best terms (by boost) survive the expansion.

use std::fmt;
use std::sync::Arc;

use crate::error::{Result, XiphosError};
use crate::index::{DocId, IndexReader, Term, TermDocs};
use crate::query::scorer::{SCORE_CACHE_SIZE, Scorer};
use crate::query::weight::{Weight, WeightState, combine_explanations};
use crate::query::{DEFAULT_MAX_TERMS, Query, boost_suffix, field_prefix};
use crate::search::explanation::Explanation;
use crate::search::searcher::IndexSearcher;
use crate::search::similarity::Similarity;
use crate::util::{HashSet, PriorityQueue, float_hash, float_to_s, str_hash};

/// Number of postings each term wrapper buffers.
const WRAPPER_READ_SIZE: usize = 16;

/// A term with its boost.
#[derive(Debug, Clone, PartialEq)]
pub struct BoostedTerm {
    /// Term text.
    pub term: String,
    /// Boost applied to the term's score.
    pub boost: f32,
}

fn boosted_term_less_than(a: &BoostedTerm, b: &BoostedTerm) -> bool {
    if a.boost != b.boost {
        return a.boost < b.boost;
    }
    a.term < b.term
}

/// Query matching any of a set of boosted terms.
#[derive(Debug, Clone)]
pub struct MultiTermQuery {
    /// Field to search.
    pub field: String,
    /// Query boost.
    pub boost: f32,
    min_boost: f32,
    boosted_terms: PriorityQueue<BoostedTerm>,
}

impl MultiTermQuery {
    /// Create a query holding at most `max_terms` terms. Terms with a boost
    /// not above `min_boost` are dropped.
    pub fn new<F: Into<String>>(field: F, max_terms: usize, min_boost: f32) -> Result<Self> {
        if max_terms == 0 {
            return Err(XiphosError::argument(format!(
                ":max_terms must be greater than or equal to zero. {max_terms} < 0"
            )));
        }
        Ok(MultiTermQuery {
            field: field.into(),
            boost: 1.0,
            min_boost,
            boosted_terms: PriorityQueue::new(max_terms, boosted_term_less_than),
        })
    }

    /// Create a query with the default term limit and no minimum boost.
    pub fn with_field<F: Into<String>>(field: F) -> Self {
        MultiTermQuery {
            field: field.into(),
            boost: 1.0,
            min_boost: 0.0,
            boosted_terms: PriorityQueue::new(DEFAULT_MAX_TERMS, boosted_term_less_than),
        }
    }

    /// Add a term with boost 1.
    pub fn add_term<T: Into<String>>(&mut self, term: T) {
        self.add_term_boost(term, 1.0);
    }

    /// Add a term with a boost. The term is ignored when empty or when
    /// `boost` is not above the minimum boost. Once the queue is full the
    /// minimum boost rises to the lowest boost held.
    pub fn add_term_boost<T: Into<String>>(&mut self, term: T, boost: f32) {
        let term = term.into();
        if boost <= self.min_boost || term.is_empty() {
            return;
        }
        self.boosted_terms.insert(BoostedTerm { term, boost });
        if self.boosted_terms.is_full() {
            if let Some(top) = self.boosted_terms.top() {
                self.min_boost = top.boost;
            }
        }
    }

    /// Current minimum boost a new term must exceed.
    pub fn min_boost(&self) -> f32 {
        self.min_boost
    }

    /// Maximum number of terms held.
    pub fn max_terms(&self) -> usize {
        self.boosted_terms.capacity()
    }

    /// Number of terms held.
    pub fn term_count(&self) -> usize {
        self.boosted_terms.size()
    }

    /// The held terms, in reverse heap order.
    pub fn terms(&self) -> impl Iterator<Item = &BoostedTerm> {
        self.boosted_terms.iter().rev()
    }

    pub(crate) fn to_s(&self, default_field: Option<&str>) -> String {
        let mut buf = field_prefix(&self.field, default_field);
        buf.push('"');
        let sorted = self.boosted_terms.clone().into_sorted_vec();
        let rendered: Vec<String> = sorted
            .iter()
            .map(|bt| {
                if bt.boost == 1.0 {
                    bt.term.clone()
                } else {
                    format!("{}^{}", bt.term, float_to_s(f64::from(bt.boost)))
                }
            })
            .collect();
        buf.push_str(&rendered.join("|"));
        buf.push('"');
        buf.push_str(&boost_suffix(self.boost));
        buf
    }

    pub(crate) fn hash_code(&self) -> u64 {
        self.terms().fold(str_hash(&self.field), |hash, bt| {
            hash ^ str_hash(&bt.term) ^ float_hash(bt.boost)
        })
    }

    pub(crate) fn eq_terms(&self, other: &MultiTermQuery) -> bool {
        self.field == other.field
            && self.term_count() == other.term_count()
            && self
                .terms()
                .zip(other.terms())
                .all(|(a, b)| a.term == b.term && a.boost == b.boost)
    }

    pub(crate) fn extract_terms(&self, terms: &mut HashSet<Term>) {
        for bt in self.terms() {
            terms.add(Arc::new(Term::new(self.field.as_str(), bt.term.as_str())));
        }
    }

    pub(crate) fn create_weight(
        &self,
        query: &Query,
        searcher: &IndexSearcher,
    ) -> Result<Box<dyn Weight>> {
        let similarity = Arc::clone(searcher.similarity());
        let doc_freq: u32 = self
            .terms()
            .map(|bt| searcher.doc_freq(&self.field, &bt.term))
            .sum();
        let idf = similarity.idf(doc_freq, searcher.max_doc());
        Ok(Box::new(MultiTermWeight {
            query: query.clone(),
            field: self.field.clone(),
            terms: self.terms().cloned().collect(),
            state: WeightState::new(similarity, self.boost, idf),
        }))
    }
}

/// Weight of a [`MultiTermQuery`].
#[derive(Debug)]
pub struct MultiTermWeight {
    query: Query,
    field: String,
    terms: Vec<BoostedTerm>,
    state: WeightState,
}

impl Weight for MultiTermWeight {
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
        if self.terms.is_empty() || !reader.has_field(&self.field) {
            return Ok(None);
        }
        let wrappers: Vec<TermDocsWrapper> = self
            .terms
            .iter()
            .filter(|bt| {
                reader.terms_from(&self.field, &bt.term).term() == Some(bt.term.as_str())
            })
            .map(|bt| {
                TermDocsWrapper::new(
                    &bt.term,
                    reader.term_docs(&self.field, &bt.term),
                    bt.boost,
                )
            })
            .collect();
        if wrappers.is_empty() {
            return Ok(None);
        }
        Ok(Some(Box::new(MultiTermScorer::new(
            &self.field,
            wrappers,
            reader.norms(&self.field),
            Arc::clone(&self.state.similarity),
            self.state.value,
        ))))
    }

    fn explain(&self, reader: &Arc<dyn IndexReader>, doc: DocId) -> Result<Explanation> {
        if !reader.has_field(&self.field) {
            return Ok(Explanation::new(
                0.0,
                format!("field \"{}\" does not exist in the index", self.field),
            ));
        }
        let query_str = self.query.to_s(None);
        let expl = Explanation::new(0.0, format!("weight({query_str} in {doc}), product of:"));

        let mut doc_freqs = String::new();
        let mut total_doc_freqs = 0;
        for bt in &self.terms {
            let doc_freq = reader.doc_freq(&self.field, &bt.term);
            doc_freqs.push_str(&format!("({}={doc_freq}) + ", bt.term));
            total_doc_freqs += doc_freq;
        }
        doc_freqs.truncate(doc_freqs.len().saturating_sub(2));
        doc_freqs.push_str(&format!("= {total_doc_freqs}"));
        let idf_expl = Explanation::new(
            self.state.idf,
            format!("idf({}:<{doc_freqs}>)", self.field),
        );

        let query_expl = self.state.explain_query(&query_str, idf_expl.clone());

        let mut field_expl = Explanation::new(
            0.0,
            format!("field_weight({query_str} in {doc}), product of:"),
        );
        let tf_expl = match self.scorer(reader)? {
            Some(mut scorer) => scorer.explain(doc),
            None => Explanation::new(0.0, "no terms were found"),
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

impl fmt::Display for MultiTermWeight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "MultiTermWeight({})",
            float_to_s(f64::from(self.state.value))
        )
    }
}

/// Buffered postings of one term of a multi-term scorer.
#[derive(Debug)]
struct TermDocsWrapper {
    term: String,
    term_docs: Box<dyn TermDocs>,
    boost: f32,
    doc: DocId,
    freq: u32,
    docs: [DocId; WRAPPER_READ_SIZE],
    freqs: [u32; WRAPPER_READ_SIZE],
    pointer: usize,
    pointer_max: usize,
}

impl TermDocsWrapper {
    fn new(term: &str, term_docs: Box<dyn TermDocs>, boost: f32) -> Self {
        TermDocsWrapper {
            term: term.to_string(),
            term_docs,
            boost,
            doc: DocId::MAX,
            freq: 0,
            docs: [0; WRAPPER_READ_SIZE],
            freqs: [0; WRAPPER_READ_SIZE],
            pointer: 0,
            pointer_max: 0,
        }
    }

    fn next(&mut self) -> bool {
        self.pointer += 1;
        if self.pointer >= self.pointer_max {
            self.pointer_max = self.term_docs.read(&mut self.docs, &mut self.freqs);
            if self.pointer_max == 0 {
                return false;
            }
            self.pointer = 0;
        }
        self.doc = self.docs[self.pointer];
        self.freq = self.freqs[self.pointer];
        true
    }

    fn skip_to(&mut self, target: DocId) -> bool {
        loop {
            self.pointer += 1;
            if self.pointer >= self.pointer_max {
                break;
            }
            if self.docs[self.pointer] >= target {
                self.doc = self.docs[self.pointer];
                self.freq = self.freqs[self.pointer];
                return true;
            }
        }

        if !self.term_docs.skip_to(target) {
            return false;
        }
        self.pointer_max = 1;
        self.pointer = 0;
        self.doc = self.term_docs.doc();
        self.freq = self.term_docs.freq();
        self.docs[0] = self.doc;
        self.freqs[0] = self.freq;
        true
    }
}

/// Scorer merging the postings of several terms in document order.
#[derive(Debug)]
pub struct MultiTermScorer {
    field: String,
    pending: Vec<TermDocsWrapper>,
    queue: Option<PriorityQueue<TermDocsWrapper>>,
    norms: Option<Arc<[u8]>>,
    similarity: Arc<dyn Similarity>,
    weight_value: f32,
    score_cache: [f32; SCORE_CACHE_SIZE],
    total_score: f32,
    doc: Option<DocId>,
}

impl MultiTermScorer {
    fn new(
        field: &str,
        wrappers: Vec<TermDocsWrapper>,
        norms: Option<Arc<[u8]>>,
        similarity: Arc<dyn Similarity>,
        weight_value: f32,
    ) -> Self {
        let mut score_cache = [0.0; SCORE_CACHE_SIZE];
        for (i, slot) in score_cache.iter_mut().enumerate() {
            *slot = similarity.tf(i as f32);
        }
        MultiTermScorer {
            field: field.to_string(),
            pending: wrappers,
            queue: None,
            norms,
            similarity,
            weight_value,
            score_cache,
            total_score: 0.0,
            doc: None,
        }
    }

    /// Build the document-ordered queue on first use, positioning every
    /// wrapper with `position` and dropping the exhausted ones.
    fn ensure_queue<F>(&mut self, mut position: F)
    where
        F: FnMut(&mut TermDocsWrapper) -> bool,
    {
        if self.queue.is_some() {
            return;
        }
        let wrappers = std::mem::take(&mut self.pending);
        let mut queue = PriorityQueue::new(
            wrappers.len(),
            |a: &TermDocsWrapper, b: &TermDocsWrapper| a.doc < b.doc,
        );
        for mut wrapper in wrappers.into_iter().rev() {
            if position(&mut wrapper) {
                queue.push(wrapper);
            }
        }
        self.queue = Some(queue);
    }

    /// Move every wrapper to a document `>= target`. Returns false once no
    /// wrapper is left.
    fn advance_to(&mut self, target: DocId) -> bool {
        self.ensure_queue(|w| w.skip_to(target));
        let Some(queue) = self.queue.as_mut() else {
            return false;
        };
        if queue.is_empty() {
            self.doc = None;
            return false;
        }
        while let Some(top) = queue.top_mut() {
            if top.doc >= target {
                break;
            }
            if top.skip_to(target) {
                queue.down();
            } else {
                queue.pop();
            }
        }
        !queue.is_empty()
    }

    fn norm(&self, doc: DocId) -> f32 {
        self.norms
            .as_ref()
            .and_then(|norms| norms.get(doc as usize).copied())
            .map_or(1.0, |b| self.similarity.decode_norm(b))
    }
}

impl Scorer for MultiTermScorer {
    fn next(&mut self) -> bool {
        self.ensure_queue(TermDocsWrapper::next);
        let Some(queue) = self.queue.as_mut() else {
            return false;
        };
        let Some(curr_doc) = queue.top().map(|w| w.doc) else {
            self.doc = None;
            return false;
        };

        let mut total_score = 0.0;
        while let Some(wrapper) = queue.top_mut() {
            if wrapper.doc != curr_doc {
                break;
            }
            let freq = wrapper.freq as usize;
            let tf = if freq < SCORE_CACHE_SIZE {
                self.score_cache[freq]
            } else {
                self.similarity.tf(freq as f32)
            };
            total_score += tf * wrapper.boost;
            if wrapper.next() {
                queue.down();
            } else {
                queue.pop();
            }
        }
        self.doc = Some(curr_doc);
        self.total_score = total_score;
        true
    }

    fn skip_to(&mut self, target: DocId) -> bool {
        self.advance_to(target) && self.next()
    }

    fn score(&mut self) -> f32 {
        debug_assert!(self.doc.is_some(), "score called on an unpositioned scorer");
        let norm = self.doc.map_or(1.0, |doc| self.norm(doc));
        self.total_score * self.weight_value * norm
    }

    fn doc(&self) -> DocId {
        self.doc.unwrap_or(DocId::MAX)
    }

    fn explain(&mut self, doc: DocId) -> Explanation {
        let on_doc = self.advance_to(doc)
            && self
                .queue
                .as_ref()
                .and_then(|queue| queue.top())
                .is_some_and(|top| top.doc == doc);
        if !on_doc {
            return Explanation::new(0.0, "None of the required terms exist in the index");
        }

        let mut expl = Explanation::new(0.0, "The sum of:");
        let mut total_score = 0.0;
        self.doc = Some(doc);
        if let Some(queue) = self.queue.as_mut() {
            while let Some(wrapper) = queue.top_mut() {
                if wrapper.doc != doc {
                    break;
                }
                let value = self.similarity.tf(wrapper.freq as f32) * wrapper.boost;
                expl.add_detail(Explanation::new(
                    value,
                    format!(
                        "tf(term_freq({}:{})={})^{}",
                        self.field,
                        wrapper.term,
                        wrapper.freq,
                        float_to_s(f64::from(wrapper.boost))
                    ),
                ));
                total_score += value;
                if wrapper.next() {
                    queue.down();
                } else {
                    queue.pop();
                }
            }
        }
        expl.value = total_score;
        expl
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{Document, MemoryIndexWriter};

    fn searcher_for(texts: &[&str]) -> IndexSearcher {
        let mut writer = MemoryIndexWriter::new();
        for text in texts {
            writer.add_document(Document::builder().add_text("field", *text).build());
        }
        IndexSearcher::new(Arc::new(writer.into_reader()))
    }

    fn matching_docs(searcher: &IndexSearcher, query: &Query) -> Vec<(DocId, f32)> {
        let weight = searcher.create_weight(query).unwrap();
        let mut out = Vec::new();
        if let Some(mut scorer) = weight.scorer(searcher.reader()).unwrap() {
            while scorer.next() {
                out.push((scorer.doc(), scorer.score()));
            }
        }
        out
    }

    #[test]
    fn test_max_terms_must_be_positive() {
        let err = MultiTermQuery::new("field", 0, 0.0).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Argument error: :max_terms must be greater than or equal to zero. 0 < 0"
        );
    }

    #[test]
    fn test_to_s() {
        let mut mtq = MultiTermQuery::with_field("field");
        assert_eq!(Query::from(mtq.clone()).to_s(Some("field")), "\"\"");
        mtq.add_term("brown");
        assert_eq!(Query::from(mtq.clone()).to_s(Some("field")), "\"brown\"");
        mtq.add_term_boost("quick", 0.5);
        mtq.add_term("fox");
        assert_eq!(
            Query::from(mtq.clone()).to_s(Some("field")),
            "\"quick^0.5|brown|fox\""
        );
        assert_eq!(
            Query::from(mtq).with_boost(80.1).to_s(None),
            "field:\"quick^0.5|brown|fox\"^80.1"
        );
    }

    #[test]
    fn test_min_boost_rises_when_full() {
        let mut mtq = MultiTermQuery::new("field", 3, 0.5).unwrap();
        mtq.add_term_boost("low", 0.5);
        mtq.add_term("");
        assert_eq!(mtq.term_count(), 0);

        mtq.add_term_boost("a", 0.6);
        mtq.add_term_boost("b", 0.8);
        assert_eq!(mtq.min_boost(), 0.5);
        mtq.add_term_boost("c", 0.7);
        assert_eq!(mtq.min_boost(), 0.6);
        mtq.add_term_boost("d", 0.9);
        assert_eq!(mtq.min_boost(), 0.7);
        mtq.add_term_boost("e", 0.65);
        assert_eq!(mtq.term_count(), 3);

        let mut kept: Vec<&str> = mtq.terms().map(|bt| bt.term.as_str()).collect();
        kept.sort();
        assert_eq!(kept, vec!["b", "c", "d"]);
    }

    #[test]
    fn test_equal_boosts_print_in_term_order() {
        let mut mtq = MultiTermQuery::new("field", 2, 0.0).unwrap();
        mtq.add_term("b");
        mtq.add_term("a");
        assert_eq!(mtq.min_boost(), 1.0);
        mtq.add_term("c");
        assert_eq!(Query::from(mtq).to_s(Some("field")), "\"a|b\"");
    }

    #[test]
    fn test_hash_and_eq() {
        let mut mtq1 = MultiTermQuery::with_field("field");
        mtq1.add_term("quick");
        mtq1.add_term_boost("brown", 0.5);
        let mut mtq2 = MultiTermQuery::with_field("field");
        mtq2.add_term("quick");
        mtq2.add_term_boost("brown", 0.5);
        let q1 = Query::from(mtq1.clone());
        let q2 = Query::from(mtq2.clone());
        assert_eq!(q1, q2);
        assert_eq!(q1.hash_code(), q2.hash_code());

        mtq2.add_term("fox");
        assert_ne!(q1, Query::from(mtq2));

        let mut other_field = MultiTermQuery::with_field("other");
        other_field.add_term("quick");
        other_field.add_term_boost("brown", 0.5);
        assert_ne!(q1, Query::from(other_field));
    }

    #[test]
    fn test_scoring_sums_boosted_terms() {
        let searcher = searcher_for(&["quick brown", "brown fox", "lazy dog", "quick fox"]);
        let mut mtq = MultiTermQuery::with_field("field");
        mtq.add_term("quick");
        mtq.add_term_boost("fox", 2.0);
        mtq.add_term("missing");
        let hits = matching_docs(&searcher, &mtq.into());
        let docs: Vec<DocId> = hits.iter().map(|(d, _)| *d).collect();
        assert_eq!(docs, vec![0, 1, 3]);
        assert!(hits[2].1 > hits[1].1);
        assert!(hits[1].1 > hits[0].1);
    }

    #[test]
    fn test_no_terms_or_missing_field_has_no_scorer() {
        let searcher = searcher_for(&["quick brown"]);
        let empty = Query::from(MultiTermQuery::with_field("field"));
        assert!(matching_docs(&searcher, &empty).is_empty());

        let mut missing = MultiTermQuery::with_field("nope");
        missing.add_term("quick");
        let weight = searcher.create_weight(&missing.into()).unwrap();
        assert!(weight.scorer(searcher.reader()).unwrap().is_none());
        let expl = weight.explain(searcher.reader(), 0).unwrap();
        assert_eq!(expl.description, "field \"nope\" does not exist in the index");
    }

    #[test]
    fn test_skip_to() {
        let texts: Vec<String> = (0..60)
            .map(|i| match i % 3 {
                0 => "apple".to_string(),
                1 => "banana".to_string(),
                _ => "cherry".to_string(),
            })
            .collect();
        let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
        let searcher = searcher_for(&refs);
        let mut mtq = MultiTermQuery::with_field("field");
        mtq.add_term("apple");
        mtq.add_term("cherry");
        let weight = searcher.create_weight(&mtq.into()).unwrap();
        let mut scorer = weight.scorer(searcher.reader()).unwrap().unwrap();
        assert!(scorer.skip_to(10));
        assert_eq!(scorer.doc(), 11);
        assert!(scorer.next());
        assert_eq!(scorer.doc(), 12);
        assert!(scorer.skip_to(40));
        assert_eq!(scorer.doc(), 41);
        assert!(!scorer.skip_to(60));
    }

    #[test]
    fn test_explain() {
        let searcher = searcher_for(&["quick brown", "brown fox fox", "lazy dog"]);
        let mut mtq = MultiTermQuery::with_field("field");
        mtq.add_term("quick");
        mtq.add_term_boost("fox", 2.0);
        let query = Query::from(mtq);
        let weight = searcher.create_weight(&query).unwrap();
        let reader = searcher.reader();

        let mut scorer = weight.scorer(reader).unwrap().unwrap();
        while scorer.next() {
            let expl = weight.explain(reader, scorer.doc()).unwrap();
            assert!((expl.value - scorer.score()).abs() < 1e-5);
        }

        let mut scorer = weight.scorer(reader).unwrap().unwrap();
        let tf_expl = scorer.explain(1);
        assert_eq!(tf_expl.description, "The sum of:");
        assert_eq!(
            tf_expl.details[0].description,
            "tf(term_freq(field:fox)=2)^2.0"
        );

        let mut scorer = weight.scorer(reader).unwrap().unwrap();
        assert_eq!(
            scorer.explain(2).description,
            "None of the required terms exist in the index"
        );

        let expl = weight.explain(reader, 0).unwrap();
        let text = expl.to_s();
        assert!(
            text.contains("idf(field:<(quick=1) + (fox=1) = 2>)")
                || text.contains("idf(field:<(fox=1) + (quick=1) = 2>)")
        );
    }

    #[test]
    fn test_extract_terms() {
        let mut mtq = MultiTermQuery::with_field("field");
        mtq.add_term("quick");
        mtq.add_term("brown");
        let mut terms = HashSet::new();
        Query::from(mtq).extract_terms(&mut terms);
        assert_eq!(terms.len(), 2);
        assert!(terms.contains(&Term::new("field", "quick")));
        assert!(terms.contains(&Term::new("field", "brown")));
    }
}
