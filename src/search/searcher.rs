//! Searching a single index reader.

use std::fmt;
use std::sync::Arc;

use log::debug;

use crate::error::{Result, XiphosError};
use crate::index::{DocId, IndexReader};
use crate::query::{Query, Scorer, Weight};
use crate::search::explanation::Explanation;
use crate::search::filter::Filter;
use crate::search::similarity::{DefaultSimilarity, Similarity};
use crate::search::top_docs::{Hit, TopDocs, hit_lt};
use crate::util::{BitVector, PriorityQueue};

/// Score adjustment applied after filtering. Receives the document and its
/// score and returns a factor: 0 drops the document, a factor below 1
/// scales its score down.
pub type PostFilter = Arc<dyn Fn(DocId, f32) -> f32 + Send + Sync>;

/// Options for [`IndexSearcher::search`].
#[derive(Clone)]
pub struct SearchOptions {
    /// Number of top hits to skip.
    pub first_doc: usize,
    /// Number of hits to return. Must be greater than 0.
    pub num_docs: usize,
    /// Only documents passing this filter match.
    pub filter: Option<Arc<Filter>>,
    /// Applied to every document passing `filter`.
    pub post_filter: Option<PostFilter>,
}

impl SearchOptions {
    /// Options returning the first `num_docs` hits.
    pub fn new(num_docs: usize) -> Self {
        SearchOptions {
            num_docs,
            ..Default::default()
        }
    }

    /// Skip the first `first_doc` hits.
    pub fn first_doc(mut self, first_doc: usize) -> Self {
        self.first_doc = first_doc;
        self
    }

    /// Restrict matches to `filter`.
    pub fn filter(mut self, filter: Arc<Filter>) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Set the post filter.
    pub fn post_filter<F>(mut self, post_filter: F) -> Self
    where
        F: Fn(DocId, f32) -> f32 + Send + Sync + 'static,
    {
        self.post_filter = Some(Arc::new(post_filter));
        self
    }
}

impl Default for SearchOptions {
    fn default() -> Self {
        SearchOptions {
            first_doc: 0,
            num_docs: 10,
            filter: None,
            post_filter: None,
        }
    }
}

impl fmt::Debug for SearchOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SearchOptions")
            .field("first_doc", &self.first_doc)
            .field("num_docs", &self.num_docs)
            .field("filter", &self.filter)
            .field("has_post_filter", &self.post_filter.is_some())
            .finish()
    }
}

/// Searcher over one [`IndexReader`].
#[derive(Debug, Clone)]
pub struct IndexSearcher {
    reader: Arc<dyn IndexReader>,
    similarity: Arc<dyn Similarity>,
}

impl IndexSearcher {
    /// Create a searcher scoring with [`DefaultSimilarity`].
    pub fn new(reader: Arc<dyn IndexReader>) -> Self {
        Self::with_similarity(reader, Arc::new(DefaultSimilarity::new()))
    }

    /// Create a searcher with an explicit similarity.
    pub fn with_similarity(reader: Arc<dyn IndexReader>, similarity: Arc<dyn Similarity>) -> Self {
        IndexSearcher { reader, similarity }
    }

    /// The searched reader.
    pub fn reader(&self) -> &Arc<dyn IndexReader> {
        &self.reader
    }

    /// The similarity used for scoring.
    pub fn similarity(&self) -> &Arc<dyn Similarity> {
        &self.similarity
    }

    /// Number of documents containing `term` in `field`.
    pub fn doc_freq(&self, field: &str, term: &str) -> u32 {
        self.reader.doc_freq(field, term)
    }

    /// One greater than the largest document number.
    pub fn max_doc(&self) -> u32 {
        self.reader.max_doc()
    }

    /// Rewrite `query` until it no longer changes.
    pub fn rewrite(&self, query: &Query) -> Result<Query> {
        let mut current = query.rewrite(self.reader.as_ref())?;
        loop {
            let next = current.rewrite(self.reader.as_ref())?;
            if next == current {
                return Ok(current);
            }
            current = next;
        }
    }

    /// Rewrite `query` and build its normalised weight.
    pub fn create_weight(&self, query: &Query) -> Result<Box<dyn Weight>> {
        let rewritten = self.rewrite(query)?;
        let mut weight = rewritten.create_weight(self)?;
        let sum = weight.sum_of_squared_weights();
        let norm = self.similarity.query_norm(sum);
        weight.normalize(norm);
        Ok(weight)
    }

    /// Collect the top hits of `query`.
    pub fn search(&self, query: &Query, options: &SearchOptions) -> Result<TopDocs> {
        check_num_docs(options.num_docs)?;
        let weight = self.create_weight(query)?;
        self.search_weight(weight.as_ref(), options)
    }

    /// Collect the top hits of an already built weight.
    pub fn search_weight(&self, weight: &dyn Weight, options: &SearchOptions) -> Result<TopDocs> {
        check_num_docs(options.num_docs)?;
        let Some(scorer) = weight.scorer(&self.reader)? else {
            return Ok(TopDocs::default());
        };
        if self.reader.num_docs() == 0 {
            return Ok(TopDocs::default());
        }

        let max_size = options.num_docs.saturating_add(options.first_doc);
        let mut queue = PriorityQueue::new(max_size, hit_lt);
        let mut total_hits = 0;
        let mut max_score = 0.0f32;
        self.collect(
            scorer,
            options.filter.as_deref(),
            options.post_filter.as_ref(),
            |doc, score| {
                total_hits += 1;
                max_score = max_score.max(score);
                queue.insert(Hit::new(doc, score));
            },
        )?;

        let page_len = queue.size().saturating_sub(options.first_doc);
        let mut hits: Vec<Hit> = Vec::with_capacity(page_len);
        while hits.len() < page_len {
            match queue.pop() {
                Some(hit) => hits.push(hit),
                None => break,
            }
        }
        hits.reverse();
        debug!(
            "Search for {} matched {total_hits} documents, returning {}",
            weight.query(),
            hits.len()
        );
        Ok(TopDocs {
            total_hits,
            hits,
            max_score,
        })
    }

    /// Call `callback` with every matching document and its score, in
    /// document order. Returns the number of matches.
    pub fn search_each<F>(
        &self,
        query: &Query,
        filter: Option<&Filter>,
        post_filter: Option<&PostFilter>,
        mut callback: F,
    ) -> Result<usize>
    where
        F: FnMut(DocId, f32),
    {
        let weight = self.create_weight(query)?;
        let Some(scorer) = weight.scorer(&self.reader)? else {
            return Ok(0);
        };
        let mut count = 0;
        self.collect(scorer, filter, post_filter, |doc, score| {
            count += 1;
            callback(doc, score);
        })?;
        Ok(count)
    }

    /// Matching document numbers without scoring, starting at document
    /// number `offset` and stopping after `limit` documents.
    pub fn search_unscored(&self, query: &Query, offset: DocId, limit: usize) -> Result<Vec<DocId>> {
        let mut docs = Vec::new();
        if limit == 0 {
            return Ok(docs);
        }
        let weight = self.create_weight(query)?;
        let Some(mut scorer) = weight.scorer(&self.reader)? else {
            return Ok(docs);
        };
        if scorer.skip_to(offset) {
            loop {
                let doc = scorer.doc();
                if !self.reader.is_deleted(doc) {
                    docs.push(doc);
                }
                if docs.len() >= limit || !scorer.next() {
                    break;
                }
            }
        }
        Ok(docs)
    }

    /// Explain the score `query` gives `doc`.
    pub fn explain(&self, query: &Query, doc: DocId) -> Result<Explanation> {
        let weight = self.create_weight(query)?;
        weight.explain(&self.reader, doc)
    }

    /// Walk `scorer`, skipping documents rejected by `filter` or
    /// `post_filter`, and pass the adjusted score of the rest to `hit`.
    fn collect<F>(
        &self,
        mut scorer: Box<dyn Scorer>,
        filter: Option<&Filter>,
        post_filter: Option<&PostFilter>,
        mut hit: F,
    ) -> Result<()>
    where
        F: FnMut(DocId, f32),
    {
        let bits: Option<Arc<BitVector>> = match filter {
            Some(filter) => Some(filter.get_bv(&self.reader)?),
            None => None,
        };
        while scorer.next() {
            let doc = scorer.doc();
            if self.reader.is_deleted(doc) {
                continue;
            }
            if bits.as_ref().is_some_and(|bits| !bits.get(doc as usize)) {
                continue;
            }
            let mut score = scorer.score();
            if let Some(post_filter) = post_filter {
                let factor = post_filter(doc, score);
                if factor == 0.0 {
                    continue;
                }
                if factor < 1.0 {
                    score *= factor;
                }
            }
            hit(doc, score);
        }
        Ok(())
    }
}

fn check_num_docs(num_docs: usize) -> Result<()> {
    if num_docs == 0 {
        return Err(XiphosError::argument(format!(
            ":num_docs was set to {num_docs} but should be greater than 0 : {num_docs} <= 0"
        )));
    }
    Ok(())
}
