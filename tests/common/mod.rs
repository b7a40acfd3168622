//! Helpers shared by the integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use xiphos::index::{DocId, Document, MemoryIndexReader, MemoryIndexWriter};
use xiphos::query::Query;
use xiphos::search::{IndexSearcher, SearchOptions};

/// Build a searcher over `docs`.
pub fn searcher_for(docs: Vec<Document>) -> IndexSearcher {
    IndexSearcher::new(reader_for(docs))
}

/// Build a shared reader over `docs`.
pub fn reader_for(docs: Vec<Document>) -> Arc<MemoryIndexReader> {
    let mut writer = MemoryIndexWriter::new();
    for doc in docs {
        writer.add_document(doc);
    }
    Arc::new(writer.into_reader())
}

/// Assert that `query` matches exactly `expected`.
///
/// Scores are checked against the max score and against the query's
/// explanation, and the unscored walk must return the same documents in
/// order, also when started from the fourth match.
pub fn check_hits(searcher: &IndexSearcher, query: &Query, expected: &[DocId]) {
    let top_docs = searcher
        .search(query, &SearchOptions::new(expected.len() + 1))
        .unwrap();
    assert_eq!(
        top_docs.total_hits,
        expected.len(),
        "{}: expected {:?}, saw {:?}",
        query.to_s(None),
        expected,
        top_docs.docs()
    );
    assert_eq!(top_docs.hits.len(), expected.len());

    for hit in &top_docs.hits {
        let normalized = hit.score / top_docs.max_score;
        assert!(
            normalized > 0.0 && normalized <= 1.0,
            "score {} of doc {} out of range",
            normalized,
            hit.doc
        );
        assert!(expected.contains(&hit.doc), "doc {} found unexpectedly", hit.doc);
        let explanation = searcher.explain(query, hit.doc).unwrap();
        assert!(
            (explanation.value - hit.score).abs() <= 1e-5 * hit.score.abs().max(1.0),
            "doc {}: score {} but explained {}\n{}",
            hit.doc,
            hit.score,
            explanation.value,
            explanation
        );
    }

    let mut sorted = expected.to_vec();
    sorted.sort_unstable();
    let unscored = searcher.search_unscored(query, 0, 100).unwrap();
    assert_eq!(unscored, sorted);
    if sorted.len() > 3 {
        let tail = searcher.search_unscored(query, sorted[3], 100).unwrap();
        assert_eq!(tail, sorted[3..].to_vec());
    }
}
