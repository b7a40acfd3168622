mod common;

use std::sync::Arc;

use common::reader_for;
use xiphos::index::{DocId, Document, IndexReader, MemoryIndexReader};
use xiphos::query::{ConstantScoreQuery, FilteredQuery, MatchAllQuery, Query, TermQuery};
use xiphos::search::{Filter, IndexSearcher, SearchOptions};

/// num, date, flipflop
const FILTER_DOCS: &[(&str, &str, &str)] = &[
    ("0", "20040601", "on"),
    ("1", "20041001", "off"),
    ("2", "20051101", "on"),
    ("3", "20041201", "off"),
    ("4", "20051101", "on"),
    ("5", "20041201", "off"),
    ("6", "20050101", "on"),
    ("7", "20040701", "off"),
    ("8", "20050301", "on"),
    ("9", "20050401", "off"),
];

fn filter_reader() -> Arc<MemoryIndexReader> {
    reader_for(
        FILTER_DOCS
            .iter()
            .enumerate()
            .map(|(i, (num, date, flipflop))| {
                Document::builder()
                    .add_keyword("num", *num)
                    .add_keyword("date", *date)
                    .add_keyword("flipflop", *flipflop)
                    .boost((i + 1) as f32)
                    .build()
            })
            .collect(),
    )
}

fn check_filtered_hits(
    searcher: &IndexSearcher,
    query: &Query,
    options: SearchOptions,
    expected: &[DocId],
    top: Option<DocId>,
) {
    let post_filter = options.post_filter.clone();
    let options = SearchOptions {
        num_docs: expected.len() + 1,
        ..options
    };
    let top_docs = searcher.search(query, &options).unwrap();
    assert_eq!(
        top_docs.total_hits,
        expected.len(),
        "expected {:?}, saw {:?}",
        expected,
        top_docs.docs()
    );
    assert_eq!(top_docs.hits.len(), expected.len());
    if let (Some(top), Some(first)) = (top, top_docs.hits.first()) {
        assert_eq!(first.doc, top);
    }
    for hit in &top_docs.hits {
        assert!(expected.contains(&hit.doc), "doc {} found unexpectedly", hit.doc);
        let mut score = searcher.explain(query, hit.doc).unwrap().value;
        if let Some(post_filter) = &post_filter {
            score *= post_filter(hit.doc, score);
        }
        assert!((hit.score - score).abs() < 1e-5, "doc {}", hit.doc);
    }
}

fn range(lower: Option<&str>, upper: Option<&str>, include_lower: bool, include_upper: bool) -> Arc<Filter> {
    Arc::new(Filter::range("num", lower, upper, include_lower, include_upper).unwrap())
}

fn num_of(reader: &Arc<MemoryIndexReader>, doc: DocId) -> i32 {
    reader
        .stored_field(doc, "num")
        .and_then(|num| num.parse().ok())
        .unwrap_or_default()
}

#[test]
fn test_range_filter() {
    let searcher = IndexSearcher::new(filter_reader());
    let query: Query = MatchAllQuery::new().into();

    let cases: &[(Option<&str>, Option<&str>, bool, bool, &[DocId], &str)] = &[
        (Some("2"), Some("6"), true, true, &[2, 3, 4, 5, 6], "RangeFilter< num:[2 6] >"),
        (Some("2"), Some("6"), true, false, &[2, 3, 4, 5], "RangeFilter< num:[2 6} >"),
        (Some("2"), Some("6"), false, true, &[3, 4, 5, 6], "RangeFilter< num:{2 6] >"),
        (Some("2"), Some("6"), false, false, &[3, 4, 5], "RangeFilter< num:{2 6} >"),
        (Some("6"), None, true, false, &[6, 7, 8, 9], "RangeFilter< num:[6> >"),
        (Some("6"), None, false, false, &[7, 8, 9], "RangeFilter< num:{6> >"),
        (None, Some("2"), false, true, &[0, 1, 2], "RangeFilter< num:<2] >"),
        (None, Some("2"), false, false, &[0, 1], "RangeFilter< num:<2} >"),
    ];
    for (lower, upper, include_lower, include_upper, expected, to_s) in cases {
        let filter = range(*lower, *upper, *include_lower, *include_upper);
        assert_eq!(filter.to_s(), *to_s);
        check_filtered_hits(
            &searcher,
            &query,
            SearchOptions::default().filter(filter),
            expected,
            None,
        );
    }
}

#[test]
fn test_range_filter_errors() {
    let err = Filter::range("num", None, None, false, false).unwrap_err();
    assert!(err.to_string().starts_with("Argument error: Nil bounds for range"));
    assert!(Filter::range("num", None, Some("2"), true, false).is_err());
    assert!(Filter::range("num", Some("2"), None, false, true).is_err());
    let err = Filter::range("num", Some("6"), Some("2"), true, true).unwrap_err();
    assert!(err.to_string().contains("\"2\" < \"6\""));
}

#[test]
fn test_range_filter_hash() {
    let f1 = Filter::range("date", Some("20051006"), Some("20051010"), true, true).unwrap();
    let f2 = Filter::range("date", Some("20051006"), Some("20051010"), true, true).unwrap();
    assert!(f1 == f1);
    assert_eq!(f1.hash_code(), f2.hash_code());
    assert!(f1 == f2);

    let differing = [
        Filter::range("date", Some("20051006"), Some("20051010"), true, false),
        Filter::range("date", Some("20051006"), Some("20051010"), false, true),
        Filter::range("date", Some("20051006"), Some("20051011"), true, true),
        Filter::range("date", Some("20051005"), Some("20051010"), true, true),
        Filter::range("date", Some("20051006"), None, true, false),
        Filter::range("date", None, Some("20051010"), false, true),
        Filter::range("flipflop", Some("20051006"), Some("20051010"), true, true),
    ];
    for other in differing {
        let other = other.unwrap();
        assert_ne!(f1.hash_code(), other.hash_code(), "{}", other.to_s());
        assert!(f1 != other, "{}", other.to_s());
    }

    let f1 = Filter::range("date", None, Some("20051010"), false, true).unwrap();
    let f2 = Filter::range("date", None, Some("20051010"), false, true).unwrap();
    assert_eq!(f1.hash_code(), f2.hash_code());
    assert!(f1 == f2);
}

#[test]
fn test_query_filter() {
    let searcher = IndexSearcher::new(filter_reader());
    let query: Query = MatchAllQuery::new().into();

    let filter = Arc::new(Filter::query(TermQuery::new("flipflop", "on").into()));
    assert_eq!(filter.to_s(), "QueryFilter< flipflop:on >");
    check_filtered_hits(
        &searcher,
        &query,
        SearchOptions::default().filter(filter),
        &[0, 2, 4, 6, 8],
        None,
    );
}

#[test]
fn test_query_filter_hash() {
    let f1 = Filter::query(TermQuery::new("A", "a").into());
    let f2 = Filter::query(TermQuery::new("A", "a").into());
    assert_eq!(f1.hash_code(), f2.hash_code());
    assert!(f1 == f2);
    assert!(f1 == f1);

    let f2 = Filter::query(TermQuery::new("A", "b").into());
    assert_ne!(f1.hash_code(), f2.hash_code());
    assert!(f1 != f2);

    let f2 = Filter::query(TermQuery::new("B", "a").into());
    assert_ne!(f1.hash_code(), f2.hash_code());
    assert!(f1 != f2);
}

#[test]
fn test_filter_func() {
    let reader = filter_reader();
    let searcher = IndexSearcher::new(reader.clone());
    let query: Query = MatchAllQuery::new().into();

    let even = {
        let reader = reader.clone();
        move |doc: DocId, _score: f32| {
            if num_of(&reader, doc) % 2 == 0 { 1.0 } else { 0.0 }
        }
    };

    check_filtered_hits(
        &searcher,
        &query,
        SearchOptions::default().post_filter(even.clone()),
        &[0, 2, 4, 6, 8],
        None,
    );
    check_filtered_hits(
        &searcher,
        &query,
        SearchOptions::default()
            .filter(range(Some("2"), Some("6"), true, true))
            .post_filter(even),
        &[2, 4, 6],
        None,
    );
}

#[test]
fn test_score_altering_filter_func() {
    let reader = filter_reader();
    let searcher = IndexSearcher::new(reader.clone());
    let query: Query = MatchAllQuery::new().into();

    let start_point = 7;
    let distance = {
        let reader = reader.clone();
        move |doc: DocId, _score: f32| {
            let d = start_point - num_of(&reader, doc);
            1.0 / (1 + d * d) as f32
        }
    };

    let options = SearchOptions::default().post_filter(distance.clone());
    check_filtered_hits(&searcher, &query, options.clone(), &[7, 6, 8, 5, 9, 4, 3, 2, 1, 0], Some(7));
    let top_docs = searcher
        .search(&query, &SearchOptions { num_docs: 10, ..options })
        .unwrap();
    assert_eq!(top_docs.docs(), vec![7, 6, 8, 5, 9, 4, 3, 2, 1, 0]);

    check_filtered_hits(
        &searcher,
        &query,
        SearchOptions::default()
            .filter(range(Some("4"), Some("8"), true, true))
            .post_filter(distance),
        &[7, 6, 8, 5, 4],
        Some(7),
    );
}

#[test]
fn test_filter_cache_follows_deletes() {
    let reader = filter_reader();
    let dyn_reader: Arc<dyn IndexReader> = reader.clone();
    let filter = Filter::query(TermQuery::new("flipflop", "on").into());

    let bits = filter.get_bv(&dyn_reader).unwrap();
    assert_eq!(bits.iter_ones().collect::<Vec<_>>(), vec![0, 2, 4, 6, 8]);
    let again = filter.get_bv(&dyn_reader).unwrap();
    assert!(Arc::ptr_eq(&bits, &again));

    reader.delete_document(4).unwrap();
    let bits = filter.get_bv(&dyn_reader).unwrap();
    assert!(!Arc::ptr_eq(&bits, &again));
    assert_eq!(bits.iter_ones().collect::<Vec<_>>(), vec![0, 2, 6, 8]);

    filter.clear_cache();
    let cleared = filter.get_bv(&dyn_reader).unwrap();
    assert!(!Arc::ptr_eq(&bits, &cleared));
    assert_eq!(cleared.count(), 4);
}

#[test]
fn test_filter_shared_across_readers() {
    let filter = Filter::range("date", Some("20050101"), None, true, false).unwrap();
    let first: Arc<dyn IndexReader> = filter_reader();
    let second: Arc<dyn IndexReader> = reader_for(vec![
        Document::builder().add_keyword("date", "20060101").build(),
        Document::builder().add_keyword("date", "20000101").build(),
    ]);

    let bits = filter.get_bv(&first).unwrap();
    assert_eq!(bits.iter_ones().collect::<Vec<_>>(), vec![2, 4, 6, 8, 9]);
    let bits = filter.get_bv(&second).unwrap();
    assert_eq!(bits.iter_ones().collect::<Vec<_>>(), vec![0]);
}

#[test]
fn test_filter_queries_through_searcher() {
    let searcher = IndexSearcher::new(filter_reader());
    let on = Arc::new(Filter::query(TermQuery::new("flipflop", "on").into()));

    let constant: Query = ConstantScoreQuery::new(on.clone()).into();
    let top_docs = searcher.search(&constant, &SearchOptions::new(10)).unwrap();
    assert_eq!(top_docs.docs(), vec![0, 2, 4, 6, 8]);

    let filtered: Query = FilteredQuery::new(
        TermQuery::new("date", "20051101").into(),
        on,
    )
    .into();
    let top_docs = searcher.search(&filtered, &SearchOptions::new(10)).unwrap();
    assert_eq!(top_docs.total_hits, 2);
    assert!(top_docs.docs().contains(&2));
    assert!(top_docs.docs().contains(&4));

    let filtered: Query = FilteredQuery::new(
        TermQuery::new("date", "20041201").into(),
        Arc::new(Filter::query(TermQuery::new("flipflop", "on").into())),
    )
    .into();
    assert!(searcher.search(&filtered, &SearchOptions::new(10)).unwrap().is_empty());
}
