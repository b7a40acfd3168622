mod common;

use std::sync::Arc;

use common::{check_hits, reader_for};
use xiphos::index::{Document, IndexReader, MemoryIndexReader};
use xiphos::query::{
    ConstantScoreQuery, FilteredQuery, MatchAllQuery, MultiTermQuery, PrefixQuery, Query,
    TermQuery, WildcardQuery,
};
use xiphos::search::{Filter, IndexSearcher, SearchOptions};

/// date, field, cat
const SEARCH_DOCS: &[(&str, &str, &str)] = &[
    ("20050930", "word1", "cat1/"),
    (
        "20051001",
        "word1 word2 the quick brown fox the quick brown fox",
        "cat1/sub1",
    ),
    ("20051002", "word1 word3 one two one", "cat1/sub1/subsub1"),
    ("20051003", "word1 word3 one two", "cat1/sub2"),
    (
        "20051004",
        "word1 word2 word2 word2 word2 word2 word2 word2 word2 word2 word2 word2 word2 \
         word2 word2 word2 word2 word2 word2 word2 word2 word2 word2 word2 word2 word2 \
         word2 word2 word2 word2 word2 word2 word2 word2",
        "cat1/sub2/subsub2",
    ),
    ("20051005", "word1 one two x x x x x one two", "cat2/sub1"),
    ("20051006", "word1 word3", "cat2/sub1"),
    ("20051007", "word1", "cat2/sub1"),
    ("20051008", "word1 word2 word3 the fast brown fox", "cat2/sub1"),
    ("20051009", "word1", "cat3/sub1"),
    ("20051010", "word1", "cat3/sub1"),
    ("20051011", "word1 word3 the quick red fox", "cat3/sub1"),
    ("20051012", "word1", "cat3/sub1"),
    ("20051013", "word1", "cat1/sub2"),
    ("20051014", "word1 word3 the quick hairy fox", "cat1/sub1"),
    ("20051015", "word1", "cat1/sub2/subsub1"),
    (
        "20051016",
        "word1 the quick fox is brown and hairy and a little red",
        "cat1/sub1/subsub2",
    ),
    ("20051017", "word1 the brown fox is quick and red", "cat1/"),
];

fn search_reader() -> Arc<MemoryIndexReader> {
    reader_for(
        SEARCH_DOCS
            .iter()
            .enumerate()
            .map(|(i, (date, field, cat))| {
                Document::builder()
                    .add_keyword("date", *date)
                    .add_text("field", *field)
                    .add_keyword("cat", *cat)
                    .boost((i + 1) as f32)
                    .build()
            })
            .collect(),
    )
}

fn search_searcher() -> IndexSearcher {
    IndexSearcher::new(search_reader())
}

#[test]
fn test_term_query() {
    let searcher = search_searcher();

    let mut query: Query = TermQuery::new("field", "word2").into();
    assert_eq!(query.to_s(Some("field")), "word2");
    assert_eq!(query.to_s(None), "field:word2");
    query.set_boost(100.0);
    check_hits(&searcher, &query, &[4, 8, 1]);
    assert_eq!(query.to_s(Some("field")), "word2^100.0");

    let weight = searcher.create_weight(&query).unwrap();
    assert!(weight.to_string().starts_with("TermWeight("));

    check_hits(&searcher, &TermQuery::new("field", "2342").into(), &[]);
    check_hits(&searcher, &TermQuery::new("field", "").into(), &[]);
    check_hits(&searcher, &TermQuery::new("not_a_field", "word2").into(), &[]);
    check_hits(
        &searcher,
        &TermQuery::new("field", "quick").into(),
        &[1, 11, 14, 16, 17],
    );
}

#[test]
fn test_term_query_paging() {
    let searcher = search_searcher();
    let query: Query = TermQuery::new("field", "word1").into();

    let top_docs = searcher.search(&query, &SearchOptions::new(10)).unwrap();
    assert_eq!(top_docs.total_hits, SEARCH_DOCS.len());
    assert_eq!(top_docs.hits.len(), 10);

    let all = searcher.search(&query, &SearchOptions::new(20)).unwrap();
    assert_eq!(all.total_hits, SEARCH_DOCS.len());
    assert_eq!(all.hits.len(), SEARCH_DOCS.len());
    assert_eq!(&all.hits[..10], &top_docs.hits[..]);

    let tail = searcher
        .search(&query, &SearchOptions::new(20).first_doc(10))
        .unwrap();
    assert_eq!(tail.total_hits, SEARCH_DOCS.len());
    assert_eq!(tail.hits.len(), SEARCH_DOCS.len() - 10);
    assert_eq!(&tail.hits[..], &all.hits[10..]);
    assert_eq!(tail.max_score, all.max_score);

    for pair in all.hits.windows(2) {
        assert!(pair[0].score >= pair[1].score);
    }
}

#[test]
fn test_multi_term_query() {
    let searcher = search_searcher();

    assert!(MultiTermQuery::new("field", 0, 0.5).is_err());

    let mut mtq = MultiTermQuery::new("field", 4, 0.5).unwrap();
    check_hits(&searcher, &mtq.clone().into(), &[]);
    assert_eq!(Query::from(mtq.clone()).to_s(Some("field")), "\"\"");
    assert_eq!(Query::from(mtq.clone()).to_s(None), "field:\"\"");

    mtq.add_term("brown");
    check_hits(&searcher, &mtq.clone().into(), &[1, 8, 16, 17]);
    assert_eq!(Query::from(mtq.clone()).to_s(Some("field")), "\"brown\"");

    // at or below the minimum boost the term is ignored
    mtq.add_term_boost("fox", 0.4);
    check_hits(&searcher, &mtq.clone().into(), &[1, 8, 16, 17]);
    assert_eq!(Query::from(mtq.clone()).to_s(Some("field")), "\"brown\"");

    mtq.add_term_boost("fox", 0.6);
    check_hits(&searcher, &mtq.clone().into(), &[1, 8, 11, 14, 16, 17]);
    assert_eq!(
        Query::from(mtq.clone()).to_s(Some("field")),
        "\"fox^0.6|brown\""
    );

    mtq.add_term_boost("fast", 50.0);
    let query: Query = mtq.clone().into();
    check_hits(&searcher, &query, &[1, 8, 11, 14, 16, 17]);
    let top_docs = searcher.search(&query, &SearchOptions::new(10)).unwrap();
    assert_eq!(top_docs.hits[0].doc, 8);
    assert_eq!(query.to_s(None), "field:\"fox^0.6|brown|fast^50.0\"");

    let query = query.with_boost(80.1);
    assert_eq!(
        query.to_s(Some("field")),
        "\"fox^0.6|brown|fast^50.0\"^80.1"
    );
    check_hits(&searcher, &query, &[1, 8, 11, 14, 16, 17]);
}

#[test]
fn test_prefix_query() {
    let searcher = search_searcher();

    let query: Query = PrefixQuery::new("cat", "cat1").into();
    assert_eq!(query.to_s(Some("cat")), "cat1*");
    check_hits(&searcher, &query, &[0, 1, 2, 3, 4, 13, 14, 15, 16, 17]);

    let query = Query::from(PrefixQuery::new("cat", "cat1/sub2")).with_boost(20.0);
    assert_eq!(query.to_s(Some("cat")), "cat1/sub2*^20.0");
    check_hits(&searcher, &query, &[3, 4, 13, 15]);

    check_hits(
        &searcher,
        &PrefixQuery::new("cat", "cat1/sub").into(),
        &[1, 2, 3, 4, 13, 14, 15, 16],
    );

    let query: Query = PrefixQuery::new("unknown field", "cat1/sub").into();
    assert_eq!(query.to_s(Some("cat")), "unknown field:cat1/sub*");
    check_hits(&searcher, &query, &[]);
    check_hits(&searcher, &PrefixQuery::new("cat", "unknown_term").into(), &[]);
}

#[test]
fn test_wildcard_query() {
    let searcher = search_searcher();

    check_hits(
        &searcher,
        &WildcardQuery::new("cat", "cat1*").into(),
        &[0, 1, 2, 3, 4, 13, 14, 15, 16, 17],
    );
    check_hits(&searcher, &WildcardQuery::new("cat", "cat1*/s*sub2").into(), &[4, 16]);
    check_hits(
        &searcher,
        &WildcardQuery::new("cat", "cat1/sub?/su??ub2").into(),
        &[4, 16],
    );
    check_hits(&searcher, &WildcardQuery::new("cat", "cat1/").into(), &[0, 17]);
    check_hits(&searcher, &WildcardQuery::new("unknown_field", "cat1/").into(), &[]);
    check_hits(&searcher, &WildcardQuery::new("cat", "unknown_term").into(), &[]);
}

#[test]
fn test_match_all_query() {
    let searcher = search_searcher();
    let all: Vec<u32> = (0..SEARCH_DOCS.len() as u32).collect();
    let query: Query = MatchAllQuery::new().into();
    assert_eq!(query.to_s(None), "*");
    check_hits(&searcher, &query, &all);

    let top_docs = searcher.search(&query, &SearchOptions::new(5)).unwrap();
    assert_eq!(top_docs.docs(), vec![0, 1, 2, 3, 4]);
    assert!(top_docs.hits.iter().all(|hit| hit.score == top_docs.max_score));
}

#[test]
fn test_constant_score_query() {
    let searcher = search_searcher();
    let filter = Arc::new(Filter::query(TermQuery::new("field", "fox").into()));
    let query: Query = ConstantScoreQuery::new(filter).into();
    check_hits(&searcher, &query, &[1, 8, 11, 14, 16, 17]);

    let top_docs = searcher.search(&query, &SearchOptions::new(10)).unwrap();
    assert_eq!(top_docs.docs(), vec![1, 8, 11, 14, 16, 17]);
}

#[test]
fn test_filtered_query() {
    let searcher = search_searcher();
    let filter = Arc::new(
        Filter::range("date", Some("20051006"), Some("20051010"), true, true).unwrap(),
    );

    let query: Query = FilteredQuery::new(TermQuery::new("field", "word1").into(), filter.clone()).into();
    check_hits(&searcher, &query, &[6, 7, 8, 9, 10]);

    let query: Query = FilteredQuery::new(PrefixQuery::new("cat", "cat2").into(), filter).into();
    check_hits(&searcher, &query, &[6, 7, 8]);
}

#[test]
fn test_search_skips_deleted_documents() {
    let reader = search_reader();
    let searcher = IndexSearcher::new(reader.clone());
    let query: Query = TermQuery::new("field", "word2").into();
    check_hits(&searcher, &query, &[4, 8, 1]);

    assert!(reader.delete_document(8).unwrap());
    assert!(!reader.delete_document(8).unwrap());
    assert_eq!(reader.num_docs(), SEARCH_DOCS.len() as u32 - 1);
    check_hits(&searcher, &query, &[4, 1]);

    let all = searcher
        .search(&MatchAllQuery::new().into(), &SearchOptions::new(20))
        .unwrap();
    assert_eq!(all.total_hits, SEARCH_DOCS.len() - 1);
    assert!(!all.docs().contains(&8));
}

#[test]
fn test_explain_term_query() {
    let searcher = search_searcher();
    let query: Query = TermQuery::new("field", "word3").into();
    let explanation = searcher.explain(&query, 2).unwrap();
    let top_docs = searcher.search(&query, &SearchOptions::new(10)).unwrap();
    let hit = top_docs.hits.iter().find(|hit| hit.doc == 2).unwrap();
    assert!((explanation.value - hit.score).abs() < 1e-5);
    assert!(!explanation.details.is_empty());

    let explanation = searcher.explain(&query, 0).unwrap();
    assert_eq!(explanation.value, 0.0);
}
