//! Searching: filters, similarity, explanations and the index searcher.

pub mod explanation;
pub mod filter;
pub mod searcher;
pub mod similarity;
pub mod top_docs;

pub use self::explanation::Explanation;
pub use self::filter::{Filter, FilterBits, QueryFilter, RangeFilter};
pub use self::searcher::{IndexSearcher, PostFilter, SearchOptions};
pub use self::similarity::{DefaultSimilarity, Similarity};
pub use self::top_docs::{Hit, TopDocs};
