//! # xiphos
//!
//! The query execution, scoring and storage core of a full-text search
//! engine.
//!
//! ## Features
//!
//! - Bit vectors, bounded priority queues and insertion-ordered hash sets
//! - A multi-pattern string mapper compiled to a DFA
//! - Term, multi-term, prefix, wildcard, fuzzy, match-all, constant score
//!   and filtered queries with vector space scoring
//! - Cached document filters
//! - Compound files packing many logical files into one physical file

pub mod analysis;
pub mod cli;
pub mod error;
pub mod index;
pub mod query;
pub mod search;
pub mod storage;
pub mod util;

pub use error::{Result, XiphosError};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
