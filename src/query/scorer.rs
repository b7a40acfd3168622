//! Scorers: document iterators that also compute scores.

use std::fmt::Debug;

use crate::index::DocId;
use crate::search::explanation::Explanation;

/// Number of precomputed `tf` scores kept by term scorers.
pub const SCORE_CACHE_SIZE: usize = 32;

/// Trait for document scorers.
///
/// A scorer starts unpositioned. `next` and `skip_to` move it to a matching
/// document, after which `doc` and `score` describe that document. Once
/// either returns false the scorer is exhausted.
pub trait Scorer: Send + Debug {
    /// Advance to the next matching document.
    fn next(&mut self) -> bool;

    /// Advance to the first matching document `>= target`.
    fn skip_to(&mut self, target: DocId) -> bool;

    /// Score of the current document.
    fn score(&mut self) -> f32;

    /// The current document.
    fn doc(&self) -> DocId;

    /// Explain the score `doc` would get. May move the scorer.
    fn explain(&mut self, doc: DocId) -> Explanation;
}
