//! Read-only view of an inverted index.
//!
//! Searching only needs a handful of operations from an index: the term
//! dictionary of a field in sorted order, the postings of a single term, the
//! per-document length norms and the set of deleted documents. These are
//! captured by [`IndexReader`], [`TermEnum`] and [`TermDocs`]. The
//! [`memory`] module provides an in-memory implementation.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::util::str_hash;

pub mod document;
pub mod memory;

pub use document::{DocField, Document};
pub use memory::{MemoryIndexReader, MemoryIndexWriter};

/// Document number inside a single reader.
pub type DocId = u32;

/// A term: a piece of text in a named field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Term {
    /// Field the term belongs to.
    pub field: String,
    /// Term text.
    pub text: String,
}

impl Term {
    /// Create a new term.
    pub fn new<F, T>(field: F, text: T) -> Self
    where
        F: Into<String>,
        T: Into<String>,
    {
        Term {
            field: field.into(),
            text: text.into(),
        }
    }

    /// Hash compatible with the query hashes.
    pub fn hash_code(&self) -> u64 {
        str_hash(&self.text).wrapping_mul(str_hash(&self.field))
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.field, self.text)
    }
}

/// Cursor over the sorted term dictionary of one field.
///
/// A fresh enum is already positioned on its first term, or exhausted when
/// `term()` returns `None`.
pub trait TermEnum {
    /// The current term, `None` once exhausted.
    fn term(&self) -> Option<&str>;

    /// Number of documents containing the current term.
    fn doc_freq(&self) -> u32;

    /// Advance to the next term. Returns false when exhausted.
    fn next(&mut self) -> bool;
}

/// Postings of a single term: document numbers in increasing order together
/// with the within-document frequency. Deleted documents are skipped.
pub trait TermDocs: Send + fmt::Debug {
    /// Advance to the next document. Returns false when exhausted.
    fn next(&mut self) -> bool;

    /// Current document.
    fn doc(&self) -> DocId;

    /// Frequency of the term in the current document.
    fn freq(&self) -> u32;

    /// Advance to the first document `>= target`.
    fn skip_to(&mut self, target: DocId) -> bool {
        while self.next() {
            if self.doc() >= target {
                return true;
            }
        }
        false
    }

    /// Fill `docs` and `freqs` with the following documents, returning how
    /// many were read. Zero means the postings are exhausted.
    fn read(&mut self, docs: &mut [DocId], freqs: &mut [u32]) -> usize {
        let len = docs.len().min(freqs.len());
        let mut i = 0;
        while i < len && self.next() {
            docs[i] = self.doc();
            freqs[i] = self.freq();
            i += 1;
        }
        i
    }
}

/// A point-in-time view of an index.
///
/// Readers are shared between threads behind an `Arc`. The `reader_id`
/// identifies the reader for cache keys; `generation` changes whenever the
/// visible document set changes (deletes).
pub trait IndexReader: Send + Sync + fmt::Debug {
    /// Identity of this reader.
    fn reader_id(&self) -> Uuid;

    /// Counter bumped on every change to the deleted documents.
    fn generation(&self) -> u64;

    /// One greater than the largest document number.
    fn max_doc(&self) -> u32;

    /// Number of live documents.
    fn num_docs(&self) -> u32;

    /// Whether `doc` has been deleted.
    fn is_deleted(&self, doc: DocId) -> bool;

    /// Whether any document has been deleted.
    fn has_deletions(&self) -> bool {
        self.num_docs() < self.max_doc()
    }

    /// Whether any document has indexed `field`.
    fn has_field(&self, field: &str) -> bool;

    /// Number of documents containing `term` in `field`, deleted ones included.
    fn doc_freq(&self, field: &str, term: &str) -> u32;

    /// Term dictionary of `field` positioned on the first term `>= from`.
    fn terms_from(&self, field: &str, from: &str) -> Box<dyn TermEnum + '_>;

    /// Term dictionary of `field` positioned on its first term.
    fn terms(&self, field: &str) -> Box<dyn TermEnum + '_> {
        self.terms_from(field, "")
    }

    /// Postings of `term` in `field`. Empty when the term does not exist.
    fn term_docs(&self, field: &str, term: &str) -> Box<dyn TermDocs>;

    /// Encoded length norms of `field`, one byte per document.
    fn norms(&self, field: &str) -> Option<Arc<[u8]>>;

    /// Stored value of `field` for `doc`.
    fn stored_field(&self, doc: DocId, field: &str) -> Option<String>;
}

/// Postings that never match.
#[derive(Debug, Default)]
pub struct EmptyTermDocs;

impl TermDocs for EmptyTermDocs {
    fn next(&mut self) -> bool {
        false
    }

    fn doc(&self) -> DocId {
        DocId::MAX
    }

    fn freq(&self) -> u32 {
        0
    }

    fn skip_to(&mut self, _target: DocId) -> bool {
        false
    }
}
