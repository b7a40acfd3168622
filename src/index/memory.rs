//! In-memory inverted index.
//!
//! [`MemoryIndexWriter`] analyses documents into sorted term dictionaries,
//! postings and one norm byte per field and document, then freezes them into
//! a [`MemoryIndexReader`]. The reader supports deletes: the deleted set is
//! replaced copy-on-write so open [`TermDocs`] keep the snapshot they started
//! with, and every delete bumps the reader generation.

use std::collections::btree_map;
use std::collections::BTreeMap;
use std::fmt;
use std::ops::Bound;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use ahash::AHashMap;
use log::debug;
use parking_lot::RwLock;
use unicode_segmentation::UnicodeSegmentation;
use uuid::Uuid;

use crate::analysis::CharFilter;
use crate::error::{Result, XiphosError};
use crate::index::{DocId, Document, EmptyTermDocs, IndexReader, TermDocs, TermEnum};
use crate::search::similarity::{DefaultSimilarity, Similarity};
use crate::util::BitVector;

#[derive(Debug, Default)]
struct Postings {
    docs: Vec<DocId>,
    freqs: Vec<u32>,
}

#[derive(Debug, Default)]
struct FieldBuilder {
    terms: BTreeMap<String, Postings>,
    norms: Vec<u8>,
}

#[derive(Debug)]
struct FieldIndex {
    terms: BTreeMap<String, Arc<Postings>>,
    norms: Arc<[u8]>,
}

/// Builds a [`MemoryIndexReader`] from documents.
///
/// Tokenized fields are passed through the optional character filter,
/// lowercased and split on Unicode word boundaries. Untokenized fields are
/// indexed as one term per value.
pub struct MemoryIndexWriter {
    similarity: Arc<dyn Similarity>,
    char_filter: Option<Arc<dyn CharFilter>>,
    fields: BTreeMap<String, FieldBuilder>,
    stored: Vec<AHashMap<String, String>>,
}

impl MemoryIndexWriter {
    /// Create a writer using the default similarity for norms.
    pub fn new() -> Self {
        MemoryIndexWriter {
            similarity: Arc::new(DefaultSimilarity::new()),
            char_filter: None,
            fields: BTreeMap::new(),
            stored: Vec::new(),
        }
    }

    /// Use `similarity` to compute field norms.
    pub fn with_similarity(mut self, similarity: Arc<dyn Similarity>) -> Self {
        self.similarity = similarity;
        self
    }

    /// Run tokenized text through `char_filter` before splitting it.
    pub fn with_char_filter(mut self, char_filter: Arc<dyn CharFilter>) -> Self {
        self.char_filter = Some(char_filter);
        self
    }

    /// Number of documents added so far.
    pub fn doc_count(&self) -> u32 {
        self.stored.len() as u32
    }

    fn analyze(&self, text: &str) -> Vec<String> {
        let filtered = match &self.char_filter {
            Some(filter) => filter.filter(text).0,
            None => text.to_string(),
        };
        filtered
            .unicode_words()
            .map(|word| word.to_lowercase())
            .collect()
    }

    /// Add a document, returning its number.
    pub fn add_document(&mut self, doc: Document) -> DocId {
        let doc_id = self.stored.len() as DocId;
        let mut stored = AHashMap::new();

        let mut analyzed: BTreeMap<&str, (BTreeMap<String, u32>, u32)> = BTreeMap::new();
        for field in &doc.fields {
            let (counts, num_terms) = analyzed.entry(field.name.as_str()).or_default();
            for value in &field.data {
                let terms = if field.tokenize {
                    self.analyze(value)
                } else {
                    vec![value.clone()]
                };
                for term in terms {
                    *counts.entry(term).or_insert(0) += 1;
                    *num_terms += 1;
                }
            }
            stored
                .entry(field.name.clone())
                .and_modify(|s: &mut String| {
                    s.push(' ');
                    s.push_str(&field.data.join(" "));
                })
                .or_insert_with(|| field.data.join(" "));
        }

        for (name, (counts, num_terms)) in analyzed {
            if num_terms == 0 {
                continue;
            }
            let norm = self
                .similarity
                .encode_norm(doc.boost * self.similarity.length_norm(name, num_terms));
            let builder = self.fields.entry(name.to_string()).or_default();
            for (term, freq) in counts {
                let postings = builder.terms.entry(term).or_default();
                postings.docs.push(doc_id);
                postings.freqs.push(freq);
            }
            builder.norms.resize(doc_id as usize, 0);
            builder.norms.push(norm);
        }

        self.stored.push(stored);
        doc_id
    }

    /// Freeze the added documents into a reader.
    pub fn into_reader(self) -> MemoryIndexReader {
        let max_doc = self.stored.len();
        let fields = self
            .fields
            .into_iter()
            .map(|(name, builder)| {
                let mut norms = builder.norms;
                norms.resize(max_doc, 0);
                let terms = builder
                    .terms
                    .into_iter()
                    .map(|(term, postings)| (term, Arc::new(postings)))
                    .collect();
                (
                    name,
                    FieldIndex {
                        terms,
                        norms: norms.into(),
                    },
                )
            })
            .collect();

        let reader = MemoryIndexReader {
            id: Uuid::new_v4(),
            fields,
            stored: self.stored,
            deleted: RwLock::new(Arc::new(BitVector::with_capacity(max_doc))),
            generation: AtomicU64::new(0),
        };
        debug!(
            "Built memory index {} with {} documents and {} fields",
            reader.id,
            max_doc,
            reader.fields.len()
        );
        reader
    }
}

impl Default for MemoryIndexWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MemoryIndexWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryIndexWriter")
            .field("similarity", &self.similarity)
            .field("has_char_filter", &self.char_filter.is_some())
            .field("doc_count", &self.stored.len())
            .finish()
    }
}

/// Reader over an index held entirely in memory.
#[derive(Debug)]
pub struct MemoryIndexReader {
    id: Uuid,
    fields: BTreeMap<String, FieldIndex>,
    stored: Vec<AHashMap<String, String>>,
    deleted: RwLock<Arc<BitVector>>,
    generation: AtomicU64,
}

impl MemoryIndexReader {
    /// Mark `doc` as deleted. Returns false when it already was.
    pub fn delete_document(&self, doc: DocId) -> Result<bool> {
        if doc as usize >= self.stored.len() {
            return Err(XiphosError::argument(format!(
                "Document {doc} is out of range. The index holds {} documents",
                self.stored.len()
            )));
        }

        let mut deleted = self.deleted.write();
        if deleted.get(doc as usize) {
            return Ok(false);
        }
        let mut bits = BitVector::clone(&deleted);
        bits.set(doc as usize);
        *deleted = Arc::new(bits);
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        debug!("Deleted document {doc} from {} (generation {generation})", self.id);
        Ok(true)
    }

    /// Names of every indexed field.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    fn deleted_snapshot(&self) -> Arc<BitVector> {
        self.deleted.read().clone()
    }
}

impl IndexReader for MemoryIndexReader {
    fn reader_id(&self) -> Uuid {
        self.id
    }

    fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    fn max_doc(&self) -> u32 {
        self.stored.len() as u32
    }

    fn num_docs(&self) -> u32 {
        (self.stored.len() - self.deleted.read().count()) as u32
    }

    fn is_deleted(&self, doc: DocId) -> bool {
        self.deleted.read().get(doc as usize)
    }

    fn has_field(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    fn doc_freq(&self, field: &str, term: &str) -> u32 {
        self.fields
            .get(field)
            .and_then(|f| f.terms.get(term))
            .map_or(0, |postings| postings.docs.len() as u32)
    }

    fn terms_from(&self, field: &str, from: &str) -> Box<dyn TermEnum + '_> {
        match self.fields.get(field) {
            Some(index) => {
                let mut range = index
                    .terms
                    .range::<str, _>((Bound::Included(from), Bound::Unbounded));
                let current = range.next();
                Box::new(MemoryTermEnum { range, current })
            }
            None => Box::new(MemoryTermEnum {
                range: btree_map::Range::default(),
                current: None,
            }),
        }
    }

    fn term_docs(&self, field: &str, term: &str) -> Box<dyn TermDocs> {
        match self.fields.get(field).and_then(|f| f.terms.get(term)) {
            Some(postings) => Box::new(MemoryTermDocs::new(
                Arc::clone(postings),
                self.deleted_snapshot(),
            )),
            None => Box::new(EmptyTermDocs),
        }
    }

    fn norms(&self, field: &str) -> Option<Arc<[u8]>> {
        self.fields.get(field).map(|f| Arc::clone(&f.norms))
    }

    fn stored_field(&self, doc: DocId, field: &str) -> Option<String> {
        self.stored.get(doc as usize)?.get(field).cloned()
    }
}

struct MemoryTermEnum<'a> {
    range: btree_map::Range<'a, String, Arc<Postings>>,
    current: Option<(&'a String, &'a Arc<Postings>)>,
}

impl TermEnum for MemoryTermEnum<'_> {
    fn term(&self) -> Option<&str> {
        self.current.map(|(term, _)| term.as_str())
    }

    fn doc_freq(&self) -> u32 {
        self.current
            .map_or(0, |(_, postings)| postings.docs.len() as u32)
    }

    fn next(&mut self) -> bool {
        self.current = self.range.next();
        self.current.is_some()
    }
}

/// Postings cursor over a shared posting list, skipping deleted documents.
#[derive(Debug)]
struct MemoryTermDocs {
    postings: Arc<Postings>,
    deleted: Arc<BitVector>,
    /// Index of the current entry, `None` before the first call to `next`.
    position: Option<usize>,
}

impl MemoryTermDocs {
    fn new(postings: Arc<Postings>, deleted: Arc<BitVector>) -> Self {
        MemoryTermDocs {
            postings,
            deleted,
            position: None,
        }
    }

    /// Move to the first live entry at or after `start`.
    fn seek_live(&mut self, start: usize) -> bool {
        let docs = &self.postings.docs;
        let mut i = start;
        while i < docs.len() && self.deleted.get(docs[i] as usize) {
            i += 1;
        }
        self.position = Some(i);
        i < docs.len()
    }
}

impl TermDocs for MemoryTermDocs {
    fn next(&mut self) -> bool {
        let start = self.position.map_or(0, |p| p + 1);
        self.seek_live(start)
    }

    fn doc(&self) -> DocId {
        self.position
            .and_then(|p| self.postings.docs.get(p).copied())
            .unwrap_or(DocId::MAX)
    }

    fn freq(&self) -> u32 {
        self.position
            .and_then(|p| self.postings.freqs.get(p).copied())
            .unwrap_or(0)
    }

    fn skip_to(&mut self, target: DocId) -> bool {
        let start = self.position.map_or(0, |p| p + 1);
        if start >= self.postings.docs.len() {
            self.position = Some(self.postings.docs.len());
            return false;
        }
        let offset = self.postings.docs[start..].partition_point(|&doc| doc < target);
        self.seek_live(start + offset)
    }
}
