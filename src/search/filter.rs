//! Document filters.
//!
//! A filter computes a [`BitVector`] with one bit per document of a reader.
//! [`Filter`] wraps a [`FilterBits`] implementation and caches its bits per
//! reader; the cached bits are recomputed once the reader's generation moves
//! on, so deletes are picked up. Entries of dropped readers are pruned on the
//! next insert.

use std::any::Any;
use std::fmt;
use std::sync::{Arc, Weak};

use ahash::AHashMap;
use log::debug;
use parking_lot::Mutex;
use uuid::Uuid;

use crate::error::{Result, XiphosError};
use crate::index::IndexReader;
use crate::query::Query;
use crate::search::searcher::IndexSearcher;
use crate::util::{BitVector, str_hash};

/// Trait for filter algorithms.
pub trait FilterBits: Send + Sync + fmt::Debug {
    /// Name of the filter kind.
    fn name(&self) -> &str;

    /// Compute the bits of every document of `reader` that passes.
    fn bits(&self, reader: &Arc<dyn IndexReader>) -> Result<BitVector>;

    /// Human readable form.
    fn to_s(&self) -> String {
        self.name().to_string()
    }

    /// Hash of the filter parameters.
    fn hash_code(&self) -> u64 {
        0
    }

    /// Structural equality against a filter of the same name.
    fn eq_filter(&self, _other: &dyn FilterBits) -> bool {
        false
    }

    /// Downcasting support for `eq_filter`.
    fn as_any(&self) -> &dyn Any;
}

#[derive(Debug)]
struct CachedBits {
    reader: Weak<dyn IndexReader>,
    generation: u64,
    bits: Arc<BitVector>,
}

/// A filter with a per-reader bit cache.
pub struct Filter {
    inner: Box<dyn FilterBits>,
    cache: Mutex<AHashMap<Uuid, CachedBits>>,
}

impl Filter {
    /// Wrap a filter algorithm.
    pub fn new<F: FilterBits + 'static>(inner: F) -> Self {
        Filter {
            inner: Box::new(inner),
            cache: Mutex::new(AHashMap::new()),
        }
    }

    /// A filter passing every document matched by `query`.
    pub fn query(query: Query) -> Self {
        Self::new(QueryFilter::new(query))
    }

    /// A filter passing every document with a term of `field` inside the
    /// given bounds.
    pub fn range(
        field: &str,
        lower: Option<&str>,
        upper: Option<&str>,
        include_lower: bool,
        include_upper: bool,
    ) -> Result<Self> {
        Ok(Self::new(RangeFilter::new(
            field,
            lower,
            upper,
            include_lower,
            include_upper,
        )?))
    }

    /// Name of the filter kind.
    pub fn name(&self) -> &str {
        self.inner.name()
    }

    /// The wrapped algorithm.
    pub fn inner(&self) -> &dyn FilterBits {
        self.inner.as_ref()
    }

    /// The bits of `reader`, computed on first use and cached until the
    /// reader's generation changes.
    pub fn get_bv(&self, reader: &Arc<dyn IndexReader>) -> Result<Arc<BitVector>> {
        let reader_id = reader.reader_id();
        let generation = reader.generation();
        if let Some(cached) = self.cache.lock().get(&reader_id) {
            if cached.generation == generation {
                return Ok(Arc::clone(&cached.bits));
            }
        }

        debug!(
            "Computing {} bits for reader {} at generation {}",
            self.name(),
            reader_id,
            generation
        );
        let bits = Arc::new(self.inner.bits(reader)?);
        let mut cache = self.cache.lock();
        cache.retain(|_, cached| cached.reader.strong_count() > 0);
        cache.insert(
            reader_id,
            CachedBits {
                reader: Arc::downgrade(reader),
                generation,
                bits: Arc::clone(&bits),
            },
        );
        Ok(bits)
    }

    /// Drop every cached bit vector.
    pub fn clear_cache(&self) {
        self.cache.lock().clear();
    }

    /// Number of readers with cached bits, after pruning dropped readers.
    pub fn cached_readers(&self) -> usize {
        let mut cache = self.cache.lock();
        cache.retain(|_, cached| cached.reader.strong_count() > 0);
        cache.len()
    }

    /// Human readable form.
    pub fn to_s(&self) -> String {
        self.inner.to_s()
    }

    /// Hash combining the name with the filter parameters.
    pub fn hash_code(&self) -> u64 {
        str_hash(self.name()) ^ self.inner.hash_code()
    }
}

impl PartialEq for Filter {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self, other)
            || (self.name() == other.name() && self.inner.eq_filter(other.inner.as_ref()))
    }
}

impl fmt::Debug for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Filter")
            .field("inner", &self.inner)
            .field("cached_readers", &self.cache.lock().len())
            .finish()
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_s())
    }
}

/// Filter passing the documents a query matches.
#[derive(Debug, Clone)]
pub struct QueryFilter {
    query: Query,
}

impl QueryFilter {
    /// Create a filter from `query`.
    pub fn new(query: Query) -> Self {
        QueryFilter { query }
    }

    /// The filtering query.
    pub fn query(&self) -> &Query {
        &self.query
    }
}

impl FilterBits for QueryFilter {
    fn name(&self) -> &str {
        "QueryFilter"
    }

    fn bits(&self, reader: &Arc<dyn IndexReader>) -> Result<BitVector> {
        let mut bits = BitVector::with_capacity(reader.max_doc() as usize);
        let searcher = IndexSearcher::new(Arc::clone(reader));
        let weight = searcher.create_weight(&self.query)?;
        if let Some(mut scorer) = weight.scorer(reader)? {
            while scorer.next() {
                bits.set(scorer.doc() as usize);
            }
        }
        Ok(bits)
    }

    fn to_s(&self) -> String {
        format!("QueryFilter< {} >", self.query.to_s(None))
    }

    fn hash_code(&self) -> u64 {
        self.query.hash_code()
    }

    fn eq_filter(&self, other: &dyn FilterBits) -> bool {
        other
            .as_any()
            .downcast_ref::<QueryFilter>()
            .is_some_and(|o| self.query == o.query)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Filter passing documents with a term inside a lexicographic range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeFilter {
    field: String,
    lower: Option<String>,
    upper: Option<String>,
    include_lower: bool,
    include_upper: bool,
}

impl RangeFilter {
    /// Create a range filter. At least one bound is required, an inclusive
    /// bound must be present and the upper bound may not sort before the
    /// lower one.
    pub fn new(
        field: &str,
        lower: Option<&str>,
        upper: Option<&str>,
        include_lower: bool,
        include_upper: bool,
    ) -> Result<Self> {
        if lower.is_none() && upper.is_none() {
            return Err(XiphosError::argument(
                "Nil bounds for range. A range must include either lower bound or an upper bound",
            ));
        }
        if include_lower && lower.is_none() {
            return Err(XiphosError::argument(
                "Lower bound must be non-nil to be inclusive. That is, if you specify \
                 :include_lower => true when you create a range you must include a :lower_term",
            ));
        }
        if include_upper && upper.is_none() {
            return Err(XiphosError::argument(
                "Upper bound must be non-nil to be inclusive. That is, if you specify \
                 :include_upper => true when you create a range you must include a :upper_term",
            ));
        }
        if let (Some(lower), Some(upper)) = (lower, upper) {
            if upper < lower {
                return Err(XiphosError::argument(format!(
                    "Upper bound must be greater than lower bound. \"{upper}\" < \"{lower}\""
                )));
            }
        }
        Ok(RangeFilter {
            field: field.to_string(),
            lower: lower.map(str::to_string),
            upper: upper.map(str::to_string),
            include_lower,
            include_upper,
        })
    }

    /// The filtered field.
    pub fn field(&self) -> &str {
        &self.field
    }

    fn range_to_s(&self) -> String {
        let mut buf = format!("{}:", self.field);
        match &self.lower {
            Some(lower) => {
                buf.push(if self.include_lower { '[' } else { '{' });
                buf.push_str(lower);
            }
            None => buf.push('<'),
        }
        if self.lower.is_some() && self.upper.is_some() {
            buf.push(' ');
        }
        match &self.upper {
            Some(upper) => {
                buf.push_str(upper);
                buf.push(if self.include_upper { ']' } else { '}' });
            }
            None => buf.push('>'),
        }
        buf
    }
}

impl FilterBits for RangeFilter {
    fn name(&self) -> &str {
        "RangeFilter"
    }

    fn bits(&self, reader: &Arc<dyn IndexReader>) -> Result<BitVector> {
        let mut bits = BitVector::with_capacity(reader.max_doc() as usize);
        if !reader.has_field(&self.field) {
            return Ok(bits);
        }

        let lower = self.lower.as_deref().unwrap_or("");
        let mut check_lower = !(self.include_lower || self.lower.is_none());
        let mut terms = reader.terms_from(&self.field, lower);
        while let Some(term) = terms.term() {
            if !check_lower || term > lower {
                check_lower = false;
                if let Some(upper) = &self.upper {
                    let compare = upper.as_str().cmp(term);
                    if compare.is_le() && (!self.include_upper || compare.is_lt()) {
                        break;
                    }
                }
                let mut postings = reader.term_docs(&self.field, term);
                while postings.next() {
                    bits.set(postings.doc() as usize);
                }
            }
            if !terms.next() {
                break;
            }
        }
        Ok(bits)
    }

    fn to_s(&self) -> String {
        format!("RangeFilter< {} >", self.range_to_s())
    }

    fn hash_code(&self) -> u64 {
        let bounds = str_hash(&self.field)
            ^ self.lower.as_deref().map_or(0, str_hash)
            ^ self.upper.as_deref().map_or(0, str_hash);
        u64::from(self.include_lower) | (u64::from(self.include_upper) << 1) | (bounds << 2)
    }

    fn eq_filter(&self, other: &dyn FilterBits) -> bool {
        other
            .as_any()
            .downcast_ref::<RangeFilter>()
            .is_some_and(|o| self == o)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{Document, MemoryIndexReader, MemoryIndexWriter};
    use crate::query::TermQuery;

    fn reader() -> Arc<MemoryIndexReader> {
        let mut writer = MemoryIndexWriter::new();
        let dates = [
            "20051101", "20051102", "20051103", "20051104", "20051105", "20051106",
            "20051107", "20051108", "20051109", "20051110",
        ];
        for (i, date) in dates.iter().enumerate() {
            let parity = if i % 2 == 0 { "even" } else { "odd" };
            writer.add_document(
                Document::builder()
                    .add_keyword("date", *date)
                    .add_text("parity", parity)
                    .build(),
            );
        }
        Arc::new(writer.into_reader())
    }

    fn set_bits(filter: &Filter, reader: &Arc<dyn IndexReader>) -> Vec<usize> {
        filter.get_bv(reader).unwrap().iter_ones().collect()
    }

    #[test]
    fn test_range_filter_bounds() {
        let reader: Arc<dyn IndexReader> = reader();
        let filter = Filter::range("date", Some("20051103"), Some("20051106"), true, true).unwrap();
        assert_eq!(set_bits(&filter, &reader), vec![2, 3, 4, 5]);

        let filter =
            Filter::range("date", Some("20051103"), Some("20051106"), false, false).unwrap();
        assert_eq!(set_bits(&filter, &reader), vec![3, 4]);

        let filter = Filter::range("date", None, Some("20051103"), false, true).unwrap();
        assert_eq!(set_bits(&filter, &reader), vec![0, 1, 2]);

        let filter = Filter::range("date", Some("20051108"), None, false, false).unwrap();
        assert_eq!(set_bits(&filter, &reader), vec![8, 9]);

        let filter = Filter::range("missing", Some("a"), None, true, false).unwrap();
        assert!(set_bits(&filter, &reader).is_empty());
    }

    #[test]
    fn test_range_filter_validation() {
        let err = RangeFilter::new("date", None, None, false, false).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Argument error: Nil bounds for range. A range must include either lower bound or an upper bound"
        );
        let err = RangeFilter::new("date", None, Some("b"), true, false).unwrap_err();
        assert!(err.to_string().contains("Lower bound must be non-nil to be inclusive"));
        let err = RangeFilter::new("date", Some("a"), None, false, true).unwrap_err();
        assert!(err.to_string().contains("Upper bound must be non-nil to be inclusive"));
        let err = RangeFilter::new("date", Some("b"), Some("a"), false, false).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Argument error: Upper bound must be greater than lower bound. \"a\" < \"b\""
        );
    }

    #[test]
    fn test_range_filter_to_s() {
        let to_s = |lower, upper, il, iu| {
            Filter::range("date", lower, upper, il, iu)
                .unwrap()
                .to_s()
        };
        assert_eq!(
            to_s(Some("20051101"), Some("20051130"), true, true),
            "RangeFilter< date:[20051101 20051130] >"
        );
        assert_eq!(
            to_s(Some("20051101"), Some("20051130"), false, false),
            "RangeFilter< date:{20051101 20051130} >"
        );
        assert_eq!(to_s(None, Some("20051130"), false, true), "RangeFilter< date:<20051130] >");
        assert_eq!(to_s(Some("20051101"), None, true, false), "RangeFilter< date:[20051101> >");
    }

    #[test]
    fn test_range_filter_hash_and_eq() {
        let f1 = Filter::range("date", Some("a"), Some("c"), true, false).unwrap();
        let f2 = Filter::range("date", Some("a"), Some("c"), true, false).unwrap();
        let f3 = Filter::range("date", Some("a"), Some("c"), true, true).unwrap();
        let f4 = Filter::range("date", Some("a"), None, true, false).unwrap();
        assert_eq!(f1, f2);
        assert_eq!(f1.hash_code(), f2.hash_code());
        assert_ne!(f1, f3);
        assert_ne!(f1.hash_code(), f3.hash_code());
        assert_ne!(f1, f4);
    }

    #[test]
    fn test_query_filter() {
        let reader: Arc<dyn IndexReader> = reader();
        let filter = Filter::query(TermQuery::new("parity", "even").into());
        assert_eq!(set_bits(&filter, &reader), vec![0, 2, 4, 6, 8]);
        assert_eq!(filter.to_s(), "QueryFilter< parity:even >");

        let same = Filter::query(TermQuery::new("parity", "even").into());
        let other = Filter::query(TermQuery::new("parity", "odd").into());
        assert_eq!(filter, same);
        assert_eq!(filter.hash_code(), same.hash_code());
        assert_ne!(filter, other);

        let range = Filter::range("parity", Some("even"), None, true, false).unwrap();
        assert_ne!(filter, range);
    }

    #[test]
    fn test_cache_follows_generation() {
        let memory = reader();
        let reader: Arc<dyn IndexReader> = memory.clone();
        let filter = Filter::query(TermQuery::new("parity", "even").into());

        let first = filter.get_bv(&reader).unwrap();
        let second = filter.get_bv(&reader).unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        memory.delete_document(4).unwrap();
        let third = filter.get_bv(&reader).unwrap();
        assert!(!Arc::ptr_eq(&first, &third));
        assert_eq!(third.iter_ones().collect::<Vec<_>>(), vec![0, 2, 6, 8]);

        filter.clear_cache();
        let fourth = filter.get_bv(&reader).unwrap();
        assert!(!Arc::ptr_eq(&third, &fourth));
    }

    #[test]
    fn test_cache_forgets_dropped_readers() {
        let filter = Filter::query(TermQuery::new("parity", "even").into());
        let kept: Arc<dyn IndexReader> = reader();
        filter.get_bv(&kept).unwrap();

        for _ in 0..100 {
            let reader: Arc<dyn IndexReader> = reader();
            assert_eq!(filter.get_bv(&reader).unwrap().count(), 5);
        }
        assert_eq!(filter.cached_readers(), 1);

        drop(kept);
        assert_eq!(filter.cached_readers(), 0);
    }

    #[derive(Debug)]
    struct EvenDocs;

    impl FilterBits for EvenDocs {
        fn name(&self) -> &str {
            "EvenDocs"
        }

        fn bits(&self, reader: &Arc<dyn IndexReader>) -> Result<BitVector> {
            let mut bits = BitVector::new();
            for doc in (0..reader.max_doc() as usize).step_by(2) {
                bits.set(doc);
            }
            Ok(bits)
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[test]
    fn test_custom_filter() {
        let reader: Arc<dyn IndexReader> = reader();
        let filter = Filter::new(EvenDocs);
        assert_eq!(set_bits(&filter, &reader), vec![0, 2, 4, 6, 8]);
        assert_eq!(filter.to_s(), "EvenDocs");
        assert_ne!(filter, Filter::new(EvenDocs));
        assert_eq!(filter, filter);
    }
}
