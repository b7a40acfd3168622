//! Bounded binary min-heap with an injected ordering.
//!
//! The queue keeps at most `capacity` elements. Once full, [`PriorityQueue::insert`]
//! only admits an element that is strictly greater than the current minimum,
//! replacing it. Top-k collectors use this to retain the k best hits.

use std::fmt;
use std::sync::Arc;

/// Initial number of slots allocated for a new queue.
pub const PQ_START_CAPA: usize = 127;

/// Outcome of [`PriorityQueue::insert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PqInsert {
    /// The queue had room and the element was added.
    Added,
    /// The queue was full and the element replaced the minimum.
    Inserted,
    /// The queue was full and the element was not greater than the minimum.
    Dropped,
}

/// Strict ordering used by the heap: returns true when `a` sorts before `b`.
pub type LessThan<T> = Arc<dyn Fn(&T, &T) -> bool + Send + Sync>;

/// A bounded priority queue whose top is always the minimum element.
///
/// Positions are computed 1-based (parent `i >> 1`, children `i << 1` and
/// `(i << 1) + 1`) and mapped onto a zero-based vector.
pub struct PriorityQueue<T> {
    heap: Vec<T>,
    capa: usize,
    less_than: LessThan<T>,
}

impl<T> PriorityQueue<T> {
    /// Create a queue holding at most `capa` elements ordered by `less_than`.
    pub fn new<F>(capa: usize, less_than: F) -> Self
    where
        F: Fn(&T, &T) -> bool + Send + Sync + 'static,
    {
        PriorityQueue {
            heap: Vec::with_capacity(capa.min(PQ_START_CAPA) + 1),
            capa,
            less_than: Arc::new(less_than),
        }
    }

    /// Number of elements currently held.
    pub fn size(&self) -> usize {
        self.heap.len()
    }

    /// Maximum number of elements retained by `insert`.
    pub fn capacity(&self) -> usize {
        self.capa
    }

    /// Whether the queue holds no elements.
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Whether the queue has reached its capacity.
    pub fn is_full(&self) -> bool {
        self.heap.len() >= self.capa
    }

    #[inline]
    fn lt(&self, a: usize, b: usize) -> bool {
        (self.less_than)(&self.heap[a - 1], &self.heap[b - 1])
    }

    fn up(&mut self) {
        let mut i = self.heap.len();
        let mut j = i >> 1;
        while j > 0 && self.lt(i, j) {
            self.heap.swap(i - 1, j - 1);
            i = j;
            j >>= 1;
        }
    }

    /// Restore heap order after the top element was changed in place.
    pub fn down(&mut self) {
        let size = self.heap.len();
        let mut i = 1;
        let mut j = 2;
        let mut k = 3;
        if k <= size && self.lt(k, j) {
            j = k;
        }
        while j <= size && self.lt(j, i) {
            self.heap.swap(i - 1, j - 1);
            i = j;
            j = i << 1;
            k = j + 1;
            if k <= size && self.lt(k, j) {
                j = k;
            }
        }
    }

    /// Add an element unconditionally, growing past the capacity if needed.
    pub fn push(&mut self, elem: T) {
        self.heap.push(elem);
        self.up();
    }

    /// Add an element while respecting the capacity.
    pub fn insert(&mut self, elem: T) -> PqInsert {
        if self.heap.len() < self.capa {
            self.push(elem);
            PqInsert::Added
        } else if !self.heap.is_empty() && (self.less_than)(&self.heap[0], &elem) {
            self.heap[0] = elem;
            self.down();
            PqInsert::Inserted
        } else {
            PqInsert::Dropped
        }
    }

    /// The minimum element.
    pub fn top(&self) -> Option<&T> {
        self.heap.first()
    }

    /// Mutable access to the minimum element. Call [`PriorityQueue::down`]
    /// afterwards if its ordering changed.
    pub fn top_mut(&mut self) -> Option<&mut T> {
        self.heap.first_mut()
    }

    /// Remove and return the minimum element.
    pub fn pop(&mut self) -> Option<T> {
        if self.heap.is_empty() {
            return None;
        }
        let top = self.heap.swap_remove(0);
        if !self.heap.is_empty() {
            self.down();
        }
        Some(top)
    }

    /// Drop every element.
    pub fn clear(&mut self) {
        self.heap.clear();
    }

    /// Iterate the elements in heap order (not sorted).
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.heap.iter()
    }

    /// Drain the queue in ascending order.
    pub fn into_sorted_vec(mut self) -> Vec<T> {
        let mut out = Vec::with_capacity(self.heap.len());
        while let Some(elem) = self.pop() {
            out.push(elem);
        }
        out
    }
}

impl<T: Clone> Clone for PriorityQueue<T> {
    fn clone(&self) -> Self {
        PriorityQueue {
            heap: self.heap.clone(),
            capa: self.capa,
            less_than: Arc::clone(&self.less_than),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for PriorityQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PriorityQueue")
            .field("size", &self.heap.len())
            .field("capa", &self.capa)
            .field("heap", &self.heap)
            .finish()
    }
}
