//! Insertion-ordered hash set over shared elements.
//!
//! Elements are held as `Arc<T>` so the set can tell apart "this exact
//! element is already here" from "an equal but distinct element is here".
//! Iteration follows insertion order through a doubly linked list threaded
//! through a slab of entries.

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use ahash::AHashMap;

/// Result of looking an element up against the set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashKeyStatus {
    /// No equal element is stored.
    DoesNotExist,
    /// The very same element (same allocation) is stored.
    Same,
    /// An equal element from a different allocation is stored.
    Equal,
}

#[derive(Debug)]
struct Entry<T> {
    elem: Arc<T>,
    prev: Option<usize>,
    next: Option<usize>,
}

/// Insertion-ordered set.
pub struct HashSet<T> {
    slots: Vec<Option<Entry<T>>>,
    free: Vec<usize>,
    index: AHashMap<Arc<T>, usize>,
    first: Option<usize>,
    last: Option<usize>,
}

impl<T: Hash + Eq> HashSet<T> {
    /// Create an empty set.
    pub fn new() -> Self {
        HashSet {
            slots: Vec::new(),
            free: Vec::new(),
            index: AHashMap::new(),
            first: None,
            last: None,
        }
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    fn append(&mut self, elem: Arc<T>) {
        let entry = Entry {
            elem: Arc::clone(&elem),
            prev: self.last,
            next: None,
        };
        let slot = match self.free.pop() {
            Some(slot) => {
                self.slots[slot] = Some(entry);
                slot
            }
            None => {
                self.slots.push(Some(entry));
                self.slots.len() - 1
            }
        };
        match self.last {
            Some(last) => {
                if let Some(e) = self.slots[last].as_mut() {
                    e.next = Some(slot);
                }
            }
            None => self.first = Some(slot),
        }
        self.last = Some(slot);
        self.index.insert(elem, slot);
    }

    fn unlink(&mut self, slot: usize) -> Option<Arc<T>> {
        let entry = self.slots[slot].take()?;
        match entry.prev {
            Some(prev) => {
                if let Some(e) = self.slots[prev].as_mut() {
                    e.next = entry.next;
                }
            }
            None => self.first = entry.next,
        }
        match entry.next {
            Some(next) => {
                if let Some(e) = self.slots[next].as_mut() {
                    e.prev = entry.prev;
                }
            }
            None => self.last = entry.prev,
        }
        self.free.push(slot);
        Some(entry.elem)
    }

    /// Check how `elem` relates to the stored elements.
    pub fn exists(&self, elem: &Arc<T>) -> HashKeyStatus {
        match self.index.get_key_value(&**elem) {
            None => HashKeyStatus::DoesNotExist,
            Some((stored, _)) if Arc::ptr_eq(stored, elem) => HashKeyStatus::Same,
            Some(_) => HashKeyStatus::Equal,
        }
    }

    /// Whether an element equal to `elem` is stored.
    pub fn contains(&self, elem: &T) -> bool {
        self.index.contains_key(elem)
    }

    /// Add `elem`. When an equal but distinct element is already stored the
    /// set is left unchanged and `elem` is dropped.
    pub fn add(&mut self, elem: Arc<T>) -> HashKeyStatus {
        let status = self.exists(&elem);
        if status == HashKeyStatus::DoesNotExist {
            self.append(elem);
        }
        status
    }

    /// Add `elem` unless an equal but distinct element is stored. Returns
    /// false in that case; the caller keeps its handle either way.
    pub fn add_safe(&mut self, elem: &Arc<T>) -> bool {
        match self.exists(elem) {
            HashKeyStatus::DoesNotExist => {
                self.append(Arc::clone(elem));
                true
            }
            HashKeyStatus::Same => true,
            HashKeyStatus::Equal => false,
        }
    }

    /// The stored element equal to `elem`.
    pub fn orig(&self, elem: &T) -> Option<&Arc<T>> {
        self.index.get_key_value(elem).map(|(stored, _)| stored)
    }

    /// Remove the element equal to `elem` and hand it back.
    pub fn remove(&mut self, elem: &T) -> Option<Arc<T>> {
        let slot = self.index.remove(elem)?;
        self.unlink(slot)
    }

    /// Remove and drop the element equal to `elem`.
    pub fn delete(&mut self, elem: &T) -> bool {
        self.remove(elem).is_some()
    }

    /// Move every element of `other` not already present into this set,
    /// keeping `other`'s order after this set's. Duplicates are dropped.
    pub fn merge(mut self, other: HashSet<T>) -> Self {
        for elem in other.into_iter() {
            if !self.index.contains_key(&*elem) {
                self.append(elem);
            }
        }
        self
    }

    /// Drop every element.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
        self.index.clear();
        self.first = None;
        self.last = None;
    }

    /// Iterate the elements in insertion order.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            set: self,
            next: self.first,
        }
    }
}

impl<T: Hash + Eq> Default for HashSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Hash + Eq + fmt::Debug> fmt::Debug for HashSet<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

/// Borrowing iterator in insertion order.
pub struct Iter<'a, T> {
    set: &'a HashSet<T>,
    next: Option<usize>,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a Arc<T>;

    fn next(&mut self) -> Option<Self::Item> {
        let entry = self.set.slots[self.next?].as_ref()?;
        self.next = entry.next;
        Some(&entry.elem)
    }
}

impl<'a, T: Hash + Eq> IntoIterator for &'a HashSet<T> {
    type Item = &'a Arc<T>;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<T: Hash + Eq> IntoIterator for HashSet<T> {
    type Item = Arc<T>;
    type IntoIter = std::vec::IntoIter<Arc<T>>;

    fn into_iter(mut self) -> Self::IntoIter {
        let mut out = Vec::with_capacity(self.len());
        let mut next = self.first;
        while let Some(slot) = next {
            next = self.slots[slot].as_ref().and_then(|e| e.next);
            if let Some(elem) = self.unlink(slot) {
                out.push(elem);
            }
        }
        self.index.clear();
        out.into_iter()
    }
}

impl<T: Hash + Eq> FromIterator<Arc<T>> for HashSet<T> {
    fn from_iter<I: IntoIterator<Item = Arc<T>>>(iter: I) -> Self {
        let mut set = HashSet::new();
        for elem in iter {
            set.add(elem);
        }
        set
    }
}
