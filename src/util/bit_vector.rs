//! Growable bitset with an implicit extension value.
//!
//! A [`BitVector`] tracks the highest bit ever touched (`size`) and a flag
//! saying whether every bit beyond `size` reads as one. This lets a logical
//! NOT be represented without materializing an infinite tail, which is how
//! filters express "everything except these documents".
//!
//! Every materialized word keeps the bits at or above `size` equal to the
//! extension value, so word-wise operations never need to special-case the
//! tail.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::{BitAnd, BitOr, BitXor, Not};

const WORD_BITS: usize = 32;
const MIN_WORDS: usize = 4;

/// Default number of bits a new vector can hold before it has to grow.
pub const BV_INIT_CAPA: usize = 256;

#[inline]
fn words_for(bits: usize) -> usize {
    bits.div_ceil(WORD_BITS)
}

#[inline]
fn fill_word(extends_as_ones: bool) -> u32 {
    if extends_as_ones { u32::MAX } else { 0 }
}

/// A mutable bitset over document numbers.
#[derive(Clone)]
pub struct BitVector {
    bits: Vec<u32>,
    size: usize,
    count: usize,
    curr_bit: Option<usize>,
    extends_as_ones: bool,
}

impl BitVector {
    /// Create an empty bit vector.
    pub fn new() -> Self {
        Self::with_capacity(BV_INIT_CAPA)
    }

    /// Create an empty bit vector with room for `capa` bits.
    pub fn with_capacity(capa: usize) -> Self {
        BitVector {
            bits: vec![0; words_for(capa).max(MIN_WORDS)],
            size: 0,
            count: 0,
            curr_bit: None,
            extends_as_ones: false,
        }
    }

    /// Highest bit index set or unset so far, plus one.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of bits below `size` that differ from the extension value.
    ///
    /// For an ordinary vector this is the number of set bits. For a vector
    /// that extends as ones it is the number of unset bits.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Whether every bit beyond `size` reads as one.
    pub fn extends_as_ones(&self) -> bool {
        self.extends_as_ones
    }

    fn ensure_bit(&mut self, bit: usize) {
        if bit < self.size {
            return;
        }
        let word = bit / WORD_BITS;
        if word >= self.bits.len() {
            let mut capa = self.bits.len().max(MIN_WORDS) << 1;
            while capa <= word {
                capa <<= 1;
            }
            let fill = fill_word(self.extends_as_ones);
            self.bits.resize(capa, fill);
        }
        self.size = bit + 1;
    }

    fn set_value(&mut self, bit: usize, value: bool) {
        self.ensure_bit(bit);
        let word = &mut self.bits[bit / WORD_BITS];
        let mask = 1u32 << (bit % WORD_BITS);
        if (*word & mask != 0) != value {
            if value {
                *word |= mask;
            } else {
                *word &= !mask;
            }
            if value != self.extends_as_ones {
                self.count += 1;
            } else {
                self.count -= 1;
            }
        }
    }

    /// Set `bit` to one.
    pub fn set(&mut self, bit: usize) {
        self.set_value(bit, true);
    }

    /// Set `bit` to one when bits are set in strictly ascending order.
    pub fn set_fast(&mut self, bit: usize) {
        debug_assert!(
            bit >= self.size,
            "set_fast requires ascending bits: {bit} < {}",
            self.size
        );
        self.set_value(bit, true);
    }

    /// Set `bit` to zero. This still extends `size` to cover `bit`.
    pub fn unset(&mut self, bit: usize) {
        self.set_value(bit, false);
    }

    /// Read `bit`. Bits beyond `size` read as the extension value.
    pub fn get(&self, bit: usize) -> bool {
        if bit >= self.size {
            return self.extends_as_ones;
        }
        self.bits[bit / WORD_BITS] & (1u32 << (bit % WORD_BITS)) != 0
    }

    /// Reset to an empty vector, dropping the extension flag.
    pub fn clear(&mut self) {
        self.bits.iter_mut().for_each(|w| *w = 0);
        self.extends_as_ones = false;
        self.count = 0;
        self.size = 0;
        self.curr_bit = None;
    }

    /// Recompute `count` from the materialized words.
    pub fn recount(&mut self) -> usize {
        let full = self.size / WORD_BITS;
        let rem = self.size % WORD_BITS;
        let ext = fill_word(self.extends_as_ones);
        let mut count: usize = self.bits[..full]
            .iter()
            .map(|w| (w ^ ext).count_ones() as usize)
            .sum();
        if rem > 0 {
            let mask = (1u32 << rem) - 1;
            count += ((self.bits[full] ^ ext) & mask).count_ones() as usize;
        }
        self.count = count;
        count
    }

    #[inline]
    fn word_or_ext(&self, i: usize) -> u32 {
        match self.bits.get(i) {
            Some(w) => *w,
            None => fill_word(self.extends_as_ones),
        }
    }

    fn combine<F>(&self, other: &BitVector, op: F) -> BitVector
    where
        F: Fn(u32, u32) -> u32,
    {
        let size = self.size.max(other.size);
        let words = words_for(size)
            .max(MIN_WORDS)
            .max(self.bits.len())
            .max(other.bits.len());
        let ext = op(
            fill_word(self.extends_as_ones),
            fill_word(other.extends_as_ones),
        ) != 0;
        let bits = (0..words)
            .map(|i| op(self.word_or_ext(i), other.word_or_ext(i)))
            .collect();
        let mut bv = BitVector {
            bits,
            size,
            count: 0,
            curr_bit: None,
            extends_as_ones: ext,
        };
        bv.recount();
        bv
    }

    /// Intersection of two vectors.
    pub fn and(&self, other: &BitVector) -> BitVector {
        self.combine(other, |a, b| a & b)
    }

    /// In-place intersection.
    pub fn and_x(&mut self, other: &BitVector) -> &mut Self {
        *self = self.and(other);
        self
    }

    /// Union of two vectors.
    pub fn or(&self, other: &BitVector) -> BitVector {
        self.combine(other, |a, b| a | b)
    }

    /// In-place union.
    pub fn or_x(&mut self, other: &BitVector) -> &mut Self {
        *self = self.or(other);
        self
    }

    /// Symmetric difference of two vectors.
    pub fn xor(&self, other: &BitVector) -> BitVector {
        self.combine(other, |a, b| a ^ b)
    }

    /// In-place symmetric difference.
    pub fn xor_x(&mut self, other: &BitVector) -> &mut Self {
        *self = self.xor(other);
        self
    }

    /// Complement, flipping the extension flag as well.
    pub fn not(&self) -> BitVector {
        let mut bv = self.clone();
        bv.not_x();
        bv.curr_bit = None;
        bv
    }

    /// In-place complement. `count` is unchanged since it counts the bits
    /// that differ from the extension value.
    pub fn not_x(&mut self) -> &mut Self {
        self.bits.iter_mut().for_each(|w| *w = !*w);
        self.extends_as_ones = !self.extends_as_ones;
        self
    }

    /// Structural equality over the union of both defined ranges.
    pub fn equals(&self, other: &BitVector) -> bool {
        if std::ptr::eq(self, other) {
            return true;
        }
        if self.extends_as_ones != other.extends_as_ones {
            return false;
        }
        let min_size = self.size.min(other.size);
        let word_size = words_for(min_size);
        if (0..word_size).any(|i| self.word_or_ext(i) != other.word_or_ext(i)) {
            return false;
        }
        let longer = if self.size > other.size { self } else { other };
        let expected = fill_word(self.extends_as_ones);
        (word_size..words_for(longer.size)).all(|i| longer.word_or_ext(i) == expected)
    }

    /// Order-sensitive hash that ignores words equal to the extension value.
    pub fn hash_code(&self) -> u64 {
        let empty = fill_word(self.extends_as_ones);
        let mut hash: u64 = 0;
        for &word in self.bits[..words_for(self.size)].iter().rev() {
            if word != empty {
                hash = (hash << 1) ^ u64::from(word);
            }
        }
        (hash << 1) | u64::from(self.extends_as_ones)
    }

    /// Reset the scan cursor to before the first bit.
    pub fn scan_reset(&mut self) {
        self.curr_bit = None;
    }

    fn find_from(&self, from: usize, want_set: bool) -> Option<usize> {
        if from >= self.size {
            return None;
        }
        let flip = if want_set { 0 } else { u32::MAX };
        let word_size = words_for(self.size);
        let mut word_pos = from / WORD_BITS;
        let mut word = (self.bits[word_pos] ^ flip) >> (from % WORD_BITS);
        let mut bit_pos = from % WORD_BITS;
        if word == 0 {
            bit_pos = 0;
            loop {
                word_pos += 1;
                if word_pos >= word_size {
                    return None;
                }
                word = self.bits[word_pos] ^ flip;
                if word != 0 {
                    break;
                }
            }
        }
        let bit = word_pos * WORD_BITS + bit_pos + word.trailing_zeros() as usize;
        (bit < self.size).then_some(bit)
    }

    /// Next set bit at or after `from`, leaving the scan cursor alone.
    pub fn next_set_bit(&self, from: usize) -> Option<usize> {
        self.find_from(from, true)
    }

    /// Next set bit at or after `from`, moving the scan cursor.
    pub fn scan_next_from(&mut self, from: usize) -> Option<usize> {
        let found = self.find_from(from, true);
        if let Some(bit) = found {
            self.curr_bit = Some(bit);
        }
        found
    }

    /// Next set bit after the last one returned.
    pub fn scan_next(&mut self) -> Option<usize> {
        let from = self.curr_bit.map_or(0, |b| b + 1);
        self.scan_next_from(from)
    }

    /// Next unset bit at or after `from`, moving the scan cursor.
    pub fn scan_next_unset_from(&mut self, from: usize) -> Option<usize> {
        let found = self.find_from(from, false);
        if let Some(bit) = found {
            self.curr_bit = Some(bit);
        }
        found
    }

    /// Next unset bit after the last one returned.
    pub fn scan_next_unset(&mut self) -> Option<usize> {
        let from = self.curr_bit.map_or(0, |b| b + 1);
        self.scan_next_unset_from(from)
    }

    /// Iterate the set bits below `size` without touching the scan cursor.
    pub fn iter_ones(&self) -> impl Iterator<Item = usize> + '_ {
        let mut next = self.find_from(0, true);
        std::iter::from_fn(move || {
            let bit = next?;
            next = self.find_from(bit + 1, true);
            Some(bit)
        })
    }
}

impl Default for BitVector {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for BitVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BitVector")
            .field("size", &self.size)
            .field("count", &self.count)
            .field("extends_as_ones", &self.extends_as_ones)
            .field("ones", &self.iter_ones().collect::<Vec<_>>())
            .finish()
    }
}

impl PartialEq for BitVector {
    fn eq(&self, other: &Self) -> bool {
        self.equals(other)
    }
}

impl Eq for BitVector {}

impl Hash for BitVector {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash_code());
    }
}

impl BitAnd for &BitVector {
    type Output = BitVector;

    fn bitand(self, rhs: &BitVector) -> BitVector {
        self.and(rhs)
    }
}

impl BitOr for &BitVector {
    type Output = BitVector;

    fn bitor(self, rhs: &BitVector) -> BitVector {
        self.or(rhs)
    }
}

impl BitXor for &BitVector {
    type Output = BitVector;

    fn bitxor(self, rhs: &BitVector) -> BitVector {
        self.xor(rhs)
    }
}

impl Not for &BitVector {
    type Output = BitVector;

    fn not(self) -> BitVector {
        BitVector::not(self)
    }
}

impl FromIterator<usize> for BitVector {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        let mut bv = BitVector::new();
        for bit in iter {
            bv.set(bit);
        }
        bv
    }
}
