//! Scoring formulas.
//!
//! A [`Similarity`] supplies every factor of the vector space scoring model:
//! term frequency, inverse document frequency, length normalisation and the
//! query normalisation that makes scores of different queries comparable.
//! Field norms are stored as a single byte each, using an 8-bit float with a
//! 3-bit mantissa and a 5-bit exponent.

use std::fmt::Debug;

use crate::index::IndexReader;

/// Trait for scoring models.
pub trait Similarity: Send + Sync + Debug {
    /// Normalisation factor for a field with `num_terms` terms.
    fn length_norm(&self, field: &str, num_terms: u32) -> f32;

    /// Normalisation factor applied to every query weight.
    fn query_norm(&self, sum_of_squared_weights: f32) -> f32;

    /// Score factor for a term occurring `freq` times in a document.
    fn tf(&self, freq: f32) -> f32;

    /// Score factor for a sloppy phrase match `distance` positions apart.
    fn sloppy_freq(&self, distance: u32) -> f32;

    /// Inverse document frequency.
    fn idf(&self, doc_freq: u32, num_docs: u32) -> f32;

    /// Score factor for matching `overlap` out of `max_overlap` clauses.
    fn coord(&self, overlap: u32, max_overlap: u32) -> f32;

    /// Decode a stored norm byte.
    fn decode_norm(&self, b: u8) -> f32;

    /// Encode a norm into a single byte.
    fn encode_norm(&self, f: f32) -> u8;

    /// Inverse document frequency of a single term in `reader`.
    fn idf_term(&self, field: &str, term: &str, reader: &dyn IndexReader) -> f32 {
        self.idf(reader.doc_freq(field, term), reader.max_doc())
    }

    /// Sum of the term idfs over every term at every phrase position.
    fn idf_phrase(&self, field: &str, positions: &[Vec<String>], reader: &dyn IndexReader) -> f32 {
        positions
            .iter()
            .flat_map(|terms| terms.iter().rev())
            .map(|term| self.idf_term(field, term, reader))
            .sum()
    }
}

/// Decode a norm byte into a float.
pub fn byte_to_float(b: u8) -> f32 {
    if b == 0 {
        return 0.0;
    }
    let mantissa = u32::from(b & 7);
    let exponent = u32::from((b >> 3) & 31);
    f32::from_bits((mantissa << 21) | ((exponent + 48) << 24))
}

/// Encode a float into a norm byte, rounding down and clamping to the
/// representable range.
pub fn float_to_byte(f: f32) -> u8 {
    if f <= 0.0 {
        return 0;
    }
    let bits = f.to_bits();
    let mantissa = (bits & 0x00EF_0000) >> 21;
    let exponent = (bits >> 24) as i32 - 48;
    if exponent > 31 {
        (31 << 3) | 7
    } else if exponent < 0 {
        1
    } else {
        ((exponent as u32) << 3 | mantissa) as u8
    }
}

/// The default scoring model.
///
/// - `length_norm = 1 / sqrt(num_terms)`
/// - `query_norm = 1 / sqrt(sum_of_squared_weights)`
/// - `tf = sqrt(freq)`
/// - `sloppy_freq = 1 / (distance + 1)`
/// - `idf = ln(num_docs / (doc_freq + 1)) + 1`
/// - `coord = overlap / max_overlap`
#[derive(Clone)]
pub struct DefaultSimilarity {
    norm_table: [f32; 256],
}

impl DefaultSimilarity {
    /// Create a new default similarity with its norm decoding table.
    pub fn new() -> Self {
        let mut norm_table = [0.0f32; 256];
        for (i, slot) in norm_table.iter_mut().enumerate() {
            *slot = byte_to_float(i as u8);
        }
        DefaultSimilarity { norm_table }
    }
}

impl Default for DefaultSimilarity {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for DefaultSimilarity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DefaultSimilarity").finish()
    }
}

impl Similarity for DefaultSimilarity {
    fn length_norm(&self, _field: &str, num_terms: u32) -> f32 {
        (1.0 / f64::from(num_terms).sqrt()) as f32
    }

    fn query_norm(&self, sum_of_squared_weights: f32) -> f32 {
        (1.0 / f64::from(sum_of_squared_weights).sqrt()) as f32
    }

    fn tf(&self, freq: f32) -> f32 {
        f64::from(freq).sqrt() as f32
    }

    fn sloppy_freq(&self, distance: u32) -> f32 {
        (1.0 / (f64::from(distance) + 1.0)) as f32
    }

    fn idf(&self, doc_freq: u32, num_docs: u32) -> f32 {
        let ratio = num_docs as f32 / (doc_freq as f32 + 1.0);
        (f64::from(ratio).ln() + 1.0) as f32
    }

    fn coord(&self, overlap: u32, max_overlap: u32) -> f32 {
        (f64::from(overlap) / f64::from(max_overlap)) as f32
    }

    fn decode_norm(&self, b: u8) -> f32 {
        self.norm_table[b as usize]
    }

    fn encode_norm(&self, f: f32) -> u8 {
        float_to_byte(f)
    }
}
