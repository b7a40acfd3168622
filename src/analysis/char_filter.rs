//! Char filters that rewrite text before it is tokenized.
//!
//! - [`mapping::MappingCharFilter`] - pattern replacement through a [`MultiMapper`]
//!
//! [`MultiMapper`]: crate::analysis::MultiMapper

/// Represents a change in the text, mapping a byte range in the original
/// text to a byte range in the new text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transformation {
    pub original_start: usize,
    pub original_end: usize,
    pub new_start: usize,
    pub new_end: usize,
}

impl Transformation {
    pub fn new(
        original_start: usize,
        original_end: usize,
        new_start: usize,
        new_end: usize,
    ) -> Self {
        Self {
            original_start,
            original_end,
            new_start,
            new_end,
        }
    }
}

/// Trait for character filters that transform text before tokenization.
///
/// Implementations return the filtered text together with the list of
/// replacements they made, so token offsets can be mapped back.
pub trait CharFilter: Send + Sync {
    /// Apply this filter to the input text.
    fn filter(&self, input: &str) -> (String, Vec<Transformation>);

    /// Get the name of this char filter.
    fn name(&self) -> &'static str;
}

pub mod mapping;
