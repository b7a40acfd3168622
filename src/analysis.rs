//! Text analysis pieces used ahead of indexing: character filters and the
//! multi-pattern mapper they are built on.

pub mod char_filter;
pub mod multi_mapper;

pub use char_filter::{CharFilter, Transformation};
pub use multi_mapper::MultiMapper;
