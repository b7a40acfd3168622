use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::analysis::multi_mapper::MultiMapper;
use crate::error::Result;

use super::{CharFilter, Transformation};

/// Replaces every registered pattern with its replacement, longest match
/// first, in a single pass.
#[derive(Debug, Clone)]
pub struct MappingCharFilter {
    mapper: MultiMapper,
}

impl MappingCharFilter {
    /// Build a filter from pattern/replacement pairs. Pairs are registered in
    /// key order so the compiled automaton is deterministic.
    pub fn new(mapping: BTreeMap<String, String>) -> Result<Self> {
        let mut mapper = MultiMapper::new();
        for (pattern, replacement) in &mapping {
            mapper.add_mapping(pattern, replacement)?;
        }
        mapper.compile();
        Ok(Self { mapper })
    }

    /// Wrap an already configured mapper.
    pub fn from_mapper(mapper: MultiMapper) -> Self {
        Self { mapper }
    }

    /// Load a JSON object of `{"pattern": "replacement"}` pairs.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let mapping: BTreeMap<String, String> = serde_json::from_str(json)?;
        Self::new(mapping)
    }

    /// Load a JSON mapping file.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// The underlying mapper.
    pub fn mapper(&self) -> &MultiMapper {
        &self.mapper
    }
}

impl CharFilter for MappingCharFilter {
    fn filter(&self, input: &str) -> (String, Vec<Transformation>) {
        self.mapper.map_with_transformations(input)
    }

    fn name(&self) -> &'static str {
        "mapping"
    }
}
