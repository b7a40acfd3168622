//! Multi-pattern string replacement compiled to a deterministic automaton.
//!
//! Patterns are first laid out as a non-deterministic trie of byte chains
//! hanging off a shared start state, then determinized by subset
//! construction. Each DFA state is keyed by the set of NFA states active in
//! it, stored as a [`BitVector`]. Mapping text is then a single pass over its
//! bytes with one table lookup per byte.

use std::collections::VecDeque;
use std::sync::OnceLock;

use ahash::AHashMap;
use log::debug;

use crate::analysis::char_filter::Transformation;
use crate::error::{Result, XiphosError};
use crate::util::BitVector;

/// Growth step for the output buffer of [`MultiMapper::dynamic_map`].
const DYNAMIC_GROWTH: usize = 1024;

/// A single pattern and its replacement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mapping {
    pub pattern: String,
    pub replacement: String,
}

#[derive(Debug, Clone)]
struct LetterState {
    /// Byte that advances this state, `None` for a final state.
    expects: Option<u8>,
    next: usize,
    /// Pattern length and mapping index for final states.
    matched: Option<(usize, usize)>,
}

#[derive(Debug, Clone)]
struct DeterministicState {
    next: Box<[u32; 256]>,
    mapping: Option<usize>,
    longest_match: usize,
}

#[derive(Debug, Clone)]
struct Dfa {
    states: Vec<DeterministicState>,
}

/// Compiles (pattern, replacement) pairs and applies them to text.
#[derive(Debug, Clone, Default)]
pub struct MultiMapper {
    mappings: Vec<Mapping>,
    dfa: OnceLock<Dfa>,
}

impl MultiMapper {
    /// Create a mapper with no mappings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered mappings.
    pub fn size(&self) -> usize {
        self.mappings.len()
    }

    /// The registered mappings in registration order.
    pub fn mappings(&self) -> &[Mapping] {
        &self.mappings
    }

    /// Register a mapping. The automaton is rebuilt on next use.
    pub fn add_mapping(&mut self, pattern: &str, replacement: &str) -> Result<()> {
        if pattern.is_empty() {
            return Err(XiphosError::argument(
                "Tried to add empty pattern to multi_mapper",
            ));
        }
        self.mappings.push(Mapping {
            pattern: pattern.to_string(),
            replacement: replacement.to_string(),
        });
        self.dfa = OnceLock::new();
        Ok(())
    }

    /// Build the automaton now instead of on first use.
    pub fn compile(&mut self) {
        let dfa = self.build();
        self.dfa = OnceLock::from(dfa);
    }

    /// Number of deterministic states, compiling if needed.
    pub fn state_count(&self) -> usize {
        self.dfa().states.len()
    }

    fn dfa(&self) -> &Dfa {
        self.dfa.get_or_init(|| self.build())
    }

    fn build(&self) -> Dfa {
        let mut start_edges: Vec<Vec<usize>> = vec![Vec::new(); 256];
        let mut nstates: Vec<LetterState> = vec![LetterState {
            expects: None,
            next: 0,
            matched: None,
        }];
        let mut in_alphabet = [false; 256];

        // later mappings get the lower state numbers
        for (idx, mapping) in self.mappings.iter().enumerate().rev() {
            let pattern = mapping.pattern.as_bytes();
            start_edges[usize::from(pattern[0])].push(nstates.len());
            for (j, &b) in pattern.iter().enumerate() {
                in_alphabet[usize::from(b)] = true;
                let next = nstates.len() + 1;
                nstates.push(LetterState {
                    expects: pattern.get(j + 1).copied(),
                    next,
                    matched: None,
                });
            }
            if let Some(last) = nstates.last_mut() {
                last.expects = None;
                last.matched = Some((pattern.len(), idx));
            }
        }
        let alphabet: Vec<u8> = (0..=255u8)
            .filter(|&b| in_alphabet[usize::from(b)])
            .collect();

        let mut states: Vec<DeterministicState> = Vec::new();
        let mut index: AHashMap<BitVector, u32> = AHashMap::new();
        let mut pending: VecDeque<(u32, BitVector)> = VecDeque::new();

        let mut intern = |bv: BitVector,
                          states: &mut Vec<DeterministicState>,
                          pending: &mut VecDeque<(u32, BitVector)>|
         -> u32 {
            if let Some(&id) = index.get(&bv) {
                return id;
            }
            let id = states.len() as u32;
            let mut longest_match = 0;
            let mut mapping = None;
            for bit in bv.iter_ones() {
                if let Some((len, idx)) = nstates[bit].matched {
                    if len > longest_match {
                        longest_match = len;
                        mapping = Some(idx);
                    }
                }
            }
            states.push(DeterministicState {
                next: Box::new([0; 256]),
                mapping,
                longest_match,
            });
            index.insert(bv.clone(), id);
            pending.push_back((id, bv));
            id
        };

        intern(BitVector::new(), &mut states, &mut pending);
        while let Some((id, bv)) = pending.pop_front() {
            for &c in alphabet.iter().rev() {
                let mut next_bv = BitVector::with_capacity(nstates.len());
                for &s in &start_edges[usize::from(c)] {
                    next_bv.set(s);
                }
                for bit in bv.iter_ones() {
                    let st = &nstates[bit];
                    if st.expects == Some(c) {
                        next_bv.set(st.next);
                    }
                }
                let target = intern(next_bv, &mut states, &mut pending);
                states[id as usize].next[usize::from(c)] = target;
            }
        }
        debug!(
            "compiled multi mapper: {} mappings, {} nfa states, {} dfa states",
            self.mappings.len(),
            nstates.len(),
            states.len()
        );
        Dfa { states }
    }

    /// Core mapping loop. `end` bounds the output length when set.
    fn run(
        &self,
        from: &[u8],
        end: Option<usize>,
        out: &mut Vec<u8>,
        mut transformations: Option<&mut Vec<Transformation>>,
    ) {
        let dfa = self.dfa();
        let mut state = 0usize;
        for (s, &b) in from.iter().enumerate() {
            if end.is_some_and(|end| out.len() >= end) {
                break;
            }
            state = dfa.states[state].next[usize::from(b)] as usize;
            let ds = &dfa.states[state];
            match ds.mapping {
                Some(idx) => {
                    let replacement = self.mappings[idx].replacement.as_bytes();
                    let d = out.len().saturating_sub(ds.longest_match - 1);
                    out.truncate(d);
                    let len = match end {
                        Some(end) => replacement.len().min(end.saturating_sub(d)),
                        None => replacement.len(),
                    };
                    out.extend_from_slice(&replacement[..len]);
                    if let Some(t) = transformations.as_deref_mut() {
                        t.push(Transformation::new(
                            s + 1 - ds.longest_match,
                            s + 1,
                            d,
                            d + len,
                        ));
                    }
                    state = 0;
                }
                None => out.push(b),
            }
        }
    }

    /// Map `from` into `to`, writing at most `to.len() - 1` bytes followed by
    /// a zero byte. Returns the number of mapped bytes written.
    pub fn map_into(&self, to: &mut [u8], from: &str) -> usize {
        if to.is_empty() {
            return 0;
        }
        let mut out = Vec::with_capacity(to.len());
        self.run(from.as_bytes(), Some(to.len() - 1), &mut out, None);
        to[..out.len()].copy_from_slice(&out);
        to[out.len()] = 0;
        out.len()
    }

    /// Length of the mapping of `from` into a buffer of `capa` bytes.
    pub fn map_len(&self, from: &str, capa: usize) -> usize {
        self.map_bytes(from, capa).len()
    }

    /// Map `from` as if into a buffer of `capa` bytes, truncating the result.
    pub fn map(&self, from: &str, capa: usize) -> String {
        String::from_utf8_lossy(&self.map_bytes(from, capa)).into_owned()
    }

    fn map_bytes(&self, from: &str, capa: usize) -> Vec<u8> {
        let mut out = Vec::with_capacity(capa);
        if capa > 0 {
            self.run(from.as_bytes(), Some(capa - 1), &mut out, None);
        }
        out
    }

    /// Map `from` without any length limit.
    pub fn dynamic_map(&self, from: &str) -> String {
        let mut out = Vec::with_capacity(from.len().max(DYNAMIC_GROWTH));
        self.run(from.as_bytes(), None, &mut out, None);
        String::from_utf8_lossy(&out).into_owned()
    }

    /// Map `from` without a length limit and report every replacement made.
    pub fn map_with_transformations(&self, from: &str) -> (String, Vec<Transformation>) {
        let mut out = Vec::with_capacity(from.len().max(DYNAMIC_GROWTH));
        let mut transformations = Vec::new();
        self.run(from.as_bytes(), None, &mut out, Some(&mut transformations));
        (String::from_utf8_lossy(&out).into_owned(), transformations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEXT: &str = "abc cabc abd cabcd";

    #[test]
    fn test_multimapper() {
        let mut mapper = MultiMapper::new();
        mapper.add_mapping("abc", "hello").unwrap();
        mapper.compile();
        assert_eq!(mapper.map_len(TEXT, 1000), 24);
        assert_eq!(mapper.map(TEXT, 1000), "hello chello abd chellod");
        assert_eq!(mapper.map(TEXT, 22), "hello chello abd chel");
        assert_eq!(mapper.map_len(TEXT, 22), 21);
        assert_eq!(mapper.map(TEXT, 15), "hello chello a");

        mapper.add_mapping("abcd", "hello").unwrap();
        mapper.compile();
        assert_eq!(mapper.map(TEXT, 1000), "hello chello abd chellod");

        mapper.add_mapping("cab", "taxi").unwrap();
        mapper.compile();
        assert_eq!(mapper.map(TEXT, 1000), "hello taxic abd taxicd");
        assert_eq!(mapper.size(), 3);
    }

    #[test]
    fn test_lazy_compile() {
        let mut mapper = MultiMapper::new();
        mapper.add_mapping("abc", "hello").unwrap();
        assert_eq!(mapper.dynamic_map(TEXT), "hello chello abd chellod");
        mapper.add_mapping("cab", "taxi").unwrap();
        assert_eq!(mapper.dynamic_map(TEXT), "hello taxic abd taxicd");
    }

    #[test]
    fn test_map_into_buffer() {
        let mut mapper = MultiMapper::new();
        mapper.add_mapping("abc", "hello").unwrap();
        let mut buf = [0xffu8; 15];
        let len = mapper.map_into(&mut buf, TEXT);
        assert_eq!(len, 14);
        assert_eq!(&buf[..len], b"hello chello a");
        assert_eq!(buf[len], 0);
    }

    #[test]
    fn test_no_match_unchanged() {
        let mut mapper = MultiMapper::new();
        mapper.add_mapping("xyz", "q").unwrap();
        assert_eq!(mapper.dynamic_map("nothing to see"), "nothing to see");
    }

    #[test]
    fn test_empty_pattern_rejected() {
        let mut mapper = MultiMapper::new();
        let err = mapper.add_mapping("", "x").unwrap_err();
        assert!(matches!(err, XiphosError::Argument(_)));
        assert_eq!(mapper.size(), 0);
    }

    #[test]
    fn test_multimapper_utf8() {
        let text = "zàáâãäåāăz";
        let mut mapper = MultiMapper::new();
        for p in ["à", "á", "â", "ã", "ä", "å", "ā", "ă"] {
            mapper.add_mapping(p, "a").unwrap();
        }
        mapper.compile();
        assert_eq!(mapper.map(text, 1000), "zaaaaaaaaz");
        assert_eq!(mapper.dynamic_map(text), "zaaaaaaaaz");
    }

    #[test]
    fn test_longest_match_rewinds_output() {
        let mut mapper = MultiMapper::new();
        mapper.add_mapping("b", "B").unwrap();
        mapper.add_mapping("ab", "AB").unwrap();
        assert_eq!(mapper.dynamic_map("xaby"), "xABy");
        assert_eq!(mapper.dynamic_map("xby"), "xBy");
    }

    #[test]
    fn test_equal_length_tie_goes_to_later_mapping() {
        // Duplicate patterns tie on length; the winner is whichever NFA
        // state is scanned first, which is the last one registered.
        let mut mapper = MultiMapper::new();
        mapper.add_mapping("ab", "first").unwrap();
        mapper.add_mapping("ab", "second").unwrap();
        assert_eq!(mapper.dynamic_map("ab"), "second");
    }

    #[test]
    fn test_transformations() {
        let mut mapper = MultiMapper::new();
        mapper.add_mapping("ph", "f").unwrap();
        let (out, trans) = mapper.map_with_transformations("phone graph");
        assert_eq!(out, "fone graf");
        assert_eq!(
            trans,
            vec![Transformation::new(0, 2, 0, 1), Transformation::new(9, 11, 8, 9)]
        );
    }

    #[test]
    fn test_long_input_grows() {
        let mut mapper = MultiMapper::new();
        mapper.add_mapping("a", "aa").unwrap();
        let input = "a".repeat(3000);
        assert_eq!(mapper.dynamic_map(&input).len(), 6000);
    }
}
