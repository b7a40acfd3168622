//! Search results.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::index::DocId;

/// A scored document.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Hit {
    /// Document number.
    pub doc: DocId,
    /// Score of the document.
    pub score: f32,
}

impl Hit {
    /// Create a new hit.
    pub fn new(doc: DocId, score: f32) -> Self {
        Hit { doc, score }
    }
}

/// Ordering used by the hit queue. A lower score is less; between equal
/// scores the higher document number is less, so earlier documents win
/// ties.
pub(crate) fn hit_lt(a: &Hit, b: &Hit) -> bool {
    if a.score == b.score {
        a.doc > b.doc
    } else {
        a.score < b.score
    }
}

/// A page of search results, best hit first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TopDocs {
    /// Number of documents that matched, including those outside the page.
    pub total_hits: usize,
    /// The requested page of hits.
    pub hits: Vec<Hit>,
    /// Highest score among all matches.
    pub max_score: f32,
}

impl TopDocs {
    /// Whether the page holds no hits.
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    /// Document numbers of the page in rank order.
    pub fn docs(&self) -> Vec<DocId> {
        self.hits.iter().map(|hit| hit.doc).collect()
    }
}

impl fmt::Display for TopDocs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} hits sorted by <score, doc_num>", self.total_hits)?;
        for hit in &self.hits {
            writeln!(f, "\t{}:{:.6}", hit.doc, hit.score)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_ordering() {
        assert!(hit_lt(&Hit::new(0, 1.0), &Hit::new(1, 2.0)));
        assert!(!hit_lt(&Hit::new(1, 2.0), &Hit::new(0, 1.0)));
        assert!(hit_lt(&Hit::new(5, 1.0), &Hit::new(2, 1.0)));
        assert!(!hit_lt(&Hit::new(2, 1.0), &Hit::new(5, 1.0)));
        assert!(!hit_lt(&Hit::new(2, 1.0), &Hit::new(2, 1.0)));
    }

    #[test]
    fn test_display() {
        let td = TopDocs {
            total_hits: 3,
            hits: vec![Hit::new(4, 1.5), Hit::new(0, 0.25)],
            max_score: 1.5,
        };
        assert_eq!(
            td.to_string(),
            "3 hits sorted by <score, doc_num>\n\t4:1.500000\n\t0:0.250000\n"
        );
        assert_eq!(td.docs(), vec![4, 0]);
        assert!(TopDocs::default().is_empty());
    }
}
