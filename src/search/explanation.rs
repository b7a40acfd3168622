//! Score explanations.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::util::float_to_s;

/// A tree describing how a score was computed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Explanation {
    /// The value of this node.
    pub value: f32,
    /// What the value represents.
    pub description: String,
    /// Sub-explanations combined into `value`.
    pub details: Vec<Explanation>,
}

impl Explanation {
    /// Create an explanation without details.
    pub fn new<S: Into<String>>(value: f32, description: S) -> Self {
        Explanation {
            value,
            description: description.into(),
            details: Vec::new(),
        }
    }

    /// Append a sub-explanation.
    pub fn add_detail(&mut self, detail: Explanation) {
        self.details.push(detail);
    }

    /// Builder form of [`Explanation::add_detail`].
    pub fn with_detail(mut self, detail: Explanation) -> Self {
        self.details.push(detail);
        self
    }

    /// Plain text rendering, indenting two spaces per level.
    pub fn to_s(&self) -> String {
        let mut buf = String::new();
        self.append_s(&mut buf, 0);
        buf
    }

    fn append_s(&self, buf: &mut String, depth: usize) {
        buf.push_str(&"  ".repeat(depth));
        buf.push_str(&float_to_s(f64::from(self.value)));
        buf.push_str(" = ");
        buf.push_str(&self.description);
        buf.push('\n');
        for detail in &self.details {
            detail.append_s(buf, depth + 1);
        }
    }

    /// HTML rendering as nested unordered lists.
    pub fn to_html(&self) -> String {
        let mut buf = String::new();
        self.append_html(&mut buf);
        buf
    }

    fn append_html(&self, buf: &mut String) {
        buf.push_str("<ul>\n<li>");
        buf.push_str(&float_to_s(f64::from(self.value)));
        buf.push_str(" = ");
        buf.push_str(&self.description);
        buf.push_str("</li>\n");
        for detail in &self.details {
            detail.append_html(buf);
        }
        buf.push_str("</ul>\n");
    }
}

impl fmt::Display for Explanation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_s())
    }
}
