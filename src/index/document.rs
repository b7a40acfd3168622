//! Documents fed to the index writer.

use serde::{Deserialize, Serialize};

/// One field of a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocField {
    /// Field name.
    pub name: String,
    /// Values of the field, indexed in order.
    pub data: Vec<String>,
    /// Whether the values are split into words. Untokenized values are
    /// indexed as a single term.
    #[serde(default = "default_tokenize")]
    pub tokenize: bool,
}

fn default_tokenize() -> bool {
    true
}

impl DocField {
    /// Create a tokenized field.
    pub fn text<N: Into<String>, V: Into<String>>(name: N, value: V) -> Self {
        DocField {
            name: name.into(),
            data: vec![value.into()],
            tokenize: true,
        }
    }

    /// Create an untokenized field.
    pub fn keyword<N: Into<String>, V: Into<String>>(name: N, value: V) -> Self {
        DocField {
            name: name.into(),
            data: vec![value.into()],
            tokenize: false,
        }
    }
}

/// A document: a list of fields and a boost applied to every field norm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// The fields of this document, in insertion order.
    pub fields: Vec<DocField>,
    /// Boost applied to every field norm.
    #[serde(default = "default_boost")]
    pub boost: f32,
}

fn default_boost() -> f32 {
    1.0
}

impl Document {
    /// Create a new empty document.
    pub fn new() -> Self {
        Document {
            fields: Vec::new(),
            boost: 1.0,
        }
    }

    /// Add a field. Values of a field already present are appended.
    pub fn add_field(&mut self, field: DocField) {
        match self.fields.iter_mut().find(|f| f.name == field.name) {
            Some(existing) => existing.data.extend(field.data),
            None => self.fields.push(field),
        }
    }

    /// Get a field by name.
    pub fn get_field(&self, name: &str) -> Option<&DocField> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the document has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Create a builder for constructing documents.
    pub fn builder() -> DocumentBuilder {
        DocumentBuilder::new()
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for [`Document`].
#[derive(Debug, Default)]
pub struct DocumentBuilder {
    document: Document,
}

impl DocumentBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        DocumentBuilder {
            document: Document::new(),
        }
    }

    /// Add a tokenized field.
    pub fn add_text<N: Into<String>, V: Into<String>>(mut self, name: N, value: V) -> Self {
        self.document.add_field(DocField::text(name, value));
        self
    }

    /// Add an untokenized field.
    pub fn add_keyword<N: Into<String>, V: Into<String>>(mut self, name: N, value: V) -> Self {
        self.document.add_field(DocField::keyword(name, value));
        self
    }

    /// Set the document boost.
    pub fn boost(mut self, boost: f32) -> Self {
        self.document.boost = boost;
        self
    }

    /// Build the document.
    pub fn build(self) -> Document {
        self.document
    }
}
