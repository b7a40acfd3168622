//! Error types for the xiphos library.
//!
//! All fallible operations return [`Result`], whose error side is the
//! [`XiphosError`] enum. The variants follow the kinds of failure the search
//! core can report: bad arguments, I/O and structural corruption, lifecycle
//! violations, unsupported backend operations and reads past a logical end.
//!
//! # Examples
//!
//! ```
//! use xiphos::error::{XiphosError, Result};
//!
//! fn example_operation() -> Result<()> {
//!     Err(XiphosError::argument("Tried to add empty pattern to multi_mapper"))
//! }
//!
//! match example_operation() {
//!     Ok(_) => println!("Success"),
//!     Err(e) => eprintln!("Error: {}", e),
//! }
//! ```

use std::io;

use thiserror::Error;

/// The main error type for xiphos operations.
#[derive(Error, Debug)]
pub enum XiphosError {
    /// I/O errors from the underlying operating system.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Structural I/O errors raised by the library itself (corrupt compound
    /// files, missing entries, closing twice).
    #[error("I/O error: {0}")]
    IoState(String),

    /// Invalid arguments passed by the caller.
    #[error("Argument error: {0}")]
    Argument(String),

    /// Operation is invalid in the current lifecycle state.
    #[error("State error: {0}")]
    State(String),

    /// Operation is not supported by this backend.
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// Read past the logical end of a stream.
    #[error("EOF error: {0}")]
    Eof(String),

    /// Storage-related errors.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Analysis-related errors (character mapping, tokenizing).
    #[error("Analysis error: {0}")]
    Analysis(String),

    /// Query-related errors.
    #[error("Query error: {0}")]
    Query(String),

    /// JSON serialization/deserialization errors.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error for other cases.
    #[error("Error: {0}")]
    Other(String),

    /// Generic anyhow error.
    #[error("Anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
}

/// Result type alias for operations that may fail with XiphosError.
pub type Result<T> = std::result::Result<T, XiphosError>;

impl XiphosError {
    /// Create a new argument error.
    pub fn argument<S: Into<String>>(msg: S) -> Self {
        XiphosError::Argument(msg.into())
    }

    /// Create a new structural I/O error.
    pub fn io<S: Into<String>>(msg: S) -> Self {
        XiphosError::IoState(msg.into())
    }

    /// Create a new state error.
    pub fn state<S: Into<String>>(msg: S) -> Self {
        XiphosError::State(msg.into())
    }

    /// Create a new unsupported-operation error.
    pub fn unsupported<S: Into<String>>(msg: S) -> Self {
        XiphosError::Unsupported(msg.into())
    }

    /// Create a new EOF error.
    pub fn eof<S: Into<String>>(msg: S) -> Self {
        XiphosError::Eof(msg.into())
    }

    /// Create a new storage error.
    pub fn storage<S: Into<String>>(msg: S) -> Self {
        XiphosError::Storage(msg.into())
    }

    /// Create a new analysis error.
    pub fn analysis<S: Into<String>>(msg: S) -> Self {
        XiphosError::Analysis(msg.into())
    }

    /// Create a new query error.
    pub fn query<S: Into<String>>(msg: S) -> Self {
        XiphosError::Query(msg.into())
    }

    /// Create a new generic error.
    pub fn other<S: Into<String>>(msg: S) -> Self {
        XiphosError::Other(msg.into())
    }

    /// Returns true for any of the I/O flavoured errors.
    pub fn is_io(&self) -> bool {
        matches!(self, XiphosError::Io(_) | XiphosError::IoState(_))
    }

    /// Returns true when a read ran past the end of its stream.
    pub fn is_eof(&self) -> bool {
        match self {
            XiphosError::Eof(_) => true,
            XiphosError::Io(e) => e.kind() == io::ErrorKind::UnexpectedEof,
            _ => false,
        }
    }
}
