//! # Error Types
//!
//! Two failure surfaces exist in the runtime:
//!
//! - [`LoadError`]: a compiled grammar table was rejected by
//!   [`Language::load`](crate::Language::load). Nothing is constructed.
//! - [`ParseError`]: a parse request was misused or cancelled.
//!
//! Malformed *input text* is never an error: it yields a complete tree with
//! embedded `ERROR` nodes.
use thiserror::Error;

/// A grammar table could not be loaded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    /// The table's format version is outside the range this runtime reads.
    #[error("incompatible table version {found} (supported {min}..={max})")]
    IncompatibleVersion { found: u16, min: u16, max: u16 },

    /// The table failed a structural check.
    #[error("malformed table: {0}")]
    Malformed(String),
}

impl LoadError {
    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        LoadError::Malformed(message.into())
    }
}

/// A parse request failed without producing a tree.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// The cancellation flag was raised between automaton steps.
    #[error("parse cancelled")]
    Cancelled,

    /// The previous tree was produced from a different language.
    #[error("tree was produced by language {found:?}, parser uses {expected:?}")]
    LanguageMismatch { expected: String, found: String },

    /// The edit does not describe the supplied input.
    #[error("edit {start}..{old_end} -> {new_end} does not fit (old length {old_len}, new length {new_len})")]
    InvalidEdit {
        start: usize,
        old_end: usize,
        new_end: usize,
        old_len: usize,
        new_len: usize,
    },
}
