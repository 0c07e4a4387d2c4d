//! # Validation Errors
//!
//! Field-level validation failures for domain values. Each variant names the
//! offending field so the API layer can surface it without reformatting.

use thiserror::Error;

/// A domain value failed validation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A required text field was empty or whitespace.
    #[error("{field} must not be empty")]
    Empty {
        /// Name of the field.
        field: &'static str,
    },

    /// A text field exceeded its maximum length in characters.
    #[error("{field} must be at most {max} characters, got {actual}")]
    TooLong {
        /// Name of the field.
        field: &'static str,
        /// Maximum permitted length.
        max: usize,
        /// Observed length.
        actual: usize,
    },

    /// A numeric field fell outside its permitted range.
    #[error("{field} must be between {min} and {max}, got {actual}")]
    OutOfRange {
        /// Name of the field.
        field: &'static str,
        /// Inclusive lower bound.
        min: i64,
        /// Inclusive upper bound.
        max: i64,
        /// Observed value.
        actual: i64,
    },

    /// An update carried no fields to change.
    #[error("update must change at least one field")]
    EmptyPatch,

    /// A pagination parameter was invalid.
    #[error("invalid pagination: {0}")]
    Pagination(String),
}
