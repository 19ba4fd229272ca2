//! Shared error definitions for catalog primitives.

use thiserror::Error;

/// Result alias used throughout the catalog types.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while constructing catalog primitive types.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    /// A conditional expression could not be parsed.
    #[error("invalid condition `{expression}`: {reason}")]
    InvalidCondition {
        /// The offending expression.
        expression: String,
        /// Human-readable reason for rejection.
        reason: String,
    },

    /// A type name was not one of the supported values.
    #[error("invalid {kind} type `{value}`")]
    InvalidType {
        /// Which family of type names was being parsed (`argument`, `output`).
        kind: &'static str,
        /// The unrecognized type name.
        value: String,
    },

    /// A duration value could not be parsed.
    #[error("invalid duration `{value}`: {reason}")]
    InvalidDuration {
        /// The offending duration text.
        value: String,
        /// Human-readable reason for rejection.
        reason: String,
    },
}
