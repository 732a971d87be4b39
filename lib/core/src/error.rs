//! Error handling foundation for the proctor platform.
//!
//! This module provides the `Result` type alias using rootcause and the
//! `StorageError` context shared by every store abstraction. Each crate
//! defines its own domain-specific error types in its own error module.

use rootcause::Report;
use std::fmt;

/// A Result type alias using rootcause's Report for error handling.
///
/// Each layer adds its own context as errors propagate.
pub type Result<T, C = ()> = std::result::Result<T, Report<C>>;

/// Failure of a persistence backend (database, lock, transport).
///
/// Store traits in the session and authorization crates report this
/// error; callers translate it into their own storage variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageError {
    /// Human-readable description of the failure.
    pub details: String,
}

impl StorageError {
    /// Creates a storage error from any displayable cause.
    #[must_use]
    pub fn new(details: impl fmt::Display) -> Self {
        Self {
            details: details.to_string(),
        }
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "storage failure: {}", self.details)
    }
}

impl std::error::Error for StorageError {}
