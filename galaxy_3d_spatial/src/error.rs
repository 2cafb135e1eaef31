//! Error types for the Galaxy3D spatial index
//!
//! This module defines the error types returned by the octree and its
//! configuration: bounds validation, usage errors, and invariant reports.

use std::fmt;

/// Result type for Galaxy3D spatial operations
pub type Result<T> = std::result::Result<T, Error>;

/// Galaxy3D spatial errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Bounds rejected before any mutation (NaN, infinite, or min > max)
    InvalidBounds(String),

    /// The item key is not tracked by this tree (removed, or never added)
    UntrackedItem(String),

    /// Invalid octree configuration (e.g. max_items == 0)
    InvalidConfig(String),

    /// A structural invariant does not hold (reported by `Octree::validate`)
    InvariantViolation(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidBounds(msg) => write!(f, "Invalid bounds: {}", msg),
            Error::UntrackedItem(msg) => write!(f, "Untracked item: {}", msg),
            Error::InvalidConfig(msg) => write!(f, "Invalid configuration: {}", msg),
            Error::InvariantViolation(msg) => write!(f, "Invariant violation: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
