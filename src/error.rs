//! Error types for the sorting pipeline

use std::fmt;

/// Error types for sorting operations
#[derive(Debug, Clone)]
pub enum SortError {
    /// Invalid parameter combination, rejected before any processing begins
    InvalidConfig(String),
    /// Too few samples for the requested feature reduction
    Degenerate(String),
    /// A merge plan broke the descending-id ordering it relies on
    Consistency(String),
}

impl fmt::Display for SortError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortError::InvalidConfig(msg) => write!(f, "Invalid configuration: {}", msg),
            SortError::Degenerate(msg) => write!(f, "Degenerate input: {}", msg),
            SortError::Consistency(msg) => write!(f, "Merge consistency violation: {}", msg),
        }
    }
}

impl std::error::Error for SortError {}
