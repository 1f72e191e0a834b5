//! Error types for the datatypes engine.

use crate::{FieldName, FormatId};
use thiserror::Error;

/// All possible errors from the datatypes engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    // Access errors
    #[error("index {index} is out of range (count: {count})")]
    IndexOutOfRange { index: usize, count: usize },

    #[error("field not found: {0}")]
    FieldNotFound(FieldName),

    #[error("field already exists: {0}")]
    FieldAlreadyExists(FieldName),

    // Data shape errors
    #[error("invalid data: {0}")]
    InvalidData(String),

    #[error("format mismatch: {0}")]
    FormatMismatch(String),

    // Format resolution errors
    #[error("format with id {0} is not defined in the payload")]
    FormatNotFound(FormatId),

    #[error("invalid format: {0}")]
    InvalidFormat(String),

    // Adapter errors
    #[error("unknown adapter module: {0}")]
    UnknownAdapter(String),

    #[error("invalid adapter envelope: {0}")]
    InvalidEnvelope(String),

    #[error("clone failed: {0}")]
    CloneFailed(String),
}

impl Error {
    /// Build an out-of-range error for `index` against a view of `count` items.
    pub fn out_of_range(index: usize, count: usize) -> Self {
        Error::IndexOutOfRange { index, count }
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = Error::FieldNotFound("Name".into());
        assert_eq!(err.to_string(), "field not found: Name");

        let err = Error::out_of_range(3, 1);
        assert_eq!(err.to_string(), "index 3 is out of range (count: 1)");

        let err = Error::FormatNotFound(2);
        assert_eq!(
            err.to_string(),
            "format with id 2 is not defined in the payload"
        );
    }
}
