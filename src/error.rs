//! Crate-wide error taxonomy
//!
//! Every failure surfaced by mappers, accessors, and stores is one of the
//! kinds below. Each kind maps onto exactly one HTTP status code so a
//! boundary layer can translate mechanically without inspecting messages.

use thiserror::Error;

/// Store errors
#[derive(Error, Debug)]
pub enum StoreError {
    /// Identifier does not resolve to an existing resource, or resolves to
    /// a resource of the wrong kind
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Operation would violate a structural invariant
    #[error("Conflict at {identifier}: {reason}")]
    Conflict {
        /// Offending identifier
        identifier: String,
        /// What would have been violated
        reason: String,
    },

    /// Representation format not handled by the target accessor or by any
    /// available converter
    #[error("Unsupported media type: {0}")]
    UnsupportedMediaType(String),

    /// Structurally forbidden operation regardless of content
    #[error("Method not allowed: {0}")]
    MethodNotAllowed(String),

    /// Malformed client input (identifier encoding, patch syntax)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Filesystem failure
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// SPARQL endpoint unreachable or misbehaving
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Any other backend failure with no room for local recovery
    #[error("Backend error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

impl StoreError {
    /// Shorthand for a [`StoreError::Conflict`]
    pub fn conflict(identifier: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Conflict {
            identifier: identifier.into(),
            reason: reason.into(),
        }
    }

    /// The HTTP status code this error kind translates to
    pub fn status_code(&self) -> u16 {
        match self {
            Self::NotFound(_) => 404,
            Self::Conflict { .. } => 409,
            Self::UnsupportedMediaType(_) => 415,
            Self::MethodNotAllowed(_) => 405,
            Self::InvalidInput(_) => 400,
            Self::Io(_) | Self::Http(_) | Self::Backend(_) => 500,
        }
    }

    /// Check if this is a [`StoreError::NotFound`]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes_are_distinct_per_kind() {
        let errors = [
            StoreError::NotFound("http://x/a".into()),
            StoreError::conflict("http://x/a", "kind mismatch"),
            StoreError::UnsupportedMediaType("application/zstd".into()),
            StoreError::MethodNotAllowed("delete root".into()),
            StoreError::InvalidInput("bad patch".into()),
            StoreError::Backend("endpoint returned 503".into()),
        ];

        let codes: Vec<u16> = errors.iter().map(|e| e.status_code()).collect();
        let mut deduped = codes.clone();
        deduped.sort_unstable();
        deduped.dedup();
        assert_eq!(codes.len(), deduped.len());
    }

    #[test]
    fn test_io_errors_are_internal() {
        let err: StoreError = std::io::Error::new(std::io::ErrorKind::Other, "disk on fire").into();
        assert_eq!(err.status_code(), 500);
        assert!(!err.is_not_found());
    }
}
