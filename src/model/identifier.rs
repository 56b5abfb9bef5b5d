//! Resource identifiers
//!
//! A resource is addressed by exactly one absolute IRI. Containers end in
//! `/`, documents do not; the identifier shape alone decides the kind.

use crate::error::{StoreError, StoreResult};
use std::fmt;

/// An absolute IRI identifying exactly one resource
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceIdentifier(String);

impl ResourceIdentifier {
    /// Create an identifier from an absolute IRI string
    pub fn new(iri: impl Into<String>) -> Self {
        Self(iri.into())
    }

    /// Create an identifier, validating the IRI syntax
    pub fn parse(iri: &str) -> StoreResult<Self> {
        oxiri::Iri::parse(iri.to_string())
            .map(|parsed| Self(parsed.into_inner()))
            .map_err(|e| StoreError::InvalidInput(format!("invalid IRI {}: {}", iri, e)))
    }

    /// The IRI string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Containers are identified by IRIs ending in `/`
    pub fn is_container(&self) -> bool {
        self.0.ends_with('/')
    }

    /// The identifier of the parent container, if one exists syntactically.
    ///
    /// Returns `None` at the authority root (`http://x/` has no parent);
    /// whether the result lies inside a store's base is the caller's check.
    pub fn parent(&self) -> Option<ResourceIdentifier> {
        let trimmed = self.0.strip_suffix('/').unwrap_or(&self.0);
        let authority_start = trimmed.find("://").map(|i| i + 3).unwrap_or(0);
        trimmed[authority_start..]
            .rfind('/')
            .map(|i| Self(trimmed[..authority_start + i + 1].to_string()))
    }

    /// The path of this identifier relative to `base`, or `None` when the
    /// identifier lies outside the base IRI.
    pub fn relative_to<'a>(&'a self, base: &ResourceIdentifier) -> Option<&'a str> {
        self.0.strip_prefix(base.as_str())
    }

    /// The container form of this identifier (trailing slash added)
    pub fn to_container(&self) -> ResourceIdentifier {
        if self.is_container() {
            self.clone()
        } else {
            Self(format!("{}/", self.0))
        }
    }

    /// The document form of this identifier (trailing slash removed)
    pub fn to_document(&self) -> ResourceIdentifier {
        Self(self.0.trim_end_matches('/').to_string())
    }

    /// The last path segment, without any trailing slash
    pub fn name(&self) -> &str {
        let trimmed = self.0.trim_end_matches('/');
        trimmed.rsplit('/').next().unwrap_or(trimmed)
    }
}

impl fmt::Display for ResourceIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ResourceIdentifier {
    fn from(iri: &str) -> Self {
        Self(iri.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_container_shape() {
        assert!(ResourceIdentifier::new("http://x/a/").is_container());
        assert!(!ResourceIdentifier::new("http://x/a").is_container());
    }

    #[test]
    fn test_parent() {
        let doc = ResourceIdentifier::new("http://x/a/b");
        assert_eq!(doc.parent().unwrap().as_str(), "http://x/a/");

        let container = ResourceIdentifier::new("http://x/a/");
        assert_eq!(container.parent().unwrap().as_str(), "http://x/");

        let root = ResourceIdentifier::new("http://x/");
        assert!(root.parent().is_none());
    }

    #[test]
    fn test_relative_to() {
        let base = ResourceIdentifier::new("http://x/");
        let doc = ResourceIdentifier::new("http://x/a/b");
        assert_eq!(doc.relative_to(&base), Some("a/b"));

        let outside = ResourceIdentifier::new("http://y/a");
        assert!(outside.relative_to(&base).is_none());
    }

    #[test]
    fn test_kind_conversion() {
        let doc = ResourceIdentifier::new("http://x/a");
        assert_eq!(doc.to_container().as_str(), "http://x/a/");
        assert_eq!(doc.to_container().to_document().as_str(), "http://x/a");
    }

    #[test]
    fn test_name() {
        assert_eq!(ResourceIdentifier::new("http://x/a/b").name(), "b");
        assert_eq!(ResourceIdentifier::new("http://x/a/b/").name(), "b");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(ResourceIdentifier::parse("not an iri").is_err());
        assert!(ResourceIdentifier::parse("http://x/ok").is_ok());
    }
}
