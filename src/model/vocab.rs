//! Vocabulary terms used across the store
//!
//! Terms are interned once per process and handed out by reference, so the
//! hot paths never re-allocate identical constant IRIs.

use oxrdf::NamedNode;
use std::sync::LazyLock;

/// RDF core vocabulary
pub mod rdf {
    use super::*;

    pub static TYPE: LazyLock<NamedNode> =
        LazyLock::new(|| NamedNode::new_unchecked("http://www.w3.org/1999/02/22-rdf-syntax-ns#type"));
}

/// Linked Data Platform vocabulary
pub mod ldp {
    use super::*;

    pub static CONTAINS: LazyLock<NamedNode> =
        LazyLock::new(|| NamedNode::new_unchecked("http://www.w3.org/ns/ldp#contains"));
    pub static RESOURCE: LazyLock<NamedNode> =
        LazyLock::new(|| NamedNode::new_unchecked("http://www.w3.org/ns/ldp#Resource"));
    pub static CONTAINER: LazyLock<NamedNode> =
        LazyLock::new(|| NamedNode::new_unchecked("http://www.w3.org/ns/ldp#Container"));
    pub static BASIC_CONTAINER: LazyLock<NamedNode> =
        LazyLock::new(|| NamedNode::new_unchecked("http://www.w3.org/ns/ldp#BasicContainer"));
}

/// Dublin Core terms
pub mod dc {
    use super::*;

    pub static MODIFIED: LazyLock<NamedNode> =
        LazyLock::new(|| NamedNode::new_unchecked("http://purl.org/dc/terms/modified"));
}

/// POSIX stat vocabulary, for filesystem-derived metadata
pub mod posix {
    use super::*;

    pub static SIZE: LazyLock<NamedNode> =
        LazyLock::new(|| NamedNode::new_unchecked("http://www.w3.org/ns/posix/stat#size"));
    pub static MTIME: LazyLock<NamedNode> =
        LazyLock::new(|| NamedNode::new_unchecked("http://www.w3.org/ns/posix/stat#mtime"));
}

/// XML Schema datatypes
pub mod xsd {
    use super::*;

    pub static INTEGER: LazyLock<NamedNode> =
        LazyLock::new(|| NamedNode::new_unchecked("http://www.w3.org/2001/XMLSchema#integer"));
    pub static DATE_TIME: LazyLock<NamedNode> =
        LazyLock::new(|| NamedNode::new_unchecked("http://www.w3.org/2001/XMLSchema#dateTime"));
}

/// Media ontology, for the content-type slot on representation metadata
pub mod ma {
    use super::*;

    pub static FORMAT: LazyLock<NamedNode> =
        LazyLock::new(|| NamedNode::new_unchecked("http://www.w3.org/ns/ma-ont#format"));
}

/// Store-internal directives carried on incoming representation metadata.
///
/// These never leave the process: the store strips them before anything is
/// persisted to a backend.
pub mod directive {
    use super::*;

    pub static SLUG: LazyLock<NamedNode> =
        LazyLock::new(|| NamedNode::new_unchecked("urn:kosha:meta:slug"));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terms_are_interned() {
        // Two reads of the same static must point at the same allocation.
        let a: &NamedNode = &rdf::TYPE;
        let b: &NamedNode = &rdf::TYPE;
        assert!(std::ptr::eq(a, b));
    }

    #[test]
    fn test_ldp_terms() {
        assert_eq!(ldp::CONTAINS.as_str(), "http://www.w3.org/ns/ldp#contains");
        assert_eq!(ldp::BASIC_CONTAINER.as_str(), "http://www.w3.org/ns/ldp#BasicContainer");
    }
}
