//! Data accessors
//!
//! The lowest storage layer: raw CRUD against one physical backend, scoped
//! to a single identifier per call. No locking, no format conversion, no
//! partial-update logic — those live in the store decorators above.

pub mod file;
pub mod memory;
pub mod sparql;

use crate::error::StoreResult;
use crate::model::vocab;
use crate::model::{DataPayload, Representation, RepresentationMetadata, ResourceIdentifier};
use async_trait::async_trait;
use oxrdf::{NamedNode, Quad, Subject};

pub use file::FileDataAccessor;
pub use memory::InMemoryDataAccessor;
pub use sparql::SparqlDataAccessor;

/// Backend-specific CRUD for a single resource at a time
#[async_trait]
pub trait DataAccessor: Send + Sync {
    /// Gate on the representation shape this backend can persist
    fn can_handle(&self, representation: &Representation) -> StoreResult<()>;

    /// The stored data of a document.
    ///
    /// Fails `NotFound` when the identifier denotes a container or nothing.
    async fn get_data(&self, identifier: &ResourceIdentifier) -> StoreResult<DataPayload>;

    /// Stored plus backend-intrinsic metadata. For containers this includes
    /// one containment triple per live child, computed fresh on every call.
    async fn get_metadata(
        &self,
        identifier: &ResourceIdentifier,
    ) -> StoreResult<RepresentationMetadata>;

    /// The direct children of a container, live from the backend
    async fn get_children(
        &self,
        identifier: &ResourceIdentifier,
    ) -> StoreResult<Vec<ResourceIdentifier>>;

    /// Replace a document's data and metadata
    async fn write_document(
        &self,
        identifier: &ResourceIdentifier,
        data: DataPayload,
        metadata: &RepresentationMetadata,
    ) -> StoreResult<()>;

    /// Create a container if absent and write its own metadata; existing
    /// children are untouched
    async fn write_container(
        &self,
        identifier: &ResourceIdentifier,
        metadata: &RepresentationMetadata,
    ) -> StoreResult<()>;

    /// Remove one resource and its metadata artifact. Never recurses.
    async fn delete_resource(&self, identifier: &ResourceIdentifier) -> StoreResult<()>;
}

/// Quads worth persisting from incoming metadata.
///
/// Derived facts (content type, size, timestamps, containment, LDP type
/// triples) and store directives are recomputed or re-synthesized on read,
/// so writing them would store them twice.
pub(crate) fn persistable_quads(metadata: &RepresentationMetadata) -> Vec<Quad> {
    let subject = Subject::NamedNode(metadata.identifier().clone());
    metadata
        .quads()
        .iter()
        .filter(|quad| quad.subject == subject)
        .filter(|quad| !is_derived_predicate(&quad.predicate))
        .filter(|quad| {
            !(quad.predicate == *vocab::rdf::TYPE
                && matches!(&quad.object, oxrdf::Term::NamedNode(n) if n.as_str().starts_with("http://www.w3.org/ns/ldp#")))
        })
        .cloned()
        .collect()
}

fn is_derived_predicate(predicate: &NamedNode) -> bool {
    predicate == &*vocab::ma::FORMAT
        || predicate == &*vocab::posix::SIZE
        || predicate == &*vocab::posix::MTIME
        || predicate == &*vocab::dc::MODIFIED
        || predicate == &*vocab::ldp::CONTAINS
        || predicate == &*vocab::directive::SLUG
}

/// Stamp the LDP type triples of a container onto its metadata
pub(crate) fn add_container_types(metadata: &mut RepresentationMetadata) {
    metadata.add(vocab::rdf::TYPE.clone(), vocab::ldp::RESOURCE.clone());
    metadata.add(vocab::rdf::TYPE.clone(), vocab::ldp::CONTAINER.clone());
    metadata.add(vocab::rdf::TYPE.clone(), vocab::ldp::BASIC_CONTAINER.clone());
}

/// Stamp a containment triple plus minimal type triples for one child
pub(crate) fn add_child_triples(metadata: &mut RepresentationMetadata, child: &ResourceIdentifier) {
    let child_node = NamedNode::new_unchecked(child.as_str());
    metadata.add(
        vocab::ldp::CONTAINS.clone(),
        oxrdf::Term::NamedNode(child_node.clone()),
    );
    metadata.add_quad(
        child_node.clone(),
        vocab::rdf::TYPE.clone(),
        vocab::ldp::RESOURCE.clone(),
    );
    if child.is_container() {
        metadata.add_quad(
            child_node.clone(),
            vocab::rdf::TYPE.clone(),
            vocab::ldp::CONTAINER.clone(),
        );
        metadata.add_quad(
            child_node,
            vocab::rdf::TYPE.clone(),
            vocab::ldp::BASIC_CONTAINER.clone(),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxrdf::{Literal, Term};

    #[test]
    fn test_persistable_quads_strip_derived_facts() {
        let id = ResourceIdentifier::new("http://x/doc");
        let mut metadata = RepresentationMetadata::new(&id);
        metadata.set_content_type("text/plain");
        metadata.add(
            vocab::posix::SIZE.clone(),
            Term::Literal(Literal::new_typed_literal("5", vocab::xsd::INTEGER.clone())),
        );
        metadata.add(
            NamedNode::new_unchecked("http://example.org/label"),
            Term::Literal(Literal::new_simple_literal("kept")),
        );

        let quads = persistable_quads(&metadata);
        assert_eq!(quads.len(), 1);
        assert_eq!(quads[0].predicate.as_str(), "http://example.org/label");
    }

    #[test]
    fn test_persistable_quads_drop_foreign_subjects() {
        let id = ResourceIdentifier::new("http://x/c/");
        let mut metadata = RepresentationMetadata::new(&id);
        add_child_triples(&mut metadata, &ResourceIdentifier::new("http://x/c/doc"));

        assert!(persistable_quads(&metadata).is_empty());
    }
}
