//! Representation metadata
//!
//! A mutable RDF quad set keyed by the resource's identifier as subject.
//! Backend-intrinsic facts (content type, size, modification time) and
//! containment triples all travel through this type.

use super::identifier::ResourceIdentifier;
use super::vocab;
use crate::error::{StoreError, StoreResult};
use oxrdf::{GraphName, Literal, NamedNode, Quad, Subject, Term};

/// Metadata attached to a representation
#[derive(Debug, Clone)]
pub struct RepresentationMetadata {
    /// Subject the predicate-level accessors operate on
    identifier: NamedNode,
    /// All quads, including ones about other subjects (e.g. contained children)
    quads: Vec<Quad>,
}

impl RepresentationMetadata {
    /// Create empty metadata for a resource
    pub fn new(identifier: &ResourceIdentifier) -> Self {
        Self {
            identifier: NamedNode::new_unchecked(identifier.as_str()),
            quads: Vec::new(),
        }
    }

    /// Create metadata from an existing quad set
    pub fn with_quads(identifier: &ResourceIdentifier, quads: Vec<Quad>) -> Self {
        Self {
            identifier: NamedNode::new_unchecked(identifier.as_str()),
            quads,
        }
    }

    /// The subject this metadata describes
    pub fn identifier(&self) -> &NamedNode {
        &self.identifier
    }

    /// Add a quad about this resource (default graph)
    pub fn add(&mut self, predicate: NamedNode, object: impl Into<Term>) {
        self.quads.push(Quad::new(
            self.identifier.clone(),
            predicate,
            object,
            GraphName::DefaultGraph,
        ));
    }

    /// Add a quad about an arbitrary subject (default graph)
    pub fn add_quad(&mut self, subject: impl Into<Subject>, predicate: NamedNode, object: impl Into<Term>) {
        self.quads
            .push(Quad::new(subject, predicate, object, GraphName::DefaultGraph));
    }

    /// Replace all values of a predicate on this resource with one value
    pub fn set(&mut self, predicate: NamedNode, object: impl Into<Term>) {
        self.remove_all(&predicate);
        self.add(predicate, object);
    }

    /// Remove one specific quad about this resource
    pub fn remove(&mut self, predicate: &NamedNode, object: &Term) {
        let subject = Subject::NamedNode(self.identifier.clone());
        self.quads.retain(|q| {
            !(q.subject == subject && &q.predicate == predicate && &q.object == object)
        });
    }

    /// Remove all values of a predicate on this resource
    pub fn remove_all(&mut self, predicate: &NamedNode) {
        let subject = Subject::NamedNode(self.identifier.clone());
        self.quads
            .retain(|q| !(q.subject == subject && &q.predicate == predicate));
    }

    /// All values of a predicate on this resource
    pub fn values(&self, predicate: &NamedNode) -> Vec<&Term> {
        let subject = Subject::NamedNode(self.identifier.clone());
        self.quads
            .iter()
            .filter(|q| q.subject == subject && &q.predicate == predicate)
            .map(|q| &q.object)
            .collect()
    }

    /// The single value of a functional predicate on this resource.
    ///
    /// Asking for a scalar on a predicate that holds more than one value is
    /// a caller bug and fails loudly rather than picking one arbitrarily.
    pub fn get(&self, predicate: &NamedNode) -> StoreResult<Option<&Term>> {
        let values = self.values(predicate);
        match values.len() {
            0 => Ok(None),
            1 => Ok(Some(values[0])),
            n => Err(StoreError::Backend(format!(
                "metadata predicate {} has {} values on {}, expected at most one",
                predicate, n, self.identifier
            ))),
        }
    }

    /// The representation's content type, if recorded
    pub fn content_type(&self) -> Option<String> {
        self.values(&vocab::ma::FORMAT)
            .first()
            .and_then(|term| match term {
                Term::Literal(lit) => Some(lit.value().to_string()),
                _ => None,
            })
    }

    /// Record the representation's content type
    pub fn set_content_type(&mut self, content_type: impl Into<String>) {
        self.set(
            vocab::ma::FORMAT.clone(),
            Literal::new_simple_literal(content_type.into()),
        );
    }

    /// Whether this resource carries a given `rdf:type`
    pub fn has_type(&self, class: &NamedNode) -> bool {
        self.values(&vocab::rdf::TYPE)
            .iter()
            .any(|term| matches!(term, Term::NamedNode(n) if n == class))
    }

    /// All quads in this metadata
    pub fn quads(&self) -> &[Quad] {
        &self.quads
    }

    /// Consume into the underlying quad set
    pub fn into_quads(self) -> Vec<Quad> {
        self.quads
    }

    /// Merge another quad set into this one
    pub fn extend(&mut self, quads: impl IntoIterator<Item = Quad>) {
        self.quads.extend(quads);
    }

    /// The same metadata re-keyed to another identifier. Quads about the
    /// old subject follow it; quads about other subjects are kept as-is.
    pub fn rekey(&self, identifier: &ResourceIdentifier) -> RepresentationMetadata {
        let new_subject = NamedNode::new_unchecked(identifier.as_str());
        let old_subject = Subject::NamedNode(self.identifier.clone());
        let quads = self
            .quads
            .iter()
            .map(|q| {
                if q.subject == old_subject {
                    Quad::new(
                        new_subject.clone(),
                        q.predicate.clone(),
                        q.object.clone(),
                        q.graph_name.clone(),
                    )
                } else {
                    q.clone()
                }
            })
            .collect();
        RepresentationMetadata {
            identifier: new_subject,
            quads,
        }
    }
}
