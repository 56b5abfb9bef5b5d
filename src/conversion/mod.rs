//! Representation format conversion
//!
//! Narrow converters each declare one (source, target) content-type pair;
//! a chain selects the first converter whose pair matches. The chain knows
//! no RDF syntax itself.

pub mod jsonld;
pub mod turtle;

use crate::error::{StoreError, StoreResult};
use crate::model::Representation;
use async_trait::async_trait;

pub use jsonld::QuadsToJsonLdConverter;
pub use turtle::{QuadsToNTriplesConverter, QuadsToTurtleConverter, TurtleToQuadsConverter};

/// Content type of the canonical internal form (RDF quads)
pub const INTERNAL_QUADS: &str = "internal/quads";
/// Turtle
pub const TEXT_TURTLE: &str = "text/turtle";
/// JSON-LD
pub const APPLICATION_LD_JSON: &str = "application/ld+json";
/// N-Triples
pub const APPLICATION_N_TRIPLES: &str = "application/n-triples";

/// A converter between exactly one pair of representation formats
#[async_trait]
pub trait RepresentationConverter: Send + Sync {
    /// Whether this converter handles the given (source, target) pair
    fn supports(&self, source: &str, target: &str) -> bool;

    /// Convert the representation.
    ///
    /// The input is guaranteed to carry the source content type this
    /// converter declared; the output carries the target content type.
    async fn convert(&self, representation: Representation) -> StoreResult<Representation>;
}

/// An ordered chain of converters; first declared match wins
pub struct ConverterChain {
    converters: Vec<Box<dyn RepresentationConverter>>,
}

impl ConverterChain {
    /// Build a chain from explicit converters
    pub fn new(converters: Vec<Box<dyn RepresentationConverter>>) -> Self {
        Self { converters }
    }

    /// The chain covering the formats this crate ships
    pub fn standard() -> Self {
        Self::new(vec![
            Box::new(TurtleToQuadsConverter),
            Box::new(QuadsToTurtleConverter),
            Box::new(QuadsToNTriplesConverter),
            Box::new(QuadsToJsonLdConverter),
        ])
    }

    /// Whether any converter handles the given pair
    pub fn has_converter(&self, source: &str, target: &str) -> bool {
        self.converters
            .iter()
            .any(|converter| converter.supports(source, target))
    }

    /// Convert a representation to the target content type.
    ///
    /// A representation already in the target type passes through untouched.
    pub async fn convert(
        &self,
        representation: Representation,
        target: &str,
    ) -> StoreResult<Representation> {
        let source = representation.metadata.content_type().ok_or_else(|| {
            StoreError::UnsupportedMediaType(
                "representation carries no content type to convert from".to_string(),
            )
        })?;

        if source == target || target == "*/*" {
            return Ok(representation);
        }

        for converter in &self.converters {
            if converter.supports(&source, target) {
                return converter.convert(representation).await;
            }
        }

        Err(StoreError::UnsupportedMediaType(format!(
            "no converter from {} to {}",
            source, target
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{RepresentationMetadata, ResourceIdentifier};

    fn quad_rep() -> Representation {
        let mut metadata =
            RepresentationMetadata::new(&ResourceIdentifier::new("http://x/doc"));
        metadata.set_content_type(INTERNAL_QUADS);
        Representation::quads(metadata, Vec::new())
    }

    #[tokio::test]
    async fn test_passthrough_on_same_type() {
        let chain = ConverterChain::standard();
        let rep = chain.convert(quad_rep(), INTERNAL_QUADS).await.unwrap();
        assert_eq!(rep.metadata.content_type().as_deref(), Some(INTERNAL_QUADS));
    }

    #[tokio::test]
    async fn test_unknown_pair_is_unsupported() {
        let chain = ConverterChain::standard();
        let err = chain.convert(quad_rep(), "image/png").await.unwrap_err();
        assert_eq!(err.status_code(), 415);
    }

    #[tokio::test]
    async fn test_missing_source_type_is_unsupported() {
        let metadata =
            RepresentationMetadata::new(&ResourceIdentifier::new("http://x/doc"));
        let rep = Representation::quads(metadata, Vec::new());

        let chain = ConverterChain::standard();
        assert!(chain.convert(rep, TEXT_TURTLE).await.is_err());
    }
}
