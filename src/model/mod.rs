//! Core data model: identifiers, metadata, representations, vocabulary

pub mod identifier;
pub mod metadata;
pub mod representation;
pub mod vocab;

pub use identifier::ResourceIdentifier;
pub use metadata::RepresentationMetadata;
pub use representation::{
    ByteSource, Conditions, Data, DataPayload, Representation, RepresentationPreferences,
};
