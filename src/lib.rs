//! Kosha Linked Data Platform resource store
//!
//! A pluggable storage engine exposing a uniform CRUD+PATCH contract over
//! resources identified by IRIs, with radically different physical backends
//! behind one interface.
//!
//! # Architecture
//!
//! The crate is a composition stack, leaves first:
//!
//! - `mapping` — identifier ↔ physical location mapping, with content types
//!   encoded in file extensions (`$.<ext>` scheme)
//! - `accessor` — raw backend CRUD: filesystem, in-memory tree, SPARQL
//!   endpoint
//! - `store` — the `ResourceStore` contract: an accessor-based core plus
//!   locking, converting, patching, and routing decorators
//! - `locking` — per-identifier FIFO mutual exclusion
//! - `conversion` — representation format converters (Turtle, N-Triples,
//!   JSON-LD) around the canonical quad form
//! - `patch` — SPARQL Update parsing and application
//!
//! # Example
//!
//! ```no_run
//! use kosha::{ResourceIdentifier, RepresentationPreferences, ResourceStore, StoreConfig};
//!
//! # async fn demo() -> kosha::StoreResult<()> {
//! let config = StoreConfig::from_yaml(
//!     r#"
//! base_url: "http://localhost:3000/"
//! backend:
//!   type: memory
//! "#,
//! )?;
//! let store = config.build().await?;
//!
//! let root = ResourceIdentifier::new("http://localhost:3000/");
//! let representation = store
//!     .get_representation(&root, &RepresentationPreferences::with_content_type("text/turtle"))
//!     .await?;
//! # let _ = representation;
//! # Ok(())
//! # }
//! ```

#![allow(missing_docs)]
#![warn(clippy::all)]

pub mod accessor;
pub mod config;
pub mod conversion;
pub mod error;
pub mod locking;
pub mod mapping;
pub mod model;
pub mod patch;
pub mod store;

// Re-export main types for convenience
pub use accessor::{DataAccessor, FileDataAccessor, InMemoryDataAccessor, SparqlDataAccessor};

pub use config::{BackendConfig, StoreConfig};

pub use conversion::{ConverterChain, RepresentationConverter, INTERNAL_QUADS, TEXT_TURTLE};

pub use error::{StoreError, StoreResult};

pub use locking::{MemoryResourceLocker, ResourceLock, ResourceLocker};

pub use mapping::{ExtensionBasedMapper, ResourceLink};

pub use model::{
    Conditions, Data, DataPayload, Representation, RepresentationMetadata,
    RepresentationPreferences, ResourceIdentifier,
};

pub use patch::SparqlUpdatePatch;

pub use store::{
    ConvertingResourceStore, DataAccessorBasedStore, LockingResourceStore, PatchingResourceStore,
    ResourceStore, RoutingResourceStore, RoutingRule,
};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get version string
pub fn version() -> &'static str {
    VERSION
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!version().is_empty());
    }
}
