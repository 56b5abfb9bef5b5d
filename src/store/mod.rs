//! The `ResourceStore` contract and its composable decorators
//!
//! A concrete accessor-based store sits at the center; decorators wrap it
//! to add locking, format conversion, partial updates, and routing. Each
//! decorator owns its wrapped store and forwards the operations it does
//! not modify.

pub mod accessor_store;
pub mod converting;
pub mod locking;
pub mod patching;
pub mod routing;

use crate::error::StoreResult;
use crate::model::{Conditions, Representation, RepresentationPreferences, ResourceIdentifier};
use crate::patch::SparqlUpdatePatch;
use async_trait::async_trait;

pub use accessor_store::DataAccessorBasedStore;
pub use converting::ConvertingResourceStore;
pub use locking::LockingResourceStore;
pub use patching::PatchingResourceStore;
pub use routing::{RoutingResourceStore, RoutingRule};

/// Uniform CRUD+PATCH over resources identified by IRIs
#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// Retrieve a resource's representation
    async fn get_representation(
        &self,
        identifier: &ResourceIdentifier,
        preferences: &RepresentationPreferences,
    ) -> StoreResult<Representation>;

    /// Create a new resource inside a container, returning its identifier
    async fn add_resource(
        &self,
        container: &ResourceIdentifier,
        representation: Representation,
        conditions: Option<&Conditions>,
    ) -> StoreResult<ResourceIdentifier>;

    /// Replace (or create) the resource at an identifier
    async fn set_representation(
        &self,
        identifier: &ResourceIdentifier,
        representation: Representation,
        conditions: Option<&Conditions>,
    ) -> StoreResult<()>;

    /// Delete the resource at an identifier
    async fn delete_resource(
        &self,
        identifier: &ResourceIdentifier,
        conditions: Option<&Conditions>,
    ) -> StoreResult<()>;

    /// Partially update the resource at an identifier
    async fn modify_resource(
        &self,
        identifier: &ResourceIdentifier,
        patch: SparqlUpdatePatch,
        conditions: Option<&Conditions>,
    ) -> StoreResult<()>;
}
