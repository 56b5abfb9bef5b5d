//! Converting store decorator
//!
//! Converts outgoing representations into the content type the caller
//! prefers and incoming representations into the backend's canonical
//! storage type. All syntax knowledge lives in the converter chain; this
//! decorator only orchestrates selection.

use super::ResourceStore;
use crate::conversion::ConverterChain;
use crate::error::StoreResult;
use crate::model::{Conditions, Representation, RepresentationPreferences, ResourceIdentifier};
use crate::patch::SparqlUpdatePatch;
use async_trait::async_trait;
use std::sync::Arc;

/// Decorator translating representation formats at the store boundary
pub struct ConvertingResourceStore {
    source: Arc<dyn ResourceStore>,
    chain: ConverterChain,
    /// Canonical type incoming representations are converted to before
    /// writes, `None` to store whatever arrives
    write_target: Option<String>,
}

impl ConvertingResourceStore {
    /// Wrap a store; writes pass through unconverted
    pub fn new(source: Arc<dyn ResourceStore>, chain: ConverterChain) -> Self {
        Self {
            source,
            chain,
            write_target: None,
        }
    }

    /// Wrap a store that only accepts one canonical storage type
    pub fn with_write_target(
        source: Arc<dyn ResourceStore>,
        chain: ConverterChain,
        write_target: impl Into<String>,
    ) -> Self {
        Self {
            source,
            chain,
            write_target: Some(write_target.into()),
        }
    }

    /// Convert an incoming representation to the canonical storage type
    /// when a converter exists; representations the chain cannot handle
    /// pass through for the backend itself to accept or reject.
    async fn convert_incoming(
        &self,
        representation: Representation,
    ) -> StoreResult<Representation> {
        let Some(target) = &self.write_target else {
            return Ok(representation);
        };
        match representation.metadata.content_type() {
            Some(source) if source != *target && self.chain.has_converter(&source, target) => {
                self.chain.convert(representation, target).await
            }
            _ => Ok(representation),
        }
    }
}

#[async_trait]
impl ResourceStore for ConvertingResourceStore {
    async fn get_representation(
        &self,
        identifier: &ResourceIdentifier,
        preferences: &RepresentationPreferences,
    ) -> StoreResult<Representation> {
        let representation = self
            .source
            .get_representation(identifier, &RepresentationPreferences::default())
            .await?;

        match &preferences.content_type {
            Some(target) => self.chain.convert(representation, target).await,
            None => Ok(representation),
        }
    }

    async fn add_resource(
        &self,
        container: &ResourceIdentifier,
        representation: Representation,
        conditions: Option<&Conditions>,
    ) -> StoreResult<ResourceIdentifier> {
        let representation = self.convert_incoming(representation).await?;
        self.source
            .add_resource(container, representation, conditions)
            .await
    }

    async fn set_representation(
        &self,
        identifier: &ResourceIdentifier,
        representation: Representation,
        conditions: Option<&Conditions>,
    ) -> StoreResult<()> {
        let representation = self.convert_incoming(representation).await?;
        self.source
            .set_representation(identifier, representation, conditions)
            .await
    }

    async fn delete_resource(
        &self,
        identifier: &ResourceIdentifier,
        conditions: Option<&Conditions>,
    ) -> StoreResult<()> {
        self.source.delete_resource(identifier, conditions).await
    }

    async fn modify_resource(
        &self,
        identifier: &ResourceIdentifier,
        patch: SparqlUpdatePatch,
        conditions: Option<&Conditions>,
    ) -> StoreResult<()> {
        self.source.modify_resource(identifier, patch, conditions).await
    }
}
