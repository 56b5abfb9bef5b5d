//! Patching store decorator
//!
//! Adds partial-update support as lock → read → apply → write. The three
//! steps are not atomic at the accessor level; atomicity comes entirely
//! from the lock held across them. When the wrapped store implements
//! `modify_resource` itself, the patch is delegated instead.

use super::ResourceStore;
use crate::conversion::INTERNAL_QUADS;
use crate::error::{StoreError, StoreResult};
use crate::locking::ResourceLocker;
use crate::model::{
    Conditions, Representation, RepresentationMetadata, RepresentationPreferences,
    ResourceIdentifier,
};
use crate::patch::SparqlUpdatePatch;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

/// Decorator implementing `modify_resource` on top of read and write
pub struct PatchingResourceStore {
    source: Arc<dyn ResourceStore>,
    /// Lock provider for the read-modify-write window. `None` when an
    /// enclosing locking decorator already serializes `modify_resource`.
    locker: Option<Arc<dyn ResourceLocker>>,
}

impl PatchingResourceStore {
    /// For use inside a locking decorator: the patch window relies on the
    /// outer per-identifier lock
    pub fn new(source: Arc<dyn ResourceStore>) -> Self {
        Self {
            source,
            locker: None,
        }
    }

    /// Standalone use: the store takes its own lock around each patch
    pub fn with_locker(source: Arc<dyn ResourceStore>, locker: Arc<dyn ResourceLocker>) -> Self {
        Self {
            source,
            locker: Some(locker),
        }
    }

    async fn apply_patch(
        &self,
        identifier: &ResourceIdentifier,
        patch: &SparqlUpdatePatch,
        conditions: Option<&Conditions>,
    ) -> StoreResult<()> {
        let preferences = RepresentationPreferences::with_content_type(INTERNAL_QUADS);
        let current = self.source.get_representation(identifier, &preferences).await;

        let (metadata, mut quads) = match current {
            Ok(mut representation) => {
                let quads = representation.data.consume()?.into_quads().map_err(|_| {
                    StoreError::UnsupportedMediaType(format!(
                        "{} does not hold RDF data and cannot be patched",
                        identifier
                    ))
                })?;
                (representation.metadata, quads)
            }
            // PATCH-create: an insert-only patch may start from nothing
            Err(e) if e.is_not_found() && patch.is_insert_only() => {
                debug!("Patch creates {}", identifier);
                (RepresentationMetadata::new(identifier), Vec::new())
            }
            Err(e) => return Err(e),
        };

        // Failure here leaves the stored resource untouched
        patch.apply(&mut quads)?;

        let mut metadata = metadata;
        metadata.set_content_type(INTERNAL_QUADS);
        let patched = Representation::quads(metadata, quads);
        self.source
            .set_representation(identifier, patched, conditions)
            .await?;

        info!("Patched {}", identifier);
        Ok(())
    }
}

#[async_trait]
impl ResourceStore for PatchingResourceStore {
    async fn get_representation(
        &self,
        identifier: &ResourceIdentifier,
        preferences: &RepresentationPreferences,
    ) -> StoreResult<Representation> {
        self.source.get_representation(identifier, preferences).await
    }

    async fn add_resource(
        &self,
        container: &ResourceIdentifier,
        representation: Representation,
        conditions: Option<&Conditions>,
    ) -> StoreResult<ResourceIdentifier> {
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
        // A store that patches natively wins over the emulation
        match self
            .source
            .modify_resource(identifier, patch.clone(), conditions)
            .await
        {
            Err(StoreError::MethodNotAllowed(_)) => {}
            other => return other,
        }

        match &self.locker {
            Some(locker) => {
                let _lock = locker.acquire(identifier).await;
                self.apply_patch(identifier, &patch, conditions).await
            }
            None => self.apply_patch(identifier, &patch, conditions).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accessor::{DataAccessor, SparqlDataAccessor};
    use crate::locking::MemoryResourceLocker;
    use crate::store::DataAccessorBasedStore;
    use oxrdf::{GraphName, Literal, NamedNode, Quad};
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Quad-capable store stub over a shared map, standing in for a
    /// SPARQL-backed deployment in patch tests
    struct QuadStoreStub {
        resources: Mutex<HashMap<String, Vec<Quad>>>,
    }

    impl QuadStoreStub {
        fn new() -> Self {
            Self {
                resources: Mutex::new(HashMap::new()),
            }
        }
    }

    #[async_trait]
    impl ResourceStore for QuadStoreStub {
        async fn get_representation(
            &self,
            identifier: &ResourceIdentifier,
            _preferences: &RepresentationPreferences,
        ) -> StoreResult<Representation> {
            let resources = self.resources.lock().unwrap();
            let quads = resources
                .get(identifier.as_str())
                .ok_or_else(|| StoreError::NotFound(identifier.to_string()))?
                .clone();
            let mut metadata = RepresentationMetadata::new(identifier);
            metadata.set_content_type(INTERNAL_QUADS);
            Ok(Representation::quads(metadata, quads))
        }

        async fn add_resource(
            &self,
            container: &ResourceIdentifier,
            _representation: Representation,
            _conditions: Option<&Conditions>,
        ) -> StoreResult<ResourceIdentifier> {
            Err(StoreError::NotFound(container.to_string()))
        }

        async fn set_representation(
            &self,
            identifier: &ResourceIdentifier,
            mut representation: Representation,
            _conditions: Option<&Conditions>,
        ) -> StoreResult<()> {
            let quads = representation.data.consume()?.into_quads()?;
            self.resources
                .lock()
                .unwrap()
                .insert(identifier.to_string(), quads);
            Ok(())
        }

        async fn delete_resource(
            &self,
            identifier: &ResourceIdentifier,
            _conditions: Option<&Conditions>,
        ) -> StoreResult<()> {
            Err(StoreError::NotFound(identifier.to_string()))
        }

        async fn modify_resource(
            &self,
            identifier: &ResourceIdentifier,
            _patch: SparqlUpdatePatch,
            _conditions: Option<&Conditions>,
        ) -> StoreResult<()> {
            Err(StoreError::MethodNotAllowed(identifier.to_string()))
        }
    }

    fn quad(s: &str, p: &str, o: &str) -> Quad {
        Quad::new(
            NamedNode::new_unchecked(s),
            NamedNode::new_unchecked(p),
            Literal::new_simple_literal(o),
            GraphName::DefaultGraph,
        )
    }

    fn patching_store() -> (PatchingResourceStore, Arc<QuadStoreStub>) {
        let stub = Arc::new(QuadStoreStub::new());
        let locker = Arc::new(MemoryResourceLocker::new());
        (
            PatchingResourceStore::with_locker(stub.clone(), locker),
            stub,
        )
    }

    #[tokio::test]
    async fn test_patch_modifies_existing_resource() {
        let (store, stub) = patching_store();
        let id = ResourceIdentifier::new("http://x/doc");
        stub.resources.lock().unwrap().insert(
            id.to_string(),
            vec![quad("http://x/doc", "http://example.org/p", "old")],
        );

        let patch = SparqlUpdatePatch::parse(
            r#"DELETE DATA { <http://x/doc> <http://example.org/p> "old" };
               INSERT DATA { <http://x/doc> <http://example.org/p> "new" }"#,
        )
        .unwrap();
        store.modify_resource(&id, patch, None).await.unwrap();

        let stored = stub.resources.lock().unwrap()[id.as_str()].clone();
        assert_eq!(stored, vec![quad("http://x/doc", "http://example.org/p", "new")]);
    }

    #[tokio::test]
    async fn test_insert_only_patch_creates_missing_resource() {
        let (store, stub) = patching_store();
        let id = ResourceIdentifier::new("http://x/fresh");

        let patch = SparqlUpdatePatch::parse(
            r#"INSERT DATA { <http://x/fresh> <http://example.org/p> "v" }"#,
        )
        .unwrap();
        store.modify_resource(&id, patch, None).await.unwrap();

        assert!(stub.resources.lock().unwrap().contains_key(id.as_str()));
    }

    #[tokio::test]
    async fn test_deleting_patch_on_missing_resource_is_not_found() {
        let (store, _stub) = patching_store();
        let id = ResourceIdentifier::new("http://x/absent");

        let patch = SparqlUpdatePatch::parse(
            r#"DELETE DATA { <http://x/absent> <http://example.org/p> "v" }"#,
        )
        .unwrap();
        let err = store.modify_resource(&id, patch, None).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_failed_patch_commits_nothing() {
        let (store, stub) = patching_store();
        let id = ResourceIdentifier::new("http://x/doc");
        let original = vec![quad("http://x/doc", "http://example.org/p", "v")];
        stub.resources
            .lock()
            .unwrap()
            .insert(id.to_string(), original.clone());

        // Second operation fails after the first succeeded in memory
        let patch = SparqlUpdatePatch::parse(
            r#"INSERT DATA { <http://x/doc> <http://example.org/extra> "x" };
               DELETE DATA { <http://x/doc> <http://example.org/p> "missing" }"#,
        )
        .unwrap();
        let err = store.modify_resource(&id, patch, None).await.unwrap_err();
        assert_eq!(err.status_code(), 409);

        // The stored quads are exactly as before
        assert_eq!(stub.resources.lock().unwrap()[id.as_str()], original);
    }

    #[tokio::test]
    async fn test_patch_over_accessor_store_falls_back_to_emulation() {
        // End to end against the real accessor-based store: its own
        // modify_resource refuses, the decorator emulates
        let accessor: Arc<dyn DataAccessor> = Arc::new(SparqlDataAccessor::new(
            "http://localhost:9/never-reached",
            "http://x/",
        )
        .unwrap());
        let inner = DataAccessorBasedStore::new(accessor, "http://x/");
        let locker = Arc::new(MemoryResourceLocker::new());
        let store = PatchingResourceStore::with_locker(Arc::new(inner), locker);

        let id = ResourceIdentifier::new("http://x/doc");
        let patch = SparqlUpdatePatch::parse(
            r#"INSERT DATA { <http://x/doc> <http://example.org/p> "v" }"#,
        )
        .unwrap();

        // The endpoint is unreachable, so the read fails with a backend
        // error rather than MethodNotAllowed, proving delegation happened
        let err = store.modify_resource(&id, patch, None).await.unwrap_err();
        assert_eq!(err.status_code(), 500);
    }
}
