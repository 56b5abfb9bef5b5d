//! Locking store decorator
//!
//! Serializes every operation per identifier through a [`ResourceLocker`].
//! The lock is held as a guard across the delegated call, so it is released
//! on every exit path, including errors. Any deployment with concurrent
//! writers needs this decorator for correctness, not just performance.

use super::ResourceStore;
use crate::error::StoreResult;
use crate::locking::ResourceLocker;
use crate::model::{Conditions, Representation, RepresentationPreferences, ResourceIdentifier};
use crate::patch::SparqlUpdatePatch;
use async_trait::async_trait;
use std::sync::Arc;

/// Decorator serializing per-identifier access to the wrapped store
pub struct LockingResourceStore {
    source: Arc<dyn ResourceStore>,
    locker: Arc<dyn ResourceLocker>,
}

impl LockingResourceStore {
    /// Wrap a store with a locker
    pub fn new(source: Arc<dyn ResourceStore>, locker: Arc<dyn ResourceLocker>) -> Self {
        Self { source, locker }
    }
}

#[async_trait]
impl ResourceStore for LockingResourceStore {
    async fn get_representation(
        &self,
        identifier: &ResourceIdentifier,
        preferences: &RepresentationPreferences,
    ) -> StoreResult<Representation> {
        let _lock = self.locker.acquire(identifier).await;
        self.source.get_representation(identifier, preferences).await
    }

    async fn add_resource(
        &self,
        container: &ResourceIdentifier,
        representation: Representation,
        conditions: Option<&Conditions>,
    ) -> StoreResult<ResourceIdentifier> {
        // Creation mutates the container's containment listing
        let _lock = self.locker.acquire(container).await;
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
        let _lock = self.locker.acquire(identifier).await;
        self.source
            .set_representation(identifier, representation, conditions)
            .await
    }

    async fn delete_resource(
        &self,
        identifier: &ResourceIdentifier,
        conditions: Option<&Conditions>,
    ) -> StoreResult<()> {
        let _lock = self.locker.acquire(identifier).await;
        self.source.delete_resource(identifier, conditions).await
    }

    async fn modify_resource(
        &self,
        identifier: &ResourceIdentifier,
        patch: SparqlUpdatePatch,
        conditions: Option<&Conditions>,
    ) -> StoreResult<()> {
        let _lock = self.locker.acquire(identifier).await;
        self.source.modify_resource(identifier, patch, conditions).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accessor::InMemoryDataAccessor;
    use crate::locking::MemoryResourceLocker;
    use crate::model::RepresentationMetadata;
    use crate::store::DataAccessorBasedStore;

    fn locked_store() -> (LockingResourceStore, Arc<MemoryResourceLocker>) {
        let inner = DataAccessorBasedStore::new(
            Arc::new(InMemoryDataAccessor::new("http://x/")),
            "http://x/",
        );
        let locker = Arc::new(MemoryResourceLocker::new());
        (
            LockingResourceStore::new(Arc::new(inner), locker.clone()),
            locker,
        )
    }

    fn rep(id: &str, bytes: &'static [u8]) -> Representation {
        let mut metadata = RepresentationMetadata::new(&ResourceIdentifier::new(id));
        metadata.set_content_type("text/plain");
        Representation::from_bytes(metadata, bytes.to_vec())
    }

    #[tokio::test]
    async fn test_lock_released_after_success() {
        let (store, locker) = locked_store();
        let id = ResourceIdentifier::new("http://x/doc");

        store
            .set_representation(&id, rep("http://x/doc", b"x"), None)
            .await
            .unwrap();

        // A leaked lock would park this acquire forever
        locker.acquire(&id).await.release();
    }

    #[tokio::test]
    async fn test_lock_released_after_error() {
        let (store, locker) = locked_store();
        let missing = ResourceIdentifier::new("http://x/absent");

        assert!(store
            .get_representation(&missing, &RepresentationPreferences::default())
            .await
            .is_err());

        locker.acquire(&missing).await.release();
    }

    #[tokio::test]
    async fn test_concurrent_writes_to_same_identifier_serialize() {
        let (store, _locker) = locked_store();
        let store = Arc::new(store);
        let id = ResourceIdentifier::new("http://x/doc");

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            let id = id.clone();
            handles.push(tokio::spawn(async move {
                store
                    .set_representation(&id, rep("http://x/doc", b"racer"), None)
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
    }
}
