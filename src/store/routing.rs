//! Routing store decorator
//!
//! A stateless dispatcher: a rule table maps identifiers onto one of
//! several inner stores and forwards the call unchanged. No locking, no
//! conversion, no state of its own.

use super::ResourceStore;
use crate::error::{StoreError, StoreResult};
use crate::model::{Conditions, Representation, RepresentationPreferences, ResourceIdentifier};
use crate::patch::SparqlUpdatePatch;
use async_trait::async_trait;
use regex::Regex;
use std::sync::Arc;

/// One routing rule; all present constraints must hold for a match
#[derive(Debug, Clone, Default)]
pub struct RoutingRule {
    /// Regex matched against the identifier IRI
    pattern: Option<Regex>,
    /// Constrain to containers (`true`) or documents (`false`)
    container: Option<bool>,
}

impl RoutingRule {
    /// A rule matching every identifier
    pub fn any() -> Self {
        Self::default()
    }

    /// Restrict to identifiers matching a regex
    pub fn with_pattern(mut self, pattern: Regex) -> Self {
        self.pattern = Some(pattern);
        self
    }

    /// Restrict to containers or documents
    pub fn with_container(mut self, container: bool) -> Self {
        self.container = Some(container);
        self
    }

    fn matches(&self, identifier: &ResourceIdentifier) -> bool {
        if let Some(pattern) = &self.pattern {
            if !pattern.is_match(identifier.as_str()) {
                return false;
            }
        }
        if let Some(container) = self.container {
            if identifier.is_container() != container {
                return false;
            }
        }
        true
    }
}

/// Decorator dispatching to inner stores by rule table, first match wins
pub struct RoutingResourceStore {
    routes: Vec<(RoutingRule, Arc<dyn ResourceStore>)>,
}

impl RoutingResourceStore {
    /// Build a router from an ordered rule table
    pub fn new(routes: Vec<(RoutingRule, Arc<dyn ResourceStore>)>) -> Self {
        Self { routes }
    }

    fn route(&self, identifier: &ResourceIdentifier) -> StoreResult<&Arc<dyn ResourceStore>> {
        self.routes
            .iter()
            .find(|(rule, _)| rule.matches(identifier))
            .map(|(_, store)| store)
            .ok_or_else(|| StoreError::NotFound(identifier.to_string()))
    }
}

#[async_trait]
impl ResourceStore for RoutingResourceStore {
    async fn get_representation(
        &self,
        identifier: &ResourceIdentifier,
        preferences: &RepresentationPreferences,
    ) -> StoreResult<Representation> {
        self.route(identifier)?
            .get_representation(identifier, preferences)
            .await
    }

    async fn add_resource(
        &self,
        container: &ResourceIdentifier,
        representation: Representation,
        conditions: Option<&Conditions>,
    ) -> StoreResult<ResourceIdentifier> {
        self.route(container)?
            .add_resource(container, representation, conditions)
            .await
    }

    async fn set_representation(
        &self,
        identifier: &ResourceIdentifier,
        representation: Representation,
        conditions: Option<&Conditions>,
    ) -> StoreResult<()> {
        self.route(identifier)?
            .set_representation(identifier, representation, conditions)
            .await
    }

    async fn delete_resource(
        &self,
        identifier: &ResourceIdentifier,
        conditions: Option<&Conditions>,
    ) -> StoreResult<()> {
        self.route(identifier)?
            .delete_resource(identifier, conditions)
            .await
    }

    async fn modify_resource(
        &self,
        identifier: &ResourceIdentifier,
        patch: SparqlUpdatePatch,
        conditions: Option<&Conditions>,
    ) -> StoreResult<()> {
        self.route(identifier)?
            .modify_resource(identifier, patch, conditions)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accessor::InMemoryDataAccessor;
    use crate::model::RepresentationMetadata;
    use crate::store::DataAccessorBasedStore;

    fn memory_store(base: &str) -> Arc<dyn ResourceStore> {
        Arc::new(DataAccessorBasedStore::new(
            Arc::new(InMemoryDataAccessor::new(base)),
            base,
        ))
    }

    fn rep(id: &str, bytes: &'static [u8]) -> Representation {
        let mut metadata = RepresentationMetadata::new(&ResourceIdentifier::new(id));
        metadata.set_content_type("text/plain");
        Representation::from_bytes(metadata, bytes.to_vec())
    }

    #[tokio::test]
    async fn test_first_matching_rule_wins() {
        let archive = memory_store("http://x/");
        let live = memory_store("http://x/");
        let store = RoutingResourceStore::new(vec![
            (
                RoutingRule::any().with_pattern(Regex::new("^http://x/archive/").unwrap()),
                archive.clone(),
            ),
            (RoutingRule::any(), live.clone()),
        ]);

        // Writes through the router land in the store its rule selects
        store
            .set_representation(
                &ResourceIdentifier::new("http://x/archive/"),
                Representation::quads(
                    RepresentationMetadata::new(&ResourceIdentifier::new("http://x/archive/")),
                    Vec::new(),
                ),
                None,
            )
            .await
            .unwrap();
        store
            .set_representation(
                &ResourceIdentifier::new("http://x/archive/old"),
                rep("http://x/archive/old", b"archived"),
                None,
            )
            .await
            .unwrap();

        assert!(archive
            .get_representation(
                &ResourceIdentifier::new("http://x/archive/old"),
                &RepresentationPreferences::default()
            )
            .await
            .is_ok());
        assert!(live
            .get_representation(
                &ResourceIdentifier::new("http://x/archive/old"),
                &RepresentationPreferences::default()
            )
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_container_constraint() {
        let rule = RoutingRule::any().with_container(true);
        assert!(rule.matches(&ResourceIdentifier::new("http://x/c/")));
        assert!(!rule.matches(&ResourceIdentifier::new("http://x/doc")));
    }

    #[tokio::test]
    async fn test_no_matching_rule_is_not_found() {
        let store = RoutingResourceStore::new(vec![(
            RoutingRule::any().with_pattern(Regex::new("^http://x/only/").unwrap()),
            memory_store("http://x/"),
        )]);

        let err = store
            .get_representation(
                &ResourceIdentifier::new("http://x/other"),
                &RepresentationPreferences::default(),
            )
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
