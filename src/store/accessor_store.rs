//! Data-accessor-based resource store
//!
//! Translates the public `ResourceStore` semantics into `DataAccessor`
//! calls: identifier generation from slugs, containment bookkeeping,
//! ancestor creation, and the structural guards around the root container.

use super::ResourceStore;
use crate::accessor::DataAccessor;
use crate::error::{StoreError, StoreResult};
use crate::model::vocab;
use crate::model::{
    Conditions, Data, Representation, RepresentationMetadata, RepresentationPreferences,
    ResourceIdentifier,
};
use crate::patch::SparqlUpdatePatch;
use async_trait::async_trait;
use oxrdf::Term;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// `ResourceStore` over a single [`DataAccessor`]
pub struct DataAccessorBasedStore {
    accessor: Arc<dyn DataAccessor>,
    base_url: ResourceIdentifier,
}

impl DataAccessorBasedStore {
    /// Create a store for a base IRI over one accessor
    pub fn new(accessor: Arc<dyn DataAccessor>, base_url: impl Into<String>) -> Self {
        let mut base = base_url.into();
        if !base.ends_with('/') {
            base.push('/');
        }
        Self {
            accessor,
            base_url: ResourceIdentifier::new(base),
        }
    }

    /// The root container of this store
    pub fn base_url(&self) -> &ResourceIdentifier {
        &self.base_url
    }

    /// Make sure the root container exists on the backend
    pub async fn initialize(&self) -> StoreResult<()> {
        match self.accessor.get_metadata(&self.base_url).await {
            Ok(_) => Ok(()),
            Err(e) if e.is_not_found() => {
                info!("Bootstrapping root container {}", self.base_url);
                self.accessor
                    .write_container(&self.base_url, &RepresentationMetadata::new(&self.base_url))
                    .await
            }
            Err(e) => Err(e),
        }
    }

    fn check_in_base(&self, identifier: &ResourceIdentifier) -> StoreResult<()> {
        if identifier.relative_to(&self.base_url).is_none() {
            return Err(StoreError::NotFound(identifier.to_string()));
        }
        Ok(())
    }

    async fn exists(&self, identifier: &ResourceIdentifier) -> StoreResult<bool> {
        match self.accessor.get_metadata(identifier).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Create every missing container between the base and `container`,
    /// top-down
    async fn ensure_ancestors(&self, container: &ResourceIdentifier) -> StoreResult<()> {
        let mut chain = Vec::new();
        let mut current = container.clone();
        while current != self.base_url {
            self.check_in_base(&current)?;
            chain.push(current.clone());
            current = current
                .parent()
                .ok_or_else(|| StoreError::NotFound(container.to_string()))?;
        }

        for ancestor in chain.into_iter().rev() {
            if !self.exists(&ancestor).await? {
                debug!("Creating intermediate container {}", ancestor);
                self.accessor
                    .write_container(&ancestor, &RepresentationMetadata::new(&ancestor))
                    .await?;
            }
        }
        Ok(())
    }

    /// Whether the incoming representation asks to be a container
    fn wants_container(metadata: &RepresentationMetadata, slug: Option<&str>) -> bool {
        slug.is_some_and(|s| s.ends_with('/'))
            || metadata.has_type(&vocab::ldp::CONTAINER)
            || metadata.has_type(&vocab::ldp::BASIC_CONTAINER)
    }

    fn slug_of(metadata: &RepresentationMetadata) -> StoreResult<Option<String>> {
        Ok(metadata
            .get(&vocab::directive::SLUG)?
            .and_then(|term| match term {
                Term::Literal(l) => Some(l.value().to_string()),
                _ => None,
            }))
    }

    /// Reduce a client-supplied naming hint to a safe path segment
    fn sanitize_name(raw: &str) -> String {
        raw.trim()
            .trim_matches('/')
            .chars()
            .filter_map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_' | '~') {
                    Some(c)
                } else if c.is_whitespace() {
                    Some('-')
                } else {
                    None
                }
            })
            .collect()
    }
}

#[async_trait]
impl ResourceStore for DataAccessorBasedStore {
    async fn get_representation(
        &self,
        identifier: &ResourceIdentifier,
        _preferences: &RepresentationPreferences,
    ) -> StoreResult<Representation> {
        self.check_in_base(identifier)?;
        let metadata = self.accessor.get_metadata(identifier).await?;

        if identifier.is_container() {
            let quads = metadata.quads().to_vec();
            return Ok(Representation::quads(metadata, quads));
        }

        let payload = self.accessor.get_data(identifier).await?;
        let binary = matches!(payload, crate::model::DataPayload::Binary(_));
        Ok(Representation {
            metadata,
            data: Data::new(payload),
            binary,
        })
    }

    async fn add_resource(
        &self,
        container: &ResourceIdentifier,
        mut representation: Representation,
        _conditions: Option<&Conditions>,
    ) -> StoreResult<ResourceIdentifier> {
        self.check_in_base(container)?;
        if !container.is_container() {
            return Err(StoreError::NotFound(container.to_string()));
        }
        // The target container must already exist
        self.accessor.get_metadata(container).await?;

        let slug = Self::slug_of(&representation.metadata)?;
        let as_container = Self::wants_container(&representation.metadata, slug.as_deref());

        let name = slug
            .as_deref()
            .map(Self::sanitize_name)
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let new_identifier = if as_container {
            ResourceIdentifier::new(format!("{}{}/", container.as_str(), name))
        } else {
            ResourceIdentifier::new(format!("{}{}", container.as_str(), name))
        };

        // No retries: a taken name is the caller's conflict to resolve
        if self.exists(&new_identifier).await? {
            return Err(StoreError::conflict(
                new_identifier.to_string(),
                "a resource with this name already exists",
            ));
        }

        // Incoming metadata is keyed to the container; the stored copy
        // belongs to the resource being created
        let metadata = representation.metadata.rekey(&new_identifier);
        if as_container {
            self.accessor
                .write_container(&new_identifier, &metadata)
                .await?;
        } else {
            self.accessor.can_handle(&representation)?;
            let payload = representation.data.consume()?;
            self.accessor
                .write_document(&new_identifier, payload, &metadata)
                .await?;
        }

        info!("Created {} in {}", new_identifier, container);
        Ok(new_identifier)
    }

    async fn set_representation(
        &self,
        identifier: &ResourceIdentifier,
        mut representation: Representation,
        _conditions: Option<&Conditions>,
    ) -> StoreResult<()> {
        self.check_in_base(identifier)?;

        // The root has no parent: a document can never sit where the root
        // container lives
        if !identifier.is_container() && identifier.to_container() == self.base_url {
            return Err(StoreError::conflict(
                identifier.to_string(),
                "the root of the store can only be a container",
            ));
        }

        let wants_container =
            Self::wants_container(&representation.metadata, None) || identifier.is_container();
        if wants_container != identifier.is_container() {
            return Err(StoreError::conflict(
                identifier.to_string(),
                "representation kind does not match the identifier shape",
            ));
        }

        // A resource of the opposite kind at the same name is a conflict
        let counterpart = if identifier.is_container() {
            identifier.to_document()
        } else {
            identifier.to_container()
        };
        if counterpart.relative_to(&self.base_url).is_some()
            && counterpart != self.base_url
            && self.exists(&counterpart).await?
        {
            return Err(StoreError::conflict(
                identifier.to_string(),
                "a resource of the opposite kind already exists at this identifier",
            ));
        }

        if identifier != &self.base_url {
            let parent = identifier
                .parent()
                .ok_or_else(|| StoreError::NotFound(identifier.to_string()))?;
            self.ensure_ancestors(&parent).await?;
        }

        if identifier.is_container() {
            self.accessor
                .write_container(identifier, &representation.metadata)
                .await?;
        } else {
            self.accessor.can_handle(&representation)?;
            let payload = representation.data.consume()?;
            self.accessor
                .write_document(identifier, payload, &representation.metadata)
                .await?;
        }

        info!("Set representation of {}", identifier);
        Ok(())
    }

    async fn delete_resource(
        &self,
        identifier: &ResourceIdentifier,
        _conditions: Option<&Conditions>,
    ) -> StoreResult<()> {
        self.check_in_base(identifier)?;
        if identifier == &self.base_url {
            return Err(StoreError::MethodNotAllowed(
                "the root container cannot be deleted".to_string(),
            ));
        }

        if identifier.is_container() {
            let children = self.accessor.get_children(identifier).await?;
            if !children.is_empty() {
                return Err(StoreError::conflict(
                    identifier.to_string(),
                    "only empty containers can be deleted",
                ));
            }
        }

        self.accessor.delete_resource(identifier).await
    }

    async fn modify_resource(
        &self,
        identifier: &ResourceIdentifier,
        _patch: SparqlUpdatePatch,
        _conditions: Option<&Conditions>,
    ) -> StoreResult<()> {
        // Partial updates are a decorator concern
        Err(StoreError::MethodNotAllowed(format!(
            "patching {} is not supported by this store",
            identifier
        )))
    }
}
