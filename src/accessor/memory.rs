//! In-memory data accessor
//!
//! A single in-process tree of containers (name → child map) and documents
//! (buffered bytes). The accessor performs no internal locking; concurrent
//! deployments wrap it in the locking store decorator.

use super::{add_child_triples, add_container_types, persistable_quads, DataAccessor};
use crate::conversion::INTERNAL_QUADS;
use crate::error::{StoreError, StoreResult};
use crate::model::vocab;
use crate::model::{DataPayload, Representation, RepresentationMetadata, ResourceIdentifier};
use async_trait::async_trait;
use bytes::Bytes;
use oxrdf::Quad;
use std::collections::BTreeMap;
use std::sync::RwLock;
use tracing::debug;

enum Entry {
    Container {
        metadata: Vec<Quad>,
        children: BTreeMap<String, Entry>,
    },
    Document {
        metadata: Vec<Quad>,
        content_type: Option<String>,
        data: Bytes,
    },
}

impl Entry {
    fn empty_container() -> Self {
        Entry::Container {
            metadata: Vec::new(),
            children: BTreeMap::new(),
        }
    }
}

/// Data accessor over an in-process resource tree
pub struct InMemoryDataAccessor {
    base_url: ResourceIdentifier,
    root: RwLock<Entry>,
}

impl InMemoryDataAccessor {
    /// Create an accessor with an empty root container for `base_url`
    pub fn new(base_url: impl Into<String>) -> Self {
        let mut base = base_url.into();
        if !base.ends_with('/') {
            base.push('/');
        }
        Self {
            base_url: ResourceIdentifier::new(base),
            root: RwLock::new(Entry::empty_container()),
        }
    }

    /// Split an identifier into path segments under the base IRI
    fn segments(&self, identifier: &ResourceIdentifier) -> StoreResult<Vec<String>> {
        let relative = identifier
            .relative_to(&self.base_url)
            .ok_or_else(|| StoreError::NotFound(identifier.to_string()))?;
        let trimmed = relative.trim_end_matches('/');
        if trimmed.is_empty() {
            return Ok(Vec::new());
        }
        if trimmed.split('/').any(str::is_empty) {
            return Err(StoreError::InvalidInput(format!(
                "identifier {} contains an empty path segment",
                identifier
            )));
        }
        Ok(trimmed.split('/').map(str::to_string).collect())
    }

    fn find<'a>(
        mut entry: &'a Entry,
        segments: &[String],
        identifier: &ResourceIdentifier,
    ) -> StoreResult<&'a Entry> {
        for segment in segments {
            match entry {
                Entry::Container { children, .. } => {
                    entry = children
                        .get(segment)
                        .ok_or_else(|| StoreError::NotFound(identifier.to_string()))?;
                }
                // An intermediate document breaks the path
                Entry::Document { .. } => {
                    return Err(StoreError::NotFound(identifier.to_string()))
                }
            }
        }
        Ok(entry)
    }

    fn find_container_mut<'a>(
        mut entry: &'a mut Entry,
        segments: &[String],
        identifier: &ResourceIdentifier,
    ) -> StoreResult<&'a mut BTreeMap<String, Entry>> {
        for segment in segments {
            match entry {
                Entry::Container { children, .. } => {
                    entry = children
                        .get_mut(segment)
                        .ok_or_else(|| StoreError::NotFound(identifier.to_string()))?;
                }
                Entry::Document { .. } => {
                    return Err(StoreError::NotFound(identifier.to_string()))
                }
            }
        }
        match entry {
            Entry::Container { children, .. } => Ok(children),
            Entry::Document { .. } => Err(StoreError::NotFound(identifier.to_string())),
        }
    }
}

#[async_trait]
impl DataAccessor for InMemoryDataAccessor {
    fn can_handle(&self, representation: &Representation) -> StoreResult<()> {
        if representation.binary {
            Ok(())
        } else {
            Err(StoreError::UnsupportedMediaType(
                "the in-memory backend only stores binary representations".to_string(),
            ))
        }
    }

    async fn get_data(&self, identifier: &ResourceIdentifier) -> StoreResult<DataPayload> {
        if identifier.is_container() {
            return Err(StoreError::NotFound(identifier.to_string()));
        }
        let segments = self.segments(identifier)?;

        let root = self.root.read().unwrap();
        match Self::find(&root, &segments, identifier)? {
            Entry::Document { data, .. } => {
                // Buffered at write time, so reads can repeat freely
                Ok(DataPayload::Binary(Box::new(std::io::Cursor::new(
                    data.clone(),
                ))))
            }
            Entry::Container { .. } => Err(StoreError::NotFound(identifier.to_string())),
        }
    }

    async fn get_metadata(
        &self,
        identifier: &ResourceIdentifier,
    ) -> StoreResult<RepresentationMetadata> {
        let segments = self.segments(identifier)?;

        let root = self.root.read().unwrap();
        match Self::find(&root, &segments, identifier)? {
            Entry::Document {
                metadata,
                content_type,
                ..
            } => {
                if identifier.is_container() {
                    return Err(StoreError::NotFound(identifier.to_string()));
                }
                let mut result =
                    RepresentationMetadata::with_quads(identifier, metadata.clone());
                result.add(vocab::rdf::TYPE.clone(), vocab::ldp::RESOURCE.clone());
                if let Some(content_type) = content_type {
                    result.set_content_type(content_type.clone());
                }
                Ok(result)
            }
            Entry::Container { metadata, children } => {
                if !identifier.is_container() {
                    return Err(StoreError::NotFound(identifier.to_string()));
                }
                let mut result =
                    RepresentationMetadata::with_quads(identifier, metadata.clone());
                add_container_types(&mut result);
                result.set_content_type(INTERNAL_QUADS);
                for (name, child) in children {
                    let child_id = match child {
                        Entry::Container { .. } => ResourceIdentifier::new(format!(
                            "{}{}/",
                            identifier.as_str(),
                            name
                        )),
                        Entry::Document { .. } => ResourceIdentifier::new(format!(
                            "{}{}",
                            identifier.as_str(),
                            name
                        )),
                    };
                    add_child_triples(&mut result, &child_id);
                }
                Ok(result)
            }
        }
    }

    async fn get_children(
        &self,
        identifier: &ResourceIdentifier,
    ) -> StoreResult<Vec<ResourceIdentifier>> {
        if !identifier.is_container() {
            return Ok(Vec::new());
        }
        let segments = self.segments(identifier)?;

        let root = self.root.read().unwrap();
        match Self::find(&root, &segments, identifier)? {
            Entry::Container { children, .. } => Ok(children
                .iter()
                .map(|(name, child)| match child {
                    Entry::Container { .. } => {
                        ResourceIdentifier::new(format!("{}{}/", identifier.as_str(), name))
                    }
                    Entry::Document { .. } => {
                        ResourceIdentifier::new(format!("{}{}", identifier.as_str(), name))
                    }
                })
                .collect()),
            Entry::Document { .. } => Err(StoreError::NotFound(identifier.to_string())),
        }
    }

    async fn write_document(
        &self,
        identifier: &ResourceIdentifier,
        data: DataPayload,
        metadata: &RepresentationMetadata,
    ) -> StoreResult<()> {
        if identifier.is_container() {
            return Err(StoreError::InvalidInput(format!(
                "{} is a container identifier, expected a document",
                identifier
            )));
        }
        let segments = self.segments(identifier)?;
        let Some((name, parent_segments)) = segments.split_last() else {
            return Err(StoreError::NotFound(identifier.to_string()));
        };

        // Drain outside the lock; the tree never retains the caller's stream
        let bytes = match data {
            binary @ DataPayload::Binary(_) => binary.into_bytes().await?,
            DataPayload::Quads(_) => {
                return Err(StoreError::UnsupportedMediaType(
                    "the in-memory backend only stores binary representations".to_string(),
                ))
            }
        };

        let mut root = self.root.write().unwrap();
        let children = Self::find_container_mut(&mut root, parent_segments, identifier)?;
        if matches!(children.get(name), Some(Entry::Container { .. })) {
            return Err(StoreError::conflict(
                identifier.to_string(),
                "a container already exists at this identifier",
            ));
        }

        children.insert(
            name.clone(),
            Entry::Document {
                metadata: persistable_quads(metadata),
                content_type: metadata.content_type(),
                data: bytes,
            },
        );
        debug!("Stored document {}", identifier);
        Ok(())
    }

    async fn write_container(
        &self,
        identifier: &ResourceIdentifier,
        metadata: &RepresentationMetadata,
    ) -> StoreResult<()> {
        if !identifier.is_container() {
            return Err(StoreError::InvalidInput(format!(
                "{} is a document identifier, expected a container",
                identifier
            )));
        }
        let segments = self.segments(identifier)?;
        let quads = persistable_quads(metadata);

        let mut root = self.root.write().unwrap();
        let Some((name, parent_segments)) = segments.split_last() else {
            // The root container always exists; only its metadata is replaced
            if let Entry::Container { metadata, .. } = &mut *root {
                *metadata = quads;
            }
            return Ok(());
        };

        let children = Self::find_container_mut(&mut root, parent_segments, identifier)?;
        match children.get_mut(name) {
            Some(Entry::Container { metadata, .. }) => {
                // Idempotent on metadata; children are preserved
                *metadata = quads;
            }
            Some(Entry::Document { .. }) => {
                return Err(StoreError::conflict(
                    identifier.to_string(),
                    "a document already exists at this identifier",
                ));
            }
            None => {
                children.insert(
                    name.clone(),
                    Entry::Container {
                        metadata: quads,
                        children: BTreeMap::new(),
                    },
                );
            }
        }
        debug!("Stored container {}", identifier);
        Ok(())
    }

    async fn delete_resource(&self, identifier: &ResourceIdentifier) -> StoreResult<()> {
        let segments = self.segments(identifier)?;
        let Some((name, parent_segments)) = segments.split_last() else {
            // The root has no parent to delete it from; layers above must
            // have rejected this request already
            debug_assert!(false, "attempted to delete the storage root");
            return Err(StoreError::Backend(
                "the storage root has no parent".to_string(),
            ));
        };

        let mut root = self.root.write().unwrap();
        let children = Self::find_container_mut(&mut root, parent_segments, identifier)?;
        match children.get(name) {
            Some(Entry::Container { .. }) if !identifier.is_container() => {
                return Err(StoreError::NotFound(identifier.to_string()))
            }
            Some(Entry::Document { .. }) if identifier.is_container() => {
                return Err(StoreError::NotFound(identifier.to_string()))
            }
            Some(_) => {
                children.remove(name);
                debug!("Deleted {}", identifier);
                Ok(())
            }
            None => Err(StoreError::NotFound(identifier.to_string())),
        }
    }
}
