//! Filesystem data accessor
//!
//! Document data lives in one file; its metadata serializes to Turtle in a
//! sibling `<name>.meta` file. Container metadata lives in `.meta` inside
//! the directory. The metadata sidecar is written before the data file so a
//! failed data write can be rolled back by deleting the fresh sidecar.

use super::{add_child_triples, add_container_types, persistable_quads, DataAccessor};
use crate::conversion::turtle::{parse_turtle, serialize_turtle};
use crate::conversion::INTERNAL_QUADS;
use crate::error::{StoreError, StoreResult};
use crate::mapping::{ExtensionBasedMapper, ResourceLink};
use crate::model::vocab;
use crate::model::{DataPayload, Representation, RepresentationMetadata, ResourceIdentifier};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use oxrdf::{Literal, Term};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

/// Suffix of metadata sidecar files; identifiers colliding with it are
/// rejected so a document can never shadow another resource's metadata
const META_SUFFIX: &str = ".meta";

/// Data accessor over a filesystem subtree
pub struct FileDataAccessor {
    mapper: ExtensionBasedMapper,
}

impl FileDataAccessor {
    /// Create an accessor over the mapper's root
    pub fn new(mapper: ExtensionBasedMapper) -> Self {
        Self { mapper }
    }

    fn meta_path(link: &ResourceLink, is_container: bool) -> PathBuf {
        if is_container {
            link.file_path.join(META_SUFFIX)
        } else {
            let name = link
                .file_path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            link.file_path
                .with_file_name(format!("{}{}", name, META_SUFFIX))
        }
    }

    async fn read_sidecar(
        &self,
        meta_path: &Path,
        identifier: &ResourceIdentifier,
    ) -> StoreResult<Vec<oxrdf::Quad>> {
        match tokio::fs::read_to_string(meta_path).await {
            Ok(text) => parse_turtle(&text, Some(identifier.as_str())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Write the sidecar, or remove it when there is nothing to persist.
    /// Returns whether a sidecar file exists afterwards.
    async fn write_sidecar(
        &self,
        meta_path: &Path,
        metadata: &RepresentationMetadata,
    ) -> StoreResult<bool> {
        let quads = persistable_quads(metadata);
        if quads.is_empty() {
            match tokio::fs::remove_file(meta_path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
            return Ok(false);
        }

        let text = serialize_turtle(&quads)?;
        tokio::fs::write(meta_path, text).await?;
        Ok(true)
    }

    async fn remove_sidecar_best_effort(&self, meta_path: &Path) {
        if let Err(e) = tokio::fs::remove_file(meta_path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Failed to remove metadata sidecar {}: {}", meta_path.display(), e);
            }
        }
    }

    fn add_stat_metadata(metadata: &mut RepresentationMetadata, stat: &std::fs::Metadata) {
        if stat.is_file() {
            metadata.add(
                vocab::posix::SIZE.clone(),
                Term::Literal(Literal::new_typed_literal(
                    stat.len().to_string(),
                    vocab::xsd::INTEGER.clone(),
                )),
            );
        }
        if let Ok(modified) = stat.modified() {
            let modified: DateTime<Utc> = modified.into();
            metadata.add(
                vocab::dc::MODIFIED.clone(),
                Term::Literal(Literal::new_typed_literal(
                    modified.to_rfc3339(),
                    vocab::xsd::DATE_TIME.clone(),
                )),
            );
            metadata.add(
                vocab::posix::MTIME.clone(),
                Term::Literal(Literal::new_typed_literal(
                    modified.timestamp().to_string(),
                    vocab::xsd::INTEGER.clone(),
                )),
            );
        }
    }

    async fn stat(
        &self,
        path: &Path,
        identifier: &ResourceIdentifier,
    ) -> StoreResult<std::fs::Metadata> {
        match tokio::fs::metadata(path).await {
            Ok(stat) => Ok(stat),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(identifier.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl DataAccessor for FileDataAccessor {
    fn can_handle(&self, representation: &Representation) -> StoreResult<()> {
        if representation.binary {
            Ok(())
        } else {
            Err(StoreError::UnsupportedMediaType(
                "the file backend only stores binary representations".to_string(),
            ))
        }
    }

    async fn get_data(&self, identifier: &ResourceIdentifier) -> StoreResult<DataPayload> {
        if identifier.is_container() {
            return Err(StoreError::NotFound(identifier.to_string()));
        }

        let link = self.mapper.map_url_to_file_path(identifier, None).await?;
        let stat = self.stat(&link.file_path, identifier).await?;
        if !stat.is_file() {
            return Err(StoreError::NotFound(identifier.to_string()));
        }

        let file = tokio::fs::File::open(&link.file_path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StoreError::NotFound(identifier.to_string())
            } else {
                StoreError::Io(e)
            }
        })?;
        Ok(DataPayload::Binary(Box::new(file)))
    }

    async fn get_metadata(
        &self,
        identifier: &ResourceIdentifier,
    ) -> StoreResult<RepresentationMetadata> {
        if identifier.is_container() {
            let link = self.mapper.map_url_to_file_path(identifier, None).await?;
            let stat = self.stat(&link.file_path, identifier).await?;
            if !stat.is_dir() {
                return Err(StoreError::NotFound(identifier.to_string()));
            }

            let meta_path = Self::meta_path(&link, true);
            let quads = self.read_sidecar(&meta_path, identifier).await?;
            let mut metadata = RepresentationMetadata::with_quads(identifier, quads);
            add_container_types(&mut metadata);
            Self::add_stat_metadata(&mut metadata, &stat);
            metadata.set_content_type(INTERNAL_QUADS);

            for child in self.get_children(identifier).await? {
                add_child_triples(&mut metadata, &child);
            }
            return Ok(metadata);
        }

        let link = self.mapper.map_url_to_file_path(identifier, None).await?;
        let stat = self.stat(&link.file_path, identifier).await?;
        if !stat.is_file() {
            return Err(StoreError::NotFound(identifier.to_string()));
        }

        let meta_path = Self::meta_path(&link, false);
        let quads = self.read_sidecar(&meta_path, identifier).await?;
        let mut metadata = RepresentationMetadata::with_quads(identifier, quads);
        metadata.add(vocab::rdf::TYPE.clone(), vocab::ldp::RESOURCE.clone());
        Self::add_stat_metadata(&mut metadata, &stat);
        if let Some(content_type) = &link.content_type {
            metadata.set_content_type(content_type.clone());
        }
        Ok(metadata)
    }

    async fn get_children(
        &self,
        identifier: &ResourceIdentifier,
    ) -> StoreResult<Vec<ResourceIdentifier>> {
        if !identifier.is_container() {
            return Ok(Vec::new());
        }

        let link = self.mapper.map_url_to_file_path(identifier, None).await?;
        let mut entries = tokio::fs::read_dir(&link.file_path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StoreError::NotFound(identifier.to_string())
            } else {
                StoreError::Io(e)
            }
        })?;

        let mut children = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if name.ends_with(META_SUFFIX) {
                continue;
            }

            // Device nodes, sockets and the like stay invisible
            let file_type = entry.file_type().await?;
            if !file_type.is_file() && !file_type.is_dir() {
                continue;
            }

            let child = self
                .mapper
                .map_file_path_to_url(&entry.path(), file_type.is_dir())?;
            children.push(child.identifier);
        }
        Ok(children)
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
        let content_type = metadata.content_type().ok_or_else(|| {
            StoreError::InvalidInput("a content type is required to write a document".to_string())
        })?;

        let link = self
            .mapper
            .map_url_to_file_path(identifier, Some(&content_type))
            .await?;

        if link
            .file_path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with(META_SUFFIX))
        {
            return Err(StoreError::conflict(
                identifier.to_string(),
                format!("document names ending in {} are reserved", META_SUFFIX),
            ));
        }

        let mut reader = match data {
            DataPayload::Binary(reader) => reader,
            DataPayload::Quads(_) => {
                return Err(StoreError::UnsupportedMediaType(
                    "the file backend only stores binary representations".to_string(),
                ))
            }
        };

        // Sidecar first: a failed data write rolls back by deleting it
        let meta_path = Self::meta_path(&link, false);
        let wrote_sidecar = self.write_sidecar(&meta_path, metadata).await?;

        let result = async {
            let mut file = tokio::fs::File::create(&link.file_path).await.map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    StoreError::NotFound(identifier.to_string())
                } else {
                    StoreError::Io(e)
                }
            })?;
            tokio::io::copy(&mut reader, &mut file).await?;
            file.flush().await?;
            Ok(())
        }
        .await;

        if let Err(e) = result {
            if wrote_sidecar {
                self.remove_sidecar_best_effort(&meta_path).await;
            }
            return Err(e);
        }

        info!("Wrote document {} to {}", identifier, link.file_path.display());
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

        let link = self.mapper.map_url_to_file_path(identifier, None).await?;
        tokio::fs::create_dir_all(&link.file_path).await?;

        let meta_path = Self::meta_path(&link, true);
        self.write_sidecar(&meta_path, metadata).await?;

        debug!("Wrote container {} at {}", identifier, link.file_path.display());
        Ok(())
    }

    async fn delete_resource(&self, identifier: &ResourceIdentifier) -> StoreResult<()> {
        let link = self.mapper.map_url_to_file_path(identifier, None).await?;
        let stat = self.stat(&link.file_path, identifier).await?;

        if identifier.is_container() {
            if !stat.is_dir() {
                return Err(StoreError::NotFound(identifier.to_string()));
            }
            // Metadata goes first so a partial delete leaves no orphan sidecar
            self.remove_sidecar_best_effort(&Self::meta_path(&link, true))
                .await;
            tokio::fs::remove_dir(&link.file_path).await?;
        } else {
            if !stat.is_file() {
                return Err(StoreError::NotFound(identifier.to_string()));
            }
            self.remove_sidecar_best_effort(&Self::meta_path(&link, false))
                .await;
            tokio::fs::remove_file(&link.file_path).await?;
        }

        info!("Deleted {}", identifier);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn accessor(dir: &TempDir) -> FileDataAccessor {
        FileDataAccessor::new(ExtensionBasedMapper::new("http://x/", dir.path()))
    }

    fn doc_metadata(id: &ResourceIdentifier, content_type: &str) -> RepresentationMetadata {
        let mut metadata = RepresentationMetadata::new(id);
        metadata.set_content_type(content_type);
        metadata
    }

    fn payload(bytes: &'static [u8]) -> DataPayload {
        DataPayload::Binary(Box::new(std::io::Cursor::new(bytes)))
    }

    #[tokio::test]
    async fn test_document_roundtrip() {
        let dir = TempDir::new().unwrap();
        let a = accessor(&dir);
        let id = ResourceIdentifier::new("http://x/doc");

        a.write_document(&id, payload(b"hello"), &doc_metadata(&id, "text/plain"))
            .await
            .unwrap();

        let bytes = a.get_data(&id).await.unwrap().into_bytes().await.unwrap();
        assert_eq!(&bytes[..], b"hello");

        let metadata = a.get_metadata(&id).await.unwrap();
        assert_eq!(metadata.content_type().as_deref(), Some("text/plain"));
        assert!(metadata.has_type(&vocab::ldp::RESOURCE));
    }

    #[tokio::test]
    async fn test_stored_metadata_survives_in_sidecar() {
        let dir = TempDir::new().unwrap();
        let a = accessor(&dir);
        let id = ResourceIdentifier::new("http://x/doc");

        let mut metadata = doc_metadata(&id, "text/plain");
        metadata.add(
            oxrdf::NamedNode::new_unchecked("http://example.org/label"),
            Term::Literal(Literal::new_simple_literal("mine")),
        );
        a.write_document(&id, payload(b"x"), &metadata).await.unwrap();

        assert!(dir.path().join("doc$.txt.meta").exists());

        let read_back = a.get_metadata(&id).await.unwrap();
        let label = oxrdf::NamedNode::new_unchecked("http://example.org/label");
        assert_eq!(read_back.values(&label).len(), 1);
    }

    #[tokio::test]
    async fn test_container_metadata_lists_children() {
        let dir = TempDir::new().unwrap();
        let a = accessor(&dir);
        let container = ResourceIdentifier::new("http://x/data/");

        a.write_container(&container, &RepresentationMetadata::new(&container))
            .await
            .unwrap();
        let child = ResourceIdentifier::new("http://x/data/doc");
        a.write_document(&child, payload(b"x"), &doc_metadata(&child, "text/plain"))
            .await
            .unwrap();

        let metadata = a.get_metadata(&container).await.unwrap();
        let contains = metadata.values(&vocab::ldp::CONTAINS);
        assert_eq!(contains.len(), 1);
        assert!(matches!(
            contains[0],
            Term::NamedNode(n) if n.as_str() == "http://x/data/doc"
        ));
    }

    #[tokio::test]
    async fn test_sidecars_invisible_in_listing() {
        let dir = TempDir::new().unwrap();
        let a = accessor(&dir);
        let container = ResourceIdentifier::new("http://x/");

        let mut metadata = RepresentationMetadata::new(&container);
        metadata.add(
            oxrdf::NamedNode::new_unchecked("http://example.org/label"),
            Term::Literal(Literal::new_simple_literal("root")),
        );
        a.write_container(&container, &metadata).await.unwrap();
        assert!(dir.path().join(".meta").exists());

        assert!(a.get_children(&container).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reserved_meta_name_conflicts() {
        let dir = TempDir::new().unwrap();
        let a = accessor(&dir);
        let id = ResourceIdentifier::new("http://x/doc.meta");

        let err = a
            .write_document(&id, payload(b"x"), &doc_metadata(&id, "application/octet-stream"))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 409);
    }

    #[tokio::test]
    async fn test_delete_document_removes_sidecar() {
        let dir = TempDir::new().unwrap();
        let a = accessor(&dir);
        let id = ResourceIdentifier::new("http://x/doc");

        let mut metadata = doc_metadata(&id, "text/plain");
        metadata.add(
            oxrdf::NamedNode::new_unchecked("http://example.org/label"),
            Term::Literal(Literal::new_simple_literal("x")),
        );
        a.write_document(&id, payload(b"x"), &metadata).await.unwrap();
        a.delete_resource(&id).await.unwrap();

        assert!(a.get_data(&id).await.unwrap_err().is_not_found());
        assert!(!dir.path().join("doc$.txt.meta").exists());
    }

    #[tokio::test]
    async fn test_get_data_on_container_is_not_found() {
        let dir = TempDir::new().unwrap();
        let a = accessor(&dir);
        let container = ResourceIdentifier::new("http://x/");

        assert!(a.get_data(&container).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_can_handle_rejects_quads() {
        let dir = TempDir::new().unwrap();
        let a = accessor(&dir);
        let id = ResourceIdentifier::new("http://x/doc");

        let rep = Representation::quads(RepresentationMetadata::new(&id), Vec::new());
        assert_eq!(a.can_handle(&rep).unwrap_err().status_code(), 415);
    }
}
