//! Extension-based identifier mapper
//!
//! Maps a resource IRI to a filesystem path and back, carrying the content
//! type in the file extension. When the natural extension of a path does not
//! match the stored content type, a synthetic `$.<ext>` suffix is appended,
//! making the filesystem itself the single source of truth for types.

use crate::error::{StoreError, StoreResult};
use crate::model::ResourceIdentifier;
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Characters escaped when a path segment is re-encoded into an IRI
const SEGMENT_ESCAPES: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'<')
    .add(b'>')
    .add(b'`')
    .add(b'#')
    .add(b'?')
    .add(b'{')
    .add(b'}')
    .add(b'%');

/// Marker separating a document's name from a synthetic extension
const TYPE_MARKER: &str = "$.";

/// Default extension → content type table
const DEFAULT_TYPES: &[(&str, &str)] = &[
    ("ttl", "text/turtle"),
    ("nt", "application/n-triples"),
    ("nq", "application/n-quads"),
    ("jsonld", "application/ld+json"),
    ("json", "application/json"),
    ("txt", "text/plain"),
    ("md", "text/markdown"),
    ("html", "text/html"),
    ("css", "text/css"),
    ("js", "text/javascript"),
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("svg", "image/svg+xml"),
    ("pdf", "application/pdf"),
    ("bin", "application/octet-stream"),
];

/// Content type assumed when an extension is unknown
const FALLBACK_TYPE: &str = "application/octet-stream";

/// Result of mapping an identifier onto the filesystem
#[derive(Debug, Clone)]
pub struct ResourceLink {
    /// The resource identifier
    pub identifier: ResourceIdentifier,
    /// Physical location
    pub file_path: PathBuf,
    /// Resolved content type, `None` for containers
    pub content_type: Option<String>,
}

/// Bidirectional IRI ↔ path mapper with extension-encoded content types
pub struct ExtensionBasedMapper {
    base_url: ResourceIdentifier,
    root_path: PathBuf,
    /// Extension → content type overrides, consulted before the defaults
    overrides: HashMap<String, String>,
}

impl ExtensionBasedMapper {
    /// Create a mapper for a base IRI rooted at a filesystem path
    pub fn new(base_url: impl Into<String>, root_path: impl Into<PathBuf>) -> Self {
        let mut base = base_url.into();
        if !base.ends_with('/') {
            base.push('/');
        }
        Self {
            base_url: ResourceIdentifier::new(base),
            root_path: root_path.into(),
            overrides: HashMap::new(),
        }
    }

    /// Add extension → content type overrides
    pub fn with_overrides(mut self, overrides: HashMap<String, String>) -> Self {
        self.overrides = overrides;
        self
    }

    /// The base IRI this mapper is responsible for
    pub fn base_url(&self) -> &ResourceIdentifier {
        &self.base_url
    }

    /// The filesystem root backing the base IRI
    pub fn root_path(&self) -> &Path {
        &self.root_path
    }

    /// Map a resource IRI to its physical location.
    ///
    /// Without `content_type` (a read), the parent directory is listed to
    /// find the stored file and recover its type. With `content_type`
    /// (a write), the target path is computed directly, appending a
    /// `$.<ext>` suffix when the natural extension disagrees.
    pub async fn map_url_to_file_path(
        &self,
        identifier: &ResourceIdentifier,
        content_type: Option<&str>,
    ) -> StoreResult<ResourceLink> {
        let relative = self.decoded_relative_path(identifier)?;

        if identifier.is_container() {
            let file_path = self.root_path.join(relative.trim_end_matches('/'));
            return Ok(ResourceLink {
                identifier: identifier.clone(),
                file_path,
                content_type: None,
            });
        }

        match content_type {
            Some(requested) => self.document_write_link(identifier, &relative, requested),
            None => self.document_read_link(identifier, &relative).await,
        }
    }

    /// Map a physical path back to its resource IRI.
    ///
    /// A path outside the configured root is a deployment invariant
    /// violation, not a request error.
    pub fn map_file_path_to_url(
        &self,
        file_path: &Path,
        is_container: bool,
    ) -> StoreResult<ResourceLink> {
        let relative = file_path.strip_prefix(&self.root_path).map_err(|_| {
            StoreError::Backend(format!(
                "path {} lies outside the storage root {}",
                file_path.display(),
                self.root_path.display()
            ))
        })?;

        let mut segments: Vec<String> = Vec::new();
        for component in relative.components() {
            let segment = component
                .as_os_str()
                .to_str()
                .ok_or_else(|| StoreError::Backend("non-UTF-8 path segment".to_string()))?;
            segments.push(segment.to_string());
        }

        let mut content_type = None;
        if !is_container {
            if let Some(name) = segments.last_mut() {
                let (stripped, extension) = split_type_marker(name);
                content_type = Some(self.content_type_for(extension));
                *name = stripped.to_string();
            }
        }

        let encoded: Vec<String> = segments
            .iter()
            .map(|s| utf8_percent_encode(s, SEGMENT_ESCAPES).to_string())
            .collect();

        let mut iri = format!("{}{}", self.base_url.as_str(), encoded.join("/"));
        if is_container && !iri.ends_with('/') {
            iri.push('/');
        }

        Ok(ResourceLink {
            identifier: ResourceIdentifier::new(iri),
            file_path: file_path.to_path_buf(),
            content_type,
        })
    }

    fn document_write_link(
        &self,
        identifier: &ResourceIdentifier,
        relative: &str,
        requested: &str,
    ) -> StoreResult<ResourceLink> {
        if requested.parse::<mime::Mime>().is_err() {
            return Err(StoreError::UnsupportedMediaType(format!(
                "malformed content type {}",
                requested
            )));
        }

        let name = relative.rsplit('/').next().unwrap_or(relative);
        let natural = self.content_type_for(natural_extension(name));

        let file_path = if natural == requested {
            self.root_path.join(relative)
        } else {
            let extension = self.extension_for_content_type(requested).ok_or_else(|| {
                StoreError::UnsupportedMediaType(format!(
                    "no extension known for content type {}",
                    requested
                ))
            })?;
            debug!(
                "Appending {}{} to {} for content type {}",
                TYPE_MARKER, extension, relative, requested
            );
            self.root_path
                .join(format!("{}{}{}", relative, TYPE_MARKER, extension))
        };

        Ok(ResourceLink {
            identifier: identifier.clone(),
            file_path,
            content_type: Some(requested.to_string()),
        })
    }

    async fn document_read_link(
        &self,
        identifier: &ResourceIdentifier,
        relative: &str,
    ) -> StoreResult<ResourceLink> {
        let (parent_rel, name) = match relative.rfind('/') {
            Some(i) => (&relative[..i], &relative[i + 1..]),
            None => ("", relative),
        };
        let parent_dir = self.root_path.join(parent_rel);

        let mut entries = tokio::fs::read_dir(&parent_dir).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StoreError::NotFound(identifier.to_string())
            } else {
                e.into()
            }
        })?;

        let marker_prefix = format!("{}{}", name, TYPE_MARKER);
        let mut candidates = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let entry_name = entry.file_name();
            let Some(entry_name) = entry_name.to_str() else {
                continue;
            };
            // Metadata sidecars share the document's prefix but are not it
            if entry_name.ends_with(".meta") {
                continue;
            }
            if entry_name == name || entry_name.starts_with(&marker_prefix) {
                candidates.push(entry_name.to_string());
            }
        }

        match candidates.len() {
            0 => Err(StoreError::NotFound(identifier.to_string())),
            1 => {
                let stored = &candidates[0];
                let (stripped, extension) = split_type_marker(stored);
                let content_type = self.content_type_for(extension);
                Ok(ResourceLink {
                    identifier: identifier.clone(),
                    file_path: parent_dir.join(stored),
                    content_type: Some(content_type),
                })
            }
            _ => Err(StoreError::Backend(format!(
                "multiple stored files match {}: {:?}",
                identifier, candidates
            ))),
        }
    }

    /// Strip the base IRI and percent-decode, validating the encoding scheme
    fn decoded_relative_path(&self, identifier: &ResourceIdentifier) -> StoreResult<String> {
        let relative = identifier
            .relative_to(&self.base_url)
            .ok_or_else(|| StoreError::NotFound(identifier.to_string()))?;

        let decoded = percent_decode_str(relative)
            .decode_utf8()
            .map_err(|e| StoreError::InvalidInput(format!("bad percent-encoding: {}", e)))?
            .to_string();

        // Checked after decoding, so encoded traversal cannot slip through
        if decoded.split('/').any(|segment| segment == "..") {
            return Err(StoreError::InvalidInput(format!(
                "identifier {} traverses outside its base",
                identifier
            )));
        }

        if decoded.contains(TYPE_MARKER) {
            return Err(StoreError::InvalidInput(format!(
                "identifier {} contains the reserved {} marker",
                identifier, TYPE_MARKER
            )));
        }

        Ok(decoded)
    }

    fn content_type_for_extension(&self, extension: &str) -> Option<String> {
        if let Some(ct) = self.overrides.get(extension) {
            return Some(ct.clone());
        }
        DEFAULT_TYPES
            .iter()
            .find(|(ext, _)| *ext == extension)
            .map(|(_, ct)| ct.to_string())
    }

    fn extension_for_content_type(&self, content_type: &str) -> Option<String> {
        if let Some((ext, _)) = self.overrides.iter().find(|(_, ct)| *ct == content_type) {
            return Some(ext.clone());
        }
        DEFAULT_TYPES
            .iter()
            .find(|(_, ct)| *ct == content_type)
            .map(|(ext, _)| ext.to_string())
    }

    /// Content type for an effective extension, falling back to octet-stream
    fn content_type_for(&self, extension: Option<&str>) -> String {
        extension
            .and_then(|ext| self.content_type_for_extension(ext))
            .unwrap_or_else(|| FALLBACK_TYPE.to_string())
    }
}

/// Split a stored file name into (logical name, effective extension).
///
/// `doc$.ttl` → (`doc`, `ttl`); `doc.ttl` → (`doc.ttl`, `ttl`); `doc` →
/// (`doc`, None).
fn split_type_marker(name: &str) -> (&str, Option<&str>) {
    if let Some(pos) = name.find(TYPE_MARKER) {
        (&name[..pos], Some(&name[pos + TYPE_MARKER.len()..]))
    } else {
        (name, natural_extension(name))
    }
}

/// The natural extension of a file name, if any
fn natural_extension(name: &str) -> Option<&str> {
    match name.rfind('.') {
        Some(pos) if pos > 0 && pos + 1 < name.len() => Some(&name[pos + 1..]),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn mapper(root: &Path) -> ExtensionBasedMapper {
        ExtensionBasedMapper::new("http://x/", root)
    }

    #[tokio::test]
    async fn test_container_maps_to_directory() {
        let dir = TempDir::new().unwrap();
        let m = mapper(dir.path());

        let link = m
            .map_url_to_file_path(&ResourceIdentifier::new("http://x/data/"), None)
            .await
            .unwrap();
        assert_eq!(link.file_path, dir.path().join("data"));
        assert!(link.content_type.is_none());
    }

    #[tokio::test]
    async fn test_write_keeps_matching_extension() {
        let dir = TempDir::new().unwrap();
        let m = mapper(dir.path());

        let link = m
            .map_url_to_file_path(
                &ResourceIdentifier::new("http://x/doc.ttl"),
                Some("text/turtle"),
            )
            .await
            .unwrap();
        assert_eq!(link.file_path, dir.path().join("doc.ttl"));
    }

    #[tokio::test]
    async fn test_write_appends_marker_on_mismatch() {
        let dir = TempDir::new().unwrap();
        let m = mapper(dir.path());

        let link = m
            .map_url_to_file_path(
                &ResourceIdentifier::new("http://x/doc.ttl"),
                Some("text/plain"),
            )
            .await
            .unwrap();
        assert_eq!(link.file_path, dir.path().join("doc.ttl$.txt"));
    }

    #[tokio::test]
    async fn test_write_unknown_type_is_unsupported() {
        let dir = TempDir::new().unwrap();
        let m = mapper(dir.path());

        let err = m
            .map_url_to_file_path(
                &ResourceIdentifier::new("http://x/doc"),
                Some("application/x-proprietary"),
            )
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 415);
    }

    #[tokio::test]
    async fn test_read_finds_marked_file() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("doc.ttl$.txt"), b"x").unwrap();
        // An adjacent sidecar must not make the lookup ambiguous
        std::fs::write(dir.path().join("doc.ttl$.txt.meta"), b"").unwrap();
        let m = mapper(dir.path());

        let link = m
            .map_url_to_file_path(&ResourceIdentifier::new("http://x/doc.ttl"), None)
            .await
            .unwrap();
        assert_eq!(link.file_path, dir.path().join("doc.ttl$.txt"));
        assert_eq!(link.content_type.as_deref(), Some("text/plain"));
    }

    #[tokio::test]
    async fn test_read_missing_is_not_found() {
        let dir = TempDir::new().unwrap();
        let m = mapper(dir.path());

        let err = m
            .map_url_to_file_path(&ResourceIdentifier::new("http://x/absent"), None)
            .await
            .unwrap_err();
        assert!(err.is_not_found());

        // Missing parent directory is NotFound too, not an IO error
        let err = m
            .map_url_to_file_path(&ResourceIdentifier::new("http://x/no/dir/doc"), None)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_rejects_traversal_and_marker() {
        let dir = TempDir::new().unwrap();
        let m = mapper(dir.path());

        for bad in ["http://x/../etc/passwd", "http://x/a/../b", "http://x/doc$.ttl"] {
            let err = m
                .map_url_to_file_path(&ResourceIdentifier::new(bad), None)
                .await
                .unwrap_err();
            assert_eq!(err.status_code(), 400, "{} should be rejected", bad);
        }
    }

    #[tokio::test]
    async fn test_outside_base_is_not_found() {
        let dir = TempDir::new().unwrap();
        let m = mapper(dir.path());

        let err = m
            .map_url_to_file_path(&ResourceIdentifier::new("http://other/doc"), None)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_path_to_url_strips_marker() {
        let dir = TempDir::new().unwrap();
        let m = mapper(dir.path());

        let link = m
            .map_file_path_to_url(&dir.path().join("doc.ttl$.txt"), false)
            .unwrap();
        assert_eq!(link.identifier.as_str(), "http://x/doc.ttl");
        assert_eq!(link.content_type.as_deref(), Some("text/plain"));
    }

    #[test]
    fn test_path_outside_root_is_invariant_violation() {
        let dir = TempDir::new().unwrap();
        let m = mapper(dir.path());

        let err = m
            .map_file_path_to_url(Path::new("/elsewhere/doc"), false)
            .unwrap_err();
        assert_eq!(err.status_code(), 500);
    }

    #[tokio::test]
    async fn test_mapping_idempotence_under_mismatched_type() {
        let dir = TempDir::new().unwrap();
        let m = mapper(dir.path());
        let id = ResourceIdentifier::new("http://x/notes.md");

        let link = m
            .map_url_to_file_path(&id, Some("text/turtle"))
            .await
            .unwrap();
        let back = m.map_file_path_to_url(&link.file_path, false).unwrap();

        assert_eq!(back.identifier, id);
        assert_eq!(back.content_type.as_deref(), Some("text/turtle"));
    }

    #[tokio::test]
    async fn test_percent_encoded_segments_roundtrip() {
        let dir = TempDir::new().unwrap();
        let m = mapper(dir.path());
        let id = ResourceIdentifier::new("http://x/my%20notes");

        let link = m
            .map_url_to_file_path(&id, Some("text/plain"))
            .await
            .unwrap();
        assert_eq!(link.file_path, dir.path().join("my notes$.txt"));

        let back = m.map_file_path_to_url(&link.file_path, false).unwrap();
        assert_eq!(back.identifier, id);
    }
}
