//! Representations and single-consumption data payloads
//!
//! A representation couples metadata with a data payload that can be read
//! exactly once. Re-reading a consumed payload fails loudly instead of
//! silently yielding nothing, so a leaked or double-drained stream shows up
//! at its source.

use super::metadata::RepresentationMetadata;
use crate::error::{StoreError, StoreResult};
use bytes::Bytes;
use oxrdf::Quad;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Boxed byte source, the binary half of a payload
pub type ByteSource = Box<dyn AsyncRead + Send + Unpin>;

/// The actual content of a representation
pub enum DataPayload {
    /// Raw bytes, streamed
    Binary(ByteSource),
    /// RDF quads, the canonical internal form
    Quads(Vec<Quad>),
}

impl DataPayload {
    /// Drain a binary payload into a buffer
    pub async fn into_bytes(self) -> StoreResult<Bytes> {
        match self {
            DataPayload::Binary(mut reader) => {
                let mut buf = Vec::new();
                reader.read_to_end(&mut buf).await?;
                Ok(buf.into())
            }
            DataPayload::Quads(_) => Err(StoreError::Backend(
                "expected a binary payload, found quads".to_string(),
            )),
        }
    }

    /// Take the quads out of a quad payload
    pub fn into_quads(self) -> StoreResult<Vec<Quad>> {
        match self {
            DataPayload::Quads(quads) => Ok(quads),
            DataPayload::Binary(_) => Err(StoreError::Backend(
                "expected a quad payload, found binary data".to_string(),
            )),
        }
    }
}

impl std::fmt::Debug for DataPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataPayload::Binary(_) => f.write_str("DataPayload::Binary(..)"),
            DataPayload::Quads(quads) => write!(f, "DataPayload::Quads({} quads)", quads.len()),
        }
    }
}

/// A payload slot that can be consumed exactly once
#[derive(Debug)]
pub struct Data {
    payload: Option<DataPayload>,
}

impl Data {
    /// Wrap a payload
    pub fn new(payload: DataPayload) -> Self {
        Self {
            payload: Some(payload),
        }
    }

    /// An empty, already-consumed slot
    pub fn empty() -> Self {
        Self { payload: None }
    }

    /// Whether the payload has already been taken
    pub fn is_consumed(&self) -> bool {
        self.payload.is_none()
    }

    /// Take the payload. Fails if it was already consumed.
    pub fn consume(&mut self) -> StoreResult<DataPayload> {
        self.payload.take().ok_or_else(|| {
            StoreError::Backend("representation data was already consumed".to_string())
        })
    }
}

/// A resource representation: metadata plus a one-shot data payload
#[derive(Debug)]
pub struct Representation {
    /// Quad-set metadata
    pub metadata: RepresentationMetadata,
    /// Single-consumption payload
    pub data: Data,
    /// Whether the payload is raw bytes rather than quads
    pub binary: bool,
}

impl Representation {
    /// A binary representation over an arbitrary byte source
    pub fn binary(metadata: RepresentationMetadata, source: ByteSource) -> Self {
        Self {
            metadata,
            data: Data::new(DataPayload::Binary(source)),
            binary: true,
        }
    }

    /// A binary representation over an in-memory buffer
    pub fn from_bytes(metadata: RepresentationMetadata, bytes: impl Into<Bytes>) -> Self {
        Self::binary(metadata, Box::new(std::io::Cursor::new(bytes.into())))
    }

    /// A quad representation
    pub fn quads(metadata: RepresentationMetadata, quads: Vec<Quad>) -> Self {
        Self {
            metadata,
            data: Data::new(DataPayload::Quads(quads)),
            binary: false,
        }
    }
}

/// What the caller wants back from a read.
///
/// Interpreted only by the converting decorator; inner layers pass it
/// through untouched.
#[derive(Debug, Clone, Default)]
pub struct RepresentationPreferences {
    /// Desired content type, `None` for whatever the backend holds
    pub content_type: Option<String>,
}

impl RepresentationPreferences {
    /// Prefer a specific content type
    pub fn with_content_type(content_type: impl Into<String>) -> Self {
        Self {
            content_type: Some(content_type.into()),
        }
    }
}

/// Preconditions attached to a write or delete.
///
/// Reserved on the operation surface; no accessor in this core evaluates
/// them.
#[derive(Debug, Clone, Default)]
pub struct Conditions {
    /// Proceed only if the current entity tag matches
    pub if_match: Option<String>,
    /// Proceed only if the current entity tag matches none of these
    pub if_none_match: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::identifier::ResourceIdentifier;

    fn meta() -> RepresentationMetadata {
        RepresentationMetadata::new(&ResourceIdentifier::new("http://x/doc"))
    }

    #[tokio::test]
    async fn test_binary_roundtrip() {
        let mut rep = Representation::from_bytes(meta(), "hello".as_bytes().to_vec());
        assert!(rep.binary);

        let bytes = rep.data.consume().unwrap().into_bytes().await.unwrap();
        assert_eq!(&bytes[..], b"hello");
    }

    #[test]
    fn test_double_consume_fails_loudly() {
        let mut rep = Representation::quads(meta(), Vec::new());
        assert!(rep.data.consume().is_ok());

        let err = rep.data.consume().unwrap_err();
        assert!(err.to_string().contains("already consumed"));
    }

    #[test]
    fn test_payload_kind_mismatch() {
        let mut rep = Representation::quads(meta(), Vec::new());
        let payload = rep.data.consume().unwrap();
        assert!(matches!(payload, DataPayload::Quads(_)));
    }

    #[tokio::test]
    async fn test_quads_refuse_byte_drain() {
        let mut rep = Representation::quads(meta(), Vec::new());
        let payload = rep.data.consume().unwrap();
        assert!(payload.into_bytes().await.is_err());
    }
}
