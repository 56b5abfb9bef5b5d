//! Store configuration
//!
//! A small declarative surface for picking a backend and assembling the
//! standard decorator stack around it. Constructors on the individual
//! components accept the same values directly; this is a convenience
//! layer, not a dependency-injection framework.

use crate::accessor::{DataAccessor, FileDataAccessor, InMemoryDataAccessor, SparqlDataAccessor};
use crate::conversion::{ConverterChain, INTERNAL_QUADS, TEXT_TURTLE};
use crate::error::{StoreError, StoreResult};
use crate::locking::MemoryResourceLocker;
use crate::mapping::ExtensionBasedMapper;
use crate::store::{
    ConvertingResourceStore, DataAccessorBasedStore, LockingResourceStore, PatchingResourceStore,
    ResourceStore,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Backend selection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BackendConfig {
    /// Filesystem subtree
    File {
        /// Directory backing the base IRI
        root: PathBuf,
    },
    /// In-process tree
    Memory,
    /// SPARQL 1.1 endpoint
    Sparql {
        /// Endpoint URL
        endpoint: String,
    },
}

/// Configuration for one store instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// The IRI prefix this store is responsible for
    pub base_url: String,
    /// Physical backend
    pub backend: BackendConfig,
    /// Extension → content type overrides for the identifier mapper
    #[serde(default)]
    pub extension_overrides: HashMap<String, String>,
}

impl StoreConfig {
    /// Parse a YAML configuration document
    pub fn from_yaml(text: &str) -> StoreResult<Self> {
        let config: Self = serde_yaml::from_str(text)
            .map_err(|e| StoreError::InvalidInput(format!("invalid configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a YAML configuration file
    pub async fn from_yaml_file(path: impl AsRef<std::path::Path>) -> StoreResult<Self> {
        let text = tokio::fs::read_to_string(path).await?;
        Self::from_yaml(&text)
    }

    /// Check the configuration for obvious mistakes
    pub fn validate(&self) -> StoreResult<()> {
        oxiri::Iri::parse(self.base_url.clone()).map_err(|e| {
            StoreError::InvalidInput(format!("invalid base IRI {}: {}", self.base_url, e))
        })?;
        if let BackendConfig::Sparql { endpoint } = &self.backend {
            if endpoint.is_empty() {
                return Err(StoreError::InvalidInput(
                    "SPARQL backend requires an endpoint URL".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Assemble the standard store stack for this configuration:
    /// locking over patching over converting over the accessor-based store.
    pub async fn build(&self) -> StoreResult<Arc<dyn ResourceStore>> {
        self.validate()?;

        // RDF-native backends store canonical quads; byte-oriented ones
        // store Turtle for RDF content and raw bytes for the rest
        let (accessor, write_target): (Arc<dyn DataAccessor>, &str) = match &self.backend {
            BackendConfig::File { root } => {
                let mapper = ExtensionBasedMapper::new(self.base_url.clone(), root.clone())
                    .with_overrides(self.extension_overrides.clone());
                (Arc::new(FileDataAccessor::new(mapper)), TEXT_TURTLE)
            }
            BackendConfig::Memory => (
                Arc::new(InMemoryDataAccessor::new(self.base_url.clone())),
                TEXT_TURTLE,
            ),
            BackendConfig::Sparql { endpoint } => (
                Arc::new(SparqlDataAccessor::new(
                    endpoint.clone(),
                    self.base_url.clone(),
                )?),
                INTERNAL_QUADS,
            ),
        };

        let base = DataAccessorBasedStore::new(accessor, self.base_url.clone());
        base.initialize().await?;

        let converting = ConvertingResourceStore::with_write_target(
            Arc::new(base),
            ConverterChain::standard(),
            write_target,
        );
        let patching = PatchingResourceStore::new(Arc::new(converting));
        let locking = LockingResourceStore::new(
            Arc::new(patching),
            Arc::new(MemoryResourceLocker::new()),
        );

        info!("Assembled resource store for {}", self.base_url);
        Ok(Arc::new(locking))
    }
}
