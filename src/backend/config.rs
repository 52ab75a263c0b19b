//! Configuration for chunked storage backends
//!
//! Backends are selected by connection URI: `local://<path>` for the
//! local-disk store, `mock://` for the in-memory test backend.

use std::env;
use std::sync::Arc;

use log::{info, warn};

use crate::backend::{local_store::LocalChunkStore, mock_store::MockChunkBackend, ChunkBackend};
use crate::backend::DEFAULT_CHUNK_SIZE;
use crate::error::StoreError;

const DEFAULT_URI: &str = "local://./data/storage";

/// Available chunked backends
#[derive(Debug, Clone, PartialEq)]
pub enum BackendKind {
    Local,
    Mock,
}

/// Configuration for a chunked backend
#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub kind: BackendKind,
    /// Base directory for the local backend; unused by the mock.
    pub base_path: String,
    pub chunk_size: u64,
}

impl BackendConfig {
    /// Parse a connection URI. An empty URI is a configuration error and
    /// fails before any connection attempt.
    pub fn from_uri(uri: &str) -> Result<Self, StoreError> {
        if uri.is_empty() {
            return Err(StoreError::MissingUri);
        }
        if let Some(path) = uri.strip_prefix("local://") {
            let base_path = if path.is_empty() { "storage" } else { path };
            return Ok(Self {
                kind: BackendKind::Local,
                base_path: base_path.to_string(),
                chunk_size: DEFAULT_CHUNK_SIZE,
            });
        }
        if uri.strip_prefix("mock://").is_some() {
            return Ok(Self {
                kind: BackendKind::Mock,
                base_path: String::new(),
                chunk_size: DEFAULT_CHUNK_SIZE,
            });
        }
        Err(StoreError::backend(format!(
            "unsupported backend URI: {}",
            uri
        )))
    }

    /// Read the connection URI from the environment, falling back to the
    /// default local-disk location.
    pub fn from_env() -> Result<Self, StoreError> {
        match env::var("GRIDSTORE_URI") {
            Ok(uri) => {
                info!("Using backend URI from environment: {}", uri);
                Self::from_uri(&uri)
            }
            Err(_) => {
                warn!(
                    "No backend URI specified in environment, using default {}",
                    DEFAULT_URI
                );
                Self::from_uri(DEFAULT_URI)
            }
        }
    }

    /// Create a backend instance based on the configuration.
    pub fn create_backend(&self) -> Arc<dyn ChunkBackend> {
        match self.kind {
            BackendKind::Local => {
                info!(
                    "Using local chunked backend with base_path: {}",
                    self.base_path
                );
                Arc::new(LocalChunkStore::new(Some(self)))
            }
            BackendKind::Mock => {
                info!("Using mock chunked backend");
                Arc::new(MockChunkBackend::new())
            }
        }
    }
}
