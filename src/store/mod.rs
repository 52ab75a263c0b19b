//! Versioned object store
//!
//! `GridStore` owns the versioning and streaming-transfer logic on top of
//! an injected chunked backend: uploads are assigned a version number
//! relative to prior uploads of the same logical name, downloads resolve
//! the current version as a stream, and deletion is by backend id.

pub(crate) mod version;


use std::collections::HashMap;
use std::sync::Arc;

use futures::StreamExt;
use log::{error, info, warn};
use uuid::Uuid;

use crate::backend::config::BackendConfig;
use crate::backend::{BackendEvent, ChunkBackend, UploadOptions, DEFAULT_CONTENT_TYPE};
use crate::config::StoreConfig;
use crate::error::StoreError;
use crate::object::{ByteStream, Entity, Removed, SaveAttributes, StoredObject};
use crate::object::{MULTIPART_KEY, VERSION_KEY};

/// Bucket selected when the configuration names none.
pub const DEFAULT_BUCKET: &str = "fs";

/// Versioned object store over a chunked backend.
///
/// Constructed exactly once per process (connect before any operation) and
/// shared immutably; the backend handle is responsible for safe concurrent
/// access underneath.
pub struct GridStore {
    backend: Arc<dyn ChunkBackend>,
    bucket: String,
}

impl GridStore {
    /// Connect to the backend named by the configuration URI and select the
    /// object bucket. A missing URI fails fast, before any connection
    /// attempt. Registers log-only observers for backend lifecycle events.
    pub fn connect(config: &StoreConfig) -> Result<Self, StoreError> {
        if config.uri.is_empty() {
            return Err(StoreError::MissingUri);
        }
        let backend_config = BackendConfig::from_uri(&config.uri)?;
        let backend = backend_config.create_backend();
        let bucket = if config.bucket.is_empty() {
            DEFAULT_BUCKET.to_string()
        } else {
            config.bucket.clone()
        };

        let store = Self::with_backend(backend, &bucket);
        store.spawn_event_observer();
        info!("Chunk store connected successfully (bucket: {})", bucket);
        Ok(store)
    }

    /// Build a store around an already-constructed backend. Used by tests
    /// and embedders that manage the backend themselves.
    pub fn with_backend(backend: Arc<dyn ChunkBackend>, bucket: &str) -> Self {
        Self {
            backend,
            bucket: bucket.to_string(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Always resolves; no drain or flush guarantee for in-flight streams.
    pub async fn disconnect(&self) -> Result<(), StoreError> {
        info!("Chunk store disconnected");
        Ok(())
    }

    fn spawn_event_observer(&self) {
        let mut events = self.backend.subscribe();
        tokio::spawn(async move {
            while let Ok(event) = events.recv().await {
                match event {
                    BackendEvent::Closed => warn!("Chunk backend has disconnected."),
                    BackendEvent::Errored(e) => error!("Chunk backend error. {}", e),
                    BackendEvent::Reconnected => info!("Chunk backend has reconnected."),
                }
            }
        });
    }

    /// Store a new version of an object.
    ///
    /// The logical name is taken from `attributes.id`, then
    /// `attributes.filename`, else freshly generated; the same resolved
    /// name is used for the version lookup and the write tag. The resolved
    /// version is stamped into the metadata as a string, overwriting any
    /// caller-set value. The inbound stream is piped chunk by chunk into
    /// the backend write stream, so downstream backpressure pauses
    /// upstream reads.
    ///
    /// Any error on the inbound or write stream rejects the whole save: no
    /// new version is created, though the backend may retain partial,
    /// uncommitted data.
    pub async fn save(
        &self,
        entity: Entity,
        attributes: SaveAttributes,
    ) -> Result<StoredObject, StoreError> {
        let mut stream = match entity {
            Entity::Stream(stream) => stream,
            Entity::Value(_) => {
                return Err(StoreError::bad_request("Entity is not a stream"));
            }
        };

        let filename = attributes
            .id
            .or(attributes.filename)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let content_type = attributes
            .content_type
            .filter(|ct| !ct.is_empty())
            .or_else(|| {
                mime_guess::from_path(&filename)
                    .first_raw()
                    .map(str::to_string)
            })
            .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());

        let mut metadata = attributes.metadata;
        metadata.remove(MULTIPART_KEY);

        let version =
            version::resolve_next_version(self.backend.as_ref(), &self.bucket, &filename).await;
        metadata.insert(VERSION_KEY.to_string(), version.to_string());

        let options = UploadOptions {
            content_type,
            metadata,
        };
        let mut upload = self
            .backend
            .open_upload_stream(&self.bucket, &filename, options)
            .await?;

        while let Some(chunk) = stream.next().await {
            upload.write_chunk(chunk?).await?;
        }
        let object = upload.finish().await?;

        info!(
            "Stored {} as version {} ({} bytes, id {})",
            object.filename, version, object.length, object.id
        );
        Ok(object)
    }

    /// Updating is modeled as a fresh versioned create: a pure alias for
    /// [`save`](Self::save).
    pub async fn update_by_id(
        &self,
        entity: Entity,
        attributes: SaveAttributes,
    ) -> Result<StoredObject, StoreError> {
        self.save(entity, attributes).await
    }

    /// Open a read stream for the current version of `filename`.
    ///
    /// "Current" means most recently uploaded, which can differ from the
    /// highest version number if a prior version lookup fell back to 1. A
    /// name with no uploads is a not-found error; lookup failures
    /// propagate.
    pub async fn find_by_id(&self, filename: &str) -> Result<ByteStream, StoreError> {
        let matches = self
            .backend
            .find_by_filename(&self.bucket, filename)
            .await?;
        if matches.is_empty() {
            return Err(StoreError::not_found(format!(
                "object not found: {}",
                filename
            )));
        }
        self.backend
            .open_download_stream(&self.bucket, filename)
            .await
    }

    /// Every stored version of `filename`, newest version first.
    pub async fn find(&self, filename: &str) -> Result<Vec<StoredObject>, StoreError> {
        self.backend.find_by_filename(&self.bucket, filename).await
    }

    /// Delete one object by id.
    ///
    /// The backend delete is fire-and-forget: its own outcome is only
    /// logged, and the operation resolves with the removed id whether or
    /// not the object existed. Deleting one version never affects sibling
    /// versions' visibility.
    pub async fn remove_by_id(&self, id: &str) -> Result<Removed, StoreError> {
        let id = Uuid::parse_str(id)
            .map_err(|_| StoreError::bad_request(format!("invalid object id: {}", id)))?;

        let backend = Arc::clone(&self.backend);
        let bucket = self.bucket.clone();
        tokio::spawn(async move {
            if let Err(e) = backend.delete(&bucket, id).await {
                warn!("Background delete of {} failed: {}", id, e);
            }
        });

        Ok(Removed { id })
    }

    // Declared contract points without an implementation behind them. They
    // fail with a distinguished result instead of silently returning
    // nothing.

    pub async fn find_one(
        &self,
        _query: &HashMap<String, String>,
    ) -> Result<Option<StoredObject>, StoreError> {
        Err(StoreError::unimplemented("find_one"))
    }

    pub async fn count(&self, _filters: &HashMap<String, String>) -> Result<u64, StoreError> {
        Err(StoreError::unimplemented("count"))
    }

    pub async fn remove_many(
        &self,
        _query: &HashMap<String, String>,
    ) -> Result<u64, StoreError> {
        Err(StoreError::unimplemented("remove_many"))
    }

    pub async fn clear(&self) -> Result<u64, StoreError> {
        Err(StoreError::unimplemented("clear"))
    }
}
