//! Chunked storage backend abstraction
//!
//! This module provides an abstraction over chunked blob backends, allowing
//! the store to use different implementations (local disk, in-memory mock)
//! without affecting the versioning and transfer logic above it.

pub mod config;
pub mod local_store;
pub mod mock_store;


use std::collections::HashMap;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::error::StoreError;
use crate::object::{ByteStream, StoredObject};

/// Content type recorded when neither the caller nor the filename extension
/// yields one.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Default chunk granularity for transfers, 255 KiB.
pub const DEFAULT_CHUNK_SIZE: u64 = 255 * 1024;

/// Options attached to a newly opened upload stream.
#[derive(Debug, Clone, Default)]
pub struct UploadOptions {
    pub content_type: String,
    pub metadata: HashMap<String, String>,
}

/// Lifecycle events emitted by a connected backend. Observers are log-only;
/// no core behavior hangs off these.
#[derive(Debug, Clone)]
pub enum BackendEvent {
    Closed,
    Errored(String),
    Reconnected,
}

/// A live upload session, exclusively owned by the pipeline that opened it.
///
/// Writers must call `finish` to commit; a session dropped mid-transfer may
/// leave partial data behind on the backend, but never a committed object.
#[async_trait]
pub trait UploadStream: Send {
    /// Write one chunk. Completes only once the backend has accepted the
    /// chunk, which is what propagates backpressure to the inbound stream.
    async fn write_chunk(&mut self, chunk: Bytes) -> Result<(), StoreError>;

    /// Commit the upload and return the completion descriptor.
    async fn finish(self: Box<Self>) -> Result<StoredObject, StoreError>;
}

/// Trait defining the chunked backend interface.
///
/// The handle is constructed once at connect time and injected into every
/// component; it is responsible for safe concurrent access to the
/// underlying storage.
#[async_trait]
pub trait ChunkBackend: Send + Sync {
    /// Open a write stream for `filename` in `bucket`, tagged with the
    /// given content type and metadata.
    async fn open_upload_stream(
        &self,
        bucket: &str,
        filename: &str,
        options: UploadOptions,
    ) -> Result<Box<dyn UploadStream>, StoreError>;

    /// Open a read stream for the most recently uploaded object stored
    /// under `filename`.
    async fn open_download_stream(
        &self,
        bucket: &str,
        filename: &str,
    ) -> Result<ByteStream, StoreError>;

    /// All stored objects named `filename`, ordered by numeric version
    /// descending; ties broken by upload recency.
    async fn find_by_filename(
        &self,
        bucket: &str,
        filename: &str,
    ) -> Result<Vec<StoredObject>, StoreError>;

    /// Delete one object by its backend id.
    async fn delete(&self, bucket: &str, id: Uuid) -> Result<(), StoreError>;

    /// Subscribe to backend lifecycle events.
    fn subscribe(&self) -> broadcast::Receiver<BackendEvent>;
}

/// Sort a lineage in place: numeric version descending, most recently
/// uploaded first among equal versions. Versions are stored as strings but
/// must never be compared lexicographically ("10" sorts before "2" there).
pub(crate) fn sort_lineage(objects: &mut [StoredObject]) {
    objects.sort_by(|a, b| {
        b.version()
            .cmp(&a.version())
            .then(b.upload_date.cmp(&a.upload_date))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn object(version: &str, age_secs: i64) -> StoredObject {
        let mut metadata = HashMap::new();
        metadata.insert(crate::object::VERSION_KEY.to_string(), version.to_string());
        StoredObject {
            id: Uuid::new_v4(),
            filename: "lineage.bin".to_string(),
            length: 0,
            chunk_size: DEFAULT_CHUNK_SIZE,
            upload_date: Utc::now() - Duration::seconds(age_secs),
            content_type: DEFAULT_CONTENT_TYPE.to_string(),
            md5: String::new(),
            metadata,
        }
    }

    #[test]
    fn test_sort_lineage_is_numeric_not_lexicographic() {
        let mut objects = vec![object("9", 30), object("10", 20), object("2", 40)];
        sort_lineage(&mut objects);
        let versions: Vec<u64> = objects.iter().map(|o| o.version()).collect();
        assert_eq!(versions, vec![10, 9, 2]);
    }

    #[test]
    fn test_sort_lineage_breaks_ties_by_recency() {
        let older = object("3", 60);
        let newer = object("3", 1);
        let newer_id = newer.id;
        let mut objects = vec![older, newer];
        sort_lineage(&mut objects);
        assert_eq!(objects[0].id, newer_id);
    }
}
