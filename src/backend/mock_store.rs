//! Mock implementation of ChunkBackend for testing

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use chrono::Utc;
use futures::StreamExt;
use log::info;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::backend::{BackendEvent, ChunkBackend, UploadOptions, UploadStream};
use crate::error::StoreError;
use crate::object::{ByteStream, StoredObject};

// Small chunk size so mock downloads exercise multi-chunk streams.
const MOCK_CHUNK_SIZE: u64 = 64;

struct StoredEntry {
    object: StoredObject,
    data: Vec<u8>,
    /// Commit order, used to resolve "most recently uploaded".
    seq: u64,
}

#[derive(Default)]
struct MockState {
    // bucket -> committed entries in commit order
    buckets: HashMap<String, Vec<StoredEntry>>,
}

/// In-memory chunked backend with failure-injection switches.
pub struct MockChunkBackend {
    state: Arc<Mutex<MockState>>,
    next_seq: Arc<AtomicU64>,
    fail_finds: Arc<AtomicBool>,
    fail_writes: Arc<AtomicBool>,
    events: broadcast::Sender<BackendEvent>,
}

impl MockChunkBackend {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            state: Arc::new(Mutex::new(MockState::default())),
            next_seq: Arc::new(AtomicU64::new(1)),
            fail_finds: Arc::new(AtomicBool::new(false)),
            fail_writes: Arc::new(AtomicBool::new(false)),
            events,
        }
    }

    /// Make every `find_by_filename` call fail with a backend error.
    pub fn set_fail_finds(&self, fail: bool) {
        self.fail_finds.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent chunk write fail with a backend error.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of committed objects in a bucket.
    pub fn object_count(&self, bucket: &str) -> usize {
        let state = self.state.lock().unwrap();
        state.buckets.get(bucket).map(|e| e.len()).unwrap_or(0)
    }

    /// Whether an object with the given id is committed.
    pub fn contains(&self, bucket: &str, id: Uuid) -> bool {
        let state = self.state.lock().unwrap();
        state
            .buckets
            .get(bucket)
            .map(|entries| entries.iter().any(|e| e.object.id == id))
            .unwrap_or(false)
    }

    /// Raw bytes committed for an object id, if present.
    pub fn data_for(&self, bucket: &str, id: Uuid) -> Option<Vec<u8>> {
        let state = self.state.lock().unwrap();
        state
            .buckets
            .get(bucket)?
            .iter()
            .find(|e| e.object.id == id)
            .map(|e| e.data.clone())
    }

    /// Seed an object directly, bypassing the upload stream. Lets tests set
    /// up lineages with arbitrary (even unparseable) version metadata.
    pub fn insert_raw(&self, bucket: &str, object: StoredObject, data: Vec<u8>) {
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().unwrap();
        state
            .buckets
            .entry(bucket.to_string())
            .or_default()
            .push(StoredEntry { object, data, seq });
    }

    /// Emit a backend lifecycle event to subscribers.
    pub fn emit(&self, event: BackendEvent) {
        let _ = self.events.send(event);
    }
}

impl Default for MockChunkBackend {
    fn default() -> Self {
        Self::new()
    }
}

struct MockUploadStream {
    state: Arc<Mutex<MockState>>,
    next_seq: Arc<AtomicU64>,
    fail_writes: Arc<AtomicBool>,
    bucket: String,
    filename: String,
    options: UploadOptions,
    buf: BytesMut,
}

#[async_trait]
impl UploadStream for MockUploadStream {
    async fn write_chunk(&mut self, chunk: Bytes) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::backend("simulated write failure"));
        }
        self.buf.extend_from_slice(&chunk);
        Ok(())
    }

    async fn finish(self: Box<Self>) -> Result<StoredObject, StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::backend("simulated write failure"));
        }
        let this = *self;
        let data = this.buf.freeze().to_vec();
        let object = StoredObject {
            id: Uuid::new_v4(),
            filename: this.filename,
            length: data.len() as u64,
            chunk_size: MOCK_CHUNK_SIZE,
            upload_date: Utc::now(),
            content_type: this.options.content_type,
            md5: hex::encode(md5::compute(&data).0),
            metadata: this.options.metadata,
        };

        let seq = this.next_seq.fetch_add(1, Ordering::SeqCst);
        let mut state = this.state.lock().unwrap();
        state
            .buckets
            .entry(this.bucket.clone())
            .or_default()
            .push(StoredEntry {
                object: object.clone(),
                data,
                seq,
            });

        info!(
            "Mock: committed {} as {} in bucket {}",
            object.filename, object.id, this.bucket
        );
        Ok(object)
    }
}

#[async_trait]
impl ChunkBackend for MockChunkBackend {
    async fn open_upload_stream(
        &self,
        bucket: &str,
        filename: &str,
        options: UploadOptions,
    ) -> Result<Box<dyn UploadStream>, StoreError> {
        Ok(Box::new(MockUploadStream {
            state: Arc::clone(&self.state),
            next_seq: Arc::clone(&self.next_seq),
            fail_writes: Arc::clone(&self.fail_writes),
            bucket: bucket.to_string(),
            filename: filename.to_string(),
            options,
            buf: BytesMut::new(),
        }))
    }

    async fn open_download_stream(
        &self,
        bucket: &str,
        filename: &str,
    ) -> Result<ByteStream, StoreError> {
        let state = self.state.lock().unwrap();
        let entry = state
            .buckets
            .get(bucket)
            .and_then(|entries| {
                entries
                    .iter()
                    .filter(|e| e.object.filename == filename)
                    .max_by_key(|e| e.seq)
            })
            .ok_or_else(|| StoreError::not_found(format!("object not found: {}", filename)))?;

        let chunks: Vec<Result<Bytes, StoreError>> = entry
            .data
            .chunks(MOCK_CHUNK_SIZE as usize)
            .map(|c| Ok(Bytes::copy_from_slice(c)))
            .collect();
        Ok(futures::stream::iter(chunks).boxed())
    }

    async fn find_by_filename(
        &self,
        bucket: &str,
        filename: &str,
    ) -> Result<Vec<StoredObject>, StoreError> {
        if self.fail_finds.load(Ordering::SeqCst) {
            return Err(StoreError::backend("simulated find failure"));
        }
        let state = self.state.lock().unwrap();
        let mut objects: Vec<StoredObject> = state
            .buckets
            .get(bucket)
            .map(|entries| {
                entries
                    .iter()
                    .filter(|e| e.object.filename == filename)
                    .map(|e| e.object.clone())
                    .collect()
            })
            .unwrap_or_default();
        crate::backend::sort_lineage(&mut objects);
        Ok(objects)
    }

    async fn delete(&self, bucket: &str, id: Uuid) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        let entries = state
            .buckets
            .get_mut(bucket)
            .ok_or_else(|| StoreError::not_found(format!("no object with id {}", id)))?;
        let before = entries.len();
        entries.retain(|e| e.object.id != id);
        if entries.len() == before {
            return Err(StoreError::not_found(format!("no object with id {}", id)));
        }
        info!("Mock: deleted object {} from bucket {}", id, bucket);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<BackendEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn read_all(mut stream: ByteStream) -> Vec<u8> {
        let mut out = Vec::new();
        while let Some(chunk) = stream.next().await {
            out.extend_from_slice(&chunk.unwrap());
        }
        out
    }

    #[tokio::test]
    async fn test_mock_round_trip_and_counts() {
        let backend = MockChunkBackend::new();
        assert_eq!(backend.object_count("fs"), 0);

        let mut upload = backend
            .open_upload_stream("fs", "a.bin", UploadOptions::default())
            .await
            .unwrap();
        upload.write_chunk(Bytes::from_static(b"Hello, ")).await.unwrap();
        upload.write_chunk(Bytes::from_static(b"mock!")).await.unwrap();
        let object = upload.finish().await.unwrap();

        assert_eq!(backend.object_count("fs"), 1);
        assert_eq!(object.length, 12);
        assert!(backend.contains("fs", object.id));

        let stream = backend.open_download_stream("fs", "a.bin").await.unwrap();
        assert_eq!(read_all(stream).await, b"Hello, mock!");
    }

    #[tokio::test]
    async fn test_mock_download_picks_most_recent_upload() {
        let backend = MockChunkBackend::new();
        for payload in [&b"first"[..], &b"second"[..]] {
            let mut upload = backend
                .open_upload_stream("fs", "latest.bin", UploadOptions::default())
                .await
                .unwrap();
            upload.write_chunk(Bytes::copy_from_slice(payload)).await.unwrap();
            upload.finish().await.unwrap();
        }
        let stream = backend.open_download_stream("fs", "latest.bin").await.unwrap();
        assert_eq!(read_all(stream).await, b"second");
    }

    #[tokio::test]
    async fn test_mock_failure_injection() {
        let backend = MockChunkBackend::new();
        backend.set_fail_finds(true);
        assert!(backend.find_by_filename("fs", "x").await.is_err());
        backend.set_fail_finds(false);
        assert!(backend.find_by_filename("fs", "x").await.unwrap().is_empty());

        backend.set_fail_writes(true);
        let mut upload = backend
            .open_upload_stream("fs", "x", UploadOptions::default())
            .await
            .unwrap();
        assert!(upload.write_chunk(Bytes::from_static(b"z")).await.is_err());
        assert_eq!(backend.object_count("fs"), 0);
    }

    #[tokio::test]
    async fn test_mock_emits_lifecycle_events() {
        let backend = MockChunkBackend::new();
        let mut events = backend.subscribe();
        backend.emit(BackendEvent::Errored("link down".to_string()));
        backend.emit(BackendEvent::Reconnected);

        assert!(matches!(
            events.recv().await.unwrap(),
            BackendEvent::Errored(_)
        ));
        assert!(matches!(
            events.recv().await.unwrap(),
            BackendEvent::Reconnected
        ));
    }

    #[tokio::test]
    async fn test_mock_delete() {
        let backend = MockChunkBackend::new();
        let mut upload = backend
            .open_upload_stream("fs", "d.bin", UploadOptions::default())
            .await
            .unwrap();
        upload.write_chunk(Bytes::from_static(b"data")).await.unwrap();
        let object = upload.finish().await.unwrap();

        backend.delete("fs", object.id).await.unwrap();
        assert!(!backend.contains("fs", object.id));
        assert!(backend.delete("fs", object.id).await.is_err());
    }
}
