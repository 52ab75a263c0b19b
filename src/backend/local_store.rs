//! Local-disk chunked backend implementation
//!
//! Each committed object is a pair of files under its bucket directory: a
//! `<id>.bin` data file written chunk by chunk and a `<id>.json` descriptor
//! document. In-flight uploads write to `<id>.bin.partial` and are renamed
//! into place on finish, so a crashed or failed transfer can leave a
//! partial file behind but never a committed, discoverable object.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use futures::StreamExt;
use lazy_static::lazy_static;
use log::{info, warn};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::backend::config::BackendConfig;
use crate::backend::{
    BackendEvent, ChunkBackend, UploadOptions, UploadStream, DEFAULT_CHUNK_SIZE,
};
use crate::error::StoreError;
use crate::object::{ByteStream, StoredObject};

// Global lock serializing descriptor commits, so concurrent finishes do not
// interleave their rename + document writes.
lazy_static! {
    static ref COMMIT_LOCK: Mutex<()> = Mutex::new(());
}

fn storage_directory(config: Option<&BackendConfig>) -> PathBuf {
    if let Some(cfg) = config {
        let path = PathBuf::from(&cfg.base_path);
        if !path.exists() {
            fs::create_dir_all(&path).expect("Failed to create configured storage directory");
        }
        info!("Using configured storage directory: {}", path.display());
        return path;
    }

    match std::env::var("STORAGE_DIRECTORY") {
        Ok(dir) => {
            info!("Using storage directory from environment: {}", dir);
            PathBuf::from(dir)
        }
        Err(_) => {
            warn!("Storage directory not defined in environment");
            let default_path = PathBuf::from("storage");
            if !default_path.exists() {
                fs::create_dir_all(&default_path)
                    .expect("Failed to create default storage directory");
            }
            info!(
                "Using default storage directory: {}",
                default_path.display()
            );
            default_path
        }
    }
}

/// Local-disk chunked backend.
pub struct LocalChunkStore {
    base_path: PathBuf,
    chunk_size: u64,
    events: broadcast::Sender<BackendEvent>,
}

impl LocalChunkStore {
    pub fn new(config: Option<&BackendConfig>) -> Self {
        let base_path = storage_directory(config);
        let chunk_size = config.map(|c| c.chunk_size).unwrap_or(DEFAULT_CHUNK_SIZE);
        let (events, _) = broadcast::channel(16);
        Self {
            base_path,
            chunk_size,
            events,
        }
    }

    /// Directory holding one bucket's objects, created on demand.
    fn bucket_dir(&self, bucket: &str) -> Result<PathBuf, StoreError> {
        let dir = self.base_path.join(bucket);
        if !dir.exists() {
            fs::create_dir_all(&dir)?;
        }
        Ok(dir)
    }

    fn doc_path(&self, bucket: &str, id: Uuid) -> PathBuf {
        self.base_path.join(bucket).join(format!("{}.json", id))
    }

    fn bin_path(&self, bucket: &str, id: Uuid) -> PathBuf {
        self.base_path.join(bucket).join(format!("{}.bin", id))
    }

    /// Read every committed descriptor in a bucket. A missing bucket
    /// directory reads as empty.
    fn read_docs(&self, bucket: &str) -> Result<Vec<StoredObject>, StoreError> {
        let dir = self.base_path.join(bucket);
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut docs = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let content = fs::read_to_string(&path)?;
            let doc: StoredObject = serde_json::from_str(&content)
                .map_err(|e| StoreError::backend(format!("corrupt descriptor {}: {}", path.display(), e)))?;
            docs.push(doc);
        }
        Ok(docs)
    }
}

struct LocalUploadStream {
    id: Uuid,
    filename: String,
    options: UploadOptions,
    chunk_size: u64,
    bucket: String,
    partial_path: PathBuf,
    final_path: PathBuf,
    doc_path: PathBuf,
    file: File,
    digest: md5::Context,
    length: u64,
    events: broadcast::Sender<BackendEvent>,
}

#[async_trait]
impl UploadStream for LocalUploadStream {
    async fn write_chunk(&mut self, chunk: Bytes) -> Result<(), StoreError> {
        if let Err(e) = self.file.write_all(&chunk) {
            let _ = self
                .events
                .send(BackendEvent::Errored(format!("write failed: {}", e)));
            return Err(e.into());
        }
        self.digest.consume(&chunk);
        self.length += chunk.len() as u64;
        Ok(())
    }

    async fn finish(self: Box<Self>) -> Result<StoredObject, StoreError> {
        let this = *self;
        let mut file = this.file;
        file.flush()?;
        drop(file);

        let object = StoredObject {
            id: this.id,
            filename: this.filename,
            length: this.length,
            chunk_size: this.chunk_size,
            upload_date: Utc::now(),
            content_type: this.options.content_type,
            md5: hex::encode(this.digest.compute().0),
            metadata: this.options.metadata,
        };

        // Commit: data file into place first, then the descriptor that
        // makes the object discoverable.
        {
            let _lock = COMMIT_LOCK.lock().unwrap();
            fs::rename(&this.partial_path, &this.final_path)?;
            let doc = serde_json::to_string_pretty(&object)
                .map_err(|e| StoreError::backend(format!("descriptor encode failed: {}", e)))?;
            fs::write(&this.doc_path, doc)?;
        }

        info!(
            "Committed object {} ({} bytes) as {} in bucket {}",
            object.filename, object.length, object.id, this.bucket
        );
        Ok(object)
    }
}

#[async_trait]
impl ChunkBackend for LocalChunkStore {
    async fn open_upload_stream(
        &self,
        bucket: &str,
        filename: &str,
        options: UploadOptions,
    ) -> Result<Box<dyn UploadStream>, StoreError> {
        let dir = self.bucket_dir(bucket)?;
        let id = Uuid::new_v4();
        let partial_path = dir.join(format!("{}.bin.partial", id));
        let file = OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&partial_path)?;

        Ok(Box::new(LocalUploadStream {
            id,
            filename: filename.to_string(),
            options,
            chunk_size: self.chunk_size,
            bucket: bucket.to_string(),
            final_path: self.bin_path(bucket, id),
            doc_path: self.doc_path(bucket, id),
            partial_path,
            file,
            digest: md5::Context::new(),
            length: 0,
            events: self.events.clone(),
        }))
    }

    async fn open_download_stream(
        &self,
        bucket: &str,
        filename: &str,
    ) -> Result<ByteStream, StoreError> {
        // The name resolves to the most recently uploaded object, which is
        // not necessarily the highest version number.
        let doc = self
            .read_docs(bucket)?
            .into_iter()
            .filter(|d| d.filename == filename)
            .max_by_key(|d| d.upload_date)
            .ok_or_else(|| StoreError::not_found(format!("object not found: {}", filename)))?;

        let file = File::open(self.bin_path(bucket, doc.id))?;
        let chunk_size = doc.chunk_size.max(1) as usize;
        let stream = futures::stream::unfold(file, move |mut file| async move {
            let mut buf = vec![0u8; chunk_size];
            match file.read(&mut buf) {
                Ok(0) => None,
                Ok(n) => {
                    buf.truncate(n);
                    Some((Ok(Bytes::from(buf)), file))
                }
                Err(e) => Some((Err(StoreError::from(e)), file)),
            }
        });
        Ok(stream.boxed())
    }

    async fn find_by_filename(
        &self,
        bucket: &str,
        filename: &str,
    ) -> Result<Vec<StoredObject>, StoreError> {
        let mut docs: Vec<StoredObject> = self
            .read_docs(bucket)?
            .into_iter()
            .filter(|d| d.filename == filename)
            .collect();
        crate::backend::sort_lineage(&mut docs);
        Ok(docs)
    }

    async fn delete(&self, bucket: &str, id: Uuid) -> Result<(), StoreError> {
        let doc_path = self.doc_path(bucket, id);
        if !doc_path.exists() {
            return Err(StoreError::not_found(format!("no object with id {}", id)));
        }
        // Descriptor first: once it is gone the object is not discoverable
        // even if the data file removal fails.
        fs::remove_file(&doc_path)?;
        fs::remove_file(self.bin_path(bucket, id))?;
        info!("Deleted object {} from bucket {}", id, bucket);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<BackendEvent> {
        self.events.subscribe()
    }
}
