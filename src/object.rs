//! Core value types shared across the store and its backends

use std::collections::HashMap;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::StoreError;

/// Metadata key carrying the string-encoded version of an object.
pub const VERSION_KEY: &str = "version";

/// Transport-layer marker set by multipart plumbing; stripped before an
/// attributes map is persisted as object metadata.
pub const MULTIPART_KEY: &str = "$multipart";

/// A live, ordered sequence of byte chunks. Exclusively owned by whichever
/// pipeline created it; never shared across concurrent operations.
pub type ByteStream = BoxStream<'static, Result<Bytes, StoreError>>;

/// One physical chunked blob, created exactly once when its write stream
/// finishes and immutable thereafter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredObject {
    pub id: Uuid,
    /// Logical name. Not unique: all versions of a lineage share it.
    pub filename: String,
    pub length: u64,
    pub chunk_size: u64,
    pub upload_date: DateTime<Utc>,
    pub content_type: String,
    /// Hex-encoded md5 digest of the full content.
    pub md5: String,
    pub metadata: HashMap<String, String>,
}

impl StoredObject {
    /// Numeric version parsed out of the metadata map. Absent or
    /// unparseable version metadata counts as 0.
    pub fn version(&self) -> u64 {
        self.metadata
            .get(VERSION_KEY)
            .and_then(|v| v.parse().ok())
            .unwrap_or(0)
    }
}

/// Caller-supplied attributes describing a pending save.
#[derive(Debug, Clone, Default)]
pub struct SaveAttributes {
    /// Explicit logical name override; takes precedence over `filename`.
    pub id: Option<String>,
    pub filename: Option<String>,
    pub content_type: Option<String>,
    /// Arbitrary metadata persisted with the object. A `$multipart` key is
    /// stripped and a `version` key is overwritten by the pipeline.
    pub metadata: HashMap<String, String>,
}

/// Inbound payload of a save call. Service plumbing hands the store either
/// a live byte stream or whatever non-stream value it decoded instead; the
/// latter is a client fault and is rejected before any backend resource is
/// opened.
pub enum Entity {
    Stream(ByteStream),
    Value(serde_json::Value),
}

/// Acknowledgement returned by `remove_by_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Removed {
    pub id: Uuid,
}
