//! Version resolution for upload lineages
//!
//! Versioning is advisory: a failed lookup is downgraded to "assume this is
//! the first version" rather than failing the upload.

use log::warn;

use crate::backend::ChunkBackend;

/// Determine the version number for the next upload of `filename`.
///
/// Zero existing objects yields 1. Otherwise the highest stored version is
/// incremented; missing or unparseable version metadata on the top object
/// counts as 0. Read-only; never touches the lineage.
///
/// There is no compare-and-swap around the read-then-increment, so two
/// concurrent uploads of the same name can both observe the same highest
/// version and persist duplicates. That non-atomicity is part of the
/// contract; downloads resolve by upload order, not version number.
pub(crate) async fn resolve_next_version(
    backend: &dyn ChunkBackend,
    bucket: &str,
    filename: &str,
) -> u64 {
    match backend.find_by_filename(bucket, filename).await {
        Ok(objects) => objects.first().map(|o| o.version() + 1).unwrap_or(1),
        Err(e) => {
            warn!(
                "Version lookup for {} failed ({}), assuming version 1",
                filename, e
            );
            1
        }
    }
}
