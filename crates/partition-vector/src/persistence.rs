//! Persistence layer for partition-vector.
//!
//! Each collection lives in its own directory:
//! - `{base}/{name}/metadata.json` - collection shape and vector count
//! - `{base}/{name}/vectors.json` - every stored vector with its metadata
//!
//! Files are written to a temporary sibling and renamed into place.

use crate::collection::Collection;
use crate::distance::DistanceMetric;
use crate::error::{Error, Result};
use crate::types::StoredVector;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

const METADATA_FILE: &str = "metadata.json";
const VECTORS_FILE: &str = "vectors.json";

/// Collection metadata stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CollectionMetadata {
    name: String,
    dimensions: usize,
    metric: DistanceMetric,
    vector_count: usize,
    created_at: DateTime<Utc>,
}

/// Save a collection to disk.
pub async fn save_collection(base_path: &Path, collection: &Collection) -> Result<()> {
    let collection_path = base_path.join(collection.name());
    tokio::fs::create_dir_all(&collection_path).await?;

    let vectors = collection.export_all();
    let metadata = CollectionMetadata {
        name: collection.name().to_string(),
        dimensions: collection.dimensions(),
        metric: collection.metric(),
        vector_count: vectors.len(),
        created_at: collection.created_at(),
    };

    let vectors_json = serde_json::to_vec(&vectors)
        .map_err(|e| Error::Persistence(format!("Failed to serialize vectors: {}", e)))?;
    write_atomic(&collection_path.join(VECTORS_FILE), &vectors_json).await?;

    // Metadata goes last: a readable metadata.json implies complete vectors.
    let metadata_json = serde_json::to_vec_pretty(&metadata)
        .map_err(|e| Error::Persistence(format!("Failed to serialize metadata: {}", e)))?;
    write_atomic(&collection_path.join(METADATA_FILE), &metadata_json).await?;

    info!(
        name = collection.name(),
        count = vectors.len(),
        path = ?collection_path,
        "Saved collection"
    );
    Ok(())
}

/// Load a collection from disk.
///
/// Unlike a best-effort loader, any inconsistency between the two files is an
/// error: a collection is either restored completely or not at all.
pub async fn load_collection(base_path: &Path, name: &str) -> Result<Collection> {
    let collection_path = base_path.join(name);
    let metadata_path = collection_path.join(METADATA_FILE);

    if !tokio::fs::try_exists(&metadata_path).await? {
        return Err(Error::CollectionNotFound(name.to_string()));
    }

    let metadata_json = tokio::fs::read(&metadata_path).await?;
    let metadata: CollectionMetadata = serde_json::from_slice(&metadata_json)
        .map_err(|e| Error::Persistence(format!("Failed to parse metadata: {}", e)))?;

    if metadata.name != name {
        return Err(Error::Persistence(format!(
            "Metadata names collection '{}' but directory is '{}'",
            metadata.name, name
        )));
    }

    let vectors_json = tokio::fs::read(collection_path.join(VECTORS_FILE)).await?;
    let vectors: Vec<StoredVector> = serde_json::from_slice(&vectors_json)
        .map_err(|e| Error::Persistence(format!("Failed to parse vectors: {}", e)))?;

    if vectors.len() != metadata.vector_count {
        return Err(Error::Persistence(format!(
            "Expected {} vectors, found {}",
            metadata.vector_count,
            vectors.len()
        )));
    }

    let collection = Collection::with_created_at(
        metadata.name,
        metadata.dimensions,
        metadata.metric,
        metadata.created_at,
    )?;
    collection.insert_batch(
        vectors
            .iter()
            .map(|v| (v.id.as_str(), v.vector.as_slice(), v.metadata.clone())),
    )?;

    debug!(name, count = vectors.len(), "Loaded vectors");
    info!(name, dimensions = collection.dimensions(), "Loaded collection");
    Ok(collection)
}

/// Remove a collection's directory if present.
pub async fn delete_collection(base_path: &Path, name: &str) -> Result<()> {
    let collection_path = base_path.join(name);
    if tokio::fs::try_exists(&collection_path).await? {
        tokio::fs::remove_dir_all(&collection_path).await?;
    }
    Ok(())
}

/// Write `bytes` to `path` through a temporary file and rename.
pub(crate) async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, bytes).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}
