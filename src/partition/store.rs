//! Per-partition storage.
//!
//! Layout under the store root:
//!
//! ```text
//! <root>/<encoded key>/collections.json
//! <root>/<encoded key>/<collection>/metadata.json
//! <root>/<encoded key>/<collection>/vectors.json
//! <root>/<encoded key>/partition.json        build manifest, written last
//! ```
//!
//! A partition "exists" only once its manifest is on disk, so a build that
//! died half way is never mistaken for a usable index.

use super::PartitionKey;
use crate::types::{AppError, Result};
use chrono::{DateTime, Utc};
use partition_vector::{Config as VectorConfig, VectorDb};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, instrument};

pub const MANIFEST_FILE: &str = "partition.json";

/// Current manifest layout.
pub const MANIFEST_VERSION: u32 = 1;

/// Record of a completed build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartitionManifest {
    pub version: u32,
    pub key: PartitionKey,
    pub collection: String,
    pub embedding_model: String,
    pub dimensions: usize,
    pub document_count: usize,
    pub chunk_count: usize,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub metadata_key: String,
    pub built_at: DateTime<Utc>,
}

/// Owns the root directory under which every partition is stored.
#[derive(Debug, Clone)]
pub struct PartitionStore {
    root: PathBuf,
    collection: String,
}

impl PartitionStore {
    pub fn new(root: impl Into<PathBuf>, collection: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            collection: collection.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Deterministic directory of a partition. Distinct keys never collide.
    pub fn location(&self, key: &PartitionKey) -> PathBuf {
        self.root.join(key.encoded())
    }

    pub fn manifest_path(&self, key: &PartitionKey) -> PathBuf {
        self.location(key).join(MANIFEST_FILE)
    }

    /// True iff a completed build is recorded for `key`. An unreadable
    /// location is an error, not a missing partition.
    pub async fn exists(&self, key: &PartitionKey) -> Result<bool> {
        let path = self.manifest_path(key);
        tokio::fs::try_exists(&path)
            .await
            .map_err(|e| AppError::StorageUnavailable {
                key: key.to_string(),
                reason: format!("cannot inspect {}: {}", path.display(), e),
            })
    }

    /// Open (creating if needed) the partition's vector database.
    #[instrument(skip(self), fields(key = %key))]
    pub async fn open(&self, key: &PartitionKey) -> Result<StorageHandle> {
        let location = self.location(key);
        let db = VectorDb::open(VectorConfig::persistent(&location))
            .await
            .map_err(|e| AppError::StorageUnavailable {
                key: key.to_string(),
                reason: format!("{}: {}", location.display(), e),
            })?;

        Ok(StorageHandle {
            key: key.clone(),
            collection: self.collection.clone(),
            location,
            db,
        })
    }

    /// Remove everything stored for `key`. Missing partitions are fine.
    #[instrument(skip(self), fields(key = %key))]
    pub async fn purge(&self, key: &PartitionKey) -> Result<()> {
        let location = self.location(key);
        match tokio::fs::remove_dir_all(&location).await {
            Ok(()) => {
                info!(path = %location.display(), "Purged partition");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::StorageUnavailable {
                key: key.to_string(),
                reason: format!("cannot remove {}: {}", location.display(), e),
            }),
        }
    }
}

/// An opened partition: its vector database plus where it lives.
#[derive(Clone)]
pub struct StorageHandle {
    key: PartitionKey,
    collection: String,
    location: PathBuf,
    db: VectorDb,
}

impl StorageHandle {
    pub fn key(&self) -> &PartitionKey {
        &self.key
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn location(&self) -> &Path {
        &self.location
    }

    pub fn db(&self) -> &VectorDb {
        &self.db
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.location.join(MANIFEST_FILE)
    }

    /// Read the manifest. `Ok(None)` means no build was ever completed.
    pub async fn read_manifest(&self) -> Result<Option<PartitionManifest>> {
        let path = self.manifest_path();
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(AppError::IndexLoad {
                    key: self.key.to_string(),
                    reason: format!("cannot read {}: {}", path.display(), e),
                })
            }
        };

        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| AppError::IndexLoad {
                key: self.key.to_string(),
                reason: format!("corrupt manifest {}: {}", path.display(), e),
            })
    }

    /// Write the manifest through a temporary file so it appears atomically.
    pub async fn write_manifest(&self, manifest: &PartitionManifest) -> Result<()> {
        let build_err = |reason: String| AppError::IndexBuild {
            key: self.key.to_string(),
            reason,
        };

        let json = serde_json::to_vec_pretty(manifest)
            .map_err(|e| build_err(format!("cannot serialize manifest: {}", e)))?;
        let path = self.manifest_path();
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json)
            .await
            .map_err(|e| build_err(format!("cannot write {}: {}", tmp.display(), e)))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| build_err(format!("cannot commit {}: {}", path.display(), e)))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn manifest(key: &str) -> PartitionManifest {
        PartitionManifest {
            version: MANIFEST_VERSION,
            key: PartitionKey::from(key),
            collection: "collection".to_string(),
            embedding_model: "m".to_string(),
            dimensions: 8,
            document_count: 1,
            chunk_count: 2,
            chunk_size: 1000,
            chunk_overlap: 200,
            metadata_key: "year".to_string(),
            built_at: Utc::now(),
        }
    }

    #[test]
    fn test_locations_are_distinct() {
        let store = PartitionStore::new("/data", "collection");
        let a = store.location(&PartitionKey::from("A B"));
        let b = store.location(&PartitionKey::from("a_b"));
        assert_ne!(a, b);
        assert_eq!(store.location(&"2021".into()), PathBuf::from("/data/2021"));
    }

    #[tokio::test]
    async fn test_exists_follows_manifest() {
        let dir = TempDir::new().unwrap();
        let store = PartitionStore::new(dir.path(), "collection");
        let key = PartitionKey::from("2021");

        assert!(!store.exists(&key).await.unwrap());

        // Opening creates the directory but does not make the partition exist.
        let handle = store.open(&key).await.unwrap();
        assert!(handle.location().is_dir());
        assert!(!store.exists(&key).await.unwrap());
        assert_eq!(handle.read_manifest().await.unwrap(), None);

        let written = manifest("2021");
        handle.write_manifest(&written).await.unwrap();
        assert!(store.exists(&key).await.unwrap());
        assert_eq!(handle.read_manifest().await.unwrap(), Some(written));

        store.purge(&key).await.unwrap();
        assert!(!store.exists(&key).await.unwrap());
        // Purging twice is fine.
        store.purge(&key).await.unwrap();
    }

    #[tokio::test]
    async fn test_corrupt_manifest_is_load_error() {
        let dir = TempDir::new().unwrap();
        let store = PartitionStore::new(dir.path(), "collection");
        let key = PartitionKey::from("2020");
        let handle = store.open(&key).await.unwrap();
        tokio::fs::write(handle.manifest_path(), b"{ nope").await.unwrap();

        assert!(matches!(
            handle.read_manifest().await,
            Err(AppError::IndexLoad { key, .. }) if key == "2020"
        ));
    }

    #[tokio::test]
    async fn test_open_unwritable_root() {
        let dir = TempDir::new().unwrap();
        // A regular file where the root directory should be.
        let blocker = dir.path().join("root");
        std::fs::write(&blocker, b"").unwrap();

        let store = PartitionStore::new(&blocker, "collection");
        let result = store.open(&PartitionKey::from("2019")).await;
        assert!(matches!(
            result,
            Err(AppError::StorageUnavailable { key, .. }) if key == "2019"
        ));
    }
}
