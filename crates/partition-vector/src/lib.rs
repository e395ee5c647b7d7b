//! # partition-vector
//!
//! A pure-Rust embedded vector database with exact similarity search and
//! JSON persistence. One database instance backs one partition of a
//! partitioned retrieval index.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use partition_vector::{Config, DistanceMetric, VectorDb};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), partition_vector::Error> {
//!     let db = VectorDb::open(Config::persistent("./storage/2021")).await?;
//!     db.create_collection("collection", 384, DistanceMetric::Cosine).await?;
//!
//!     db.insert("collection", "chunk-1", &vec![0.1f32; 384], None).await?;
//!     db.persist().await?;
//!
//!     let results = db.search("collection", &vec![0.1f32; 384], 3).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## On-disk layout
//!
//! ```text
//! <data_path>/
//!   collections.json          names of all collections
//!   <collection>/metadata.json
//!   <collection>/vectors.json
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod collection;
pub mod config;
pub mod distance;
pub mod error;
pub mod persistence;
pub mod types;

// Re-exports for convenience
pub use collection::{Collection, CollectionStats};
pub use config::Config;
pub use distance::DistanceMetric;
pub use error::{Error, Result};
pub use types::{MetadataValue, SearchResult, StoredVector, VectorId, VectorMetadata};

use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

const COLLECTIONS_FILE: &str = "collections.json";

/// The main vector database instance.
///
/// `VectorDb` manages multiple collections, each containing vectors of a
/// specific dimensionality. Cloning is cheap and shares the same state.
///
/// # Thread Safety
///
/// Uses `scc::HashMap` for the collection table, which is safe to use across
/// `.await` points. Each collection guards its vectors with its own lock.
#[derive(Clone)]
pub struct VectorDb {
    inner: Arc<VectorDbInner>,
}

struct VectorDbInner {
    config: Config,
    collections: scc::HashMap<String, Arc<Collection>>,
    /// Collections listed in `collections.json` that could not be restored.
    load_errors: scc::HashMap<String, String>,
}

impl VectorDb {
    /// Open or create a vector database with the given configuration.
    ///
    /// For a persistent configuration the data directory is created if
    /// absent, and every collection listed on disk is loaded. A collection
    /// that fails to load is skipped and its error kept for
    /// [`VectorDb::load_error`].
    #[instrument(skip(config), fields(persistent = config.data_path.is_some()))]
    pub async fn open(config: Config) -> Result<Self> {
        info!("Opening vector database");

        let db = Self {
            inner: Arc::new(VectorDbInner {
                config: config.clone(),
                collections: scc::HashMap::new(),
                load_errors: scc::HashMap::new(),
            }),
        };

        if let Some(ref path) = config.data_path {
            db.load_collections(path).await?;
        }

        Ok(db)
    }

    /// Directory backing this database, if persistent.
    pub fn data_path(&self) -> Option<&Path> {
        self.inner.config.data_path.as_deref()
    }

    /// Create a new collection with the specified parameters.
    ///
    /// # Errors
    ///
    /// Returns an error if a collection with the same name already exists.
    #[instrument(skip(self))]
    pub async fn create_collection(
        &self,
        name: &str,
        dimensions: usize,
        metric: DistanceMetric,
    ) -> Result<()> {
        info!(name, dimensions, ?metric, "Creating collection");

        if self.inner.collections.contains(name) {
            return Err(Error::CollectionExists(name.to_string()));
        }

        let collection = Collection::new(name.to_string(), dimensions, metric)?
            .with_max_vectors(self.inner.config.max_vectors);

        // Insert returns Err if key already exists (handles race condition)
        if self
            .inner
            .collections
            .insert(name.to_string(), Arc::new(collection))
            .is_err()
        {
            return Err(Error::CollectionExists(name.to_string()));
        }

        if let Some(ref path) = self.inner.config.data_path {
            self.persist_collection_names(path).await?;
        }

        Ok(())
    }

    /// Delete a collection and all its data.
    #[instrument(skip(self))]
    pub async fn delete_collection(&self, name: &str) -> Result<()> {
        info!(name, "Deleting collection");

        if self.inner.collections.remove(name).is_none() {
            return Err(Error::CollectionNotFound(name.to_string()));
        }

        if let Some(ref path) = self.inner.config.data_path {
            persistence::delete_collection(path, name).await?;
            self.persist_collection_names(path).await?;
        }

        Ok(())
    }

    /// Check if a collection exists.
    pub fn collection_exists(&self, name: &str) -> bool {
        self.inner.collections.contains(name)
    }

    /// List all collection names, sorted.
    pub fn list_collections(&self) -> Vec<String> {
        let mut names = Vec::new();
        self.inner.collections.scan(|k, _| {
            names.push(k.clone());
        });
        names.sort();
        names
    }

    /// The error that prevented a listed collection from loading, if any.
    pub fn load_error(&self, name: &str) -> Option<String> {
        self.inner.load_errors.read(name, |_, v| v.clone())
    }

    /// Get a reference to a collection.
    pub fn get_collection(&self, name: &str) -> Result<Arc<Collection>> {
        self.inner
            .collections
            .read(name, |_, v| v.clone())
            .ok_or_else(|| Error::CollectionNotFound(name.to_string()))
    }

    /// Insert a vector into a collection.
    #[instrument(skip(self, vector, metadata), fields(dim = vector.len()))]
    pub async fn insert(
        &self,
        collection: &str,
        id: &str,
        vector: &[f32],
        metadata: Option<VectorMetadata>,
    ) -> Result<()> {
        let col = self.get_collection(collection)?;
        col.insert(id, vector, metadata)?;
        debug!("Inserted vector");
        Ok(())
    }

    /// Insert multiple vectors into a collection.
    ///
    /// # Returns
    ///
    /// The number of vectors inserted.
    #[instrument(skip(self, vectors))]
    pub async fn insert_batch<'a, I>(&self, collection: &str, vectors: I) -> Result<usize>
    where
        I: IntoIterator<Item = (&'a str, &'a [f32], Option<VectorMetadata>)>,
    {
        let col = self.get_collection(collection)?;
        let count = col.insert_batch(vectors)?;
        debug!(count, "Inserted batch");
        Ok(count)
    }

    /// Search for similar vectors, best first.
    #[instrument(skip(self, query), fields(dim = query.len()))]
    pub async fn search(
        &self,
        collection: &str,
        query: &[f32],
        limit: usize,
    ) -> Result<Vec<SearchResult>> {
        let col = self.get_collection(collection)?;
        let results = col.search(query, limit)?;
        debug!(count = results.len(), "Search completed");
        Ok(results)
    }

    /// Get the number of vectors in a collection.
    pub fn count(&self, collection: &str) -> Result<usize> {
        let col = self.get_collection(collection)?;
        Ok(col.len())
    }

    /// Get collection statistics.
    pub fn collection_stats(&self, collection: &str) -> Result<CollectionStats> {
        let col = self.get_collection(collection)?;
        Ok(col.stats())
    }

    /// Persist the current state to disk.
    ///
    /// This is a no-op for in-memory databases.
    #[instrument(skip(self))]
    pub async fn persist(&self) -> Result<()> {
        let Some(ref path) = self.inner.config.data_path else {
            debug!("Skipping persist for in-memory database");
            return Ok(());
        };

        info!("Persisting database to disk");

        let mut to_persist: Vec<Arc<Collection>> = Vec::new();
        self.inner.collections.scan(|_, collection| {
            to_persist.push(collection.clone());
        });

        for collection in to_persist {
            persistence::save_collection(path, &collection).await?;
        }
        self.persist_collection_names(path).await?;

        Ok(())
    }

    async fn load_collections(&self, path: &Path) -> Result<()> {
        if !tokio::fs::try_exists(path).await? {
            tokio::fs::create_dir_all(path).await?;
            return Ok(());
        }

        let names_path = path.join(COLLECTIONS_FILE);
        if !tokio::fs::try_exists(&names_path).await? {
            return Ok(());
        }

        let data = tokio::fs::read(&names_path).await?;
        let collection_names: Vec<String> = serde_json::from_slice(&data)
            .map_err(|e| Error::Persistence(format!("Failed to parse collections.json: {}", e)))?;

        for name in collection_names {
            match persistence::load_collection(path, &name).await {
                Ok(collection) => {
                    let collection = collection.with_max_vectors(self.inner.config.max_vectors);
                    let _ = self
                        .inner
                        .collections
                        .insert(name.clone(), Arc::new(collection));
                }
                Err(e) => {
                    warn!(name, error = %e, "Failed to load collection, skipping");
                    let _ = self.inner.load_errors.insert(name, e.to_string());
                }
            }
        }

        Ok(())
    }

    async fn persist_collection_names(&self, base_path: &Path) -> Result<()> {
        let collections = self.list_collections();
        let data = serde_json::to_vec_pretty(&collections)
            .map_err(|e| Error::Persistence(format!("Failed to serialize collections: {}", e)))?;
        persistence::write_atomic(&base_path.join(COLLECTIONS_FILE), &data).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_create_and_search() {
        let db = VectorDb::open(Config::memory()).await.unwrap();

        db.create_collection("test", 3, DistanceMetric::Cosine)
            .await
            .unwrap();

        db.insert("test", "vec1", &[1.0, 0.0, 0.0], None)
            .await
            .unwrap();
        db.insert("test", "vec2", &[0.0, 1.0, 0.0], None)
            .await
            .unwrap();
        db.insert("test", "vec3", &[0.9, 0.1, 0.0], None)
            .await
            .unwrap();

        let results = db.search("test", &[1.0, 0.0, 0.0], 10).await.unwrap();

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].id, "vec1");
        assert_eq!(results[1].id, "vec3");
    }

    #[tokio::test]
    async fn test_collection_lifecycle() {
        let db = VectorDb::open(Config::memory()).await.unwrap();

        assert!(!db.collection_exists("test"));

        db.create_collection("test", 128, DistanceMetric::Euclidean)
            .await
            .unwrap();
        assert!(db.collection_exists("test"));

        db.delete_collection("test").await.unwrap();
        assert!(!db.collection_exists("test"));
    }

    #[tokio::test]
    async fn test_duplicate_collection_error() {
        let db = VectorDb::open(Config::memory()).await.unwrap();

        db.create_collection("test", 128, DistanceMetric::Cosine)
            .await
            .unwrap();

        let result = db
            .create_collection("test", 128, DistanceMetric::Cosine)
            .await;
        assert!(matches!(result, Err(Error::CollectionExists(_))));
    }

    #[tokio::test]
    async fn test_persist_and_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("2021");

        {
            let db = VectorDb::open(Config::persistent(&path)).await.unwrap();
            db.create_collection("collection", 2, DistanceMetric::Cosine)
                .await
                .unwrap();
            db.insert_batch(
                "collection",
                vec![
                    ("a", &[1.0f32, 0.0][..], None),
                    ("b", &[0.0f32, 1.0][..], None),
                ],
            )
            .await
            .unwrap();
            db.persist().await.unwrap();
        }

        let db = VectorDb::open(Config::persistent(&path)).await.unwrap();
        assert_eq!(db.list_collections(), vec!["collection".to_string()]);
        assert_eq!(db.count("collection").unwrap(), 2);
        let results = db.search("collection", &[0.0, 1.0], 1).await.unwrap();
        assert_eq!(results[0].id, "b");
    }

    #[tokio::test]
    async fn test_corrupt_collection_recorded() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().to_path_buf();

        {
            let db = VectorDb::open(Config::persistent(&path)).await.unwrap();
            db.create_collection("collection", 2, DistanceMetric::Cosine)
                .await
                .unwrap();
            db.insert("collection", "a", &[1.0, 0.0], None)
                .await
                .unwrap();
            db.persist().await.unwrap();
        }

        tokio::fs::write(path.join("collection").join("metadata.json"), b"not json")
            .await
            .unwrap();

        let db = VectorDb::open(Config::persistent(&path)).await.unwrap();
        assert!(!db.collection_exists("collection"));
        assert!(db.load_error("collection").is_some());
    }
}
