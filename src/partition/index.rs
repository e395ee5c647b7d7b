//! Building and restoring one partition's retrieval index.

use super::store::{PartitionManifest, StorageHandle, MANIFEST_VERSION};
use super::PartitionKey;
use crate::rag::chunker::{chunk_id, TextChunker};
use crate::rag::embeddings::Embedder;
use crate::types::{AppError, Document, Result, Source};
use chrono::Utc;
use partition_vector::{DistanceMetric, MetadataValue, VectorDb, VectorMetadata};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Metadata field holding the chunk text inside the vector store.
const TEXT_FIELD: &str = "text";
const DOCUMENT_ID_FIELD: &str = "document_id";

/// Chunking and retrieval parameters, passed explicitly to every builder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub similarity_top_k: usize,
    /// Document metadata field that records the partition key.
    pub metadata_key: String,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
            similarity_top_k: 3,
            metadata_key: "year".to_string(),
        }
    }
}

/// Creates partition indices from documents, or restores them from disk.
pub struct IndexBuilder {
    embedder: Arc<dyn Embedder>,
    chunker: TextChunker,
    config: IndexConfig,
}

impl IndexBuilder {
    pub fn new(embedder: Arc<dyn Embedder>, config: IndexConfig) -> Result<Self> {
        let chunker = TextChunker::new(config.chunk_size, config.chunk_overlap)?;
        Ok(Self {
            embedder,
            chunker,
            config,
        })
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    /// Chunk, embed, insert and persist `documents` as partition `key`.
    ///
    /// The manifest is written only after the vectors are on disk. A
    /// partition that already has a manifest is rejected; purge it first.
    #[instrument(skip(self, documents, handle), fields(key = %key, documents = documents.len()))]
    pub async fn build(
        &self,
        key: &PartitionKey,
        documents: Vec<Document>,
        handle: StorageHandle,
    ) -> Result<PartitionIndex> {
        let fail = |reason: String| AppError::IndexBuild {
            key: key.to_string(),
            reason,
        };

        if handle.key() != key {
            return Err(fail(format!(
                "storage handle belongs to partition '{}'",
                handle.key()
            )));
        }
        let manifest_path = handle.manifest_path();
        let built = tokio::fs::try_exists(&manifest_path)
            .await
            .map_err(|e| AppError::StorageUnavailable {
                key: key.to_string(),
                reason: format!("cannot inspect {}: {}", manifest_path.display(), e),
            })?;
        if built {
            return Err(fail("partition is already built; purge it to rebuild".to_string()));
        }
        if documents.is_empty() {
            return Err(fail("no documents to index".to_string()));
        }
        if let Some(empty) = documents.iter().find(|d| d.content.trim().is_empty()) {
            return Err(fail(format!("document '{}' has no content", empty.id)));
        }
        // Chunk ids derive from the document id, so a repeated id would
        // silently overwrite chunks.
        {
            let mut ids_seen = HashSet::new();
            if let Some(dup) = documents.iter().find(|d| !ids_seen.insert(d.id.as_str())) {
                return Err(fail(format!("document id '{}' appears more than once", dup.id)));
            }
        }

        let db = handle.db();
        let collection = handle.collection();
        if db.collection_exists(collection) {
            // Left over from a build that never wrote its manifest.
            warn!(collection, "Discarding uncommitted collection");
            db.delete_collection(collection)
                .await
                .map_err(|e| fail(e.to_string()))?;
        }

        let document_count = documents.len();
        let mut ids = Vec::new();
        let mut texts = Vec::new();
        let mut metadata = Vec::new();
        for mut doc in documents {
            doc.metadata
                .insert(self.config.metadata_key.clone(), key.to_string());
            for (index, text) in self.chunker.chunk(&doc.content).into_iter().enumerate() {
                let mut meta = VectorMetadata::from_pairs(
                    doc.metadata
                        .iter()
                        .map(|(k, v)| (k.clone(), MetadataValue::from(v.clone()))),
                );
                meta.insert(DOCUMENT_ID_FIELD, doc.id.clone());
                meta.insert("chunk_index", index as i64);
                meta.insert(TEXT_FIELD, text.clone());
                ids.push(chunk_id(&doc.id, index, &text));
                texts.push(text);
                metadata.push(meta);
            }
        }
        debug!(chunks = texts.len(), "Chunked documents");

        let vectors = self
            .embedder
            .embed(&texts)
            .await
            .map_err(|e| fail(format!("embedding failed: {}", e)))?;
        if vectors.len() != texts.len() {
            return Err(fail(format!(
                "embedder returned {} vectors for {} chunks",
                vectors.len(),
                texts.len()
            )));
        }
        let dimensions = vectors.first().map(Vec::len).unwrap_or(0);

        db.create_collection(collection, dimensions, DistanceMetric::Cosine)
            .await
            .map_err(|e| fail(e.to_string()))?;
        db.insert_batch(
            collection,
            ids.iter()
                .zip(&vectors)
                .zip(metadata)
                .map(|((id, vector), meta)| (id.as_str(), vector.as_slice(), Some(meta))),
        )
        .await
        .map_err(|e| fail(e.to_string()))?;
        let stored = db.count(collection).map_err(|e| fail(e.to_string()))?;
        if stored != texts.len() {
            return Err(fail(format!(
                "{} chunks produced but {} stored; chunk ids collide",
                texts.len(),
                stored
            )));
        }
        db.persist().await.map_err(|e| fail(e.to_string()))?;

        let manifest = PartitionManifest {
            version: MANIFEST_VERSION,
            key: key.clone(),
            collection: collection.to_string(),
            embedding_model: self.embedder.model_name().to_string(),
            dimensions,
            document_count,
            chunk_count: texts.len(),
            chunk_size: self.config.chunk_size,
            chunk_overlap: self.config.chunk_overlap,
            metadata_key: self.config.metadata_key.clone(),
            built_at: Utc::now(),
        };
        handle.write_manifest(&manifest).await?;

        info!(chunks = manifest.chunk_count, dimensions, "Built partition index");
        Ok(PartitionIndex::new(handle, manifest, Arc::clone(&self.embedder)))
    }

    /// Restore a previously built partition. Never yields an empty index.
    #[instrument(skip(self, handle), fields(key = %handle.key()))]
    pub async fn load(&self, handle: StorageHandle) -> Result<PartitionIndex> {
        let key = handle.key().to_string();
        let fail = |reason: String| AppError::IndexLoad {
            key: key.clone(),
            reason,
        };

        let manifest = handle
            .read_manifest()
            .await?
            .ok_or_else(|| fail("no build manifest; the partition was never built".to_string()))?;

        if manifest.version != MANIFEST_VERSION {
            return Err(fail(format!(
                "unsupported manifest version {}",
                manifest.version
            )));
        }
        if &manifest.key != handle.key() {
            return Err(fail(format!(
                "manifest belongs to partition '{}'",
                manifest.key
            )));
        }
        if manifest.collection != handle.collection() {
            return Err(fail(format!(
                "manifest names collection '{}' but '{}' was requested",
                manifest.collection,
                handle.collection()
            )));
        }
        if manifest.embedding_model != self.embedder.model_name() {
            return Err(fail(format!(
                "built with embedding model '{}' but '{}' is configured",
                manifest.embedding_model,
                self.embedder.model_name()
            )));
        }
        // Remote embedders only learn their size from a first request.
        let dims = match self.embedder.dimensions() {
            Some(dims) => dims,
            None => self
                .embedder
                .embed_one("dimension check")
                .await
                .map(|v| v.len())
                .map_err(|e| fail(format!("cannot determine embedding dimensions: {}", e)))?,
        };
        if dims != manifest.dimensions {
            return Err(fail(format!(
                "built with {}-dimensional embeddings but the embedder produces {}",
                manifest.dimensions, dims
            )));
        }

        let db = handle.db();
        let collection = db.get_collection(handle.collection()).map_err(|_| {
            let reason = db
                .load_error(handle.collection())
                .unwrap_or_else(|| "collection data is missing".to_string());
            fail(format!("collection '{}': {}", handle.collection(), reason))
        })?;

        if collection.dimensions() != manifest.dimensions {
            return Err(fail(format!(
                "collection holds {}-dimensional vectors, manifest says {}",
                collection.dimensions(),
                manifest.dimensions
            )));
        }
        if collection.len() != manifest.chunk_count {
            return Err(fail(format!(
                "collection holds {} chunks, manifest says {}",
                collection.len(),
                manifest.chunk_count
            )));
        }

        info!(chunks = manifest.chunk_count, "Loaded partition index");
        Ok(PartitionIndex::new(handle, manifest, Arc::clone(&self.embedder)))
    }
}

/// A built or restored, read-only partition index.
pub struct PartitionIndex {
    handle: StorageHandle,
    manifest: PartitionManifest,
    embedder: Arc<dyn Embedder>,
}

impl PartitionIndex {
    fn new(handle: StorageHandle, manifest: PartitionManifest, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            handle,
            manifest,
            embedder,
        }
    }

    pub fn key(&self) -> &PartitionKey {
        self.handle.key()
    }

    pub fn manifest(&self) -> &PartitionManifest {
        &self.manifest
    }

    pub fn len(&self) -> usize {
        self.manifest.chunk_count
    }

    pub fn is_empty(&self) -> bool {
        self.manifest.chunk_count == 0
    }

    fn db(&self) -> &VectorDb {
        self.handle.db()
    }

    /// The `top_k` chunks most similar to `text`, best first.
    #[instrument(skip(self, text), fields(key = %self.key()))]
    pub async fn retrieve(&self, text: &str, top_k: usize) -> Result<Vec<Source>> {
        let query = self.embedder.embed_one(text).await?;
        let results = self
            .db()
            .search(self.handle.collection(), &query, top_k)
            .await
            .map_err(|e| AppError::Internal(format!("search in partition '{}' failed: {}", self.key(), e)))?;

        Ok(results
            .into_iter()
            .map(|hit| {
                let mut metadata: BTreeMap<String, String> = hit
                    .metadata
                    .map(|m| m.data.into_iter().map(|(k, v)| (k, v.to_string())).collect())
                    .unwrap_or_default();
                let text = metadata.remove(TEXT_FIELD).unwrap_or_default();
                Source {
                    chunk_id: hit.id,
                    text,
                    score: hit.score,
                    metadata,
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partition::PartitionStore;
    use async_trait::async_trait;
    use tempfile::TempDir;

    /// Bag-of-letters embedding: deterministic and similarity tracks shared words.
    struct LetterEmbedder;

    #[async_trait]
    impl Embedder for LetterEmbedder {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|t| {
                    let mut v = vec![0.0f32; 26];
                    for c in t.to_ascii_lowercase().bytes().filter(u8::is_ascii_lowercase) {
                        v[(c - b'a') as usize] += 1.0;
                    }
                    v
                })
                .collect())
        }

        fn model_name(&self) -> &str {
            "letters"
        }

        fn dimensions(&self) -> Option<usize> {
            Some(26)
        }
    }

    fn builder() -> IndexBuilder {
        IndexBuilder::new(Arc::new(LetterEmbedder), IndexConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn test_build_tags_and_retrieves() {
        let dir = TempDir::new().unwrap();
        let store = PartitionStore::new(dir.path(), "collection");
        let key = PartitionKey::from("2021");
        let docs = vec![
            Document::new("a", "zzzz zzzz"),
            Document::new("b", "apple apple"),
        ];

        let index = builder()
            .build(&key, docs, store.open(&key).await.unwrap())
            .await
            .unwrap();
        assert_eq!(index.len(), 2);
        assert_eq!(index.manifest().document_count, 2);

        let hits = index.retrieve("apple", 1).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].text, "apple apple");
        assert_eq!(hits[0].metadata["year"], "2021");
        assert_eq!(hits[0].metadata[DOCUMENT_ID_FIELD], "b");
    }

    #[tokio::test]
    async fn test_build_rejects_empty_input() {
        let dir = TempDir::new().unwrap();
        let store = PartitionStore::new(dir.path(), "collection");
        let key = PartitionKey::from("2020");

        let err = builder()
            .build(&key, vec![], store.open(&key).await.unwrap())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, AppError::IndexBuild { .. }));

        let err = builder()
            .build(
                &key,
                vec![Document::new("blank", "  \n ")],
                store.open(&key).await.unwrap(),
            )
            .await
            .err()
            .unwrap();
        assert!(matches!(err, AppError::IndexBuild { .. }));
        assert!(!store.exists(&key).await.unwrap());
    }

    #[tokio::test]
    async fn test_load_rejects_other_embedding_model() {
        struct OtherModel;

        #[async_trait]
        impl Embedder for OtherModel {
            async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
                LetterEmbedder.embed(texts).await
            }
            fn model_name(&self) -> &str {
                "other"
            }
            fn dimensions(&self) -> Option<usize> {
                Some(26)
            }
        }

        let dir = TempDir::new().unwrap();
        let store = PartitionStore::new(dir.path(), "collection");
        let key = PartitionKey::from("2019");
        builder()
            .build(
                &key,
                vec![Document::new("a", "text")],
                store.open(&key).await.unwrap(),
            )
            .await
            .unwrap();

        let other = IndexBuilder::new(Arc::new(OtherModel), IndexConfig::default()).unwrap();
        let err = other
            .load(store.open(&key).await.unwrap())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, AppError::IndexLoad { .. }));
    }

    #[tokio::test]
    async fn test_load_probes_unknown_dimensions() {
        /// Same model name, but the size is only known after a request.
        struct LazySize(usize);

        #[async_trait]
        impl Embedder for LazySize {
            async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
                Ok(texts.iter().map(|_| vec![1.0; self.0]).collect())
            }
            fn model_name(&self) -> &str {
                "letters"
            }
            fn dimensions(&self) -> Option<usize> {
                None
            }
        }

        let dir = TempDir::new().unwrap();
        let store = PartitionStore::new(dir.path(), "collection");
        let key = PartitionKey::from("2018");
        builder()
            .build(
                &key,
                vec![Document::new("a", "text")],
                store.open(&key).await.unwrap(),
            )
            .await
            .unwrap();

        let matching = IndexBuilder::new(Arc::new(LazySize(26)), IndexConfig::default()).unwrap();
        assert!(matching.load(store.open(&key).await.unwrap()).await.is_ok());

        let smaller = IndexBuilder::new(Arc::new(LazySize(3)), IndexConfig::default()).unwrap();
        let err = smaller
            .load(store.open(&key).await.unwrap())
            .await
            .err()
            .unwrap();
        assert!(matches!(
            err,
            AppError::IndexLoad { ref reason, .. } if reason.contains("3")
        ));
    }
}
