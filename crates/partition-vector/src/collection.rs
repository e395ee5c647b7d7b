//! Vector collection.
//!
//! A collection is a named container for vectors with a fixed dimensionality
//! and distance metric. Search is an exact scan over every stored vector.

use crate::distance::DistanceMetric;
use crate::error::{Error, Result};
use crate::types::{SearchResult, StoredVector, VectorId, VectorMetadata};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::cmp::Ordering;
use std::collections::HashMap;

/// A named collection of vectors.
pub struct Collection {
    name: String,
    dimensions: usize,
    metric: DistanceMetric,
    max_vectors: usize,
    created_at: DateTime<Utc>,
    entries: RwLock<HashMap<VectorId, StoredVector>>,
}

/// Statistics about a collection.
#[derive(Debug, Clone, serde::Serialize)]
pub struct CollectionStats {
    /// Name of the collection.
    pub name: String,
    /// Number of vectors in the collection.
    pub vector_count: usize,
    /// Dimensionality of vectors.
    pub dimensions: usize,
    /// Distance metric used.
    pub metric: DistanceMetric,
    /// When the collection was first created.
    pub created_at: DateTime<Utc>,
}

impl Collection {
    /// Create a new, empty collection.
    pub fn new(name: String, dimensions: usize, metric: DistanceMetric) -> Result<Self> {
        Self::with_created_at(name, dimensions, metric, Utc::now())
    }

    pub(crate) fn with_created_at(
        name: String,
        dimensions: usize,
        metric: DistanceMetric,
        created_at: DateTime<Utc>,
    ) -> Result<Self> {
        if dimensions == 0 {
            return Err(Error::InvalidVector(
                "collection dimensions must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            name,
            dimensions,
            metric,
            max_vectors: 0,
            created_at,
            entries: RwLock::new(HashMap::new()),
        })
    }

    pub(crate) fn with_max_vectors(mut self, max: usize) -> Self {
        self.max_vectors = max;
        self
    }

    /// Get the collection name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the vector dimensions.
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Get the distance metric.
    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    /// Creation timestamp.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Get the number of vectors in the collection.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Check if the collection is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Check whether a vector id is present.
    pub fn contains(&self, id: &str) -> bool {
        self.entries.read().contains_key(id)
    }

    /// Get a vector and its metadata by id.
    pub fn get(&self, id: &str) -> Option<(Vec<f32>, Option<VectorMetadata>)> {
        self.entries
            .read()
            .get(id)
            .map(|v| (v.vector.clone(), v.metadata.clone()))
    }

    /// Insert a vector, replacing any previous vector with the same id.
    pub fn insert(&self, id: &str, vector: &[f32], metadata: Option<VectorMetadata>) -> Result<()> {
        self.validate(vector)?;

        let mut entries = self.entries.write();
        self.check_capacity(&entries, id)?;
        entries.insert(
            id.to_string(),
            StoredVector {
                id: id.to_string(),
                vector: vector.to_vec(),
                metadata,
            },
        );
        Ok(())
    }

    /// Insert multiple vectors under one write lock.
    ///
    /// Every vector is validated before any is stored, so a bad batch leaves
    /// the collection untouched.
    pub fn insert_batch<'a, I>(&self, vectors: I) -> Result<usize>
    where
        I: IntoIterator<Item = (&'a str, &'a [f32], Option<VectorMetadata>)>,
    {
        let batch: Vec<_> = vectors.into_iter().collect();
        for (_, vector, _) in &batch {
            self.validate(vector)?;
        }

        let mut entries = self.entries.write();
        let count = batch.len();
        for (id, vector, metadata) in batch {
            self.check_capacity(&entries, id)?;
            entries.insert(
                id.to_string(),
                StoredVector {
                    id: id.to_string(),
                    vector: vector.to_vec(),
                    metadata,
                },
            );
        }
        Ok(count)
    }

    /// Delete a vector. Returns whether it existed.
    pub fn delete(&self, id: &str) -> bool {
        self.entries.write().remove(id).is_some()
    }

    /// Return the `limit` most similar vectors, best first.
    ///
    /// Equal scores are ordered by id so results are deterministic.
    pub fn search(&self, query: &[f32], limit: usize) -> Result<Vec<SearchResult>> {
        self.search_with_threshold(query, limit, f32::NEG_INFINITY)
    }

    /// Search, dropping results scoring below `min_score`.
    pub fn search_with_threshold(
        &self,
        query: &[f32],
        limit: usize,
        min_score: f32,
    ) -> Result<Vec<SearchResult>> {
        self.validate(query)?;
        if limit == 0 {
            return Ok(Vec::new());
        }

        let entries = self.entries.read();
        let mut scored: Vec<(f32, &StoredVector)> = entries
            .values()
            .map(|stored| (self.metric.similarity(query, &stored.vector), stored))
            .filter(|(score, _)| *score >= min_score)
            .collect();

        scored.sort_by(|(sa, a), (sb, b)| {
            sb.partial_cmp(sa)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        scored.truncate(limit);

        Ok(scored
            .into_iter()
            .map(|(score, stored)| SearchResult {
                id: stored.id.clone(),
                score,
                metadata: stored.metadata.clone(),
            })
            .collect())
    }

    /// Snapshot every stored vector, sorted by id.
    pub fn export_all(&self) -> Vec<StoredVector> {
        let mut all: Vec<StoredVector> = self.entries.read().values().cloned().collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }

    /// Collection statistics.
    pub fn stats(&self) -> CollectionStats {
        CollectionStats {
            name: self.name.clone(),
            vector_count: self.len(),
            dimensions: self.dimensions,
            metric: self.metric,
            created_at: self.created_at,
        }
    }

    fn validate(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimensions {
            return Err(Error::DimensionMismatch {
                expected: self.dimensions,
                actual: vector.len(),
            });
        }
        if vector.iter().any(|x| !x.is_finite()) {
            return Err(Error::InvalidVector(
                "vector contains NaN or infinite values".to_string(),
            ));
        }
        Ok(())
    }

    fn check_capacity(&self, entries: &HashMap<VectorId, StoredVector>, id: &str) -> Result<()> {
        if self.max_vectors > 0 && entries.len() >= self.max_vectors && !entries.contains_key(id) {
            return Err(Error::CapacityExceeded {
                name: self.name.clone(),
                limit: self.max_vectors,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collection() -> Collection {
        Collection::new("test".to_string(), 3, DistanceMetric::Cosine).unwrap()
    }

    #[test]
    fn test_insert_and_search() {
        let col = collection();
        col.insert("a", &[1.0, 0.0, 0.0], None).unwrap();
        col.insert("b", &[0.0, 1.0, 0.0], None).unwrap();
        col.insert("c", &[0.9, 0.1, 0.0], None).unwrap();

        let results = col.search(&[1.0, 0.0, 0.0], 2).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, "a");
        assert_eq!(results[1].id, "c");
    }

    #[test]
    fn test_ties_are_ordered_by_id() {
        let col = collection();
        col.insert("z", &[1.0, 0.0, 0.0], None).unwrap();
        col.insert("m", &[2.0, 0.0, 0.0], None).unwrap();

        let results = col.search(&[1.0, 0.0, 0.0], 10).unwrap();
        assert_eq!(results[0].id, "m");
        assert_eq!(results[1].id, "z");
    }

    #[test]
    fn test_dimension_mismatch() {
        let col = collection();
        let err = col.insert("a", &[1.0, 0.0], None).unwrap_err();
        assert!(matches!(
            err,
            Error::DimensionMismatch {
                expected: 3,
                actual: 2
            }
        ));
        assert!(col.search(&[1.0], 1).is_err());
    }

    #[test]
    fn test_nan_rejected() {
        let col = collection();
        assert!(matches!(
            col.insert("a", &[f32::NAN, 0.0, 0.0], None),
            Err(Error::InvalidVector(_))
        ));
    }

    #[test]
    fn test_bad_batch_is_atomic() {
        let col = collection();
        let good = [1.0, 0.0, 0.0];
        let bad = [1.0, 0.0];
        let result = col.insert_batch(vec![("a", &good[..], None), ("b", &bad[..], None)]);
        assert!(result.is_err());
        assert!(col.is_empty());
    }

    #[test]
    fn test_capacity_limit() {
        let col = collection().with_max_vectors(1);
        col.insert("a", &[1.0, 0.0, 0.0], None).unwrap();
        // Replacing an existing id does not count against the limit.
        col.insert("a", &[0.0, 1.0, 0.0], None).unwrap();
        assert!(matches!(
            col.insert("b", &[1.0, 0.0, 0.0], None),
            Err(Error::CapacityExceeded { limit: 1, .. })
        ));
    }

    #[test]
    fn test_threshold_and_delete() {
        let col = collection();
        col.insert("a", &[1.0, 0.0, 0.0], None).unwrap();
        col.insert("b", &[0.0, 1.0, 0.0], None).unwrap();

        let results = col.search_with_threshold(&[1.0, 0.0, 0.0], 10, 0.5).unwrap();
        assert_eq!(results.len(), 1);

        assert!(col.delete("a"));
        assert!(!col.delete("a"));
        assert_eq!(col.len(), 1);
    }

    #[test]
    fn test_export_all_sorted() {
        let col = collection();
        col.insert("b", &[0.0, 1.0, 0.0], None).unwrap();
        col.insert("a", &[1.0, 0.0, 0.0], None).unwrap();
        let ids: Vec<_> = col.export_all().into_iter().map(|v| v.id).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }
}
