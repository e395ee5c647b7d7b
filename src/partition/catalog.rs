//! Build-or-load of every configured partition, once, before queries start.

use super::{IndexBuilder, PartitionIndex, PartitionKey, PartitionStore};
use crate::rag::loader::DocumentSource;
use crate::types::{AppError, Result};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, instrument, warn};

/// A partition that could not be made usable.
#[derive(Debug)]
pub struct PartitionFailure {
    pub key: PartitionKey,
    pub error: AppError,
}

/// Ready indices plus the partitions that failed, both in requested order.
#[derive(Default)]
pub struct PartitionCatalog {
    indices: Vec<(PartitionKey, Arc<PartitionIndex>)>,
    failures: Vec<PartitionFailure>,
}

impl PartitionCatalog {
    pub fn indices(&self) -> &[(PartitionKey, Arc<PartitionIndex>)] {
        &self.indices
    }

    pub fn failures(&self) -> &[PartitionFailure] {
        &self.failures
    }

    pub fn get(&self, key: &PartitionKey) -> Option<&Arc<PartitionIndex>> {
        self.indices
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, index)| index)
    }

    pub fn keys(&self) -> impl Iterator<Item = &PartitionKey> {
        self.indices.iter().map(|(k, _)| k)
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn into_parts(self) -> (Vec<(PartitionKey, Arc<PartitionIndex>)>, Vec<PartitionFailure>) {
        (self.indices, self.failures)
    }
}

enum Outcome {
    Built(PartitionIndex),
    Loaded(PartitionIndex),
}

pub struct CatalogBuilder {
    store: PartitionStore,
    builder: Arc<IndexBuilder>,
    source: Arc<dyn DocumentSource>,
    max_concurrent: usize,
}

impl CatalogBuilder {
    pub fn new(
        store: PartitionStore,
        builder: IndexBuilder,
        source: Arc<dyn DocumentSource>,
    ) -> Self {
        Self {
            store,
            builder: Arc::new(builder),
            source,
            max_concurrent: 4,
        }
    }

    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent.max(1);
        self
    }

    pub fn store(&self) -> &PartitionStore {
        &self.store
    }

    /// Build or load every key concurrently.
    ///
    /// A partition with a committed manifest is loaded, any other is built
    /// from the document source. Failures are collected rather than
    /// returned so the usable partitions still make it into the catalog.
    /// Repeated keys are handled once.
    #[instrument(skip(self, keys), fields(partitions = keys.len()))]
    pub async fn build(&self, keys: &[PartitionKey]) -> PartitionCatalog {
        let mut seen = HashSet::new();
        let keys: Vec<PartitionKey> = keys
            .iter()
            .filter(|k| seen.insert((*k).clone()))
            .cloned()
            .collect();

        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let mut set = JoinSet::new();

        for (slot, key) in keys.iter().enumerate() {
            let key = key.clone();
            let store = self.store.clone();
            let builder = Arc::clone(&self.builder);
            let source = Arc::clone(&self.source);
            let semaphore = Arc::clone(&semaphore);

            set.spawn(async move {
                let outcome = match semaphore.acquire_owned().await {
                    Ok(_permit) => build_or_load(&store, &builder, source.as_ref(), &key).await,
                    Err(_) => Err(AppError::Internal("build semaphore closed".to_string())),
                };
                (slot, outcome)
            });
        }

        let mut results: Vec<Option<Result<Outcome>>> = keys.iter().map(|_| None).collect();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((slot, outcome)) => results[slot] = Some(outcome),
                Err(e) => warn!(error = %e, "Partition task did not complete"),
            }
        }

        let mut catalog = PartitionCatalog::default();
        for (key, result) in keys.into_iter().zip(results) {
            let result = result
                .unwrap_or_else(|| Err(AppError::Internal("partition task panicked".to_string())));
            match result {
                Ok(Outcome::Built(index)) => {
                    info!(key = %key, chunks = index.len(), "Partition built");
                    catalog.indices.push((key, Arc::new(index)));
                }
                Ok(Outcome::Loaded(index)) => {
                    info!(key = %key, chunks = index.len(), "Partition loaded");
                    catalog.indices.push((key, Arc::new(index)));
                }
                Err(error) => {
                    warn!(key = %key, error = %error, "Partition unavailable");
                    catalog.failures.push(PartitionFailure { key, error });
                }
            }
        }
        catalog
    }
}

async fn build_or_load(
    store: &PartitionStore,
    builder: &IndexBuilder,
    source: &dyn DocumentSource,
    key: &PartitionKey,
) -> Result<Outcome> {
    if store.exists(key).await? {
        let handle = store.open(key).await?;
        return builder.load(handle).await.map(Outcome::Loaded);
    }

    let documents = source.load(key).await.map_err(|e| AppError::IndexBuild {
        key: key.to_string(),
        reason: format!("cannot load documents: {}", e),
    })?;
    let handle = store.open(key).await?;
    builder.build(key, documents, handle).await.map(Outcome::Built)
}
