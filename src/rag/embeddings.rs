//! Text embedding backends.
//!
//! - [`RemoteEmbedder`] - any OpenAI-compatible `/embeddings` endpoint
//!   (OpenAI, Ollama's `/v1`, vLLM)
//! - [`FastEmbedder`] - in-process ONNX models via fastembed (feature
//!   `local-embeddings`)

use crate::types::{AppError, Result};
use crate::utils::toml_config::{AppConfig, EmbeddingConfig};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, OnceLock};
use tracing::debug;

/// Turns text into vectors.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a batch, returning one vector per input in the same order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Identifier recorded in build manifests.
    fn model_name(&self) -> &str;

    /// Output dimensionality, if known before the first call.
    fn dimensions(&self) -> Option<usize>;

    /// Embed a single text.
    async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        self.embed(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| AppError::Embedding("Embedder returned no vector".to_string()))
    }
}

/// Build the embedder described by `[embedding]`.
pub fn embedder_from_config(config: &AppConfig) -> Result<Arc<dyn Embedder>> {
    match &config.embedding {
        EmbeddingConfig::Remote {
            base_url,
            model,
            api_key_env,
            batch_size,
        } => {
            let api_key = api_key_env.as_deref().and_then(|env| config.resolve_env(env));
            Ok(Arc::new(
                RemoteEmbedder::new(base_url.clone(), model.clone(), api_key)
                    .with_batch_size(*batch_size),
            ))
        }
        #[cfg(feature = "local-embeddings")]
        EmbeddingConfig::Fastembed { model } => Ok(Arc::new(FastEmbedder::new(model)?)),
        #[cfg(not(feature = "local-embeddings"))]
        EmbeddingConfig::Fastembed { .. } => Err(AppError::Configuration(
            "fastembed embeddings require the `local-embeddings` feature".to_string(),
        )),
    }
}

// ============= Remote (OpenAI-compatible) =============

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

pub struct RemoteEmbedder {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    batch_size: usize,
    dimensions: OnceLock<usize>,
}

impl RemoteEmbedder {
    pub fn new(base_url: String, model: String, api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: format!("{}/embeddings", base_url.trim_end_matches('/')),
            model,
            api_key,
            batch_size: 64,
            dimensions: OnceLock::new(),
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    async fn embed_batch(&self, batch: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut request = self.client.post(&self.endpoint).json(&EmbeddingRequest {
            model: &self.model,
            input: batch,
        });
        if let Some(ref key) = self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AppError::Embedding(format!("Request to {} failed: {}", self.endpoint, e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Embedding(format!(
                "Embedding endpoint returned {}: {}",
                status, body
            )));
        }

        let mut parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| AppError::Embedding(format!("Invalid embedding response: {}", e)))?;

        if parsed.data.len() != batch.len() {
            return Err(AppError::Embedding(format!(
                "Expected {} embeddings, received {}",
                batch.len(),
                parsed.data.len()
            )));
        }

        parsed.data.sort_by_key(|d| d.index);
        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }
}

#[async_trait]
impl Embedder for RemoteEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            vectors.extend(self.embed_batch(batch).await?);
        }

        if let Some(first) = vectors.first() {
            let dims = *self.dimensions.get_or_init(|| first.len());
            if let Some(bad) = vectors.iter().find(|v| v.len() != dims) {
                return Err(AppError::Embedding(format!(
                    "Inconsistent embedding size: expected {}, got {}",
                    dims,
                    bad.len()
                )));
            }
        }

        debug!(count = vectors.len(), model = %self.model, "Embedded texts");
        Ok(vectors)
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> Option<usize> {
        self.dimensions.get().copied()
    }
}

// ============= Local (fastembed) =============

#[cfg(feature = "local-embeddings")]
pub use local::FastEmbedder;

#[cfg(feature = "local-embeddings")]
mod local {
    use super::Embedder;
    use crate::types::{AppError, Result};
    use async_trait::async_trait;
    use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
    use parking_lot::Mutex;
    use std::sync::Arc;

    pub struct FastEmbedder {
        model: Arc<Mutex<TextEmbedding>>,
        name: String,
        dimensions: usize,
    }

    impl FastEmbedder {
        pub fn new(model_name: &str) -> Result<Self> {
            let (model, dimensions) = match model_name {
                "BGESmallENV15" => (EmbeddingModel::BGESmallENV15, 384),
                "BGEBaseENV15" => (EmbeddingModel::BGEBaseENV15, 768),
                "AllMiniLML6V2" => (EmbeddingModel::AllMiniLML6V2, 384),
                other => {
                    return Err(AppError::Configuration(format!(
                        "Unsupported fastembed model '{}' (expected BGESmallENV15, BGEBaseENV15 or AllMiniLML6V2)",
                        other
                    )))
                }
            };

            let embedding = TextEmbedding::try_new(
                InitOptions::new(model).with_show_download_progress(true),
            )
            .map_err(|e| AppError::Embedding(e.to_string()))?;

            Ok(Self {
                model: Arc::new(Mutex::new(embedding)),
                name: model_name.to_string(),
                dimensions,
            })
        }
    }

    #[async_trait]
    impl Embedder for FastEmbedder {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            let model = Arc::clone(&self.model);
            let texts = texts.to_vec();
            // ONNX inference is CPU bound.
            tokio::task::spawn_blocking(move || model.lock().embed(texts, None))
                .await
                .map_err(|e| AppError::Internal(format!("Embedding task failed: {}", e)))?
                .map_err(|e| AppError::Embedding(e.to_string()))
        }

        fn model_name(&self) -> &str {
            &self.name
        }

        fn dimensions(&self) -> Option<usize> {
            Some(self.dimensions)
        }
    }
}
