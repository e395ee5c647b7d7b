use crate::types::{AppError, Result};
use sha2::{Digest, Sha256};
use text_splitter::{ChunkConfig, TextSplitter};

/// Splits document text into overlapping chunks.
///
/// Sizes are measured in characters. The splitter prefers semantic
/// boundaries (paragraphs, sentences, words) and only cuts mid-word when a
/// single word exceeds `chunk_size`.
pub struct TextChunker {
    splitter: TextSplitter<text_splitter::Characters>,
    chunk_size: usize,
    chunk_overlap: usize,
}

impl TextChunker {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        let config = ChunkConfig::new(chunk_size)
            .with_overlap(chunk_overlap)
            .map_err(|e| {
                AppError::Configuration(format!(
                    "Invalid chunking parameters (size {}, overlap {}): {}",
                    chunk_size, chunk_overlap, e
                ))
            })?;

        Ok(Self {
            splitter: TextSplitter::new(config),
            chunk_size,
            chunk_overlap,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    pub fn chunk(&self, text: &str) -> Vec<String> {
        self.splitter
            .chunks(text)
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// Stable id for a chunk: the same document text always yields the same ids.
pub fn chunk_id(document_id: &str, index: usize, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(document_id.as_bytes());
    hasher.update([0u8]);
    hasher.update(index.to_le_bytes());
    hasher.update([0u8]);
    hasher.update(text.as_bytes());
    hex::encode(&hasher.finalize()[..16])
}
