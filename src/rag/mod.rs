//! Retrieval Augmented Generation (RAG) pipeline
//!
//! # Module Structure
//!
//! - [`rag::loader`](crate::rag::loader) - Document sources (folders, per-key file templates)
//! - [`rag::chunker`](crate::rag::chunker) - Character-based chunking with overlap
//! - [`rag::embeddings`](crate::rag::embeddings) - Remote and local embedding backends
//! - [`rag::query_engine`](crate::rag::query_engine) - Retrieve-then-generate over one index
//!
//! # Pipeline
//!
//! 1. **Ingestion** - Documents are loaded, tagged with their partition and chunked
//! 2. **Storage** - Chunk embeddings are persisted in the partition's vector database
//! 3. **Retrieval** - The query is embedded and the top-k chunks retrieved
//! 4. **Generation** - The LLM answers from the retrieved context
//!
//! # Example
//!
//! ```ignore
//! use partition_rag::rag::query_engine::QueryEngine;
//!
//! let engine = QueryEngine::new(index, llm, 3);
//! let answer = engine.answer("What was Uber's revenue in 2021?").await?;
//! for source in &answer.sources {
//!     println!("{:.3} {}", source.score, source.chunk_id);
//! }
//! ```

pub mod chunker;
pub mod embeddings;
pub mod loader;
pub mod query_engine;
