//! # partition-rag
//!
//! Question answering over a document corpus split into partitions (fiscal
//! years of an annual report, for instance). Every partition gets its own
//! persistent retrieval index, each index is exposed to the model as a named
//! tool, and an aggregate tool answers questions that span partitions by
//! decomposing them into sub-questions routed to the per-partition tools.
//!
//! ## Quick Start (Library Usage)
//!
//! ```rust,ignore
//! use partition_rag::partition::{CatalogBuilder, IndexBuilder, IndexConfig, PartitionStore};
//! use partition_rag::rag::loader::TemplateSource;
//! use std::sync::Arc;
//!
//! let store = PartitionStore::new("./storage", "collection");
//! let builder = IndexBuilder::new(embedder, IndexConfig::default())?;
//! let source = Arc::new(TemplateSource::new("./data/UBER/UBER_{key}.html"));
//!
//! // Builds missing partitions, restores the rest.
//! let catalog = CatalogBuilder::new(store, builder, source)
//!     .build(&["2022".into(), "2021".into()])
//!     .await;
//! for failure in catalog.failures() {
//!     eprintln!("{}: {}", failure.key, failure.error);
//! }
//! ```
//!
//! ### Tools and the aggregate router
//!
//! ```rust,ignore
//! use partition_rag::{ToolRegistry, LlmReasoner};
//!
//! let registry = ToolRegistry::for_partitions(
//!     engines,
//!     KeyOrder::Descending,
//!     "SEC 10-K for Uber",
//!     Arc::new(LlmReasoner::new(llm.clone())),
//!     Duration::from_secs(120),
//! )?;
//! let answer = registry
//!     .execute("sub_question_query_engine", "Compare revenue growth in 2021 and 2022")
//!     .await?;
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `ollama` | Ollama local inference (default) |
//! | `openai` | OpenAI API and compatible endpoints |
//! | `local-embeddings` | In-process fastembed embedding models |
//!
//! ## Modules
//!
//! - [`partition`] - Partition keys, storage, index build/load and the catalog
//! - [`rag`] - Document loading, chunking, embeddings and the query engine
//! - [`tools`] - Partition tools and the registry
//! - [`agents`] - Sub-question router, reasoning backend and the tool agent
//! - [`llm`] - LLM client implementations
//! - [`cli`] - Command line, output and the interactive session
//! - [`types`] - Common types and error handling
//! - [`utils`] - Configuration and logging

#![cfg_attr(docsrs, feature(doc_cfg))]

/// Sub-question routing and tool-using chat.
pub mod agents;
/// Command line interface and interactive session.
pub mod cli;
/// LLM provider clients and abstractions.
pub mod llm;
/// Partitioned retrieval indices.
pub mod partition;
/// Retrieval Augmented Generation (RAG) components.
pub mod rag;
/// Partition tools and the tool registry.
pub mod tools;
/// Core types and errors.
pub mod types;
/// Configuration and logging utilities.
pub mod utils;

// Re-export commonly used types
pub use agents::{LlmReasoner, ReasoningBackend, SubQuestionRouter, ToolAgent};
pub use llm::{LLMClient, LLMResponse, Provider};
pub use partition::{CatalogBuilder, IndexBuilder, IndexConfig, PartitionKey, PartitionStore};
pub use tools::ToolRegistry;
pub use types::{AppError, Result};
pub use utils::toml_config::AppConfig;
