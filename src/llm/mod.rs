//! LLM Provider Clients and Abstractions
//!
//! Every model interaction in the crate goes through the [`LLMClient`] trait:
//! the single-index query engine, the sub-question reasoning backend and the
//! tool-calling chat agent.
//!
//! # Supported Providers
//!
//! Enable providers via Cargo features:
//! - `ollama` - Local Ollama server (default)
//! - `openai` - OpenAI API and compatible endpoints

/// Core LLM client trait and provider selection.
pub mod client;

#[cfg(feature = "ollama")]
pub mod ollama;

#[cfg(feature = "openai")]
pub mod openai;

pub use client::{LLMClient, LLMResponse, Provider};
