//! Mock implementations for testing.
//!
//! These stand in for the model-facing collaborators (LLM, embedder,
//! reasoning backend, document source) so the partition and routing logic
//! can be exercised without any network access.

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use parking_lot::Mutex;
use partition_rag::agents::{ReasoningBackend, SubAnswer, SubQuestion};
use partition_rag::llm::{LLMClient, LLMResponse};
use partition_rag::partition::PartitionKey;
use partition_rag::rag::embeddings::Embedder;
use partition_rag::rag::loader::DocumentSource;
use partition_rag::types::{AppError, Document, Message, Result, ToolCall, ToolDefinition};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

type Responder = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Mock LLM client with configurable responses.
///
/// # Examples
///
/// ```ignore
/// // Always answers the same text
/// let client = MockLLMClient::new("Hello, world!");
///
/// // Answers from the prompt
/// let client = MockLLMClient::from_fn(|prompt| first_context_line(prompt));
///
/// // Always fails
/// let client = MockLLMClient::failing();
/// ```
#[derive(Clone)]
pub struct MockLLMClient {
    respond: Responder,
    tool_calls: Vec<ToolCall>,
    native_tools: bool,
    delay: Option<Duration>,
    should_fail: bool,
    prompts: Arc<Mutex<Vec<String>>>,
    completed: Arc<AtomicUsize>,
}

impl MockLLMClient {
    /// Create a new mock client that returns the given response.
    pub fn new(response: &str) -> Self {
        let response = response.to_string();
        Self::from_fn(move |_| response.clone())
    }

    /// Create a mock client whose answer is computed from the prompt.
    pub fn from_fn(f: impl Fn(&str) -> String + Send + Sync + 'static) -> Self {
        Self {
            respond: Arc::new(f),
            tool_calls: vec![],
            native_tools: false,
            delay: None,
            should_fail: false,
            prompts: Arc::new(Mutex::new(Vec::new())),
            completed: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Create a mock client that always returns an error.
    pub fn failing() -> Self {
        Self {
            should_fail: true,
            ..Self::new("")
        }
    }

    /// Report native tool calling and return `tool_calls` from `generate_with_tools`.
    pub fn with_tool_calls(mut self, tool_calls: Vec<ToolCall>) -> Self {
        self.tool_calls = tool_calls;
        self.native_tools = true;
        self
    }

    /// Sleep before every answer.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Every prompt received so far.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }

    /// Calls that got past the delay. Clones share the counter.
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    async fn answer(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().push(prompt.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.completed.fetch_add(1, Ordering::SeqCst);
        if self.should_fail {
            return Err(AppError::LLM("Mock LLM failure".to_string()));
        }
        Ok((self.respond)(prompt))
    }
}

#[async_trait]
impl LLMClient for MockLLMClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.answer(prompt).await
    }

    async fn generate_with_system(&self, system: &str, prompt: &str) -> Result<String> {
        self.answer(&format!("{}\n\n{}", system, prompt)).await
    }

    async fn generate_with_history(&self, messages: &[Message]) -> Result<String> {
        let transcript = messages
            .iter()
            .map(|m| format!("{}: {}", m.role.as_str(), m.content))
            .collect::<Vec<_>>()
            .join("\n");
        self.answer(&transcript).await
    }

    async fn generate_with_tools(
        &self,
        prompt: &str,
        _tools: &[ToolDefinition],
    ) -> Result<LLMResponse> {
        let content = self.answer(prompt).await?;
        let finish_reason = if self.tool_calls.is_empty() {
            "stop"
        } else {
            "tool_calls"
        };

        Ok(LLMResponse {
            content,
            tool_calls: self.tool_calls.clone(),
            finish_reason: finish_reason.to_string(),
        })
    }

    async fn stream(
        &self,
        prompt: &str,
    ) -> Result<Box<dyn futures::Stream<Item = Result<String>> + Send + Unpin>> {
        let response = self.answer(prompt).await?;
        // Split response into chunks for streaming simulation
        let chunks: Vec<String> = response
            .chars()
            .collect::<Vec<_>>()
            .chunks(5)
            .map(|c| c.iter().collect())
            .collect();

        let stream = stream::iter(chunks.into_iter().map(Ok));
        Ok(Box::new(stream.boxed()))
    }

    fn model_name(&self) -> &str {
        "mock-model"
    }

    fn supports_tool_calls(&self) -> bool {
        self.native_tools
    }
}

/// First line of retrieved context in a QA prompt; lets answers reveal
/// which partition they came from.
pub fn first_context_line(prompt: &str) -> String {
    prompt
        .split("---------------------\n")
        .nth(1)
        .and_then(|context| context.lines().next())
        .unwrap_or_default()
        .to_string()
}

/// Deterministic bag-of-words embedder.
///
/// Each lower-cased word is hashed into one of `DIMS` buckets, so texts
/// sharing words score high under cosine similarity.
pub struct MockEmbedder {
    calls: AtomicUsize,
}

impl MockEmbedder {
    pub const DIMS: usize = 64;

    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn vector(text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; Self::DIMS];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            // FNV-1a
            let mut hash: u64 = 0xcbf29ce484222325;
            for byte in word.to_lowercase().bytes() {
                hash ^= u64::from(byte);
                hash = hash.wrapping_mul(0x100000001b3);
            }
            v[(hash % Self::DIMS as u64) as usize] += 1.0;
        }
        // Keep empty text off the zero vector.
        v[0] += 0.01;
        v
    }
}

#[async_trait]
impl Embedder for MockEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts.iter().map(|t| Self::vector(t)).collect())
    }

    fn model_name(&self) -> &str {
        "mock-embedder"
    }

    fn dimensions(&self) -> Option<usize> {
        Some(Self::DIMS)
    }
}

/// Documents per partition key, held in memory.
#[derive(Default, Clone)]
pub struct MapSource {
    documents: HashMap<String, Vec<Document>>,
}

impl MapSource {
    pub fn insert(&mut self, key: &str, documents: Vec<Document>) {
        self.documents.insert(key.to_string(), documents);
    }
}

#[async_trait]
impl DocumentSource for MapSource {
    async fn load(&self, key: &PartitionKey) -> Result<Vec<Document>> {
        self.documents
            .get(key.as_str())
            .cloned()
            .ok_or_else(|| AppError::Document(format!("no documents for {}", key)))
    }
}

/// Reasoning backend that returns a fixed decomposition and synthesizes by
/// listing the sub-answers.
pub struct ScriptedReasoner {
    sub_questions: Vec<SubQuestion>,
    synthesized: AtomicUsize,
}

impl ScriptedReasoner {
    pub fn new(sub_questions: Vec<SubQuestion>) -> Self {
        Self {
            sub_questions,
            synthesized: AtomicUsize::new(0),
        }
    }

    pub fn synthesis_calls(&self) -> usize {
        self.synthesized.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReasoningBackend for ScriptedReasoner {
    async fn decompose(&self, _query: &str, _tools: &[ToolDefinition]) -> Result<Vec<SubQuestion>> {
        Ok(self.sub_questions.clone())
    }

    async fn synthesize(&self, _query: &str, sub_answers: &[SubAnswer]) -> Result<String> {
        self.synthesized.fetch_add(1, Ordering::SeqCst);
        Ok(sub_answers
            .iter()
            .map(|sa| {
                format!(
                    "{} => {}",
                    sa.tool_name,
                    sa.answer.as_deref().unwrap_or("<absent>")
                )
            })
            .collect::<Vec<_>>()
            .join("\n"))
    }
}
