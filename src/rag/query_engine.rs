use crate::llm::LLMClient;
use crate::partition::PartitionIndex;
use crate::types::{Result, Source};
use futures::Stream;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Answer returned when retrieval finds nothing to ground on.
pub const EMPTY_RESPONSE: &str = "Empty Response";

/// Metadata fields that only matter inside the store.
const HIDDEN_METADATA: &[&str] = &["document_id", "chunk_index"];

/// A grounded answer with the chunks it was generated from.
#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    pub text: String,
    pub sources: Vec<Source>,
}

pub type TokenStream = Box<dyn Stream<Item = Result<String>> + Send + Unpin>;

/// Streamed variant of [`Answer`]. Sources are known before the first token.
pub struct StreamingAnswer {
    pub sources: Vec<Source>,
    pub tokens: TokenStream,
}

/// Retrieve-then-generate over a single partition index.
#[derive(Clone)]
pub struct QueryEngine {
    index: Arc<PartitionIndex>,
    llm: Arc<dyn LLMClient>,
    top_k: usize,
}

impl QueryEngine {
    pub fn new(index: Arc<PartitionIndex>, llm: Arc<dyn LLMClient>, top_k: usize) -> Self {
        Self {
            index,
            llm,
            top_k: top_k.max(1),
        }
    }

    pub fn index(&self) -> &PartitionIndex {
        &self.index
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    #[instrument(skip(self, question), fields(key = %self.index.key()))]
    pub async fn answer(&self, question: &str) -> Result<Answer> {
        let sources = self.index.retrieve(question, self.top_k).await?;
        if sources.is_empty() {
            return Ok(Answer {
                text: EMPTY_RESPONSE.to_string(),
                sources,
            });
        }

        let prompt = qa_prompt(question, &sources);
        let text = self.llm.generate(&prompt).await?;
        debug!(sources = sources.len(), "Answered from partition");
        Ok(Answer {
            text: text.trim().to_string(),
            sources,
        })
    }

    #[instrument(skip(self, question), fields(key = %self.index.key()))]
    pub async fn answer_stream(&self, question: &str) -> Result<StreamingAnswer> {
        let sources = self.index.retrieve(question, self.top_k).await?;
        if sources.is_empty() {
            return Ok(StreamingAnswer {
                sources,
                tokens: Box::new(futures::stream::iter(vec![Ok(EMPTY_RESPONSE.to_string())])),
            });
        }

        let tokens = self.llm.stream(&qa_prompt(question, &sources)).await?;
        Ok(StreamingAnswer { sources, tokens })
    }
}

/// Fill the QA template with the retrieved chunks, best first.
pub fn qa_prompt(question: &str, sources: &[Source]) -> String {
    let context = sources
        .iter()
        .map(|source| {
            let header: Vec<String> = source
                .metadata
                .iter()
                .filter(|(k, _)| !HIDDEN_METADATA.contains(&k.as_str()))
                .map(|(k, v)| format!("{}: {}", k, v))
                .collect();
            if header.is_empty() {
                source.text.clone()
            } else {
                format!("{}\n\n{}", header.join("\n"), source.text)
            }
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "Context information is below.\n\
         ---------------------\n\
         {context}\n\
         ---------------------\n\
         Given the context information and not prior knowledge, answer the query.\n\
         Query: {question}\n\
         Answer: "
    )
}
