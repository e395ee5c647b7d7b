//! Scenario wiring and the interactive question loop.

use crate::agents::{LlmReasoner, ToolAgent};
use crate::cli::output::Output;
use crate::llm::{LLMClient, Provider};
use crate::partition::{
    CatalogBuilder, IndexBuilder, IndexConfig, PartitionFailure, PartitionKey, PartitionStore,
};
use crate::rag::embeddings::embedder_from_config;
use crate::rag::loader::{DirectorySource, DocumentSource, TemplateSource};
use crate::rag::query_engine::QueryEngine;
use crate::tools::ToolRegistry;
use crate::types::{AppError, Result};
use crate::utils::toml_config::{AppConfig, ScenarioConfig, ScenarioMode};
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, BufReader, Lines};
use tracing::info;

/// Key of the only partition in a single-index scenario.
pub const SINGLE_PARTITION_KEY: &str = "index";

/// Metadata field recording the partition in single-index scenarios.
const SINGLE_METADATA_KEY: &str = "partition";

/// Input that ends the session.
pub const QUIT: &str = "q";

/// What answers a question in a scenario.
pub enum Responder {
    /// One query engine, answers printed whole or streamed.
    Engine {
        engine: QueryEngine,
        streaming: bool,
    },
    /// Tool agent over the partition tools and the aggregate tool.
    Agent(ToolAgent),
}

/// A ready-to-query scenario.
pub struct Session {
    pub name: String,
    pub responder: Responder,
    /// Partitions that could not be built or loaded.
    pub failures: Vec<PartitionFailure>,
}

impl Session {
    /// Build or restore every index the scenario needs.
    pub async fn prepare(config: &AppConfig, scenario: &ScenarioConfig) -> Result<Self> {
        let llm: Arc<dyn LLMClient> =
            Arc::from(Provider::from_config(config)?.create_client().await?);
        let embedder = embedder_from_config(config)?;
        let store = PartitionStore::new(&scenario.persist_dir, &config.storage.collection);
        let rag = &config.rag;

        let (keys, source, metadata_key): (Vec<PartitionKey>, Arc<dyn DocumentSource>, String) =
            match &scenario.mode {
                ScenarioMode::Single { data_dir } => (
                    vec![PartitionKey::from(SINGLE_PARTITION_KEY)],
                    Arc::new(DirectorySource::new(data_dir)) as Arc<dyn DocumentSource>,
                    SINGLE_METADATA_KEY.to_string(),
                ),
                ScenarioMode::Partitioned {
                    keys,
                    source_template,
                    metadata_key,
                    ..
                } => (
                    keys.iter().map(|k| PartitionKey::new(k.as_str())).collect(),
                    Arc::new(TemplateSource::new(source_template)) as Arc<dyn DocumentSource>,
                    metadata_key.clone(),
                ),
            };

        let index_config = IndexConfig {
            chunk_size: rag.chunk_size,
            chunk_overlap: rag.chunk_overlap,
            similarity_top_k: rag.similarity_top_k,
            metadata_key,
        };
        let catalog = CatalogBuilder::new(store, IndexBuilder::new(embedder, index_config)?, source)
            .with_max_concurrent(rag.max_concurrent_builds)
            .build(&keys)
            .await;
        let (indices, failures) = catalog.into_parts();
        info!(ready = indices.len(), failed = failures.len(), "Partitions prepared");

        let responder = match &scenario.mode {
            ScenarioMode::Single { .. } => {
                let Some((_, index)) = indices.into_iter().next() else {
                    let reason = failures
                        .first()
                        .map(|f| f.error.to_string())
                        .unwrap_or_else(|| "no partition was prepared".to_string());
                    return Err(AppError::Internal(format!(
                        "Scenario '{}' has no usable index: {}",
                        scenario.name, reason
                    )));
                };
                Responder::Engine {
                    engine: QueryEngine::new(index, Arc::clone(&llm), rag.similarity_top_k),
                    streaming: scenario.streaming(rag),
                }
            }
            ScenarioMode::Partitioned { order, corpus, .. } => {
                let engines = indices
                    .into_iter()
                    .map(|(key, index)| {
                        (key, QueryEngine::new(index, Arc::clone(&llm), rag.similarity_top_k))
                    })
                    .collect();
                let registry = ToolRegistry::for_partitions(
                    engines,
                    *order,
                    corpus,
                    Arc::new(LlmReasoner::new(Arc::clone(&llm))),
                    Duration::from_secs(rag.dispatch_timeout_secs),
                )?;
                Responder::Agent(ToolAgent::new(llm, Arc::new(registry)))
            }
        };

        Ok(Self {
            name: scenario.name.clone(),
            responder,
            failures,
        })
    }

    /// Print every partition failure once.
    pub fn report_failures(&self, output: &Output) {
        for failure in &self.failures {
            output.warning(&format!("partition {} unavailable: {}", failure.key, failure.error));
        }
    }

    /// List the tools a chat scenario offers.
    pub fn describe(&self, output: &Output) {
        if let Responder::Agent(agent) = &self.responder {
            output.header("Tools");
            for tool in agent.registry().list() {
                output.list_item(&format!("{}: {}", tool.name, tool.description));
            }
            output.newline();
        }
    }

    /// Answer one question, printing as it goes.
    pub async fn respond(&self, question: &str, output: &Output) -> Result<()> {
        match &self.responder {
            Responder::Engine {
                engine,
                streaming: false,
            } => {
                let answer = engine.answer(question).await?;
                output.answer(&answer.text);
                output.sources(&answer.sources);
            }
            Responder::Engine {
                engine,
                streaming: true,
            } => {
                let mut answer = engine.answer_stream(question).await?;
                output.answer_label();
                while let Some(token) = answer.tokens.next().await {
                    output.token(&token?);
                }
                output.newline();
                output.sources(&answer.sources);
            }
            Responder::Agent(agent) => {
                let reply = agent.chat(question).await?;
                if let Some(tool) = &reply.tool_name {
                    output.tool_used(tool);
                }
                output.answer(&reply.text);
            }
        }
        Ok(())
    }

    /// Read questions from stdin until `q` or end of input.
    pub async fn run(&self, output: &Output) -> Result<()> {
        let mut input = lines(tokio::io::stdin());
        loop {
            output.prompt();
            let Some(question) = next_question(&mut input).await? else {
                break;
            };
            if question.is_empty() {
                continue;
            }
            // A failed question must not end the session.
            if let Err(e) = self.respond(&question, output).await {
                output.error(&e.to_string());
            }
        }
        Ok(())
    }
}

/// The next trimmed line, or `None` at end of input or on the quit command.
pub async fn next_question<R>(lines: &mut Lines<R>) -> Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    let line = lines
        .next_line()
        .await
        .map_err(|e| AppError::Internal(format!("Cannot read input: {}", e)))?;
    Ok(line
        .map(|l| l.trim().to_string())
        .filter(|l| l != QUIT))
}

/// Line reader over any async input.
pub fn lines<R: AsyncRead + Unpin>(input: R) -> Lines<BufReader<R>> {
    BufReader::new(input).lines()
}
