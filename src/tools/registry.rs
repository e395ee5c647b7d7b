use crate::agents::reasoning::ReasoningBackend;
use crate::agents::router::SubQuestionRouter;
use crate::partition::PartitionKey;
use crate::rag::query_engine::{Answer, QueryEngine};
use crate::types::{AppError, Result, ToolDefinition};
use crate::utils::toml_config::KeyOrder;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

/// Name of the aggregate tool, always registered last.
pub const AGGREGATE_TOOL_NAME: &str = "sub_question_query_engine";

/// Arguments every tool accepts.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct ToolInput {
    /// The question to answer.
    pub input: String,
}

impl ToolInput {
    /// JSON schema of the arguments, as handed to function-calling models.
    pub fn schema() -> Value {
        let mut schema = schemars::schema_for!(ToolInput);
        if let Some(object) = schema.as_object_mut() {
            object.remove("$schema");
            object.remove("title");
        }
        schema.to_value()
    }

    /// Accept either `{"input": "..."}` or a bare string.
    pub fn from_arguments(arguments: &Value) -> Result<String> {
        if let Value::String(input) = arguments {
            return Ok(input.clone());
        }
        serde_json::from_value::<ToolInput>(arguments.clone())
            .map(|args| args.input)
            .map_err(|e| AppError::InvalidInput(format!("Invalid tool arguments: {}", e)))
    }
}

/// One partition's query engine.
#[derive(Clone)]
pub struct PartitionTool {
    pub key: PartitionKey,
    pub engine: QueryEngine,
}

/// What a tool dispatches to.
#[derive(Clone)]
pub enum ToolHandler {
    Partition(PartitionTool),
    Aggregate(Arc<SubQuestionRouter>),
}

impl ToolHandler {
    pub async fn call(&self, input: &str) -> Result<Answer> {
        match self {
            ToolHandler::Partition(tool) => tool.engine.answer(input).await,
            ToolHandler::Aggregate(router) => {
                let answer = router.query(input).await?;
                Ok(Answer {
                    text: answer.text,
                    sources: answer.sources,
                })
            }
        }
    }

    pub fn is_aggregate(&self) -> bool {
        matches!(self, ToolHandler::Aggregate(_))
    }
}

#[derive(Clone)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub handler: ToolHandler,
}

impl ToolDescriptor {
    pub fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name.clone(),
            description: self.description.clone(),
            parameters: ToolInput::schema(),
        }
    }
}

/// Named, described tools in registration order.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<ToolDescriptor>,
    by_name: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// One tool per partition in `order`, then the aggregate tool.
    ///
    /// Partition tools are named `vector_index_<slug>`. Two keys with the
    /// same slug fail the whole construction with `DuplicateToolName`.
    pub fn for_partitions(
        engines: Vec<(PartitionKey, QueryEngine)>,
        order: KeyOrder,
        corpus: &str,
        reasoning: Arc<dyn ReasoningBackend>,
        dispatch_timeout: Duration,
    ) -> Result<Self> {
        let mut engines = engines;
        engines.sort_by(|(a, _), (b, _)| a.cmp(b));
        if order == KeyOrder::Descending {
            engines.reverse();
        }

        let mut registry = Self::new();
        for (key, engine) in engines {
            registry.register(
                format!("vector_index_{}", key.slug()),
                format!(
                    "useful for when you want to answer queries about the {} {}",
                    key, corpus
                ),
                ToolHandler::Partition(PartitionTool { key, engine }),
            )?;
        }

        let router = SubQuestionRouter::new(reasoning, registry.list().to_vec())
            .with_dispatch_timeout(dispatch_timeout);
        registry.register(
            AGGREGATE_TOOL_NAME,
            format!(
                "useful for when you want to answer queries that require analyzing multiple partitions of the {}",
                corpus
            ),
            ToolHandler::Aggregate(Arc::new(router)),
        )?;

        Ok(registry)
    }

    pub fn register(
        &mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        handler: ToolHandler,
    ) -> Result<()> {
        let name = name.into();
        if self.by_name.contains_key(&name) {
            return Err(AppError::DuplicateToolName(name));
        }
        debug!(tool = %name, "Registered tool");
        self.by_name.insert(name.clone(), self.tools.len());
        self.tools.push(ToolDescriptor {
            name,
            description: description.into(),
            handler,
        });
        Ok(())
    }

    pub fn list(&self) -> &[ToolDescriptor] {
        &self.tools
    }

    pub fn get(&self, name: &str) -> Option<&ToolDescriptor> {
        self.by_name.get(name).map(|&i| &self.tools[i])
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(ToolDescriptor::definition).collect()
    }

    #[instrument(skip(self, input))]
    pub async fn execute(&self, name: &str, input: &str) -> Result<Answer> {
        let tool = self
            .get(name)
            .ok_or_else(|| AppError::NotFound(format!("Tool not found: {}", name)))?;
        tool.handler.call(input).await
    }
}
