use crate::llm::LLMClient;
use crate::tools::{ToolInput, ToolRegistry};
use crate::types::{Message, MessageRole, Result, Source};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Messages kept and replayed to the model on every turn.
pub const HISTORY_WINDOW: usize = 10;

const SYSTEM_PROMPT: &str = "You are a helpful assistant answering questions about a document collection. \
Use the available tools to look facts up instead of relying on prior knowledge.";

#[derive(Debug, Clone, PartialEq)]
pub struct AgentReply {
    pub text: String,
    /// Tool that produced the answer, if one was used.
    pub tool_name: Option<String>,
    pub sources: Vec<Source>,
}

/// Chat agent that answers each message with at most one tool call.
///
/// Models with native function calling pick the tool and its input
/// themselves. Other models are asked to name a tool, and the user's message
/// is passed to it unchanged.
pub struct ToolAgent {
    llm: Arc<dyn LLMClient>,
    registry: Arc<ToolRegistry>,
    history: Mutex<Vec<Message>>,
}

impl ToolAgent {
    pub fn new(llm: Arc<dyn LLMClient>, registry: Arc<ToolRegistry>) -> Self {
        Self {
            llm,
            registry,
            history: Mutex::new(Vec::new()),
        }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn history(&self) -> Vec<Message> {
        self.history.lock().clone()
    }

    pub fn reset(&self) {
        self.history.lock().clear();
    }

    #[instrument(skip(self, message))]
    pub async fn chat(&self, message: &str) -> Result<AgentReply> {
        let recent = self.history();

        let reply = if self.llm.supports_tool_calls() {
            self.chat_native(message, &recent).await?
        } else {
            self.chat_prompted(message, &recent).await?
        };

        let mut history = self.history.lock();
        history.push(Message::new(MessageRole::User, message));
        history.push(Message::new(MessageRole::Assistant, reply.text.clone()));
        let excess = history.len().saturating_sub(HISTORY_WINDOW);
        history.drain(..excess);
        Ok(reply)
    }

    async fn chat_native(&self, message: &str, recent: &[Message]) -> Result<AgentReply> {
        let prompt = format!("{}\n\n{}", SYSTEM_PROMPT, with_transcript(message, recent));
        let response = self
            .llm
            .generate_with_tools(&prompt, &self.registry.definitions())
            .await?;

        let Some(call) = response.tool_calls.first() else {
            return Ok(AgentReply {
                text: response.content.trim().to_string(),
                tool_name: None,
                sources: Vec::new(),
            });
        };

        let input = ToolInput::from_arguments(&call.arguments)?;
        info!(tool = %call.name, "Calling tool");
        let answer = self.registry.execute(&call.name, &input).await?;
        Ok(AgentReply {
            text: answer.text,
            tool_name: Some(call.name.clone()),
            sources: answer.sources,
        })
    }

    async fn chat_prompted(&self, message: &str, recent: &[Message]) -> Result<AgentReply> {
        let names: Vec<&str> = self.registry.list().iter().map(|t| t.name.as_str()).collect();
        let selection = self
            .llm
            .generate_with_system(&self.selection_prompt(), &with_transcript(message, recent))
            .await?;

        if let Some(tool) = parse_tool_choice(&selection, &names) {
            info!(tool = %tool, "Calling tool");
            let answer = self.registry.execute(&tool, message).await?;
            return Ok(AgentReply {
                text: answer.text,
                tool_name: Some(tool),
                sources: answer.sources,
            });
        }

        debug!(selection = %selection.trim(), "No tool selected");
        let mut messages = vec![Message::new(MessageRole::System, SYSTEM_PROMPT)];
        messages.extend_from_slice(recent);
        messages.push(Message::new(MessageRole::User, message));
        let text = self.llm.generate_with_history(&messages).await?;
        Ok(AgentReply {
            text: text.trim().to_string(),
            tool_name: None,
            sources: Vec::new(),
        })
    }

    fn selection_prompt(&self) -> String {
        let tools = self
            .registry
            .list()
            .iter()
            .map(|t| format!("- {}: {}", t.name, t.description))
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            r#"{SYSTEM_PROMPT}

Available tools:
{tools}

Pick the single tool best suited to answer the user's latest message.
Respond with ONLY the tool name, or "none" if no tool is needed."#
        )
    }
}

fn with_transcript(message: &str, recent: &[Message]) -> String {
    if recent.is_empty() {
        return message.to_string();
    }
    let transcript = recent
        .iter()
        .map(|m| format!("{}: {}", m.role.as_str(), m.content))
        .collect::<Vec<_>>()
        .join("\n");
    format!("Conversation so far:\n{}\n\nuser: {}", transcript, message)
}

/// Pick a tool name out of free-form model output.
///
/// This handles various output formats:
/// - Clean output: "vector_index_2021"
/// - With whitespace or quotes: "  `vector_index_2021`  "
/// - With extra text: "I would use vector_index_2021 for this"
///
/// When several names appear, the longest match wins so that
/// `vector_index_20` never shadows `vector_index_2021`.
pub fn parse_tool_choice(output: &str, names: &[&str]) -> Option<String> {
    let trimmed = output
        .trim()
        .trim_matches(|c: char| c == '`' || c == '"' || c == '\'' || c == '.')
        .to_lowercase();

    // First, try exact match
    if let Some(name) = names.iter().find(|n| n.eq_ignore_ascii_case(&trimmed)) {
        return Some(name.to_string());
    }

    // Split by common delimiters and check each word
    for word in trimmed.split(|c: char| {
        c.is_whitespace() || matches!(c, ':' | ',' | '.' | '`' | '"' | '\'' | '(' | ')')
    }) {
        if let Some(name) = names.iter().find(|n| n.eq_ignore_ascii_case(word)) {
            return Some(name.to_string());
        }
    }

    // Check if any tool name is contained in the output
    names
        .iter()
        .filter(|n| trimmed.contains(&n.to_lowercase()))
        .max_by_key(|n| n.len())
        .map(|n| n.to_string())
}
