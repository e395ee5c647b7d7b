//! Question decomposition and answer synthesis.

use crate::llm::LLMClient;
use crate::rag::query_engine::qa_prompt;
use crate::types::{AppError, Result, Source, ToolDefinition};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

/// A question routed to one partition tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubQuestion {
    pub sub_question: String,
    pub tool_name: String,
}

impl SubQuestion {
    pub fn new(sub_question: impl Into<String>, tool_name: impl Into<String>) -> Self {
        Self {
            sub_question: sub_question.into(),
            tool_name: tool_name.into(),
        }
    }
}

/// Outcome of one dispatched sub-question. `answer` is `None` when the tool
/// was unknown, failed or timed out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubAnswer {
    pub question: String,
    pub tool_name: String,
    pub answer: Option<String>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReasoningBackend: Send + Sync {
    /// Split `query` into questions that each target one of `tools`.
    async fn decompose(&self, query: &str, tools: &[ToolDefinition]) -> Result<Vec<SubQuestion>>;

    /// Combine the sub-answers into an answer to `query`.
    async fn synthesize(&self, query: &str, sub_answers: &[SubAnswer]) -> Result<String>;
}

/// [`ReasoningBackend`] driven by prompting a chat model.
pub struct LlmReasoner {
    llm: Arc<dyn LLMClient>,
}

impl LlmReasoner {
    pub fn new(llm: Arc<dyn LLMClient>) -> Self {
        Self { llm }
    }

    fn decompose_prompt(query: &str, tools: &[ToolDefinition]) -> String {
        let tools_json = serde_json::to_string_pretty(
            &tools
                .iter()
                .map(|t| serde_json::json!({ "name": t.name, "description": t.description }))
                .collect::<Vec<_>>(),
        )
        .unwrap_or_default();

        format!(
            r#"Given a user question and a list of tools, output a list of relevant sub-questions in JSON.
Each sub-question must be answerable by exactly one tool, and together they must be enough to answer the user question.
Only use tool names from the list.
If no tool applies, output {{"items": []}}

# Example
<Tools>
[
  {{"name": "vector_index_2021", "description": "useful for when you want to answer queries about the 2021 annual report"}},
  {{"name": "vector_index_2020", "description": "useful for when you want to answer queries about the 2020 annual report"}}
]
<User Question>
Compare revenue growth between 2020 and 2021

<Output>
{{"items": [
  {{"sub_question": "What was the revenue growth in 2021?", "tool_name": "vector_index_2021"}},
  {{"sub_question": "What was the revenue growth in 2020?", "tool_name": "vector_index_2020"}}
]}}

# Task
<Tools>
{tools_json}
<User Question>
{query}

<Output>
"#
        )
    }

    fn synthesis_context(sub_answers: &[SubAnswer]) -> Vec<Source> {
        sub_answers
            .iter()
            .map(|sa| Source {
                chunk_id: sa.tool_name.clone(),
                text: format!(
                    "Sub question: {}\nResponse: {}",
                    sa.question,
                    sa.answer
                        .as_deref()
                        .unwrap_or("(no answer available: the partition could not be queried)")
                ),
                score: 1.0,
                metadata: Default::default(),
            })
            .collect()
    }
}

#[async_trait]
impl ReasoningBackend for LlmReasoner {
    async fn decompose(&self, query: &str, tools: &[ToolDefinition]) -> Result<Vec<SubQuestion>> {
        let raw = self.llm.generate(&Self::decompose_prompt(query, tools)).await?;
        let sub_questions = parse_sub_questions(&raw)?;
        debug!(count = sub_questions.len(), "Decomposed question");
        Ok(sub_questions)
    }

    async fn synthesize(&self, query: &str, sub_answers: &[SubAnswer]) -> Result<String> {
        let prompt = qa_prompt(query, &Self::synthesis_context(sub_answers));
        Ok(self.llm.generate(&prompt).await?.trim().to_string())
    }
}

/// Parse model output into sub-questions.
///
/// This handles various output formats:
/// - A bare array: `[{"sub_question": ..., "tool_name": ...}]`
/// - An object wrapper: `{"items": [...]}`
/// - Either of the above inside a code fence or surrounded by prose
///
/// Malformed items are skipped; output with no JSON at all is an error.
pub fn parse_sub_questions(raw: &str) -> Result<Vec<SubQuestion>> {
    let start = raw.find(['[', '{']);
    let end = raw.rfind([']', '}']);
    let json = match (start, end) {
        (Some(start), Some(end)) if start < end => &raw[start..=end],
        _ => {
            return Err(AppError::LLM(format!(
                "Decomposition output contains no JSON: {}",
                raw.trim()
            )))
        }
    };

    let value: Value = serde_json::from_str(json)
        .map_err(|e| AppError::LLM(format!("Decomposition output is not valid JSON: {}", e)))?;
    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut object) => match object.remove("items") {
            Some(Value::Array(items)) => items,
            _ => {
                return Err(AppError::LLM(
                    "Decomposition output has no \"items\" list".to_string(),
                ))
            }
        },
        _ => {
            return Err(AppError::LLM(
                "Decomposition output is not a list".to_string(),
            ))
        }
    };

    Ok(items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<SubQuestion>(item) {
            Ok(sq) => Some(sq),
            Err(e) => {
                warn!(error = %e, "Skipping malformed sub-question");
                None
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_items_wrapper_in_fence() {
        let raw = r#"Here you go:
```json
{"items": [
  {"sub_question": "Revenue in 2021?", "tool_name": "vector_index_2021"},
  {"sub_question": "Revenue in 2020?", "tool_name": "vector_index_2020"}
]}
```"#;
        let parsed = parse_sub_questions(raw).unwrap();
        assert_eq!(
            parsed,
            vec![
                SubQuestion::new("Revenue in 2021?", "vector_index_2021"),
                SubQuestion::new("Revenue in 2020?", "vector_index_2020"),
            ]
        );
    }

    #[test]
    fn test_parse_bare_array_skips_malformed() {
        let raw = r#"[{"sub_question": "q", "tool_name": "t"}, {"question": "x"}]"#;
        assert_eq!(parse_sub_questions(raw).unwrap(), vec![SubQuestion::new("q", "t")]);
    }

    #[test]
    fn test_parse_empty_list() {
        assert!(parse_sub_questions(r#"{"items": []}"#).unwrap().is_empty());
    }

    #[test]
    fn test_parse_prose_is_error() {
        assert!(matches!(
            parse_sub_questions("I cannot help with that."),
            Err(AppError::LLM(_))
        ));
    }

    #[test]
    fn test_decompose_prompt_allows_empty_output() {
        let prompt = LlmReasoner::decompose_prompt("What is the weather?", &[]);
        assert!(prompt.contains(r#"If no tool applies, output {"items": []}"#));
        assert!(prompt.ends_with("What is the weather?\n\n<Output>\n"));
    }

    #[test]
    fn test_synthesis_marks_absent_answers() {
        let context = LlmReasoner::synthesis_context(&[
            SubAnswer {
                question: "a?".to_string(),
                tool_name: "vector_index_2021".to_string(),
                answer: Some("yes".to_string()),
            },
            SubAnswer {
                question: "b?".to_string(),
                tool_name: "vector_index_2020".to_string(),
                answer: None,
            },
        ]);
        assert_eq!(context[0].text, "Sub question: a?\nResponse: yes");
        assert!(context[1].text.contains("no answer available"));
    }
}
