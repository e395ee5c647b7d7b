use crate::agents::reasoning::{ReasoningBackend, SubAnswer, SubQuestion};
use crate::rag::query_engine::Answer;
use crate::tools::{PartitionTool, ToolDescriptor, ToolHandler};
use crate::types::{Result, Source, ToolDefinition};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::{debug, instrument, warn};

/// Answer given when no partition contributed evidence.
pub const INSUFFICIENT_INFORMATION: &str =
    "I don't have enough information to answer that question from the available documents.";

/// Default per sub-question time limit.
pub const DEFAULT_DISPATCH_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Clone, PartialEq)]
pub struct RouterAnswer {
    pub text: String,
    /// One entry per sub-question, in decomposition order.
    pub sub_answers: Vec<SubAnswer>,
    /// Chunks behind the successful sub-answers.
    pub sources: Vec<Source>,
}

impl RouterAnswer {
    fn insufficient(sub_answers: Vec<SubAnswer>) -> Self {
        Self {
            text: INSUFFICIENT_INFORMATION.to_string(),
            sub_answers,
            sources: Vec::new(),
        }
    }
}

/// Answers questions spanning several partitions.
///
/// The question is decomposed into `(sub_question, tool_name)` pairs, every
/// pair is dispatched to its partition tool concurrently under a timeout,
/// and the sub-answers are synthesized into one answer. Unknown tools,
/// failures and timeouts leave that sub-answer empty instead of failing the
/// query. Dropping the future returned by [`query`](Self::query) aborts the
/// sub-queries still in flight.
pub struct SubQuestionRouter {
    reasoning: Arc<dyn ReasoningBackend>,
    tools: Vec<(ToolDefinition, PartitionTool)>,
    dispatch_timeout: Duration,
}

impl SubQuestionRouter {
    /// Only partition tools are kept; the router never dispatches to an
    /// aggregate tool.
    pub fn new(reasoning: Arc<dyn ReasoningBackend>, descriptors: Vec<ToolDescriptor>) -> Self {
        let tools = descriptors
            .into_iter()
            .filter_map(|descriptor| {
                let definition = descriptor.definition();
                match descriptor.handler {
                    ToolHandler::Partition(tool) => Some((definition, tool)),
                    ToolHandler::Aggregate(_) => None,
                }
            })
            .collect();

        Self {
            reasoning,
            tools,
            dispatch_timeout: DEFAULT_DISPATCH_TIMEOUT,
        }
    }

    pub fn with_dispatch_timeout(mut self, dispatch_timeout: Duration) -> Self {
        self.dispatch_timeout = dispatch_timeout;
        self
    }

    pub fn dispatch_timeout(&self) -> Duration {
        self.dispatch_timeout
    }

    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.iter().map(|(def, _)| def.name.as_str()).collect()
    }

    fn tool(&self, name: &str) -> Option<&PartitionTool> {
        self.tools
            .iter()
            .find(|(def, _)| def.name == name)
            .map(|(_, tool)| tool)
    }

    #[instrument(skip(self, question))]
    pub async fn query(&self, question: &str) -> Result<RouterAnswer> {
        let definitions: Vec<ToolDefinition> =
            self.tools.iter().map(|(def, _)| def.clone()).collect();
        let sub_questions = self.reasoning.decompose(question, &definitions).await?;
        if sub_questions.is_empty() {
            debug!("No sub-questions generated");
            return Ok(RouterAnswer::insufficient(Vec::new()));
        }

        let answers = self.dispatch(&sub_questions).await;

        let mut sub_answers = Vec::with_capacity(sub_questions.len());
        let mut sources = Vec::new();
        for (sq, answer) in sub_questions.into_iter().zip(answers) {
            let text = answer.map(|a| {
                sources.extend(a.sources);
                a.text
            });
            sub_answers.push(SubAnswer {
                question: sq.sub_question,
                tool_name: sq.tool_name,
                answer: text,
            });
        }

        if sub_answers.iter().all(|sa| sa.answer.is_none()) {
            warn!("Every sub-question failed");
            return Ok(RouterAnswer::insufficient(sub_answers));
        }

        let text = self.reasoning.synthesize(question, &sub_answers).await?;
        Ok(RouterAnswer {
            text,
            sub_answers,
            sources,
        })
    }

    /// Run every sub-question concurrently; the result has one slot per
    /// sub-question in input order.
    async fn dispatch(&self, sub_questions: &[SubQuestion]) -> Vec<Option<Answer>> {
        let mut results: Vec<Option<Answer>> = sub_questions.iter().map(|_| None).collect();
        // Dropping the set aborts whatever is still running.
        let mut set = JoinSet::new();

        for (slot, sq) in sub_questions.iter().enumerate() {
            let Some(tool) = self.tool(&sq.tool_name).cloned() else {
                warn!(tool = %sq.tool_name, "Sub-question names an unknown tool");
                continue;
            };
            let question = sq.sub_question.clone();
            let limit = self.dispatch_timeout;

            set.spawn(async move {
                let outcome = timeout(limit, tool.engine.answer(&question)).await;
                (slot, tool.key, outcome)
            });
        }

        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((slot, _, Ok(Ok(answer)))) => results[slot] = Some(answer),
                Ok((_, key, Ok(Err(e)))) => warn!(key = %key, error = %e, "Sub-question failed"),
                Ok((_, key, Err(_))) => warn!(key = %key, "Sub-question timed out"),
                Err(e) => warn!(error = %e, "Sub-question task did not complete"),
            }
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::reasoning::MockReasoningBackend;

    #[tokio::test]
    async fn test_empty_decomposition_is_insufficient() {
        let mut reasoning = MockReasoningBackend::new();
        reasoning.expect_decompose().returning(|_, _| Ok(vec![]));
        reasoning.expect_synthesize().never();

        let router = SubQuestionRouter::new(Arc::new(reasoning), vec![]);
        let answer = router.query("Compare 2020 and 2021").await.unwrap();
        assert_eq!(answer.text, INSUFFICIENT_INFORMATION);
        assert!(answer.sub_answers.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_tools_yield_absent_answers() {
        let mut reasoning = MockReasoningBackend::new();
        reasoning
            .expect_decompose()
            .returning(|_, _| Ok(vec![SubQuestion::new("Revenue?", "vector_index_1999")]));
        reasoning.expect_synthesize().never();

        let router = SubQuestionRouter::new(Arc::new(reasoning), vec![]);
        let answer = router.query("Revenue in 1999?").await.unwrap();
        assert_eq!(answer.text, INSUFFICIENT_INFORMATION);
        assert_eq!(
            answer.sub_answers,
            vec![SubAnswer {
                question: "Revenue?".to_string(),
                tool_name: "vector_index_1999".to_string(),
                answer: None,
            }]
        );
    }
}
