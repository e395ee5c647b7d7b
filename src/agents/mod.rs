//! Query routing and tool use
//!
//! - [`reasoning`] - decomposition into sub-questions and answer synthesis
//! - [`router`] - the aggregate sub-question router behind the
//!   `sub_question_query_engine` tool
//! - [`tool_agent`] - chat agent that answers through the tool registry

pub mod reasoning;
pub mod router;
pub mod tool_agent;

// Re-export commonly used types
pub use reasoning::{LlmReasoner, ReasoningBackend, SubAnswer, SubQuestion};
pub use router::{RouterAnswer, SubQuestionRouter, INSUFFICIENT_INFORMATION};
pub use tool_agent::{AgentReply, ToolAgent};
