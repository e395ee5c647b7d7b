//! Partition indices exposed as tools
//!
//! Every partition's query engine becomes a named, described tool, and one
//! aggregate tool answers questions that span partitions by routing
//! sub-questions to the others.
//!
//! # Tool Registry
//!
//! ```ignore
//! let registry = ToolRegistry::for_partitions(engines, KeyOrder::Descending,
//!     "SEC 10-K for Uber", reasoning, Duration::from_secs(120))?;
//! let names: Vec<_> = registry.list().iter().map(|t| t.name.as_str()).collect();
//! // ["vector_index_2022", "vector_index_2021", ..., "sub_question_query_engine"]
//! let answer = registry.execute("vector_index_2021", "What was revenue?").await?;
//! ```

/// Tool descriptors, handlers and the registry.
pub mod registry;

pub use registry::{
    PartitionTool, ToolDescriptor, ToolHandler, ToolInput, ToolRegistry, AGGREGATE_TOOL_NAME,
};
