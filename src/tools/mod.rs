//! Tools module - Tool implementations for the agent
//!
//! Contains the NerdGraph query tools, MCP tool servers, and the tool registry.

pub mod mcp;
pub mod query;
pub mod registry;

pub use mcp::{discover, DiscoveryReport, McpToolServer};
pub use query::{ExecuteQueryTool, IntrospectSchemaTool, QueryExecutor, QueryRequest};
pub use registry::{ResolvedTool, ToolHandler, ToolKind, ToolRegistry};
