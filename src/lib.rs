//! TyTuX - Command your data
//!
//! Ask questions about a New Relic account in natural language. A Gemini
//! model plans NerdGraph (GraphQL) queries through tool calls, the agent runs
//! them and feeds the results back until the model can answer.
//!
//! # Architecture
//!
//! - **Core**: Shared types, configuration, and error handling
//! - **LLM**: Model client abstraction with the Gemini implementation
//! - **Tools**: Tool registry, NerdGraph query executor, MCP tool servers
//! - **Agent**: The agent loop and session state
//! - **CLI**: Command-line REPL
//!
//! # Usage
//!
//! ```rust,no_run
//! use tytux::{Agent, Config};
//!
//! #[tokio::main]
//! async fn main() -> tytux::Result<()> {
//!     let mut agent = Agent::with_config(Config::load()?)?;
//!     agent.initialize().await?;
//!
//!     let answer = agent.process("How many hosts reported in the last hour?").await?;
//!     println!("{}", answer);
//!     Ok(())
//! }
//! ```

pub mod agent;
pub mod cli;
pub mod core;
pub mod llm;
pub mod tools;

// Re-export commonly used items
pub use agent::Agent;
pub use cli::Repl;
pub use core::{Config, ErrorKind, Result, TytuxError};
