//! Model client trait for abstracting language-model backends
//!
//! The agent loop only depends on [`ModelClient`], so Gemini can be swapped
//! for a scripted client in tests.

use async_trait::async_trait;

use crate::core::{Result, ToolCall, ToolSpec, Turn};

/// What the model wants to do next
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// A natural-language answer; ends the loop
    FinalAnswer(String),
    /// Tool invocations, in the order the model requested them, plus any
    /// text the model sent alongside
    ToolCallBatch { text: String, calls: Vec<ToolCall> },
}

impl Decision {
    /// A tool batch with no accompanying text
    pub fn tool_calls(calls: Vec<ToolCall>) -> Self {
        Decision::ToolCallBatch {
            text: String::new(),
            calls,
        }
    }

    pub fn is_final(&self) -> bool {
        matches!(self, Decision::FinalAnswer(_))
    }
}

/// Trait for language-model backends
///
/// Implementations are stateless between calls: the full transcript and the
/// full tool list are sent every time. Transport failures surface as
/// [`TytuxError::ModelUnavailable`](crate::core::TytuxError::ModelUnavailable)
/// and are never retried here.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Decide the next step given the conversation so far
    async fn decide(&self, transcript: &[Turn], tools: &[ToolSpec]) -> Result<Decision>;

    /// Get the backend name
    fn name(&self) -> &str;
}
