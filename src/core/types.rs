//! Shared types used across TyTuX modules
//!
//! Conversation turns, tool calls and results, and tool specs.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Who produced a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    Tool,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
            Role::Tool => write!(f, "tool"),
        }
    }
}

/// One entry of the conversation transcript
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    /// Role of the turn's author
    pub role: Role,
    /// Text content (empty for pure tool-call and tool-result turns)
    pub content: String,
    /// Tool calls issued by the assistant
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    /// Results answering the preceding assistant turn's calls
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_results: Vec<ToolResult>,
}

impl Turn {
    /// Create a new user turn
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_results: Vec::new(),
        }
    }

    /// Create a new assistant text turn
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_results: Vec::new(),
        }
    }

    /// Create an assistant turn that requests tool calls
    pub fn assistant_calls(content: impl Into<String>, calls: Vec<ToolCall>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            tool_calls: calls,
            tool_results: Vec::new(),
        }
    }

    /// Create a tool turn carrying results
    pub fn tool(results: Vec<ToolResult>) -> Self {
        Self {
            role: Role::Tool,
            content: String::new(),
            tool_calls: Vec::new(),
            tool_results: results,
        }
    }
}

/// Prefix of ids assigned locally when the model supplies none
const LOCAL_CALL_ID_PREFIX: &str = "call_";

/// `id` unless it is empty or was assigned locally
pub fn model_call_id(id: &str) -> Option<&str> {
    if id.is_empty() || id.starts_with(LOCAL_CALL_ID_PREFIX) {
        None
    } else {
        Some(id)
    }
}

/// A tool call requested by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Identifier correlating this call with its result
    pub id: String,
    /// Name of the tool to invoke
    pub name: String,
    /// JSON object of arguments
    pub arguments: Value,
}

impl ToolCall {
    /// Create a new tool call
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }

    /// Id for the `index`-th call of model call `iteration`
    pub fn local_id(iteration: usize, index: usize) -> String {
        format!("{}{}_{}", LOCAL_CALL_ID_PREFIX, iteration, index)
    }

    /// Id the model supplied itself, if any
    pub fn model_id(&self) -> Option<&str> {
        model_call_id(&self.id)
    }

    /// Get a string argument by key
    pub fn get_string(&self, key: &str) -> Option<String> {
        self.arguments
            .get(key)
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
    }
}

/// Outcome of a single tool invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "payload", rename_all = "lowercase")]
pub enum ToolOutcome {
    Ok(Value),
    Error(String),
}

/// Status half of a [`ToolOutcome`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolStatus {
    Ok,
    Error,
}

/// Result of executing a tool call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// Id of the [`ToolCall`] this answers
    pub call_id: String,
    /// Name of the tool that was called
    pub name: String,
    /// Success payload or error message
    #[serde(flatten)]
    pub outcome: ToolOutcome,
}

impl ToolResult {
    /// Create a successful result
    pub fn ok(call: &ToolCall, payload: Value) -> Self {
        Self {
            call_id: call.id.clone(),
            name: call.name.clone(),
            outcome: ToolOutcome::Ok(payload),
        }
    }

    /// Create a failed result
    pub fn error(call: &ToolCall, message: impl Into<String>) -> Self {
        Self {
            call_id: call.id.clone(),
            name: call.name.clone(),
            outcome: ToolOutcome::Error(message.into()),
        }
    }

    pub fn status(&self) -> ToolStatus {
        match self.outcome {
            ToolOutcome::Ok(_) => ToolStatus::Ok,
            ToolOutcome::Error(_) => ToolStatus::Error,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status() == ToolStatus::Ok
    }
}

/// Definition of a tool that can be called by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    /// Unique name within the registry
    pub name: String,
    /// What the tool does, shown to the model
    pub description: String,
    /// JSON Schema for the arguments object
    pub parameters: Value,
}

impl ToolSpec {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }
}
