//! Custom error types for TyTuX
//!
//! One taxonomy shared by configuration, the query executor, tool servers,
//! the model client and the agent loop.

use thiserror::Error;

/// Main error type for TyTuX operations
#[derive(Error, Debug)]
pub enum TytuxError {
    /// A required credential or setting is absent
    #[error("Missing required configuration: {0} is not set")]
    ConfigMissing(String),

    /// A setting is present but unusable
    #[error("Configuration error: {0}")]
    Config(String),

    /// A mutation was requested while the mutation policy is disabled
    #[error("Mutation blocked: mutations are disabled (set ALLOW_MUTATIONS=true to enable)")]
    MutationBlocked,

    /// Timeout, refused connection or non-2xx status
    #[error("Transport error: {0}")]
    Transport(String),

    /// The remote API answered with an `errors` list
    #[error("Query error: {}", .0.join("; "))]
    RemoteQuery(Vec<String>),

    /// The model asked for a tool the registry does not know
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    /// The tool server backing a tool is gone
    #[error("Tool server '{0}' is disconnected")]
    Disconnected(String),

    /// A tool ran but reported failure
    #[error("Tool execution error: {0}")]
    ToolExecution(String),

    /// The language model backend could not produce a decision
    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    /// The agent loop ran out of iterations without a final answer
    #[error("No final answer after {0} iteration(s)")]
    IterationLimitExceeded(usize),

    /// JSON parsing errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid endpoint URLs
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

/// Convenience Result type for TyTuX operations
pub type Result<T> = std::result::Result<T, TytuxError>;

/// Payload-free discriminant of [`TytuxError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    ConfigMissing,
    Config,
    MutationBlocked,
    TransportError,
    RemoteQueryError,
    ToolNotFound,
    Disconnected,
    ToolExecution,
    ModelUnavailable,
    IterationLimitExceeded,
    Internal,
}

impl TytuxError {
    /// Create a transport error
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Create a model backend error
    pub fn model(msg: impl Into<String>) -> Self {
        Self::ModelUnavailable(msg.into())
    }

    /// Create a tool execution error
    pub fn tool(msg: impl Into<String>) -> Self {
        Self::ToolExecution(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// The taxonomy bucket this error belongs to
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ConfigMissing(_) => ErrorKind::ConfigMissing,
            Self::Config(_) | Self::Url(_) => ErrorKind::Config,
            Self::MutationBlocked => ErrorKind::MutationBlocked,
            Self::Transport(_) => ErrorKind::TransportError,
            Self::RemoteQuery(_) => ErrorKind::RemoteQueryError,
            Self::ToolNotFound(_) => ErrorKind::ToolNotFound,
            Self::Disconnected(_) => ErrorKind::Disconnected,
            Self::ToolExecution(_) => ErrorKind::ToolExecution,
            Self::ModelUnavailable(_) => ErrorKind::ModelUnavailable,
            Self::IterationLimitExceeded(_) => ErrorKind::IterationLimitExceeded,
            Self::Json(_) | Self::Io(_) => ErrorKind::Internal,
        }
    }

    /// Whether the conversation can carry on after this error
    pub fn is_recoverable(&self) -> bool {
        !matches!(self.kind(), ErrorKind::ConfigMissing | ErrorKind::Config)
    }
}

impl From<reqwest::Error> for TytuxError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Transport(format!("request timed out: {}", err))
        } else if err.is_connect() {
            Self::Transport(format!("connection failed: {}", err))
        } else {
            Self::Transport(err.to_string())
        }
    }
}
