//! Agent orchestrator
//!
//! Alternates between asking the model for its next step and running the
//! tools it requests, recording both in the transcript, until the model gives
//! a final answer or the iteration budget runs out.

use serde_json::Value;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::agent::loop_state::AgentLoopState;
use crate::agent::transcript::Transcript;
use crate::core::{Config, Result, ToolCall, ToolResult, TytuxError};
use crate::llm::{Decision, GeminiClient, ModelClient};
use crate::tools::mcp::{self, DiscoveryReport, McpToolServer};
use crate::tools::query::{ExecuteQueryTool, IntrospectSchemaTool, QueryExecutor, QueryRequest};
use crate::tools::registry::{invoke_resolved, ToolRegistry};

/// Answer used when the model ends with an empty reply
const EMPTY_ANSWER: &str = "I apologize, but I couldn't generate a response.";

/// Run one user turn through the agent loop
///
/// Appends the user turn, then asks `model` for decisions until it returns a
/// final answer (appended and returned) or `max_iterations` model calls have
/// been made. Tool failures never abort the loop; they are recorded as error
/// results for the model to react to.
pub async fn run(
    user_input: &str,
    transcript: &mut Transcript,
    tools: &ToolRegistry,
    model: &dyn ModelClient,
    max_iterations: usize,
) -> Result<String> {
    transcript.push_user(user_input);
    let mut state = AgentLoopState::new(max_iterations);

    while state.should_continue() {
        debug!(
            iteration = state.iteration + 1,
            max = state.max_iterations,
            "asking model"
        );

        let decision = match model.decide(transcript.turns(), tools.list_specs()).await {
            Ok(decision) => decision,
            Err(e) => {
                state.fail();
                return Err(as_model_error(e));
            }
        };
        state.record_model_call();

        match decision {
            Decision::ToolCallBatch { text, calls } if !calls.is_empty() => {
                state.begin_dispatch();
                let calls = assign_call_ids(calls, state.iteration);
                info!(
                    iteration = state.iteration,
                    count = calls.len(),
                    "dispatching tool calls"
                );

                let results = dispatch(tools, &calls).await;
                if let Err(e) = transcript.push_tool_exchange(text, calls, results) {
                    state.fail();
                    return Err(e);
                }
                state.finish_dispatch();
            }
            Decision::FinalAnswer(text) => {
                let answer = if text.trim().is_empty() {
                    EMPTY_ANSWER.to_string()
                } else {
                    text
                };
                transcript.push_assistant(answer.clone());
                state.complete();
                info!(iterations = state.iteration, "final answer");
                return Ok(answer);
            }
            Decision::ToolCallBatch { .. } => {
                transcript.push_assistant(EMPTY_ANSWER);
                state.complete();
                return Ok(EMPTY_ANSWER.to_string());
            }
        }
    }

    state.fail();
    warn!(max = max_iterations, "iteration limit reached without a final answer");
    Err(TytuxError::IterationLimitExceeded(max_iterations))
}

/// Any model-side failure is reported as the model being unavailable
fn as_model_error(err: TytuxError) -> TytuxError {
    match err {
        TytuxError::ModelUnavailable(_) => err,
        other => TytuxError::model(other.to_string()),
    }
}

/// Give every call an id, keeping ids the model supplied
fn assign_call_ids(calls: Vec<ToolCall>, iteration: usize) -> Vec<ToolCall> {
    calls
        .into_iter()
        .enumerate()
        .map(|(index, mut call)| {
            if call.id.is_empty() {
                call.id = ToolCall::local_id(iteration, index);
            }
            call
        })
        .collect()
}

enum Pending {
    Ready(ToolResult),
    Running(JoinHandle<ToolResult>),
}

/// Run a batch of calls concurrently; results come back in call order
///
/// Each invocation is a spawned task, so dropping the caller lets in-flight
/// calls finish while their results are discarded.
async fn dispatch(tools: &ToolRegistry, calls: &[ToolCall]) -> Vec<ToolResult> {
    let pending: Vec<Pending> = calls
        .iter()
        .map(|call| match tools.resolve(&call.name) {
            Ok(tool) => {
                let call = call.clone();
                Pending::Running(tokio::spawn(async move { invoke_resolved(tool, &call).await }))
            }
            Err(e) => {
                warn!(tool = %call.name, error = %e, "cannot dispatch tool call");
                Pending::Ready(ToolResult::error(call, e.to_string()))
            }
        })
        .collect();

    let mut results = Vec::with_capacity(calls.len());
    for (call, pending) in calls.iter().zip(pending) {
        let result = match pending {
            Pending::Ready(result) => result,
            Pending::Running(handle) => handle
                .await
                .unwrap_or_else(|e| ToolResult::error(call, format!("tool task failed: {}", e))),
        };
        debug!(tool = %call.name, id = %call.id, ok = result.is_ok(), "tool finished");
        results.push(result);
    }
    results
}

/// System instruction for the model
pub fn system_instruction(config: &Config) -> String {
    let mut prompt = String::from(
        "You are TyTuX, an assistant that answers questions about a New Relic account. \
         Use the available tools to run NerdGraph (GraphQL) queries, inspect the schema when \
         you are unsure of field names, and explain the results in clear prose. \
         When a query fails, read the exact error message and correct the query.",
    );

    if let Some(account_id) = &config.new_relic.account_id {
        prompt.push_str(&format!(
            "\nUse account ID {} for ongoing queries.",
            account_id
        ));
    }

    if config.new_relic.allow_mutations {
        prompt.push_str("\nMutations are allowed; confirm intent before changing anything.");
    } else {
        prompt.push_str("\nMutations are disabled; only read data.");
    }

    if let Some(extra) = &config.agent.system_prompt {
        prompt.push('\n');
        prompt.push_str(extra);
    }

    prompt
}

/// One conversation session: model, tools and transcript
pub struct Agent {
    /// Configuration
    config: Config,
    /// Model backend
    model: Arc<dyn ModelClient>,
    /// Tool registry
    tools: ToolRegistry,
    /// Conversation history
    transcript: Transcript,
    /// NerdGraph executor shared by the built-in tools
    executor: Arc<QueryExecutor>,
    /// Configured MCP tool servers, connected or not
    servers: Vec<Arc<McpToolServer>>,
}

impl Agent {
    /// Create an agent backed by Gemini
    pub fn with_config(config: Config) -> Result<Self> {
        let gemini = GeminiClient::from_config(&config.gemini)?
            .with_system_instruction(system_instruction(&config));
        Self::with_model(config, Arc::new(gemini))
    }

    /// Create an agent with a custom model client
    pub fn with_model(config: Config, model: Arc<dyn ModelClient>) -> Result<Self> {
        let executor = Arc::new(QueryExecutor::from_config(&config.new_relic)?);

        let mut tools = ToolRegistry::new();
        tools.register_handler(Arc::new(ExecuteQueryTool::new(Arc::clone(&executor))));
        tools.register_handler(Arc::new(IntrospectSchemaTool::new(Arc::clone(&executor))));

        Ok(Self {
            config,
            model,
            tools,
            transcript: Transcript::new(),
            executor,
            servers: Vec::new(),
        })
    }

    /// Discover MCP tool servers, when enabled
    ///
    /// Built-in tools are registered first and keep their names on
    /// collision. Failing servers are skipped with a warning and stay in
    /// [`server_status`](Self::server_status) as disconnected, so
    /// [`reconnect_servers`](Self::reconnect_servers) can retry them.
    pub async fn initialize(&mut self) -> Result<DiscoveryReport> {
        if !self.config.mcp.enabled {
            return Ok(DiscoveryReport::default());
        }

        let servers = self.config.mcp_servers();
        let report = mcp::discover(&mut self.tools, servers, &self.config.mcp).await;
        info!(
            servers = report.connected(),
            tools = report.registered,
            failures = report.failures.len(),
            "tool discovery finished"
        );
        self.servers = report.servers.clone();
        Ok(report)
    }

    /// Process a user message through the agent loop
    pub async fn process(&mut self, user_input: &str) -> Result<String> {
        run(
            user_input,
            &mut self.transcript,
            &self.tools,
            self.model.as_ref(),
            self.config.agent.max_iterations,
        )
        .await
    }

    /// Fetch the NerdGraph schema overview
    pub async fn inspect_schema(&self) -> Result<Value> {
        self.executor
            .execute(QueryRequest::new(crate::tools::query::INTROSPECTION_QUERY))
            .await
    }

    /// Reconnect disconnected tool servers and refresh their tools
    ///
    /// Returns how many servers came back.
    pub async fn reconnect_servers(&mut self) -> usize {
        let mut restored = 0;
        for server in &self.servers {
            if server.is_connected() {
                continue;
            }
            match server.reconnect().await {
                Ok(()) => match self.tools.refresh_remote(server).await {
                    Ok(count) => {
                        info!(server = %server.name(), tools = count, "tool server restored");
                        restored += 1;
                    }
                    Err(e) => warn!(server = %server.name(), error = %e, "tool refresh failed"),
                },
                Err(e) => warn!(server = %server.name(), error = %e, "reconnect failed"),
            }
        }
        restored
    }

    /// Start a fresh conversation
    pub fn reset(&mut self) {
        self.transcript = Transcript::new();
    }

    /// Get the transcript
    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Get the tool registry
    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Get current configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Name of the model backend
    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    /// Name and connection state of every discovered tool server
    pub fn server_status(&self) -> Vec<(String, bool)> {
        self.servers
            .iter()
            .map(|s| (s.name().to_string(), s.is_connected()))
            .collect()
    }
}
