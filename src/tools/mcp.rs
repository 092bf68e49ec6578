//! MCP tool servers
//!
//! Spawns tool servers as child processes and speaks MCP to them over stdio:
//! `serve_client` performs the handshake, then `list_tools` / `call_tool` run
//! on the live service. A server whose transport fails is marked
//! disconnected until [`McpToolServer::reconnect`] succeeds.

use rmcp::model::{
    CallToolRequestParams, ClientCapabilities, Implementation, InitializeRequestParams,
    ProtocolVersion, RawContent,
};
use rmcp::service::{serve_client, RoleClient, RunningService};
use rmcp::transport::child_process::TokioChildProcess;
use rmcp::ServiceError;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::core::config::{McpConfig, McpServerConfig};
use crate::core::{Result, ToolSpec, TytuxError};
use crate::tools::registry::ToolRegistry;

type McpService = RunningService<RoleClient, InitializeRequestParams>;

fn init_params() -> InitializeRequestParams {
    InitializeRequestParams {
        meta: None,
        protocol_version: ProtocolVersion::V_2024_11_05,
        capabilities: ClientCapabilities::default(),
        client_info: Implementation::from_build_env(),
    }
}

/// One external tool server
pub struct McpToolServer {
    config: McpServerConfig,
    handshake_timeout: Duration,
    call_timeout: Duration,
    service: RwLock<Option<Arc<McpService>>>,
    connected: AtomicBool,
}

impl McpToolServer {
    /// Create an unconnected server; call [`connect`](Self::connect) before use
    pub fn new(config: McpServerConfig, handshake_timeout: Duration, call_timeout: Duration) -> Self {
        Self {
            config,
            handshake_timeout,
            call_timeout,
            service: RwLock::new(None),
            connected: AtomicBool::new(false),
        }
    }

    /// Create a server using the timeouts from `mcp`
    pub fn from_config(config: McpServerConfig, mcp: &McpConfig) -> Self {
        Self::new(
            config,
            Duration::from_secs(mcp.handshake_timeout_secs),
            Duration::from_secs(mcp.tool_timeout_secs),
        )
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Spawn the process and run the MCP handshake
    pub async fn connect(&self) -> Result<()> {
        let mut cmd = Command::new(&self.config.command);
        cmd.args(&self.config.args)
            .envs(&self.config.env)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped());

        let (transport, _stderr) = TokioChildProcess::builder(cmd).spawn().map_err(|e| {
            TytuxError::transport(format!(
                "failed to spawn tool server '{}' ({}): {}",
                self.config.name, self.config.command, e
            ))
        })?;

        let service = tokio::time::timeout(self.handshake_timeout, serve_client(init_params(), transport))
            .await
            .map_err(|_| {
                TytuxError::transport(format!(
                    "MCP handshake with '{}' timed out after {:?}",
                    self.config.name, self.handshake_timeout
                ))
            })?
            .map_err(|e| {
                TytuxError::transport(format!("MCP handshake with '{}': {}", self.config.name, e))
            })?;

        *self.service.write().await = Some(Arc::new(service));
        self.connected.store(true, Ordering::SeqCst);
        info!(server = %self.config.name, "connected to tool server");
        Ok(())
    }

    /// Drop the current session and connect again
    pub async fn reconnect(&self) -> Result<()> {
        self.connected.store(false, Ordering::SeqCst);
        self.service.write().await.take();
        self.connect().await
    }

    async fn live_service(&self) -> Result<Arc<McpService>> {
        if !self.is_connected() {
            return Err(TytuxError::Disconnected(self.config.name.clone()));
        }
        self.service
            .read()
            .await
            .as_ref()
            .map(Arc::clone)
            .ok_or_else(|| TytuxError::Disconnected(self.config.name.clone()))
    }

    fn mark_disconnected(&self, detail: &str) {
        if self.connected.swap(false, Ordering::SeqCst) {
            warn!(server = %self.config.name, %detail, "tool server disconnected");
        }
    }

    /// Map a service failure; protocol-level errors keep the connection
    fn service_error(&self, op: &str, err: ServiceError) -> TytuxError {
        match err {
            ServiceError::McpError(data) => {
                TytuxError::tool(format!("{} on '{}': {}", op, self.config.name, data.message))
            }
            other => {
                self.mark_disconnected(&other.to_string());
                TytuxError::Disconnected(self.config.name.clone())
            }
        }
    }

    /// List the server's tools as specs
    pub async fn list_tools(&self) -> Result<Vec<ToolSpec>> {
        let service = self.live_service().await?;
        let list = tokio::time::timeout(self.call_timeout, service.list_tools(None))
            .await
            .map_err(|_| {
                TytuxError::transport(format!("tools/list on '{}' timed out", self.config.name))
            })?
            .map_err(|e| self.service_error("tools/list", e))?;

        Ok(list
            .tools
            .iter()
            .map(|tool| {
                ToolSpec::new(
                    tool.name.to_string(),
                    tool.description.as_deref().unwrap_or_default(),
                    Value::Object(tool.input_schema.as_ref().clone()),
                )
            })
            .collect())
    }

    /// Call a tool; text content is parsed as JSON when possible
    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<Value> {
        let service = self.live_service().await?;
        let params = CallToolRequestParams {
            meta: None,
            name: name.to_string().into(),
            arguments: arguments.as_object().cloned(),
            task: None,
        };

        debug!(server = %self.config.name, tool = name, "calling remote tool");
        let result = tokio::time::timeout(self.call_timeout, service.call_tool(params))
            .await
            .map_err(|_| {
                TytuxError::transport(format!(
                    "tool '{}' on '{}' timed out after {:?}",
                    name, self.config.name, self.call_timeout
                ))
            })?
            .map_err(|e| self.service_error("tools/call", e))?;

        let text: String = result
            .content
            .iter()
            .filter_map(|c| match &c.raw {
                RawContent::Text(t) => Some(t.text.as_str()),
                _ => None,
            })
            .collect();

        if result.is_error.unwrap_or(false) {
            return Err(TytuxError::tool(text));
        }

        Ok(serde_json::from_str(&text).unwrap_or_else(|_| json!(text)))
    }
}

/// Outcome of tool discovery
///
/// `servers` holds every configured server, connected or not, so the ones
/// that failed can be retried with [`McpToolServer::reconnect`].
#[derive(Default)]
pub struct DiscoveryReport {
    pub servers: Vec<Arc<McpToolServer>>,
    pub registered: usize,
    pub failures: Vec<(String, TytuxError)>,
}

impl DiscoveryReport {
    /// Number of servers that are currently connected
    pub fn connected(&self) -> usize {
        self.servers.iter().filter(|s| s.is_connected()).count()
    }

    /// Merge one server's listing into `registry`
    fn merge(
        &mut self,
        registry: &mut ToolRegistry,
        server: Arc<McpToolServer>,
        listed: Result<Vec<ToolSpec>>,
    ) {
        match listed {
            Ok(specs) => {
                for spec in specs {
                    if registry.register_remote(spec, Arc::clone(&server)) {
                        self.registered += 1;
                    }
                }
            }
            Err(e) => {
                warn!(server = %server.name(), error = %e, "tool discovery failed; continuing without it");
                self.failures.push((server.name().to_string(), e));
            }
        }
        self.servers.push(server);
    }
}

/// Connect to every configured server and merge its tools into `registry`
///
/// Servers connect concurrently; tools are merged in configuration order so
/// the resulting spec order is stable. A failing server is logged and
/// skipped.
pub async fn discover(
    registry: &mut ToolRegistry,
    servers: Vec<McpServerConfig>,
    mcp: &McpConfig,
) -> DiscoveryReport {
    let attempts = servers.into_iter().map(|config| async move {
        let server = Arc::new(McpToolServer::from_config(config, mcp));
        let listed = match server.connect().await {
            Ok(()) => server.list_tools().await,
            Err(e) => Err(e),
        };
        (server, listed)
    });

    let mut report = DiscoveryReport::default();
    for (server, listed) in futures::future::join_all(attempts).await {
        report.merge(registry, server, listed);
    }

    report
}
