//! Tool registry - manages and dispatches tool calls
//!
//! Central hub for registering tools and routing tool calls to handlers.
//! Built-in tools and tools discovered on MCP servers share one name space
//! and one ordered spec list; the first registration of a name wins.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::core::{Result, ToolCall, ToolResult, ToolSpec, TytuxError};
use crate::tools::mcp::McpToolServer;

/// A tool implemented in-process
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Spec presented to the model
    fn spec(&self) -> ToolSpec;

    /// Run the tool with the model-supplied arguments
    async fn invoke(&self, arguments: Value) -> Result<Value>;
}

/// How a registered tool is reached
#[derive(Clone)]
pub enum ToolKind {
    /// Built into this process
    Static(Arc<dyn ToolHandler>),
    /// Served by an external MCP server
    Remote(Arc<McpToolServer>),
}

/// An invocable tool returned by [`ToolRegistry::resolve`]
#[derive(Clone)]
pub struct ResolvedTool {
    name: String,
    kind: ToolKind,
}

impl ResolvedTool {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_remote(&self) -> bool {
        matches!(self.kind, ToolKind::Remote(_))
    }

    /// Invoke the tool
    pub async fn invoke(&self, arguments: Value) -> Result<Value> {
        match &self.kind {
            ToolKind::Static(handler) => handler.invoke(arguments).await,
            ToolKind::Remote(server) => server.call_tool(&self.name, arguments).await,
        }
    }
}

/// Registry of available tools
#[derive(Default)]
pub struct ToolRegistry {
    /// Specs in registration order
    specs: Vec<ToolSpec>,
    /// Dispatch targets, parallel to `specs`
    kinds: Vec<ToolKind>,
    /// Name to position
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an in-process tool under `spec`
    ///
    /// Returns `false` when the name is already taken; the earlier
    /// registration is kept.
    pub fn register(&mut self, spec: ToolSpec, handler: Arc<dyn ToolHandler>) -> bool {
        self.insert(spec, ToolKind::Static(handler))
    }

    /// Register an in-process tool under its own spec
    pub fn register_handler(&mut self, handler: Arc<dyn ToolHandler>) -> bool {
        let spec = handler.spec();
        self.register(spec, handler)
    }

    /// Register a tool served by an MCP server
    pub fn register_remote(&mut self, spec: ToolSpec, server: Arc<McpToolServer>) -> bool {
        self.insert(spec, ToolKind::Remote(server))
    }

    fn insert(&mut self, spec: ToolSpec, kind: ToolKind) -> bool {
        if self.index.contains_key(&spec.name) {
            warn!(tool = %spec.name, "duplicate tool name; keeping the first registration");
            return false;
        }

        debug!(tool = %spec.name, remote = matches!(kind, ToolKind::Remote(_)), "registered tool");
        self.push(spec, kind);
        true
    }

    /// Look up a tool by name
    ///
    /// Fails with `ToolNotFound` for unknown names and `Disconnected` when
    /// the backing tool server is gone.
    pub fn resolve(&self, name: &str) -> Result<ResolvedTool> {
        let idx = *self
            .index
            .get(name)
            .ok_or_else(|| TytuxError::ToolNotFound(name.to_string()))?;

        let kind = self.kinds[idx].clone();
        if let ToolKind::Remote(server) = &kind {
            if !server.is_connected() {
                return Err(TytuxError::Disconnected(server.name().to_string()));
            }
        }

        Ok(ResolvedTool {
            name: name.to_string(),
            kind,
        })
    }

    /// All tool specs, in registration order
    pub fn list_specs(&self) -> &[ToolSpec] {
        &self.specs
    }

    /// Resolve and invoke a call, folding every failure into the result
    pub async fn invoke(&self, call: &ToolCall) -> ToolResult {
        match self.resolve(&call.name) {
            Ok(tool) => invoke_resolved(tool, call).await,
            Err(e) => ToolResult::error(call, e.to_string()),
        }
    }

    /// Replace the tools served by `server` with a fresh listing
    ///
    /// Used after [`McpToolServer::reconnect`]. Returns how many tools the
    /// server now backs.
    pub async fn refresh_remote(&mut self, server: &Arc<McpToolServer>) -> Result<usize> {
        let specs = server.list_tools().await?;
        Ok(self.apply_listing(server, specs))
    }

    /// Merge a server's current listing in place
    ///
    /// Tools still listed keep their position with the updated spec, tools
    /// no longer listed are dropped, new names are appended in listing order.
    fn apply_listing(&mut self, server: &Arc<McpToolServer>, listing: Vec<ToolSpec>) -> usize {
        let mut fresh: HashMap<String, ToolSpec> = listing
            .iter()
            .map(|spec| (spec.name.clone(), spec.clone()))
            .collect();

        let specs = std::mem::take(&mut self.specs);
        let kinds = std::mem::take(&mut self.kinds);
        self.index.clear();

        let mut served = 0;
        for (spec, kind) in specs.into_iter().zip(kinds) {
            let owned_by_server = matches!(&kind, ToolKind::Remote(s) if Arc::ptr_eq(s, server));
            if !owned_by_server {
                self.push(spec, kind);
                continue;
            }
            match fresh.remove(&spec.name) {
                Some(updated) => {
                    self.push(updated, kind);
                    served += 1;
                }
                None => debug!(tool = %spec.name, server = %server.name(), "tool no longer listed"),
            }
        }

        for spec in listing {
            if fresh.remove(&spec.name).is_some() && self.register_remote(spec, Arc::clone(server)) {
                served += 1;
            }
        }
        served
    }

    fn push(&mut self, spec: ToolSpec, kind: ToolKind) {
        self.index.insert(spec.name.clone(), self.specs.len());
        self.specs.push(spec);
        self.kinds.push(kind);
    }

    /// Check if a tool is registered
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

/// Invoke an already resolved tool, converting failure into an error result
pub async fn invoke_resolved(tool: ResolvedTool, call: &ToolCall) -> ToolResult {
    match tool.invoke(call.arguments.clone()).await {
        Ok(payload) => ToolResult::ok(call, payload),
        Err(e) => ToolResult::error(call, e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::McpServerConfig;
    use crate::core::ToolOutcome;
    use serde_json::json;
    use std::collections::HashMap;
    use std::time::Duration;

    struct Echo(&'static str);

    #[async_trait]
    impl ToolHandler for Echo {
        fn spec(&self) -> ToolSpec {
            ToolSpec::new(self.0, "echo", json!({"type": "object", "properties": {}}))
        }

        async fn invoke(&self, arguments: Value) -> Result<Value> {
            Ok(json!({ "tool": self.0, "args": arguments }))
        }
    }

    struct Failing;

    #[async_trait]
    impl ToolHandler for Failing {
        fn spec(&self) -> ToolSpec {
            ToolSpec::new("fail", "always fails", json!({"type": "object"}))
        }

        async fn invoke(&self, _arguments: Value) -> Result<Value> {
            Err(TytuxError::tool("kaput"))
        }
    }

    fn offline_server(name: &str) -> Arc<McpToolServer> {
        Arc::new(McpToolServer::new(
            McpServerConfig {
                name: name.to_string(),
                command: "does-not-matter".to_string(),
                args: Vec::new(),
                env: HashMap::new(),
            },
            Duration::from_secs(1),
            Duration::from_secs(1),
        ))
    }

    #[test]
    fn test_list_specs_keeps_registration_order() {
        let mut registry = ToolRegistry::new();
        for name in ["zeta", "alpha", "mid"] {
            assert!(registry.register_handler(Arc::new(Echo(name))));
        }

        let names: Vec<&str> = registry.list_specs().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_first_registration_wins() {
        let mut registry = ToolRegistry::new();
        assert!(registry.register(
            ToolSpec::new("executeQuery", "built-in", json!({})),
            Arc::new(Echo("builtin")),
        ));
        assert!(!registry.register_remote(
            ToolSpec::new("executeQuery", "remote", json!({})),
            offline_server("graphql"),
        ));

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.list_specs()[0].description, "built-in");
        assert!(!registry.resolve("executeQuery").unwrap().is_remote());
    }

    #[test]
    fn test_resolve_unknown_tool() {
        let registry = ToolRegistry::new();
        let err = registry.resolve("nope").err().unwrap();
        assert!(matches!(err, TytuxError::ToolNotFound(ref n) if n == "nope"));
    }

    #[test]
    fn test_resolve_disconnected_remote() {
        let mut registry = ToolRegistry::new();
        registry.register_remote(
            ToolSpec::new("query-graphql", "remote", json!({})),
            offline_server("graphql"),
        );

        let err = registry.resolve("query-graphql").err().unwrap();
        assert!(matches!(err, TytuxError::Disconnected(ref s) if s == "graphql"));
    }

    #[tokio::test]
    async fn test_invoke_folds_errors_into_results() {
        let mut registry = ToolRegistry::new();
        registry.register_handler(Arc::new(Echo("echo")));
        registry.register_handler(Arc::new(Failing));

        let ok = registry.invoke(&ToolCall::new("c0", "echo", json!({"x": 1}))).await;
        assert_eq!(ok.call_id, "c0");
        assert_eq!(
            ok.outcome,
            ToolOutcome::Ok(json!({"tool": "echo", "args": {"x": 1}}))
        );

        let failed = registry.invoke(&ToolCall::new("c1", "fail", json!({}))).await;
        assert_eq!(
            failed.outcome,
            ToolOutcome::Error("Tool execution error: kaput".to_string())
        );

        let missing = registry.invoke(&ToolCall::new("c2", "ghost", json!({}))).await;
        assert_eq!(
            missing.outcome,
            ToolOutcome::Error("Tool not found: ghost".to_string())
        );
    }

    fn names(registry: &ToolRegistry) -> Vec<&str> {
        registry.list_specs().iter().map(|s| s.name.as_str()).collect()
    }

    #[test]
    fn test_refresh_with_same_listing_keeps_order() {
        let server = offline_server("graphql");
        let mut registry = ToolRegistry::new();
        registry.register_handler(Arc::new(Echo("executeQuery")));
        registry.register_remote(ToolSpec::new("remoteA", "", json!({})), Arc::clone(&server));
        registry.register_handler(Arc::new(Echo("late")));
        let before: Vec<String> = names(&registry).into_iter().map(String::from).collect();

        let served = registry.apply_listing(&server, vec![ToolSpec::new("remoteA", "", json!({}))]);

        assert_eq!(served, 1);
        assert_eq!(names(&registry), before);
        assert!(registry.resolve("remoteA").is_err()); // still offline
        assert_eq!(registry.resolve("late").unwrap().name(), "late");
    }

    #[test]
    fn test_refresh_updates_drops_and_appends() {
        let server = offline_server("graphql");
        let other = offline_server("other");
        let mut registry = ToolRegistry::new();
        registry.register_remote(ToolSpec::new("r1", "old", json!({})), Arc::clone(&server));
        registry.register_handler(Arc::new(Echo("a")));
        registry.register_remote(ToolSpec::new("r2", "", json!({})), Arc::clone(&server));
        registry.register_remote(ToolSpec::new("shared", "other", json!({})), Arc::clone(&other));

        let served = registry.apply_listing(
            &server,
            vec![
                ToolSpec::new("r3", "", json!({})),
                ToolSpec::new("r1", "new", json!({})),
                ToolSpec::new("shared", "mine", json!({})),
            ],
        );

        assert_eq!(served, 2);
        assert_eq!(names(&registry), vec!["r1", "a", "shared", "r3"]);
        assert_eq!(registry.list_specs()[0].description, "new");
        assert_eq!(registry.list_specs()[2].description, "other");
    }

    #[test]
    fn test_empty_listing_removes_server_tools() {
        let server = offline_server("graphql");
        let mut registry = ToolRegistry::new();
        registry.register_handler(Arc::new(Echo("a")));
        registry.register_remote(ToolSpec::new("r1", "", json!({})), Arc::clone(&server));
        registry.register_handler(Arc::new(Echo("b")));

        assert_eq!(registry.apply_listing(&server, Vec::new()), 0);

        assert_eq!(names(&registry), vec!["a", "b"]);
        assert!(!registry.contains("r1"));
        assert_eq!(registry.resolve("b").unwrap().name(), "b");
    }
}
