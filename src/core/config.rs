//! Configuration management for TyTuX
//!
//! Settings come from `.env`, an optional TOML file, environment variables and
//! CLI overrides, in increasing priority. Credentials are only ever read from
//! the environment.
//!
//! Config file location: ~/.config/tytux/config.toml

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::PathBuf;

use crate::core::error::{Result, TytuxError};

/// Default NerdGraph endpoint
pub const DEFAULT_NEW_RELIC_ENDPOINT: &str = "https://api.newrelic.com/graphql";

/// Default Gemini REST base URL
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Main configuration for TyTuX
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Gemini model backend
    #[serde(default)]
    pub gemini: GeminiConfig,
    /// New Relic NerdGraph endpoint and credentials
    #[serde(default)]
    pub new_relic: NewRelicConfig,
    /// Agent loop behavior
    #[serde(default)]
    pub agent: AgentConfig,
    /// External MCP tool servers
    #[serde(default)]
    pub mcp: McpConfig,
}

/// Gemini backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeminiConfig {
    /// API key (environment only)
    #[serde(skip)]
    pub api_key: String,
    /// Model name, e.g. `gemini-2.0-flash`
    pub model: String,
    /// REST base URL
    pub base_url: String,
    /// Sampling temperature
    pub temperature: f32,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

/// New Relic NerdGraph configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NewRelicConfig {
    /// User API key (environment only)
    #[serde(skip)]
    pub user_api_key: String,
    /// Account id used for `$accountId` queries
    pub account_id: Option<String>,
    /// GraphQL endpoint
    pub endpoint: String,
    /// Whether mutation queries may be sent
    pub allow_mutations: bool,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

/// Agent behavior configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Maximum model calls per user turn
    /// Default: 5
    pub max_iterations: usize,
    /// Extra text appended to the system instruction
    pub system_prompt: Option<String>,
    /// Whether to show debug output
    pub debug: bool,
}

/// MCP tool server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct McpConfig {
    /// Whether to spawn and discover tool servers at startup
    pub enabled: bool,
    /// Servers to spawn; empty means the default GraphQL server
    pub servers: Vec<McpServerConfig>,
    /// Handshake timeout in seconds
    pub handshake_timeout_secs: u64,
    /// Per-call timeout in seconds
    pub tool_timeout_secs: u64,
}

/// One stdio MCP server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McpServerConfig {
    /// Display name, used in logs and disconnect errors
    pub name: String,
    /// Executable name or path
    pub command: String,
    /// Arguments
    #[serde(default)]
    pub args: Vec<String>,
    /// Extra environment for the child process
    #[serde(default)]
    pub env: HashMap<String, String>,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: "gemini-2.0-flash".to_string(),
            base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            temperature: 0.0,
            timeout_secs: 60,
        }
    }
}

impl Default for NewRelicConfig {
    fn default() -> Self {
        Self {
            user_api_key: String::new(),
            account_id: None,
            endpoint: DEFAULT_NEW_RELIC_ENDPOINT.to_string(),
            allow_mutations: false,
            timeout_secs: 30,
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: 5,
            system_prompt: None,
            debug: false,
        }
    }
}

impl Default for McpConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            servers: Vec::new(),
            handshake_timeout_secs: 15,
            tool_timeout_secs: 60,
        }
    }
}

/// Parse a boolean-ish environment value
fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "on"
    )
}

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("tytux")
    }

    /// Get the config file path
    pub fn config_file() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Load configuration from `.env`, config file and environment
    ///
    /// Fails with [`TytuxError::ConfigMissing`] when a required credential is
    /// absent.
    pub fn load() -> Result<Self> {
        // Try to load .env file if it exists
        let _ = dotenvy::dotenv();

        let mut config = match Self::load_from_file() {
            Ok(Some(config)) => config,
            Ok(None) => Self::default(),
            Err(e) => {
                tracing::warn!("ignoring config file: {}", e);
                Self::default()
            }
        };

        config.apply_env(|key| env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from file only, `None` when there is no file
    pub fn load_from_file() -> Result<Option<Self>> {
        let config_path = Self::config_file();

        if !config_path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|e| TytuxError::config(format!("Failed to read config: {}", e)))?;

        Self::from_toml(&content).map(Some)
    }

    /// Parse the TOML representation
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| TytuxError::config(format!("Failed to parse config: {}", e)))
    }

    /// Overlay environment variables, looked up through `lookup`
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        self.gemini.api_key = lookup("GEMINI_API_KEY")
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| TytuxError::ConfigMissing("GEMINI_API_KEY".to_string()))?;
        self.new_relic.user_api_key = lookup("NEW_RELIC_USER_API_KEY")
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| TytuxError::ConfigMissing("NEW_RELIC_USER_API_KEY".to_string()))?;

        if let Some(account_id) = lookup("NEW_RELIC_ACCOUNT_ID").filter(|v| !v.trim().is_empty())
        {
            self.new_relic.account_id = Some(account_id.trim().to_string());
        }
        if let Some(endpoint) = lookup("NEW_RELIC_API_ENDPOINT").filter(|v| !v.trim().is_empty()) {
            self.new_relic.endpoint = endpoint.trim().to_string();
        }
        if let Some(flag) = lookup("ALLOW_MUTATIONS") {
            self.new_relic.allow_mutations = parse_flag(&flag);
        }
        if let Some(model) = lookup("GEMINI_MODEL").filter(|v| !v.trim().is_empty()) {
            self.gemini.model = model.trim().to_string();
        }
        if let Some(max) = lookup("TYTUX_MAX_ITERATIONS") {
            self.agent.max_iterations = max.trim().parse().map_err(|_| {
                TytuxError::config(format!("TYTUX_MAX_ITERATIONS is not a number: {}", max))
            })?;
        }
        if let Some(flag) = lookup("TYTUX_MCP_ENABLED") {
            self.mcp.enabled = parse_flag(&flag);
        }
        if let Some(flag) = lookup("TYTUX_DEBUG") {
            self.agent.debug = parse_flag(&flag);
        }

        Ok(())
    }

    /// Check settings that cannot be fixed at runtime
    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.new_relic.endpoint)?;
        url::Url::parse(&self.gemini.base_url)?;

        if self.agent.max_iterations == 0 {
            return Err(TytuxError::config("max_iterations must be at least 1"));
        }

        if self.new_relic.account_id.is_none() {
            tracing::warn!("NEW_RELIC_ACCOUNT_ID not set; queries must carry their own account id");
        }

        Ok(())
    }

    /// Tool servers to spawn when MCP is enabled
    ///
    /// Falls back to the `mcp-graphql` server pointed at the NerdGraph
    /// endpoint with the user API key.
    pub fn mcp_servers(&self) -> Vec<McpServerConfig> {
        if !self.mcp.servers.is_empty() {
            return self.mcp.servers.clone();
        }

        let headers = serde_json::json!({
            "API-Key": self.new_relic.user_api_key,
            "Content-Type": "application/json",
        });

        let mut env = HashMap::new();
        env.insert("ENDPOINT".to_string(), self.new_relic.endpoint.clone());
        env.insert("HEADERS".to_string(), headers.to_string());
        env.insert(
            "NODE_OPTIONS".to_string(),
            "--disable-warning=ExperimentalWarning".to_string(),
        );

        vec![McpServerConfig {
            name: "graphql".to_string(),
            command: "npx".to_string(),
            args: vec!["mcp-graphql".to_string()],
            env,
        }]
    }

    /// Generate a default config file content for display
    pub fn default_config_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config)
            .unwrap_or_else(|_| String::from("# Error generating config"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.new_relic.endpoint, DEFAULT_NEW_RELIC_ENDPOINT);
        assert!(!config.new_relic.allow_mutations);
        assert_eq!(config.agent.max_iterations, 5);
        assert!(!config.mcp.enabled);
    }

    #[test]
    fn test_missing_gemini_key() {
        let mut config = Config::default();
        let err = config
            .apply_env(env_of(&[("NEW_RELIC_USER_API_KEY", "nr")]))
            .unwrap_err();
        assert!(matches!(err, TytuxError::ConfigMissing(ref v) if v == "GEMINI_API_KEY"));
    }

    #[test]
    fn test_missing_new_relic_key() {
        let mut config = Config::default();
        let err = config
            .apply_env(env_of(&[("GEMINI_API_KEY", "g"), ("NEW_RELIC_USER_API_KEY", " ")]))
            .unwrap_err();
        assert!(matches!(err, TytuxError::ConfigMissing(ref v) if v == "NEW_RELIC_USER_API_KEY"));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config
            .apply_env(env_of(&[
                ("GEMINI_API_KEY", "g"),
                ("NEW_RELIC_USER_API_KEY", "nr"),
                ("NEW_RELIC_ACCOUNT_ID", "1234567"),
                ("NEW_RELIC_API_ENDPOINT", "https://api.eu.newrelic.com/graphql"),
                ("ALLOW_MUTATIONS", "TRUE"),
                ("TYTUX_MAX_ITERATIONS", "8"),
            ]))
            .unwrap();

        assert_eq!(config.gemini.api_key, "g");
        assert_eq!(config.new_relic.account_id.as_deref(), Some("1234567"));
        assert_eq!(config.new_relic.endpoint, "https://api.eu.newrelic.com/graphql");
        assert!(config.new_relic.allow_mutations);
        assert_eq!(config.agent.max_iterations, 8);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_endpoint() {
        let mut config = Config::default();
        config.new_relic.endpoint = "not a url".to_string();
        assert!(matches!(config.validate(), Err(TytuxError::Url(_))));
    }

    #[test]
    fn test_from_toml_with_servers() {
        let config = Config::from_toml(
            r#"
            [agent]
            max_iterations = 3

            [mcp]
            enabled = true

            [[mcp.servers]]
            name = "graphql"
            command = "npx"
            args = ["mcp-graphql"]
            "#,
        )
        .unwrap();

        assert_eq!(config.agent.max_iterations, 3);
        assert!(config.mcp.enabled);
        assert_eq!(config.mcp.servers.len(), 1);
        assert_eq!(config.mcp.tool_timeout_secs, 60);
        assert_eq!(config.gemini.model, "gemini-2.0-flash");
    }

    #[test]
    fn test_default_mcp_server_carries_credentials() {
        let mut config = Config::default();
        config.new_relic.user_api_key = "NRAK-test".to_string();
        let servers = config.mcp_servers();
        assert_eq!(servers.len(), 1);
        assert_eq!(servers[0].command, "npx");
        assert!(servers[0].env["HEADERS"].contains("NRAK-test"));
        assert_eq!(servers[0].env["ENDPOINT"], DEFAULT_NEW_RELIC_ENDPOINT);
    }

    #[test]
    fn test_config_dir() {
        let dir = Config::config_dir();
        assert!(dir.to_string_lossy().contains("tytux"));
    }
}
