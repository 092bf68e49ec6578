//! NerdGraph query executor
//!
//! Sends GraphQL queries to the New Relic endpoint, blocking mutations unless
//! the mutation policy allows them.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::core::config::NewRelicConfig;
use crate::core::{Result, ToolSpec, TytuxError};
use crate::tools::registry::ToolHandler;

/// Keyword that marks a state-changing GraphQL operation
const MUTATION_KEYWORD: &str = "mutation";

/// Introspection query for the schema inspection tool
pub const INTROSPECTION_QUERY: &str = r#"query {
  __schema {
    queryType { name }
    mutationType { name }
    types {
      kind
      name
      description
    }
  }
}"#;

/// Whether a query is a mutation
///
/// Literal prefix check after trimming leading whitespace, ASCII
/// case-insensitive. Leading comments are not skipped.
pub fn is_mutation(query: &str) -> bool {
    let trimmed = query.trim_start();
    trimmed
        .get(..MUTATION_KEYWORD.len())
        .map(|head| head.eq_ignore_ascii_case(MUTATION_KEYWORD))
        .unwrap_or(false)
}

/// A query ready to be sent
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRequest {
    pub query_text: String,
    pub variables: Map<String, Value>,
    pub is_mutation: bool,
}

impl QueryRequest {
    pub fn new(query_text: impl Into<String>) -> Self {
        let query_text = query_text.into();
        let is_mutation = is_mutation(&query_text);
        Self {
            query_text,
            variables: Map::new(),
            is_mutation,
        }
    }

    pub fn with_variables(mut self, variables: Map<String, Value>) -> Self {
        self.variables = variables;
        self
    }
}

/// Request body sent to NerdGraph
#[derive(Debug, Serialize)]
struct GraphQlBody<'a> {
    query: &'a str,
    #[serde(skip_serializing_if = "no_variables")]
    variables: &'a Map<String, Value>,
}

fn no_variables(variables: &&Map<String, Value>) -> bool {
    variables.is_empty()
}

/// Response body from NerdGraph
#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    errors: Option<Vec<Value>>,
}

/// Executes NerdGraph queries
pub struct QueryExecutor {
    client: Client,
    endpoint: String,
    api_key: String,
    account_id: Option<String>,
    allow_mutations: bool,
}

impl QueryExecutor {
    /// Create an executor from configuration
    pub fn from_config(config: &NewRelicConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| TytuxError::config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: url::Url::parse(&config.endpoint)?.to_string(),
            api_key: config.user_api_key.clone(),
            account_id: config.account_id.clone(),
            allow_mutations: config.allow_mutations,
        })
    }

    pub fn allows_mutations(&self) -> bool {
        self.allow_mutations
    }

    pub fn account_id(&self) -> Option<&str> {
        self.account_id.as_deref()
    }

    /// Fill `$accountId` from configuration when the model left it out
    fn inject_account_id(&self, request: &mut QueryRequest) {
        let Some(account_id) = &self.account_id else {
            return;
        };
        if !request.query_text.contains("$accountId")
            || request.variables.contains_key("accountId")
        {
            return;
        }

        let value = account_id
            .parse::<i64>()
            .map(Value::from)
            .unwrap_or_else(|_| Value::String(account_id.clone()));
        request.variables.insert("accountId".to_string(), value);
    }

    /// Execute a query and return its `data` payload unchanged
    pub async fn execute(&self, mut request: QueryRequest) -> Result<Value> {
        if request.is_mutation && !self.allow_mutations {
            warn!("blocked mutation query");
            return Err(TytuxError::MutationBlocked);
        }

        self.inject_account_id(&mut request);
        debug!(endpoint = %self.endpoint, mutation = request.is_mutation, "sending NerdGraph query");

        let body = GraphQlBody {
            query: &request.query_text,
            variables: &request.variables,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header("API-Key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(TytuxError::transport(format!(
                "NerdGraph returned HTTP {}: {}",
                status,
                text.trim()
            )));
        }

        let parsed: GraphQlResponse = serde_json::from_str(&text)
            .map_err(|e| TytuxError::transport(format!("invalid JSON from NerdGraph: {}", e)))?;

        if let Some(errors) = parsed.errors.filter(|errors| !errors.is_empty()) {
            let messages: Vec<String> = errors.iter().map(error_message).collect();
            info!(count = messages.len(), "NerdGraph returned query errors");
            return Err(TytuxError::RemoteQuery(messages));
        }

        Ok(parsed.data.unwrap_or(Value::Null))
    }
}

/// The `message` of a GraphQL error, or the raw error when it has none
fn error_message(error: &Value) -> String {
    match error.get("message").and_then(|m| m.as_str()) {
        Some(message) => message.to_string(),
        None => error.to_string(),
    }
}

/// Arguments accepted by `executeQuery`
#[derive(Debug, Deserialize)]
struct ExecuteQueryArgs {
    query: String,
    #[serde(default)]
    variables: Option<Map<String, Value>>,
}

/// `executeQuery` tool
pub struct ExecuteQueryTool {
    executor: Arc<QueryExecutor>,
}

impl ExecuteQueryTool {
    pub const NAME: &'static str = "executeQuery";

    pub fn new(executor: Arc<QueryExecutor>) -> Self {
        Self { executor }
    }
}

#[async_trait]
impl ToolHandler for ExecuteQueryTool {
    fn spec(&self) -> ToolSpec {
        let mut description =
            "Execute a GraphQL query against the New Relic NerdGraph API and return its data."
                .to_string();
        if !self.executor.allows_mutations() {
            description.push_str(" Mutations are disabled and will be rejected.");
        }

        ToolSpec::new(
            Self::NAME,
            description,
            json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "The GraphQL query to execute"
                    },
                    "variables": {
                        "type": "object",
                        "description": "Variables for the GraphQL query"
                    }
                },
                "required": ["query"]
            }),
        )
    }

    async fn invoke(&self, arguments: Value) -> Result<Value> {
        let args: ExecuteQueryArgs = serde_json::from_value(arguments)
            .map_err(|e| TytuxError::tool(format!("invalid arguments for executeQuery: {}", e)))?;

        let request = QueryRequest::new(args.query).with_variables(args.variables.unwrap_or_default());
        self.executor.execute(request).await
    }
}

/// `introspectSchema` tool
pub struct IntrospectSchemaTool {
    executor: Arc<QueryExecutor>,
}

impl IntrospectSchemaTool {
    pub const NAME: &'static str = "introspectSchema";

    pub fn new(executor: Arc<QueryExecutor>) -> Self {
        Self { executor }
    }
}

#[async_trait]
impl ToolHandler for IntrospectSchemaTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec::new(
            Self::NAME,
            "Inspect the NerdGraph schema: root query and mutation types and the list of available types.",
            json!({ "type": "object", "properties": {} }),
        )
    }

    async fn invoke(&self, _arguments: Value) -> Result<Value> {
        self.executor
            .execute(QueryRequest::new(INTROSPECTION_QUERY))
            .await
    }
}
