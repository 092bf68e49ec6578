//! CLI commands
//!
//! Special commands that can be executed in the REPL.

use serde_json::Value;

use crate::agent::Agent;
use crate::core::Result;

/// Result of parsing a command
pub enum CommandResult {
    /// Continue processing as normal input
    Continue(String),
    /// Command was handled, show output
    Handled(String),
    /// Exit the REPL
    Exit,
    /// Transcript was reset
    Clear,
}

/// Parse and handle special commands
pub async fn handle_command(input: &str, agent: &mut Agent) -> Result<CommandResult> {
    let input = input.trim();
    let cmd = input.to_lowercase();

    match cmd.as_str() {
        "exit" | "quit" | "q" => Ok(CommandResult::Exit),

        "clear" | "reset" => {
            agent.reset();
            Ok(CommandResult::Clear)
        }

        "help" | "?" => Ok(CommandResult::Handled(help_text())),

        "tools" => {
            let specs = agent.tools().list_specs();
            if specs.is_empty() {
                return Ok(CommandResult::Handled("No tools registered.".to_string()));
            }
            let lines: Vec<String> = specs
                .iter()
                .map(|s| format!("  {:<20} {}", s.name, s.description))
                .collect();
            Ok(CommandResult::Handled(format!(
                "Available tools ({}):\n{}",
                specs.len(),
                lines.join("\n")
            )))
        }

        "schema" => {
            let schema = agent.inspect_schema().await?;
            Ok(CommandResult::Handled(summarize_schema(&schema)))
        }

        "reconnect" => {
            let restored = agent.reconnect_servers().await;
            Ok(CommandResult::Handled(format!(
                "Reconnected {} tool server(s).",
                restored
            )))
        }

        "status" => Ok(CommandResult::Handled(status_text(agent))),

        _ => Ok(CommandResult::Continue(input.to_string())),
    }
}

fn status_text(agent: &Agent) -> String {
    let config = agent.config();
    let mut status = format!(
        "TyTuX Status:\n\
         ─────────────────────────────\n\
         Model:          {}\n\
         Endpoint:       {}\n\
         Account:        {}\n\
         Mutations:      {}\n\
         Max iterations: {}\n\
         Tools:          {}\n\
         History:        {} turns\n\
         Debug:          {}",
        agent.model_name(),
        config.new_relic.endpoint,
        config.new_relic.account_id.as_deref().unwrap_or("(not set)"),
        if config.new_relic.allow_mutations {
            "allowed"
        } else {
            "blocked"
        },
        config.agent.max_iterations,
        agent.tools().len(),
        agent.transcript().len(),
        if config.agent.debug { "on" } else { "off" }
    );

    for (name, connected) in agent.server_status() {
        status.push_str(&format!(
            "\nServer {}: {}",
            name,
            if connected { "connected" } else { "disconnected" }
        ));
    }

    status
}

/// Render the introspection result as a short overview
pub fn summarize_schema(schema: &Value) -> String {
    let root = schema.get("__schema").unwrap_or(schema);
    let root_name = |key: &str| {
        root.get(key)
            .and_then(|t| t.get("name"))
            .and_then(Value::as_str)
            .unwrap_or("(none)")
            .to_string()
    };

    let names: Vec<&str> = root
        .get("types")
        .and_then(Value::as_array)
        .map(|types| {
            types
                .iter()
                .filter_map(|t| t.get("name").and_then(Value::as_str))
                .filter(|name| !name.starts_with("__"))
                .collect()
        })
        .unwrap_or_default();

    format!(
        "Query type:    {}\nMutation type: {}\nTypes ({}):\n  {}",
        root_name("queryType"),
        root_name("mutationType"),
        names.len(),
        names.join(", ")
    )
}

/// Generate help text
fn help_text() -> String {
    r#"TyTuX Commands:
─────────────────────────────────────────────
  help, ?          Show this help message
  exit, quit, q    Exit TyTuX
  clear, reset     Start a new conversation
  tools            List available tools
  schema           Show the NerdGraph schema overview
  status           Show current configuration
  reconnect        Reconnect disconnected tool servers

Anything else is sent to the agent as a question, e.g.
  What is the name of my account?
  How many transactions did the checkout app have today?
─────────────────────────────────────────────"#
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_summarize_schema() {
        let schema = json!({
            "__schema": {
                "queryType": {"name": "RootQueryType"},
                "mutationType": {"name": "RootMutationType"},
                "types": [
                    {"kind": "OBJECT", "name": "Actor"},
                    {"kind": "OBJECT", "name": "__Type"},
                    {"kind": "SCALAR", "name": "EpochMilliseconds"}
                ]
            }
        });

        let summary = summarize_schema(&schema);
        assert!(summary.contains("Query type:    RootQueryType"));
        assert!(summary.contains("Mutation type: RootMutationType"));
        assert!(summary.contains("Types (2):"));
        assert!(summary.contains("Actor, EpochMilliseconds"));
    }

    #[test]
    fn test_summarize_schema_without_mutations() {
        let summary = summarize_schema(&json!({"__schema": {"queryType": {"name": "Q"}, "mutationType": null}}));
        assert!(summary.contains("Mutation type: (none)"));
        assert!(summary.contains("Types (0):"));
    }
}
