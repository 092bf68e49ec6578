//! Interactive REPL for TyTuX
//!
//! Provides the main user interaction loop.

use std::io::{self, BufRead, Write};

use crate::agent::Agent;
use crate::cli::commands::{handle_command, CommandResult};
use crate::core::{Config, ErrorKind, Result, TytuxError};

/// Interactive REPL (Read-Eval-Print Loop)
pub struct Repl {
    agent: Agent,
}

impl Repl {
    /// Create a REPL backed by Gemini
    pub fn with_config(config: Config) -> Result<Self> {
        Ok(Self {
            agent: Agent::with_config(config)?,
        })
    }

    /// Create a REPL around an existing agent
    pub fn with_agent(agent: Agent) -> Self {
        Self { agent }
    }

    /// Run the REPL
    pub async fn run(&mut self) -> Result<()> {
        self.print_banner();

        if self.agent.config().mcp.enabled {
            print!("Discovering tool servers...");
            io::stdout().flush()?;
        }

        let report = self.agent.initialize().await?;
        if self.agent.config().mcp.enabled {
            println!(" {} tool(s) from {} server(s)", report.registered, report.connected());
            for (name, err) in &report.failures {
                println!("  Skipped '{}': {}", name, err);
            }
        }
        println!("Ready! {} tool(s) available.\n", self.agent.tools().len());

        let stdin = io::stdin();
        let mut stdout = io::stdout();

        loop {
            print!("You: ");
            stdout.flush()?;

            let mut input = String::new();
            match stdin.lock().read_line(&mut input) {
                Ok(0) => {
                    // EOF (Ctrl+D)
                    println!("\nGoodbye!");
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    eprintln!("Error reading input: {}", e);
                    continue;
                }
            }

            let input = input.trim();
            if input.is_empty() {
                continue;
            }

            match handle_command(input, &mut self.agent).await {
                Ok(CommandResult::Exit) => {
                    println!("\nGoodbye!");
                    break;
                }
                Ok(CommandResult::Clear) => {
                    println!("Conversation cleared.\n");
                }
                Ok(CommandResult::Handled(output)) => {
                    println!("{}\n", output);
                }
                Ok(CommandResult::Continue(question)) => {
                    println!("Processing your request...");
                    tokio::select! {
                        outcome = self.agent.process(&question) => match render_answer(outcome) {
                            Ok(text) => println!("\nTyTuX:\n{}\n", text),
                            Err(e) => println!("\nTyTuX:\n{}\n", apology(&e)),
                        },
                        _ = tokio::signal::ctrl_c() => {
                            println!("\nCancelled.\n");
                        }
                    }
                }
                Err(e) => {
                    println!("{}\n", apology(&e));
                }
            }
        }

        Ok(())
    }

    /// Print the startup banner
    fn print_banner(&self) {
        let config = self.agent.config();

        println!("TyTuX - Command your data");
        println!("─────────────────────────────────────────────");
        println!("Model:     {}", config.gemini.model);
        println!("Endpoint:  {}", config.new_relic.endpoint);
        if let Some(account_id) = &config.new_relic.account_id {
            println!("Account:   {}", account_id);
        }
        println!(
            "Mutations: {}",
            if config.new_relic.allow_mutations {
                "allowed"
            } else {
                "blocked"
            }
        );
        println!();
        println!("Commands: help, tools, schema, status, clear, exit");
        println!("─────────────────────────────────────────────");
    }
}

/// User-facing message for a failed request
pub fn apology(err: &TytuxError) -> String {
    let hint = match err.kind() {
        ErrorKind::MutationBlocked => {
            "Mutations are disabled. Restart with --allow-mutations to change data."
        }
        ErrorKind::IterationLimitExceeded => {
            "The question needed more steps than allowed. Try rephrasing it or asking something narrower."
        }
        ErrorKind::ModelUnavailable => "The model could not be reached. Please try again.",
        ErrorKind::TransportError => "New Relic could not be reached. Please try again.",
        ErrorKind::Disconnected => "A tool server disconnected. Type 'reconnect' and try again.",
        _ => "Please try again or rephrase your question.",
    };
    format!("I apologize, but I encountered an error: {}\n{}", err, hint)
}

/// Text to show for a processed question
///
/// Recoverable errors become an apology; anything else is handed back.
pub fn render_answer(outcome: Result<String>) -> Result<String> {
    match outcome {
        Ok(answer) => Ok(answer),
        Err(e) if e.is_recoverable() => Ok(apology(&e)),
        Err(e) => Err(e),
    }
}
