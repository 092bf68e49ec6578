//! TyTuX - Command your data
//!
//! Main entry point for the CLI application.

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use tytux::cli::repl::render_answer;
use tytux::{Agent, Config, Repl};

/// TyTuX - query New Relic in natural language
#[derive(Parser, Debug)]
#[command(name = "tytux")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Gemini model to use
    #[arg(long, short = 'm')]
    model: Option<String>,

    /// Maximum model calls per question
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    max_iterations: Option<u64>,

    /// Allow GraphQL mutations
    #[arg(long)]
    allow_mutations: bool,

    /// Discover tools from MCP tool servers
    #[arg(long)]
    mcp: bool,

    /// Enable debug output
    #[arg(long, short = 'd')]
    debug: bool,

    /// Single prompt mode (non-interactive)
    #[arg(long, short = 'p')]
    prompt: Option<String>,
}

fn init_logging(debug: bool) {
    let default = if debug { "tytux=info" } else { "tytux=warn" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let _ = dotenvy::dotenv();
    let env_debug = std::env::var("TYTUX_DEBUG")
        .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(false);
    init_logging(args.debug || env_debug);

    // Build configuration
    let mut config = Config::load()?;

    // Apply CLI overrides
    if let Some(model) = args.model {
        config.gemini.model = model;
    }

    if let Some(max) = args.max_iterations {
        config.agent.max_iterations = max as usize;
    }

    if args.allow_mutations {
        config.new_relic.allow_mutations = true;
    }

    if args.mcp {
        config.mcp.enabled = true;
    }

    if args.debug {
        config.agent.debug = true;
    }

    // Single prompt mode
    if let Some(prompt) = args.prompt {
        let mut agent = Agent::with_config(config)?;
        agent.initialize().await?;

        let response = render_answer(agent.process(&prompt).await)?;
        println!("{}", response);
        return Ok(());
    }

    // Interactive REPL mode
    let mut repl = Repl::with_config(config)?;
    repl.run().await?;

    Ok(())
}
