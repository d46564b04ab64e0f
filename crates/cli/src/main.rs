//! Profrag CLI
//!
//! Main entry point for the professor review assistant.
//! Provides ingestion, ad-hoc review search, terminal chat and the HTTP server.

mod commands;
mod render;
mod server;
mod services;

use clap::{Parser, Subcommand};
use commands::{
    AskCommand, ChatCommand, HistoryCommand, IngestCommand, SearchCommand, ServeCommand,
};
use profrag_core::{
    config::AppConfig,
    logging::{self, LogFormat},
    AppResult,
};
use std::path::PathBuf;

/// Profrag - answers questions about professors from student reviews
#[derive(Parser, Debug)]
#[command(name = "profrag")]
#[command(about = "Professor review assistant with retrieval-augmented chat", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to workspace directory (default: current directory)
    #[arg(short, long, global = true, env = "PROFRAG_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to config file
    #[arg(short, long, global = true, env = "PROFRAG_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Log format (text, json)
    #[arg(long, global = true)]
    log_format: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    no_color: bool,

    /// Chat model provider (groq, openai, ollama)
    #[arg(short, long, global = true, env = "PROFRAG_PROVIDER")]
    provider: Option<String>,

    /// Model identifier
    #[arg(short, long, global = true, env = "PROFRAG_MODEL")]
    model: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Embed reviews and load them into the vector index
    Ingest(IngestCommand),

    /// Show the reviews retrieved for a query
    Search(SearchCommand),

    /// Ask a single question
    Ask(AskCommand),

    /// Interactive chat in the terminal
    Chat(ChatCommand),

    /// Serve the chat over HTTP with Server-Sent Events
    Serve(ServeCommand),

    /// List or show saved conversations
    History(HistoryCommand),
}

#[tokio::main]
async fn main() -> AppResult<()> {
    // Parse command-line arguments first (needed for logging config)
    let cli = Cli::parse();

    // Defaults, then the workspace YAML file, then environment
    let config = AppConfig::load_from(cli.workspace.clone(), cli.config.clone())?;

    // Apply CLI overrides
    let mut config = config.with_overrides(
        cli.workspace,
        cli.config,
        cli.provider,
        cli.model,
        cli.log_level,
        cli.verbose,
        cli.no_color,
    );
    if let Some(format) = cli.log_format {
        config.log_format = format;
    }

    logging::init_logging(
        config.log_level.as_deref(),
        config.no_color,
        LogFormat::parse(&config.log_format),
    )?;

    tracing::info!("Profrag CLI starting");
    tracing::debug!("Workspace: {:?}", config.workspace);
    tracing::debug!("Provider: {}", config.provider);
    tracing::debug!("Model: {}", config.model);

    config.validate()?;
    config.ensure_state_dir()?;

    let command_name = match &cli.command {
        Commands::Ingest(_) => "ingest",
        Commands::Search(_) => "search",
        Commands::Ask(_) => "ask",
        Commands::Chat(_) => "chat",
        Commands::Serve(_) => "serve",
        Commands::History(_) => "history",
    };
    let _span = tracing::info_span!("command", name = command_name).entered();

    let result = match cli.command {
        Commands::Ingest(cmd) => cmd.execute(&config).await,
        Commands::Search(cmd) => cmd.execute(&config).await,
        Commands::Ask(cmd) => cmd.execute(&config).await,
        Commands::Chat(cmd) => cmd.execute(&config).await,
        Commands::Serve(cmd) => cmd.execute(&config).await,
        Commands::History(cmd) => cmd.execute(&config).await,
    };

    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed: {}", e),
    }

    result
}
