//! Neochat - terminal chat client for a local Ollama server
//!
#![doc = "Neochat - terminal chat client for a local Ollama server"]
#![doc = "Main entry point for the Neochat application."]

use anyhow::Result;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use neochat::cli::{Cli, Commands, ModelCommand};
use neochat::commands::{self, AppContext};
use neochat::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    // Initialize tracing
    init_tracing(cli.verbose, cli.json_logs);

    // Load configuration
    let config_path = cli.config.as_deref().unwrap_or("config/config.yaml");
    let config = Config::load(config_path, &cli)?;

    // Validate configuration
    config.validate()?;

    let mut ctx = AppContext::open(config, cli.host.as_deref());

    // Execute command
    match cli.command {
        Commands::Chat {
            model,
            conversation,
        } => {
            if let Some(m) = &model {
                tracing::debug!("Using model override: {}", m);
            }
            if let Some(c) = &conversation {
                tracing::debug!("Continuing conversation: {}", c);
            }
            commands::chat::run_chat(ctx, model, conversation).await?;
            Ok(())
        }
        Commands::Models { command } => {
            tracing::info!("Starting model management command");
            match command {
                ModelCommand::List { json } => {
                    commands::models::list_models(&ctx, json).await?;
                    Ok(())
                }
                ModelCommand::Select { model } => {
                    commands::models::select_model(&mut ctx, &model).await?;
                    Ok(())
                }
            }
        }
        Commands::History { command } => {
            tracing::info!("Starting history command");
            commands::history::handle_history(&ctx, command)?;
            Ok(())
        }
        Commands::Render { file } => {
            commands::render::run_render(file.as_deref())?;
            Ok(())
        }
        Commands::Copy {
            conversation,
            message,
            block,
        } => {
            commands::copy::copy_code_block(&ctx, &conversation, message, block)?;
            Ok(())
        }
        Commands::Settings { command } => {
            commands::settings::handle_settings(&mut ctx, command)?;
            Ok(())
        }
    }
}

/// Initialize tracing subscriber with environment filter
///
/// Logs go to stderr so streamed replies on stdout stay clean.
fn init_tracing(verbose: bool, json: bool) {
    let default_level = if verbose { "neochat=debug" } else { "neochat=info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let registry = tracing_subscriber::registry().with(env_filter);
    if json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}
