//! Convokeep - conversation context store CLI
//!
#![doc = "Main entry point for the Convokeep maintenance CLI."]

use anyhow::Result;

use convokeep::cli::{Cli, Commands};
use convokeep::commands;
use convokeep::config::Config;
use convokeep::logging::init_logging;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    init_logging(cli.verbose, cli.json_logs)?;

    // Load configuration
    let config_path = cli.config.as_deref().unwrap_or("config/config.yaml");
    let config = Config::load(config_path, &cli)?;

    // Validate configuration
    config.validate()?;

    match cli.command {
        Commands::Sessions { command } => {
            commands::sessions::handle_sessions(&config, command)?;
        }
        Commands::Show { id, window, json } => {
            commands::turns::run_show(&config, &id, window, json)?;
        }
        Commands::Append { id, role, text } => {
            tracing::debug!(session = %id, role = %role, "Appending turn");
            commands::turns::run_append(&config, &id, &role, &text).await?;
        }
        Commands::Summarize { id } => {
            tracing::info!(
                session = %id,
                generator = %config.generator.generator_type,
                "Summarizing session"
            );
            commands::turns::run_summarize(&config, &id).await?;
        }
        Commands::Pref { command } => {
            commands::prefs::handle_pref(&config, command)?;
        }
        Commands::Export { id, output } => {
            commands::transfer::run_export(&config, &id, output.as_deref())?;
        }
        Commands::Import { file } => {
            commands::transfer::run_import(&config, &file)?;
        }
    }

    Ok(())
}
