use crate::cli::SessionCommand;
use crate::config::Config;
use crate::context::SessionKey;
use crate::error::Result;
use crate::storage::open_store;
use colored::Colorize;
use prettytable::{format, Table};

/// Handle session listing commands
pub fn handle_sessions(config: &Config, command: SessionCommand) -> Result<()> {
    let storage = open_store(&config.storage)?;

    match command {
        SessionCommand::List => {
            let sessions = storage.list()?;

            if sessions.is_empty() {
                println!("{}", "No sessions stored.".yellow());
                return Ok(());
            }

            let mut table = Table::new();
            table.set_format(*format::consts::FORMAT_BORDERS_ONLY);

            table.add_row(prettytable::row![
                "ID".bold(),
                "Turns".bold(),
                "Created".bold(),
                "Last Updated".bold()
            ]);

            for session in sessions {
                let id = if session.id.chars().count() > 40 {
                    format!("{}...", session.id.chars().take(37).collect::<String>())
                } else {
                    session.id
                };
                let created = session.created_at.format("%Y-%m-%d %H:%M").to_string();
                let updated = session.updated_at.format("%Y-%m-%d %H:%M").to_string();

                table.add_row(prettytable::row![id.cyan(), session.turn_count, created, updated]);
            }

            println!("\nSessions:");
            table.printstd();
            println!();
            println!(
                "Use {} to inspect a session.",
                "convokeep show <ID>".cyan()
            );
            println!();
        }
        SessionCommand::Delete { id } => {
            let key = SessionKey::new(id)?;
            if storage.delete(&key)? {
                println!("{}", format!("Deleted session {}", key).green());
            } else {
                println!("{}", format!("No session named {}", key).yellow());
            }
        }
    }

    Ok(())
}
