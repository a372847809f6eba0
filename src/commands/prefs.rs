use crate::cli::PrefCommand;
use crate::commands::Workspace;
use crate::config::Config;
use crate::error::Result;
use colored::Colorize;
use serde_json::Value;

/// Parses a CLI value as JSON, falling back to a plain string
///
/// # Examples
///
/// ```
/// use convokeep::commands::prefs::parse_value;
/// use serde_json::json;
///
/// assert_eq!(parse_value("250"), json!(250));
/// assert_eq!(parse_value("[\"tech\"]"), json!(["tech"]));
/// assert_eq!(parse_value("celsius"), json!("celsius"));
/// ```
pub fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

/// Handle preference commands
pub fn handle_pref(config: &Config, command: PrefCommand) -> Result<()> {
    let workspace = Workspace::open(config)?;

    match command {
        PrefCommand::Set { id, key, value } => {
            workspace.load(&id)?;
            let value = parse_value(&value);
            let previous = workspace.store.set_preference(&id, key.as_str(), value.clone())?;
            workspace.save(&id)?;
            match previous {
                Some(old) => println!("{} {} = {} (was {})", "Updated".green(), key, value, old),
                None => println!("{} {} = {}", "Set".green(), key, value),
            }
        }
        PrefCommand::Get { id, key } => {
            workspace.load(&id)?;
            match workspace.store.get_preference(&id, &key) {
                Some(value) => println!("{}", value),
                None => println!("{}", format!("Preference {} is not set", key).yellow()),
            }
        }
        PrefCommand::Remove { id, key } => {
            if workspace.load(&id)? && workspace.store.remove_preference(&id, &key).is_some() {
                workspace.save(&id)?;
                println!("{}", format!("Removed {}", key).green());
            } else {
                println!("{}", format!("Preference {} is not set", key).yellow());
            }
        }
        PrefCommand::List { id } => {
            workspace.load(&id)?;
            let prefs = workspace.store.preferences(&id);
            if prefs.is_empty() {
                println!("{}", "No preferences set.".yellow());
            }
            for (key, value) in prefs {
                println!("{}: {}", key.cyan(), value);
            }
        }
    }

    Ok(())
}
