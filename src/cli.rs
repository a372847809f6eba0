//! Command-line interface definition for Convokeep
//!
//! This module defines the CLI structure using clap's derive API. The
//! commands operate on sessions persisted in the configured snapshot store.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Convokeep - conversation context store maintenance CLI
///
/// Inspect, edit, summarize, export, and import persisted conversation
/// sessions.
#[derive(Parser, Debug, Clone)]
#[command(name = "convokeep")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/config.yaml")]
    pub config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub json_logs: bool,

    /// Override the snapshot storage path (database file or directory)
    #[arg(long)]
    pub storage_path: Option<String>,

    /// Override the summary generator (extractive, ollama)
    #[arg(short, long)]
    pub generator: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for Convokeep
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// List or delete persisted sessions
    Sessions {
        /// Session subcommand
        #[command(subcommand)]
        command: SessionCommand,
    },

    /// Show the assembled context of a session
    Show {
        /// Session id
        id: String,

        /// Number of recent turns to include (defaults to context.window_size)
        #[arg(short, long)]
        window: Option<usize>,

        /// Print the context as JSON
        #[arg(long)]
        json: bool,
    },

    /// Append a turn to a session
    Append {
        /// Session id
        id: String,

        /// Speaker: human or assistant
        #[arg(short, long, default_value = "human")]
        role: String,

        /// Message text
        #[arg(short, long)]
        text: String,
    },

    /// Fold older turns of a session into its summary
    Summarize {
        /// Session id
        id: String,
    },

    /// Manage session preferences
    Pref {
        /// Preference subcommand
        #[command(subcommand)]
        command: PrefCommand,
    },

    /// Write a session snapshot to a file or stdout
    Export {
        /// Session id
        id: String,

        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Restore a session from a snapshot file and persist it
    Import {
        /// Snapshot file
        file: PathBuf,
    },
}

/// Session listing subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum SessionCommand {
    /// List persisted sessions
    List,

    /// Delete a persisted session
    Delete {
        /// Session id
        id: String,
    },
}

/// Preference subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum PrefCommand {
    /// Set a preference; the value is parsed as JSON, else stored as a string
    Set {
        /// Session id
        id: String,
        /// Preference key
        key: String,
        /// Preference value
        value: String,
    },

    /// Print a preference
    Get {
        /// Session id
        id: String,
        /// Preference key
        key: String,
    },

    /// Remove a preference
    Remove {
        /// Session id
        id: String,
        /// Preference key
        key: String,
    },

    /// List all preferences of a session
    List {
        /// Session id
        id: String,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

impl Default for Cli {
    fn default() -> Self {
        Self {
            config: Some("config/config.yaml".to_string()),
            verbose: false,
            json_logs: false,
            storage_path: None,
            generator: None,
            command: Commands::Sessions {
                command: SessionCommand::List,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_default() {
        let cli = Cli::default();
        assert_eq!(cli.config, Some("config/config.yaml".to_string()));
        assert!(!cli.verbose);
        assert!(matches!(
            cli.command,
            Commands::Sessions {
                command: SessionCommand::List
            }
        ));
    }

    #[test]
    fn test_cli_parse_sessions_list() {
        let cli = Cli::try_parse_from(["convokeep", "sessions", "list"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Sessions {
                command: SessionCommand::List
            }
        ));
    }

    #[test]
    fn test_cli_parse_append() {
        let cli = Cli::try_parse_from([
            "convokeep",
            "append",
            "s1",
            "--role",
            "assistant",
            "--text",
            "Hi Alice!",
        ])
        .unwrap();
        if let Commands::Append { id, role, text } = cli.command {
            assert_eq!(id, "s1");
            assert_eq!(role, "assistant");
            assert_eq!(text, "Hi Alice!");
        } else {
            panic!("Expected Append command");
        }
    }

    #[test]
    fn test_cli_parse_append_defaults_to_human() {
        let cli = Cli::try_parse_from(["convokeep", "append", "s1", "-t", "hello"]).unwrap();
        if let Commands::Append { role, .. } = cli.command {
            assert_eq!(role, "human");
        } else {
            panic!("Expected Append command");
        }
    }

    #[test]
    fn test_cli_parse_append_requires_text() {
        assert!(Cli::try_parse_from(["convokeep", "append", "s1"]).is_err());
    }

    #[test]
    fn test_cli_parse_show_with_options() {
        let cli =
            Cli::try_parse_from(["convokeep", "show", "s1", "--window", "3", "--json"]).unwrap();
        if let Commands::Show { id, window, json } = cli.command {
            assert_eq!(id, "s1");
            assert_eq!(window, Some(3));
            assert!(json);
        } else {
            panic!("Expected Show command");
        }
    }

    #[test]
    fn test_cli_parse_pref_set() {
        let cli = Cli::try_parse_from([
            "convokeep",
            "pref",
            "set",
            "s1",
            "weather_unit",
            "celsius",
        ])
        .unwrap();
        if let Commands::Pref {
            command: PrefCommand::Set { id, key, value },
        } = cli.command
        {
            assert_eq!(id, "s1");
            assert_eq!(key, "weather_unit");
            assert_eq!(value, "celsius");
        } else {
            panic!("Expected Pref Set command");
        }
    }

    #[test]
    fn test_cli_parse_global_overrides() {
        let cli = Cli::try_parse_from([
            "convokeep",
            "--storage-path",
            "/tmp/sessions.db",
            "--generator",
            "ollama",
            "--json-logs",
            "-v",
            "summarize",
            "s1",
        ])
        .unwrap();
        assert_eq!(cli.storage_path.as_deref(), Some("/tmp/sessions.db"));
        assert_eq!(cli.generator.as_deref(), Some("ollama"));
        assert!(cli.json_logs);
        assert!(cli.verbose);
        assert!(matches!(cli.command, Commands::Summarize { .. }));
    }

    #[test]
    fn test_cli_parse_export_and_import() {
        let cli =
            Cli::try_parse_from(["convokeep", "export", "s1", "--output", "s1.json"]).unwrap();
        if let Commands::Export { output, .. } = cli.command {
            assert_eq!(output, Some(PathBuf::from("s1.json")));
        } else {
            panic!("Expected Export command");
        }

        let cli = Cli::try_parse_from(["convokeep", "import", "s1.json"]).unwrap();
        assert!(matches!(cli.command, Commands::Import { .. }));
    }
}
