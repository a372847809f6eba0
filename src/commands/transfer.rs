use crate::commands::Workspace;
use crate::config::Config;
use crate::error::{ConvokeepError, Result};
use anyhow::Context;
use colored::Colorize;
use std::path::Path;

/// Writes a session snapshot to `output`, or stdout when `None`
pub fn run_export(config: &Config, id: &str, output: Option<&Path>) -> Result<()> {
    let workspace = Workspace::open(config)?;
    workspace.require(id)?;
    let blob = workspace.store.serialize(id)?;

    match output {
        Some(path) => {
            std::fs::write(path, &blob)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!(
                "{}",
                format!("Exported session {} to {}", id, path.display()).green()
            );
        }
        None => println!("{}", blob),
    }

    Ok(())
}

/// Restores a snapshot file and persists it under its own session key
pub fn run_import(config: &Config, file: &Path) -> Result<()> {
    let blob = std::fs::read_to_string(file)
        .map_err(|e| ConvokeepError::Storage(format!("Failed to read {}: {}", file.display(), e)))?;

    let workspace = Workspace::open(config)?;
    let key = workspace.store.restore(&blob)?;
    workspace.save(key.as_str())?;

    println!("{}", format!("Imported session {}", key).green());
    Ok(())
}
