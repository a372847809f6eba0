use crate::commands::Workspace;
use crate::config::Config;
use crate::context::{Role, SummaryOutcome};
use crate::error::Result;
use colored::Colorize;

/// Prints the assembled context of a session
pub fn run_show(config: &Config, id: &str, window: Option<usize>, json: bool) -> Result<()> {
    let workspace = Workspace::open(config)?;
    workspace.require(id)?;

    let mut context = workspace.store.get_relevant_context(id, "");
    if let Some(window) = window {
        context.recent_context = workspace
            .store
            .session(id)
            .map(|session| session.prompt_window(window))
            .unwrap_or_default();
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&context)?);
    } else if context.is_empty() {
        println!("{}", format!("Session {} is empty.", id).yellow());
    } else {
        println!("{}", context.to_prompt_text());
    }

    Ok(())
}

/// Appends a turn and summarizes when the unfolded log grows past the
/// threshold
pub async fn run_append(config: &Config, id: &str, role: &str, text: &str) -> Result<()> {
    let role: Role = role.parse()?;
    let workspace = Workspace::open(config)?;
    workspace.load(id)?;

    workspace.store.append_message(id, role, text)?;

    let unfolded = workspace
        .store
        .session(id)
        .map(|s| s.unfolded().len())
        .unwrap_or(0);
    if workspace.auto_summarize && unfolded > workspace.summarize_threshold {
        let outcome = workspace.store.maybe_summarize(id).await;
        tracing::info!(session = id, %outcome, "Summarized after append");
    }

    workspace.save(id)?;
    println!("{}", format!("Appended {} turn to {}", role, id).green());
    Ok(())
}

/// Folds older turns of a session into its summary
pub async fn run_summarize(config: &Config, id: &str) -> Result<()> {
    let workspace = Workspace::open(config)?;
    workspace.require(id)?;

    let outcome = workspace.store.maybe_summarize(id).await;
    match outcome {
        SummaryOutcome::Updated { folded } => {
            workspace.save(id)?;
            println!("{}", format!("Folded {} turns into the summary", folded).green());
            if let Some(summary) = workspace.store.summary(id) {
                println!("\n{}", summary);
            }
        }
        SummaryOutcome::NothingToFold => {
            println!("{}", "Nothing to fold.".yellow());
        }
        other => {
            println!("{}", format!("Summary unchanged: {}", other).yellow());
        }
    }

    Ok(())
}
