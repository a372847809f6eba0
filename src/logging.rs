//! Logging setup for the Convokeep binary
//!
//! Human-readable or JSON-formatted `tracing` output on stderr, filtered by
//! `RUST_LOG` when set and by the verbosity flag otherwise. Stdout is left to
//! command output so exported snapshots can be piped.

use anyhow::Result;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default filter directive for a verbosity level
///
/// # Examples
///
/// ```
/// use convokeep::logging::default_directive;
///
/// assert_eq!(default_directive(false), "convokeep=info");
/// assert_eq!(default_directive(true), "convokeep=debug");
/// ```
pub fn default_directive(verbose: bool) -> &'static str {
    if verbose {
        "convokeep=debug"
    } else {
        "convokeep=info"
    }
}

/// Initialize logging
///
/// # Errors
///
/// Returns an error if the filter is invalid or a global subscriber is
/// already installed
pub fn init_logging(verbose: bool, json: bool) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directive(verbose)))?;

    let registry = tracing_subscriber::registry().with(env_filter);

    if json {
        let layer = fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_writer(std::io::stderr);
        registry.with(layer).try_init()?;
    } else {
        let layer = fmt::layer()
            .with_target(true)
            .with_level(true)
            .with_writer(std::io::stderr);
        registry.with(layer).try_init()?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directive_parses() {
        assert!(EnvFilter::try_new(default_directive(false)).is_ok());
        assert!(EnvFilter::try_new(default_directive(true)).is_ok());
    }
}
