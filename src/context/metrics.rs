//! Context store metrics
//!
//! Recorded through the `metrics` facade; they are dropped unless the host
//! application installs a recorder.
//!
//! # Metrics
//!
//! - `convokeep_turns_appended_total`: Counter of appended turns by role
//! - `convokeep_summarizations_total`: Counter of summarization passes by outcome
//! - `convokeep_summarization_duration_seconds`: Histogram of generator round trips
//! - `convokeep_sessions_restored_total`: Counter of sessions restored from snapshots

use crate::context::session::Role;
use metrics::{histogram, increment_counter};
use std::time::Duration;

/// Records one appended turn
pub fn record_turn_appended(role: Role) {
    increment_counter!("convokeep_turns_appended_total", "role" => role.to_string());
}

/// Records the outcome of a summarization pass
///
/// `duration` is only present when the generator was actually called.
pub fn record_summarization(outcome: &str, duration: Option<Duration>) {
    increment_counter!(
        "convokeep_summarizations_total",
        "outcome" => outcome.to_string()
    );

    if let Some(duration) = duration {
        histogram!(
            "convokeep_summarization_duration_seconds",
            duration.as_secs_f64(),
            "outcome" => outcome.to_string()
        );
    }
}

/// Records a session restored from a snapshot
pub fn record_session_restored() {
    increment_counter!("convokeep_sessions_restored_total");
}
