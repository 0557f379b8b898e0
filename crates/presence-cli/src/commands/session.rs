//! Session lifecycle commands: start, heartbeat and end.

use std::io::Write;

use anyhow::Result;
use presence_core::{
    Actor, EndOutcome, HeartbeatOutcome, SessionContext, SessionStore, end_session, heartbeat,
    start_session,
};

use super::report::format_duration;

/// Starts a session and prints its id.
pub fn start<W: Write, S: SessionStore + ?Sized>(
    writer: &mut W,
    store: &mut S,
    actor: &Actor,
    context: &SessionContext,
) -> Result<String> {
    let session_id = start_session(store, actor, context)?;
    writeln!(writer, "{session_id}")?;
    Ok(session_id)
}

/// Sends one heartbeat. Failures are reported in the log, not as an error.
pub fn beat<S: SessionStore + ?Sized>(store: &mut S, session_id: &str) -> HeartbeatOutcome {
    let outcome = heartbeat(store, session_id);
    tracing::debug!(session_id, ?outcome, "heartbeat");
    outcome
}

/// Describes an end outcome for humans.
pub fn describe_end(outcome: &EndOutcome) -> String {
    match outcome {
        EndOutcome::Closed { duration_seconds } => {
            format!("Session ended after {}.", format_duration(*duration_seconds))
        }
        EndOutcome::AlreadyClosed {
            duration_seconds: Some(duration_seconds),
        } => format!(
            "Session was already ended after {}.",
            format_duration(*duration_seconds)
        ),
        EndOutcome::AlreadyClosed {
            duration_seconds: None,
        } => "Session was already ended.".to_string(),
        EndOutcome::Skipped => "No session id given.".to_string(),
        EndOutcome::NotFound => "Session not found.".to_string(),
        EndOutcome::Failed => "Session could not be ended; see log for details.".to_string(),
    }
}

/// Ends a session and prints the outcome.
pub fn end<W: Write, S: SessionStore + ?Sized>(
    writer: &mut W,
    store: &mut S,
    session_id: &str,
    json: bool,
) -> Result<EndOutcome> {
    let outcome = end_session(store, session_id);
    if json {
        writeln!(writer, "{}", serde_json::to_string(&outcome)?)?;
    } else {
        writeln!(writer, "{}", describe_end(&outcome))?;
    }
    Ok(outcome)
}
