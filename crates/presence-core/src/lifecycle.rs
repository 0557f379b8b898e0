//! Session start, heartbeat and end.
//!
//! `start` surfaces store failures. Heartbeat and end failures are logged and
//! returned as outcomes instead of errors.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::SessionError;
use crate::session::{Actor, Session, SessionContext, SessionPatch, elapsed_seconds};
use crate::store::SessionStore;

/// Result of a heartbeat tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HeartbeatOutcome {
    /// `last_seen` was refreshed.
    Refreshed,
    /// No session id was provided.
    Skipped,
    /// The session is unknown or already closed.
    NotOpen,
    /// The store failed; the next tick will retry naturally.
    Failed,
}

/// Result of ending a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EndOutcome {
    /// This call closed the session.
    Closed { duration_seconds: i64 },
    /// The session had been closed before; its duration was left as is.
    AlreadyClosed { duration_seconds: Option<i64> },
    /// No session id was provided.
    Skipped,
    /// The store does not know this session.
    NotFound,
    /// The store failed.
    Failed,
}

impl EndOutcome {
    /// The session's finalized duration, if known.
    pub const fn duration_seconds(&self) -> Option<i64> {
        match *self {
            Self::Closed { duration_seconds } => Some(duration_seconds),
            Self::AlreadyClosed { duration_seconds } => duration_seconds,
            Self::Skipped | Self::NotFound | Self::Failed => None,
        }
    }
}

/// Opens a new session for `actor` and returns its id.
pub fn start_session<S: SessionStore + ?Sized>(
    store: &mut S,
    actor: &Actor,
    context: &SessionContext,
) -> Result<String, SessionError> {
    start_session_at(store, actor, context, Utc::now())
}

/// Opens a new session with an explicit clock reading.
pub fn start_session_at<S: SessionStore + ?Sized>(
    store: &mut S,
    actor: &Actor,
    context: &SessionContext,
    now: DateTime<Utc>,
) -> Result<String, SessionError> {
    if actor.email.trim().is_empty() {
        return Err(SessionError::InvalidActor);
    }
    let session_id = Uuid::new_v4().to_string();
    let session = Session::open(session_id.clone(), actor, context, now);
    store.insert(&session)?;
    tracing::debug!(%session_id, actor = %actor.email, "session started");
    Ok(session_id)
}

/// Refreshes `last_seen` on an open session.
pub fn heartbeat<S: SessionStore + ?Sized>(store: &mut S, session_id: &str) -> HeartbeatOutcome {
    heartbeat_at(store, session_id, Utc::now())
}

/// Refreshes `last_seen` with an explicit clock reading.
pub fn heartbeat_at<S: SessionStore + ?Sized>(
    store: &mut S,
    session_id: &str,
    now: DateTime<Utc>,
) -> HeartbeatOutcome {
    if session_id.is_empty() {
        return HeartbeatOutcome::Skipped;
    }
    match store.update_by_key(session_id, SessionPatch::Heartbeat { last_seen: now }) {
        Ok(true) => HeartbeatOutcome::Refreshed,
        Ok(false) => {
            tracing::debug!(session_id, "heartbeat for unknown or closed session");
            HeartbeatOutcome::NotOpen
        }
        Err(err) => {
            tracing::warn!(session_id, error = %err, "heartbeat failed");
            HeartbeatOutcome::Failed
        }
    }
}

/// Closes a session and records its duration.
pub fn end_session<S: SessionStore + ?Sized>(store: &mut S, session_id: &str) -> EndOutcome {
    end_session_at(store, session_id, Utc::now())
}

/// Closes a session with an explicit clock reading.
///
/// Ending a session twice keeps the duration computed by the first call.
pub fn end_session_at<S: SessionStore + ?Sized>(
    store: &mut S,
    session_id: &str,
    now: DateTime<Utc>,
) -> EndOutcome {
    if session_id.is_empty() {
        return EndOutcome::Skipped;
    }
    let session = match store.find(session_id) {
        Ok(Some(session)) => session,
        Ok(None) => {
            let err = SessionError::NotFound(session_id.to_string());
            tracing::warn!(error = %err, "cannot end session");
            return EndOutcome::NotFound;
        }
        Err(err) => {
            tracing::warn!(session_id, error = %err, "failed to read session");
            return EndOutcome::Failed;
        }
    };

    if !session.is_open() {
        tracing::debug!(session_id, "session already ended");
        return EndOutcome::AlreadyClosed {
            duration_seconds: session.duration_seconds,
        };
    }

    let duration_seconds = elapsed_seconds(session.login_time, now);
    let patch = SessionPatch::Close {
        logout_time: now,
        duration_seconds,
    };
    match store.update_by_key(session_id, patch) {
        Ok(true) => {
            tracing::debug!(session_id, duration_seconds, "session ended");
            EndOutcome::Closed { duration_seconds }
        }
        // Another caller closed it between our read and write.
        Ok(false) => match store.find(session_id) {
            Ok(Some(current)) => EndOutcome::AlreadyClosed {
                duration_seconds: current.duration_seconds,
            },
            Ok(None) => EndOutcome::NotFound,
            Err(err) => {
                tracing::warn!(session_id, error = %err, "failed to re-read session");
                EndOutcome::Failed
            }
        },
        Err(err) => {
            tracing::warn!(session_id, error = %err, "failed to end session");
            EndOutcome::Failed
        }
    }
}
