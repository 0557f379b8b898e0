//! Who is active right now.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::SessionError;
use crate::session::{Session, elapsed_seconds, window_start};
use crate::store::SessionStore;

/// Default trailing window for presence, in seconds.
pub const DEFAULT_ACTIVE_WINDOW_SECS: i64 = 90;

/// An open session with a recent heartbeat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActiveUser {
    #[serde(flatten)]
    pub session: Session,
    /// Whole seconds since the last heartbeat.
    pub seconds_ago: i64,
}

/// Lists active sessions, degrading to an empty list if the store fails.
pub fn list_active<S: SessionStore + ?Sized>(
    store: &S,
    now: DateTime<Utc>,
    window_seconds: i64,
) -> Vec<ActiveUser> {
    try_list_active(store, now, window_seconds).unwrap_or_else(|err| {
        tracing::warn!(error = %err, "active session query failed");
        Vec::new()
    })
}

/// Lists open sessions seen within `window_seconds` of `now`, most recent first.
pub fn try_list_active<S: SessionStore + ?Sized>(
    store: &S,
    now: DateTime<Utc>,
    window_seconds: i64,
) -> Result<Vec<ActiveUser>, SessionError> {
    let threshold = window_start(now, window_seconds);
    let mut active: Vec<ActiveUser> = store
        .query_open_since(threshold)?
        .into_iter()
        .filter(|s| s.is_open() && s.last_seen >= threshold)
        .map(|session| ActiveUser {
            seconds_ago: elapsed_seconds(session.last_seen, now),
            session,
        })
        .collect();
    active.sort_by(|a, b| {
        b.session
            .last_seen
            .cmp(&a.session.last_seen)
            .then_with(|| a.session.session_id.cmp(&b.session.session_id))
    });
    Ok(active)
}
