//! Session records and the values used to create and patch them.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// The authenticated identity a session belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    /// Identity key.
    pub email: String,
    pub name: Option<String>,
    pub role: Option<String>,
}

impl Actor {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            name: None,
            role: None,
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }
}

/// Free-form context captured when a session starts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionContext {
    pub page: Option<String>,
    pub user_agent: Option<String>,
}

/// One login episode for an actor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,
    pub actor_email: String,
    pub actor_name: Option<String>,
    pub actor_role: Option<String>,
    pub login_time: DateTime<Utc>,
    /// Refreshed by heartbeats; never earlier than `login_time`.
    pub last_seen: DateTime<Utc>,
    /// `None` while the session is open.
    pub logout_time: Option<DateTime<Utc>>,
    /// Set together with `logout_time`, never on its own.
    pub duration_seconds: Option<i64>,
    pub page: Option<String>,
    pub user_agent: Option<String>,
}

impl Session {
    /// Builds a freshly opened session with `login_time = last_seen = now`.
    pub fn open(
        session_id: impl Into<String>,
        actor: &Actor,
        context: &SessionContext,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            actor_email: actor.email.clone(),
            actor_name: actor.name.clone(),
            actor_role: actor.role.clone(),
            login_time: now,
            last_seen: now,
            logout_time: None,
            duration_seconds: None,
            page: context.page.clone(),
            user_agent: context.user_agent.clone(),
        }
    }

    pub const fn is_open(&self) -> bool {
        self.logout_time.is_none()
    }

    /// Applies a patch the way a store does: only open sessions change.
    ///
    /// Returns `false` when the session was already closed.
    pub fn apply(&mut self, patch: &SessionPatch) -> bool {
        if !self.is_open() {
            return false;
        }
        match *patch {
            SessionPatch::Heartbeat { last_seen } => {
                self.last_seen = self.last_seen.max(last_seen);
            }
            SessionPatch::Close {
                logout_time,
                duration_seconds,
            } => {
                self.logout_time = Some(logout_time);
                self.duration_seconds = Some(duration_seconds);
            }
        }
        true
    }
}

/// A partial update addressed to one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPatch {
    /// Refresh `last_seen`. Stores keep the later of the stored and new value.
    Heartbeat { last_seen: DateTime<Utc> },
    /// Finalize the session. Both fields are written in one update.
    Close {
        logout_time: DateTime<Utc>,
        duration_seconds: i64,
    },
}

impl SessionPatch {
    /// Builds the close patch for a session that logged in at `login_time`.
    pub fn close(login_time: DateTime<Utc>, logout_time: DateTime<Utc>) -> Self {
        Self::Close {
            logout_time,
            duration_seconds: elapsed_seconds(login_time, logout_time),
        }
    }
}

/// Whole seconds between two instants, floored and clamped at zero.
pub fn elapsed_seconds(from: DateTime<Utc>, to: DateTime<Utc>) -> i64 {
    to.signed_duration_since(from).num_seconds().max(0)
}

/// The instant `seconds` before `now`.
///
/// Negative windows count as zero. Windows reaching past the earliest
/// representable instant saturate to it, so they cover every timestamp.
pub fn window_start(now: DateTime<Utc>, seconds: i64) -> DateTime<Utc> {
    Duration::try_seconds(seconds.max(0))
        .and_then(|window| now.checked_sub_signed(window))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}
