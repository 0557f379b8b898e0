//! The persistence seam for session records.
//!
//! Lifecycle, presence and aggregation code only ever talk to a
//! [`SessionStore`]. Implementations:
//! - [`MemoryStore`]: in-process map, used by tests and embedded callers
//! - `presence_db::Database`: SQLite-backed store

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::error::SessionError;
use crate::session::{Session, SessionPatch};

/// Storage backend for session records.
///
/// Every mutation addresses exactly one session by id and must be applied
/// atomically by the backend. Rows are never deleted through this trait.
pub trait SessionStore {
    /// Creates a row. Fails with [`SessionError::Persistence`] if the id
    /// already exists or the write is rejected.
    fn insert(&mut self, session: &Session) -> Result<(), SessionError>;

    /// Reads one session by id.
    fn find(&self, session_id: &str) -> Result<Option<Session>, SessionError>;

    /// Patches an open session.
    ///
    /// Returns `false` when no open session with this id exists; closed
    /// sessions are left untouched.
    fn update_by_key(&mut self, session_id: &str, patch: SessionPatch)
    -> Result<bool, SessionError>;

    /// Open sessions whose `last_seen` is at or after `threshold`.
    fn query_open_since(&self, threshold: DateTime<Utc>) -> Result<Vec<Session>, SessionError>;

    /// Sessions with `start <= login_time < end`, optionally for one actor.
    fn query_by_login_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        actor_email: Option<&str>,
    ) -> Result<Vec<Session>, SessionError>;
}

/// In-memory session store keyed by session id.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    sessions: BTreeMap<String, Session>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Returns a stored session by id, bypassing the trait.
    pub fn get(&self, session_id: &str) -> Option<&Session> {
        self.sessions.get(session_id)
    }

    /// Iterates over all stored sessions in id order.
    pub fn sessions(&self) -> impl Iterator<Item = &Session> {
        self.sessions.values()
    }
}

impl SessionStore for MemoryStore {
    fn insert(&mut self, session: &Session) -> Result<(), SessionError> {
        if self.sessions.contains_key(&session.session_id) {
            return Err(SessionError::persistence(format!(
                "duplicate session id {}",
                session.session_id
            )));
        }
        self.sessions
            .insert(session.session_id.clone(), session.clone());
        Ok(())
    }

    fn find(&self, session_id: &str) -> Result<Option<Session>, SessionError> {
        Ok(self.sessions.get(session_id).cloned())
    }

    fn update_by_key(
        &mut self,
        session_id: &str,
        patch: SessionPatch,
    ) -> Result<bool, SessionError> {
        Ok(self
            .sessions
            .get_mut(session_id)
            .is_some_and(|session| session.apply(&patch)))
    }

    fn query_open_since(&self, threshold: DateTime<Utc>) -> Result<Vec<Session>, SessionError> {
        Ok(self
            .sessions
            .values()
            .filter(|s| s.is_open() && s.last_seen >= threshold)
            .cloned()
            .collect())
    }

    fn query_by_login_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        actor_email: Option<&str>,
    ) -> Result<Vec<Session>, SessionError> {
        Ok(self
            .sessions
            .values()
            .filter(|s| s.login_time >= start && s.login_time < end)
            .filter(|s| actor_email.is_none_or(|email| s.actor_email == email))
            .cloned()
            .collect())
    }
}

/// A store whose every call fails, for exercising degrade paths.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct FailingStore;

#[cfg(test)]
impl SessionStore for FailingStore {
    fn insert(&mut self, _session: &Session) -> Result<(), SessionError> {
        Err(SessionError::persistence("store unreachable"))
    }

    fn find(&self, _session_id: &str) -> Result<Option<Session>, SessionError> {
        Err(SessionError::persistence("store unreachable"))
    }

    fn update_by_key(
        &mut self,
        _session_id: &str,
        _patch: SessionPatch,
    ) -> Result<bool, SessionError> {
        Err(SessionError::persistence("store unreachable"))
    }

    fn query_open_since(&self, _threshold: DateTime<Utc>) -> Result<Vec<Session>, SessionError> {
        Err(SessionError::persistence("store unreachable"))
    }

    fn query_by_login_range(
        &self,
        _start: DateTime<Utc>,
        _end: DateTime<Utc>,
        _actor_email: Option<&str>,
    ) -> Result<Vec<Session>, SessionError> {
        Err(SessionError::persistence("store unreachable"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{Actor, SessionContext};
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, 9, 0, 0).unwrap()
    }

    fn session(id: &str, email: &str, login: DateTime<Utc>) -> Session {
        Session::open(id, &Actor::new(email), &SessionContext::default(), login)
    }

    #[test]
    fn insert_rejects_duplicate_ids() {
        let mut store = MemoryStore::new();
        store.insert(&session("s1", "a@x.com", t0())).unwrap();
        let err = store.insert(&session("s1", "b@x.com", t0())).unwrap_err();
        assert!(matches!(err, SessionError::Persistence(_)));
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("s1").unwrap().actor_email, "a@x.com");
    }

    #[test]
    fn update_by_key_reports_missing_sessions() {
        let mut store = MemoryStore::new();
        let updated = store
            .update_by_key("nope", SessionPatch::Heartbeat { last_seen: t0() })
            .unwrap();
        assert!(!updated);
    }

    #[test]
    fn query_by_login_range_is_half_open_and_filters_actor() {
        let mut store = MemoryStore::new();
        store.insert(&session("s1", "a@x.com", t0())).unwrap();
        store
            .insert(&session("s2", "b@x.com", t0() + Duration::hours(1)))
            .unwrap();
        store
            .insert(&session("s3", "a@x.com", t0() + Duration::hours(2)))
            .unwrap();

        let all = store
            .query_by_login_range(t0(), t0() + Duration::hours(2), None)
            .unwrap();
        let ids: Vec<_> = all.iter().map(|s| s.session_id.as_str()).collect();
        assert_eq!(ids, vec!["s1", "s2"]);

        let only_a = store
            .query_by_login_range(t0(), t0() + Duration::hours(3), Some("a@x.com"))
            .unwrap();
        let ids: Vec<_> = only_a.iter().map(|s| s.session_id.as_str()).collect();
        assert_eq!(ids, vec!["s1", "s3"]);
    }
}
