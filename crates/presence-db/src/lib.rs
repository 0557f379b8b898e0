//! Storage layer for session presence.
//!
//! Provides a [`SessionStore`] backed by `rusqlite`.
//!
//! # Thread Safety
//!
//! The [`Database`] type wraps a `rusqlite::Connection`, which is `Send` but not `Sync`.
//! Wrap it in a `Mutex<Database>` or open one `Database` per thread; concurrent
//! processes are serialized by SQLite's own locking.
//!
//! # Schema
//!
//! ## Timestamp Format
//!
//! Timestamps are written as TEXT in RFC 3339 format with millisecond precision
//! (e.g., `2025-03-10T09:00:00.000Z`). Rows from other tools may carry any
//! RFC 3339 offset, so every comparison and ordering goes through
//! `julianday(...)` rather than the raw text. Thresholds are bound as Julian
//! day numbers computed the same way SQLite computes them.
//!
//! ## Malformed Rows
//!
//! Rows written by other tools may lack `last_seen` or carry timestamps that
//! do not parse. Query methods skip such rows with a warning instead of
//! failing the whole read.

use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use presence_core::{
    Session, SessionError, SessionPatch, SessionStore, elapsed_seconds, window_start,
};
use rusqlite::{Connection, OptionalExtension, Row, params};
use thiserror::Error;

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// An error from the underlying database.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// Failed to parse a stored timestamp.
    #[error("invalid timestamp for session {session_id}: {timestamp}")]
    TimestampParse {
        session_id: String,
        timestamp: String,
        #[source]
        source: chrono::ParseError,
    },
    /// A row violates the session invariants.
    #[error("malformed session {session_id}: {message}")]
    MalformedSession { session_id: String, message: String },
}

impl From<DbError> for SessionError {
    fn from(err: DbError) -> Self {
        Self::persistence(err)
    }
}

/// Database connection wrapper.
///
/// See the [module documentation](self) for thread safety considerations.
pub struct Database {
    conn: Connection,
}

/// Counts used by the status command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStats {
    pub total: i64,
    pub open: i64,
    /// Latest `last_seen` across all sessions, as stored.
    pub last_activity: Option<String>,
}

const SESSION_COLUMNS: &str = "session_id, actor_email, actor_name, actor_role, login_time, \
     last_seen, logout_time, duration_seconds, page, user_agent";

impl Database {
    /// Opens a database at the given path, creating it if necessary.
    ///
    /// The database schema is automatically initialized on first open.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Opens an in-memory database.
    ///
    /// Useful for testing. The database is destroyed when the connection closes.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Initializes the database schema.
    ///
    /// This is idempotent - safe to call on an already-initialized database.
    fn init(&self) -> Result<(), DbError> {
        self.conn.execute_batch(
            "
            -- One row per login episode.
            -- last_seen is nullable so rows imported from elsewhere still load;
            -- readers skip rows without it.
            CREATE TABLE IF NOT EXISTS user_sessions (
                session_id TEXT PRIMARY KEY,
                actor_email TEXT NOT NULL,
                actor_name TEXT,
                actor_role TEXT,
                login_time TEXT NOT NULL,
                last_seen TEXT,
                logout_time TEXT,
                duration_seconds INTEGER,
                page TEXT,
                user_agent TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_user_sessions_last_seen
                ON user_sessions(julianday(last_seen));
            CREATE INDEX IF NOT EXISTS idx_user_sessions_login
                ON user_sessions(julianday(login_time));
            CREATE INDEX IF NOT EXISTS idx_user_sessions_actor ON user_sessions(actor_email);
            ",
        )?;
        Ok(())
    }

    /// Returns total and open session counts and the latest heartbeat.
    pub fn session_stats(&self) -> Result<SessionStats, DbError> {
        let stats = self.conn.query_row(
            "
            SELECT COUNT(*),
                   COALESCE(SUM(CASE WHEN logout_time IS NULL THEN 1 ELSE 0 END), 0),
                   (SELECT last_seen FROM user_sessions
                    WHERE julianday(last_seen) IS NOT NULL
                    ORDER BY julianday(last_seen) DESC
                    LIMIT 1)
            FROM user_sessions
            ",
            [],
            |row| {
                Ok(SessionStats {
                    total: row.get(0)?,
                    open: row.get(1)?,
                    last_activity: row.get(2)?,
                })
            },
        )?;
        Ok(stats)
    }

    /// Expires open sessions whose last heartbeat is more than
    /// `stale_after_secs` seconds before `now`.
    ///
    /// Each stale session is closed at its `last_seen`, so its duration covers
    /// only the time it was observed alive. Returns the number of sessions closed.
    pub fn cleanup_stale_sessions(
        &mut self,
        now: DateTime<Utc>,
        stale_after_secs: i64,
    ) -> Result<usize, DbError> {
        let threshold = julian_day(window_start(now, stale_after_secs));
        let tx = self.conn.transaction()?;
        let stale: Vec<(String, String, Option<String>)> = {
            let mut stmt = tx.prepare(
                "
                SELECT session_id, login_time, last_seen
                FROM user_sessions
                WHERE logout_time IS NULL
                  AND COALESCE(julianday(last_seen), julianday(login_time)) < ?
                ",
            )?;
            let rows = stmt.query_map([threshold], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?))
            })?;
            rows.collect::<Result<_, _>>()?
        };

        let mut closed = 0;
        {
            let mut stmt = tx.prepare(
                "
                UPDATE user_sessions
                SET logout_time = ?1, duration_seconds = ?2, last_seen = ?1
                WHERE session_id = ?3 AND logout_time IS NULL
                ",
            )?;
            for (session_id, login_time, last_seen) in stale {
                let login = match parse_timestamp(&login_time, &session_id) {
                    Ok(login) => login,
                    Err(err) => {
                        tracing::warn!(error = %err, "skipping stale session with bad login time");
                        continue;
                    }
                };
                let seen = last_seen
                    .as_deref()
                    .and_then(|ts| parse_timestamp(ts, &session_id).ok())
                    .unwrap_or(login)
                    .max(login);
                closed += stmt.execute(params![
                    format_timestamp(seen),
                    elapsed_seconds(login, seen),
                    session_id,
                ])?;
            }
        }
        tx.commit()?;
        tracing::debug!(closed, "expired stale sessions");
        Ok(closed)
    }

    fn query_sessions(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<Session>, DbError> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params, SessionRow::from_row)?;
        let mut sessions = Vec::new();
        for row in rows {
            match row?.into_session() {
                Ok(session) => sessions.push(session),
                Err(err) => tracing::warn!(error = %err, "skipping malformed session row"),
            }
        }
        Ok(sessions)
    }
}

impl SessionStore for Database {
    fn insert(&mut self, session: &Session) -> Result<(), SessionError> {
        self.conn
            .execute(
                &format!(
                    "INSERT INTO user_sessions ({SESSION_COLUMNS}) \
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
                ),
                params![
                    session.session_id,
                    session.actor_email,
                    session.actor_name,
                    session.actor_role,
                    format_timestamp(session.login_time),
                    format_timestamp(session.last_seen),
                    session.logout_time.map(format_timestamp),
                    session.duration_seconds,
                    session.page,
                    session.user_agent,
                ],
            )
            .map_err(DbError::from)?;
        Ok(())
    }

    fn find(&self, session_id: &str) -> Result<Option<Session>, SessionError> {
        let row = self
            .conn
            .query_row(
                &format!("SELECT {SESSION_COLUMNS} FROM user_sessions WHERE session_id = ?"),
                [session_id],
                SessionRow::from_row,
            )
            .optional()
            .map_err(DbError::from)?;
        Ok(row.map(SessionRow::into_session).transpose()?)
    }

    fn update_by_key(
        &mut self,
        session_id: &str,
        patch: SessionPatch,
    ) -> Result<bool, SessionError> {
        let changed = match patch {
            SessionPatch::Heartbeat { last_seen } => self.conn.execute(
                "
                UPDATE user_sessions
                SET last_seen = CASE
                    WHEN julianday(COALESCE(last_seen, login_time)) >= julianday(?1)
                        THEN COALESCE(last_seen, login_time)
                    ELSE ?1
                END
                WHERE session_id = ?2 AND logout_time IS NULL
                ",
                params![format_timestamp(last_seen), session_id],
            ),
            SessionPatch::Close {
                logout_time,
                duration_seconds,
            } => self.conn.execute(
                "
                UPDATE user_sessions
                SET logout_time = ?, duration_seconds = ?
                WHERE session_id = ? AND logout_time IS NULL
                ",
                params![format_timestamp(logout_time), duration_seconds, session_id],
            ),
        }
        .map_err(DbError::from)?;
        Ok(changed > 0)
    }

    fn query_open_since(&self, threshold: DateTime<Utc>) -> Result<Vec<Session>, SessionError> {
        Ok(self.query_sessions(
            &format!(
                "
                SELECT {SESSION_COLUMNS}
                FROM user_sessions
                WHERE logout_time IS NULL AND julianday(last_seen) >= ?
                ORDER BY julianday(last_seen) DESC, session_id ASC
                "
            ),
            [julian_day(threshold)],
        )?)
    }

    fn query_by_login_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        actor_email: Option<&str>,
    ) -> Result<Vec<Session>, SessionError> {
        if end <= start {
            return Ok(Vec::new());
        }
        Ok(self.query_sessions(
            &format!(
                "
                SELECT {SESSION_COLUMNS}
                FROM user_sessions
                WHERE julianday(login_time) >= ?1 AND julianday(login_time) < ?2
                  AND (?3 IS NULL OR actor_email = ?3)
                ORDER BY julianday(login_time) ASC, session_id ASC
                "
            ),
            params![julian_day(start), julian_day(end), actor_email],
        )?)
    }
}

/// A `user_sessions` row as stored, before validation.
#[derive(Debug)]
struct SessionRow {
    session_id: String,
    actor_email: String,
    actor_name: Option<String>,
    actor_role: Option<String>,
    login_time: String,
    last_seen: Option<String>,
    logout_time: Option<String>,
    duration_seconds: Option<i64>,
    page: Option<String>,
    user_agent: Option<String>,
}

impl SessionRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            session_id: row.get(0)?,
            actor_email: row.get(1)?,
            actor_name: row.get(2)?,
            actor_role: row.get(3)?,
            login_time: row.get(4)?,
            last_seen: row.get(5)?,
            logout_time: row.get(6)?,
            duration_seconds: row.get(7)?,
            page: row.get(8)?,
            user_agent: row.get(9)?,
        })
    }

    fn into_session(self) -> Result<Session, DbError> {
        let login_time = parse_timestamp(&self.login_time, &self.session_id)?;
        let Some(last_seen) = self.last_seen.as_deref() else {
            return Err(self.malformed("missing last_seen"));
        };
        let last_seen = parse_timestamp(last_seen, &self.session_id)?;
        let logout_time = self
            .logout_time
            .as_deref()
            .map(|ts| parse_timestamp(ts, &self.session_id))
            .transpose()?;
        if logout_time.is_some() != self.duration_seconds.is_some() {
            return Err(self.malformed("logout_time and duration_seconds disagree"));
        }

        Ok(Session {
            session_id: self.session_id,
            actor_email: self.actor_email,
            actor_name: self.actor_name,
            actor_role: self.actor_role,
            login_time,
            last_seen: last_seen.max(login_time),
            logout_time,
            duration_seconds: self.duration_seconds,
            page: self.page,
            user_agent: self.user_agent,
        })
    }

    fn malformed(&self, message: &str) -> DbError {
        DbError::MalformedSession {
            session_id: self.session_id.clone(),
            message: message.to_string(),
        }
    }
}

fn parse_timestamp(timestamp: &str, session_id: &str) -> Result<DateTime<Utc>, DbError> {
    DateTime::parse_from_rfc3339(timestamp)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|source| DbError::TimestampParse {
            session_id: session_id.to_string(),
            timestamp: timestamp.to_string(),
            source,
        })
}

fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Milliseconds from the Julian day epoch to the Unix epoch.
const UNIX_EPOCH_JULIAN_MS: i64 = 210_866_760_000_000;

/// Julian day number of `timestamp`, matching SQLite's `julianday()`.
///
/// SQLite keeps Julian days as whole milliseconds and divides by the day
/// length, so the same division here yields bit-identical values.
#[expect(
    clippy::cast_precision_loss,
    reason = "exact below 2^53 ms, which covers every year SQLite can parse"
)]
fn julian_day(timestamp: DateTime<Utc>) -> f64 {
    (timestamp.timestamp_millis() + UNIX_EPOCH_JULIAN_MS) as f64 / 86_400_000.0
}
