//! Cleanup command: expire sessions that stopped sending heartbeats.

use std::io::Write;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use presence_db::Database;

/// Runs the cleanup command.
pub fn run<W: Write>(
    writer: &mut W,
    db: &mut Database,
    now: DateTime<Utc>,
    stale_after_secs: i64,
) -> Result<usize> {
    anyhow::ensure!(
        stale_after_secs > 0,
        "stale threshold must be positive, got {stale_after_secs}"
    );
    let closed = db
        .cleanup_stale_sessions(now, stale_after_secs)
        .context("failed to expire stale sessions")?;
    let noun = if closed == 1 { "session" } else { "sessions" };
    writeln!(writer, "Expired {closed} stale {noun}.")?;
    Ok(closed)
}
