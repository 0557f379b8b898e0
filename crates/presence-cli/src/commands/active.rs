//! Active command: who has sent a heartbeat recently.

use std::fmt::Write as _;
use std::io::Write;

use anyhow::Result;
use chrono::{DateTime, Utc};
use presence_core::{ActiveUser, SessionStore, try_list_active};

use super::report::{actor_label, format_duration};

/// Formats active users, most recent first.
pub fn format_active(users: &[ActiveUser], window_seconds: i64) -> String {
    let mut output = String::new();
    if users.is_empty() {
        writeln!(output, "No active users in the last {window_seconds}s.").unwrap();
        return output;
    }

    writeln!(output, "ACTIVE USERS ({})", users.len()).unwrap();
    for user in users {
        let session = &user.session;
        let mut line = format!(
            "- {}",
            actor_label(&session.actor_email, session.actor_name.as_deref())
        );
        if let Some(role) = &session.actor_role {
            write!(line, " [{role}]").unwrap();
        }
        if let Some(page) = &session.page {
            write!(line, " on {page}").unwrap();
        }
        write!(line, ", seen {} ago", format_duration(user.seconds_ago)).unwrap();
        writeln!(output, "{line}").unwrap();
    }
    output
}

/// Runs the active command.
pub fn run<W: Write, S: SessionStore + ?Sized>(
    writer: &mut W,
    store: &S,
    now: DateTime<Utc>,
    window_seconds: i64,
    json: bool,
) -> Result<()> {
    let users = try_list_active(store, now, window_seconds)?;
    if json {
        writeln!(writer, "{}", serde_json::to_string_pretty(&users)?)?;
    } else {
        write!(writer, "{}", format_active(&users, window_seconds))?;
    }
    Ok(())
}
