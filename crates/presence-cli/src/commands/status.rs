//! Status command for showing database health and session counts.

use std::io::Write;

use anyhow::Result;

use presence_db::Database;

use crate::Config;

pub fn run<W: Write>(writer: &mut W, db: &Database, config: &Config) -> Result<()> {
    let stats = db.session_stats()?;

    writeln!(writer, "Presence status")?;
    writeln!(writer, "Database: {}", config.database_path.display())?;

    if stats.total == 0 {
        writeln!(writer, "No sessions recorded.")?;
        return Ok(());
    }

    writeln!(writer, "Sessions: {} total, {} open", stats.total, stats.open)?;
    if let Some(last_activity) = stats.last_activity {
        writeln!(writer, "Last activity: {last_activity}")?;
    }

    Ok(())
}
