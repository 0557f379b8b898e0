//! Command-line argument definitions.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};

/// Session presence and time-spent tracker.
///
/// Records login sessions with heartbeats, shows who is active right now,
/// and reports time spent per user.
#[derive(Debug, Parser)]
#[command(name = "presence", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Start a session and print its id.
    Start {
        /// Email of the signed-in user.
        #[arg(long)]
        email: String,

        /// Display name.
        #[arg(long)]
        name: Option<String>,

        /// Role (e.g., admin, dealer).
        #[arg(long)]
        role: Option<String>,

        /// Page the session started on.
        #[arg(long)]
        page: Option<String>,

        /// Browser user agent.
        #[arg(long)]
        user_agent: Option<String>,
    },

    /// Refresh a session's last-seen time.
    Heartbeat {
        /// Session id printed by `start`.
        session_id: String,
    },

    /// End a session and record its duration.
    End {
        /// Session id printed by `start`.
        session_id: String,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// List users with a recent heartbeat.
    Active {
        /// Active window in seconds (defaults to config).
        #[arg(long, value_parser = clap::value_parser!(i64).range(1..))]
        window: Option<i64>,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Report time spent per user.
    Report {
        /// Current week (default).
        #[arg(long, group = "period")]
        week: bool,

        /// Previous week.
        #[arg(long, group = "period")]
        last_week: bool,

        /// Today.
        #[arg(long, group = "period")]
        day: bool,

        /// Yesterday.
        #[arg(long, group = "period")]
        last_day: bool,

        /// First day of a custom range (YYYY-MM-DD).
        #[arg(long, group = "period")]
        from: Option<NaiveDate>,

        /// Last day of a custom range (defaults to --from).
        #[arg(long, requires = "from")]
        to: Option<NaiveDate>,

        /// Only include this user's sessions.
        #[arg(long)]
        actor: Option<String>,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Expire open sessions that stopped sending heartbeats.
    Cleanup {
        /// Staleness threshold in seconds (defaults to config).
        #[arg(long, value_parser = clap::value_parser!(i64).range(1..))]
        stale_after: Option<i64>,
    },

    /// Show database and session counts.
    Status,
}
