use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use presence_core::{Actor, HeartbeatOutcome, SessionContext};
use tracing_subscriber::EnvFilter;

use presence_cli::commands::{active, cleanup, report, session, status};
use presence_cli::{Cli, Commands, Config};

/// Load config and open database, ensuring the parent directory exists.
fn open_database(config_path: Option<&Path>) -> Result<(presence_db::Database, Config)> {
    let config = Config::load_from(config_path).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");

    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent).context("failed to create database directory")?;
    }

    let db = presence_db::Database::open(&config.database_path)
        .context("failed to open database")?;
    Ok((db, config))
}

#[expect(
    clippy::too_many_lines,
    reason = "CLI command dispatch is inherently verbose"
)]
fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing with verbose flag support
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    let stdout = io::stdout();
    let mut out = stdout.lock();

    match &cli.command {
        Some(Commands::Start {
            email,
            name,
            role,
            page,
            user_agent,
        }) => {
            let (mut db, _config) = open_database(cli.config.as_deref())?;
            let mut actor = Actor::new(email.clone());
            if let Some(name) = name {
                actor = actor.with_name(name.clone());
            }
            if let Some(role) = role {
                actor = actor.with_role(role.clone());
            }
            let context = SessionContext {
                page: page.clone(),
                user_agent: user_agent.clone(),
            };
            session::start(&mut out, &mut db, &actor, &context)?;
        }
        Some(Commands::Heartbeat { session_id }) => {
            let (mut db, _config) = open_database(cli.config.as_deref())?;
            // Heartbeats are best effort; the caller is never failed.
            if session::beat(&mut db, session_id) == HeartbeatOutcome::Failed {
                tracing::warn!(session_id, "heartbeat was not recorded");
            }
        }
        Some(Commands::End { session_id, json }) => {
            let (mut db, _config) = open_database(cli.config.as_deref())?;
            session::end(&mut out, &mut db, session_id, *json)?;
        }
        Some(Commands::Active { window, json }) => {
            let (db, config) = open_database(cli.config.as_deref())?;
            let window = window.unwrap_or(config.active_window_secs);
            active::run(&mut out, &db, Utc::now(), window, *json)?;
        }
        Some(Commands::Report {
            week: _,
            last_week,
            day,
            last_day,
            from,
            to,
            actor,
            json,
        }) => {
            let (db, _config) = open_database(cli.config.as_deref())?;
            let period = if let Some(from) = *from {
                report::Period::Custom {
                    from,
                    to: to.unwrap_or(from),
                }
            } else if *last_week {
                report::Period::LastWeek
            } else if *day {
                report::Period::Day
            } else if *last_day {
                report::Period::LastDay
            } else {
                report::Period::Week
            };
            report::run(&mut out, &db, period, actor.as_deref(), *json)?;
        }
        Some(Commands::Cleanup { stale_after }) => {
            let (mut db, config) = open_database(cli.config.as_deref())?;
            let stale_after = stale_after.unwrap_or(config.stale_after_secs);
            cleanup::run(&mut out, &mut db, Utc::now(), stale_after)?;
        }
        Some(Commands::Status) => {
            let (db, config) = open_database(cli.config.as_deref())?;
            status::run(&mut out, &db, &config)?;
        }
        None => {
            // No subcommand, show help
            use clap::CommandFactory;
            Cli::command().print_help()?;
            writeln!(out)?;
        }
    }

    Ok(())
}
