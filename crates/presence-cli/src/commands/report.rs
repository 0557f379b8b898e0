//! Report command for time spent per user.
//!
//! This module implements `presence report` with period options
//! (--week, --last-week, --day, --last-day, --from/--to) and output formats
//! (human-readable, JSON).

use std::fmt::Write as _;
use std::io::Write;

use anyhow::Result;
use chrono::{DateTime, Datelike, Duration, Local, NaiveDate, Utc};
use presence_core::{ActorTotal, DateRange, SessionStore, TimeSummary, try_aggregate};
use serde::Serialize;

/// Report period type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    Week,
    LastWeek,
    Day,
    LastDay,
    Custom { from: NaiveDate, to: NaiveDate },
}

/// Computed report data.
#[derive(Debug)]
pub struct ReportData {
    pub generated_at: DateTime<Utc>,
    pub range: DateRange,
    pub timezone: String,
    pub actor: Option<String>,
    pub summary: TimeSummary,
}

// ========== Period Date Calculation ==========

/// Monday through Sunday of the week containing `today`.
fn week_range(today: NaiveDate) -> DateRange {
    let days_since_monday = today.weekday().num_days_from_monday();
    let monday = today - Duration::days(i64::from(days_since_monday));
    DateRange::new(monday, monday + Duration::days(6))
}

/// Monday through Sunday of the week before the one containing `today`.
fn last_week_range(today: NaiveDate) -> DateRange {
    let this_week = week_range(today);
    DateRange::new(
        this_week.start - Duration::days(7),
        this_week.start - Duration::days(1),
    )
}

/// Get the inclusive day range for a period, using the provided date as reference.
pub fn period_range(period: Period, today: NaiveDate) -> DateRange {
    match period {
        Period::Week => week_range(today),
        Period::LastWeek => last_week_range(today),
        Period::Day => DateRange::day(today),
        Period::LastDay => DateRange::day(today - Duration::days(1)),
        Period::Custom { from, to } => DateRange::new(from, to),
    }
}

// ========== Duration Formatting ==========

/// Formats seconds as a duration string.
/// Returns "Xh Ym" if >= 1 hour, "Xm" if >= 1 minute, "Xs" otherwise.
/// Negative durations are treated as 0s.
pub fn format_duration(seconds: i64) -> String {
    if seconds < 0 {
        return "0s".to_string();
    }
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;

    if hours >= 1 {
        format!("{hours}h {minutes}m")
    } else if minutes >= 1 {
        format!("{minutes}m")
    } else {
        format!("{seconds}s")
    }
}

// ========== Progress Bar ==========

/// Generates a 10-character progress bar.
/// Values <5% of max get a single block for visibility.
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn progress_bar(value: i64, max: i64) -> String {
    if max <= 0 {
        return "░░░░░░░░░░".to_string();
    }

    let ratio = value as f64 / max as f64;
    let filled = if ratio < 0.05 && value > 0 {
        1
    } else {
        (ratio * 10.0).round().clamp(0.0, 10.0) as usize
    };

    let empty = 10 - filled;
    format!("{}{}", "█".repeat(filled), "░".repeat(empty))
}

/// "Alice <a@x.com>" when a name is known, the bare email otherwise.
pub fn actor_label(email: &str, name: Option<&str>) -> String {
    match name {
        Some(name) if !name.is_empty() => format!("{name} <{email}>"),
        _ => email.to_string(),
    }
}

// ========== Report Generation ==========

/// Generates report data from the store.
pub fn generate_report_data<S: SessionStore + ?Sized>(
    store: &S,
    range: DateRange,
    actor: Option<&str>,
    generated_at: DateTime<Utc>,
) -> Result<ReportData> {
    let summary = try_aggregate(store, range, actor)?;
    let timezone = iana_time_zone::get_timezone().unwrap_or_else(|_| "UTC".to_string());

    Ok(ReportData {
        generated_at,
        range,
        timezone,
        actor: actor.map(str::to_string),
        summary,
    })
}

/// Formats the period description for the report header.
fn format_period_description(range: DateRange) -> String {
    if range.start == range.end {
        // "Monday, Mar 10, 2025"
        range.start.format("%A, %b %-d, %Y").to_string()
    } else {
        format!(
            "{} to {}",
            range.start.format("%b %-d, %Y"),
            range.end.format("%b %-d, %Y")
        )
    }
}

fn format_actor_row(actor: &ActorTotal, max_total: i64) -> String {
    let label = actor_label(&actor.actor_email, actor.actor_name.as_deref());
    let duration = format_duration(actor.total_seconds);
    let count = actor.session_count;
    let noun = if count == 1 { "session" } else { "sessions" };
    let bar = progress_bar(actor.total_seconds, max_total);
    format!("{label:<32}{duration:>8}  {count:>3} {noun:<8}  {bar}")
}

/// Formats the human-readable report output.
pub fn format_report(data: &ReportData) -> String {
    let mut output = String::new();

    writeln!(
        output,
        "TIME REPORT: {}",
        format_period_description(data.range)
    )
    .unwrap();
    if let Some(actor) = &data.actor {
        writeln!(output, "User: {actor}").unwrap();
    }

    if data.summary.is_empty() {
        writeln!(output).unwrap();
        writeln!(output, "No completed sessions in this period.").unwrap();
        writeln!(output).unwrap();
        writeln!(output, "Hint: Run 'presence active' to see open sessions.").unwrap();
        return output;
    }

    // per_actor is sorted descending, so the first entry scales the bars
    let max_total = data
        .summary
        .per_actor
        .first()
        .map_or(0, |a| a.total_seconds);

    writeln!(output).unwrap();
    writeln!(output, "BY USER").unwrap();
    writeln!(output, "───────").unwrap();
    for actor in &data.summary.per_actor {
        writeln!(output, "{}", format_actor_row(actor, max_total)).unwrap();
    }

    writeln!(output).unwrap();
    writeln!(output, "SUMMARY").unwrap();
    writeln!(output, "───────").unwrap();
    writeln!(
        output,
        "Total tracked:  {}",
        format_duration(data.summary.total_seconds)
    )
    .unwrap();
    writeln!(output, "Users:          {}", data.summary.per_actor.len()).unwrap();
    writeln!(output, "Sessions:       {}", data.summary.session_count()).unwrap();

    output
}

// ========== JSON Output ==========

/// JSON report structure.
#[derive(Debug, Serialize)]
pub struct JsonReport<'a> {
    pub generated_at: String,
    pub timezone: &'a str,
    pub period: JsonPeriod,
    pub actor: Option<&'a str>,
    pub per_actor: &'a [ActorTotal],
    pub totals: JsonTotals,
}

#[derive(Debug, Serialize)]
pub struct JsonPeriod {
    pub start: String,
    pub end: String,
}

#[derive(Debug, Serialize)]
pub struct JsonTotals {
    pub total_seconds: i64,
    pub actor_count: usize,
    pub session_count: usize,
}

/// Formats report data as JSON.
pub fn format_report_json(data: &ReportData) -> Result<String> {
    let report = JsonReport {
        generated_at: data.generated_at.to_rfc3339(),
        timezone: &data.timezone,
        period: JsonPeriod {
            start: data.range.start.format("%Y-%m-%d").to_string(),
            end: data.range.end.format("%Y-%m-%d").to_string(),
        },
        actor: data.actor.as_deref(),
        per_actor: &data.summary.per_actor,
        totals: JsonTotals {
            total_seconds: data.summary.total_seconds,
            actor_count: data.summary.per_actor.len(),
            session_count: data.summary.session_count(),
        },
    };
    Ok(serde_json::to_string_pretty(&report)?)
}

// ========== Public Interface ==========

/// Runs the report command.
pub fn run<W: Write, S: SessionStore + ?Sized>(
    writer: &mut W,
    store: &S,
    period: Period,
    actor: Option<&str>,
    json: bool,
) -> Result<()> {
    if let Period::Custom { from, to } = period {
        anyhow::ensure!(from <= to, "--to {to} is before --from {from}");
    }
    let today = Local::now().date_naive();
    let range = period_range(period, today);
    let data = generate_report_data(store, range, actor, Utc::now())?;

    if json {
        writeln!(writer, "{}", format_report_json(&data)?)?;
    } else {
        write!(writer, "{}", format_report(&data))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use insta::assert_snapshot;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn sample_data(summary: TimeSummary, range: DateRange) -> ReportData {
        ReportData {
            generated_at: Utc.with_ymd_and_hms(2025, 3, 10, 16, 0, 0).unwrap(),
            range,
            timezone: "Europe/Madrid".to_string(),
            actor: None,
            summary,
        }
    }

    fn sample_summary() -> TimeSummary {
        TimeSummary {
            per_actor: vec![
                ActorTotal {
                    actor_email: "a@x.com".to_string(),
                    actor_name: Some("Alice".to_string()),
                    total_seconds: 420,
                    session_count: 2,
                },
                ActorTotal {
                    actor_email: "b@x.com".to_string(),
                    actor_name: None,
                    total_seconds: 60,
                    session_count: 1,
                },
            ],
            total_seconds: 480,
        }
    }

    // ========== Period Date Calculation Tests ==========

    #[test]
    fn test_week_range_for_known_date() {
        // Mar 12, 2025 is a Wednesday
        let range = period_range(Period::Week, date(2025, 3, 12));
        assert_eq!(range, DateRange::new(date(2025, 3, 10), date(2025, 3, 16)));
    }

    #[test]
    fn test_week_range_on_sunday() {
        let range = period_range(Period::Week, date(2025, 3, 16));
        assert_eq!(range, DateRange::new(date(2025, 3, 10), date(2025, 3, 16)));
    }

    #[test]
    fn test_last_week_range() {
        let range = period_range(Period::LastWeek, date(2025, 3, 12));
        assert_eq!(range, DateRange::new(date(2025, 3, 3), date(2025, 3, 9)));
    }

    #[test]
    fn test_day_and_last_day_ranges() {
        let today = date(2025, 3, 1);
        assert_eq!(period_range(Period::Day, today), DateRange::day(today));
        assert_eq!(
            period_range(Period::LastDay, today),
            DateRange::day(date(2025, 2, 28))
        );
    }

    #[test]
    fn test_custom_range_passes_through() {
        let period = Period::Custom {
            from: date(2025, 1, 1),
            to: date(2025, 1, 31),
        };
        assert_eq!(
            period_range(period, date(2025, 3, 12)),
            DateRange::new(date(2025, 1, 1), date(2025, 1, 31))
        );
    }

    // ========== Duration Formatting Tests ==========

    #[test]
    fn test_format_duration_hours_and_minutes() {
        assert_eq!(format_duration(9_000), "2h 30m");
        assert_eq!(format_duration(3_600), "1h 0m");
    }

    #[test]
    fn test_format_duration_minutes_floor_seconds() {
        assert_eq!(format_duration(420), "7m");
        assert_eq!(format_duration(119), "1m");
    }

    #[test]
    fn test_format_duration_seconds_only() {
        assert_eq!(format_duration(45), "45s");
        assert_eq!(format_duration(0), "0s");
        assert_eq!(format_duration(-5), "0s");
    }

    // ========== Progress Bar Tests ==========

    #[test]
    fn test_progress_bar_scales_to_max() {
        assert_eq!(progress_bar(100, 100), "██████████");
        assert_eq!(progress_bar(50, 100), "█████░░░░░");
        assert_eq!(progress_bar(1, 100), "█░░░░░░░░░");
        assert_eq!(progress_bar(0, 0), "░░░░░░░░░░");
    }

    #[test]
    fn test_actor_label() {
        assert_eq!(actor_label("a@x.com", Some("Alice")), "Alice <a@x.com>");
        assert_eq!(actor_label("a@x.com", Some("")), "a@x.com");
        assert_eq!(actor_label("a@x.com", None), "a@x.com");
    }

    // ========== Rendering Tests (Snapshot) ==========

    #[test]
    fn test_report_empty_period() {
        let data = sample_data(TimeSummary::default(), DateRange::day(date(2025, 3, 10)));
        assert_snapshot!(format_report(&data), @r"
        TIME REPORT: Monday, Mar 10, 2025

        No completed sessions in this period.

        Hint: Run 'presence active' to see open sessions.
        ");
    }

    #[test]
    fn test_report_per_user() {
        let data = sample_data(
            sample_summary(),
            DateRange::new(date(2025, 3, 10), date(2025, 3, 16)),
        );
        assert_snapshot!(format_report(&data), @r"
        TIME REPORT: Mar 10, 2025 to Mar 16, 2025

        BY USER
        ───────
        Alice <a@x.com>                       7m    2 sessions  ██████████
        b@x.com                               1m    1 session   █░░░░░░░░░

        SUMMARY
        ───────
        Total tracked:  8m
        Users:          2
        Sessions:       3
        ");
    }

    #[test]
    fn test_report_json_output() {
        let mut data = sample_data(sample_summary(), DateRange::day(date(2025, 3, 10)));
        data.actor = Some("a@x.com".to_string());
        let output = format_report_json(&data).unwrap();
        let json: serde_json::Value = serde_json::from_str(&output).unwrap();

        assert_eq!(json["period"]["start"], "2025-03-10");
        assert_eq!(json["period"]["end"], "2025-03-10");
        assert_eq!(json["actor"], "a@x.com");
        assert_eq!(json["timezone"], "Europe/Madrid");
        assert_eq!(json["per_actor"][0]["actor_email"], "a@x.com");
        assert_eq!(json["per_actor"][0]["total_seconds"], 420);
        assert_eq!(json["per_actor"][1]["actor_name"], serde_json::Value::Null);
        assert_eq!(json["totals"]["total_seconds"], 480);
        assert_eq!(json["totals"]["actor_count"], 2);
        assert_eq!(json["totals"]["session_count"], 3);
    }

    #[test]
    fn test_run_reads_from_store() {
        use presence_core::{Actor, MemoryStore, SessionContext, end_session_at, start_session_at};

        let mut store = MemoryStore::new();
        let login = Local::now().with_timezone(&Utc);
        let id = start_session_at(
            &mut store,
            &Actor::new("a@x.com").with_name("Alice"),
            &SessionContext::default(),
            login,
        )
        .unwrap();
        end_session_at(&mut store, &id, login + Duration::seconds(30));

        let mut output = Vec::new();
        run(&mut output, &store, Period::Day, None, true).unwrap();
        let json: serde_json::Value = serde_json::from_slice(&output).unwrap();
        assert_eq!(json["totals"]["session_count"], 1);
        assert_eq!(json["totals"]["total_seconds"], 30);
    }

    #[test]
    fn test_run_rejects_reversed_custom_range() {
        let store = presence_core::MemoryStore::new();
        let period = Period::Custom {
            from: date(2025, 3, 12),
            to: date(2025, 3, 10),
        };
        let mut output = Vec::new();
        let err = run(&mut output, &store, period, None, false).unwrap_err();
        assert_eq!(err.to_string(), "--to 2025-03-10 is before --from 2025-03-12");
        assert!(output.is_empty());
    }
}
