//! Time spent per actor over a range of calendar days.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Local, LocalResult, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::Serialize;

use crate::error::SessionError;
use crate::session::Session;
use crate::store::SessionStore;

/// An inclusive range of calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub const fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// A range covering a single day.
    pub const fn day(date: NaiveDate) -> Self {
        Self::new(date, date)
    }

    /// Returns `[start 00:00, end + 1 day 00:00)` in `tz`, converted to UTC.
    ///
    /// `None` when `start` is after `end`.
    pub fn bounds_in<Tz: TimeZone>(&self, tz: &Tz) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        if self.start > self.end {
            return None;
        }
        let after_end = self.end.succ_opt()?;
        Some((midnight_utc(tz, self.start), midnight_utc(tz, after_end)))
    }
}

/// Converts midnight of `date` in `tz` to UTC.
/// Ambiguous midnights (DST fall-back) resolve to the earlier instant.
fn midnight_utc<Tz: TimeZone>(tz: &Tz, date: NaiveDate) -> DateTime<Utc> {
    let midnight = date.and_time(NaiveTime::MIN);
    match tz.from_local_datetime(&midnight) {
        LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => dt.with_timezone(&Utc),
        LocalResult::None => {
            // Midnight fell into a spring-forward gap; 1am exists.
            let one_am = midnight + Duration::hours(1);
            tz.from_local_datetime(&one_am)
                .earliest()
                .map_or_else(|| Utc.from_utc_datetime(&midnight), |dt| dt.with_timezone(&Utc))
        }
    }
}

/// Time spent by one actor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActorTotal {
    pub actor_email: String,
    pub actor_name: Option<String>,
    pub total_seconds: i64,
    pub session_count: usize,
}

/// Aggregated time for a range.
///
/// `total_seconds` always equals the sum of `per_actor[*].total_seconds`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TimeSummary {
    pub per_actor: Vec<ActorTotal>,
    pub total_seconds: i64,
}

impl TimeSummary {
    pub fn is_empty(&self) -> bool {
        self.per_actor.is_empty()
    }

    pub fn session_count(&self) -> usize {
        self.per_actor.iter().map(|a| a.session_count).sum()
    }
}

/// Aggregates closed sessions in the local time zone, degrading to an empty
/// summary if the store fails.
pub fn aggregate<S: SessionStore + ?Sized>(
    store: &S,
    range: DateRange,
    actor_filter: Option<&str>,
) -> TimeSummary {
    aggregate_in(store, range, actor_filter, &Local)
}

/// Like [`aggregate`], with day boundaries taken in `tz`.
pub fn aggregate_in<S: SessionStore + ?Sized, Tz: TimeZone>(
    store: &S,
    range: DateRange,
    actor_filter: Option<&str>,
    tz: &Tz,
) -> TimeSummary {
    try_aggregate_in(store, range, actor_filter, tz).unwrap_or_else(|err| {
        tracing::warn!(error = %err, "time aggregation query failed");
        TimeSummary::default()
    })
}

/// Aggregates closed sessions in the local time zone, surfacing store errors.
pub fn try_aggregate<S: SessionStore + ?Sized>(
    store: &S,
    range: DateRange,
    actor_filter: Option<&str>,
) -> Result<TimeSummary, SessionError> {
    try_aggregate_in(store, range, actor_filter, &Local)
}

/// Sums durations of closed sessions whose login falls in `range`, per actor.
pub fn try_aggregate_in<S: SessionStore + ?Sized, Tz: TimeZone>(
    store: &S,
    range: DateRange,
    actor_filter: Option<&str>,
    tz: &Tz,
) -> Result<TimeSummary, SessionError> {
    let Some((start, end)) = range.bounds_in(tz) else {
        return Ok(TimeSummary::default());
    };
    let sessions = store.query_by_login_range(start, end, actor_filter)?;
    let matching = sessions.iter().filter(|s| {
        s.login_time >= start
            && s.login_time < end
            && actor_filter.is_none_or(|email| s.actor_email == email)
    });
    Ok(summarize(matching))
}

/// Folds sessions into per-actor totals. Open sessions are skipped.
pub fn summarize<'a>(sessions: impl IntoIterator<Item = &'a Session>) -> TimeSummary {
    struct Group<'a> {
        total_seconds: i64,
        session_count: usize,
        named_at: Option<(DateTime<Utc>, &'a str)>,
    }

    let mut groups: HashMap<&str, Group<'_>> = HashMap::new();
    for session in sessions {
        let Some(duration) = session.duration_seconds else {
            continue;
        };
        let group = groups
            .entry(session.actor_email.as_str())
            .or_insert(Group {
                total_seconds: 0,
                session_count: 0,
                named_at: None,
            });
        group.total_seconds += duration;
        group.session_count += 1;
        if let Some(name) = session.actor_name.as_deref().filter(|n| !n.is_empty()) {
            if group
                .named_at
                .is_none_or(|(seen_at, _)| session.login_time > seen_at)
            {
                group.named_at = Some((session.login_time, name));
            }
        }
    }

    let mut per_actor: Vec<ActorTotal> = groups
        .into_iter()
        .map(|(email, group)| ActorTotal {
            actor_email: email.to_string(),
            actor_name: group.named_at.map(|(_, name)| name.to_string()),
            total_seconds: group.total_seconds,
            session_count: group.session_count,
        })
        .collect();
    per_actor.sort_by(|a, b| {
        b.total_seconds
            .cmp(&a.total_seconds)
            .then_with(|| a.actor_email.cmp(&b.actor_email))
    });
    let total_seconds = per_actor.iter().map(|a| a.total_seconds).sum();

    TimeSummary {
        per_actor,
        total_seconds,
    }
}
