//! Core domain logic for session presence tracking.
//!
//! This crate contains the fundamental types and logic for:
//! - Lifecycle: starting, refreshing and ending login sessions
//! - Presence: listing sessions with a recent heartbeat
//! - Aggregation: summing closed session time per actor over a date range
//!
//! All persistence goes through the [`SessionStore`] trait, passed explicitly
//! to every operation.

pub mod active;
pub mod aggregate;
mod error;
pub mod lifecycle;
pub mod session;
pub mod store;

pub use active::{ActiveUser, DEFAULT_ACTIVE_WINDOW_SECS, list_active, try_list_active};
pub use aggregate::{
    ActorTotal, DateRange, TimeSummary, aggregate, aggregate_in, try_aggregate, try_aggregate_in,
};
pub use error::{BoxError, SessionError};
pub use lifecycle::{
    EndOutcome, HeartbeatOutcome, end_session, end_session_at, heartbeat, heartbeat_at,
    start_session, start_session_at,
};
pub use session::{Actor, Session, SessionContext, SessionPatch, elapsed_seconds, window_start};
pub use store::{MemoryStore, SessionStore};
