use chrono::{DateTime, Utc};

use crate::audit::ActionType;

/// A domain-agnostic event.
///
/// Events are:
/// - **immutable** (treat them as facts)
/// - **classified** for the audit trail (`action`)
/// - designed to be **append-only**
pub trait Event: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Stable event name/type identifier (e.g. "accounting.journal.approved").
    fn event_type(&self) -> &'static str;

    /// How this event is classified in the event log.
    fn action(&self) -> ActionType;

    /// When the event occurred (wall-clock time of the decision).
    fn occurred_at(&self) -> DateTime<Utc>;
}
