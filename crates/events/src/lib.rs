//! Domain events and the audit trail model.

pub mod audit;
pub mod event;
pub mod handler;
pub mod query;

pub use audit::{ActionType, AuditEntity, EventLogRecord, NewEventLog, SnapshotError};
pub use event::Event;
pub use handler::execute;
pub use query::{EventLogFilter, EventLogPage, Pagination};
