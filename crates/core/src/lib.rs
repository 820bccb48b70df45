//! `finken-core` — bookkeeping foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod aggregate;
pub mod error;
pub mod id;
pub mod money;
pub mod period;

pub use aggregate::{Aggregate, AggregateRoot, ExpectedVersion};
pub use error::{DomainError, DomainResult};
pub use id::{AccountId, ActorId, EventLogId, JournalEntryId, MovementId};
pub use money::Money;
pub use period::DateRange;
