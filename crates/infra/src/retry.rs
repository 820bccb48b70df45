//! Optimistic commit loop.
//!
//! Services read state, decide, and build a `ChangeSet` whose writes carry the
//! versions they were decided against. When another writer got there first the
//! store answers `Concurrency`; the loop re-reads and decides again. Any other
//! failure, including a domain error raised while re-deciding, ends the loop.

use tracing::warn;

use finken_events::EventLogRecord;

use crate::config::LedgerConfig;
use crate::error::{LedgerError, LedgerResult};
use crate::ledger_store::{ChangeSet, LedgerStore, StoreError};

pub(crate) fn commit_with_retry<S, T, F>(
    store: &S,
    config: &LedgerConfig,
    operation: &'static str,
    mut prepare: F,
) -> LedgerResult<(T, Vec<EventLogRecord>)>
where
    S: LedgerStore + ?Sized,
    F: FnMut() -> LedgerResult<(ChangeSet, T)>,
{
    let attempts = config.commit_retries.max(1);
    let mut attempt = 1;
    loop {
        let (changes, output) = prepare()?;
        match store.commit(changes) {
            Ok(records) => return Ok((output, records)),
            Err(StoreError::Concurrency(msg)) if attempt < attempts => {
                warn!(operation, attempt, reason = %msg, "commit lost a version race; retrying");
                attempt += 1;
            }
            Err(StoreError::Concurrency(msg)) => {
                warn!(operation, attempts, reason = %msg, "commit retries exhausted");
                return Err(LedgerError::Conflict(msg));
            }
            Err(e) => return Err(e.into()),
        }
    }
}
