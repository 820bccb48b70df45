//! Postgres-backed ledger store.
//!
//! Accounts, journal entries, movements and event-log records each live in
//! their own table. The columns the store has to enforce constraints on
//! (number, name, version, reversal link, posting order) are real columns;
//! the full record is kept next to them as a JSONB document.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError | Scenario |
//! |------------|----------------------|------------|----------|
//! | Database (unique violation) | `23505` | `UniqueViolation` | Duplicate account number/name, second live reversal, reused movement id |
//! | Database (foreign key violation) | `23503` | `Corrupt` | Movement referencing a missing account or entry |
//! | Database (check constraint violation) | `23514` | `Corrupt` | Non-positive version |
//! | Database (serialization failure / deadlock) | `40001` / `40P01` | `Concurrency` | Concurrent commit; safe to retry |
//! | Database (other) | Any other | `Unavailable` | |
//! | PoolClosed, Io, Tls, PoolTimedOut | N/A | `Unavailable` | Connection problems |
//! | Decode, ColumnDecode | N/A | `Corrupt` | Stored document no longer matches the record type |
//!
//! ## Thread Safety
//!
//! `PostgresLedgerStore` is `Send + Sync`. The `LedgerStore` trait is
//! synchronous, so each call is driven to completion on the runtime the store
//! was connected from. Call it from blocking threads (`spawn_blocking`) or a
//! multi-threaded runtime, never from a current-thread runtime.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Row, Transaction};
use tokio::runtime::Handle;
use tracing::instrument;

use finken_accounting::{Account, JournalEntry, LedgerMovement};
use finken_core::{AccountId, EventLogId, ExpectedVersion, JournalEntryId, MovementId};
use finken_events::{EventLogFilter, EventLogPage, EventLogRecord, NewEventLog, Pagination};

use super::in_memory::name_key;
use super::r#trait::{AccountWrite, ChangeSet, EntryWrite, LedgerSnapshot, LedgerStore, StoreError};

/// Tables, sequences and indexes; every statement is idempotent.
const SCHEMA: &str = r#"
CREATE SEQUENCE IF NOT EXISTS ledger_account_id_seq;
CREATE SEQUENCE IF NOT EXISTS ledger_entry_id_seq;
CREATE SEQUENCE IF NOT EXISTS ledger_movement_id_seq;

CREATE TABLE IF NOT EXISTS ledger_accounts (
    id       BIGINT PRIMARY KEY,
    number   TEXT NOT NULL,
    name_key TEXT NOT NULL,
    version  BIGINT NOT NULL CHECK (version > 0),
    document JSONB NOT NULL,
    CONSTRAINT ledger_accounts_number_key UNIQUE (number),
    CONSTRAINT ledger_accounts_name_key UNIQUE (name_key)
);

CREATE TABLE IF NOT EXISTS ledger_journal_entries (
    id       BIGINT PRIMARY KEY,
    reverses BIGINT NULL,
    status   TEXT NOT NULL,
    version  BIGINT NOT NULL CHECK (version > 0),
    document JSONB NOT NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS ledger_journal_entries_live_reversal
    ON ledger_journal_entries (reverses)
    WHERE reverses IS NOT NULL AND status <> 'Rejected';

CREATE TABLE IF NOT EXISTS ledger_movements (
    id         BIGINT PRIMARY KEY,
    account_id BIGINT NOT NULL REFERENCES ledger_accounts (id),
    entry_id   BIGINT NOT NULL REFERENCES ledger_journal_entries (id),
    posted_at  TIMESTAMPTZ NOT NULL,
    document   JSONB NOT NULL
);

CREATE INDEX IF NOT EXISTS ledger_movements_by_account
    ON ledger_movements (account_id, posted_at, id);

CREATE TABLE IF NOT EXISTS ledger_event_logs (
    id          BIGSERIAL PRIMARY KEY,
    actor_id    UUID NOT NULL,
    action      TEXT NOT NULL,
    table_name  TEXT NOT NULL,
    record_id   TEXT NOT NULL,
    occurred_at TIMESTAMPTZ NOT NULL,
    document    JSONB NOT NULL
);

CREATE INDEX IF NOT EXISTS ledger_event_logs_by_time
    ON ledger_event_logs (occurred_at DESC, id DESC);
"#;

/// Postgres-backed ledger store.
///
/// ## Optimistic Concurrency
///
/// `commit()` applies a `ChangeSet` inside one transaction. Every account and
/// entry write is guarded by its `ExpectedVersion`:
/// - `Absent` inserts and fails if the id already exists
/// - `Exact(v)` updates only the row still at version `v`
/// - `Any` upserts
///
/// A guard that matches no row fails the whole commit with `Concurrency`,
/// and the transaction is rolled back.
#[derive(Debug, Clone)]
pub struct PostgresLedgerStore {
    pool: Arc<PgPool>,
    runtime: Handle,
}

impl PostgresLedgerStore {
    /// Connect, create the schema if missing and bind to the current runtime.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Self::from_pool(pool).await
    }

    pub async fn from_pool(pool: PgPool) -> Result<Self, StoreError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&pool)
            .await
            .map_err(|e| map_sqlx_error("create_schema", e))?;
        Ok(Self {
            pool: Arc::new(pool),
            runtime: Handle::current(),
        })
    }

    fn block_on<T>(&self, fut: impl Future<Output = Result<T, StoreError>>) -> Result<T, StoreError> {
        tokio::task::block_in_place(|| self.runtime.block_on(fut))
    }

    async fn next_value(&self, sequence: &'static str) -> Result<i64, StoreError> {
        let row = sqlx::query("SELECT nextval($1::regclass) AS id")
            .bind(sequence)
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("nextval", e))?;
        row.try_get("id").map_err(|e| map_sqlx_error("nextval", e))
    }

    async fn allocate_movement_ids(&self, count: usize) -> Result<Vec<MovementId>, StoreError> {
        let count = i64::try_from(count)
            .map_err(|_| StoreError::Unavailable(format!("cannot allocate {count} movement ids")))?;
        let rows = sqlx::query(
            "SELECT nextval('ledger_movement_id_seq') AS id FROM generate_series(1, $1)",
        )
        .bind(count)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("next_movement_ids", e))?;

        let mut ids = rows
            .iter()
            .map(|row| row.try_get::<i64, _>("id").map(MovementId::new))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| map_sqlx_error("next_movement_ids", e))?;
        ids.sort();
        Ok(ids)
    }

    async fn load_account(&self, id: AccountId) -> Result<Option<Account>, StoreError> {
        let row = sqlx::query("SELECT document FROM ledger_accounts WHERE id = $1")
            .bind(id.get())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("load_account", e))?;
        row.as_ref().map(document).transpose()
    }

    async fn load_accounts<'e, E>(executor: E) -> Result<BTreeMap<AccountId, Account>, StoreError>
    where
        E: sqlx::Executor<'e, Database = Postgres>,
    {
        let rows = sqlx::query("SELECT document FROM ledger_accounts ORDER BY id")
            .fetch_all(executor)
            .await
            .map_err(|e| map_sqlx_error("load_accounts", e))?;
        rows.iter()
            .map(|row| document::<Account>(row).map(|a| (a.id, a)))
            .collect()
    }

    async fn load_entry(&self, id: JournalEntryId) -> Result<Option<JournalEntry>, StoreError> {
        let row = sqlx::query("SELECT document FROM ledger_journal_entries WHERE id = $1")
            .bind(id.get())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("load_entry", e))?;
        row.as_ref().map(document).transpose()
    }

    async fn load_entries(&self) -> Result<Vec<JournalEntry>, StoreError> {
        let rows = sqlx::query("SELECT document FROM ledger_journal_entries ORDER BY id")
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("load_entries", e))?;
        rows.iter().map(document).collect()
    }

    async fn load_movements_for<'e, E>(
        executor: E,
        account_id: AccountId,
    ) -> Result<Vec<LedgerMovement>, StoreError>
    where
        E: sqlx::Executor<'e, Database = Postgres>,
    {
        let rows = sqlx::query(
            "SELECT document FROM ledger_movements WHERE account_id = $1 ORDER BY posted_at, id",
        )
        .bind(account_id.get())
        .fetch_all(executor)
        .await
        .map_err(|e| map_sqlx_error("load_movements", e))?;
        rows.iter().map(document).collect()
    }

    /// Start a read-only transaction that sees one consistent snapshot.
    async fn begin_snapshot(&self) -> Result<Transaction<'static, Postgres>, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ READ ONLY")
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("set_isolation", e))?;
        Ok(tx)
    }

    #[instrument(skip(self), err)]
    async fn load_history(
        &self,
        account_id: AccountId,
    ) -> Result<Option<(Account, Vec<LedgerMovement>)>, StoreError> {
        let mut tx = self.begin_snapshot().await?;
        let row = sqlx::query("SELECT document FROM ledger_accounts WHERE id = $1")
            .bind(account_id.get())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("load_history", e))?;
        let Some(account) = row.as_ref().map(document::<Account>).transpose()? else {
            return Ok(None);
        };
        let movements = Self::load_movements_for(&mut *tx, account_id).await?;
        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(Some((account, movements)))
    }

    #[instrument(skip(self), err)]
    async fn load_snapshot(&self) -> Result<LedgerSnapshot, StoreError> {
        let mut tx = self.begin_snapshot().await?;
        let accounts = Self::load_accounts(&mut *tx).await?;
        let rows = sqlx::query("SELECT document FROM ledger_movements ORDER BY posted_at, id")
            .fetch_all(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("load_snapshot", e))?;
        let movements = rows.iter().map(document).collect::<Result<Vec<_>, _>>()?;
        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(LedgerSnapshot { accounts, movements })
    }

    #[instrument(skip(self), err)]
    async fn query_event_logs(
        &self,
        filter: &EventLogFilter,
        pagination: Pagination,
    ) -> Result<EventLogPage, StoreError> {
        // Optional filters share one parameterized WHERE clause.
        const WHERE: &str = r#"
            WHERE ($1::text IS NULL OR table_name = $1)
              AND ($2::text IS NULL OR record_id = $2)
              AND ($3::uuid IS NULL OR actor_id = $3)
              AND ($4::text IS NULL OR action = $4)
              AND ($5::timestamptz IS NULL OR occurred_at >= $5)
              AND ($6::timestamptz IS NULL OR occurred_at <= $6)
        "#;
        let table = filter.entity.map(|e| e.table_name());
        let record_id = filter.record_id.as_deref();
        let actor = filter.actor.map(|a| *a.as_uuid());
        let action = filter.action.map(|a| a.as_str());

        let mut tx = self.begin_snapshot().await?;
        let count_row = sqlx::query(&format!("SELECT COUNT(*) AS total FROM ledger_event_logs {WHERE}"))
            .bind(table)
            .bind(record_id)
            .bind(actor)
            .bind(action)
            .bind(filter.since)
            .bind(filter.until)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("count_event_logs", e))?;
        let total: i64 = count_row
            .try_get("total")
            .map_err(|e| map_sqlx_error("count_event_logs", e))?;

        let rows = sqlx::query(&format!(
            "SELECT id, document FROM ledger_event_logs {WHERE} \
             ORDER BY occurred_at DESC, id DESC LIMIT $7 OFFSET $8"
        ))
        .bind(table)
        .bind(record_id)
        .bind(actor)
        .bind(action)
        .bind(filter.since)
        .bind(filter.until)
        .bind(i64::from(pagination.limit))
        .bind(i64::from(pagination.offset))
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("query_event_logs", e))?;
        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        let records = rows
            .iter()
            .map(|row| {
                let id: i64 = row.try_get("id").map_err(|e| map_sqlx_error("query_event_logs", e))?;
                let new: NewEventLog = document(row)?;
                Ok(EventLogRecord::from_new(EventLogId::new(id), new))
            })
            .collect::<Result<Vec<_>, StoreError>>()?;

        let total = u64::try_from(total).unwrap_or_default();
        Ok(EventLogPage {
            records,
            total,
            pagination,
            has_more: total > u64::from(pagination.offset) + u64::from(pagination.limit),
        })
    }

    #[instrument(
        skip(self, changes),
        fields(
            accounts = changes.accounts.len(),
            entries = changes.entries.len(),
            movements = changes.movements.len()
        ),
        err
    )]
    async fn commit_changes(&self, changes: ChangeSet) -> Result<Vec<EventLogRecord>, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        match apply(&mut tx, changes).await {
            Ok(committed) => {
                tx.commit()
                    .await
                    .map_err(|e| map_sqlx_error("commit_transaction", e))?;
                Ok(committed)
            }
            Err(err) => {
                tx.rollback()
                    .await
                    .map_err(|e| map_sqlx_error("rollback", e))?;
                Err(err)
            }
        }
    }
}

async fn apply(
    tx: &mut Transaction<'static, Postgres>,
    changes: ChangeSet,
) -> Result<Vec<EventLogRecord>, StoreError> {
    for write in &changes.accounts {
        write_account(tx, write).await?;
    }
    for write in &changes.entries {
        write_entry(tx, write).await?;
    }
    for m in &changes.movements {
        sqlx::query(
            r#"
            INSERT INTO ledger_movements (id, account_id, entry_id, posted_at, document)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(m.id.get())
        .bind(m.account_id.get())
        .bind(m.entry_id.get())
        .bind(m.posted_at)
        .bind(Json(m))
        .execute(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("insert_movement", e))?;
    }

    let mut committed = Vec::with_capacity(changes.audit.len());
    for log in changes.audit {
        let row = sqlx::query(
            r#"
            INSERT INTO ledger_event_logs (actor_id, action, table_name, record_id, occurred_at, document)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(*log.actor.as_uuid())
        .bind(log.action.as_str())
        .bind(log.entity.table_name())
        .bind(&log.record_id)
        .bind(log.timestamp)
        .bind(Json(&log))
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("insert_event_log", e))?;
        let id: i64 = row.try_get("id").map_err(|e| map_sqlx_error("insert_event_log", e))?;
        committed.push(EventLogRecord::from_new(EventLogId::new(id), log));
    }
    Ok(committed)
}

async fn write_account(tx: &mut Transaction<'static, Postgres>, write: &AccountWrite) -> Result<(), StoreError> {
    let account = &write.account;
    let version = column_version(account.version)?;
    let sql = match write.expected {
        ExpectedVersion::Absent => {
            r#"
            INSERT INTO ledger_accounts (id, number, name_key, version, document)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO NOTHING
            "#
        }
        ExpectedVersion::Exact(_) => {
            r#"
            UPDATE ledger_accounts
            SET number = $2, name_key = $3, version = $4, document = $5
            WHERE id = $1 AND version = $6
            "#
        }
        ExpectedVersion::Any => {
            r#"
            INSERT INTO ledger_accounts (id, number, name_key, version, document)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO UPDATE
            SET number = EXCLUDED.number, name_key = EXCLUDED.name_key,
                version = EXCLUDED.version, document = EXCLUDED.document
            "#
        }
    };
    let mut query = sqlx::query(sql)
        .bind(account.id.get())
        .bind(&account.number)
        .bind(name_key(&account.name))
        .bind(version)
        .bind(Json(account));
    if let ExpectedVersion::Exact(expected) = write.expected {
        query = query.bind(column_version(expected)?);
    }
    let result = query
        .execute(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("write_account", e))?;
    if result.rows_affected() == 0 {
        return Err(StoreError::Concurrency(format!(
            "account {}: expected {:?}",
            account.id, write.expected
        )));
    }
    Ok(())
}

async fn write_entry(tx: &mut Transaction<'static, Postgres>, write: &EntryWrite) -> Result<(), StoreError> {
    let entry = &write.entry;
    let version = column_version(entry.version)?;
    let sql = match write.expected {
        ExpectedVersion::Absent => {
            r#"
            INSERT INTO ledger_journal_entries (id, reverses, status, version, document)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO NOTHING
            "#
        }
        ExpectedVersion::Exact(_) => {
            r#"
            UPDATE ledger_journal_entries
            SET reverses = $2, status = $3, version = $4, document = $5
            WHERE id = $1 AND version = $6
            "#
        }
        ExpectedVersion::Any => {
            r#"
            INSERT INTO ledger_journal_entries (id, reverses, status, version, document)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO UPDATE
            SET reverses = EXCLUDED.reverses, status = EXCLUDED.status,
                version = EXCLUDED.version, document = EXCLUDED.document
            "#
        }
    };
    let mut query = sqlx::query(sql)
        .bind(entry.id.get())
        .bind(entry.reverses.map(JournalEntryId::get))
        .bind(entry.status.as_str())
        .bind(version)
        .bind(Json(entry));
    if let ExpectedVersion::Exact(expected) = write.expected {
        query = query.bind(column_version(expected)?);
    }
    let result = query
        .execute(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("write_entry", e))?;
    if result.rows_affected() == 0 {
        return Err(StoreError::Concurrency(format!(
            "journal entry {}: expected {:?}",
            entry.id, write.expected
        )));
    }
    Ok(())
}

fn column_version(version: u64) -> Result<i64, StoreError> {
    i64::try_from(version).map_err(|_| StoreError::Corrupt(format!("version {version} does not fit a BIGINT")))
}

fn document<T: DeserializeOwned>(row: &PgRow) -> Result<T, StoreError> {
    row.try_get::<Json<T>, _>("document")
        .map(|Json(value)| value)
        .map_err(|e| map_sqlx_error("decode_document", e))
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let detail = match db_err.constraint() {
                Some(constraint) => format!("{} (constraint {constraint})", db_err.message()),
                None => db_err.message().to_string(),
            };
            classify(operation, db_err.code().as_deref(), &detail)
        }
        sqlx::Error::Decode(_) | sqlx::Error::ColumnDecode { .. } | sqlx::Error::ColumnNotFound(_) => {
            StoreError::Corrupt(format!("undecodable row in {operation}: {err}"))
        }
        sqlx::Error::RowNotFound => {
            StoreError::Corrupt(format!("unexpected row not found in {operation}"))
        }
        _ => StoreError::Unavailable(format!("sqlx error in {operation}: {err}")),
    }
}

/// Map a PostgreSQL SQLSTATE to the store's error taxonomy.
fn classify(operation: &str, code: Option<&str>, detail: &str) -> StoreError {
    let msg = format!("database error in {operation}: {detail}");
    match code {
        Some("23505") => StoreError::UniqueViolation(msg),
        Some("23503") | Some("23514") => StoreError::Corrupt(msg),
        Some("40001") | Some("40P01") => StoreError::Concurrency(msg),
        _ => StoreError::Unavailable(msg),
    }
}

impl LedgerStore for PostgresLedgerStore {
    fn next_account_id(&self) -> Result<AccountId, StoreError> {
        self.block_on(self.next_value("ledger_account_id_seq"))
            .map(AccountId::new)
    }

    fn next_entry_id(&self) -> Result<JournalEntryId, StoreError> {
        self.block_on(self.next_value("ledger_entry_id_seq"))
            .map(JournalEntryId::new)
    }

    fn next_movement_ids(&self, count: usize) -> Result<Vec<MovementId>, StoreError> {
        if count == 0 {
            return Ok(vec![]);
        }
        self.block_on(self.allocate_movement_ids(count))
    }

    fn account(&self, id: AccountId) -> Result<Option<Account>, StoreError> {
        self.block_on(self.load_account(id))
    }

    fn accounts(&self) -> Result<BTreeMap<AccountId, Account>, StoreError> {
        self.block_on(Self::load_accounts(&*self.pool))
    }

    fn entry(&self, id: JournalEntryId) -> Result<Option<JournalEntry>, StoreError> {
        self.block_on(self.load_entry(id))
    }

    fn entries(&self) -> Result<Vec<JournalEntry>, StoreError> {
        self.block_on(self.load_entries())
    }

    fn movements_for(&self, account_id: AccountId) -> Result<Vec<LedgerMovement>, StoreError> {
        self.block_on(Self::load_movements_for(&*self.pool, account_id))
    }

    fn account_history(
        &self,
        account_id: AccountId,
    ) -> Result<Option<(Account, Vec<LedgerMovement>)>, StoreError> {
        self.block_on(self.load_history(account_id))
    }

    fn snapshot(&self) -> Result<LedgerSnapshot, StoreError> {
        self.block_on(self.load_snapshot())
    }

    fn event_logs(
        &self,
        filter: &EventLogFilter,
        pagination: Pagination,
    ) -> Result<EventLogPage, StoreError> {
        self.block_on(self.query_event_logs(filter, pagination))
    }

    fn commit(&self, changes: ChangeSet) -> Result<Vec<EventLogRecord>, StoreError> {
        if changes.is_empty() {
            return Ok(vec![]);
        }
        self.block_on(self.commit_changes(changes))
    }
}
