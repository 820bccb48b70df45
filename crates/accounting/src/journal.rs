use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use finken_core::{AccountId, ActorId, Aggregate, AggregateRoot, DomainError, DomainResult, JournalEntryId, Money};
use finken_events::{ActionType, Event};

use crate::account::{Account, Side};

/// Lifecycle status. `Approved` and `Rejected` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryStatus {
    Pending,
    Approved,
    Rejected,
}

impl EntryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryStatus::Pending => "Pending",
            EntryStatus::Approved => "Approved",
            EntryStatus::Rejected => "Rejected",
        }
    }
}

impl core::str::FromStr for EntryStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(EntryStatus::Pending),
            "approved" => Ok(EntryStatus::Approved),
            "rejected" => Ok(EntryStatus::Rejected),
            other => Err(DomainError::validation(format!("unknown entry status '{other}'"))),
        }
    }
}

/// One side of a journal entry (immutable once the entry is created).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntryLine {
    pub account_id: AccountId,
    #[serde(rename = "type")]
    pub side: Side,
    /// Strictly positive, two-decimal precision.
    pub amount: Money,
}

/// Reference to a supporting document. The ledger never reads the file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentRef {
    pub file_name: String,
    pub location: String,
    pub content_type: Option<String>,
    pub size_bytes: u64,
    pub uploaded_by: ActorId,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAttachment {
    pub file_name: String,
    pub location: String,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub size_bytes: u64,
}

/// Input for creating a journal entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewJournalEntry {
    pub date: NaiveDate,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_adjusting: bool,
    pub lines: Vec<JournalEntryLine>,
    #[serde(default)]
    pub attachments: Vec<NewAttachment>,
    /// Set only for entries produced by [`NewJournalEntry::reversal_of`].
    #[serde(default, skip_deserializing)]
    pub reverses: Option<JournalEntryId>,
}

impl NewJournalEntry {
    /// A correcting entry that mirrors an approved entry with every side swapped.
    pub fn reversal_of(
        original: &JournalEntry,
        date: NaiveDate,
        description: Option<String>,
    ) -> DomainResult<NewJournalEntry> {
        if original.status != EntryStatus::Approved {
            return Err(DomainError::invalid_state(format!(
                "only approved entries can be reversed; entry {} is {}",
                original.id,
                original.status.as_str()
            )));
        }

        let description = description
            .filter(|d| !d.trim().is_empty())
            .unwrap_or_else(|| format!("Reversal of entry {}", original.id));

        Ok(NewJournalEntry {
            date,
            description: Some(description),
            is_adjusting: original.is_adjusting,
            lines: original
                .lines
                .iter()
                .map(|l| JournalEntryLine {
                    account_id: l.account_id,
                    side: l.side.opposite(),
                    amount: l.amount,
                })
                .collect(),
            attachments: Vec::new(),
            reverses: Some(original.id),
        })
    }
}

/// Totals of a set of lines, split by side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LineTotals {
    pub debit: Money,
    pub credit: Money,
    pub debit_lines: usize,
    pub credit_lines: usize,
}

impl LineTotals {
    /// Fails with `Validation` when a side's total leaves the representable range.
    pub fn of(lines: &[JournalEntryLine]) -> DomainResult<Self> {
        lines.iter().try_fold(LineTotals::default(), |mut t, line| {
            match line.side {
                Side::Debit => {
                    t.debit = t.debit.checked_add(line.amount)?;
                    t.debit_lines += 1;
                }
                Side::Credit => {
                    t.credit = t.credit.checked_add(line.amount)?;
                    t.credit_lines += 1;
                }
            }
            Ok(t)
        })
    }

    pub fn is_balanced(&self) -> bool {
        self.debit == self.credit
    }
}

/// Structural and balance validation of an entry's lines.
///
/// Checks, in order: at least one debit and one credit line, strictly positive
/// amounts, every account known and active, and debits equal to credits.
pub fn validate_lines(
    lines: &[JournalEntryLine],
    accounts: &BTreeMap<AccountId, Account>,
) -> DomainResult<LineTotals> {
    let totals = LineTotals::of(lines)?;
    if totals.debit_lines == 0 || totals.credit_lines == 0 {
        return Err(DomainError::validation(
            "a journal entry needs at least one debit line and one credit line",
        ));
    }

    for (idx, line) in lines.iter().enumerate() {
        if !line.amount.is_positive() {
            return Err(DomainError::validation(format!(
                "line {}: amount must be greater than zero, got {}",
                idx + 1,
                line.amount
            )));
        }
        match accounts.get(&line.account_id) {
            None => {
                return Err(DomainError::validation(format!(
                    "line {}: unknown account {}",
                    idx + 1,
                    line.account_id
                )));
            }
            Some(acct) if !acct.is_active => {
                return Err(DomainError::validation(format!(
                    "line {}: account {} ({}) is inactive",
                    idx + 1,
                    acct.number,
                    acct.name
                )));
            }
            Some(_) => {}
        }
    }

    if !totals.is_balanced() {
        return Err(DomainError::validation(format!(
            "debits ({}) must equal credits ({})",
            totals.debit, totals.credit
        )));
    }

    Ok(totals)
}

/// Aggregate root: a journal entry and its lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub id: JournalEntryId,
    pub date: NaiveDate,
    pub description: Option<String>,
    pub is_adjusting: bool,
    pub status: EntryStatus,
    pub lines: Vec<JournalEntryLine>,
    pub created_by: ActorId,
    pub created_at: DateTime<Utc>,
    /// Reviewer of the entry; set on approval and on rejection.
    pub approved_by: Option<ActorId>,
    pub approved_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    pub attachments: Vec<AttachmentRef>,
    /// The approved entry this one reverses, if any.
    pub reverses: Option<JournalEntryId>,
    pub version: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum JournalCommand {
    Approve { reviewer: ActorId, at: DateTime<Utc> },
    Reject { reviewer: ActorId, reason: String, at: DateTime<Utc> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum JournalEvent {
    Created { at: DateTime<Utc> },
    Approved { reviewer: ActorId, at: DateTime<Utc> },
    Rejected { reviewer: ActorId, reason: String, at: DateTime<Utc> },
}

impl Event for JournalEvent {
    fn event_type(&self) -> &'static str {
        match self {
            JournalEvent::Created { .. } => "accounting.journal.created",
            JournalEvent::Approved { .. } => "accounting.journal.approved",
            JournalEvent::Rejected { .. } => "accounting.journal.rejected",
        }
    }

    fn action(&self) -> ActionType {
        match self {
            JournalEvent::Created { .. } => ActionType::Create,
            JournalEvent::Approved { .. } => ActionType::Approve,
            JournalEvent::Rejected { .. } => ActionType::Reject,
        }
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            JournalEvent::Created { at }
            | JournalEvent::Approved { at, .. }
            | JournalEvent::Rejected { at, .. } => *at,
        }
    }
}

impl JournalEntry {
    /// Validate the input against the current chart and build a Pending entry.
    pub fn create(
        id: JournalEntryId,
        new: &NewJournalEntry,
        accounts: &BTreeMap<AccountId, Account>,
        created_by: ActorId,
        at: DateTime<Utc>,
    ) -> DomainResult<(JournalEntry, JournalEvent)> {
        validate_lines(&new.lines, accounts)?;

        let attachments = new
            .attachments
            .iter()
            .map(|a| {
                let file_name = a.file_name.trim();
                if file_name.is_empty() {
                    return Err(DomainError::validation("attachment file name must not be blank"));
                }
                Ok(AttachmentRef {
                    file_name: file_name.to_string(),
                    location: a.location.trim().to_string(),
                    content_type: a.content_type.clone(),
                    size_bytes: a.size_bytes,
                    uploaded_by: created_by,
                    uploaded_at: at,
                })
            })
            .collect::<DomainResult<Vec<_>>>()?;

        let entry = JournalEntry {
            id,
            date: new.date,
            description: new
                .description
                .as_deref()
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .map(str::to_string),
            is_adjusting: new.is_adjusting,
            status: EntryStatus::Pending,
            lines: new.lines.clone(),
            created_by,
            created_at: at,
            approved_by: None,
            approved_at: None,
            rejection_reason: None,
            attachments,
            reverses: new.reverses,
            version: 1,
        };
        Ok((entry, JournalEvent::Created { at }))
    }

    pub fn totals(&self) -> DomainResult<LineTotals> {
        LineTotals::of(&self.lines)
    }

    /// Re-check the balance invariant of a stored entry.
    ///
    /// Stored entries were validated at creation, so a failure here means the
    /// record was corrupted.
    pub fn ensure_balanced(&self) -> DomainResult<()> {
        let totals = self.totals().map_err(|e| {
            DomainError::consistency(format!("journal entry {}: {e}", self.id))
        })?;
        if totals.debit_lines == 0 || totals.credit_lines == 0 || !totals.is_balanced() {
            return Err(DomainError::consistency(format!(
                "journal entry {} is not balanced (debits {}, credits {})",
                self.id, totals.debit, totals.credit
            )));
        }
        Ok(())
    }

    fn ensure_pending(&self, action: &str) -> DomainResult<()> {
        if self.status != EntryStatus::Pending {
            return Err(DomainError::invalid_state(format!(
                "cannot {action} journal entry {}: status is {}",
                self.id,
                self.status.as_str()
            )));
        }
        Ok(())
    }
}

impl AggregateRoot for JournalEntry {
    type Id = JournalEntryId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

impl Aggregate for JournalEntry {
    type Command = JournalCommand;
    type Event = JournalEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            JournalEvent::Created { .. } => {}
            JournalEvent::Approved { reviewer, at } => {
                self.status = EntryStatus::Approved;
                self.approved_by = Some(*reviewer);
                self.approved_at = Some(*at);
            }
            JournalEvent::Rejected { reviewer, reason, at } => {
                self.status = EntryStatus::Rejected;
                self.approved_by = Some(*reviewer);
                self.approved_at = Some(*at);
                self.rejection_reason = Some(reason.clone());
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            JournalCommand::Approve { reviewer, at } => {
                self.ensure_pending("approve")?;
                self.ensure_balanced()?;
                Ok(vec![JournalEvent::Approved {
                    reviewer: *reviewer,
                    at: *at,
                }])
            }
            JournalCommand::Reject { reviewer, reason, at } => {
                let reason = reason.trim();
                if reason.is_empty() {
                    return Err(DomainError::validation("a rejection reason is required"));
                }
                self.ensure_pending("reject")?;
                Ok(vec![JournalEvent::Rejected {
                    reviewer: *reviewer,
                    reason: reason.to_string(),
                    at: *at,
                }])
            }
        }
    }
}
