use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use finken_core::{AccountId, ActorId, Aggregate, AggregateRoot, DomainError, DomainResult, JournalEntryId, Money};
use finken_events::{ActionType, Event};

/// Debit or credit. Used both for an account's normal side and a line's type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Debit,
    Credit,
}

impl Side {
    pub fn opposite(self) -> Self {
        match self {
            Side::Debit => Side::Credit,
            Side::Credit => Side::Debit,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Debit => "Debit",
            Side::Credit => "Credit",
        }
    }
}

impl core::str::FromStr for Side {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debit" | "dr" => Ok(Side::Debit),
            "credit" | "cr" => Ok(Side::Credit),
            other => Err(DomainError::validation(format!(
                "side must be Debit or Credit, got '{other}'"
            ))),
        }
    }
}

/// Signed change to a balance kept on `normal_side` caused by `amount` on `line_side`.
pub fn signed_delta(normal_side: Side, line_side: Side, amount: Money) -> Money {
    if normal_side == line_side { amount } else { -amount }
}

/// Account category. Only the five canonical categories are accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AccountCategory {
    Asset,
    Liability,
    Equity,
    Revenue,
    Expense,
}

impl AccountCategory {
    /// The side on which accounts of this category usually increase.
    pub fn natural_side(&self) -> Side {
        match self {
            AccountCategory::Asset | AccountCategory::Expense => Side::Debit,
            AccountCategory::Liability | AccountCategory::Equity | AccountCategory::Revenue => {
                Side::Credit
            }
        }
    }

    pub fn default_statement(&self) -> StatementType {
        match self {
            AccountCategory::Revenue | AccountCategory::Expense => StatementType::IncomeStatement,
            _ => StatementType::BalanceSheet,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AccountCategory::Asset => "Asset",
            AccountCategory::Liability => "Liability",
            AccountCategory::Equity => "Equity",
            AccountCategory::Revenue => "Revenue",
            AccountCategory::Expense => "Expense",
        }
    }
}

impl core::str::FromStr for AccountCategory {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asset" | "assets" => Ok(AccountCategory::Asset),
            "liability" | "liabilities" => Ok(AccountCategory::Liability),
            "equity" => Ok(AccountCategory::Equity),
            "revenue" | "revenues" => Ok(AccountCategory::Revenue),
            "expense" | "expenses" => Ok(AccountCategory::Expense),
            other => Err(DomainError::validation(format!(
                "category must be one of Asset, Liability, Equity, Revenue, Expense, got '{other}'"
            ))),
        }
    }
}

/// Which financial statement an account is reported on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatementType {
    #[serde(rename = "IS")]
    IncomeStatement,
    #[serde(rename = "BS")]
    BalanceSheet,
    #[serde(rename = "RE")]
    RetainedEarnings,
}

impl core::str::FromStr for StatementType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "IS" => Ok(StatementType::IncomeStatement),
            "BS" => Ok(StatementType::BalanceSheet),
            "RE" => Ok(StatementType::RetainedEarnings),
            other => Err(DomainError::validation(format!(
                "statement type must be IS, BS or RE, got '{other}'"
            ))),
        }
    }
}

/// Subcategory marking the equity accounts that hold retained earnings.
pub const RETAINED_EARNINGS_SUBCATEGORY: &str = "Retained Earnings";

/// Aggregate root: one account of the chart.
///
/// `balance` is a cache of `initial_balance` folded with every posted movement;
/// it is only ever changed by [`AccountEvent::BalancePosted`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub number: String,
    pub name: String,
    pub description: Option<String>,
    pub category: AccountCategory,
    pub subcategory: Option<String>,
    pub normal_side: Side,
    pub initial_balance: Money,
    pub balance: Money,
    pub display_order: i32,
    pub statement_type: StatementType,
    pub comment: Option<String>,
    pub is_active: bool,
    pub created_by: ActorId,
    pub created_at: DateTime<Utc>,
    /// Number of ledger movements posted to the account.
    pub movement_count: u64,
    pub version: u64,
}

/// Input for opening a new account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAccount {
    pub number: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub category: AccountCategory,
    #[serde(default)]
    pub subcategory: Option<String>,
    pub normal_side: Option<Side>,
    #[serde(default)]
    pub initial_balance: Money,
    #[serde(default)]
    pub display_order: Option<i32>,
    #[serde(default)]
    pub statement_type: Option<StatementType>,
    #[serde(default)]
    pub comment: Option<String>,
}

/// Partial update of an account's descriptive fields.
///
/// For the optional text fields an empty string clears the value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountPatch {
    #[serde(default)]
    pub number: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<AccountCategory>,
    #[serde(default)]
    pub subcategory: Option<String>,
    #[serde(default)]
    pub normal_side: Option<Side>,
    #[serde(default)]
    pub display_order: Option<i32>,
    #[serde(default)]
    pub statement_type: Option<StatementType>,
    #[serde(default)]
    pub comment: Option<String>,
}

impl AccountPatch {
    pub fn is_empty(&self) -> bool {
        *self == AccountPatch::default()
    }
}

fn validate_number(number: &str) -> DomainResult<String> {
    let number = number.trim();
    if number.is_empty() {
        return Err(DomainError::validation("account number must not be blank"));
    }
    if !number.chars().all(|c| c.is_ascii_digit()) {
        return Err(DomainError::validation(format!(
            "account number '{number}' must contain digits only"
        )));
    }
    Ok(number.to_string())
}

fn validate_name(name: &str) -> DomainResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(DomainError::validation("account name must not be blank"));
    }
    Ok(name.to_string())
}

fn optional_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

impl NewAccount {
    /// Normalise and check the input; returns the cleaned copy.
    pub fn validated(&self) -> DomainResult<NewAccount> {
        let normal_side = self
            .normal_side
            .ok_or_else(|| DomainError::validation("normal side is required"))?;

        Ok(NewAccount {
            number: validate_number(&self.number)?,
            name: validate_name(&self.name)?,
            description: optional_text(self.description.as_deref()),
            category: self.category,
            subcategory: optional_text(self.subcategory.as_deref()),
            normal_side: Some(normal_side),
            initial_balance: self.initial_balance,
            display_order: self.display_order,
            statement_type: self.statement_type,
            comment: optional_text(self.comment.as_deref()),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountCommand {
    Update { patch: AccountPatch, at: DateTime<Utc> },
    Deactivate { at: DateTime<Utc> },
    Reactivate { at: DateTime<Utc> },
    /// Apply one ledger movement's signed delta.
    Post {
        entry_id: JournalEntryId,
        delta: Money,
        at: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountUpdated {
    /// Validated patch; text fields already normalised.
    pub patch: AccountPatch,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalancePosted {
    pub entry_id: JournalEntryId,
    pub delta: Money,
    pub balance: Money,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountEvent {
    Opened { at: DateTime<Utc> },
    Updated(AccountUpdated),
    Deactivated { at: DateTime<Utc> },
    Reactivated { at: DateTime<Utc> },
    BalancePosted(BalancePosted),
}

impl Event for AccountEvent {
    fn event_type(&self) -> &'static str {
        match self {
            AccountEvent::Opened { .. } => "accounting.account.opened",
            AccountEvent::Updated(_) => "accounting.account.updated",
            AccountEvent::Deactivated { .. } => "accounting.account.deactivated",
            AccountEvent::Reactivated { .. } => "accounting.account.reactivated",
            AccountEvent::BalancePosted(_) => "accounting.account.balance_posted",
        }
    }

    fn action(&self) -> ActionType {
        match self {
            AccountEvent::Opened { .. } => ActionType::Create,
            _ => ActionType::Update,
        }
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            AccountEvent::Opened { at }
            | AccountEvent::Deactivated { at }
            | AccountEvent::Reactivated { at } => *at,
            AccountEvent::Updated(e) => e.at,
            AccountEvent::BalancePosted(e) => e.at,
        }
    }
}

impl Account {
    /// Open a new account at version 1 with `balance = initial_balance`.
    pub fn open(
        id: AccountId,
        new: &NewAccount,
        created_by: ActorId,
        at: DateTime<Utc>,
    ) -> DomainResult<(Account, AccountEvent)> {
        let new = new.validated()?;
        let normal_side = new
            .normal_side
            .ok_or_else(|| DomainError::validation("normal side is required"))?;

        let account = Account {
            id,
            number: new.number,
            name: new.name,
            description: new.description,
            category: new.category,
            subcategory: new.subcategory,
            normal_side,
            initial_balance: new.initial_balance,
            balance: new.initial_balance,
            display_order: new.display_order.unwrap_or(0),
            statement_type: new
                .statement_type
                .unwrap_or_else(|| new.category.default_statement()),
            comment: new.comment,
            is_active: true,
            created_by,
            created_at: at,
            movement_count: 0,
            version: 1,
        };
        Ok((account, AccountEvent::Opened { at }))
    }

    pub fn is_retained_earnings(&self) -> bool {
        self.category == AccountCategory::Equity
            && self
                .subcategory
                .as_deref()
                .is_some_and(|s| s.eq_ignore_ascii_case(RETAINED_EARNINGS_SUBCATEGORY))
    }

    /// Contra-equity accounts (owner draws, dividends) that are not retained earnings.
    pub fn is_distribution(&self) -> bool {
        self.category == AccountCategory::Equity
            && self.normal_side == Side::Debit
            && !self.is_retained_earnings()
    }

    /// A balance expressed on its category's natural side (contra accounts go negative).
    pub fn natural_amount(&self, balance: Money) -> Money {
        if self.normal_side == self.category.natural_side() {
            balance
        } else {
            -balance
        }
    }

    fn handle_update(&self, patch: &AccountPatch, at: DateTime<Utc>) -> DomainResult<Vec<AccountEvent>> {
        if patch.is_empty() {
            return Err(DomainError::validation("account update has no fields"));
        }
        if let Some(side) = patch.normal_side {
            if side != self.normal_side && self.movement_count > 0 {
                return Err(DomainError::conflict(format!(
                    "normal side of account {} cannot change after postings",
                    self.number
                )));
            }
        }

        let clean = AccountPatch {
            number: patch.number.as_deref().map(validate_number).transpose()?,
            name: patch.name.as_deref().map(validate_name).transpose()?,
            description: patch.description.as_deref().map(str::trim).map(str::to_string),
            category: patch.category,
            subcategory: patch.subcategory.as_deref().map(str::trim).map(str::to_string),
            normal_side: patch.normal_side,
            display_order: patch.display_order,
            statement_type: patch.statement_type,
            comment: patch.comment.as_deref().map(str::trim).map(str::to_string),
        };

        Ok(vec![AccountEvent::Updated(AccountUpdated { patch: clean, at })])
    }
}

impl AggregateRoot for Account {
    type Id = AccountId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

impl Aggregate for Account {
    type Command = AccountCommand;
    type Event = AccountEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            AccountEvent::Opened { .. } => {}
            AccountEvent::Updated(e) => {
                let p = &e.patch;
                if let Some(v) = &p.number {
                    self.number = v.clone();
                }
                if let Some(v) = &p.name {
                    self.name = v.clone();
                }
                if let Some(v) = &p.description {
                    self.description = optional_text(Some(v.as_str()));
                }
                if let Some(v) = p.category {
                    self.category = v;
                }
                if let Some(v) = &p.subcategory {
                    self.subcategory = optional_text(Some(v.as_str()));
                }
                if let Some(v) = p.normal_side {
                    self.normal_side = v;
                }
                if let Some(v) = p.display_order {
                    self.display_order = v;
                }
                if let Some(v) = p.statement_type {
                    self.statement_type = v;
                }
                if let Some(v) = &p.comment {
                    self.comment = optional_text(Some(v.as_str()));
                }
            }
            AccountEvent::Deactivated { .. } => self.is_active = false,
            AccountEvent::Reactivated { .. } => self.is_active = true,
            AccountEvent::BalancePosted(e) => {
                self.balance = e.balance;
                self.movement_count += 1;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            AccountCommand::Update { patch, at } => self.handle_update(patch, *at),
            AccountCommand::Deactivate { at } => {
                if !self.is_active {
                    return Err(DomainError::invalid_state(format!(
                        "account {} is already inactive",
                        self.number
                    )));
                }
                if !self.balance.is_zero() {
                    return Err(DomainError::conflict(format!(
                        "account {} has balance {} and cannot be deactivated",
                        self.number, self.balance
                    )));
                }
                Ok(vec![AccountEvent::Deactivated { at: *at }])
            }
            AccountCommand::Reactivate { at } => {
                if self.is_active {
                    return Err(DomainError::invalid_state(format!(
                        "account {} is already active",
                        self.number
                    )));
                }
                Ok(vec![AccountEvent::Reactivated { at: *at }])
            }
            AccountCommand::Post { entry_id, delta, at } => {
                if !self.is_active {
                    return Err(DomainError::conflict(format!(
                        "account {} is inactive; entry {entry_id} cannot be posted",
                        self.number
                    )));
                }
                let balance = self.balance.checked_add(*delta).map_err(|e| {
                    DomainError::validation(format!(
                        "posting entry {entry_id} to account {}: {e}",
                        self.number
                    ))
                })?;
                Ok(vec![AccountEvent::BalancePosted(BalancePosted {
                    entry_id: *entry_id,
                    delta: *delta,
                    balance,
                    at: *at,
                })])
            }
        }
    }
}
