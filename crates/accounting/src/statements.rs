//! Financial statements computed from a consistent snapshot of the books.
//!
//! Every statement re-checks the identity it is built on and returns
//! `DomainError::Consistency` instead of numbers that do not reconcile.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use finken_core::{AccountId, DateRange, DomainError, DomainResult, Money};

use crate::account::{Account, AccountCategory, Side};
use crate::posting::{LedgerMovement, balance_as_of, fold_balance};

/// Accounts plus their movements, in posting order, taken at one point in time.
#[derive(Debug, Clone, Default)]
pub struct Books {
    accounts: Vec<Account>,
    movements: HashMap<AccountId, Vec<LedgerMovement>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrialBalanceRow {
    pub account_id: AccountId,
    pub number: String,
    pub name: String,
    pub category: AccountCategory,
    pub debit: Money,
    pub credit: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrialBalance {
    pub as_of: NaiveDate,
    pub rows: Vec<TrialBalanceRow>,
    pub total_debit: Money,
    pub total_credit: Money,
}

/// One account's figure on a statement, on its category's natural side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementLine {
    pub account_id: AccountId,
    pub number: String,
    pub name: String,
    pub subcategory: Option<String>,
    pub amount: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomeStatement {
    pub period: DateRange,
    pub revenues: Vec<StatementLine>,
    pub expenses: Vec<StatementLine>,
    pub total_revenue: Money,
    pub total_expense: Money,
    pub net_income: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceSheet {
    pub as_of: NaiveDate,
    pub assets: Vec<StatementLine>,
    pub liabilities: Vec<StatementLine>,
    pub equity: Vec<StatementLine>,
    pub total_assets: Money,
    pub total_liabilities: Money,
    /// Revenue minus expense balances not yet closed into equity.
    pub unclosed_earnings: Money,
    /// Equity accounts plus unclosed earnings.
    pub total_equity: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetainedEarningsStatement {
    pub period: DateRange,
    pub beginning: Money,
    pub net_income: Money,
    pub distributions: Money,
    /// Activity posted straight to retained-earnings accounts (closing entries).
    pub adjustments: Money,
    pub ending: Money,
}

/// Which movements count toward a balance.
#[derive(Debug, Clone, Copy)]
enum Cutoff {
    /// Only the opening (initial) balance.
    Opening,
    /// Movements dated on or before the day.
    Through(NaiveDate),
    /// Every movement.
    All,
}

impl Books {
    pub fn new(
        accounts: impl IntoIterator<Item = Account>,
        movements: impl IntoIterator<Item = LedgerMovement>,
    ) -> Self {
        let mut accounts: Vec<Account> = accounts.into_iter().collect();
        accounts.sort_by(|a, b| {
            a.display_order
                .cmp(&b.display_order)
                .then_with(|| a.number.cmp(&b.number))
        });

        let mut by_account: HashMap<AccountId, Vec<LedgerMovement>> = HashMap::new();
        for m in movements {
            by_account.entry(m.account_id).or_default().push(m);
        }
        for list in by_account.values_mut() {
            list.sort_by(|a, b| a.posted_at.cmp(&b.posted_at).then(a.id.cmp(&b.id)));
        }

        Self {
            accounts,
            movements: by_account,
        }
    }

    pub fn accounts(&self) -> &[Account] {
        &self.accounts
    }

    pub fn movements_of(&self, account_id: AccountId) -> &[LedgerMovement] {
        self.movements
            .get(&account_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    fn balance(&self, account: &Account, cutoff: Cutoff) -> Money {
        match cutoff {
            Cutoff::Opening => account.initial_balance,
            Cutoff::Through(day) => balance_as_of(account, self.movements_of(account.id), day),
            Cutoff::All => fold_balance(
                account.initial_balance,
                account.normal_side,
                self.movements_of(account.id),
            ),
        }
    }

    /// Net change (normal-side signed) of an account within a window.
    pub fn activity(&self, account: &Account, period: &DateRange) -> Money {
        self.movements_of(account.id)
            .iter()
            .filter(|m| period.contains(m.date))
            .map(|m| m.signed_delta(account.normal_side))
            .sum()
    }

    fn in_category(&self, category: AccountCategory) -> impl Iterator<Item = &Account> {
        self.accounts.iter().filter(move |a| a.category == category)
    }

    fn line(account: &Account, amount: Money) -> StatementLine {
        StatementLine {
            account_id: account.id,
            number: account.number.clone(),
            name: account.name.clone(),
            subcategory: account.subcategory.clone(),
            amount,
        }
    }

    /// Every active account, plus inactive ones that still carried a balance on the day.
    pub fn trial_balance(&self, as_of: NaiveDate) -> DomainResult<TrialBalance> {
        let mut rows = Vec::new();
        let mut total_debit = Money::ZERO;
        let mut total_credit = Money::ZERO;

        for account in &self.accounts {
            let balance = self.balance(account, Cutoff::Through(as_of));
            if !account.is_active && balance.is_zero() {
                continue;
            }
            let column = if balance.is_negative() {
                account.normal_side.opposite()
            } else {
                account.normal_side
            };
            let (debit, credit) = match column {
                Side::Debit => (balance.abs(), Money::ZERO),
                Side::Credit => (Money::ZERO, balance.abs()),
            };
            total_debit = total_debit.checked_add(debit).map_err(|e| out_of_range("trial balance", e))?;
            total_credit = total_credit.checked_add(credit).map_err(|e| out_of_range("trial balance", e))?;
            rows.push(TrialBalanceRow {
                account_id: account.id,
                number: account.number.clone(),
                name: account.name.clone(),
                category: account.category,
                debit,
                credit,
            });
        }

        if total_debit != total_credit {
            return Err(DomainError::consistency(format!(
                "trial balance as of {as_of} does not balance: debits {total_debit}, credits {total_credit}"
            )));
        }

        Ok(TrialBalance {
            as_of,
            rows,
            total_debit,
            total_credit,
        })
    }

    pub fn income_statement(&self, period: DateRange) -> IncomeStatement {
        let collect = |category: AccountCategory| -> (Vec<StatementLine>, Money) {
            let lines: Vec<StatementLine> = self
                .in_category(category)
                .filter_map(|a| {
                    let amount = a.natural_amount(self.activity(a, &period));
                    (a.is_active || !amount.is_zero()).then(|| Self::line(a, amount))
                })
                .collect();
            let total = lines.iter().map(|l| l.amount).sum();
            (lines, total)
        };

        let (revenues, total_revenue) = collect(AccountCategory::Revenue);
        let (expenses, total_expense) = collect(AccountCategory::Expense);

        IncomeStatement {
            period,
            revenues,
            expenses,
            total_revenue,
            total_expense,
            net_income: total_revenue - total_expense,
        }
    }

    fn unclosed_earnings(&self, cutoff: Cutoff) -> Money {
        let natural_total = |category| -> Money {
            self.in_category(category)
                .map(|a| a.natural_amount(self.balance(a, cutoff)))
                .sum()
        };
        natural_total(AccountCategory::Revenue) - natural_total(AccountCategory::Expense)
    }

    pub fn balance_sheet(&self, as_of: NaiveDate) -> DomainResult<BalanceSheet> {
        let cutoff = Cutoff::Through(as_of);
        let section = |category: AccountCategory| -> DomainResult<(Vec<StatementLine>, Money)> {
            let lines: Vec<StatementLine> = self
                .in_category(category)
                .filter_map(|a| {
                    let amount = a.natural_amount(self.balance(a, cutoff));
                    (a.is_active || !amount.is_zero()).then(|| Self::line(a, amount))
                })
                .collect();
            let total = lines
                .iter()
                .try_fold(Money::ZERO, |acc, l| acc.checked_add(l.amount))
                .map_err(|e| out_of_range("balance sheet", e))?;
            Ok((lines, total))
        };

        let (assets, total_assets) = section(AccountCategory::Asset)?;
        let (liabilities, total_liabilities) = section(AccountCategory::Liability)?;
        let (equity, equity_accounts) = section(AccountCategory::Equity)?;
        let unclosed_earnings = self.unclosed_earnings(cutoff);
        let total_equity = equity_accounts + unclosed_earnings;

        if total_assets != total_liabilities + total_equity {
            return Err(DomainError::consistency(format!(
                "balance sheet as of {as_of} does not balance: assets {total_assets}, \
                 liabilities {total_liabilities}, equity {total_equity}"
            )));
        }

        Ok(BalanceSheet {
            as_of,
            assets,
            liabilities,
            equity,
            total_assets,
            total_liabilities,
            unclosed_earnings,
            total_equity,
        })
    }

    fn retained_earnings_at(&self, cutoff: Cutoff) -> Money {
        let equity: Money = self
            .accounts
            .iter()
            .filter(|a| a.is_retained_earnings() || a.is_distribution())
            .map(|a| a.natural_amount(self.balance(a, cutoff)))
            .sum();
        equity + self.unclosed_earnings(cutoff)
    }

    pub fn retained_earnings(&self, period: DateRange) -> DomainResult<RetainedEarningsStatement> {
        let opening = match period.day_before_start() {
            Some(day) => Cutoff::Through(day),
            None => Cutoff::Opening,
        };
        let closing = match period.end {
            Some(day) => Cutoff::Through(day),
            None => Cutoff::All,
        };

        let beginning = self.retained_earnings_at(opening);
        let net_income = self.income_statement(period).net_income;
        let distributions: Money = self
            .accounts
            .iter()
            .filter(|a| a.is_distribution())
            .map(|a| self.activity(a, &period))
            .sum();
        let adjustments: Money = self
            .accounts
            .iter()
            .filter(|a| a.is_retained_earnings())
            .map(|a| a.natural_amount(self.activity(a, &period)))
            .sum();
        let ending = beginning + net_income - distributions + adjustments;

        let expected = self.retained_earnings_at(closing);
        if ending != expected {
            return Err(DomainError::consistency(format!(
                "retained earnings roll-forward ends at {ending} but the ledger shows {expected}"
            )));
        }

        Ok(RetainedEarningsStatement {
            period,
            beginning,
            net_income,
            distributions,
            adjustments,
            ending,
        })
    }
}

fn out_of_range(statement: &str, err: DomainError) -> DomainError {
    DomainError::consistency(format!("{statement} totals cannot be represented: {err}"))
}
