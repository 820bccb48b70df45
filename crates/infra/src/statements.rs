//! Balance & statement calculator.
//!
//! Pure reads. Every report is computed from one `LedgerSnapshot`, so it never
//! sees half of a posting. A report that does not reconcile is an error, never
//! a page of numbers.

use chrono::NaiveDate;
use tracing::error;

use finken_accounting::{
    BalanceSheet, Books, IncomeStatement, LedgerMovement, RetainedEarningsStatement, TrialBalance,
};
use finken_core::{AccountId, DateRange, DomainResult};

use crate::error::{LedgerError, LedgerResult};
use crate::ledger_store::LedgerStore;

#[derive(Debug, Clone)]
pub struct StatementService<S> {
    store: S,
}

impl<S> StatementService<S>
where
    S: LedgerStore,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Movements of one account in posting order, with their stored running
    /// balances, optionally limited to a window of transaction dates.
    pub fn get_ledger(&self, account_id: AccountId, range: DateRange) -> LedgerResult<Vec<LedgerMovement>> {
        if self.store.account(account_id)?.is_none() {
            return Err(LedgerError::not_found(format!("account {account_id}")));
        }
        Ok(self
            .store
            .movements_for(account_id)?
            .into_iter()
            .filter(|m| range.contains(m.date))
            .collect())
    }

    pub fn trial_balance(&self, as_of: NaiveDate) -> LedgerResult<TrialBalance> {
        surface("trial_balance", self.books()?.trial_balance(as_of))
    }

    pub fn income_statement(&self, period: DateRange) -> LedgerResult<IncomeStatement> {
        Ok(self.books()?.income_statement(period))
    }

    pub fn balance_sheet(&self, as_of: NaiveDate) -> LedgerResult<BalanceSheet> {
        surface("balance_sheet", self.books()?.balance_sheet(as_of))
    }

    pub fn retained_earnings(&self, period: DateRange) -> LedgerResult<RetainedEarningsStatement> {
        surface("retained_earnings", self.books()?.retained_earnings(period))
    }

    fn books(&self) -> LedgerResult<Books> {
        Ok(self.store.snapshot()?.into_books())
    }
}

fn surface<T>(report: &'static str, result: DomainResult<T>) -> LedgerResult<T> {
    result.map_err(|e| {
        let err = LedgerError::from(e);
        if let LedgerError::Consistency(msg) = &err {
            error!(report, reason = %msg, "report does not reconcile");
        }
        err
    })
}

#[cfg(test)]
mod tests {
    use finken_accounting::{AccountCategory, Side};
    use finken_core::Money;

    use super::*;
    use crate::test_support::{day, entry, fixture, line, money};

    #[test]
    fn ledger_lists_movements_with_running_balances() {
        let fx = fixture();
        let cash = fx.open("1000", "Cash", AccountCategory::Asset, "0.00");
        let sales = fx.open("4000", "Sales", AccountCategory::Revenue, "0.00");
        let rent = fx.open("5000", "Rent", AccountCategory::Expense, "0.00");

        let sale = fx
            .journal
            .create_entry(fx.preparer, entry(day(2024, 1, 10), "sale", vec![
                line(&cash, Side::Debit, "500.00"),
                line(&sales, Side::Credit, "500.00"),
            ]))
            .unwrap();
        fx.journal.approve_entry(&fx.manager, sale.id).unwrap();
        let paid = fx
            .journal
            .create_entry(fx.preparer, entry(day(2024, 2, 1), "rent", vec![
                line(&rent, Side::Debit, "120.00"),
                line(&cash, Side::Credit, "120.00"),
            ]))
            .unwrap();
        fx.journal.approve_entry(&fx.manager, paid.id).unwrap();

        let all = fx.statements.get_ledger(cash.id, DateRange::all()).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].entry_id, sale.id);
        assert_eq!(all[0].balance, money("500.00"));
        assert_eq!(all[1].credit, money("120.00"));
        assert_eq!(all[1].balance, money("380.00"));

        let feb = DateRange::new(Some(day(2024, 2, 1)), None).unwrap();
        let window = fx.statements.get_ledger(cash.id, feb).unwrap();
        assert_eq!(window.len(), 1);
        assert_eq!(window[0].entry_id, paid.id);
    }

    #[test]
    fn ledger_of_unknown_account_is_not_found() {
        let fx = fixture();
        assert!(matches!(
            fx.statements.get_ledger(AccountId::new(9), DateRange::all()),
            Err(LedgerError::NotFound(_))
        ));
    }

    #[test]
    fn reports_reflect_posted_entries_only() {
        let fx = fixture();
        let cash = fx.open("1000", "Cash", AccountCategory::Asset, "1000.00");
        let capital = fx.open("3000", "Capital", AccountCategory::Equity, "1000.00");
        let sales = fx.open("4000", "Sales", AccountCategory::Revenue, "0.00");

        fx.journal
            .create_entry(fx.preparer, entry(day(2024, 3, 1), "pending sale", vec![
                line(&cash, Side::Debit, "75.00"),
                line(&sales, Side::Credit, "75.00"),
            ]))
            .unwrap();

        let tb = fx.statements.trial_balance(day(2024, 12, 31)).unwrap();
        assert_eq!(tb.total_debit, money("1000.00"));
        assert_eq!(tb.total_credit, money("1000.00"));

        let bs = fx.statements.balance_sheet(day(2024, 12, 31)).unwrap();
        assert_eq!(bs.total_assets, money("1000.00"));
        assert_eq!(bs.total_equity, money("1000.00"));
        assert_eq!(bs.unclosed_earnings, Money::ZERO);

        let year = DateRange::new(Some(day(2024, 1, 1)), Some(day(2024, 12, 31))).unwrap();
        let is = fx.statements.income_statement(year).unwrap();
        assert_eq!(is.net_income, Money::ZERO);
        assert_eq!(capital.balance, money("1000.00"));
    }

    #[test]
    fn chart_opened_out_of_balance_fails_loudly() {
        let fx = fixture();
        fx.open("1000", "Cash", AccountCategory::Asset, "10.00");
        assert!(matches!(
            fx.statements.trial_balance(day(2024, 1, 1)),
            Err(LedgerError::Consistency(_))
        ));
        assert!(matches!(
            fx.statements.balance_sheet(day(2024, 1, 1)),
            Err(LedgerError::Consistency(_))
        ));
    }

    #[test]
    fn retained_earnings_rolls_forward_income_and_draws() {
        let fx = fixture();
        let cash = fx.open("1000", "Cash", AccountCategory::Asset, "0.00");
        let retained = fx.open_with(
            "3100",
            "Retained earnings",
            AccountCategory::Equity,
            Side::Credit,
            Some("Retained Earnings"),
            "0.00",
        );
        let draws = fx.open_with(
            "3200",
            "Owner draws",
            AccountCategory::Equity,
            Side::Debit,
            None,
            "0.00",
        );
        let sales = fx.open("4000", "Sales", AccountCategory::Revenue, "0.00");

        for (date, lines) in [
            (day(2023, 12, 20), vec![
                line(&cash, Side::Debit, "200.00"),
                line(&sales, Side::Credit, "200.00"),
            ]),
            (day(2024, 1, 15), vec![
                line(&cash, Side::Debit, "300.00"),
                line(&sales, Side::Credit, "300.00"),
            ]),
            (day(2024, 1, 31), vec![
                line(&draws, Side::Debit, "50.00"),
                line(&cash, Side::Credit, "50.00"),
            ]),
        ] {
            let e = fx.journal.create_entry(fx.preparer, entry(date, "activity", lines)).unwrap();
            fx.journal.approve_entry(&fx.manager, e.id).unwrap();
        }

        let january = DateRange::new(Some(day(2024, 1, 1)), Some(day(2024, 1, 31))).unwrap();
        let re = fx.statements.retained_earnings(january).unwrap();
        assert_eq!(re.beginning, money("200.00"));
        assert_eq!(re.net_income, money("300.00"));
        assert_eq!(re.distributions, money("50.00"));
        assert_eq!(re.adjustments, Money::ZERO);
        assert_eq!(re.ending, money("450.00"));
        assert_eq!(retained.balance, Money::ZERO);
    }
}
