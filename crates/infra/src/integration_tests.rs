//! Integration tests for the full bookkeeping pipeline.
//!
//! Tests: Chart → Journal lifecycle → Posting → Statements → Audit trail
//!
//! Verifies:
//! - Approved entries move balances exactly once, atomically with their trail
//! - Failed operations leave no partial state behind
//! - Concurrent approvals serialize on the accounts they touch

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Barrier};

    use finken_accounting::{AccountCategory, EntryStatus, Side};
    use finken_auth::PermissionPolicy;
    use finken_core::{DateRange, Money};
    use finken_events::{ActionType, AuditEntity, EventLogFilter, Pagination};

    use crate::chart_of_accounts::ChartOfAccounts;
    use crate::config::LedgerConfig;
    use crate::error::LedgerError;
    use crate::journal_lifecycle::{JournalFilter, JournalService};
    use crate::ledger_store::{LedgerStore, StoreError};
    use crate::test_support::{FaultyStore, day, entry, fixture, line, money};

    fn movement_count(store: &impl LedgerStore) -> usize {
        store.snapshot().unwrap().movements.len()
    }

    #[test]
    fn scenario_a_approval_posts_both_sides() {
        let fx = fixture();
        let cash = fx.open("1000", "Cash", AccountCategory::Asset, "0.00");
        let revenue = fx.open("4000", "Revenue", AccountCategory::Revenue, "0.00");

        let created = fx
            .journal
            .create_entry(fx.preparer, entry(day(2024, 1, 10), "cash sale", vec![
                line(&cash, Side::Debit, "500.00"),
                line(&revenue, Side::Credit, "500.00"),
            ]))
            .unwrap();
        assert_eq!(created.status, EntryStatus::Pending);
        assert_eq!(fx.balance(&cash), Money::ZERO);

        let approved = fx.journal.approve_entry(&fx.manager, created.id).unwrap();
        assert_eq!(approved.status, EntryStatus::Approved);
        assert_eq!(approved.approved_by, Some(fx.manager.actor));
        assert!(approved.approved_at.is_some());

        assert_eq!(fx.balance(&cash), money("500.00"));
        assert_eq!(fx.balance(&revenue), money("500.00"));
        assert_eq!(movement_count(&fx.store), 2);
        fx.posting.verify_account(cash.id).unwrap();
        fx.posting.verify_account(revenue.id).unwrap();

        assert_eq!(fx.chart.get_balance(cash.id, Some(day(2024, 1, 9))).unwrap(), Money::ZERO);
        assert_eq!(
            fx.chart.get_balance(cash.id, Some(day(2024, 1, 10))).unwrap(),
            money("500.00")
        );
    }

    #[test]
    fn scenario_b_unbalanced_entry_is_rejected_before_persistence() {
        let fx = fixture();
        let cash = fx.open("1000", "Cash", AccountCategory::Asset, "0.00");
        let revenue = fx.open("4000", "Revenue", AccountCategory::Revenue, "0.00");
        let trail_before = fx
            .audit
            .query_events(&EventLogFilter::default(), Pagination::default())
            .unwrap()
            .total;

        let err = fx
            .journal
            .create_entry(fx.preparer, entry(day(2024, 1, 10), "typo", vec![
                line(&cash, Side::Debit, "300.00"),
                line(&revenue, Side::Credit, "299.99"),
            ]))
            .unwrap_err();

        assert!(matches!(err, LedgerError::Validation(_)));
        assert!(fx.store.entries().unwrap().is_empty());
        assert_eq!(fx.balance(&cash), Money::ZERO);
        let trail_after = fx
            .audit
            .query_events(&EventLogFilter::default(), Pagination::default())
            .unwrap()
            .total;
        assert_eq!(trail_before, trail_after);
    }

    #[test]
    fn scenario_c_approved_entry_cannot_be_rejected() {
        let fx = fixture();
        let cash = fx.open("1000", "Cash", AccountCategory::Asset, "0.00");
        let revenue = fx.open("4000", "Revenue", AccountCategory::Revenue, "0.00");
        let e = fx
            .journal
            .create_entry(fx.preparer, entry(day(2024, 1, 10), "sale", vec![
                line(&cash, Side::Debit, "80.00"),
                line(&revenue, Side::Credit, "80.00"),
            ]))
            .unwrap();
        fx.journal.approve_entry(&fx.manager, e.id).unwrap();

        let err = fx
            .journal
            .reject_entry(&fx.manager, e.id, "changed my mind")
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidState(_)));
        assert_eq!(fx.balance(&cash), money("80.00"));
        assert_eq!(fx.journal.get_entry(e.id).unwrap().status, EntryStatus::Approved);
    }

    #[test]
    fn scenario_d_deactivation_depends_on_balance() {
        let fx = fixture();
        let idle = fx.open("1500", "Idle", AccountCategory::Asset, "0.00");
        let funded = fx.open("1600", "Funded", AccountCategory::Asset, "150.00");

        assert!(!fx.chart.deactivate_account(fx.preparer, idle.id).unwrap().is_active);
        assert!(matches!(
            fx.chart.deactivate_account(fx.preparer, funded.id),
            Err(LedgerError::Conflict(_))
        ));
        assert!(fx.chart.get_account(funded.id).unwrap().is_active);
    }

    #[test]
    fn scenario_e_concurrent_approvals_on_one_account() {
        let fx = fixture();
        let cash = fx.open("1000", "Cash", AccountCategory::Asset, "0.00");
        let revenue = fx.open("4000", "Revenue", AccountCategory::Revenue, "0.00");

        let amounts = ["100.00", "50.00", "25.00", "12.50", "6.25", "3.10", "1.01", "0.14"];
        let ids: Vec<_> = amounts
            .iter()
            .map(|amount| {
                fx.journal
                    .create_entry(fx.preparer, entry(day(2024, 2, 1), "sale", vec![
                        line(&cash, Side::Debit, amount),
                        line(&revenue, Side::Credit, amount),
                    ]))
                    .unwrap()
                    .id
            })
            .collect();

        let barrier = Barrier::new(ids.len());
        std::thread::scope(|scope| {
            for id in &ids {
                let fx = &fx;
                let barrier = &barrier;
                scope.spawn(move || {
                    barrier.wait();
                    fx.journal.approve_entry(&fx.manager, *id).unwrap();
                });
            }
        });

        let expected: Money = amounts.iter().map(|a| money(a)).sum();
        assert_eq!(fx.balance(&cash), expected);
        assert_eq!(fx.balance(&revenue), expected);
        assert_eq!(movement_count(&fx.store), amounts.len() * 2);
        fx.posting.verify_account(cash.id).unwrap();
        fx.posting.verify_account(revenue.id).unwrap();
    }

    #[test]
    fn racing_reviewers_on_one_entry_have_a_single_winner() {
        let fx = fixture();
        let cash = fx.open("1000", "Cash", AccountCategory::Asset, "0.00");
        let revenue = fx.open("4000", "Revenue", AccountCategory::Revenue, "0.00");
        let e = fx
            .journal
            .create_entry(fx.preparer, entry(day(2024, 2, 1), "sale", vec![
                line(&cash, Side::Debit, "10.00"),
                line(&revenue, Side::Credit, "10.00"),
            ]))
            .unwrap();

        let barrier = Barrier::new(2);
        let (approved, rejected) = std::thread::scope(|scope| {
            let approve = scope.spawn(|| {
                barrier.wait();
                fx.journal.approve_entry(&fx.manager, e.id)
            });
            let reject = scope.spawn(|| {
                barrier.wait();
                fx.journal.reject_entry(&fx.manager, e.id, "duplicate")
            });
            (approve.join().unwrap(), reject.join().unwrap())
        });

        assert!(approved.is_ok() != rejected.is_ok());
        let loser = approved.as_ref().err().or(rejected.as_ref().err());
        assert!(matches!(loser, Some(LedgerError::InvalidState(_))));

        let stored = fx.journal.get_entry(e.id).unwrap();
        let expected_movements = if stored.status == EntryStatus::Approved { 2 } else { 0 };
        assert_eq!(movement_count(&fx.store), expected_movements);
    }

    #[test]
    fn approving_twice_adds_no_movements() {
        let fx = fixture();
        let cash = fx.open("1000", "Cash", AccountCategory::Asset, "0.00");
        let revenue = fx.open("4000", "Revenue", AccountCategory::Revenue, "0.00");
        let e = fx
            .journal
            .create_entry(fx.preparer, entry(day(2024, 1, 10), "sale", vec![
                line(&cash, Side::Debit, "500.00"),
                line(&revenue, Side::Credit, "500.00"),
            ]))
            .unwrap();
        fx.journal.approve_entry(&fx.manager, e.id).unwrap();

        assert!(matches!(
            fx.journal.approve_entry(&fx.manager, e.id),
            Err(LedgerError::InvalidState(_))
        ));
        assert_eq!(movement_count(&fx.store), 2);
        assert_eq!(fx.balance(&cash), money("500.00"));
    }

    #[test]
    fn account_deactivated_after_creation_blocks_approval() {
        let fx = fixture();
        let cash = fx.open("1000", "Cash", AccountCategory::Asset, "0.00");
        let revenue = fx.open("4000", "Revenue", AccountCategory::Revenue, "0.00");
        let e = fx
            .journal
            .create_entry(fx.preparer, entry(day(2024, 1, 10), "sale", vec![
                line(&cash, Side::Debit, "40.00"),
                line(&revenue, Side::Credit, "40.00"),
            ]))
            .unwrap();
        fx.chart.deactivate_account(fx.preparer, revenue.id).unwrap();

        let err = fx.journal.approve_entry(&fx.manager, e.id).unwrap_err();
        assert!(matches!(err, LedgerError::Conflict(_)));
        assert_eq!(fx.journal.get_entry(e.id).unwrap().status, EntryStatus::Pending);
        assert_eq!(fx.balance(&cash), Money::ZERO);
        assert_eq!(movement_count(&fx.store), 0);
    }

    #[test]
    fn approval_requires_the_capability() {
        let fx = fixture();
        let cash = fx.open("1000", "Cash", AccountCategory::Asset, "0.00");
        let revenue = fx.open("4000", "Revenue", AccountCategory::Revenue, "0.00");
        let e = fx
            .journal
            .create_entry(fx.preparer, entry(day(2024, 1, 10), "sale", vec![
                line(&cash, Side::Debit, "40.00"),
                line(&revenue, Side::Credit, "40.00"),
            ]))
            .unwrap();

        assert!(matches!(
            fx.journal.approve_entry(&fx.accountant, e.id),
            Err(LedgerError::Authorization(_))
        ));
        assert!(matches!(
            fx.journal.reject_entry(&fx.accountant, e.id, "no"),
            Err(LedgerError::Authorization(_))
        ));
        assert_eq!(fx.journal.get_entry(e.id).unwrap().status, EntryStatus::Pending);

        let lenient = JournalService::new(
            fx.store.clone(),
            |_: &finken_auth::Principal| true,
            LedgerConfig::default(),
        );
        assert!(lenient.approve_entry(&fx.accountant, e.id).is_ok());
    }

    #[test]
    fn rejection_needs_a_reason_and_leaves_balances_alone() {
        let fx = fixture();
        let cash = fx.open("1000", "Cash", AccountCategory::Asset, "0.00");
        let revenue = fx.open("4000", "Revenue", AccountCategory::Revenue, "0.00");
        let e = fx
            .journal
            .create_entry(fx.preparer, entry(day(2024, 1, 10), "sale", vec![
                line(&cash, Side::Debit, "40.00"),
                line(&revenue, Side::Credit, "40.00"),
            ]))
            .unwrap();

        assert!(matches!(
            fx.journal.reject_entry(&fx.manager, e.id, "   "),
            Err(LedgerError::Validation(_))
        ));
        let rejected = fx.journal.reject_entry(&fx.manager, e.id, "wrong customer").unwrap();
        assert_eq!(rejected.status, EntryStatus::Rejected);
        assert_eq!(rejected.rejection_reason.as_deref(), Some("wrong customer"));
        assert_eq!(fx.balance(&cash), Money::ZERO);

        let rejections = fx
            .audit
            .journal_events(
                EventLogFilter {
                    action: Some(ActionType::Reject),
                    ..Default::default()
                },
                Pagination::default(),
            )
            .unwrap();
        assert_eq!(rejections.total, 1);
        assert_eq!(rejections.records[0].record_id, e.id.to_string());
    }

    #[test]
    fn reversal_mirrors_the_original_once() {
        let fx = fixture();
        let cash = fx.open("1000", "Cash", AccountCategory::Asset, "0.00");
        let revenue = fx.open("4000", "Revenue", AccountCategory::Revenue, "0.00");
        let original = fx
            .journal
            .create_entry(fx.preparer, entry(day(2024, 1, 10), "sale", vec![
                line(&cash, Side::Debit, "500.00"),
                line(&revenue, Side::Credit, "500.00"),
            ]))
            .unwrap();

        assert!(matches!(
            fx.journal.reverse_entry(fx.preparer, original.id, day(2024, 1, 20), None),
            Err(LedgerError::InvalidState(_))
        ));
        fx.journal.approve_entry(&fx.manager, original.id).unwrap();

        let reversal = fx
            .journal
            .reverse_entry(fx.preparer, original.id, day(2024, 1, 20), None)
            .unwrap();
        assert_eq!(reversal.reverses, Some(original.id));
        assert_eq!(reversal.status, EntryStatus::Pending);
        assert_eq!(reversal.lines[0].side, Side::Credit);
        assert_eq!(
            reversal.description.as_deref(),
            Some(format!("Reversal of entry {}", original.id).as_str())
        );

        assert!(matches!(
            fx.journal.reverse_entry(fx.preparer, original.id, day(2024, 1, 21), None),
            Err(LedgerError::InvalidState(_))
        ));

        fx.journal.approve_entry(&fx.manager, reversal.id).unwrap();
        assert_eq!(fx.balance(&cash), Money::ZERO);
        assert_eq!(fx.balance(&revenue), Money::ZERO);
        let untouched = fx.journal.get_entry(original.id).unwrap();
        assert_eq!(untouched.status, EntryStatus::Approved);
        assert_eq!(untouched.lines, original.lines);

        assert_eq!(
            fx.chart.get_balance(cash.id, Some(day(2024, 1, 15))).unwrap(),
            money("500.00")
        );
        fx.posting.verify_account(cash.id).unwrap();
    }

    #[test]
    fn rejected_reversal_frees_the_original() {
        let fx = fixture();
        let cash = fx.open("1000", "Cash", AccountCategory::Asset, "0.00");
        let revenue = fx.open("4000", "Revenue", AccountCategory::Revenue, "0.00");
        let original = fx
            .journal
            .create_entry(fx.preparer, entry(day(2024, 1, 10), "sale", vec![
                line(&cash, Side::Debit, "5.00"),
                line(&revenue, Side::Credit, "5.00"),
            ]))
            .unwrap();
        fx.journal.approve_entry(&fx.manager, original.id).unwrap();

        let first = fx
            .journal
            .reverse_entry(fx.preparer, original.id, day(2024, 1, 11), Some("oops".into()))
            .unwrap();
        fx.journal.reject_entry(&fx.manager, first.id, "wrong date").unwrap();

        let second = fx
            .journal
            .reverse_entry(fx.preparer, original.id, day(2024, 1, 12), None)
            .unwrap();
        assert_eq!(second.reverses, Some(original.id));
    }

    #[test]
    fn external_reversal_links_are_refused() {
        let fx = fixture();
        let cash = fx.open("1000", "Cash", AccountCategory::Asset, "0.00");
        let revenue = fx.open("4000", "Revenue", AccountCategory::Revenue, "0.00");
        let mut forged = entry(day(2024, 1, 10), "sale", vec![
            line(&cash, Side::Debit, "5.00"),
            line(&revenue, Side::Credit, "5.00"),
        ]);
        forged.reverses = Some(finken_core::JournalEntryId::new(1));
        assert!(matches!(
            fx.journal.create_entry(fx.preparer, forged),
            Err(LedgerError::Validation(_))
        ));
    }

    #[test]
    fn list_filters_and_orders_entries() {
        let fx = fixture();
        let cash = fx.open("1000", "Cash", AccountCategory::Asset, "0.00");
        let revenue = fx.open("4000", "Revenue", AccountCategory::Revenue, "0.00");
        let mk = |d| {
            fx.journal
                .create_entry(fx.preparer, entry(d, "sale", vec![
                    line(&cash, Side::Debit, "1.00"),
                    line(&revenue, Side::Credit, "1.00"),
                ]))
                .unwrap()
        };
        let jan = mk(day(2024, 1, 5));
        let feb = mk(day(2024, 2, 5));
        let mar = mk(day(2024, 3, 5));
        fx.journal.approve_entry(&fx.manager, feb.id).unwrap();

        let all = fx.journal.list_entries(&JournalFilter::default()).unwrap();
        let ids: Vec<_> = all.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![mar.id, feb.id, jan.id]);

        let pending = fx
            .journal
            .list_entries(&JournalFilter {
                status: Some(EntryStatus::Pending),
                end_date: Some(day(2024, 2, 28)),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, jan.id);
    }

    #[test]
    fn storage_failure_aborts_the_approval() {
        let store = Arc::new(FaultyStore::new());
        let config = LedgerConfig::default();
        let chart = ChartOfAccounts::new(store.clone(), config);
        let journal = JournalService::new(store.clone(), PermissionPolicy::default(), config);
        let fx = fixture();

        let mk = |number: &str, name: &str, category: AccountCategory| {
            chart
                .create_account(fx.preparer, finken_accounting::NewAccount {
                    number: number.into(),
                    name: name.into(),
                    description: None,
                    category,
                    subcategory: None,
                    normal_side: Some(category.natural_side()),
                    initial_balance: Money::ZERO,
                    display_order: None,
                    statement_type: None,
                    comment: None,
                })
                .unwrap()
        };
        let cash = mk("1000", "Cash", AccountCategory::Asset);
        let revenue = mk("4000", "Revenue", AccountCategory::Revenue);
        let e = journal
            .create_entry(fx.preparer, entry(day(2024, 1, 10), "sale", vec![
                line(&cash, Side::Debit, "500.00"),
                line(&revenue, Side::Credit, "500.00"),
            ]))
            .unwrap();
        let trail = |s: &FaultyStore| {
            s.event_logs(&EventLogFilter::default(), Pagination::default())
                .unwrap()
                .total
        };
        let trail_before = trail(store.as_ref());

        store.fail_next(1, StoreError::Unavailable("event log offline".into()));
        let err = journal.approve_entry(&fx.manager, e.id).unwrap_err();
        assert!(matches!(err, LedgerError::Storage(_)));

        assert_eq!(journal.get_entry(e.id).unwrap().status, EntryStatus::Pending);
        assert_eq!(chart.get_account(cash.id).unwrap().balance, Money::ZERO);
        assert_eq!(movement_count(&store), 0);
        assert_eq!(trail(store.as_ref()), trail_before);

        journal.approve_entry(&fx.manager, e.id).unwrap();
        assert_eq!(chart.get_account(cash.id).unwrap().balance, money("500.00"));
    }

    #[test]
    fn books_reconcile_after_a_month_of_activity() {
        let fx = fixture();
        let cash = fx.open("1000", "Cash", AccountCategory::Asset, "2000.00");
        let payables = fx.open("2000", "Payables", AccountCategory::Liability, "0.00");
        let capital = fx.open("3000", "Capital", AccountCategory::Equity, "2000.00");
        let revenue = fx.open("4000", "Revenue", AccountCategory::Revenue, "0.00");
        let supplies = fx.open("5000", "Supplies", AccountCategory::Expense, "0.00");

        let batch = vec![
            (day(2024, 3, 2), vec![
                line(&cash, Side::Debit, "750.00"),
                line(&revenue, Side::Credit, "750.00"),
            ]),
            (day(2024, 3, 9), vec![
                line(&supplies, Side::Debit, "120.35"),
                line(&payables, Side::Credit, "120.35"),
            ]),
            (day(2024, 3, 20), vec![
                line(&payables, Side::Debit, "100.00"),
                line(&cash, Side::Credit, "100.00"),
            ]),
        ];
        for (date, lines) in batch {
            let e = fx.journal.create_entry(fx.preparer, entry(date, "march", lines)).unwrap();
            fx.journal.approve_entry(&fx.manager, e.id).unwrap();
        }

        let tb = fx.statements.trial_balance(day(2024, 3, 31)).unwrap();
        assert_eq!(tb.total_debit, tb.total_credit);
        assert_eq!(tb.total_debit, money("2770.35"));

        let bs = fx.statements.balance_sheet(day(2024, 3, 31)).unwrap();
        assert_eq!(bs.total_assets, money("2650.00"));
        assert_eq!(bs.total_liabilities, money("20.35"));
        assert_eq!(bs.unclosed_earnings, money("629.65"));
        assert_eq!(bs.total_equity, money("2629.65"));

        let march = DateRange::new(Some(day(2024, 3, 1)), Some(day(2024, 3, 31))).unwrap();
        let is = fx.statements.income_statement(march).unwrap();
        assert_eq!(is.net_income, money("629.65"));

        let mid = fx.statements.balance_sheet(day(2024, 3, 10)).unwrap();
        assert_eq!(mid.total_assets, money("2750.00"));

        for account in [&cash, &payables, &capital, &revenue, &supplies] {
            fx.posting.verify_account(account.id).unwrap();
        }

        let movements = fx
            .audit
            .query_events(
                &EventLogFilter::for_entity(AuditEntity::LedgerMovement),
                Pagination::new(Some(4), None),
            )
            .unwrap();
        assert_eq!(movements.total, 6);
        assert!(movements.has_more);
    }
}
