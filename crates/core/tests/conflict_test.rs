//! Optimistic-lock conflicts on updates, deletes and settlements.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use chrono::Utc;
use rstest::rstest;
use rust_decimal_macros::dec;
use tally_core::ledger::{
    CreateExpenseInput, Expense, ExpenseLedger, ExpenseSplit, LedgerError, LedgerStore,
    MemoryGroupDirectory, MemoryLedgerStore, NoopNotifier, Payment, SettleUpInput,
    SettlementEngine, SettlementWrite, StoreError, UpdateExpenseInput,
};
use tally_core::split::SplitInput;
use tally_shared::types::{ExpenseId, GroupId, UserId};
use tokio::sync::Barrier;

mod common;
use common::{Fixture, fast_policy, money};

/// Wraps the in-memory store and reports a version conflict on the next
/// `conflicts` version-checked writes, as if another writer got there first.
/// With `delete_on_settle` set, the next settlement write finds its expense
/// soft-deleted just before it lands.
#[derive(Default)]
struct ContendedStore {
    inner: MemoryLedgerStore,
    conflicts: AtomicU32,
    delete_on_settle: AtomicBool,
}

impl ContendedStore {
    fn contend(&self, count: u32) {
        self.conflicts.store(count, Ordering::SeqCst);
    }

    fn conflict_gate(&self) -> Result<(), StoreError> {
        let remaining = self
            .conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if remaining.is_ok() {
            return Err(StoreError::VersionConflict);
        }
        Ok(())
    }
}

impl LedgerStore for ContendedStore {
    async fn insert_expense(
        &self,
        expense: &Expense,
        splits: &[ExpenseSplit],
    ) -> Result<(), StoreError> {
        self.inner.insert_expense(expense, splits).await
    }

    async fn update_expense(
        &self,
        expense: &Expense,
        splits: Option<&[ExpenseSplit]>,
        expected_version: i64,
    ) -> Result<(), StoreError> {
        self.conflict_gate()?;
        self.inner.update_expense(expense, splits, expected_version).await
    }

    async fn find_expense(&self, id: ExpenseId) -> Result<Option<Expense>, StoreError> {
        self.inner.find_expense(id).await
    }

    async fn list_group_expenses(&self, group_id: GroupId) -> Result<Vec<Expense>, StoreError> {
        self.inner.list_group_expenses(group_id).await
    }

    async fn list_splits(&self, expense_id: ExpenseId) -> Result<Vec<ExpenseSplit>, StoreError> {
        self.inner.list_splits(expense_id).await
    }

    async fn find_split(
        &self,
        expense_id: ExpenseId,
        user_id: UserId,
    ) -> Result<Option<ExpenseSplit>, StoreError> {
        self.inner.find_split(expense_id, user_id).await
    }

    async fn list_user_splits(&self, user_id: UserId) -> Result<Vec<ExpenseSplit>, StoreError> {
        self.inner.list_user_splits(user_id).await
    }

    async fn apply_settlement(&self, write: &SettlementWrite) -> Result<ExpenseSplit, StoreError> {
        self.conflict_gate()?;
        if self.delete_on_settle.swap(false, Ordering::SeqCst) {
            if let Some(mut expense) = self.inner.find_expense(write.expense_id).await? {
                let version = expense.version;
                expense.version += 1;
                expense.deleted_at = Some(Utc::now());
                self.inner.update_expense(&expense, None, version).await?;
            }
        }
        self.inner.apply_settlement(write).await
    }

    async fn list_payments(&self, expense_id: ExpenseId) -> Result<Vec<Payment>, StoreError> {
        self.inner.list_payments(expense_id).await
    }
}

struct Contended {
    store: Arc<ContendedStore>,
    ledger: ExpenseLedger<ContendedStore, MemoryGroupDirectory, NoopNotifier>,
    settlements: SettlementEngine<ContendedStore>,
    members: [UserId; 2],
    expense_id: ExpenseId,
}

async fn contended() -> Contended {
    let store = Arc::new(ContendedStore::default());
    let directory = Arc::new(MemoryGroupDirectory::new());
    let group_id = GroupId::new();
    let members = [UserId::new(), UserId::new()];
    directory.add_group(group_id, members);

    let ledger = ExpenseLedger::new(
        Arc::clone(&store),
        directory,
        Arc::new(NoopNotifier),
        fast_policy(),
    );
    let expense_id = ledger
        .create(CreateExpenseInput {
            expense_id: None,
            group_id,
            payer_id: members[0],
            amount: money(dec!(100)),
            description: Some("Dinner".to_string()),
            split: SplitInput::Equally,
        })
        .await
        .unwrap()
        .expense
        .id;

    Contended {
        settlements: SettlementEngine::new(Arc::clone(&store), fast_policy()),
        store,
        ledger,
        members,
        expense_id,
    }
}

fn rename(description: &str) -> UpdateExpenseInput {
    UpdateExpenseInput {
        description: Some(description.to_string()),
        ..UpdateExpenseInput::default()
    }
}

#[tokio::test]
async fn test_update_recovers_from_one_conflict() {
    let c = contended().await;
    c.store.contend(1);

    let updated = c.ledger.update(c.expense_id, rename("Lunch")).await.unwrap();
    assert_eq!(updated.expense.version, 2);
    assert_eq!(updated.expense.description.as_deref(), Some("Lunch"));
}

#[tokio::test]
async fn test_update_gives_up_after_second_conflict() {
    let c = contended().await;
    c.store.contend(2);

    let err = c.ledger.update(c.expense_id, rename("Lunch")).await.unwrap_err();
    assert_eq!(err, LedgerError::ConcurrentExpenseModification(c.expense_id));
    assert_eq!(err.error_code(), "CONCURRENT_EXPENSE_MODIFICATION");
    assert!(err.is_retryable());

    let stored = c.ledger.get(c.expense_id).await.unwrap();
    assert_eq!(stored.expense.version, 1);
    assert_eq!(stored.expense.description.as_deref(), Some("Dinner"));
}

#[tokio::test]
async fn test_delete_gives_up_after_second_conflict() {
    let c = contended().await;
    c.store.contend(2);

    let err = c.ledger.delete(c.expense_id).await.unwrap_err();
    assert_eq!(err, LedgerError::ConcurrentExpenseModification(c.expense_id));

    let stored = c.ledger.get(c.expense_id).await.unwrap();
    assert!(!stored.expense.is_deleted());
}

#[rstest]
#[case(1, true)]
#[case(2, false)]
#[tokio::test]
async fn test_settlement_retries_exactly_one_conflict(
    #[case] conflicts: u32,
    #[case] succeeds: bool,
) {
    let c = contended().await;
    c.store.contend(conflicts);

    let result = c
        .settlements
        .settle_up(&SettleUpInput {
            payer_id: c.members[1],
            payee_id: c.members[0],
            amount: money(dec!(20)),
            expense_id: c.expense_id,
        })
        .await;

    let owed = c
        .store
        .inner
        .find_split(c.expense_id, c.members[1])
        .await
        .unwrap()
        .unwrap()
        .amount_owed;
    let payments = c.store.inner.list_payments(c.expense_id).await.unwrap();

    if succeeds {
        assert_eq!(result.unwrap().new_payer_balance, money(dec!(30)));
        assert_eq!(owed, money(dec!(30)));
        assert_eq!(payments.len(), 1);
    } else {
        assert_eq!(
            result.unwrap_err(),
            LedgerError::ConcurrentSettlementConflict {
                expense_id: c.expense_id,
                user_id: c.members[1],
            }
        );
        assert_eq!(owed, money(dec!(50)));
        assert!(payments.is_empty());
    }
}

#[tokio::test]
async fn test_settlement_racing_a_delete_sees_the_delete() {
    let c = contended().await;
    c.store.delete_on_settle.store(true, Ordering::SeqCst);

    let err = c
        .settlements
        .settle_up(&SettleUpInput {
            payer_id: c.members[1],
            payee_id: c.members[0],
            amount: money(dec!(20)),
            expense_id: c.expense_id,
        })
        .await
        .unwrap_err();
    assert_eq!(err, LedgerError::ExpenseNotFound(c.expense_id));

    let split = c
        .store
        .inner
        .find_split(c.expense_id, c.members[1])
        .await
        .unwrap()
        .unwrap();
    assert_eq!(split.amount_owed, money(dec!(50)));
    assert_eq!(split.version, 1);
    assert!(c.store.inner.list_payments(c.expense_id).await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_updates_are_serialized() {
    let fixture = Arc::new(Fixture::with_members(2));
    let expense_id = fixture
        .ledger
        .create(CreateExpenseInput {
            expense_id: None,
            group_id: fixture.group_id,
            payer_id: fixture.member(0),
            amount: money(dec!(100)),
            description: None,
            split: SplitInput::Equally,
        })
        .await
        .unwrap()
        .expense
        .id;

    let barrier = Arc::new(Barrier::new(2));
    let handles: Vec<_> = [dec!(60), dec!(80)]
        .into_iter()
        .map(|amount| {
            let fixture = Arc::clone(&fixture);
            let barrier = Arc::clone(&barrier);
            tokio::spawn(async move {
                barrier.wait().await;
                fixture
                    .ledger
                    .update(
                        expense_id,
                        UpdateExpenseInput {
                            amount: Some(money(amount)),
                            ..UpdateExpenseInput::default()
                        },
                    )
                    .await
            })
        })
        .collect();

    let mut winners = Vec::new();
    for handle in handles {
        winners.push(handle.await.unwrap().unwrap());
    }

    // Each update applied on top of the other; neither overwrote a stale base.
    let stored = fixture.ledger.get(expense_id).await.unwrap();
    assert_eq!(stored.expense.version, 3);
    let last = winners
        .iter()
        .max_by_key(|w| w.expense.version)
        .unwrap();
    assert_eq!(stored.expense.amount, last.expense.amount);
    let owed: Vec<_> = stored.splits.iter().map(|s| s.amount_owed).collect();
    let half = money(last.expense.amount.amount() / dec!(2));
    assert_eq!(owed, vec![money(dec!(0)), half]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_update_racing_delete_is_serialized() {
    for _ in 0..20 {
        let fixture = Arc::new(Fixture::with_members(2));
        let expense_id = fixture
            .ledger
            .create(CreateExpenseInput {
                expense_id: None,
                group_id: fixture.group_id,
                payer_id: fixture.member(0),
                amount: money(dec!(100)),
                description: None,
                split: SplitInput::Equally,
            })
            .await
            .unwrap()
            .expense
            .id;

        let barrier = Arc::new(Barrier::new(2));
        let update = {
            let fixture = Arc::clone(&fixture);
            let barrier = Arc::clone(&barrier);
            tokio::spawn(async move {
                barrier.wait().await;
                fixture
                    .ledger
                    .update(
                        expense_id,
                        UpdateExpenseInput {
                            amount: Some(money(dec!(40))),
                            ..UpdateExpenseInput::default()
                        },
                    )
                    .await
            })
        };
        let delete = {
            let fixture = Arc::clone(&fixture);
            let barrier = Arc::clone(&barrier);
            tokio::spawn(async move {
                barrier.wait().await;
                fixture.ledger.delete(expense_id).await
            })
        };

        let updated = update.await.unwrap();
        let deleted = delete.await.unwrap();

        // The delete always lands. The update either happened before it or
        // observed the deletion; it never resurrects or overwrites it.
        assert!(deleted.is_ok());
        let stored = fixture.ledger.get(expense_id).await.unwrap();
        assert!(stored.expense.is_deleted());
        match updated {
            Ok(_) => {
                assert_eq!(stored.expense.version, 3);
                assert_eq!(stored.expense.amount, money(dec!(40)));
            }
            Err(err) => {
                assert_eq!(err, LedgerError::ExpenseNotFound(expense_id));
                assert_eq!(stored.expense.version, 2);
                assert_eq!(stored.expense.amount, money(dec!(100)));
            }
        }
        assert!(fixture.ledger.list_group(fixture.group_id).await.unwrap().is_empty());
    }
}
