//! Shared fixtures for ledger integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use tally_core::ledger::{
    BalanceAggregator, ExpenseLedger, MemoryGroupDirectory, MemoryLedgerStore, NoopNotifier,
    RetryPolicy, SettlementEngine,
};
use tally_shared::types::{GroupId, Money, UserId};

pub fn money(amount: Decimal) -> Money {
    Money::new(amount)
}

pub fn fast_policy() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        base_backoff: Duration::from_millis(1),
        operation_timeout: Duration::from_secs(2),
    }
}

/// A group of `members` backed by in-memory stores.
pub struct Fixture {
    pub store: Arc<MemoryLedgerStore>,
    pub directory: Arc<MemoryGroupDirectory>,
    pub ledger: ExpenseLedger<MemoryLedgerStore, MemoryGroupDirectory, NoopNotifier>,
    pub settlements: SettlementEngine<MemoryLedgerStore>,
    pub balances: BalanceAggregator<MemoryLedgerStore>,
    pub group_id: GroupId,
    pub members: Vec<UserId>,
}

impl Fixture {
    pub fn with_members(count: usize) -> Self {
        let store = Arc::new(MemoryLedgerStore::new());
        let directory = Arc::new(MemoryGroupDirectory::new());
        let group_id = GroupId::new();
        let members: Vec<UserId> = (0..count).map(|_| UserId::new()).collect();
        directory.add_group(group_id, members.iter().copied());

        Self {
            ledger: ExpenseLedger::new(
                Arc::clone(&store),
                Arc::clone(&directory),
                Arc::new(NoopNotifier),
                fast_policy(),
            ),
            settlements: SettlementEngine::new(Arc::clone(&store), fast_policy()),
            balances: BalanceAggregator::new(Arc::clone(&store), fast_policy()),
            store,
            directory,
            group_id,
            members,
        }
    }

    pub fn member(&self, index: usize) -> UserId {
        self.members[index]
    }
}
