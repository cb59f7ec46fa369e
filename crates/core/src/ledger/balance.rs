//! Read-only balance aggregation over stored splits.
//!
//! A participant's net on one expense is `amount_owed - amount_paid`;
//! positive means they owe. Deleted expenses never contribute.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use serde::Serialize;
use tally_shared::types::{ExpenseId, GroupId, Money, UserId};

use super::error::LedgerError;
use super::retry::{RetryPolicy, store_failure};
use super::store::LedgerStore;
use super::types::ExpenseSplit;

/// Net position of one user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserBalance {
    /// The user.
    pub user_id: UserId,
    /// Positive: owes. Negative: is owed.
    pub net: Money,
}

/// Sums owed minus paid over a set of splits.
#[must_use]
pub fn net_balance<'a>(splits: impl IntoIterator<Item = &'a ExpenseSplit>) -> Money {
    splits.into_iter().map(ExpenseSplit::net).sum()
}

/// Computes balances from the split store.
pub struct BalanceAggregator<S> {
    store: Arc<S>,
    policy: RetryPolicy,
}

impl<S: LedgerStore> BalanceAggregator<S> {
    /// Creates a new balance aggregator.
    #[must_use]
    pub fn new(store: Arc<S>, policy: RetryPolicy) -> Self {
        Self { store, policy }
    }

    /// Net balance of `user_id` across all live expenses.
    ///
    /// # Errors
    ///
    /// Returns `Store` / `Timeout` on infrastructure failure.
    pub async fn outstanding_balance(&self, user_id: UserId) -> Result<Money, LedgerError> {
        const OP: &str = "outstanding_balance";

        self.policy
            .with_timeout(OP, async {
                let splits = self.user_splits(OP, user_id).await?;
                Ok(net_balance(&splits))
            })
            .await
    }

    /// Net balance of `user_id` restricted to expenses `friend_id` also
    /// takes part in.
    ///
    /// # Errors
    ///
    /// Returns `Store` / `Timeout` on infrastructure failure.
    pub async fn friend_balance(
        &self,
        user_id: UserId,
        friend_id: UserId,
    ) -> Result<Money, LedgerError> {
        const OP: &str = "friend_balance";

        self.policy
            .with_timeout(OP, async {
                let user_splits = self.user_splits(OP, user_id).await?;
                let shared: HashSet<ExpenseId> = self
                    .user_splits(OP, friend_id)
                    .await?
                    .into_iter()
                    .map(|s| s.expense_id)
                    .collect();

                Ok(net_balance(
                    user_splits.iter().filter(|s| shared.contains(&s.expense_id)),
                ))
            })
            .await
    }

    /// Per-counterparty balances of `user_id`, ordered by counterparty ID.
    ///
    /// Each entry equals [`BalanceAggregator::friend_balance`] for that
    /// counterparty.
    ///
    /// # Errors
    ///
    /// Returns `Store` / `Timeout` on infrastructure failure.
    pub async fn friend_balances(&self, user_id: UserId) -> Result<Vec<UserBalance>, LedgerError> {
        const OP: &str = "friend_balances";

        self.policy
            .with_timeout(OP, async {
                let mut totals: BTreeMap<UserId, Money> = BTreeMap::new();

                for own in self.user_splits(OP, user_id).await? {
                    let splits = self
                        .policy
                        .retry(OP, || self.store.list_splits(own.expense_id))
                        .await
                        .map_err(|e| store_failure(OP, &e))?;

                    for other in splits.iter().filter(|s| s.user_id != user_id) {
                        *totals.entry(other.user_id).or_default() += own.net();
                    }
                }

                Ok(totals
                    .into_iter()
                    .map(|(user_id, net)| UserBalance { user_id, net })
                    .collect())
            })
            .await
    }

    /// Net balance of every participant in a group's live expenses,
    /// ordered by user ID.
    ///
    /// # Errors
    ///
    /// Returns `Store` / `Timeout` on infrastructure failure.
    pub async fn group_balances(&self, group_id: GroupId) -> Result<Vec<UserBalance>, LedgerError> {
        const OP: &str = "group_balances";

        self.policy
            .with_timeout(OP, async {
                let expenses = self
                    .policy
                    .retry(OP, || self.store.list_group_expenses(group_id))
                    .await
                    .map_err(|e| store_failure(OP, &e))?;

                let mut totals: BTreeMap<UserId, Money> = BTreeMap::new();
                for expense in &expenses {
                    let splits = self
                        .policy
                        .retry(OP, || self.store.list_splits(expense.id))
                        .await
                        .map_err(|e| store_failure(OP, &e))?;
                    for split in &splits {
                        *totals.entry(split.user_id).or_default() += split.net();
                    }
                }

                Ok(totals
                    .into_iter()
                    .map(|(user_id, net)| UserBalance { user_id, net })
                    .collect())
            })
            .await
    }

    async fn user_splits(
        &self,
        operation: &'static str,
        user_id: UserId,
    ) -> Result<Vec<ExpenseSplit>, LedgerError> {
        self.policy
            .retry(operation, || self.store.list_user_splits(user_id))
            .await
            .map_err(|e| store_failure(operation, &e))
    }
}
