//! Expense ledger: creates, replaces and deletes an expense together with
//! its split set.
//!
//! Every operation runs in three steps:
//! 1. Compute the allocation with [`SplitCalculator`]
//! 2. Check it with [`AllocationValidator`]
//! 3. Persist expense and splits in one store transaction
//!
//! Validation and not-found errors surface unchanged. Transient store
//! failures are retried by the [`RetryPolicy`] and then reported as
//! [`LedgerError::Store`]. Updates and deletes are serialized per expense
//! through the expense version; one conflict is retried with fresh state.

use std::sync::Arc;

use chrono::Utc;
use tally_shared::types::{ExpenseId, GroupId, Money, UserId};
use tracing::{info, warn};

use super::error::LedgerError;
use super::notify::ExpenseNotifier;
use super::retry::{RetryPolicy, store_failure};
use super::store::{GroupDirectory, LedgerStore, StoreError};
use super::types::{
    CreateExpenseInput, Expense, ExpenseNotice, ExpenseSplit, ExpenseWithSplits,
    UpdateExpenseInput,
};
use crate::split::{
    AllocationValidator, SplitCalculator, SplitError, SplitInput, SplitStrategy,
};

/// Orchestrates split computation, validation and persistence of expenses.
pub struct ExpenseLedger<S, G, N> {
    store: Arc<S>,
    groups: Arc<G>,
    notifier: Arc<N>,
    policy: RetryPolicy,
}

impl<S, G, N> ExpenseLedger<S, G, N>
where
    S: LedgerStore,
    G: GroupDirectory + 'static,
    N: ExpenseNotifier,
{
    /// Creates a new expense ledger.
    #[must_use]
    pub fn new(store: Arc<S>, groups: Arc<G>, notifier: Arc<N>, policy: RetryPolicy) -> Self {
        Self {
            store,
            groups,
            notifier,
            policy,
        }
    }

    /// Creates an expense and its split set atomically.
    ///
    /// If `input.expense_id` names an expense that already exists, that
    /// expense is returned unchanged, which makes retried creates safe.
    ///
    /// # Errors
    ///
    /// - `NonPositiveAmount` and any allocation validation error
    /// - `GroupNotFound` if the group does not exist
    /// - `Store` / `Timeout` on infrastructure failure
    pub async fn create(&self, input: CreateExpenseInput) -> Result<ExpenseWithSplits, LedgerError> {
        self.policy
            .with_timeout("create_expense", self.create_inner(input))
            .await
    }

    async fn create_inner(
        &self,
        input: CreateExpenseInput,
    ) -> Result<ExpenseWithSplits, LedgerError> {
        const OP: &str = "create_expense";

        AllocationValidator::validate_total(input.amount)?;

        if let Some(id) = input.expense_id {
            if let Some(existing) = self.load_with_splits(OP, id).await? {
                info!(expense_id = %id, "Expense already exists, returning stored copy");
                return Ok(existing);
            }
        }

        let group_exists = self
            .policy
            .retry(OP, || self.groups.group_exists(input.group_id))
            .await
            .map_err(|e| store_failure(OP, &e))?;
        if !group_exists {
            return Err(LedgerError::GroupNotFound(input.group_id));
        }

        let now = Utc::now();
        let expense = Expense {
            id: input.expense_id.unwrap_or_default(),
            group_id: input.group_id,
            payer_id: input.payer_id,
            amount: input.amount,
            description: input.description.clone(),
            strategy: input.split.strategy(),
            version: 1,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        let splits = self
            .compute_splits(
                OP,
                expense.id,
                input.group_id,
                input.amount,
                input.payer_id,
                &input.split,
            )
            .await?;

        match self
            .policy
            .retry(OP, || self.store.insert_expense(&expense, &splits))
            .await
        {
            Ok(()) => {}
            Err(StoreError::AlreadyExists) => {
                // Lost a race against a create with the same ID.
                return self
                    .load_with_splits(OP, expense.id)
                    .await?
                    .ok_or_else(|| store_failure(OP, &StoreError::AlreadyExists));
            }
            Err(e) => return Err(store_failure(OP, &e)),
        }

        info!(
            expense_id = %expense.id,
            group_id = %expense.group_id,
            strategy = %expense.strategy,
            amount = %expense.amount,
            participants = splits.len(),
            "Expense created"
        );

        self.dispatch_notice(&expense, &splits);

        Ok(ExpenseWithSplits { expense, splits })
    }

    /// Updates an expense.
    ///
    /// A change of amount, payer, strategy or participants discards the
    /// stored split set and replaces it with a freshly computed and
    /// validated one in the same transaction. A description-only change
    /// keeps the split set.
    ///
    /// # Errors
    ///
    /// - `ExpenseNotFound` if the expense is missing or deleted
    /// - `SplitInputRequired` if the amount of a non-EQUALLY expense changes
    ///   without new participant input
    /// - any allocation validation error
    /// - `ConcurrentExpenseModification` if the expense keeps changing underneath
    pub async fn update(
        &self,
        expense_id: ExpenseId,
        input: UpdateExpenseInput,
    ) -> Result<ExpenseWithSplits, LedgerError> {
        self.policy
            .with_timeout("update_expense", async {
                match self.try_update(expense_id, &input).await {
                    Err(LedgerError::ConcurrentExpenseModification(_)) => {
                        warn!(expense_id = %expense_id, "Expense changed during update, retrying once");
                        self.try_update(expense_id, &input).await
                    }
                    other => other,
                }
            })
            .await
    }

    async fn try_update(
        &self,
        expense_id: ExpenseId,
        input: &UpdateExpenseInput,
    ) -> Result<ExpenseWithSplits, LedgerError> {
        const OP: &str = "update_expense";

        let current = self.load_live(OP, expense_id).await?;

        let amount = input.amount.unwrap_or(current.amount);
        AllocationValidator::validate_total(amount)?;
        let payer_id = input.payer_id.unwrap_or(current.payer_id);
        let strategy = input.strategy.unwrap_or(current.strategy);

        let new_splits = if input.requires_resplit(&current) {
            let split = match (&input.users, strategy) {
                (_, SplitStrategy::Equally) => SplitInput::Equally,
                (Some(users), strategy) => SplitInput::from_participants(strategy, users)?,
                (None, strategy) => return Err(SplitError::SplitInputRequired { strategy }.into()),
            };
            Some(
                self.compute_splits(OP, expense_id, current.group_id, amount, payer_id, &split)
                    .await?,
            )
        } else {
            None
        };

        let updated = Expense {
            amount,
            payer_id,
            strategy,
            description: input
                .description
                .clone()
                .or_else(|| current.description.clone()),
            version: current.version + 1,
            updated_at: Utc::now(),
            ..current.clone()
        };

        match self
            .policy
            .retry(OP, || {
                self.store
                    .update_expense(&updated, new_splits.as_deref(), current.version)
            })
            .await
        {
            Ok(()) => {}
            Err(StoreError::VersionConflict) => {
                return Err(LedgerError::ConcurrentExpenseModification(expense_id));
            }
            Err(e) => return Err(store_failure(OP, &e)),
        }

        let splits = match new_splits {
            Some(splits) => splits,
            None => self
                .policy
                .retry(OP, || self.store.list_splits(expense_id))
                .await
                .map_err(|e| store_failure(OP, &e))?,
        };

        info!(
            expense_id = %expense_id,
            version = updated.version,
            strategy = %updated.strategy,
            amount = %updated.amount,
            "Expense updated"
        );

        Ok(ExpenseWithSplits {
            expense: updated,
            splits,
        })
    }

    /// Soft-deletes an expense.
    ///
    /// Its splits stay readable through [`ExpenseLedger::get`] but no longer
    /// count towards balances, and the expense can no longer be updated or
    /// settled.
    ///
    /// # Errors
    ///
    /// - `ExpenseNotFound` if the expense is missing or already deleted
    /// - `ConcurrentExpenseModification` if the expense keeps changing underneath
    pub async fn delete(&self, expense_id: ExpenseId) -> Result<Expense, LedgerError> {
        self.policy
            .with_timeout("delete_expense", async {
                match self.try_delete(expense_id).await {
                    Err(LedgerError::ConcurrentExpenseModification(_)) => {
                        warn!(expense_id = %expense_id, "Expense changed during delete, retrying once");
                        self.try_delete(expense_id).await
                    }
                    other => other,
                }
            })
            .await
    }

    async fn try_delete(&self, expense_id: ExpenseId) -> Result<Expense, LedgerError> {
        const OP: &str = "delete_expense";

        let current = self.load_live(OP, expense_id).await?;
        let now = Utc::now();
        let deleted = Expense {
            version: current.version + 1,
            updated_at: now,
            deleted_at: Some(now),
            ..current.clone()
        };

        match self
            .policy
            .retry(OP, || self.store.update_expense(&deleted, None, current.version))
            .await
        {
            Ok(()) => {}
            Err(StoreError::VersionConflict) => {
                return Err(LedgerError::ConcurrentExpenseModification(expense_id));
            }
            Err(e) => return Err(store_failure(OP, &e)),
        }

        info!(expense_id = %expense_id, "Expense deleted");
        Ok(deleted)
    }

    /// Returns an expense and its splits, including soft-deleted history.
    ///
    /// # Errors
    ///
    /// Returns `ExpenseNotFound` if no such expense was ever created.
    pub async fn get(&self, expense_id: ExpenseId) -> Result<ExpenseWithSplits, LedgerError> {
        const OP: &str = "get_expense";

        self.policy
            .with_timeout(OP, async {
                self.load_with_splits(OP, expense_id)
                    .await?
                    .ok_or(LedgerError::ExpenseNotFound(expense_id))
            })
            .await
    }

    /// Lists a group's non-deleted expenses.
    ///
    /// # Errors
    ///
    /// Returns `GroupNotFound` if the group does not exist.
    pub async fn list_group(&self, group_id: GroupId) -> Result<Vec<Expense>, LedgerError> {
        const OP: &str = "list_group_expenses";

        self.policy
            .with_timeout(OP, async {
                let exists = self
                    .policy
                    .retry(OP, || self.groups.group_exists(group_id))
                    .await
                    .map_err(|e| store_failure(OP, &e))?;
                if !exists {
                    return Err(LedgerError::GroupNotFound(group_id));
                }

                self.policy
                    .retry(OP, || self.store.list_group_expenses(group_id))
                    .await
                    .map_err(|e| store_failure(OP, &e))
            })
            .await
    }

    /// Resolves participants, computes and validates a split set.
    async fn compute_splits(
        &self,
        operation: &'static str,
        expense_id: ExpenseId,
        group_id: GroupId,
        amount: Money,
        payer_id: UserId,
        split: &SplitInput,
    ) -> Result<Vec<ExpenseSplit>, LedgerError> {
        let members = match split {
            SplitInput::Equally => self
                .policy
                .retry(operation, || self.groups.list_members(group_id))
                .await
                .map_err(|e| store_failure(operation, &e))?,
            SplitInput::Unequal(_) | SplitInput::Percentage(_) | SplitInput::Shares(_) => vec![],
        };

        let allocations = SplitCalculator::calculate(amount, payer_id, split, &members)?;
        AllocationValidator::validate(&allocations, amount)?;

        Ok(allocations
            .into_iter()
            .map(|a| ExpenseSplit::from_allocation(expense_id, a))
            .collect())
    }

    async fn load_with_splits(
        &self,
        operation: &'static str,
        expense_id: ExpenseId,
    ) -> Result<Option<ExpenseWithSplits>, LedgerError> {
        let Some(expense) = self
            .policy
            .retry(operation, || self.store.find_expense(expense_id))
            .await
            .map_err(|e| store_failure(operation, &e))?
        else {
            return Ok(None);
        };

        let splits = self
            .policy
            .retry(operation, || self.store.list_splits(expense_id))
            .await
            .map_err(|e| store_failure(operation, &e))?;

        Ok(Some(ExpenseWithSplits { expense, splits }))
    }

    /// Loads an expense that exists and is not deleted.
    async fn load_live(
        &self,
        operation: &'static str,
        expense_id: ExpenseId,
    ) -> Result<Expense, LedgerError> {
        self.policy
            .retry(operation, || self.store.find_expense(expense_id))
            .await
            .map_err(|e| store_failure(operation, &e))?
            .filter(|e| !e.is_deleted())
            .ok_or(LedgerError::ExpenseNotFound(expense_id))
    }

    /// Notifies participants in the background; failures are only logged.
    fn dispatch_notice(&self, expense: &Expense, splits: &[ExpenseSplit]) {
        let groups = Arc::clone(&self.groups);
        let notifier = Arc::clone(&self.notifier);
        let user_ids: Vec<UserId> = splits.iter().map(|s| s.user_id).collect();
        let expense_id = expense.id;
        let description = expense.description.clone();
        let amount = expense.amount;

        tokio::spawn(async move {
            let recipient_emails = match groups.contact_emails(&user_ids).await {
                Ok(emails) => emails,
                Err(err) => {
                    warn!(expense_id = %expense_id, error = %err, "Could not resolve notification recipients");
                    return;
                }
            };
            if recipient_emails.is_empty() {
                return;
            }

            let notice = ExpenseNotice {
                recipient_emails,
                expense_id,
                description,
                amount,
            };
            if let Err(err) = notifier.expense_created(notice).await {
                warn!(expense_id = %expense_id, error = %err, "Expense notification failed");
            }
        });
    }
}
