//! Boundary traits for the collaborators the ledger depends on.
//!
//! These traits are implemented by the db crate (PostgreSQL) and by
//! [`memory`](super::memory) for tests and embedding.

use std::future::Future;

use tally_shared::types::{ExpenseId, ExpenseSplitId, GroupId, Money, UserId};
use thiserror::Error;

use super::types::{Expense, ExpenseSplit, Payment};

/// Errors reported by a store implementation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The store could not be reached or failed mid-operation.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A write violated a store constraint.
    #[error("constraint violation: {0}")]
    Constraint(String),

    /// The record's version no longer matches the expected one.
    #[error("record was modified concurrently")]
    VersionConflict,

    /// A record with the same ID already exists.
    #[error("record already exists")]
    AlreadyExists,
}

impl StoreError {
    /// Returns true if the same call may succeed when simply repeated.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Constraint(_))
    }
}

/// Version-checked write of one settlement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementWrite {
    /// Expense the split belongs to.
    pub expense_id: ExpenseId,
    /// Split being paid down.
    pub split_id: ExpenseSplitId,
    /// Version the new amount was computed from.
    pub expected_version: i64,
    /// Owed amount after the settlement.
    pub new_amount_owed: Money,
    /// Payment row to insert in the same transaction.
    pub payment: Option<Payment>,
}

/// Transactional persistence for expenses, splits and payments.
///
/// Every write method is atomic: either all rows it touches change or none
/// do. Version-checked writes fail with [`StoreError::VersionConflict`]
/// instead of overwriting a newer row.
pub trait LedgerStore: Send + Sync {
    /// Inserts an expense and its full split set.
    ///
    /// Fails with `AlreadyExists` if the expense ID is taken.
    fn insert_expense(
        &self,
        expense: &Expense,
        splits: &[ExpenseSplit],
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Overwrites an expense whose stored version is `expected_version`.
    ///
    /// When `splits` is given the stored split set is removed and replaced
    /// by it in the same transaction.
    fn update_expense(
        &self,
        expense: &Expense,
        splits: Option<&[ExpenseSplit]>,
        expected_version: i64,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Finds an expense by ID, including soft-deleted ones.
    fn find_expense(
        &self,
        id: ExpenseId,
    ) -> impl Future<Output = Result<Option<Expense>, StoreError>> + Send;

    /// Lists the non-deleted expenses of a group, oldest first.
    fn list_group_expenses(
        &self,
        group_id: GroupId,
    ) -> impl Future<Output = Result<Vec<Expense>, StoreError>> + Send;

    /// Lists the splits of an expense.
    fn list_splits(
        &self,
        expense_id: ExpenseId,
    ) -> impl Future<Output = Result<Vec<ExpenseSplit>, StoreError>> + Send;

    /// Finds one participant's split on an expense.
    fn find_split(
        &self,
        expense_id: ExpenseId,
        user_id: UserId,
    ) -> impl Future<Output = Result<Option<ExpenseSplit>, StoreError>> + Send;

    /// Lists a user's splits on non-deleted expenses.
    fn list_user_splits(
        &self,
        user_id: UserId,
    ) -> impl Future<Output = Result<Vec<ExpenseSplit>, StoreError>> + Send;

    /// Applies a settlement and inserts its payment atomically.
    ///
    /// Fails with `VersionConflict` if the split version moved or the
    /// expense was soft-deleted. Returns the updated split.
    fn apply_settlement(
        &self,
        write: &SettlementWrite,
    ) -> impl Future<Output = Result<ExpenseSplit, StoreError>> + Send;

    /// Lists payments recorded against an expense, oldest first.
    fn list_payments(
        &self,
        expense_id: ExpenseId,
    ) -> impl Future<Output = Result<Vec<Payment>, StoreError>> + Send;
}

/// Group membership, owned by an external service.
pub trait GroupDirectory: Send + Sync {
    /// Returns true if the group exists.
    fn group_exists(
        &self,
        group_id: GroupId,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;

    /// Lists the group's members in a stable order.
    fn list_members(
        &self,
        group_id: GroupId,
    ) -> impl Future<Output = Result<Vec<UserId>, StoreError>> + Send;

    /// Resolves contact addresses for the given users. Unknown users are skipped.
    fn contact_emails(
        &self,
        user_ids: &[UserId],
    ) -> impl Future<Output = Result<Vec<String>, StoreError>> + Send;
}
