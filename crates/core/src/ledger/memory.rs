//! In-memory store and group directory.
//!
//! Each expense and everything hanging off it lives in one map entry, so
//! holding the entry's shard lock makes every write atomic.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tally_shared::types::{ExpenseId, GroupId, UserId};

use super::store::{GroupDirectory, LedgerStore, SettlementWrite, StoreError};
use super::types::{Expense, ExpenseSplit, Payment};

#[derive(Debug, Clone)]
struct ExpenseRecord {
    expense: Expense,
    splits: Vec<ExpenseSplit>,
    payments: Vec<Payment>,
}

/// [`LedgerStore`] backed by a concurrent hash map.
#[derive(Debug, Default)]
pub struct MemoryLedgerStore {
    records: DashMap<ExpenseId, ExpenseRecord>,
}

impl MemoryLedgerStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn ensure_unique_participants(splits: &[ExpenseSplit]) -> Result<(), StoreError> {
    for (i, split) in splits.iter().enumerate() {
        if splits[..i].iter().any(|s| s.user_id == split.user_id) {
            return Err(StoreError::Constraint(format!(
                "duplicate split for user {}",
                split.user_id
            )));
        }
    }
    Ok(())
}

impl LedgerStore for MemoryLedgerStore {
    async fn insert_expense(
        &self,
        expense: &Expense,
        splits: &[ExpenseSplit],
    ) -> Result<(), StoreError> {
        ensure_unique_participants(splits)?;

        match self.records.entry(expense.id) {
            Entry::Occupied(_) => Err(StoreError::AlreadyExists),
            Entry::Vacant(slot) => {
                slot.insert(ExpenseRecord {
                    expense: expense.clone(),
                    splits: splits.to_vec(),
                    payments: Vec::new(),
                });
                Ok(())
            }
        }
    }

    async fn update_expense(
        &self,
        expense: &Expense,
        splits: Option<&[ExpenseSplit]>,
        expected_version: i64,
    ) -> Result<(), StoreError> {
        if let Some(splits) = splits {
            ensure_unique_participants(splits)?;
        }

        let mut record = self
            .records
            .get_mut(&expense.id)
            .ok_or(StoreError::VersionConflict)?;
        if record.expense.version != expected_version {
            return Err(StoreError::VersionConflict);
        }

        record.expense = expense.clone();
        if let Some(splits) = splits {
            record.splits = splits.to_vec();
        }
        Ok(())
    }

    async fn find_expense(&self, id: ExpenseId) -> Result<Option<Expense>, StoreError> {
        Ok(self.records.get(&id).map(|r| r.expense.clone()))
    }

    async fn list_group_expenses(&self, group_id: GroupId) -> Result<Vec<Expense>, StoreError> {
        let mut expenses: Vec<Expense> = self
            .records
            .iter()
            .filter(|r| r.expense.group_id == group_id && !r.expense.is_deleted())
            .map(|r| r.expense.clone())
            .collect();
        expenses.sort_by_key(|e| (e.created_at, e.id));
        Ok(expenses)
    }

    async fn list_splits(&self, expense_id: ExpenseId) -> Result<Vec<ExpenseSplit>, StoreError> {
        Ok(self
            .records
            .get(&expense_id)
            .map(|r| r.splits.clone())
            .unwrap_or_default())
    }

    async fn find_split(
        &self,
        expense_id: ExpenseId,
        user_id: UserId,
    ) -> Result<Option<ExpenseSplit>, StoreError> {
        Ok(self.records.get(&expense_id).and_then(|r| {
            r.splits.iter().find(|s| s.user_id == user_id).cloned()
        }))
    }

    async fn list_user_splits(&self, user_id: UserId) -> Result<Vec<ExpenseSplit>, StoreError> {
        Ok(self
            .records
            .iter()
            .filter(|r| !r.expense.is_deleted())
            .flat_map(|r| {
                r.splits
                    .iter()
                    .filter(|s| s.user_id == user_id)
                    .cloned()
                    .collect::<Vec<_>>()
            })
            .collect())
    }

    async fn apply_settlement(&self, write: &SettlementWrite) -> Result<ExpenseSplit, StoreError> {
        let mut record = self
            .records
            .get_mut(&write.expense_id)
            .ok_or(StoreError::VersionConflict)?;
        let record = &mut *record;
        if record.expense.is_deleted() {
            return Err(StoreError::VersionConflict);
        }

        let split = record
            .splits
            .iter_mut()
            .find(|s| s.id == write.split_id)
            .ok_or(StoreError::VersionConflict)?;
        if split.version != write.expected_version {
            return Err(StoreError::VersionConflict);
        }
        if write.new_amount_owed.is_negative() {
            return Err(StoreError::Constraint("amount_owed must be >= 0".to_string()));
        }

        split.amount_owed = write.new_amount_owed;
        split.version += 1;
        let updated = split.clone();

        if let Some(payment) = &write.payment {
            record.payments.push(payment.clone());
        }
        Ok(updated)
    }

    async fn list_payments(&self, expense_id: ExpenseId) -> Result<Vec<Payment>, StoreError> {
        Ok(self
            .records
            .get(&expense_id)
            .map(|r| r.payments.clone())
            .unwrap_or_default())
    }
}

/// [`GroupDirectory`] backed by concurrent hash maps.
#[derive(Debug, Default)]
pub struct MemoryGroupDirectory {
    groups: DashMap<GroupId, Vec<UserId>>,
    emails: DashMap<UserId, String>,
}

impl MemoryGroupDirectory {
    /// Creates an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a group with its members, replacing any previous roster.
    pub fn add_group(&self, group_id: GroupId, members: impl IntoIterator<Item = UserId>) {
        self.groups.insert(group_id, members.into_iter().collect());
    }

    /// Adds a member to an existing or new group. Existing members are ignored.
    pub fn add_member(&self, group_id: GroupId, user_id: UserId) {
        let mut members = self.groups.entry(group_id).or_default();
        if !members.contains(&user_id) {
            members.push(user_id);
        }
    }

    /// Sets a user's contact address.
    pub fn set_email(&self, user_id: UserId, email: impl Into<String>) {
        self.emails.insert(user_id, email.into());
    }
}

impl GroupDirectory for MemoryGroupDirectory {
    async fn group_exists(&self, group_id: GroupId) -> Result<bool, StoreError> {
        Ok(self.groups.contains_key(&group_id))
    }

    async fn list_members(&self, group_id: GroupId) -> Result<Vec<UserId>, StoreError> {
        Ok(self
            .groups
            .get(&group_id)
            .map(|m| m.clone())
            .unwrap_or_default())
    }

    async fn contact_emails(&self, user_ids: &[UserId]) -> Result<Vec<String>, StoreError> {
        Ok(user_ids
            .iter()
            .filter_map(|id| self.emails.get(id).map(|e| e.clone()))
            .collect())
    }
}
