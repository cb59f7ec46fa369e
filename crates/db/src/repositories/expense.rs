//! Expense repository: PostgreSQL implementation of [`LedgerStore`].
//!
//! Each write runs in its own database transaction. Optimistic locking is a
//! version-filtered `UPDATE`; zero affected rows means someone else won.

use chrono::Utc;
use sea_orm::sea_query::{Alias, Expr, SimpleExpr};
use sea_orm::{
    ActiveEnum, ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, EntityTrait,
    QueryFilter, QueryOrder, QuerySelect, SqlErr, TransactionTrait,
};
use tally_core::ledger::{Expense, ExpenseSplit, LedgerStore, Payment, SettlementWrite, StoreError};
use tally_shared::types::{ExpenseId, GroupId, UserId};
use tracing::debug;

use super::mapping::{expense_active_model, payment_active_model, split_active_models};
use super::store_error;
use crate::entities::{expense_splits, expenses, payments, sea_orm_active_enums};

/// Expense, split and payment persistence.
#[derive(Debug, Clone)]
pub struct ExpenseRepository {
    db: DatabaseConnection,
}

impl ExpenseRepository {
    /// Creates a new expense repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    async fn begin(&self) -> Result<DatabaseTransaction, StoreError> {
        self.db.begin().await.map_err(|e| store_error(&e))
    }

    async fn insert_splits(
        txn: &DatabaseTransaction,
        splits: &[ExpenseSplit],
    ) -> Result<(), StoreError> {
        if splits.is_empty() {
            return Ok(());
        }
        expense_splits::Entity::insert_many(split_active_models(splits))
            .exec(txn)
            .await
            .map_err(|e| store_error(&e))?;
        Ok(())
    }
}

fn strategy_expr(strategy: sea_orm_active_enums::SplitStrategy) -> SimpleExpr {
    Expr::val(strategy.to_value()).as_enum(Alias::new("split_strategy"))
}

impl LedgerStore for ExpenseRepository {
    async fn insert_expense(
        &self,
        expense: &Expense,
        splits: &[ExpenseSplit],
    ) -> Result<(), StoreError> {
        let txn = self.begin().await?;

        expense_active_model(expense)
            .insert(&txn)
            .await
            .map_err(|e| match e.sql_err() {
                Some(SqlErr::UniqueConstraintViolation(_)) => StoreError::AlreadyExists,
                _ => store_error(&e),
            })?;
        Self::insert_splits(&txn, splits).await?;

        txn.commit().await.map_err(|e| store_error(&e))?;
        debug!(expense_id = %expense.id, splits = splits.len(), "Inserted expense");
        Ok(())
    }

    async fn update_expense(
        &self,
        expense: &Expense,
        splits: Option<&[ExpenseSplit]>,
        expected_version: i64,
    ) -> Result<(), StoreError> {
        let txn = self.begin().await?;

        let result = expenses::Entity::update_many()
            .col_expr(expenses::Column::Amount, Expr::value(expense.amount.amount()))
            .col_expr(
                expenses::Column::PayerId,
                Expr::value(expense.payer_id.into_inner()),
            )
            .col_expr(
                expenses::Column::Description,
                Expr::value(expense.description.clone()),
            )
            .col_expr(
                expenses::Column::SplitStrategy,
                strategy_expr(expense.strategy.into()),
            )
            .col_expr(expenses::Column::Version, Expr::value(expense.version))
            .col_expr(
                expenses::Column::UpdatedAt,
                Expr::value(chrono::DateTime::<chrono::FixedOffset>::from(expense.updated_at)),
            )
            .col_expr(
                expenses::Column::DeletedAt,
                Expr::value(
                    expense
                        .deleted_at
                        .map(chrono::DateTime::<chrono::FixedOffset>::from),
                ),
            )
            .filter(expenses::Column::Id.eq(expense.id.into_inner()))
            .filter(expenses::Column::Version.eq(expected_version))
            .exec(&txn)
            .await
            .map_err(|e| store_error(&e))?;

        if result.rows_affected == 0 {
            // Dropping the transaction rolls it back.
            return Err(StoreError::VersionConflict);
        }

        if let Some(splits) = splits {
            expense_splits::Entity::delete_many()
                .filter(expense_splits::Column::ExpenseId.eq(expense.id.into_inner()))
                .exec(&txn)
                .await
                .map_err(|e| store_error(&e))?;
            Self::insert_splits(&txn, splits).await?;
        }

        txn.commit().await.map_err(|e| store_error(&e))?;
        debug!(
            expense_id = %expense.id,
            version = expense.version,
            replaced_splits = splits.is_some(),
            "Updated expense"
        );
        Ok(())
    }

    async fn find_expense(&self, id: ExpenseId) -> Result<Option<Expense>, StoreError> {
        expenses::Entity::find_by_id(id.into_inner())
            .one(&self.db)
            .await
            .map(|m| m.map(Expense::from))
            .map_err(|e| store_error(&e))
    }

    async fn list_group_expenses(&self, group_id: GroupId) -> Result<Vec<Expense>, StoreError> {
        expenses::Entity::find()
            .filter(expenses::Column::GroupId.eq(group_id.into_inner()))
            .filter(expenses::Column::DeletedAt.is_null())
            .order_by_asc(expenses::Column::CreatedAt)
            .order_by_asc(expenses::Column::Id)
            .all(&self.db)
            .await
            .map(|models| models.into_iter().map(Expense::from).collect())
            .map_err(|e| store_error(&e))
    }

    async fn list_splits(&self, expense_id: ExpenseId) -> Result<Vec<ExpenseSplit>, StoreError> {
        expense_splits::Entity::find()
            .filter(expense_splits::Column::ExpenseId.eq(expense_id.into_inner()))
            .order_by_asc(expense_splits::Column::Position)
            .all(&self.db)
            .await
            .map(|models| models.into_iter().map(ExpenseSplit::from).collect())
            .map_err(|e| store_error(&e))
    }

    async fn find_split(
        &self,
        expense_id: ExpenseId,
        user_id: UserId,
    ) -> Result<Option<ExpenseSplit>, StoreError> {
        expense_splits::Entity::find()
            .filter(expense_splits::Column::ExpenseId.eq(expense_id.into_inner()))
            .filter(expense_splits::Column::UserId.eq(user_id.into_inner()))
            .one(&self.db)
            .await
            .map(|m| m.map(ExpenseSplit::from))
            .map_err(|e| store_error(&e))
    }

    async fn list_user_splits(&self, user_id: UserId) -> Result<Vec<ExpenseSplit>, StoreError> {
        expense_splits::Entity::find()
            .inner_join(expenses::Entity)
            .filter(expense_splits::Column::UserId.eq(user_id.into_inner()))
            .filter(expenses::Column::DeletedAt.is_null())
            .order_by_asc(expenses::Column::CreatedAt)
            .all(&self.db)
            .await
            .map(|models| models.into_iter().map(ExpenseSplit::from).collect())
            .map_err(|e| store_error(&e))
    }

    async fn apply_settlement(&self, write: &SettlementWrite) -> Result<ExpenseSplit, StoreError> {
        let txn = self.begin().await?;

        // Row lock orders this write against a concurrent soft delete.
        let live = expenses::Entity::find_by_id(write.expense_id.into_inner())
            .filter(expenses::Column::DeletedAt.is_null())
            .lock_exclusive()
            .one(&txn)
            .await
            .map_err(|e| store_error(&e))?;
        if live.is_none() {
            return Err(StoreError::VersionConflict);
        }

        let result = expense_splits::Entity::update_many()
            .col_expr(
                expense_splits::Column::AmountOwed,
                Expr::value(write.new_amount_owed.amount()),
            )
            .col_expr(
                expense_splits::Column::Version,
                Expr::col(expense_splits::Column::Version).add(1i64),
            )
            .col_expr(
                expense_splits::Column::UpdatedAt,
                Expr::value(chrono::DateTime::<chrono::FixedOffset>::from(Utc::now())),
            )
            .filter(expense_splits::Column::Id.eq(write.split_id.into_inner()))
            .filter(expense_splits::Column::ExpenseId.eq(write.expense_id.into_inner()))
            .filter(expense_splits::Column::Version.eq(write.expected_version))
            .exec(&txn)
            .await
            .map_err(|e| store_error(&e))?;

        if result.rows_affected == 0 {
            return Err(StoreError::VersionConflict);
        }

        if let Some(payment) = &write.payment {
            payment_active_model(payment)
                .insert(&txn)
                .await
                .map_err(|e| store_error(&e))?;
        }

        let updated = expense_splits::Entity::find_by_id(write.split_id.into_inner())
            .one(&txn)
            .await
            .map_err(|e| store_error(&e))?
            .ok_or(StoreError::VersionConflict)?;

        txn.commit().await.map_err(|e| store_error(&e))?;
        debug!(
            expense_id = %write.expense_id,
            split_id = %write.split_id,
            version = updated.version,
            "Applied settlement"
        );
        Ok(updated.into())
    }

    async fn list_payments(&self, expense_id: ExpenseId) -> Result<Vec<Payment>, StoreError> {
        payments::Entity::find()
            .filter(payments::Column::ExpenseId.eq(expense_id.into_inner()))
            .order_by_asc(payments::Column::CreatedAt)
            .all(&self.db)
            .await
            .map(|models| models.into_iter().map(Payment::from).collect())
            .map_err(|e| store_error(&e))
    }
}
