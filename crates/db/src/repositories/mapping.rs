//! Conversions between database models and ledger records.

use chrono::Utc;
use sea_orm::Set;
use sea_orm::prelude::DateTimeWithTimeZone;
use tally_core::ledger::{Expense, ExpenseSplit, Payment, PaymentStatus};
use tally_core::split::SplitStrategy;
use tally_shared::types::{ExpenseId, ExpenseSplitId, GroupId, Money, PaymentId, UserId};

use crate::entities::{expense_splits, expenses, payments, sea_orm_active_enums};

impl From<SplitStrategy> for sea_orm_active_enums::SplitStrategy {
    fn from(strategy: SplitStrategy) -> Self {
        match strategy {
            SplitStrategy::Equally => Self::Equally,
            SplitStrategy::Unequal => Self::Unequal,
            SplitStrategy::Percentage => Self::Percentage,
            SplitStrategy::Shares => Self::Shares,
        }
    }
}

impl From<sea_orm_active_enums::SplitStrategy> for SplitStrategy {
    fn from(strategy: sea_orm_active_enums::SplitStrategy) -> Self {
        match strategy {
            sea_orm_active_enums::SplitStrategy::Equally => Self::Equally,
            sea_orm_active_enums::SplitStrategy::Unequal => Self::Unequal,
            sea_orm_active_enums::SplitStrategy::Percentage => Self::Percentage,
            sea_orm_active_enums::SplitStrategy::Shares => Self::Shares,
        }
    }
}

impl From<PaymentStatus> for sea_orm_active_enums::PaymentStatus {
    fn from(status: PaymentStatus) -> Self {
        match status {
            PaymentStatus::Pending => Self::Pending,
            PaymentStatus::Completed => Self::Completed,
            PaymentStatus::Failed => Self::Failed,
        }
    }
}

impl From<sea_orm_active_enums::PaymentStatus> for PaymentStatus {
    fn from(status: sea_orm_active_enums::PaymentStatus) -> Self {
        match status {
            sea_orm_active_enums::PaymentStatus::Pending => Self::Pending,
            sea_orm_active_enums::PaymentStatus::Completed => Self::Completed,
            sea_orm_active_enums::PaymentStatus::Failed => Self::Failed,
        }
    }
}

impl From<expenses::Model> for Expense {
    fn from(model: expenses::Model) -> Self {
        Self {
            id: ExpenseId::from_uuid(model.id),
            group_id: GroupId::from_uuid(model.group_id),
            payer_id: UserId::from_uuid(model.payer_id),
            amount: Money::new(model.amount),
            description: model.description,
            strategy: model.split_strategy.into(),
            version: model.version,
            created_at: model.created_at.with_timezone(&Utc),
            updated_at: model.updated_at.with_timezone(&Utc),
            deleted_at: model.deleted_at.map(|t| t.with_timezone(&Utc)),
        }
    }
}

impl From<expense_splits::Model> for ExpenseSplit {
    fn from(model: expense_splits::Model) -> Self {
        Self {
            id: ExpenseSplitId::from_uuid(model.id),
            expense_id: ExpenseId::from_uuid(model.expense_id),
            user_id: UserId::from_uuid(model.user_id),
            amount_paid: Money::new(model.amount_paid),
            amount_owed: Money::new(model.amount_owed),
            split_ratio: model.split_ratio,
            version: model.version,
        }
    }
}

impl From<payments::Model> for Payment {
    fn from(model: payments::Model) -> Self {
        Self {
            id: PaymentId::from_uuid(model.id),
            expense_id: model.expense_id.map(ExpenseId::from_uuid),
            payer_id: UserId::from_uuid(model.payer_id),
            payee_id: UserId::from_uuid(model.payee_id),
            amount: Money::new(model.amount),
            status: model.status.into(),
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}

pub(crate) fn expense_active_model(expense: &Expense) -> expenses::ActiveModel {
    expenses::ActiveModel {
        id: Set(expense.id.into_inner()),
        group_id: Set(expense.group_id.into_inner()),
        payer_id: Set(expense.payer_id.into_inner()),
        amount: Set(expense.amount.amount()),
        description: Set(expense.description.clone()),
        split_strategy: Set(expense.strategy.into()),
        version: Set(expense.version),
        created_at: Set(expense.created_at.into()),
        updated_at: Set(expense.updated_at.into()),
        deleted_at: Set(expense.deleted_at.map(Into::into)),
    }
}

/// Builds the rows for one split set. Rows share a timestamp and keep the
/// slice order in `position`.
pub(crate) fn split_active_models(splits: &[ExpenseSplit]) -> Vec<expense_splits::ActiveModel> {
    let now = Utc::now().into();
    splits
        .iter()
        .zip(0i32..)
        .map(|(split, position)| split_active_model(split, position, now))
        .collect()
}

fn split_active_model(
    split: &ExpenseSplit,
    position: i32,
    now: DateTimeWithTimeZone,
) -> expense_splits::ActiveModel {
    expense_splits::ActiveModel {
        id: Set(split.id.into_inner()),
        expense_id: Set(split.expense_id.into_inner()),
        user_id: Set(split.user_id.into_inner()),
        amount_paid: Set(split.amount_paid.amount()),
        amount_owed: Set(split.amount_owed.amount()),
        split_ratio: Set(split.split_ratio),
        position: Set(position),
        version: Set(split.version),
        created_at: Set(now),
        updated_at: Set(now),
    }
}

pub(crate) fn payment_active_model(payment: &Payment) -> payments::ActiveModel {
    payments::ActiveModel {
        id: Set(payment.id.into_inner()),
        expense_id: Set(payment.expense_id.map(ExpenseId::into_inner)),
        payer_id: Set(payment.payer_id.into_inner()),
        payee_id: Set(payment.payee_id.into_inner()),
        amount: Set(payment.amount.amount()),
        status: Set(payment.status.into()),
        created_at: Set(payment.created_at.into()),
    }
}
