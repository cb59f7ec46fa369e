//! Ledger records and operation inputs/outputs.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tally_shared::types::{ExpenseId, ExpenseSplitId, GroupId, Money, PaymentId, UserId};

use crate::split::{Allocation, ParticipantInput, SplitError, SplitInput, SplitStrategy};

/// A shared expense owned by a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Expense {
    /// Expense ID.
    pub id: ExpenseId,
    /// Owning group.
    pub group_id: GroupId,
    /// User who paid.
    pub payer_id: UserId,
    /// Total amount, always positive.
    pub amount: Money,
    /// Free-text description.
    pub description: Option<String>,
    /// Strategy the current split set was computed with.
    pub strategy: SplitStrategy,
    /// Optimistic-lock version, bumped on every update or delete.
    pub version: i64,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last update time.
    pub updated_at: DateTime<Utc>,
    /// Soft-delete marker.
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Expense {
    /// Returns true if the expense has been soft-deleted.
    #[must_use]
    pub const fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// One participant's allocation record on an expense.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseSplit {
    /// Split ID.
    pub id: ExpenseSplitId,
    /// Expense this split belongs to.
    pub expense_id: ExpenseId,
    /// Participant.
    pub user_id: UserId,
    /// What the participant put in.
    pub amount_paid: Money,
    /// What the participant still owes.
    pub amount_owed: Money,
    /// Informational per-unit share.
    pub split_ratio: Decimal,
    /// Optimistic-lock version, bumped on every settlement.
    pub version: i64,
}

impl ExpenseSplit {
    /// Creates a fresh split record from a computed allocation.
    #[must_use]
    pub fn from_allocation(expense_id: ExpenseId, allocation: Allocation) -> Self {
        Self {
            id: ExpenseSplitId::new(),
            expense_id,
            user_id: allocation.user_id,
            amount_paid: allocation.amount_paid,
            amount_owed: allocation.amount_owed,
            split_ratio: allocation.split_ratio,
            version: 1,
        }
    }

    /// Owed minus paid: positive means the participant owes.
    #[must_use]
    pub fn net(&self) -> Money {
        self.amount_owed - self.amount_paid
    }
}

/// Lifecycle of a settlement payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    /// Recorded but not yet confirmed.
    Pending,
    /// Confirmed (immutable).
    Completed,
    /// Abandoned (immutable).
    Failed,
}

impl PaymentStatus {
    /// Returns true if no further transition is allowed.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Returns true if moving from `self` to `next` is allowed.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Completed | Self::Failed)
        )
    }

    /// Returns the stable string form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

/// A settlement payment between two users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    /// Payment ID.
    pub id: PaymentId,
    /// Expense the payment settles, if any.
    pub expense_id: Option<ExpenseId>,
    /// Paying user.
    pub payer_id: UserId,
    /// Receiving user.
    pub payee_id: UserId,
    /// Amount paid, always positive.
    pub amount: Money,
    /// Current status.
    pub status: PaymentStatus,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

/// Typed input for creating an expense.
#[derive(Debug, Clone)]
pub struct CreateExpenseInput {
    /// Caller-chosen ID; makes the create idempotent when supplied.
    pub expense_id: Option<ExpenseId>,
    /// Owning group.
    pub group_id: GroupId,
    /// User who paid.
    pub payer_id: UserId,
    /// Total amount.
    pub amount: Money,
    /// Free-text description.
    pub description: Option<String>,
    /// Strategy plus participant input.
    pub split: SplitInput,
}

/// Wire form of a create request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateExpenseRequest {
    /// Caller-chosen ID.
    #[serde(default)]
    pub expense_id: Option<ExpenseId>,
    /// Owning group.
    pub group_id: GroupId,
    /// User who paid.
    pub payer_id: UserId,
    /// Total amount.
    pub amount: Money,
    /// Free-text description.
    #[serde(default)]
    pub description: Option<String>,
    /// Strategy name.
    pub strategy: String,
    /// Per-participant input; unused for EQUALLY.
    #[serde(default)]
    pub users: Vec<ParticipantInput>,
}

impl CreateExpenseRequest {
    /// Parses the strategy and participant input.
    ///
    /// # Errors
    ///
    /// Returns `InvalidSplitType` or `MissingParticipantField`.
    pub fn into_input(self) -> Result<CreateExpenseInput, SplitError> {
        let strategy: SplitStrategy = self.strategy.parse()?;
        let split = SplitInput::from_participants(strategy, &self.users)?;

        Ok(CreateExpenseInput {
            expense_id: self.expense_id,
            group_id: self.group_id,
            payer_id: self.payer_id,
            amount: self.amount,
            description: self.description,
            split,
        })
    }
}

/// Typed input for updating an expense. `None` keeps the stored value.
#[derive(Debug, Clone, Default)]
pub struct UpdateExpenseInput {
    /// New total.
    pub amount: Option<Money>,
    /// New description.
    pub description: Option<String>,
    /// New payer.
    pub payer_id: Option<UserId>,
    /// New strategy.
    pub strategy: Option<SplitStrategy>,
    /// New participant input for the (new or stored) strategy.
    pub users: Option<Vec<ParticipantInput>>,
}

impl UpdateExpenseInput {
    /// Returns true if the change requires a fresh split set.
    #[must_use]
    pub fn requires_resplit(&self, current: &Expense) -> bool {
        self.strategy.is_some_and(|s| s != current.strategy)
            || self.users.is_some()
            || self.payer_id.is_some_and(|p| p != current.payer_id)
            || self.amount.is_some_and(|a| a != current.amount)
    }
}

/// Wire form of an update request.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateExpenseRequest {
    /// New total.
    #[serde(default)]
    pub amount: Option<Money>,
    /// New description.
    #[serde(default)]
    pub description: Option<String>,
    /// New payer.
    #[serde(default)]
    pub payer_id: Option<UserId>,
    /// New strategy name.
    #[serde(default)]
    pub strategy: Option<String>,
    /// New participant input.
    #[serde(default)]
    pub users: Option<Vec<ParticipantInput>>,
}

impl UpdateExpenseRequest {
    /// Parses the optional strategy name.
    ///
    /// # Errors
    ///
    /// Returns `InvalidSplitType` for an unknown strategy.
    pub fn into_input(self) -> Result<UpdateExpenseInput, SplitError> {
        let strategy = self
            .strategy
            .as_deref()
            .map(str::parse::<SplitStrategy>)
            .transpose()?;

        Ok(UpdateExpenseInput {
            amount: self.amount,
            description: self.description,
            payer_id: self.payer_id,
            strategy,
            users: self.users,
        })
    }
}

/// An expense together with its current split set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseWithSplits {
    /// The expense.
    pub expense: Expense,
    /// One split per participant.
    pub splits: Vec<ExpenseSplit>,
}

impl ExpenseWithSplits {
    /// Returns the split for `user_id`, if the user participates.
    #[must_use]
    pub fn split_for(&self, user_id: UserId) -> Option<&ExpenseSplit> {
        self.splits.iter().find(|s| s.user_id == user_id)
    }
}

/// Input for settling part of a debt on one expense.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettleUpInput {
    /// User paying down their debt.
    pub payer_id: UserId,
    /// User receiving the payment.
    pub payee_id: UserId,
    /// Amount paid.
    pub amount: Money,
    /// Expense being settled.
    pub expense_id: ExpenseId,
}

/// Outcome of a successful settlement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementResult {
    /// User who paid.
    pub payer_id: UserId,
    /// User who was paid.
    pub payee_id: UserId,
    /// Payer's remaining owed amount on the expense.
    pub new_payer_balance: Money,
    /// Payment row written alongside, when payments are recorded.
    pub payment_id: Option<PaymentId>,
}

/// Payload handed to the notifier after an expense is created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpenseNotice {
    /// Addresses of the participants.
    pub recipient_emails: Vec<String>,
    /// The new expense.
    pub expense_id: ExpenseId,
    /// Expense description.
    pub description: Option<String>,
    /// Expense total.
    pub amount: Money,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn expense() -> Expense {
        let now = Utc::now();
        Expense {
            id: ExpenseId::new(),
            group_id: GroupId::new(),
            payer_id: UserId::new(),
            amount: Money::new(dec!(100)),
            description: Some("Groceries".to_string()),
            strategy: SplitStrategy::Equally,
            version: 1,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    #[test]
    fn test_payment_status_transitions() {
        assert!(PaymentStatus::Pending.can_transition_to(PaymentStatus::Completed));
        assert!(PaymentStatus::Pending.can_transition_to(PaymentStatus::Failed));
        assert!(!PaymentStatus::Completed.can_transition_to(PaymentStatus::Pending));
        assert!(!PaymentStatus::Completed.can_transition_to(PaymentStatus::Failed));
        assert!(!PaymentStatus::Failed.can_transition_to(PaymentStatus::Completed));
        assert!(PaymentStatus::Completed.is_terminal());
        assert!(!PaymentStatus::Pending.is_terminal());
    }

    #[test]
    fn test_split_net() {
        let split = ExpenseSplit::from_allocation(
            ExpenseId::new(),
            Allocation {
                user_id: UserId::new(),
                amount_paid: Money::new(dec!(20)),
                amount_owed: Money::new(dec!(50)),
                split_ratio: dec!(50),
            },
        );
        assert_eq!(split.net(), Money::new(dec!(30)));
        assert_eq!(split.version, 1);
    }

    #[test]
    fn test_requires_resplit() {
        let current = expense();

        let description_only = UpdateExpenseInput {
            description: Some("Dinner".to_string()),
            ..Default::default()
        };
        assert!(!description_only.requires_resplit(&current));

        let same_amount = UpdateExpenseInput {
            amount: Some(Money::new(dec!(100.00))),
            ..Default::default()
        };
        assert!(!same_amount.requires_resplit(&current));

        let new_amount = UpdateExpenseInput {
            amount: Some(Money::new(dec!(120))),
            ..Default::default()
        };
        assert!(new_amount.requires_resplit(&current));

        let new_strategy = UpdateExpenseInput {
            strategy: Some(SplitStrategy::Shares),
            ..Default::default()
        };
        assert!(new_strategy.requires_resplit(&current));
    }

    #[test]
    fn test_create_request_parsing() {
        let json = r#"{
            "groupId": "0191f5a0-0000-7000-8000-00000000000a",
            "payerId": "0191f5a0-0000-7000-8000-000000000001",
            "amount": "300.00",
            "strategy": "shares",
            "users": [
                {"userId": "0191f5a0-0000-7000-8000-000000000001", "shares": 3},
                {"userId": "0191f5a0-0000-7000-8000-000000000002", "shares": 2}
            ]
        }"#;

        let request: CreateExpenseRequest = serde_json::from_str(json).unwrap();
        let input = request.into_input().unwrap();
        assert_eq!(input.split.strategy(), SplitStrategy::Shares);
        assert_eq!(input.amount, Money::new(dec!(300)));
        assert!(input.expense_id.is_none());
    }

    #[test]
    fn test_create_request_unknown_strategy() {
        let json = r#"{
            "groupId": "0191f5a0-0000-7000-8000-00000000000a",
            "payerId": "0191f5a0-0000-7000-8000-000000000001",
            "amount": "10",
            "strategy": "ROUND_ROBIN"
        }"#;

        let request: CreateExpenseRequest = serde_json::from_str(json).unwrap();
        assert_eq!(
            request.into_input().unwrap_err(),
            SplitError::InvalidSplitType("ROUND_ROBIN".to_string())
        );
    }

    #[test]
    fn test_update_request_parsing() {
        let request = UpdateExpenseRequest {
            strategy: Some("PERCENTAGE".to_string()),
            ..Default::default()
        };
        assert_eq!(
            request.into_input().unwrap().strategy,
            Some(SplitStrategy::Percentage)
        );
    }
}
