//! Ledger error types.
//!
//! Validation failures come from [`SplitError`] and pass through unchanged.
//! On top of those the ledger adds missing-record errors, state conflicts
//! and infrastructure failures. Every variant maps to one [`ErrorKind`].

use std::time::Duration;

use tally_shared::ErrorKind;
use tally_shared::types::{ExpenseId, GroupId, Money, UserId};
use thiserror::Error;

use crate::split::SplitError;

/// Errors that can occur during ledger operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    // ========== Validation Errors ==========
    /// Input rejected by the split calculator or allocation validator.
    #[error(transparent)]
    Validation(#[from] SplitError),

    // ========== Not Found Errors ==========
    /// Group does not exist.
    #[error("Group not found: {0}")]
    GroupNotFound(GroupId),

    /// Expense does not exist or has been deleted.
    #[error("Expense not found: {0}")]
    ExpenseNotFound(ExpenseId),

    /// Payer or payee has no split on the expense.
    #[error("No balances found for payer {payer_id} and payee {payee_id} on expense {expense_id}")]
    BalancesNotFound {
        /// Settling user.
        payer_id: UserId,
        /// User being paid.
        payee_id: UserId,
        /// Expense being settled.
        expense_id: ExpenseId,
    },

    // ========== Conflict Errors ==========
    /// Settlement would push the payer's owed amount below zero.
    #[error("Insufficient balance: owes {available}, tried to settle {requested}")]
    InsufficientBalance {
        /// Amount the payer currently owes.
        available: Money,
        /// Amount the payer tried to settle.
        requested: Money,
    },

    /// Another settlement changed the same split in between.
    #[error("Concurrent settlement on expense {expense_id} for user {user_id}, please retry")]
    ConcurrentSettlementConflict {
        /// Expense being settled.
        expense_id: ExpenseId,
        /// Settling user.
        user_id: UserId,
    },

    /// Another update or delete changed the same expense in between.
    #[error("Expense {0} was modified concurrently, please retry")]
    ConcurrentExpenseModification(ExpenseId),

    // ========== Infrastructure Errors ==========
    /// The store kept failing after all retries.
    #[error("Ledger failure during {operation}: {message}")]
    Store {
        /// Operation that failed.
        operation: &'static str,
        /// Last store error.
        message: String,
    },

    /// The operation did not finish in time.
    #[error("Ledger operation {operation} timed out after {after:?}")]
    Timeout {
        /// Operation that timed out.
        operation: &'static str,
        /// Configured bound.
        after: Duration,
    },
}

impl LedgerError {
    /// Returns the broad category of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::GroupNotFound(_) | Self::ExpenseNotFound(_) | Self::BalancesNotFound { .. } => {
                ErrorKind::NotFound
            }
            Self::InsufficientBalance { .. }
            | Self::ConcurrentSettlementConflict { .. }
            | Self::ConcurrentExpenseModification(_) => ErrorKind::Conflict,
            Self::Store { .. } | Self::Timeout { .. } => ErrorKind::Infrastructure,
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(e) => e.error_code(),
            Self::GroupNotFound(_) => "GROUP_NOT_FOUND",
            Self::ExpenseNotFound(_) => "EXPENSE_NOT_FOUND",
            Self::BalancesNotFound { .. } => "BALANCES_NOT_FOUND",
            Self::InsufficientBalance { .. } => "INSUFFICIENT_BALANCE",
            Self::ConcurrentSettlementConflict { .. } => "CONCURRENT_SETTLEMENT_CONFLICT",
            Self::ConcurrentExpenseModification(_) => "CONCURRENT_EXPENSE_MODIFICATION",
            Self::Store { .. } => "LEDGER_FAILURE",
            Self::Timeout { .. } => "LEDGER_TIMEOUT",
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        self.kind().status_code()
    }

    /// Returns true if retrying with fresh state may succeed.
    ///
    /// Settlements are not idempotent; callers must not blindly retry them
    /// even when this returns true.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Conflict | ErrorKind::Infrastructure
        )
    }
}
