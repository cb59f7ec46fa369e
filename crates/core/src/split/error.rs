//! Validation errors raised while computing or checking an allocation.

use tally_shared::types::{Money, UserId};
use thiserror::Error;

use super::types::SplitStrategy;

/// Caller-caused validation failures. Never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SplitError {
    /// Strategy name is not one of EQUALLY, UNEQUAL, PERCENTAGE, SHARES.
    #[error("Invalid split type: {0}")]
    InvalidSplitType(String),

    /// Paid amounts do not add up to the expense total.
    #[error("Split amounts do not add up: computed {computed}, expected {expected}")]
    AmountMismatch {
        /// Sum of amount paid over all participants.
        computed: Money,
        /// The expense total.
        expected: Money,
    },

    /// A paid or owed amount is below zero.
    #[error("Negative amount for participant {user_id}")]
    NegativeAmount {
        /// Offending participant.
        user_id: UserId,
    },

    /// A percentage is below zero.
    #[error("Negative percentage for participant {user_id}")]
    NegativePercentage {
        /// Offending participant.
        user_id: UserId,
    },

    /// A percentage is above 100.
    #[error("Percentage for participant {user_id} exceeds 100")]
    PercentageOutOfRange {
        /// Offending participant.
        user_id: UserId,
    },

    /// An amount carries a fraction below one cent.
    #[error("Amount {0} has more than 2 decimal places")]
    SubCentAmount(Money),

    /// An amount is larger than the ledger can store.
    #[error("Amount {0} exceeds the supported maximum")]
    AmountOutOfRange(Money),

    /// Share counts add up to zero.
    #[error("Total shares must be greater than zero")]
    ZeroTotalShares,

    /// No participants were supplied.
    #[error("An expense needs at least one participant")]
    EmptyParticipants,

    /// A participant appears more than once.
    #[error("Participant {0} appears more than once")]
    DuplicateParticipant(UserId),

    /// A participant entry lacks the field its strategy needs.
    #[error("Participant {user_id} is missing field '{field}'")]
    MissingParticipantField {
        /// Offending participant.
        user_id: UserId,
        /// The missing field name.
        field: &'static str,
    },

    /// Expense or settlement amount is zero or negative.
    #[error("Amount must be greater than zero, got {0}")]
    NonPositiveAmount(Money),

    /// An amount change cannot be re-split without fresh participant input.
    #[error("Changing the amount of a {strategy} expense requires new participant input")]
    SplitInputRequired {
        /// Strategy of the stored expense.
        strategy: SplitStrategy,
    },

    /// Payer and payee of a settlement are the same user.
    #[error("Payer and payee must be different users")]
    SelfSettlement,
}

impl SplitError {
    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidSplitType(_) => "INVALID_SPLIT_TYPE",
            Self::AmountMismatch { .. } => "AMOUNT_MISMATCH",
            Self::NegativeAmount { .. } => "NEGATIVE_AMOUNT",
            Self::NegativePercentage { .. } => "NEGATIVE_PERCENTAGE",
            Self::PercentageOutOfRange { .. } => "PERCENTAGE_OUT_OF_RANGE",
            Self::SubCentAmount(_) => "SUB_CENT_AMOUNT",
            Self::AmountOutOfRange(_) => "AMOUNT_OUT_OF_RANGE",
            Self::ZeroTotalShares => "ZERO_TOTAL_SHARES",
            Self::EmptyParticipants => "EMPTY_PARTICIPANTS",
            Self::DuplicateParticipant(_) => "DUPLICATE_PARTICIPANT",
            Self::MissingParticipantField { .. } => "MISSING_PARTICIPANT_FIELD",
            Self::NonPositiveAmount(_) => "NON_POSITIVE_AMOUNT",
            Self::SplitInputRequired { .. } => "SPLIT_INPUT_REQUIRED",
            Self::SelfSettlement => "SELF_SETTLEMENT",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_amount_mismatch_display() {
        let err = SplitError::AmountMismatch {
            computed: Money::new(dec!(90.00)),
            expected: Money::new(dec!(100.00)),
        };
        assert_eq!(
            err.to_string(),
            "Split amounts do not add up: computed 90.00, expected 100.00"
        );
        assert_eq!(err.error_code(), "AMOUNT_MISMATCH");
    }

    #[test]
    fn test_sub_cent_amount_display() {
        let err = SplitError::SubCentAmount(Money::new(dec!(100.005)));
        assert_eq!(err.to_string(), "Amount 100.005 has more than 2 decimal places");
        assert_eq!(err.error_code(), "SUB_CENT_AMOUNT");
    }

    #[test]
    fn test_split_input_required_display() {
        let err = SplitError::SplitInputRequired {
            strategy: SplitStrategy::Shares,
        };
        assert_eq!(
            err.to_string(),
            "Changing the amount of a SHARES expense requires new participant input"
        );
    }
}
