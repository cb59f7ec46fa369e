//! Invariant checks on a computed allocation before it is committed.

use std::collections::HashSet;

use tally_shared::types::Money;

use super::error::SplitError;
use super::types::Allocation;

/// Validates a computed allocation set.
pub struct AllocationValidator;

impl AllocationValidator {
    /// Checks, in order:
    /// 1. participants are non-empty and unique
    /// 2. every paid and owed amount is non-negative
    /// 3. paid amounts sum to `expected_total` within [`Money::EPSILON`]
    ///
    /// The sum check is what rejects PERCENTAGE input that does not add
    /// up to 100.
    ///
    /// # Errors
    ///
    /// Returns the first violated rule.
    pub fn validate(allocations: &[Allocation], expected_total: Money) -> Result<(), SplitError> {
        if allocations.is_empty() {
            return Err(SplitError::EmptyParticipants);
        }

        let mut seen = HashSet::with_capacity(allocations.len());
        for allocation in allocations {
            if !seen.insert(allocation.user_id) {
                return Err(SplitError::DuplicateParticipant(allocation.user_id));
            }
        }

        if let Some(bad) = allocations
            .iter()
            .find(|a| a.amount_paid.is_negative() || a.amount_owed.is_negative())
        {
            return Err(SplitError::NegativeAmount {
                user_id: bad.user_id,
            });
        }

        let computed = allocations
            .iter()
            .try_fold(Money::ZERO, |acc, a| acc.checked_add(a.amount_paid))
            .ok_or(SplitError::AmountOutOfRange(Money::MAX))?;
        if !computed.approx_eq(expected_total) {
            return Err(SplitError::AmountMismatch {
                computed,
                expected: expected_total,
            });
        }

        Ok(())
    }

    /// Rejects totals that are zero or negative, or not storable.
    ///
    /// Used for expense totals and settlement amounts.
    ///
    /// # Errors
    ///
    /// Returns `NonPositiveAmount`, `SubCentAmount` or `AmountOutOfRange`.
    pub fn validate_total(total: Money) -> Result<(), SplitError> {
        if !total.is_positive() {
            return Err(SplitError::NonPositiveAmount(total));
        }
        Self::validate_amount(total)
    }

    /// Checks that an amount is in whole cents and within [`Money::MAX`].
    ///
    /// # Errors
    ///
    /// Returns `SubCentAmount` or `AmountOutOfRange`.
    pub fn validate_amount(amount: Money) -> Result<(), SplitError> {
        if !amount.is_storable() {
            return Err(SplitError::AmountOutOfRange(amount));
        }
        if !amount.is_whole_cents() {
            return Err(SplitError::SubCentAmount(amount));
        }
        Ok(())
    }
}
