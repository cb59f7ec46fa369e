//! Strategy formulas turning an expense total into allocations.
//!
//! Pure and deterministic: no I/O, same input, same output. The
//! calculator only rejects input it cannot compute with (negative
//! percentages, zero total shares, negative explicit amounts); whether
//! the result is a valid allocation is decided by
//! [`AllocationValidator`](super::validation::AllocationValidator).

use rust_decimal::Decimal;
use tally_shared::types::{Money, UserId};

use super::allocation::{allocate_equal, allocate_proportional};
use super::error::SplitError;
use super::types::{Allocation, PercentageShare, ShareCount, SplitInput, UnequalShare};
use super::validation::AllocationValidator;

/// Decimal places `split_ratio` is persisted with.
pub const RATIO_SCALE: u32 = 4;

/// Computes per-participant allocations for an expense.
pub struct SplitCalculator;

impl SplitCalculator {
    /// Computes the allocation for `total` under `input`.
    ///
    /// `payer_id` and `members` (the group's membership) are only consulted
    /// for EQUALLY splits, where the payer is added if not already a member.
    ///
    /// # Errors
    ///
    /// - `SubCentAmount` / `AmountOutOfRange` for a total or UNEQUAL amount
    ///   that is not storable
    /// - `NegativeAmount` for a negative UNEQUAL amount
    /// - `NegativePercentage` / `PercentageOutOfRange` for a percentage
    ///   outside 0..=100
    /// - `ZeroTotalShares` when share counts add up to zero
    pub fn calculate(
        total: Money,
        payer_id: UserId,
        input: &SplitInput,
        members: &[UserId],
    ) -> Result<Vec<Allocation>, SplitError> {
        AllocationValidator::validate_amount(total)?;

        match input {
            SplitInput::Equally => Ok(Self::equally(total, payer_id, members)),
            SplitInput::Unequal(users) => Self::unequal(users),
            SplitInput::Percentage(users) => Self::percentage(total, users),
            SplitInput::Shares(users) => Self::shares(total, users),
        }
    }

    /// Payer pays the total and owes nothing; everyone else owes a share.
    fn equally(total: Money, payer_id: UserId, members: &[UserId]) -> Vec<Allocation> {
        let mut participants = members.to_vec();
        if !participants.contains(&payer_id) {
            participants.push(payer_id);
        }

        let shares = allocate_equal(total, participants.len());

        participants
            .into_iter()
            .zip(shares)
            .map(|(user_id, share)| {
                if user_id == payer_id {
                    Allocation {
                        user_id,
                        amount_paid: total,
                        amount_owed: Money::ZERO,
                        split_ratio: share.amount(),
                    }
                } else {
                    Allocation {
                        user_id,
                        amount_paid: Money::ZERO,
                        amount_owed: share,
                        split_ratio: share.amount(),
                    }
                }
            })
            .collect()
    }

    fn unequal(users: &[UnequalShare]) -> Result<Vec<Allocation>, SplitError> {
        users
            .iter()
            .map(|u| {
                if u.amount_paid.is_negative() || u.amount_owed.is_negative() {
                    return Err(SplitError::NegativeAmount { user_id: u.user_id });
                }
                AllocationValidator::validate_amount(u.amount_paid)?;
                AllocationValidator::validate_amount(u.amount_owed)?;
                Ok(Allocation {
                    user_id: u.user_id,
                    amount_paid: u.amount_paid,
                    amount_owed: u.amount_owed,
                    split_ratio: u.amount_owed.amount(),
                })
            })
            .collect()
    }

    /// `amount_owed` is `total - own amount_paid`, not a share of the bill.
    fn percentage(total: Money, users: &[PercentageShare]) -> Result<Vec<Allocation>, SplitError> {
        if let Some(u) = users.iter().find(|u| u.percentage < Decimal::ZERO) {
            return Err(SplitError::NegativePercentage { user_id: u.user_id });
        }
        if let Some(u) = users.iter().find(|u| u.percentage > Decimal::ONE_HUNDRED) {
            return Err(SplitError::PercentageOutOfRange { user_id: u.user_id });
        }

        let weights: Vec<Decimal> = users.iter().map(|u| u.percentage).collect();
        let paid = allocate_proportional(total, &weights, Decimal::ONE_HUNDRED);

        Ok(users
            .iter()
            .zip(paid)
            .map(|(u, amount_paid)| Allocation {
                user_id: u.user_id,
                amount_paid,
                amount_owed: total - amount_paid,
                split_ratio: u.percentage.round_dp(RATIO_SCALE),
            })
            .collect())
    }

    /// `amount_owed` is `total - own amount_paid`, not a share of the bill.
    fn shares(total: Money, users: &[ShareCount]) -> Result<Vec<Allocation>, SplitError> {
        let total_shares: u64 = users.iter().map(|u| u64::from(u.shares)).sum();
        if total_shares == 0 {
            return Err(SplitError::ZeroTotalShares);
        }

        let weights: Vec<Decimal> = users.iter().map(|u| Decimal::from(u.shares)).collect();
        let paid = allocate_proportional(total, &weights, Decimal::from(total_shares));

        Ok(users
            .iter()
            .zip(paid)
            .map(|(u, amount_paid)| Allocation {
                user_id: u.user_id,
                amount_paid,
                amount_owed: total - amount_paid,
                split_ratio: amount_paid.amount(),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn money(d: Decimal) -> Money {
        Money::new(d)
    }

    fn find(allocs: &[Allocation], user_id: UserId) -> &Allocation {
        allocs.iter().find(|a| a.user_id == user_id).unwrap()
    }

    #[test]
    fn test_equally_two_members() {
        let (u1, u2) = (UserId::new(), UserId::new());
        let allocs = SplitCalculator::calculate(
            money(dec!(100)),
            u1,
            &SplitInput::Equally,
            &[u1, u2],
        )
        .unwrap();

        assert_eq!(
            allocs,
            vec![
                Allocation {
                    user_id: u1,
                    amount_paid: money(dec!(100)),
                    amount_owed: Money::ZERO,
                    split_ratio: dec!(50),
                },
                Allocation {
                    user_id: u2,
                    amount_paid: Money::ZERO,
                    amount_owed: money(dec!(50)),
                    split_ratio: dec!(50),
                },
            ]
        );
    }

    #[test]
    fn test_equally_adds_payer_outside_membership() {
        let (payer, m1, m2) = (UserId::new(), UserId::new(), UserId::new());
        let allocs = SplitCalculator::calculate(
            money(dec!(90)),
            payer,
            &SplitInput::Equally,
            &[m1, m2],
        )
        .unwrap();

        assert_eq!(allocs.len(), 3);
        assert_eq!(find(&allocs, payer).amount_paid, money(dec!(90)));
        assert_eq!(find(&allocs, m1).amount_owed, money(dec!(30)));
        assert_eq!(find(&allocs, m2).amount_owed, money(dec!(30)));
    }

    #[test]
    fn test_unequal_mirrors_input() {
        let (u1, u2) = (UserId::new(), UserId::new());
        let input = SplitInput::Unequal(vec![
            UnequalShare {
                user_id: u1,
                amount_paid: money(dec!(70)),
                amount_owed: money(dec!(20)),
            },
            UnequalShare {
                user_id: u2,
                amount_paid: money(dec!(30)),
                amount_owed: money(dec!(80)),
            },
        ]);

        let allocs = SplitCalculator::calculate(money(dec!(100)), UserId::new(), &input, &[]).unwrap();
        assert_eq!(find(&allocs, u1).split_ratio, dec!(20));
        assert_eq!(find(&allocs, u2).amount_owed, money(dec!(80)));
    }

    #[test]
    fn test_unequal_negative_amount() {
        let u1 = UserId::new();
        let input = SplitInput::Unequal(vec![UnequalShare {
            user_id: u1,
            amount_paid: money(dec!(100)),
            amount_owed: money(dec!(-1)),
        }]);

        assert_eq!(
            SplitCalculator::calculate(money(dec!(100)), UserId::new(), &input, &[]),
            Err(SplitError::NegativeAmount { user_id: u1 })
        );
    }

    #[test]
    fn test_percentage_owed_is_total_minus_own_paid() {
        let (u1, u2) = (UserId::new(), UserId::new());
        let input = SplitInput::Percentage(vec![
            PercentageShare {
                user_id: u1,
                percentage: dec!(60),
            },
            PercentageShare {
                user_id: u2,
                percentage: dec!(40),
            },
        ]);

        let allocs = SplitCalculator::calculate(money(dec!(200)), UserId::new(), &input, &[]).unwrap();
        let a1 = find(&allocs, u1);
        assert_eq!(a1.amount_paid, money(dec!(120)));
        assert_eq!(a1.amount_owed, money(dec!(80)));
        assert_eq!(a1.split_ratio, dec!(60));

        let a2 = find(&allocs, u2);
        assert_eq!(a2.amount_paid, money(dec!(80)));
        assert_eq!(a2.amount_owed, money(dec!(120)));
    }

    #[test]
    fn test_percentage_negative() {
        let u1 = UserId::new();
        let input = SplitInput::Percentage(vec![PercentageShare {
            user_id: u1,
            percentage: dec!(-10),
        }]);

        assert_eq!(
            SplitCalculator::calculate(money(dec!(100)), UserId::new(), &input, &[]),
            Err(SplitError::NegativePercentage { user_id: u1 })
        );
    }

    #[test]
    fn test_percentage_above_100_is_rejected() {
        let (u1, u2) = (UserId::new(), UserId::new());
        let input = SplitInput::Percentage(vec![
            PercentageShare {
                user_id: u1,
                percentage: dec!(50),
            },
            PercentageShare {
                user_id: u2,
                percentage: Decimal::MAX,
            },
        ]);

        assert_eq!(
            SplitCalculator::calculate(money(dec!(100)), UserId::new(), &input, &[]),
            Err(SplitError::PercentageOutOfRange { user_id: u2 })
        );
    }

    #[test]
    fn test_percentage_ratio_rounded_to_stored_scale() {
        let u1 = UserId::new();
        let input = SplitInput::Percentage(vec![PercentageShare {
            user_id: u1,
            percentage: dec!(33.333333),
        }]);

        let allocs = SplitCalculator::calculate(money(dec!(30)), UserId::new(), &input, &[]).unwrap();
        assert_eq!(allocs[0].split_ratio, dec!(33.3333));
    }

    #[test]
    fn test_unequal_oversized_amount_is_rejected() {
        let input = SplitInput::Unequal(vec![
            UnequalShare {
                user_id: UserId::new(),
                amount_paid: money(Decimal::MAX),
                amount_owed: Money::ZERO,
            },
            UnequalShare {
                user_id: UserId::new(),
                amount_paid: money(Decimal::MAX),
                amount_owed: Money::ZERO,
            },
        ]);

        assert_eq!(
            SplitCalculator::calculate(money(dec!(100)), UserId::new(), &input, &[]),
            Err(SplitError::AmountOutOfRange(money(Decimal::MAX)))
        );
    }

    #[test]
    fn test_unequal_sub_cent_amount_is_rejected() {
        let input = SplitInput::Unequal(vec![UnequalShare {
            user_id: UserId::new(),
            amount_paid: money(dec!(99.995)),
            amount_owed: Money::ZERO,
        }]);

        assert_eq!(
            SplitCalculator::calculate(money(dec!(100)), UserId::new(), &input, &[]),
            Err(SplitError::SubCentAmount(money(dec!(99.995))))
        );
    }

    #[test]
    fn test_total_out_of_range_is_rejected() {
        assert_eq!(
            SplitCalculator::calculate(
                money(Decimal::MAX),
                UserId::new(),
                &SplitInput::Equally,
                &[UserId::new()],
            ),
            Err(SplitError::AmountOutOfRange(money(Decimal::MAX)))
        );
    }

    #[test]
    fn test_shares_three_two() {
        let (u1, u2) = (UserId::new(), UserId::new());
        let input = SplitInput::Shares(vec![
            ShareCount {
                user_id: u1,
                shares: 3,
            },
            ShareCount {
                user_id: u2,
                shares: 2,
            },
        ]);

        let allocs = SplitCalculator::calculate(money(dec!(300)), UserId::new(), &input, &[]).unwrap();
        let a1 = find(&allocs, u1);
        assert_eq!(a1.amount_paid, money(dec!(180)));
        assert_eq!(a1.amount_owed, money(dec!(120)));
        assert_eq!(a1.split_ratio, dec!(180));
        assert_eq!(find(&allocs, u2).amount_paid, money(dec!(120)));
    }

    #[test]
    fn test_shares_zero_total() {
        let input = SplitInput::Shares(vec![ShareCount {
            user_id: UserId::new(),
            shares: 0,
        }]);

        assert_eq!(
            SplitCalculator::calculate(money(dec!(300)), UserId::new(), &input, &[]),
            Err(SplitError::ZeroTotalShares)
        );
    }
}
