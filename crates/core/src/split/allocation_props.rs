//! Property-based tests for split allocation.
//!
//! - Equal split: paid sums to the total, the payer owes nothing, everyone
//!   else owes total / n within one cent
//! - Percentage split: percentages summing to 100 always validate
//! - Percentage split: percentages not summing to 100 never validate
//! - Shares split: paid sums exactly to the total
//! - Any whole-cent storable total either allocates or fails with an error

use proptest::prelude::*;
use rust_decimal::Decimal;
use tally_shared::types::{Money, UserId};

use super::calculator::SplitCalculator;
use super::error::SplitError;
use super::types::{PercentageShare, ShareCount, SplitInput};
use super::validation::AllocationValidator;

/// Strategy to generate positive amounts (0.01 to 1,000,000.00).
fn positive_amount() -> impl Strategy<Value = Money> {
    (1i64..100_000_000i64).prop_map(Money::from_cents)
}

/// Strategy to generate whole-number percentages summing to 100.
fn percentages_summing_to_100() -> impl Strategy<Value = Vec<Decimal>> {
    prop::collection::vec(1u32..100, 1..10).prop_map(|values| {
        let sum: u32 = values.iter().sum();
        let mut scaled: Vec<u32> = values.iter().map(|v| v * 100 / sum).collect();
        let assigned: u32 = scaled.iter().sum();
        scaled[0] += 100 - assigned;
        scaled.into_iter().map(Decimal::from).collect()
    })
}

fn percentage_input(percentages: &[Decimal]) -> SplitInput {
    SplitInput::Percentage(
        percentages
            .iter()
            .map(|p| PercentageShare {
                user_id: UserId::new(),
                percentage: *p,
            })
            .collect(),
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_equal_split_invariants(total in positive_amount(), others in 1usize..20) {
        let payer = UserId::new();
        let mut members: Vec<UserId> = (0..others).map(|_| UserId::new()).collect();
        members.insert(0, payer);

        let allocs = SplitCalculator::calculate(
            total,
            payer,
            &SplitInput::Equally,
            &members,
        ).unwrap();

        prop_assert!(AllocationValidator::validate(&allocs, total).is_ok());

        let per_head = Money::new(total.amount() / Decimal::from(members.len()));
        for a in &allocs {
            if a.user_id == payer {
                prop_assert_eq!(a.amount_owed, Money::ZERO);
                prop_assert_eq!(a.amount_paid, total);
            } else {
                prop_assert!(a.amount_owed.approx_eq(per_head));
            }
        }
    }

    #[test]
    fn prop_percentages_summing_to_100_validate(
        total in positive_amount(),
        percentages in percentages_summing_to_100(),
    ) {
        let allocs = SplitCalculator::calculate(total, UserId::new(), &percentage_input(&percentages), &[]).unwrap();
        let paid: Money = allocs.iter().map(|a| a.amount_paid).sum();
        prop_assert_eq!(paid, total);
        prop_assert!(AllocationValidator::validate(&allocs, total).is_ok());
    }

    #[test]
    fn prop_percentages_off_100_mismatch(
        total in (1_000i64..100_000_000i64).prop_map(Money::from_cents),
        first in 1u32..99,
        delta in prop_oneof![-50i32..-1, 1i32..50],
    ) {
        // Two participants, summing to 100 + delta.
        let second = i64::from(100 - first) + i64::from(delta);
        prop_assume!((0..=100).contains(&second));
        let percentages = vec![Decimal::from(first), Decimal::from(second)];

        let allocs = SplitCalculator::calculate(total, UserId::new(), &percentage_input(&percentages), &[]).unwrap();
        let result = AllocationValidator::validate(&allocs, total);
        prop_assert!(
            matches!(
                result,
                Err(SplitError::AmountMismatch { .. } | SplitError::NegativeAmount { .. })
            ),
            "expected rejection, got {:?}",
            result
        );
    }

    #[test]
    fn prop_arbitrary_percentages_never_panic(
        total in (1i64..i64::MAX).prop_map(Money::from_cents),
        raw in prop::collection::vec(any::<(i64, u32)>(), 1..5),
    ) {
        let percentages: Vec<Decimal> = raw
            .iter()
            .map(|(mantissa, scale)| Decimal::new(*mantissa, scale % 29))
            .collect();

        let result = SplitCalculator::calculate(total, UserId::new(), &percentage_input(&percentages), &[])
            .and_then(|allocs| AllocationValidator::validate(&allocs, total));
        if percentages.iter().any(|p| *p > Decimal::ONE_HUNDRED || *p < Decimal::ZERO) {
            prop_assert!(result.is_err());
        }
    }

    #[test]
    fn prop_shares_sum_exactly(
        total in positive_amount(),
        shares in prop::collection::vec(0u32..50, 1..10),
    ) {
        prop_assume!(shares.iter().any(|s| *s > 0));
        let input = SplitInput::Shares(
            shares
                .iter()
                .map(|s| ShareCount { user_id: UserId::new(), shares: *s })
                .collect(),
        );

        let allocs = SplitCalculator::calculate(total, UserId::new(), &input, &[]).unwrap();
        let paid: Money = allocs.iter().map(|a| a.amount_paid).sum();
        prop_assert_eq!(paid, total);
    }
}
