//! Cent distribution using the Largest Remainder Method.
//!
//! Splitting a total proportionally rarely lands on whole cents. Rounding
//! every part independently can leave the parts a few cents away from the
//! total, which the allocation validator would then reject. Instead:
//! 1. Calculate exact parts
//! 2. Truncate each part to whole cents
//! 3. Calculate the remainder (total - sum of truncated parts)
//! 4. Hand remainder cents to the parts with the largest truncated fractions
//!
//! When the weights describe the whole total (percentages summing to 100,
//! shares divided by their own sum) the parts sum EXACTLY to the total.
//! When they do not, the shortfall or excess survives untouched so the sum
//! check can report it.

use rust_decimal::prelude::*;
use tally_shared::types::Money;
use tally_shared::types::money::MONEY_SCALE;

/// Distributes `total` proportionally to `weights / denominator`.
///
/// Ties in the fractional remainder go to the earlier participant.
/// A zero denominator yields all-zero parts.
///
/// # Example
///
/// ```
/// use rust_decimal_macros::dec;
/// use tally_core::split::allocate_proportional;
/// use tally_shared::types::Money;
///
/// // 100.00 split 3:2:1 -> [50.00, 33.33, 16.67]
/// let parts = allocate_proportional(
///     Money::new(dec!(100)),
///     &[dec!(3), dec!(2), dec!(1)],
///     dec!(6),
/// );
/// assert_eq!(parts.iter().sum::<Money>(), Money::new(dec!(100)));
/// ```
#[must_use]
pub fn allocate_proportional(total: Money, weights: &[Decimal], denominator: Decimal) -> Vec<Money> {
    if weights.is_empty() {
        return vec![];
    }
    if denominator.is_zero() {
        return vec![Money::ZERO; weights.len()];
    }

    let unit = Decimal::new(1, MONEY_SCALE);
    let total = total.round_cents().amount();

    let exact: Vec<Decimal> = weights.iter().map(|w| total * *w / denominator).collect();

    let mut truncated: Vec<Decimal> = exact
        .iter()
        .map(|a| a.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::ToZero))
        .collect();

    let remainder = total - truncated.iter().copied().sum::<Decimal>();

    // Negative remainders (weights over 100%) are left for the validator.
    let units_to_distribute = (remainder / unit)
        .round_dp_with_strategy(0, RoundingStrategy::ToZero)
        .to_u64()
        .and_then(|u| usize::try_from(u).ok())
        .unwrap_or(0);

    if units_to_distribute > 0 {
        let mut order: Vec<(usize, Decimal)> = exact
            .iter()
            .zip(truncated.iter())
            .enumerate()
            .map(|(i, (e, t))| (i, *e - *t))
            .collect();

        // Stable: equal fractions keep participant order.
        order.sort_by(|a, b| b.1.cmp(&a.1));

        for (idx, _) in order.iter().take(units_to_distribute) {
            truncated[*idx] += unit;
        }
    }

    truncated.into_iter().map(Money::new).collect()
}

/// Distributes `total` equally across `count` participants.
///
/// The first participants absorb any leftover cents.
#[must_use]
pub fn allocate_equal(total: Money, count: usize) -> Vec<Money> {
    let weights = vec![Decimal::ONE; count];
    allocate_proportional(total, &weights, Decimal::from(count))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn money(d: Decimal) -> Money {
        Money::new(d)
    }

    #[test]
    fn test_allocate_equal_empty() {
        assert!(allocate_equal(money(dec!(100)), 0).is_empty());
    }

    #[test]
    fn test_allocate_equal_single() {
        assert_eq!(allocate_equal(money(dec!(100)), 1), vec![money(dec!(100))]);
    }

    #[test]
    fn test_allocate_equal_three_ways() {
        let result = allocate_equal(money(dec!(100)), 3);
        assert_eq!(
            result,
            vec![money(dec!(33.34)), money(dec!(33.33)), money(dec!(33.33))]
        );
        assert_eq!(result.iter().sum::<Money>(), money(dec!(100)));
    }

    #[test]
    fn test_allocate_equal_exact() {
        let result = allocate_equal(money(dec!(100)), 2);
        assert_eq!(result, vec![money(dec!(50)), money(dec!(50))]);
    }

    #[test]
    fn test_allocate_percentages_exact_sum() {
        let result = allocate_proportional(
            money(dec!(10.00)),
            &[dec!(33.33), dec!(33.33), dec!(33.34)],
            dec!(100),
        );
        assert_eq!(result.iter().sum::<Money>(), money(dec!(10.00)));
    }

    #[test]
    fn test_allocate_percentages_under_100_keeps_shortfall() {
        let result = allocate_proportional(money(dec!(100)), &[dec!(50), dec!(40)], dec!(100));
        assert_eq!(result, vec![money(dec!(50)), money(dec!(40))]);
    }

    #[test]
    fn test_allocate_percentages_over_100_keeps_excess() {
        let result = allocate_proportional(money(dec!(100)), &[dec!(60), dec!(50)], dec!(100));
        assert_eq!(result.iter().sum::<Money>(), money(dec!(110)));
    }

    #[test]
    fn test_allocate_shares() {
        let result = allocate_proportional(money(dec!(300)), &[dec!(3), dec!(2)], dec!(5));
        assert_eq!(result, vec![money(dec!(180)), money(dec!(120))]);
    }

    #[test]
    fn test_allocate_largest_fraction_wins() {
        // 10.00 * 1/7 = 1.428.., 10.00 * 6/7 = 8.571..
        let result = allocate_proportional(money(dec!(10)), &[dec!(1), dec!(6)], dec!(7));
        assert_eq!(result, vec![money(dec!(1.43)), money(dec!(8.57))]);
    }

    #[test]
    fn test_allocate_zero_denominator() {
        let result = allocate_proportional(money(dec!(10)), &[dec!(0), dec!(0)], dec!(0));
        assert_eq!(result, vec![Money::ZERO, Money::ZERO]);
    }
}
