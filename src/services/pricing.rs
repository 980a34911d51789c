//! Order totals and processor fee arithmetic.

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;

/// Flat sales tax applied to every order subtotal.
pub const TAX_RATE: Decimal = dec!(0.085);

/// Card processor percentage fee.
pub const PROCESSOR_FEE_RATE: Decimal = dec!(0.029);

/// Card processor fixed fee per transaction.
pub const PROCESSOR_FEE_FIXED: Decimal = dec!(0.30);

/// Rounds to cents, half away from zero. The result always carries two
/// decimal places so `10` serializes as `"10.00"`.
pub fn round_currency(value: Decimal) -> Decimal {
    let mut rounded = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(2);
    rounded
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderTotals {
    pub subtotal: Decimal,
    pub tax_amount: Decimal,
    pub shipping_cost: Decimal,
    pub total_amount: Decimal,
}

impl OrderTotals {
    /// `lines` are `(unit_price, quantity)` pairs.
    pub fn compute<I>(lines: I, shipping_cost: Decimal, is_pickup: bool) -> Self
    where
        I: IntoIterator<Item = (Decimal, i32)>,
    {
        let subtotal: Decimal = lines
            .into_iter()
            .map(|(price, quantity)| price * Decimal::from(quantity))
            .sum();
        let subtotal = round_currency(subtotal);
        let tax_amount = round_currency(subtotal * TAX_RATE);
        let shipping_cost = if is_pickup {
            Decimal::ZERO
        } else {
            round_currency(shipping_cost)
        };

        Self {
            subtotal,
            tax_amount,
            shipping_cost,
            total_amount: subtotal + tax_amount + shipping_cost,
        }
    }
}

/// Fee charged by the processor for a single transaction of `amount`.
pub fn processor_fee(amount: Decimal) -> Decimal {
    amount * PROCESSOR_FEE_RATE + PROCESSOR_FEE_FIXED
}

/// Fees across a set of transactions, rounded once at the end.
pub fn total_processor_fees<I>(amounts: I) -> Decimal
where
    I: IntoIterator<Item = Decimal>,
{
    round_currency(amounts.into_iter().map(processor_fee).sum())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn two_ten_dollar_items_with_shipping() {
        let totals = OrderTotals::compute([(dec!(10.00), 2)], dec!(5.99), false);
        assert_eq!(totals.subtotal, dec!(20.00));
        assert_eq!(totals.tax_amount, dec!(1.70));
        assert_eq!(totals.shipping_cost, dec!(5.99));
        assert_eq!(totals.total_amount, dec!(27.69));
    }

    #[test]
    fn pickup_ignores_requested_shipping() {
        let totals = OrderTotals::compute([(dec!(12.50), 1)], dec!(9.99), true);
        assert_eq!(totals.shipping_cost, Decimal::ZERO);
        assert_eq!(totals.total_amount, dec!(13.56));
    }

    #[test]
    fn tax_rounds_half_away_from_zero() {
        // 0.10 * 0.085 = 0.0085 -> 0.01
        let totals = OrderTotals::compute([(dec!(0.10), 1)], Decimal::ZERO, false);
        assert_eq!(totals.tax_amount, dec!(0.01));
        // 1.00 * 0.085 = 0.085 -> 0.09
        let totals = OrderTotals::compute([(dec!(1.00), 1)], Decimal::ZERO, false);
        assert_eq!(totals.tax_amount, dec!(0.09));
    }

    #[test]
    fn fees_include_fixed_component_per_transaction() {
        assert_eq!(processor_fee(dec!(100)), dec!(3.20));
        assert_eq!(total_processor_fees([dec!(100), dec!(27.69)]), dec!(4.30));
        assert_eq!(total_processor_fees(Vec::new()), Decimal::ZERO);
    }

    proptest! {
        #[test]
        fn total_is_sum_of_parts(
            cents in proptest::collection::vec((1i64..100_000, 1i32..20), 1..6),
            shipping_cents in 0i64..5_000,
            pickup in any::<bool>(),
        ) {
            let lines: Vec<(Decimal, i32)> = cents
                .iter()
                .map(|(c, q)| (Decimal::new(*c, 2), *q))
                .collect();
            let totals = OrderTotals::compute(lines.clone(), Decimal::new(shipping_cents, 2), pickup);

            let expected_subtotal: Decimal = lines.iter().map(|(p, q)| *p * Decimal::from(*q)).sum();
            prop_assert_eq!(totals.subtotal, expected_subtotal);
            prop_assert_eq!(totals.tax_amount, round_currency(expected_subtotal * TAX_RATE));
            prop_assert_eq!(totals.total_amount, totals.subtotal + totals.tax_amount + totals.shipping_cost);
            if pickup {
                prop_assert_eq!(totals.shipping_cost, Decimal::ZERO);
            }
        }
    }
}
