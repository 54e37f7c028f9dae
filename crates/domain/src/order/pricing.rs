//! Automatic discounts and the allowed order total range.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::{Money, OrderError};

/// Bounds an order total must fall within at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceRange {
    pub min: Decimal,
    pub max: Decimal,
}

impl PriceRange {
    pub fn check(&self, total: &Money) -> Result<(), OrderError> {
        let amount = total.amount();
        if amount < self.min || amount > self.max {
            return Err(OrderError::TotalOutOfRange {
                total: total.clone(),
                min: self.min,
                max: self.max,
            });
        }
        Ok(())
    }

    /// The error for a total that overflowed while being summed.
    pub fn overflowed(&self, sample: &Money) -> OrderError {
        OrderError::TotalOutOfRange {
            total: sample.saturated(),
            min: self.min,
            max: self.max,
        }
    }
}

impl Default for PriceRange {
    fn default() -> Self {
        Self {
            min: dec!(0.01),
            max: dec!(10000.00),
        }
    }
}

/// Discount applied once when an order is created.
///
/// Rates are additive and capped; the result depends only on the order
/// total and item count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscountPolicy {
    /// Total from which the large-order rate applies.
    pub vip_threshold: Decimal,
    pub vip_rate: Decimal,

    /// Item count (sum of quantities) from which the bulk rate applies.
    pub bulk_quantity: u64,
    pub bulk_rate: Decimal,

    pub max_rate: Decimal,

    pub price_range: PriceRange,
}

impl DiscountPolicy {
    /// A policy that never discounts, keeping the default price range.
    pub fn none() -> Self {
        Self {
            vip_rate: Decimal::ZERO,
            bulk_rate: Decimal::ZERO,
            ..Self::default()
        }
    }

    /// Rate in `[0, max_rate]` for an order with this total and item count.
    pub fn rate_for(&self, total: &Money, total_quantity: u64) -> Decimal {
        let mut rate = Decimal::ZERO;
        if total.amount() >= self.vip_threshold {
            rate += self.vip_rate;
        }
        if total_quantity >= self.bulk_quantity {
            rate += self.bulk_rate;
        }
        rate.min(self.max_rate)
    }
}

impl Default for DiscountPolicy {
    fn default() -> Self {
        Self {
            vip_threshold: dec!(1000),
            vip_rate: dec!(0.10),
            bulk_quantity: 10,
            bulk_rate: dec!(0.05),
            max_rate: dec!(0.15),
            price_range: PriceRange::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usd(amount: Decimal) -> Money {
        Money::usd(amount).unwrap()
    }

    #[test]
    fn small_order_gets_no_discount() {
        let policy = DiscountPolicy::default();
        assert_eq!(policy.rate_for(&usd(dec!(200)), 2), Decimal::ZERO);
    }

    #[test]
    fn large_order_gets_vip_rate() {
        let policy = DiscountPolicy::default();
        assert_eq!(policy.rate_for(&usd(dec!(1000)), 1), dec!(0.10));
        assert_eq!(policy.rate_for(&usd(dec!(999.99)), 1), Decimal::ZERO);
    }

    #[test]
    fn bulk_order_gets_bulk_rate() {
        let policy = DiscountPolicy::default();
        assert_eq!(policy.rate_for(&usd(dec!(50)), 10), dec!(0.05));
        assert_eq!(policy.rate_for(&usd(dec!(50)), 9), Decimal::ZERO);
    }

    #[test]
    fn rates_add_up_to_the_cap() {
        let policy = DiscountPolicy::default();
        assert_eq!(policy.rate_for(&usd(dec!(1200)), 11), dec!(0.15));

        let generous = DiscountPolicy {
            vip_rate: dec!(0.5),
            ..DiscountPolicy::default()
        };
        assert_eq!(generous.rate_for(&usd(dec!(1200)), 11), dec!(0.15));
    }

    #[test]
    fn none_policy_never_discounts() {
        assert_eq!(
            DiscountPolicy::none().rate_for(&usd(dec!(5000)), 100),
            Decimal::ZERO
        );
    }

    #[test]
    fn price_range_bounds_are_inclusive() {
        let range = PriceRange::default();
        assert!(range.check(&usd(dec!(0.01))).is_ok());
        assert!(range.check(&usd(dec!(10000.00))).is_ok());
        assert!(matches!(
            range.check(&usd(dec!(10000.01))),
            Err(OrderError::TotalOutOfRange { .. })
        ));
        assert!(range.check(&usd(Decimal::ZERO)).is_err());
    }
}
