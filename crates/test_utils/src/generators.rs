//! Property-Based Test Generators
//!
//! Proptest strategies for readings, amounts and phone spellings, plus
//! `fake`-backed random customers.

use fake::faker::name::en::Name;
use fake::Fake;
use proptest::prelude::*;
use rust_decimal::Decimal;

use core_kernel::Money;
use domain_billing::{Customer, RateTier};

use crate::fixtures::DateFixtures;

/// Strategy for positive peso amounts with centavos
pub fn positive_money_strategy() -> impl Strategy<Value = Money> {
    (1i64..10_000_000i64).prop_map(|centavos| Money::new(Decimal::new(centavos, 2)))
}

/// Strategy for non-negative peso amounts, zero included
pub fn balance_strategy() -> impl Strategy<Value = Money> {
    (0i64..10_000_000i64).prop_map(|centavos| Money::new(Decimal::new(centavos, 2)))
}

/// Strategy for consumption in cubic meters with up to two decimals
pub fn consumption_strategy() -> impl Strategy<Value = Decimal> {
    (0i64..50_000i64).prop_map(|hundredths| Decimal::new(hundredths, 2))
}

/// Strategy for (previous, current) meter readings with current >= previous
pub fn reading_pair_strategy() -> impl Strategy<Value = (Decimal, Decimal)> {
    (0i64..1_000_000i64, 0i64..50_000i64).prop_map(|(previous, delta)| {
        let previous = Decimal::new(previous, 2);
        (previous, previous + Decimal::new(delta, 2))
    })
}

/// Strategy for a discount percentage between 0 and 100
pub fn discount_percent_strategy() -> impl Strategy<Value = Decimal> {
    (0u32..=10_000u32).prop_map(|n| Decimal::new(n as i64, 2))
}

/// Strategy for days overdue, up to about three years
pub fn days_overdue_strategy() -> impl Strategy<Value = i64> {
    0i64..1_100i64
}

/// Strategy for a nine-digit mobile subscriber number, without prefix
pub fn subscriber_digits_strategy() -> impl Strategy<Value = String> {
    "[0-9]{9}"
}

/// Strategy for the local spellings of one mobile number
///
/// Yields `(spelling, normalized)` pairs.
pub fn phone_spelling_strategy() -> impl Strategy<Value = (String, String)> {
    (subscriber_digits_strategy(), 0usize..5).prop_map(|(rest, form)| {
        let normalized = format!("639{}", rest);
        let spelling = match form {
            0 => format!("09{}", rest),
            1 => format!("+639{}", rest),
            2 => format!("9{}", rest),
            3 => format!("0{} {} {}", &normalized[2..5], &rest[2..5], &rest[5..]),
            _ => normalized.clone(),
        };
        (spelling, normalized)
    })
}

/// Strategy for a contiguous tier schedule over whole-unit bounds
///
/// Tiers are `[0, b1]`, `[b1 + 1, b2]`, ... with an unbounded top tier.
pub fn tier_schedule_strategy() -> impl Strategy<Value = Vec<RateTier>> {
    proptest::collection::vec((1i64..50i64, 1i64..100i64), 1..5).prop_map(|steps| {
        let mut tiers = Vec::with_capacity(steps.len() + 1);
        let mut min = Decimal::ZERO;
        for (width, rate) in &steps {
            let max = min + Decimal::from(*width);
            tiers.push(RateTier::per_unit(min, Some(max), Decimal::from(*rate)));
            min = max + Decimal::ONE;
        }
        let top_rate = steps.last().map(|(_, rate)| *rate).unwrap_or(1);
        tiers.push(RateTier::per_unit(min, None, Decimal::from(top_rate)));
        tiers
    })
}

/// A random adult customer with a valid mobile number
pub fn fake_customer() -> Customer {
    let name: String = Name().fake();
    let account: u32 = (1_000..99_999).fake();
    let subscriber: u64 = (100_000_000u64..1_000_000_000u64).fake();
    let age: i32 = (18..59).fake();

    Customer::new(format!("ACC-{:05}", account), name)
        .with_phone(format!("639{}", subscriber))
        .with_birthdate(DateFixtures::birthdate_for_age(age))
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain_billing::RateSchedule;

    #[test]
    fn test_fake_customer_is_not_senior() {
        for _ in 0..20 {
            let customer = fake_customer();
            assert_eq!(customer.phone.as_ref().map(String::len), Some(12));
            assert!(!customer.is_senior_on(DateFixtures::billing_date()));
        }
    }

    proptest! {
        #[test]
        fn generated_schedules_are_valid(tiers in tier_schedule_strategy()) {
            prop_assert!(RateSchedule::new(tiers).is_ok());
        }

        #[test]
        fn readings_never_run_backwards((previous, current) in reading_pair_strategy()) {
            prop_assert!(current >= previous);
        }
    }
}
