//! Pre-built Test Fixtures
//!
//! Fixed, predictable data for the billing scenarios the suite keeps coming
//! back to: the 10 → 30 reading, the 547.00 reference bill, the 65-year-old
//! senior and the 1000.00 bill that is 45 days late.

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};
use once_cell::sync::Lazy;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use core_kernel::{Actor, CustomerId, Money, Role};
use domain_billing::{Customer, NewBill, RateTier};

/// Fixture for Money test data
pub struct MoneyFixtures;

impl MoneyFixtures {
    /// Reference table charge for 20 units
    pub fn reference_bill() -> Money {
        Money::new(dec!(547.00))
    }

    /// The reference bill after the 5% senior discount
    pub fn senior_bill() -> Money {
        Money::new(dec!(519.65))
    }

    /// Base amount for the overdue scenarios
    pub fn overdue_base() -> Money {
        Money::new(dec!(1000.00))
    }

    /// Penalty on [`MoneyFixtures::overdue_base`] at 45 days with no fee
    pub fn overdue_penalty_45_days() -> Money {
        Money::new(dec!(120.00))
    }

    pub fn partial_credit() -> Money {
        Money::new(dec!(300.00))
    }

    pub fn flat_fee() -> Money {
        Money::new(dec!(50.00))
    }
}

/// Fixture for dates used by billing scenarios
pub struct DateFixtures;

impl DateFixtures {
    pub fn billing_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
    }

    pub fn due_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()
    }

    /// `days` after [`DateFixtures::due_date`]
    pub fn days_past_due(days: i64) -> NaiveDate {
        Self::due_date() + Duration::days(days)
    }

    /// Birthdate that makes a customer `age` years old on the billing date
    pub fn birthdate_for_age(age: i32) -> NaiveDate {
        let billing = Self::billing_date();
        NaiveDate::from_ymd_opt(billing.year() - age, billing.month(), billing.day()).unwrap()
    }

    /// A fixed instant for passcode tests
    pub fn passcode_issued_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
    }
}

/// Fixture for string values
pub struct StringFixtures;

impl StringFixtures {
    pub fn account_number() -> &'static str {
        "ACC-0001"
    }

    pub fn customer_name() -> &'static str {
        "Juan dela Cruz"
    }

    /// Normalized mobile number
    pub fn phone() -> &'static str {
        "639171234567"
    }

    /// The same number in local spelling
    pub fn local_phone() -> &'static str {
        "0917 123 4567"
    }

    pub fn meter_number() -> &'static str {
        "MTR-0042"
    }

    pub fn receipt_number() -> &'static str {
        "OR-000123"
    }
}

/// Fixture for the people who operate the system
pub struct ActorFixtures;

impl ActorFixtures {
    pub fn admin() -> Actor {
        Actor::new("admin-1", Role::Admin)
    }

    pub fn cashier() -> Actor {
        Actor::new("cashier-1", Role::Cashier)
    }

    pub fn encoder() -> Actor {
        Actor::new("encoder-1", Role::Encoder)
    }

    pub fn resident() -> Actor {
        Actor::new("resident-1", Role::Customer)
    }

    pub fn system() -> Actor {
        Actor::system()
    }
}

/// Fixture for customers
pub struct CustomerFixtures;

impl CustomerFixtures {
    /// Adult customer with a phone and no credit
    pub fn regular() -> Customer {
        Customer::new(StringFixtures::account_number(), StringFixtures::customer_name())
            .with_phone(StringFixtures::phone())
            .with_birthdate(DateFixtures::birthdate_for_age(40))
    }

    /// 65 years old on the billing date
    pub fn senior() -> Customer {
        Customer::new("ACC-0002", "Lola Remedios")
            .with_phone("639181234567")
            .with_birthdate(DateFixtures::birthdate_for_age(65))
    }

    /// Customer whose cached balance is `balance`
    ///
    /// Stores seed an opening ledger entry for a positive balance.
    pub fn with_credit(balance: Decimal) -> Customer {
        let mut customer = Self::regular();
        customer.credit_balance = Money::new(balance);
        customer
    }
}

/// Fixture for meter readings
pub struct ReadingFixtures;

impl ReadingFixtures {
    /// Readings 10 → 30 billed on March 1, due March 15
    pub fn march(customer_id: CustomerId) -> NewBill {
        NewBill {
            customer_id,
            meter_number: StringFixtures::meter_number().to_string(),
            previous_reading: dec!(10),
            current_reading: dec!(30),
            due_date: DateFixtures::due_date(),
            billing_date: Some(DateFixtures::billing_date()),
        }
    }
}

/// A four-tier schedule: 0-10 flat 250, 11-20 at 28, 21-100 at 32, 101+ at 40
pub static STANDARD_TIERS: Lazy<Vec<RateTier>> = Lazy::new(|| {
    vec![
        RateTier::fixed(dec!(0), Some(dec!(10)), dec!(250)),
        RateTier::per_unit(dec!(11), Some(dec!(20)), dec!(28)),
        RateTier::per_unit(dec!(21), Some(dec!(100)), dec!(32)),
        RateTier::per_unit(dec!(101), None, dec!(40)),
    ]
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_senior_is_sixty_five_on_billing_date() {
        let senior = CustomerFixtures::senior();
        assert_eq!(senior.age_on(DateFixtures::billing_date()), Some(65));
    }

    #[test]
    fn test_days_past_due() {
        assert_eq!(
            DateFixtures::days_past_due(45),
            NaiveDate::from_ymd_opt(2024, 4, 29).unwrap()
        );
    }
}
