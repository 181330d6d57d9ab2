//! Gross bill amount from meter readings

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::warn;

use core_kernel::{age_on, Money, Rate};

use crate::customer::SENIOR_CITIZEN_AGE;
use crate::error::{BillingError, BillingResult};
use crate::rate_schedule::{Charge, ChargeBasis, RateSchedule};
use crate::settings::BillingSettings;

/// Per-cubic-meter rate used when the schedule cannot price a consumption
pub const FLAT_FALLBACK_RATE: Decimal = dec!(30);

/// Largest meter reading accepted, nine digits
pub const MAX_METER_READING: Decimal = dec!(999999999);

/// Breakdown of a computed gross amount
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrossAmount {
    pub consumption: Decimal,
    /// Schedule charge before discount, rounded to centavos
    pub base_charge: Money,
    pub discount: Money,
    pub gross_amount: Money,
    pub senior_discount_applied: bool,
    pub basis: ChargeBasis,
}

/// Turns readings into a gross amount under one rate schedule
#[derive(Debug, Clone)]
pub struct BillingCalculator {
    schedule: RateSchedule,
    senior_discount: Rate,
}

impl BillingCalculator {
    pub fn new(schedule: RateSchedule, senior_discount: Rate) -> Self {
        Self {
            schedule,
            senior_discount,
        }
    }

    pub fn from_settings(settings: &BillingSettings) -> Self {
        Self::new(settings.rate_schedule.clone(), settings.senior_discount)
    }

    /// `current - previous`, rejecting negative, oversized or decreasing readings
    pub fn consumption(previous: Decimal, current: Decimal) -> BillingResult<Decimal> {
        if previous.is_sign_negative() && !previous.is_zero()
            || current.is_sign_negative() && !current.is_zero()
        {
            return Err(BillingError::InvalidInput(format!(
                "meter readings must be non-negative, got {} and {}",
                previous, current
            )));
        }
        if previous > MAX_METER_READING || current > MAX_METER_READING {
            return Err(BillingError::InvalidInput(format!(
                "meter readings cannot exceed {}, got {} and {}",
                MAX_METER_READING, previous, current
            )));
        }
        if current < previous {
            return Err(BillingError::InvalidReading { previous, current });
        }
        Ok(current - previous)
    }

    /// Schedule charge for `consumption`, degrading to the flat rate on failure
    pub fn base_charge(&self, consumption: Decimal) -> Charge {
        match self.schedule.resolve(consumption) {
            Ok(charge) => charge,
            Err(e) => {
                warn!(
                    consumption = %consumption,
                    error = %e,
                    "rate resolution failed, using flat fallback rate"
                );
                Charge {
                    amount: Money::new(consumption * FLAT_FALLBACK_RATE),
                    basis: ChargeBasis::FlatFallback,
                }
            }
        }
    }

    /// Gross amount for a reading pair, applying the senior discount when
    /// the customer is at least 60 on the billing date
    pub fn compute_gross_amount(
        &self,
        previous: Decimal,
        current: Decimal,
        birthdate: Option<NaiveDate>,
        billing_date: NaiveDate,
    ) -> BillingResult<GrossAmount> {
        let consumption = Self::consumption(previous, current)?;
        let charge = self.base_charge(consumption);
        let base_charge = charge.amount.round_to_currency();

        let senior = birthdate.is_some_and(|b| age_on(b, billing_date) >= SENIOR_CITIZEN_AGE);
        let gross_amount = if senior {
            charge
                .amount
                .multiply(self.senior_discount.complement())
                .round_to_currency()
        } else {
            base_charge
        };

        Ok(GrossAmount {
            consumption,
            base_charge,
            discount: base_charge - gross_amount,
            gross_amount,
            senior_discount_applied: senior,
            basis: charge.basis,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rate_schedule::RateTier;

    fn reference() -> BillingCalculator {
        BillingCalculator::new(RateSchedule::reference(), Rate::from_percentage(dec!(5)))
    }

    fn billing_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
    }

    #[test]
    fn test_reference_bill_without_discount() {
        let gross = reference()
            .compute_gross_amount(dec!(10), dec!(30), None, billing_date())
            .unwrap();
        assert_eq!(gross.consumption, dec!(20));
        assert_eq!(gross.gross_amount, Money::new(dec!(547)));
        assert!(!gross.senior_discount_applied);
    }

    #[test]
    fn test_senior_discount() {
        let birthdate = NaiveDate::from_ymd_opt(1959, 1, 1).unwrap();
        let gross = reference()
            .compute_gross_amount(dec!(10), dec!(30), Some(birthdate), billing_date())
            .unwrap();
        assert_eq!(gross.gross_amount, Money::new(dec!(519.65)));
        assert_eq!(gross.discount, Money::new(dec!(27.35)));
        assert!(gross.senior_discount_applied);
    }

    #[test]
    fn test_decreasing_reading_rejected() {
        let err = reference()
            .compute_gross_amount(dec!(30), dec!(10), None, billing_date())
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_READING");
    }

    #[test]
    fn test_negative_reading_rejected() {
        let err = reference()
            .compute_gross_amount(dec!(-1), dec!(10), None, billing_date())
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_INPUT");
    }

    #[test]
    fn test_oversized_reading_rejected() {
        let err = reference()
            .compute_gross_amount(dec!(0), dec!(50000000000000000000000000000), None, billing_date())
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_INPUT");

        let gross = reference()
            .compute_gross_amount(dec!(0), MAX_METER_READING, None, billing_date())
            .unwrap();
        assert_eq!(gross.basis, ChargeBasis::ReferenceExcess);
    }

    #[test]
    fn test_unpriceable_consumption_degrades_to_flat_rate() {
        let schedule = RateSchedule::new(vec![RateTier::per_unit(dec!(0), Some(dec!(10)), dec!(25))]).unwrap();
        let calculator = BillingCalculator::new(schedule, Rate::from_percentage(dec!(5)));

        let gross = calculator
            .compute_gross_amount(dec!(0), dec!(15), None, billing_date())
            .unwrap();
        assert_eq!(gross.basis, ChargeBasis::FlatFallback);
        assert_eq!(gross.gross_amount, Money::new(dec!(450)));
    }
}
