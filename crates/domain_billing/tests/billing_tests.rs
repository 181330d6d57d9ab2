//! Tests for rate schedules, the calculator, penalty math and bill status rules

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use core_kernel::{CustomerId, Money, Rate};

use domain_billing::bill::{Bill, BillDraft, BillEvent, BillStatus};
use domain_billing::calculator::BillingCalculator;
use domain_billing::penalty::{calculate_penalty, PenaltySettings};
use domain_billing::rate_schedule::{reference_charge, ChargeBasis, RateSchedule, RateTier};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn five_percent() -> Rate {
    Rate::from_percentage(dec!(5))
}

// ============================================================================
// Rate Schedule Tests
// ============================================================================

mod rate_schedule_tests {
    use super::*;

    fn tiered() -> RateSchedule {
        RateSchedule::new(vec![
            RateTier::per_unit(dec!(11), Some(dec!(20)), dec!(28)),
            RateTier::fixed(dec!(0), Some(dec!(10)), dec!(250)),
            RateTier::per_unit(dec!(21), Some(dec!(100)), dec!(32)),
            RateTier::per_unit(dec!(101), None, dec!(40)),
        ])
        .unwrap()
    }

    #[test]
    fn test_tiers_are_sorted() {
        let schedule = tiered();
        let mins: Vec<Decimal> = schedule.tiers().iter().map(|t| t.consumption_min).collect();
        assert_eq!(mins, vec![dec!(0), dec!(11), dec!(21), dec!(101)]);
    }

    #[test]
    fn test_fixed_tier() {
        let charge = tiered().resolve(dec!(7)).unwrap();
        assert_eq!(charge.amount, Money::new(dec!(250)));
        assert_eq!(charge.basis, ChargeBasis::Tier);
    }

    #[test]
    fn test_per_unit_tier() {
        let charge = tiered().resolve(dec!(15)).unwrap();
        assert_eq!(charge.amount, Money::new(dec!(420)));
    }

    #[test]
    fn test_unbounded_tier_matches_first() {
        let charge = tiered().resolve(dec!(150)).unwrap();
        assert_eq!(charge.amount, Money::new(dec!(6000)));
        assert_eq!(charge.basis, ChargeBasis::Tier);
    }

    #[test]
    fn test_gap_above_ceiling_uses_excess_rule() {
        // 100.5 falls between the 21-100 tier and the 101+ tier
        let charge = tiered().resolve(dec!(100.5)).unwrap();
        assert_eq!(charge.basis, ChargeBasis::TierExcess);
        assert_eq!(charge.amount, Money::new(dec!(3255)));
    }

    #[test]
    fn test_excess_base_from_fixed_tier_at_ceiling() {
        let schedule = RateSchedule::new(vec![
            RateTier::per_unit(dec!(0), Some(dec!(40)), dec!(30)),
            RateTier::fixed(dec!(50), Some(dec!(50)), dec!(2000)),
            RateTier::per_unit(dec!(60), None, dec!(45)),
        ])
        .unwrap();

        let charge = schedule.resolve(dec!(55)).unwrap();
        assert_eq!(charge.basis, ChargeBasis::TierExcess);
        assert_eq!(charge.amount, Money::new(dec!(2225)));
    }

    #[test]
    fn test_touching_bounds_overlap() {
        let schedule = RateSchedule::new(vec![
            RateTier::per_unit(dec!(61), Some(dec!(70)), dec!(35)),
            RateTier::fixed(dec!(70), None, dec!(2000)),
        ]);
        assert!(schedule.is_err());
    }

    #[test]
    fn test_no_tier_for_gap_below_ceiling() {
        let schedule = RateSchedule::new(vec![
            RateTier::per_unit(dec!(0), Some(dec!(10)), dec!(25)),
            RateTier::per_unit(dec!(20), Some(dec!(30)), dec!(30)),
        ])
        .unwrap();
        assert!(schedule.resolve(dec!(15)).is_err());
    }

    #[test]
    fn test_empty_schedule_is_reference() {
        let schedule = RateSchedule::new(Vec::new()).unwrap();
        assert!(schedule.is_reference());
        assert_eq!(schedule.resolve(dec!(20)).unwrap().amount, Money::new(dec!(547)));
    }

    #[test]
    fn test_negative_consumption_rejected() {
        assert!(RateSchedule::reference().resolve(dec!(-1)).is_err());
    }

    #[test]
    fn test_reference_table_spot_checks() {
        assert_eq!(reference_charge(dec!(0)).amount, Money::ZERO);
        assert_eq!(reference_charge(dec!(35)).amount, Money::new(dec!(1007)));
        assert_eq!(reference_charge(dec!(99.99)).amount, Money::new(dec!(3201)));
        assert_eq!(reference_charge(dec!(101)).amount, Money::new(dec!(3269.45)));
    }
}

// ============================================================================
// Calculator Tests
// ============================================================================

mod calculator_tests {
    use super::*;

    #[test]
    fn test_plain_reference_bill() {
        let calculator = BillingCalculator::new(RateSchedule::reference(), five_percent());
        let gross = calculator
            .compute_gross_amount(dec!(10), dec!(30), None, date(2024, 3, 1))
            .unwrap();

        assert_eq!(gross.gross_amount, Money::new(dec!(547)));
        assert_eq!(gross.discount, Money::ZERO);
    }

    #[test]
    fn test_senior_aged_sixty_five() {
        let calculator = BillingCalculator::new(RateSchedule::reference(), five_percent());
        let gross = calculator
            .compute_gross_amount(dec!(10), dec!(30), Some(date(1959, 1, 15)), date(2024, 3, 1))
            .unwrap();

        assert_eq!(gross.gross_amount, Money::new(dec!(519.65)));
    }

    #[test]
    fn test_sixtieth_birthday_is_discounted() {
        let calculator = BillingCalculator::new(RateSchedule::reference(), five_percent());
        let gross = calculator
            .compute_gross_amount(dec!(10), dec!(30), Some(date(1964, 3, 1)), date(2024, 3, 1))
            .unwrap();

        assert!(gross.senior_discount_applied);
        assert_eq!(gross.gross_amount, Money::new(dec!(519.65)));
    }

    #[test]
    fn test_one_day_short_of_sixty_is_not() {
        let calculator = BillingCalculator::new(RateSchedule::reference(), five_percent());
        let gross = calculator
            .compute_gross_amount(dec!(10), dec!(30), Some(date(1964, 3, 2)), date(2024, 3, 1))
            .unwrap();

        assert!(!gross.senior_discount_applied);
        assert_eq!(gross.gross_amount, Money::new(dec!(547)));
    }

    #[test]
    fn test_configured_discount() {
        let calculator =
            BillingCalculator::new(RateSchedule::reference(), Rate::from_percentage(dec!(20)));
        let gross = calculator
            .compute_gross_amount(dec!(0), dec!(20), Some(date(1950, 1, 1)), date(2024, 3, 1))
            .unwrap();

        assert_eq!(gross.gross_amount, Money::new(dec!(437.60)));
    }

    #[test]
    fn test_equal_readings() {
        let calculator = BillingCalculator::new(RateSchedule::reference(), five_percent());
        let gross = calculator
            .compute_gross_amount(dec!(42), dec!(42), None, date(2024, 3, 1))
            .unwrap();

        assert_eq!(gross.consumption, Decimal::ZERO);
        assert_eq!(gross.gross_amount, Money::ZERO);
    }
}

// ============================================================================
// Penalty Calculation Tests
// ============================================================================

mod penalty_tests {
    use super::*;

    #[test]
    fn test_forty_five_days_on_one_thousand() {
        let assessment = calculate_penalty(
            Money::new(dec!(1000)),
            date(2024, 1, 1),
            date(2024, 2, 15),
            &PenaltySettings::default(),
        );

        assert_eq!(assessment.days_overdue, 45);
        assert_eq!(assessment.penalty_rate, Some(Rate::from_percentage(dec!(12))));
        assert_eq!(assessment.penalty_amount, Money::new(dec!(120)));
        assert!(assessment.has_penalty);
    }

    #[test]
    fn test_flat_fee_ignores_base_and_days() {
        let settings = PenaltySettings {
            grace_period_days: 0,
            late_payment_fee: Some(Money::new(dec!(50))),
        };
        for (base, as_of) in [
            (dec!(100), date(2024, 1, 2)),
            (dec!(25000), date(2025, 1, 1)),
        ] {
            let assessment =
                calculate_penalty(Money::new(base), date(2024, 1, 1), as_of, &settings);
            assert_eq!(assessment.penalty_amount, Money::new(dec!(50)));
        }
    }

    #[test]
    fn test_zero_fee_falls_back_to_percentage() {
        let settings = PenaltySettings {
            grace_period_days: 0,
            late_payment_fee: Some(Money::ZERO),
        };
        let assessment =
            calculate_penalty(Money::new(dec!(500)), date(2024, 1, 1), date(2024, 1, 10), &settings);
        assert_eq!(assessment.penalty_amount, Money::new(dec!(50)));
    }

    #[test]
    fn test_grace_shifts_escalation() {
        let settings = PenaltySettings {
            grace_period_days: 10,
            late_payment_fee: None,
        };
        // 45 days late, 35 effective days
        let assessment =
            calculate_penalty(Money::new(dec!(1000)), date(2024, 1, 1), date(2024, 2, 15), &settings);
        assert_eq!(assessment.penalty_amount, Money::new(dec!(120)));

        // 40 days late, 30 effective days
        let assessment =
            calculate_penalty(Money::new(dec!(1000)), date(2024, 1, 1), date(2024, 2, 10), &settings);
        assert_eq!(assessment.penalty_amount, Money::new(dec!(100)));
    }

    #[test]
    fn test_cap_at_fifty_percent() {
        let assessment = calculate_penalty(
            Money::new(dec!(1000)),
            date(2020, 1, 1),
            date(2024, 1, 1),
            &PenaltySettings::default(),
        );
        assert_eq!(assessment.penalty_amount, Money::new(dec!(500)));
    }

    #[test]
    fn test_rounding_to_centavos() {
        let assessment = calculate_penalty(
            Money::new(dec!(333.33)),
            date(2024, 1, 1),
            date(2024, 1, 5),
            &PenaltySettings::default(),
        );
        assert_eq!(assessment.penalty_amount, Money::new(dec!(33.33)));
    }
}

// ============================================================================
// Bill Status Tests
// ============================================================================

mod bill_status_tests {
    use super::*;

    fn bill(gross: Decimal) -> Bill {
        Bill::issue(
            BillDraft {
                customer_id: CustomerId::new(),
                meter_number: "MTR-7".to_string(),
                previous_reading: dec!(0),
                current_reading: dec!(20),
                consumption: dec!(20),
                gross_amount: Money::new(gross),
                billing_date: date(2024, 3, 1),
                due_date: date(2024, 3, 15),
            },
            Money::ZERO,
        )
    }

    #[test]
    fn test_proof_cycle() {
        let mut bill = bill(dec!(547));
        assert_eq!(bill.transition(BillEvent::ProofSubmitted).unwrap(), BillStatus::Pending);
        assert_eq!(bill.transition(BillEvent::ProofRejected).unwrap(), BillStatus::Rejected);
        assert!(bill.transition(BillEvent::ProofSubmitted).is_err());
        assert_eq!(bill.transition(BillEvent::Resubmitted).unwrap(), BillStatus::Unpaid);
        assert_eq!(bill.transition(BillEvent::ProofSubmitted).unwrap(), BillStatus::Pending);
    }

    #[test]
    fn test_paid_is_terminal() {
        let mut bill = bill(dec!(100));
        bill.apply_payment(Money::new(dec!(100))).unwrap();
        for event in [
            BillEvent::MarkedOverdue,
            BillEvent::PaidInPart,
            BillEvent::ProofSubmitted,
            BillEvent::ProofRejected,
            BillEvent::Resubmitted,
        ] {
            assert!(bill.status.next(event).is_err());
        }
    }

    #[test]
    fn test_partial_payments_accumulate() {
        let mut bill = bill(dec!(547));
        bill.apply_payment(Money::new(dec!(200))).unwrap();
        bill.apply_payment(Money::new(dec!(200))).unwrap();
        assert_eq!(bill.status, BillStatus::PartiallyPaid);
        assert_eq!(bill.amount_paid, Money::new(dec!(400)));
        assert_eq!(bill.net_amount_due, Money::new(dec!(147)));

        bill.apply_payment(Money::new(dec!(147))).unwrap();
        assert_eq!(bill.status, BillStatus::Paid);
    }

    #[test]
    fn test_zero_charge_bill_is_paid() {
        let bill = bill(dec!(0));
        assert_eq!(bill.status, BillStatus::Paid);
        assert_eq!(bill.credit_applied, Money::ZERO);
    }

    #[test]
    fn test_days_overdue_never_negative() {
        let bill = bill(dec!(100));
        assert_eq!(bill.days_overdue(date(2024, 3, 1)), 0);
        assert_eq!(bill.days_overdue(date(2024, 3, 20)), 5);
    }
}
