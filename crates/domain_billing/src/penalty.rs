//! Late-payment penalties
//!
//! Past the grace period a bill either incurs the configured flat fee or a
//! percentage of its unpaid principal that starts at 10% and grows by 2% for
//! every started 30-day period beyond the first 30 days, capped at 50%.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use core_kernel::{days_between, Actor, AuditEntry, BillId, Money, Rate};

use crate::bill::{Bill, BillEvent, BillStatus};
use crate::error::{BillingError, BillingResult};
use crate::ports::BillingStore;
use crate::settings::SettingsResolver;
use crate::side_effects::{BillingAction, SideEffects};

/// Rate for the first 30 days past grace
pub const BASE_PENALTY_PERCENT: Decimal = dec!(10);
/// Added for every started 30-day period after the first
pub const ESCALATION_PERCENT: Decimal = dec!(2);
/// Ceiling on the percentage rate
pub const MAX_PENALTY_PERCENT: Decimal = dec!(50);
/// Length of one escalation period
pub const ESCALATION_PERIOD_DAYS: i64 = 30;

/// Penalty configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PenaltySettings {
    /// Days after the due date with no penalty
    pub grace_period_days: u32,
    /// When set and positive, replaces the percentage rate
    pub late_payment_fee: Option<Money>,
}

impl PenaltySettings {
    fn flat_fee(&self) -> Option<Money> {
        self.late_payment_fee.filter(Money::is_positive)
    }
}

/// Outcome of a penalty calculation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PenaltyAssessment {
    pub penalty_amount: Money,
    pub days_overdue: i64,
    /// `None` when no penalty applies or the flat fee was used
    pub penalty_rate: Option<Rate>,
    pub has_penalty: bool,
    pub in_grace_period: bool,
}

impl PenaltyAssessment {
    fn none(days_overdue: i64, in_grace_period: bool) -> Self {
        Self {
            penalty_amount: Money::ZERO,
            days_overdue,
            penalty_rate: None,
            has_penalty: false,
            in_grace_period,
        }
    }
}

/// Percentage rate for `effective_days` past grace
pub fn penalty_rate_for(effective_days: i64) -> Rate {
    let started_periods = if effective_days > ESCALATION_PERIOD_DAYS {
        (effective_days - ESCALATION_PERIOD_DAYS + ESCALATION_PERIOD_DAYS - 1) / ESCALATION_PERIOD_DAYS
    } else {
        0
    };
    let percent = BASE_PENALTY_PERCENT + ESCALATION_PERCENT * Decimal::from(started_periods);
    Rate::from_percentage(percent).capped_at(Rate::from_percentage(MAX_PENALTY_PERCENT))
}

/// Computes the penalty owed on `base` as of `as_of`
pub fn calculate_penalty(
    base: Money,
    due_date: NaiveDate,
    as_of: NaiveDate,
    settings: &PenaltySettings,
) -> PenaltyAssessment {
    let days_overdue = days_between(due_date, as_of);
    if days_overdue <= 0 {
        return PenaltyAssessment::none(0, false);
    }

    let grace = i64::from(settings.grace_period_days);
    if days_overdue <= grace {
        return PenaltyAssessment::none(days_overdue, true);
    }
    let effective_days = days_overdue - grace;

    if let Some(fee) = settings.flat_fee() {
        return PenaltyAssessment {
            penalty_amount: fee.round_to_currency(),
            days_overdue,
            penalty_rate: None,
            has_penalty: true,
            in_grace_period: false,
        };
    }

    let rate = penalty_rate_for(effective_days);
    let penalty_amount = rate.apply(base).round_to_currency();
    PenaltyAssessment {
        penalty_amount,
        days_overdue,
        penalty_rate: Some(rate),
        has_penalty: penalty_amount.is_positive(),
        in_grace_period: false,
    }
}

/// Counts from one overdue sweep
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SweepReport {
    pub as_of: Option<NaiveDate>,
    pub scanned: usize,
    pub penalties_updated: usize,
    pub marked_overdue: usize,
    pub unchanged: usize,
    /// No longer eligible once locked
    pub skipped: usize,
    pub failed: usize,
}

impl SweepReport {
    /// Bills that received at least one write
    pub fn written(&self) -> usize {
        self.scanned - self.unchanged - self.skipped - self.failed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SweepOutcome {
    Written {
        penalty_changed: bool,
        marked_overdue: bool,
    },
    Unchanged,
    Skipped,
}

/// Penalty view of a single bill
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PenaltySummary {
    pub bill_id: BillId,
    pub status: BillStatus,
    pub base_amount: Money,
    pub stored_penalty: Money,
    pub calculated_penalty: Money,
    pub penalty_paid: Money,
    pub days_overdue: i64,
    pub penalty_rate: Option<Rate>,
    pub in_grace_period: bool,
    /// Principal plus the calculated penalty still unpaid
    pub total_amount_due: Money,
}

/// An overdue bill as seen by `list_overdue`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverdueBill {
    pub bill: Bill,
    pub assessment: PenaltyAssessment,
    /// Stored and calculated penalties differ by more than a centavo
    pub needs_update: bool,
}

/// Runs penalty assessment against stored bills
pub struct PenaltyEngine {
    store: Arc<dyn BillingStore>,
    settings: SettingsResolver,
    effects: SideEffects,
}

impl PenaltyEngine {
    pub fn new(store: Arc<dyn BillingStore>, settings: SettingsResolver, effects: SideEffects) -> Self {
        Self {
            store,
            settings,
            effects,
        }
    }

    /// Assesses penalties for every eligible bill due before `as_of`
    ///
    /// Each bill is handled in its own unit of work. A failure on one bill is
    /// counted and logged and the sweep moves on.
    #[instrument(skip(self))]
    pub async fn process_overdue_bills(&self, as_of: NaiveDate) -> BillingResult<SweepReport> {
        let settings = self.settings.resolve().await.penalty;
        let candidates = self.store.list_overdue_bills(as_of).await?;

        let mut report = SweepReport {
            as_of: Some(as_of),
            scanned: candidates.len(),
            ..SweepReport::default()
        };

        for candidate in candidates {
            match self.process_one(candidate.id, as_of, &settings).await {
                Ok(SweepOutcome::Written {
                    penalty_changed,
                    marked_overdue,
                }) => {
                    if penalty_changed {
                        report.penalties_updated += 1;
                    }
                    if marked_overdue {
                        report.marked_overdue += 1;
                    }
                }
                Ok(SweepOutcome::Unchanged) => report.unchanged += 1,
                Ok(SweepOutcome::Skipped) => report.skipped += 1,
                Err(e) => {
                    report.failed += 1;
                    warn!(bill_id = %candidate.id, error = %e, "penalty assessment failed");
                }
            }
        }

        info!(
            scanned = report.scanned,
            penalties_updated = report.penalties_updated,
            marked_overdue = report.marked_overdue,
            failed = report.failed,
            "overdue sweep finished"
        );
        Ok(report)
    }

    async fn process_one(
        &self,
        bill_id: BillId,
        as_of: NaiveDate,
        settings: &PenaltySettings,
    ) -> BillingResult<SweepOutcome> {
        let mut uow = self.store.begin().await?;
        let mut bill = uow
            .lock_bill(bill_id)
            .await
            .map_err(BillingError::bill_lookup(bill_id))?;

        if bill.archived || !bill.status.accrues_penalty() || bill.due_date >= as_of {
            return Ok(SweepOutcome::Skipped);
        }

        let assessment = calculate_penalty(bill.penalty_base(), bill.due_date, as_of, settings);
        let previous_penalty = bill.penalty;
        let previous_status = bill.status;
        let penalty_changed = assessment.penalty_amount.max(bill.penalty_paid) != previous_penalty;
        let marked_overdue = previous_status == BillStatus::Unpaid;

        if !penalty_changed && !marked_overdue {
            return Ok(SweepOutcome::Unchanged);
        }

        if penalty_changed {
            bill.assess_penalty(assessment.penalty_amount);
        }
        if marked_overdue {
            bill.transition(BillEvent::MarkedOverdue)?;
        }
        uow.update_bill(&bill).await?;
        uow.commit().await?;

        self.effects
            .audit(
                AuditEntry::new(&Actor::system(), BillingAction::PenaltyApplied.as_str(), "bill", bill_id)
                    .with_details(json!({
                        "previous_penalty": previous_penalty,
                        "penalty": bill.penalty,
                        "days_overdue": assessment.days_overdue,
                        "penalty_rate": assessment.penalty_rate,
                        "previous_status": previous_status,
                        "status": bill.status,
                        "as_of": as_of,
                    })),
            )
            .await;

        Ok(SweepOutcome::Written {
            penalty_changed,
            marked_overdue,
        })
    }

    /// Penalty breakdown for one bill without writing anything
    pub async fn penalty_summary(&self, bill_id: BillId, as_of: NaiveDate) -> BillingResult<PenaltySummary> {
        let bill = self
            .store
            .get_bill(bill_id)
            .await
            .map_err(BillingError::bill_lookup(bill_id))?;
        let settings = self.settings.resolve().await.penalty;
        let assessment = calculate_penalty(bill.penalty_base(), bill.due_date, as_of, &settings);

        Ok(PenaltySummary {
            bill_id,
            status: bill.status,
            base_amount: bill.penalty_base(),
            stored_penalty: bill.penalty,
            calculated_penalty: assessment.penalty_amount,
            penalty_paid: bill.penalty_paid,
            days_overdue: assessment.days_overdue,
            penalty_rate: assessment.penalty_rate,
            in_grace_period: assessment.in_grace_period,
            total_amount_due: bill.net_amount_due
                + assessment.penalty_amount.saturating_sub(bill.penalty_paid),
        })
    }

    /// Every penalty-eligible bill due before `as_of`, with its fresh assessment
    pub async fn list_overdue(&self, as_of: NaiveDate) -> BillingResult<Vec<OverdueBill>> {
        let settings = self.settings.resolve().await.penalty;
        let bills = self.store.list_overdue_bills(as_of).await?;

        Ok(bills
            .into_iter()
            .map(|bill| {
                let assessment = calculate_penalty(bill.penalty_base(), bill.due_date, as_of, &settings);
                let needs_update = !assessment
                    .penalty_amount
                    .approx_eq(bill.penalty, dec!(0.01));
                OverdueBill {
                    bill,
                    assessment,
                    needs_update,
                }
            })
            .collect())
    }

    /// Assessment for an arbitrary amount under the current settings
    pub async fn preview(&self, base: Money, due_date: NaiveDate, as_of: NaiveDate) -> PenaltyAssessment {
        let settings = self.settings.resolve().await.penalty;
        calculate_penalty(base, due_date, as_of, &settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_not_yet_due() {
        let a = calculate_penalty(
            Money::new(dec!(1000)),
            date(2024, 3, 15),
            date(2024, 3, 15),
            &PenaltySettings::default(),
        );
        assert!(!a.has_penalty);
        assert_eq!(a.days_overdue, 0);
    }

    #[test]
    fn test_forty_five_days_is_twelve_percent() {
        let a = calculate_penalty(
            Money::new(dec!(1000)),
            date(2024, 1, 1),
            date(2024, 2, 15),
            &PenaltySettings::default(),
        );
        assert_eq!(a.days_overdue, 45);
        assert_eq!(a.penalty_rate, Some(Rate::from_percentage(dec!(12))));
        assert_eq!(a.penalty_amount, Money::new(dec!(120)));
    }

    #[test]
    fn test_grace_period() {
        let settings = PenaltySettings {
            grace_period_days: 5,
            late_payment_fee: None,
        };
        let a = calculate_penalty(Money::new(dec!(1000)), date(2024, 3, 1), date(2024, 3, 6), &settings);
        assert!(a.in_grace_period);
        assert!(!a.has_penalty);

        let a = calculate_penalty(Money::new(dec!(1000)), date(2024, 3, 1), date(2024, 3, 7), &settings);
        assert!(!a.in_grace_period);
        assert_eq!(a.penalty_amount, Money::new(dec!(100)));
    }

    #[test]
    fn test_flat_fee_wins() {
        let settings = PenaltySettings {
            grace_period_days: 0,
            late_payment_fee: Some(Money::new(dec!(50))),
        };
        let a = calculate_penalty(Money::new(dec!(9999)), date(2024, 1, 1), date(2024, 6, 1), &settings);
        assert_eq!(a.penalty_amount, Money::new(dec!(50)));
        assert_eq!(a.penalty_rate, None);
        assert!(a.has_penalty);
    }

    #[test]
    fn test_rate_steps() {
        assert_eq!(penalty_rate_for(1), Rate::from_percentage(dec!(10)));
        assert_eq!(penalty_rate_for(30), Rate::from_percentage(dec!(10)));
        assert_eq!(penalty_rate_for(31), Rate::from_percentage(dec!(12)));
        assert_eq!(penalty_rate_for(60), Rate::from_percentage(dec!(12)));
        assert_eq!(penalty_rate_for(61), Rate::from_percentage(dec!(14)));
        assert_eq!(penalty_rate_for(10_000), Rate::from_percentage(dec!(50)));
    }
}
