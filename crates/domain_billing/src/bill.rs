//! Water bills and their status lifecycle
//!
//! A bill is created once per meter reading. Its status only moves through
//! [`BillStatus::next`], which is the single place the transition table lives.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use core_kernel::{days_between, BillId, BillingPeriod, CustomerId, Money};

use crate::error::{BillingError, BillingResult};

/// Bill status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillStatus {
    /// Issued, nothing paid
    Unpaid,
    /// A proof of payment is waiting for review
    Pending,
    /// Some of the amount due has been paid
    PartiallyPaid,
    /// Fully settled
    Paid,
    /// Due date passed without full payment
    Overdue,
    /// The last proof of payment was rejected
    Rejected,
}

/// Events that move a bill between statuses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillEvent {
    /// Overdue sweep found the due date passed
    MarkedOverdue,
    /// A payment covered everything outstanding
    PaidInFull,
    /// A payment covered part of what is outstanding
    PaidInPart,
    /// Customer submitted a proof of payment
    ProofSubmitted,
    /// Reviewer rejected the proof of payment
    ProofRejected,
    /// A new payment attempt on a rejected bill
    Resubmitted,
}

impl BillStatus {
    pub const ALL: [BillStatus; 6] = [
        BillStatus::Unpaid,
        BillStatus::Pending,
        BillStatus::PartiallyPaid,
        BillStatus::Paid,
        BillStatus::Overdue,
        BillStatus::Rejected,
    ];

    /// Statuses the overdue sweep visits
    pub const PENALTY_ACCRUING: [BillStatus; 3] =
        [BillStatus::Unpaid, BillStatus::Overdue, BillStatus::Pending];

    pub fn as_str(&self) -> &'static str {
        match self {
            BillStatus::Unpaid => "unpaid",
            BillStatus::Pending => "pending",
            BillStatus::PartiallyPaid => "partially_paid",
            BillStatus::Paid => "paid",
            BillStatus::Overdue => "overdue",
            BillStatus::Rejected => "rejected",
        }
    }

    pub fn accrues_penalty(&self) -> bool {
        Self::PENALTY_ACCRUING.contains(self)
    }

    /// Applies `event`, returning the resulting status
    pub fn next(self, event: BillEvent) -> BillingResult<BillStatus> {
        use BillEvent::*;
        use BillStatus::*;

        let next = match (self, event) {
            (Unpaid, MarkedOverdue) => Overdue,
            (Unpaid | Overdue | PartiallyPaid | Pending, PaidInFull) => Paid,
            (Unpaid | Overdue | PartiallyPaid | Pending, PaidInPart) => PartiallyPaid,
            (Unpaid | Overdue | PartiallyPaid, ProofSubmitted) => Pending,
            (Unpaid | Overdue | PartiallyPaid | Pending, ProofRejected) => Rejected,
            (Rejected, Resubmitted) => Unpaid,
            (from, event) => {
                return Err(BillingError::InvalidStatusTransition { from, event });
            }
        };
        Ok(next)
    }
}

impl fmt::Display for BillStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BillStatus {
    type Err = BillingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BillStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| BillingError::InvalidInput(format!("unknown bill status '{}'", s)))
    }
}

/// How a payment was split across a bill
///
/// Penalties are settled before principal; whatever remains is excess.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PaymentAllocation {
    pub to_penalty: Money,
    pub to_principal: Money,
    pub excess: Money,
}

impl PaymentAllocation {
    pub fn applied(&self) -> Money {
        self.to_penalty + self.to_principal
    }
}

/// A water bill
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bill {
    /// Unique identifier
    pub id: BillId,
    /// Billed customer
    pub customer_id: CustomerId,
    /// Meter the readings came from
    pub meter_number: String,
    /// Previous meter reading
    pub previous_reading: Decimal,
    /// Current meter reading
    pub current_reading: Decimal,
    /// current - previous, in cubic meters
    pub consumption: Decimal,
    /// Charge after any senior discount, before credit
    pub gross_amount: Money,
    /// Credit balance consumed when the bill was issued
    pub credit_applied: Money,
    /// Principal still owed
    pub net_amount_due: Money,
    /// Principal settled by payments after issue
    pub amount_paid: Money,
    /// Current late-payment penalty
    pub penalty: Money,
    /// Portion of the penalty already settled
    pub penalty_paid: Money,
    /// Date the bill was issued
    pub billing_date: NaiveDate,
    /// Payment due date
    pub due_date: NaiveDate,
    /// Status
    pub status: BillStatus,
    /// Archived bills are ignored by the one-bill-per-month check
    pub archived: bool,
    /// Created timestamp
    pub created_at: DateTime<Utc>,
    /// Updated timestamp
    pub updated_at: DateTime<Utc>,
}

/// Input for issuing a bill once the gross amount is known
#[derive(Debug, Clone)]
pub struct BillDraft {
    pub customer_id: CustomerId,
    pub meter_number: String,
    pub previous_reading: Decimal,
    pub current_reading: Decimal,
    pub consumption: Decimal,
    pub gross_amount: Money,
    pub billing_date: NaiveDate,
    pub due_date: NaiveDate,
}

impl Bill {
    /// Issues a bill, consuming up to `available_credit` of the customer's balance
    ///
    /// Full coverage issues the bill as Paid, partial coverage as
    /// PartiallyPaid with the remainder due, and no credit leaves it Unpaid.
    /// A zero charge is Paid without touching credit.
    pub fn issue(draft: BillDraft, available_credit: Money) -> Self {
        let now = Utc::now();
        let gross = draft.gross_amount;

        let (credit_applied, status) = if gross.is_zero() {
            (Money::ZERO, BillStatus::Paid)
        } else if available_credit.is_positive() && available_credit >= gross {
            (gross, BillStatus::Paid)
        } else if available_credit.is_positive() {
            (available_credit, BillStatus::PartiallyPaid)
        } else {
            (Money::ZERO, BillStatus::Unpaid)
        };

        Self {
            id: BillId::new_v7(),
            customer_id: draft.customer_id,
            meter_number: draft.meter_number,
            previous_reading: draft.previous_reading,
            current_reading: draft.current_reading,
            consumption: draft.consumption,
            gross_amount: gross,
            credit_applied,
            net_amount_due: gross - credit_applied,
            amount_paid: Money::ZERO,
            penalty: Money::ZERO,
            penalty_paid: Money::ZERO,
            billing_date: draft.billing_date,
            due_date: draft.due_date,
            status,
            archived: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn billing_period(&self) -> BillingPeriod {
        BillingPeriod::containing(self.billing_date)
    }

    pub fn is_paid(&self) -> bool {
        self.status == BillStatus::Paid
    }

    /// Principal penalties are assessed on
    ///
    /// Fixed at issue so later payments do not shrink an earned penalty.
    pub fn penalty_base(&self) -> Money {
        self.gross_amount - self.credit_applied
    }

    /// Penalty not yet settled
    pub fn outstanding_penalty(&self) -> Money {
        self.penalty.saturating_sub(self.penalty_paid)
    }

    /// Principal plus unsettled penalty
    pub fn total_outstanding(&self) -> Money {
        self.net_amount_due + self.outstanding_penalty()
    }

    /// Whole days past the due date as of `as_of`, zero when not yet due
    pub fn days_overdue(&self, as_of: NaiveDate) -> i64 {
        days_between(self.due_date, as_of).max(0)
    }

    /// Applies `event` to the bill's status
    pub fn transition(&mut self, event: BillEvent) -> BillingResult<BillStatus> {
        self.status = self.status.next(event)?;
        self.updated_at = Utc::now();
        Ok(self.status)
    }

    /// Splits `amount` penalty first, then principal
    pub fn allocate(&self, amount: Money) -> PaymentAllocation {
        let to_penalty = amount.min(self.outstanding_penalty());
        let remaining = amount - to_penalty;
        let to_principal = remaining.min(self.net_amount_due);

        PaymentAllocation {
            to_penalty,
            to_principal,
            excess: remaining - to_principal,
        }
    }

    /// Applies a payment and moves the status to Paid or PartiallyPaid
    pub fn apply_payment(&mut self, amount: Money) -> BillingResult<PaymentAllocation> {
        if self.is_paid() {
            return Err(BillingError::AlreadyPaid(self.id));
        }
        if !amount.is_positive() {
            return Err(BillingError::InvalidAmount(format!(
                "payment amount must be positive, got {}",
                amount
            )));
        }

        let allocation = self.allocate(amount);
        let event = if self.total_outstanding() == allocation.applied() {
            BillEvent::PaidInFull
        } else {
            BillEvent::PaidInPart
        };
        self.status.next(event)?;

        self.penalty_paid += allocation.to_penalty;
        self.amount_paid += allocation.to_principal;
        self.net_amount_due -= allocation.to_principal;
        self.transition(event)?;

        Ok(allocation)
    }

    /// Replaces the penalty with a freshly assessed amount
    ///
    /// Never drops below what has already been paid towards it.
    pub fn assess_penalty(&mut self, penalty: Money) {
        self.penalty = penalty.max(self.penalty_paid);
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn draft(gross: Decimal) -> BillDraft {
        BillDraft {
            customer_id: CustomerId::new(),
            meter_number: "MTR-001".to_string(),
            previous_reading: dec!(100),
            current_reading: dec!(120),
            consumption: dec!(20),
            gross_amount: Money::new(gross),
            billing_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            due_date: NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(),
        }
    }

    #[test]
    fn test_issue_without_credit_is_unpaid() {
        let bill = Bill::issue(draft(dec!(547)), Money::ZERO);
        assert_eq!(bill.status, BillStatus::Unpaid);
        assert_eq!(bill.net_amount_due, Money::new(dec!(547)));
        assert_eq!(bill.credit_applied, Money::ZERO);
    }

    #[test]
    fn test_issue_with_partial_credit() {
        let bill = Bill::issue(draft(dec!(547)), Money::new(dec!(300)));
        assert_eq!(bill.status, BillStatus::PartiallyPaid);
        assert_eq!(bill.credit_applied, Money::new(dec!(300)));
        assert_eq!(bill.net_amount_due, Money::new(dec!(247)));
    }

    #[test]
    fn test_issue_with_covering_credit() {
        let bill = Bill::issue(draft(dec!(547)), Money::new(dec!(600)));
        assert_eq!(bill.status, BillStatus::Paid);
        assert_eq!(bill.credit_applied, Money::new(dec!(547)));
        assert_eq!(bill.net_amount_due, Money::ZERO);
    }

    #[test]
    fn test_transition_table() {
        assert_eq!(
            BillStatus::Unpaid.next(BillEvent::MarkedOverdue).unwrap(),
            BillStatus::Overdue
        );
        assert_eq!(
            BillStatus::Rejected.next(BillEvent::Resubmitted).unwrap(),
            BillStatus::Unpaid
        );
        assert!(BillStatus::Paid.next(BillEvent::PaidInPart).is_err());
        assert!(BillStatus::Pending.next(BillEvent::ProofSubmitted).is_err());
        assert!(BillStatus::Overdue.next(BillEvent::MarkedOverdue).is_err());
    }

    #[test]
    fn test_waterfall_settles_penalty_first() {
        let mut bill = Bill::issue(draft(dec!(1000)), Money::ZERO);
        bill.assess_penalty(Money::new(dec!(100)));

        let allocation = bill.apply_payment(Money::new(dec!(150))).unwrap();

        assert_eq!(allocation.to_penalty, Money::new(dec!(100)));
        assert_eq!(allocation.to_principal, Money::new(dec!(50)));
        assert_eq!(allocation.excess, Money::ZERO);
        assert_eq!(bill.net_amount_due, Money::new(dec!(950)));
        assert_eq!(bill.status, BillStatus::PartiallyPaid);
    }

    #[test]
    fn test_penalty_base_ignores_later_payments() {
        let mut bill = Bill::issue(draft(dec!(1000)), Money::new(dec!(200)));
        bill.assess_penalty(Money::new(dec!(80)));
        bill.apply_payment(Money::new(dec!(500))).unwrap();

        assert_eq!(bill.net_amount_due, Money::new(dec!(380)));
        assert_eq!(bill.penalty_base(), Money::new(dec!(800)));
    }

    #[test]
    fn test_assess_penalty_keeps_paid_portion() {
        let mut bill = Bill::issue(draft(dec!(1000)), Money::ZERO);
        bill.assess_penalty(Money::new(dec!(100)));
        bill.apply_payment(Money::new(dec!(600))).unwrap();

        bill.assess_penalty(Money::new(dec!(50)));

        assert_eq!(bill.penalty, Money::new(dec!(100)));
        assert_eq!(bill.outstanding_penalty(), Money::ZERO);
    }

    #[test]
    fn test_overpayment_reports_excess() {
        let mut bill = Bill::issue(draft(dec!(500)), Money::ZERO);
        let allocation = bill.apply_payment(Money::new(dec!(520))).unwrap();

        assert_eq!(allocation.excess, Money::new(dec!(20)));
        assert_eq!(bill.status, BillStatus::Paid);
        assert_eq!(bill.total_outstanding(), Money::ZERO);
    }

    #[test]
    fn test_paid_bill_rejects_payment() {
        let mut bill = Bill::issue(draft(dec!(500)), Money::new(dec!(500)));
        assert!(matches!(
            bill.apply_payment(Money::new(dec!(1))),
            Err(BillingError::AlreadyPaid(_))
        ));
    }

    #[test]
    fn test_status_round_trips_through_str() {
        for status in BillStatus::ALL {
            assert_eq!(status.as_str().parse::<BillStatus>().unwrap(), status);
        }
    }
}
