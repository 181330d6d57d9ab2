//! Penalty DTOs

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use domain_billing::{OverdueBill, PenaltyAssessment};

/// Optional evaluation date; defaults to today in the utility's timezone
#[derive(Debug, Default, Deserialize)]
pub struct AsOfQuery {
    pub as_of: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct PenaltyPreviewRequest {
    pub base_amount: Decimal,
    pub due_date: NaiveDate,
    pub as_of: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
pub struct PenaltyAssessmentResponse {
    pub penalty_amount: Decimal,
    pub days_overdue: i64,
    /// Percentage, absent when a flat fee applies
    pub penalty_rate: Option<Decimal>,
    pub has_penalty: bool,
    pub in_grace_period: bool,
}

impl From<&PenaltyAssessment> for PenaltyAssessmentResponse {
    fn from(assessment: &PenaltyAssessment) -> Self {
        Self {
            penalty_amount: assessment.penalty_amount.amount(),
            days_overdue: assessment.days_overdue,
            penalty_rate: assessment.penalty_rate.map(|r| r.as_percentage()),
            has_penalty: assessment.has_penalty,
            in_grace_period: assessment.in_grace_period,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct OverdueBillResponse {
    pub bill_id: Uuid,
    pub customer_id: Uuid,
    pub status: String,
    pub due_date: NaiveDate,
    pub net_amount_due: Decimal,
    pub stored_penalty: Decimal,
    pub assessment: PenaltyAssessmentResponse,
    pub needs_update: bool,
}

impl From<&OverdueBill> for OverdueBillResponse {
    fn from(overdue: &OverdueBill) -> Self {
        Self {
            bill_id: overdue.bill.id.into(),
            customer_id: overdue.bill.customer_id.into(),
            status: overdue.bill.status.as_str().to_string(),
            due_date: overdue.bill.due_date,
            net_amount_due: overdue.bill.net_amount_due.amount(),
            stored_penalty: overdue.bill.penalty.amount(),
            assessment: PenaltyAssessmentResponse::from(&overdue.assessment),
            needs_update: overdue.needs_update,
        }
    }
}
