//! Bill DTOs

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use core_kernel::CustomerId;
use domain_billing::{Bill, BillCreation, BillFilter, BillStatus, NewBill, MAX_METER_READING};

use crate::error::ApiError;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateBillRequest {
    pub customer_id: Uuid,
    #[validate(length(min = 1, max = 64, message = "Meter number is required"))]
    pub meter_number: String,
    #[validate(custom(function = "validate_meter_reading"))]
    pub previous_reading: Decimal,
    #[validate(custom(function = "validate_meter_reading"))]
    pub current_reading: Decimal,
    pub due_date: NaiveDate,
    /// Defaults to today in the utility's timezone
    pub billing_date: Option<NaiveDate>,
}

fn validate_meter_reading(reading: &Decimal) -> Result<(), ValidationError> {
    if reading.is_sign_negative() && !reading.is_zero() || *reading > MAX_METER_READING {
        let mut error = ValidationError::new("meter_reading_range");
        error.message = Some(format!("Reading must be between 0 and {}", MAX_METER_READING).into());
        return Err(error);
    }
    Ok(())
}

impl From<CreateBillRequest> for NewBill {
    fn from(request: CreateBillRequest) -> Self {
        NewBill {
            customer_id: CustomerId::from_uuid(request.customer_id),
            meter_number: request.meter_number.trim().to_string(),
            previous_reading: request.previous_reading,
            current_reading: request.current_reading,
            due_date: request.due_date,
            billing_date: request.billing_date,
        }
    }
}

/// `GET /bills` filters; both optional
#[derive(Debug, Default, Deserialize)]
pub struct BillListQuery {
    pub customer_id: Option<Uuid>,
    pub status: Option<String>,
}

impl BillListQuery {
    pub fn into_filter(self) -> Result<BillFilter, ApiError> {
        let status = match self.status.as_deref() {
            Some(raw) => Some(
                raw.parse::<BillStatus>()
                    .map_err(|_| ApiError::BadRequest(format!("unknown bill status '{}'", raw)))?,
            ),
            None => None,
        };
        let customer = self.customer_id.map(CustomerId::from_uuid);

        Ok(match (customer, status) {
            (None, None) => BillFilter::All,
            (Some(customer), None) => BillFilter::Customer(customer),
            (None, Some(status)) => BillFilter::Status(status),
            (Some(customer), Some(status)) => BillFilter::CustomerAndStatus(customer, status),
        })
    }
}

#[derive(Debug, Serialize)]
pub struct BillResponse {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub meter_number: String,
    pub previous_reading: Decimal,
    pub current_reading: Decimal,
    pub consumption: Decimal,
    pub gross_amount: Decimal,
    pub credit_applied: Decimal,
    pub net_amount_due: Decimal,
    pub amount_paid: Decimal,
    pub penalty: Decimal,
    pub penalty_paid: Decimal,
    pub total_outstanding: Decimal,
    pub billing_date: NaiveDate,
    pub due_date: NaiveDate,
    pub status: String,
    pub archived: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Bill> for BillResponse {
    fn from(bill: &Bill) -> Self {
        Self {
            id: bill.id.into(),
            customer_id: bill.customer_id.into(),
            meter_number: bill.meter_number.clone(),
            previous_reading: bill.previous_reading,
            current_reading: bill.current_reading,
            consumption: bill.consumption,
            gross_amount: bill.gross_amount.amount(),
            credit_applied: bill.credit_applied.amount(),
            net_amount_due: bill.net_amount_due.amount(),
            amount_paid: bill.amount_paid.amount(),
            penalty: bill.penalty.amount(),
            penalty_paid: bill.penalty_paid.amount(),
            total_outstanding: bill.total_outstanding().amount(),
            billing_date: bill.billing_date,
            due_date: bill.due_date,
            status: bill.status.as_str().to_string(),
            archived: bill.archived,
            created_at: bill.created_at,
            updated_at: bill.updated_at,
        }
    }
}

/// A new bill with its price breakdown
#[derive(Debug, Serialize)]
pub struct BillCreatedResponse {
    pub bill: BillResponse,
    pub base_charge: Decimal,
    pub discount: Decimal,
    pub senior_discount_applied: bool,
    /// Set when credit covered the bill in full
    pub payment_id: Option<Uuid>,
}

impl From<&BillCreation> for BillCreatedResponse {
    fn from(creation: &BillCreation) -> Self {
        Self {
            bill: BillResponse::from(&creation.bill),
            base_charge: creation.gross.base_charge.amount(),
            discount: creation.gross.discount.amount(),
            senior_discount_applied: creation.gross.senior_discount_applied,
            payment_id: creation.payment.as_ref().map(|p| p.id.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_query_builds_filter() {
        let customer = Uuid::new_v4();
        let query = BillListQuery {
            customer_id: Some(customer),
            status: Some("overdue".to_string()),
        };
        assert_eq!(
            query.into_filter().unwrap(),
            BillFilter::CustomerAndStatus(CustomerId::from_uuid(customer), BillStatus::Overdue)
        );
        assert_eq!(BillListQuery::default().into_filter().unwrap(), BillFilter::All);
    }

    #[test]
    fn test_unknown_status_is_rejected() {
        let query = BillListQuery {
            customer_id: None,
            status: Some("settled".to_string()),
        };
        assert!(matches!(query.into_filter(), Err(ApiError::BadRequest(_))));
    }
}
