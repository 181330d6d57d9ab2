//! Payment DTOs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use core_kernel::{BillId, Money};
use domain_billing::{CashierPayment, PaymentMethod, PaymentReceipt, PaymentRecord, ProofSubmission};

use super::bill::BillResponse;

#[derive(Debug, Deserialize, Validate)]
pub struct CashierPaymentRequest {
    pub bill_id: Uuid,
    pub amount_tendered: Decimal,
    pub method: PaymentMethod,
    #[validate(length(min = 1, max = 64, message = "Receipt number is required"))]
    pub receipt_number: String,
    /// Keep any excess as credit instead of giving change
    #[serde(default)]
    pub credit_excess: bool,
    #[validate(length(max = 500, message = "Notes are limited to 500 characters"))]
    pub notes: Option<String>,
}

impl From<CashierPaymentRequest> for CashierPayment {
    fn from(request: CashierPaymentRequest) -> Self {
        CashierPayment {
            bill_id: BillId::from_uuid(request.bill_id),
            amount_tendered: Money::new(request.amount_tendered),
            method: request.method,
            receipt_number: request.receipt_number.trim().to_string(),
            credit_excess: request.credit_excess,
            notes: request.notes,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct ProofSubmissionRequest {
    pub bill_id: Uuid,
    pub amount: Decimal,
    pub method: PaymentMethod,
    #[validate(length(min = 1, max = 64, message = "Reference number is required"))]
    pub reference_number: String,
    #[validate(length(max = 512))]
    pub proof_location: Option<String>,
    #[validate(length(max = 500, message = "Notes are limited to 500 characters"))]
    pub notes: Option<String>,
}

impl From<ProofSubmissionRequest> for ProofSubmission {
    fn from(request: ProofSubmissionRequest) -> Self {
        ProofSubmission {
            bill_id: BillId::from_uuid(request.bill_id),
            amount: Money::new(request.amount),
            method: request.method,
            reference_number: request.reference_number.trim().to_string(),
            proof_location: request.proof_location,
            notes: request.notes,
        }
    }
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct RejectProofRequest {
    #[validate(length(max = 500, message = "Reason is limited to 500 characters"))]
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PaymentResponse {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub bill_id: Uuid,
    pub amount: Decimal,
    pub amount_paid: Decimal,
    pub penalty_paid: Decimal,
    pub change_given: Decimal,
    pub credited_excess: Decimal,
    pub method: PaymentMethod,
    pub channel: String,
    pub receipt_number: String,
    pub proof_location: Option<String>,
    pub status: String,
    pub notes: Option<String>,
    pub recorded_by: String,
    pub reviewed_by: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<&PaymentRecord> for PaymentResponse {
    fn from(payment: &PaymentRecord) -> Self {
        Self {
            id: payment.id.into(),
            customer_id: payment.customer_id.into(),
            bill_id: payment.bill_id.into(),
            amount: payment.amount.amount(),
            amount_paid: payment.amount_paid.amount(),
            penalty_paid: payment.penalty_paid.amount(),
            change_given: payment.change_given.amount(),
            credited_excess: payment.credited_excess.amount(),
            method: payment.method,
            channel: payment.channel.as_str().to_string(),
            receipt_number: payment.receipt_number.clone(),
            proof_location: payment.proof_location.clone(),
            status: payment.status.as_str().to_string(),
            notes: payment.notes.clone(),
            recorded_by: payment.recorded_by.clone(),
            reviewed_by: payment.reviewed_by.clone(),
            reviewed_at: payment.reviewed_at,
            created_at: payment.created_at,
        }
    }
}

/// A settled payment and the bill it settled
#[derive(Debug, Serialize)]
pub struct PaymentReceiptResponse {
    pub payment: PaymentResponse,
    pub bill: BillResponse,
    pub to_penalty: Decimal,
    pub to_principal: Decimal,
    pub change_given: Decimal,
    /// Ledger entry for excess kept as credit
    pub credit_transaction_id: Option<Uuid>,
}

impl From<&PaymentReceipt> for PaymentReceiptResponse {
    fn from(receipt: &PaymentReceipt) -> Self {
        Self {
            payment: PaymentResponse::from(&receipt.payment),
            bill: BillResponse::from(&receipt.bill),
            to_penalty: receipt.allocation.to_penalty.amount(),
            to_principal: receipt.allocation.to_principal.amount(),
            change_given: receipt.change_given.amount(),
            credit_transaction_id: receipt.credit_transaction.as_ref().map(|t| t.id.into()),
        }
    }
}
