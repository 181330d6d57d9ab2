//! Credit ledger DTOs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use domain_billing::{CreditApplication, CreditTransaction};

use super::bill::BillResponse;
use super::payment::PaymentResponse;

/// Body for deposits and deductions
#[derive(Debug, Deserialize, Validate)]
pub struct CreditAmountRequest {
    pub amount: Decimal,
    #[validate(length(max = 255, message = "Description is limited to 255 characters"))]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AdjustCreditRequest {
    pub new_balance: Decimal,
    #[validate(length(max = 255, message = "Reason is limited to 255 characters"))]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ApplyCreditRequest {
    pub bill_id: Uuid,
    pub amount: Decimal,
}

#[derive(Debug, Serialize)]
pub struct CreditTransactionResponse {
    pub id: Uuid,
    pub transaction_type: String,
    pub amount: Decimal,
    pub previous_balance: Decimal,
    pub new_balance: Decimal,
    pub description: String,
    pub reference_kind: Option<String>,
    pub reference_id: Option<String>,
    pub performed_by: String,
    pub created_at: DateTime<Utc>,
}

impl From<&CreditTransaction> for CreditTransactionResponse {
    fn from(transaction: &CreditTransaction) -> Self {
        Self {
            id: transaction.id.into(),
            transaction_type: transaction.transaction_type.as_str().to_string(),
            amount: transaction.amount.amount(),
            previous_balance: transaction.previous_balance.amount(),
            new_balance: transaction.new_balance.amount(),
            description: transaction.description.clone(),
            reference_kind: transaction
                .reference
                .as_ref()
                .map(|r| r.kind.as_str().to_string()),
            reference_id: transaction.reference.as_ref().and_then(|r| r.id.clone()),
            performed_by: transaction.performed_by.clone(),
            created_at: transaction.created_at,
        }
    }
}

/// Balance with full history, newest first
#[derive(Debug, Serialize)]
pub struct CreditAccountResponse {
    pub customer_id: Uuid,
    pub balance: Decimal,
    pub transactions: Vec<CreditTransactionResponse>,
}

#[derive(Debug, Serialize)]
pub struct CreditApplicationResponse {
    pub new_balance: Decimal,
    pub bill: BillResponse,
    pub payment: PaymentResponse,
    pub transaction: CreditTransactionResponse,
}

impl From<&CreditApplication> for CreditApplicationResponse {
    fn from(application: &CreditApplication) -> Self {
        Self {
            new_balance: application.new_balance.amount(),
            bill: BillResponse::from(&application.bill),
            payment: PaymentResponse::from(&application.payment),
            transaction: CreditTransactionResponse::from(&application.transaction),
        }
    }
}
