//! Payment records
//!
//! Cashier payments are recorded already settled. Online proofs of payment
//! start Pending and wait for a cashier to approve or reject them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use core_kernel::{BillId, CustomerId, Money, PaymentId};

use crate::bill::PaymentAllocation;
use crate::error::BillingError;

/// Payment method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    /// Check/cheque
    Check,
    BankTransfer,
    /// GCash, Maya and similar wallets
    #[serde(alias = "gcash")]
    EWallet,
    /// Customer credit balance
    Credit,
    Other,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Check => "check",
            PaymentMethod::BankTransfer => "bank_transfer",
            PaymentMethod::EWallet => "e_wallet",
            PaymentMethod::Credit => "credit",
            PaymentMethod::Other => "other",
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = BillingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cash" => Ok(PaymentMethod::Cash),
            "check" => Ok(PaymentMethod::Check),
            "bank_transfer" => Ok(PaymentMethod::BankTransfer),
            "e_wallet" | "gcash" => Ok(PaymentMethod::EWallet),
            "credit" => Ok(PaymentMethod::Credit),
            "other" => Ok(PaymentMethod::Other),
            other => Err(BillingError::InvalidInput(format!("unknown payment method '{}'", other))),
        }
    }
}

/// Where the payment came in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentChannel {
    /// Over the counter
    Cashier,
    /// Uploaded proof of payment
    Online,
    /// Credit applied by the system
    CreditBalance,
}

impl PaymentChannel {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentChannel::Cashier => "cashier",
            PaymentChannel::Online => "online",
            PaymentChannel::CreditBalance => "credit_balance",
        }
    }
}

impl FromStr for PaymentChannel {
    type Err = BillingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cashier" => Ok(PaymentChannel::Cashier),
            "online" => Ok(PaymentChannel::Online),
            "credit_balance" => Ok(PaymentChannel::CreditBalance),
            other => Err(BillingError::InvalidInput(format!("unknown payment channel '{}'", other))),
        }
    }
}

/// Payment status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Proof submitted, not yet reviewed
    Pending,
    /// Money received and applied to the bill
    Paid,
    /// Proof rejected by a reviewer
    Rejected,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = BillingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PaymentStatus::Pending),
            "paid" => Ok(PaymentStatus::Paid),
            "rejected" => Ok(PaymentStatus::Rejected),
            other => Err(BillingError::InvalidInput(format!("unknown payment status '{}'", other))),
        }
    }
}

/// A payment against a bill
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRecord {
    /// Unique identifier
    pub id: PaymentId,
    /// Paying customer
    pub customer_id: CustomerId,
    /// Bill being paid
    pub bill_id: BillId,
    /// Amount tendered or claimed on the proof
    pub amount: Money,
    /// Portion applied to principal
    pub amount_paid: Money,
    /// Portion applied to the penalty
    pub penalty_paid: Money,
    /// Cash handed back to the customer
    pub change_given: Money,
    /// Excess moved to the customer's credit balance
    pub credited_excess: Money,
    /// Payment method
    pub method: PaymentMethod,
    /// Payment channel
    pub channel: PaymentChannel,
    /// Official receipt or transfer reference, unique across payments
    pub receipt_number: String,
    /// Storage location of the uploaded proof
    pub proof_location: Option<String>,
    /// Status
    pub status: PaymentStatus,
    /// Notes or rejection reason
    pub notes: Option<String>,
    /// Who recorded or submitted the payment
    pub recorded_by: String,
    /// Who approved or rejected the proof
    pub reviewed_by: Option<String>,
    /// When the proof was reviewed
    pub reviewed_at: Option<DateTime<Utc>>,
    /// Created timestamp
    pub created_at: DateTime<Utc>,
    /// Updated timestamp
    pub updated_at: DateTime<Utc>,
}

impl PaymentRecord {
    /// Creates a pending payment record
    pub fn new(
        customer_id: CustomerId,
        bill_id: BillId,
        amount: Money,
        method: PaymentMethod,
        channel: PaymentChannel,
        receipt_number: impl Into<String>,
        recorded_by: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: PaymentId::new_v7(),
            customer_id,
            bill_id,
            amount,
            amount_paid: Money::ZERO,
            penalty_paid: Money::ZERO,
            change_given: Money::ZERO,
            credited_excess: Money::ZERO,
            method,
            channel,
            receipt_number: receipt_number.into(),
            proof_location: None,
            status: PaymentStatus::Pending,
            notes: None,
            recorded_by: recorded_by.into(),
            reviewed_by: None,
            reviewed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Record for credit consumed when a bill is issued fully covered
    pub fn from_credit(
        customer_id: CustomerId,
        bill_id: BillId,
        amount: Money,
        recorded_by: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        let receipt = credit_receipt_number(bill_id, now);
        let mut record = Self::new(
            customer_id,
            bill_id,
            amount,
            PaymentMethod::Credit,
            PaymentChannel::CreditBalance,
            receipt,
            recorded_by,
        );
        record.amount_paid = amount;
        record.status = PaymentStatus::Paid;
        record
    }

    pub fn with_proof(mut self, location: impl Into<String>) -> Self {
        self.proof_location = Some(location.into());
        self
    }

    pub fn with_notes(mut self, notes: Option<String>) -> Self {
        self.notes = notes;
        self
    }

    /// Marks the payment settled with the given split
    pub fn settle(&mut self, allocation: &PaymentAllocation) {
        self.amount_paid = allocation.to_principal;
        self.penalty_paid = allocation.to_penalty;
        self.status = PaymentStatus::Paid;
        self.updated_at = Utc::now();
    }

    /// Records who reviewed the proof
    pub fn reviewed(&mut self, reviewer: &str) {
        let now = Utc::now();
        self.reviewed_by = Some(reviewer.to_string());
        self.reviewed_at = Some(now);
        self.updated_at = now;
    }

    /// Marks the proof rejected
    pub fn reject(&mut self, reviewer: &str, reason: Option<String>) {
        self.status = PaymentStatus::Rejected;
        if reason.is_some() {
            self.notes = reason;
        }
        self.reviewed(reviewer);
    }
}

/// Receipt number for a credit-settled bill: `CREDIT-{bill}-{epoch seconds}`
pub fn credit_receipt_number(bill_id: BillId, at: DateTime<Utc>) -> String {
    format!("CREDIT-{}-{}", bill_id, at.timestamp())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_credit_record_is_settled() {
        let bill_id = BillId::new();
        let record = PaymentRecord::from_credit(
            CustomerId::new(),
            bill_id,
            Money::new(dec!(547)),
            "system",
        );

        assert_eq!(record.status, PaymentStatus::Paid);
        assert_eq!(record.method, PaymentMethod::Credit);
        assert_eq!(record.amount_paid, Money::new(dec!(547)));
        assert!(record.receipt_number.starts_with(&format!("CREDIT-{}-", bill_id)));
    }

    #[test]
    fn test_reject_keeps_reason() {
        let mut record = PaymentRecord::new(
            CustomerId::new(),
            BillId::new(),
            Money::new(dec!(100)),
            PaymentMethod::EWallet,
            PaymentChannel::Online,
            "GC-123",
            "customer-1",
        );
        record.reject("cashier-1", Some("blurry screenshot".to_string()));

        assert_eq!(record.status, PaymentStatus::Rejected);
        assert_eq!(record.notes.as_deref(), Some("blurry screenshot"));
        assert_eq!(record.reviewed_by.as_deref(), Some("cashier-1"));
        assert!(record.reviewed_at.is_some());
    }

    #[test]
    fn test_method_parse() {
        assert_eq!("e_wallet".parse::<PaymentMethod>().unwrap(), PaymentMethod::EWallet);
        assert_eq!("gcash".parse::<PaymentMethod>().unwrap(), PaymentMethod::EWallet);
        assert_eq!(PaymentMethod::Other.as_str(), "other");
        assert!("bitcoin".parse::<PaymentMethod>().is_err());
    }
}
