//! Billing domain errors
//!
//! Every variant carries a stable code (`code()`) and a coarse kind
//! (`kind()`) so the API layer can tell "your input was wrong" from "this is
//! already settled" from "try again later" without string matching.

use rust_decimal::Decimal;
use thiserror::Error;

use core_kernel::{BillId, BillingPeriod, CustomerId, Money, PaymentId, PortError};

use crate::bill::{BillEvent, BillStatus};
use crate::payment::PaymentStatus;

/// Coarse error classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad input, rejected before any mutation
    Validation,
    /// The request conflicts with current state
    Conflict,
    NotFound,
    Forbidden,
    /// Cached balance and ledger disagree
    Consistency,
    /// Storage failure
    Dependency,
}

/// Errors that can occur in the billing domain
#[derive(Debug, Error)]
pub enum BillingError {
    /// Malformed or out-of-range input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Current meter reading is lower than the previous one
    #[error("Invalid reading: current reading {current} is below previous reading {previous}")]
    InvalidReading {
        previous: Decimal,
        current: Decimal,
    },

    /// Non-positive or otherwise unusable amount
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Configured rate tiers are malformed
    #[error("Invalid rate schedule: {0}")]
    InvalidRateSchedule(String),

    /// No configured tier covers the consumption
    #[error("No rate tier applies to consumption {0}")]
    NoApplicableTier(Decimal),

    /// Debit larger than the available credit balance
    #[error("Insufficient credit balance: available {balance}, requested {requested}")]
    InsufficientBalance {
        balance: Money,
        requested: Money,
    },

    /// Credit would push the balance over the customer's limit
    #[error("Credit limit exceeded: limit {limit}, resulting balance {resulting}")]
    CreditLimitExceeded {
        limit: Money,
        resulting: Money,
    },

    #[error("Bill {0} is already paid")]
    AlreadyPaid(BillId),

    #[error("Receipt number '{0}' has already been used")]
    DuplicateReceipt(String),

    /// Encoder tried to create a second bill in the same month
    #[error("Customer {customer_id} already has a bill for {period}")]
    DuplicateBillingPeriod {
        customer_id: CustomerId,
        period: BillingPeriod,
    },

    #[error("Cannot apply {event:?} to a bill in status {from:?}")]
    InvalidStatusTransition {
        from: BillStatus,
        event: BillEvent,
    },

    #[error("Payment {payment_id} is {status:?}, expected Pending")]
    PaymentNotPending {
        payment_id: PaymentId,
        status: PaymentStatus,
    },

    #[error("Customer not found: {0}")]
    CustomerNotFound(CustomerId),

    #[error("Bill not found: {0}")]
    BillNotFound(BillId),

    #[error("Payment not found: {0}")]
    PaymentNotFound(PaymentId),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Cached balance differs from the sum of ledger transactions
    #[error("Ledger inconsistency for customer {customer_id}: cached balance {cached}, ledger balance {ledger}")]
    LedgerInconsistency {
        customer_id: CustomerId,
        cached: Money,
        ledger: Money,
    },

    #[error("Storage error: {0}")]
    Storage(#[source] PortError),
}

impl BillingError {
    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            BillingError::InvalidInput(_) => "INVALID_INPUT",
            BillingError::InvalidReading { .. } => "INVALID_READING",
            BillingError::InvalidAmount(_) => "INVALID_AMOUNT",
            BillingError::InvalidRateSchedule(_) => "INVALID_RATE_SCHEDULE",
            BillingError::NoApplicableTier(_) => "NO_APPLICABLE_TIER",
            BillingError::InsufficientBalance { .. } => "INSUFFICIENT_BALANCE",
            BillingError::CreditLimitExceeded { .. } => "CREDIT_LIMIT_EXCEEDED",
            BillingError::AlreadyPaid(_) => "ALREADY_PAID",
            BillingError::DuplicateReceipt(_) => "DUPLICATE_RECEIPT",
            BillingError::DuplicateBillingPeriod { .. } => "DUPLICATE_BILLING_PERIOD",
            BillingError::InvalidStatusTransition { .. } => "INVALID_STATUS_TRANSITION",
            BillingError::PaymentNotPending { .. } => "PAYMENT_NOT_PENDING",
            BillingError::CustomerNotFound(_) => "CUSTOMER_NOT_FOUND",
            BillingError::BillNotFound(_) => "BILL_NOT_FOUND",
            BillingError::PaymentNotFound(_) => "PAYMENT_NOT_FOUND",
            BillingError::Forbidden(_) => "FORBIDDEN",
            BillingError::LedgerInconsistency { .. } => "LEDGER_INCONSISTENCY",
            BillingError::Storage(_) => "STORAGE_UNAVAILABLE",
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            BillingError::InvalidInput(_)
            | BillingError::InvalidReading { .. }
            | BillingError::InvalidAmount(_)
            | BillingError::InvalidRateSchedule(_)
            | BillingError::NoApplicableTier(_) => ErrorKind::Validation,
            BillingError::InsufficientBalance { .. }
            | BillingError::CreditLimitExceeded { .. }
            | BillingError::AlreadyPaid(_)
            | BillingError::DuplicateReceipt(_)
            | BillingError::DuplicateBillingPeriod { .. }
            | BillingError::InvalidStatusTransition { .. }
            | BillingError::PaymentNotPending { .. } => ErrorKind::Conflict,
            BillingError::CustomerNotFound(_)
            | BillingError::BillNotFound(_)
            | BillingError::PaymentNotFound(_) => ErrorKind::NotFound,
            BillingError::Forbidden(_) => ErrorKind::Forbidden,
            BillingError::LedgerInconsistency { .. } => ErrorKind::Consistency,
            BillingError::Storage(_) => ErrorKind::Dependency,
        }
    }

    /// Maps a port failure, turning NotFound into `CustomerNotFound`
    pub(crate) fn customer_lookup(id: CustomerId) -> impl FnOnce(PortError) -> BillingError {
        move |e| {
            if e.is_not_found() {
                BillingError::CustomerNotFound(id)
            } else {
                BillingError::Storage(e)
            }
        }
    }

    /// Maps a port failure, turning NotFound into `BillNotFound`
    pub(crate) fn bill_lookup(id: BillId) -> impl FnOnce(PortError) -> BillingError {
        move |e| {
            if e.is_not_found() {
                BillingError::BillNotFound(id)
            } else {
                BillingError::Storage(e)
            }
        }
    }

    /// Maps a port failure, turning NotFound into `PaymentNotFound`
    pub(crate) fn payment_lookup(id: PaymentId) -> impl FnOnce(PortError) -> BillingError {
        move |e| {
            if e.is_not_found() {
                BillingError::PaymentNotFound(id)
            } else {
                BillingError::Storage(e)
            }
        }
    }

    /// Maps a payment insert failure, turning unique-key conflicts into `DuplicateReceipt`
    pub(crate) fn receipt_insert(receipt: &str) -> impl FnOnce(PortError) -> BillingError + '_ {
        move |e| match e {
            PortError::Conflict { .. } => BillingError::DuplicateReceipt(receipt.to_string()),
            other => BillingError::Storage(other),
        }
    }
}

impl From<PortError> for BillingError {
    fn from(error: PortError) -> Self {
        BillingError::Storage(error)
    }
}

/// Result alias for billing operations
pub type BillingResult<T> = Result<T, BillingError>;
