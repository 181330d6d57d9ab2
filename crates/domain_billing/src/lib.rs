//! Billing Domain - Water bill calculation and settlement
//!
//! This crate turns meter readings into bills and keeps every peso that
//! moves against them accounted for:
//!
//! - [`RateSchedule`] and [`BillingCalculator`] price consumption, with a
//!   senior-citizen discount
//! - [`CreditLedger`] keeps each customer's prepaid balance equal to the sum
//!   of their ledger entries
//! - [`BillSettlement`] issues bills and applies cashier payments, proofs of
//!   payment and credit through the bill status machine
//! - [`PenaltyEngine`] assesses late-payment penalties, including the daily
//!   overdue sweep
//!
//! Persistence goes through the [`BillingStore`] port. Every mutation runs
//! inside one [`BillingUnitOfWork`] so a bill, its credit transaction and its
//! payment record are written together or not at all.
//!
//! # Example
//!
//! ```rust,ignore
//! use domain_billing::{BillSettlement, NewBill};
//!
//! let creation = settlement.create_bill(&encoder, NewBill {
//!     customer_id,
//!     meter_number: "MTR-0042".into(),
//!     previous_reading: dec!(10),
//!     current_reading: dec!(30),
//!     due_date,
//!     billing_date: None,
//! }, None).await?;
//!
//! assert_eq!(creation.bill.gross_amount, Money::new(dec!(547)));
//! ```

pub mod error;
pub mod customer;
pub mod rate_schedule;
pub mod calculator;
pub mod bill;
pub mod payment;
pub mod credit;
pub mod penalty;
pub mod settings;
pub mod settlement;
pub mod side_effects;
pub mod ports;

pub use error::{BillingError, BillingResult, ErrorKind};
pub use customer::{Customer, SENIOR_CITIZEN_AGE};
pub use rate_schedule::{reference_charge, Charge, ChargeBasis, RateSchedule, RateTier, TierPricing};
pub use calculator::{BillingCalculator, GrossAmount, FLAT_FALLBACK_RATE, MAX_METER_READING};
pub use bill::{Bill, BillDraft, BillEvent, BillStatus, PaymentAllocation};
pub use payment::{PaymentChannel, PaymentMethod, PaymentRecord, PaymentStatus};
pub use credit::{
    CreditApplication, CreditLedger, CreditReference, CreditTransaction, Reconciliation,
    ReferenceKind, TransactionType,
};
pub use penalty::{
    calculate_penalty, penalty_rate_for, OverdueBill, PenaltyAssessment, PenaltyEngine,
    PenaltySettings, PenaltySummary, SweepReport,
};
pub use settings::{BillingSettings, SettingsResolver};
pub use settlement::{
    BillCreation, BillSettlement, CashierPayment, NewBill, PaymentReceipt, ProofSubmission,
};
pub use side_effects::{BillingAction, SideEffects};
pub use ports::{BillFilter, BillingStore, BillingUnitOfWork, PaymentFilter, SettingsProvider};
