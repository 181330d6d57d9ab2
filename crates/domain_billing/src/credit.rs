//! Customer credit ledger
//!
//! The customer's cached `credit_balance` must always equal the sum of their
//! signed credit transactions. Every mutation locks the customer row,
//! verifies that equality, then writes the new balance and appends exactly
//! one transaction inside the same unit of work.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, instrument};

use core_kernel::{
    Actor, AuditEntry, BillId, CreditTransactionId, CustomerId, Money, Role,
};

use crate::bill::{Bill, BillEvent, BillStatus};
use crate::customer::Customer;
use crate::error::{BillingError, BillingResult};
use crate::payment::PaymentRecord;
use crate::ports::{BillingStore, BillingUnitOfWork};
use crate::side_effects::{BillingAction, SideEffects};

/// Direction of a ledger entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Credit,
    Debit,
    /// Administrative correction; `amount` carries the signed delta
    Adjustment,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Credit => "credit",
            TransactionType::Debit => "debit",
            TransactionType::Adjustment => "adjustment",
        }
    }
}

impl FromStr for TransactionType {
    type Err = BillingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "credit" => Ok(TransactionType::Credit),
            "debit" => Ok(TransactionType::Debit),
            "adjustment" => Ok(TransactionType::Adjustment),
            other => Err(BillingError::InvalidInput(format!(
                "unknown transaction type '{}'",
                other
            ))),
        }
    }
}

/// What caused a ledger entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceKind {
    ManualCredit,
    ManualAdjustment,
    BillPayment,
    /// Payment excess kept as credit
    Overpayment,
    OpeningBalance,
}

impl ReferenceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReferenceKind::ManualCredit => "manual_credit",
            ReferenceKind::ManualAdjustment => "manual_adjustment",
            ReferenceKind::BillPayment => "bill_payment",
            ReferenceKind::Overpayment => "overpayment",
            ReferenceKind::OpeningBalance => "opening_balance",
        }
    }
}

impl FromStr for ReferenceKind {
    type Err = BillingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "manual_credit" => Ok(ReferenceKind::ManualCredit),
            "manual_adjustment" => Ok(ReferenceKind::ManualAdjustment),
            "bill_payment" => Ok(ReferenceKind::BillPayment),
            "overpayment" => Ok(ReferenceKind::Overpayment),
            "opening_balance" => Ok(ReferenceKind::OpeningBalance),
            other => Err(BillingError::InvalidInput(format!(
                "unknown reference type '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Link from a ledger entry to what caused it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditReference {
    pub kind: ReferenceKind,
    pub id: Option<String>,
}

impl CreditReference {
    pub fn new(kind: ReferenceKind) -> Self {
        Self { kind, id: None }
    }

    pub fn bill(kind: ReferenceKind, bill_id: BillId) -> Self {
        Self {
            kind,
            id: Some(bill_id.to_string()),
        }
    }
}

/// An immutable ledger entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreditTransaction {
    pub id: CreditTransactionId,
    pub customer_id: CustomerId,
    pub transaction_type: TransactionType,
    /// Positive for credits and debits, signed for adjustments
    pub amount: Money,
    pub previous_balance: Money,
    pub new_balance: Money,
    pub description: String,
    pub reference: Option<CreditReference>,
    pub performed_by: String,
    pub created_at: DateTime<Utc>,
}

impl CreditTransaction {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        customer_id: CustomerId,
        transaction_type: TransactionType,
        amount: Money,
        previous_balance: Money,
        new_balance: Money,
        description: impl Into<String>,
        reference: Option<CreditReference>,
        performed_by: impl Into<String>,
    ) -> Self {
        Self {
            id: CreditTransactionId::new_v7(),
            customer_id,
            transaction_type,
            amount,
            previous_balance,
            new_balance,
            description: description.into(),
            reference,
            performed_by: performed_by.into(),
            created_at: Utc::now(),
        }
    }

    /// Effect on the balance
    pub fn signed_amount(&self) -> Money {
        match self.transaction_type {
            TransactionType::Credit | TransactionType::Adjustment => self.amount,
            TransactionType::Debit => -self.amount,
        }
    }

    /// previous + signed amount == new
    pub fn is_balanced(&self) -> bool {
        self.previous_balance + self.signed_amount() == self.new_balance
    }
}

/// One ledger mutation before it is posted
#[derive(Debug, Clone)]
pub(crate) struct Posting {
    pub transaction_type: TransactionType,
    pub amount: Money,
    pub description: String,
    pub reference: Option<CreditReference>,
}

/// Fails with `LedgerInconsistency` when the cached balance drifted
pub(crate) async fn verify_ledger(
    uow: &mut dyn BillingUnitOfWork,
    customer: &Customer,
) -> BillingResult<()> {
    let ledger = uow.ledger_balance(customer.id).await?;
    if ledger != customer.credit_balance {
        tracing::error!(
            customer_id = %customer.id,
            cached = %customer.credit_balance,
            ledger = %ledger,
            "credit ledger inconsistency"
        );
        return Err(BillingError::LedgerInconsistency {
            customer_id: customer.id,
            cached: customer.credit_balance,
            ledger,
        });
    }
    Ok(())
}

/// Writes the new balance and appends the transaction
///
/// The caller must have locked the customer and verified the ledger in the
/// same unit of work.
pub(crate) async fn post(
    uow: &mut dyn BillingUnitOfWork,
    customer: &mut Customer,
    posting: Posting,
    actor: &Actor,
) -> BillingResult<CreditTransaction> {
    let previous = customer.credit_balance;
    let new_balance = match posting.transaction_type {
        TransactionType::Credit => {
            let resulting = previous + posting.amount;
            if let Some(limit) = customer.credit_limit {
                if resulting > limit {
                    return Err(BillingError::CreditLimitExceeded { limit, resulting });
                }
            }
            resulting
        }
        TransactionType::Debit => {
            if posting.amount > previous {
                return Err(BillingError::InsufficientBalance {
                    balance: previous,
                    requested: posting.amount,
                });
            }
            previous - posting.amount
        }
        TransactionType::Adjustment => previous + posting.amount,
    };
    if new_balance.is_negative() {
        return Err(BillingError::InvalidAmount(format!(
            "balance cannot go below zero, would be {}",
            new_balance
        )));
    }

    let transaction = CreditTransaction::new(
        customer.id,
        posting.transaction_type,
        posting.amount,
        previous,
        new_balance,
        posting.description,
        posting.reference,
        actor.id.clone(),
    );

    uow.update_customer_balance(customer.id, new_balance).await?;
    uow.append_credit_transaction(&transaction).await?;
    customer.credit_balance = new_balance;

    Ok(transaction)
}

fn require_positive(amount: Money) -> BillingResult<()> {
    if !amount.is_positive() {
        return Err(BillingError::InvalidAmount(format!(
            "amount must be positive, got {}",
            amount
        )));
    }
    Ok(())
}

/// Cached vs. ledger balance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reconciliation {
    pub customer_id: CustomerId,
    pub cached_balance: Money,
    pub ledger_balance: Money,
    pub consistent: bool,
}

/// Result of spending credit on a bill
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditApplication {
    pub new_balance: Money,
    pub bill: Bill,
    pub payment: PaymentRecord,
    pub transaction: CreditTransaction,
}

/// Credit balance operations
pub struct CreditLedger {
    store: Arc<dyn BillingStore>,
    effects: SideEffects,
}

impl CreditLedger {
    pub fn new(store: Arc<dyn BillingStore>, effects: SideEffects) -> Self {
        Self { store, effects }
    }

    fn require_staff(actor: &Actor) -> BillingResult<()> {
        if actor.has_any_role(&[Role::Admin, Role::Cashier]) {
            Ok(())
        } else {
            Err(BillingError::Forbidden(format!(
                "role {} cannot change credit balances",
                actor.role
            )))
        }
    }

    /// Adds credit to a customer's balance
    #[instrument(skip(self, actor, description), fields(actor = %actor))]
    pub async fn credit(
        &self,
        actor: &Actor,
        customer_id: CustomerId,
        amount: Money,
        description: Option<String>,
        source: Option<String>,
    ) -> BillingResult<CreditTransaction> {
        Self::require_staff(actor)?;
        require_positive(amount)?;

        let mut uow = self.store.begin().await?;
        let mut customer = uow
            .lock_customer(customer_id)
            .await
            .map_err(BillingError::customer_lookup(customer_id))?;
        verify_ledger(uow.as_mut(), &customer).await?;

        let transaction = post(
            uow.as_mut(),
            &mut customer,
            Posting {
                transaction_type: TransactionType::Credit,
                amount,
                description: description.unwrap_or_else(|| "Manual credit".to_string()),
                reference: Some(CreditReference::new(ReferenceKind::ManualCredit)),
            },
            actor,
        )
        .await?;
        uow.commit().await?;

        info!(customer_id = %customer_id, amount = %amount, balance = %transaction.new_balance, "credit added");
        self.effects
            .audit(
                AuditEntry::new(actor, BillingAction::CreditAdded.as_str(), "customer", customer_id)
                    .with_details(json!({
                        "amount": amount,
                        "previous_balance": transaction.previous_balance,
                        "new_balance": transaction.new_balance,
                    }))
                    .with_source(source),
            )
            .await;

        Ok(transaction)
    }

    /// Removes credit from a customer's balance
    #[instrument(skip(self, actor, description), fields(actor = %actor))]
    pub async fn debit(
        &self,
        actor: &Actor,
        customer_id: CustomerId,
        amount: Money,
        description: Option<String>,
        source: Option<String>,
    ) -> BillingResult<CreditTransaction> {
        Self::require_staff(actor)?;
        require_positive(amount)?;

        let mut uow = self.store.begin().await?;
        let mut customer = uow
            .lock_customer(customer_id)
            .await
            .map_err(BillingError::customer_lookup(customer_id))?;
        verify_ledger(uow.as_mut(), &customer).await?;

        let transaction = post(
            uow.as_mut(),
            &mut customer,
            Posting {
                transaction_type: TransactionType::Debit,
                amount,
                description: description.unwrap_or_else(|| "Manual debit".to_string()),
                reference: Some(CreditReference::new(ReferenceKind::ManualAdjustment)),
            },
            actor,
        )
        .await?;
        uow.commit().await?;

        info!(customer_id = %customer_id, amount = %amount, balance = %transaction.new_balance, "credit deducted");
        self.effects
            .audit(
                AuditEntry::new(actor, BillingAction::CreditDeducted.as_str(), "customer", customer_id)
                    .with_details(json!({
                        "amount": amount,
                        "previous_balance": transaction.previous_balance,
                        "new_balance": transaction.new_balance,
                    }))
                    .with_source(source),
            )
            .await;

        Ok(transaction)
    }

    /// Sets the balance to `new_balance`, recording the signed delta
    #[instrument(skip(self, actor, reason), fields(actor = %actor))]
    pub async fn adjust(
        &self,
        actor: &Actor,
        customer_id: CustomerId,
        new_balance: Money,
        reason: Option<String>,
        source: Option<String>,
    ) -> BillingResult<CreditTransaction> {
        if !actor.has_role(Role::Admin) {
            return Err(BillingError::Forbidden(
                "only administrators can adjust balances".to_string(),
            ));
        }
        if new_balance.is_negative() {
            return Err(BillingError::InvalidAmount(format!(
                "new balance cannot be negative, got {}",
                new_balance
            )));
        }

        let mut uow = self.store.begin().await?;
        let mut customer = uow
            .lock_customer(customer_id)
            .await
            .map_err(BillingError::customer_lookup(customer_id))?;
        verify_ledger(uow.as_mut(), &customer).await?;

        let delta = new_balance - customer.credit_balance;
        let transaction = post(
            uow.as_mut(),
            &mut customer,
            Posting {
                transaction_type: TransactionType::Adjustment,
                amount: delta,
                description: reason.unwrap_or_else(|| "Manual balance adjustment".to_string()),
                reference: Some(CreditReference::new(ReferenceKind::ManualAdjustment)),
            },
            actor,
        )
        .await?;
        uow.commit().await?;

        info!(customer_id = %customer_id, delta = %delta, balance = %new_balance, "credit adjusted");
        self.effects
            .audit(
                AuditEntry::new(actor, BillingAction::CreditAdjusted.as_str(), "customer", customer_id)
                    .with_details(json!({
                        "delta": delta,
                        "previous_balance": transaction.previous_balance,
                        "new_balance": transaction.new_balance,
                    }))
                    .with_source(source),
            )
            .await;

        Ok(transaction)
    }

    /// Pays part or all of a bill from the customer's credit
    ///
    /// Cashiers and admins may apply anyone's credit; customers only their own.
    #[instrument(skip(self, actor), fields(actor = %actor))]
    pub async fn apply_to_bill(
        &self,
        actor: &Actor,
        customer_id: CustomerId,
        bill_id: BillId,
        amount: Money,
        source: Option<String>,
    ) -> BillingResult<CreditApplication> {
        if !(actor.has_any_role(&[Role::Admin, Role::Cashier]) || actor.is_customer(&customer_id)) {
            return Err(BillingError::Forbidden(format!(
                "role {} cannot apply credit for customer {}",
                actor.role, customer_id
            )));
        }
        require_positive(amount)?;

        let mut uow = self.store.begin().await?;
        let mut customer = uow
            .lock_customer(customer_id)
            .await
            .map_err(BillingError::customer_lookup(customer_id))?;
        let mut bill = uow
            .lock_bill(bill_id)
            .await
            .map_err(BillingError::bill_lookup(bill_id))?;
        if bill.customer_id != customer_id {
            return Err(BillingError::InvalidInput(format!(
                "bill {} does not belong to customer {}",
                bill_id, customer_id
            )));
        }
        verify_ledger(uow.as_mut(), &customer).await?;

        if amount > customer.credit_balance {
            return Err(BillingError::InsufficientBalance {
                balance: customer.credit_balance,
                requested: amount,
            });
        }
        if bill.is_paid() {
            return Err(BillingError::AlreadyPaid(bill_id));
        }
        if amount > bill.total_outstanding() {
            return Err(BillingError::InvalidAmount(format!(
                "amount {} exceeds outstanding total {}",
                amount,
                bill.total_outstanding()
            )));
        }

        let previous_status = bill.status;
        if bill.status == BillStatus::Rejected {
            bill.transition(BillEvent::Resubmitted)?;
        }
        let allocation = bill.apply_payment(amount)?;

        let transaction = post(
            uow.as_mut(),
            &mut customer,
            Posting {
                transaction_type: TransactionType::Debit,
                amount,
                description: format!("Credit applied to bill {}", bill_id),
                reference: Some(CreditReference::bill(ReferenceKind::BillPayment, bill_id)),
            },
            actor,
        )
        .await?;

        let mut payment = PaymentRecord::from_credit(customer_id, bill_id, amount, actor.id.clone());
        payment.receipt_number = format!("CREDIT-{}-{}", bill_id, payment.id);
        payment.settle(&allocation);

        uow.insert_payment(&payment)
            .await
            .map_err(BillingError::receipt_insert(&payment.receipt_number))?;
        uow.update_bill(&bill).await?;
        uow.commit().await?;

        info!(
            customer_id = %customer_id,
            bill_id = %bill_id,
            amount = %amount,
            status = %bill.status,
            "credit applied to bill"
        );
        self.effects
            .audit(
                AuditEntry::new(actor, BillingAction::CreditApplied.as_str(), "bill", bill_id)
                    .with_details(json!({
                        "customer_id": customer_id,
                        "amount": amount,
                        "to_penalty": allocation.to_penalty,
                        "to_principal": allocation.to_principal,
                        "previous_status": previous_status,
                        "status": bill.status,
                        "new_balance": transaction.new_balance,
                    }))
                    .with_source(source),
            )
            .await;
        if bill.is_paid() {
            self.effects
                .notify_credit_full_payment(&customer, &bill)
                .await;
        }

        Ok(CreditApplication {
            new_balance: transaction.new_balance,
            bill,
            payment,
            transaction,
        })
    }

    pub async fn balance(&self, customer_id: CustomerId) -> BillingResult<Money> {
        let customer = self
            .store
            .get_customer(customer_id)
            .await
            .map_err(BillingError::customer_lookup(customer_id))?;
        Ok(customer.credit_balance)
    }

    /// Transactions newest first
    pub async fn history(&self, customer_id: CustomerId) -> BillingResult<Vec<CreditTransaction>> {
        self.store
            .get_customer(customer_id)
            .await
            .map_err(BillingError::customer_lookup(customer_id))?;
        Ok(self.store.list_credit_transactions(customer_id).await?)
    }

    /// Compares the cached balance against the ledger sum without writing
    pub async fn reconcile(&self, customer_id: CustomerId) -> BillingResult<Reconciliation> {
        let mut uow = self.store.begin().await?;
        let customer = uow
            .lock_customer(customer_id)
            .await
            .map_err(BillingError::customer_lookup(customer_id))?;
        let ledger_balance = uow.ledger_balance(customer_id).await?;
        drop(uow);

        Ok(Reconciliation {
            customer_id,
            cached_balance: customer.credit_balance,
            ledger_balance,
            consistent: ledger_balance == customer.credit_balance,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_signed_amounts() {
        let customer_id = CustomerId::new();
        let debit = CreditTransaction::new(
            customer_id,
            TransactionType::Debit,
            Money::new(dec!(40)),
            Money::new(dec!(100)),
            Money::new(dec!(60)),
            "test",
            None,
            "tester",
        );
        assert_eq!(debit.signed_amount(), Money::new(dec!(-40)));
        assert!(debit.is_balanced());

        let adjustment = CreditTransaction::new(
            customer_id,
            TransactionType::Adjustment,
            Money::new(dec!(-25)),
            Money::new(dec!(60)),
            Money::new(dec!(35)),
            "test",
            None,
            "tester",
        );
        assert_eq!(adjustment.signed_amount(), Money::new(dec!(-25)));
        assert!(adjustment.is_balanced());
    }

    #[test]
    fn test_reference_kind_round_trip() {
        for kind in [
            ReferenceKind::ManualCredit,
            ReferenceKind::ManualAdjustment,
            ReferenceKind::BillPayment,
            ReferenceKind::Overpayment,
            ReferenceKind::OpeningBalance,
        ] {
            assert_eq!(kind.as_str().parse::<ReferenceKind>().unwrap(), kind);
        }
    }
}
