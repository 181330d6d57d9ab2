//! Bill issuing and settlement
//!
//! Each operation performs its whole write set (bill, credit transaction,
//! payment record) in one unit of work. Audit entries and SMS go out only
//! after the commit.

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use core_kernel::{
    Actor, AuditEntry, BillId, BillingPeriod, CustomerId, Money, PaymentId, Role, Timezone,
};

use crate::bill::{Bill, BillDraft, BillEvent, BillStatus, PaymentAllocation};
use crate::calculator::{BillingCalculator, GrossAmount};
use crate::credit::{post, verify_ledger, CreditReference, CreditTransaction, Posting, ReferenceKind, TransactionType};
use crate::error::{BillingError, BillingResult};
use crate::payment::{PaymentChannel, PaymentMethod, PaymentRecord, PaymentStatus};
use crate::customer::Customer;
use crate::ports::{BillFilter, BillingStore, BillingUnitOfWork, PaymentFilter};
use crate::settings::SettingsResolver;
use crate::side_effects::{BillingAction, SideEffects};

/// Request to bill a meter reading
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewBill {
    pub customer_id: CustomerId,
    pub meter_number: String,
    pub previous_reading: Decimal,
    pub current_reading: Decimal,
    pub due_date: NaiveDate,
    /// Defaults to today in the utility's timezone
    pub billing_date: Option<NaiveDate>,
}

/// Result of issuing a bill
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillCreation {
    pub bill: Bill,
    pub gross: GrossAmount,
    pub credit_transaction: Option<CreditTransaction>,
    pub payment: Option<PaymentRecord>,
}

/// Over-the-counter payment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CashierPayment {
    pub bill_id: BillId,
    pub amount_tendered: Money,
    pub method: PaymentMethod,
    pub receipt_number: String,
    /// Keep any excess as customer credit instead of giving change
    #[serde(default)]
    pub credit_excess: bool,
    pub notes: Option<String>,
}

/// Customer-submitted proof of an external payment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProofSubmission {
    pub bill_id: BillId,
    pub amount: Money,
    pub method: PaymentMethod,
    pub reference_number: String,
    pub proof_location: Option<String>,
    pub notes: Option<String>,
}

/// Result of a settled payment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentReceipt {
    pub payment: PaymentRecord,
    pub bill: Bill,
    pub allocation: PaymentAllocation,
    pub change_given: Money,
    pub credit_transaction: Option<CreditTransaction>,
}

/// Bill lifecycle operations
pub struct BillSettlement {
    store: Arc<dyn BillingStore>,
    settings: SettingsResolver,
    effects: SideEffects,
    timezone: Timezone,
}

impl BillSettlement {
    pub fn new(store: Arc<dyn BillingStore>, settings: SettingsResolver, effects: SideEffects) -> Self {
        Self {
            store,
            settings,
            effects,
            timezone: Timezone::default(),
        }
    }

    pub fn with_timezone(mut self, timezone: Timezone) -> Self {
        self.timezone = timezone;
        self
    }

    /// Computes and issues a bill, spending any available credit
    #[instrument(skip(self, actor, request), fields(actor = %actor, customer_id = %request.customer_id))]
    pub async fn create_bill(
        &self,
        actor: &Actor,
        request: NewBill,
        source: Option<String>,
    ) -> BillingResult<BillCreation> {
        if !actor.has_any_role(&[Role::Admin, Role::Cashier, Role::Encoder]) {
            return Err(BillingError::Forbidden(format!(
                "role {} cannot create bills",
                actor.role
            )));
        }
        if request.meter_number.trim().is_empty() {
            return Err(BillingError::InvalidInput("meter number is required".to_string()));
        }
        let billing_date = request
            .billing_date
            .unwrap_or_else(|| self.timezone.today(Utc::now()));
        if request.due_date < billing_date {
            return Err(BillingError::InvalidInput(format!(
                "due date {} is before billing date {}",
                request.due_date, billing_date
            )));
        }
        BillingCalculator::consumption(request.previous_reading, request.current_reading)?;

        let settings = self.settings.resolve().await;
        let calculator = BillingCalculator::from_settings(&settings);

        let mut uow = self.store.begin().await?;
        let mut customer = uow
            .lock_customer(request.customer_id)
            .await
            .map_err(BillingError::customer_lookup(request.customer_id))?;

        if actor.role == Role::Encoder {
            let period = BillingPeriod::containing(billing_date);
            if uow.has_active_bill_in_period(customer.id, period).await? {
                return Err(BillingError::DuplicateBillingPeriod {
                    customer_id: customer.id,
                    period,
                });
            }
        }
        verify_ledger(uow.as_mut(), &customer).await?;

        let gross = calculator.compute_gross_amount(
            request.previous_reading,
            request.current_reading,
            customer.birthdate,
            billing_date,
        )?;
        let bill = Bill::issue(
            BillDraft {
                customer_id: customer.id,
                meter_number: request.meter_number.trim().to_string(),
                previous_reading: request.previous_reading,
                current_reading: request.current_reading,
                consumption: gross.consumption,
                gross_amount: gross.gross_amount,
                billing_date,
                due_date: request.due_date,
            },
            customer.credit_balance,
        );
        uow.insert_bill(&bill).await?;

        let credit_transaction = if bill.credit_applied.is_positive() {
            Some(
                post(
                    uow.as_mut(),
                    &mut customer,
                    Posting {
                        transaction_type: TransactionType::Debit,
                        amount: bill.credit_applied,
                        description: format!("Credit applied to bill {}", bill.id),
                        reference: Some(CreditReference::bill(ReferenceKind::BillPayment, bill.id)),
                    },
                    actor,
                )
                .await?,
            )
        } else {
            None
        };

        let payment = if bill.is_paid() && bill.credit_applied.is_positive() {
            let record = PaymentRecord::from_credit(customer.id, bill.id, bill.credit_applied, actor.id.clone());
            uow.insert_payment(&record)
                .await
                .map_err(BillingError::receipt_insert(&record.receipt_number))?;
            Some(record)
        } else {
            None
        };

        uow.commit().await?;

        info!(
            bill_id = %bill.id,
            gross = %bill.gross_amount,
            credit_applied = %bill.credit_applied,
            status = %bill.status,
            "bill created"
        );
        self.effects
            .audit(
                AuditEntry::new(actor, BillingAction::BillCreated.as_str(), "bill", bill.id)
                    .with_details(json!({
                        "customer_id": customer.id,
                        "consumption": gross.consumption,
                        "gross_amount": bill.gross_amount,
                        "senior_discount_applied": gross.senior_discount_applied,
                        "credit_applied": bill.credit_applied,
                        "net_amount_due": bill.net_amount_due,
                        "status": bill.status,
                    }))
                    .with_source(source),
            )
            .await;

        if bill.is_paid() && bill.credit_applied.is_positive() {
            self.effects.notify_credit_full_payment(&customer, &bill).await;
        } else if !bill.is_paid() {
            self.effects.notify_new_bill(&customer, &bill).await;
        }

        Ok(BillCreation {
            bill,
            gross,
            credit_transaction,
            payment,
        })
    }

    /// Records money received at the counter
    #[instrument(skip(self, actor, payment), fields(actor = %actor, bill_id = %payment.bill_id))]
    pub async fn record_cashier_payment(
        &self,
        actor: &Actor,
        payment: CashierPayment,
        source: Option<String>,
    ) -> BillingResult<PaymentReceipt> {
        if !actor.has_role(Role::Cashier) {
            return Err(BillingError::Forbidden(
                "only cashiers can record counter payments".to_string(),
            ));
        }
        if !payment.amount_tendered.is_positive() {
            return Err(BillingError::InvalidAmount(format!(
                "amount tendered must be positive, got {}",
                payment.amount_tendered
            )));
        }
        let receipt_number = payment.receipt_number.trim().to_string();
        if receipt_number.is_empty() {
            return Err(BillingError::InvalidInput("receipt number is required".to_string()));
        }

        let customer_id = self.bill_owner(payment.bill_id).await?;

        let mut uow = self.store.begin().await?;
        let mut customer = uow
            .lock_customer(customer_id)
            .await
            .map_err(BillingError::customer_lookup(customer_id))?;
        let mut bill = uow
            .lock_bill(payment.bill_id)
            .await
            .map_err(BillingError::bill_lookup(payment.bill_id))?;

        if bill.is_paid() {
            return Err(BillingError::AlreadyPaid(bill.id));
        }
        if uow.receipt_exists(&receipt_number).await? {
            return Err(BillingError::DuplicateReceipt(receipt_number));
        }

        let previous_status = bill.status;
        if bill.status == BillStatus::Rejected {
            bill.transition(BillEvent::Resubmitted)?;
        }
        let allocation = bill.apply_payment(payment.amount_tendered)?;

        let mut record = PaymentRecord::new(
            customer.id,
            bill.id,
            payment.amount_tendered,
            payment.method,
            PaymentChannel::Cashier,
            receipt_number.clone(),
            actor.id.clone(),
        )
        .with_notes(payment.notes);
        record.settle(&allocation);

        let credit_transaction = if payment.credit_excess {
            credit_overpayment(uow.as_mut(), &mut customer, &bill, &mut record, allocation.excess, actor).await?
        } else {
            record.change_given = allocation.excess;
            None
        };

        uow.insert_payment(&record)
            .await
            .map_err(BillingError::receipt_insert(&receipt_number))?;
        uow.update_bill(&bill).await?;
        uow.commit().await?;

        info!(
            payment_id = %record.id,
            bill_id = %bill.id,
            amount = %record.amount,
            status = %bill.status,
            "cashier payment recorded"
        );
        self.effects
            .audit(
                AuditEntry::new(actor, BillingAction::PaymentRecorded.as_str(), "payment", record.id)
                    .with_details(json!({
                        "bill_id": bill.id,
                        "receipt_number": record.receipt_number,
                        "amount": record.amount,
                        "to_penalty": allocation.to_penalty,
                        "to_principal": allocation.to_principal,
                        "change_given": record.change_given,
                        "credited_excess": record.credited_excess,
                    }))
                    .with_source(source.clone()),
            )
            .await;
        self.audit_status_change(actor, &bill, previous_status, source).await;

        Ok(PaymentReceipt {
            change_given: record.change_given,
            payment: record,
            bill,
            allocation,
            credit_transaction,
        })
    }

    /// Stores a proof of payment for review and marks the bill Pending
    #[instrument(skip(self, actor, submission), fields(actor = %actor, bill_id = %submission.bill_id))]
    pub async fn submit_proof(
        &self,
        actor: &Actor,
        submission: ProofSubmission,
        source: Option<String>,
    ) -> BillingResult<PaymentRecord> {
        if !actor.has_any_role(&[Role::Cashier, Role::Customer]) {
            return Err(BillingError::Forbidden(format!(
                "role {} cannot submit payments",
                actor.role
            )));
        }
        if !submission.amount.is_positive() {
            return Err(BillingError::InvalidAmount(format!(
                "submitted amount must be positive, got {}",
                submission.amount
            )));
        }
        let reference = submission.reference_number.trim().to_string();
        if reference.is_empty() {
            return Err(BillingError::InvalidInput("reference number is required".to_string()));
        }

        let mut uow = self.store.begin().await?;
        let mut bill = uow
            .lock_bill(submission.bill_id)
            .await
            .map_err(BillingError::bill_lookup(submission.bill_id))?;

        if bill.is_paid() {
            return Err(BillingError::AlreadyPaid(bill.id));
        }
        if uow.receipt_exists(&reference).await? {
            return Err(BillingError::DuplicateReceipt(reference));
        }

        let previous_status = bill.status;
        if bill.status == BillStatus::Rejected {
            bill.transition(BillEvent::Resubmitted)?;
        }
        bill.transition(BillEvent::ProofSubmitted)?;

        let mut record = PaymentRecord::new(
            bill.customer_id,
            bill.id,
            submission.amount,
            submission.method,
            PaymentChannel::Online,
            reference.clone(),
            actor.id.clone(),
        )
        .with_notes(submission.notes);
        if let Some(location) = submission.proof_location {
            record = record.with_proof(location);
        }

        uow.insert_payment(&record)
            .await
            .map_err(BillingError::receipt_insert(&reference))?;
        uow.update_bill(&bill).await?;
        uow.commit().await?;

        info!(payment_id = %record.id, bill_id = %bill.id, amount = %record.amount, "proof of payment submitted");
        self.effects
            .audit(
                AuditEntry::new(actor, BillingAction::PaymentSubmitted.as_str(), "payment", record.id)
                    .with_details(json!({
                        "bill_id": bill.id,
                        "reference_number": record.receipt_number,
                        "amount": record.amount,
                        "method": record.method,
                    }))
                    .with_source(source.clone()),
            )
            .await;
        self.audit_status_change(actor, &bill, previous_status, source).await;

        Ok(record)
    }

    /// Accepts a pending proof and applies it to the bill
    ///
    /// Any excess over the outstanding total goes to the customer's credit.
    /// Whatever would push the balance past the credit limit is reported as
    /// `change_given`, a refund owed to the customer.
    #[instrument(skip(self, actor), fields(actor = %actor))]
    pub async fn approve_proof(
        &self,
        actor: &Actor,
        payment_id: PaymentId,
        source: Option<String>,
    ) -> BillingResult<PaymentReceipt> {
        if !actor.has_role(Role::Cashier) {
            return Err(BillingError::Forbidden(
                "only cashiers can review payments".to_string(),
            ));
        }
        let pending = self
            .store
            .find_payment(payment_id)
            .await
            .map_err(BillingError::payment_lookup(payment_id))?;

        let mut uow = self.store.begin().await?;
        let mut customer = uow
            .lock_customer(pending.customer_id)
            .await
            .map_err(BillingError::customer_lookup(pending.customer_id))?;
        let mut bill = uow
            .lock_bill(pending.bill_id)
            .await
            .map_err(BillingError::bill_lookup(pending.bill_id))?;
        let mut record = uow
            .lock_payment(payment_id)
            .await
            .map_err(BillingError::payment_lookup(payment_id))?;

        if record.status != PaymentStatus::Pending {
            return Err(BillingError::PaymentNotPending {
                payment_id,
                status: record.status,
            });
        }
        if bill.is_paid() {
            return Err(BillingError::AlreadyPaid(bill.id));
        }

        let previous_status = bill.status;
        if bill.status == BillStatus::Rejected {
            bill.transition(BillEvent::Resubmitted)?;
        }
        let allocation = bill.apply_payment(record.amount)?;
        record.settle(&allocation);
        record.reviewed(&actor.id);

        let credit_transaction =
            credit_overpayment(uow.as_mut(), &mut customer, &bill, &mut record, allocation.excess, actor).await?;

        uow.update_payment(&record).await?;
        uow.update_bill(&bill).await?;
        uow.commit().await?;

        info!(payment_id = %payment_id, bill_id = %bill.id, status = %bill.status, "proof of payment approved");
        self.effects
            .audit(
                AuditEntry::new(actor, BillingAction::PaymentApproved.as_str(), "payment", payment_id)
                    .with_details(json!({
                        "bill_id": bill.id,
                        "amount": record.amount,
                        "to_penalty": allocation.to_penalty,
                        "to_principal": allocation.to_principal,
                        "credited_excess": record.credited_excess,
                        "refund_due": record.change_given,
                    }))
                    .with_source(source.clone()),
            )
            .await;
        self.audit_status_change(actor, &bill, previous_status, source).await;

        Ok(PaymentReceipt {
            change_given: record.change_given,
            payment: record,
            bill,
            allocation,
            credit_transaction,
        })
    }

    /// Rejects a pending proof
    ///
    /// The bill moves to Rejected only while it is still waiting on this
    /// proof. A proof left over on a bill that was already settled can be
    /// rejected to clear it from the review queue.
    #[instrument(skip(self, actor, reason), fields(actor = %actor))]
    pub async fn reject_proof(
        &self,
        actor: &Actor,
        payment_id: PaymentId,
        reason: Option<String>,
        source: Option<String>,
    ) -> BillingResult<PaymentRecord> {
        if !actor.has_role(Role::Cashier) {
            return Err(BillingError::Forbidden(
                "only cashiers can review payments".to_string(),
            ));
        }
        let pending = self
            .store
            .find_payment(payment_id)
            .await
            .map_err(BillingError::payment_lookup(payment_id))?;

        let mut uow = self.store.begin().await?;
        let mut bill = uow
            .lock_bill(pending.bill_id)
            .await
            .map_err(BillingError::bill_lookup(pending.bill_id))?;
        let mut record = uow
            .lock_payment(payment_id)
            .await
            .map_err(BillingError::payment_lookup(payment_id))?;

        if record.status != PaymentStatus::Pending {
            return Err(BillingError::PaymentNotPending {
                payment_id,
                status: record.status,
            });
        }

        // A bill settled by other means while the proof waited keeps its status
        let previous_status = bill.status;
        if bill.status == BillStatus::Pending {
            bill.transition(BillEvent::ProofRejected)?;
        }
        record.reject(&actor.id, reason);

        uow.update_payment(&record).await?;
        if bill.status != previous_status {
            uow.update_bill(&bill).await?;
        }
        uow.commit().await?;

        info!(payment_id = %payment_id, bill_id = %bill.id, "proof of payment rejected");
        self.effects
            .audit(
                AuditEntry::new(actor, BillingAction::PaymentRejected.as_str(), "payment", payment_id)
                    .with_details(json!({
                        "bill_id": bill.id,
                        "reason": record.notes,
                    }))
                    .with_source(source.clone()),
            )
            .await;
        self.audit_status_change(actor, &bill, previous_status, source).await;

        Ok(record)
    }

    pub async fn get_bill(&self, bill_id: BillId) -> BillingResult<Bill> {
        self.store
            .get_bill(bill_id)
            .await
            .map_err(BillingError::bill_lookup(bill_id))
    }

    pub async fn list_customer_bills(&self, customer_id: CustomerId) -> BillingResult<Vec<Bill>> {
        self.store
            .get_customer(customer_id)
            .await
            .map_err(BillingError::customer_lookup(customer_id))?;
        Ok(self.store.list_customer_bills(customer_id).await?)
    }

    pub async fn list_bills(&self, filter: BillFilter) -> BillingResult<Vec<Bill>> {
        Ok(self.store.list_bills(filter).await?)
    }

    /// Payments on a bill, newest first
    pub async fn list_payments(&self, bill_id: BillId) -> BillingResult<Vec<PaymentRecord>> {
        self.get_bill(bill_id).await?;
        Ok(self.store.list_payments_for_bill(bill_id).await?)
    }

    /// Proofs waiting for review
    pub async fn list_pending_proofs(&self) -> BillingResult<Vec<PaymentRecord>> {
        Ok(self
            .store
            .list_payments(PaymentFilter::Status(PaymentStatus::Pending))
            .await?)
    }

    async fn bill_owner(&self, bill_id: BillId) -> BillingResult<CustomerId> {
        Ok(self
            .store
            .get_bill(bill_id)
            .await
            .map_err(BillingError::bill_lookup(bill_id))?
            .customer_id)
    }

    async fn audit_status_change(
        &self,
        actor: &Actor,
        bill: &Bill,
        previous: BillStatus,
        source: Option<String>,
    ) {
        if previous == bill.status {
            return;
        }
        self.effects
            .audit(
                AuditEntry::new(actor, BillingAction::BillStatusUpdated.as_str(), "bill", bill.id)
                    .with_details(json!({
                        "previous_status": previous,
                        "status": bill.status,
                    }))
                    .with_source(source),
            )
            .await;
    }
}

/// Keeps an overpayment as customer credit up to the credit limit
///
/// The part over the limit is left on the record as `change_given`.
async fn credit_overpayment(
    uow: &mut dyn BillingUnitOfWork,
    customer: &mut Customer,
    bill: &Bill,
    record: &mut PaymentRecord,
    excess: Money,
    actor: &Actor,
) -> BillingResult<Option<CreditTransaction>> {
    let (credited, returned) = customer.split_excess(excess);
    record.change_given = returned;
    if returned.is_positive() {
        warn!(
            customer_id = %customer.id,
            bill_id = %bill.id,
            returned = %returned,
            "overpayment exceeds credit limit, returning the difference"
        );
    }
    if !credited.is_positive() {
        return Ok(None);
    }

    verify_ledger(uow, customer).await?;
    record.credited_excess = credited;
    let transaction = post(
        uow,
        customer,
        Posting {
            transaction_type: TransactionType::Credit,
            amount: credited,
            description: format!("Overpayment on bill {}", bill.id),
            reference: Some(CreditReference::bill(ReferenceKind::Overpayment, bill.id)),
        },
        actor,
    )
    .await?;
    Ok(Some(transaction))
}
