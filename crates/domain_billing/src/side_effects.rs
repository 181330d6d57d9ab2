//! Best-effort audit and SMS delivery
//!
//! Both run after the unit of work commits. A failure is logged at warn and
//! never changes the outcome of the operation that triggered it.

use std::sync::Arc;
use tracing::warn;

use core_kernel::{
    truncate_message, AuditEntry, AuditSink, NoopNotificationSender, NotificationSender,
    TracingAuditSink,
};

use crate::bill::Bill;
use crate::customer::Customer;

/// Audit action names
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BillingAction {
    BillCreated,
    CreditAdded,
    CreditDeducted,
    CreditAdjusted,
    CreditApplied,
    PaymentRecorded,
    PaymentSubmitted,
    PaymentApproved,
    PaymentRejected,
    BillStatusUpdated,
    PenaltyApplied,
    RateTiersReplaced,
    SettingUpdated,
}

impl BillingAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillingAction::BillCreated => "bill_created",
            BillingAction::CreditAdded => "credit_added",
            BillingAction::CreditDeducted => "credit_deducted",
            BillingAction::CreditAdjusted => "credit_adjusted",
            BillingAction::CreditApplied => "credit_applied",
            BillingAction::PaymentRecorded => "payment_recorded",
            BillingAction::PaymentSubmitted => "payment_submitted",
            BillingAction::PaymentApproved => "payment_approved",
            BillingAction::PaymentRejected => "payment_rejected",
            BillingAction::BillStatusUpdated => "bill_status_updated",
            BillingAction::PenaltyApplied => "penalty_applied",
            BillingAction::RateTiersReplaced => "rate_tiers_replaced",
            BillingAction::SettingUpdated => "setting_updated",
        }
    }
}

/// Audit sink and notification sender shared by the billing services
#[derive(Clone)]
pub struct SideEffects {
    audit: Arc<dyn AuditSink>,
    notifier: Arc<dyn NotificationSender>,
}

impl SideEffects {
    pub fn new(audit: Arc<dyn AuditSink>, notifier: Arc<dyn NotificationSender>) -> Self {
        Self { audit, notifier }
    }

    /// Tracing-only audit, no SMS
    pub fn silent() -> Self {
        Self::new(Arc::new(TracingAuditSink), Arc::new(NoopNotificationSender))
    }

    pub async fn audit(&self, entry: AuditEntry) {
        let action = entry.action.clone();
        if let Err(e) = self.audit.record(entry).await {
            warn!(action = %action, error = %e, "audit write failed");
        }
    }

    pub async fn notify(&self, phone: Option<&str>, text: &str) {
        let Some(phone) = phone.filter(|p| !p.trim().is_empty()) else {
            return;
        };
        if let Err(e) = self.notifier.send(phone, &truncate_message(text)).await {
            warn!(error = %e, "sms send failed");
        }
    }

    pub(crate) async fn notify_new_bill(&self, customer: &Customer, bill: &Bill) {
        let text = new_bill_message(bill);
        self.notify(customer.phone.as_deref(), &text).await;
    }

    pub(crate) async fn notify_credit_full_payment(&self, customer: &Customer, bill: &Bill) {
        let text = credit_full_payment_message(bill, customer);
        self.notify(customer.phone.as_deref(), &text).await;
    }
}

pub fn new_bill_message(bill: &Bill) -> String {
    format!(
        "New water bill {} issued for {}. Due on {}.",
        bill.id,
        bill.net_amount_due.round_to_currency(),
        bill.due_date.format("%b %-d, %Y")
    )
}

pub fn credit_full_payment_message(bill: &Bill, customer: &Customer) -> String {
    format!(
        "Your bill {} has been fully paid using your credit balance. Remaining credit: {}.",
        bill.id,
        customer.credit_balance.round_to_currency()
    )
}
