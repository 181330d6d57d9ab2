//! Storage and configuration ports for the billing domain
//!
//! Services read through [`BillingStore`] and mutate only inside a
//! [`BillingUnitOfWork`] obtained from [`BillingStore::begin`]. A unit of
//! work that is dropped without `commit` rolls back.
//!
//! Lock order inside a unit of work is customer, then bill, then payment.

use async_trait::async_trait;
use chrono::NaiveDate;

use core_kernel::{
    BillId, BillingPeriod, CustomerId, DomainPort, HealthCheckable, Money, PaymentId, PortError,
};

use crate::bill::{Bill, BillStatus};
use crate::credit::CreditTransaction;
use crate::customer::Customer;
use crate::payment::{PaymentRecord, PaymentStatus};
use crate::rate_schedule::RateTier;

/// Fixed bill queries
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BillFilter {
    All,
    Customer(CustomerId),
    Status(BillStatus),
    CustomerAndStatus(CustomerId, BillStatus),
    /// Unarchived Unpaid, Overdue or Pending bills due before `as_of`
    PenaltyCandidates { as_of: NaiveDate },
}

impl BillFilter {
    pub fn matches(&self, bill: &Bill) -> bool {
        match self {
            BillFilter::All => true,
            BillFilter::Customer(id) => bill.customer_id == *id,
            BillFilter::Status(status) => bill.status == *status,
            BillFilter::CustomerAndStatus(id, status) => {
                bill.customer_id == *id && bill.status == *status
            }
            BillFilter::PenaltyCandidates { as_of } => {
                !bill.archived && bill.status.accrues_penalty() && bill.due_date < *as_of
            }
        }
    }
}

/// Fixed payment queries
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentFilter {
    Bill(BillId),
    Customer(CustomerId),
    Status(PaymentStatus),
}

impl PaymentFilter {
    pub fn matches(&self, payment: &PaymentRecord) -> bool {
        match self {
            PaymentFilter::Bill(id) => payment.bill_id == *id,
            PaymentFilter::Customer(id) => payment.customer_id == *id,
            PaymentFilter::Status(status) => payment.status == *status,
        }
    }
}

/// Billing persistence
#[async_trait]
pub trait BillingStore: DomainPort + HealthCheckable {
    async fn get_customer(&self, id: CustomerId) -> Result<Customer, PortError>;

    async fn get_bill(&self, id: BillId) -> Result<Bill, PortError>;

    /// Bills matching `filter`, oldest due date first
    async fn list_bills(&self, filter: BillFilter) -> Result<Vec<Bill>, PortError>;

    async fn find_payment(&self, id: PaymentId) -> Result<PaymentRecord, PortError>;

    /// Payments matching `filter`, newest first
    async fn list_payments(&self, filter: PaymentFilter) -> Result<Vec<PaymentRecord>, PortError>;

    /// Credit transactions for a customer, newest first
    async fn list_credit_transactions(
        &self,
        customer_id: CustomerId,
    ) -> Result<Vec<CreditTransaction>, PortError>;

    /// Starts a unit of work
    async fn begin(&self) -> Result<Box<dyn BillingUnitOfWork>, PortError>;

    async fn list_overdue_bills(&self, as_of: NaiveDate) -> Result<Vec<Bill>, PortError> {
        self.list_bills(BillFilter::PenaltyCandidates { as_of }).await
    }

    async fn list_customer_bills(&self, customer_id: CustomerId) -> Result<Vec<Bill>, PortError> {
        self.list_bills(BillFilter::Customer(customer_id)).await
    }

    async fn list_payments_for_bill(&self, bill_id: BillId) -> Result<Vec<PaymentRecord>, PortError> {
        self.list_payments(PaymentFilter::Bill(bill_id)).await
    }
}

/// A single atomic write set
#[async_trait]
pub trait BillingUnitOfWork: Send {
    /// Locks and returns the customer row
    async fn lock_customer(&mut self, id: CustomerId) -> Result<Customer, PortError>;

    /// Locks and returns the bill row
    async fn lock_bill(&mut self, id: BillId) -> Result<Bill, PortError>;

    /// Locks and returns the payment row
    async fn lock_payment(&mut self, id: PaymentId) -> Result<PaymentRecord, PortError>;

    /// Sum of the customer's signed credit transactions
    async fn ledger_balance(&mut self, customer_id: CustomerId) -> Result<Money, PortError>;

    /// True when an unarchived bill exists for the customer in `period`
    async fn has_active_bill_in_period(
        &mut self,
        customer_id: CustomerId,
        period: BillingPeriod,
    ) -> Result<bool, PortError>;

    async fn receipt_exists(&mut self, receipt_number: &str) -> Result<bool, PortError>;

    async fn insert_bill(&mut self, bill: &Bill) -> Result<(), PortError>;

    async fn update_bill(&mut self, bill: &Bill) -> Result<(), PortError>;

    async fn update_customer_balance(
        &mut self,
        customer_id: CustomerId,
        balance: Money,
    ) -> Result<(), PortError>;

    async fn append_credit_transaction(
        &mut self,
        transaction: &CreditTransaction,
    ) -> Result<(), PortError>;

    /// Fails with a Conflict when the receipt number is taken
    async fn insert_payment(&mut self, payment: &PaymentRecord) -> Result<(), PortError>;

    async fn update_payment(&mut self, payment: &PaymentRecord) -> Result<(), PortError>;

    async fn commit(self: Box<Self>) -> Result<(), PortError>;
}

/// Business configuration source
#[async_trait]
pub trait SettingsProvider: DomainPort {
    /// Raw value for `key`, `None` when unset
    async fn get_setting(&self, key: &str) -> Result<Option<String>, PortError>;

    async fn put_setting(&self, key: &str, value: &str) -> Result<(), PortError>;

    async fn rate_tiers(&self) -> Result<Vec<RateTier>, PortError>;

    /// Replaces every tier in one step
    async fn replace_rate_tiers(&self, tiers: &[RateTier]) -> Result<(), PortError>;
}

/// In-memory adapters for tests
#[cfg(any(test, feature = "mock"))]
pub mod mock {
    use super::*;
    use core_kernel::{AdapterHealth, HealthCheckResult};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

    use crate::credit::{CreditReference, ReferenceKind, TransactionType};

    /// A write that an [`InMemoryBillingStore`] can be told to fail
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum FailPoint {
        InsertBill,
        UpdateBill,
        UpdateCustomerBalance,
        AppendCreditTransaction,
        InsertPayment,
        UpdatePayment,
        Commit,
    }

    #[derive(Debug, Clone, Default)]
    struct StoreState {
        customers: HashMap<CustomerId, Customer>,
        bills: HashMap<BillId, Bill>,
        payments: HashMap<PaymentId, PaymentRecord>,
        transactions: Vec<CreditTransaction>,
        fail_point: Option<FailPoint>,
    }

    /// In-memory billing store
    ///
    /// A unit of work holds the store mutex for its whole lifetime, so units
    /// of work are fully serialized, standing in for row locks.
    #[derive(Debug, Clone, Default)]
    pub struct InMemoryBillingStore {
        state: Arc<Mutex<StoreState>>,
    }

    impl InMemoryBillingStore {
        pub fn new() -> Self {
            Self::default()
        }

        /// Adds a customer; a positive balance is backed by an opening ledger entry
        pub async fn seed_customer(&self, customer: Customer) {
            let mut state = self.state.lock().await;
            if customer.credit_balance.is_positive() {
                state.transactions.push(CreditTransaction::new(
                    customer.id,
                    TransactionType::Credit,
                    customer.credit_balance,
                    Money::ZERO,
                    customer.credit_balance,
                    "Opening balance",
                    Some(CreditReference::new(ReferenceKind::OpeningBalance)),
                    "seed",
                ));
            }
            state.customers.insert(customer.id, customer);
        }

        pub async fn seed_bill(&self, bill: Bill) {
            self.state.lock().await.bills.insert(bill.id, bill);
        }

        /// Overwrites the cached balance without a ledger entry
        pub async fn corrupt_balance(&self, customer_id: CustomerId, balance: Money) {
            if let Some(customer) = self.state.lock().await.customers.get_mut(&customer_id) {
                customer.credit_balance = balance;
            }
        }

        /// The next unit of work fails at `point`
        pub async fn fail_next(&self, point: FailPoint) {
            self.state.lock().await.fail_point = Some(point);
        }

        pub async fn customer(&self, id: CustomerId) -> Option<Customer> {
            self.state.lock().await.customers.get(&id).cloned()
        }

        pub async fn bill(&self, id: BillId) -> Option<Bill> {
            self.state.lock().await.bills.get(&id).cloned()
        }

        pub async fn transaction_count(&self) -> usize {
            self.state.lock().await.transactions.len()
        }

        pub async fn payment_count(&self) -> usize {
            self.state.lock().await.payments.len()
        }
    }

    impl DomainPort for InMemoryBillingStore {}

    #[async_trait]
    impl HealthCheckable for InMemoryBillingStore {
        async fn health_check(&self) -> HealthCheckResult {
            HealthCheckResult::healthy("in-memory-billing-store")
        }
    }

    #[async_trait]
    impl BillingStore for InMemoryBillingStore {
        async fn get_customer(&self, id: CustomerId) -> Result<Customer, PortError> {
            self.state
                .lock()
                .await
                .customers
                .get(&id)
                .cloned()
                .ok_or_else(|| PortError::not_found("Customer", id))
        }

        async fn get_bill(&self, id: BillId) -> Result<Bill, PortError> {
            self.state
                .lock()
                .await
                .bills
                .get(&id)
                .cloned()
                .ok_or_else(|| PortError::not_found("Bill", id))
        }

        async fn list_bills(&self, filter: BillFilter) -> Result<Vec<Bill>, PortError> {
            let state = self.state.lock().await;
            let mut bills: Vec<Bill> = state
                .bills
                .values()
                .filter(|b| filter.matches(b))
                .cloned()
                .collect();
            bills.sort_by(|a, b| a.due_date.cmp(&b.due_date).then(a.id.cmp(&b.id)));
            Ok(bills)
        }

        async fn find_payment(&self, id: PaymentId) -> Result<PaymentRecord, PortError> {
            self.state
                .lock()
                .await
                .payments
                .get(&id)
                .cloned()
                .ok_or_else(|| PortError::not_found("Payment", id))
        }

        async fn list_payments(&self, filter: PaymentFilter) -> Result<Vec<PaymentRecord>, PortError> {
            let state = self.state.lock().await;
            let mut payments: Vec<PaymentRecord> = state
                .payments
                .values()
                .filter(|p| filter.matches(p))
                .cloned()
                .collect();
            payments.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
            Ok(payments)
        }

        async fn list_credit_transactions(
            &self,
            customer_id: CustomerId,
        ) -> Result<Vec<CreditTransaction>, PortError> {
            let state = self.state.lock().await;
            Ok(state
                .transactions
                .iter()
                .rev()
                .filter(|t| t.customer_id == customer_id)
                .cloned()
                .collect())
        }

        async fn begin(&self) -> Result<Box<dyn BillingUnitOfWork>, PortError> {
            let mut guard = self.state.clone().lock_owned().await;
            let fail_point = guard.fail_point.take();
            let staged = guard.clone();
            Ok(Box::new(InMemoryUnitOfWork {
                guard,
                staged,
                fail_point,
            }))
        }
    }

    /// Unit of work over a staged copy of the store
    pub struct InMemoryUnitOfWork {
        guard: OwnedMutexGuard<StoreState>,
        staged: StoreState,
        fail_point: Option<FailPoint>,
    }

    impl InMemoryUnitOfWork {
        fn check(&self, point: FailPoint) -> Result<(), PortError> {
            if self.fail_point == Some(point) {
                return Err(PortError::internal(format!("injected failure at {:?}", point)));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl BillingUnitOfWork for InMemoryUnitOfWork {
        async fn lock_customer(&mut self, id: CustomerId) -> Result<Customer, PortError> {
            self.staged
                .customers
                .get(&id)
                .cloned()
                .ok_or_else(|| PortError::not_found("Customer", id))
        }

        async fn lock_bill(&mut self, id: BillId) -> Result<Bill, PortError> {
            self.staged
                .bills
                .get(&id)
                .cloned()
                .ok_or_else(|| PortError::not_found("Bill", id))
        }

        async fn lock_payment(&mut self, id: PaymentId) -> Result<PaymentRecord, PortError> {
            self.staged
                .payments
                .get(&id)
                .cloned()
                .ok_or_else(|| PortError::not_found("Payment", id))
        }

        async fn ledger_balance(&mut self, customer_id: CustomerId) -> Result<Money, PortError> {
            Ok(self
                .staged
                .transactions
                .iter()
                .filter(|t| t.customer_id == customer_id)
                .map(CreditTransaction::signed_amount)
                .sum())
        }

        async fn has_active_bill_in_period(
            &mut self,
            customer_id: CustomerId,
            period: BillingPeriod,
        ) -> Result<bool, PortError> {
            Ok(self.staged.bills.values().any(|b| {
                b.customer_id == customer_id && !b.archived && b.billing_period() == period
            }))
        }

        async fn receipt_exists(&mut self, receipt_number: &str) -> Result<bool, PortError> {
            Ok(self
                .staged
                .payments
                .values()
                .any(|p| p.receipt_number == receipt_number))
        }

        async fn insert_bill(&mut self, bill: &Bill) -> Result<(), PortError> {
            self.check(FailPoint::InsertBill)?;
            self.staged.bills.insert(bill.id, bill.clone());
            Ok(())
        }

        async fn update_bill(&mut self, bill: &Bill) -> Result<(), PortError> {
            self.check(FailPoint::UpdateBill)?;
            match self.staged.bills.get_mut(&bill.id) {
                Some(existing) => {
                    *existing = bill.clone();
                    Ok(())
                }
                None => Err(PortError::not_found("Bill", bill.id)),
            }
        }

        async fn update_customer_balance(
            &mut self,
            customer_id: CustomerId,
            balance: Money,
        ) -> Result<(), PortError> {
            self.check(FailPoint::UpdateCustomerBalance)?;
            match self.staged.customers.get_mut(&customer_id) {
                Some(customer) => {
                    customer.credit_balance = balance;
                    Ok(())
                }
                None => Err(PortError::not_found("Customer", customer_id)),
            }
        }

        async fn append_credit_transaction(
            &mut self,
            transaction: &CreditTransaction,
        ) -> Result<(), PortError> {
            self.check(FailPoint::AppendCreditTransaction)?;
            self.staged.transactions.push(transaction.clone());
            Ok(())
        }

        async fn insert_payment(&mut self, payment: &PaymentRecord) -> Result<(), PortError> {
            self.check(FailPoint::InsertPayment)?;
            if self
                .staged
                .payments
                .values()
                .any(|p| p.receipt_number == payment.receipt_number)
            {
                return Err(PortError::conflict_on(
                    "duplicate receipt number",
                    "payments_receipt_number_key",
                ));
            }
            self.staged.payments.insert(payment.id, payment.clone());
            Ok(())
        }

        async fn update_payment(&mut self, payment: &PaymentRecord) -> Result<(), PortError> {
            self.check(FailPoint::UpdatePayment)?;
            match self.staged.payments.get_mut(&payment.id) {
                Some(existing) => {
                    *existing = payment.clone();
                    Ok(())
                }
                None => Err(PortError::not_found("Payment", payment.id)),
            }
        }

        async fn commit(self: Box<Self>) -> Result<(), PortError> {
            self.check(FailPoint::Commit)?;
            let InMemoryUnitOfWork {
                mut guard, staged, ..
            } = *self;
            *guard = staged;
            Ok(())
        }
    }

    /// In-memory settings provider
    #[derive(Debug, Clone, Default)]
    pub struct InMemorySettingsProvider {
        settings: Arc<RwLock<HashMap<String, String>>>,
        tiers: Arc<RwLock<Vec<RateTier>>>,
        failing: Arc<AtomicBool>,
    }

    impl InMemorySettingsProvider {
        pub fn new() -> Self {
            Self::default()
        }

        pub async fn with_setting(self, key: &str, value: &str) -> Self {
            self.settings
                .write()
                .await
                .insert(key.to_string(), value.to_string());
            self
        }

        /// Makes every read fail
        pub fn fail_all(&self) {
            self.failing.store(true, Ordering::SeqCst);
        }

        fn check(&self) -> Result<(), PortError> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(PortError::ServiceUnavailable {
                    service: "settings".to_string(),
                });
            }
            Ok(())
        }
    }

    impl DomainPort for InMemorySettingsProvider {}

    #[async_trait]
    impl HealthCheckable for InMemorySettingsProvider {
        async fn health_check(&self) -> HealthCheckResult {
            let status = if self.failing.load(Ordering::SeqCst) {
                AdapterHealth::Unhealthy
            } else {
                AdapterHealth::Healthy
            };
            HealthCheckResult {
                status,
                ..HealthCheckResult::healthy("in-memory-settings")
            }
        }
    }

    #[async_trait]
    impl SettingsProvider for InMemorySettingsProvider {
        async fn get_setting(&self, key: &str) -> Result<Option<String>, PortError> {
            self.check()?;
            Ok(self.settings.read().await.get(key).cloned())
        }

        async fn put_setting(&self, key: &str, value: &str) -> Result<(), PortError> {
            self.check()?;
            self.settings
                .write()
                .await
                .insert(key.to_string(), value.to_string());
            Ok(())
        }

        async fn rate_tiers(&self) -> Result<Vec<RateTier>, PortError> {
            self.check()?;
            Ok(self.tiers.read().await.clone())
        }

        async fn replace_rate_tiers(&self, tiers: &[RateTier]) -> Result<(), PortError> {
            self.check()?;
            *self.tiers.write().await = tiers.to_vec();
            Ok(())
        }
    }
}
