//! PostgreSQL billing store
//!
//! Reads run on the pool. A [`PgUnitOfWork`] wraps one database
//! transaction; its `lock_*` methods take `FOR UPDATE` row locks so that two
//! writers on the same customer or bill are serialized by Postgres. Dropping
//! the unit of work without `commit` rolls the transaction back.

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{debug, instrument};

use core_kernel::{
    BillId, BillingPeriod, CustomerId, DomainPort, HealthCheckResult, HealthCheckable, Money,
    PaymentId, PortError,
};
use domain_billing::{
    Bill, BillFilter, BillingStore, BillingUnitOfWork, CreditTransaction, Customer,
    PaymentFilter, PaymentRecord,
};

use crate::error::DatabaseError;
use crate::repositories::{bill as bills, credit, customer as customers, payment as payments};

const ADAPTER_ID: &str = "postgres-billing-store";

/// PostgreSQL-backed implementation of [`BillingStore`]
#[derive(Debug, Clone)]
pub struct PostgresBillingStore {
    pool: PgPool,
}

impl PostgresBillingStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl DomainPort for PostgresBillingStore {}

#[async_trait]
impl HealthCheckable for PostgresBillingStore {
    async fn health_check(&self) -> HealthCheckResult {
        super::ping(&self.pool, ADAPTER_ID).await
    }
}

#[async_trait]
impl BillingStore for PostgresBillingStore {
    #[instrument(skip(self))]
    async fn get_customer(&self, id: CustomerId) -> Result<Customer, PortError> {
        Ok(customers::fetch_customer(&self.pool, id, false).await?)
    }

    #[instrument(skip(self))]
    async fn get_bill(&self, id: BillId) -> Result<Bill, PortError> {
        Ok(bills::fetch_bill(&self.pool, id, false).await?)
    }

    #[instrument(skip(self))]
    async fn list_bills(&self, filter: BillFilter) -> Result<Vec<Bill>, PortError> {
        let found = bills::list_bills(&self.pool, &filter).await?;
        debug!(count = found.len(), "bills listed");
        Ok(found)
    }

    #[instrument(skip(self))]
    async fn find_payment(&self, id: PaymentId) -> Result<PaymentRecord, PortError> {
        Ok(payments::fetch_payment(&self.pool, id, false).await?)
    }

    #[instrument(skip(self))]
    async fn list_payments(&self, filter: PaymentFilter) -> Result<Vec<PaymentRecord>, PortError> {
        Ok(payments::list_payments(&self.pool, &filter).await?)
    }

    #[instrument(skip(self))]
    async fn list_credit_transactions(
        &self,
        customer_id: CustomerId,
    ) -> Result<Vec<CreditTransaction>, PortError> {
        Ok(credit::list_transactions(&self.pool, customer_id).await?)
    }

    async fn begin(&self) -> Result<Box<dyn BillingUnitOfWork>, PortError> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(DatabaseError::from)?;
        Ok(Box::new(PgUnitOfWork { tx }))
    }

    async fn list_overdue_bills(&self, as_of: NaiveDate) -> Result<Vec<Bill>, PortError> {
        self.list_bills(BillFilter::PenaltyCandidates { as_of }).await
    }
}

/// One open database transaction
pub struct PgUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl BillingUnitOfWork for PgUnitOfWork {
    async fn lock_customer(&mut self, id: CustomerId) -> Result<Customer, PortError> {
        Ok(customers::fetch_customer(&mut *self.tx, id, true).await?)
    }

    async fn lock_bill(&mut self, id: BillId) -> Result<Bill, PortError> {
        Ok(bills::fetch_bill(&mut *self.tx, id, true).await?)
    }

    async fn lock_payment(&mut self, id: PaymentId) -> Result<PaymentRecord, PortError> {
        Ok(payments::fetch_payment(&mut *self.tx, id, true).await?)
    }

    async fn ledger_balance(&mut self, customer_id: CustomerId) -> Result<Money, PortError> {
        Ok(credit::ledger_balance(&mut *self.tx, customer_id).await?)
    }

    async fn has_active_bill_in_period(
        &mut self,
        customer_id: CustomerId,
        period: BillingPeriod,
    ) -> Result<bool, PortError> {
        Ok(bills::has_active_bill_in_period(&mut *self.tx, customer_id, period).await?)
    }

    async fn receipt_exists(&mut self, receipt_number: &str) -> Result<bool, PortError> {
        Ok(payments::receipt_exists(&mut *self.tx, receipt_number).await?)
    }

    async fn insert_bill(&mut self, bill: &Bill) -> Result<(), PortError> {
        Ok(bills::insert_bill(&mut *self.tx, bill).await?)
    }

    async fn update_bill(&mut self, bill: &Bill) -> Result<(), PortError> {
        Ok(bills::update_bill(&mut *self.tx, bill).await?)
    }

    async fn update_customer_balance(
        &mut self,
        customer_id: CustomerId,
        balance: Money,
    ) -> Result<(), PortError> {
        Ok(customers::update_balance(&mut *self.tx, customer_id, balance).await?)
    }

    async fn append_credit_transaction(
        &mut self,
        transaction: &CreditTransaction,
    ) -> Result<(), PortError> {
        Ok(credit::append_transaction(&mut *self.tx, transaction).await?)
    }

    async fn insert_payment(&mut self, payment: &PaymentRecord) -> Result<(), PortError> {
        Ok(payments::insert_payment(&mut *self.tx, payment).await?)
    }

    async fn update_payment(&mut self, payment: &PaymentRecord) -> Result<(), PortError> {
        Ok(payments::update_payment(&mut *self.tx, payment).await?)
    }

    async fn commit(self: Box<Self>) -> Result<(), PortError> {
        self.tx
            .commit()
            .await
            .map_err(|e| DatabaseError::TransactionFailed(e.to_string()))?;
        Ok(())
    }
}
