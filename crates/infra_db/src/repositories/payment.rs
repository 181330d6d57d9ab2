//! Payment repository

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgExecutor;
use uuid::Uuid;

use core_kernel::{BillId, CustomerId, Money, PaymentId};
use domain_billing::{
    PaymentChannel as DomainPaymentChannel, PaymentFilter, PaymentMethod as DomainPaymentMethod,
    PaymentRecord, PaymentStatus as DomainPaymentStatus,
};

use crate::error::DatabaseError;

const PAYMENT_COLUMNS: &str = r#"
    payment_id, customer_id, bill_id, amount, amount_paid, penalty_paid,
    change_given, credited_excess, method, channel, receipt_number,
    proof_location, status, notes, recorded_by, reviewed_by, reviewed_at,
    created_at, updated_at
"#;

/// Payment status as stored in PostgreSQL
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "payment_status", rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Rejected,
}

/// Payment method as stored in PostgreSQL
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "payment_method", rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Check,
    BankTransfer,
    EWallet,
    Credit,
    Other,
}

/// Payment channel as stored in PostgreSQL
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "payment_channel", rename_all = "snake_case")]
pub enum PaymentChannel {
    Cashier,
    Online,
    CreditBalance,
}

impl From<DomainPaymentStatus> for PaymentStatus {
    fn from(status: DomainPaymentStatus) -> Self {
        match status {
            DomainPaymentStatus::Pending => PaymentStatus::Pending,
            DomainPaymentStatus::Paid => PaymentStatus::Paid,
            DomainPaymentStatus::Rejected => PaymentStatus::Rejected,
        }
    }
}

impl From<PaymentStatus> for DomainPaymentStatus {
    fn from(status: PaymentStatus) -> Self {
        match status {
            PaymentStatus::Pending => DomainPaymentStatus::Pending,
            PaymentStatus::Paid => DomainPaymentStatus::Paid,
            PaymentStatus::Rejected => DomainPaymentStatus::Rejected,
        }
    }
}

impl From<DomainPaymentMethod> for PaymentMethod {
    fn from(method: DomainPaymentMethod) -> Self {
        match method {
            DomainPaymentMethod::Cash => PaymentMethod::Cash,
            DomainPaymentMethod::Check => PaymentMethod::Check,
            DomainPaymentMethod::BankTransfer => PaymentMethod::BankTransfer,
            DomainPaymentMethod::EWallet => PaymentMethod::EWallet,
            DomainPaymentMethod::Credit => PaymentMethod::Credit,
            DomainPaymentMethod::Other => PaymentMethod::Other,
        }
    }
}

impl From<PaymentMethod> for DomainPaymentMethod {
    fn from(method: PaymentMethod) -> Self {
        match method {
            PaymentMethod::Cash => DomainPaymentMethod::Cash,
            PaymentMethod::Check => DomainPaymentMethod::Check,
            PaymentMethod::BankTransfer => DomainPaymentMethod::BankTransfer,
            PaymentMethod::EWallet => DomainPaymentMethod::EWallet,
            PaymentMethod::Credit => DomainPaymentMethod::Credit,
            PaymentMethod::Other => DomainPaymentMethod::Other,
        }
    }
}

impl From<DomainPaymentChannel> for PaymentChannel {
    fn from(channel: DomainPaymentChannel) -> Self {
        match channel {
            DomainPaymentChannel::Cashier => PaymentChannel::Cashier,
            DomainPaymentChannel::Online => PaymentChannel::Online,
            DomainPaymentChannel::CreditBalance => PaymentChannel::CreditBalance,
        }
    }
}

impl From<PaymentChannel> for DomainPaymentChannel {
    fn from(channel: PaymentChannel) -> Self {
        match channel {
            PaymentChannel::Cashier => DomainPaymentChannel::Cashier,
            PaymentChannel::Online => DomainPaymentChannel::Online,
            PaymentChannel::CreditBalance => DomainPaymentChannel::CreditBalance,
        }
    }
}

/// Database row for a payment
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PaymentRow {
    pub payment_id: Uuid,
    pub customer_id: Uuid,
    pub bill_id: Uuid,
    pub amount: Decimal,
    pub amount_paid: Decimal,
    pub penalty_paid: Decimal,
    pub change_given: Decimal,
    pub credited_excess: Decimal,
    pub method: PaymentMethod,
    pub channel: PaymentChannel,
    pub receipt_number: String,
    pub proof_location: Option<String>,
    pub status: PaymentStatus,
    pub notes: Option<String>,
    pub recorded_by: String,
    pub reviewed_by: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<PaymentRow> for PaymentRecord {
    fn from(row: PaymentRow) -> Self {
        PaymentRecord {
            id: PaymentId::from_uuid(row.payment_id),
            customer_id: CustomerId::from_uuid(row.customer_id),
            bill_id: BillId::from_uuid(row.bill_id),
            amount: Money::new(row.amount),
            amount_paid: Money::new(row.amount_paid),
            penalty_paid: Money::new(row.penalty_paid),
            change_given: Money::new(row.change_given),
            credited_excess: Money::new(row.credited_excess),
            method: row.method.into(),
            channel: row.channel.into(),
            receipt_number: row.receipt_number,
            proof_location: row.proof_location,
            status: row.status.into(),
            notes: row.notes,
            recorded_by: row.recorded_by,
            reviewed_by: row.reviewed_by,
            reviewed_at: row.reviewed_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

pub async fn fetch_payment<'e>(
    executor: impl PgExecutor<'e>,
    id: PaymentId,
    for_update: bool,
) -> Result<PaymentRecord, DatabaseError> {
    let lock = if for_update { "FOR UPDATE" } else { "" };
    let sql = format!(
        "SELECT {} FROM payments WHERE payment_id = $1 {}",
        PAYMENT_COLUMNS, lock
    );
    sqlx::query_as::<_, PaymentRow>(&sql)
        .bind(Uuid::from(id))
        .fetch_optional(executor)
        .await?
        .map(PaymentRecord::from)
        .ok_or_else(|| DatabaseError::not_found("Payment", id))
}

/// Payments matching `filter`, newest first
pub async fn list_payments<'e>(
    executor: impl PgExecutor<'e>,
    filter: &PaymentFilter,
) -> Result<Vec<PaymentRecord>, DatabaseError> {
    let order = "ORDER BY created_at DESC, payment_id DESC";
    let rows = match filter {
        PaymentFilter::Bill(bill_id) => {
            let sql = format!(
                "SELECT {} FROM payments WHERE bill_id = $1 {}",
                PAYMENT_COLUMNS, order
            );
            sqlx::query_as::<_, PaymentRow>(&sql)
                .bind(Uuid::from(*bill_id))
                .fetch_all(executor)
                .await?
        }
        PaymentFilter::Customer(customer_id) => {
            let sql = format!(
                "SELECT {} FROM payments WHERE customer_id = $1 {}",
                PAYMENT_COLUMNS, order
            );
            sqlx::query_as::<_, PaymentRow>(&sql)
                .bind(Uuid::from(*customer_id))
                .fetch_all(executor)
                .await?
        }
        PaymentFilter::Status(status) => {
            let sql = format!(
                "SELECT {} FROM payments WHERE status = $1 {}",
                PAYMENT_COLUMNS, order
            );
            sqlx::query_as::<_, PaymentRow>(&sql)
                .bind(PaymentStatus::from(*status))
                .fetch_all(executor)
                .await?
        }
    };

    Ok(rows.into_iter().map(PaymentRecord::from).collect())
}

pub async fn receipt_exists<'e>(
    executor: impl PgExecutor<'e>,
    receipt_number: &str,
) -> Result<bool, DatabaseError> {
    let exists = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS (SELECT 1 FROM payments WHERE receipt_number = $1)",
    )
    .bind(receipt_number)
    .fetch_one(executor)
    .await?;
    Ok(exists)
}

/// Inserts a payment; a taken receipt number surfaces as a duplicate entry
pub async fn insert_payment<'e>(
    executor: impl PgExecutor<'e>,
    payment: &PaymentRecord,
) -> Result<(), DatabaseError> {
    sqlx::query(
        r#"
        INSERT INTO payments (
            payment_id, customer_id, bill_id, amount, amount_paid, penalty_paid,
            change_given, credited_excess, method, channel, receipt_number,
            proof_location, status, notes, recorded_by, reviewed_by, reviewed_at,
            created_at, updated_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19)
        "#,
    )
    .bind(Uuid::from(payment.id))
    .bind(Uuid::from(payment.customer_id))
    .bind(Uuid::from(payment.bill_id))
    .bind(payment.amount.amount())
    .bind(payment.amount_paid.amount())
    .bind(payment.penalty_paid.amount())
    .bind(payment.change_given.amount())
    .bind(payment.credited_excess.amount())
    .bind(PaymentMethod::from(payment.method))
    .bind(PaymentChannel::from(payment.channel))
    .bind(&payment.receipt_number)
    .bind(&payment.proof_location)
    .bind(PaymentStatus::from(payment.status))
    .bind(&payment.notes)
    .bind(&payment.recorded_by)
    .bind(&payment.reviewed_by)
    .bind(payment.reviewed_at)
    .bind(payment.created_at)
    .bind(payment.updated_at)
    .execute(executor)
    .await?;

    Ok(())
}

/// Writes the settlement and review columns of a payment
pub async fn update_payment<'e>(
    executor: impl PgExecutor<'e>,
    payment: &PaymentRecord,
) -> Result<(), DatabaseError> {
    let result = sqlx::query(
        r#"
        UPDATE payments
        SET amount_paid = $2,
            penalty_paid = $3,
            change_given = $4,
            credited_excess = $5,
            status = $6,
            notes = $7,
            reviewed_by = $8,
            reviewed_at = $9,
            updated_at = $10
        WHERE payment_id = $1
        "#,
    )
    .bind(Uuid::from(payment.id))
    .bind(payment.amount_paid.amount())
    .bind(payment.penalty_paid.amount())
    .bind(payment.change_given.amount())
    .bind(payment.credited_excess.amount())
    .bind(PaymentStatus::from(payment.status))
    .bind(&payment.notes)
    .bind(&payment.reviewed_by)
    .bind(payment.reviewed_at)
    .bind(payment.updated_at)
    .execute(executor)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::not_found("Payment", payment.id));
    }
    Ok(())
}
