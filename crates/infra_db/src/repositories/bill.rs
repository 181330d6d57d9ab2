//! Bill repository
//!
//! Every [`BillFilter`] variant maps to one fixed, parameterized statement.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::PgExecutor;
use uuid::Uuid;

use core_kernel::{BillId, BillingPeriod, CustomerId, Money};
use domain_billing::{Bill, BillFilter, BillStatus as DomainBillStatus};

use crate::error::DatabaseError;

const BILL_COLUMNS: &str = r#"
    bill_id, customer_id, meter_number, previous_reading, current_reading,
    consumption, gross_amount, credit_applied, net_amount_due, amount_paid,
    penalty, penalty_paid, billing_date, due_date, status, archived,
    created_at, updated_at
"#;

/// Bill status as stored in PostgreSQL
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "bill_status", rename_all = "snake_case")]
pub enum BillStatus {
    Unpaid,
    Pending,
    PartiallyPaid,
    Paid,
    Overdue,
    Rejected,
}

impl From<DomainBillStatus> for BillStatus {
    fn from(status: DomainBillStatus) -> Self {
        match status {
            DomainBillStatus::Unpaid => BillStatus::Unpaid,
            DomainBillStatus::Pending => BillStatus::Pending,
            DomainBillStatus::PartiallyPaid => BillStatus::PartiallyPaid,
            DomainBillStatus::Paid => BillStatus::Paid,
            DomainBillStatus::Overdue => BillStatus::Overdue,
            DomainBillStatus::Rejected => BillStatus::Rejected,
        }
    }
}

impl From<BillStatus> for DomainBillStatus {
    fn from(status: BillStatus) -> Self {
        match status {
            BillStatus::Unpaid => DomainBillStatus::Unpaid,
            BillStatus::Pending => DomainBillStatus::Pending,
            BillStatus::PartiallyPaid => DomainBillStatus::PartiallyPaid,
            BillStatus::Paid => DomainBillStatus::Paid,
            BillStatus::Overdue => DomainBillStatus::Overdue,
            BillStatus::Rejected => DomainBillStatus::Rejected,
        }
    }
}

/// Database row for a bill
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct BillRow {
    pub bill_id: Uuid,
    pub customer_id: Uuid,
    pub meter_number: String,
    pub previous_reading: Decimal,
    pub current_reading: Decimal,
    pub consumption: Decimal,
    pub gross_amount: Decimal,
    pub credit_applied: Decimal,
    pub net_amount_due: Decimal,
    pub amount_paid: Decimal,
    pub penalty: Decimal,
    pub penalty_paid: Decimal,
    pub billing_date: NaiveDate,
    pub due_date: NaiveDate,
    pub status: BillStatus,
    pub archived: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<BillRow> for Bill {
    fn from(row: BillRow) -> Self {
        Bill {
            id: BillId::from_uuid(row.bill_id),
            customer_id: CustomerId::from_uuid(row.customer_id),
            meter_number: row.meter_number,
            previous_reading: row.previous_reading,
            current_reading: row.current_reading,
            consumption: row.consumption,
            gross_amount: Money::new(row.gross_amount),
            credit_applied: Money::new(row.credit_applied),
            net_amount_due: Money::new(row.net_amount_due),
            amount_paid: Money::new(row.amount_paid),
            penalty: Money::new(row.penalty),
            penalty_paid: Money::new(row.penalty_paid),
            billing_date: row.billing_date,
            due_date: row.due_date,
            status: row.status.into(),
            archived: row.archived,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

pub async fn fetch_bill<'e>(
    executor: impl PgExecutor<'e>,
    id: BillId,
    for_update: bool,
) -> Result<Bill, DatabaseError> {
    let lock = if for_update { "FOR UPDATE" } else { "" };
    let sql = format!("SELECT {} FROM bills WHERE bill_id = $1 {}", BILL_COLUMNS, lock);
    sqlx::query_as::<_, BillRow>(&sql)
        .bind(Uuid::from(id))
        .fetch_optional(executor)
        .await?
        .map(Bill::from)
        .ok_or_else(|| DatabaseError::not_found("Bill", id))
}

/// Bills matching `filter`, oldest due date first
pub async fn list_bills<'e>(
    executor: impl PgExecutor<'e>,
    filter: &BillFilter,
) -> Result<Vec<Bill>, DatabaseError> {
    let order = "ORDER BY due_date, bill_id";
    let rows = match filter {
        BillFilter::All => {
            let sql = format!("SELECT {} FROM bills {}", BILL_COLUMNS, order);
            sqlx::query_as::<_, BillRow>(&sql).fetch_all(executor).await?
        }
        BillFilter::Customer(customer_id) => {
            let sql = format!(
                "SELECT {} FROM bills WHERE customer_id = $1 {}",
                BILL_COLUMNS, order
            );
            sqlx::query_as::<_, BillRow>(&sql)
                .bind(Uuid::from(*customer_id))
                .fetch_all(executor)
                .await?
        }
        BillFilter::Status(status) => {
            let sql = format!("SELECT {} FROM bills WHERE status = $1 {}", BILL_COLUMNS, order);
            sqlx::query_as::<_, BillRow>(&sql)
                .bind(BillStatus::from(*status))
                .fetch_all(executor)
                .await?
        }
        BillFilter::CustomerAndStatus(customer_id, status) => {
            let sql = format!(
                "SELECT {} FROM bills WHERE customer_id = $1 AND status = $2 {}",
                BILL_COLUMNS, order
            );
            sqlx::query_as::<_, BillRow>(&sql)
                .bind(Uuid::from(*customer_id))
                .bind(BillStatus::from(*status))
                .fetch_all(executor)
                .await?
        }
        BillFilter::PenaltyCandidates { as_of } => {
            let sql = format!(
                r#"SELECT {} FROM bills
                   WHERE NOT archived
                     AND status IN ('unpaid', 'overdue', 'pending')
                     AND due_date < $1
                   {}"#,
                BILL_COLUMNS, order
            );
            sqlx::query_as::<_, BillRow>(&sql)
                .bind(*as_of)
                .fetch_all(executor)
                .await?
        }
    };

    Ok(rows.into_iter().map(Bill::from).collect())
}

/// True when the customer has an unarchived bill dated inside `period`
pub async fn has_active_bill_in_period<'e>(
    executor: impl PgExecutor<'e>,
    customer_id: CustomerId,
    period: BillingPeriod,
) -> Result<bool, DatabaseError> {
    let (Some(start), Some(end)) = (period.first_day(), period.next_first_day()) else {
        return Err(DatabaseError::SerializationError(format!(
            "billing period {}-{} has no calendar bounds",
            period.year, period.month
        )));
    };

    let exists = sqlx::query_scalar::<_, bool>(
        r#"
        SELECT EXISTS (
            SELECT 1 FROM bills
            WHERE customer_id = $1
              AND NOT archived
              AND billing_date >= $2
              AND billing_date < $3
        )
        "#,
    )
    .bind(Uuid::from(customer_id))
    .bind(start)
    .bind(end)
    .fetch_one(executor)
    .await?;

    Ok(exists)
}

pub async fn insert_bill<'e>(executor: impl PgExecutor<'e>, bill: &Bill) -> Result<(), DatabaseError> {
    sqlx::query(
        r#"
        INSERT INTO bills (
            bill_id, customer_id, meter_number, previous_reading, current_reading,
            consumption, gross_amount, credit_applied, net_amount_due, amount_paid,
            penalty, penalty_paid, billing_date, due_date, status, archived,
            created_at, updated_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
        "#,
    )
    .bind(Uuid::from(bill.id))
    .bind(Uuid::from(bill.customer_id))
    .bind(&bill.meter_number)
    .bind(bill.previous_reading)
    .bind(bill.current_reading)
    .bind(bill.consumption)
    .bind(bill.gross_amount.amount())
    .bind(bill.credit_applied.amount())
    .bind(bill.net_amount_due.amount())
    .bind(bill.amount_paid.amount())
    .bind(bill.penalty.amount())
    .bind(bill.penalty_paid.amount())
    .bind(bill.billing_date)
    .bind(bill.due_date)
    .bind(BillStatus::from(bill.status))
    .bind(bill.archived)
    .bind(bill.created_at)
    .bind(bill.updated_at)
    .execute(executor)
    .await?;

    Ok(())
}

/// Writes the mutable columns of a bill
pub async fn update_bill<'e>(executor: impl PgExecutor<'e>, bill: &Bill) -> Result<(), DatabaseError> {
    let result = sqlx::query(
        r#"
        UPDATE bills
        SET credit_applied = $2,
            net_amount_due = $3,
            amount_paid = $4,
            penalty = $5,
            penalty_paid = $6,
            status = $7,
            archived = $8,
            updated_at = $9
        WHERE bill_id = $1
        "#,
    )
    .bind(Uuid::from(bill.id))
    .bind(bill.credit_applied.amount())
    .bind(bill.net_amount_due.amount())
    .bind(bill.amount_paid.amount())
    .bind(bill.penalty.amount())
    .bind(bill.penalty_paid.amount())
    .bind(BillStatus::from(bill.status))
    .bind(bill.archived)
    .bind(bill.updated_at)
    .execute(executor)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::not_found("Bill", bill.id));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping_is_lossless() {
        for status in [
            DomainBillStatus::Unpaid,
            DomainBillStatus::Pending,
            DomainBillStatus::PartiallyPaid,
            DomainBillStatus::Paid,
            DomainBillStatus::Overdue,
            DomainBillStatus::Rejected,
        ] {
            assert_eq!(DomainBillStatus::from(BillStatus::from(status)), status);
        }
    }
}
