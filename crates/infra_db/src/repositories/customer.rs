//! Customer repository
//!
//! Customer rows carry the cached credit balance. The balance column is only
//! written from inside a billing unit of work, next to the ledger entry that
//! justifies it.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{PgExecutor, PgPool};
use tracing::instrument;
use uuid::Uuid;

use core_kernel::{CustomerId, Money};
use domain_billing::Customer;

use crate::error::DatabaseError;

const SELECT_CUSTOMER: &str = r#"
    SELECT customer_id, account_number, name, phone, birthdate,
           credit_balance, credit_limit, created_at, updated_at
    FROM customers
    WHERE customer_id = $1
"#;

const SELECT_CUSTOMER_FOR_UPDATE: &str = r#"
    SELECT customer_id, account_number, name, phone, birthdate,
           credit_balance, credit_limit, created_at, updated_at
    FROM customers
    WHERE customer_id = $1
    FOR UPDATE
"#;

/// Database row for a customer
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CustomerRow {
    pub customer_id: Uuid,
    pub account_number: String,
    pub name: String,
    pub phone: Option<String>,
    pub birthdate: Option<NaiveDate>,
    pub credit_balance: Decimal,
    pub credit_limit: Option<Decimal>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<CustomerRow> for Customer {
    fn from(row: CustomerRow) -> Self {
        Customer {
            id: CustomerId::from_uuid(row.customer_id),
            account_number: row.account_number,
            name: row.name,
            phone: row.phone,
            birthdate: row.birthdate,
            credit_balance: Money::new(row.credit_balance),
            credit_limit: row.credit_limit.map(Money::new),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Loads a customer, optionally taking the row lock
pub async fn fetch_customer<'e>(
    executor: impl PgExecutor<'e>,
    id: CustomerId,
    for_update: bool,
) -> Result<Customer, DatabaseError> {
    let sql = if for_update {
        SELECT_CUSTOMER_FOR_UPDATE
    } else {
        SELECT_CUSTOMER
    };
    sqlx::query_as::<_, CustomerRow>(sql)
        .bind(Uuid::from(id))
        .fetch_optional(executor)
        .await?
        .map(Customer::from)
        .ok_or_else(|| DatabaseError::not_found("Customer", id))
}

pub async fn update_balance<'e>(
    executor: impl PgExecutor<'e>,
    id: CustomerId,
    balance: Money,
) -> Result<(), DatabaseError> {
    let result = sqlx::query(
        r#"
        UPDATE customers
        SET credit_balance = $2, updated_at = now()
        WHERE customer_id = $1
        "#,
    )
    .bind(Uuid::from(id))
    .bind(balance.amount())
    .execute(executor)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::not_found("Customer", id));
    }
    Ok(())
}

/// Customer account maintenance outside billing transactions
#[derive(Debug, Clone)]
pub struct CustomerRepository {
    pool: PgPool,
}

impl CustomerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Inserts a new customer with a zero balance
    ///
    /// A customer's starting credit must be posted through the credit ledger,
    /// so the balance on `customer` is ignored here.
    #[instrument(skip(self, customer), fields(account = %customer.account_number))]
    pub async fn create(&self, customer: &Customer) -> Result<CustomerId, DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO customers (
                customer_id, account_number, name, phone, birthdate,
                credit_balance, credit_limit, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, 0, $6, $7, $8)
            "#,
        )
        .bind(Uuid::from(customer.id))
        .bind(&customer.account_number)
        .bind(&customer.name)
        .bind(&customer.phone)
        .bind(customer.birthdate)
        .bind(customer.credit_limit.map(|limit| limit.amount()))
        .bind(customer.created_at)
        .bind(customer.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(customer.id)
    }

    pub async fn find(&self, id: CustomerId) -> Result<Customer, DatabaseError> {
        fetch_customer(&self.pool, id, false).await
    }

    pub async fn find_by_account(&self, account_number: &str) -> Result<Option<Customer>, DatabaseError> {
        let row = sqlx::query_as::<_, CustomerRow>(
            r#"
            SELECT customer_id, account_number, name, phone, birthdate,
                   credit_balance, credit_limit, created_at, updated_at
            FROM customers
            WHERE account_number = $1
            "#,
        )
        .bind(account_number)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Customer::from))
    }

    /// Updates contact details and the credit limit
    pub async fn update_profile(&self, customer: &Customer) -> Result<(), DatabaseError> {
        let result = sqlx::query(
            r#"
            UPDATE customers
            SET name = $2, phone = $3, birthdate = $4, credit_limit = $5, updated_at = now()
            WHERE customer_id = $1
            "#,
        )
        .bind(Uuid::from(customer.id))
        .bind(&customer.name)
        .bind(&customer.phone)
        .bind(customer.birthdate)
        .bind(customer.credit_limit.map(|limit| limit.amount()))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::not_found("Customer", customer.id));
        }
        Ok(())
    }
}
