//! Credit ledger repository
//!
//! Ledger rows are append-only. `seq` gives a stable insertion order for
//! entries written in the same instant.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgExecutor;
use uuid::Uuid;

use core_kernel::{CreditTransactionId, CustomerId, Money};
use domain_billing::{
    CreditReference, CreditTransaction, ReferenceKind, TransactionType as DomainTransactionType,
};

use crate::error::DatabaseError;

/// Ledger entry direction as stored in PostgreSQL
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "credit_transaction_type", rename_all = "snake_case")]
pub enum TransactionType {
    Credit,
    Debit,
    Adjustment,
}

impl From<DomainTransactionType> for TransactionType {
    fn from(kind: DomainTransactionType) -> Self {
        match kind {
            DomainTransactionType::Credit => TransactionType::Credit,
            DomainTransactionType::Debit => TransactionType::Debit,
            DomainTransactionType::Adjustment => TransactionType::Adjustment,
        }
    }
}

impl From<TransactionType> for DomainTransactionType {
    fn from(kind: TransactionType) -> Self {
        match kind {
            TransactionType::Credit => DomainTransactionType::Credit,
            TransactionType::Debit => DomainTransactionType::Debit,
            TransactionType::Adjustment => DomainTransactionType::Adjustment,
        }
    }
}

/// Database row for a ledger entry
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CreditTransactionRow {
    pub transaction_id: Uuid,
    pub customer_id: Uuid,
    pub transaction_type: TransactionType,
    pub amount: Decimal,
    pub previous_balance: Decimal,
    pub new_balance: Decimal,
    pub description: String,
    pub reference_kind: Option<String>,
    pub reference_id: Option<String>,
    pub performed_by: String,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<CreditTransactionRow> for CreditTransaction {
    type Error = DatabaseError;

    fn try_from(row: CreditTransactionRow) -> Result<Self, Self::Error> {
        let reference = match row.reference_kind {
            Some(kind) => {
                let kind: ReferenceKind = kind
                    .parse()
                    .map_err(|e| DatabaseError::SerializationError(format!("{}", e)))?;
                Some(CreditReference {
                    kind,
                    id: row.reference_id,
                })
            }
            None => None,
        };

        Ok(CreditTransaction {
            id: CreditTransactionId::from_uuid(row.transaction_id),
            customer_id: CustomerId::from_uuid(row.customer_id),
            transaction_type: row.transaction_type.into(),
            amount: Money::new(row.amount),
            previous_balance: Money::new(row.previous_balance),
            new_balance: Money::new(row.new_balance),
            description: row.description,
            reference,
            performed_by: row.performed_by,
            created_at: row.created_at,
        })
    }
}

/// A customer's ledger, newest first
pub async fn list_transactions<'e>(
    executor: impl PgExecutor<'e>,
    customer_id: CustomerId,
) -> Result<Vec<CreditTransaction>, DatabaseError> {
    let rows = sqlx::query_as::<_, CreditTransactionRow>(
        r#"
        SELECT transaction_id, customer_id, transaction_type, amount,
               previous_balance, new_balance, description, reference_kind,
               reference_id, performed_by, created_at
        FROM credit_transactions
        WHERE customer_id = $1
        ORDER BY seq DESC
        "#,
    )
    .bind(Uuid::from(customer_id))
    .fetch_all(executor)
    .await?;

    rows.into_iter().map(CreditTransaction::try_from).collect()
}

/// Sum of the customer's signed ledger amounts
pub async fn ledger_balance<'e>(
    executor: impl PgExecutor<'e>,
    customer_id: CustomerId,
) -> Result<Money, DatabaseError> {
    let sum = sqlx::query_scalar::<_, Decimal>(
        r#"
        SELECT COALESCE(SUM(
            CASE WHEN transaction_type = 'debit' THEN -amount ELSE amount END
        ), 0)
        FROM credit_transactions
        WHERE customer_id = $1
        "#,
    )
    .bind(Uuid::from(customer_id))
    .fetch_one(executor)
    .await?;

    Ok(Money::new(sum))
}

pub async fn append_transaction<'e>(
    executor: impl PgExecutor<'e>,
    transaction: &CreditTransaction,
) -> Result<(), DatabaseError> {
    let (reference_kind, reference_id) = match &transaction.reference {
        Some(reference) => (Some(reference.kind.as_str()), reference.id.as_deref()),
        None => (None, None),
    };

    sqlx::query(
        r#"
        INSERT INTO credit_transactions (
            transaction_id, customer_id, transaction_type, amount,
            previous_balance, new_balance, description, reference_kind,
            reference_id, performed_by, created_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        "#,
    )
    .bind(Uuid::from(transaction.id))
    .bind(Uuid::from(transaction.customer_id))
    .bind(TransactionType::from(transaction.transaction_type))
    .bind(transaction.amount.amount())
    .bind(transaction.previous_balance.amount())
    .bind(transaction.new_balance.amount())
    .bind(&transaction.description)
    .bind(reference_kind)
    .bind(reference_id)
    .bind(&transaction.performed_by)
    .bind(transaction.created_at)
    .execute(executor)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn row(reference_kind: Option<&str>) -> CreditTransactionRow {
        CreditTransactionRow {
            transaction_id: Uuid::new_v4(),
            customer_id: Uuid::new_v4(),
            transaction_type: TransactionType::Credit,
            amount: dec!(100),
            previous_balance: dec!(0),
            new_balance: dec!(100),
            description: "Counter deposit".to_string(),
            reference_kind: reference_kind.map(str::to_string),
            reference_id: None,
            performed_by: "cashier-1".to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_row_with_reference() {
        let transaction = CreditTransaction::try_from(row(Some("manual_credit"))).unwrap();
        assert_eq!(
            transaction.reference.clone().map(|r| r.kind),
            Some(ReferenceKind::ManualCredit)
        );
        assert!(transaction.is_balanced());
    }

    #[test]
    fn test_unknown_reference_kind_is_rejected() {
        let err = CreditTransaction::try_from(row(Some("gift"))).unwrap_err();
        assert!(matches!(err, DatabaseError::SerializationError(_)));
    }
}
