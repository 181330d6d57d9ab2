//! Pending passcode repository

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use domain_verification::{OtpEntry, OtpPurpose, PhoneNumber};

use crate::error::DatabaseError;

/// Database row for a pending passcode
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OtpRow {
    pub phone: String,
    pub code: String,
    pub purpose: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub attempts_left: i32,
}

impl TryFrom<OtpRow> for OtpEntry {
    type Error = DatabaseError;

    fn try_from(row: OtpRow) -> Result<Self, Self::Error> {
        let purpose: OtpPurpose = row
            .purpose
            .parse()
            .map_err(DatabaseError::SerializationError)?;
        Ok(OtpEntry {
            code: row.code,
            purpose,
            issued_at: row.issued_at,
            expires_at: row.expires_at,
            attempts_left: u32::try_from(row.attempts_left).unwrap_or(0),
        })
    }
}

/// Access to `otp_codes`, one row per phone number
#[derive(Debug, Clone)]
pub struct OtpRepository {
    pool: PgPool,
}

impl OtpRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn upsert(&self, phone: &PhoneNumber, entry: &OtpEntry) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO otp_codes (phone, code, purpose, issued_at, expires_at, attempts_left)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (phone) DO UPDATE SET
                code = EXCLUDED.code,
                purpose = EXCLUDED.purpose,
                issued_at = EXCLUDED.issued_at,
                expires_at = EXCLUDED.expires_at,
                attempts_left = EXCLUDED.attempts_left
            "#,
        )
        .bind(phone.as_str())
        .bind(&entry.code)
        .bind(entry.purpose.as_str())
        .bind(entry.issued_at)
        .bind(entry.expires_at)
        .bind(i32::try_from(entry.attempts_left).unwrap_or(i32::MAX))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get(&self, phone: &PhoneNumber) -> Result<Option<OtpEntry>, DatabaseError> {
        sqlx::query_as::<_, OtpRow>(
            r#"
            SELECT phone, code, purpose, issued_at, expires_at, attempts_left
            FROM otp_codes WHERE phone = $1
            "#,
        )
        .bind(phone.as_str())
        .fetch_optional(&self.pool)
        .await?
        .map(OtpEntry::try_from)
        .transpose()
    }

    /// Deletes and returns the row in one statement
    pub async fn take(&self, phone: &PhoneNumber) -> Result<Option<OtpEntry>, DatabaseError> {
        sqlx::query_as::<_, OtpRow>(
            r#"
            DELETE FROM otp_codes WHERE phone = $1
            RETURNING phone, code, purpose, issued_at, expires_at, attempts_left
            "#,
        )
        .bind(phone.as_str())
        .fetch_optional(&self.pool)
        .await?
        .map(OtpEntry::try_from)
        .transpose()
    }

    /// Decrements the attempt counter, deleting the row when it reaches zero
    pub async fn record_failure(&self, phone: &PhoneNumber) -> Result<Option<u32>, DatabaseError> {
        let mut tx = self.pool.begin().await?;

        let left = sqlx::query_scalar::<_, i32>(
            r#"
            UPDATE otp_codes SET attempts_left = GREATEST(attempts_left - 1, 0)
            WHERE phone = $1
            RETURNING attempts_left
            "#,
        )
        .bind(phone.as_str())
        .fetch_optional(&mut *tx)
        .await?;

        if left == Some(0) {
            sqlx::query("DELETE FROM otp_codes WHERE phone = $1")
                .bind(phone.as_str())
                .execute(&mut *tx)
                .await?;
        }

        tx.commit()
            .await
            .map_err(|e| DatabaseError::TransactionFailed(e.to_string()))?;
        Ok(left.map(|n| u32::try_from(n).unwrap_or(0)))
    }

    pub async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, DatabaseError> {
        let result = sqlx::query("DELETE FROM otp_codes WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
