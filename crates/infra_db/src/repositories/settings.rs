//! System settings and rate tier repository

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::instrument;
use uuid::Uuid;

use core_kernel::RateTierId;
use domain_billing::RateTier;

use crate::error::DatabaseError;

/// Database row for a rate tier
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RateTierRow {
    pub tier_id: Uuid,
    pub consumption_min: Decimal,
    pub consumption_max: Option<Decimal>,
    pub rate_per_unit: Option<Decimal>,
    pub fixed_amount: Option<Decimal>,
}

impl TryFrom<RateTierRow> for RateTier {
    type Error = DatabaseError;

    fn try_from(row: RateTierRow) -> Result<Self, Self::Error> {
        RateTier::from_parts(
            RateTierId::from_uuid(row.tier_id),
            row.consumption_min,
            row.consumption_max,
            row.rate_per_unit,
            row.fixed_amount,
        )
        .map_err(|e| DatabaseError::SerializationError(e.to_string()))
    }
}

/// Database row for a key/value setting
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SettingRow {
    pub key: String,
    pub value: String,
    pub updated_at: DateTime<Utc>,
}

/// Access to `system_settings` and `rate_tiers`
#[derive(Debug, Clone)]
pub struct SettingsRepository {
    pool: PgPool,
}

impl SettingsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn get(&self, key: &str) -> Result<Option<SettingRow>, DatabaseError> {
        let row = sqlx::query_as::<_, SettingRow>(
            "SELECT key, value, updated_at FROM system_settings WHERE key = $1",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn list(&self) -> Result<Vec<SettingRow>, DatabaseError> {
        let rows = sqlx::query_as::<_, SettingRow>(
            "SELECT key, value, updated_at FROM system_settings ORDER BY key",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Inserts or overwrites a setting
    #[instrument(skip(self, value))]
    pub async fn upsert(&self, key: &str, value: &str) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO system_settings (key, value, updated_at)
            VALUES ($1, $2, now())
            ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, updated_at = now()
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Tiers ordered by their lower bound
    pub async fn rate_tiers(&self) -> Result<Vec<RateTier>, DatabaseError> {
        let rows = sqlx::query_as::<_, RateTierRow>(
            r#"
            SELECT tier_id, consumption_min, consumption_max, rate_per_unit, fixed_amount
            FROM rate_tiers
            ORDER BY consumption_min, tier_id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(RateTier::try_from).collect()
    }

    /// Deletes every tier and inserts `tiers` in one transaction
    #[instrument(skip(self, tiers), fields(count = tiers.len()))]
    pub async fn replace_rate_tiers(&self, tiers: &[RateTier]) -> Result<(), DatabaseError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM rate_tiers").execute(&mut *tx).await?;

        for tier in tiers {
            sqlx::query(
                r#"
                INSERT INTO rate_tiers (
                    tier_id, consumption_min, consumption_max, rate_per_unit, fixed_amount
                ) VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(Uuid::from(tier.id))
            .bind(tier.consumption_min)
            .bind(tier.consumption_max)
            .bind(tier.rate_per_unit().map(|rate| rate.amount()))
            .bind(tier.fixed_amount().map(|amount| amount.amount()))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit()
            .await
            .map_err(|e| DatabaseError::TransactionFailed(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain_billing::TierPricing;
    use rust_decimal_macros::dec;

    #[test]
    fn test_row_needs_exactly_one_price() {
        let mut row = RateTierRow {
            tier_id: Uuid::new_v4(),
            consumption_min: dec!(0),
            consumption_max: Some(dec!(10)),
            rate_per_unit: None,
            fixed_amount: Some(dec!(250)),
        };
        let tier = RateTier::try_from(row.clone()).unwrap();
        assert!(matches!(tier.pricing, TierPricing::Fixed(_)));

        row.rate_per_unit = Some(dec!(20));
        assert!(RateTier::try_from(row).is_err());
    }
}
