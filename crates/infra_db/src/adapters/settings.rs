//! PostgreSQL settings provider over `system_settings` and `rate_tiers`

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::instrument;

use core_kernel::{DomainPort, HealthCheckResult, HealthCheckable, PortError};
use domain_billing::{RateTier, SettingsProvider};

use crate::repositories::SettingsRepository;

#[derive(Debug, Clone)]
pub struct PostgresSettingsProvider {
    repository: SettingsRepository,
}

impl PostgresSettingsProvider {
    pub fn new(pool: PgPool) -> Self {
        Self {
            repository: SettingsRepository::new(pool),
        }
    }
}

impl DomainPort for PostgresSettingsProvider {}

#[async_trait]
impl HealthCheckable for PostgresSettingsProvider {
    async fn health_check(&self) -> HealthCheckResult {
        super::ping(self.repository.pool(), "postgres-settings-provider").await
    }
}

#[async_trait]
impl SettingsProvider for PostgresSettingsProvider {
    async fn get_setting(&self, key: &str) -> Result<Option<String>, PortError> {
        Ok(self.repository.get(key).await?.map(|row| row.value))
    }

    #[instrument(skip(self, value))]
    async fn put_setting(&self, key: &str, value: &str) -> Result<(), PortError> {
        Ok(self.repository.upsert(key, value).await?)
    }

    async fn rate_tiers(&self) -> Result<Vec<RateTier>, PortError> {
        Ok(self.repository.rate_tiers().await?)
    }

    async fn replace_rate_tiers(&self, tiers: &[RateTier]) -> Result<(), PortError> {
        Ok(self.repository.replace_rate_tiers(tiers).await?)
    }
}
