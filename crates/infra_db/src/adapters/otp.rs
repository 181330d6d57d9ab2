//! PostgreSQL passcode store

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use core_kernel::{DomainPort, HealthCheckResult, HealthCheckable, PortError};
use domain_verification::{OtpEntry, OtpStore, PhoneNumber};

use crate::repositories::OtpRepository;

/// [`OtpStore`] over the `otp_codes` table
///
/// `take` is a single `DELETE ... RETURNING`, so two concurrent verifications
/// of the same code cannot both succeed.
#[derive(Debug, Clone)]
pub struct PostgresOtpStore {
    repository: OtpRepository,
}

impl PostgresOtpStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            repository: OtpRepository::new(pool),
        }
    }
}

impl DomainPort for PostgresOtpStore {}

#[async_trait]
impl HealthCheckable for PostgresOtpStore {
    async fn health_check(&self) -> HealthCheckResult {
        super::ping(self.repository.pool(), "postgres-otp-store").await
    }
}

#[async_trait]
impl OtpStore for PostgresOtpStore {
    async fn put(&self, phone: &PhoneNumber, entry: OtpEntry) -> Result<(), PortError> {
        Ok(self.repository.upsert(phone, &entry).await?)
    }

    async fn get(&self, phone: &PhoneNumber) -> Result<Option<OtpEntry>, PortError> {
        Ok(self.repository.get(phone).await?)
    }

    async fn take(&self, phone: &PhoneNumber) -> Result<Option<OtpEntry>, PortError> {
        Ok(self.repository.take(phone).await?)
    }

    async fn record_failure(&self, phone: &PhoneNumber) -> Result<Option<u32>, PortError> {
        Ok(self.repository.record_failure(phone).await?)
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, PortError> {
        let purged = self.repository.purge_expired(now).await?;
        Ok(usize::try_from(purged).unwrap_or(usize::MAX))
    }
}
