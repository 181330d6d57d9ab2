//! PostgreSQL audit sink

use async_trait::async_trait;
use sqlx::PgPool;

use core_kernel::{AuditEntry, AuditSink, DomainPort, HealthCheckResult, HealthCheckable, PortError};

use crate::repositories::AuditRepository;

/// Writes audit entries to `audit_log`
///
/// Entries are written outside the billing transaction, after it commits.
#[derive(Debug, Clone)]
pub struct PostgresAuditSink {
    repository: AuditRepository,
}

impl PostgresAuditSink {
    pub fn new(pool: PgPool) -> Self {
        Self {
            repository: AuditRepository::new(pool),
        }
    }

    pub fn repository(&self) -> &AuditRepository {
        &self.repository
    }
}

impl DomainPort for PostgresAuditSink {}

#[async_trait]
impl HealthCheckable for PostgresAuditSink {
    async fn health_check(&self) -> HealthCheckResult {
        super::ping(self.repository.pool(), "postgres-audit-sink").await
    }
}

#[async_trait]
impl AuditSink for PostgresAuditSink {
    async fn record(&self, entry: AuditEntry) -> Result<(), PortError> {
        Ok(self.repository.insert(&entry).await?)
    }
}
