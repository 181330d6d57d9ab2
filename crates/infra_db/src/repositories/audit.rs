//! Audit log repository

use sqlx::PgPool;
use uuid::Uuid;

use core_kernel::AuditEntry;

use crate::error::DatabaseError;

/// Append-only access to `audit_log`
#[derive(Debug, Clone)]
pub struct AuditRepository {
    pool: PgPool,
}

impl AuditRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn insert(&self, entry: &AuditEntry) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO audit_log (
                audit_id, actor_id, actor_role, action, entity, entity_id,
                details, source_address, recorded_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(Uuid::from(entry.id))
        .bind(&entry.actor_id)
        .bind(entry.actor_role.as_str())
        .bind(&entry.action)
        .bind(&entry.entity)
        .bind(&entry.entity_id)
        .bind(&entry.details)
        .bind(&entry.source_address)
        .bind(entry.recorded_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Actions recorded against one entity, newest first
    pub async fn actions_for(&self, entity: &str, entity_id: &str) -> Result<Vec<String>, DatabaseError> {
        let actions = sqlx::query_scalar::<_, String>(
            r#"
            SELECT action FROM audit_log
            WHERE entity = $1 AND entity_id = $2
            ORDER BY recorded_at DESC
            "#,
        )
        .bind(entity)
        .bind(entity_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(actions)
    }
}
