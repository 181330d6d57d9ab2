//! Audit trail port
//!
//! Recording is best effort: a failed audit write is logged by the caller
//! and never fails the business operation that triggered it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::actor::{Actor, Role};
use crate::identifiers::AuditEventId;
use crate::ports::{DomainPort, PortError};

/// A single audit record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: AuditEventId,
    pub actor_id: String,
    pub actor_role: Role,
    pub action: String,
    pub entity: String,
    pub entity_id: String,
    pub details: serde_json::Value,
    pub source_address: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl AuditEntry {
    pub fn new(
        actor: &Actor,
        action: impl Into<String>,
        entity: impl Into<String>,
        entity_id: impl ToString,
    ) -> Self {
        Self {
            id: AuditEventId::new_v7(),
            actor_id: actor.id.clone(),
            actor_role: actor.role,
            action: action.into(),
            entity: entity.into(),
            entity_id: entity_id.to_string(),
            details: serde_json::Value::Null,
            source_address: None,
            recorded_at: Utc::now(),
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }

    pub fn with_source(mut self, source_address: Option<String>) -> Self {
        self.source_address = source_address;
        self
    }
}

/// Destination for audit records
#[async_trait]
pub trait AuditSink: DomainPort {
    async fn record(&self, entry: AuditEntry) -> Result<(), PortError>;
}

/// Audit sink that only emits a tracing event
#[derive(Debug, Default, Clone)]
pub struct TracingAuditSink;

impl DomainPort for TracingAuditSink {}

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn record(&self, entry: AuditEntry) -> Result<(), PortError> {
        tracing::info!(
            actor = %entry.actor_id,
            action = %entry.action,
            entity = %entry.entity,
            entity_id = %entry.entity_id,
            "audit"
        );
        Ok(())
    }
}
