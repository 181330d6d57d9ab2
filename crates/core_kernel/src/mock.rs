//! In-memory collaborators for tests
//!
//! Both adapters can be switched into a failing mode to check that services
//! treat audit and notification delivery as best effort.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::audit::{AuditEntry, AuditSink};
use crate::notification::NotificationSender;
use crate::ports::{DomainPort, PortError};

/// Audit sink that keeps every entry in memory
#[derive(Debug, Default, Clone)]
pub struct RecordingAuditSink {
    entries: Arc<RwLock<Vec<AuditEntry>>>,
    failing: Arc<AtomicBool>,
}

impl RecordingAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent `record` call fail
    pub fn fail_all(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    pub async fn entries(&self) -> Vec<AuditEntry> {
        self.entries.read().await.clone()
    }

    pub async fn actions(&self) -> Vec<String> {
        self.entries.read().await.iter().map(|e| e.action.clone()).collect()
    }
}

impl DomainPort for RecordingAuditSink {}

#[async_trait]
impl AuditSink for RecordingAuditSink {
    async fn record(&self, entry: AuditEntry) -> Result<(), PortError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(PortError::ServiceUnavailable {
                service: "audit".to_string(),
            });
        }
        self.entries.write().await.push(entry);
        Ok(())
    }
}

/// A message captured by [`RecordingNotifier`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub recipient: String,
    pub text: String,
}

/// Notification sender that keeps every message in memory
#[derive(Debug, Default, Clone)]
pub struct RecordingNotifier {
    sent: Arc<RwLock<Vec<SentMessage>>>,
    failing: Arc<AtomicBool>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent `send` call fail
    pub fn fail_all(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    pub async fn sent(&self) -> Vec<SentMessage> {
        self.sent.read().await.clone()
    }
}

impl DomainPort for RecordingNotifier {}

#[async_trait]
impl NotificationSender for RecordingNotifier {
    async fn send(&self, recipient_phone: &str, text: &str) -> Result<(), PortError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(PortError::ServiceUnavailable {
                service: "sms".to_string(),
            });
        }
        self.sent.write().await.push(SentMessage {
            recipient: recipient_phone.to_string(),
            text: text.to_string(),
        });
        Ok(())
    }
}
