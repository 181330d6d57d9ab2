//! Expiring passcode storage

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use core_kernel::{
    AdapterHealth, DomainPort, HealthCheckResult, HealthCheckable, PortError,
};

use crate::otp::OtpPurpose;
use crate::phone::PhoneNumber;

/// A pending passcode for one phone number
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtpEntry {
    pub code: String,
    pub purpose: OtpPurpose,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub attempts_left: u32,
}

impl OtpEntry {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Keyed store with at most one live passcode per phone number
#[async_trait]
pub trait OtpStore: DomainPort {
    /// Stores `entry`, replacing any passcode already issued to `phone`
    async fn put(&self, phone: &PhoneNumber, entry: OtpEntry) -> Result<(), PortError>;

    async fn get(&self, phone: &PhoneNumber) -> Result<Option<OtpEntry>, PortError>;

    /// Removes and returns the entry; `None` if another caller got there first
    async fn take(&self, phone: &PhoneNumber) -> Result<Option<OtpEntry>, PortError>;

    /// Spends one attempt, dropping the entry when none remain
    ///
    /// Returns the attempts left, or `None` when no entry exists.
    async fn record_failure(&self, phone: &PhoneNumber) -> Result<Option<u32>, PortError>;

    /// Drops every entry expired at `now`, returning how many were removed
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, PortError>;
}

/// Process-local passcode store
#[derive(Debug, Clone, Default)]
pub struct InMemoryOtpStore {
    entries: Arc<Mutex<HashMap<PhoneNumber, OtpEntry>>>,
}

impl InMemoryOtpStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

impl DomainPort for InMemoryOtpStore {}

#[async_trait]
impl HealthCheckable for InMemoryOtpStore {
    async fn health_check(&self) -> HealthCheckResult {
        let pending = self.entries.lock().await.len();
        HealthCheckResult {
            status: AdapterHealth::Healthy,
            message: Some(format!("{} pending passcode(s)", pending)),
            ..HealthCheckResult::healthy("in-memory-otp-store")
        }
    }
}

#[async_trait]
impl OtpStore for InMemoryOtpStore {
    async fn put(&self, phone: &PhoneNumber, entry: OtpEntry) -> Result<(), PortError> {
        self.entries.lock().await.insert(phone.clone(), entry);
        Ok(())
    }

    async fn get(&self, phone: &PhoneNumber) -> Result<Option<OtpEntry>, PortError> {
        Ok(self.entries.lock().await.get(phone).cloned())
    }

    async fn take(&self, phone: &PhoneNumber) -> Result<Option<OtpEntry>, PortError> {
        Ok(self.entries.lock().await.remove(phone))
    }

    async fn record_failure(&self, phone: &PhoneNumber) -> Result<Option<u32>, PortError> {
        let mut entries = self.entries.lock().await;
        let Some(entry) = entries.get_mut(phone) else {
            return Ok(None);
        };
        entry.attempts_left = entry.attempts_left.saturating_sub(1);
        let left = entry.attempts_left;
        if left == 0 {
            entries.remove(phone);
        }
        Ok(Some(left))
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, PortError> {
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        Ok(before - entries.len())
    }
}
