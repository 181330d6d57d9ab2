//! One-time passcodes sent by SMS
//!
//! A passcode is six digits, lives for five minutes by default and is
//! deleted the moment it is used. Wrong guesses spend attempts; when they
//! run out the passcode is discarded and the user must request a new one.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tracing::{info, instrument, warn};

use core_kernel::NotificationSender;

use crate::error::{VerificationError, VerificationResult};
use crate::phone::PhoneNumber;
use crate::store::{OtpEntry, OtpStore};

pub const DEFAULT_TTL_MINUTES: i64 = 5;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// What a passcode unlocks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OtpPurpose {
    Login,
    PasswordReset,
    PhoneVerification,
}

impl OtpPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            OtpPurpose::Login => "login",
            OtpPurpose::PasswordReset => "password_reset",
            OtpPurpose::PhoneVerification => "phone_verification",
        }
    }
}

impl fmt::Display for OtpPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OtpPurpose {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "login" => Ok(OtpPurpose::Login),
            "password_reset" | "reset" => Ok(OtpPurpose::PasswordReset),
            "phone_verification" | "verify_phone" => Ok(OtpPurpose::PhoneVerification),
            other => Err(format!("unknown passcode purpose '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OtpConfig {
    pub ttl: Duration,
    pub max_attempts: u32,
}

impl Default for OtpConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::minutes(DEFAULT_TTL_MINUTES),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

/// Returned to the caller when a passcode goes out; never carries the code
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtpIssued {
    pub phone: PhoneNumber,
    pub purpose: OtpPurpose,
    pub expires_at: DateTime<Utc>,
    pub expires_in_seconds: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifiedPhone {
    pub phone: PhoneNumber,
    pub purpose: OtpPurpose,
    pub verified_at: DateTime<Utc>,
}

/// Issues and checks passcodes
pub struct OtpService {
    store: Arc<dyn OtpStore>,
    sender: Arc<dyn NotificationSender>,
    config: OtpConfig,
}

impl OtpService {
    pub fn new(store: Arc<dyn OtpStore>, sender: Arc<dyn NotificationSender>) -> Self {
        Self::with_config(store, sender, OtpConfig::default())
    }

    pub fn with_config(
        store: Arc<dyn OtpStore>,
        sender: Arc<dyn NotificationSender>,
        config: OtpConfig,
    ) -> Self {
        Self {
            store,
            sender,
            config,
        }
    }

    pub async fn issue(&self, phone: &PhoneNumber, purpose: OtpPurpose) -> VerificationResult<OtpIssued> {
        self.issue_at(phone, purpose, Utc::now()).await
    }

    /// Generates, stores and texts a new passcode, replacing any pending one
    #[instrument(skip(self), fields(phone = %phone, purpose = %purpose))]
    pub async fn issue_at(
        &self,
        phone: &PhoneNumber,
        purpose: OtpPurpose,
        now: DateTime<Utc>,
    ) -> VerificationResult<OtpIssued> {
        let code = generate_code();
        let expires_at = now + self.config.ttl;
        let entry = OtpEntry {
            code: code.clone(),
            purpose,
            issued_at: now,
            expires_at,
            attempts_left: self.config.max_attempts,
        };
        self.store
            .put(phone, entry)
            .await
            .map_err(VerificationError::Store)?;

        let text = passcode_message(&code, self.config.ttl);
        if let Err(e) = self.sender.send(phone.as_str(), &text).await {
            warn!(error = %e, "passcode delivery failed");
            if let Err(cleanup) = self.store.take(phone).await {
                warn!(error = %cleanup, "could not discard undelivered passcode");
            }
            return Err(VerificationError::Delivery(e));
        }

        info!(expires_at = %expires_at, "passcode issued");
        Ok(OtpIssued {
            phone: phone.clone(),
            purpose,
            expires_at,
            expires_in_seconds: self.config.ttl.num_seconds(),
        })
    }

    pub async fn verify(
        &self,
        phone: &PhoneNumber,
        code: &str,
        purpose: OtpPurpose,
    ) -> VerificationResult<VerifiedPhone> {
        self.verify_at(phone, code, purpose, Utc::now()).await
    }

    /// Consumes the pending passcode when `code` matches
    #[instrument(skip(self, code), fields(phone = %phone, purpose = %purpose))]
    pub async fn verify_at(
        &self,
        phone: &PhoneNumber,
        code: &str,
        purpose: OtpPurpose,
        now: DateTime<Utc>,
    ) -> VerificationResult<VerifiedPhone> {
        let entry = self
            .store
            .get(phone)
            .await
            .map_err(VerificationError::Store)?
            .ok_or_else(|| VerificationError::NotRequested(phone.to_string()))?;

        if entry.is_expired(now) {
            self.store.take(phone).await.map_err(VerificationError::Store)?;
            return Err(VerificationError::Expired(phone.to_string()));
        }
        if entry.purpose != purpose {
            return Err(VerificationError::PurposeMismatch {
                expected: purpose.to_string(),
                actual: entry.purpose.to_string(),
            });
        }

        if !codes_match(&entry.code, code.trim()) {
            let left = self
                .store
                .record_failure(phone)
                .await
                .map_err(VerificationError::Store)?;
            return Err(match left {
                Some(0) | None => {
                    warn!("passcode discarded after too many attempts");
                    VerificationError::TooManyAttempts
                }
                Some(remaining_attempts) => VerificationError::IncorrectCode { remaining_attempts },
            });
        }

        // a concurrent verify may have consumed it between get and take
        self.store
            .take(phone)
            .await
            .map_err(VerificationError::Store)?
            .ok_or_else(|| VerificationError::NotRequested(phone.to_string()))?;

        info!("phone verified");
        Ok(VerifiedPhone {
            phone: phone.clone(),
            purpose,
            verified_at: now,
        })
    }

    /// Drops expired passcodes
    pub async fn purge_expired(&self, now: DateTime<Utc>) -> VerificationResult<usize> {
        let purged = self
            .store
            .purge_expired(now)
            .await
            .map_err(VerificationError::Store)?;
        if purged > 0 {
            info!(purged, "expired passcodes purged");
        }
        Ok(purged)
    }
}

/// Compares in constant time; a length mismatch is an immediate miss
fn codes_match(expected: &str, provided: &str) -> bool {
    let expected = expected.as_bytes();
    let provided = provided.as_bytes();
    if expected.len() != provided.len() {
        return false;
    }
    expected.ct_eq(provided).into()
}

fn generate_code() -> String {
    rand::thread_rng().gen_range(100_000..1_000_000u32).to_string()
}

pub fn passcode_message(code: &str, ttl: Duration) -> String {
    format!(
        "Your verification code is {}. Valid for {} minutes.",
        code,
        ttl.num_minutes()
    )
}
