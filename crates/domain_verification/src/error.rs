//! Verification errors

use thiserror::Error;

use core_kernel::PortError;

/// Errors from phone parsing and passcode verification
#[derive(Debug, Error)]
pub enum VerificationError {
    #[error("Invalid phone number '{0}', expected 09XXXXXXXXX or 63XXXXXXXXXX")]
    InvalidPhone(String),

    #[error("No passcode was requested for {0}")]
    NotRequested(String),

    #[error("Passcode for {0} has expired")]
    Expired(String),

    #[error("Incorrect passcode, {remaining_attempts} attempt(s) left")]
    IncorrectCode { remaining_attempts: u32 },

    #[error("Too many incorrect attempts, request a new passcode")]
    TooManyAttempts,

    #[error("Passcode is for {actual}, not {expected}")]
    PurposeMismatch { expected: String, actual: String },

    #[error("Passcode could not be delivered: {0}")]
    Delivery(#[source] PortError),

    #[error("Passcode store unavailable: {0}")]
    Store(#[source] PortError),
}

impl VerificationError {
    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            VerificationError::InvalidPhone(_) => "INVALID_PHONE",
            VerificationError::NotRequested(_) => "OTP_NOT_REQUESTED",
            VerificationError::Expired(_) => "OTP_EXPIRED",
            VerificationError::IncorrectCode { .. } => "OTP_INCORRECT",
            VerificationError::TooManyAttempts => "OTP_TOO_MANY_ATTEMPTS",
            VerificationError::PurposeMismatch { .. } => "OTP_PURPOSE_MISMATCH",
            VerificationError::Delivery(_) => "OTP_DELIVERY_FAILED",
            VerificationError::Store(_) => "OTP_STORE_UNAVAILABLE",
        }
    }

    /// Whether the caller supplied bad input, as opposed to an outage
    pub fn is_client_error(&self) -> bool {
        !matches!(
            self,
            VerificationError::Delivery(_) | VerificationError::Store(_)
        )
    }
}

pub type VerificationResult<T> = Result<T, VerificationError>;
