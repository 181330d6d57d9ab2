//! Phone Verification
//!
//! Normalizes Philippine mobile numbers and runs the SMS one-time passcode
//! flow used for login, password reset and phone verification.
//!
//! Passcodes sit in an [`OtpStore`] with an explicit expiry and are deleted
//! on first successful use.

pub mod error;
pub mod phone;
pub mod otp;
pub mod store;

pub use error::{VerificationError, VerificationResult};
pub use phone::PhoneNumber;
pub use otp::{OtpConfig, OtpIssued, OtpPurpose, OtpService, VerifiedPhone};
pub use store::{InMemoryOtpStore, OtpEntry, OtpStore};
