//! Passcode DTOs

use serde::Deserialize;
use validator::Validate;

use domain_verification::OtpPurpose;

use crate::error::ApiError;

#[derive(Debug, Deserialize, Validate)]
pub struct SendOtpRequest {
    #[validate(length(min = 10, max = 20, message = "Phone number must be 10 to 20 characters"))]
    pub phone_number: String,
    /// login, password_reset or phone_verification; defaults to login
    pub purpose: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct VerifyOtpRequest {
    #[validate(length(min = 10, max = 20, message = "Phone number must be 10 to 20 characters"))]
    pub phone_number: String,
    #[validate(length(equal = 6, message = "Code must be 6 digits"))]
    pub code: String,
    pub purpose: Option<String>,
}

pub fn parse_purpose(raw: Option<&str>) -> Result<OtpPurpose, ApiError> {
    match raw {
        Some(raw) => raw.parse().map_err(ApiError::BadRequest),
        None => Ok(OtpPurpose::Login),
    }
}
