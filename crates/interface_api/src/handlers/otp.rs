//! Passcode handlers
//!
//! These sit outside authentication: they are how a caller proves they own
//! a phone number in the first place.

use axum::{extract::State, http::StatusCode, Json};
use validator::Validate;

use domain_verification::{OtpIssued, PhoneNumber, VerifiedPhone};

use crate::dto::otp::*;
use crate::{error::ApiError, AppState};

/// Texts a fresh passcode, replacing any pending one
pub async fn send_otp(
    State(state): State<AppState>,
    Json(request): Json<SendOtpRequest>,
) -> Result<(StatusCode, Json<OtpIssued>), ApiError> {
    request.validate()?;
    let phone = PhoneNumber::parse(&request.phone_number)?;
    let purpose = parse_purpose(request.purpose.as_deref())?;
    let issued = state.otp.issue(&phone, purpose).await?;
    Ok((StatusCode::ACCEPTED, Json(issued)))
}

/// Consumes a passcode
pub async fn verify_otp(
    State(state): State<AppState>,
    Json(request): Json<VerifyOtpRequest>,
) -> Result<Json<VerifiedPhone>, ApiError> {
    request.validate()?;
    let phone = PhoneNumber::parse(&request.phone_number)?;
    let purpose = parse_purpose(request.purpose.as_deref())?;
    let verified = state
        .otp
        .verify(&phone, request.code.trim(), purpose)
        .await?;
    Ok(Json(verified))
}
