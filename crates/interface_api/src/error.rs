//! API error handling
//!
//! Every failure leaves the API as `{error, message, details}`. Domain
//! errors keep their stable code in `error`; the HTTP status follows the
//! error kind.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;
use validator::ValidationErrors;

use core_kernel::PortError;
use domain_billing::{BillingError, ErrorKind};
use domain_verification::VerificationError;

/// API error types
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Validation error")]
    Validation(Vec<String>),

    #[error(transparent)]
    Billing(#[from] BillingError),

    #[error(transparent)]
    Verification(#[from] VerificationError),
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<String>>,
}

fn billing_status(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Forbidden => StatusCode::FORBIDDEN,
        ErrorKind::Consistency => StatusCode::INTERNAL_SERVER_ERROR,
        ErrorKind::Dependency => StatusCode::SERVICE_UNAVAILABLE,
    }
}

fn verification_status(err: &VerificationError) -> StatusCode {
    match err {
        VerificationError::InvalidPhone(_) => StatusCode::UNPROCESSABLE_ENTITY,
        VerificationError::TooManyAttempts => StatusCode::TOO_MANY_REQUESTS,
        VerificationError::Delivery(_) => StatusCode::BAD_GATEWAY,
        VerificationError::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::BAD_REQUEST,
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Billing(err) => billing_status(err.kind()),
            ApiError::Verification(err) => verification_status(err),
        }
    }

    fn error_code(&self) -> String {
        match self {
            ApiError::NotFound(_) => "not_found".to_string(),
            ApiError::BadRequest(_) => "bad_request".to_string(),
            ApiError::Unauthorized => "unauthorized".to_string(),
            ApiError::Forbidden(_) => "forbidden".to_string(),
            ApiError::Unavailable(_) => "service_unavailable".to_string(),
            ApiError::Internal(_) => "internal_error".to_string(),
            ApiError::Validation(_) => "validation_error".to_string(),
            ApiError::Billing(err) => err.code().to_string(),
            ApiError::Verification(err) => err.code().to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, status = status.as_u16(), "request failed");
        }

        let details = match &self {
            ApiError::Validation(details) => Some(details.clone()),
            _ => None,
        };
        let message = match &self {
            ApiError::Validation(_) => "Request validation failed".to_string(),
            ApiError::Billing(BillingError::Storage(_)) => "Storage is unavailable".to_string(),
            other => other.to_string(),
        };

        let body = ErrorResponse {
            error: self.error_code(),
            message,
            details,
        };

        (status, Json(body)).into_response()
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        let mut details: Vec<String> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| match &e.message {
                    Some(message) => format!("{}: {}", field, message),
                    None => format!("{}: {}", field, e.code),
                })
            })
            .collect();
        details.sort();
        ApiError::Validation(details)
    }
}

impl From<PortError> for ApiError {
    fn from(err: PortError) -> Self {
        match err {
            PortError::NotFound { entity_type, id } => {
                ApiError::NotFound(format!("{} {}", entity_type, id))
            }
            PortError::Validation { message, .. } => ApiError::BadRequest(message),
            other if other.is_transient() => ApiError::Unavailable(other.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_kernel::{BillId, CustomerId, Money};
    use rust_decimal_macros::dec;

    #[test]
    fn test_billing_kinds_map_to_status() {
        let conflict = ApiError::from(BillingError::InsufficientBalance {
            balance: Money::new(dec!(100)),
            requested: Money::new(dec!(200)),
        });
        assert_eq!(conflict.status(), StatusCode::CONFLICT);
        assert_eq!(conflict.error_code(), "INSUFFICIENT_BALANCE");

        let missing = ApiError::from(BillingError::BillNotFound(BillId::new()));
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);

        let invalid = ApiError::from(BillingError::InvalidReading {
            previous: dec!(30),
            current: dec!(10),
        });
        assert_eq!(invalid.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let storage = ApiError::from(BillingError::Storage(PortError::connection("refused")));
        assert_eq!(storage.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(storage.error_code(), "STORAGE_UNAVAILABLE");
    }

    #[test]
    fn test_verification_errors() {
        let err = ApiError::from(VerificationError::IncorrectCode { remaining_attempts: 2 });
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.error_code(), "OTP_INCORRECT");

        let err = ApiError::from(VerificationError::TooManyAttempts);
        assert_eq!(err.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[test]
    fn test_port_not_found() {
        let err = ApiError::from(PortError::not_found("Customer", CustomerId::new()));
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }
}
