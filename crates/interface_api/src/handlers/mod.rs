//! Request handlers

pub mod bills;
pub mod payments;
pub mod credit;
pub mod penalties;
pub mod settings;
pub mod otp;
pub mod health;

use chrono::{NaiveDate, Utc};

use core_kernel::{CustomerId, Role};

use crate::error::ApiError;
use crate::middleware::RequestContext;
use crate::AppState;

/// Customers may only see their own records; staff see everything
///
/// A customer actor's id is their customer id.
pub(crate) fn ensure_can_view(ctx: &RequestContext, customer_id: CustomerId) -> Result<(), ApiError> {
    if ctx.actor.role != Role::Customer || ctx.actor.is_customer(&customer_id) {
        Ok(())
    } else {
        Err(ApiError::Forbidden(
            "customers can only access their own account".to_string(),
        ))
    }
}

pub(crate) fn ensure_staff(ctx: &RequestContext) -> Result<(), ApiError> {
    if ctx.actor.role.is_staff() {
        Ok(())
    } else {
        Err(ApiError::Forbidden("staff access required".to_string()))
    }
}

/// Today in the utility's timezone
pub(crate) fn today(state: &AppState) -> NaiveDate {
    state.config.timezone.today(Utc::now())
}
