//! Settings handlers

use axum::{
    extract::{Path, State},
    Json,
};
use validator::Validate;

use domain_billing::{BillingCalculator, BillingResult, RateTier};

use super::{ensure_staff, today};
use crate::dto::settings::*;
use crate::middleware::RequestContext;
use crate::{error::ApiError, AppState};

/// Resolved settings, defaults included
pub async fn get_settings(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> Result<Json<SettingsResponse>, ApiError> {
    ensure_staff(&ctx)?;
    let settings = state.settings.resolve().await;
    Ok(Json(SettingsResponse::from(&settings)))
}

pub async fn update_setting(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(key): Path<String>,
    Json(request): Json<UpdateSettingRequest>,
) -> Result<Json<SettingsResponse>, ApiError> {
    request.validate()?;
    state
        .settings
        .update_setting(&ctx.actor, &key, &request.value, ctx.source)
        .await?;
    let settings = state.settings.resolve().await;
    Ok(Json(SettingsResponse::from(&settings)))
}

/// The active schedule
pub async fn get_rate_tiers(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> Result<Json<RateScheduleResponse>, ApiError> {
    ensure_staff(&ctx)?;
    let schedule = state.settings.rate_schedule().await;
    Ok(Json(RateScheduleResponse {
        reference_table: schedule.is_reference(),
        tiers: schedule.tiers().iter().map(RateTierDto::from).collect(),
    }))
}

/// Replaces every tier at once
pub async fn replace_rate_tiers(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(request): Json<ReplaceRateTiersRequest>,
) -> Result<Json<RateScheduleResponse>, ApiError> {
    request.validate()?;
    let tiers = request
        .tiers
        .into_iter()
        .map(RateTierDto::into_tier)
        .collect::<BillingResult<Vec<RateTier>>>()?;

    let schedule = state
        .settings
        .replace_rate_tiers(&ctx.actor, tiers, ctx.source)
        .await?;
    Ok(Json(RateScheduleResponse {
        reference_table: schedule.is_reference(),
        tiers: schedule.tiers().iter().map(RateTierDto::from).collect(),
    }))
}

/// Prices a consumption without issuing a bill
pub async fn preview_rate(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(request): Json<RatePreviewRequest>,
) -> Result<Json<RatePreviewResponse>, ApiError> {
    ensure_staff(&ctx)?;
    let settings = state.settings.resolve().await;
    let billing_date = request.billing_date.unwrap_or_else(|| today(&state));
    let gross = BillingCalculator::from_settings(&settings).compute_gross_amount(
        rust_decimal::Decimal::ZERO,
        request.consumption,
        request.birthdate,
        billing_date,
    )?;
    Ok(Json(RatePreviewResponse::from(&gross)))
}
