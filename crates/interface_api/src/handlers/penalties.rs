//! Penalty handlers

use axum::{
    extract::{Query, State},
    Json,
};
use tracing::info;

use core_kernel::{Money, Role};
use domain_billing::SweepReport;

use super::{ensure_staff, today};
use crate::dto::penalty::*;
use crate::middleware::RequestContext;
use crate::{error::ApiError, AppState};

/// Penalty candidates with their current assessment
pub async fn list_overdue(
    State(state): State<AppState>,
    ctx: RequestContext,
    Query(query): Query<AsOfQuery>,
) -> Result<Json<Vec<OverdueBillResponse>>, ApiError> {
    ensure_staff(&ctx)?;
    let as_of = query.as_of.unwrap_or_else(|| today(&state));
    let overdue = state.penalties.list_overdue(as_of).await?;
    Ok(Json(overdue.iter().map(OverdueBillResponse::from).collect()))
}

/// Runs the overdue sweep now
pub async fn run_sweep(
    State(state): State<AppState>,
    ctx: RequestContext,
    Query(query): Query<AsOfQuery>,
) -> Result<Json<SweepReport>, ApiError> {
    if !ctx.actor.has_role(Role::Admin) {
        return Err(ApiError::Forbidden(
            "only administrators can run the overdue sweep".to_string(),
        ));
    }
    let as_of = query.as_of.unwrap_or_else(|| today(&state));
    info!(actor = %ctx.actor, %as_of, "manual overdue sweep");
    Ok(Json(state.penalties.process_overdue_bills(as_of).await?))
}

/// Penalty for an arbitrary amount and due date under current settings
pub async fn preview(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(request): Json<PenaltyPreviewRequest>,
) -> Result<Json<PenaltyAssessmentResponse>, ApiError> {
    ensure_staff(&ctx)?;
    let as_of = request.as_of.unwrap_or_else(|| today(&state));
    let assessment = state
        .penalties
        .preview(Money::new(request.base_amount), request.due_date, as_of)
        .await;
    Ok(Json(PenaltyAssessmentResponse::from(&assessment)))
}
