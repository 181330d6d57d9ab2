//! Payment handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;
use validator::Validate;

use core_kernel::{BillId, PaymentId};

use super::{ensure_can_view, ensure_staff};
use crate::dto::payment::*;
use crate::middleware::RequestContext;
use crate::{error::ApiError, AppState};

/// Records an over-the-counter payment
pub async fn record_cashier_payment(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(request): Json<CashierPaymentRequest>,
) -> Result<(StatusCode, Json<PaymentReceiptResponse>), ApiError> {
    request.validate()?;
    let receipt = state
        .settlement
        .record_cashier_payment(&ctx.actor, request.into(), ctx.source)
        .await?;
    Ok((StatusCode::CREATED, Json(PaymentReceiptResponse::from(&receipt))))
}

/// Submits a proof of an external payment for review
pub async fn submit_proof(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(request): Json<ProofSubmissionRequest>,
) -> Result<(StatusCode, Json<PaymentResponse>), ApiError> {
    request.validate()?;
    let bill = state
        .settlement
        .get_bill(BillId::from_uuid(request.bill_id))
        .await?;
    ensure_can_view(&ctx, bill.customer_id)?;

    let payment = state
        .settlement
        .submit_proof(&ctx.actor, request.into(), ctx.source)
        .await?;
    Ok((StatusCode::CREATED, Json(PaymentResponse::from(&payment))))
}

/// Proofs waiting for review, newest first
pub async fn list_pending_proofs(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> Result<Json<Vec<PaymentResponse>>, ApiError> {
    ensure_staff(&ctx)?;
    let pending = state.settlement.list_pending_proofs().await?;
    Ok(Json(pending.iter().map(PaymentResponse::from).collect()))
}

pub async fn approve_proof(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<Uuid>,
) -> Result<Json<PaymentReceiptResponse>, ApiError> {
    let receipt = state
        .settlement
        .approve_proof(&ctx.actor, PaymentId::from_uuid(id), ctx.source)
        .await?;
    Ok(Json(PaymentReceiptResponse::from(&receipt)))
}

pub async fn reject_proof(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<Uuid>,
    Json(request): Json<RejectProofRequest>,
) -> Result<Json<PaymentResponse>, ApiError> {
    request.validate()?;
    let payment = state
        .settlement
        .reject_proof(&ctx.actor, PaymentId::from_uuid(id), request.reason, ctx.source)
        .await?;
    Ok(Json(PaymentResponse::from(&payment)))
}
