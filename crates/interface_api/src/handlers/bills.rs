//! Bill handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;
use validator::Validate;

use core_kernel::{BillId, CustomerId};
use domain_billing::PenaltySummary;

use super::{ensure_can_view, ensure_staff, today};
use crate::dto::bill::*;
use crate::dto::payment::PaymentResponse;
use crate::dto::penalty::AsOfQuery;
use crate::middleware::RequestContext;
use crate::{error::ApiError, AppState};

/// Issues a bill from a meter reading
pub async fn create_bill(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(request): Json<CreateBillRequest>,
) -> Result<(StatusCode, Json<BillCreatedResponse>), ApiError> {
    request.validate()?;
    let creation = state
        .settlement
        .create_bill(&ctx.actor, request.into(), ctx.source)
        .await?;
    Ok((StatusCode::CREATED, Json(BillCreatedResponse::from(&creation))))
}

/// Lists bills, optionally by customer and status
pub async fn list_bills(
    State(state): State<AppState>,
    ctx: RequestContext,
    Query(query): Query<BillListQuery>,
) -> Result<Json<Vec<BillResponse>>, ApiError> {
    match query.customer_id {
        Some(customer) => ensure_can_view(&ctx, CustomerId::from_uuid(customer))?,
        None => ensure_staff(&ctx)?,
    }
    let bills = state.settlement.list_bills(query.into_filter()?).await?;
    Ok(Json(bills.iter().map(BillResponse::from).collect()))
}

/// Gets a bill by ID
pub async fn get_bill(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<Uuid>,
) -> Result<Json<BillResponse>, ApiError> {
    let bill = state.settlement.get_bill(BillId::from_uuid(id)).await?;
    ensure_can_view(&ctx, bill.customer_id)?;
    Ok(Json(BillResponse::from(&bill)))
}

/// Payments recorded against a bill, newest first
pub async fn list_bill_payments(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<PaymentResponse>>, ApiError> {
    let bill_id = BillId::from_uuid(id);
    let bill = state.settlement.get_bill(bill_id).await?;
    ensure_can_view(&ctx, bill.customer_id)?;
    let payments = state.settlement.list_payments(bill_id).await?;
    Ok(Json(payments.iter().map(PaymentResponse::from).collect()))
}

/// Stored and recalculated penalty for a bill
pub async fn get_penalty(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<Uuid>,
    Query(query): Query<AsOfQuery>,
) -> Result<Json<PenaltySummary>, ApiError> {
    let bill_id = BillId::from_uuid(id);
    let bill = state.settlement.get_bill(bill_id).await?;
    ensure_can_view(&ctx, bill.customer_id)?;
    let as_of = query.as_of.unwrap_or_else(|| today(&state));
    Ok(Json(state.penalties.penalty_summary(bill_id, as_of).await?))
}

/// A customer's bills, oldest due date first
pub async fn list_customer_bills(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<BillResponse>>, ApiError> {
    let customer_id = CustomerId::from_uuid(id);
    ensure_can_view(&ctx, customer_id)?;
    let bills = state.settlement.list_customer_bills(customer_id).await?;
    Ok(Json(bills.iter().map(BillResponse::from).collect()))
}
