//! Credit balance handlers

use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;
use validator::Validate;

use core_kernel::{BillId, CustomerId, Money};
use domain_billing::Reconciliation;

use super::{ensure_can_view, ensure_staff};
use crate::dto::credit::*;
use crate::middleware::RequestContext;
use crate::{error::ApiError, AppState};

/// Balance and ledger history
pub async fn get_account(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<Uuid>,
) -> Result<Json<CreditAccountResponse>, ApiError> {
    let customer_id = CustomerId::from_uuid(id);
    ensure_can_view(&ctx, customer_id)?;

    let balance = state.ledger.balance(customer_id).await?;
    let history = state.ledger.history(customer_id).await?;
    Ok(Json(CreditAccountResponse {
        customer_id: id,
        balance: balance.amount(),
        transactions: history.iter().map(CreditTransactionResponse::from).collect(),
    }))
}

/// Deposits credit
pub async fn add_credit(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<Uuid>,
    Json(request): Json<CreditAmountRequest>,
) -> Result<Json<CreditTransactionResponse>, ApiError> {
    request.validate()?;
    let transaction = state
        .ledger
        .credit(
            &ctx.actor,
            CustomerId::from_uuid(id),
            Money::new(request.amount),
            request.description,
            ctx.source,
        )
        .await?;
    Ok(Json(CreditTransactionResponse::from(&transaction)))
}

/// Deducts credit
pub async fn deduct_credit(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<Uuid>,
    Json(request): Json<CreditAmountRequest>,
) -> Result<Json<CreditTransactionResponse>, ApiError> {
    request.validate()?;
    let transaction = state
        .ledger
        .debit(
            &ctx.actor,
            CustomerId::from_uuid(id),
            Money::new(request.amount),
            request.description,
            ctx.source,
        )
        .await?;
    Ok(Json(CreditTransactionResponse::from(&transaction)))
}

/// Sets the balance to an exact amount
pub async fn adjust_credit(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<Uuid>,
    Json(request): Json<AdjustCreditRequest>,
) -> Result<Json<CreditTransactionResponse>, ApiError> {
    request.validate()?;
    let transaction = state
        .ledger
        .adjust(
            &ctx.actor,
            CustomerId::from_uuid(id),
            Money::new(request.new_balance),
            request.reason,
            ctx.source,
        )
        .await?;
    Ok(Json(CreditTransactionResponse::from(&transaction)))
}

/// Spends credit on one of the customer's bills
pub async fn apply_credit(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<Uuid>,
    Json(request): Json<ApplyCreditRequest>,
) -> Result<Json<CreditApplicationResponse>, ApiError> {
    let customer_id = CustomerId::from_uuid(id);
    ensure_can_view(&ctx, customer_id)?;

    let application = state
        .ledger
        .apply_to_bill(
            &ctx.actor,
            customer_id,
            BillId::from_uuid(request.bill_id),
            Money::new(request.amount),
            ctx.source,
        )
        .await?;
    Ok(Json(CreditApplicationResponse::from(&application)))
}

/// Compares the cached balance with the ledger
pub async fn reconcile(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<Uuid>,
) -> Result<Json<Reconciliation>, ApiError> {
    ensure_staff(&ctx)?;
    Ok(Json(state.ledger.reconcile(CustomerId::from_uuid(id)).await?))
}
