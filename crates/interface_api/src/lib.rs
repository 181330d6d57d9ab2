//! HTTP API Layer
//!
//! REST API for the water billing system, built on Axum.
//!
//! # Architecture
//!
//! - **Handlers**: bills, payments, credit, penalties, settings and OTP
//! - **Middleware**: Authentication, audit logging, tracing
//! - **DTOs**: Request/Response data transfer objects
//! - **Error Handling**: Consistent `{error, message, details}` responses
//! - **Scheduler**: the daily overdue sweep
//!
//! Authorization rules live in the billing services. Handlers only add the
//! customer data scoping that the API exposes.
//!
//! # Example
//!
//! ```rust,ignore
//! use interface_api::{create_router, AppState, Ports};
//!
//! let state = AppState::new(ports, config);
//! let app = create_router(state);
//! axum::serve(listener, app).await?;
//! ```

pub mod config;
pub mod error;
pub mod middleware;
pub mod handlers;
pub mod dto;
pub mod auth;
pub mod sms;
pub mod scheduler;

use std::sync::Arc;

use axum::{
    middleware as axum_middleware,
    routing::{get, post, put},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use core_kernel::{AuditSink, NotificationSender};
use domain_billing::{
    BillSettlement, BillingStore, CreditLedger, PenaltyEngine, SettingsProvider, SettingsResolver,
    SideEffects,
};
use domain_verification::{OtpService, OtpStore};

use crate::config::ApiConfig;
use crate::handlers::{bills, credit, health, otp, payments, penalties, settings};
use crate::middleware::{audit_middleware, auth_middleware};

/// Adapters the API is wired with
///
/// The server passes the PostgreSQL adapters; tests pass in-memory ones.
pub struct Ports {
    pub store: Arc<dyn BillingStore>,
    pub settings: Arc<dyn SettingsProvider>,
    pub audit: Arc<dyn AuditSink>,
    pub notifier: Arc<dyn NotificationSender>,
    pub otp_store: Arc<dyn OtpStore>,
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub settlement: Arc<BillSettlement>,
    pub ledger: Arc<CreditLedger>,
    pub penalties: Arc<PenaltyEngine>,
    pub settings: SettingsResolver,
    pub otp: Arc<OtpService>,
    pub store: Arc<dyn BillingStore>,
    pub config: ApiConfig,
}

impl AppState {
    pub fn new(ports: Ports, config: ApiConfig) -> Self {
        let effects = SideEffects::new(ports.audit, ports.notifier.clone());
        let settings = SettingsResolver::new(ports.settings, effects.clone());

        let settlement = BillSettlement::new(ports.store.clone(), settings.clone(), effects.clone())
            .with_timezone(config.timezone);
        let ledger = CreditLedger::new(ports.store.clone(), effects.clone());
        let penalties = PenaltyEngine::new(ports.store.clone(), settings.clone(), effects);
        let otp = OtpService::new(ports.otp_store, ports.notifier);

        Self {
            settlement: Arc::new(settlement),
            ledger: Arc::new(ledger),
            penalties: Arc::new(penalties),
            settings,
            otp: Arc::new(otp),
            store: ports.store,
            config,
        }
    }
}

/// Creates the main API router
pub fn create_router(state: AppState) -> Router {
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/health", get(health::health_check))
        .route("/health/ready", get(health::readiness_check))
        .route("/api/v1/otp/send", post(otp::send_otp))
        .route("/api/v1/otp/verify", post(otp::verify_otp));

    let bill_routes = Router::new()
        .route("/", post(bills::create_bill).get(bills::list_bills))
        .route("/:id", get(bills::get_bill))
        .route("/:id/payments", get(bills::list_bill_payments))
        .route("/:id/penalty", get(bills::get_penalty));

    let payment_routes = Router::new()
        .route("/cashier", post(payments::record_cashier_payment))
        .route("/proofs", post(payments::submit_proof))
        .route("/proofs/pending", get(payments::list_pending_proofs))
        .route("/proofs/:id/approve", post(payments::approve_proof))
        .route("/proofs/:id/reject", post(payments::reject_proof));

    let customer_routes = Router::new()
        .route("/:id/bills", get(bills::list_customer_bills))
        .route("/:id/credit", get(credit::get_account).post(credit::add_credit))
        .route("/:id/credit/debit", post(credit::deduct_credit))
        .route("/:id/credit/adjust", post(credit::adjust_credit))
        .route("/:id/credit/apply", post(credit::apply_credit))
        .route("/:id/credit/reconcile", get(credit::reconcile));

    let penalty_routes = Router::new()
        .route("/overdue", get(penalties::list_overdue))
        .route("/sweep", post(penalties::run_sweep))
        .route("/preview", post(penalties::preview));

    let settings_routes = Router::new()
        .route("/", get(settings::get_settings))
        .route(
            "/rate-tiers",
            get(settings::get_rate_tiers).put(settings::replace_rate_tiers),
        )
        .route("/rate-tiers/preview", post(settings::preview_rate))
        .route("/:key", put(settings::update_setting));

    // Protected API routes. The audit layer is added first so it runs after
    // authentication and sees the caller.
    let api_routes = Router::new()
        .nest("/bills", bill_routes)
        .nest("/payments", payment_routes)
        .nest("/customers", customer_routes)
        .nest("/penalties", penalty_routes)
        .nest("/settings", settings_routes)
        .layer(axum_middleware::from_fn(audit_middleware))
        .layer(axum_middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .nest("/api/v1", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
