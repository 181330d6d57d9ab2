//! Router-level tests
//!
//! The full router runs against the in-memory store, settings provider, audit
//! sink and SMS recorder; requests go through `oneshot`.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use tower::util::ServiceExt;

use core_kernel::mock::{RecordingAuditSink, RecordingNotifier};
use core_kernel::{CustomerId, Role};
use domain_billing::ports::mock::{InMemoryBillingStore, InMemorySettingsProvider};
use domain_billing::BillStatus;
use domain_verification::InMemoryOtpStore;

use interface_api::{
    auth::create_token, config::ApiConfig, create_router, middleware::client_address, AppState,
    Ports,
};
use test_utils::{BillBuilder, CustomerBuilder, DateFixtures, StringFixtures};

const SECRET: &str = "api-test-secret";

struct TestApp {
    router: Router,
    store: InMemoryBillingStore,
    audit: RecordingAuditSink,
    sms: RecordingNotifier,
}

impl TestApp {
    fn new() -> Self {
        let store = InMemoryBillingStore::new();
        let audit = RecordingAuditSink::new();
        let sms = RecordingNotifier::new();
        let ports = Ports {
            store: Arc::new(store.clone()),
            settings: Arc::new(InMemorySettingsProvider::new()),
            audit: Arc::new(audit.clone()),
            notifier: Arc::new(sms.clone()),
            otp_store: Arc::new(InMemoryOtpStore::new()),
        };
        let config = ApiConfig {
            jwt_secret: SECRET.to_string(),
            ..ApiConfig::default()
        };

        Self {
            router: create_router(AppState::new(ports, config)),
            store,
            audit,
            sms,
        }
    }

    async fn customer(&self) -> CustomerId {
        let customer = CustomerBuilder::new()
            .with_phone(StringFixtures::phone())
            .build();
        let id = customer.id;
        self.store.seed_customer(customer).await;
        id
    }

    async fn send(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }
}

fn token(user: &str, role: Role) -> String {
    create_token(user, role, SECRET, 300).unwrap()
}

fn admin() -> String {
    token("admin-1", Role::Admin)
}

fn cashier() -> String {
    token("cashier-1", Role::Cashier)
}

fn customer_token(id: CustomerId) -> String {
    token(&id.to_string(), Role::Customer)
}

fn decimal(value: &Value) -> Decimal {
    value
        .as_str()
        .map(|s| s.parse().unwrap())
        .unwrap_or_else(|| panic!("expected a decimal string, got {}", value))
}

fn march_bill(customer_id: CustomerId) -> Value {
    json!({
        "customer_id": customer_id.to_string(),
        "meter_number": StringFixtures::meter_number(),
        "previous_reading": "10",
        "current_reading": "30",
        "due_date": DateFixtures::due_date(),
        "billing_date": DateFixtures::billing_date(),
    })
}

// ============================================================================
// Health And Authentication Tests
// ============================================================================

mod health_and_auth_tests {
    use super::*;

    #[tokio::test]
    async fn test_health_is_public() {
        let app = TestApp::new();
        let (status, body) = app.send(Method::GET, "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");

        let (status, body) = app.send(Method::GET, "/health/ready", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ready");
    }

    #[tokio::test]
    async fn test_missing_token_is_unauthorized() {
        let app = TestApp::new();
        let (status, body) = app.send(Method::GET, "/api/v1/bills", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "unauthorized");
    }

    #[tokio::test]
    async fn test_token_signed_with_other_secret_is_rejected() {
        let app = TestApp::new();
        let forged = create_token("admin-1", Role::Admin, "other", 300).unwrap();
        let (status, _) = app
            .send(Method::GET, "/api/v1/settings", Some(&forged), None)
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}

// ============================================================================
// Bill Tests
// ============================================================================

mod bill_tests {
    use super::*;

    #[tokio::test]
    async fn test_cashier_issues_reference_bill() {
        let app = TestApp::new();
        let customer = app.customer().await;

        let (status, body) = app
            .send(Method::POST, "/api/v1/bills", Some(&cashier()), Some(march_bill(customer)))
            .await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(decimal(&body["bill"]["gross_amount"]), dec!(547));
        assert_eq!(decimal(&body["bill"]["net_amount_due"]), dec!(547));
        assert_eq!(body["bill"]["status"], "unpaid");
        assert_eq!(body["senior_discount_applied"], false);
        assert!(app.audit.actions().await.iter().any(|a| a.contains("bill")));
    }

    #[tokio::test]
    async fn test_blank_meter_number_fails_validation() {
        let app = TestApp::new();
        let customer = app.customer().await;
        let mut request = march_bill(customer);
        request["meter_number"] = json!("");

        let (status, body) = app
            .send(Method::POST, "/api/v1/bills", Some(&cashier()), Some(request))
            .await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"], "validation_error");
        assert_eq!(body["details"][0], "meter_number: Meter number is required");
    }

    #[tokio::test]
    async fn test_reading_below_previous_is_rejected() {
        let app = TestApp::new();
        let customer = app.customer().await;
        let mut request = march_bill(customer);
        request["current_reading"] = json!("5");

        let (status, body) = app
            .send(Method::POST, "/api/v1/bills", Some(&cashier()), Some(request))
            .await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"], "INVALID_READING");
    }

    #[tokio::test]
    async fn test_oversized_reading_fails_validation() {
        let app = TestApp::new();
        let customer = app.customer().await;
        let mut request = march_bill(customer);
        request["current_reading"] = json!("50000000000000000000000000000");

        let (status, body) = app
            .send(Method::POST, "/api/v1/bills", Some(&cashier()), Some(request))
            .await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"], "validation_error");
        assert_eq!(
            body["details"][0],
            "current_reading: Reading must be between 0 and 999999999"
        );
    }

    #[tokio::test]
    async fn test_customer_cannot_issue_bills() {
        let app = TestApp::new();
        let customer = app.customer().await;

        let (status, body) = app
            .send(
                Method::POST,
                "/api/v1/bills",
                Some(&customer_token(customer)),
                Some(march_bill(customer)),
            )
            .await;

        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "FORBIDDEN");
    }

    #[tokio::test]
    async fn test_customers_only_see_their_own_bills() {
        let app = TestApp::new();
        let owner = app.customer().await;
        let stranger = app.customer().await;
        let bill = BillBuilder::new(owner).build();
        app.store.seed_bill(bill.clone()).await;

        let uri = format!("/api/v1/bills/{}", bill.id);
        let (status, body) = app
            .send(Method::GET, &uri, Some(&customer_token(owner)), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], bill.id.to_string());

        let (status, _) = app
            .send(Method::GET, &uri, Some(&customer_token(stranger)), None)
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = app
            .send(Method::GET, "/api/v1/bills", Some(&customer_token(owner)), None)
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_list_by_status() {
        let app = TestApp::new();
        let customer = app.customer().await;
        app.store
            .seed_bill(BillBuilder::new(customer).with_status(BillStatus::Overdue).build())
            .await;
        app.store.seed_bill(BillBuilder::new(customer).build()).await;

        let (status, body) = app
            .send(Method::GET, "/api/v1/bills?status=overdue", Some(&cashier()), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 1);

        let (status, body) = app
            .send(Method::GET, "/api/v1/bills?status=settled", Some(&cashier()), None)
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "bad_request");
    }

    #[tokio::test]
    async fn test_unknown_bill_is_not_found() {
        let app = TestApp::new();
        let uri = format!("/api/v1/bills/{}", uuid::Uuid::new_v4());
        let (status, body) = app.send(Method::GET, &uri, Some(&cashier()), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "BILL_NOT_FOUND");
    }
}

// ============================================================================
// Payment Tests
// ============================================================================

mod payment_tests {
    use super::*;

    #[tokio::test]
    async fn test_cashier_payment_settles_bill_with_change() {
        let app = TestApp::new();
        let customer = app.customer().await;
        let bill = BillBuilder::new(customer).with_amount(dec!(547)).build();
        app.store.seed_bill(bill.clone()).await;

        let (status, body) = app
            .send(
                Method::POST,
                "/api/v1/payments/cashier",
                Some(&cashier()),
                Some(json!({
                    "bill_id": bill.id.to_string(),
                    "amount_tendered": "600",
                    "method": "cash",
                    "receipt_number": "OR-1001",
                })),
            )
            .await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["bill"]["status"], "paid");
        assert_eq!(decimal(&body["change_given"]), dec!(53));
        assert_eq!(decimal(&body["to_principal"]), dec!(547));
    }

    #[tokio::test]
    async fn test_duplicate_receipt_conflicts() {
        let app = TestApp::new();
        let customer = app.customer().await;
        let first = BillBuilder::new(customer).with_amount(dec!(100)).build();
        let second = BillBuilder::new(customer).with_amount(dec!(100)).build();
        app.store.seed_bill(first.clone()).await;
        app.store.seed_bill(second.clone()).await;

        for (bill, expected) in [(&first, StatusCode::CREATED), (&second, StatusCode::CONFLICT)] {
            let (status, _) = app
                .send(
                    Method::POST,
                    "/api/v1/payments/cashier",
                    Some(&cashier()),
                    Some(json!({
                        "bill_id": bill.id.to_string(),
                        "amount_tendered": "100",
                        "method": "cash",
                        "receipt_number": "OR-2002",
                    })),
                )
                .await;
            assert_eq!(status, expected);
        }
    }

    #[tokio::test]
    async fn test_proof_submitted_by_customer_and_approved() {
        let app = TestApp::new();
        let customer = app.customer().await;
        let bill = BillBuilder::new(customer).with_amount(dec!(547)).build();
        app.store.seed_bill(bill.clone()).await;

        let (status, body) = app
            .send(
                Method::POST,
                "/api/v1/payments/proofs",
                Some(&customer_token(customer)),
                Some(json!({
                    "bill_id": bill.id.to_string(),
                    "amount": "547",
                    "method": "e_wallet",
                    "reference_number": "GC-778899",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["status"], "pending");
        let payment_id = body["id"].as_str().unwrap().to_string();

        let (status, body) = app
            .send(Method::GET, "/api/v1/payments/proofs/pending", Some(&cashier()), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 1);

        let uri = format!("/api/v1/payments/proofs/{}/approve", payment_id);
        let (status, body) = app.send(Method::POST, &uri, Some(&cashier()), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["bill"]["status"], "paid");

        let (status, body) = app.send(Method::POST, &uri, Some(&cashier()), None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "PAYMENT_NOT_PENDING");
    }

    #[tokio::test]
    async fn test_customer_cannot_submit_proof_for_another_account() {
        let app = TestApp::new();
        let owner = app.customer().await;
        let stranger = app.customer().await;
        let bill = BillBuilder::new(owner).build();
        app.store.seed_bill(bill.clone()).await;

        let (status, _) = app
            .send(
                Method::POST,
                "/api/v1/payments/proofs",
                Some(&customer_token(stranger)),
                Some(json!({
                    "bill_id": bill.id.to_string(),
                    "amount": "1000",
                    "method": "bank_transfer",
                    "reference_number": "BT-1",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_rejected_proof_keeps_reason() {
        let app = TestApp::new();
        let customer = app.customer().await;
        let bill = BillBuilder::new(customer).build();
        app.store.seed_bill(bill.clone()).await;

        let (_, body) = app
            .send(
                Method::POST,
                "/api/v1/payments/proofs",
                Some(&customer_token(customer)),
                Some(json!({
                    "bill_id": bill.id.to_string(),
                    "amount": "1000",
                    "method": "bank_transfer",
                    "reference_number": "BT-42",
                })),
            )
            .await;
        let uri = format!("/api/v1/payments/proofs/{}/reject", body["id"].as_str().unwrap());

        let (status, body) = app
            .send(
                Method::POST,
                &uri,
                Some(&cashier()),
                Some(json!({ "reason": "Blurry screenshot" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "rejected");
    }
}

// ============================================================================
// Credit Tests
// ============================================================================

mod credit_tests {
    use super::*;

    #[tokio::test]
    async fn test_deposit_then_account_view() {
        let app = TestApp::new();
        let customer = app.customer().await;
        let uri = format!("/api/v1/customers/{}/credit", customer);

        let (status, body) = app
            .send(
                Method::POST,
                &uri,
                Some(&cashier()),
                Some(json!({ "amount": "500", "description": "Counter deposit" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(decimal(&body["new_balance"]), dec!(500));

        let (status, body) = app
            .send(Method::GET, &uri, Some(&customer_token(customer)), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(decimal(&body["balance"]), dec!(500));
        assert_eq!(body["transactions"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_overdraw_conflicts() {
        let app = TestApp::new();
        let customer = app.customer().await;
        let uri = format!("/api/v1/customers/{}/credit/debit", customer);

        let (status, body) = app
            .send(Method::POST, &uri, Some(&cashier()), Some(json!({ "amount": "50" })))
            .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "INSUFFICIENT_BALANCE");
    }

    #[tokio::test]
    async fn test_adjustment_is_admin_only() {
        let app = TestApp::new();
        let customer = app.customer().await;
        let uri = format!("/api/v1/customers/{}/credit/adjust", customer);
        let body = json!({ "new_balance": "250", "reason": "Migration" });

        let (status, _) = app
            .send(Method::POST, &uri, Some(&cashier()), Some(body.clone()))
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = app.send(Method::POST, &uri, Some(&admin()), Some(body)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(decimal(&body["new_balance"]), dec!(250));

        let uri = format!("/api/v1/customers/{}/credit/reconcile", customer);
        let (status, body) = app.send(Method::GET, &uri, Some(&admin()), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(decimal(&body["cached_balance"]), dec!(250));
    }

    #[tokio::test]
    async fn test_customer_applies_own_credit_to_bill() {
        let app = TestApp::new();
        let customer = CustomerBuilder::new().with_credit_balance(dec!(300)).build();
        let customer_id = customer.id;
        app.store.seed_customer(customer).await;
        let bill = BillBuilder::new(customer_id).with_amount(dec!(547)).build();
        app.store.seed_bill(bill.clone()).await;

        let uri = format!("/api/v1/customers/{}/credit/apply", customer_id);
        let (status, body) = app
            .send(
                Method::POST,
                &uri,
                Some(&customer_token(customer_id)),
                Some(json!({ "bill_id": bill.id.to_string(), "amount": "300" })),
            )
            .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(decimal(&body["new_balance"]), dec!(0));
        assert_eq!(body["bill"]["status"], "partially_paid");
    }

    #[tokio::test]
    async fn test_encoder_cannot_apply_credit() {
        let app = TestApp::new();
        let customer = CustomerBuilder::new().with_credit_balance(dec!(300)).build();
        let customer_id = customer.id;
        app.store.seed_customer(customer).await;
        let bill = BillBuilder::new(customer_id).with_amount(dec!(547)).build();
        app.store.seed_bill(bill.clone()).await;

        let uri = format!("/api/v1/customers/{}/credit/apply", customer_id);
        let (status, body) = app
            .send(
                Method::POST,
                &uri,
                Some(&token("encoder-1", Role::Encoder)),
                Some(json!({ "bill_id": bill.id.to_string(), "amount": "100" })),
            )
            .await;

        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "FORBIDDEN");
        assert_eq!(
            app.store.customer(customer_id).await.unwrap().credit_balance.amount(),
            dec!(300)
        );
    }
}

// ============================================================================
// Penalty Tests
// ============================================================================

mod penalty_tests {
    use super::*;

    #[tokio::test]
    async fn test_sweep_requires_admin() {
        let app = TestApp::new();
        let customer = app.customer().await;
        app.store
            .seed_bill(BillBuilder::new(customer).with_amount(dec!(1000)).build())
            .await;
        let uri = format!("/api/v1/penalties/sweep?as_of={}", DateFixtures::days_past_due(45));

        let (status, _) = app.send(Method::POST, &uri, Some(&cashier()), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = app.send(Method::POST, &uri, Some(&admin()), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["scanned"], 1);
        assert_eq!(body["marked_overdue"], 1);
    }

    #[tokio::test]
    async fn test_bill_penalty_summary() {
        let app = TestApp::new();
        let customer = app.customer().await;
        let bill = BillBuilder::new(customer).with_amount(dec!(1000)).build();
        app.store.seed_bill(bill.clone()).await;

        let uri = format!(
            "/api/v1/bills/{}/penalty?as_of={}",
            bill.id,
            DateFixtures::days_past_due(45)
        );
        let (status, body) = app
            .send(Method::GET, &uri, Some(&customer_token(customer)), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["days_overdue"], 45);
    }

    #[tokio::test]
    async fn test_preview_within_grace_period() {
        let app = TestApp::new();
        let (status, body) = app
            .send(
                Method::POST,
                "/api/v1/penalties/preview",
                Some(&cashier()),
                Some(json!({
                    "base_amount": "1000",
                    "due_date": DateFixtures::due_date(),
                    "as_of": DateFixtures::due_date(),
                })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["has_penalty"], false);
    }
}

// ============================================================================
// Settings Tests
// ============================================================================

mod settings_tests {
    use super::*;

    #[tokio::test]
    async fn test_defaults_use_reference_table() {
        let app = TestApp::new();
        let (status, body) = app
            .send(Method::GET, "/api/v1/settings/rate-tiers", Some(&cashier()), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["reference_table"], true);
    }

    #[tokio::test]
    async fn test_unknown_setting_is_rejected() {
        let app = TestApp::new();
        let (status, _) = app
            .send(
                Method::PUT,
                "/api/v1/settings/favourite_colour",
                Some(&admin()),
                Some(json!({ "value": "blue" })),
            )
            .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_replaced_tiers_price_previews() {
        let app = TestApp::new();
        let tiers = json!({
            "tiers": [
                { "consumption_min": "0", "consumption_max": "10", "fixed_amount": "250" },
                { "consumption_min": "11", "consumption_max": null, "rate_per_unit": "30" },
            ]
        });

        let (status, _) = app
            .send(Method::PUT, "/api/v1/settings/rate-tiers", Some(&cashier()), Some(tiers.clone()))
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = app
            .send(Method::PUT, "/api/v1/settings/rate-tiers", Some(&admin()), Some(tiers))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["reference_table"], false);
        assert_eq!(body["tiers"].as_array().unwrap().len(), 2);

        let (status, body) = app
            .send(
                Method::POST,
                "/api/v1/settings/rate-tiers/preview",
                Some(&cashier()),
                Some(json!({ "consumption": "7" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(decimal(&body["gross_amount"]), dec!(250));
    }
}

// ============================================================================
// OTP Tests
// ============================================================================

mod otp_tests {
    use super::*;

    fn code_from(text: &str) -> String {
        text.split(|c: char| !c.is_ascii_digit())
            .find(|part| part.len() == 6)
            .unwrap()
            .to_string()
    }

    #[tokio::test]
    async fn test_send_then_verify() {
        let app = TestApp::new();

        let (status, body) = app
            .send(
                Method::POST,
                "/api/v1/otp/send",
                None,
                Some(json!({ "phone_number": StringFixtures::local_phone() })),
            )
            .await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(body["phone"], StringFixtures::phone());
        assert!(body.get("code").is_none());

        let sent = app.sms.sent().await;
        assert_eq!(sent.len(), 1);
        let code = code_from(&sent[0].text);

        let (status, _) = app
            .send(
                Method::POST,
                "/api/v1/otp/verify",
                None,
                Some(json!({ "phone_number": StringFixtures::phone(), "code": code })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);

        // single use
        let (status, body) = app
            .send(
                Method::POST,
                "/api/v1/otp/verify",
                None,
                Some(json!({ "phone_number": StringFixtures::phone(), "code": code })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "OTP_NOT_REQUESTED");
    }

    #[tokio::test]
    async fn test_invalid_phone() {
        let app = TestApp::new();
        let (status, body) = app
            .send(
                Method::POST,
                "/api/v1/otp/send",
                None,
                Some(json!({ "phone_number": "12345" })),
            )
            .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"], "INVALID_PHONE");
    }

    #[tokio::test]
    async fn test_gateway_failure_is_bad_gateway() {
        let app = TestApp::new();
        app.sms.fail_all();
        let (status, body) = app
            .send(
                Method::POST,
                "/api/v1/otp/send",
                None,
                Some(json!({ "phone_number": StringFixtures::phone() })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"], "OTP_DELIVERY_FAILED");
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

mod property_tests {
    use super::*;
    use axum::http::{HeaderMap, HeaderValue};

    proptest! {
        #[test]
        fn prop_forwarded_for_takes_first_hop(
            a in 1u8..=254, b in 0u8..=255, c in 0u8..=255, d in 1u8..=254,
        ) {
            let client = format!("{}.{}.{}.{}", a, b, c, d);
            let mut headers = HeaderMap::new();
            headers.insert(
                "x-forwarded-for",
                HeaderValue::from_str(&format!("{}, 10.0.0.1", client)).unwrap(),
            );
            prop_assert_eq!(client_address(&headers), Some(client));
        }
    }
}
