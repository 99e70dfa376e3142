mod common;

use axum::http::{Method, StatusCode};
use checkout_api::errors::ServiceError;
use checkout_api::models::{CheckoutStatus, PaymentStatus, PaymentType};
use checkout_api::services::checkout::session::{AddressRequest, BuyerRequest, CheckoutItemRequest};
use checkout_api::services::checkout::{
    CreateCheckoutSessionRequest, UpdateCheckoutSessionRequest,
};
use checkout_api::services::payments::PspPaymentStatus;
use common::{ApproveBehavior, TestApp};
use rust_decimal_macros::dec;
use serde_json::json;
use std::sync::atomic::Ordering;

async fn prepared_session(app: &TestApp) -> String {
    app.seed_product("prod-a", "Wool socks", dec!(10000)).await;

    let session = app
        .checkout
        .create_session(CreateCheckoutSessionRequest {
            items: vec![CheckoutItemRequest {
                product_id: "prod-a".to_string(),
                quantity: 4,
            }],
            buyer: Some(BuyerRequest {
                email: Some("jo@example.com".to_string()),
                name: None,
            }),
            shipping_address: Some(AddressRequest {
                country_code: "KR".to_string(),
                postal_code: Some("06236".to_string()),
            }),
            currency: "KRW".to_string(),
        })
        .await
        .unwrap();

    let ready = app
        .checkout
        .update_session(
            &session.id,
            UpdateCheckoutSessionRequest {
                selected_fulfillment_option_id: Some("standard".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(ready.status, CheckoutStatus::Ready);

    app.checkout.complete_session(&session.id).await.unwrap();
    session.id
}

#[tokio::test]
async fn approve_timeout_with_landed_charge_is_netted_out() {
    let app = TestApp::new().await;
    let session_id = prepared_session(&app).await;

    app.psp.set_approve(ApproveBehavior::Timeout);
    app.psp.set_landed_status(PspPaymentStatus::Paid);

    let err = app
        .checkout
        .confirm_payment(&session_id, "pg-token-1")
        .await
        .unwrap_err();
    // The caller sees the original timeout, not the recovery outcome.
    assert!(matches!(err, ServiceError::PspTimeout(_)));

    let rows = app.payment_store.rows_for_order(&session_id).await;
    let prepare = rows
        .iter()
        .find(|r| r.payment_type == PaymentType::Prepare)
        .unwrap();
    let cancel = rows
        .iter()
        .find(|r| r.payment_type == PaymentType::Cancel)
        .expect("net-cancel row must be on the ledger");
    assert_eq!(cancel.status, PaymentStatus::Success);
    assert_eq!(cancel.org_payment_id.as_deref(), Some(prepare.id.as_str()));
    assert!(rows
        .iter()
        .any(|r| r.payment_type == PaymentType::Approve && r.status == PaymentStatus::Fail));

    // No money captured, so no order and the session is still open.
    let session = app.checkout.get_session(&session_id).await.unwrap();
    assert_eq!(session.status, CheckoutStatus::Ready);
    assert_eq!(app.order_store.count().await, 0);
    assert_eq!(app.psp.cancel_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn approve_timeout_without_landed_charge_skips_reversal() {
    let app = TestApp::new().await;
    let session_id = prepared_session(&app).await;

    app.psp.set_approve(ApproveBehavior::Timeout);
    app.psp.set_landed_status(PspPaymentStatus::Ready);

    let err = app
        .checkout
        .confirm_payment(&session_id, "pg-token-1")
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::PspTimeout(_)));

    assert_eq!(app.psp.status_calls.load(Ordering::SeqCst), 1);
    assert_eq!(app.psp.cancel_calls.load(Ordering::SeqCst), 0);

    let rows = app.payment_store.rows_for_order(&session_id).await;
    assert!(!rows.iter().any(|r| r.payment_type == PaymentType::Cancel));
}

#[tokio::test]
async fn failed_reversal_still_surfaces_the_original_error() {
    let app = TestApp::new().await;
    let session_id = prepared_session(&app).await;

    app.psp.set_approve(ApproveBehavior::Timeout);
    app.psp.set_landed_status(PspPaymentStatus::Paid);
    app.psp.set_cancel_fails(true);

    let err = app
        .checkout
        .confirm_payment(&session_id, "pg-token-1")
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::PspTimeout(_)));

    let rows = app.payment_store.rows_for_order(&session_id).await;
    assert!(!rows
        .iter()
        .any(|r| r.payment_type == PaymentType::Cancel && r.status == PaymentStatus::Success));
    // The failed approval is still recorded for the retry path.
    assert!(rows
        .iter()
        .any(|r| r.payment_type == PaymentType::Approve && r.status == PaymentStatus::Fail));
}

#[tokio::test]
async fn business_decline_never_touches_the_reversal_path() {
    let app = TestApp::new().await;
    let session_id = prepared_session(&app).await;

    app.psp.set_approve(ApproveBehavior::Decline);

    let err = app
        .checkout
        .confirm_payment(&session_id, "pg-token-1")
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::PspError(_)));

    assert_eq!(app.psp.status_calls.load(Ordering::SeqCst), 0);
    assert_eq!(app.psp.cancel_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn payment_endpoints_expose_the_ledger_flow() {
    let app = TestApp::new().await;

    let prepare_body = json!({
        "merchant_order_id": "ord-http-1",
        "amount": "44000",
        "currency": "KRW",
        "items": [{ "name": "Wool socks", "quantity": 2, "unit_price": "20000" }]
    });

    let (status, body) = app
        .request(Method::POST, "/payments/prepare", Some(prepare_body.clone()))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "READY");
    let payment_id = body["payment_id"].as_str().unwrap().to_string();

    // Idempotent replay over HTTP.
    let (status, body) = app
        .request(Method::POST, "/payments/prepare", Some(prepare_body))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["payment_id"], payment_id.as_str());
    assert_eq!(app.psp.prepare_calls.load(Ordering::SeqCst), 1);

    let (status, body) = app
        .request(
            Method::POST,
            "/payments/approve",
            Some(json!({ "merchant_order_id": "ord-http-1", "pg_token": "tok" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "COMPLETED");

    let (status, body) = app
        .request(
            Method::POST,
            "/payments/cancel",
            Some(json!({
                "merchant_order_id": "ord-http-1",
                "amount": "44000",
                "reason": "requested_by_customer"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "SUCCESS");
}

#[tokio::test]
async fn approve_without_prepare_is_a_conflict_over_http() {
    let app = TestApp::new().await;

    let (status, body) = app
        .request(
            Method::POST,
            "/payments/approve",
            Some(json!({ "merchant_order_id": "ord-unknown", "pg_token": "tok" })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "prepare_not_found");
}
