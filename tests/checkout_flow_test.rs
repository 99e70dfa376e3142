mod common;

use axum::http::{Method, StatusCode};
use checkout_api::errors::ServiceError;
use checkout_api::models::{CheckoutStatus, PaymentStatus, PaymentType};
use checkout_api::services::checkout::{
    CreateCheckoutSessionRequest, UpdateCheckoutSessionRequest,
};
use checkout_api::services::checkout::session::{AddressRequest, BuyerRequest, CheckoutItemRequest};
use common::{ApproveBehavior, TestApp};
use rust_decimal_macros::dec;
use serde_json::json;

fn item(product_id: &str, quantity: i32) -> CheckoutItemRequest {
    CheckoutItemRequest {
        product_id: product_id.to_string(),
        quantity,
    }
}

fn buyer() -> BuyerRequest {
    BuyerRequest {
        email: Some("jo@example.com".to_string()),
        name: Some("Jo".to_string()),
    }
}

fn kr_address(postal: &str) -> AddressRequest {
    AddressRequest {
        country_code: "KR".to_string(),
        postal_code: Some(postal.to_string()),
    }
}

fn create_request(items: Vec<CheckoutItemRequest>) -> CreateCheckoutSessionRequest {
    CreateCheckoutSessionRequest {
        items,
        buyer: None,
        shipping_address: None,
        currency: "KRW".to_string(),
    }
}

async fn seeded_app() -> TestApp {
    let app = TestApp::new().await;
    app.seed_product("prod-a", "Wool socks", dec!(10000)).await;
    app.seed_product("prod-b", "Felt hat", dec!(20000)).await;
    app
}

#[tokio::test]
async fn new_session_computes_totals_and_starts_not_ready() {
    // 2 x 10000 + 1 x 20000 KRW: base 40000, tax 4000, total 44000.
    let app = seeded_app().await;

    let session = app
        .checkout
        .create_session(create_request(vec![item("prod-a", 2), item("prod-b", 1)]))
        .await
        .unwrap();

    assert_eq!(session.status, CheckoutStatus::NotReady);
    assert_eq!(session.totals.items_base_amount, dec!(40000));
    assert_eq!(session.totals.subtotal, dec!(40000));
    assert_eq!(session.totals.tax, dec!(4000));
    assert_eq!(session.totals.shipping, dec!(0));
    assert_eq!(session.totals.total, dec!(44000));
    assert_eq!(session.items[0].unit_price, dec!(10000));
}

#[tokio::test]
async fn unknown_product_rejects_creation() {
    let app = seeded_app().await;

    let err = app
        .checkout
        .create_session(create_request(vec![item("prod-missing", 1)]))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::ProductNotFound(_)));
}

#[tokio::test]
async fn invalid_kr_postal_code_rejects_creation() {
    let app = seeded_app().await;

    let mut request = create_request(vec![item("prod-a", 1)]);
    request.shipping_address = Some(kr_address("123"));

    let err = app.checkout.create_session(request).await.unwrap_err();
    assert!(matches!(err, ServiceError::InvalidAddress(_)));
}

#[tokio::test]
async fn express_selection_reaches_ready_with_recomputed_totals() {
    // 4 x 10000 = 40000 base, express 5000, tax 4000 => 49000 READY.
    let app = seeded_app().await;

    let session = app
        .checkout
        .create_session(create_request(vec![item("prod-a", 4)]))
        .await
        .unwrap();

    let updated = app
        .checkout
        .update_session(
            &session.id,
            UpdateCheckoutSessionRequest {
                buyer: Some(buyer()),
                shipping_address: Some(kr_address("04524")),
                selected_fulfillment_option_id: Some("express".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.status, CheckoutStatus::Ready);
    assert_eq!(updated.totals.shipping, dec!(5000));
    assert_eq!(updated.totals.total, dec!(49000));
}

#[tokio::test]
async fn same_day_is_gated_by_seoul_postal_prefix() {
    let app = seeded_app().await;

    let session = app
        .checkout
        .create_session(create_request(vec![item("prod-a", 1)]))
        .await
        .unwrap();

    let in_area = app
        .checkout
        .update_session(
            &session.id,
            UpdateCheckoutSessionRequest {
                shipping_address: Some(kr_address("06236")),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(in_area
        .available_fulfillment_options
        .iter()
        .any(|o| o.id == "same_day"));

    let out_of_area = app
        .checkout
        .update_session(
            &session.id,
            UpdateCheckoutSessionRequest {
                shipping_address: Some(kr_address("99000")),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(!out_of_area
        .available_fulfillment_options
        .iter()
        .any(|o| o.id == "same_day"));
    assert!(out_of_area
        .available_fulfillment_options
        .iter()
        .any(|o| o.id == "standard"));
}

#[tokio::test]
async fn address_change_clears_fulfillment_selection() {
    let app = seeded_app().await;

    let session = app
        .checkout
        .create_session(create_request(vec![item("prod-a", 1)]))
        .await
        .unwrap();

    let selected = app
        .checkout
        .update_session(
            &session.id,
            UpdateCheckoutSessionRequest {
                buyer: Some(buyer()),
                shipping_address: Some(kr_address("06236")),
                selected_fulfillment_option_id: Some("same_day".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(
        selected.selected_fulfillment_option_id.as_deref(),
        Some("same_day")
    );

    let moved = app
        .checkout
        .update_session(
            &session.id,
            UpdateCheckoutSessionRequest {
                shipping_address: Some(kr_address("99000")),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(moved.selected_fulfillment_option_id, None);
    assert_eq!(moved.status, CheckoutStatus::NotReady);
    assert_eq!(moved.totals.shipping, dec!(0));
}

#[tokio::test]
async fn same_day_outside_area_is_unavailable_not_unknown() {
    let app = seeded_app().await;

    let session = app
        .checkout
        .create_session(create_request(vec![item("prod-a", 1)]))
        .await
        .unwrap();

    let err = app
        .checkout
        .update_session(
            &session.id,
            UpdateCheckoutSessionRequest {
                shipping_address: Some(kr_address("99000")),
                selected_fulfillment_option_id: Some("same_day".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::FulfillmentOptionUnavailable(_)));

    let err = app
        .checkout
        .update_session(
            &session.id,
            UpdateCheckoutSessionRequest {
                selected_fulfillment_option_id: Some("drone".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::UnknownFulfillmentOption(_)));
}

#[tokio::test]
async fn free_standard_shipping_at_threshold() {
    let app = seeded_app().await;

    // 5 x 10000 = 50000, exactly at the free-shipping threshold.
    let session = app
        .checkout
        .create_session(create_request(vec![item("prod-a", 5)]))
        .await
        .unwrap();

    let updated = app
        .checkout
        .update_session(
            &session.id,
            UpdateCheckoutSessionRequest {
                buyer: Some(buyer()),
                shipping_address: Some(kr_address("04524")),
                selected_fulfillment_option_id: Some("standard".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.totals.shipping, dec!(0));
    assert_eq!(updated.totals.total, dec!(55000));
}

async fn ready_session(app: &TestApp) -> String {
    let session = app
        .checkout
        .create_session(create_request(vec![item("prod-a", 2), item("prod-b", 1)]))
        .await
        .unwrap();
    let updated = app
        .checkout
        .update_session(
            &session.id,
            UpdateCheckoutSessionRequest {
                buyer: Some(buyer()),
                shipping_address: Some(kr_address("06236")),
                selected_fulfillment_option_id: Some("standard".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.status, CheckoutStatus::Ready);
    updated.id
}

#[tokio::test]
async fn complete_then_confirm_creates_one_order() {
    let app = seeded_app().await;
    let session_id = ready_session(&app).await;

    let completed = app.checkout.complete_session(&session_id).await.unwrap();
    assert_eq!(completed.status, CheckoutStatus::Ready);
    assert!(completed
        .next_action_url
        .as_deref()
        .unwrap()
        .starts_with("https://psp.test/redirect/"));

    let result = app
        .checkout
        .confirm_payment(&session_id, "pg-token-1")
        .await
        .unwrap();
    assert_eq!(result.session.status, CheckoutStatus::Completed);
    let order = result.order.unwrap();
    assert_eq!(order.total_amount, result.session.totals.total);
    assert_eq!(order.items[0].product_name, "Wool socks");
    assert_eq!(app.order_store.count().await, 1);

    // Replay: no second order, same terminal state.
    let replay = app
        .checkout
        .confirm_payment(&session_id, "pg-token-1")
        .await
        .unwrap();
    assert_eq!(replay.session.status, CheckoutStatus::Completed);
    assert!(replay.order.is_none());
    assert_eq!(app.order_store.count().await, 1);
}

#[tokio::test]
async fn complete_is_idempotent_at_the_psp() {
    let app = seeded_app().await;
    let session_id = ready_session(&app).await;

    let first = app.checkout.complete_session(&session_id).await.unwrap();
    let second = app.checkout.complete_session(&session_id).await.unwrap();

    assert_eq!(first.next_action_url, second.next_action_url);
    assert_eq!(
        app.psp.prepare_calls.load(std::sync::atomic::Ordering::SeqCst),
        1
    );
}

#[tokio::test]
async fn confirm_requires_ready_session() {
    let app = seeded_app().await;

    let session = app
        .checkout
        .create_session(create_request(vec![item("prod-a", 1)]))
        .await
        .unwrap();

    let err = app
        .checkout
        .confirm_payment(&session.id, "pg-token-1")
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidState(_)));
}

#[tokio::test]
async fn create_rejects_an_empty_item_list() {
    let app = seeded_app().await;

    let err = app
        .checkout
        .create_session(create_request(Vec::new()))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::ValidationError(_)));
}

#[tokio::test]
async fn complete_without_fulfillment_selection_promotes_to_ready() {
    let app = seeded_app().await;

    let session = app
        .checkout
        .create_session(create_request(vec![item("prod-a", 2)]))
        .await
        .unwrap();
    let updated = app
        .checkout
        .update_session(
            &session.id,
            UpdateCheckoutSessionRequest {
                buyer: Some(buyer()),
                shipping_address: Some(kr_address("06236")),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.status, CheckoutStatus::NotReady);

    let completed = app.checkout.complete_session(&session.id).await.unwrap();
    assert_eq!(completed.status, CheckoutStatus::Ready);
    assert!(completed.next_action_url.is_some());

    let result = app
        .checkout
        .confirm_payment(&session.id, "pg-token-1")
        .await
        .unwrap();
    assert_eq!(result.session.status, CheckoutStatus::Completed);
}

#[tokio::test]
async fn completed_session_still_lists_fulfillment_options() {
    let app = seeded_app().await;
    let session_id = ready_session(&app).await;
    app.checkout.complete_session(&session_id).await.unwrap();
    app.checkout
        .confirm_payment(&session_id, "pg-token-1")
        .await
        .unwrap();

    let session = app.checkout.get_session(&session_id).await.unwrap();
    assert_eq!(session.status, CheckoutStatus::Completed);
    assert!(!session.available_fulfillment_options.is_empty());
}

#[tokio::test]
async fn declined_approval_leaves_session_ready() {
    let app = seeded_app().await;
    let session_id = ready_session(&app).await;
    app.checkout.complete_session(&session_id).await.unwrap();

    app.psp.set_approve(ApproveBehavior::Decline);
    let err = app
        .checkout
        .confirm_payment(&session_id, "pg-token-1")
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::PspError(_)));

    let session = app.checkout.get_session(&session_id).await.unwrap();
    assert_eq!(session.status, CheckoutStatus::Ready);
    assert_eq!(app.order_store.count().await, 0);

    // A FAIL row is on the ledger; a retry can approve again.
    let rows = app.payment_store.rows_for_order(&session_id).await;
    assert!(rows
        .iter()
        .any(|r| r.payment_type == PaymentType::Approve && r.status == PaymentStatus::Fail));

    app.psp.set_approve(ApproveBehavior::Succeed);
    let result = app
        .checkout
        .confirm_payment(&session_id, "pg-token-2")
        .await
        .unwrap();
    assert_eq!(result.session.status, CheckoutStatus::Completed);
}

#[tokio::test]
async fn canceled_session_rejects_updates() {
    let app = seeded_app().await;

    let session = app
        .checkout
        .create_session(create_request(vec![item("prod-a", 1)]))
        .await
        .unwrap();
    let canceled = app
        .checkout
        .cancel_session(&session.id, "changed my mind")
        .await
        .unwrap();
    assert_eq!(canceled.status, CheckoutStatus::Canceled);
    assert_eq!(canceled.cancel_reason.as_deref(), Some("changed my mind"));

    let err = app
        .checkout
        .update_session(
            &session.id,
            UpdateCheckoutSessionRequest {
                buyer: Some(buyer()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidState(_)));

    let err = app
        .checkout
        .cancel_session(&session.id, "again")
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidState(_)));
}

#[tokio::test]
async fn completed_session_rejects_updates_and_complete() {
    let app = seeded_app().await;
    let session_id = ready_session(&app).await;
    app.checkout.complete_session(&session_id).await.unwrap();
    app.checkout
        .confirm_payment(&session_id, "pg-token-1")
        .await
        .unwrap();

    let err = app
        .checkout
        .update_session(
            &session_id,
            UpdateCheckoutSessionRequest {
                items: Some(vec![item("prod-b", 1)]),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidState(_)));

    let err = app.checkout.complete_session(&session_id).await.unwrap_err();
    assert!(matches!(err, ServiceError::AlreadyCompleted));
}

#[tokio::test]
async fn http_surface_round_trips_a_session() {
    let app = seeded_app().await;

    let (status, body) = app
        .request(
            Method::POST,
            "/checkout_sessions",
            Some(json!({
                "items": [{ "product_id": "prod-a", "quantity": 2 }],
                "currency": "KRW"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], "not_ready_for_payment");

    // 2 x 10000 + 10% tax, no shipping yet. Decimal serializes as a string.
    let totals = body["totals"].as_array().unwrap();
    let total_line = totals.iter().find(|t| t["type"] == "total").unwrap();
    assert_eq!(total_line["amount"], json!("22000"));

    let session_id = body["id"].as_str().unwrap();
    let (status, body) = app
        .request(
            Method::GET,
            &format!("/checkout_sessions/{}", session_id),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], session_id);

    let (status, body) = app
        .request(
            Method::POST,
            &format!("/checkout_sessions/{}", session_id),
            Some(json!({
                "buyer": { "email": "jo@example.com" },
                "shipping_address": { "country_code": "KR", "postal_code": "06236" },
                "selected_fulfillment_option_id": "express"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready_for_payment");

    let (status, _) = app
        .request(Method::GET, "/checkout_sessions/nope", None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn http_errors_carry_machine_readable_codes() {
    let app = seeded_app().await;

    let (status, body) = app
        .request(
            Method::POST,
            "/checkout_sessions",
            Some(json!({
                "items": [{ "product_id": "ghost", "quantity": 1 }]
            })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "product_not_found");
}

#[tokio::test]
async fn order_is_readable_over_http_after_confirmation() {
    let app = seeded_app().await;
    let session_id = ready_session(&app).await;
    app.checkout.complete_session(&session_id).await.unwrap();
    let result = app
        .checkout
        .confirm_payment(&session_id, "pg-token-1")
        .await
        .unwrap();
    let order_id = result.order.unwrap().id;

    let (status, body) = app
        .request(Method::GET, &format!("/orders/{}", order_id), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], json!(order_id));
    assert_eq!(body["status"], json!("COMPLETED"));
    assert_eq!(body["user_id"], json!("jo@example.com"));

    let (status, body) = app
        .request(Method::GET, "/orders/no-such-order", None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "not_found");
}
