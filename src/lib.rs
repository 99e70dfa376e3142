pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod models;
pub mod services;

use axum::Router;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use services::checkout::CheckoutSessionService;
use services::orders::OrderService;
use services::payments::PaymentService;

/// Shared handler state: the wired service graph.
#[derive(Clone)]
pub struct AppState {
    pub checkout: Arc<CheckoutSessionService>,
    pub payments: Arc<PaymentService>,
    pub orders: Arc<OrderService>,
}

/// Builds the application router with the standard middleware stack.
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(handlers::health_routes())
        .merge(handlers::checkout_routes())
        .merge(handlers::payment_routes())
        .merge(handlers::order_routes())
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(CorsLayer::permissive())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .with_state(state)
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Checkout API",
        description = "Checkout session orchestration with prepare/approve/cancel payment flows"
    ),
    paths(
        handlers::checkout::create_checkout_session,
        handlers::checkout::get_checkout_session,
        handlers::checkout::update_checkout_session,
        handlers::checkout::complete_checkout_session,
        handlers::checkout::confirm_checkout_session,
        handlers::checkout::cancel_checkout_session,
        handlers::payments::prepare_payment,
        handlers::payments::approve_payment,
        handlers::payments::cancel_payment,
        handlers::orders::get_order,
    ),
    components(schemas(
        errors::ErrorResponse,
        models::CheckoutStatus,
        models::CheckoutItem,
        models::Buyer,
        models::Address,
        models::FulfillmentOption,
        models::Order,
        models::OrderLineItem,
        models::OrderStatus,
        models::PaymentItem,
        models::PaymentPrepareRequest,
        models::PaymentPrepareResponse,
        models::PaymentApproveRequest,
        models::PaymentApproveResponse,
        models::PaymentCancelRequest,
        models::PaymentCancelResponse,
        handlers::checkout::CheckoutSessionResponse,
        handlers::checkout::TotalLine,
        handlers::checkout::ConfirmPaymentRequest,
        handlers::checkout::ConfirmPaymentResponse,
        handlers::checkout::CancelSessionRequest,
        services::checkout::session::CreateCheckoutSessionRequest,
        services::checkout::session::UpdateCheckoutSessionRequest,
        services::checkout::session::CheckoutItemRequest,
        services::checkout::session::BuyerRequest,
        services::checkout::session::AddressRequest,
    )),
    tags(
        (name = "checkout", description = "Checkout session lifecycle"),
        (name = "payments", description = "Payment orchestration"),
        (name = "orders", description = "Order lookup")
    )
)]
pub struct ApiDoc;
