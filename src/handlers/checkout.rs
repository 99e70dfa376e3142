use crate::errors::ServiceError;
use crate::models::{
    Address, Buyer, CheckoutItem, CheckoutSession, CheckoutStatus, FulfillmentOption, Order,
};
use crate::services::checkout::{CreateCheckoutSessionRequest, UpdateCheckoutSessionRequest};
use crate::AppState;
use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub fn checkout_routes() -> Router<AppState> {
    Router::new()
        .route("/checkout_sessions", post(create_checkout_session))
        .route(
            "/checkout_sessions/:checkout_session_id",
            get(get_checkout_session).post(update_checkout_session),
        )
        .route(
            "/checkout_sessions/:checkout_session_id/complete",
            post(complete_checkout_session),
        )
        .route(
            "/checkout_sessions/:checkout_session_id/confirm",
            post(confirm_checkout_session),
        )
        .route(
            "/checkout_sessions/:checkout_session_id/cancel",
            post(cancel_checkout_session),
        )
}

/// One line of the broken-out totals block in session responses.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TotalLine {
    #[serde(rename = "type")]
    pub total_type: String,
    pub display_text: String,
    pub amount: Decimal,
}

/// Wire shape of a checkout session. Totals are broken out by type and the
/// fulfillment options reflect the live recomputation, not stored state.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CheckoutSessionResponse {
    pub id: String,
    pub status: CheckoutStatus,
    pub currency: String,
    pub line_items: Vec<CheckoutItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buyer: Option<Buyer>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shipping_address: Option<Address>,
    pub fulfillment_options: Vec<FulfillmentOption>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_fulfillment_option_id: Option<String>,
    pub totals: Vec<TotalLine>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_action_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancel_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl From<CheckoutSession> for CheckoutSessionResponse {
    fn from(session: CheckoutSession) -> Self {
        let totals = vec![
            TotalLine {
                total_type: "items_base_amount".into(),
                display_text: "Items".into(),
                amount: session.totals.items_base_amount,
            },
            TotalLine {
                total_type: "discount".into(),
                display_text: "Discount".into(),
                amount: session.totals.items_discount,
            },
            TotalLine {
                total_type: "subtotal".into(),
                display_text: "Subtotal".into(),
                amount: session.totals.subtotal,
            },
            TotalLine {
                total_type: "fulfillment".into(),
                display_text: "Shipping".into(),
                amount: session.totals.shipping,
            },
            TotalLine {
                total_type: "tax".into(),
                display_text: "Tax".into(),
                amount: session.totals.tax,
            },
            TotalLine {
                total_type: "total".into(),
                display_text: "Total".into(),
                amount: session.totals.total,
            },
        ];

        Self {
            id: session.id,
            status: session.status,
            currency: session.currency,
            line_items: session.items,
            buyer: session.buyer,
            shipping_address: session.shipping_address,
            fulfillment_options: session.available_fulfillment_options,
            selected_fulfillment_option_id: session.selected_fulfillment_option_id,
            totals,
            next_action_url: session.next_action_url,
            cancel_reason: session.cancel_reason,
            created_at: session.created_at,
            updated_at: session.updated_at,
            expires_at: session.expires_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ConfirmPaymentRequest {
    pub pg_token: String,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct CancelSessionRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ConfirmPaymentResponse {
    pub session: CheckoutSessionResponse,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<Order>,
}

#[utoipa::path(
    post,
    path = "/checkout_sessions",
    request_body = CreateCheckoutSessionRequest,
    responses(
        (status = 201, description = "Checkout session created", body = CheckoutSessionResponse),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 404, description = "Unknown product", body = crate::errors::ErrorResponse)
    ),
    tag = "checkout"
)]
pub async fn create_checkout_session(
    State(state): State<AppState>,
    Json(payload): Json<CreateCheckoutSessionRequest>,
) -> Result<(StatusCode, Json<CheckoutSessionResponse>), ServiceError> {
    let session = state.checkout.create_session(payload).await?;
    Ok((StatusCode::CREATED, Json(session.into())))
}

#[utoipa::path(
    get,
    path = "/checkout_sessions/{checkout_session_id}",
    responses(
        (status = 200, description = "Checkout session", body = CheckoutSessionResponse),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "checkout"
)]
pub async fn get_checkout_session(
    State(state): State<AppState>,
    Path(checkout_session_id): Path<String>,
) -> Result<Json<CheckoutSessionResponse>, ServiceError> {
    let session = state.checkout.get_session(&checkout_session_id).await?;
    Ok(Json(session.into()))
}

#[utoipa::path(
    post,
    path = "/checkout_sessions/{checkout_session_id}",
    request_body = UpdateCheckoutSessionRequest,
    responses(
        (status = 200, description = "Updated session", body = CheckoutSessionResponse),
        (status = 409, description = "Session not mutable", body = crate::errors::ErrorResponse),
        (status = 422, description = "Option unavailable", body = crate::errors::ErrorResponse)
    ),
    tag = "checkout"
)]
pub async fn update_checkout_session(
    State(state): State<AppState>,
    Path(checkout_session_id): Path<String>,
    Json(payload): Json<UpdateCheckoutSessionRequest>,
) -> Result<Json<CheckoutSessionResponse>, ServiceError> {
    let session = state
        .checkout
        .update_session(&checkout_session_id, payload)
        .await?;
    Ok(Json(session.into()))
}

#[utoipa::path(
    post,
    path = "/checkout_sessions/{checkout_session_id}/complete",
    responses(
        (status = 200, description = "Payment prepared; next_action_url set", body = CheckoutSessionResponse),
        (status = 409, description = "Not ready for payment", body = crate::errors::ErrorResponse)
    ),
    tag = "checkout"
)]
pub async fn complete_checkout_session(
    State(state): State<AppState>,
    Path(checkout_session_id): Path<String>,
) -> Result<Json<CheckoutSessionResponse>, ServiceError> {
    let session = state.checkout.complete_session(&checkout_session_id).await?;
    Ok(Json(session.into()))
}

#[utoipa::path(
    post,
    path = "/checkout_sessions/{checkout_session_id}/confirm",
    request_body = ConfirmPaymentRequest,
    responses(
        (status = 200, description = "Payment confirmed; order created", body = ConfirmPaymentResponse),
        (status = 402, description = "Approval failed", body = crate::errors::ErrorResponse),
        (status = 409, description = "Not ready for payment", body = crate::errors::ErrorResponse)
    ),
    tag = "checkout"
)]
pub async fn confirm_checkout_session(
    State(state): State<AppState>,
    Path(checkout_session_id): Path<String>,
    Json(payload): Json<ConfirmPaymentRequest>,
) -> Result<Json<ConfirmPaymentResponse>, ServiceError> {
    let result = state
        .checkout
        .confirm_payment(&checkout_session_id, &payload.pg_token)
        .await?;
    Ok(Json(ConfirmPaymentResponse {
        session: result.session.into(),
        order: result.order,
    }))
}

#[utoipa::path(
    post,
    path = "/checkout_sessions/{checkout_session_id}/cancel",
    request_body = CancelSessionRequest,
    responses(
        (status = 200, description = "Session canceled", body = CheckoutSessionResponse),
        (status = 409, description = "Session not open", body = crate::errors::ErrorResponse)
    ),
    tag = "checkout"
)]
pub async fn cancel_checkout_session(
    State(state): State<AppState>,
    Path(checkout_session_id): Path<String>,
    Json(payload): Json<CancelSessionRequest>,
) -> Result<Json<CheckoutSessionResponse>, ServiceError> {
    let reason = payload
        .reason
        .unwrap_or_else(|| "requested_by_customer".to_string());
    let session = state
        .checkout
        .cancel_session(&checkout_session_id, &reason)
        .await?;
    Ok(Json(session.into()))
}
