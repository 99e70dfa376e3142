use crate::errors::ServiceError;
use crate::models::{
    PaymentApproveRequest, PaymentApproveResponse, PaymentCancelRequest, PaymentCancelResponse,
    PaymentPrepareRequest, PaymentPrepareResponse,
};
use crate::AppState;
use axum::{
    extract::{Json, State},
    routing::post,
    Router,
};

pub fn payment_routes() -> Router<AppState> {
    Router::new()
        .route("/payments/prepare", post(prepare_payment))
        .route("/payments/approve", post(approve_payment))
        .route("/payments/cancel", post(cancel_payment))
}

#[utoipa::path(
    post,
    path = "/payments/prepare",
    request_body = PaymentPrepareRequest,
    responses(
        (status = 200, description = "Payment prepared (idempotent)", body = PaymentPrepareResponse),
        (status = 502, description = "PSP error", body = crate::errors::ErrorResponse)
    ),
    tag = "payments"
)]
pub async fn prepare_payment(
    State(state): State<AppState>,
    Json(payload): Json<PaymentPrepareRequest>,
) -> Result<Json<PaymentPrepareResponse>, ServiceError> {
    Ok(Json(state.payments.prepare(payload).await?))
}

#[utoipa::path(
    post,
    path = "/payments/approve",
    request_body = PaymentApproveRequest,
    responses(
        (status = 200, description = "Payment approved (idempotent)", body = PaymentApproveResponse),
        (status = 409, description = "No open PREPARE entry", body = crate::errors::ErrorResponse),
        (status = 504, description = "PSP timeout", body = crate::errors::ErrorResponse)
    ),
    tag = "payments"
)]
pub async fn approve_payment(
    State(state): State<AppState>,
    Json(payload): Json<PaymentApproveRequest>,
) -> Result<Json<PaymentApproveResponse>, ServiceError> {
    Ok(Json(state.payments.approve(payload).await?))
}

#[utoipa::path(
    post,
    path = "/payments/cancel",
    request_body = PaymentCancelRequest,
    responses(
        (status = 200, description = "Payment canceled (idempotent)", body = PaymentCancelResponse),
        (status = 409, description = "No approved payment", body = crate::errors::ErrorResponse)
    ),
    tag = "payments"
)]
pub async fn cancel_payment(
    State(state): State<AppState>,
    Json(payload): Json<PaymentCancelRequest>,
) -> Result<Json<PaymentCancelResponse>, ServiceError> {
    Ok(Json(state.payments.cancel(payload).await?))
}
