use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Standard error payload returned by every handler.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// HTTP status category (e.g., "Not Found", "Bad Request")
    pub error: String,
    /// Human-readable error description
    pub message: String,
    /// Machine-readable error code (e.g., "fulfillment_option_unavailable")
    pub code: String,
    /// ISO 8601 timestamp when the error occurred
    pub timestamp: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    // Checkout validation failures, surfaced as 4xx and never retried.
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Unknown fulfillment option: {0}")]
    UnknownFulfillmentOption(String),

    #[error("Fulfillment option unavailable: {0}")]
    FulfillmentOptionUnavailable(String),

    #[error("Checkout session already completed")]
    AlreadyCompleted,

    #[error("Session not ready for payment: {0}")]
    NotReadyForPayment(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    // Payment orchestration failures.
    #[error("Payment approval failed: {0}")]
    PaymentApprovalFailed(String),

    #[error("No PREPARE payment record found for order: {0}")]
    PrepareNotFound(String),

    #[error("No approved payment found for order: {0}")]
    ApprovedPaymentNotFound(String),

    // PSP/network failures. Timeout and Connection are the net-cancel triggers.
    #[error("PSP request timed out: {0}")]
    PspTimeout(String),

    #[error("PSP connection failed: {0}")]
    PspConnection(String),

    #[error("PSP error: {0}")]
    PspError(String),

    // Infrastructure.
    #[error("Database error: {0}")]
    DatabaseError(#[from] sea_orm::error::DbErr),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Encryption error: {0}")]
    EncryptionError(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

impl ServiceError {
    /// True for failures where the approve call may have succeeded on the PSP
    /// side despite the client-visible error. These trigger net-cancel recovery.
    pub fn is_network_error(&self) -> bool {
        matches!(self, Self::PspTimeout(_) | Self::PspConnection(_))
    }

    /// Single source of truth for the error-to-status mapping.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::ProductNotFound(_) | Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::InvalidAddress(_)
            | Self::UnknownFulfillmentOption(_)
            | Self::ValidationError(_) => StatusCode::BAD_REQUEST,
            Self::InvalidState(_)
            | Self::AlreadyCompleted
            | Self::NotReadyForPayment(_)
            | Self::PrepareNotFound(_)
            | Self::ApprovedPaymentNotFound(_) => StatusCode::CONFLICT,
            Self::FulfillmentOptionUnavailable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::PaymentApprovalFailed(_) => StatusCode::PAYMENT_REQUIRED,
            Self::PspTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            Self::PspConnection(_) | Self::PspError(_) => StatusCode::BAD_GATEWAY,
            Self::DatabaseError(_)
            | Self::SerializationError(_)
            | Self::EncryptionError(_)
            | Self::InternalError(_)
            | Self::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine-readable code used by API clients to branch on failures.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::ProductNotFound(_) => "product_not_found",
            Self::InvalidAddress(_) => "invalid_address",
            Self::InvalidState(_) => "invalid_state",
            Self::UnknownFulfillmentOption(_) => "unknown_fulfillment_option",
            Self::FulfillmentOptionUnavailable(_) => "fulfillment_option_unavailable",
            Self::AlreadyCompleted => "already_completed",
            Self::NotReadyForPayment(_) => "not_ready_for_payment",
            Self::ValidationError(_) => "validation_error",
            Self::NotFound(_) => "not_found",
            Self::PaymentApprovalFailed(_) => "payment_approval_failed",
            Self::PrepareNotFound(_) => "prepare_not_found",
            Self::ApprovedPaymentNotFound(_) => "approved_payment_not_found",
            Self::PspTimeout(_) => "psp_timeout",
            Self::PspConnection(_) => "psp_connection_error",
            Self::PspError(_) => "psp_error",
            Self::DatabaseError(_) => "database_error",
            Self::SerializationError(_) => "serialization_error",
            Self::EncryptionError(_) => "encryption_error",
            Self::InternalError(_) | Self::Other(_) => "internal_error",
        }
    }

    /// Message suitable for HTTP responses. Internal errors return generic
    /// messages to avoid leaking implementation details.
    pub fn response_message(&self) -> String {
        match self {
            Self::DatabaseError(_)
            | Self::SerializationError(_)
            | Self::EncryptionError(_)
            | Self::InternalError(_)
            | Self::Other(_) => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let err = ErrorResponse {
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            message: self.response_message(),
            code: self.error_code().to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        (status, Json(err)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::to_bytes, http::StatusCode};

    #[test]
    fn status_code_mapping() {
        assert_eq!(
            ServiceError::ProductNotFound("P-1".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ServiceError::InvalidAddress("bad postal".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServiceError::InvalidState("completed".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ServiceError::AlreadyCompleted.status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ServiceError::FulfillmentOptionUnavailable("same_day".into()).status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            ServiceError::PaymentApprovalFailed("declined".into()).status_code(),
            StatusCode::PAYMENT_REQUIRED
        );
        assert_eq!(
            ServiceError::PspTimeout("approve".into()).status_code(),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            ServiceError::PspError("upstream 500".into()).status_code(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn network_error_classification() {
        assert!(ServiceError::PspTimeout("t".into()).is_network_error());
        assert!(ServiceError::PspConnection("c".into()).is_network_error());
        assert!(!ServiceError::PspError("declined".into()).is_network_error());
        assert!(!ServiceError::PaymentApprovalFailed("x".into()).is_network_error());
    }

    #[test]
    fn response_message_hides_internal_details() {
        assert_eq!(
            ServiceError::EncryptionError("key material".into()).response_message(),
            "Internal server error"
        );
        assert_eq!(
            ServiceError::ProductNotFound("P-9".into()).response_message(),
            "Product not found: P-9"
        );
    }

    #[tokio::test]
    async fn error_response_carries_code() {
        let response =
            ServiceError::FulfillmentOptionUnavailable("same_day".into()).into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let payload: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(payload.code, "fulfillment_option_unavailable");
    }
}
