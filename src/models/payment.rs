use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Attempt type recorded in the payment ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentType {
    Prepare,
    Approve,
    Cancel,
}

impl PaymentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Prepare => "PREPARE",
            Self::Approve => "APPROVE",
            Self::Cancel => "CANCEL",
        }
    }
}

impl std::fmt::Display for PaymentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome recorded on a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Ready,
    Success,
    Fail,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ready => "READY",
            Self::Success => "SUCCESS",
            Self::Fail => "FAIL",
        }
    }
}

/// One immutable row of the append-only payment ledger. Every
/// prepare/approve/cancel attempt inserts a new record; rows are never
/// updated in place. Current state for an order is derived by querying the
/// latest row of a given type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub id: String,
    /// Checkout session id on the merchant side.
    pub merchant_order_id: String,
    /// For APPROVE/CANCEL rows, the originating PREPARE entry.
    pub org_payment_id: Option<String>,
    pub payment_type: PaymentType,
    pub status: PaymentStatus,
    pub amount: Decimal,
    pub currency: String,
    pub pg_provider: String,
    /// PSP transaction id, encrypted at rest. Decrypted only transiently for
    /// outbound PSP calls.
    pub pg_tid: Option<String>,
    /// Redirect URL returned by the PSP at prepare time, replayed on
    /// idempotent prepare calls.
    pub redirect_url: Option<String>,
    pub payment_method_type: Option<String>,
    pub card_issuer: Option<String>,
    pub created_at: DateTime<Utc>,
}

// Wire DTOs shared by the payment endpoints and the in-process orchestrator.

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PaymentItem {
    pub name: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    #[serde(default = "default_currency")]
    pub currency: String,
}

fn default_currency() -> String {
    "KRW".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PaymentPrepareRequest {
    pub merchant_order_id: String,
    pub amount: Decimal,
    #[serde(default = "default_currency")]
    pub currency: String,
    pub items: Vec<PaymentItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PaymentPrepareResponse {
    pub payment_id: String,
    pub merchant_order_id: String,
    pub redirect_url: String,
    pub status: PaymentStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PaymentApproveRequest {
    pub merchant_order_id: String,
    pub pg_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PaymentApproveResponse {
    pub payment_id: String,
    /// "COMPLETED" on success; anything else is a declined approval.
    pub status: String,
    pub approved_at: Option<String>,
    pub total_amount: Decimal,
    pub method: Option<String>,
    pub card_issuer: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PaymentCancelRequest {
    pub merchant_order_id: String,
    pub amount: Decimal,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PaymentCancelResponse {
    pub payment_id: String,
    pub status: PaymentStatus,
    pub canceled_at: Option<DateTime<Utc>>,
    pub canceled_amount: Decimal,
}
