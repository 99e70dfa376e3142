use crate::errors::ServiceError;
use crate::models::PaymentPrepareRequest;
use async_trait::async_trait;
use rust_decimal::Decimal;

/// PSP-side view of a payment's state, normalized across providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PspPaymentStatus {
    Ready,
    InProgress,
    Paid,
    Canceled,
    Failed,
    Unknown,
}

#[derive(Debug, Clone)]
pub struct PspPrepareResult {
    /// Provider transaction id; encrypted before it ever touches storage.
    pub pg_tid: String,
    pub redirect_url: String,
}

#[derive(Debug, Clone)]
pub struct PspApproval {
    pub pg_tid: String,
    pub approved_at: String,
    pub amount: Decimal,
    pub payment_method: Option<String>,
    pub card_issuer: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PspCancelResult {
    pub canceled_at: Option<chrono::DateTime<chrono::Utc>>,
    pub amount: Decimal,
    pub status: PspPaymentStatus,
}

#[derive(Debug, Clone)]
pub struct PspStatusInfo {
    pub status: PspPaymentStatus,
    pub amount: Option<Decimal>,
}

/// Capability interface every payment provider must implement. The
/// orchestrator is provider-agnostic; alternates plug in here without
/// touching the prepare/approve/cancel logic.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PspProvider: Send + Sync {
    fn provider_name(&self) -> &'static str;

    async fn prepare(
        &self,
        request: &PaymentPrepareRequest,
    ) -> Result<PspPrepareResult, ServiceError>;

    async fn approve(
        &self,
        pg_tid: &str,
        merchant_order_id: &str,
        pg_token: &str,
    ) -> Result<PspApproval, ServiceError>;

    async fn cancel(
        &self,
        pg_tid: &str,
        amount: Decimal,
        reason: &str,
    ) -> Result<PspCancelResult, ServiceError>;

    async fn check_status(&self, pg_tid: &str) -> Result<PspStatusInfo, ServiceError>;
}
