use crate::config::PspConfig;
use crate::errors::ServiceError;
use crate::models::PaymentPrepareRequest;
use crate::services::payments::provider::{
    PspApproval, PspCancelResult, PspPaymentStatus, PspPrepareResult, PspProvider, PspStatusInfo,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

const READY_PATH: &str = "/online/v1/payment/ready";
const APPROVE_PATH: &str = "/online/v1/payment/approve";
const CANCEL_PATH: &str = "/online/v1/payment/cancel";
const ORDER_PATH: &str = "/online/v1/payment/order";

// Buyer identity mapping is out of scope; KakaoPay requires a stable value.
const PARTNER_USER_ID: &str = "CHECKOUT_USER";

/// KakaoPay adapter for the `PspProvider` capability interface.
///
/// Talks to the KakaoPay online-payment API (ready/approve/cancel/order)
/// with an explicit request timeout; timeouts and connection failures are
/// surfaced as the network-error variants that drive net-cancel recovery.
#[derive(Clone)]
pub struct KakaoPayProvider {
    client: reqwest::Client,
    base_url: String,
    cid: String,
    approval_base_url: String,
}

impl KakaoPayProvider {
    pub fn new(config: &PspConfig, approval_base_url: String) -> Result<Self, ServiceError> {
        let mut headers = reqwest::header::HeaderMap::new();
        let auth = format!("SECRET_KEY {}", config.secret_key);
        headers.insert(
            reqwest::header::AUTHORIZATION,
            auth.parse()
                .map_err(|_| ServiceError::InternalError("invalid PSP secret key".to_string()))?,
        );

        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .default_headers(headers)
            .build()
            .map_err(|e| ServiceError::InternalError(format!("http client build failed: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            cid: config.cid.clone(),
            approval_base_url,
        })
    }

    async fn post<B: Serialize, R: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R, ServiceError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(ServiceError::PspError(format!(
                "KakaoPay {} returned {}: {}",
                path, status, detail
            )));
        }

        response
            .json::<R>()
            .await
            .map_err(|e| ServiceError::PspError(format!("invalid KakaoPay response: {}", e)))
    }

    fn amount_in_won(amount: Decimal) -> Result<i64, ServiceError> {
        amount
            .round_dp(0)
            .to_i64()
            .ok_or_else(|| ServiceError::PspError(format!("amount out of range: {}", amount)))
    }
}

fn map_reqwest_error(e: reqwest::Error) -> ServiceError {
    if e.is_timeout() {
        ServiceError::PspTimeout(e.to_string())
    } else if e.is_connect() {
        ServiceError::PspConnection(e.to_string())
    } else {
        ServiceError::PspError(e.to_string())
    }
}

/// Maps KakaoPay payment states onto the provider-agnostic status set.
fn map_kakao_status(status: &str) -> PspPaymentStatus {
    match status {
        "READY" | "SEND_TMS" => PspPaymentStatus::Ready,
        "OPEN_PAYMENT" | "SELECT_METHOD" | "ARS_WAITING" | "AUTH_PASSWORD" | "ISSUED_SID" => {
            PspPaymentStatus::InProgress
        }
        // Partial cancellation still leaves a paid remainder.
        "SUCCESS_PAYMENT" | "PART_CANCEL_PAYMENT" => PspPaymentStatus::Paid,
        "CANCEL_PAYMENT" | "QUIT_PAYMENT" => PspPaymentStatus::Canceled,
        "FAIL_PAYMENT" => PspPaymentStatus::Failed,
        _ => PspPaymentStatus::Unknown,
    }
}

/// Collapses a multi-line order into KakaoPay's single item_name field.
fn summarize_item_name(request: &PaymentPrepareRequest) -> String {
    match request.items.as_slice() {
        [] => "Order".to_string(),
        [only] => only.name.clone(),
        [first, rest @ ..] => format!("{} and {} more", first.name, rest.len()),
    }
}

#[async_trait]
impl PspProvider for KakaoPayProvider {
    fn provider_name(&self) -> &'static str {
        "KAKAOPAY"
    }

    #[instrument(skip(self, request), fields(merchant_order_id = %request.merchant_order_id))]
    async fn prepare(
        &self,
        request: &PaymentPrepareRequest,
    ) -> Result<PspPrepareResult, ServiceError> {
        let body = KakaoPayReadyRequest {
            cid: self.cid.clone(),
            partner_order_id: request.merchant_order_id.clone(),
            partner_user_id: PARTNER_USER_ID.to_string(),
            item_name: summarize_item_name(request),
            quantity: request.items.iter().map(|i| i.quantity).sum(),
            total_amount: Self::amount_in_won(request.amount)?,
            tax_free_amount: 0,
            approval_url: format!("{}/payments/success", self.approval_base_url),
            cancel_url: format!("{}/payments/cancel", self.approval_base_url),
            fail_url: format!("{}/payments/fail", self.approval_base_url),
        };

        let response: KakaoPayReadyResponse = self.post(READY_PATH, &body).await?;
        info!(tid = %response.tid, "KakaoPay payment ready");

        Ok(PspPrepareResult {
            pg_tid: response.tid,
            redirect_url: response.next_redirect_pc_url,
        })
    }

    #[instrument(skip(self, pg_tid, pg_token))]
    async fn approve(
        &self,
        pg_tid: &str,
        merchant_order_id: &str,
        pg_token: &str,
    ) -> Result<PspApproval, ServiceError> {
        let body = KakaoPayApproveRequest {
            cid: self.cid.clone(),
            tid: pg_tid.to_string(),
            partner_order_id: merchant_order_id.to_string(),
            partner_user_id: PARTNER_USER_ID.to_string(),
            pg_token: pg_token.to_string(),
        };

        let response: KakaoPayApproveResponse = self.post(APPROVE_PATH, &body).await?;
        info!(tid = %response.tid, "KakaoPay payment approved");

        Ok(PspApproval {
            pg_tid: response.tid,
            approved_at: response.approved_at,
            amount: Decimal::from(response.amount.total),
            payment_method: response.payment_method_type,
            card_issuer: response.card_info.and_then(|c| c.issuer_corp),
        })
    }

    #[instrument(skip(self, pg_tid))]
    async fn cancel(
        &self,
        pg_tid: &str,
        amount: Decimal,
        reason: &str,
    ) -> Result<PspCancelResult, ServiceError> {
        info!(%reason, "canceling KakaoPay payment");

        let body = KakaoPayCancelRequest {
            cid: self.cid.clone(),
            tid: pg_tid.to_string(),
            cancel_amount: Self::amount_in_won(amount)?,
            cancel_tax_free_amount: 0,
        };

        let response: KakaoPayCancelResponse = self.post(CANCEL_PATH, &body).await?;

        Ok(PspCancelResult {
            canceled_at: response.canceled_at.or(response.created_at),
            amount: response
                .approved_cancel_amount
                .map(|a| Decimal::from(a.total))
                .unwrap_or(Decimal::ZERO),
            status: map_kakao_status(&response.status),
        })
    }

    #[instrument(skip(self, pg_tid))]
    async fn check_status(&self, pg_tid: &str) -> Result<PspStatusInfo, ServiceError> {
        let body = KakaoPayOrderRequest {
            cid: self.cid.clone(),
            tid: pg_tid.to_string(),
        };

        let response: KakaoPayOrderResponse = self.post(ORDER_PATH, &body).await?;

        Ok(PspStatusInfo {
            status: map_kakao_status(&response.status),
            amount: response.amount.map(|a| Decimal::from(a.total)),
        })
    }
}

// Wire DTOs for the KakaoPay online-payment API.

#[derive(Debug, Serialize)]
struct KakaoPayReadyRequest {
    cid: String,
    partner_order_id: String,
    partner_user_id: String,
    item_name: String,
    quantity: i32,
    total_amount: i64,
    tax_free_amount: i64,
    approval_url: String,
    cancel_url: String,
    fail_url: String,
}

#[derive(Debug, Deserialize)]
struct KakaoPayReadyResponse {
    tid: String,
    next_redirect_pc_url: String,
}

#[derive(Debug, Serialize)]
struct KakaoPayApproveRequest {
    cid: String,
    tid: String,
    partner_order_id: String,
    partner_user_id: String,
    pg_token: String,
}

#[derive(Debug, Deserialize)]
struct KakaoPayAmount {
    total: i64,
}

#[derive(Debug, Deserialize)]
struct KakaoPayCardInfo {
    issuer_corp: Option<String>,
}

#[derive(Debug, Deserialize)]
struct KakaoPayApproveResponse {
    tid: String,
    approved_at: String,
    amount: KakaoPayAmount,
    payment_method_type: Option<String>,
    card_info: Option<KakaoPayCardInfo>,
}

#[derive(Debug, Serialize)]
struct KakaoPayCancelRequest {
    cid: String,
    tid: String,
    cancel_amount: i64,
    cancel_tax_free_amount: i64,
}

#[derive(Debug, Deserialize)]
struct KakaoPayCancelResponse {
    status: String,
    approved_cancel_amount: Option<KakaoPayAmount>,
    canceled_at: Option<DateTime<Utc>>,
    created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
struct KakaoPayOrderRequest {
    cid: String,
    tid: String,
}

#[derive(Debug, Deserialize)]
struct KakaoPayOrderResponse {
    status: String,
    amount: Option<KakaoPayAmount>,
}
