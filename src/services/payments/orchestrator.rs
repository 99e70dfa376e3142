use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::models::{
    PaymentApproveRequest, PaymentApproveResponse, PaymentCancelRequest, PaymentCancelResponse,
    PaymentPrepareRequest, PaymentPrepareResponse, PaymentRecord, PaymentStatus, PaymentType,
};
use crate::services::payments::encryption::EncryptionService;
use crate::services::payments::provider::{PspPaymentStatus, PspProvider};
use crate::services::payments::store::PaymentStore;
use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

const NET_CANCEL_REASON: &str = "net cancel after ambiguous approval failure";

/// Orchestrates the prepare/approve/cancel flow against the PSP and the
/// append-only ledger.
///
/// Every operation is idempotent on `merchant_order_id`: replays return the
/// persisted outcome without a second PSP call. Approval failures that are
/// network-level (timeout, connection reset) are ambiguous, so recovery
/// queries the PSP and issues a compensating cancel if the charge landed.
pub struct PaymentService {
    store: Arc<dyn PaymentStore>,
    psp: Arc<dyn PspProvider>,
    cipher: Arc<dyn EncryptionService>,
    event_sender: EventSender,
}

impl PaymentService {
    pub fn new(
        store: Arc<dyn PaymentStore>,
        psp: Arc<dyn PspProvider>,
        cipher: Arc<dyn EncryptionService>,
        event_sender: EventSender,
    ) -> Self {
        Self {
            store,
            psp,
            cipher,
            event_sender,
        }
    }

    #[instrument(skip(self, request), fields(merchant_order_id = %request.merchant_order_id))]
    pub async fn prepare(
        &self,
        request: PaymentPrepareRequest,
    ) -> Result<PaymentPrepareResponse, ServiceError> {
        let order_id = &request.merchant_order_id;

        if let Some(approve) = self.latest(order_id, PaymentType::Approve).await? {
            if approve.status == PaymentStatus::Success {
                return Err(ServiceError::AlreadyCompleted);
            }
        }

        if let Some(prepare) = self.latest(order_id, PaymentType::Prepare).await? {
            if prepare.status == PaymentStatus::Ready {
                info!(payment_id = %prepare.id, "replaying open prepare");
                let redirect_url = prepare.redirect_url.clone().ok_or_else(|| {
                    ServiceError::InternalError(format!(
                        "prepare row {} has no redirect url",
                        prepare.id
                    ))
                })?;
                return Ok(PaymentPrepareResponse {
                    payment_id: prepare.id,
                    merchant_order_id: prepare.merchant_order_id,
                    redirect_url,
                    status: PaymentStatus::Ready,
                });
            }
        }

        let prepared = self.psp.prepare(&request).await?;
        let encrypted_tid = self.cipher.encrypt(&prepared.pg_tid)?;

        let record = self
            .store
            .insert(PaymentRecord {
                id: Uuid::new_v4().to_string(),
                merchant_order_id: order_id.clone(),
                org_payment_id: None,
                payment_type: PaymentType::Prepare,
                status: PaymentStatus::Ready,
                amount: request.amount,
                currency: request.currency.clone(),
                pg_provider: self.psp.provider_name().to_string(),
                pg_tid: Some(encrypted_tid),
                redirect_url: Some(prepared.redirect_url.clone()),
                payment_method_type: None,
                card_issuer: None,
                created_at: Utc::now(),
            })
            .await?;

        self.event_sender
            .send_or_log(Event::PaymentPrepared {
                payment_id: record.id.clone(),
                merchant_order_id: order_id.clone(),
            })
            .await;

        Ok(PaymentPrepareResponse {
            payment_id: record.id,
            merchant_order_id: order_id.clone(),
            redirect_url: prepared.redirect_url,
            status: PaymentStatus::Ready,
        })
    }

    #[instrument(skip(self, request), fields(merchant_order_id = %request.merchant_order_id))]
    pub async fn approve(
        &self,
        request: PaymentApproveRequest,
    ) -> Result<PaymentApproveResponse, ServiceError> {
        let order_id = &request.merchant_order_id;

        if let Some(approve) = self.latest(order_id, PaymentType::Approve).await? {
            if approve.status == PaymentStatus::Success {
                info!(payment_id = %approve.id, "replaying completed approval");
                return Ok(approved_response(&approve));
            }
        }

        let prepare = self
            .latest(order_id, PaymentType::Prepare)
            .await?
            .filter(|p| p.status == PaymentStatus::Ready)
            .ok_or_else(|| ServiceError::PrepareNotFound(order_id.clone()))?;

        let encrypted_tid = prepare.pg_tid.clone().ok_or_else(|| {
            ServiceError::InternalError(format!("prepare row {} has no pg_tid", prepare.id))
        })?;
        let pg_tid = self.cipher.decrypt(&encrypted_tid)?;

        match self.psp.approve(&pg_tid, order_id, &request.pg_token).await {
            Ok(approval) => {
                let record = self
                    .store
                    .insert(PaymentRecord {
                        id: Uuid::new_v4().to_string(),
                        merchant_order_id: order_id.clone(),
                        org_payment_id: Some(prepare.id.clone()),
                        payment_type: PaymentType::Approve,
                        status: PaymentStatus::Success,
                        amount: approval.amount,
                        currency: prepare.currency.clone(),
                        pg_provider: self.psp.provider_name().to_string(),
                        pg_tid: Some(self.cipher.encrypt(&approval.pg_tid)?),
                        redirect_url: None,
                        payment_method_type: approval.payment_method.clone(),
                        card_issuer: approval.card_issuer.clone(),
                        created_at: Utc::now(),
                    })
                    .await?;

                self.event_sender
                    .send_or_log(Event::PaymentApproved {
                        payment_id: record.id.clone(),
                        merchant_order_id: order_id.clone(),
                    })
                    .await;

                Ok(PaymentApproveResponse {
                    payment_id: record.id,
                    status: "COMPLETED".to_string(),
                    approved_at: Some(approval.approved_at),
                    total_amount: approval.amount,
                    method: approval.payment_method,
                    card_issuer: approval.card_issuer,
                })
            }
            Err(e) => {
                warn!(error = %e, "payment approval failed");

                if e.is_network_error() {
                    self.net_cancel(&prepare, &pg_tid).await;
                }

                let fail_row = PaymentRecord {
                    id: Uuid::new_v4().to_string(),
                    merchant_order_id: order_id.clone(),
                    org_payment_id: Some(prepare.id.clone()),
                    payment_type: PaymentType::Approve,
                    status: PaymentStatus::Fail,
                    amount: prepare.amount,
                    currency: prepare.currency.clone(),
                    pg_provider: self.psp.provider_name().to_string(),
                    pg_tid: Some(encrypted_tid),
                    redirect_url: None,
                    payment_method_type: None,
                    card_issuer: None,
                    created_at: Utc::now(),
                };
                if let Err(insert_err) = self.store.insert(fail_row).await {
                    error!(error = %insert_err, "failed to record approval failure");
                }

                self.event_sender
                    .send_or_log(Event::PaymentApprovalFailed {
                        merchant_order_id: order_id.clone(),
                        reason: e.to_string(),
                    })
                    .await;

                Err(e)
            }
        }
    }

    /// Best-effort compensation after an ambiguous approval failure. Queries
    /// the PSP for the charge state and reverses it if it landed. Failures
    /// here never mask the original approval error; they are logged and
    /// emitted for alerting instead.
    async fn net_cancel(&self, prepare: &PaymentRecord, pg_tid: &str) {
        let order_id = &prepare.merchant_order_id;

        let status = match self.psp.check_status(pg_tid).await {
            Ok(info) => info,
            Err(e) => {
                self.report_net_cancel_failure(prepare, format!("status check failed: {}", e))
                    .await;
                return;
            }
        };

        if status.status != PspPaymentStatus::Paid {
            info!(status = ?status.status, "charge did not land; no reversal needed");
            return;
        }

        let amount = status.amount.unwrap_or(prepare.amount);
        match self.psp.cancel(pg_tid, amount, NET_CANCEL_REASON).await {
            Ok(_) => {
                let cancel_row = PaymentRecord {
                    id: Uuid::new_v4().to_string(),
                    merchant_order_id: order_id.clone(),
                    org_payment_id: Some(prepare.id.clone()),
                    payment_type: PaymentType::Cancel,
                    status: PaymentStatus::Success,
                    amount,
                    currency: prepare.currency.clone(),
                    pg_provider: self.psp.provider_name().to_string(),
                    pg_tid: prepare.pg_tid.clone(),
                    redirect_url: None,
                    payment_method_type: None,
                    card_issuer: None,
                    created_at: Utc::now(),
                };
                if let Err(e) = self.store.insert(cancel_row).await {
                    self.report_net_cancel_failure(
                        prepare,
                        format!("reversal succeeded but ledger insert failed: {}", e),
                    )
                    .await;
                    return;
                }

                self.event_sender
                    .send_or_log(Event::NetCancelExecuted {
                        merchant_order_id: order_id.clone(),
                        prepare_payment_id: prepare.id.clone(),
                        amount,
                    })
                    .await;
            }
            Err(e) => {
                self.report_net_cancel_failure(prepare, format!("psp cancel failed: {}", e))
                    .await;
            }
        }
    }

    async fn report_net_cancel_failure(&self, prepare: &PaymentRecord, reason: String) {
        error!(
            merchant_order_id = %prepare.merchant_order_id,
            prepare_payment_id = %prepare.id,
            %reason,
            "net-cancel could not confirm reversal"
        );
        self.event_sender
            .send_or_log(Event::NetCancelFailed {
                merchant_order_id: prepare.merchant_order_id.clone(),
                prepare_payment_id: prepare.id.clone(),
                reason,
                timestamp: Utc::now(),
            })
            .await;
    }

    #[instrument(skip(self, request), fields(merchant_order_id = %request.merchant_order_id))]
    pub async fn cancel(
        &self,
        request: PaymentCancelRequest,
    ) -> Result<PaymentCancelResponse, ServiceError> {
        let order_id = &request.merchant_order_id;

        if let Some(cancel) = self.latest(order_id, PaymentType::Cancel).await? {
            if cancel.status == PaymentStatus::Success {
                info!(payment_id = %cancel.id, "replaying completed cancellation");
                return Ok(PaymentCancelResponse {
                    payment_id: cancel.id,
                    status: PaymentStatus::Success,
                    canceled_at: Some(cancel.created_at),
                    canceled_amount: cancel.amount,
                });
            }
        }

        let approve = self
            .latest(order_id, PaymentType::Approve)
            .await?
            .filter(|a| a.status == PaymentStatus::Success)
            .ok_or_else(|| ServiceError::ApprovedPaymentNotFound(order_id.clone()))?;

        let encrypted_tid = approve.pg_tid.clone().ok_or_else(|| {
            ServiceError::InternalError(format!("approve row {} has no pg_tid", approve.id))
        })?;
        let pg_tid = self.cipher.decrypt(&encrypted_tid)?;

        match self.psp.cancel(&pg_tid, request.amount, &request.reason).await {
            Ok(result) => {
                let record = self
                    .store
                    .insert(PaymentRecord {
                        id: Uuid::new_v4().to_string(),
                        merchant_order_id: order_id.clone(),
                        org_payment_id: Some(approve.id.clone()),
                        payment_type: PaymentType::Cancel,
                        status: PaymentStatus::Success,
                        amount: result.amount,
                        currency: approve.currency.clone(),
                        pg_provider: self.psp.provider_name().to_string(),
                        pg_tid: Some(encrypted_tid),
                        redirect_url: None,
                        payment_method_type: None,
                        card_issuer: None,
                        created_at: Utc::now(),
                    })
                    .await?;

                self.event_sender
                    .send_or_log(Event::PaymentCanceled {
                        payment_id: record.id.clone(),
                        merchant_order_id: order_id.clone(),
                    })
                    .await;

                Ok(PaymentCancelResponse {
                    payment_id: record.id,
                    status: PaymentStatus::Success,
                    canceled_at: result.canceled_at.or(Some(record.created_at)),
                    canceled_amount: result.amount,
                })
            }
            Err(e) => {
                let fail_row = PaymentRecord {
                    id: Uuid::new_v4().to_string(),
                    merchant_order_id: order_id.clone(),
                    org_payment_id: Some(approve.id.clone()),
                    payment_type: PaymentType::Cancel,
                    status: PaymentStatus::Fail,
                    amount: request.amount,
                    currency: approve.currency.clone(),
                    pg_provider: self.psp.provider_name().to_string(),
                    pg_tid: Some(encrypted_tid),
                    redirect_url: None,
                    payment_method_type: None,
                    card_issuer: None,
                    created_at: Utc::now(),
                };
                if let Err(insert_err) = self.store.insert(fail_row).await {
                    error!(error = %insert_err, "failed to record cancellation failure");
                }
                Err(e)
            }
        }
    }

    async fn latest(
        &self,
        merchant_order_id: &str,
        payment_type: PaymentType,
    ) -> Result<Option<PaymentRecord>, ServiceError> {
        self.store
            .find_latest_by_order_and_type(merchant_order_id, payment_type)
            .await
    }
}

fn approved_response(record: &PaymentRecord) -> PaymentApproveResponse {
    PaymentApproveResponse {
        payment_id: record.id.clone(),
        status: "COMPLETED".to_string(),
        approved_at: Some(record.created_at.to_rfc3339()),
        total_amount: record.amount,
        method: record.payment_method_type.clone(),
        card_issuer: record.card_issuer.clone(),
    }
}
