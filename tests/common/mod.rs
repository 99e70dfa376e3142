#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::{self, Body};
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use checkout_api::errors::ServiceError;
use checkout_api::events::EventSender;
use checkout_api::models::PaymentPrepareRequest;
use checkout_api::services::catalog::{InMemoryProductCatalog, Product};
use checkout_api::services::checkout::{CheckoutSessionService, InMemorySessionStore};
use checkout_api::services::orders::{InMemoryOrderStore, OrderService};
use checkout_api::services::payments::{
    AesGcmFieldCipher, InMemoryPaymentStore, PaymentService, PspPaymentStatus, PspProvider,
};
use checkout_api::services::payments::provider::{
    PspApproval, PspCancelResult, PspPrepareResult, PspStatusInfo,
};
use checkout_api::{app, AppState};
use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

/// How the scripted PSP responds to an approve call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApproveBehavior {
    Succeed,
    /// Business-level decline, e.g. insufficient funds.
    Decline,
    /// Network-level timeout; the scripted order status decides whether the
    /// charge actually landed.
    Timeout,
}

/// Hand-scripted PSP double. Counts calls so tests can assert idempotency
/// (the real adapter is covered separately with wiremock).
pub struct ScriptedPsp {
    pub approve_behavior: Mutex<ApproveBehavior>,
    /// Status reported by check_status after a timeout.
    pub landed_status: Mutex<PspPaymentStatus>,
    pub cancel_fails: Mutex<bool>,
    pub last_prepared_amount: Mutex<Decimal>,
    pub prepare_calls: AtomicUsize,
    pub approve_calls: AtomicUsize,
    pub cancel_calls: AtomicUsize,
    pub status_calls: AtomicUsize,
}

impl Default for ScriptedPsp {
    fn default() -> Self {
        Self {
            approve_behavior: Mutex::new(ApproveBehavior::Succeed),
            landed_status: Mutex::new(PspPaymentStatus::Ready),
            cancel_fails: Mutex::new(false),
            last_prepared_amount: Mutex::new(Decimal::ZERO),
            prepare_calls: AtomicUsize::new(0),
            approve_calls: AtomicUsize::new(0),
            cancel_calls: AtomicUsize::new(0),
            status_calls: AtomicUsize::new(0),
        }
    }
}

impl ScriptedPsp {
    pub fn set_approve(&self, behavior: ApproveBehavior) {
        *self.approve_behavior.lock().unwrap() = behavior;
    }

    pub fn set_landed_status(&self, status: PspPaymentStatus) {
        *self.landed_status.lock().unwrap() = status;
    }

    pub fn set_cancel_fails(&self, fails: bool) {
        *self.cancel_fails.lock().unwrap() = fails;
    }
}

#[async_trait]
impl PspProvider for ScriptedPsp {
    fn provider_name(&self) -> &'static str {
        "SCRIPTED"
    }

    async fn prepare(
        &self,
        request: &PaymentPrepareRequest,
    ) -> Result<PspPrepareResult, ServiceError> {
        let n = self.prepare_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_prepared_amount.lock().unwrap() = request.amount;
        Ok(PspPrepareResult {
            pg_tid: format!("TID-{}-{}", request.merchant_order_id, n),
            redirect_url: format!("https://psp.test/redirect/{}", request.merchant_order_id),
        })
    }

    async fn approve(
        &self,
        pg_tid: &str,
        _merchant_order_id: &str,
        _pg_token: &str,
    ) -> Result<PspApproval, ServiceError> {
        self.approve_calls.fetch_add(1, Ordering::SeqCst);
        match *self.approve_behavior.lock().unwrap() {
            ApproveBehavior::Succeed => Ok(PspApproval {
                pg_tid: pg_tid.to_string(),
                approved_at: Utc::now().to_rfc3339(),
                amount: *self.last_prepared_amount.lock().unwrap(),
                payment_method: Some("CARD".to_string()),
                card_issuer: None,
            }),
            ApproveBehavior::Decline => {
                Err(ServiceError::PspError("insufficient funds".to_string()))
            }
            ApproveBehavior::Timeout => {
                Err(ServiceError::PspTimeout("read timed out".to_string()))
            }
        }
    }

    async fn cancel(
        &self,
        _pg_tid: &str,
        amount: Decimal,
        _reason: &str,
    ) -> Result<PspCancelResult, ServiceError> {
        self.cancel_calls.fetch_add(1, Ordering::SeqCst);
        if *self.cancel_fails.lock().unwrap() {
            return Err(ServiceError::PspError("cancel rejected".to_string()));
        }
        Ok(PspCancelResult {
            canceled_at: Some(Utc::now()),
            amount,
            status: PspPaymentStatus::Canceled,
        })
    }

    async fn check_status(&self, _pg_tid: &str) -> Result<PspStatusInfo, ServiceError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        Ok(PspStatusInfo {
            status: *self.landed_status.lock().unwrap(),
            amount: None,
        })
    }
}

/// Full service graph over in-memory stores and the scripted PSP, exposed
/// both as handles for direct service calls and as a router for HTTP-level
/// assertions.
pub struct TestApp {
    router: Router,
    pub checkout: Arc<CheckoutSessionService>,
    pub payments: Arc<PaymentService>,
    pub psp: Arc<ScriptedPsp>,
    pub payment_store: Arc<InMemoryPaymentStore>,
    pub order_store: Arc<InMemoryOrderStore>,
    pub catalog: Arc<InMemoryProductCatalog>,
}

impl TestApp {
    pub async fn new() -> Self {
        let catalog = Arc::new(InMemoryProductCatalog::new());
        let psp = Arc::new(ScriptedPsp::default());
        let payment_store = Arc::new(InMemoryPaymentStore::new());
        let order_store = Arc::new(InMemoryOrderStore::new());

        let (tx, mut rx) = tokio::sync::mpsc::channel(256);
        // Drain events so send() never backs up during a test.
        tokio::spawn(async move { while rx.recv().await.is_some() {} });
        let event_sender = EventSender::new(tx);

        let payments = Arc::new(PaymentService::new(
            payment_store.clone(),
            psp.clone(),
            Arc::new(AesGcmFieldCipher::new(&[9u8; 32]).unwrap()),
            event_sender.clone(),
        ));
        let orders = Arc::new(OrderService::new(
            order_store.clone(),
            catalog.clone(),
            event_sender.clone(),
        ));
        let checkout = Arc::new(CheckoutSessionService::new(
            Arc::new(InMemorySessionStore::new()),
            catalog.clone(),
            payments.clone(),
            orders.clone(),
            event_sender,
            Duration::hours(1),
        ));

        let router = app(AppState {
            checkout: checkout.clone(),
            payments: payments.clone(),
            orders,
        });

        Self {
            router,
            checkout,
            payments,
            psp,
            payment_store,
            order_store,
            catalog,
        }
    }

    pub async fn seed_product(&self, id: &str, name: &str, price: Decimal) {
        self.catalog
            .insert(Product {
                id: id.to_string(),
                display_name: name.to_string(),
                unit_price: Some(price),
            })
            .await;
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("serialize request body"))
        } else {
            Body::empty()
        };

        let response = self
            .router
            .clone()
            .oneshot(builder.body(body).expect("build request"))
            .await
            .expect("router error");

        let status = response.status();
        let bytes = body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read response body");
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("parse response body")
        };
        (status, value)
    }
}
