use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::models::{
    Address, Buyer, CheckoutItem, CheckoutSession, CheckoutStatus, Order, PaymentApproveRequest,
    PaymentItem, PaymentPrepareRequest,
};
use crate::services::checkout::address::AddressValidator;
use crate::services::checkout::pricing::PricingEngine;
use crate::services::checkout::shipping::ShippingCalculator;
use crate::services::checkout::store::SessionStore;
use crate::services::catalog::ProductCatalog;
use crate::services::orders::OrderService;
use crate::services::payments::PaymentService;
use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CheckoutItemRequest {
    pub product_id: String,
    #[validate(range(min = 1))]
    pub quantity: i32,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct BuyerRequest {
    #[validate(email)]
    pub email: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct AddressRequest {
    pub country_code: String,
    pub postal_code: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateCheckoutSessionRequest {
    #[validate(length(min = 1))]
    pub items: Vec<CheckoutItemRequest>,
    #[validate]
    pub buyer: Option<BuyerRequest>,
    pub shipping_address: Option<AddressRequest>,
    #[serde(default = "default_currency")]
    pub currency: String,
}

fn default_currency() -> String {
    "KRW".to_string()
}

/// Partial update; absent fields leave the session untouched.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateCheckoutSessionRequest {
    pub items: Option<Vec<CheckoutItemRequest>>,
    #[validate]
    pub buyer: Option<BuyerRequest>,
    pub shipping_address: Option<AddressRequest>,
    pub selected_fulfillment_option_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ConfirmPaymentResult {
    pub session: CheckoutSession,
    pub order: Option<Order>,
}

/// Drives the checkout session lifecycle:
/// NOT_READY -> READY -> COMPLETED, with CANCELED reachable from either open
/// state. All money fields are derived server-side; the catalog is the only
/// source of prices and the calculator the only source of shipping costs.
pub struct CheckoutSessionService {
    store: Arc<dyn SessionStore>,
    catalog: Arc<dyn ProductCatalog>,
    payments: Arc<PaymentService>,
    orders: Arc<OrderService>,
    pricing: PricingEngine,
    shipping: ShippingCalculator,
    address_validator: AddressValidator,
    event_sender: EventSender,
    session_ttl: Duration,
    // Serializes read-modify-write per session id.
    session_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl CheckoutSessionService {
    pub fn new(
        store: Arc<dyn SessionStore>,
        catalog: Arc<dyn ProductCatalog>,
        payments: Arc<PaymentService>,
        orders: Arc<OrderService>,
        event_sender: EventSender,
        session_ttl: Duration,
    ) -> Self {
        Self {
            store,
            catalog,
            payments,
            orders,
            pricing: PricingEngine,
            shipping: ShippingCalculator,
            address_validator: AddressValidator,
            event_sender,
            session_ttl,
            session_locks: Mutex::new(HashMap::new()),
        }
    }

    async fn lock_for(&self, session_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.session_locks.lock().await;
        locks
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drops the map entry once no other task holds the lock. Two strong
    /// counts means ours plus the map's.
    async fn release_lock(&self, session_id: &str, lock: Arc<Mutex<()>>) {
        if Arc::strong_count(&lock) <= 2 {
            let mut locks = self.session_locks.lock().await;
            if let Some(existing) = locks.get(session_id) {
                if Arc::ptr_eq(existing, &lock) {
                    locks.remove(session_id);
                }
            }
        }
    }

    #[instrument(skip(self, request))]
    pub async fn create_session(
        &self,
        request: CreateCheckoutSessionRequest,
    ) -> Result<CheckoutSession, ServiceError> {
        request.validate()?;

        let items = self.resolve_items(&request.items).await?;

        let shipping_address = request.shipping_address.map(into_address);
        if let Some(address) = &shipping_address {
            self.address_validator.validate(address)?;
        }

        let totals = self
            .pricing
            .calculate_totals(&items, Decimal::ZERO, &request.currency);

        let now = Utc::now();
        let mut session = CheckoutSession {
            id: Uuid::new_v4().to_string(),
            status: CheckoutStatus::NotReady,
            currency: request.currency,
            items,
            buyer: request.buyer.map(into_buyer),
            shipping_address,
            available_fulfillment_options: Vec::new(),
            selected_fulfillment_option_id: None,
            totals,
            next_action_url: None,
            cancel_reason: None,
            version: 0,
            created_at: now,
            updated_at: now,
            expires_at: now + self.session_ttl,
        };
        session.status = session.derive_open_status();

        let mut saved = self.store.save(session).await?;
        self.attach_options(&mut saved);

        info!(session_id = %saved.id, status = %saved.status, "checkout session created");
        self.event_sender
            .send_or_log(Event::CheckoutSessionCreated {
                session_id: saved.id.clone(),
            })
            .await;

        Ok(saved)
    }

    #[instrument(skip(self))]
    pub async fn get_session(&self, id: &str) -> Result<CheckoutSession, ServiceError> {
        let mut session = self.load(id).await?;
        self.attach_options(&mut session);
        Ok(session)
    }

    #[instrument(skip(self, request))]
    pub async fn update_session(
        &self,
        id: &str,
        request: UpdateCheckoutSessionRequest,
    ) -> Result<CheckoutSession, ServiceError> {
        let lock = self.lock_for(id).await;
        let result = {
            let _guard = lock.lock().await;
            self.update_session_locked(id, request).await
        };
        self.release_lock(id, lock).await;
        result
    }

    async fn update_session_locked(
        &self,
        id: &str,
        request: UpdateCheckoutSessionRequest,
    ) -> Result<CheckoutSession, ServiceError> {
        request.validate()?;

        let mut session = self.load(id).await?;
        self.ensure_mutable(&session)?;

        if let Some(items) = &request.items {
            session.items = self.resolve_items(items).await?;
        }

        if let Some(buyer) = request.buyer {
            session.buyer = Some(into_buyer(buyer));
        }

        if let Some(address) = request.shipping_address {
            let address = into_address(address);
            self.address_validator.validate(&address)?;
            if session.shipping_address.as_ref() != Some(&address) {
                // A new destination invalidates any previously chosen option.
                session.selected_fulfillment_option_id = None;
            }
            session.shipping_address = Some(address);
        }

        // Availability is judged against the order amount before shipping.
        let provisional = self
            .pricing
            .calculate_totals(&session.items, Decimal::ZERO, &session.currency);

        if let Some(option_id) = request.selected_fulfillment_option_id {
            let options = self.shipping.available_options(
                &session.items,
                session.shipping_address.as_ref(),
                provisional.subtotal,
            );
            if !options.iter().any(|o| o.id == option_id) {
                // Distinguish a foreign id from a known-but-unserviceable one.
                self.shipping.shipping_cost(
                    &option_id,
                    provisional.subtotal,
                    session.shipping_address.as_ref(),
                )?;
                return Err(ServiceError::FulfillmentOptionUnavailable(option_id));
            }
            session.selected_fulfillment_option_id = Some(option_id);
        }

        let shipping_cost = match &session.selected_fulfillment_option_id {
            Some(option_id) => self.shipping.shipping_cost(
                option_id,
                provisional.subtotal,
                session.shipping_address.as_ref(),
            )?,
            None => Decimal::ZERO,
        };

        session.totals =
            self.pricing
                .calculate_totals(&session.items, shipping_cost, &session.currency);
        session.status = session.derive_open_status();
        session.updated_at = Utc::now();
        session.expires_at = session.updated_at + self.session_ttl;

        let mut saved = self.store.save(session).await?;
        self.attach_options(&mut saved);

        self.event_sender
            .send_or_log(Event::CheckoutSessionUpdated {
                session_id: saved.id.clone(),
            })
            .await;

        Ok(saved)
    }

    /// Hands the session off to the PSP: prepares the payment, records the
    /// redirect URL the buyer must visit and promotes the session to READY,
    /// where it stays until the payment is confirmed.
    #[instrument(skip(self))]
    pub async fn complete_session(&self, id: &str) -> Result<CheckoutSession, ServiceError> {
        let lock = self.lock_for(id).await;
        let result = {
            let _guard = lock.lock().await;
            self.complete_session_locked(id).await
        };
        self.release_lock(id, lock).await;
        result
    }

    async fn complete_session_locked(&self, id: &str) -> Result<CheckoutSession, ServiceError> {
        let mut session = self.load(id).await?;
        match session.status {
            CheckoutStatus::Completed => return Err(ServiceError::AlreadyCompleted),
            CheckoutStatus::Canceled => {
                return Err(ServiceError::InvalidState(
                    "session has been canceled".to_string(),
                ))
            }
            _ => {}
        }
        self.ensure_not_expired(&session)?;

        if !session.is_ready_for_payment() {
            return Err(ServiceError::NotReadyForPayment(
                "buyer, shipping address and items are required".to_string(),
            ));
        }

        let payment_items = self.payment_items(&session).await?;
        let prepared = self
            .payments
            .prepare(PaymentPrepareRequest {
                merchant_order_id: session.id.clone(),
                amount: session.totals.total,
                currency: session.currency.clone(),
                items: payment_items,
            })
            .await?;

        session.status = CheckoutStatus::Ready;
        session.next_action_url = Some(prepared.redirect_url);
        session.updated_at = Utc::now();

        let mut saved = self.store.save(session).await?;
        self.attach_options(&mut saved);
        Ok(saved)
    }

    /// Approves the prepared payment and, on success, creates the order and
    /// completes the session. Idempotent once the session is COMPLETED.
    #[instrument(skip(self, pg_token))]
    pub async fn confirm_payment(
        &self,
        id: &str,
        pg_token: &str,
    ) -> Result<ConfirmPaymentResult, ServiceError> {
        let lock = self.lock_for(id).await;
        let result = {
            let _guard = lock.lock().await;
            self.confirm_payment_locked(id, pg_token).await
        };
        self.release_lock(id, lock).await;
        result
    }

    async fn confirm_payment_locked(
        &self,
        id: &str,
        pg_token: &str,
    ) -> Result<ConfirmPaymentResult, ServiceError> {
        let session = self.load(id).await?;
        if session.status == CheckoutStatus::Completed {
            info!(session_id = %id, "session already completed; replaying");
            return Ok(ConfirmPaymentResult {
                session,
                order: None,
            });
        }
        if session.status != CheckoutStatus::Ready {
            return Err(ServiceError::InvalidState(format!(
                "cannot confirm payment for a {} session",
                session.status
            )));
        }

        let approval = self
            .payments
            .approve(PaymentApproveRequest {
                merchant_order_id: session.id.clone(),
                pg_token: pg_token.to_string(),
            })
            .await?;

        if approval.status != "COMPLETED" {
            warn!(session_id = %id, status = %approval.status, "approval did not complete");
            return Err(ServiceError::PaymentApprovalFailed(format!(
                "approval returned status {}",
                approval.status
            )));
        }

        let order = self
            .orders
            .create_from_session(&session, &approval.payment_id)
            .await?;

        let mut completed = session;
        completed.status = CheckoutStatus::Completed;
        completed.next_action_url = None;
        completed.updated_at = Utc::now();
        let saved = self.store.save(completed).await?;

        info!(session_id = %id, order_id = %order.id, "checkout session completed");
        self.event_sender
            .send_or_log(Event::CheckoutSessionCompleted {
                session_id: saved.id.clone(),
                order_id: order.id.clone(),
            })
            .await;

        Ok(ConfirmPaymentResult {
            session: saved,
            order: Some(order),
        })
    }

    #[instrument(skip(self))]
    pub async fn cancel_session(
        &self,
        id: &str,
        reason: &str,
    ) -> Result<CheckoutSession, ServiceError> {
        let lock = self.lock_for(id).await;
        let result = {
            let _guard = lock.lock().await;
            self.cancel_session_locked(id, reason).await
        };
        self.release_lock(id, lock).await;
        result
    }

    async fn cancel_session_locked(
        &self,
        id: &str,
        reason: &str,
    ) -> Result<CheckoutSession, ServiceError> {
        let mut session = self.load(id).await?;
        if !session.is_open() {
            return Err(ServiceError::InvalidState(format!(
                "cannot cancel a {} session",
                session.status
            )));
        }

        session.status = CheckoutStatus::Canceled;
        session.cancel_reason = Some(reason.to_string());
        session.next_action_url = None;
        session.updated_at = Utc::now();

        let saved = self.store.save(session).await?;

        info!(session_id = %id, %reason, "checkout session canceled");
        self.event_sender
            .send_or_log(Event::CheckoutSessionCanceled {
                session_id: saved.id.clone(),
                reason: reason.to_string(),
            })
            .await;

        Ok(saved)
    }

    async fn load(&self, id: &str) -> Result<CheckoutSession, ServiceError> {
        self.store
            .find_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("checkout session {} not found", id)))
    }

    fn ensure_mutable(&self, session: &CheckoutSession) -> Result<(), ServiceError> {
        if !session.is_open() {
            return Err(ServiceError::InvalidState(format!(
                "cannot modify a {} session",
                session.status
            )));
        }
        self.ensure_not_expired(session)
    }

    fn ensure_not_expired(&self, session: &CheckoutSession) -> Result<(), ServiceError> {
        if session.expires_at <= Utc::now() {
            return Err(ServiceError::InvalidState(
                "session has expired".to_string(),
            ));
        }
        Ok(())
    }

    /// Resolves line items against the catalog. Prices always come from the
    /// catalog, never from the request.
    async fn resolve_items(
        &self,
        requested: &[CheckoutItemRequest],
    ) -> Result<Vec<CheckoutItem>, ServiceError> {
        let mut items = Vec::with_capacity(requested.len());
        for line in requested {
            if line.quantity < 1 {
                return Err(ServiceError::ValidationError(format!(
                    "quantity must be positive for product {}",
                    line.product_id
                )));
            }

            let product = self
                .catalog
                .find_product(&line.product_id)
                .await?
                .ok_or_else(|| ServiceError::ProductNotFound(line.product_id.clone()))?;

            let unit_price = product.unit_price.ok_or_else(|| {
                ServiceError::InvalidState(format!(
                    "product {} has no price and cannot be checked out",
                    product.id
                ))
            })?;

            items.push(CheckoutItem {
                product_id: line.product_id.clone(),
                quantity: line.quantity,
                unit_price,
                total_price: unit_price * Decimal::from(line.quantity),
            });
        }
        Ok(items)
    }

    async fn payment_items(
        &self,
        session: &CheckoutSession,
    ) -> Result<Vec<PaymentItem>, ServiceError> {
        let mut items = Vec::with_capacity(session.items.len());
        for line in &session.items {
            let name = self
                .catalog
                .find_product(&line.product_id)
                .await?
                .map(|p| p.display_name)
                .unwrap_or_else(|| line.product_id.clone());
            items.push(PaymentItem {
                name,
                quantity: line.quantity,
                unit_price: line.unit_price,
                currency: session.currency.clone(),
            });
        }
        Ok(items)
    }

    fn attach_options(&self, session: &mut CheckoutSession) {
        if session.shipping_address.is_some() {
            session.available_fulfillment_options = self.shipping.available_options(
                &session.items,
                session.shipping_address.as_ref(),
                session.totals.subtotal,
            );
        }
    }
}

fn into_buyer(request: BuyerRequest) -> Buyer {
    Buyer {
        email: request.email,
        name: request.name,
    }
}

fn into_address(request: AddressRequest) -> Address {
    Address {
        country_code: request.country_code.to_uppercase(),
        postal_code: request.postal_code,
    }
}
