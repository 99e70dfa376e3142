use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Events emitted by the checkout and payment services.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    // Checkout session lifecycle
    CheckoutSessionCreated { session_id: String },
    CheckoutSessionUpdated { session_id: String },
    CheckoutSessionCompleted { session_id: String, order_id: String },
    CheckoutSessionCanceled { session_id: String, reason: String },

    // Order finalization
    OrderCreated { order_id: String, total_amount: Decimal },

    // Payment orchestration
    PaymentPrepared { payment_id: String, merchant_order_id: String },
    PaymentApproved { payment_id: String, merchant_order_id: String },
    PaymentApprovalFailed { merchant_order_id: String, reason: String },
    PaymentCanceled { payment_id: String, merchant_order_id: String },

    /// A compensating cancel was issued after an ambiguous approve failure.
    NetCancelExecuted {
        merchant_order_id: String,
        prepare_payment_id: String,
        amount: Decimal,
    },
    /// Net-cancel itself failed: money may be stuck on the PSP side. This is
    /// the alerting hook required when recovery cannot confirm a reversal.
    NetCancelFailed {
        merchant_order_id: String,
        prepare_payment_id: String,
        reason: String,
        timestamp: DateTime<Utc>,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event, surfacing channel failures to the caller.
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends an event, logging instead of failing the surrounding operation.
    /// Domain operations must not fail because the event channel is down.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event.clone()).await {
            warn!(?event, "event delivery failed: {}", e);
        }
    }
}

/// Drains the event channel. Net-cancel failures are logged at error level so
/// they reach alerting; everything else is informational.
pub async fn process_events(mut receiver: mpsc::Receiver<Event>) {
    while let Some(event) = receiver.recv().await {
        match &event {
            Event::NetCancelFailed {
                merchant_order_id,
                prepare_payment_id,
                reason,
                ..
            } => {
                error!(
                    %merchant_order_id,
                    %prepare_payment_id,
                    %reason,
                    "net-cancel failed; payment may be stuck at the PSP"
                );
            }
            Event::NetCancelExecuted {
                merchant_order_id,
                prepare_payment_id,
                amount,
            } => {
                warn!(
                    %merchant_order_id,
                    %prepare_payment_id,
                    %amount,
                    "net-cancel executed against the PSP"
                );
            }
            other => info!(event = ?other, "domain event"),
        }
    }
}
