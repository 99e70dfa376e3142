use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Lifecycle of a checkout session.
///
/// `NotReady` and `Ready` are the only mutable states; `Completed` and
/// `Canceled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum CheckoutStatus {
    #[serde(rename = "not_ready_for_payment")]
    NotReady,
    #[serde(rename = "ready_for_payment")]
    Ready,
    #[serde(rename = "completed")]
    Completed,
    #[serde(rename = "canceled")]
    Canceled,
}

impl CheckoutStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotReady => "not_ready_for_payment",
            Self::Ready => "ready_for_payment",
            Self::Completed => "completed",
            Self::Canceled => "canceled",
        }
    }
}

impl std::fmt::Display for CheckoutStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A line in a checkout session. Value object owned by the session; prices
/// are resolved from the catalog at creation/update time, never client-supplied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CheckoutItem {
    pub product_id: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub total_price: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Buyer {
    pub email: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Address {
    /// ISO 3166-1 alpha-2 country code
    pub country_code: String,
    pub postal_code: Option<String>,
}

/// Fixed-point totals for a session. Invariants:
/// `subtotal = items_base_amount - items_discount` and
/// `total = subtotal + shipping + tax`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Totals {
    pub items_base_amount: Decimal,
    pub items_discount: Decimal,
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub shipping: Decimal,
    pub total: Decimal,
}

impl Totals {
    pub fn zero() -> Self {
        Self {
            items_base_amount: Decimal::ZERO,
            items_discount: Decimal::ZERO,
            subtotal: Decimal::ZERO,
            tax: Decimal::ZERO,
            shipping: Decimal::ZERO,
            total: Decimal::ZERO,
        }
    }
}

/// A shipping method offered for a session. Generated fresh on every
/// recomputation; only the selected option's id is ever persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct FulfillmentOption {
    pub id: String,
    pub name: String,
    pub description: String,
    pub estimated_min_days: i32,
    pub estimated_max_days: i32,
    pub cost: Decimal,
    pub currency: String,
}

/// The checkout session aggregate. Items, buyer, address and totals are
/// value objects owned exclusively by the session.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CheckoutSession {
    pub id: String,
    pub status: CheckoutStatus,
    pub currency: String,
    pub items: Vec<CheckoutItem>,
    pub buyer: Option<Buyer>,
    pub shipping_address: Option<Address>,
    /// Recomputed on every read/write; never trusted from storage.
    #[serde(default)]
    pub available_fulfillment_options: Vec<FulfillmentOption>,
    pub selected_fulfillment_option_id: Option<String>,
    pub totals: Totals,
    /// PSP redirect URL set when payment has been prepared.
    pub next_action_url: Option<String>,
    pub cancel_reason: Option<String>,
    /// Optimistic-concurrency version, bumped on every save.
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl CheckoutSession {
    /// Whether the session can still be mutated.
    pub fn is_open(&self) -> bool {
        matches!(self.status, CheckoutStatus::NotReady | CheckoutStatus::Ready)
    }

    /// Pre-condition for handing off to the PSP: buyer and address present,
    /// items non-empty.
    pub fn is_ready_for_payment(&self) -> bool {
        self.buyer.is_some() && self.shipping_address.is_some() && !self.items.is_empty()
    }

    /// `Ready` requires the payment pre-conditions plus a selected
    /// fulfillment option.
    pub fn derive_open_status(&self) -> CheckoutStatus {
        if self.is_ready_for_payment() && self.selected_fulfillment_option_id.is_some() {
            CheckoutStatus::Ready
        } else {
            CheckoutStatus::NotReady
        }
    }
}
