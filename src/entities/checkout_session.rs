use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
pub enum CheckoutStatus {
    #[sea_orm(string_value = "not_ready_for_payment")]
    NotReady,
    #[sea_orm(string_value = "ready_for_payment")]
    Ready,
    #[sea_orm(string_value = "completed")]
    Completed,
    #[sea_orm(string_value = "canceled")]
    Canceled,
}

/// Checkout session row. Items, buyer, address and totals are stored as JSON
/// value objects; fulfillment options are never stored, they are recomputed
/// on every read. One row per session, updated in place with an
/// optimistic-concurrency version column.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "checkout_sessions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    pub status: CheckoutStatus,
    pub currency: String,

    #[sea_orm(column_type = "Json")]
    pub items: Json,

    #[sea_orm(column_type = "Json", nullable)]
    pub buyer: Option<Json>,

    #[sea_orm(column_type = "Json", nullable)]
    pub shipping_address: Option<Json>,

    pub selected_fulfillment_option_id: Option<String>,

    #[sea_orm(column_type = "Json")]
    pub totals: Json,

    pub next_action_url: Option<String>,
    pub cancel_reason: Option<String>,

    pub version: i32,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
