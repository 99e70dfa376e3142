use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum PaymentType {
    #[sea_orm(string_value = "PREPARE")]
    Prepare,
    #[sea_orm(string_value = "APPROVE")]
    Approve,
    #[sea_orm(string_value = "CANCEL")]
    Cancel,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum PaymentStatus {
    #[sea_orm(string_value = "READY")]
    Ready,
    #[sea_orm(string_value = "SUCCESS")]
    Success,
    #[sea_orm(string_value = "FAIL")]
    Fail,
}

/// Append-only payment ledger row. Rows are only ever inserted; current state
/// for an order is the latest row of a given type. The migration adds a
/// partial unique index on (merchant_order_id, type) for open PREPARE rows to
/// close the concurrent first-prepare race at the storage layer.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "payments")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    pub merchant_order_id: String,

    /// Originating PREPARE entry for APPROVE/CANCEL rows.
    pub org_payment_id: Option<String>,

    pub payment_type: PaymentType,
    pub status: PaymentStatus,

    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub amount: Decimal,

    pub currency: String,
    pub pg_provider: String,

    /// PSP transaction id, AES-GCM-encrypted and base64-encoded.
    pub pg_tid: Option<String>,

    pub redirect_url: Option<String>,
    pub payment_method_type: Option<String>,
    pub card_issuer: Option<String>,

    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
