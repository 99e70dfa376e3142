use crate::entities::payment::{self, Entity as PaymentEntity};
use crate::errors::ServiceError;
use crate::models::{PaymentRecord, PaymentStatus, PaymentType};
use async_trait::async_trait;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Persistence port for the append-only payment ledger.
#[async_trait]
pub trait PaymentStore: Send + Sync {
    /// Latest row of the given type for an order, by insertion time.
    async fn find_latest_by_order_and_type(
        &self,
        merchant_order_id: &str,
        payment_type: PaymentType,
    ) -> Result<Option<PaymentRecord>, ServiceError>;

    async fn insert(&self, record: PaymentRecord) -> Result<PaymentRecord, ServiceError>;
}

/// SeaORM-backed ledger store.
pub struct SeaOrmPaymentStore {
    db: Arc<DatabaseConnection>,
}

impl SeaOrmPaymentStore {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl PaymentStore for SeaOrmPaymentStore {
    async fn find_latest_by_order_and_type(
        &self,
        merchant_order_id: &str,
        payment_type: PaymentType,
    ) -> Result<Option<PaymentRecord>, ServiceError> {
        let row = PaymentEntity::find()
            .filter(payment::Column::MerchantOrderId.eq(merchant_order_id))
            .filter(payment::Column::PaymentType.eq(to_entity_type(payment_type)))
            .order_by_desc(payment::Column::CreatedAt)
            .one(self.db.as_ref())
            .await?;

        Ok(row.map(from_entity))
    }

    async fn insert(&self, record: PaymentRecord) -> Result<PaymentRecord, ServiceError> {
        let active = payment::ActiveModel {
            id: Set(record.id.clone()),
            merchant_order_id: Set(record.merchant_order_id.clone()),
            org_payment_id: Set(record.org_payment_id.clone()),
            payment_type: Set(to_entity_type(record.payment_type)),
            status: Set(to_entity_status(record.status)),
            amount: Set(record.amount),
            currency: Set(record.currency.clone()),
            pg_provider: Set(record.pg_provider.clone()),
            pg_tid: Set(record.pg_tid.clone()),
            redirect_url: Set(record.redirect_url.clone()),
            payment_method_type: Set(record.payment_method_type.clone()),
            card_issuer: Set(record.card_issuer.clone()),
            created_at: Set(record.created_at),
        };

        PaymentEntity::insert(active).exec(self.db.as_ref()).await?;
        Ok(record)
    }
}

fn to_entity_type(t: PaymentType) -> payment::PaymentType {
    match t {
        PaymentType::Prepare => payment::PaymentType::Prepare,
        PaymentType::Approve => payment::PaymentType::Approve,
        PaymentType::Cancel => payment::PaymentType::Cancel,
    }
}

fn to_entity_status(s: PaymentStatus) -> payment::PaymentStatus {
    match s {
        PaymentStatus::Ready => payment::PaymentStatus::Ready,
        PaymentStatus::Success => payment::PaymentStatus::Success,
        PaymentStatus::Fail => payment::PaymentStatus::Fail,
    }
}

fn from_entity(row: payment::Model) -> PaymentRecord {
    PaymentRecord {
        id: row.id,
        merchant_order_id: row.merchant_order_id,
        org_payment_id: row.org_payment_id,
        payment_type: match row.payment_type {
            payment::PaymentType::Prepare => PaymentType::Prepare,
            payment::PaymentType::Approve => PaymentType::Approve,
            payment::PaymentType::Cancel => PaymentType::Cancel,
        },
        status: match row.status {
            payment::PaymentStatus::Ready => PaymentStatus::Ready,
            payment::PaymentStatus::Success => PaymentStatus::Success,
            payment::PaymentStatus::Fail => PaymentStatus::Fail,
        },
        amount: row.amount,
        currency: row.currency,
        pg_provider: row.pg_provider,
        pg_tid: row.pg_tid,
        redirect_url: row.redirect_url,
        payment_method_type: row.payment_method_type,
        card_issuer: row.card_issuer,
        created_at: row.created_at,
    }
}

/// In-memory ledger store for tests and local development.
#[derive(Default)]
pub struct InMemoryPaymentStore {
    rows: RwLock<HashMap<String, Vec<PaymentRecord>>>,
}

impl InMemoryPaymentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All rows for an order in insertion order, for test assertions.
    pub async fn rows_for_order(&self, merchant_order_id: &str) -> Vec<PaymentRecord> {
        self.rows
            .read()
            .await
            .get(merchant_order_id)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl PaymentStore for InMemoryPaymentStore {
    async fn find_latest_by_order_and_type(
        &self,
        merchant_order_id: &str,
        payment_type: PaymentType,
    ) -> Result<Option<PaymentRecord>, ServiceError> {
        let rows = self.rows.read().await;
        Ok(rows
            .get(merchant_order_id)
            .and_then(|rows| {
                rows.iter()
                    .rev()
                    .find(|r| r.payment_type == payment_type)
            })
            .cloned())
    }

    async fn insert(&self, record: PaymentRecord) -> Result<PaymentRecord, ServiceError> {
        let mut rows = self.rows.write().await;
        rows.entry(record.merchant_order_id.clone())
            .or_default()
            .push(record.clone());
        Ok(record)
    }
}
