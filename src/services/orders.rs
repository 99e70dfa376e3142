use crate::entities::{order, order_item};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::models::{CheckoutSession, Order, OrderLineItem, OrderStatus};
use crate::services::catalog::ProductCatalog;
use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set, TransactionTrait};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, instrument};
use uuid::Uuid;

/// Persistence port for finalized orders.
#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn insert(&self, order: Order) -> Result<Order, ServiceError>;
    async fn find_by_id(&self, id: &str) -> Result<Option<Order>, ServiceError>;
}

pub struct SeaOrmOrderStore {
    db: Arc<DatabaseConnection>,
}

impl SeaOrmOrderStore {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl OrderStore for SeaOrmOrderStore {
    async fn insert(&self, new_order: Order) -> Result<Order, ServiceError> {
        let txn = self.db.begin().await?;

        order::Entity::insert(order::ActiveModel {
            id: Set(new_order.id.clone()),
            user_id: Set(new_order.user_id.clone()),
            status: Set(to_entity_status(new_order.status)),
            total_amount: Set(new_order.total_amount),
            currency: Set(new_order.currency.clone()),
            payment_id: Set(new_order.payment_id.clone()),
            created_at: Set(new_order.created_at),
        })
        .exec(&txn)
        .await?;

        for item in &new_order.items {
            order_item::Entity::insert(order_item::ActiveModel {
                id: Set(Uuid::new_v4().to_string()),
                order_id: Set(new_order.id.clone()),
                product_id: Set(item.product_id.clone()),
                product_name: Set(item.product_name.clone()),
                quantity: Set(item.quantity),
                unit_price: Set(item.unit_price),
                total_price: Set(item.total_price),
            })
            .exec(&txn)
            .await?;
        }

        txn.commit().await?;
        Ok(new_order)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Order>, ServiceError> {
        let Some(row) = order::Entity::find_by_id(id).one(self.db.as_ref()).await? else {
            return Ok(None);
        };

        let items = order_item::Entity::find()
            .filter(order_item::Column::OrderId.eq(&row.id))
            .all(self.db.as_ref())
            .await?
            .into_iter()
            .map(|item| OrderLineItem {
                product_id: item.product_id,
                product_name: item.product_name,
                quantity: item.quantity,
                unit_price: item.unit_price,
                total_price: item.total_price,
            })
            .collect();

        Ok(Some(Order {
            id: row.id,
            user_id: row.user_id,
            status: from_entity_status(row.status),
            total_amount: row.total_amount,
            currency: row.currency,
            payment_id: row.payment_id,
            items,
            created_at: row.created_at,
        }))
    }
}

fn to_entity_status(s: OrderStatus) -> order::OrderStatus {
    match s {
        OrderStatus::Pending => order::OrderStatus::Pending,
        OrderStatus::Authorized => order::OrderStatus::Authorized,
        OrderStatus::Completed => order::OrderStatus::Completed,
        OrderStatus::Canceled => order::OrderStatus::Canceled,
        OrderStatus::Failed => order::OrderStatus::Failed,
    }
}

fn from_entity_status(s: order::OrderStatus) -> OrderStatus {
    match s {
        order::OrderStatus::Pending => OrderStatus::Pending,
        order::OrderStatus::Authorized => OrderStatus::Authorized,
        order::OrderStatus::Completed => OrderStatus::Completed,
        order::OrderStatus::Canceled => OrderStatus::Canceled,
        order::OrderStatus::Failed => OrderStatus::Failed,
    }
}

/// In-memory order store for tests and local development.
#[derive(Default)]
pub struct InMemoryOrderStore {
    orders: RwLock<HashMap<String, Order>>,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn count(&self) -> usize {
        self.orders.read().await.len()
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn insert(&self, order: Order) -> Result<Order, ServiceError> {
        self.orders
            .write()
            .await
            .insert(order.id.clone(), order.clone());
        Ok(order)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Order>, ServiceError> {
        Ok(self.orders.read().await.get(id).cloned())
    }
}

/// Turns a paid checkout session into its immutable order record.
pub struct OrderService {
    store: Arc<dyn OrderStore>,
    catalog: Arc<dyn ProductCatalog>,
    event_sender: EventSender,
}

impl OrderService {
    pub fn new(
        store: Arc<dyn OrderStore>,
        catalog: Arc<dyn ProductCatalog>,
        event_sender: EventSender,
    ) -> Self {
        Self {
            store,
            catalog,
            event_sender,
        }
    }

    #[instrument(skip(self, session), fields(session_id = %session.id))]
    pub async fn create_from_session(
        &self,
        session: &CheckoutSession,
        payment_id: &str,
    ) -> Result<Order, ServiceError> {
        let user_id = session
            .buyer
            .as_ref()
            .and_then(|b| b.email.clone())
            .unwrap_or_else(|| "guest".to_string());

        let mut items = Vec::with_capacity(session.items.len());
        for line in &session.items {
            let product_name = self
                .catalog
                .find_product(&line.product_id)
                .await?
                .map(|p| p.display_name)
                .unwrap_or_else(|| line.product_id.clone());

            items.push(OrderLineItem {
                product_id: line.product_id.clone(),
                product_name,
                quantity: line.quantity,
                unit_price: line.unit_price,
                total_price: line.total_price,
            });
        }

        let order = self
            .store
            .insert(Order {
                id: Uuid::new_v4().to_string(),
                user_id,
                status: OrderStatus::Completed,
                total_amount: session.totals.total,
                currency: session.currency.clone(),
                payment_id: Some(payment_id.to_string()),
                items,
                created_at: Utc::now(),
            })
            .await?;

        info!(order_id = %order.id, total = %order.total_amount, "order created");
        self.event_sender
            .send_or_log(Event::OrderCreated {
                order_id: order.id.clone(),
                total_amount: order.total_amount,
            })
            .await;

        Ok(order)
    }

    pub async fn get_order(&self, id: &str) -> Result<Order, ServiceError> {
        self.store
            .find_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("order {} not found", id)))
    }
}
