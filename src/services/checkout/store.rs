use crate::entities::checkout_session::{self, Entity as SessionEntity};
use crate::errors::ServiceError;
use crate::models::{
    Address, Buyer, CheckoutItem, CheckoutSession, CheckoutStatus, Totals,
};
use async_trait::async_trait;
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Persistence port for checkout sessions.
///
/// `save` upserts the whole aggregate and bumps its version column.
/// Fulfillment options are never persisted; callers recompute them.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn find_by_id(&self, id: &str) -> Result<Option<CheckoutSession>, ServiceError>;
    async fn save(&self, session: CheckoutSession) -> Result<CheckoutSession, ServiceError>;
}

pub struct SeaOrmSessionStore {
    db: Arc<DatabaseConnection>,
}

impl SeaOrmSessionStore {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SessionStore for SeaOrmSessionStore {
    async fn find_by_id(&self, id: &str) -> Result<Option<CheckoutSession>, ServiceError> {
        let row = SessionEntity::find_by_id(id).one(self.db.as_ref()).await?;
        row.map(from_entity).transpose()
    }

    async fn save(&self, mut session: CheckoutSession) -> Result<CheckoutSession, ServiceError> {
        let exists = SessionEntity::find_by_id(&session.id)
            .one(self.db.as_ref())
            .await?
            .is_some();

        session.version += 1;
        let active = to_active_model(&session)?;

        if exists {
            active.update(self.db.as_ref()).await?;
        } else {
            active.insert(self.db.as_ref()).await?;
        }

        Ok(session)
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<serde_json::Value, ServiceError> {
    serde_json::to_value(value).map_err(|e| ServiceError::SerializationError(e.to_string()))
}

fn from_json<T: serde::de::DeserializeOwned>(value: serde_json::Value) -> Result<T, ServiceError> {
    serde_json::from_value(value).map_err(|e| ServiceError::SerializationError(e.to_string()))
}

fn to_active_model(
    session: &CheckoutSession,
) -> Result<checkout_session::ActiveModel, ServiceError> {
    Ok(checkout_session::ActiveModel {
        id: Set(session.id.clone()),
        status: Set(to_entity_status(session.status)),
        currency: Set(session.currency.clone()),
        items: Set(to_json(&session.items)?),
        buyer: Set(session.buyer.as_ref().map(to_json).transpose()?),
        shipping_address: Set(session.shipping_address.as_ref().map(to_json).transpose()?),
        selected_fulfillment_option_id: Set(session.selected_fulfillment_option_id.clone()),
        totals: Set(to_json(&session.totals)?),
        next_action_url: Set(session.next_action_url.clone()),
        cancel_reason: Set(session.cancel_reason.clone()),
        version: Set(session.version),
        created_at: Set(session.created_at),
        updated_at: Set(session.updated_at),
        expires_at: Set(session.expires_at),
    })
}

fn from_entity(row: checkout_session::Model) -> Result<CheckoutSession, ServiceError> {
    let items: Vec<CheckoutItem> = from_json(row.items)?;
    let buyer: Option<Buyer> = row.buyer.map(from_json).transpose()?;
    let shipping_address: Option<Address> = row.shipping_address.map(from_json).transpose()?;
    let totals: Totals = from_json(row.totals)?;

    Ok(CheckoutSession {
        id: row.id,
        status: from_entity_status(row.status),
        currency: row.currency,
        items,
        buyer,
        shipping_address,
        available_fulfillment_options: Vec::new(),
        selected_fulfillment_option_id: row.selected_fulfillment_option_id,
        totals,
        next_action_url: row.next_action_url,
        cancel_reason: row.cancel_reason,
        version: row.version,
        created_at: row.created_at,
        updated_at: row.updated_at,
        expires_at: row.expires_at,
    })
}

fn to_entity_status(s: CheckoutStatus) -> checkout_session::CheckoutStatus {
    match s {
        CheckoutStatus::NotReady => checkout_session::CheckoutStatus::NotReady,
        CheckoutStatus::Ready => checkout_session::CheckoutStatus::Ready,
        CheckoutStatus::Completed => checkout_session::CheckoutStatus::Completed,
        CheckoutStatus::Canceled => checkout_session::CheckoutStatus::Canceled,
    }
}

fn from_entity_status(s: checkout_session::CheckoutStatus) -> CheckoutStatus {
    match s {
        checkout_session::CheckoutStatus::NotReady => CheckoutStatus::NotReady,
        checkout_session::CheckoutStatus::Ready => CheckoutStatus::Ready,
        checkout_session::CheckoutStatus::Completed => CheckoutStatus::Completed,
        checkout_session::CheckoutStatus::Canceled => CheckoutStatus::Canceled,
    }
}

/// In-memory session store for tests and local development.
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, CheckoutSession>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn find_by_id(&self, id: &str) -> Result<Option<CheckoutSession>, ServiceError> {
        let sessions = self.sessions.read().await;
        Ok(sessions.get(id).cloned().map(|mut s| {
            // Options are derived data and never come back from storage.
            s.available_fulfillment_options = Vec::new();
            s
        }))
    }

    async fn save(&self, mut session: CheckoutSession) -> Result<CheckoutSession, ServiceError> {
        session.version += 1;
        let mut stored = session.clone();
        stored.available_fulfillment_options = Vec::new();
        self.sessions
            .write()
            .await
            .insert(stored.id.clone(), stored);
        Ok(session)
    }
}
