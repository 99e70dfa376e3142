use crate::entities::product;
use crate::errors::ServiceError;
use async_trait::async_trait;
use rust_decimal::Decimal;
use sea_orm::{DatabaseConnection, EntityTrait};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// What checkout needs to know about a product.
#[derive(Debug, Clone)]
pub struct Product {
    pub id: String,
    pub display_name: String,
    pub unit_price: Option<Decimal>,
}

/// Catalog lookup port. The ingestion/conversion pipeline that feeds the
/// catalog is a separate system; this service only reads from it.
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    async fn find_product(&self, id: &str) -> Result<Option<Product>, ServiceError>;
}

/// Database-backed catalog.
#[derive(Clone)]
pub struct SeaOrmProductCatalog {
    db: Arc<DatabaseConnection>,
}

impl SeaOrmProductCatalog {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ProductCatalog for SeaOrmProductCatalog {
    async fn find_product(&self, id: &str) -> Result<Option<Product>, ServiceError> {
        let row = product::Entity::find_by_id(id.to_string())
            .one(&*self.db)
            .await?;

        Ok(row.map(|p| Product {
            id: p.id,
            display_name: p.title,
            unit_price: p.price_amount,
        }))
    }
}

/// In-memory catalog for tests and local development.
#[derive(Default)]
pub struct InMemoryProductCatalog {
    products: RwLock<HashMap<String, Product>>,
}

impl InMemoryProductCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, product: Product) {
        self.products
            .write()
            .await
            .insert(product.id.clone(), product);
    }
}

#[async_trait]
impl ProductCatalog for InMemoryProductCatalog {
    async fn find_product(&self, id: &str) -> Result<Option<Product>, ServiceError> {
        Ok(self.products.read().await.get(id).cloned())
    }
}
