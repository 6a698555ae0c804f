use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::{CustomerInfo, Order, OrderItem, OrderStatus, Product};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("table does not exist: {0}")]
    MissingTable(String),
    #[error("corrupt record: {0}")]
    Corrupt(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CustomerLookup {
    Email(String),
    Phone(String),
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Writes the order header only; line items go through
    /// [`OrderStore::insert_order_items`].
    async fn insert_order(&self, order: &Order) -> Result<(), StoreError>;

    async fn insert_order_items(&self, order_id: &str, items: &[OrderItem]) -> Result<(), StoreError>;

    async fn delete_order(&self, order_id: &str) -> Result<(), StoreError>;

    /// Newest first, items attached.
    async fn list_orders(&self) -> Result<Vec<Order>, StoreError>;

    async fn find_order(&self, order_id: &str) -> Result<Option<Order>, StoreError>;

    /// Returns false when no order has that id.
    async fn set_status(&self, order_id: &str, status: OrderStatus) -> Result<bool, StoreError>;

    async fn set_reminder_sent(&self, order_id: &str, at: DateTime<Utc>) -> Result<bool, StoreError>;

    /// Customer snapshots from the most recent orders, newest first. Email
    /// lookups are filtered by the store; phone lookups return up to `limit`
    /// recent snapshots for the caller to match.
    async fn recent_customers(&self, lookup: &CustomerLookup, limit: i64) -> Result<Vec<CustomerInfo>, StoreError>;
}

#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn read_setting(&self, key: &str) -> Result<Option<serde_json::Value>, StoreError>;

    async fn upsert_setting(&self, key: &str, value: serde_json::Value) -> Result<(), StoreError>;
}

#[async_trait]
pub trait ProductCatalog: Send + Sync {
    async fn products_by_ids(&self, ids: &[String]) -> Result<Vec<Product>, StoreError>;
}
