use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use shared::{Order, OrderItem, Product};

use crate::store::StoreError;

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = crate::schema::orders)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DbOrder {
    pub id: String,
    pub customer_name: String,
    pub email: String,
    pub phone: String,
    pub zip_code: String,
    pub total: BigDecimal,
    pub pickup_time: String,
    pub status: String,
    pub notification_preference: String,
    pub created_at: DateTime<Utc>,
    pub reminder_sent_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = crate::schema::order_items)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DbOrderItem {
    pub id: i64,
    pub order_id: String,
    pub product_id: String,
    pub product_name: String,
    pub product_price: BigDecimal,
    pub quantity: i32,
    pub subtotal: BigDecimal,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::order_items)]
pub struct NewOrderItem {
    pub order_id: String,
    pub product_id: String,
    pub product_name: String,
    pub product_price: BigDecimal,
    pub quantity: i32,
    pub subtotal: BigDecimal,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = crate::schema::products)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DbProduct {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub price: BigDecimal,
    pub category: String,
    pub image_url: Option<String>,
    pub is_available: bool,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::settings)]
pub struct SettingRow {
    pub key: String,
    pub value: serde_json::Value,
    pub updated_at: DateTime<Utc>,
}

impl From<&Order> for DbOrder {
    fn from(order: &Order) -> Self {
        Self {
            id: order.id.clone(),
            customer_name: order.customer_name.clone(),
            email: order.email.clone(),
            phone: order.phone.clone(),
            zip_code: order.zip_code.clone(),
            total: order.total.clone(),
            pickup_time: order.pickup_time.clone(),
            status: order.status.as_str().to_string(),
            notification_preference: order.notification_preference.as_str().to_string(),
            created_at: order.created_at,
            reminder_sent_at: order.reminder_sent_at,
        }
    }
}

impl NewOrderItem {
    pub fn new(order_id: &str, item: &OrderItem) -> Self {
        Self {
            order_id: order_id.to_string(),
            product_id: item.product_id.clone(),
            product_name: item.name.clone(),
            product_price: item.price.clone(),
            quantity: item.quantity,
            subtotal: item.subtotal(),
        }
    }
}

impl From<DbOrderItem> for OrderItem {
    fn from(row: DbOrderItem) -> Self {
        Self {
            product_id: row.product_id,
            name: row.product_name,
            price: row.product_price,
            quantity: row.quantity,
        }
    }
}

impl DbOrder {
    /// Joins a header row with its item rows. Enum columns are validated here
    /// so a bad row surfaces as a store error instead of leaking through.
    pub fn into_order(self, items: Vec<DbOrderItem>) -> Result<Order, StoreError> {
        let status = self
            .status
            .parse()
            .map_err(|e| StoreError::Corrupt(format!("order {}: {}", self.id, e)))?;
        let notification_preference = self
            .notification_preference
            .parse()
            .map_err(|e| StoreError::Corrupt(format!("order {}: {}", self.id, e)))?;

        Ok(Order {
            id: self.id,
            customer_name: self.customer_name,
            email: self.email,
            phone: self.phone,
            zip_code: self.zip_code,
            items: items.into_iter().map(OrderItem::from).collect(),
            total: self.total,
            pickup_time: self.pickup_time,
            status,
            notification_preference,
            created_at: self.created_at,
            reminder_sent_at: self.reminder_sent_at,
        })
    }
}

impl From<DbProduct> for Product {
    fn from(row: DbProduct) -> Self {
        Self {
            id: row.id,
            name: row.name,
            description: row.description,
            price: row.price,
            category: row.category,
            image_url: row.image_url,
            is_available: row.is_available,
        }
    }
}
