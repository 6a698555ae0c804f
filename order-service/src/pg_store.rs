use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel::upsert::excluded;
use diesel_async::{pooled_connection::bb8::Pool, AsyncPgConnection, RunQueryDsl};
use shared::{CustomerInfo, Order, OrderItem, OrderStatus, Product};
use std::collections::HashMap;
use std::fmt::Display;

use crate::models::*;
use crate::schema::*;
use crate::store::{CustomerLookup, OrderStore, ProductCatalog, SettingsStore, StoreError};

pub type DbPool = Pool<AsyncPgConnection>;

#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn unavailable(e: impl Display) -> StoreError {
    StoreError::Unavailable(e.to_string())
}

impl From<DieselError> for StoreError {
    fn from(e: DieselError) -> Self {
        match &e {
            // Postgres reports undefined_table (42P01) as `relation "x" does not exist`.
            DieselError::DatabaseError(DatabaseErrorKind::Unknown, info)
                if info.message().contains("does not exist") && info.message().contains("relation") =>
            {
                StoreError::MissingTable(info.message().to_string())
            }
            _ => StoreError::Unavailable(e.to_string()),
        }
    }
}

fn compose(headers: Vec<DbOrder>, items: Vec<DbOrderItem>) -> Result<Vec<Order>, StoreError> {
    let mut by_order: HashMap<String, Vec<DbOrderItem>> = HashMap::new();
    for item in items {
        by_order.entry(item.order_id.clone()).or_default().push(item);
    }
    headers
        .into_iter()
        .map(|header| {
            let items = by_order.remove(&header.id).unwrap_or_default();
            header.into_order(items)
        })
        .collect()
}

#[async_trait]
impl OrderStore for PgStore {
    async fn insert_order(&self, order: &Order) -> Result<(), StoreError> {
        let mut conn = self.pool.get().await.map_err(unavailable)?;
        diesel::insert_into(orders::table)
            .values(&DbOrder::from(order))
            .execute(&mut conn)
            .await?;
        Ok(())
    }

    async fn insert_order_items(&self, order_id: &str, items: &[OrderItem]) -> Result<(), StoreError> {
        let rows: Vec<NewOrderItem> = items.iter().map(|item| NewOrderItem::new(order_id, item)).collect();
        let mut conn = self.pool.get().await.map_err(unavailable)?;
        diesel::insert_into(order_items::table)
            .values(&rows)
            .execute(&mut conn)
            .await?;
        Ok(())
    }

    async fn delete_order(&self, order_id: &str) -> Result<(), StoreError> {
        let mut conn = self.pool.get().await.map_err(unavailable)?;
        diesel::delete(orders::table.find(order_id))
            .execute(&mut conn)
            .await?;
        Ok(())
    }

    async fn list_orders(&self) -> Result<Vec<Order>, StoreError> {
        let mut conn = self.pool.get().await.map_err(unavailable)?;

        let headers = orders::table
            .order(orders::created_at.desc())
            .select(DbOrder::as_select())
            .load::<DbOrder>(&mut conn)
            .await?;

        let ids: Vec<String> = headers.iter().map(|header| header.id.clone()).collect();
        let items = order_items::table
            .filter(order_items::order_id.eq_any(ids))
            .order(order_items::id.asc())
            .select(DbOrderItem::as_select())
            .load::<DbOrderItem>(&mut conn)
            .await?;

        compose(headers, items)
    }

    async fn find_order(&self, order_id: &str) -> Result<Option<Order>, StoreError> {
        let mut conn = self.pool.get().await.map_err(unavailable)?;

        let header = orders::table
            .find(order_id)
            .select(DbOrder::as_select())
            .first::<DbOrder>(&mut conn)
            .await
            .optional()?;

        let Some(header) = header else {
            return Ok(None);
        };

        let items = order_items::table
            .filter(order_items::order_id.eq(order_id))
            .order(order_items::id.asc())
            .select(DbOrderItem::as_select())
            .load::<DbOrderItem>(&mut conn)
            .await?;

        header.into_order(items).map(Some)
    }

    async fn set_status(&self, order_id: &str, status: OrderStatus) -> Result<bool, StoreError> {
        let mut conn = self.pool.get().await.map_err(unavailable)?;
        let updated = diesel::update(orders::table.find(order_id))
            .set(orders::status.eq(status.as_str()))
            .execute(&mut conn)
            .await?;
        Ok(updated > 0)
    }

    async fn set_reminder_sent(&self, order_id: &str, at: DateTime<Utc>) -> Result<bool, StoreError> {
        let mut conn = self.pool.get().await.map_err(unavailable)?;
        let updated = diesel::update(orders::table.find(order_id))
            .set(orders::reminder_sent_at.eq(Some(at)))
            .execute(&mut conn)
            .await?;
        Ok(updated > 0)
    }

    async fn recent_customers(&self, lookup: &CustomerLookup, limit: i64) -> Result<Vec<CustomerInfo>, StoreError> {
        let mut conn = self.pool.get().await.map_err(unavailable)?;

        let mut query = orders::table
            .select((orders::customer_name, orders::email, orders::phone, orders::zip_code))
            .order(orders::created_at.desc())
            .limit(limit)
            .into_boxed();

        if let CustomerLookup::Email(email) = lookup {
            query = query.filter(orders::email.eq(email.clone()));
        }

        let rows = query
            .load::<(String, String, String, String)>(&mut conn)
            .await?;

        Ok(rows
            .into_iter()
            .map(|(name, email, phone, zip_code)| CustomerInfo {
                name,
                email,
                phone,
                zip_code,
            })
            .collect())
    }
}

#[async_trait]
impl SettingsStore for PgStore {
    async fn read_setting(&self, key: &str) -> Result<Option<serde_json::Value>, StoreError> {
        let mut conn = self.pool.get().await.map_err(unavailable)?;
        let value = settings::table
            .find(key)
            .select(settings::value)
            .first::<serde_json::Value>(&mut conn)
            .await
            .optional()?;
        Ok(value)
    }

    async fn upsert_setting(&self, key: &str, value: serde_json::Value) -> Result<(), StoreError> {
        let row = SettingRow {
            key: key.to_string(),
            value,
            updated_at: Utc::now(),
        };

        let mut conn = self.pool.get().await.map_err(unavailable)?;
        diesel::insert_into(settings::table)
            .values(&row)
            .on_conflict(settings::key)
            .do_update()
            .set((
                settings::value.eq(excluded(settings::value)),
                settings::updated_at.eq(excluded(settings::updated_at)),
            ))
            .execute(&mut conn)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl ProductCatalog for PgStore {
    async fn products_by_ids(&self, ids: &[String]) -> Result<Vec<Product>, StoreError> {
        let mut conn = self.pool.get().await.map_err(unavailable)?;
        let rows = products::table
            .filter(products::id.eq_any(ids.to_vec()))
            .select(DbProduct::as_select())
            .load::<DbProduct>(&mut conn)
            .await?;
        Ok(rows.into_iter().map(Product::from).collect())
    }
}
