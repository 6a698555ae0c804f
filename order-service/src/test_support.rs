//! In-memory store and recording providers for unit tests.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use shared::{CustomerInfo, NotificationPreference, Order, OrderItem, OrderStatus, Product};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::providers::{EmailMessage, EmailProvider, SendOutcome, SmsMessage, SmsProvider};
use crate::store::{CustomerLookup, OrderStore, ProductCatalog, SettingsStore, StoreError};

pub fn product(id: &str, name: &str, price: &str) -> Product {
    Product {
        id: id.to_string(),
        name: name.to_string(),
        description: None,
        price: bigdecimal::BigDecimal::from_str(price).unwrap(),
        category: "Mains".to_string(),
        image_url: None,
        is_available: true,
    }
}

pub fn created_at(minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 3, 12, minute, 0).unwrap()
}

/// Two burgers and fries, picked up at 2:00 PM.
pub fn sample_order(id: &str) -> Order {
    let items = vec![
        OrderItem {
            product_id: "burger".to_string(),
            name: "Classic Burger".to_string(),
            price: "12.99".parse().unwrap(),
            quantity: 2,
        },
        OrderItem {
            product_id: "fries".to_string(),
            name: "French Fries".to_string(),
            price: "4.99".parse().unwrap(),
            quantity: 1,
        },
    ];
    Order {
        id: id.to_string(),
        customer_name: "Ada Lovelace".to_string(),
        email: "ada@example.com".to_string(),
        phone: "(555) 010-2000".to_string(),
        zip_code: "12345".to_string(),
        total: shared::compute_total(&items),
        items,
        pickup_time: "2:00 PM".to_string(),
        status: OrderStatus::Pending,
        notification_preference: NotificationPreference::Email,
        created_at: created_at(0),
        reminder_sent_at: None,
    }
}

#[derive(Default)]
struct MemoryState {
    orders: Vec<Order>,
    products: HashMap<String, Product>,
    settings: HashMap<String, serde_json::Value>,
}

/// Non-durable store with switches for simulating backend failures.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
    pub fail_reads: AtomicBool,
    pub fail_order_inserts: AtomicBool,
    pub fail_item_inserts: AtomicBool,
    pub fail_settings_writes: AtomicBool,
    pub missing_settings_table: AtomicBool,
    pub writes: AtomicUsize,
}

impl MemoryStore {
    pub fn with_products(products: impl IntoIterator<Item = Product>) -> Self {
        let store = Self::default();
        store
            .state
            .lock()
            .unwrap()
            .products
            .extend(products.into_iter().map(|p| (p.id.clone(), p)));
        store
    }

    pub fn seed_order(&self, order: Order) {
        self.state.lock().unwrap().orders.push(order);
    }

    pub fn orders(&self) -> Vec<Order> {
        self.state.lock().unwrap().orders.clone()
    }

    pub fn setting(&self, key: &str) -> Option<serde_json::Value> {
        self.state.lock().unwrap().settings.get(key).cloned()
    }

    pub fn seed_setting(&self, key: &str, value: serde_json::Value) {
        self.state.lock().unwrap().settings.insert(key.to_string(), value);
    }

    fn check_reads(&self) -> Result<(), StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("connection refused".to_string()));
        }
        Ok(())
    }

    fn check_settings_table(&self) -> Result<(), StoreError> {
        if self.missing_settings_table.load(Ordering::SeqCst) {
            return Err(StoreError::MissingTable("relation \"settings\" does not exist".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn insert_order(&self, order: &Order) -> Result<(), StoreError> {
        if self.fail_order_inserts.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("insert failed".to_string()));
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        let mut header = order.clone();
        header.items.clear();
        self.state.lock().unwrap().orders.push(header);
        Ok(())
    }

    async fn insert_order_items(&self, order_id: &str, items: &[OrderItem]) -> Result<(), StoreError> {
        if self.fail_item_inserts.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("insert failed".to_string()));
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().unwrap();
        let order = state
            .orders
            .iter_mut()
            .find(|o| o.id == order_id)
            .ok_or_else(|| StoreError::Corrupt(format!("no header for {order_id}")))?;
        order.items.extend(items.iter().cloned());
        Ok(())
    }

    async fn delete_order(&self, order_id: &str) -> Result<(), StoreError> {
        self.state.lock().unwrap().orders.retain(|o| o.id != order_id);
        Ok(())
    }

    async fn list_orders(&self) -> Result<Vec<Order>, StoreError> {
        self.check_reads()?;
        let mut orders = self.orders();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    async fn find_order(&self, order_id: &str) -> Result<Option<Order>, StoreError> {
        self.check_reads()?;
        Ok(self.orders().into_iter().find(|o| o.id == order_id))
    }

    async fn set_status(&self, order_id: &str, status: OrderStatus) -> Result<bool, StoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().unwrap();
        match state.orders.iter_mut().find(|o| o.id == order_id) {
            Some(order) => {
                order.status = status;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn set_reminder_sent(&self, order_id: &str, at: DateTime<Utc>) -> Result<bool, StoreError> {
        let mut state = self.state.lock().unwrap();
        match state.orders.iter_mut().find(|o| o.id == order_id) {
            Some(order) => {
                order.reminder_sent_at = Some(at);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn recent_customers(&self, lookup: &CustomerLookup, limit: i64) -> Result<Vec<CustomerInfo>, StoreError> {
        let mut orders = self.list_orders().await?;
        if let CustomerLookup::Email(email) = lookup {
            orders.retain(|o| &o.email == email);
        }
        Ok(orders
            .iter()
            .take(usize::try_from(limit).unwrap_or(0))
            .map(Order::customer)
            .collect())
    }
}

#[async_trait]
impl SettingsStore for MemoryStore {
    async fn read_setting(&self, key: &str) -> Result<Option<serde_json::Value>, StoreError> {
        self.check_settings_table()?;
        self.check_reads()?;
        Ok(self.setting(key))
    }

    async fn upsert_setting(&self, key: &str, value: serde_json::Value) -> Result<(), StoreError> {
        self.check_settings_table()?;
        if self.fail_settings_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("write failed".to_string()));
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.seed_setting(key, value);
        Ok(())
    }
}

#[async_trait]
impl ProductCatalog for MemoryStore {
    async fn products_by_ids(&self, ids: &[String]) -> Result<Vec<Product>, StoreError> {
        self.check_reads()?;
        let state = self.state.lock().unwrap();
        Ok(ids.iter().filter_map(|id| state.products.get(id).cloned()).collect())
    }
}

#[derive(Default)]
pub struct RecordingEmail {
    sent: Mutex<Vec<EmailMessage>>,
    failure: Option<String>,
}

impl RecordingEmail {
    pub fn failing(error: &str) -> Self {
        Self {
            sent: Mutex::default(),
            failure: Some(error.to_string()),
        }
    }

    /// Every attempted send, including ones that failed.
    pub fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl EmailProvider for RecordingEmail {
    async fn send_email(&self, message: &EmailMessage) -> SendOutcome {
        self.sent.lock().unwrap().push(message.clone());
        match &self.failure {
            Some(error) => SendOutcome::Failed { error: error.clone() },
            None => SendOutcome::Sent { id: Some("email-1".to_string()) },
        }
    }

    fn is_configured(&self) -> bool {
        true
    }
}

#[derive(Default)]
pub struct RecordingSms {
    sent: Mutex<Vec<SmsMessage>>,
    failure: Option<String>,
}

impl RecordingSms {
    pub fn failing(error: &str) -> Self {
        Self {
            sent: Mutex::default(),
            failure: Some(error.to_string()),
        }
    }

    pub fn sent(&self) -> Vec<SmsMessage> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl SmsProvider for RecordingSms {
    async fn send_sms(&self, message: &SmsMessage) -> SendOutcome {
        self.sent.lock().unwrap().push(message.clone());
        match &self.failure {
            Some(error) => SendOutcome::Failed { error: error.clone() },
            None => SendOutcome::Sent { id: Some("sms-1".to_string()) },
        }
    }

    fn is_configured(&self) -> bool {
        true
    }
}
